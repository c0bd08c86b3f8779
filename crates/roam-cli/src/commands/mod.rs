pub mod auth_cmd;
pub mod common;
pub mod config;
pub mod destinations;
pub mod favorites;
