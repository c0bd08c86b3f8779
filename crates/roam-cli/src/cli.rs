use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use roam_core::supabase::DestinationSort;

#[derive(Parser)]
#[command(name = "roam")]
#[command(about = "Browse destinations and keep your favorites in sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding the Supabase project settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in, sign up, or sign out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Browse the destination catalog
    Destinations {
        #[command(subcommand)]
        command: DestinationCommands,
    },
    /// Manage favorite destinations
    Favorites {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password and merge favorites saved on this device
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account
    Signup {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show who is signed in
    Status,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortOrder {
    Name,
    Rating,
    Category,
}

impl From<SortOrder> for DestinationSort {
    fn from(value: SortOrder) -> Self {
        match value {
            SortOrder::Name => Self::Name,
            SortOrder::Rating => Self::Rating,
            SortOrder::Category => Self::Category,
        }
    }
}

#[derive(Subcommand)]
pub enum DestinationCommands {
    /// List destinations
    List {
        /// Match name, location, or category
        #[arg(short, long)]
        search: Option<String>,
        /// Only this category
        #[arg(long)]
        category: Option<String>,
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortOrder::Name)]
        sort: SortOrder,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one destination
    Show {
        /// Destination ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a destination to the catalog (admin only)
    Create {
        #[command(flatten)]
        fields: DestinationFields,
    },
    /// Change fields of a destination (admin only)
    Edit {
        /// Destination ID
        id: String,
        #[command(flatten)]
        fields: DestinationFields,
    },
    /// Remove a destination from the catalog (admin only)
    Delete {
        /// Destination ID
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Count how many accounts favorited a destination (admin only)
    Stats {
        /// Destination ID
        id: String,
    },
}

/// Catalog fields. `create` needs all of them; `edit` sends only those given.
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct DestinationFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    #[arg(long)]
    pub rating: Option<f64>,
    #[arg(long)]
    pub entry_fee: Option<String>,
    #[arg(long)]
    pub timings: Option<String>,
    #[arg(long)]
    pub official_link: Option<String>,
    /// Image URLs, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub images: Option<Vec<String>>,
}

#[derive(Subcommand)]
pub enum FavoriteCommands {
    /// List favorites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Favorite a destination
    Add {
        /// Destination ID
        id: String,
    },
    /// Unfavorite a destination
    Remove {
        /// Destination ID
        id: String,
    },
    /// Check whether a destination is a favorite
    Check {
        /// Destination ID
        id: String,
    },
    /// Retry merging favorites saved on this device into the account
    Sync,
}
