use roam_core::config::{BackendConfig, SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};
use roam_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => run_config_init(global_profile, supabase_url, supabase_anon_key, no_activate),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing,
        supabase_url,
        supabase_anon_key,
        |key| std::env::var(key).ok(),
    );
    let backend = merged
        .backend_config()
        .map_err(|error| CliError::Config(format!("Profile '{profile_name}': {error}")))?;

    *config.profile_mut_or_default(&profile_name) = merged;
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );
    if backend.is_some() {
        println!(
            "Profile '{profile_name}' is ready. Run `roam auth login --email <email> --password <password>` to sync favorites."
        );
    } else {
        println!("Profile '{profile_name}' is missing: supabase_url, supabase_anon_key");
    }
    Ok(())
}

/// Explicit flags win, then the environment, then what the profile had.
pub fn merge_profile(
    existing: &CliProfile,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(supabase_url)
            .or_else(|| normalize_text_option(lookup(SUPABASE_URL_ENV)))
            .or_else(|| existing.supabase_url.clone()),
        supabase_anon_key: normalize_text_option(supabase_anon_key)
            .or_else(|| normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV)))
            .or_else(|| existing.supabase_anon_key.clone()),
    }
}

fn run_config_show(global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    println!("Profile: {profile_name}");

    let backend = match config.profile(&profile_name) {
        Some(profile) => profile.backend_config().map_err(CliError::Config)?,
        None => None,
    };
    let (backend, source) = match backend {
        Some(backend) => (Some(backend), "profile"),
        None => (BackendConfig::from_env()?, "environment"),
    };

    match backend {
        Some(backend) => {
            println!("Supabase URL: {} (from {source})", backend.supabase_url);
            println!("Anon key: {}", mask_key(&backend.supabase_anon_key));
        }
        None => println!("Supabase project: not configured"),
    }
    Ok(())
}

/// Show only the last few characters of a key.
pub fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(8))
}
