//! Named backend profiles stored in `cli-config.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use roam_core::config::BackendConfig;
use roam_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const PROFILE_ENV: &str = "ROAM_PROFILE";
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

fn file_error(action: &str, path: &Path, error: &dyn std::fmt::Display) -> String {
    format!("Cannot {action} {}: {error}", path.display())
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("roam").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "No user config directory on this system".to_string())
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(ToString::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    /// A missing file is an empty configuration.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => return Err(file_error("read", path, &error)),
        };
        let mut config: Self =
            serde_json::from_str(&raw).map_err(|error| file_error("parse", path, &error))?;
        config.normalize();
        Ok(config)
    }

    /// Write to the default location and return the path written.
    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path).map(|()| path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|error| file_error("create", dir, &error))?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let json = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Cannot encode CLI profiles: {error}"))?;
        std::fs::write(path, json).map_err(|error| file_error("write", path, &error))
    }

    /// Profile named by `--profile`, then `ROAM_PROFILE`, then the active
    /// profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with_env(explicit, std::env::var(PROFILE_ENV).ok().as_deref())
    }

    pub fn resolve_profile_name_with_env(
        &self,
        explicit: Option<&str>,
        from_env: Option<&str>,
    ) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(from_env))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_owned()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        self.profiles.values_mut().for_each(CliProfile::normalize);
    }
}

impl CliProfile {
    /// Validated backend settings, or `None` when the profile has neither.
    pub fn backend_config(&self) -> Result<Option<BackendConfig>, String> {
        match (self.supabase_url.as_deref(), self.supabase_anon_key.as_deref()) {
            (None, None) => Ok(None),
            (Some(url), Some(key)) => BackendConfig::new(url, key)
                .map(Some)
                .map_err(|error| error.to_string()),
            (Some(_), None) => Err("profile is missing supabase_anon_key".to_string()),
            (None, Some(_)) => Err("profile is missing supabase_url".to_string()),
        }
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
    }
}
