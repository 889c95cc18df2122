use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
/// Persisted settings for the lens emulator CLI.
pub struct AppConfig {
    pub profiles_path: Option<PathBuf>,
    pub default_profile: Option<String>,
    pub backend: Option<String>,
    pub split_default: Option<bool>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lens-emulator").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::from_toml(&contents)
    }

    fn from_toml(contents: &str) -> Self {
        toml::from_str(contents).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring malformed config");
            Self::default()
        })
    }

    /// Profile library path: config value, else `gl_profiles.json` in the working directory.
    pub fn profiles_path(&self) -> PathBuf {
        self.profiles_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("gl_profiles.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = AppConfig {
            profiles_path: Some(PathBuf::from("/tmp/lenses.json")),
            default_profile: Some("Helios 44".into()),
            backend: Some("auto".into()),
            split_default: Some(true),
        };
        let text = toml::to_string_pretty(&config).expect("serialize");
        assert_eq!(AppConfig::from_toml(&text), config);
    }

    #[test]
    fn malformed_or_partial_config_uses_defaults() {
        assert_eq!(AppConfig::from_toml("backend = ["), AppConfig::default());
        let partial = AppConfig::from_toml("backend = \"cpu\"");
        assert_eq!(partial.backend.as_deref(), Some("cpu"));
        assert_eq!(partial.profiles_path(), PathBuf::from("gl_profiles.json"));
    }
}
