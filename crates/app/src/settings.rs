//! Gateway connection settings, persisted as a small JSON file.
//!
//! Missing file: defaults are written out and returned. Unreadable or
//! corrupt file: defaults are used for the session (logged), the file is
//! left alone.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "9000".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub tally_host: String,
    /// Kept as text in the file; validated on use via [`Settings::port`].
    #[serde(default = "default_port")]
    pub tally_port: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tally_host: default_host(),
            tally_port: default_port(),
        }
    }
}

/// Default on-disk location, next to the database file.
pub fn default_path() -> PathBuf {
    PathBuf::from("config/settings.json")
}

impl Settings {
    /// Load settings from `path`, falling back to defaults as documented
    /// on the module.
    pub fn load(path: &Path) -> Settings {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Settings file not found; creating defaults");
            let defaults = Settings::default();
            if let Err(e) = defaults.save(path) {
                tracing::error!(path = %path.display(), error = %e, "Could not write default settings");
            }
            return defaults;
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    tracing::debug!(path = %path.display(), "Settings loaded");
                    settings
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Corrupt settings file; using defaults");
                    Settings::default()
                }
            },
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Could not read settings; using defaults");
                Settings::default()
            }
        }
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).expect("settings serialize");
        std::fs::write(path, json)
    }

    /// The configured port, if it is a valid TCP port number.
    pub fn port(&self) -> Option<u16> {
        self.tally_port.trim().parse().ok().filter(|p| *p > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_creates_defaults_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings::load(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists(), "defaults should be written out");
    }

    #[test]
    fn round_trips_saved_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let custom = Settings { tally_host: "10.0.0.5".into(), tally_port: "9999".into() };
        custom.save(&path).unwrap();

        assert_eq!(Settings::load(&path), custom);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn partial_file_fills_in_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"tally_host": "example"}"#).unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.tally_host, "example");
        assert_eq!(settings.tally_port, "9000");
    }

    #[test]
    fn port_validation() {
        let mut settings = Settings::default();
        assert_eq!(settings.port(), Some(9000));

        settings.tally_port = "not-a-port".into();
        assert_eq!(settings.port(), None);

        settings.tally_port = "0".into();
        assert_eq!(settings.port(), None);
    }
}
