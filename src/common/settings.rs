// Settings persistence module
//
// Handles loading/saving of the bridge configuration:
// - Discord application id for the Rich Presence session
// - UDP port the game sends telemetry to
// - Optional webhook URL for race-result notifications
// - Persistent storage under the platform config directory
// - CLI argument override support

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::common::util::{BridgeError, BridgeResult, APP_ID_PLACEHOLDER, DEFAULT_TELEMETRY_PORT};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppSettings {
    pub app_id: String,
    pub port: u16,
    /// Empty or placeholder means race notifications are disabled.
    #[serde(default)]
    pub webhook_url: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_id: APP_ID_PLACEHOLDER.to_string(),
            port: DEFAULT_TELEMETRY_PORT,
            webhook_url: String::new(),
        }
    }
}

impl AppSettings {
    /// Get the config file path in the user's config directory
    pub fn config_path() -> BridgeResult<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| BridgeError::Settings("could not find config directory".to_string()))?;
        path.push("F1-Presence-Bridge");

        if !path.exists() {
            fs::create_dir_all(&path)?;
        }

        path.push("settings.toml");
        Ok(path)
    }

    /// Load settings from config file, or return defaults if file doesn't exist
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => {
                if path.exists() {
                    match fs::read_to_string(&path) {
                        Ok(contents) => match toml::from_str(&contents) {
                            Ok(settings) => {
                                info!(path = %path.display(), "loaded settings");
                                return settings;
                            }
                            Err(err) => error!(%err, "error parsing settings file"),
                        },
                        Err(err) => error!(%err, "error reading settings file"),
                    }
                }
            }
            Err(err) => error!(%err, "error accessing config directory"),
        }

        info!("using default settings");
        Self::default()
    }

    /// Save settings to config file
    pub fn save(&self) -> BridgeResult {
        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self)
            .map_err(|err| BridgeError::Settings(err.to_string()))?;
        fs::write(&path, contents)?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Get the effective port (command line override or saved setting)
    pub fn effective_port(&self, cli_port: Option<u16>) -> u16 {
        cli_port.unwrap_or(self.port)
    }

    /// The notification endpoint, when one is actually configured.
    pub fn webhook(&self) -> Option<&str> {
        let url = self.webhook_url.trim();
        if url.is_empty() || url == "YOUR_WEBHOOK_URL_HERE" {
            None
        } else {
            Some(url)
        }
    }

    /// Reject a missing or placeholder application id before anything starts.
    pub fn validate(&self) -> BridgeResult {
        let app_id = self.app_id.trim();
        if app_id.is_empty() || app_id == APP_ID_PLACEHOLDER {
            return Err(BridgeError::Config(
                "no Discord application id configured".to_string(),
            ));
        }
        if !app_id.bytes().all(|b| b.is_ascii_digit()) {
            warn!(app_id, "Discord application ids are normally numeric");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_configuration() {
        let settings = AppSettings::default();
        assert_eq!(settings.port, DEFAULT_TELEMETRY_PORT);
        assert!(settings.validate().is_err());
        assert!(settings.webhook().is_none());
    }

    #[test]
    fn cli_port_wins_over_saved_port() {
        let settings = AppSettings::default();
        assert_eq!(settings.effective_port(Some(9999)), 9999);
        assert_eq!(settings.effective_port(None), DEFAULT_TELEMETRY_PORT);
    }

    #[test]
    fn webhook_is_enabled_only_for_real_urls() {
        let mut settings = AppSettings::default();
        assert!(settings.webhook().is_none());

        settings.webhook_url = "YOUR_WEBHOOK_URL_HERE".to_string();
        assert!(settings.webhook().is_none());

        settings.webhook_url = "  ".to_string();
        assert!(settings.webhook().is_none());

        settings.webhook_url = "https://discord.com/api/webhooks/1/abc".to_string();
        assert_eq!(
            settings.webhook(),
            Some("https://discord.com/api/webhooks/1/abc")
        );
    }

    #[test]
    fn numeric_app_id_validates() {
        let settings = AppSettings {
            app_id: "119876543210987654".to_string(),
            ..AppSettings::default()
        };
        assert!(settings.validate().is_ok());
    }
}
