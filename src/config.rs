//! Application-level configuration loading: admin PIN, staff contact and the
//! song suggestions shown on the request form.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KARAOKE_BACK_CONFIG_PATH";
const ADMIN_PIN_ENV: &str = "KARAOKE_ADMIN_PIN";
const STAFF_CONTACT_ENV: &str = "KARAOKE_STAFF_CONTACT";

/// A song offered as a one-tap suggestion on the request form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub artist: String,
}

impl Suggestion {
    fn new(title: &str, artist: &str) -> Self {
        Self {
            title: title.to_owned(),
            artist: artist.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    admin_pin: Option<String>,
    staff_contact: String,
    suggestions: Vec<Suggestion>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then
    /// apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        suggestions = app_config.suggestions.len(),
                        "loaded application config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        let config = config.with_overrides(|key| env::var(key).ok());
        if config.admin_pin.is_none() {
            warn!("no admin PIN configured; admin login is disabled");
        }
        config
    }

    /// Parse the JSON document found at [`DEFAULT_CONFIG_PATH`].
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Apply `KARAOKE_ADMIN_PIN` and `KARAOKE_STAFF_CONTACT` from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(pin) = lookup(ADMIN_PIN_ENV) {
            self.admin_pin = non_blank(pin);
        }
        if let Some(contact) = lookup(STAFF_CONTACT_ENV) {
            self.staff_contact = digits_only(&contact);
        }
        self
    }

    /// Replace the admin PIN.
    pub fn with_admin_pin(mut self, pin: impl Into<String>) -> Self {
        self.admin_pin = non_blank(pin.into());
        self
    }

    /// Shared admin access code, if admin login is enabled.
    pub fn admin_pin(&self) -> Option<&str> {
        self.admin_pin.as_deref()
    }

    /// Staff phone number in international format, digits only. May be empty.
    pub fn staff_contact(&self) -> &str {
        &self.staff_contact
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_pin: None,
            staff_contact: String::new(),
            suggestions: default_suggestions(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    admin_pin: Option<String>,
    #[serde(default)]
    staff_contact: Option<String>,
    #[serde(default)]
    suggestions: Option<Vec<Suggestion>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            admin_pin: value.admin_pin.and_then(non_blank),
            staff_contact: value
                .staff_contact
                .as_deref()
                .map(digits_only)
                .unwrap_or_default(),
            suggestions: value.suggestions.unwrap_or_else(default_suggestions),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// `wa.me` expects the bare number: no `+`, spaces or dashes.
fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in suggestions shipped with the binary.
fn default_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new("Evidências", "Chitãozinho & Xororó"),
        Suggestion::new("Bohemian Rhapsody", "Queen"),
        Suggestion::new("Anna Júlia", "Los Hermanos"),
        Suggestion::new("Cheia de Manias", "Raça Negra"),
        Suggestion::new("Dormi na Praça", "Bruno & Marrone"),
        Suggestion::new("Wonderwall", "Oasis"),
        Suggestion::new("It's My Life", "Bon Jovi"),
        Suggestion::new("I Will Survive", "Gloria Gaynor"),
        Suggestion::new("Tempo Perdido", "Legião Urbana"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_default_suggestions() {
        let config = AppConfig::from_json(r#"{"admin_pin": "4321"}"#).unwrap();
        assert_eq!(config.admin_pin(), Some("4321"));
        assert_eq!(config.staff_contact(), "");
        assert_eq!(config.suggestions().len(), 9);
    }

    #[test]
    fn contact_is_reduced_to_digits() {
        let config =
            AppConfig::from_json(r#"{"staff_contact": "+55 (11) 91234-5678"}"#).unwrap();
        assert_eq!(config.staff_contact(), "5511912345678");
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = AppConfig::from_json(r#"{"admin_pin": "1111", "suggestions": []}"#)
            .unwrap()
            .with_overrides(|key| match key {
                ADMIN_PIN_ENV => Some("2222".into()),
                STAFF_CONTACT_ENV => Some("+1 555 0100".into()),
                _ => None,
            });
        assert_eq!(config.admin_pin(), Some("2222"));
        assert_eq!(config.staff_contact(), "15550100");
        assert!(config.suggestions().is_empty());
    }

    #[test]
    fn blank_pin_disables_admin_login() {
        let config = AppConfig::default().with_admin_pin("   ");
        assert_eq!(config.admin_pin(), None);
    }
}
