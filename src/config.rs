use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";
const DEFAULT_AI_TIMEOUT_SECS: u64 = 15;
const DEFAULT_AI_COOLDOWN_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
}

/// Runtime settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub dialogue_db: String,
    pub chatgpt_api_key: Option<String>,
    pub ai_timeout: Duration,
    /// Minimum gap between two quizzes, or two assistant questions, per user.
    pub ai_cooldown: Duration,
    pub persona: Option<String>,
    pub firebase: Option<FirebaseConfig>,
    pub offline_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let seconds = |name: &'static str, default: u64| match non_empty(name) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { name, value: raw }),
            None => Ok(default),
        };
        let ai_timeout = seconds("NCC_AI_TIMEOUT_SECS", DEFAULT_AI_TIMEOUT_SECS)?;
        let ai_cooldown = seconds("NCC_AI_COOLDOWN_SECS", DEFAULT_AI_COOLDOWN_SECS)?;

        let offline_mode = match non_empty("NCC_OFFLINE_MODE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                name: "NCC_OFFLINE_MODE",
                value: raw,
            })?,
            None => false,
        };

        let firebase = non_empty("FIREBASE_PROJECT_ID").map(|project_id| FirebaseConfig {
            project_id,
            api_key: non_empty("FIREBASE_API_KEY"),
            auth_token: non_empty("FIREBASE_AUTH_TOKEN"),
        });

        Ok(Self {
            data_dir: non_empty("NCC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            dialogue_db: non_empty("NCC_DIALOGUE_DB")
                .unwrap_or_else(|| DEFAULT_DIALOGUE_DB.to_string()),
            chatgpt_api_key: non_empty("CHATGPT_API_KEY"),
            ai_timeout: Duration::from_secs(ai_timeout),
            ai_cooldown: Duration::from_secs(ai_cooldown),
            persona: non_empty("NCC_PERSONA"),
            firebase,
            offline_mode,
        })
    }

    /// Per-user folder holding the score history, chat log and offline queue.
    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(user_id)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_any_variable() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.dialogue_db, "db.sqlite");
        assert_eq!(config.ai_timeout, Duration::from_secs(15));
        assert_eq!(config.ai_cooldown, Duration::from_secs(60));
        assert_eq!(config.chatgpt_api_key, None);
        assert_eq!(config.persona, None);
        assert_eq!(config.firebase, None);
        assert!(!config.offline_mode);
    }

    #[test]
    fn firebase_needs_a_project_id() {
        let config = config_from(&[("FIREBASE_API_KEY", "key")]).unwrap();
        assert_eq!(config.firebase, None);

        let config = config_from(&[
            ("FIREBASE_PROJECT_ID", "ncc-abyas"),
            ("FIREBASE_AUTH_TOKEN", "  "),
        ])
        .unwrap();
        let firebase = config.firebase.unwrap();
        assert_eq!(firebase.project_id, "ncc-abyas");
        assert_eq!(firebase.auth_token, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config_from(&[("NCC_AI_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("NCC_AI_COOLDOWN_SECS", "-1")]).is_err());
        assert_eq!(
            config_from(&[("NCC_AI_COOLDOWN_SECS", "0")]).unwrap().ai_cooldown,
            Duration::ZERO
        );
        assert!(config_from(&[("NCC_OFFLINE_MODE", "maybe")]).is_err());
        assert!(config_from(&[("NCC_OFFLINE_MODE", "Yes")]).unwrap().offline_mode);
    }

    #[test]
    fn user_dir_is_under_data_dir() {
        let config = config_from(&[("NCC_DATA_DIR", "/tmp/ncc")]).unwrap();
        assert_eq!(config.user_dir("42"), PathBuf::from("/tmp/ncc/42"));
    }
}
