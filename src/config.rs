use crate::error::ChatLogError;
use crate::owners::{parse_owner_ids, OwnerSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "CHATLOG_CONFIG";
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
pub const OWNER_IDS_ENV: &str = "OWNER_IDS";

fn default_data_dir() -> String {
    "./chatlog.data".into()
}
fn default_history_limit() -> i64 {
    50
}
fn default_inline_text_limit() -> usize {
    4000
}
fn default_log_retention_days() -> i64 {
    30
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub owner_ids: Vec<i64>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_history_limit")]
    pub default_history_limit: i64,
    /// Rendered history longer than this many characters is sent as a file.
    #[serde(default = "default_inline_text_limit")]
    pub inline_text_limit: usize,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            telegram_bot_token: String::new(),
            owner_ids: Vec::new(),
            data_dir: default_data_dir(),
            default_history_limit: default_history_limit(),
            inline_text_limit: default_inline_text_limit(),
            log_to_file: false,
            log_retention_days: default_log_retention_days(),
        }
    }
}

impl Config {
    pub fn resolve_config_path() -> Result<Option<PathBuf>, ChatLogError> {
        if let Ok(custom) = std::env::var(CONFIG_PATH_ENV) {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(ChatLogError::Config(format!(
                "{CONFIG_PATH_ENV} points to non-existent file: {custom}"
            )));
        }

        for candidate in ["./chatlog.config.yaml", "./chatlog.config.yml"] {
            if std::path::Path::new(candidate).exists() {
                return Ok(Some(PathBuf::from(candidate)));
            }
        }
        Ok(None)
    }

    /// Load the YAML file (if any), overlay `BOT_TOKEN`/`OWNER_IDS` from the
    /// environment, then normalize. The bot token is checked separately by
    /// [`Config::require_bot_token`] so offline commands work without one.
    pub fn load() -> Result<Self, ChatLogError> {
        let mut config = match Self::resolve_config_path()? {
            Some(path) => Self::from_yaml_file(&path)?,
            None => Config::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.post_deserialize()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, ChatLogError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatLogError::Config(format!("Failed to read {path_str}: {e}")))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ChatLogError::Config(format!("Failed to parse {path_str}: {e}")))
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.telegram_bot_token = token.trim().to_string();
        }
        if let Some(raw) = lookup(OWNER_IDS_ENV) {
            for id in parse_owner_ids(&raw) {
                if !self.owner_ids.contains(&id) {
                    self.owner_ids.push(id);
                }
            }
        }
    }

    /// Apply post-deserialization normalization and validation.
    pub fn post_deserialize(&mut self) -> Result<(), ChatLogError> {
        self.telegram_bot_token = self.telegram_bot_token.trim().to_string();
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self.default_history_limit <= 0 {
            self.default_history_limit = default_history_limit();
        }
        if self.inline_text_limit == 0 {
            self.inline_text_limit = default_inline_text_limit();
        }
        if self.log_retention_days <= 0 {
            self.log_retention_days = default_log_retention_days();
        }
        Ok(())
    }

    pub fn require_bot_token(&self) -> Result<&str, ChatLogError> {
        if self.telegram_bot_token.is_empty() {
            return Err(ChatLogError::Config(format!(
                "telegram_bot_token is required (set it in chatlog.config.yaml or {BOT_TOKEN_ENV})"
            )));
        }
        Ok(&self.telegram_bot_token)
    }

    pub fn owners(&self) -> OwnerSet {
        OwnerSet::new(self.owner_ids.iter().copied())
    }
}
