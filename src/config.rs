use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    /// Match pattern for the browser tab the fallback path may script.
    #[serde(default = "default_web_player_url")]
    pub web_player_url: String,
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    #[serde(default = "default_fallback_timeout_secs")]
    pub fallback_timeout_secs: u64,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8898/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    [
        "user-read-private",
        "user-read-playback-state",
        "user-modify-playback-state",
        "user-read-currently-playing",
        "user-library-read",
        "user-library-modify",
        "user-read-playback-position",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1/me".to_string()
}

fn default_accounts_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_web_player_url() -> String {
    "https://open.spotify.com/*".to_string()
}

fn default_refresh_lead_secs() -> u64 {
    60
}

fn default_fallback_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            api_base_url: default_api_base_url(),
            accounts_url: default_accounts_url(),
            web_player_url: default_web_player_url(),
            refresh_lead_secs: default_refresh_lead_secs(),
            fallback_timeout_secs: default_fallback_timeout_secs(),
            store_path: None,
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".pomotune"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> AppResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Err(AppError::Config(
                "Config file not found. Please run setup.".into(),
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load the config, writing defaults on first launch so the file exists
    /// for the user to fill in a client id.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config: {}. Using defaults.", e);
            let default_config = Self::default();
            if let Err(save_err) = default_config.save() {
                log::error!("Failed to save default config: {}", save_err);
            }
            default_config
        })
    }

    pub fn save(&self) -> AppResult<()> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        let path = Self::config_path()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Where the persisted session/snapshot record lives.
    pub fn store_path(&self) -> AppResult<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("store.json")),
        }
    }

    pub fn refresh_lead(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}
