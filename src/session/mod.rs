mod manager;
mod scheduler;

pub use manager::{SessionManager, SessionStatus};
pub use scheduler::{RefreshJob, RefreshScheduler};

use crate::api::models::TokenResponse;
use crate::error::AppResult;
use crate::store::{record, KeyValueStore};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Keys the session occupies in the host store.
pub mod keys {
    pub const SESSION_STATE: &str = "sessionState";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const EXPIRES_IN: &str = "expiresIn";
    pub const EXPIRY_TIMESTAMP: &str = "expiryTimestamp";

    pub const ALL: [&str; 5] = [
        SESSION_STATE,
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        EXPIRES_IN,
        EXPIRY_TIMESTAMP,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    SignedOut,
    AwaitingAuthorization,
    SignedIn,
}

/// The one persisted credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_seconds: u64,
    /// Milliseconds since the Unix epoch; 0 when unset.
    pub expiry_timestamp: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl Session {
    pub fn signed_out() -> Self {
        Self {
            state: SessionState::SignedOut,
            access_token: String::new(),
            refresh_token: String::new(),
            expires_in_seconds: 0,
            expiry_timestamp: 0,
        }
    }

    /// Build a signed-in session from a token grant. Refresh grants may omit
    /// the refresh token, in which case the previous one stays valid.
    pub fn from_token(
        token: &TokenResponse,
        now: DateTime<Utc>,
        previous_refresh: Option<&str>,
    ) -> Self {
        let refresh_token = token
            .refresh_token
            .clone()
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();
        let mut session = Self {
            state: SessionState::SignedIn,
            access_token: token.access_token.clone(),
            refresh_token,
            expires_in_seconds: token.expires_in,
            expiry_timestamp: now.timestamp_millis() + token.expires_in as i64 * 1000,
        };
        if !session.has_credentials() {
            session.state = SessionState::SignedOut;
        }
        session
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty() && self.expiry_timestamp > 0
    }

    pub fn is_signed_in(&self) -> bool {
        self.state == SessionState::SignedIn && self.has_credentials()
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        if self.expiry_timestamp <= 0 {
            return None;
        }
        Utc.timestamp_millis_opt(self.expiry_timestamp).single()
    }

    pub async fn load(store: &dyn KeyValueStore) -> AppResult<Self> {
        let stored = store.get(&keys::ALL).await?;
        let text = |key: &str| {
            stored
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let state = stored
            .get(keys::SESSION_STATE)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(SessionState::SignedOut);

        let mut session = Self {
            state,
            access_token: text(keys::ACCESS_TOKEN),
            refresh_token: text(keys::REFRESH_TOKEN),
            expires_in_seconds: stored
                .get(keys::EXPIRES_IN)
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            expiry_timestamp: stored
                .get(keys::EXPIRY_TIMESTAMP)
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
        };

        // SignedIn is only believed when every credential is present.
        if session.state == SessionState::SignedIn && !session.has_credentials() {
            log::warn!("Stored session claims signed in without credentials; treating as signed out");
            session.state = SessionState::SignedOut;
        }
        Ok(session)
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        store
            .set(record(json!({
                (keys::SESSION_STATE): self.state,
                (keys::ACCESS_TOKEN): self.access_token,
                (keys::REFRESH_TOKEN): self.refresh_token,
                (keys::EXPIRES_IN): self.expires_in_seconds,
                (keys::EXPIRY_TIMESTAMP): self.expiry_timestamp,
            })))
            .await
    }
}
