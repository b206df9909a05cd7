//! Best-effort playback control by scripting the open web player tab,
//! used when the account tier is refused by the player endpoints.

mod scripts;

pub use scripts::PageScript;

use crate::api::models::TrackSnapshot;
use crate::commands::Command;
use crate::error::{AppError, AppResult};
use crate::outcome::Outcome;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// At or below this fraction played, "previous" skips back; past it the
/// current item restarts instead.
pub const RESTART_THRESHOLD: f64 = 0.03;

pub const SEEK_FAILURE: &str = "Failure when seeking track.";

/// A browser tab eligible for injection. Resolved per attempt, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabTarget {
    pub tab_id: i64,
    pub url: String,
}

/// Host access to browser tabs in a second execution context.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn query_tabs(&self, url_pattern: &str) -> AppResult<Vec<TabTarget>>;

    /// Run `script` in the tab. An `Err` means the script threw or the host
    /// could not inject it.
    async fn execute_script(
        &self,
        tab: &TabTarget,
        script: &PageScript,
    ) -> AppResult<serde_json::Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackAction {
    Play,
    Pause,
    Next,
    SkipBack,
    RestartTrack,
    Save,
    Remove,
    SetVolume(u32),
    Seek { position_ms: u64, duration_ms: u64 },
}

impl FallbackAction {
    /// The on-page equivalent of a playback command, given the last known
    /// snapshot. `None` when the page has no equivalent.
    pub fn for_command(command: &Command, last: Option<&TrackSnapshot>) -> Option<Self> {
        let action = match command {
            Command::Play => FallbackAction::Play,
            Command::Pause => FallbackAction::Pause,
            Command::Next => FallbackAction::Next,
            Command::Previous => match last {
                Some(snapshot) if snapshot.progress_fraction() > RESTART_THRESHOLD => {
                    FallbackAction::RestartTrack
                }
                _ => FallbackAction::SkipBack,
            },
            Command::SaveTrack { .. } => FallbackAction::Save,
            Command::RemoveTrack { .. } => FallbackAction::Remove,
            Command::SetVolume { volume, .. } => FallbackAction::SetVolume((*volume).min(100)),
            Command::SeekPosition { position, .. } => {
                let duration_ms = last.map(|s| s.duration_ms).filter(|d| *d > 0)?;
                FallbackAction::Seek {
                    position_ms: *position,
                    duration_ms,
                }
            }
            Command::SignIn
            | Command::SignOut
            | Command::GetProfile
            | Command::GetCurrentlyPlaying => return None,
        };
        Some(action)
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            FallbackAction::Play => "Failure when playing track.",
            FallbackAction::Pause => "Failure when pausing track.",
            FallbackAction::Next => "Failure when skipping track.",
            FallbackAction::SkipBack | FallbackAction::RestartTrack => {
                "Failure when going to previous track."
            }
            FallbackAction::Save => "Failure when saving track.",
            FallbackAction::Remove => "Failure when removing track.",
            FallbackAction::SetVolume(_) => "Failure when setting volume.",
            FallbackAction::Seek { .. } => SEEK_FAILURE,
        }
    }

    pub fn script(&self) -> PageScript {
        match self {
            FallbackAction::Play => scripts::play(),
            FallbackAction::Pause => scripts::pause(),
            FallbackAction::Next => scripts::skip_forward(),
            FallbackAction::SkipBack => scripts::skip_back(),
            FallbackAction::RestartTrack => scripts::seek_fraction(0.0),
            FallbackAction::Save => PageScript::toggle_saved(true),
            FallbackAction::Remove => PageScript::toggle_saved(false),
            FallbackAction::SetVolume(volume) => scripts::volume_fraction(*volume as f64 / 100.0),
            FallbackAction::Seek {
                position_ms,
                duration_ms,
            } => scripts::seek_fraction(*position_ms as f64 / *duration_ms as f64),
        }
    }
}

/// Chrome-style match pattern where `*` matches any run of characters.
fn matches_pattern(pattern: &str, url: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    let Some(mut remaining) = url.strip_prefix(first) else {
        return false;
    };
    if rest.is_empty() {
        return remaining.is_empty();
    }
    for (i, part) in rest.iter().enumerate() {
        let last = i == rest.len() - 1;
        if last {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    true
}

pub struct FallbackExecutor {
    tabs: Arc<dyn TabHost>,
    web_player_url: String,
    timeout: Duration,
}

impl FallbackExecutor {
    pub fn new(tabs: Arc<dyn TabHost>, web_player_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tabs,
            web_player_url: web_player_url.into(),
            timeout,
        }
    }

    async fn find_web_player(&self) -> AppResult<Option<TabTarget>> {
        let tabs = self.tabs.query_tabs(&self.web_player_url).await?;
        Ok(tabs
            .into_iter()
            .find(|tab| matches_pattern(&self.web_player_url, &tab.url)))
    }

    /// Run `script` in `tab`, giving up once the deadline passes.
    async fn inject(&self, tab: &TabTarget, script: &PageScript) -> AppResult<serde_json::Value> {
        match tokio::time::timeout(self.timeout, self.tabs.execute_script(tab, script)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Perform `action` on the web player page. Success means the page
    /// accepted the interaction; the caller should re-fetch player state.
    pub async fn run(&self, action: &FallbackAction) -> Outcome {
        let failure = || Outcome::failure(action.failure_message());

        let tab = match self.find_web_player().await {
            Ok(Some(tab)) => tab,
            Ok(None) => {
                log::info!("No web player tab open for {:?} fallback", action);
                return failure();
            }
            Err(e) => {
                log::error!("Tab query failed: {}", e);
                return failure();
            }
        };

        match self.inject(&tab, &action.script()).await {
            Ok(_) => {
                log::info!("{:?} performed in tab {}", action, tab.tab_id);
                Outcome::success()
            }
            Err(e) => {
                log::warn!("{:?} injection into tab {} failed: {}", action, tab.tab_id, e);
                failure()
            }
        }
    }
}
