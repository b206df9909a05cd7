use crate::api::auth::PkceAttempt;
use crate::api::models::TrackSnapshot;
use crate::commands::{Command, CommandDispatcher};
use crate::error::AppError;
use crate::fallback::{FallbackAction, FallbackExecutor, SEEK_FAILURE};
use crate::outcome::{Outcome, OutcomeData};
use crate::session::SessionManager;
use crate::store::{record, KeyValueStore};
use serde_json::json;
use std::sync::Arc;

pub const UNKNOWN_ERROR: &str = "Unknown error occurred.";

/// Store keys for state the UI reads back.
pub mod keys {
    pub const CURRENT_TRACK: &str = "currentTrack";
    pub const PROFILE_URL: &str = "profileUrl";
}

/// Single entry point for UI requests. Every request gets exactly one
/// `Outcome`; nothing escapes as an error.
pub struct Router {
    session: SessionManager,
    dispatcher: CommandDispatcher,
    fallback: FallbackExecutor,
    store: Arc<dyn KeyValueStore>,
}

impl Router {
    pub fn new(
        session: SessionManager,
        dispatcher: CommandDispatcher,
        fallback: FallbackExecutor,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            session,
            dispatcher,
            fallback,
            store,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Handle a `{ "command": ..., ...fields }` request.
    pub async fn handle(&self, request: serde_json::Value) -> Outcome {
        match parse(request) {
            Some(command) => self.dispatch(command).await,
            None => Outcome::error(UNKNOWN_ERROR),
        }
    }

    /// Handle a request, and when a playback command is refused for the
    /// account tier, retry it through the web player page and resync.
    pub async fn handle_with_fallback(&self, request: serde_json::Value) -> Outcome {
        match parse(request) {
            Some(command) => self.dispatch_with_fallback(command).await,
            None => Outcome::error(UNKNOWN_ERROR),
        }
    }

    pub async fn dispatch(&self, command: Command) -> Outcome {
        log::debug!("Dispatching {}", command.name());
        match command {
            Command::SignIn => self.session.begin_sign_in(PkceAttempt::generate()).await,
            Command::SignOut => self.session.sign_out().await,
            Command::GetProfile => {
                let token = match self.access_token().await {
                    Ok(token) => token,
                    Err(outcome) => return outcome,
                };
                let outcome = self.dispatcher.get_profile(&token).await;
                if let Some(OutcomeData::Profile { profile_url }) = outcome.data() {
                    self.remember(json!({ (keys::PROFILE_URL): profile_url })).await;
                }
                outcome
            }
            Command::GetCurrentlyPlaying => {
                let token = match self.access_token().await {
                    Ok(token) => token,
                    Err(outcome) => return outcome,
                };
                let outcome = self.dispatcher.get_currently_playing(&token).await;
                if let Some(snapshot) = outcome.snapshot() {
                    self.remember(json!({ (keys::CURRENT_TRACK): snapshot })).await;
                }
                outcome
            }
            command => {
                let token = match self.access_token().await {
                    Ok(token) => token,
                    Err(outcome) => return outcome,
                };
                self.dispatcher.track_command(&command, &token).await
            }
        }
    }

    pub async fn dispatch_with_fallback(&self, command: Command) -> Outcome {
        let outcome = self.dispatch(command.clone()).await;
        if !outcome.is_failure() || !command.is_playback() {
            return outcome;
        }

        let last = self.last_snapshot().await;
        let Some(action) = FallbackAction::for_command(&command, last.as_ref()) else {
            // Only a seek lacks a page equivalent, when no duration is known.
            log::info!("{} has no web player equivalent without a known duration", command.name());
            return Outcome::failure(SEEK_FAILURE);
        };
        log::info!("{} refused by API, trying web player", command.name());

        let recovered = self.fallback.run(&action).await;
        if !recovered.is_success() {
            return recovered;
        }

        let refreshed = self.dispatch(Command::GetCurrentlyPlaying).await;
        if refreshed.snapshot().is_some() {
            return refreshed;
        }
        log::warn!(
            "Resync after fallback did not return a snapshot: {:?}",
            refreshed.message()
        );
        Outcome::success()
    }

    /// The snapshot stored by the last successful `GetCurrentlyPlaying`.
    pub async fn last_snapshot(&self) -> Option<TrackSnapshot> {
        let stored = match self.store.get(&[keys::CURRENT_TRACK]).await {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("Failed to read last snapshot: {}", e);
                return None;
            }
        };
        stored
            .get(keys::CURRENT_TRACK)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    async fn access_token(&self) -> Result<String, Outcome> {
        match self.session.session().await {
            Ok(session) if session.is_signed_in() => Ok(session.access_token),
            Ok(session) => {
                log::info!("Command refused in {:?} state", session.state);
                Err(Outcome::error(AppError::AuthRequired.to_string()))
            }
            Err(e) => {
                log::error!("Failed to load session: {}", e);
                Err(Outcome::error(UNKNOWN_ERROR))
            }
        }
    }

    async fn remember(&self, value: serde_json::Value) {
        if let Err(e) = self.store.set(record(value)).await {
            log::warn!("Failed to persist command result: {}", e);
        }
    }
}

fn parse(request: serde_json::Value) -> Option<Command> {
    match serde_json::from_value::<Command>(request) {
        Ok(command) => Some(command),
        Err(e) => {
            log::warn!("Unrecognised request: {}", e);
            None
        }
    }
}
