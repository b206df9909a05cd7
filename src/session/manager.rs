use crate::api::auth::{
    authorization_code, build_auth_url, AuthRedirect, PkceAttempt, RedirectOutcome, TokenEndpoint,
};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::outcome::Outcome;
use crate::session::scheduler::{RefreshJob, RefreshScheduler};
use crate::session::{Session, SessionState};
use crate::store::{record, KeyValueStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

pub const ALREADY_SIGNED_IN: &str = "User already logged in.";
pub const ACCESS_DENIED: &str = "User access denied.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    pub signed_in: bool,
    pub expiry_timestamp: Option<i64>,
}

struct Inner {
    config: AppConfig,
    store: Arc<dyn KeyValueStore>,
    tokens: Arc<dyn TokenEndpoint>,
    redirect: Arc<dyn AuthRedirect>,
    scheduler: RefreshScheduler,
}

/// Owns the sign-in/sign-out transitions and the credential record.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        tokens: Arc<dyn TokenEndpoint>,
        redirect: Arc<dyn AuthRedirect>,
    ) -> Self {
        let scheduler = RefreshScheduler::new(config.refresh_lead());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                tokens,
                redirect,
                scheduler,
            }),
        }
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.inner.scheduler
    }

    pub async fn session(&self) -> AppResult<Session> {
        Session::load(self.inner.store.as_ref()).await
    }

    pub async fn status(&self) -> AppResult<SessionStatus> {
        let session = self.session().await?;
        Ok(SessionStatus {
            state: session.state,
            signed_in: session.is_signed_in(),
            expiry_timestamp: session.expiry().map(|e| e.timestamp_millis()),
        })
    }

    /// Run the PKCE handshake for one attempt.
    pub async fn begin_sign_in(&self, attempt: PkceAttempt) -> Outcome {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Failed to load session: {}", e);
                return Outcome::error(e.to_string());
            }
        };
        if session.is_signed_in() {
            log::info!("Sign-in requested while already signed in");
            return Outcome::failure(ALREADY_SIGNED_IN);
        }

        if let Err(e) = self.set_state(SessionState::AwaitingAuthorization).await {
            log::error!("Failed to record pending sign-in: {}", e);
            return Outcome::error(e.to_string());
        }

        let url = build_auth_url(&self.inner.config, &attempt);
        let redirect_url = match self.inner.redirect.launch_interactive_auth(&url).await {
            RedirectOutcome::Redirected(url) if !url.is_empty() => url,
            RedirectOutcome::Redirected(_) => {
                log::warn!("Authorization returned an empty redirect");
                return self.deny().await;
            }
            RedirectOutcome::Declined => {
                log::info!("User declined authorization");
                return self.deny().await;
            }
            RedirectOutcome::HostError(e) => {
                log::error!("Authorization flow failed in host: {}", e);
                return self.deny().await;
            }
        };

        let code = match authorization_code(&redirect_url, &attempt.nonce) {
            Ok(Ok(code)) => code,
            Ok(Err(rejection)) => {
                log::warn!("Authorization callback rejected: {:?}", rejection);
                return self.deny().await;
            }
            Err(e) => {
                log::warn!("Unparseable authorization callback: {}", e);
                return self.deny().await;
            }
        };

        match self.complete_sign_in(&code, &attempt.verifier).await {
            Ok(session) => {
                self.arm(&session);
                log::info!("Signed in");
                Outcome::success()
            }
            Err(e) => {
                log::error!("Token exchange failed: {}", e);
                self.abandon_attempt().await;
                Outcome::error(e.to_string())
            }
        }
    }

    async fn complete_sign_in(&self, code: &str, verifier: &str) -> AppResult<Session> {
        let token = self.inner.tokens.exchange_code(code, verifier).await?;
        let session = Session::from_token(&token, Utc::now(), None);
        if !session.is_signed_in() {
            return Err(AppError::SpotifyApi {
                status: 200,
                message: "Token response missing refresh token".into(),
            });
        }
        session.save(self.inner.store.as_ref()).await?;
        Ok(session)
    }

    /// Clear every credential and stop refreshing. Idempotent.
    pub async fn sign_out(&self) -> Outcome {
        self.inner.scheduler.cancel();
        match self.clear_credentials().await {
            Ok(()) => {
                log::info!("Signed out");
                Outcome::success()
            }
            Err(e) => {
                log::error!("Failed to clear session: {}", e);
                Outcome::error(e.to_string())
            }
        }
    }

    /// Exchange the stored refresh token. Any failure leaves the session
    /// signed out rather than holding stale credentials.
    pub async fn refresh_now(&self) -> AppResult<DateTime<Utc>> {
        let result = self.try_refresh().await;
        if let Err(e) = &result {
            log::warn!("Refresh failed, signing out: {}", e);
            self.reset_quietly().await;
        }
        result
    }

    async fn try_refresh(&self) -> AppResult<DateTime<Utc>> {
        let current = self.session().await?;
        if !current.is_signed_in() {
            return Err(AppError::AuthRequired);
        }
        let token = self.inner.tokens.refresh(&current.refresh_token).await?;
        let refreshed = Session::from_token(&token, Utc::now(), Some(&current.refresh_token));
        refreshed.save(self.inner.store.as_ref()).await?;
        refreshed.expiry().ok_or(AppError::TokenExpired)
    }

    /// Re-arm from persisted credentials, e.g. when the host process starts.
    pub async fn resume(&self) -> AppResult<SessionStatus> {
        let session = self.session().await?;
        if session.is_signed_in() {
            self.arm(&session);
        } else {
            self.inner.scheduler.cancel();
            if session.state == SessionState::AwaitingAuthorization {
                // The attempt that set this died with the previous process.
                self.clear_credentials().await?;
            }
        }
        self.status().await
    }

    fn arm(&self, session: &Session) {
        let Some(expiry) = session.expiry() else {
            return;
        };
        let manager = self.clone();
        let job: RefreshJob = Arc::new(move || {
            let manager = manager.clone();
            Box::pin(async move { manager.refresh_now().await })
        });
        self.inner.scheduler.arm(expiry, job);
    }

    async fn deny(&self) -> Outcome {
        self.abandon_attempt().await;
        Outcome::error(ACCESS_DENIED)
    }

    /// Undo a failed attempt's pending state. Only a session still waiting on
    /// authorization is cleared; one settled by an overlapping attempt stays.
    async fn abandon_attempt(&self) {
        match self.session().await {
            Ok(session) if session.state != SessionState::AwaitingAuthorization => {
                log::info!(
                    "Failed attempt left session in {:?}; not clearing it",
                    session.state
                );
            }
            Ok(_) => {
                self.sign_out().await;
            }
            Err(e) => {
                log::error!("Failed to load session after failed attempt: {}", e);
                self.sign_out().await;
            }
        }
    }

    async fn reset_quietly(&self) {
        if let Err(e) = self.clear_credentials().await {
            log::error!("Failed to reset session: {}", e);
        }
    }

    async fn clear_credentials(&self) -> AppResult<()> {
        Session::signed_out().save(self.inner.store.as_ref()).await
    }

    async fn set_state(&self, state: SessionState) -> AppResult<()> {
        self.inner
            .store
            .set(record(json!({ (super::keys::SESSION_STATE): state })))
            .await
    }
}
