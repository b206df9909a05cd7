pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod fallback;
pub mod outcome;
pub mod router;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

use api::auth::{AccountsClient, AuthRedirect, TokenEndpoint};
use api::client::{Gateway, HttpGateway};
use commands::CommandDispatcher;
use config::AppConfig;
use error::AppResult;
use fallback::{FallbackExecutor, TabHost};
use router::Router;
use session::{SessionManager, SessionStatus};
use std::sync::Arc;
use store::{JsonFileStore, KeyValueStore};

const USER_AGENT: &str = concat!("Pomotune/", env!("CARGO_PKG_VERSION"));

/// Everything a host needs to serve UI requests. The host supplies the
/// store, the interactive-auth primitive and browser-tab access.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub session: SessionManager,
    pub router: Router,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        redirect: Arc<dyn AuthRedirect>,
        tabs: Arc<dyn TabHost>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let gateway = Arc::new(HttpGateway::new(http.clone(), config.api_base_url.clone()));
        let tokens = Arc::new(AccountsClient::new(http, &config));
        Ok(Self::with_parts(config, store, gateway, tokens, redirect, tabs))
    }

    /// Open the file store at the configured path and wire the rest.
    pub async fn open(
        config: AppConfig,
        redirect: Arc<dyn AuthRedirect>,
        tabs: Arc<dyn TabHost>,
    ) -> AppResult<Self> {
        let store = Arc::new(JsonFileStore::open(config.store_path()?).await?);
        log::info!("Using store at {}", store.path().display());
        Self::new(config, store, redirect, tabs)
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn Gateway>,
        tokens: Arc<dyn TokenEndpoint>,
        redirect: Arc<dyn AuthRedirect>,
        tabs: Arc<dyn TabHost>,
    ) -> Self {
        let session = SessionManager::new(config.clone(), Arc::clone(&store), tokens, redirect);
        let fallback = FallbackExecutor::new(
            tabs,
            config.web_player_url.clone(),
            config.fallback_timeout(),
        );
        let router = Router::new(
            session.clone(),
            CommandDispatcher::new(gateway),
            fallback,
            Arc::clone(&store),
        );
        Self {
            config,
            store,
            session,
            router,
        }
    }

    /// Pick up a persisted session, re-arming the refresh deadline.
    pub async fn start(&self) -> AppResult<SessionStatus> {
        if self.config.client_id.is_empty() {
            log::warn!("No client id configured; sign-in will be rejected by the provider");
        }
        let status = self.session.resume().await?;
        log::info!("Session resumed in state {:?}", status.state);
        Ok(status)
    }
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("pomotune_lib=info"),
    )
    .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;
    use crate::session::{Session, SessionState};
    use crate::store::MemoryStore;
    use crate::test_support::{
        token, FakeGateway, FakeRedirect, FakeTabs, FakeTokens, ScriptBehaviour,
    };
    use chrono::Utc;
    use serde_json::json;

    fn state(store: Arc<MemoryStore>) -> AppState {
        AppState::with_parts(
            AppConfig::default(),
            store,
            Arc::new(FakeGateway::new()),
            Arc::new(FakeTokens::new()),
            Arc::new(FakeRedirect::approve("code")),
            Arc::new(FakeTabs::web_player(ScriptBehaviour::Resolve)),
        )
    }

    #[tokio::test]
    async fn start_rearms_persisted_session() {
        let store = Arc::new(MemoryStore::new());
        Session::from_token(&token("a", Some("r"), 3600), Utc::now(), None)
            .save(store.as_ref())
            .await
            .unwrap();

        let app = state(store);
        let status = app.start().await.unwrap();
        assert!(status.signed_in);
        assert!(app.session.scheduler().is_armed());
        app.session.scheduler().cancel();
    }

    #[tokio::test]
    async fn start_with_empty_store_is_signed_out() {
        let app = state(Arc::new(MemoryStore::new()));
        let status = app.start().await.unwrap();
        assert_eq!(status.state, SessionState::SignedOut);
        assert!(!app.session.scheduler().is_armed());
    }

    #[tokio::test]
    async fn router_and_session_share_the_store() {
        let store = Arc::new(MemoryStore::new());
        let app = state(store);
        let outcome = app.router.handle(json!({ "command": "signOut" })).await;
        assert_eq!(outcome, Outcome::success());
        let session = app.session.session().await.unwrap();
        assert_eq!(session.state, SessionState::SignedOut);
    }

    #[tokio::test]
    async fn new_builds_http_collaborators() {
        let app = AppState::new(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(FakeRedirect::approve("code")),
            Arc::new(FakeTabs::web_player(ScriptBehaviour::Resolve)),
        );
        assert!(app.is_ok());
    }
}
