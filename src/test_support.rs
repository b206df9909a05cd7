//! Scripted stand-ins for the host and remote collaborators.

use crate::api::auth::{AuthRedirect, RedirectOutcome, TokenEndpoint};
use crate::api::client::{ApiRequest, ApiResponse, Gateway, Method};
use crate::api::models::TokenResponse;
use crate::error::{AppError, AppResult};
use crate::fallback::{PageScript, TabHost, TabTarget};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Notify;
use url::Url;

pub fn token(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_in,
        token_type: "Bearer".into(),
        scope: None,
    }
}

#[derive(Clone)]
enum Scripted {
    Respond(u16, String),
    NetworkError,
}

/// Gateway answering per (method, path) route and recording every call.
#[derive(Default)]
pub struct FakeGateway {
    routes: Mutex<HashMap<(Method, String), Scripted>>,
    calls: Mutex<Vec<(ApiRequest, String)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            (method, path.to_string()),
            Scripted::Respond(status, body.to_string()),
        );
    }

    pub fn fail(&self, method: Method, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Scripted::NetworkError);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn bearer_tokens(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn call(&self, request: &ApiRequest, access_token: &str) -> AppResult<ApiResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), access_token.to_string()));
        let scripted = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method, request.path.clone()))
            .cloned();
        match scripted {
            Some(Scripted::Respond(status, body)) => Ok(ApiResponse { status, body }),
            Some(Scripted::NetworkError) => Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
            None => Ok(ApiResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeTokens {
    exchange: Mutex<Option<TokenResponse>>,
    refresh: Mutex<Option<TokenResponse>>,
    codes: Mutex<Vec<String>>,
    verifiers: Mutex<Vec<String>>,
    refreshed_with: Mutex<Vec<String>>,
}

impl FakeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exchange(&self, token: Option<TokenResponse>) {
        *self.exchange.lock().unwrap() = token;
    }

    pub fn set_refresh(&self, token: Option<TokenResponse>) {
        *self.refresh.lock().unwrap() = token;
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }

    pub fn verifiers(&self) -> Vec<String> {
        self.verifiers.lock().unwrap().clone()
    }

    pub fn refreshed_with(&self) -> Vec<String> {
        self.refreshed_with.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokens {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse> {
        self.codes.lock().unwrap().push(code.to_string());
        self.verifiers.lock().unwrap().push(code_verifier.to_string());
        self.exchange
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::SpotifyApi {
                status: 400,
                message: "exchange rejected".into(),
            })
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        self.refreshed_with
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.refresh
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::SpotifyApi {
                status: 400,
                message: "invalid_grant".into(),
            })
    }
}

enum RedirectMode {
    Fixed(RedirectOutcome),
    /// Echo the request's `state` back with a code, like a real approval.
    Approve(String),
    /// Echo the request's `state` back with an `error` parameter.
    Deny(String),
}

pub struct FakeRedirect {
    mode: RedirectMode,
    launched: Mutex<Vec<String>>,
}

impl FakeRedirect {
    fn with_mode(mode: RedirectMode) -> Self {
        Self {
            mode,
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(outcome: RedirectOutcome) -> Self {
        Self::with_mode(RedirectMode::Fixed(outcome))
    }

    pub fn approve(code: &str) -> Self {
        Self::with_mode(RedirectMode::Approve(code.to_string()))
    }

    pub fn deny_echoing_state(error: &str) -> Self {
        Self::with_mode(RedirectMode::Deny(error.to_string()))
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

fn state_of(url: &str) -> String {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl AuthRedirect for FakeRedirect {
    async fn launch_interactive_auth(&self, url: &str) -> RedirectOutcome {
        self.launched.lock().unwrap().push(url.to_string());
        match &self.mode {
            RedirectMode::Fixed(outcome) => outcome.clone(),
            RedirectMode::Approve(code) => RedirectOutcome::Redirected(format!(
                "http://127.0.0.1:8898/callback?code={}&state={}",
                code,
                state_of(url)
            )),
            RedirectMode::Deny(error) => RedirectOutcome::Redirected(format!(
                "http://127.0.0.1:8898/callback?error={}&state={}",
                error,
                state_of(url)
            )),
        }
    }
}

/// The first launch waits for `release` and then reports the user declined;
/// every later launch approves with `code`, echoing `state`.
pub struct HeldRedirect {
    code: String,
    gate: Notify,
    launched: Mutex<Vec<String>>,
}

impl HeldRedirect {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            gate: Notify::new(),
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn launched(&self) -> usize {
        self.launched.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthRedirect for HeldRedirect {
    async fn launch_interactive_auth(&self, url: &str) -> RedirectOutcome {
        let first = {
            let mut launched = self.launched.lock().unwrap();
            launched.push(url.to_string());
            launched.len() == 1
        };
        if first {
            self.gate.notified().await;
            return RedirectOutcome::Declined;
        }
        RedirectOutcome::Redirected(format!(
            "http://127.0.0.1:8898/callback?code={}&state={}",
            self.code,
            state_of(url)
        ))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ScriptBehaviour {
    Resolve,
    Reject,
    Hang,
}

pub struct FakeTabs {
    tabs: Vec<TabTarget>,
    behaviour: ScriptBehaviour,
    queries: Mutex<Vec<String>>,
    injected: Mutex<Vec<(TabTarget, PageScript)>>,
}

impl FakeTabs {
    pub fn new(tabs: Vec<TabTarget>, behaviour: ScriptBehaviour) -> Self {
        Self {
            tabs,
            behaviour,
            queries: Mutex::new(Vec::new()),
            injected: Mutex::new(Vec::new()),
        }
    }

    pub fn web_player(behaviour: ScriptBehaviour) -> Self {
        Self::new(
            vec![TabTarget {
                tab_id: 7,
                url: "https://open.spotify.com/".into(),
            }],
            behaviour,
        )
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn injected(&self) -> Vec<(TabTarget, PageScript)> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabHost for FakeTabs {
    async fn query_tabs(&self, url_pattern: &str) -> AppResult<Vec<TabTarget>> {
        self.queries.lock().unwrap().push(url_pattern.to_string());
        Ok(self.tabs.clone())
    }

    async fn execute_script(
        &self,
        tab: &TabTarget,
        script: &PageScript,
    ) -> AppResult<serde_json::Value> {
        self.injected
            .lock()
            .unwrap()
            .push((tab.clone(), script.clone()));
        match self.behaviour {
            ScriptBehaviour::Resolve => Ok(serde_json::Value::Bool(true)),
            ScriptBehaviour::Reject => Err(AppError::Injection("element not found".into())),
            ScriptBehaviour::Hang => std::future::pending().await,
        }
    }
}
