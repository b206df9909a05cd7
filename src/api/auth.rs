use crate::api::models::TokenResponse;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

/// One sign-in attempt's secrets. Created per attempt and passed by value
/// through the sign-in chain, so overlapping attempts never share state.
#[derive(Debug, Clone)]
pub struct PkceAttempt {
    pub nonce: String,
    pub verifier: String,
    pub challenge: String,
}

impl PkceAttempt {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let verifier_bytes: Vec<u8> = (0..64).map(|_| rng.gen::<u8>()).collect();
        let verifier = URL_SAFE_NO_PAD.encode(&verifier_bytes);

        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);

        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            verifier,
            challenge,
        }
    }
}

pub fn build_auth_url(config: &AppConfig, attempt: &PkceAttempt) -> String {
    let scopes = config.scopes.join(" ");

    let url = format!(
        "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge_method=S256&code_challenge={}",
        config.accounts_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&scopes),
        attempt.nonce,
        attempt.challenge
    );
    log::debug!("Auth URL: {}", url);
    url
}

/// Why a redirect callback was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRejection {
    ProviderError(String),
    StateMismatch,
    MissingCode,
}

/// Pull the authorization code out of a redirect URL, enforcing that the
/// round-tripped `state` is exactly the nonce this attempt issued.
pub fn authorization_code(
    redirect_url: &str,
    expected_nonce: &str,
) -> AppResult<Result<String, CallbackRejection>> {
    let url = Url::parse(redirect_url)?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_nonce) {
        return Ok(Err(CallbackRejection::StateMismatch));
    }
    if let Some(error) = error {
        return Ok(Err(CallbackRejection::ProviderError(error)));
    }
    Ok(code.ok_or(CallbackRejection::MissingCode))
}

/// What the host's interactive-auth primitive came back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Redirected(String),
    /// The user closed or declined the authorization page.
    Declined,
    /// The host itself failed (its last-error condition).
    HostError(String),
}

/// Host primitive: show an external URL and hand back the redirect.
#[async_trait]
pub trait AuthRedirect: Send + Sync {
    async fn launch_interactive_auth(&self, url: &str) -> RedirectOutcome;
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse>;
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse>;
}

/// Spotify accounts service client for the PKCE grants.
pub struct AccountsClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    redirect_uri: String,
}

impl AccountsClient {
    pub fn new(http: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            http,
            token_url: format!("{}/api/token", config.accounts_url),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    async fn post_form(&self, params: &[(&str, &str)], what: &str) -> AppResult<TokenResponse> {
        let response = self.http.post(&self.token_url).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SpotifyApi {
                status,
                message: format!("{} failed: {}", what, body),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token)
    }
}

#[async_trait]
impl TokenEndpoint for AccountsClient {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse> {
        // PKCE: the verifier replaces the client secret.
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        self.post_form(&params, "Token exchange").await
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        self.post_form(&params, "Token refresh").await
    }
}
