//! GitHub OAuth sign-in: authorize URL, code detection, relay exchange.

pub mod callback;

use crate::config::GithubConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token exchange request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token relay returned status {0}")]
    Status(u16),
    #[error("token relay response has no token")]
    MissingToken,
    #[error("invalid redirect URI: {0}")]
    RedirectUri(String),
    #[error("callback listener failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization denied: {0}")]
    Denied(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Unauthenticated,
    Exchanging,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub auth_token: Option<String>,
    pub auth_status: AuthStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A redirect carrying `?code=` arrived
    CodeReceived(String),
    TokenReceived(String),
    ExchangeFailed(String),
    SignOut,
}

/// Work the session transitions ask the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEffect {
    ExchangeCode(String),
    /// Configure the API client with this token
    ArmClient(String),
    DisarmClient,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.auth_status == AuthStatus::Authenticated && self.auth_token.is_some()
    }
}

/// Decide the session's starting point from the persisted session and the
/// location the process was started with.
pub fn startup(session: Session, location: Option<&str>) -> (Session, Vec<AuthEffect>) {
    if let Some(code) = location.and_then(extract_code) {
        tracing::info!("authorization code present at startup");
        return reduce(session, AuthEvent::CodeReceived(code));
    }

    if let Some(token) = session.auth_token.clone() {
        let session = Session { auth_status: AuthStatus::Authenticated, ..session };
        return (session, vec![AuthEffect::ArmClient(token)]);
    }
    if session.auth_status != AuthStatus::Unauthenticated {
        // An exchange that died with the previous process never completes
        tracing::warn!(status = ?session.auth_status, "resetting session without token");
        return (Session::default(), vec![]);
    }
    (session, vec![])
}

pub fn reduce(session: Session, event: AuthEvent) -> (Session, Vec<AuthEffect>) {
    match event {
        AuthEvent::CodeReceived(code) => (
            Session { auth_status: AuthStatus::Exchanging, ..session },
            vec![AuthEffect::ExchangeCode(code)],
        ),
        AuthEvent::TokenReceived(token) => {
            tracing::info!("token exchange succeeded");
            (
                Session { auth_token: Some(token.clone()), auth_status: AuthStatus::Authenticated },
                vec![AuthEffect::ArmClient(token)],
            )
        }
        AuthEvent::ExchangeFailed(reason) => {
            tracing::warn!(%reason, "token exchange failed");
            // Keep a previously working token if there was one
            match session.auth_token {
                Some(token) => (
                    Session { auth_token: Some(token), auth_status: AuthStatus::Authenticated },
                    vec![],
                ),
                None => (Session::default(), vec![]),
            }
        }
        AuthEvent::SignOut => (Session::default(), vec![AuthEffect::DisarmClient]),
    }
}

/// The `code` query parameter of `location`, if any
pub fn extract_code(location: &str) -> Option<String> {
    let url = Url::parse(location.trim()).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .filter(|code| !code.is_empty())
}

/// `location` reduced to its bare origin, as the redirect after exchange
pub fn strip_code(location: &str) -> Option<String> {
    let url = Url::parse(location.trim()).ok()?;
    Some(format!("{}/", url.origin().ascii_serialization()))
}

pub fn authorize_url(config: &GithubConfig) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &config.authorize_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("scope", config.scope.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ],
    )
    .map_err(|e| AuthError::RedirectUri(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    token: Option<String>,
}

/// Trade an authorization code for a token via `{relay_url}/authenticate/{code}`
pub async fn exchange_code(http: &reqwest::Client, relay_url: &str, code: &str) -> Result<String, AuthError> {
    let url = format!(
        "{}/authenticate/{}",
        relay_url.trim_end_matches('/'),
        urlencoding::encode(code)
    );
    tracing::debug!(relay = relay_url, "exchanging authorization code");

    let response = http.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Status(status.as_u16()));
    }
    let body: RelayResponse = response.json().await?;
    body.token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)
}
