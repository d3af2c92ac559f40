//! Session token exchange with the auth server behind the patched domain.
//!
//! A patched client talks to `sessions.<domain>`. The launcher asks that
//! server for an identity/session token pair before starting the game and
//! falls back to locally generated placeholders when the request fails.

use crate::codec::DEFAULT_TARGET_DOMAIN;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Scopes requested for every session.
pub const SCOPES: [&str; 2] = ["hytale:server", "hytale:client"];

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_NAME: &str = "domain-patcher";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("auth server returned status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response did not contain {0}")]
    MissingToken(&'static str),
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    uuid: &'a str,
    name: &'a str,
    scopes: [&'static str; 2],
}

// Some servers answer in PascalCase.
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(rename = "identityToken", default)]
    identity_token: Option<String>,
    #[serde(rename = "sessionToken", default)]
    session_token: Option<String>,
    #[serde(rename = "IdentityToken", default)]
    identity_token_alt: Option<String>,
    #[serde(rename = "SessionToken", default)]
    session_token_alt: Option<String>,
}

/// Identity and session tokens handed to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub identity_token: String,
    pub session_token: String,
}

impl AuthTokens {
    /// Placeholder tokens for offline play.
    ///
    /// They carry no valid signature and only work with auth checks disabled.
    pub fn local(uuid: &str, name: &str) -> Self {
        Self {
            identity_token: format!("local-{uuid}-{name}"),
            session_token: format!("session-{uuid}-{name}"),
        }
    }
}

/// Base URL of the session server for `domain`.
pub fn auth_server_url(domain: &str) -> String {
    let domain = if domain.is_empty() {
        DEFAULT_TARGET_DOMAIN
    } else {
        domain
    };
    format!("https://sessions.{domain}")
}

/// Parse a token response body, accepting either field casing.
pub fn parse_token_response(body: &str) -> Result<AuthTokens, AuthError> {
    let response: TokenResponse = serde_json::from_str(body)?;
    let pick = |primary: Option<String>, alt: Option<String>| {
        primary.filter(|t| !t.is_empty()).or(alt.filter(|t| !t.is_empty()))
    };

    Ok(AuthTokens {
        identity_token: pick(response.identity_token, response.identity_token_alt)
            .ok_or(AuthError::MissingToken("identityToken"))?,
        session_token: pick(response.session_token, response.session_token_alt)
            .ok_or(AuthError::MissingToken("sessionToken"))?,
    })
}

/// Client for the session server.
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(domain: &str) -> Result<Self, AuthError> {
        Self::with_timeout(domain, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(domain: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: auth_server_url(domain),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/game-session/child", self.base_url)
    }

    /// Request a token pair for the player `uuid`/`name`.
    pub fn fetch_tokens(&self, uuid: &str, name: &str) -> Result<AuthTokens, AuthError> {
        let endpoint = self.endpoint();
        info!("Fetching auth tokens from {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, format!("{}/{}", CLIENT_NAME, env!("CARGO_PKG_VERSION")))
            .json(&TokenRequest {
                uuid,
                name,
                scopes: SCOPES,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }

        let body = response.text()?;
        let tokens = parse_token_response(&body)?;
        debug!("Auth tokens received from server");
        Ok(tokens)
    }

    /// Server tokens, or local placeholders when the exchange fails.
    pub fn tokens_or_local(&self, uuid: &str, name: &str) -> (AuthTokens, Option<AuthError>) {
        match self.fetch_tokens(uuid, name) {
            Ok(tokens) => (tokens, None),
            Err(err) => (AuthTokens::local(uuid, name), Some(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_server_url() {
        assert_eq!(auth_server_url("example.io"), "https://sessions.example.io");
        assert_eq!(auth_server_url(""), "https://sessions.sanasol.ws");
    }

    #[test]
    fn test_endpoint() {
        let client = AuthClient::new("sanasol.ws").unwrap();
        assert_eq!(
            client.endpoint(),
            "https://sessions.sanasol.ws/game-session/child"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(TokenRequest {
            uuid: "u-1",
            name: "Player",
            scopes: SCOPES,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "uuid": "u-1",
                "name": "Player",
                "scopes": ["hytale:server", "hytale:client"]
            })
        );
    }

    #[test]
    fn test_parse_camel_case() {
        let tokens =
            parse_token_response(r#"{"identityToken":"id","sessionToken":"sess"}"#).unwrap();
        assert_eq!(tokens.identity_token, "id");
        assert_eq!(tokens.session_token, "sess");
    }

    #[test]
    fn test_parse_pascal_case() {
        let tokens =
            parse_token_response(r#"{"IdentityToken":"ID","SessionToken":"SESS"}"#).unwrap();
        assert_eq!(tokens.identity_token, "ID");
        assert_eq!(tokens.session_token, "SESS");
    }

    #[test]
    fn test_parse_prefers_camel_case() {
        let tokens = parse_token_response(
            r#"{"identityToken":"a","IdentityToken":"b","sessionToken":"","SessionToken":"c"}"#,
        )
        .unwrap();
        assert_eq!(tokens.identity_token, "a");
        assert_eq!(tokens.session_token, "c");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_token_response("not json"),
            Err(AuthError::Decode(_))
        ));
        assert!(matches!(
            parse_token_response(r#"{"identityToken":"a"}"#),
            Err(AuthError::MissingToken("sessionToken"))
        ));
    }

    #[test]
    fn test_local_tokens() {
        let tokens = AuthTokens::local("1234", "Steve");
        assert_eq!(tokens.identity_token, "local-1234-Steve");
        assert_eq!(tokens.session_token, "session-1234-Steve");
    }
}
