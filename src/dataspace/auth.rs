use crate::config::{Credentials, Endpoints};
use crate::error::AuthError;
use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Short-lived bearer credential. Fetched per request, never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange a username and password for a bearer token with the password grant.
pub async fn request_token(
    client: &Client,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<AccessToken> {
    let form = TokenRequest {
        client_id: &credentials.client_id,
        username: &credentials.username,
        password: &credentials.password,
        grant_type: "password",
    };

    debug!(url = %endpoints.token_url, username = %credentials.username, "Requesting access token");
    let response = client
        .post(endpoints.token_url.clone())
        .form(&form)
        .send()
        .await
        .map_err(AuthError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            status,
            body: error_payload(&body),
        }
        .into());
    }

    let body = response.text().await.map_err(AuthError::Transport)?;
    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|_| AuthError::InvalidResponse(error_payload(&body)))?;
    let access_token = token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    Ok(AccessToken(access_token))
}

// Compact JSON when the server sent JSON, the raw text otherwise.
fn error_payload(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => body.trim().to_string(),
    }
}
