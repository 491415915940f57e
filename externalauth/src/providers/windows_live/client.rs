//! Windows Live OAuth and profile API client.

use async_trait::async_trait;
use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{provider_error, Error, ProviderErrorKind};
use crate::http::HttpClient;

pub const TOKEN_URL: &str = "https://login.live.com/oauth20_token.srf";
pub const USER_URL: &str = "https://apis.live.net/v5.0/me";

/// Token endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Profile of the signed-in account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub locale: String,
}

/// Windows Live capabilities a driver depends on.
#[async_trait]
pub trait Api: Send + Sync {
    /// Application identifier sent as `client_id`.
    fn client_id(&self) -> &str;

    /// Exchange an authorization code for an access token.
    ///
    /// A code rejected by the token endpoint is reported as `ProviderErrorKind::InvalidCode`.
    async fn access_token(&self, code: &str, redirect_uri: &str) -> Result<AccessToken, Error>;

    /// Fetch the account profile, `None` when the provider has no user for the token.
    async fn user(&self, access_token: &str) -> Result<Option<User>, Error>;
}

/// Overridable API endpoints.
#[derive(Debug, Clone)]
pub struct Urls {
    pub token_url: String,
    pub user_url: String,
}

impl Default for Urls {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
            user_url: USER_URL.to_string(),
        }
    }
}

/// Windows Live API client for one registered application.
pub struct Client {
    client_id: String,
    client_secret: SecretString,
    urls: Urls,
    http_client: HttpClient,
}

impl Client {
    pub fn new(client_id: String, client_secret: SecretString, http_client: HttpClient) -> Self {
        Self {
            client_id,
            client_secret,
            urls: Urls::default(),
            http_client,
        }
    }

    pub fn with_urls(mut self, urls: Urls) -> Self {
        self.urls = urls;
        self
    }
}

#[async_trait]
impl Api for Client {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn access_token(&self, code: &str, redirect_uri: &str) -> Result<AccessToken, Error> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging Windows Live authorization code");

        let response = self
            .http_client
            .post(&self.urls.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<AccessToken>().await?);
        }

        let error_text = response.text().await.unwrap_or_default();
        warn!("Windows Live token error ({}): {}", status, error_text);
        let kind = if status.is_client_error() {
            ProviderErrorKind::InvalidCode
        } else {
            ProviderErrorKind::Api
        };
        Err(provider_error(kind, &format!("{}: {}", status, error_text)))
    }

    async fn user(&self, access_token: &str) -> Result<Option<User>, Error> {
        let response = self
            .http_client
            .get(&self.urls.user_url)
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Windows Live profile error ({}): {}", status, error_text);
            return Err(provider_error(
                ProviderErrorKind::Api,
                &format!("{}: {}", status, error_text),
            ));
        }

        let user: User = response.json().await?;
        Ok(Some(user).filter(|u| !u.id.is_empty()))
    }
}
