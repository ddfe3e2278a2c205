//! OAuth 2.0 refresh-token exchange against the platform's auth server.
//!
//! The fanclub front-ends are public OAuth clients: there is no client secret,
//! and every refresh posts the client id, the login redirect URI and the
//! refresh token as a form body to `https://auth.{domain}/oauth/token`. The
//! server rotates the refresh token on every exchange.

use crate::error::{Error, Result};
use crate::platform::Platform;
use oauth2::basic::BasicClient;
use oauth2::{AuthType, ClientId, RefreshToken, TokenResponse, TokenUrl, reqwest};
use std::future::Future;
use std::time::Duration;

/// Lifetime assumed when the server does not say how long a token lives.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3300);

/// The outcome of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// The rotated refresh token, if the server handed one out.
    pub refresh_token: Option<String>,
    /// Lifetime as declared by the server.
    pub expires_in: Duration,
}

/// Exchanges a refresh token for a fresh access token.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, refresh_token: &str) -> impl Future<Output = Result<RefreshedToken>> + Send;
}

/// [`TokenRefresher`] talking to the platform's real token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthRefresher {
    client_id: String,
    token_url: TokenUrl,
    redirect_url: String,
    http: reqwest::Client,
}

impl OAuthRefresher {
    pub fn new(platform: &Platform, client_id: impl Into<String>) -> Result<Self> {
        let token_url = TokenUrl::new(platform.token_url())
            .map_err(|e| Error::Config(format!("token endpoint URL: {e}")))?;
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("build OAuth HTTP client: {e}")))?;

        Ok(Self {
            client_id: client_id.into(),
            token_url,
            redirect_url: platform.redirect_url(),
            http,
        })
    }

    /// Points the exchange at a different token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Result<Self> {
        self.token_url = TokenUrl::new(token_url.into())
            .map_err(|e| Error::Config(format!("token endpoint URL: {e}")))?;
        Ok(self)
    }
}

impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(self.token_url.clone());

        tracing::debug!(token_url = %self.token_url.as_str(), "exchanging refresh token");

        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .add_extra_param("redirect_uri", self.redirect_url.clone())
            .request_async(&self.http)
            .await
            .map_err(|e| Error::TokenRefresh(Box::new(e)))?;

        Ok(RefreshedToken {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_in: token.expires_in().unwrap_or(DEFAULT_LIFETIME),
        })
    }
}
