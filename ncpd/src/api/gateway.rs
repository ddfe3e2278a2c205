//! The one HTTP client every fanclub request goes through.

use crate::error::{Error, Result};
use crate::platform::{Platform, SiteSettings};
use http::Method;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::instrument;

/// HTTP client bound to one platform.
///
/// The API base URL is not known up front: the platform publishes it in its
/// site settings. It is looked up on first use, exactly once even under
/// concurrent first callers, and falls back to the platform's default base if
/// the lookup fails for any reason.
///
/// Every non-success status becomes [`Error::Status`]. Nothing is retried.
#[derive(Debug)]
pub struct HttpGateway {
    http: reqwest::Client,
    platform: Platform,
    settings_url: String,
    api_base: OnceCell<String>,
}

impl HttpGateway {
    pub fn new(platform: Platform) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("build HTTP client: {e}")))?;
        Ok(Self::with_client(platform, http))
    }

    pub fn with_client(platform: Platform, http: reqwest::Client) -> Self {
        Self {
            settings_url: platform.settings_url(),
            http,
            platform,
            api_base: OnceCell::new(),
        }
    }

    /// Reads the site settings from somewhere else than the platform's domain.
    pub fn with_settings_url(mut self, settings_url: impl Into<String>) -> Self {
        self.settings_url = settings_url.into();
        self
    }

    /// Skips the site-settings lookup and uses `api_base` as is.
    pub fn with_api_base(self, api_base: impl Into<String>) -> Self {
        let api_base = OnceCell::new_with(Some(api_base.into()));
        Self { api_base, ..self }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The resolved API base URL.
    pub async fn api_base(&self) -> &str {
        self.api_base
            .get_or_init(|| self.resolve_api_base())
            .await
            .as_str()
    }

    /// Absolute URL of an API path such as `/video_pages/{code}`.
    pub async fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base().await.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    #[instrument(skip(self), fields(platform = self.platform.name))]
    async fn resolve_api_base(&self) -> String {
        match self.fetch_site_settings().await {
            Ok(settings) if !settings.api_base_url.is_empty() => {
                tracing::info!(api_base = %settings.api_base_url, "resolved API base URL");
                settings.api_base_url
            }
            Ok(_) => {
                tracing::warn!(
                    default = self.platform.default_api_base,
                    "site settings carry no api_base_url, using default"
                );
                self.platform.default_api_base.to_string()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    default = self.platform.default_api_base,
                    "failed to fetch site settings, using default API base URL"
                );
                self.platform.default_api_base.to_string()
            }
        }
    }

    async fn fetch_site_settings(&self) -> Result<SiteSettings> {
        self.json(self.http.get(&self.settings_url)).await
    }

    /// Starts a request; finish it with [`Self::send`], [`Self::json`] or
    /// [`Self::text`].
    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Sends a request and turns non-success statuses into [`Error::Status`].
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let request = request.build().map_err(|source| Error::Transport {
            url: source.url().map(|u| u.to_string()).unwrap_or_default(),
            source,
        })?;
        let method = request.method().clone();
        let url = request.url().to_string();

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| Error::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::trace!(%method, url = %url, status = status.as_u16(), "response received");
        if !status.is_success() {
            return Err(Error::status(status, url));
        }
        Ok(response)
    }

    pub async fn text(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = self.send(request).await?;
        let url = response.url().to_string();
        response
            .text()
            .await
            .map_err(|source| Error::Transport { url, source })
    }

    /// Sends a request and decodes its JSON body.
    pub async fn json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|source| Error::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|source| Error::Decode { url, source })
    }
}
