//! The fanclub API client and the operations it exposes.

use crate::api::articles::{ARTICLES_PER_PAGE, Article, ArticleData, ArticlesData};
use crate::api::channels::{
    ChannelDomainData, ChannelsData, ContentProvider, FanclubSiteInfo, PageBaseInfoData,
};
use crate::api::comments::{
    COMMENT_WINDOW_LIMIT, CommentHistoryRequest, CommentRecord, CommentsUserTokenData,
    collect_comments,
};
use crate::api::gateway::HttpGateway;
use crate::api::types::{Envelope, PagedStream, collect_pages};
use crate::api::videos::{
    SessionIdData, VIDEOS_PER_PAGE, VideoDetails, VideoPageData, VideoPagesData,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::{StreamVariant, best_quality, parse_variants};
use crate::oauth::{OAuthRefresher, TokenRefresher};
use crate::token::TokenCache;
use http::Method;
use jiff::Timestamp;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::instrument;

/// Hosts that live outside the platform's API base.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Comment history, `POST {comments}/messages.history`
    pub comments: String,
    /// Master playlists, `GET {manifests}/auth/index.m3u8?session_id=..`
    pub manifests: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            comments: "https://comm-api.sheeta.com".to_string(),
            manifests: "https://hls-auth.cloud.stream.co.jp".to_string(),
        }
    }
}

/// Client for one fanclub platform.
///
/// This is the context every operation runs in: it owns the HTTP gateway and
/// the access-token cache, and clones share both. Build one per process and
/// hand clones to whoever needs API access.
pub struct FanclubClient<R = OAuthRefresher> {
    gateway: Arc<HttpGateway>,
    tokens: Arc<TokenCache<R>>,
    endpoints: Arc<Endpoints>,
}

impl<R> Clone for FanclubClient<R> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            tokens: Arc::clone(&self.tokens),
            endpoints: Arc::clone(&self.endpoints),
        }
    }
}

impl<R> std::fmt::Debug for FanclubClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanclubClient")
            .field("platform", &self.gateway.platform().name)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl FanclubClient<OAuthRefresher> {
    /// Builds a client for the configured platform and credentials.
    pub fn from_config(config: &Config) -> Result<Self> {
        let refresher = OAuthRefresher::new(&config.platform, config.client_id.clone())?;
        let gateway = HttpGateway::new(config.platform.clone())?;
        Ok(Self::new(
            gateway,
            TokenCache::new(refresher, config.bootstrap_refresh_token.clone()),
            Endpoints::default(),
        ))
    }
}

impl<R: TokenRefresher> FanclubClient<R> {
    pub fn new(gateway: HttpGateway, tokens: TokenCache<R>, endpoints: Endpoints) -> Self {
        Self {
            gateway: Arc::new(gateway),
            tokens: Arc::new(tokens),
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn gateway(&self) -> &HttpGateway {
        &self.gateway
    }

    /// A currently valid access token, refreshed if necessary.
    pub async fn access_token(&self) -> Result<String> {
        self.tokens.token().await
    }

    /// The latest refresh token; persist it to survive a restart.
    pub async fn refresh_token(&self) -> String {
        self.tokens.refresh_token().await
    }

    pub async fn token_expiry(&self) -> Option<Timestamp> {
        self.tokens.expiry().await
    }

    /// A request against the platform API with the headers the web front sends.
    async fn api_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = self.gateway.api_url(path).await;
        self.gateway
            .request(method, &url)
            .header("fc_use_device", "null")
    }

    /// Like [`Self::api_request`], scoped to one fanclub site.
    async fn site_request(&self, method: Method, site_id: u64, path: &str) -> reqwest::RequestBuilder {
        self.api_request(method, path)
            .await
            .header("fc_site_id", site_id.to_string())
    }

    /// Every channel on the platform.
    #[instrument(skip(self))]
    pub async fn list_channels(&self) -> Result<Vec<ContentProvider>> {
        let request = self
            .api_request(Method::GET, "/content_providers/channels")
            .await;
        let response: Envelope<ChannelsData> = self.gateway.json(request).await?;

        tracing::debug!(
            returned_items = response.data.content_providers.len(),
            "fetched channels"
        );
        Ok(response.data.content_providers)
    }

    /// The channel whose fanclub site has the given id.
    #[instrument(skip(self))]
    pub async fn channel_by_site_id(&self, site_id: u64) -> Result<ContentProvider> {
        self.list_channels()
            .await?
            .into_iter()
            .find(|c| c.site_id() == site_id)
            .ok_or_else(|| Error::not_found(format!("channel with fanclub site id {site_id}")))
    }

    /// The channel served under `domain`, e.g. `https://nicochannel.jp/some-channel`.
    #[instrument(skip(self))]
    pub async fn channel_by_domain(&self, domain: &str) -> Result<ContentProvider> {
        let request = self
            .api_request(Method::GET, "/content_providers/channel_domain")
            .await
            .query(&[("current_site_domain", domain)]);
        let response: Envelope<ChannelDomainData> = self.gateway.json(request).await?;

        response
            .data
            .content_providers
            .ok_or_else(|| Error::not_found(format!("channel at {domain}")))
    }

    /// Name, description and artwork of a fanclub site.
    #[instrument(skip(self))]
    pub async fn site_info(&self, site_id: u64) -> Result<FanclubSiteInfo> {
        let request = self
            .api_request(
                Method::GET,
                &format!("/fanclub_sites/{site_id}/page_base_info"),
            )
            .await;
        let response: Envelope<PageBaseInfoData> = self.gateway.json(request).await?;

        response
            .data
            .fanclub_site
            .ok_or_else(|| Error::not_found(format!("fanclub site {site_id}")))
    }

    /// One page of a site's video catalog, newest first.
    async fn video_page(&self, site_id: u64, page: u32) -> Result<VecDeque<VideoDetails>> {
        let per_page = VIDEOS_PER_PAGE.to_string();
        let page = page.to_string();
        let request = self
            .api_request(
                Method::GET,
                &format!("/v2/fanclub_sites/{site_id}/video_pages"),
            )
            .await
            .query(&[
                ("sort", "display_date"),
                ("vod_type", "0"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ]);
        let response: Envelope<VideoPagesData> = self.gateway.json(request).await?;

        tracing::debug!(
            total_results = response.data.video_pages.total,
            returned_items = response.data.video_pages.list.len(),
            "fetched video page"
        );
        Ok(response.data.video_pages.list)
    }

    /// Streams a site's whole video catalog.
    ///
    /// Catalog entries are partial; use [`Self::video_details`] for comment
    /// settings and stream information.
    pub fn videos(&self, site_id: u64) -> impl Stream<Item = Result<VideoDetails>> + '_ {
        PagedStream::new(VIDEOS_PER_PAGE, move |page| self.video_page(site_id, page))
    }

    /// Collects a site's whole video catalog; fails if any page fails.
    #[instrument(skip(self))]
    pub async fn list_videos(&self, site_id: u64) -> Result<Vec<VideoDetails>> {
        let videos = collect_pages(VIDEOS_PER_PAGE, |page| self.video_page(site_id, page)).await?;
        tracing::info!(site_id, count = videos.len(), "listed videos");
        Ok(videos)
    }

    /// The complete record of one video.
    #[instrument(skip(self))]
    pub async fn video_details(&self, site_id: u64, content_code: &str) -> Result<VideoDetails> {
        let request = self
            .site_request(Method::GET, site_id, &format!("/video_pages/{content_code}"))
            .await;
        let response: Envelope<VideoPageData> = self.gateway.json(request).await?;

        response
            .data
            .video_page
            .ok_or_else(|| Error::not_found(format!("video page {content_code}")))
    }

    /// One page of a site's news articles, newest first.
    async fn article_page(&self, site_id: u64, page: u32) -> Result<VecDeque<Article>> {
        let per_page = ARTICLES_PER_PAGE.to_string();
        let page = page.to_string();
        let request = self
            .api_request(
                Method::GET,
                &format!("/fanclub_sites/{site_id}/article_themes/news/articles"),
            )
            .await
            .query(&[
                ("per_page", per_page.as_str()),
                ("sort", "published_at_desc"),
                ("page", page.as_str()),
            ]);
        let response: Envelope<ArticlesData> = self.gateway.json(request).await?;

        let articles = response.data.article_theme.articles;
        tracing::debug!(
            total_results = articles.total,
            returned_items = articles.list.len(),
            "fetched article page"
        );
        Ok(articles.list)
    }

    /// Streams a site's news articles. Contents are excerpts only.
    pub fn articles(&self, site_id: u64) -> impl Stream<Item = Result<Article>> + '_ {
        PagedStream::new(ARTICLES_PER_PAGE, move |page| {
            self.article_page(site_id, page)
        })
    }

    /// Collects a site's news articles; fails if any page fails.
    #[instrument(skip(self))]
    pub async fn list_articles(&self, site_id: u64) -> Result<Vec<Article>> {
        let articles =
            collect_pages(ARTICLES_PER_PAGE, |page| self.article_page(site_id, page)).await?;
        tracing::info!(site_id, count = articles.len(), "listed articles");
        Ok(articles)
    }

    /// One article with its full contents.
    ///
    /// The request is authenticated; without a subscription the contents of a
    /// subscriber-only article come back empty.
    #[instrument(skip(self))]
    pub async fn article(&self, site_id: u64, article_code: &str) -> Result<Article> {
        let token = self.access_token().await?;
        let request = self
            .api_request(
                Method::GET,
                &format!("/fanclub_sites/{site_id}/article_themes/news/articles/{article_code}"),
            )
            .await
            .bearer_auth(token);
        let response: Envelope<ArticleData> = self.gateway.json(request).await?;

        response
            .data
            .article
            .article
            .ok_or_else(|| Error::not_found(format!("article {article_code}")))
    }

    /// Opens a playback session for a video.
    ///
    /// Fails with a 403 [`Error::Status`] (see [`Error::is_subscriber_only`])
    /// when the account may not watch the video.
    #[instrument(skip(self))]
    pub async fn session_id(&self, content_code: &str) -> Result<String> {
        let token = self.access_token().await?;
        let request = self
            .api_request(
                Method::POST,
                &format!("/video_pages/{content_code}/session_ids"),
            )
            .await
            .header("Origin", self.gateway.platform().origin())
            .bearer_auth(token)
            .json(&serde_json::json!({}));
        let response: Envelope<SessionIdData> = self.gateway.json(request).await?;

        if response.data.session_id.is_empty() {
            return Err(Error::not_found(format!("playback session for {content_code}")));
        }
        Ok(response.data.session_id)
    }

    /// The master playlist of a playback session.
    #[instrument(skip(self))]
    pub async fn manifest(&self, session_id: &str) -> Result<String> {
        let url = format!(
            "{}/auth/index.m3u8",
            self.endpoints.manifests.trim_end_matches('/')
        );
        let request = self
            .gateway
            .request(Method::GET, &url)
            .query(&[("session_id", session_id)]);
        self.gateway.text(request).await
    }

    /// Every rendition a video can be played in.
    #[instrument(skip(self))]
    pub async fn stream_variants(&self, content_code: &str) -> Result<Vec<StreamVariant>> {
        let session_id = self.session_id(content_code).await?;
        let manifest = self.manifest(&session_id).await?;
        let variants = parse_variants(&manifest);
        tracing::debug!(count = variants.len(), "parsed stream variants");
        Ok(variants)
    }

    /// The highest-bandwidth rendition of a video.
    #[instrument(skip(self))]
    pub async fn best_stream(&self, content_code: &str) -> Result<StreamVariant> {
        let variants = self.stream_variants(content_code).await?;
        best_quality(&variants)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("stream variant for {content_code}")))
    }

    /// The token the comment service wants for one video's comments.
    #[instrument(skip(self))]
    pub async fn comments_user_token(&self, content_code: &str) -> Result<String> {
        let request = self
            .api_request(
                Method::GET,
                &format!("/video_pages/{content_code}/comments_user_token"),
            )
            .await;
        let response: Envelope<CommentsUserTokenData> = self.gateway.json(request).await?;
        Ok(response.data.access_token)
    }

    /// Up to [`COMMENT_WINDOW_LIMIT`] comments at or after `oldest_playback_time`,
    /// ascending.
    pub async fn comment_window(
        &self,
        user_token: &str,
        group_id: &str,
        oldest_playback_time: u64,
    ) -> Result<Vec<CommentRecord>> {
        let url = format!(
            "{}/messages.history",
            self.endpoints.comments.trim_end_matches('/')
        );
        let oldest = oldest_playback_time.to_string();
        let limit = COMMENT_WINDOW_LIMIT.to_string();
        let request = self
            .gateway
            .request(Method::POST, &url)
            .query(&[
                ("oldest_playback_time", oldest.as_str()),
                ("sort_direction", "asc"),
                ("limit", limit.as_str()),
                ("inclusive", "true"),
            ])
            .json(&CommentHistoryRequest {
                token: user_token,
                group_id,
            });
        self.gateway.json(request).await
    }

    /// Every comment in a comment group, ascending by playback time.
    #[instrument(skip(self, user_token))]
    pub async fn comment_history(
        &self,
        user_token: &str,
        group_id: &str,
    ) -> Result<Vec<CommentRecord>> {
        collect_comments(|watermark| self.comment_window(user_token, group_id, watermark)).await
    }

    /// Every comment on a video, ascending by playback time.
    ///
    /// Fails with [`Error::NotFound`] if the video has no comment group.
    #[instrument(skip(self))]
    pub async fn all_comments(&self, site_id: u64, content_code: &str) -> Result<Vec<CommentRecord>> {
        let details = self.video_details(site_id, content_code).await?;
        let Some(group_id) = details.comment_group_id() else {
            return Err(Error::not_found(format!("comment group of {content_code}")));
        };

        let user_token = self.comments_user_token(content_code).await?;
        let comments = self.comment_history(&user_token, group_id).await?;

        tracing::info!(
            content_code,
            count = comments.len(),
            advertised = details.video_aggregate_info.as_ref().map(|i| i.number_of_comments),
            "collected comments"
        );
        Ok(comments)
    }
}
