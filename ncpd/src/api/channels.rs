//! Channel (content provider) types.

use serde::{Deserialize, Serialize};

/// A channel on the platform, identified for API purposes by its fanclub site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentProvider {
    pub id: u64,
    pub domain: String,
    pub fanclub_site: FanclubSite,
}

impl ContentProvider {
    /// The id every per-channel endpoint is keyed by.
    pub fn site_id(&self) -> u64 {
        self.fanclub_site.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanclubSite {
    pub id: u64,
}

/// Public profile of a fanclub site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanclubSiteInfo {
    pub fanclub_site_name: String,
    pub description: String,
    pub favicon_url: String,
    /// Also the fallback thumbnail for the site's videos and articles
    pub thumbnail_image_url: String,
}

/// `GET /fanclub_sites/{site}/page_base_info`
#[derive(Debug, Deserialize)]
pub(crate) struct PageBaseInfoData {
    pub fanclub_site: Option<FanclubSiteInfo>,
}

/// `GET /content_providers/channels`
#[derive(Debug, Deserialize)]
pub(crate) struct ChannelsData {
    #[serde(default)]
    pub content_providers: Vec<ContentProvider>,
}

/// `GET /content_providers/channel_domain`
#[derive(Debug, Deserialize)]
pub(crate) struct ChannelDomainData {
    pub content_providers: Option<ContentProvider>,
}
