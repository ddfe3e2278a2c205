//! The fanclub sites this client knows how to talk to.

use serde::Deserialize;

/// A fanclub platform: where its web front lives and where its API lives by
/// default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub name: &'static str,
    pub domain: &'static str,
    pub default_api_base: &'static str,
}

pub const NICOCHANNEL: Platform = Platform {
    name: "Nicochannel+",
    domain: "nicochannel.jp",
    default_api_base: "https://api.nicochannel.jp/fc",
};

pub const QLOVER: Platform = Platform {
    name: "QloveR",
    domain: "qlover.jp",
    default_api_base: "https://api.qlover.jp/fc",
};

/// Platforms selectable from configuration or the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlatformKind {
    #[default]
    Nicochannel,
    Qlover,
}

impl PlatformKind {
    pub fn platform(self) -> Platform {
        match self {
            Self::Nicochannel => NICOCHANNEL,
            Self::Qlover => QLOVER,
        }
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nicochannel" | "nicochannel.jp" => Ok(Self::Nicochannel),
            "qlover" | "qlover.jp" => Ok(Self::Qlover),
            other => Err(format!("unknown platform `{other}`")),
        }
    }
}

impl Platform {
    /// The published site-settings document that names the live API base.
    pub fn settings_url(&self) -> String {
        format!("https://{}/site/settings.json", self.domain)
    }

    pub fn token_url(&self) -> String {
        format!("https://auth.{}/oauth/token", self.domain)
    }

    pub fn redirect_url(&self) -> String {
        format!("https://{}/login/login-redirect", self.domain)
    }

    pub fn origin(&self) -> String {
        format!("https://{}", self.domain)
    }
}

/// `GET https://{domain}/site/settings.json`
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub platform_id: Option<serde_json::Value>,
    #[serde(default)]
    pub fanclub_site_id: Option<serde_json::Value>,
    #[serde(default)]
    pub fanclub_group_id: Option<serde_json::Value>,
    #[serde(default)]
    pub api_base_url: String,
}
