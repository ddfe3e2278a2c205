//! Credentials and platform selection.

use crate::error::{Error, Result};
use crate::platform::{Platform, PlatformKind};

pub const CLIENT_ID_VAR: &str = "NICO_CLIENT_ID";
pub const REFRESH_TOKEN_VAR: &str = "NICO_REFRESH_TOKEN";
pub const PLATFORM_VAR: &str = "NCPD_PLATFORM";

/// Everything needed to build a [`crate::FanclubClient`].
#[derive(Clone)]
pub struct Config {
    pub platform: Platform,
    /// OAuth client id of the fanclub web front.
    pub client_id: String,
    /// Refresh token used for the very first refresh. Later refreshes use the
    /// rotated token handed out by the auth server.
    pub bootstrap_refresh_token: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("platform", &self.platform.name)
            .field("client_id", &self.client_id)
            .field("bootstrap_refresh_token", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn new(
        platform: Platform,
        client_id: impl Into<String>,
        bootstrap_refresh_token: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            platform,
            client_id: client_id.into(),
            bootstrap_refresh_token: bootstrap_refresh_token.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads `NICO_CLIENT_ID`, `NICO_REFRESH_TOKEN` and the optional
    /// `NCPD_PLATFORM`, after loading a `.env` file from the working
    /// directory if one exists.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|_| None)
    }

    /// Like [`Config::from_env`], but `overrides` is consulted first for each
    /// variable, e.g. with values given on the command line.
    pub fn from_env_with(overrides: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env file loaded, using process environment");
        }
        Self::from_lookup(|key| overrides(key).or_else(|| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let platform = match lookup(PLATFORM_VAR).filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<PlatformKind>().map_err(Error::Config)?,
            None => PlatformKind::default(),
        };
        Self::new(
            platform.platform(),
            lookup(CLIENT_ID_VAR).unwrap_or_default(),
            lookup(REFRESH_TOKEN_VAR).unwrap_or_default(),
        )
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::Config(format!("{CLIENT_ID_VAR} is not set")));
        }
        if self.bootstrap_refresh_token.is_empty() {
            return Err(Error::Config(format!("{REFRESH_TOKEN_VAR} is not set")));
        }
        Ok(())
    }
}
