//! Client for the Nicochannel+ family of fanclub platforms.
//!
//! [`FanclubClient`] is the entry point. It resolves the platform's API base,
//! keeps one shared access token fresh, walks paged catalogs, picks the best
//! stream rendition of a video and reconstructs a video's comment history.

pub mod api;
pub mod config;
pub mod error;
pub mod manifest;
pub mod oauth;
pub mod platform;
pub mod token;

pub use api::{FanclubClient, HttpGateway};
pub use config::Config;
pub use error::{Error, Result};
pub use manifest::{StreamVariant, best_quality, parse_variants};
pub use oauth::{OAuthRefresher, RefreshedToken, TokenRefresher};
pub use platform::{Platform, PlatformKind};
pub use token::TokenCache;
