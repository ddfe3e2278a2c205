//! Error type shared by every part of the fanclub client.

use http::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while talking to the fanclub backend.
///
/// Variants are split by what a caller can do about them: transport and
/// status failures are worth reporting and moving on, [`Error::NotFound`]
/// means the item simply has nothing to offer (no stream variant, no comment
/// group, ...), and [`Error::Page`] pins a listing failure to the page that
/// broke it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DNS, connect, TLS or body-read failure.
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} {status_text} ({url})")]
    Status {
        status: u16,
        status_text: String,
        url: String,
    },

    /// The response body did not have the expected shape.
    #[error("decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Logical absence of something the caller asked for.
    #[error("{0} not found")]
    NotFound(String),

    #[error("refresh access token")]
    TokenRefresh(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A paged listing failed part-way through.
    #[error("fetch page {page}")]
    Page {
        page: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::Status {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            url: url.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status behind this error, looking through page wrappers.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Page { source, .. } => source.http_status(),
            _ => None,
        }
    }

    /// `true` when the server refused because the content is reserved for
    /// subscribers (HTTP 403).
    pub fn is_subscriber_only(&self) -> bool {
        self.http_status() == Some(StatusCode::FORBIDDEN.as_u16())
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Page { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
