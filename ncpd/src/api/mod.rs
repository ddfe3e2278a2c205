//! Fanclub platform API: wire types, paging, and the [`FanclubClient`] that
//! ties them to an HTTP gateway and a token cache.

pub mod articles;
pub mod channels;
pub mod client;
pub mod comments;
pub mod gateway;
pub mod types;
pub mod videos;

pub use articles::Article;
pub use channels::{ContentProvider, FanclubSite, FanclubSiteInfo};
pub use client::{Endpoints, FanclubClient};
pub use comments::{CommentAggregator, CommentRecord, collect_comments};
pub use gateway::HttpGateway;
pub use types::{PagedList, PagedStream, collect_pages};
pub use videos::VideoDetails;
