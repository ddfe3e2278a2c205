//! Comment (danmaku) records and reconstruction of a video's full comment
//! history.
//!
//! The history endpoint has no page cursor. It answers "up to `limit`
//! comments whose playback time is at or after `oldest_playback_time`", in
//! ascending playback time. Walking it means feeding the playback time of the
//! last comment received back in as the next lower bound. Because the bound is
//! inclusive, consecutive windows overlap on that second, and when the final
//! comments all share one second the same window comes back forever. The
//! [`CommentAggregator`] deduplicates by id and stops once a window brings
//! nothing new without moving the bound.

use crate::error::Result;
use indexmap::IndexMap;
use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;

/// Comments requested per history window.
pub const COMMENT_WINDOW_LIMIT: usize = 120;

/// One comment as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub group_id: String,
    /// Seconds into the video at which the comment is shown
    pub playback_time: u64,
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nickname: String,
    pub sender_id: String,
    /// Pinned comment
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: bool,
    /// How long a pinned comment stays up
    #[serde(default)]
    pub end_time_in_seconds: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mentions: Vec<serde_json::Value>,
    pub created_at: Timestamp,
    pub sent_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Reads an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `GET /video_pages/{code}/comments_user_token`
#[derive(Debug, Deserialize)]
pub(crate) struct CommentsUserTokenData {
    pub access_token: String,
}

/// `POST messages.history` body
#[derive(Debug, Serialize)]
pub(crate) struct CommentHistoryRequest<'a> {
    pub token: &'a str,
    pub group_id: &'a str,
}

/// Accumulates overlapping history windows into one duplicate-free set.
#[derive(Debug, Default)]
pub struct CommentAggregator {
    seen: IndexMap<String, CommentRecord>,
    watermark: u64,
    windows: usize,
}

impl CommentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower playback-time bound for the next window.
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Number of distinct comments seen so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Absorbs the window fetched at the current watermark.
    ///
    /// Returns `true` if another window should be fetched.
    pub fn ingest(&mut self, window: Vec<CommentRecord>) -> bool {
        self.windows += 1;
        let Some(next_watermark) = window.last().map(|c| c.playback_time) else {
            return false;
        };

        let received = window.len();
        let mut added = 0;
        for comment in window {
            if self.seen.insert(comment.id.clone(), comment).is_none() {
                added += 1;
            }
        }

        tracing::debug!(
            window = self.windows,
            watermark = self.watermark,
            received,
            added,
            total = self.seen.len(),
            "absorbed comment window"
        );

        if next_watermark == self.watermark && added == 0 {
            return false;
        }
        self.watermark = next_watermark;
        true
    }

    /// All comments, ascending by playback time. Comments sharing a second
    /// keep the order in which they were first received.
    pub fn into_sorted(self) -> Vec<CommentRecord> {
        let mut comments: Vec<_> = self.seen.into_values().collect();
        comments.sort_by_key(|c| c.playback_time);
        comments
    }
}

/// Walks the comment history by repeatedly calling `fetch_window` with the
/// current watermark until the history is exhausted.
///
/// A failing window aborts the whole walk.
pub async fn collect_comments<F, Fut>(mut fetch_window: F) -> Result<Vec<CommentRecord>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Vec<CommentRecord>>>,
{
    let mut aggregator = CommentAggregator::new();
    loop {
        let window = fetch_window(aggregator.watermark()).await?;
        if !aggregator.ingest(window) {
            break;
        }
    }
    tracing::debug!(
        windows = aggregator.windows,
        comments = aggregator.len(),
        "comment history complete"
    );
    Ok(aggregator.into_sorted())
}
