//! Video catalog and video page types.

use crate::api::types::PagedList;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Videos requested per catalog page.
pub const VIDEOS_PER_PAGE: NonZeroUsize = NonZeroUsize::new(10).unwrap();

/// `GET /v2/fanclub_sites/{site}/video_pages`
#[derive(Debug, Deserialize)]
pub(crate) struct VideoPagesData {
    pub video_pages: PagedList<VideoDetails>,
}

/// `GET /video_pages/{code}`
#[derive(Debug, Deserialize)]
pub(crate) struct VideoPageData {
    pub video_page: Option<VideoDetails>,
}

/// `POST /video_pages/{code}/session_ids`
#[derive(Debug, Deserialize)]
pub(crate) struct SessionIdData {
    pub session_id: String,
}

/// A video page.
///
/// Catalog listings return these only partially filled in (no comment
/// setting, no stream); [`crate::FanclubClient::video_details`] returns the
/// whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoDetails {
    pub content_code: String,
    pub title: String,
    pub description: String,
    pub display_date: String,
    pub released_at: String,
    pub thumbnail_url: String,
    pub live_started_at: Option<String>,
    pub live_finished_at: Option<String>,
    pub live_scheduled_start_at: Option<String>,
    pub live_scheduled_end_at: Option<String>,
    pub start_with_free_part_flg: bool,
    pub active_video_filename: Option<ActiveVideoFilename>,
    pub video_aggregate_info: Option<VideoAggregateInfo>,
    pub video_comment_setting: Option<VideoCommentSetting>,
    pub video_free_periods: Vec<VideoFreePeriod>,
    pub video_questionnaires: Vec<VideoQuestionnaire>,
    pub video_stream: Option<VideoStream>,
}

impl VideoDetails {
    /// The group that holds this video's comments, if commenting is set up.
    pub fn comment_group_id(&self) -> Option<&str> {
        self.video_comment_setting
            .as_ref()
            .map(|s| s.comment_group_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Whether this video is the archive of a live broadcast.
    pub fn is_live_archive(&self) -> bool {
        let archived = self
            .active_video_filename
            .as_ref()
            .and_then(|f| f.video_filename_type.as_ref())
            .is_some_and(|t| t.value == "archived");
        archived || self.live_started_at.is_some()
    }

    /// Video length in seconds, when known.
    pub fn length(&self) -> Option<u64> {
        self.active_video_filename.as_ref().map(|f| f.length)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveVideoFilename {
    pub id: u64,
    pub length: u64,
    pub video_filename_type: Option<VideoFilenameType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoFilenameType {
    pub id: u64,
    pub value: String,
}

/// View and comment counters.
///
/// `number_of_comments` is approximate and does not match what the comment
/// history actually returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoAggregateInfo {
    pub id: u64,
    pub number_of_comments: u64,
    pub total_views: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoCommentSetting {
    pub comment_group_id: String,
}

/// A window during which a subscriber-only video can be watched for free.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoFreePeriod {
    pub id: u64,
    pub elapsed_started_time: u64,
    pub elapsed_ended_time: u64,
    pub started_at: String,
    pub end_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoQuestionnaire {
    pub id: u64,
    pub question: String,
    pub elapsed_show_time: u64,
    pub elapsed_deadline_time: u64,
    pub elapsed_result_time: u64,
    pub elapsed_hide_result_time: u64,
    pub video_questionnaire_options: Vec<VideoQuestionnaireOption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoQuestionnaireOption {
    pub id: u64,
    pub text: String,
    pub video_questionnaire_result: VideoQuestionnaireResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoQuestionnaireResult {
    pub percentage: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoStream {
    pub authenticated_url: String,
}
