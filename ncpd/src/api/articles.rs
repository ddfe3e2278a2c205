//! News article types.

use crate::api::types::PagedList;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Articles requested per catalog page.
pub const ARTICLES_PER_PAGE: NonZeroUsize = NonZeroUsize::new(24).unwrap();

/// A news article.
///
/// In catalog listings `contents` is an excerpt. The full text comes from
/// [`crate::FanclubClient::article`], and is empty there too when the article
/// is subscriber-only and the account may not read it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub id: u64,
    pub article_code: String,
    pub article_title: String,
    pub contents: String,
    pub publish_at: String,
    pub thumbnail_url: String,
}

impl Article {
    pub fn has_contents(&self) -> bool {
        !self.contents.trim().is_empty()
    }
}

/// `GET /fanclub_sites/{site}/article_themes/news/articles`
#[derive(Debug, Deserialize)]
pub(crate) struct ArticlesData {
    pub article_theme: ArticleTheme,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticleTheme {
    pub articles: PagedList<Article>,
}

/// `GET /fanclub_sites/{site}/article_themes/news/articles/{code}`
#[derive(Debug, Deserialize)]
pub(crate) struct ArticleData {
    pub article: ArticleHolder,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticleHolder {
    pub article: Option<Article>,
}
