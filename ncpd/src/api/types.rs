//! Shared list types and the page-walking stream used by every catalog listing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::{Stream, StreamExt};

type OneFuturePage<'a, F, T> = Pin<Box<dyn Future<Output = (F, Result<VecDeque<T>>)> + 'a + Send>>;

/// A stream over a server-side collection that is paged by index.
///
/// Pages are requested one at a time, starting at page 1, and only once the
/// items of the previous page have been consumed. The walk ends after a page
/// that is empty or shorter than `per_page`, so a collection whose size is not
/// a multiple of `per_page` costs no trailing request. A failed page ends the
/// stream with an [`Error::Page`] naming the page.
pub struct PagedStream<'a, T, F> {
    /// Current batch of items from the most recent page
    current_items: VecDeque<T>,
    /// Future representing the currently pending page request, if any
    pending_request: Option<OneFuturePage<'a, F, T>>,
    /// Whether the last page has been seen
    is_done: bool,
    per_page: NonZeroUsize,
    /// Index of the page the pending request is for
    page: u32,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// Walks the pages produced by `fetcher`, which is handed 1-based page
    /// indices.
    pub fn new<Fut>(per_page: NonZeroUsize, fetcher: F) -> Self
    where
        F: Fn(u32) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = Result<VecDeque<T>>> + Send + 'a,
    {
        Self {
            pending_request: Some(Self::request(fetcher, 1)),
            current_items: VecDeque::new(),
            is_done: false,
            per_page,
            page: 1,
        }
    }

    fn request<Fut>(fetcher: F, page: u32) -> OneFuturePage<'a, F, T>
    where
        F: Fn(u32) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = Result<VecDeque<T>>> + Send + 'a,
    {
        Box::pin(async move {
            let results = fetcher(page).await;
            (fetcher, results)
        })
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(u32) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = Result<VecDeque<T>>> + Send + 'a,
{
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if self.is_done {
                return Poll::Ready(None);
            }

            let Some(pending) = self.pending_request.as_mut() else {
                self.is_done = true;
                return Poll::Ready(None);
            };

            let (fetcher, result) = match pending.as_mut().poll(cx) {
                Poll::Ready(done) => done,
                Poll::Pending => return Poll::Pending,
            };
            self.pending_request = None;
            let page = self.page;

            let items = match result {
                Ok(items) => items,
                Err(e) => {
                    self.is_done = true;
                    return Poll::Ready(Some(Err(Error::Page {
                        page,
                        source: Box::new(e),
                    })));
                }
            };

            let returned = items.len();
            tracing::debug!(page, returned, per_page = self.per_page.get(), "fetched page");

            if returned < self.per_page.get() {
                // an empty or short page is the tail of the collection
                self.is_done = true;
            } else {
                self.page += 1;
                self.pending_request = Some(Self::request(fetcher, page + 1));
            }
            self.current_items.extend(items);
        }
    }
}

/// Drains a paged collection into one sequence in server order.
///
/// Nothing is returned if any page fails; a truncated catalog is never handed
/// out as if it were complete.
pub async fn collect_pages<'a, T, F, Fut>(per_page: NonZeroUsize, fetcher: F) -> Result<Vec<T>>
where
    T: Unpin,
    F: Fn(u32) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = Result<VecDeque<T>>> + Send + 'a,
{
    let mut pages = PagedStream::new(per_page, fetcher);
    let mut all = Vec::new();
    while let Some(item) = pages.next().await {
        all.push(item?);
    }
    Ok(all)
}

/// One page of a catalog listing: `{ "list": [...], "total": N }`.
///
/// `total` is what the server claims, and is only informational.
#[derive(Debug, Serialize, Deserialize)]
pub struct PagedList<T> {
    pub list: VecDeque<T>,
    #[serde(default)]
    pub total: u64,
}

/// The `{ "data": ... }` envelope wrapped around every fanclub API response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}
