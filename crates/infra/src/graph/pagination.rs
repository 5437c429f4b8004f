//! Cursor pagination over Graph API listings
//!
//! Listing responses carry a `paging` object whose shape is not consistent:
//! most endpoints return an opaque `cursors.after` token, some omit the
//! cursor but still return a usable absolute `next` URL, and some return
//! neither. [`PageCursor`] makes the three continuation modes an explicit
//! tagged variant so each path is independently testable, and [`PageStream`]
//! walks them lazily, one page per call, every fetch going through the full
//! request pipeline (admission, classification, retry).
//!
//! A repeat-detection window guards against malformed continuation chains
//! that cycle back to an earlier cursor: rather than looping forever, the
//! stream terminates early.

use std::collections::VecDeque;

use metaads_domain::{PaginationConfig, Result};
use serde_json::Value;
use tracing::{debug, warn};

use super::client::GraphClient;
use super::descriptor::RequestDescriptor;

/// Continuation state after a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Opaque `after` token; re-issue the original request with it.
    Cursor(String),
    /// Absolute next-page URL returned without a cursor; follow it directly.
    NextUrl(String),
    /// No continuation: the sequence ends after the current page.
    Exhausted,
}

impl PageCursor {
    /// Extract the continuation from a response `paging` object.
    ///
    /// The cursor token takes precedence when both it and a `next` URL are
    /// present.
    pub fn from_paging(paging: Option<&Value>) -> Self {
        let Some(paging) = paging else {
            return PageCursor::Exhausted;
        };

        if let Some(after) = paging
            .get("cursors")
            .and_then(|c| c.get("after"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return PageCursor::Cursor(after.to_string());
        }

        if let Some(next) = paging.get("next").and_then(Value::as_str).filter(|s| !s.is_empty())
        {
            return PageCursor::NextUrl(next.to_string());
        }

        PageCursor::Exhausted
    }

    /// Whether the sequence is finished.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PageCursor::Exhausted)
    }

    /// The value the cycle guard tracks for this continuation.
    fn continuation_key(&self) -> Option<&str> {
        match self {
            PageCursor::Cursor(token) => Some(token),
            PageCursor::NextUrl(url) => Some(url),
            PageCursor::Exhausted => None,
        }
    }
}

/// One page of a listing: the raw records plus the continuation.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub items: Vec<Value>,
    pub cursor: PageCursor,
}

/// Lazy, finite, forward-only sequence of listing pages.
///
/// Restartable only by building a new stream from the original descriptor;
/// there is no way to seek backwards. Pages are fetched one at a time; a
/// continuation is only known once the prior page has returned.
pub struct PageStream<'a> {
    client: &'a GraphClient,
    descriptor: RequestDescriptor,
    /// `None` until the first fetch; then the pending continuation.
    pending: Option<PageCursor>,
    recent: VecDeque<String>,
    guard_window: usize,
    pages_fetched: usize,
    done: bool,
}

impl<'a> PageStream<'a> {
    pub(crate) fn new(
        client: &'a GraphClient,
        descriptor: RequestDescriptor,
        config: &PaginationConfig,
    ) -> Self {
        Self {
            client,
            descriptor,
            pending: None,
            recent: VecDeque::with_capacity(config.loop_guard_window),
            guard_window: config.loop_guard_window,
            pages_fetched: 0,
            done: false,
        }
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch the next page, or `None` once the sequence is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<PageResult>> {
        if self.done {
            return Ok(None);
        }

        let body = match self.pending.take() {
            None => self.client.execute(&self.descriptor).await?,
            Some(PageCursor::Cursor(token)) => {
                let follow = self.descriptor.clone().param("after", token);
                self.client.execute(&follow).await?
            }
            Some(PageCursor::NextUrl(url)) => {
                self.client
                    .follow_url(&url, self.descriptor.account_id.as_deref())
                    .await?
            }
            Some(PageCursor::Exhausted) => {
                self.done = true;
                return Ok(None);
            }
        };
        self.pages_fetched += 1;

        let items = body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut cursor = PageCursor::from_paging(body.get("paging"));
        if let Some(key) = cursor.continuation_key() {
            if self.recent.iter().any(|seen| seen == key) {
                warn!(
                    endpoint = %self.descriptor.endpoint,
                    "continuation value repeated, terminating pagination early"
                );
                cursor = PageCursor::Exhausted;
            } else {
                if self.recent.len() == self.guard_window {
                    self.recent.pop_front();
                }
                self.recent.push_back(key.to_string());
            }
        }

        if cursor.is_exhausted() {
            self.done = true;
        } else {
            self.pending = Some(cursor.clone());
        }

        debug!(
            endpoint = %self.descriptor.endpoint,
            page = self.pages_fetched,
            items = items.len(),
            exhausted = self.done,
            "fetched listing page"
        );

        Ok(Some(PageResult { items, cursor }))
    }
}
