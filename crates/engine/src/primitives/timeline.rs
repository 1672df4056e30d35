//! TimelineReader: paginated, newest-first timeline reads
//!
//! A page read is two round trips: one range read of ids, then one batched
//! `mget` of their payloads. Ids whose payload is missing are skipped, so a
//! page may hold fewer activities than requested. The reader keeps no cursor
//! state; a caller restarts from any offset with `next_offset`.

use crate::marketplace::MarketConfig;
use oddjobz_core::{keys, Activity, ActivityId, KeyValueStore, MarketResult, StoreValue, UserId};
use std::sync::Arc;

/// One page of a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePage {
    /// Activities in timeline order (descending id)
    pub activities: Vec<Activity>,
    /// Offset to pass for the following page
    pub next_offset: usize,
    /// No entries exist past this page
    pub exhausted: bool,
}

impl TimelinePage {
    fn empty(offset: usize, exhausted: bool) -> Self {
        Self {
            activities: Vec::new(),
            next_offset: offset,
            exhausted,
        }
    }
}

/// Paginated timeline reads
#[derive(Clone)]
pub struct TimelineReader {
    store: Arc<dyn KeyValueStore>,
    default_page_size: usize,
    max_page_size: usize,
}

impl TimelineReader {
    /// Create a reader with the default `[reader]` settings
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::from_config(store, &MarketConfig::default())
    }

    /// Create a reader using the `[reader]` settings
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &MarketConfig) -> Self {
        Self {
            store,
            default_page_size: config.reader.default_page_size,
            max_page_size: config.reader.max_page_size.max(1),
        }
    }

    /// Page size used by [`first_page`](Self::first_page)
    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Read `limit` entries of `user`'s timeline starting at `offset`
    ///
    /// `limit` is clamped to the configured maximum; `limit == 0` returns an
    /// empty page.
    pub fn page(
        &self,
        user: &UserId,
        offset: usize,
        limit: usize,
    ) -> MarketResult<TimelinePage> {
        self.read(&keys::timeline(user), offset, limit)
    }

    /// Newest page of `user`'s timeline at the default page size
    pub fn first_page(&self, user: &UserId) -> MarketResult<TimelinePage> {
        self.page(user, 0, self.default_page_size)
    }

    /// Read a page of the global timeline
    pub fn global_page(&self, offset: usize, limit: usize) -> MarketResult<TimelinePage> {
        self.read(keys::GLOBAL_TIMELINE, offset, limit)
    }

    /// Lazily walk `user`'s whole timeline page by page
    ///
    /// The iterator ends after the exhausted page or the first error.
    pub fn pages(&self, user: &UserId, page_size: usize) -> Pages {
        Pages {
            reader: self.clone(),
            key: keys::timeline(user),
            offset: 0,
            page_size,
            done: false,
        }
    }

    fn read(&self, key: &str, offset: usize, limit: usize) -> MarketResult<TimelinePage> {
        let limit = limit.min(self.max_page_size);
        if limit == 0 {
            let exhausted = offset >= self.store.llen(key)?;
            return Ok(TimelinePage::empty(offset, exhausted));
        }

        let start = match i64::try_from(offset) {
            Ok(start) => start,
            Err(_) => return Ok(TimelinePage::empty(offset, true)),
        };
        // One extra id tells whether anything follows this page
        let span = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut ids = self.store.lrange(key, start, start.saturating_add(span))?;
        let exhausted = ids.len() <= limit;
        ids.truncate(limit);
        if ids.is_empty() {
            return Ok(TimelinePage::empty(offset, true));
        }

        let payload_keys: Vec<String> = ids
            .iter()
            .map(|raw| raw.parse::<ActivityId>().map(keys::activity))
            .collect::<MarketResult<_>>()?;
        let payloads = self.store.mget(&payload_keys)?;

        let mut activities = Vec::with_capacity(ids.len());
        for (payload_key, payload) in payload_keys.iter().zip(payloads) {
            match payload {
                Some(StoreValue::Str(raw)) => activities.push(Activity::decode(&raw)?),
                Some(other) => return Err(other.wrong_type(payload_key, "string")),
                None => tracing::debug!(
                    target: "oddjobz::reader",
                    timeline = key,
                    payload_key = %payload_key,
                    "MissingPayload: skipping timeline entry"
                ),
            }
        }

        Ok(TimelinePage {
            activities,
            next_offset: offset.saturating_add(ids.len()),
            exhausted,
        })
    }
}

/// Iterator over the pages of one timeline
pub struct Pages {
    reader: TimelineReader,
    key: String,
    offset: usize,
    page_size: usize,
    done: bool,
}

impl Iterator for Pages {
    type Item = MarketResult<TimelinePage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.page_size == 0 {
            return None;
        }
        match self.reader.read(&self.key, self.offset, self.page_size) {
            Ok(page) => {
                // A page that does not advance would repeat forever
                self.done = page.exhausted || page.next_offset == self.offset;
                self.offset = page.next_offset;
                Some(Ok(page))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
