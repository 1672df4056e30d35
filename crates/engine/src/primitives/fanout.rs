//! TimelineFanoutEngine: write-time propagation of activities
//!
//! ## Design
//!
//! Publishing happens in two phases:
//!
//! 1. **Author script** (one atomic script keyed by the author): allocate the
//!    id from `activity:next_id`, store the payload at `activity:{id}`,
//!    insert the id into the global timeline and the author's timeline, and
//!    snapshot the author's followers. Nobody can observe the counter
//!    advanced with the payload missing; if any step fails the whole script
//!    rolls back and no timeline is touched.
//!
//! 2. **Fan-out** over that snapshot in batches of `batch_size`, one script
//!    per batch. A follower whose push fails is reported in the
//!    [`PublishReceipt`]; the activity stays published. No lock spans all
//!    follower timelines, so a follow racing with fan-out may or may not
//!    receive the activity.
//!
//! ## Timeline order
//!
//! Timelines hold ids in descending order. An insert places the id ahead of
//! the first smaller entry (the head, unless fan-outs interleave) and skips
//! it if already present, so re-running fan-out never duplicates an entry.

use crate::marketplace::MarketConfig;
use chrono::Utc;
use oddjobz_core::{
    keys, Activity, ActivityId, KeyValueStore, MarketError, MarketResult, NewActivity, Script,
    ScriptContext, ScriptExt, StoreValue, UserId,
};
use std::sync::Arc;

/// Default number of follower timelines updated per script
pub const DEFAULT_FANOUT_BATCH: usize = 64;

/// Insert `id` into the timeline at `key`, keeping descending order
///
/// Returns `false` if the id was already present. Applies the retention cap
/// when one is set.
pub(crate) fn insert_descending(
    ctx: &mut dyn ScriptContext,
    key: &str,
    id: ActivityId,
    max_len: Option<usize>,
) -> MarketResult<bool> {
    let Some(index) = descending_slot(ctx, key, id)? else {
        return Ok(false);
    };
    let len = ctx.linsert_at(key, index, id.to_string())?;
    apply_cap(ctx, key, len, max_len)?;
    Ok(true)
}

/// Index where `id` belongs in the descending timeline at `key`
///
/// `None` if the id is already present. Read-only.
fn descending_slot(
    ctx: &mut dyn ScriptContext,
    key: &str,
    id: ActivityId,
) -> MarketResult<Option<usize>> {
    let mut index = 0usize;
    while let Some(raw) = ctx.lindex(key, index as i64)? {
        let existing: ActivityId = raw.parse()?;
        if existing == id {
            return Ok(None);
        }
        if existing < id {
            break;
        }
        index += 1;
    }
    Ok(Some(index))
}

fn apply_cap(
    ctx: &mut dyn ScriptContext,
    key: &str,
    len: usize,
    max_len: Option<usize>,
) -> MarketResult<()> {
    if let Some(max) = max_len {
        if len > max {
            let stop = i64::try_from(max).unwrap_or(i64::MAX) - 1;
            ctx.ltrim(key, 0, stop)?;
        }
    }
    Ok(())
}

/// Outcome of a publish or a resumed fan-out
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    /// Id of the published activity
    pub activity_id: ActivityId,
    /// Follower timelines that now contain the activity
    pub delivered: usize,
    /// Followers whose timeline push failed
    pub failed: Vec<UserId>,
}

impl PublishReceipt {
    /// Whether every follower in the snapshot received the activity
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ========== Scripts ==========

struct PublishScript<'a> {
    activity: &'a NewActivity,
    created_at: chrono::DateTime<Utc>,
    max_len: Option<usize>,
}

impl Script for PublishScript<'_> {
    type Output = (ActivityId, Vec<String>);

    fn name(&self) -> &'static str {
        "publish"
    }

    fn keys(&self) -> Vec<String> {
        let author = &self.activity.author;
        vec![
            keys::ACTIVITY_COUNTER.to_string(),
            keys::GLOBAL_TIMELINE.to_string(),
            keys::timeline(author),
            keys::followers(author),
        ]
    }

    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<Self::Output> {
        let next = ctx.incr_by(keys::ACTIVITY_COUNTER, 1)?;
        let id = ActivityId::new(u64::try_from(next).map_err(|_| {
            MarketError::invalid_input(format!("activity counter is negative: {}", next))
        })?);

        // Payload is encoded once here and stored verbatim
        let activity = self.activity.clone().into_activity(id, self.created_at);
        ctx.set(&keys::activity(id), StoreValue::Str(activity.encode()?))?;

        insert_descending(ctx, keys::GLOBAL_TIMELINE, id, self.max_len)?;
        insert_descending(ctx, &keys::timeline(&self.activity.author), id, self.max_len)?;

        let followers = ctx.smembers(&keys::followers(&self.activity.author))?;
        Ok((id, followers))
    }
}

struct FanoutBatchScript<'a> {
    id: ActivityId,
    followers: &'a [UserId],
    max_len: Option<usize>,
}

impl Script for FanoutBatchScript<'_> {
    /// Followers whose push failed, with the cause
    type Output = Vec<(UserId, MarketError)>;

    fn name(&self) -> &'static str {
        "fanout_batch"
    }

    fn keys(&self) -> Vec<String> {
        self.followers.iter().map(keys::timeline).collect()
    }

    /// A follower whose insert fails is reported and the batch goes on. A
    /// failed trim after a successful insert aborts the batch, so the whole
    /// batch rolls back instead of leaving an over-cap timeline.
    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<Self::Output> {
        let mut failed = Vec::new();
        for follower in self.followers {
            let key = keys::timeline(follower);
            let inserted = match descending_slot(ctx, &key, self.id) {
                Ok(Some(index)) => ctx.linsert_at(&key, index, self.id.to_string()).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            };
            match inserted {
                Ok(Some(len)) => apply_cap(ctx, &key, len, self.max_len)?,
                Ok(None) => {}
                Err(e) => failed.push((follower.clone(), e)),
            }
        }
        Ok(failed)
    }
}

// ========== Engine ==========

/// Publishes activities and fans them out to follower timelines
///
/// # Example
///
/// ```ignore
/// let engine = TimelineFanoutEngine::new(store);
/// let receipt = engine.publish(NewActivity::review(bob, json!("great")))?;
/// if !receipt.is_complete() {
///     engine.resume_fanout(receipt.activity_id, &receipt.failed)?;
/// }
/// ```
#[derive(Clone)]
pub struct TimelineFanoutEngine {
    store: Arc<dyn KeyValueStore>,
    batch_size: usize,
    max_len: Option<usize>,
}

impl TimelineFanoutEngine {
    /// Create an engine with default batching and no retention cap
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_FANOUT_BATCH,
            max_len: None,
        }
    }

    /// Create an engine using the `[fanout]` and `[timeline]` settings
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &MarketConfig) -> Self {
        Self::new(store)
            .with_batch_size(config.fanout.batch_size)
            .with_max_len(config.timeline.max_len)
    }

    /// Follower timelines per fan-out script (at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Retention cap applied to every timeline insert
    pub fn with_max_len(mut self, max_len: Option<usize>) -> Self {
        self.max_len = max_len.filter(|&n| n > 0);
        self
    }

    /// Publish an activity and fan it out to the author's followers
    ///
    /// # Errors
    ///
    /// Any store error from the author script. In that case nothing was
    /// published. Follower push failures are not errors; they are listed in
    /// the receipt.
    pub fn publish(&self, activity: NewActivity) -> MarketResult<PublishReceipt> {
        let (id, members) = self.store.run_script(&PublishScript {
            activity: &activity,
            created_at: Utc::now(),
            max_len: self.max_len,
        })?;

        let followers: Vec<UserId> = members
            .into_iter()
            .map(UserId::new)
            .collect::<MarketResult<_>>()?;

        tracing::debug!(
            target: "oddjobz::fanout",
            activity_id = %id,
            author = %activity.author,
            kind = %activity.kind,
            followers = followers.len(),
            "Activity published"
        );

        Ok(self.fan_out(id, &followers))
    }

    /// Re-run fan-out of an already published activity
    ///
    /// Used to retry the `failed` list of a receipt. Followers that already
    /// have the activity are skipped.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if no payload is stored for `activity_id`.
    pub fn resume_fanout(
        &self,
        activity_id: ActivityId,
        followers: &[UserId],
    ) -> MarketResult<PublishReceipt> {
        if self.store.get(&keys::activity(activity_id))?.is_none() {
            return Err(MarketError::invalid_input(format!(
                "activity {} has no stored payload",
                activity_id
            )));
        }
        Ok(self.fan_out(activity_id, followers))
    }

    fn fan_out(&self, id: ActivityId, followers: &[UserId]) -> PublishReceipt {
        let mut failed: Vec<UserId> = Vec::new();

        for batch in followers.chunks(self.batch_size) {
            let script = FanoutBatchScript {
                id,
                followers: batch,
                max_len: self.max_len,
            };
            match self.store.run_script(&script) {
                Ok(errors) => {
                    for (follower, error) in errors {
                        tracing::debug!(
                            target: "oddjobz::fanout",
                            activity_id = %id,
                            follower = %follower,
                            error = %error,
                            "Follower push failed"
                        );
                        failed.push(follower);
                    }
                }
                Err(error) => {
                    tracing::debug!(
                        target: "oddjobz::fanout",
                        activity_id = %id,
                        batch = batch.len(),
                        error = %error,
                        "Fan-out batch failed"
                    );
                    failed.extend(batch.iter().cloned());
                }
            }
        }

        let receipt = PublishReceipt {
            activity_id: id,
            delivered: followers.len() - failed.len(),
            failed,
        };
        if !receipt.is_complete() {
            tracing::warn!(
                target: "oddjobz::fanout",
                activity_id = %id,
                delivered = receipt.delivered,
                failed = receipt.failed.len(),
                "PartialFanout: some follower timelines were not updated"
            );
        }
        receipt
    }

    /// Load a published activity by id
    pub fn activity(&self, id: ActivityId) -> MarketResult<Option<Activity>> {
        match self.store.get(&keys::activity(id))? {
            None => Ok(None),
            Some(StoreValue::Str(raw)) => Activity::decode(&raw).map(Some),
            Some(other) => Err(other.wrong_type(&keys::activity(id), "string")),
        }
    }
}
