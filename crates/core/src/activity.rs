//! Activity records carried by timelines
//!
//! An activity is a denormalized snapshot of something a user did (posted a
//! review, listed a skill, ...). It is written once under its id and then
//! referenced by id from any number of timelines. The source of truth for the
//! underlying review or skill lives in the content repositories.

use crate::error::MarketResult;
use crate::types::{ActivityId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of action produced an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A review was posted on a skill
    Review,
    /// A new skill was listed
    SkillListed,
    /// The author followed someone
    Followed,
    /// Credits changed hands for a skill
    CreditsSpent,
}

impl ActivityKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Review => "review",
            ActivityKind::SkillListed => "skill_listed",
            ActivityKind::Followed => "followed",
            ActivityKind::CreditsSpent => "credits_spent",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity submitted for publishing, before an id is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    /// Author whose followers receive the activity
    pub author: UserId,
    /// Kind of action
    pub kind: ActivityKind,
    /// Denormalized payload for feed rendering
    pub payload: serde_json::Value,
}

impl NewActivity {
    /// Create a new activity
    pub fn new(author: UserId, kind: ActivityKind, payload: serde_json::Value) -> Self {
        Self {
            author,
            kind,
            payload,
        }
    }

    /// Review activity with a review snapshot as payload
    pub fn review(author: UserId, payload: serde_json::Value) -> Self {
        Self::new(author, ActivityKind::Review, payload)
    }

    /// Stamp the activity with its id and creation time
    pub fn into_activity(self, id: ActivityId, created_at: DateTime<Utc>) -> Activity {
        Activity {
            id,
            author: self.author,
            kind: self.kind,
            payload: self.payload,
            created_at,
        }
    }
}

/// A published, immutable activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Globally monotonic id
    pub id: ActivityId,
    /// Author
    pub author: UserId,
    /// Kind of action
    pub kind: ActivityKind,
    /// Denormalized payload
    pub payload: serde_json::Value,
    /// Publish time
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Serialize to the stored representation
    ///
    /// The encoding is produced once at publish time and stored verbatim, so
    /// every later read returns the same bytes.
    pub fn encode(&self) -> MarketResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the stored representation
    pub fn decode(raw: &str) -> MarketResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
