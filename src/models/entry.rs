//! Leaderboard entry and aggregation result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProfileAttributes;

/// One row of an event leaderboard, after identity normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Canonical string identity (see `models::identity`)
    pub entity_id: String,

    /// Display name; may be absent upstream
    pub display_name: Option<String>,

    /// Rank within the event (1 = leader); None when the upstream omits it
    pub rank: Option<u32>,

    /// Event score; 0 when absent or unparsable upstream
    pub score: i64,

    /// Quest/level tier nested under the entry's event sub-object
    pub tier: Option<u32>,
}

impl LeaderboardEntry {
    /// Create an entry with only the identity set.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            display_name: None,
            rank: None,
            score: 0,
            tier: None,
        }
    }

    /// Builder method to set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Builder method to set the rank.
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Builder method to set the score.
    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    /// Builder method to set the tier.
    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Display name, falling back to a placeholder derived from the identity.
    pub fn display_label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("room {}", self.entity_id),
        }
    }
}

/// A leaderboard entry merged with profile attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEntry {
    #[serde(flatten)]
    pub entry: LeaderboardEntry,

    /// Per-entity profile attributes; all-unavailable when the lookup failed
    pub profile: ProfileAttributes,
}

impl EnrichedEntry {
    /// Wrap an entry with no profile data (all attributes unavailable).
    pub fn without_profile(entry: LeaderboardEntry) -> Self {
        Self {
            entry,
            profile: ProfileAttributes::default(),
        }
    }
}

/// The target entity's standing within an event.
///
/// Each field degrades independently to `None` ("unavailable") when the
/// entity was not found in the retrievable listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetStanding {
    pub rank: Option<u32>,
    pub score: Option<i64>,
    pub tier: Option<u32>,
}

impl TargetStanding {
    /// Build a standing from a listing entry.
    pub fn from_entry(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            score: Some(entry.score),
            tier: entry.tier,
        }
    }

    /// True when no field could be resolved.
    pub fn is_unavailable(&self) -> bool {
        self.rank.is_none() && self.score.is_none() && self.tier.is_none()
    }
}

/// Result of one aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Event identifier the aggregation ran against
    pub event_id: String,

    /// Total participants per the count endpoint; None = unavailable
    pub total_participant_count: Option<u64>,

    /// Standing of the caller-specified target entity
    pub target_standing: TargetStanding,

    /// Top entries sorted by score descending; length ≤ limit + 1
    /// (the extra slot holds the target when it sits outside the window)
    pub top_entries: Vec<EnrichedEntry>,

    /// When the aggregation ran
    pub fetched_at: DateTime<Utc>,
}

impl AggregationResult {
    /// An empty result for a missing event id or a fully failed fetch.
    pub fn empty(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            total_participant_count: None,
            target_standing: TargetStanding::default(),
            top_entries: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}
