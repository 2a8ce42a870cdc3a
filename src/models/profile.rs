//! Per-entity profile attributes.

use serde::{Deserialize, Serialize};

/// Attributes fetched independently per entity from the profile endpoint.
///
/// Every field is optional: a failed or partial lookup degrades the
/// affected fields to `None` without touching the rest of the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileAttributes {
    /// Coarse numeric level
    pub level: Option<u32>,

    /// Finer-grained classification label (e.g. a league name)
    pub tier_label: Option<String>,

    /// Follower count
    pub follower_count: Option<u64>,

    /// Consecutive streaming days
    pub streak_days: Option<u32>,

    /// Verified/official flag; None when the upstream omitted it
    pub is_verified: Option<bool>,
}

impl ProfileAttributes {
    /// True when no attribute could be resolved.
    pub fn is_unavailable(&self) -> bool {
        self.level.is_none()
            && self.tier_label.is_none()
            && self.follower_count.is_none()
            && self.streak_days.is_none()
            && self.is_verified.is_none()
    }
}
