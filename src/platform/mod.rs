//! Live-streaming platform API client.
//!
//! Fetches event ranking pages, participant counts, and room profiles.
//! All platform API specifics (endpoint paths, field-name variance,
//! nested sub-objects) are isolated in this module so upstream changes
//! are easy to fix.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{FetchError, Fetcher};
use crate::models::{normalize_entity_id, LeaderboardEntry, ProfileAttributes};

/// Candidate field names for the ranking entry list, probed in order.
/// The first present list-typed value wins.
const ENTRY_LIST_FIELDS: &[&str] = &["list", "room_list", "ranking"];

// ── Custom deserializers for inconsistent platform fields ───────────────────

/// Deserialize a value that may be a number or a string containing a number.
fn deserialize_string_or_number_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| match v {
        Value::Number(n) => n.as_u64().map(|x| x as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn deserialize_string_or_number_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn deserialize_string_or_number_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Deserialize a flag that may arrive as a bool or a 0/1 number.
fn deserialize_bool_or_number<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_i64().map(|x| x != 0),
        _ => None,
    }))
}

/// Deserialize the quest level from the nested `event_entry: {quest_level: N}`
/// sub-object attached to each ranking entry.
fn deserialize_event_entry_quest_level<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct EventEntry {
        #[serde(default, deserialize_with = "deserialize_string_or_number_u32")]
        quest_level: Option<u32>,
    }
    let maybe: Option<EventEntry> = Option::deserialize(deserializer)?;
    Ok(maybe.and_then(|e| e.quest_level))
}

// ── Platform API response types ─────────────────────────────────────────────

/// A ranking entry as emitted by the listing endpoint.
///
/// Ids may be numbers or numeric strings; scores and ranks vary in both
/// field name and type between API revisions.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRankingEntry {
    /// Entity (room) identifier, normalized later
    #[serde(default, alias = "user_id", alias = "id")]
    pub room_id: Option<Value>,

    /// Display name
    #[serde(default, alias = "name")]
    pub room_name: Option<String>,

    /// Rank within the event
    #[serde(
        default,
        alias = "order",
        deserialize_with = "deserialize_string_or_number_u32"
    )]
    pub rank: Option<u32>,

    /// Event score
    #[serde(
        default,
        alias = "points",
        alias = "score",
        deserialize_with = "deserialize_string_or_number_i64"
    )]
    pub point: Option<i64>,

    /// Quest level from the nested `event_entry` sub-object
    #[serde(
        default,
        rename = "event_entry",
        deserialize_with = "deserialize_event_entry_quest_level"
    )]
    pub quest_level: Option<u32>,
}

impl RawRankingEntry {
    /// Convert into a [`LeaderboardEntry`], normalizing the identity.
    ///
    /// Returns `None` when the identity is absent or unparsable; such
    /// entries are dropped from keyed structures rather than erroring.
    pub fn into_entry(self) -> Option<LeaderboardEntry> {
        let entity_id = normalize_entity_id(self.room_id.as_ref()?)?;
        Some(LeaderboardEntry {
            entity_id,
            display_name: self.room_name.filter(|n| !n.trim().is_empty()),
            rank: self.rank,
            score: self.point.unwrap_or(0),
            tier: self.quest_level,
        })
    }
}

/// One page of the ranking listing, after field-name resolution.
#[derive(Debug, Clone, Default)]
pub struct RankingPage {
    /// Entries with a valid normalized identity
    pub entries: Vec<LeaderboardEntry>,

    /// Next page number when the upstream signals one; `Some(0)` and
    /// `None` both mean "no next page known"
    pub next_page: Option<u32>,
}

impl RankingPage {
    /// Whether the upstream explicitly signalled the end of the listing.
    pub fn is_last_signalled(&self) -> bool {
        self.next_page == Some(0)
    }
}

/// Parse a raw listing response body into a [`RankingPage`].
///
/// The entry list may appear under one of several alternately-named
/// fields; candidates are probed in a fixed order and the first
/// list-typed value is used. Individual entries that fail to parse are
/// skipped, never fatal.
pub fn parse_ranking_page(body: &Value) -> RankingPage {
    let raw_entries = ENTRY_LIST_FIELDS
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_array));

    let entries = match raw_entries {
        Some(list) => list
            .iter()
            .filter_map(|item| {
                match serde_json::from_value::<RawRankingEntry>(item.clone()) {
                    Ok(raw) => raw.into_entry(),
                    Err(e) => {
                        debug!("skipping malformed ranking entry: {}", e);
                        None
                    }
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let next_page = body
        .get("next_page")
        .and_then(Value::as_u64)
        .map(|n| n as u32);

    RankingPage { entries, next_page }
}

/// Response from the total-count endpoint.
#[derive(Debug, Deserialize)]
pub struct TotalCountResponse {
    #[serde(
        default,
        alias = "total",
        alias = "count",
        deserialize_with = "deserialize_string_or_number_u64"
    )]
    pub total_entries: Option<u64>,
}

/// A room profile as emitted by the profile endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfile {
    #[serde(
        default,
        alias = "level",
        deserialize_with = "deserialize_string_or_number_u32"
    )]
    pub room_level: Option<u32>,

    #[serde(default, alias = "grade")]
    pub league_label: Option<String>,

    #[serde(
        default,
        alias = "follower_count",
        deserialize_with = "deserialize_string_or_number_u64"
    )]
    pub follower_num: Option<u64>,

    #[serde(
        default,
        alias = "streak_days",
        deserialize_with = "deserialize_string_or_number_u32"
    )]
    pub continuous_live_days: Option<u32>,

    #[serde(
        default,
        alias = "is_verified",
        deserialize_with = "deserialize_bool_or_number"
    )]
    pub is_official: Option<bool>,
}

impl From<RawProfile> for ProfileAttributes {
    fn from(raw: RawProfile) -> Self {
        ProfileAttributes {
            level: raw.room_level,
            tier_label: raw.league_label.filter(|l| !l.trim().is_empty()),
            follower_count: raw.follower_num,
            streak_days: raw.continuous_live_days,
            is_verified: raw.is_official,
        }
    }
}

// ── Source abstraction ──────────────────────────────────────────────────────

/// The three platform endpoints the aggregator depends on.
///
/// Implemented by [`PlatformClient`] for the real API and by mock sources
/// in tests so the pipeline runs without network access.
#[async_trait]
pub trait RankingSource: Send + Sync {
    /// Fetch one page of the event ranking listing (pages start at 1).
    async fn fetch_ranking_page(&self, event_id: &str, page: u32)
        -> Result<RankingPage, FetchError>;

    /// Fetch the total participant count for an event.
    async fn fetch_total_count(&self, event_id: &str) -> Result<u64, FetchError>;

    /// Fetch profile attributes for one entity.
    async fn fetch_profile(&self, entity_id: &str) -> Result<ProfileAttributes, FetchError>;
}

// ── Platform client implementation ──────────────────────────────────────────

/// HTTP client for the live-streaming platform API.
pub struct PlatformClient {
    fetcher: Fetcher,
    api_base: String,
}

impl PlatformClient {
    /// Create a new client against the given API base URL.
    pub fn new(fetcher: Fetcher, api_base: String) -> Self {
        let api_base = api_base.trim_end_matches('/').to_string();
        Self { fetcher, api_base }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| FetchError::Transport(format!("bad endpoint URL: {}", e)))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }
}

#[async_trait]
impl RankingSource for PlatformClient {
    async fn fetch_ranking_page(
        &self,
        event_id: &str,
        page: u32,
    ) -> Result<RankingPage, FetchError> {
        let url = self.endpoint(
            "/api/event/room_list",
            &[("event_id", event_id), ("p", &page.to_string())],
        )?;

        let body: Value = self.fetcher.get_json(&url).await?;
        let parsed = parse_ranking_page(&body);
        debug!(
            "event {}: page {} yielded {} entries",
            event_id,
            page,
            parsed.entries.len()
        );
        Ok(parsed)
    }

    async fn fetch_total_count(&self, event_id: &str) -> Result<u64, FetchError> {
        let url = self.endpoint("/api/event/total_entries", &[("event_id", event_id)])?;

        let body: TotalCountResponse = self.fetcher.get_json(&url).await?;
        body.total_entries.ok_or_else(|| {
            warn!("event {}: count response had no recognizable field", event_id);
            FetchError::MalformedResponse("missing total count field".to_string())
        })
    }

    async fn fetch_profile(&self, entity_id: &str) -> Result<ProfileAttributes, FetchError> {
        let url = self.endpoint("/api/room/profile", &[("room_id", entity_id)])?;

        let raw: RawProfile = self.fetcher.get_json(&url).await?;
        Ok(raw.into())
    }
}
