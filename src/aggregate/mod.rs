//! Event ranking aggregation pipeline.
//!
//! Coordinates the per-request flow:
//! 1. Fetch total participant count (single-shot)
//! 2. Page through the full ranking listing
//! 3. De-duplicate by normalized identity
//! 4. Resolve the target entity's standing
//! 5. Sort, truncate to the caller's limit, reconcile the target
//! 6. Enrich the window with per-entity profiles (bounded fan-out)
//!
//! Every external call is isolated: failures degrade to unavailable
//! values at per-field or per-entity granularity and the aggregator
//! always returns a well-formed result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::fetch::FetchError;
use crate::models::{
    normalize_entity_id_str, AggregationResult, EnrichedEntry, LeaderboardEntry,
    ProfileAttributes, TargetStanding,
};
use crate::platform::RankingSource;

/// Tuning knobs for the aggregation pipeline.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upstream listing page size; a shorter page ends pagination
    pub page_size: usize,

    /// Hard ceiling on pages fetched per request, bounding worst-case
    /// latency against a misbehaving upstream
    pub max_pages: u32,

    /// Concurrent profile lookups during enrichment
    pub profile_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            page_size: 30,
            max_pages: 60,
            profile_concurrency: 8,
        }
    }
}

/// Aggregates an event leaderboard with profile enrichment and
/// target-standing reconciliation.
pub struct RankingAggregator {
    source: Arc<dyn RankingSource>,
    config: AggregatorConfig,
}

impl RankingAggregator {
    /// Create an aggregator over the given source.
    pub fn new(source: Arc<dyn RankingSource>, config: AggregatorConfig) -> Self {
        Self { source, config }
    }

    /// Run one aggregation for `(event_id, target_id, limit)`.
    ///
    /// An empty `event_id` short-circuits to an empty result without any
    /// upstream calls. A `target_id` absent from the retrievable listing
    /// yields an all-unavailable standing; this is a known approximation
    /// for entities ranked beyond the page ceiling.
    pub async fn aggregate(
        &self,
        event_id: &str,
        target_id: Option<&str>,
        limit: usize,
    ) -> AggregationResult {
        let event_id = event_id.trim();
        if event_id.is_empty() {
            debug!("empty event id, returning empty result");
            return AggregationResult::empty(event_id);
        }

        let total_participant_count = self.fetch_total(event_id).await;
        let listing = self.fetch_full_listing(event_id).await;
        let deduped = dedup_by_identity(listing);

        let normalized_target = target_id.and_then(normalize_entity_id_str);
        let target_entry = normalized_target
            .as_deref()
            .and_then(|t| deduped.iter().find(|e| e.entity_id == t))
            .cloned();
        let target_standing = target_entry
            .as_ref()
            .map(TargetStanding::from_entry)
            .unwrap_or_default();

        // Sorted full listing, then the bounded window
        let mut window: Vec<LeaderboardEntry> = deduped;
        window.truncate(limit);

        // The target always gets a row when it exists anywhere in the
        // listing, so the window may carry one extra element.
        if let Some(target) = target_entry {
            if !window.iter().any(|e| e.entity_id == target.entity_id) {
                window.push(target);
            }
        }

        let top_entries = self.enrich(window).await;

        info!(
            "event {}: aggregated {} entries (target {})",
            event_id,
            top_entries.len(),
            if target_standing.is_unavailable() {
                "unavailable"
            } else {
                "resolved"
            }
        );

        AggregationResult {
            event_id: event_id.to_string(),
            total_participant_count,
            target_standing,
            top_entries,
            fetched_at: Utc::now(),
        }
    }

    /// Single-shot total count; not-found means zero, anything else
    /// degrades to unavailable independent of listing success.
    async fn fetch_total(&self, event_id: &str) -> Option<u64> {
        match self.source.fetch_total_count(event_id).await {
            Ok(count) => Some(count),
            Err(FetchError::NotFound) => Some(0),
            Err(e) => {
                warn!("event {}: total count unavailable: {}", event_id, e);
                None
            }
        }
    }

    /// Page through the listing until a short page, an explicit end
    /// signal, or the page ceiling. Mid-pagination failures keep the
    /// pages accumulated so far.
    async fn fetch_full_listing(&self, event_id: &str) -> Vec<LeaderboardEntry> {
        let mut all_entries = Vec::new();

        for page in 1..=self.config.max_pages {
            match self.source.fetch_ranking_page(event_id, page).await {
                Ok(ranking_page) => {
                    if ranking_page.entries.is_empty() {
                        break;
                    }
                    let page_len = ranking_page.entries.len();
                    let end_signalled = ranking_page.is_last_signalled();
                    all_entries.extend(ranking_page.entries);

                    if end_signalled || page_len < self.config.page_size {
                        break;
                    }
                }
                Err(FetchError::NotFound) => break,
                Err(e) => {
                    warn!(
                        "event {}: pagination aborted at page {} ({} entries kept): {}",
                        event_id,
                        page,
                        all_entries.len(),
                        e
                    );
                    break;
                }
            }
        }

        all_entries
    }

    /// Fan out one profile lookup per entry with bounded concurrency,
    /// reassembling results by entity identity rather than completion
    /// order. Per-entity failure degrades only that entity.
    async fn enrich(&self, entries: Vec<LeaderboardEntry>) -> Vec<EnrichedEntry> {
        if entries.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.profile_concurrency.max(1)));
        let mut lookups = JoinSet::new();

        for entry in &entries {
            let entity_id = entry.entity_id.clone();
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);

            lookups.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (entity_id, ProfileAttributes::default()),
                };
                let profile = match source.fetch_profile(&entity_id).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!("profile lookup failed for {}: {}", entity_id, e);
                        ProfileAttributes::default()
                    }
                };
                (entity_id, profile)
            });
        }

        let mut profiles: HashMap<String, ProfileAttributes> = HashMap::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((entity_id, profile)) => {
                    profiles.insert(entity_id, profile);
                }
                Err(e) => warn!("profile lookup task failed: {}", e),
            }
        }

        entries
            .into_iter()
            .map(|entry| {
                let profile = profiles.remove(&entry.entity_id).unwrap_or_default();
                EnrichedEntry { entry, profile }
            })
            .collect()
    }
}

/// De-duplicate listing entries by normalized identity and sort by score
/// descending.
///
/// Within a duplicate group the entry with the strictly greatest score
/// wins; ties keep the first one encountered. The sort uses first-seen
/// listing order as an explicit deterministic secondary key.
pub fn dedup_by_identity(entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    let mut by_id: HashMap<String, (usize, LeaderboardEntry)> = HashMap::new();

    for (seq, entry) in entries.into_iter().enumerate() {
        match by_id.get_mut(&entry.entity_id) {
            Some((_, existing)) => {
                if entry.score > existing.score {
                    *existing = entry;
                }
            }
            None => {
                by_id.insert(entry.entity_id.clone(), (seq, entry));
            }
        }
    }

    let mut deduped: Vec<(usize, LeaderboardEntry)> = by_id.into_values().collect();
    deduped.sort_by(|(seq_a, a), (seq_b, b)| b.score.cmp(&a.score).then(seq_a.cmp(seq_b)));
    deduped.into_iter().map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{parse_ranking_page, RankingPage};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory ranking source with canned pages and failure injection.
    struct MockSource {
        pages: Vec<RankingPage>,
        total: Result<u64, fn() -> FetchError>,
        failing_profiles: HashSet<String>,
        fail_listing_at_page: Option<u32>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn new(pages: Vec<RankingPage>) -> Self {
            Self {
                total: Ok(pages.iter().map(|p| p.entries.len() as u64).sum()),
                pages,
                failing_profiles: HashSet::new(),
                fail_listing_at_page: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn from_entries(entries: Vec<LeaderboardEntry>, page_size: usize) -> Self {
            let pages = entries
                .chunks(page_size)
                .map(|chunk| RankingPage {
                    entries: chunk.to_vec(),
                    next_page: None,
                })
                .collect();
            Self::new(pages)
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RankingSource for MockSource {
        async fn fetch_ranking_page(
            &self,
            _event_id: &str,
            page: u32,
        ) -> Result<RankingPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing_at_page == Some(page) {
                return Err(FetchError::Transport("connection reset".to_string()));
            }
            Ok(self
                .pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default())
        }

        async fn fetch_total_count(&self, _event_id: &str) -> Result<u64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.total {
                Ok(n) => Ok(*n),
                Err(make) => Err(make()),
            }
        }

        async fn fetch_profile(&self, entity_id: &str) -> Result<ProfileAttributes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_profiles.contains(entity_id) {
                return Err(FetchError::Timeout);
            }
            Ok(ProfileAttributes {
                level: Some(10),
                tier_label: Some("B".to_string()),
                follower_count: Some(1000),
                streak_days: Some(5),
                is_verified: Some(false),
            })
        }
    }

    /// Source that returns a full page of fresh entries for every page
    /// number, never signalling an end.
    struct EndlessSource {
        page_size: usize,
        listing_calls: AtomicUsize,
    }

    #[async_trait]
    impl RankingSource for EndlessSource {
        async fn fetch_ranking_page(
            &self,
            _event_id: &str,
            page: u32,
        ) -> Result<RankingPage, FetchError> {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            let entries = (0..self.page_size)
                .map(|i| entry(&format!("p{}-{}", page, i), 1000 - page as i64))
                .collect();
            Ok(RankingPage {
                entries,
                next_page: Some(page + 1),
            })
        }

        async fn fetch_total_count(&self, _event_id: &str) -> Result<u64, FetchError> {
            Ok(0)
        }

        async fn fetch_profile(&self, _entity_id: &str) -> Result<ProfileAttributes, FetchError> {
            Ok(ProfileAttributes::default())
        }
    }

    /// Profile source tracking the in-flight lookup high-water mark.
    struct GaugedProfileSource {
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
    }

    #[async_trait]
    impl RankingSource for GaugedProfileSource {
        async fn fetch_ranking_page(
            &self,
            _event_id: &str,
            _page: u32,
        ) -> Result<RankingPage, FetchError> {
            Ok(RankingPage::default())
        }

        async fn fetch_total_count(&self, _event_id: &str) -> Result<u64, FetchError> {
            Ok(0)
        }

        async fn fetch_profile(&self, _entity_id: &str) -> Result<ProfileAttributes, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ProfileAttributes {
                level: Some(1),
                ..Default::default()
            })
        }
    }

    fn entry(id: &str, score: i64) -> LeaderboardEntry {
        LeaderboardEntry::new(id).with_score(score)
    }

    fn aggregator(source: MockSource) -> RankingAggregator {
        RankingAggregator::new(Arc::new(source), AggregatorConfig::default())
    }

    // ── dedup ───────────────────────────────────────────────────────────────

    #[test]
    fn test_dedup_unique_per_identity() {
        let entries = vec![entry("1", 10), entry("2", 20), entry("1", 5)];
        let deduped = dedup_by_identity(entries);
        let ids: HashSet<_> = deduped.iter().map(|e| e.entity_id.clone()).collect();
        assert_eq!(deduped.len(), 2);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_dedup_keeps_max_score() {
        let entries = vec![entry("55", 10), entry("55", 20), entry("55", 15)];
        let deduped = dedup_by_identity(entries);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].score, 20);
    }

    #[test]
    fn test_dedup_tie_keeps_first_seen() {
        let first = entry("9", 10).with_display_name("first");
        let second = entry("9", 10).with_display_name("second");
        let deduped = dedup_by_identity(vec![first, second]);
        assert_eq!(deduped[0].display_name.as_deref(), Some("first"));
    }

    #[test]
    fn test_dedup_sorts_score_descending() {
        let entries = vec![entry("a", 5), entry("b", 50), entry("c", 25)];
        let deduped = dedup_by_identity(entries);
        let scores: Vec<i64> = deduped.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![50, 25, 5]);
    }

    #[test]
    fn test_dedup_equal_scores_ordered_by_first_seen() {
        let entries = vec![entry("x", 10), entry("y", 10), entry("z", 10)];
        let deduped = dedup_by_identity(entries);
        let ids: Vec<&str> = deduped.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    // ── full pipeline ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_three_pages_top_ten() {
        // 72 unique entries with scores 1000..929 across pages of 30/30/12
        let entries: Vec<LeaderboardEntry> = (0..72)
            .map(|i| entry(&format!("room-{}", i), 1000 - i as i64))
            .collect();
        let source = MockSource::from_entries(entries, 30);
        let result = aggregator(source).aggregate("ev-1", None, 10).await;

        assert_eq!(result.top_entries.len(), 10);
        let scores: Vec<i64> = result.top_entries.iter().map(|e| e.entry.score).collect();
        assert_eq!(scores, (991..=1000).rev().collect::<Vec<i64>>());
        assert_eq!(result.total_participant_count, Some(72));
    }

    #[tokio::test]
    async fn test_duplicate_identity_across_forms() {
        // Listing emits "55" as a string on one page and 55 as an int on
        // another; normalization collapses them and the higher score wins.
        let page1 = parse_ranking_page(&json!({
            "list": [{"room_id": "55", "point": 10}]
        }));
        let page2 = parse_ranking_page(&json!({
            "list": [{"room_id": 55, "point": 20}]
        }));
        let mut source = MockSource::new(vec![page1, page2]);
        // Short pages would end pagination after page 1; force two pages
        // by signalling a next page.
        source.pages[0].next_page = Some(2);
        let config = AggregatorConfig {
            page_size: 1,
            ..Default::default()
        };
        let agg = RankingAggregator::new(Arc::new(source), config);

        let result = agg.aggregate("ev-1", None, 10).await;
        assert_eq!(result.top_entries.len(), 1);
        assert_eq!(result.top_entries[0].entry.entity_id, "55");
        assert_eq!(result.top_entries[0].entry.score, 20);
    }

    #[tokio::test]
    async fn test_profile_failure_degrades_single_entity() {
        let entries: Vec<LeaderboardEntry> = (0..10)
            .map(|i| entry(&format!("r{}", i), 100 - i as i64))
            .collect();
        let mut source = MockSource::from_entries(entries, 30);
        source.failing_profiles.insert("r3".to_string());

        let result = aggregator(source).aggregate("ev-1", None, 10).await;
        assert_eq!(result.top_entries.len(), 10);
        for enriched in &result.top_entries {
            if enriched.entry.entity_id == "r3" {
                assert!(enriched.profile.is_unavailable());
            } else {
                assert_eq!(enriched.profile.level, Some(10));
            }
        }
    }

    #[tokio::test]
    async fn test_empty_event_id_makes_no_calls() {
        let mock = Arc::new(MockSource::new(vec![]));
        let agg = RankingAggregator::new(mock.clone(), AggregatorConfig::default());

        let result = agg.aggregate("", Some("55"), 10).await;
        assert!(result.top_entries.is_empty());
        assert_eq!(result.total_participant_count, None);
        assert!(result.target_standing.is_unavailable());
        assert_eq!(mock.call_count(), 0);

        // Whitespace-only ids short-circuit the same way
        let _ = agg.aggregate("   ", None, 10).await;
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_target_outside_window_is_appended() {
        let entries: Vec<LeaderboardEntry> = (0..20)
            .map(|i| {
                entry(&format!("r{}", i), 1000 - i as i64)
                    .with_rank(i as u32 + 1)
                    .with_tier(3)
            })
            .collect();
        let source = MockSource::from_entries(entries, 30);
        let result = aggregator(source).aggregate("ev-1", Some("r15"), 10).await;

        assert_eq!(result.top_entries.len(), 11);
        assert_eq!(result.top_entries[10].entry.entity_id, "r15");
        let occurrences = result
            .top_entries
            .iter()
            .filter(|e| e.entry.entity_id == "r15")
            .count();
        assert_eq!(occurrences, 1);

        assert_eq!(result.target_standing.rank, Some(16));
        assert_eq!(result.target_standing.score, Some(985));
        assert_eq!(result.target_standing.tier, Some(3));
    }

    #[tokio::test]
    async fn test_target_inside_window_not_duplicated() {
        let entries: Vec<LeaderboardEntry> = (0..20)
            .map(|i| entry(&format!("r{}", i), 1000 - i as i64))
            .collect();
        let source = MockSource::from_entries(entries, 30);
        let result = aggregator(source).aggregate("ev-1", Some("r2"), 10).await;

        assert_eq!(result.top_entries.len(), 10);
        let occurrences = result
            .top_entries
            .iter()
            .filter(|e| e.entry.entity_id == "r2")
            .count();
        assert_eq!(occurrences, 1);
    }

    #[tokio::test]
    async fn test_target_absent_no_phantom_row() {
        let entries: Vec<LeaderboardEntry> = (0..20)
            .map(|i| entry(&format!("r{}", i), 1000 - i as i64))
            .collect();
        let source = MockSource::from_entries(entries, 30);
        let result = aggregator(source)
            .aggregate("ev-1", Some("not-in-listing"), 10)
            .await;

        assert!(result.target_standing.is_unavailable());
        assert_eq!(result.top_entries.len(), 10);
    }

    #[tokio::test]
    async fn test_target_id_normalized_before_lookup() {
        let source = MockSource::from_entries(vec![entry("55", 40)], 30);
        let result = aggregator(source).aggregate("ev-1", Some("55.0"), 10).await;
        assert_eq!(result.target_standing.score, Some(40));
    }

    #[tokio::test]
    async fn test_partial_listing_kept_on_transport_failure() {
        let entries: Vec<LeaderboardEntry> = (0..60)
            .map(|i| entry(&format!("r{}", i), 1000 - i as i64))
            .collect();
        let mut source = MockSource::from_entries(entries, 30);
        source.fail_listing_at_page = Some(2);

        let result = aggregator(source).aggregate("ev-1", None, 40).await;
        // Page 1 succeeded, page 2 aborted pagination
        assert_eq!(result.top_entries.len(), 30);
    }

    #[tokio::test]
    async fn test_not_found_count_means_zero() {
        let mut source = MockSource::new(vec![]);
        source.total = Err(|| FetchError::NotFound);
        let result = aggregator(source).aggregate("ev-1", None, 10).await;
        assert_eq!(result.total_participant_count, Some(0));
    }

    #[tokio::test]
    async fn test_failed_count_is_unavailable() {
        let entries = vec![entry("r1", 10)];
        let mut source = MockSource::from_entries(entries, 30);
        source.total = Err(|| FetchError::Transport("boom".to_string()));
        let result = aggregator(source).aggregate("ev-1", None, 10).await;

        assert_eq!(result.total_participant_count, None);
        // Listing success is independent of count failure
        assert_eq!(result.top_entries.len(), 1);
    }

    #[tokio::test]
    async fn test_pagination_stops_at_page_ceiling() {
        let source = Arc::new(EndlessSource {
            page_size: 5,
            listing_calls: AtomicUsize::new(0),
        });
        let config = AggregatorConfig {
            page_size: 5,
            max_pages: 3,
            ..Default::default()
        };
        let agg = RankingAggregator::new(source.clone(), config);

        let result = agg.aggregate("ev-1", None, 100).await;
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.top_entries.len(), 15);
    }

    #[tokio::test]
    async fn test_enrichment_concurrency_is_bounded() {
        let source = Arc::new(GaugedProfileSource {
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        });
        let config = AggregatorConfig {
            profile_concurrency: 2,
            ..Default::default()
        };
        let agg = RankingAggregator::new(source.clone(), config);

        let entries: Vec<LeaderboardEntry> = (0..12)
            .map(|i| entry(&format!("r{}", i), 100 - i as i64))
            .collect();
        let enriched = agg.enrich(entries).await;

        assert_eq!(enriched.len(), 12);
        assert!(enriched.iter().all(|e| e.profile.level == Some(1)));
        assert!(source.high_water.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_pagination_stops_on_end_signal() {
        let page1 = RankingPage {
            entries: (0..30).map(|i| entry(&format!("r{}", i), 100)).collect(),
            next_page: Some(0),
        };
        let page2 = RankingPage {
            entries: vec![entry("unreachable", 1)],
            next_page: None,
        };
        let source = MockSource::new(vec![page1, page2]);
        let result = aggregator(source).aggregate("ev-1", None, 50).await;

        assert_eq!(result.top_entries.len(), 30);
        assert!(!result
            .top_entries
            .iter()
            .any(|e| e.entry.entity_id == "unreachable"));
    }
}
