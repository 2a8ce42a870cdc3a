use std::sync::Arc;

use crate::aggregate::RankingAggregator;
use crate::platform::RankingSource;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<RankingAggregator>,
    pub source: Arc<dyn RankingSource>,
}
