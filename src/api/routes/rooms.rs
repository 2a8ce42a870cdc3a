use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::fetch::FetchError;
use crate::models::{normalize_entity_id_str, ProfileAttributes};

#[derive(Debug, Serialize)]
pub struct RoomProfileResponse {
    pub room_id: String,
    pub profile: ProfileAttributes,
}

pub async fn room_profile(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomProfileResponse>, ApiError> {
    let room_id = normalize_entity_id_str(&room_id)
        .ok_or_else(|| ApiError::BadRequest("empty room id".to_string()))?;

    match state.source.fetch_profile(&room_id).await {
        Ok(profile) => Ok(Json(RoomProfileResponse { room_id, profile })),
        Err(FetchError::NotFound) => Err(ApiError::NotFound(format!("room {}", room_id))),
        Err(e) => Err(ApiError::Upstream(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregatorConfig, RankingAggregator};
    use crate::api::build_router;
    use crate::platform::{RankingPage, RankingSource};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    /// Profile source that only knows room "42".
    struct ProfileSource;

    #[async_trait]
    impl RankingSource for ProfileSource {
        async fn fetch_ranking_page(
            &self,
            _event_id: &str,
            _page: u32,
        ) -> Result<RankingPage, FetchError> {
            Ok(RankingPage::default())
        }

        async fn fetch_total_count(&self, _event_id: &str) -> Result<u64, FetchError> {
            Err(FetchError::NotFound)
        }

        async fn fetch_profile(&self, entity_id: &str) -> Result<ProfileAttributes, FetchError> {
            if entity_id == "42" {
                Ok(ProfileAttributes {
                    level: Some(12),
                    follower_count: Some(3400),
                    ..Default::default()
                })
            } else {
                Err(FetchError::NotFound)
            }
        }
    }

    fn test_app() -> axum::Router {
        let source: Arc<dyn RankingSource> = Arc::new(ProfileSource);
        let aggregator = Arc::new(RankingAggregator::new(
            source.clone(),
            AggregatorConfig::default(),
        ));
        build_router(AppState { aggregator, source }, "*")
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_room_profile_found() {
        let (status, json) = get_json(test_app(), "/api/rooms/42/profile").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["room_id"], "42");
        assert_eq!(json["profile"]["level"], 12);
        assert_eq!(json["profile"]["follower_count"], 3400);
    }

    #[tokio::test]
    async fn test_room_profile_normalizes_id() {
        // "42.0" canonicalizes to "42" before the lookup
        let (status, json) = get_json(test_app(), "/api/rooms/42.0/profile").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["room_id"], "42");
    }

    #[tokio::test]
    async fn test_room_profile_not_found() {
        let (status, json) = get_json(test_app(), "/api/rooms/999/profile").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }
}
