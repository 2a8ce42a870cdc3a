//! # Liveboard
//!
//! A live-event leaderboard aggregator for streaming platforms.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (entries, profiles, standings)
//! - **platform**: Upstream API shapes and the `RankingSource` seam
//! - **fetch**: HTTP client with typed error classification
//! - **aggregate**: Pagination, dedup, windowing, and profile enrichment
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod aggregate;
pub mod api;
pub mod config;
pub mod fetch;
pub mod models;
pub mod platform;

pub use models::*;
