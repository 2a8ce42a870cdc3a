//! Core data models for the leaderboard aggregator.

mod entry;
mod identity;
mod profile;

pub use entry::*;
pub use identity::*;
pub use profile::*;
