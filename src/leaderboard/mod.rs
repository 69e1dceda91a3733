//! Ranked view of user point totals.
//!
//! The leaderboard is denormalized state (`users.points` stays
//! authoritative), so writes here are snapshots, not increments, and the
//! engine treats a failed push as log-and-continue. Two backings implement
//! the same trait: a Redis sorted set when a shared cache is configured,
//! and a process-local map otherwise.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::UserId;

pub mod memory;
pub mod redis;

pub type LeaderboardResult<T> = core::result::Result<T, LeaderboardError>;

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error(transparent)]
    RedisError(#[from] ::redis::RedisError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub points: i64,
}

#[async_trait]
pub trait Leaderboard: Send + Sync {
    /// Upsert the user's current total. Last write wins; the value is a
    /// snapshot of `users.points`, never a delta.
    async fn record_score(&self, user: UserId, total: i64) -> LeaderboardResult<()>;

    /// Up to `limit` entries, highest totals first.
    async fn top(&self, limit: i64) -> LeaderboardResult<Vec<LeaderboardEntry>>;
}
