//! Record storage behind a single collaborator trait.
//!
//! Two interchangeable implementations: [`pg::PgStore`] against Postgres for
//! deployments, and [`memory::MemStore`] for tests and database-less dev
//! runs. Multi-row point mutations (award, redemption) are single atomic
//! operations here so callers can never update points without level and
//! history moving in the same step.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{
    NewReward, NewTrip, NewUser, PointsHistoryEntry, PointsReason, Redemption, Reward, RewardId,
    Trip, TripId, TripStats, User, UserId,
};

pub mod memory;
pub mod pg;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("username or email already registered")]
    DuplicateUser,

    #[error("insufficient points")]
    InsufficientPoints,

    #[error("reward unavailable")]
    RewardUnavailable,

    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: UserId) -> StoreResult<User>;
    async fn user_by_email(&self, email: &str) -> StoreResult<User>;

    async fn create_trip(&self, new: NewTrip) -> StoreResult<Trip>;
    async fn trip_by_id(&self, id: TripId) -> StoreResult<Trip>;
    /// Newest trips first.
    async fn list_trips(&self, limit: i64) -> StoreResult<Vec<Trip>>;
    /// A user's trips, most recently visited first.
    async fn trips_by_user(&self, user: UserId, limit: i64) -> StoreResult<Vec<Trip>>;
    async fn trip_stats(&self, user: UserId) -> StoreResult<TripStats>;

    /// Applies a signed point delta, recomputes level and appends one ledger
    /// entry, atomically. A negative delta larger than the current balance
    /// fails with [`StoreError::InsufficientPoints`] and changes nothing.
    async fn apply_points(
        &self,
        user: UserId,
        delta: i64,
        reason: PointsReason,
    ) -> StoreResult<User>;
    async fn points_history(&self, user: UserId, limit: i64)
    -> StoreResult<Vec<PointsHistoryEntry>>;

    async fn create_reward(&self, new: NewReward) -> StoreResult<Reward>;
    async fn list_rewards(&self) -> StoreResult<Vec<Reward>>;
    async fn reward_by_id(&self, id: RewardId) -> StoreResult<Reward>;

    /// The redemption transaction: debit the reward's cost from the user
    /// (level + ledger entry included), decrement inventory by one, create a
    /// pending redemption. All-or-nothing; the inventory decrement and the
    /// point debit are both conditional on their guards holding at commit
    /// time, so two racing claims of a one-unit reward cannot both succeed.
    async fn redeem_reward(&self, user: UserId, reward: RewardId)
    -> StoreResult<(Redemption, User)>;
    async fn redemptions_by_user(&self, user: UserId, limit: i64)
    -> StoreResult<Vec<Redemption>>;
    async fn count_redemptions(&self, user: UserId) -> StoreResult<i64>;
}
