use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct RewardId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct RedemptionId(pub i64);

/// A claimable reward with a finite inventory. Inventory never goes below
/// zero; a redemption is only permitted while it is positive.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    pub description: String,
    pub points_cost: i64,
    pub inventory: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReward {
    pub name: String,
    pub description: String,
    pub points_cost: i64,
    pub inventory: i32,
}

/// One successful reward claim. Created only as the terminal step of the
/// redemption transaction.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Redemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub reward_id: RewardId,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

pub const REDEMPTION_PENDING: &str = "pending";

impl From<i64> for RewardId {
    fn from(value: i64) -> Self {
        RewardId(value)
    }
}

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
