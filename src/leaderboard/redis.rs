use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::instrument;

use super::{Leaderboard, LeaderboardEntry, LeaderboardResult};
use crate::constants::LEADERBOARD_KEY;
use crate::db::models::UserId;

/// Shared ranking backed by a Redis sorted set. The upsert relies on
/// `ZADD`'s own atomicity; ordering of equal scores is whatever the server
/// returns.
pub struct RedisLeaderboard {
    manager: ConnectionManager,
    key: String,
}

impl RedisLeaderboard {
    #[instrument(skip(url))]
    pub async fn connect(url: &str) -> LeaderboardResult<Self> {
        tracing::debug!("connecting to redis leaderboard");

        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            manager,
            key: LEADERBOARD_KEY.to_string(),
        })
    }
}

#[async_trait]
impl Leaderboard for RedisLeaderboard {
    #[instrument(skip(self))]
    async fn record_score(&self, user: UserId, total: i64) -> LeaderboardResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.zadd(&self.key, user.0, total).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn top(&self, limit: i64) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        let mut conn = self.manager.clone();

        let stop = if limit > 0 { limit - 1 } else { -1 };
        let raw: Vec<(String, i64)> = conn
            .zrevrange_withscores(&self.key, 0, stop as isize)
            .await?;

        Ok(raw
            .into_iter()
            .filter_map(|(member, points)| {
                member
                    .parse::<i64>()
                    .ok()
                    .map(|id| LeaderboardEntry {
                        user_id: UserId(id),
                        points,
                    })
            })
            .collect())
    }
}
