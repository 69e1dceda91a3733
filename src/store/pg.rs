//! Postgres-backed record store.
//!
//! Single-statement conditional updates guard the two contended counters
//! (user points, reward inventory); multi-row mutations run inside one
//! transaction, so a failed guard rolls every prior step back.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::{RecordStore, StoreError, StoreResult};
use crate::db::models::reward::REDEMPTION_PENDING;
use crate::db::models::{
    Media, NewReward, NewTrip, NewUser, PointsHistoryEntry, PointsReason, Redemption, Reward,
    RewardId, Trip, TripId, TripRow, TripStats, User, UserId,
};
use crate::engine::levels;

mod sql_fragment {
    pub const USER_FIELDS: &str =
        "id, username, email, password_hash, points, level, created_at, updated_at";

    pub const TRIP_FIELDS: &str =
        "id, user_id, title, description, location, visited_at, score, verified, created_at";

    pub const MEDIA_FIELDS: &str =
        "id, trip_id, kind, url, checksum, metadata_raw, position, created_at";

    pub const REWARD_FIELDS: &str =
        "id, name, description, points_cost, inventory, created_at, updated_at";

    pub const REDEMPTION_FIELDS: &str = "id, user_id, reward_id, status, created_at";

    pub const HISTORY_FIELDS: &str = "id, user_id, delta, reason, created_at";
}

use sql_fragment::*;

pub struct PgStore {
    pool: &'static PgPool,
}

impl PgStore {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    async fn media_for_trips(&self, trip_ids: &[i64]) -> StoreResult<Vec<Media>> {
        if trip_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {MEDIA_FIELDS} FROM media WHERE trip_id = ANY($1) ORDER BY trip_id, position"
        );
        Ok(sqlx::query_as::<_, Media>(&sql)
            .bind(trip_ids)
            .fetch_all(self.pool)
            .await?)
    }

    fn join_media(&self, rows: Vec<TripRow>, media: Vec<Media>) -> Vec<Trip> {
        rows.into_iter()
            .map(|row| {
                let own = media
                    .iter()
                    .filter(|m| m.trip_id == row.id)
                    .cloned()
                    .collect();
                row.into_trip(own)
            })
            .collect()
    }
}

fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::DuplicateUser;
        }
    }
    StoreError::SqlxError(err)
}

#[async_trait]
impl RecordStore for PgStore {
    #[instrument(skip(self, new), fields(username = %new.username))]
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_FIELDS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(map_unique)
    }

    #[instrument(skip(self))]
    async fn user_by_id(&self, id: UserId) -> StoreResult<User> {
        let sql = format!("SELECT {USER_FIELDS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(StoreError::NotFound("user"))
    }

    #[instrument(skip(self, email))]
    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let sql = format!("SELECT {USER_FIELDS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?
            .ok_or(StoreError::NotFound("user"))
    }

    #[instrument(skip(self, new), fields(user = %new.user_id))]
    async fn create_trip(&self, new: NewTrip) -> StoreResult<Trip> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO trips (user_id, title, description, location, visited_at, score, verified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {TRIP_FIELDS}"
        );
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(new.user_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.location)
            .bind(new.visited_at)
            .bind(new.score)
            .bind(new.verified)
            .fetch_one(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO media (trip_id, kind, url, checksum, metadata_raw, position) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {MEDIA_FIELDS}"
        );
        let mut media = Vec::with_capacity(new.media.len());
        for (position, item) in new.media.iter().enumerate() {
            let stored = sqlx::query_as::<_, Media>(&sql)
                .bind(row.id)
                .bind(&item.kind)
                .bind(&item.url)
                .bind(&item.checksum)
                .bind(&item.metadata_raw)
                .bind(position as i32)
                .fetch_one(&mut *tx)
                .await?;
            media.push(stored);
        }

        tx.commit().await?;
        Ok(row.into_trip(media))
    }

    #[instrument(skip(self))]
    async fn trip_by_id(&self, id: TripId) -> StoreResult<Trip> {
        let sql = format!("SELECT {TRIP_FIELDS} FROM trips WHERE id = $1");
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(StoreError::NotFound("trip"))?;

        let media = self.media_for_trips(&[row.id.0]).await?;
        Ok(row.into_trip(media))
    }

    #[instrument(skip(self))]
    async fn list_trips(&self, limit: i64) -> StoreResult<Vec<Trip>> {
        let sql = format!(
            "SELECT {TRIP_FIELDS} FROM trips ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id.0).collect();
        let media = self.media_for_trips(&ids).await?;
        Ok(self.join_media(rows, media))
    }

    #[instrument(skip(self))]
    async fn trips_by_user(&self, user: UserId, limit: i64) -> StoreResult<Vec<Trip>> {
        let sql = format!(
            "SELECT {TRIP_FIELDS} FROM trips WHERE user_id = $1 \
             ORDER BY visited_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(user)
            .bind(if limit > 0 { Some(limit) } else { None })
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id.0).collect();
        let media = self.media_for_trips(&ids).await?;
        Ok(self.join_media(rows, media))
    }

    #[instrument(skip(self))]
    async fn trip_stats(&self, user: UserId) -> StoreResult<TripStats> {
        let stats = sqlx::query_as::<_, TripStats>(
            "SELECT COUNT(*) AS total, COALESCE(AVG(score), 0) AS average_score \
             FROM trips WHERE user_id = $1",
        )
        .bind(user)
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }

    #[instrument(skip(self))]
    async fn apply_points(
        &self,
        user: UserId,
        delta: i64,
        reason: PointsReason,
    ) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        // the guard makes overdrafts impossible in the same statement that
        // applies the delta; the row stays locked until commit
        let points: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET points = points + $2, updated_at = NOW() \
             WHERE id = $1 AND points + $2 >= 0 RETURNING points",
        )
        .bind(user)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(points) = points else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                    .bind(user)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                StoreError::InsufficientPoints
            } else {
                StoreError::NotFound("user")
            });
        };

        let sql = format!("UPDATE users SET level = $2 WHERE id = $1 RETURNING {USER_FIELDS}");
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user)
            .bind(levels::level_for(points))
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO points_history (user_id, delta, reason) VALUES ($1, $2, $3)")
            .bind(user)
            .bind(delta)
            .bind(reason.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn points_history(
        &self,
        user: UserId,
        limit: i64,
    ) -> StoreResult<Vec<PointsHistoryEntry>> {
        let sql = format!(
            "SELECT {HISTORY_FIELDS} FROM points_history WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        Ok(sqlx::query_as::<_, PointsHistoryEntry>(&sql)
            .bind(user)
            .bind(if limit > 0 { Some(limit) } else { None })
            .fetch_all(self.pool)
            .await?)
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    async fn create_reward(&self, new: NewReward) -> StoreResult<Reward> {
        let sql = format!(
            "INSERT INTO rewards (name, description, points_cost, inventory) \
             VALUES ($1, $2, $3, $4) RETURNING {REWARD_FIELDS}"
        );
        Ok(sqlx::query_as::<_, Reward>(&sql)
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.points_cost)
            .bind(new.inventory)
            .fetch_one(self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_rewards(&self) -> StoreResult<Vec<Reward>> {
        let sql = format!("SELECT {REWARD_FIELDS} FROM rewards ORDER BY id");
        Ok(sqlx::query_as::<_, Reward>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    async fn reward_by_id(&self, id: RewardId) -> StoreResult<Reward> {
        let sql = format!("SELECT {REWARD_FIELDS} FROM rewards WHERE id = $1");
        sqlx::query_as::<_, Reward>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(StoreError::NotFound("reward"))
    }

    #[instrument(skip(self))]
    async fn redeem_reward(
        &self,
        user: UserId,
        reward: RewardId,
    ) -> StoreResult<(Redemption, User)> {
        let mut tx = self.pool.begin().await?;

        // claim one unit and learn the cost in a single conditional update;
        // a concurrent claim of the last unit loses the guard and rolls back
        let cost: Option<i64> = sqlx::query_scalar(
            "UPDATE rewards SET inventory = inventory - 1, updated_at = NOW() \
             WHERE id = $1 AND inventory > 0 RETURNING points_cost",
        )
        .bind(reward)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(cost) = cost else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM rewards WHERE id = $1)")
                    .bind(reward)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                StoreError::RewardUnavailable
            } else {
                StoreError::NotFound("reward")
            });
        };

        let points: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET points = points - $2, updated_at = NOW() \
             WHERE id = $1 AND points >= $2 RETURNING points",
        )
        .bind(user)
        .bind(cost)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(points) = points else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                    .bind(user)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                StoreError::InsufficientPoints
            } else {
                StoreError::NotFound("user")
            });
        };

        let sql = format!("UPDATE users SET level = $2 WHERE id = $1 RETURNING {USER_FIELDS}");
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user)
            .bind(levels::level_for(points))
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO points_history (user_id, delta, reason) VALUES ($1, $2, $3)")
            .bind(user)
            .bind(-cost)
            .bind(PointsReason::Redeem.as_str())
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO redemptions (user_id, reward_id, status) VALUES ($1, $2, $3) \
             RETURNING {REDEMPTION_FIELDS}"
        );
        let redemption = sqlx::query_as::<_, Redemption>(&sql)
            .bind(user)
            .bind(reward)
            .bind(REDEMPTION_PENDING)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((redemption, updated))
    }

    #[instrument(skip(self))]
    async fn redemptions_by_user(
        &self,
        user: UserId,
        limit: i64,
    ) -> StoreResult<Vec<Redemption>> {
        let sql = format!(
            "SELECT {REDEMPTION_FIELDS} FROM redemptions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        Ok(sqlx::query_as::<_, Redemption>(&sql)
            .bind(user)
            .bind(if limit > 0 { Some(limit) } else { None })
            .fetch_all(self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    async fn count_redemptions(&self, user: UserId) -> StoreResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM redemptions WHERE user_id = $1")
                .bind(user)
                .fetch_one(self.pool)
                .await?,
        )
    }
}
