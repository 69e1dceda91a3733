//! In-memory record store.
//!
//! Backs tests and database-less dev runs. A single mutex around the whole
//! dataset gives every trait operation the same all-or-nothing semantics the
//! Postgres implementation gets from transactions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{RecordStore, StoreError, StoreResult};
use crate::db::models::reward::REDEMPTION_PENDING;
use crate::db::models::{
    Media, NewReward, NewTrip, NewUser, PointsHistoryEntry, PointsReason, Redemption, RedemptionId,
    Reward, RewardId, Trip, TripId, TripStats, User, UserId,
};
use crate::engine::levels;

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

#[derive(Default)]
struct MemInner {
    seq: i64,
    users: HashMap<i64, User>,
    trips: Vec<Trip>,
    rewards: HashMap<i64, Reward>,
    redemptions: Vec<Redemption>,
    history: Vec<PointsHistoryEntry>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemInner {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    /// The shared "apply delta, recompute level, append history" step. The
    /// caller holds the lock, so the read-modify-write is serialized.
    fn apply_points(
        &mut self,
        user: UserId,
        delta: i64,
        reason: PointsReason,
    ) -> StoreResult<User> {
        let entry_id = self.next_id();
        let record = self
            .users
            .get_mut(&user.0)
            .ok_or(StoreError::NotFound("user"))?;

        if delta < 0 && record.points < -delta {
            return Err(StoreError::InsufficientPoints);
        }

        record.points += delta;
        record.level = levels::level_for(record.points);
        record.updated_at = Utc::now();
        let updated = record.clone();

        self.history.push(PointsHistoryEntry {
            id: entry_id,
            user_id: user,
            delta,
            reason: reason.as_str().to_string(),
            created_at: Utc::now(),
        });

        Ok(updated)
    }
}

#[async_trait]
impl RecordStore for MemStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let taken = inner
            .users
            .values()
            .any(|u| u.username == new.username || u.email == new.email);
        if taken {
            return Err(StoreError::DuplicateUser);
        }

        let id = inner.next_id();
        let now = Utc::now();
        let user = User {
            id: UserId(id),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            points: 0,
            level: 0,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<User> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .users
            .get(&id.0)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn create_trip(&self, new: NewTrip) -> StoreResult<Trip> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        if !inner.users.contains_key(&new.user_id.0) {
            return Err(StoreError::NotFound("user"));
        }

        let trip_id = inner.next_id();
        let now = Utc::now();

        let media = new
            .media
            .into_iter()
            .enumerate()
            .map(|(idx, m)| {
                let id = inner.next_id();
                Media {
                    id,
                    trip_id: TripId(trip_id),
                    kind: m.kind,
                    url: m.url,
                    checksum: m.checksum,
                    metadata_raw: m.metadata_raw,
                    position: idx as i32,
                    created_at: now,
                }
            })
            .collect();

        let trip = Trip {
            id: TripId(trip_id),
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            location: new.location,
            visited_at: new.visited_at,
            score: new.score,
            verified: new.verified,
            created_at: now,
            media,
        };
        inner.trips.push(trip.clone());
        Ok(trip)
    }

    async fn trip_by_id(&self, id: TripId) -> StoreResult<Trip> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .trips
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("trip"))
    }

    async fn list_trips(&self, limit: i64) -> StoreResult<Vec<Trip>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .trips
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn trips_by_user(&self, user: UserId, limit: i64) -> StoreResult<Vec<Trip>> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut trips: Vec<Trip> = inner
            .trips
            .iter()
            .filter(|t| t.user_id == user)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));
        if limit > 0 {
            trips.truncate(limit as usize);
        }
        Ok(trips)
    }

    async fn trip_stats(&self, user: UserId) -> StoreResult<TripStats> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let scores: Vec<f64> = inner
            .trips
            .iter()
            .filter(|t| t.user_id == user)
            .map(|t| t.score)
            .collect();

        let total = scores.len() as i64;
        let average_score = if total > 0 {
            scores.iter().sum::<f64>() / total as f64
        } else {
            0.0
        };

        Ok(TripStats {
            total,
            average_score,
        })
    }

    async fn apply_points(
        &self,
        user: UserId,
        delta: i64,
        reason: PointsReason,
    ) -> StoreResult<User> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.apply_points(user, delta, reason)
    }

    async fn points_history(
        &self,
        user: UserId,
        limit: i64,
    ) -> StoreResult<Vec<PointsHistoryEntry>> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut entries: Vec<PointsHistoryEntry> = inner
            .history
            .iter()
            .filter(|h| h.user_id == user)
            .rev()
            .cloned()
            .collect();
        if limit > 0 {
            entries.truncate(limit as usize);
        }
        Ok(entries)
    }

    async fn create_reward(&self, new: NewReward) -> StoreResult<Reward> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let id = inner.next_id();
        let now = Utc::now();
        let reward = Reward {
            id: RewardId(id),
            name: new.name,
            description: new.description,
            points_cost: new.points_cost,
            inventory: new.inventory,
            created_at: now,
            updated_at: now,
        };
        inner.rewards.insert(id, reward.clone());
        Ok(reward)
    }

    async fn list_rewards(&self) -> StoreResult<Vec<Reward>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut rewards: Vec<Reward> = inner.rewards.values().cloned().collect();
        rewards.sort_by_key(|r| r.id.0);
        Ok(rewards)
    }

    async fn reward_by_id(&self, id: RewardId) -> StoreResult<Reward> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .rewards
            .get(&id.0)
            .cloned()
            .ok_or(StoreError::NotFound("reward"))
    }

    async fn redeem_reward(
        &self,
        user: UserId,
        reward: RewardId,
    ) -> StoreResult<(Redemption, User)> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let (cost, inventory) = {
            let r = inner
                .rewards
                .get(&reward.0)
                .ok_or(StoreError::NotFound("reward"))?;
            (r.points_cost, r.inventory)
        };
        if inventory <= 0 {
            return Err(StoreError::RewardUnavailable);
        }

        // debits or fails without touching anything else
        let updated = inner.apply_points(user, -cost, PointsReason::Redeem)?;

        let r = inner
            .rewards
            .get_mut(&reward.0)
            .expect("reward vanished under lock");
        r.inventory -= 1;
        r.updated_at = Utc::now();

        let id = inner.next_id();
        let redemption = Redemption {
            id: RedemptionId(id),
            user_id: user,
            reward_id: reward,
            status: REDEMPTION_PENDING.to_string(),
            created_at: Utc::now(),
        };
        inner.redemptions.push(redemption.clone());

        Ok((redemption, updated))
    }

    async fn redemptions_by_user(
        &self,
        user: UserId,
        limit: i64,
    ) -> StoreResult<Vec<Redemption>> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut entries: Vec<Redemption> = inner
            .redemptions
            .iter()
            .filter(|r| r.user_id == user)
            .rev()
            .cloned()
            .collect();
        if limit > 0 {
            entries.truncate(limit as usize);
        }
        Ok(entries)
    }

    async fn count_redemptions(&self, user: UserId) -> StoreResult<i64> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.redemptions.iter().filter(|r| r.user_id == user).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn user_with_points(store: &MemStore, points: i64) -> User {
        let user = store
            .create_user(NewUser {
                username: "eva".into(),
                email: "eva@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();

        if points > 0 {
            store
                .apply_points(user.id, points, PointsReason::Activity)
                .await
                .unwrap()
        } else {
            user
        }
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let store = MemStore::new();
        user_with_points(&store, 0).await;

        let err = store
            .create_user(NewUser {
                username: "eva".into(),
                email: "other@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUser));
    }

    #[tokio::test]
    async fn apply_points_keeps_level_and_ledger_in_step() {
        let store = MemStore::new();
        let user = user_with_points(&store, 0).await;

        let updated = store
            .apply_points(user.id, 550, PointsReason::Activity)
            .await
            .unwrap();
        assert_eq!(updated.points, 550);
        assert_eq!(updated.level, 2);

        let history = store.points_history(user.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].delta, 550);
        assert_eq!(history[0].reason, "activity");
    }

    #[tokio::test]
    async fn overdraft_changes_nothing() {
        let store = MemStore::new();
        let user = user_with_points(&store, 30).await;

        let err = store
            .apply_points(user.id, -50, PointsReason::Redeem)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientPoints));

        let reloaded = store.user_by_id(user.id).await.unwrap();
        assert_eq!(reloaded.points, 30);
        assert_eq!(store.points_history(user.id, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_awards_both_land() {
        let store = Arc::new(MemStore::new());
        let user = user_with_points(&store, 0).await;

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .apply_points(user.id, 50, PointsReason::Activity)
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .apply_points(user.id, 70, PointsReason::Activity)
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let reloaded = store.user_by_id(user.id).await.unwrap();
        assert_eq!(reloaded.points, 120);
        assert_eq!(reloaded.level, levels::level_for(120));
    }

    #[tokio::test]
    async fn failed_redemption_leaves_no_partial_state() {
        let store = MemStore::new();
        let user = user_with_points(&store, 10).await;
        let reward = store
            .create_reward(NewReward {
                name: "Sticker".into(),
                description: "a sticker".into(),
                points_cost: 100,
                inventory: 3,
            })
            .await
            .unwrap();

        let err = store.redeem_reward(user.id, reward.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientPoints));

        assert_eq!(store.reward_by_id(reward.id).await.unwrap().inventory, 3);
        assert_eq!(store.user_by_id(user.id).await.unwrap().points, 10);
        assert_eq!(store.count_redemptions(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let store = MemStore::new();
        let user = user_with_points(&store, 0).await;

        for delta in [10, 20, 30, 40, 50] {
            store
                .apply_points(user.id, delta, PointsReason::Activity)
                .await
                .unwrap();
        }

        let history = store.points_history(user.id, 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].delta, 50);
        assert_eq!(history[2].delta, 30);
    }
}
