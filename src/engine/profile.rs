//! Aggregated per-user view: identity, progression numbers and recent
//! activity.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::db::models::{PointsHistoryEntry, Redemption, Trip, User, UserId};
use crate::engine::{EngineResult, levels};
use crate::store::RecordStore;

const RECENT_HISTORY: i64 = 10;
const RECENT_REDEMPTIONS: i64 = 10;
const RECENT_TRIPS: i64 = 3;

#[derive(Debug, Serialize)]
pub struct Profile {
    pub user: User,
    pub next_level: i32,
    pub points_to_next: i64,
    pub current_level_floor: i64,
    pub next_level_threshold: i64,
    pub total_trips: i64,
    pub total_redemptions: i64,
    pub average_score: f64,
    pub recent_history: Vec<PointsHistoryEntry>,
    pub recent_redemptions: Vec<Redemption>,
    pub recent_trips: Vec<Trip>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn RecordStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: UserId) -> EngineResult<Profile> {
        let user = self.store.user_by_id(user_id).await?;
        let stats = self.store.trip_stats(user_id).await?;
        let total_redemptions = self.store.count_redemptions(user_id).await?;
        let recent_history = self.store.points_history(user_id, RECENT_HISTORY).await?;
        let recent_redemptions = self
            .store
            .redemptions_by_user(user_id, RECENT_REDEMPTIONS)
            .await?;
        let recent_trips = self.store.trips_by_user(user_id, RECENT_TRIPS).await?;

        let (current, next, remaining) = levels::progress(user.points);

        Ok(Profile {
            next_level: next,
            points_to_next: remaining,
            current_level_floor: levels::threshold_for(current),
            next_level_threshold: levels::threshold_for(next),
            total_trips: stats.total,
            total_redemptions,
            average_score: (stats.average_score * 100.0).round() / 100.0,
            recent_history,
            recent_redemptions,
            recent_trips,
            user,
        })
    }

    pub async fn points_history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> EngineResult<Vec<PointsHistoryEntry>> {
        Ok(self.store.points_history(user_id, limit).await?)
    }

    pub async fn redemptions(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> EngineResult<Vec<Redemption>> {
        Ok(self.store.redemptions_by_user(user_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::db::models::{NewMedia, NewReward, NewTrip, NewUser, PointsReason};
    use crate::store::memory::MemStore;

    #[tokio::test]
    async fn profile_aggregates_stats() {
        let store = Arc::new(MemStore::new());
        let service = ProfileService::new(store.clone());

        let user = store
            .create_user(NewUser {
                username: "eva".into(),
                email: "eva@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();

        store
            .apply_points(user.id, 570, PointsReason::Activity)
            .await
            .unwrap();

        let reward = store
            .create_reward(NewReward {
                name: "Coffee".into(),
                description: "a coffee".into(),
                points_cost: 20,
                inventory: 5,
            })
            .await
            .unwrap();
        store.redeem_reward(user.id, reward.id).await.unwrap();

        store
            .create_trip(NewTrip {
                user_id: user.id,
                title: "Mountain".into(),
                description: "nice".into(),
                location: "somewhere".into(),
                visited_at: Utc::now() - TimeDelta::days(1),
                score: 75.0,
                verified: true,
                media: vec![NewMedia {
                    kind: "image".into(),
                    url: "https://example.com/1.jpg".into(),
                    checksum: "0".repeat(64),
                    metadata_raw: "{}".into(),
                }],
            })
            .await
            .unwrap();

        let profile = service.profile(user.id).await.unwrap();

        // 570 - 20 = 550 points, level 2, 450 to level 3
        assert_eq!(profile.user.points, 550);
        assert_eq!(profile.user.level, 2);
        assert_eq!(profile.next_level, 3);
        assert_eq!(profile.points_to_next, 450);
        assert_eq!(profile.current_level_floor, 500);
        assert_eq!(profile.next_level_threshold, 1000);
        assert_eq!(profile.total_trips, 1);
        assert_eq!(profile.total_redemptions, 1);
        assert_eq!(profile.average_score, 75.0);
        assert_eq!(profile.recent_history.len(), 2);
        assert_eq!(profile.recent_redemptions.len(), 1);
        assert_eq!(profile.recent_trips.len(), 1);
    }

    #[tokio::test]
    async fn profile_at_the_level_cap_reports_itself() {
        let store = Arc::new(MemStore::new());
        let service = ProfileService::new(store.clone());

        let user = store
            .create_user(NewUser {
                username: "max".into(),
                email: "max@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        store
            .apply_points(user.id, 6000, PointsReason::Activity)
            .await
            .unwrap();

        let profile = service.profile(user.id).await.unwrap();
        assert_eq!(profile.user.level, 5);
        assert_eq!(profile.next_level, 5);
        assert_eq!(profile.points_to_next, 0);
    }
}
