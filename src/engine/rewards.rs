//! Reward listing and the redemption flow.

use std::sync::Arc;

use tracing::instrument;

use crate::db::models::{Redemption, Reward, RewardId, User, UserId};
use crate::engine::{EngineError, EngineResult};
use crate::store::{RecordStore, StoreError};

#[derive(Clone)]
pub struct RewardService {
    store: Arc<dyn RecordStore>,
}

impl RewardService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list_rewards(&self) -> EngineResult<Vec<Reward>> {
        Ok(self.store.list_rewards().await?)
    }

    /// Redeem one unit of a reward for the caller's points. The checks here
    /// fast-fail obvious rejections; the store re-verifies both guards
    /// inside the transaction, so racing claims cannot oversell.
    #[instrument(skip(self), fields(user = %user, reward = %reward))]
    pub async fn redeem(
        &self,
        user: UserId,
        reward: RewardId,
    ) -> EngineResult<(Redemption, User)> {
        let found = match self.store.reward_by_id(reward).await {
            Ok(found) => found,
            Err(StoreError::NotFound(_)) => return Err(EngineError::RewardNotFound),
            Err(err) => return Err(err.into()),
        };

        if found.inventory <= 0 {
            return Err(EngineError::RewardUnavailable);
        }

        let (redemption, updated) = match self.store.redeem_reward(user, reward).await {
            Ok(done) => done,
            Err(StoreError::NotFound("reward")) => return Err(EngineError::RewardNotFound),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            redemption = %redemption.id.0,
            cost = found.points_cost,
            remaining_points = updated.points,
            "reward redeemed"
        );

        Ok((redemption, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewReward, NewUser, PointsReason};
    use crate::store::memory::MemStore;

    async fn seeded(points: i64, inventory: i32) -> (Arc<MemStore>, RewardService, UserId, RewardId)
    {
        let store = Arc::new(MemStore::new());
        let service = RewardService::new(store.clone());

        let user = store
            .create_user(NewUser {
                username: "bob".into(),
                email: "bob@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        if points > 0 {
            store
                .apply_points(user.id, points, PointsReason::Activity)
                .await
                .unwrap();
        }

        let reward = store
            .create_reward(NewReward {
                name: "Coffee".into(),
                description: "a coffee".into(),
                points_cost: 100,
                inventory,
            })
            .await
            .unwrap();

        (store, service, user.id, reward.id)
    }

    #[tokio::test]
    async fn successful_redemption_debits_and_decrements() {
        let (store, service, user, reward) = seeded(550, 5).await;

        let (redemption, updated) = service.redeem(user, reward).await.unwrap();
        assert_eq!(redemption.status, "pending");
        assert_eq!(redemption.reward_id, reward);
        assert_eq!(updated.points, 450);
        assert_eq!(updated.level, 1);

        assert_eq!(store.reward_by_id(reward).await.unwrap().inventory, 4);

        let history = store.points_history(user, 1).await.unwrap();
        assert_eq!(history[0].delta, -100);
        assert_eq!(history[0].reason, "redeem");
    }

    #[tokio::test]
    async fn unknown_reward_is_not_found() {
        let (_store, service, user, _reward) = seeded(550, 5).await;
        let err = service.redeem(user, RewardId(404)).await.unwrap_err();
        assert!(matches!(err, EngineError::RewardNotFound));
    }

    #[tokio::test]
    async fn exhausted_inventory_is_unavailable() {
        let (_store, service, user, reward) = seeded(550, 0).await;
        let err = service.redeem(user, reward).await.unwrap_err();
        assert!(matches!(err, EngineError::RewardUnavailable));
    }

    #[tokio::test]
    async fn poor_user_is_rejected() {
        let (store, service, user, reward) = seeded(40, 5).await;
        let err = service.redeem(user, reward).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientPoints));

        // nothing moved
        assert_eq!(store.reward_by_id(reward).await.unwrap().inventory, 5);
        assert_eq!(store.user_by_id(user).await.unwrap().points, 40);
    }

    #[tokio::test]
    async fn last_unit_goes_to_exactly_one_of_two_racers() {
        let store = Arc::new(MemStore::new());
        let service = RewardService::new(store.clone());

        let mut users = Vec::new();
        for name in ["carol", "dave"] {
            let user = store
                .create_user(NewUser {
                    username: name.into(),
                    email: format!("{name}@example.com"),
                    password_hash: "x".into(),
                })
                .await
                .unwrap();
            store
                .apply_points(user.id, 500, PointsReason::Activity)
                .await
                .unwrap();
            users.push(user.id);
        }

        let reward = store
            .create_reward(NewReward {
                name: "Last one".into(),
                description: "single unit".into(),
                points_cost: 100,
                inventory: 1,
            })
            .await
            .unwrap();

        let a = {
            let service = service.clone();
            let user = users[0];
            tokio::spawn(async move { service.redeem(user, reward.id).await })
        };
        let b = {
            let service = service.clone();
            let user = users[1];
            tokio::spawn(async move { service.redeem(user, reward.id).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let won = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(won, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(EngineError::RewardUnavailable)
        )));

        assert_eq!(store.reward_by_id(reward.id).await.unwrap().inventory, 0);
    }
}
