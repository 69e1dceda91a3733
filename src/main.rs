use std::sync::Arc;

use thiserror::Error;

use crate::api::server::AppState;
use crate::auth::{AuthService, Jwt};
use crate::db::PgError;
use crate::engine::profile::ProfileService;
use crate::engine::rewards::RewardService;
use crate::engine::trips::TripService;
use crate::leaderboard::memory::MemoryLeaderboard;
use crate::leaderboard::redis::RedisLeaderboard;
use crate::leaderboard::{Leaderboard, LeaderboardError};
use crate::store::memory::MemStore;
use crate::store::pg::PgStore;
use crate::store::{RecordStore, StoreError};
use crate::util::{env, telemetry};

mod api;
mod auth;
mod constants;
mod db;
mod engine;
mod leaderboard;
mod store;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Pg(#[from] PgError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let env = env::env();

    tracing::info!("starting waypost api");

    let store: Arc<dyn RecordStore> = match &env.database_url {
        Some(_) => {
            let pool = db::db_pool().await?;
            sqlx::migrate!("./migrations")
                .run(pool)
                .await
                .map_err(PgError::from)?;
            tracing::info!("using postgres record store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, falling back to the in-memory store");
            let mem = MemStore::new();
            seed_demo_rewards(&mem).await?;
            Arc::new(mem)
        }
    };

    let leaderboard: Option<Arc<dyn Leaderboard>> = match &env.redis_url {
        Some(url) => {
            tracing::info!("using redis leaderboard");
            Some(Arc::new(RedisLeaderboard::connect(url).await?))
        }
        None => {
            tracing::info!("using in-memory leaderboard");
            Some(Arc::new(MemoryLeaderboard::new()))
        }
    };

    let auth = AuthService::new(
        store.clone(),
        Jwt::new(&env.jwt_secret, env.token_expiry_hours),
    );
    let state = Arc::new(AppState {
        auth,
        trips: TripService::new(store.clone(), leaderboard),
        rewards: RewardService::new(store.clone()),
        profile: ProfileService::new(store),
    });

    api::server::serve(state).await?;
    Ok(())
}

/// The in-memory store starts empty; give database-less dev runs something
/// to redeem against.
async fn seed_demo_rewards(store: &MemStore) -> Result<()> {
    use crate::db::models::NewReward;

    for (name, description, points_cost, inventory) in [
        ("Sticker pack", "a handful of waypost stickers", 50, 100),
        ("Enamel pin", "the wayfarer pin", 200, 25),
        ("Tote bag", "carries approximately one tent", 500, 10),
    ] {
        store
            .create_reward(NewReward {
                name: name.into(),
                description: description.into(),
                points_cost,
                inventory,
            })
            .await?;
    }

    Ok(())
}
