use std::sync::LazyLock;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::util::env;

pub mod models;

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);

/// Process-wide Postgres pool. Errors if `DATABASE_URL` is not configured;
/// callers decide whether that is fatal (it is not, the in-memory store is
/// the fallback).
pub async fn db_pool() -> PgResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    async fn new_pool() -> PgResult<Self> {
        let db_url = env::env()
            .database_url
            .as_deref()
            .ok_or(PgError::Unconfigured)?;

        let pool = sqlx::PgPool::connect(db_url).await?;
        Ok(Self { pool })
    }
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("DATABASE_URL is not configured")]
    Unconfigured,
}
