//! The trip authenticity and gamification engine: evidence validation and
//! scoring, trip verification, level progression, leaderboard ranking and
//! reward redemption. Everything here is storage-agnostic; collaborators
//! come in through the [`RecordStore`](crate::store::RecordStore) and
//! [`Leaderboard`](crate::leaderboard::Leaderboard) traits.

use thiserror::Error;

use crate::leaderboard::LeaderboardError;
use crate::store::StoreError;

pub mod evidence;
pub mod levels;
pub mod profile;
pub mod rewards;
pub mod trips;

pub type EngineResult<T> = core::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("at least one media item is required")]
    NoMediaProvided,

    #[error("media checksum must be a 64-character hex digest")]
    InvalidChecksumFormat,

    #[error("media metadata is required")]
    MissingMetadata,

    #[error("media metadata is not valid JSON")]
    MalformedMetadata,

    #[error("media metadata is missing a capture time")]
    MissingCaptureTime,

    #[error("media metadata has invalid coordinates")]
    InvalidCoordinates,

    #[error("media capture time is inconsistent with the trip date")]
    InconsistentCaptureTime,

    #[error("reward not found")]
    RewardNotFound,

    #[error("reward unavailable")]
    RewardUnavailable,

    #[error("insufficient points")]
    InsufficientPoints,

    #[error("leaderboard not configured")]
    LeaderboardUnavailable,

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientPoints => Self::InsufficientPoints,
            StoreError::RewardUnavailable => Self::RewardUnavailable,
            other => Self::Storage(other),
        }
    }
}
