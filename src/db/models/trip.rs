use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TripId(pub i64);

/// Base trip table model, without its media. `score` and `verified` are
/// derived together at creation and never change afterwards.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TripRow {
    pub id: TripId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub visited_at: DateTime<Utc>,
    pub score: f64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A trip joined with its evidence, in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct Trip {
    pub id: TripId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub visited_at: DateTime<Utc>,
    pub score: f64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub media: Vec<Media>,
}

impl TripRow {
    pub fn into_trip(self, media: Vec<Media>) -> Trip {
        Trip {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            location: self.location,
            visited_at: self.visited_at,
            score: self.score,
            verified: self.verified,
            created_at: self.created_at,
            media,
        }
    }
}

/// One uploaded artifact attached to a trip. Immutable once stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    pub trip_id: TripId,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub checksum: String,
    pub metadata_raw: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub visited_at: DateTime<Utc>,
    pub score: f64,
    pub verified: bool,
    pub media: Vec<NewMedia>,
}

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub kind: String,
    pub url: String,
    pub checksum: String,
    pub metadata_raw: String,
}

/// Per-user trip aggregates for the profile view.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct TripStats {
    pub total: i64,
    pub average_score: f64,
}

impl From<i64> for TripId {
    fn from(value: i64) -> Self {
        TripId(value)
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
