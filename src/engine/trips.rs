//! Trip verification: turns a submission with evidence into a stored,
//! scored trip and the point award that follows from it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::constants::{
    BASE_POINTS, CONFIDENCE_POINTS_SCALE, ConfidencePolicy, VERIFIED_BONUS_POINTS,
};
use crate::db::models::{NewMedia, NewTrip, PointsReason, Trip, TripId, UserId};
use crate::engine::{EngineError, EngineResult, evidence};
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::store::RecordStore;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTrip {
    pub title: String,
    pub description: String,
    pub location: String,
    pub visited_at: DateTime<Utc>,
    pub media: Vec<MediaInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub checksum: Option<String>,
    pub metadata_raw: String,
}

#[derive(Clone)]
pub struct TripService {
    store: Arc<dyn RecordStore>,
    leaderboard: Option<Arc<dyn Leaderboard>>,
    policy: ConfidencePolicy,
}

impl TripService {
    pub fn new(store: Arc<dyn RecordStore>, leaderboard: Option<Arc<dyn Leaderboard>>) -> Self {
        Self {
            store,
            leaderboard,
            policy: ConfidencePolicy::default(),
        }
    }

    /// Validate and score every media item, then persist the trip, award
    /// points and push the new total to the leaderboard. Any evidence
    /// failure aborts the whole submission before the first write.
    #[instrument(skip(self, input), fields(user = %user_id, media = input.media.len()))]
    pub async fn create_trip(&self, user_id: UserId, input: CreateTrip) -> EngineResult<Trip> {
        if input.media.is_empty() {
            return Err(EngineError::NoMediaProvided);
        }

        let mut media = Vec::with_capacity(input.media.len());
        let mut confidence_sum = 0.0;
        for item in &input.media {
            let checksum = match item.checksum.as_deref().filter(|c| !c.is_empty()) {
                Some(supplied) => {
                    if !evidence::is_hex_digest(supplied) {
                        return Err(EngineError::InvalidChecksumFormat);
                    }
                    supplied.to_string()
                }
                None => evidence::derive_checksum(&item.url),
            };

            let meta = evidence::parse_metadata(&item.metadata_raw)?;
            confidence_sum += evidence::evaluate(&meta, input.visited_at, &self.policy)?;

            media.push(NewMedia {
                kind: item.kind.clone(),
                url: item.url.clone(),
                checksum,
                metadata_raw: item.metadata_raw.clone(),
            });
        }

        let confidence = confidence_sum / media.len() as f64;
        let verified = confidence >= self.policy.verify_threshold;
        let score = score_for(confidence);

        let trip = self
            .store
            .create_trip(NewTrip {
                user_id,
                title: input.title.trim().to_string(),
                description: input.description.trim().to_string(),
                location: input.location.trim().to_string(),
                visited_at: input.visited_at,
                score,
                verified,
                media,
            })
            .await?;

        let points = award_for(confidence, verified);
        let user = self
            .store
            .apply_points(user_id, points, PointsReason::Activity)
            .await?;

        tracing::info!(
            trip = %trip.id,
            score,
            verified,
            points,
            "trip created"
        );

        // the leaderboard is a denormalized view; losing a push must never
        // fail the submission
        if let Some(lb) = &self.leaderboard {
            if let Err(err) = lb.record_score(user.id, user.points).await {
                tracing::warn!(error = ?err, user = %user.id, "leaderboard push failed");
            }
        }

        Ok(trip)
    }

    pub async fn trip(&self, id: TripId) -> EngineResult<Trip> {
        Ok(self.store.trip_by_id(id).await?)
    }

    pub async fn list_trips(&self, limit: i64) -> EngineResult<Vec<Trip>> {
        Ok(self.store.list_trips(limit).await?)
    }

    pub async fn leaderboard_top(&self, limit: i64) -> EngineResult<Vec<LeaderboardEntry>> {
        let Some(lb) = &self.leaderboard else {
            return Err(EngineError::LeaderboardUnavailable);
        };
        Ok(lb.top(limit).await?)
    }
}

/// Aggregate confidence rescaled to the 0–100, one-decimal display score.
fn score_for(confidence: f64) -> f64 {
    (confidence * 1000.0).round() / 10.0
}

/// Point award for one trip: flat base, confidence-scaled bonus, and a
/// verification bonus exactly when the 0.6 cutoff is met.
fn award_for(confidence: f64, verified: bool) -> i64 {
    let mut points = BASE_POINTS + (confidence * CONFIDENCE_POINTS_SCALE).round() as i64;
    if verified {
        points += VERIFIED_BONUS_POINTS;
    }
    points
}
