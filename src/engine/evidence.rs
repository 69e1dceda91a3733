//! Structural validation and trust scoring of capture metadata.
//!
//! Both passes are pure: the validator decodes and range-checks one media
//! item's raw metadata, the evaluator turns a validated record plus the
//! trip's claimed visit time into a confidence in `[0, 1]`.

use chrono::{DateTime, Utc};
use ring::digest;
use serde::Deserialize;

use crate::constants::{CHECKSUM_HEX_LEN, ConfidencePolicy};
use crate::engine::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
struct RawCapture {
    #[serde(default)]
    captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    device: String,
    #[serde(default)]
    signature: String,
}

/// Decoded and range-checked capture metadata. Ephemeral: lives only for
/// the duration of a verification pass; the raw string is what gets stored.
#[derive(Debug, Clone)]
pub struct CaptureMetadata {
    pub captured_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub device: Option<String>,
    pub signature: Option<String>,
}

/// Decode one media item's raw metadata and check its shape.
pub fn parse_metadata(raw: &str) -> EngineResult<CaptureMetadata> {
    if raw.is_empty() {
        return Err(EngineError::MissingMetadata);
    }

    let raw: RawCapture =
        serde_json::from_str(raw).map_err(|_| EngineError::MalformedMetadata)?;

    let captured_at = raw.captured_at.ok_or(EngineError::MissingCaptureTime)?;

    if !(-90.0..=90.0).contains(&raw.latitude) || !(-180.0..=180.0).contains(&raw.longitude) {
        return Err(EngineError::InvalidCoordinates);
    }
    // (0, 0) is treated as "coordinates absent", not a real fix
    if raw.latitude == 0.0 && raw.longitude == 0.0 {
        return Err(EngineError::InvalidCoordinates);
    }

    Ok(CaptureMetadata {
        captured_at,
        latitude: raw.latitude,
        longitude: raw.longitude,
        device: Some(raw.device).filter(|d| !d.is_empty()),
        signature: Some(raw.signature).filter(|s| !s.is_empty()),
    })
}

/// Score one validated record against the trip's claimed visit time.
///
/// A capture more than `max_skew_hours` away from the visit is a hard
/// rejection, not a low score; a single such item aborts the whole trip.
pub fn evaluate(
    meta: &CaptureMetadata,
    visited_at: DateTime<Utc>,
    policy: &ConfidencePolicy,
) -> EngineResult<f64> {
    let diff_hours = (visited_at - meta.captured_at).num_seconds().abs() as f64 / 3600.0;
    if diff_hours > policy.max_skew_hours {
        return Err(EngineError::InconsistentCaptureTime);
    }

    let mut confidence = policy.base;
    if diff_hours <= policy.recency_window_hours {
        confidence += policy.recency_bonus;
    }
    if meta.device.is_some() {
        confidence += policy.device_bonus;
    }
    if meta.signature.is_some() {
        confidence += policy.signature_bonus;
    }

    Ok(confidence.min(1.0))
}

/// Syntactic check for a 64-character hex digest.
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == CHECKSUM_HEX_LEN && hex::decode(value).is_ok()
}

/// Placeholder digest for media submitted without a checksum, derived from
/// the locator rather than the uploaded bytes. It authenticates nothing.
pub fn derive_checksum(url: &str) -> String {
    hex::encode(digest::digest(&digest::SHA256, url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn policy() -> ConfidencePolicy {
        ConfidencePolicy::default()
    }

    fn meta_json(captured_at: DateTime<Utc>, device: &str, signature: &str) -> String {
        serde_json::json!({
            "captured_at": captured_at.to_rfc3339(),
            "latitude": 10.1,
            "longitude": 20.2,
            "device": device,
            "signature": signature,
        })
        .to_string()
    }

    #[test]
    fn empty_metadata_is_missing() {
        assert!(matches!(
            parse_metadata(""),
            Err(EngineError::MissingMetadata)
        ));
    }

    #[test]
    fn garbage_metadata_is_malformed() {
        assert!(matches!(
            parse_metadata("not json at all"),
            Err(EngineError::MalformedMetadata)
        ));
    }

    #[test]
    fn empty_object_is_missing_capture_time() {
        assert!(matches!(
            parse_metadata("{}"),
            Err(EngineError::MissingCaptureTime)
        ));
    }

    #[test]
    fn out_of_range_coordinates_rejected() {
        let raw = serde_json::json!({
            "captured_at": Utc::now().to_rfc3339(),
            "latitude": 91.0,
            "longitude": 10.0,
        })
        .to_string();

        assert!(matches!(
            parse_metadata(&raw),
            Err(EngineError::InvalidCoordinates)
        ));
    }

    #[test]
    fn origin_coordinates_treated_as_absent() {
        let raw = serde_json::json!({
            "captured_at": Utc::now().to_rfc3339(),
            "latitude": 0.0,
            "longitude": 0.0,
        })
        .to_string();

        assert!(matches!(
            parse_metadata(&raw),
            Err(EngineError::InvalidCoordinates)
        ));
    }

    #[test]
    fn empty_device_and_signature_normalize_to_none() {
        let visited = Utc::now();
        let meta = parse_metadata(&meta_json(visited, "", "")).unwrap();
        assert!(meta.device.is_none());
        assert!(meta.signature.is_none());
    }

    #[test]
    fn full_evidence_scores_one() {
        let visited = Utc::now();
        let meta = parse_metadata(&meta_json(visited - TimeDelta::hours(1), "sony-a7", "sig"))
            .unwrap();

        assert_eq!(meta.latitude, 10.1);
        assert_eq!(meta.longitude, 20.2);

        let confidence = evaluate(&meta, visited, &policy()).unwrap();
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn bare_evidence_scores_base_plus_recency() {
        let visited = Utc::now();
        let meta = parse_metadata(&meta_json(visited, "", "")).unwrap();

        let confidence = evaluate(&meta, visited, &policy()).unwrap();
        assert!((confidence - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_capture_loses_recency_bonus() {
        let visited = Utc::now();
        let meta = parse_metadata(&meta_json(visited - TimeDelta::hours(12), "", "")).unwrap();

        let confidence = evaluate(&meta, visited, &policy()).unwrap();
        assert!((confidence - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn excessive_skew_is_a_hard_rejection() {
        let visited = Utc::now();
        let meta = parse_metadata(&meta_json(visited - TimeDelta::hours(200), "x", "y")).unwrap();

        assert!(matches!(
            evaluate(&meta, visited, &policy()),
            Err(EngineError::InconsistentCaptureTime)
        ));
    }

    #[test]
    fn skew_direction_does_not_matter() {
        let visited = Utc::now();
        let meta = parse_metadata(&meta_json(visited + TimeDelta::hours(200), "x", "y")).unwrap();

        assert!(matches!(
            evaluate(&meta, visited, &policy()),
            Err(EngineError::InconsistentCaptureTime)
        ));
    }

    #[test]
    fn derived_checksum_is_a_valid_digest() {
        let checksum = derive_checksum("https://example.com/image.jpg");
        assert!(is_hex_digest(&checksum));

        // deterministic for a given locator
        assert_eq!(checksum, derive_checksum("https://example.com/image.jpg"));
    }

    #[test]
    fn digest_syntax_check() {
        assert!(is_hex_digest(
            "58d3e5cfa20c8c2d2a5f8ff1e9fcdc84f1147aa2c3e8cb1c6888f0e9cb9e7a34"
        ));
        assert!(!is_hex_digest("deadbeef"));
        assert!(!is_hex_digest(&"z".repeat(64)));
    }
}
