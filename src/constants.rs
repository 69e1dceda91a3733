pub const SERVER_PORT: u16 = 8080;

pub const DEFAULT_TRIPS_LIMIT: i64 = 20;
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

pub const LEADERBOARD_KEY: &str = "leaderboard:points";

pub const TOKEN_EXPIRY_HOURS: i64 = 24 * 7;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Cumulative point totals at which each level begins. Index == level; the
/// last entry is the level cap.
pub const LEVEL_THRESHOLDS: [i64; 6] = [0, 100, 500, 1000, 2000, 5000];

pub const BASE_POINTS: i64 = 20;
pub const VERIFIED_BONUS_POINTS: i64 = 20;
pub const CONFIDENCE_POINTS_SCALE: f64 = 50.0;

pub const CONFIDENCE_BASE: f64 = 0.4;
pub const RECENCY_BONUS: f64 = 0.2;
pub const DEVICE_BONUS: f64 = 0.2;
pub const SIGNATURE_BONUS: f64 = 0.2;
pub const RECENCY_WINDOW_HOURS: f64 = 6.0;
pub const MAX_CAPTURE_SKEW_HOURS: f64 = 72.0;
pub const VERIFY_THRESHOLD: f64 = 0.6;

pub const CHECKSUM_HEX_LEN: usize = 64;

/// Tunable knobs for the evidence scoring pass. Every weight and cutoff the
/// evaluator uses lives here rather than inline in the scoring code.
#[derive(Debug, Clone, Copy)]
pub struct ConfidencePolicy {
    pub base: f64,
    pub recency_bonus: f64,
    pub device_bonus: f64,
    pub signature_bonus: f64,
    pub recency_window_hours: f64,
    pub max_skew_hours: f64,
    pub verify_threshold: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            base: CONFIDENCE_BASE,
            recency_bonus: RECENCY_BONUS,
            device_bonus: DEVICE_BONUS,
            signature_bonus: SIGNATURE_BONUS,
            recency_window_hours: RECENCY_WINDOW_HOURS,
            max_skew_hours: MAX_CAPTURE_SKEW_HOURS,
            verify_threshold: VERIFY_THRESHOLD,
        }
    }
}
