use crate::model::Minutes;

/// Self-service cancellation lockout: requests inside this window before
/// the class starts are rejected. Exactly at the boundary still succeeds.
pub const CANCEL_WINDOW_MIN: Minutes = 24 * 60;

/// Longest class duration a template or instance may carry.
pub const MAX_CLASS_DURATION_MIN: Minutes = 24 * 60;

/// Notification dispatch attempts before the failure surfaces.
pub const NOTIFY_RETRY_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubles on each subsequent attempt.
pub const NOTIFY_RETRY_BASE_MS: u64 = 200;

/// Booking notes are truncated to this many bytes before persisting.
pub const MAX_NOTE_LEN: usize = 256;
