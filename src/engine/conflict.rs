use chrono::{NaiveDateTime, Utc};
use ulid::Ulid;

use crate::limits::{CANCEL_WINDOW_MIN, MAX_CLASS_DURATION_MIN};
use crate::model::{Minutes, Slot};

use super::EngineError;

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn validate_duration(duration_min: Minutes) -> Result<(), EngineError> {
    if duration_min <= 0 {
        return Err(EngineError::LimitExceeded("class duration must be positive"));
    }
    if duration_min > MAX_CLASS_DURATION_MIN {
        return Err(EngineError::LimitExceeded("class duration too long"));
    }
    Ok(())
}

/// True when a self-service cancellation at `now` is still allowed for a
/// class starting at `starts_at`. Exactly at the 24h boundary is allowed;
/// a class that already started is not this policy's concern.
pub fn cancel_window_open(now: NaiveDateTime, starts_at: NaiveDateTime) -> bool {
    if starts_at <= now {
        return true;
    }
    (starts_at - now).num_minutes() >= CANCEL_WINDOW_MIN
}

/// First occupied interval colliding with `candidate` (closed-interval
/// overlap), returning the owning booking id.
pub fn find_conflict(candidate: &Slot, occupied: &[(Ulid, Slot)]) -> Option<Ulid> {
    occupied
        .iter()
        .find(|(_, slot)| slot.overlaps(candidate))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn window_open_at_exactly_24h() {
        let start = dt(10, 0);
        assert!(cancel_window_open(start - Duration::hours(24), start));
    }

    #[test]
    fn window_closed_at_23h59m() {
        let start = dt(10, 0);
        assert!(!cancel_window_open(
            start - Duration::hours(23) - Duration::minutes(59),
            start
        ));
    }

    #[test]
    fn window_closed_one_minute_inside() {
        let start = dt(10, 0);
        assert!(!cancel_window_open(start - Duration::minutes(1439), start));
        assert!(cancel_window_open(start - Duration::minutes(1440), start));
    }

    #[test]
    fn started_class_not_blocked_by_window() {
        let start = dt(10, 0);
        assert!(cancel_window_open(start, start));
        assert!(cancel_window_open(start + Duration::hours(1), start));
    }

    #[test]
    fn conflict_within_existing_interval() {
        // Existing 60-minute class at 10:00; a 10:30 start collides.
        let existing_id = Ulid::new();
        let occupied = vec![(existing_id, Slot::starting_at(dt(10, 0), 60))];
        let candidate = Slot::starting_at(dt(10, 30), 60);
        assert_eq!(find_conflict(&candidate, &occupied), Some(existing_id));
    }

    #[test]
    fn no_conflict_one_minute_after_end() {
        let occupied = vec![(Ulid::new(), Slot::starting_at(dt(10, 0), 60))];
        let candidate = Slot::starting_at(dt(11, 1), 60);
        assert_eq!(find_conflict(&candidate, &occupied), None);
    }

    #[test]
    fn exact_end_collision_conflicts() {
        let existing_id = Ulid::new();
        let occupied = vec![(existing_id, Slot::starting_at(dt(10, 0), 60))];
        let candidate = Slot::starting_at(dt(11, 0), 60);
        assert_eq!(find_conflict(&candidate, &occupied), Some(existing_id));
    }

    #[test]
    fn exact_start_collision_conflicts() {
        let existing_id = Ulid::new();
        let occupied = vec![(existing_id, Slot::starting_at(dt(10, 0), 60))];
        let candidate = Slot::starting_at(dt(9, 0), 60); // ends exactly at 10:00
        assert_eq!(find_conflict(&candidate, &occupied), Some(existing_id));
    }

    #[test]
    fn enveloping_candidate_conflicts() {
        // A long candidate swallowing a short existing class is still a
        // conflict, even though its start precedes the existing interval.
        let existing_id = Ulid::new();
        let occupied = vec![(existing_id, Slot::starting_at(dt(10, 0), 60))];
        let candidate = Slot::starting_at(dt(9, 0), 180);
        assert_eq!(find_conflict(&candidate, &occupied), Some(existing_id));
    }

    #[test]
    fn duration_bounds() {
        assert!(validate_duration(60).is_ok());
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(-30).is_err());
        assert!(validate_duration(MAX_CLASS_DURATION_MIN + 1).is_err());
    }
}
