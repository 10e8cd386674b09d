use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Class durations and clock arithmetic are whole minutes.
pub type Minutes = i64;

/// Closed interval `[start, end]` over timezone-naive datetimes.
///
/// Booking conflicts are inclusive at both ends: a class starting exactly
/// when another ends still collides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start <= end, "Slot start must not be after end");
        Self { start, end }
    }

    /// The interval occupied by a class starting at `start` and running
    /// for `duration_min` minutes.
    pub fn starting_at(start: NaiveDateTime, duration_min: Minutes) -> Self {
        Self::new(start, start + Duration::minutes(duration_min))
    }

    pub fn duration_min(&self) -> Minutes {
        (self.end - self.start).num_minutes()
    }

    /// Closed-interval overlap; commutative.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

/// A concrete scheduled class occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaInstance {
    pub id: Ulid,
    pub starts_at: NaiveDateTime,
    pub class_id: Ulid,
    pub coach_id: Ulid,
    pub facility_id: Ulid,
    /// Back-reference to the template this instance was materialized from.
    pub recurrence_id: Option<Ulid>,
    pub is_visible: bool,
    /// Soft delete. Repository reads exclude non-null values by default so
    /// historical bookings stay referential.
    pub deleted_at: Option<NaiveDateTime>,
}

impl AgendaInstance {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A weekly-repeating class slot template. Mirrors `AgendaInstance` minus
/// the concrete date; deletion never cascades to materialized instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaRecurrence {
    pub id: Ulid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub class_id: Ulid,
    pub coach_id: Ulid,
    pub facility_id: Ulid,
}

impl AgendaRecurrence {
    /// The concrete start instant this template produces on `date`.
    pub fn starts_at_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    CheckedIn,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// One-directional transitions out of `Booked`; `Cancelled` is terminal.
    /// Forced (admin) cancellation may additionally leave `CheckedIn` and
    /// `NoShow`.
    pub fn can_transition(self, to: BookingStatus, forced: bool) -> bool {
        use BookingStatus::*;
        match (self, to) {
            (Booked, CheckedIn) | (Booked, NoShow) | (Booked, Cancelled) => true,
            (CheckedIn, Cancelled) | (NoShow, Cancelled) => forced,
            _ => false,
        }
    }

    pub fn is_active(self) -> bool {
        self != BookingStatus::Cancelled
    }
}

/// A user's reservation against one agenda instance, backed by exactly one
/// consumed credit unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaBooking {
    pub id: Ulid,
    pub agenda_id: Ulid,
    pub user_id: Ulid,
    pub credit_id: Ulid,
    pub status: BookingStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A consumable balance from a purchased package, scoped to a class type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditUnit {
    pub id: Ulid,
    pub user_id: Ulid,
    pub class_type_id: Ulid,
    pub expires_at: NaiveDateTime,
    pub remaining: u32,
}

impl CreditUnit {
    pub fn is_eligible(&self, class_type_id: Ulid, now: NaiveDateTime) -> bool {
        self.class_type_id == class_type_id && self.remaining > 0 && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: Ulid,
    pub name: String,
    pub class_type_id: Ulid,
    pub duration_min: Minutes,
    /// Max concurrent bookings on one instance.
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Ulid,
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub facility_name: String,
}

// ── Repository query specification ───────────────────────────────

/// Named filter fields for booking listings. Repositories interpret this
/// struct; service code never threads query-builder fragments.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub agenda_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    pub statuses: Option<Vec<BookingStatus>>,
    pub limit: Option<usize>,
}

impl BookingQuery {
    /// All non-cancelled bookings on one instance.
    pub fn active_for_agenda(agenda_id: Ulid) -> Self {
        Self {
            agenda_id: Some(agenda_id),
            statuses: Some(vec![
                BookingStatus::Booked,
                BookingStatus::CheckedIn,
                BookingStatus::NoShow,
            ]),
            ..Self::default()
        }
    }

    /// All non-cancelled bookings held by one user.
    pub fn active_for_user(user_id: Ulid) -> Self {
        Self {
            user_id: Some(user_id),
            statuses: Some(vec![
                BookingStatus::Booked,
                BookingStatus::CheckedIn,
                BookingStatus::NoShow,
            ]),
            ..Self::default()
        }
    }

    pub fn matches(&self, booking: &AgendaBooking) -> bool {
        if let Some(aid) = self.agenda_id
            && booking.agenda_id != aid {
                return false;
            }
        if let Some(uid) = self.user_id
            && booking.user_id != uid {
                return false;
            }
        if let Some(ref statuses) = self.statuses
            && !statuses.contains(&booking.status) {
                return false;
            }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn slot_basics() {
        let s = Slot::starting_at(dt(10, 0), 60);
        assert_eq!(s.end, dt(11, 0));
        assert_eq!(s.duration_min(), 60);
        assert!(s.contains_instant(dt(10, 0)));
        assert!(s.contains_instant(dt(11, 0))); // closed at both ends
        assert!(!s.contains_instant(dt(11, 1)));
    }

    #[test]
    fn slot_overlap_closed() {
        let a = Slot::starting_at(dt(10, 0), 60);
        let b = Slot::starting_at(dt(10, 30), 60);
        let c = Slot::starting_at(dt(11, 0), 60); // exact-end collision
        let d = Slot::starting_at(dt(11, 1), 60);
        assert!(a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn slot_overlap_commutative() {
        let a = Slot::starting_at(dt(9, 0), 180);
        let b = Slot::starting_at(dt(10, 0), 60); // fully inside a
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn status_transitions_one_directional() {
        use BookingStatus::*;
        assert!(Booked.can_transition(CheckedIn, false));
        assert!(Booked.can_transition(NoShow, false));
        assert!(Booked.can_transition(Cancelled, false));
        assert!(!CheckedIn.can_transition(Booked, true));
        assert!(!Cancelled.can_transition(Booked, true));
        assert!(!Cancelled.can_transition(Cancelled, true));
    }

    #[test]
    fn forced_cancellation_leaves_checked_in() {
        use BookingStatus::*;
        assert!(!CheckedIn.can_transition(Cancelled, false));
        assert!(CheckedIn.can_transition(Cancelled, true));
        assert!(NoShow.can_transition(Cancelled, true));
    }

    #[test]
    fn recurrence_start_on_date() {
        let rec = AgendaRecurrence {
            id: Ulid::new(),
            weekday: Weekday::Mon,
            start_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            class_id: Ulid::new(),
            coach_id: Ulid::new(),
            facility_id: Ulid::new(),
        };
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(rec.starts_at_on(date), date.and_hms_opt(18, 30, 0).unwrap());
    }

    #[test]
    fn booking_query_matches() {
        let agenda_id = Ulid::new();
        let user_id = Ulid::new();
        let booking = AgendaBooking {
            id: Ulid::new(),
            agenda_id,
            user_id,
            credit_id: Ulid::new(),
            status: BookingStatus::Booked,
            note: None,
            created_at: dt(9, 0),
            updated_at: dt(9, 0),
        };

        assert!(BookingQuery::active_for_agenda(agenda_id).matches(&booking));
        assert!(BookingQuery::active_for_user(user_id).matches(&booking));
        assert!(!BookingQuery::active_for_agenda(Ulid::new()).matches(&booking));

        let mut cancelled = booking.clone();
        cancelled.status = BookingStatus::Cancelled;
        assert!(!BookingQuery::active_for_agenda(agenda_id).matches(&cancelled));
        assert!(BookingQuery::default().matches(&cancelled));
    }

    #[test]
    fn credit_eligibility() {
        let class_type = Ulid::new();
        let credit = CreditUnit {
            id: Ulid::new(),
            user_id: Ulid::new(),
            class_type_id: class_type,
            expires_at: dt(23, 59),
            remaining: 1,
        };
        assert!(credit.is_eligible(class_type, dt(9, 0)));
        assert!(!credit.is_eligible(Ulid::new(), dt(9, 0)));
        assert!(!credit.is_eligible(class_type, dt(23, 59))); // expiry boundary

        let spent = CreditUnit { remaining: 0, ..credit };
        assert!(!spent.is_eligible(class_type, dt(9, 0)));
    }
}
