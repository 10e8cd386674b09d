use std::time::Instant;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_NOTE_LEN;
use crate::model::*;
use crate::observability;

use super::conflict::{find_conflict, now, validate_duration};
use super::{Engine, EngineError};

/// What a booking attempt points at: a concrete instance, or a recurrence
/// occurrence that may not be materialized yet.
#[derive(Debug, Clone, Copy)]
pub enum BookingTarget {
    Agenda(Ulid),
    Occurrence { recurrence_id: Ulid, date: NaiveDate },
}

impl Engine {
    /// Book `user_id` onto the target, consuming one of their own credits.
    pub async fn book(
        &self,
        user_id: Ulid,
        target: BookingTarget,
    ) -> Result<AgendaBooking, EngineError> {
        self.book_with_credit_source(user_id, target, user_id).await
    }

    /// Privileged variant: an administrator books `user_id` using a
    /// different user's credit balance. Same pipeline as `book`.
    pub async fn book_on_behalf(
        &self,
        user_id: Ulid,
        target: BookingTarget,
        credit_source_user_id: Ulid,
    ) -> Result<AgendaBooking, EngineError> {
        self.book_with_credit_source(user_id, target, credit_source_user_id)
            .await
    }

    /// The booking pipeline. Every step is a hard precondition; nothing is
    /// written until all checks under the agenda lock have passed.
    async fn book_with_credit_source(
        &self,
        user_id: Ulid,
        target: BookingTarget,
        credit_source: Ulid,
    ) -> Result<AgendaBooking, EngineError> {
        let started = Instant::now();

        // 1. Resolve the target instance, materializing on first touch.
        let agenda = match target {
            BookingTarget::Agenda(id) => self.require_agenda(id).await?,
            BookingTarget::Occurrence {
                recurrence_id,
                date,
            } => {
                let instance = self.materialize(recurrence_id, date).await?;
                // A cancelled occurrence stays soft-deleted; never book it.
                if instance.is_deleted() {
                    return Err(EngineError::NotFound("agenda", instance.id));
                }
                instance
            }
        };

        // Capacity check and insert are serialized per instance.
        let lock = self.agenda_lock(agenda.id);
        let guard = lock.lock().await;

        // 2. Class for capacity and duration.
        let class = self.require_class(agenda.class_id).await?;
        validate_duration(class.duration_min)?;

        // 3. Capacity.
        let active = self.repos.agenda.count_active_bookings(agenda.id).await?;
        if active >= class.slot {
            return Err(EngineError::CapacityExceeded(class.slot));
        }

        // 4. Soonest-expiring eligible credit.
        let now_ts = now();
        let credit = self
            .repos
            .packages
            .find_soonest_expiring_credit(credit_source, class.class_type_id, now_ts)
            .await?
            .ok_or(EngineError::NoEligibleCredit(credit_source))?;

        // 5. Conflict scan over the booking user's other active bookings.
        let candidate = Slot::starting_at(agenda.starts_at, class.duration_min);
        let occupied = self.occupied_slots(user_id).await?;
        if let Some(conflicting) = find_conflict(&candidate, &occupied) {
            return Err(EngineError::TimeConflict(conflicting));
        }

        // 6. Draw the credit and persist. A lost race on the last unit
        // surfaces as NoEligibleCredit, never as over-consumption.
        if !self.repos.packages.consume_credit(credit.id).await? {
            return Err(EngineError::NoEligibleCredit(credit_source));
        }
        let mut note = format!(
            "Booked {} on {}",
            class.name,
            agenda.starts_at.format("%Y-%m-%d %H:%M")
        );
        note.truncate(MAX_NOTE_LEN);
        let booking = AgendaBooking {
            id: Ulid::new(),
            agenda_id: agenda.id,
            user_id,
            credit_id: credit.id,
            status: BookingStatus::Booked,
            note: Some(note.clone()),
            created_at: now_ts,
            updated_at: now_ts,
        };
        self.repos.agenda.create_booking(booking.clone()).await?;
        drop(guard);

        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        metrics::counter!(observability::CREDITS_CONSUMED_TOTAL).increment(1);
        metrics::histogram!(observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            "booked {} for user {user_id} on agenda {}",
            booking.id,
            agenda.id
        );

        // 7. Committed; a failed dispatch surfaces without unwinding the
        // booking.
        let place = self.describe_location(agenda.facility_id).await?;
        self.notify_user(user_id, format!("{note} at {place}"))
            .await?;
        Ok(booking)
    }

    /// Occupied intervals backing the user's active bookings. Bookings on
    /// soft-deleted instances no longer occupy time.
    async fn occupied_slots(&self, user_id: Ulid) -> Result<Vec<(Ulid, Slot)>, EngineError> {
        let mut occupied = Vec::new();
        for booking in self
            .repos
            .agenda
            .find_active_bookings_for_user(user_id)
            .await?
        {
            let Some(instance) = self.repos.agenda.find_agenda(booking.agenda_id).await? else {
                continue;
            };
            let Some(class) = self.repos.classes.find_class(instance.class_id).await? else {
                continue;
            };
            occupied.push((
                booking.id,
                Slot::starting_at(instance.starts_at, class.duration_min),
            ));
        }
        Ok(occupied)
    }
}
