//! Persistence contract. The engine owns no state between calls; these
//! traits are the only source of truth and are implemented by whatever
//! relational store the embedding application uses. `store::MemoryStore`
//! is the in-process reference implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use ulid::Ulid;

use crate::model::*;

/// Unexpected infrastructure failure inside a repository. Business-rule
/// outcomes (missing rows, exhausted balances) are expressed in the return
/// types, not through this error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoError(pub String);

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "repository error: {}", self.0)
    }
}

impl std::error::Error for RepoError {}

pub type RepoResult<T> = Result<T, RepoError>;

/// Agenda instances, recurrence templates, and bookings.
///
/// Reads exclude soft-deleted instances unless stated otherwise.
#[async_trait]
pub trait AgendaRepository: Send + Sync {
    async fn find_agenda(&self, id: Ulid) -> RepoResult<Option<AgendaInstance>>;
    async fn create_agenda(&self, instance: AgendaInstance) -> RepoResult<()>;
    async fn soft_delete_agenda(&self, id: Ulid, at: NaiveDateTime) -> RepoResult<()>;

    async fn find_recurrence(&self, id: Ulid) -> RepoResult<Option<AgendaRecurrence>>;
    async fn create_recurrence(&self, recurrence: AgendaRecurrence) -> RepoResult<()>;
    async fn list_recurrences_for_weekday(
        &self,
        weekday: Weekday,
    ) -> RepoResult<Vec<AgendaRecurrence>>;

    /// The instance already materialized from `recurrence_id` on `date`,
    /// if any. Soft-deleted instances count: a cancelled occurrence must
    /// not be silently re-created.
    async fn find_instance_for_recurrence(
        &self,
        recurrence_id: Ulid,
        date: NaiveDate,
    ) -> RepoResult<Option<AgendaInstance>>;

    async fn find_booking(&self, id: Ulid) -> RepoResult<Option<AgendaBooking>>;
    async fn create_booking(&self, booking: AgendaBooking) -> RepoResult<()>;
    async fn update_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
        at: NaiveDateTime,
    ) -> RepoResult<()>;

    async fn find_bookings(&self, query: &BookingQuery) -> RepoResult<Vec<AgendaBooking>>;

    async fn count_bookings(&self, query: &BookingQuery) -> RepoResult<u32> {
        Ok(self.find_bookings(query).await?.len() as u32)
    }

    async fn count_active_bookings(&self, agenda_id: Ulid) -> RepoResult<u32> {
        self.count_bookings(&BookingQuery::active_for_agenda(agenda_id))
            .await
    }

    async fn find_active_bookings_for_user(
        &self,
        user_id: Ulid,
    ) -> RepoResult<Vec<AgendaBooking>> {
        self.find_bookings(&BookingQuery::active_for_user(user_id))
            .await
    }
}

#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn find_class(&self, id: Ulid) -> RepoResult<Option<ClassInfo>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Ulid) -> RepoResult<Option<UserInfo>>;
}

/// Package credit ledger.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// The unexpired credit with balance for `class_type_id` that expires
    /// soonest among the user's packages, or `None`.
    async fn find_soonest_expiring_credit(
        &self,
        user_id: Ulid,
        class_type_id: Ulid,
        now: NaiveDateTime,
    ) -> RepoResult<Option<CreditUnit>>;

    /// Draw one unit. `Ok(false)` means the balance was already exhausted
    /// (lost race on the last unit), not an infrastructure failure.
    async fn consume_credit(&self, credit_id: Ulid) -> RepoResult<bool>;

    /// Restore one unit to the original package. `Ok(false)` means the
    /// credit no longer exists.
    async fn refund_credit(&self, credit_id: Ulid) -> RepoResult<bool>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn find_location_by_facility(
        &self,
        facility_id: Ulid,
    ) -> RepoResult<Option<LocationInfo>>;
}

/// Loyalty reward hook, invoked on check-in.
#[async_trait]
pub trait LoyaltyRepository: Send + Sync {
    async fn create_on_reward(&self, user_id: Ulid, agenda_id: Ulid) -> RepoResult<()>;
}
