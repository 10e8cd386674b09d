//! DashMap-backed implementation of every repository trait. Reference
//! implementation and test double; a deployment swaps in adapters over its
//! own relational store.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;
use crate::repo::*;

#[derive(Default)]
pub struct MemoryStore {
    agendas: DashMap<Ulid, AgendaInstance>,
    recurrences: DashMap<Ulid, AgendaRecurrence>,
    bookings: DashMap<Ulid, AgendaBooking>,
    classes: DashMap<Ulid, ClassInfo>,
    users: DashMap<Ulid, UserInfo>,
    credits: DashMap<Ulid, CreditUnit>,
    /// Keyed by facility id.
    locations: DashMap<Ulid, LocationInfo>,
    /// Loyalty rewards granted on check-in: user -> agenda ids.
    rewards: DashMap<Ulid, Vec<Ulid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding (reference data the engine treats as external CRUD) ──

    pub fn seed_class(&self, class: ClassInfo) {
        self.classes.insert(class.id, class);
    }

    pub fn seed_user(&self, user: UserInfo) {
        self.users.insert(user.id, user);
    }

    pub fn seed_credit(&self, credit: CreditUnit) {
        self.credits.insert(credit.id, credit);
    }

    pub fn seed_location(&self, facility_id: Ulid, location: LocationInfo) {
        self.locations.insert(facility_id, location);
    }

    pub fn credit_balance(&self, credit_id: Ulid) -> Option<u32> {
        self.credits.get(&credit_id).map(|c| c.remaining)
    }

    pub fn rewards_for(&self, user_id: Ulid) -> Vec<Ulid> {
        self.rewards
            .get(&user_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AgendaRepository for MemoryStore {
    async fn find_agenda(&self, id: Ulid) -> RepoResult<Option<AgendaInstance>> {
        Ok(self
            .agendas
            .get(&id)
            .map(|e| e.value().clone())
            .filter(|a| !a.is_deleted()))
    }

    async fn create_agenda(&self, instance: AgendaInstance) -> RepoResult<()> {
        // Analog of a unique index on (recurrence_id, date): a second insert
        // for the same pair is an integrity violation, not a silent overwrite.
        if let Some(rid) = instance.recurrence_id {
            let date = instance.starts_at.date();
            let duplicate = self.agendas.iter().any(|e| {
                e.value().recurrence_id == Some(rid) && e.value().starts_at.date() == date
            });
            if duplicate {
                return Err(RepoError(format!(
                    "duplicate instance for recurrence {rid} on {date}"
                )));
            }
        }
        self.agendas.insert(instance.id, instance);
        Ok(())
    }

    async fn soft_delete_agenda(&self, id: Ulid, at: NaiveDateTime) -> RepoResult<()> {
        match self.agendas.get_mut(&id) {
            Some(mut entry) => {
                entry.deleted_at = Some(at);
                Ok(())
            }
            None => Err(RepoError(format!("no agenda {id} to delete"))),
        }
    }

    async fn find_recurrence(&self, id: Ulid) -> RepoResult<Option<AgendaRecurrence>> {
        Ok(self.recurrences.get(&id).map(|e| e.value().clone()))
    }

    async fn create_recurrence(&self, recurrence: AgendaRecurrence) -> RepoResult<()> {
        self.recurrences.insert(recurrence.id, recurrence);
        Ok(())
    }

    async fn list_recurrences_for_weekday(
        &self,
        weekday: Weekday,
    ) -> RepoResult<Vec<AgendaRecurrence>> {
        let mut out: Vec<AgendaRecurrence> = self
            .recurrences
            .iter()
            .filter(|e| e.value().weekday == weekday)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    async fn find_instance_for_recurrence(
        &self,
        recurrence_id: Ulid,
        date: NaiveDate,
    ) -> RepoResult<Option<AgendaInstance>> {
        Ok(self
            .agendas
            .iter()
            .find(|e| {
                e.value().recurrence_id == Some(recurrence_id)
                    && e.value().starts_at.date() == date
            })
            .map(|e| e.value().clone()))
    }

    async fn find_booking(&self, id: Ulid) -> RepoResult<Option<AgendaBooking>> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn create_booking(&self, booking: AgendaBooking) -> RepoResult<()> {
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn update_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
        at: NaiveDateTime,
    ) -> RepoResult<()> {
        match self.bookings.get_mut(&id) {
            Some(mut entry) => {
                entry.status = status;
                entry.updated_at = at;
                Ok(())
            }
            None => Err(RepoError(format!("no booking {id} to update"))),
        }
    }

    async fn find_bookings(&self, query: &BookingQuery) -> RepoResult<Vec<AgendaBooking>> {
        let mut out: Vec<AgendaBooking> = self
            .bookings
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|b| (b.created_at, b.id));
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

#[async_trait]
impl ClassRepository for MemoryStore {
    async fn find_class(&self, id: Ulid) -> RepoResult<Option<ClassInfo>> {
        Ok(self.classes.get(&id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: Ulid) -> RepoResult<Option<UserInfo>> {
        Ok(self.users.get(&id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl PackageRepository for MemoryStore {
    async fn find_soonest_expiring_credit(
        &self,
        user_id: Ulid,
        class_type_id: Ulid,
        now: NaiveDateTime,
    ) -> RepoResult<Option<CreditUnit>> {
        Ok(self
            .credits
            .iter()
            .filter(|e| e.value().user_id == user_id && e.value().is_eligible(class_type_id, now))
            .map(|e| e.value().clone())
            .min_by_key(|c| (c.expires_at, c.id)))
    }

    async fn consume_credit(&self, credit_id: Ulid) -> RepoResult<bool> {
        match self.credits.get_mut(&credit_id) {
            Some(mut entry) if entry.remaining > 0 => {
                entry.remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn refund_credit(&self, credit_id: Ulid) -> RepoResult<bool> {
        match self.credits.get_mut(&credit_id) {
            Some(mut entry) => {
                entry.remaining += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LocationRepository for MemoryStore {
    async fn find_location_by_facility(
        &self,
        facility_id: Ulid,
    ) -> RepoResult<Option<LocationInfo>> {
        Ok(self.locations.get(&facility_id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl LoyaltyRepository for MemoryStore {
    async fn create_on_reward(&self, user_id: Ulid, agenda_id: Ulid) -> RepoResult<()> {
        self.rewards.entry(user_id).or_default().push(agenda_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn credit(user_id: Ulid, class_type_id: Ulid, expires_at: NaiveDateTime) -> CreditUnit {
        CreditUnit {
            id: Ulid::new(),
            user_id,
            class_type_id,
            expires_at,
            remaining: 1,
        }
    }

    #[tokio::test]
    async fn soonest_expiring_credit_wins() {
        let store = MemoryStore::new();
        let user = Ulid::new();
        let class_type = Ulid::new();
        let soon = credit(user, class_type, dt(5, 0));
        let later = credit(user, class_type, dt(30, 0));
        store.seed_credit(later);
        store.seed_credit(soon.clone());

        let found = store
            .find_soonest_expiring_credit(user, class_type, dt(2, 0))
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(soon.id));
    }

    #[tokio::test]
    async fn expired_and_foreign_credits_skipped() {
        let store = MemoryStore::new();
        let user = Ulid::new();
        let class_type = Ulid::new();
        store.seed_credit(credit(user, class_type, dt(1, 0))); // already expired
        store.seed_credit(credit(user, Ulid::new(), dt(30, 0))); // other class type
        store.seed_credit(credit(Ulid::new(), class_type, dt(30, 0))); // other user

        let found = store
            .find_soonest_expiring_credit(user, class_type, dt(2, 0))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn consume_and_refund_roundtrip() {
        let store = MemoryStore::new();
        let c = credit(Ulid::new(), Ulid::new(), dt(30, 0));
        let id = c.id;
        store.seed_credit(c);

        assert!(store.consume_credit(id).await.unwrap());
        assert_eq!(store.credit_balance(id), Some(0));
        assert!(!store.consume_credit(id).await.unwrap()); // exhausted
        assert!(store.refund_credit(id).await.unwrap());
        assert_eq!(store.credit_balance(id), Some(1));
        assert!(!store.refund_credit(Ulid::new()).await.unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_agenda_hidden_from_default_reads() {
        let store = MemoryStore::new();
        let instance = AgendaInstance {
            id: Ulid::new(),
            starts_at: dt(2, 10),
            class_id: Ulid::new(),
            coach_id: Ulid::new(),
            facility_id: Ulid::new(),
            recurrence_id: None,
            is_visible: true,
            deleted_at: None,
        };
        let id = instance.id;
        store.create_agenda(instance).await.unwrap();
        assert!(store.find_agenda(id).await.unwrap().is_some());

        store.soft_delete_agenda(id, dt(1, 0)).await.unwrap();
        assert!(store.find_agenda(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn materialized_pair_is_unique() {
        let store = MemoryStore::new();
        let rid = Ulid::new();
        let make = || AgendaInstance {
            id: Ulid::new(),
            starts_at: dt(2, 10),
            class_id: Ulid::new(),
            coach_id: Ulid::new(),
            facility_id: Ulid::new(),
            recurrence_id: Some(rid),
            is_visible: true,
            deleted_at: None,
        };
        store.create_agenda(make()).await.unwrap();
        assert!(store.create_agenda(make()).await.is_err());

        // Same recurrence on another date is fine.
        let mut other = make();
        other.starts_at = dt(9, 10);
        store.create_agenda(other).await.unwrap();
    }

    #[tokio::test]
    async fn soft_deleted_instance_still_blocks_rematerialization() {
        let store = MemoryStore::new();
        let rid = Ulid::new();
        let instance = AgendaInstance {
            id: Ulid::new(),
            starts_at: dt(2, 10),
            class_id: Ulid::new(),
            coach_id: Ulid::new(),
            facility_id: Ulid::new(),
            recurrence_id: Some(rid),
            is_visible: true,
            deleted_at: None,
        };
        let id = instance.id;
        store.create_agenda(instance).await.unwrap();
        store.soft_delete_agenda(id, dt(1, 0)).await.unwrap();

        let found = store
            .find_instance_for_recurrence(rid, dt(2, 10).date())
            .await
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(id));
    }

    #[tokio::test]
    async fn booking_query_filters_and_limits() {
        let store = MemoryStore::new();
        let agenda_id = Ulid::new();
        let user = Ulid::new();
        for i in 0..3u32 {
            store
                .create_booking(AgendaBooking {
                    id: Ulid::new(),
                    agenda_id,
                    user_id: user,
                    credit_id: Ulid::new(),
                    status: if i == 2 {
                        BookingStatus::Cancelled
                    } else {
                        BookingStatus::Booked
                    },
                    note: None,
                    created_at: dt(2, i),
                    updated_at: dt(2, i),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.count_active_bookings(agenda_id).await.unwrap(), 2);

        let limited = store
            .find_bookings(&BookingQuery {
                agenda_id: Some(agenda_id),
                limit: Some(1),
                ..BookingQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        // Deterministic order: oldest first.
        assert_eq!(limited[0].created_at, dt(2, 0));
    }
}
