mod booking;
mod cancel;
mod conflict;
mod error;
mod materialize;
mod queries;

pub use booking::BookingTarget;
pub use cancel::{DeleteAgendaReport, NotifyFailure};
pub use conflict::{cancel_window_open, find_conflict};
pub use error::EngineError;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::{AgendaBooking, AgendaInstance, ClassInfo, UserInfo};
use crate::notify::{Notification, Notifier, send_with_retry};
use crate::repo::{
    AgendaRepository, ClassRepository, LocationRepository, LoyaltyRepository, PackageRepository,
    UserRepository,
};

/// Constructor-injected dependency bundle. The composition root wires each
/// port to a concrete adapter at startup; there is no ambient registry.
#[derive(Clone)]
pub struct Repos {
    pub agenda: Arc<dyn AgendaRepository>,
    pub classes: Arc<dyn ClassRepository>,
    pub users: Arc<dyn UserRepository>,
    pub packages: Arc<dyn PackageRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub loyalty: Arc<dyn LoyaltyRepository>,
}

impl Repos {
    /// Wire every port to one implementation, the common case for an
    /// in-process store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AgendaRepository
            + ClassRepository
            + UserRepository
            + PackageRepository
            + LocationRepository
            + LoyaltyRepository
            + 'static,
    {
        Self {
            agenda: store.clone(),
            classes: store.clone(),
            users: store.clone(),
            packages: store.clone(),
            locations: store.clone(),
            loyalty: store,
        }
    }
}

pub struct Engine {
    pub(super) repos: Repos,
    notifier: Arc<dyn Notifier>,
    /// Serializes capacity-check-and-insert per agenda instance.
    agenda_locks: DashMap<Ulid, Arc<Mutex<()>>>,
    /// Serializes read-then-create materialization per recurrence.
    recurrence_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(repos: Repos, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repos,
            notifier,
            agenda_locks: DashMap::new(),
            recurrence_locks: DashMap::new(),
        }
    }

    pub(super) fn agenda_lock(&self, id: Ulid) -> Arc<Mutex<()>> {
        self.agenda_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(super) fn recurrence_lock(&self, id: Ulid) -> Arc<Mutex<()>> {
        self.recurrence_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ── Resolution helpers ───────────────────────────────────

    pub(super) async fn require_agenda(&self, id: Ulid) -> Result<AgendaInstance, EngineError> {
        self.repos
            .agenda
            .find_agenda(id)
            .await?
            .ok_or(EngineError::NotFound("agenda", id))
    }

    pub(super) async fn require_class(&self, id: Ulid) -> Result<ClassInfo, EngineError> {
        self.repos
            .classes
            .find_class(id)
            .await?
            .ok_or(EngineError::NotFound("class", id))
    }

    pub(super) async fn require_booking(&self, id: Ulid) -> Result<AgendaBooking, EngineError> {
        self.repos
            .agenda
            .find_booking(id)
            .await?
            .ok_or(EngineError::NotFound("booking", id))
    }

    pub(super) async fn require_user(&self, id: Ulid) -> Result<UserInfo, EngineError> {
        self.repos
            .users
            .find_user(id)
            .await?
            .ok_or(EngineError::NotFound("user", id))
    }

    /// "{location} ({facility})" fragment for user-facing messages.
    pub(super) async fn describe_location(&self, facility_id: Ulid) -> Result<String, EngineError> {
        let location = self
            .repos
            .locations
            .find_location_by_facility(facility_id)
            .await?
            .ok_or(EngineError::NotFound("location", facility_id))?;
        Ok(format!("{} ({})", location.name, location.facility_name))
    }

    /// Load the recipient and dispatch with bounded retry. The triggering
    /// state change is already committed; only the dispatch outcome is
    /// returned, never a rollback.
    pub(super) async fn notify_user(
        &self,
        user_id: Ulid,
        message: String,
    ) -> Result<(), EngineError> {
        let user = self.require_user(user_id).await?;
        let notification = Notification {
            recipient: user.id,
            phone_number: user.phone_number,
            message,
        };
        send_with_retry(self.notifier.as_ref(), &notification)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::NotificationFailure(e.0))
    }
}
