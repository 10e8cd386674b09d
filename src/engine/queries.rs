use chrono::Weekday;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Remaining capacity on an instance.
    pub async fn available_slots(&self, agenda_id: Ulid) -> Result<u32, EngineError> {
        let agenda = self.require_agenda(agenda_id).await?;
        let class = self.require_class(agenda.class_id).await?;
        let active = self.repos.agenda.count_active_bookings(agenda_id).await?;
        Ok(class.slot.saturating_sub(active))
    }

    pub async fn get_agenda(&self, agenda_id: Ulid) -> Result<AgendaInstance, EngineError> {
        self.require_agenda(agenda_id).await
    }

    pub async fn find_bookings(
        &self,
        query: &BookingQuery,
    ) -> Result<Vec<AgendaBooking>, EngineError> {
        Ok(self.repos.agenda.find_bookings(query).await?)
    }

    pub async fn bookings_for_user(
        &self,
        user_id: Ulid,
    ) -> Result<Vec<AgendaBooking>, EngineError> {
        Ok(self
            .repos
            .agenda
            .find_active_bookings_for_user(user_id)
            .await?)
    }

    pub async fn recurrences_for_weekday(
        &self,
        weekday: Weekday,
    ) -> Result<Vec<AgendaRecurrence>, EngineError> {
        Ok(self
            .repos
            .agenda
            .list_recurrences_for_weekday(weekday)
            .await?)
    }
}
