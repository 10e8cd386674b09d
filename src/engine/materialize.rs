use chrono::{Datelike, NaiveDate};
use ulid::Ulid;

use crate::model::AgendaInstance;
use crate::observability;

use super::{Engine, EngineError};

impl Engine {
    /// Produce (or reuse) the concrete instance for `(recurrence_id, date)`.
    ///
    /// Idempotent: the per-recurrence lock makes the read-then-create
    /// atomic, so concurrent calls for the same pair yield exactly one
    /// instance. A soft-deleted occurrence is returned as-is rather than
    /// re-created.
    pub async fn materialize(
        &self,
        recurrence_id: Ulid,
        date: NaiveDate,
    ) -> Result<AgendaInstance, EngineError> {
        let lock = self.recurrence_lock(recurrence_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self
            .repos
            .agenda
            .find_instance_for_recurrence(recurrence_id, date)
            .await?
        {
            return Ok(existing);
        }

        let template = self
            .repos
            .agenda
            .find_recurrence(recurrence_id)
            .await?
            .ok_or(EngineError::NotFound("recurrence", recurrence_id))?;
        if template.weekday != date.weekday() {
            return Err(EngineError::InvalidDate(
                "date does not fall on the template weekday",
            ));
        }

        let instance = AgendaInstance {
            id: Ulid::new(),
            starts_at: template.starts_at_on(date),
            class_id: template.class_id,
            coach_id: template.coach_id,
            facility_id: template.facility_id,
            recurrence_id: Some(recurrence_id),
            is_visible: true,
            deleted_at: None,
        };
        self.repos.agenda.create_agenda(instance.clone()).await?;

        metrics::counter!(observability::MATERIALIZATIONS_TOTAL).increment(1);
        tracing::info!(
            "materialized agenda {} from recurrence {recurrence_id} on {date}",
            instance.id
        );
        Ok(instance)
    }
}
