use futures::future::join_all;
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::conflict::{cancel_window_open, now};
use super::{Engine, EngineError};

/// Outcome of an admin agenda deletion: what was cancelled and refunded,
/// and which per-user notifications failed after retries. Nothing in here
/// is ever rolled back.
#[derive(Debug, Default)]
pub struct DeleteAgendaReport {
    pub cancelled: u32,
    pub refunded: u32,
    pub notify_failures: Vec<NotifyFailure>,
}

#[derive(Debug)]
pub struct NotifyFailure {
    pub user_id: Ulid,
    pub error: String,
}

impl Engine {
    /// Admin (forced) cancellation; may leave any active status.
    pub async fn cancel_booking(&self, booking_id: Ulid, refund: bool) -> Result<(), EngineError> {
        self.cancel_internal(booking_id, refund, true).await
    }

    /// Self-service cancellation by the booking owner, subject to the 24h
    /// window: a future class closer than 24 hours cannot be cancelled.
    /// A class that already started is the no-show/check-in path's concern
    /// and is not blocked here.
    pub async fn request_cancel(&self, booking_id: Ulid, refund: bool) -> Result<(), EngineError> {
        let booking = self.require_booking(booking_id).await?;
        let agenda = self.require_agenda(booking.agenda_id).await?;
        let now_ts = now();
        if !cancel_window_open(now_ts, agenda.starts_at) {
            metrics::counter!(observability::WINDOW_REJECTIONS_TOTAL).increment(1);
            return Err(EngineError::WindowClosed {
                minutes_left: (agenda.starts_at - now_ts).num_minutes(),
            });
        }
        self.cancel_internal(booking_id, refund, false).await
    }

    async fn cancel_internal(
        &self,
        booking_id: Ulid,
        refund: bool,
        forced: bool,
    ) -> Result<(), EngineError> {
        let booking = self.require_booking(booking_id).await?;
        let agenda = self.require_agenda(booking.agenda_id).await?;
        let class = self.require_class(agenda.class_id).await?;

        if !booking.status.can_transition(BookingStatus::Cancelled, forced) {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        self.repos
            .agenda
            .update_booking_status(booking_id, BookingStatus::Cancelled, now())
            .await?;
        if refund {
            if !self.repos.packages.refund_credit(booking.credit_id).await? {
                return Err(EngineError::NotFound("credit", booking.credit_id));
            }
            metrics::counter!(observability::CREDITS_REFUNDED_TOTAL).increment(1);
        }
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        tracing::info!("cancelled booking {booking_id} (refund: {refund})");

        // Committed; dispatch failure surfaces without reverting.
        self.notify_user(
            booking.user_id,
            format!(
                "Cancelled {} on {}",
                class.name,
                agenda.starts_at.format("%Y-%m-%d %H:%M")
            ),
        )
        .await?;
        Ok(())
    }

    /// Admin delete: cancel every active booking on the instance
    /// (refunding each when asked), soft-delete the instance, then notify
    /// every affected user. Best-effort fan-out: per-user dispatch
    /// failures land in the report and never abort the remaining users or
    /// revert the committed refunds.
    pub async fn delete_agenda(
        &self,
        agenda_id: Ulid,
        refund: bool,
    ) -> Result<DeleteAgendaReport, EngineError> {
        let agenda = self.require_agenda(agenda_id).await?;
        let class = self.require_class(agenda.class_id).await?;

        let lock = self.agenda_lock(agenda_id);
        let guard = lock.lock().await;

        let bookings = self
            .repos
            .agenda
            .find_bookings(&BookingQuery::active_for_agenda(agenda_id))
            .await?;
        let mut report = DeleteAgendaReport::default();
        let now_ts = now();
        for booking in &bookings {
            self.repos
                .agenda
                .update_booking_status(booking.id, BookingStatus::Cancelled, now_ts)
                .await?;
            report.cancelled += 1;
            if refund && self.repos.packages.refund_credit(booking.credit_id).await? {
                report.refunded += 1;
                metrics::counter!(observability::CREDITS_REFUNDED_TOTAL).increment(1);
            }
        }
        self.repos.agenda.soft_delete_agenda(agenda_id, now_ts).await?;
        drop(guard);

        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(report.cancelled as u64);
        tracing::info!(
            "deleted agenda {agenda_id}: {} bookings cancelled, {} refunded",
            report.cancelled,
            report.refunded
        );

        let message = format!(
            "Cancelled {} on {}",
            class.name,
            agenda.starts_at.format("%Y-%m-%d %H:%M")
        );
        let dispatches = bookings.iter().map(|booking| {
            let message = message.clone();
            let user_id = booking.user_id;
            async move { (user_id, self.notify_user(user_id, message).await) }
        });
        for (user_id, result) in join_all(dispatches).await {
            if let Err(e) = result {
                report.notify_failures.push(NotifyFailure {
                    user_id,
                    error: e.to_string(),
                });
            }
        }
        Ok(report)
    }

    /// `Booked -> CheckedIn`; grants the loyalty reward.
    pub async fn check_in(&self, booking_id: Ulid) -> Result<(), EngineError> {
        let booking = self.transition(booking_id, BookingStatus::CheckedIn).await?;
        self.repos
            .loyalty
            .create_on_reward(booking.user_id, booking.agenda_id)
            .await?;
        tracing::debug!("checked in booking {booking_id}");
        Ok(())
    }

    /// `Booked -> NoShow`.
    pub async fn mark_no_show(&self, booking_id: Ulid) -> Result<(), EngineError> {
        self.transition(booking_id, BookingStatus::NoShow).await?;
        tracing::debug!("marked no-show booking {booking_id}");
        Ok(())
    }

    async fn transition(
        &self,
        booking_id: Ulid,
        to: BookingStatus,
    ) -> Result<AgendaBooking, EngineError> {
        let booking = self.require_booking(booking_id).await?;
        if !booking.status.can_transition(to, false) {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to,
            });
        }
        self.repos
            .agenda
            .update_booking_status(booking_id, to, now())
            .await?;
        Ok(booking)
    }
}
