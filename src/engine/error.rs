use ulid::Ulid;

use crate::model::BookingStatus;
use crate::repo::RepoError;

#[derive(Debug)]
pub enum EngineError {
    NotFound(&'static str, Ulid),
    CapacityExceeded(u32),
    NoEligibleCredit(Ulid),
    TimeConflict(Ulid),
    WindowClosed { minutes_left: i64 },
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    InvalidDate(&'static str),
    LimitExceeded(&'static str),
    NotificationFailure(String),
    Repo(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            EngineError::CapacityExceeded(slot) => {
                write!(f, "capacity {slot} exceeded: all slots booked")
            }
            EngineError::NoEligibleCredit(user_id) => {
                write!(f, "no eligible package credit for user {user_id}")
            }
            EngineError::TimeConflict(booking_id) => {
                write!(f, "time conflict with booking: {booking_id}")
            }
            EngineError::WindowClosed { minutes_left } => {
                write!(
                    f,
                    "cancellation window closed: {minutes_left} minutes to start"
                )
            }
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid booking transition: {from:?} -> {to:?}")
            }
            EngineError::InvalidDate(msg) => write!(f, "invalid date: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::NotificationFailure(e) => write!(f, "notification failed: {e}"),
            EngineError::Repo(e) => write!(f, "repository error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RepoError> for EngineError {
    fn from(e: RepoError) -> Self {
        EngineError::Repo(e.0)
    }
}
