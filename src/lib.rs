pub mod backfill;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod repo;
pub mod store;

pub use engine::{BookingTarget, DeleteAgendaReport, Engine, EngineError, Repos};
pub use model::{
    AgendaBooking, AgendaInstance, AgendaRecurrence, BookingQuery, BookingStatus, ClassInfo,
    CreditUnit, LocationInfo, Slot, UserInfo,
};
pub use notify::{Notification, Notifier, NotifyHub};
pub use store::MemoryStore;
