mod availability;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use availability::{is_bookable, open_slots_on, slot_in_week};
pub use error::EngineError;
pub use store::InMemoryStore;

use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;

pub type SharedTutor = Arc<RwLock<Tutor>>;
pub type SharedBooking = Arc<RwLock<Booking>>;

/// The booking engine for one tenant: owns all state, mediates every
/// mutation, and emits notices for each outcome. Each operation validates
/// fully before writing, so a failed call leaves no partial state behind.
pub struct Engine {
    store: InMemoryStore,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(notify: Arc<NotifyHub>) -> Self {
        Self {
            store: InMemoryStore::new(),
            notify,
        }
    }

    pub(super) fn get_tutor(&self, id: &Ulid) -> Option<SharedTutor> {
        self.store.get_tutor(id)
    }

    pub(super) fn get_booking(&self, id: &Ulid) -> Option<SharedBooking> {
        self.store.get_booking(id)
    }

    /// Lookup a booking and acquire its write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<Booking>, EngineError> {
        let booking = self
            .get_booking(id)
            .ok_or(EngineError::NotFound(*id))?;
        Ok(booking.write_owned().await)
    }

    /// A booking outcome concerns both sides; each party's channel gets the
    /// same notice.
    pub(super) fn notify_parties(&self, tutor_id: Ulid, parent_id: Ulid, notice: &Notice) {
        self.notify.send(tutor_id, notice);
        self.notify.send(parent_id, notice);
    }
}
