use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::{SharedBooking, SharedTutor};

/// All tenant state, behind one object. Every mutation goes through the
/// engine's methods — nothing outside this module touches the maps directly.
pub struct InMemoryStore {
    tutors: DashMap<Ulid, SharedTutor>,
    parents: DashMap<Ulid, Parent>,
    children: DashMap<Ulid, Child>,
    /// Parent → children index for O(1) child lookups.
    children_of: DashMap<Ulid, Vec<Ulid>>,
    bookings: DashMap<Ulid, SharedBooking>,
    /// Booking ids in creation order; listings iterate this, never the map.
    booking_order: RwLock<Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tutors: DashMap::new(),
            parents: DashMap::new(),
            children: DashMap::new(),
            children_of: DashMap::new(),
            bookings: DashMap::new(),
            booking_order: RwLock::new(Vec::new()),
        }
    }

    // ── Tutors ───────────────────────────────────────────────

    pub fn tutor_count(&self) -> usize {
        self.tutors.len()
    }

    pub fn contains_tutor(&self, id: &Ulid) -> bool {
        self.tutors.contains_key(id)
    }

    pub fn get_tutor(&self, id: &Ulid) -> Option<SharedTutor> {
        self.tutors.get(id).map(|e| e.value().clone())
    }

    pub fn insert_tutor(&self, tutor: Tutor) {
        self.tutors.insert(tutor.id, Arc::new(RwLock::new(tutor)));
    }

    pub fn tutors_shared(&self) -> Vec<SharedTutor> {
        self.tutors.iter().map(|e| e.value().clone()).collect()
    }

    // ── Parents & children ───────────────────────────────────

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    pub fn contains_parent(&self, id: &Ulid) -> bool {
        self.parents.contains_key(id)
    }

    pub fn insert_parent(&self, parent: Parent) {
        self.parents.insert(parent.id, parent);
    }

    pub fn contains_child(&self, id: &Ulid) -> bool {
        self.children.contains_key(id)
    }

    pub fn insert_child(&self, child: Child) {
        self.children_of
            .entry(child.parent_id)
            .or_default()
            .push(child.id);
        self.children.insert(child.id, child);
    }

    pub fn children_of(&self, parent_id: &Ulid) -> Vec<Ulid> {
        self.children_of
            .get(parent_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn get_booking(&self, id: &Ulid) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    /// Append-only: bookings are never removed, so the order list only grows.
    pub async fn insert_booking(&self, booking: Booking) {
        let id = booking.id;
        self.bookings.insert(id, Arc::new(RwLock::new(booking)));
        self.booking_order.write().await.push(id);
    }

    pub async fn booking_ids_in_order(&self) -> Vec<Ulid> {
        self.booking_order.read().await.clone()
    }

    pub fn bookings_shared(&self) -> Vec<SharedBooking> {
        self.bookings.iter().map(|e| e.value().clone()).collect()
    }
}
