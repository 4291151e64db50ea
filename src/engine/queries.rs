use chrono::{NaiveDate, Weekday};
use ulid::Ulid;

use crate::model::*;

use super::{availability, lifecycle, Engine};

impl Engine {
    /// Configured slots for a tutor's weekday. Empty for an unknown tutor or
    /// an unconfigured day — never fails.
    pub async fn get_slots(&self, tutor_id: Ulid, day: Weekday) -> Vec<SlotTime> {
        match self.get_tutor(&tutor_id) {
            Some(tutor) => tutor.read().await.availability.slots(day).to_vec(),
            None => Vec::new(),
        }
    }

    /// The whole weekly grid, monday-first.
    pub async fn availability_week(&self, tutor_id: Ulid) -> Vec<(Weekday, Vec<SlotTime>)> {
        match self.get_tutor(&tutor_id) {
            Some(tutor) => {
                let guard = tutor.read().await;
                WEEK.iter()
                    .map(|&day| (day, guard.availability.slots(day).to_vec()))
                    .collect()
            }
            None => WEEK.iter().map(|&day| (day, Vec::new())).collect(),
        }
    }

    /// Whether the tutor offers the slot on that calendar date: weekday
    /// membership AND the date is not in the past.
    pub async fn is_slot_offered(&self, tutor_id: Ulid, date: NaiveDate, time: SlotTime) -> bool {
        match self.get_tutor(&tutor_id) {
            Some(tutor) => {
                let guard = tutor.read().await;
                availability::is_bookable(&guard.availability, date, time, lifecycle::today())
            }
            None => false,
        }
    }

    /// Bookable slots for one calendar date — the calendar picker's read path.
    pub async fn open_slots(&self, tutor_id: Ulid, date: NaiveDate) -> Vec<SlotTime> {
        match self.get_tutor(&tutor_id) {
            Some(tutor) => {
                let guard = tutor.read().await;
                availability::open_slots_on(&guard.availability, date, lifecycle::today())
            }
            None => Vec::new(),
        }
    }

    /// Pure read; insertion order, never re-sorted. Consumers needing
    /// chronological order sort explicitly.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let ids = self.store.booking_ids_in_order().await;
        let mut result = Vec::new();
        for id in ids {
            if let Some(booking) = self.get_booking(&id) {
                let guard = booking.read().await;
                if filter.matches(&guard) {
                    result.push(guard.clone());
                }
            }
        }
        result
    }

    pub async fn booking(&self, id: Ulid) -> Option<Booking> {
        match self.get_booking(&id) {
            Some(booking) => Some(booking.read().await.clone()),
            None => None,
        }
    }

    pub async fn list_tutors(&self) -> Vec<TutorInfo> {
        let mut result = Vec::new();
        for tutor in self.store.tutors_shared() {
            let guard = tutor.read().await;
            result.push(TutorInfo {
                id: guard.id,
                name: guard.name.clone(),
                hourly_rate: guard.hourly_rate,
                subjects: guard.subjects.clone(),
            });
        }
        result
    }

    /// Rollup over the tutor's completed bookings. A tutor with no completed
    /// sessions (or an unknown tutor) gets an all-zero rollup.
    pub async fn tutor_earnings(&self, tutor_id: Ulid) -> EarningsInfo {
        let filter = BookingFilter {
            tutor: Some(tutor_id),
            status: Some(BookingStatus::Completed),
            ..Default::default()
        };
        let completed = self.list_bookings(&filter).await;
        let sessions_completed = completed.len() as u64;
        let hours_taught = completed.iter().map(|b| b.duration.hours()).sum();
        let total_earned = completed.iter().map(|b| b.price).sum();
        EarningsInfo {
            tutor_id,
            sessions_completed,
            hours_taught,
            total_earned,
        }
    }
}
