use chrono::{Datelike, NaiveDate};

use crate::model::{SlotTime, WeeklyAvailability};

// ── Weekly-slot algorithm ─────────────────────────────────────────

/// Membership in the recurring table for the weekday the date falls on.
/// Pure weekday lookup — the past-date rule lives in `is_bookable`.
pub fn slot_in_week(availability: &WeeklyAvailability, date: NaiveDate, time: SlotTime) -> bool {
    availability.slots(date.weekday()).binary_search(&time).is_ok()
}

/// Whether a (date, time) pair can take a booking: the slot is in the weekly
/// table AND the date is not strictly before `today`. Date granularity only —
/// time of day on the booking date itself is never compared against the
/// current clock.
pub fn is_bookable(
    availability: &WeeklyAvailability,
    date: NaiveDate,
    time: SlotTime,
    today: NaiveDate,
) -> bool {
    date >= today && slot_in_week(availability, date, time)
}

/// The bookable slots for a calendar date: the weekday's configured list, or
/// nothing for a past date.
pub fn open_slots_on(
    availability: &WeeklyAvailability,
    date: NaiveDate,
    today: NaiveDate,
) -> Vec<SlotTime> {
    if date < today {
        return Vec::new();
    }
    availability.slots(date.weekday()).to_vec()
}
