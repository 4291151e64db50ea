use chrono::{NaiveDate, Weekday};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::{availability, lifecycle, Engine, EngineError};

impl Engine {
    pub async fn create_tutor(
        &self,
        id: Ulid,
        name: String,
        hourly_rate: f64,
        subjects: Vec<String>,
    ) -> Result<(), EngineError> {
        if self.store.tutor_count() >= MAX_TUTORS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many tutors"));
        }
        validate_name(&name)?;
        validate_rate(hourly_rate)?;
        validate_subjects(&subjects)?;
        if self.store.contains_tutor(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        self.store.insert_tutor(Tutor::new(id, name, hourly_rate, subjects));
        Ok(())
    }

    /// Partial update of rate and/or subjects. Changing subjects never
    /// touches existing bookings — the subject constraint binds at creation
    /// time only.
    pub async fn update_tutor(
        &self,
        id: Ulid,
        hourly_rate: Option<f64>,
        subjects: Option<Vec<String>>,
    ) -> Result<(), EngineError> {
        if let Some(rate) = hourly_rate {
            validate_rate(rate)?;
        }
        if let Some(ref subjects) = subjects {
            validate_subjects(subjects)?;
        }
        let tutor = self.get_tutor(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = tutor.write().await;
        if let Some(rate) = hourly_rate {
            guard.hourly_rate = rate;
        }
        if let Some(subjects) = subjects {
            guard.subjects = subjects;
        }
        Ok(())
    }

    pub async fn create_parent(&self, id: Ulid, name: String) -> Result<(), EngineError> {
        if self.store.parent_count() >= MAX_PARENTS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many parents"));
        }
        validate_name(&name)?;
        if self.store.contains_parent(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        self.store.insert_parent(Parent { id, name });
        Ok(())
    }

    pub async fn create_child(
        &self,
        id: Ulid,
        parent_id: Ulid,
        name: String,
        grade: Option<String>,
    ) -> Result<(), EngineError> {
        validate_name(&name)?;
        if let Some(ref g) = grade
            && g.len() > MAX_GRADE_LEN {
                return Err(EngineError::LimitExceeded("grade too long"));
            }
        if self.store.contains_child(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if !self.store.contains_parent(&parent_id) {
            return Err(EngineError::NotFound(parent_id));
        }
        if self.store.children_of(&parent_id).len() >= MAX_CHILDREN_PER_PARENT {
            return Err(EngineError::LimitExceeded("too many children for parent"));
        }
        self.store.insert_child(Child { id, parent_id, name, grade });
        Ok(())
    }

    /// Replace one weekday's slot list wholesale. The editor submits the full
    /// resulting list, so this is the only availability write path; duplicate
    /// times collapse to one. No side effects beyond the tutor record.
    pub async fn set_availability(
        &self,
        tutor_id: Ulid,
        day: Weekday,
        slots: Vec<SlotTime>,
    ) -> Result<(), EngineError> {
        if slots.len() > MAX_SLOTS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many slots for one day"));
        }
        let tutor = self
            .get_tutor(&tutor_id)
            .ok_or(EngineError::NotFound(tutor_id))?;
        let mut guard = tutor.write().await;
        guard.availability.set_day(day, slots);
        Ok(())
    }

    /// Validate and create a booking.
    ///
    /// Checks run in a fixed order: subject, duration, slot membership, date.
    /// Existing bookings at the same tutor/date/time are NOT consulted —
    /// overlapping requests all succeed.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        if self.store.booking_count() >= MAX_BOOKINGS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many bookings"));
        }
        if let Some(ref notes) = req.notes
            && notes.len() > MAX_NOTES_LEN {
                return Err(EngineError::LimitExceeded("notes too long"));
            }
        if req.subject.len() > MAX_SUBJECT_LEN {
            return Err(EngineError::LimitExceeded("subject too long"));
        }
        let tutor = self
            .get_tutor(&req.tutor_id)
            .ok_or(EngineError::NotFound(req.tutor_id))?;
        if !self.store.contains_parent(&req.parent_id) {
            return Err(EngineError::NotFound(req.parent_id));
        }
        if !self.store.contains_child(&req.child_id) {
            return Err(EngineError::NotFound(req.child_id));
        }

        let guard = tutor.read().await;
        if !guard.offers_subject(&req.subject) {
            return Err(EngineError::SubjectNotOffered(req.subject));
        }
        let duration = SessionDuration::from_minutes(req.duration_minutes)
            .ok_or(EngineError::InvalidDuration(req.duration_minutes))?;
        if !availability::slot_in_week(&guard.availability, req.date, req.time) {
            return Err(EngineError::SlotUnavailable {
                date: req.date,
                time: req.time,
            });
        }
        let today = lifecycle::today();
        if req.date < today {
            return Err(EngineError::DateInPast(req.date));
        }

        let price = guard.hourly_rate * duration.hours();
        let tutor_name = guard.name.clone();
        drop(guard);

        let booking = Booking {
            id: Ulid::new(),
            tutor_id: req.tutor_id,
            parent_id: req.parent_id,
            child_id: req.child_id,
            subject: req.subject,
            date: req.date,
            time: req.time,
            duration,
            status: BookingStatus::Pending,
            price,
            notes: req.notes,
        };
        self.store.insert_booking(booking.clone()).await;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);

        self.notify.send(
            req.parent_id,
            &Notice::success(
                "Booking Confirmed!",
                format!("Your session with {tutor_name} has been booked."),
            ),
        );
        Ok(booking)
    }

    /// Apply an actor's action to a booking. Authorization first, then the
    /// state machine; on success only the status changes.
    pub async fn transition(
        &self,
        id: Ulid,
        actor: Actor,
        action: BookingAction,
    ) -> Result<Booking, EngineError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        if !lifecycle::authorized(actor, action) {
            return Err(EngineError::Forbidden { actor, action });
        }
        guard.status = lifecycle::next_status(guard.status, action)?;
        let booking = guard.clone();
        drop(guard);

        metrics::counter!(
            observability::BOOKING_TRANSITIONS_TOTAL,
            "action" => action.as_str()
        )
        .increment(1);

        let notice = match action {
            BookingAction::Approve => {
                Notice::success("Booking Approved", "The session has been confirmed.")
            }
            BookingAction::Decline => {
                Notice::info("Booking Declined", "The booking request has been declined.")
            }
            BookingAction::Cancel => Notice::info(
                "Booking Cancelled",
                "Your booking has been cancelled successfully.",
            ),
        };
        self.notify_parties(booking.tutor_id, booking.parent_id, &notice);
        Ok(booking)
    }

    /// `confirmed -> completed`. Reserved for the session sweeper — never
    /// reachable through `transition`.
    pub async fn mark_completed(&self, id: Ulid) -> Result<Booking, EngineError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        if guard.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                status: guard.status,
                attempted: "complete",
            });
        }
        guard.status = BookingStatus::Completed;
        let booking = guard.clone();
        drop(guard);

        metrics::counter!(observability::SESSIONS_COMPLETED_TOTAL).increment(1);
        self.notify_parties(
            booking.tutor_id,
            booking.parent_id,
            &Notice::info("Session Completed", "Your tutoring session has been completed."),
        );
        Ok(booking)
    }

    /// Confirmed bookings whose session date is strictly before `today`.
    /// Consumed by the sweeper; races with concurrent cancellations are
    /// resolved by `mark_completed` re-checking the status under the lock.
    pub fn collect_finished_sessions(&self, today: NaiveDate) -> Vec<Ulid> {
        let mut finished = Vec::new();
        for booking in self.store.bookings_shared() {
            if let Ok(guard) = booking.try_read()
                && guard.status == BookingStatus::Confirmed
                && lifecycle::session_finished(guard.date, today)
            {
                finished.push(guard.id);
            }
        }
        finished
    }
}

fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::LimitExceeded("empty name"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_rate(rate: f64) -> Result<(), EngineError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(EngineError::LimitExceeded("hourly rate must be a non-negative number"));
    }
    Ok(())
}

fn validate_subjects(subjects: &[String]) -> Result<(), EngineError> {
    if subjects.len() > MAX_SUBJECTS_PER_TUTOR {
        return Err(EngineError::LimitExceeded("too many subjects"));
    }
    for subject in subjects {
        if subject.len() > MAX_SUBJECT_LEN {
            return Err(EngineError::LimitExceeded("subject too long"));
        }
    }
    Ok(())
}
