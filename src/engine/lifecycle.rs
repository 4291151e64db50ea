use chrono::NaiveDate;

use crate::model::{Actor, BookingAction, BookingStatus};

use super::EngineError;

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Approve and decline belong to the tutor; cancel belongs to the parent.
/// Everything else is an authorization failure, regardless of the booking's
/// current status.
pub(crate) fn authorized(actor: Actor, action: BookingAction) -> bool {
    match action {
        BookingAction::Approve | BookingAction::Decline => actor == Actor::Tutor,
        BookingAction::Cancel => actor == Actor::Parent,
    }
}

/// The booking state machine:
///
/// ```text
/// pending --approve--> confirmed --cancel--> cancelled
/// pending --decline--> cancelled
/// pending --cancel---> cancelled
/// confirmed ---------> completed   (sweeper only, not an action)
/// ```
///
/// `completed` and `cancelled` are terminal.
pub(crate) fn next_status(
    current: BookingStatus,
    action: BookingAction,
) -> Result<BookingStatus, EngineError> {
    use BookingAction::*;
    use BookingStatus::*;
    match (current, action) {
        (Pending, Approve) => Ok(Confirmed),
        (Pending, Decline) => Ok(Cancelled),
        (Pending, Cancel) | (Confirmed, Cancel) => Ok(Cancelled),
        (status, action) => Err(EngineError::InvalidTransition {
            status,
            attempted: action.as_str(),
        }),
    }
}

/// A session is finished once its date is strictly past — time of day is
/// ignored.
pub(crate) fn session_finished(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}
