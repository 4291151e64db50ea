use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Actor, BookingAction, BookingStatus, SlotTime};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    SubjectNotOffered(String),
    InvalidDuration(u32),
    SlotUnavailable { date: NaiveDate, time: SlotTime },
    DateInPast(NaiveDate),
    Forbidden { actor: Actor, action: BookingAction },
    InvalidTransition { status: BookingStatus, attempted: &'static str },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::SubjectNotOffered(subject) => {
                write!(f, "subject not offered by tutor: {subject}")
            }
            EngineError::InvalidDuration(minutes) => {
                write!(f, "invalid duration: {minutes} min (allowed: 30/60/90/120)")
            }
            EngineError::SlotUnavailable { date, time } => {
                write!(f, "slot not offered: {date} {time}")
            }
            EngineError::DateInPast(date) => write!(f, "date in the past: {date}"),
            EngineError::Forbidden { actor, action } => {
                write!(f, "{actor} may not {action} a booking")
            }
            EngineError::InvalidTransition { status, attempted } => {
                write!(f, "cannot {attempted} a {status} booking")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
