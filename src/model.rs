use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Time of day in 24-hour `HH:MM` form — the only clock type.
///
/// Parsing is strict: exactly five characters, zero-padded, `00:00`..`23:59`.
/// Ordering is (hour, minute), which matches string order for the canonical
/// rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTimeParseError(pub String);

impl fmt::Display for SlotTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time (expected HH:MM): {}", self.0)
    }
}

impl std::error::Error for SlotTimeParseError {}

impl FromStr for SlotTime {
    type Err = SlotTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(SlotTimeParseError(s.to_string()));
        }
        let digits = |a: u8, b: u8| -> Option<u8> {
            if a.is_ascii_digit() && b.is_ascii_digit() {
                Some((a - b'0') * 10 + (b - b'0'))
            } else {
                None
            }
        };
        match (digits(bytes[0], bytes[1]), digits(bytes[3], bytes[4])) {
            (Some(h), Some(m)) => {
                SlotTime::new(h, m).ok_or_else(|| SlotTimeParseError(s.to_string()))
            }
            _ => Err(SlotTimeParseError(s.to_string())),
        }
    }
}

impl Serialize for SlotTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical lowercase weekday name, as used by the availability table keys.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Week in monday-first order, for stable iteration.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Recurring weekly slot table: one ordered, duplicate-free slot list per
/// weekday. Order and uniqueness are maintained by `set_day` — the only
/// write path — so readers never re-sort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    days: [Vec<SlotTime>; 7],
}

impl WeeklyAvailability {
    pub fn slots(&self, day: Weekday) -> &[SlotTime] {
        &self.days[day.num_days_from_monday() as usize]
    }

    /// Replace the day's list wholesale. Duplicates collapse, result is
    /// stored ascending.
    pub fn set_day(&mut self, day: Weekday, mut slots: Vec<SlotTime>) {
        slots.sort();
        slots.dedup();
        self.days[day.num_days_from_monday() as usize] = slots;
    }
}

/// Session length — only these four are bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionDuration {
    HalfHour,
    Hour,
    NinetyMinutes,
    TwoHours,
}

impl SessionDuration {
    pub fn minutes(&self) -> u32 {
        match self {
            SessionDuration::HalfHour => 30,
            SessionDuration::Hour => 60,
            SessionDuration::NinetyMinutes => 90,
            SessionDuration::TwoHours => 120,
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            30 => Some(SessionDuration::HalfHour),
            60 => Some(SessionDuration::Hour),
            90 => Some(SessionDuration::NinetyMinutes),
            120 => Some(SessionDuration::TwoHours),
            _ => None,
        }
    }

    pub fn hours(&self) -> f64 {
        f64::from(self.minutes()) / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role attempting a booking transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Parent,
    Tutor,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Parent => "parent",
            Actor::Tutor => "tutor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parent" => Some(Actor::Parent),
            "tutor" => Some(Actor::Tutor),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    Approve,
    Decline,
    Cancel,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Approve => "approve",
            BookingAction::Decline => "decline",
            BookingAction::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(BookingAction::Approve),
            "decline" => Some(BookingAction::Decline),
            "cancel" => Some(BookingAction::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tutoring-session reservation. Never deleted — cancellation is a
/// status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub tutor_id: Ulid,
    pub parent_id: Ulid,
    pub child_id: Ulid,
    pub subject: String,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub duration: SessionDuration,
    pub status: BookingStatus,
    /// `hourly_rate * minutes / 60`, stored unrounded; display layers apply
    /// their own rounding.
    pub price: f64,
    pub notes: Option<String>,
}

/// Arguments for a booking request, before validation. Duration arrives as
/// raw minutes and is checked against the allowed set.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub tutor_id: Ulid,
    pub parent_id: Ulid,
    pub child_id: Ulid,
    pub subject: String,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tutor {
    pub id: Ulid,
    pub name: String,
    pub subjects: Vec<String>,
    pub hourly_rate: f64,
    pub availability: WeeklyAvailability,
}

impl Tutor {
    pub fn new(id: Ulid, name: String, hourly_rate: f64, subjects: Vec<String>) -> Self {
        Self {
            id,
            name,
            subjects,
            hourly_rate,
            availability: WeeklyAvailability::default(),
        }
    }

    pub fn offers_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    pub id: Ulid,
    pub parent_id: Ulid,
    pub name: String,
    pub grade: Option<String>,
}

/// Fire-and-forget notice for a party's notification feed. No acknowledgment,
/// no retry, no ordering guarantee beyond send order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Info,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TutorInfo {
    pub id: Ulid,
    pub name: String,
    pub hourly_rate: f64,
    pub subjects: Vec<String>,
}

/// Filter for booking listings. `None` fields match everything; results keep
/// insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookingFilter {
    pub tutor: Option<Ulid>,
    pub parent: Option<Ulid>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.tutor.is_none_or(|t| booking.tutor_id == t)
            && self.parent.is_none_or(|p| booking.parent_id == p)
            && self.status.is_none_or(|s| booking.status == s)
    }
}

/// Earnings rollup over a tutor's completed sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct EarningsInfo {
    pub tutor_id: Ulid,
    pub sessions_completed: u64,
    pub hours_taught: f64,
    pub total_earned: f64,
}
