//! Hard limits. Everything here bounds memory held on behalf of a single
//! tenant or the process as a whole; exceeding one fails the request with
//! `LimitExceeded` rather than degrading the server.

pub const MAX_TENANTS: usize = 256;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SUBJECT_LEN: usize = 100;
pub const MAX_SUBJECTS_PER_TUTOR: usize = 16;
pub const MAX_GRADE_LEN: usize = 50;
pub const MAX_NOTES_LEN: usize = 2000;

/// A day has 48 half-hour marks; more slots than that is a client bug.
pub const MAX_SLOTS_PER_DAY: usize = 48;

pub const MAX_TUTORS_PER_TENANT: usize = 10_000;
pub const MAX_PARENTS_PER_TENANT: usize = 10_000;
pub const MAX_CHILDREN_PER_PARENT: usize = 32;
pub const MAX_BOOKINGS_PER_TENANT: usize = 100_000;
