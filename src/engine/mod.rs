//! Scheduling core.
//!
//! The pieces are layered leaves-first:
//! - `calendar` expands a date range and cadence into calendar dates (pure)
//! - `availability` answers "is this trainer bookable on this date" from a
//!   snapshot of approved leave
//! - `generator` combines the two and persists a plan's session set
//! - `plans` and `sessions` cover the manual edits around generation
//! - `leave` owns the leave approval state machine
//! - `attendance` derives a day's attendance status from clock punches
//! - `billing` links a plan to its single bill and keeps payment status in step

pub mod attendance;
pub mod availability;
pub mod billing;
pub mod calendar;
pub mod generator;
pub mod leave;
pub mod locks;
pub mod plans;
pub mod sessions;

pub use attendance::{derive_status, worked_minutes, AttendanceThresholds};
pub use availability::LeaveCalendar;
pub use calendar::expand_dates;
pub use generator::{GenerateParams, GenerationOutcome};
pub use locks::PlanLocks;
pub use plans::PlanRules;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Errors raised by core operations. All of them are deterministic input or
/// state errors except `Database`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid {resource} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        resource: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("A bill already exists for plan {0}")]
    DuplicateBill(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            resource,
            id: id.into(),
        }
    }
}

/// Longest duration any session can have; it must end on its start day
pub const MAX_SESSION_MINUTES: i64 = 24 * 60 - 1;

/// `start + minutes`, refusing values that would wrap past midnight
pub fn end_time_for(start: NaiveTime, minutes: i64) -> Result<NaiveTime, EngineError> {
    if minutes <= 0 {
        return Err(EngineError::validation(
            "duration_minutes",
            "Duration must be greater than zero",
        ));
    }
    // Bounded before building a Duration, which panics out of range
    if minutes > MAX_SESSION_MINUTES {
        return Err(EngineError::validation(
            "duration_minutes",
            format!("Duration cannot exceed {} minutes", MAX_SESSION_MINUTES),
        ));
    }
    let (end, wrapped) = start.overflowing_add_signed(chrono::Duration::minutes(minutes));
    if wrapped != 0 {
        return Err(EngineError::validation(
            "duration_minutes",
            format!("A session starting at {} cannot last {} minutes", start, minutes),
        ));
    }
    Ok(end)
}

/// Reject `start > end` before anything is touched
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), EngineError> {
    if start > end {
        return Err(EngineError::InvalidRange { start, end });
    }
    Ok(())
}
