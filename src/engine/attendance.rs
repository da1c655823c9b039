//! Attendance reconciliation.
//!
//! Status is a pure function of the stored punches and the configured
//! full-day threshold, recomputed on every read.

use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use tracing::info;

use super::EngineError;
use crate::db::{begin_write, Attendance, AttendanceResponse, AttendanceStatus, ClockRequest};

const RESOURCE: &str = "attendance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceThresholds {
    /// Worked minutes at or above which a completed day counts as present
    pub full_day_minutes: i64,
}

impl Default for AttendanceThresholds {
    fn default() -> Self {
        Self {
            full_day_minutes: 480,
        }
    }
}

/// Minutes between the punches, when both are present
pub fn worked_minutes(clock_in: Option<NaiveTime>, clock_out: Option<NaiveTime>) -> Option<i64> {
    match (clock_in, clock_out) {
        (Some(start), Some(end)) => Some((end - start).num_minutes()),
        _ => None,
    }
}

pub fn derive_status(
    clock_in: Option<NaiveTime>,
    clock_out: Option<NaiveTime>,
    thresholds: &AttendanceThresholds,
) -> AttendanceStatus {
    match (clock_in, clock_out) {
        (None, None) => AttendanceStatus::Absent,
        // A clock-out with no clock-in cannot be written, but legacy rows
        // are still reported as an open day
        (Some(_), None) | (None, Some(_)) => AttendanceStatus::PresentIncomplete,
        (Some(_), Some(_)) => match worked_minutes(clock_in, clock_out) {
            Some(m) if m >= thresholds.full_day_minutes => AttendanceStatus::Present,
            _ => AttendanceStatus::HalfDay,
        },
    }
}

pub fn to_response(record: &Attendance, thresholds: &AttendanceThresholds) -> AttendanceResponse {
    AttendanceResponse {
        id: Some(record.id.clone()),
        staff_id: record.staff_id.clone(),
        date: record.date,
        clock_in: record.clock_in,
        clock_out: record.clock_out,
        worked_minutes: worked_minutes(record.clock_in, record.clock_out),
        status: derive_status(record.clock_in, record.clock_out, thresholds),
    }
}

fn absent(staff_id: &str, date: NaiveDate) -> AttendanceResponse {
    AttendanceResponse {
        id: None,
        staff_id: staff_id.to_string(),
        date,
        clock_in: None,
        clock_out: None,
        worked_minutes: None,
        status: AttendanceStatus::Absent,
    }
}

fn require_staff(staff_id: &str) -> Result<(), EngineError> {
    if staff_id.trim().is_empty() {
        return Err(EngineError::validation("staff_id", "Staff id is required"));
    }
    Ok(())
}

pub async fn clock_in(
    db: &SqlitePool,
    req: &ClockRequest,
    thresholds: &AttendanceThresholds,
) -> Result<AttendanceResponse, EngineError> {
    require_staff(&req.staff_id)?;

    let mut tx = begin_write(db).await?;
    if !Attendance::record_clock_in(&mut *tx, &req.staff_id, req.date, req.time).await? {
        return Err(EngineError::Conflict(format!(
            "{} is already clocked in on {}",
            req.staff_id, req.date
        )));
    }
    let record = Attendance::find_for_day(&mut *tx, &req.staff_id, req.date)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, format!("{}/{}", req.staff_id, req.date)))?;
    tx.commit().await?;

    info!(staff_id = %req.staff_id, date = %req.date, time = %req.time, "Clocked in");
    Ok(to_response(&record, thresholds))
}

pub async fn clock_out(
    db: &SqlitePool,
    req: &ClockRequest,
    thresholds: &AttendanceThresholds,
) -> Result<AttendanceResponse, EngineError> {
    require_staff(&req.staff_id)?;

    let mut tx = begin_write(db).await?;
    let mut record = Attendance::find_for_day(&mut *tx, &req.staff_id, req.date)
        .await?
        .filter(|r| r.clock_in.is_some())
        .ok_or_else(|| {
            EngineError::Conflict(format!(
                "{} has not clocked in on {}",
                req.staff_id, req.date
            ))
        })?;

    if record.clock_out.is_some() {
        return Err(EngineError::Conflict(format!(
            "{} is already clocked out on {}",
            req.staff_id, req.date
        )));
    }
    if let Some(started) = record.clock_in {
        if req.time < started {
            return Err(EngineError::validation(
                "time",
                format!("Clock-out {} is before clock-in {}", req.time, started),
            ));
        }
    }

    if !Attendance::set_times(&mut *tx, &record.id, record.clock_in, Some(req.time)).await? {
        return Err(EngineError::not_found(RESOURCE, record.id.clone()));
    }
    tx.commit().await?;

    record.clock_out = Some(req.time);
    info!(staff_id = %req.staff_id, date = %req.date, time = %req.time, "Clocked out");
    Ok(to_response(&record, thresholds))
}

/// Admin replacement of both punches
pub async fn edit(
    db: &SqlitePool,
    id: &str,
    clock_in: Option<NaiveTime>,
    clock_out: Option<NaiveTime>,
    thresholds: &AttendanceThresholds,
) -> Result<AttendanceResponse, EngineError> {
    match (clock_in, clock_out) {
        (None, Some(_)) => {
            return Err(EngineError::validation(
                "clock_out",
                "A clock-out requires a clock-in",
            ))
        }
        (Some(start), Some(end)) if end < start => {
            return Err(EngineError::validation(
                "clock_out",
                format!("Clock-out {} is before clock-in {}", end, start),
            ))
        }
        _ => {}
    }

    let mut tx = begin_write(db).await?;
    let mut record = Attendance::find(&mut *tx, id)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, id))?;

    if !Attendance::set_times(&mut *tx, id, clock_in, clock_out).await? {
        return Err(EngineError::not_found(RESOURCE, id));
    }
    tx.commit().await?;

    record.clock_in = clock_in;
    record.clock_out = clock_out;
    let response = to_response(&record, thresholds);

    info!(
        attendance_id = %id,
        staff_id = %record.staff_id,
        date = %record.date,
        status = %response.status,
        "Attendance edited"
    );
    Ok(response)
}

/// A staff member's attendance on one day; no record reads as absent
pub async fn day_status(
    db: &SqlitePool,
    staff_id: &str,
    date: NaiveDate,
    thresholds: &AttendanceThresholds,
) -> Result<AttendanceResponse, EngineError> {
    Ok(match Attendance::find_for_day(db, staff_id, date).await? {
        Some(record) => to_response(&record, thresholds),
        None => absent(staff_id, date),
    })
}
