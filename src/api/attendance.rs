use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    actions, resource_types, Attendance, AttendanceQuery, AttendanceResponse, ClockRequest,
    EditAttendanceRequest,
};
use crate::engine::attendance::{self, to_response};
use crate::AppState;

use super::audit::audit_log;
use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_person_id;

fn validate_staff(staff_id: &str) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("staff_id", validate_person_id(staff_id, "staff_id"));
    errors.finish()
}

pub async fn clock_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClockRequest>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    validate_staff(&req.staff_id)?;
    let record = attendance::clock_in(&state.db, &req, &state.attendance_thresholds()).await?;
    Ok(Json(record))
}

pub async fn clock_out(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClockRequest>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    validate_staff(&req.staff_id)?;
    let record = attendance::clock_out(&state.db, &req, &state.attendance_thresholds()).await?;
    Ok(Json(record))
}

/// Replace both punches of a record
///
/// PUT /api/attendance/:id
pub async fn edit_attendance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<EditAttendanceRequest>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let record = attendance::edit(
        &state.db,
        &id,
        req.clock_in,
        req.clock_out,
        &state.attendance_thresholds(),
    )
    .await?;

    audit_log(
        &state,
        &actor,
        actions::ATTENDANCE_EDIT,
        resource_types::ATTENDANCE,
        Some(&id),
        Some(json!({
            "staff_id": record.staff_id,
            "date": record.date,
            "clock_in": record.clock_in,
            "clock_out": record.clock_out,
            "status": record.status,
        })),
    )
    .await;

    Ok(Json(record))
}

pub async fn list_attendance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<Vec<AttendanceResponse>>, ApiError> {
    let thresholds = state.attendance_thresholds();
    let records = Attendance::list(&state.db, &query).await?;
    Ok(Json(
        records.iter().map(|r| to_response(r, &thresholds)).collect(),
    ))
}

/// GET /api/staff/:staff_id/attendance/:date
pub async fn day_attendance(
    State(state): State<Arc<AppState>>,
    Path((staff_id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let record =
        attendance::day_status(&state.db, &staff_id, date, &state.attendance_thresholds()).await?;
    Ok(Json(record))
}
