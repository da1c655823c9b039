use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    actions, resource_types, CreateLeaveRequest, DecideLeaveRequest, DecideLeaveResponse,
    LeaveQuery, LeaveRequest, LeaveStatus,
};
use crate::engine::{leave, EngineError};
use crate::AppState;

use super::audit::audit_log;
use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_leave_decision;
use super::validation::{validate_leave_type, validate_note, validate_person_id};

pub async fn list_leaves(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaveQuery>,
) -> Result<Json<Vec<LeaveRequest>>, ApiError> {
    let leaves = LeaveRequest::list(&state.db, &query).await?;
    Ok(Json(leaves))
}

pub async fn get_leave(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LeaveRequest>, ApiError> {
    let leave = LeaveRequest::find(&state.db, &id)
        .await?
        .ok_or_else(|| EngineError::not_found("leave", &id))?;
    Ok(Json(leave))
}

pub async fn create_leave(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<LeaveRequest>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("staff_id", validate_person_id(&req.staff_id, "staff_id"));
    errors.check("leave_type", validate_leave_type(&req.leave_type));
    errors.check("reason", validate_note(&req.reason));
    errors.finish()?;

    let leave = leave::create_leave(&state.db, req).await?;

    audit_log(
        &state,
        &actor,
        actions::LEAVE_CREATE,
        resource_types::LEAVE,
        Some(&leave.id),
        Some(json!({
            "staff_id": leave.staff_id,
            "start_date": leave.start_date,
            "end_date": leave.end_date,
        })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(leave)))
}

/// Approve or reject a pending leave request
///
/// PUT /api/leave/:id
pub async fn decide_leave(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<DecideLeaveRequest>,
) -> Result<Json<DecideLeaveResponse>, ApiError> {
    let decision = leave::decide(&state.db, &id, &req.status, actor.id()).await?;
    record_leave_decision(decision.leave.status.as_str());

    let action = match decision.leave.status {
        LeaveStatus::Approved => actions::LEAVE_APPROVE,
        _ => actions::LEAVE_REJECT,
    };
    audit_log(
        &state,
        &actor,
        action,
        resource_types::LEAVE,
        Some(&id),
        Some(json!({
            "staff_id": decision.leave.staff_id,
            "plans_needing_regeneration": decision.plans_needing_regeneration,
        })),
    )
    .await;

    Ok(Json(DecideLeaveResponse {
        success: true,
        leave: decision.leave,
        plans_needing_regeneration: decision.plans_needing_regeneration,
    }))
}
