use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{actions, resource_types, Session, UpdateSessionRequest, UpdateSessionResponse};
use crate::engine::{sessions, EngineError};
use crate::AppState;

use super::audit::audit_log;
use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_note, validate_person_id};

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = Session::find(&state.db, &id)
        .await?
        .ok_or_else(|| EngineError::not_found("session", &id))?;
    Ok(Json(session))
}

/// Edit a single session
///
/// PUT /api/update-session/:id (also PUT /api/sessions/:id)
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<UpdateSessionResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(trainer_id) = &req.trainer_id {
        errors.check("trainer_id", validate_person_id(trainer_id, "trainer_id"));
    }
    errors.check("notes", validate_note(&req.notes));
    errors.finish()?;

    let session = sessions::update_session(&state.db, &state.plan_locks, &id, &req).await?;

    audit_log(
        &state,
        &actor,
        actions::SESSION_UPDATE,
        resource_types::SESSION,
        Some(&id),
        Some(json!({
            "plan_id": session.plan_id,
            "session_date": session.session_date,
            "status": session.status,
            "trainer_id": session.trainer_id,
        })),
    )
    .await;

    Ok(Json(UpdateSessionResponse {
        success: true,
        session,
    }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = sessions::delete_session(&state.db, &state.plan_locks, &id).await?;

    audit_log(
        &state,
        &actor,
        actions::SESSION_DELETE,
        resource_types::SESSION,
        Some(&id),
        Some(json!({ "plan_id": removed.plan_id, "session_date": removed.session_date })),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
