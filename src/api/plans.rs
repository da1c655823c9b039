use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    actions, resource_types, CreatePlanRequest, GenerateSessionsRequest, GenerateSessionsResponse,
    Plan, PlanQuery, Session, UpdatePlanRequest,
};
use crate::engine::{generator, plans, EngineError, GenerateParams};
use crate::AppState;

use super::audit::audit_log;
use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_generation;
use super::validation::validate_person_id;

fn validate_people(client_id: Option<&str>, trainer_id: Option<&str>) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(id) = client_id {
        errors.check("client_id", validate_person_id(id, "client_id"));
    }
    if let Some(id) = trainer_id {
        errors.check("trainer_id", validate_person_id(id, "trainer_id"));
    }
    errors.finish()
}

async fn load_plan(state: &AppState, id: &str) -> Result<Plan, ApiError> {
    Plan::find(&state.db, id)
        .await?
        .ok_or_else(|| EngineError::PlanNotFound(id.to_string()).into())
}

pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<Vec<Plan>>, ApiError> {
    let plans = Plan::list(&state.db, &query).await?;
    Ok(Json(plans))
}

pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    Ok(Json(load_plan(&state, &id).await?))
}

pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Plan>), ApiError> {
    validate_people(Some(&req.client_id), Some(&req.trainer_id))?;

    let plan = plans::create_plan(&state.db, req, &state.plan_rules()).await?;

    audit_log(
        &state,
        &actor,
        actions::PLAN_CREATE,
        resource_types::PLAN,
        Some(&plan.id),
        Some(json!({
            "client_id": plan.client_id,
            "trainer_id": plan.trainer_id,
            "plan_type": plan.plan_type,
        })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<UpdatePlanRequest>,
) -> Result<Json<Plan>, ApiError> {
    validate_people(req.client_id.as_deref(), req.trainer_id.as_deref())?;

    let plan = plans::update_plan(&state.db, &state.plan_locks, &id, req, &state.plan_rules()).await?;

    audit_log(&state, &actor, actions::PLAN_UPDATE, resource_types::PLAN, Some(&id), None).await;

    Ok(Json(plan))
}

pub async fn delete_plan(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    plans::delete_plan(&state.db, &state.plan_locks, &id).await?;

    audit_log(&state, &actor, actions::PLAN_DELETE, resource_types::PLAN, Some(&id), None).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_plan_sessions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Session>>, ApiError> {
    load_plan(&state, &id).await?;
    let sessions = Session::list_for_plan(&state.db, &id).await?;
    Ok(Json(sessions))
}

/// Expand a plan into sessions
///
/// POST /api/generate-sessions
pub async fn generate_sessions(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<GenerateSessionsRequest>,
) -> Result<Json<GenerateSessionsResponse>, ApiError> {
    let params = GenerateParams {
        start_time: req.start_time,
        duration_minutes: req.duration_minutes,
        replace_existing: req.replace_existing,
    };
    let outcome = generator::generate(&state.db, &state.plan_locks, &req.plan_id, &params).await?;
    record_generation(
        req.replace_existing,
        outcome.created_count(),
        outcome.skipped_unavailable.len(),
    );

    audit_log(
        &state,
        &actor,
        actions::SESSIONS_GENERATE,
        resource_types::PLAN,
        Some(&req.plan_id),
        Some(json!({
            "replace_existing": req.replace_existing,
            "created_count": outcome.created_count(),
            "deleted_count": outcome.deleted_count,
            "skipped_dates": outcome.skipped_unavailable,
        })),
    )
    .await;

    Ok(Json(GenerateSessionsResponse {
        success: true,
        created_count: outcome.created_count(),
        deleted_count: outcome.deleted_count,
        skipped_dates: outcome.skipped_unavailable,
    }))
}
