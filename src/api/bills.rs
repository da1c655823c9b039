use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    actions, resource_types, Bill, BillQuery, BillResponse, CreateBillRequest,
    UpdateBillStatusRequest,
};
use crate::engine::{billing, EngineError};
use crate::AppState;

use super::audit::audit_log;
use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_bill_event;
use super::validation::validate_note;

pub async fn list_bills(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BillQuery>,
) -> Result<Json<Vec<Bill>>, ApiError> {
    let bills = Bill::list(&state.db, &query).await?;
    Ok(Json(bills))
}

pub async fn get_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Bill>, ApiError> {
    let bill = Bill::find(&state.db, &id)
        .await?
        .ok_or_else(|| EngineError::not_found("bill", &id))?;
    Ok(Json(bill))
}

/// Bill a plan
///
/// POST /api/bill (also POST /api/bills)
pub async fn create_bill(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("notes", validate_note(&req.notes));
    errors.finish()?;

    let bill = billing::create_bill(&state.db, &req).await?;
    record_bill_event(bill.bill_status.as_str());

    audit_log(
        &state,
        &actor,
        actions::BILL_CREATE,
        resource_types::BILL,
        Some(&bill.id),
        Some(json!({ "plan_id": bill.plan_id, "total_amount": bill.total_amount })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(BillResponse { bill })))
}

/// PUT /api/bills/:id/status
pub async fn update_bill_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<UpdateBillStatusRequest>,
) -> Result<Json<BillResponse>, ApiError> {
    let bill = billing::update_bill_status(&state.db, &id, req.bill_status).await?;
    record_bill_event(bill.bill_status.as_str());

    audit_log(
        &state,
        &actor,
        actions::BILL_STATUS,
        resource_types::BILL,
        Some(&id),
        Some(json!({ "plan_id": bill.plan_id, "bill_status": bill.bill_status })),
    )
    .await;

    Ok(Json(BillResponse { bill }))
}
