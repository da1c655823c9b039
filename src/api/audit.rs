//! Audit log API endpoints and helpers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::db::{list_audit_logs, log_audit, AuditLogListResponse, AuditLogQuery};
use crate::AppState;

use super::auth::Actor;
use super::error::ApiError;

/// Record an audit event on behalf of `actor`. Failures are logged and
/// never fail the request that triggered them.
pub async fn audit_log(
    state: &AppState,
    actor: &Actor,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = log_audit(
        &state.db,
        action,
        resource_type,
        resource_id,
        Some(actor.id()),
        details,
    )
    .await
    {
        tracing::warn!(
            action = action,
            resource_type = resource_type,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}

/// List audit logs with filtering and pagination
///
/// Query parameters:
/// - action: Filter by action type (e.g., "sessions.generate")
/// - resource_type: Filter by resource type (e.g., "plan", "leave")
/// - resource_id: Filter by specific resource ID
/// - actor_id: Filter by actor
/// - page: Page number (1-indexed, defaults to 1)
/// - per_page: Items per page (defaults to 50, max 100)
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    let result = list_audit_logs(&state.db, &query).await?;
    Ok(Json(result))
}
