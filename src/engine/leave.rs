//! Leave approval state machine.
//!
//! `Pending -> Approved | Rejected`, both terminal. Approval never touches
//! sessions; it only reports which plans now need a replace-mode regeneration.

use sqlx::SqlitePool;
use tracing::info;

use super::{check_range, EngineError};
use crate::db::{begin_write, CreateLeaveRequest, LeaveRequest, LeaveStatus, Session};

const RESOURCE: &str = "leave";

/// Result of a leave decision
#[derive(Debug, Clone)]
pub struct LeaveDecision {
    pub leave: LeaveRequest,
    pub plans_needing_regeneration: Vec<String>,
}

/// File a new `Pending` leave request
pub async fn create_leave(
    db: &SqlitePool,
    req: CreateLeaveRequest,
) -> Result<LeaveRequest, EngineError> {
    check_range(req.start_date, req.end_date)?;
    if req.staff_id.trim().is_empty() {
        return Err(EngineError::validation("staff_id", "Staff id is required"));
    }
    if req.leave_type.trim().is_empty() {
        return Err(EngineError::validation("leave_type", "Leave type is required"));
    }

    let leave = LeaveRequest {
        id: uuid::Uuid::new_v4().to_string(),
        staff_id: req.staff_id,
        leave_type: req.leave_type,
        start_date: req.start_date,
        end_date: req.end_date,
        status: LeaveStatus::Pending,
        reason: req.reason,
        reviewed_by: None,
        reviewed_at: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    LeaveRequest::insert(db, &leave).await?;

    info!(leave_id = %leave.id, staff_id = %leave.staff_id, "Leave request filed");
    Ok(leave)
}

/// Resolve a pending leave request to `requested` on behalf of `actor`.
///
/// `requested` is the raw status text from the caller. Anything other than
/// `Approved` or `Rejected` is an invalid transition, as is deciding a
/// request that is no longer pending.
pub async fn decide(
    db: &SqlitePool,
    leave_id: &str,
    requested: &str,
    actor: &str,
) -> Result<LeaveDecision, EngineError> {
    let target = match requested.parse::<LeaveStatus>() {
        Ok(status) if status.is_terminal() => status,
        _ => {
            let current = LeaveRequest::find(db, leave_id)
                .await?
                .ok_or_else(|| EngineError::not_found(RESOURCE, leave_id))?;
            return Err(invalid_transition(leave_id, current.status, requested));
        }
    };

    let mut tx = begin_write(db).await?;

    if !LeaveRequest::resolve_pending(&mut *tx, leave_id, target, actor).await? {
        let current = LeaveRequest::find(&mut *tx, leave_id)
            .await?
            .ok_or_else(|| EngineError::not_found(RESOURCE, leave_id))?;
        return Err(invalid_transition(leave_id, current.status, requested));
    }

    let leave = LeaveRequest::find(&mut *tx, leave_id)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, leave_id))?;

    let plans_needing_regeneration = if target == LeaveStatus::Approved {
        Session::plans_scheduled_between(&mut *tx, &leave.staff_id, leave.start_date, leave.end_date)
            .await?
    } else {
        Vec::new()
    };

    tx.commit().await?;

    info!(
        leave_id = %leave_id,
        status = %target,
        reviewed_by = %actor,
        affected_plans = plans_needing_regeneration.len(),
        "Leave request resolved"
    );

    Ok(LeaveDecision {
        leave,
        plans_needing_regeneration,
    })
}

fn invalid_transition(id: &str, from: LeaveStatus, to: &str) -> EngineError {
    EngineError::InvalidTransition {
        resource: RESOURCE,
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}
