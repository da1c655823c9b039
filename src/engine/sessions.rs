//! Manual session edits and explicit deletes.

use sqlx::SqlitePool;
use tracing::info;

use super::{EngineError, PlanLocks};
use crate::db::{begin_write, Plan, Session, UpdateSessionRequest};

const RESOURCE: &str = "session";

/// Apply `req` to a session copy and check the result against its plan.
///
/// A new start time without an end time moves the whole session and keeps
/// its length.
pub fn apply_edit(
    plan: &Plan,
    session: &Session,
    req: &UpdateSessionRequest,
) -> Result<Session, EngineError> {
    let mut next = session.clone();

    if let Some(date) = req.session_date {
        if date < plan.start_date || date > plan.end_date {
            return Err(EngineError::validation(
                "session_date",
                format!(
                    "{} is outside the plan range {} to {}",
                    date, plan.start_date, plan.end_date
                ),
            ));
        }
        next.session_date = date;
    }

    match (req.start_time, req.end_time) {
        (Some(start), None) => {
            let length = session.end_time - session.start_time;
            let (end, wrapped) = start.overflowing_add_signed(length);
            if wrapped != 0 {
                return Err(EngineError::validation(
                    "start_time",
                    format!("A session starting at {} would run past midnight", start),
                ));
            }
            next.start_time = start;
            next.end_time = end;
        }
        (start, end) => {
            next.start_time = start.unwrap_or(session.start_time);
            next.end_time = end.unwrap_or(session.end_time);
        }
    }
    if next.end_time <= next.start_time {
        return Err(EngineError::validation(
            "end_time",
            format!(
                "End time {} must be after start time {}",
                next.end_time, next.start_time
            ),
        ));
    }

    if let Some(trainer_id) = &req.trainer_id {
        if trainer_id.trim().is_empty() {
            return Err(EngineError::validation("trainer_id", "Trainer id cannot be empty"));
        }
        next.trainer_id = trainer_id.clone();
    }
    if let Some(status) = req.status {
        next.status = status;
    }
    if req.notes.is_some() {
        next.notes = req.notes.clone();
    }

    Ok(next)
}

pub async fn update_session(
    db: &SqlitePool,
    locks: &PlanLocks,
    session_id: &str,
    req: &UpdateSessionRequest,
) -> Result<Session, EngineError> {
    let plan_id = Session::find(db, session_id)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, session_id))?
        .plan_id;

    let _guard = locks.acquire(&plan_id).await;
    let mut tx = begin_write(db).await?;

    // Re-read under the lock; a regeneration may have removed it meanwhile
    let session = Session::find(&mut *tx, session_id)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, session_id))?;
    let plan = Plan::find(&mut *tx, &plan_id)
        .await?
        .ok_or_else(|| EngineError::PlanNotFound(plan_id.clone()))?;

    let mut next = apply_edit(&plan, &session, req)?;

    if next.session_date != session.session_date
        && Session::dates_for_plan(&mut *tx, &plan_id)
            .await?
            .contains(&next.session_date)
    {
        return Err(EngineError::Conflict(format!(
            "Plan {} already has a session on {}",
            plan_id, next.session_date
        )));
    }

    next.updated_at = chrono::Utc::now().to_rfc3339();
    Session::update(&mut *tx, &next).await?;
    tx.commit().await?;

    info!(session_id = %session_id, plan_id = %plan_id, status = %next.status, "Session updated");
    Ok(next)
}

pub async fn delete_session(
    db: &SqlitePool,
    locks: &PlanLocks,
    session_id: &str,
) -> Result<Session, EngineError> {
    let session = Session::find(db, session_id)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, session_id))?;

    let _guard = locks.acquire(&session.plan_id).await;
    if Session::delete(db, session_id).await? == 0 {
        return Err(EngineError::not_found(RESOURCE, session_id));
    }

    info!(session_id = %session_id, plan_id = %session.plan_id, "Session deleted");
    Ok(session)
}
