//! Plan lifecycle: creation, edits before scheduling, deletion.

use sqlx::SqlitePool;
use tracing::info;

use super::{calendar::span_days, check_range, end_time_for, EngineError, PlanLocks};
use crate::db::{begin_write, Bill, CreatePlanRequest, PaymentStatus, Plan, Session, UpdatePlanRequest};

/// Limits applied to plan shape
#[derive(Debug, Clone, Copy)]
pub struct PlanRules {
    pub max_plan_days: i64,
}

impl Default for PlanRules {
    fn default() -> Self {
        Self { max_plan_days: 366 }
    }
}

fn check_plan(plan: &Plan, rules: &PlanRules) -> Result<(), EngineError> {
    if plan.client_id.trim().is_empty() {
        return Err(EngineError::validation("client_id", "Client id is required"));
    }
    if plan.trainer_id.trim().is_empty() {
        return Err(EngineError::validation("trainer_id", "Trainer id is required"));
    }
    check_range(plan.start_date, plan.end_date)?;

    let span = span_days(plan.start_date, plan.end_date);
    if span > rules.max_plan_days {
        return Err(EngineError::validation(
            "end_date",
            format!(
                "Plan spans {} days, the limit is {}",
                span, rules.max_plan_days
            ),
        ));
    }

    end_time_for(plan.start_time, plan.duration_minutes)?;

    if !plan.amount.is_finite() || plan.amount < 0.0 {
        return Err(EngineError::InvalidAmount(format!(
            "Plan amount must be a non-negative number, got {}",
            plan.amount
        )));
    }
    Ok(())
}

pub async fn create_plan(
    db: &SqlitePool,
    req: CreatePlanRequest,
    rules: &PlanRules,
) -> Result<Plan, EngineError> {
    let now = chrono::Utc::now().to_rfc3339();
    let plan = Plan {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: req.client_id,
        trainer_id: req.trainer_id,
        plan_type: req.plan_type,
        start_date: req.start_date,
        end_date: req.end_date,
        start_time: req.start_time,
        duration_minutes: req.duration_minutes,
        amount: req.amount,
        payment_status: PaymentStatus::Pending,
        created_at: now.clone(),
        updated_at: now,
    };
    check_plan(&plan, rules)?;

    Plan::insert(db, &plan).await?;
    info!(plan_id = %plan.id, trainer_id = %plan.trainer_id, plan_type = %plan.plan_type, "Plan created");
    Ok(plan)
}

/// Edit a plan that has not been scheduled yet. Once sessions exist the
/// plan is fixed and changes go through regeneration.
pub async fn update_plan(
    db: &SqlitePool,
    locks: &PlanLocks,
    plan_id: &str,
    req: UpdatePlanRequest,
    rules: &PlanRules,
) -> Result<Plan, EngineError> {
    let guard = locks.acquire(plan_id).await;
    let result = update_plan_locked(db, plan_id, req, rules).await;
    drop(guard);

    if matches!(result, Err(EngineError::PlanNotFound(_))) {
        locks.forget_if_idle(plan_id);
    }
    result
}

async fn update_plan_locked(
    db: &SqlitePool,
    plan_id: &str,
    req: UpdatePlanRequest,
    rules: &PlanRules,
) -> Result<Plan, EngineError> {
    let mut tx = begin_write(db).await?;

    let mut plan = Plan::find(&mut *tx, plan_id)
        .await?
        .ok_or_else(|| EngineError::PlanNotFound(plan_id.to_string()))?;

    if Session::count_for_plan(&mut *tx, plan_id).await? > 0 {
        return Err(EngineError::Conflict(format!(
            "Plan {} already has sessions; regenerate instead of editing",
            plan_id
        )));
    }

    if let Some(v) = req.client_id {
        plan.client_id = v;
    }
    if let Some(v) = req.trainer_id {
        plan.trainer_id = v;
    }
    if let Some(v) = req.plan_type {
        plan.plan_type = v;
    }
    if let Some(v) = req.start_date {
        plan.start_date = v;
    }
    if let Some(v) = req.end_date {
        plan.end_date = v;
    }
    if let Some(v) = req.start_time {
        plan.start_time = v;
    }
    if let Some(v) = req.duration_minutes {
        plan.duration_minutes = v;
    }
    if let Some(v) = req.amount {
        plan.amount = v;
    }
    check_plan(&plan, rules)?;

    plan.updated_at = chrono::Utc::now().to_rfc3339();
    Plan::update(&mut *tx, &plan).await?;
    tx.commit().await?;

    info!(plan_id = %plan_id, "Plan updated");
    Ok(plan)
}

/// Delete an unbilled plan together with its sessions
pub async fn delete_plan(db: &SqlitePool, locks: &PlanLocks, plan_id: &str) -> Result<(), EngineError> {
    {
        let guard = locks.acquire(plan_id).await;
        let mut tx = begin_write(db).await?;

        if Bill::find_for_plan(&mut *tx, plan_id).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "Plan {} has a bill and cannot be deleted",
                plan_id
            )));
        }
        if Plan::delete(&mut *tx, plan_id).await? == 0 {
            drop(tx);
            drop(guard);
            locks.forget_if_idle(plan_id);
            return Err(EngineError::PlanNotFound(plan_id.to_string()));
        }
        tx.commit().await?;
    }
    locks.forget(plan_id);

    info!(plan_id = %plan_id, "Plan deleted");
    Ok(())
}
