//! Billing linker: one bill per plan, with the plan's payment status kept in
//! step with the bill's lifecycle.

use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use super::EngineError;
use crate::db::{begin_write, Bill, BillStatus, CreateBillRequest, Plan};

const RESOURCE: &str = "bill";

/// Read a money amount given as a JSON number or numeric string.
///
/// `None` (or JSON null) is an error when `required`, otherwise zero.
pub fn parse_amount(value: Option<&Value>, field: &str, required: bool) -> Result<f64, EngineError> {
    let amount = match value {
        None | Some(Value::Null) if required => {
            return Err(EngineError::InvalidAmount(format!("{} is required", field)))
        }
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| EngineError::InvalidAmount(format!("{} is not a number", field)))?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            EngineError::InvalidAmount(format!("{} is not a number: {:?}", field, s))
        })?,
        Some(other) => {
            return Err(EngineError::InvalidAmount(format!(
                "{} is not a number: {}",
                field, other
            )))
        }
    };

    if !amount.is_finite() {
        return Err(EngineError::InvalidAmount(format!("{} must be finite", field)));
    }
    if amount < 0.0 {
        return Err(EngineError::InvalidAmount(format!("{} cannot be negative", field)));
    }
    Ok(amount)
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Bill a plan. Amounts are validated before the plan is looked up, and the
/// plan's single bill slot is claimed by the unique index on insert.
pub async fn create_bill(db: &SqlitePool, req: &CreateBillRequest) -> Result<Bill, EngineError> {
    let subtotal = parse_amount(req.subtotal.as_ref(), "subtotal", true)?;
    let tax = parse_amount(req.tax.as_ref(), "tax", false)?;

    let mut tx = begin_write(db).await?;

    if Plan::find(&mut *tx, &req.plan_id).await?.is_none() {
        return Err(EngineError::PlanNotFound(req.plan_id.clone()));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let bill = Bill {
        id: uuid::Uuid::new_v4().to_string(),
        plan_id: req.plan_id.clone(),
        subtotal: round_cents(subtotal),
        tax: round_cents(tax),
        total_amount: round_cents(subtotal + tax),
        bill_status: BillStatus::Pending,
        notes: req.notes.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    Bill::insert(&mut *tx, &bill).await.map_err(|e| {
        if is_unique_violation(&e) {
            EngineError::DuplicateBill(req.plan_id.clone())
        } else {
            EngineError::Database(e)
        }
    })?;
    Plan::set_payment_status(&mut *tx, &bill.plan_id, bill.bill_status.plan_payment_status()).await?;

    tx.commit().await?;

    info!(bill_id = %bill.id, plan_id = %bill.plan_id, total = bill.total_amount, "Bill created");
    Ok(bill)
}

/// Move a bill along `Pending -> Paid | Cancelled` and mirror the result on
/// its plan in the same transaction.
pub async fn update_bill_status(
    db: &SqlitePool,
    bill_id: &str,
    next: BillStatus,
) -> Result<Bill, EngineError> {
    let mut tx = begin_write(db).await?;

    let mut bill = Bill::find(&mut *tx, bill_id)
        .await?
        .ok_or_else(|| EngineError::not_found(RESOURCE, bill_id))?;

    let invalid = |from: BillStatus| EngineError::InvalidTransition {
        resource: RESOURCE,
        id: bill_id.to_string(),
        from: from.to_string(),
        to: next.to_string(),
    };

    if !bill.bill_status.can_transition_to(next) {
        return Err(invalid(bill.bill_status));
    }
    if !Bill::transition(&mut *tx, bill_id, bill.bill_status, next).await? {
        return Err(invalid(bill.bill_status));
    }
    Plan::set_payment_status(&mut *tx, &bill.plan_id, next.plan_payment_status()).await?;

    tx.commit().await?;

    info!(bill_id = %bill_id, from = %bill.bill_status, to = %next, "Bill status changed");
    bill.bill_status = next;
    Ok(bill)
}
