//! Bill models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

use super::plan::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum BillStatus {
    Pending,
    Paid,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "Pending",
            BillStatus::Paid => "Paid",
            BillStatus::Cancelled => "Cancelled",
        }
    }

    /// Payment status the owning plan must show while the bill is in this state
    pub fn plan_payment_status(&self) -> PaymentStatus {
        match self {
            BillStatus::Paid => PaymentStatus::Paid,
            BillStatus::Pending | BillStatus::Cancelled => PaymentStatus::Pending,
        }
    }

    pub fn can_transition_to(&self, next: BillStatus) -> bool {
        matches!(
            (self, next),
            (BillStatus::Pending, BillStatus::Paid) | (BillStatus::Pending, BillStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: String,
    pub plan_id: String,
    pub subtotal: f64,
    pub tax: f64,
    pub total_amount: f64,
    pub bill_status: BillStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of `POST /api/bill`. Amounts stay untyped so that missing and
/// non-numeric values can be reported as an invalid amount.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBillRequest {
    pub plan_id: String,
    #[serde(default)]
    pub subtotal: Option<serde_json::Value>,
    #[serde(default)]
    pub tax: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillResponse {
    pub bill: Bill,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBillStatusRequest {
    pub bill_status: BillStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillQuery {
    pub bill_status: Option<BillStatus>,
}

impl Bill {
    pub async fn find<'e, E>(executor: E, id: &str) -> Result<Option<Bill>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM bills WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_for_plan<'e, E>(executor: E, plan_id: &str) -> Result<Option<Bill>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM bills WHERE plan_id = ?")
            .bind(plan_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, query: &BillQuery) -> Result<Vec<Bill>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM bills
            WHERE (?1 IS NULL OR bill_status = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(query.bill_status)
        .fetch_all(executor)
        .await
    }

    /// Insert relying on the `plan_id` unique constraint; a second bill for
    /// the same plan fails inside the database, not in a prior lookup.
    pub async fn insert<'e, E>(executor: E, bill: &Bill) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO bills (
                id, plan_id, subtotal, tax, total_amount, bill_status, notes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bill.id)
        .bind(&bill.plan_id)
        .bind(bill.subtotal)
        .bind(bill.tax)
        .bind(bill.total_amount)
        .bind(bill.bill_status)
        .bind(&bill.notes)
        .bind(&bill.created_at)
        .bind(&bill.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Compare-and-set on the status column
    pub async fn transition<'e, E>(
        executor: E,
        id: &str,
        from: BillStatus,
        to: BillStatus,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE bills SET bill_status = ?, updated_at = ? WHERE id = ? AND bill_status = ?",
        )
        .bind(to)
        .bind(&now)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
