//! Leave request models and queries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

/// Lifecycle of a leave request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "Pending",
            LeaveStatus::Approved => "Approved",
            LeaveStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LeaveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LeaveStatus::Pending),
            "Approved" => Ok(LeaveStatus::Approved),
            "Rejected" => Ok(LeaveStatus::Rejected),
            _ => Err(format!("Unknown leave status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaveRequest {
    pub id: String,
    pub staff_id: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
    pub reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

impl LeaveRequest {
    /// Inclusive on both ends
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeaveRequest {
    pub staff_id: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

/// Body of `PUT /api/leave/:id`. The status is kept as text so that
/// unknown values surface as an invalid transition rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct DecideLeaveRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecideLeaveResponse {
    pub success: bool,
    pub leave: LeaveRequest,
    /// Plans that still have scheduled sessions inside an approved leave
    pub plans_needing_regeneration: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveQuery {
    pub staff_id: Option<String>,
    pub status: Option<LeaveStatus>,
}

impl LeaveRequest {
    pub async fn find<'e, E>(executor: E, id: &str) -> Result<Option<LeaveRequest>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM leave_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, query: &LeaveQuery) -> Result<Vec<LeaveRequest>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM leave_requests
            WHERE (?1 IS NULL OR staff_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY start_date DESC, created_at DESC
            "#,
        )
        .bind(&query.staff_id)
        .bind(query.status)
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, leave: &LeaveRequest) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO leave_requests (
                id, staff_id, leave_type, start_date, end_date, status, reason,
                reviewed_by, reviewed_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&leave.id)
        .bind(&leave.staff_id)
        .bind(&leave.leave_type)
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(leave.status)
        .bind(&leave.reason)
        .bind(&leave.reviewed_by)
        .bind(&leave.reviewed_at)
        .bind(&leave.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Move a `Pending` request to `status`. Returns false when the row is
    /// missing or no longer pending; the check and the write are one statement.
    pub async fn resolve_pending<'e, E>(
        executor: E,
        id: &str,
        status: LeaveStatus,
        reviewed_by: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, reviewed_by = ?, reviewed_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(status)
        .bind(reviewed_by)
        .bind(&now)
        .bind(id)
        .bind(LeaveStatus::Pending)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Approved leave of one staff member overlapping `[start, end]`
    pub async fn approved_overlapping<'e, E>(
        executor: E,
        staff_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM leave_requests
            WHERE staff_id = ? AND status = ? AND start_date <= ? AND end_date >= ?
            ORDER BY start_date ASC
            "#,
        )
        .bind(staff_id)
        .bind(LeaveStatus::Approved)
        .bind(end)
        .bind(start)
        .fetch_all(executor)
        .await
    }
}
