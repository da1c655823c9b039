//! Training session models and queries.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    Missed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Missed => "missed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub plan_id: String,
    pub client_id: String,
    pub trainer_id: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for `POST /api/generate-sessions`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateSessionsRequest {
    pub plan_id: String,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub replace_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSessionsResponse {
    pub success: bool,
    pub created_count: usize,
    pub deleted_count: u64,
    /// Dates dropped because the trainer has approved leave
    pub skipped_dates: Vec<NaiveDate>,
}

/// Request body for `PUT /api/update-session/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSessionRequest {
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: Option<SessionStatus>,
    pub trainer_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSessionResponse {
    pub success: bool,
    pub session: Session,
}

impl Session {
    pub async fn find<'e, E>(executor: E, id: &str) -> Result<Option<Session>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_for_plan<'e, E>(executor: E, plan_id: &str) -> Result<Vec<Session>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM sessions WHERE plan_id = ? ORDER BY session_date ASC")
            .bind(plan_id)
            .fetch_all(executor)
            .await
    }

    pub async fn count_for_plan<'e, E>(executor: E, plan_id: &str) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE plan_id = ?")
            .bind(plan_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Dates that already hold a session for the plan, in any status
    pub async fn dates_for_plan<'e, E>(
        executor: E,
        plan_id: &str,
    ) -> Result<HashSet<NaiveDate>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(NaiveDate,)> =
            sqlx::query_as("SELECT session_date FROM sessions WHERE plan_id = ?")
                .bind(plan_id)
                .fetch_all(executor)
                .await?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }

    /// Remove the still-scheduled sessions of a plan, leaving history alone
    pub async fn delete_scheduled_for_plan<'e, E>(
        executor: E,
        plan_id: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM sessions WHERE plan_id = ? AND status = ?")
            .bind(plan_id)
            .bind(SessionStatus::Scheduled)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert<'e, E>(executor: E, session: &Session) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, plan_id, client_id, trainer_id, session_date, start_time, end_time,
                status, notes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.plan_id)
        .bind(&session.client_id)
        .bind(&session.trainer_id)
        .bind(session.session_date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.status)
        .bind(&session.notes)
        .bind(&session.created_at)
        .bind(&session.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update<'e, E>(executor: E, session: &Session) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            UPDATE sessions SET
                trainer_id = ?,
                session_date = ?,
                start_time = ?,
                end_time = ?,
                status = ?,
                notes = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&session.trainer_id)
        .bind(session.session_date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.status)
        .bind(&session.notes)
        .bind(&session.updated_at)
        .bind(&session.id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: &str) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Plans with scheduled sessions for `trainer_id` inside `[start, end]`
    pub async fn plans_scheduled_between<'e, E>(
        executor: E,
        trainer_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT plan_id FROM sessions
            WHERE trainer_id = ? AND status = ? AND session_date BETWEEN ? AND ?
            ORDER BY plan_id
            "#,
        )
        .bind(trainer_id)
        .bind(SessionStatus::Scheduled)
        .bind(start)
        .bind(end)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
