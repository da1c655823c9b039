//! Attendance models and queries.
//!
//! Only the clock-in/clock-out inputs are persisted. The attendance status is
//! derived from them whenever a record is read.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

/// Derived attendance state for one staff member on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Absent,
    /// Clocked in, no clock-out yet
    PresentIncomplete,
    Present,
    HalfDay,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::PresentIncomplete => "present_incomplete",
            AttendanceStatus::Present => "present",
            AttendanceStatus::HalfDay => "half_day",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub created_at: String,
    pub updated_at: String,
}

/// Attendance record as returned by the API, with the derived fields
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceResponse {
    pub id: Option<String>,
    pub staff_id: String,
    pub date: NaiveDate,
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub worked_minutes: Option<i64>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClockRequest {
    pub staff_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Admin replacement of both punches; `null` clears a punch
#[derive(Debug, Clone, Deserialize)]
pub struct EditAttendanceRequest {
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceQuery {
    pub staff_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Attendance {
    pub async fn find<'e, E>(executor: E, id: &str) -> Result<Option<Attendance>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM attendance WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_for_day<'e, E>(
        executor: E,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Attendance>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM attendance WHERE staff_id = ? AND date = ?")
            .bind(staff_id)
            .bind(date)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, query: &AttendanceQuery) -> Result<Vec<Attendance>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM attendance
            WHERE (?1 IS NULL OR staff_id = ?1)
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date <= ?3)
            ORDER BY date DESC, staff_id ASC
            "#,
        )
        .bind(&query.staff_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(executor)
        .await
    }

    /// Create the day's record with a clock-in, or fill the clock-in of an
    /// existing record that has none. Returns false if already clocked in.
    pub async fn record_clock_in<'e, E>(
        executor: E,
        staff_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO attendance (id, staff_id, date, clock_in, clock_out, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)
            ON CONFLICT (staff_id, date) DO UPDATE SET
                clock_in = excluded.clock_in,
                updated_at = excluded.updated_at
            WHERE attendance.clock_in IS NULL
            "#,
        )
        .bind(&id)
        .bind(staff_id)
        .bind(date)
        .bind(time)
        .bind(&now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_times<'e, E>(
        executor: E,
        id: &str,
        clock_in: Option<NaiveTime>,
        clock_out: Option<NaiveTime>,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = chrono::Utc::now().to_rfc3339();
        let result =
            sqlx::query("UPDATE attendance SET clock_in = ?, clock_out = ?, updated_at = ? WHERE id = ?")
                .bind(clock_in)
                .bind(clock_out)
                .bind(&now)
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
