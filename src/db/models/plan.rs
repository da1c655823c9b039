//! Training plan models and queries.

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

/// Weekly cadence of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum PlanType {
    /// Monday, Wednesday and Friday
    #[serde(rename = "3_days")]
    #[sqlx(rename = "3_days")]
    ThreeDays,
    /// Monday through Friday
    #[serde(rename = "5_days")]
    #[sqlx(rename = "5_days")]
    FiveDays,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::ThreeDays => "3_days",
            PlanType::FiveDays => "5_days",
        }
    }

    /// Weekdays on which this cadence places a session
    pub fn weekdays(&self) -> &'static [Weekday] {
        match self {
            PlanType::ThreeDays => &[Weekday::Mon, Weekday::Wed, Weekday::Fri],
            PlanType::FiveDays => &[
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }

    pub fn includes(&self, weekday: Weekday) -> bool {
        self.weekdays().contains(&weekday)
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state of a plan, driven by its bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: String,
    pub client_id: String,
    pub trainer_id: String,
    pub plan_type: PlanType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanRequest {
    pub client_id: String,
    pub trainer_id: String,
    pub plan_type: PlanType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanRequest {
    pub client_id: Option<String>,
    pub trainer_id: Option<String>,
    pub plan_type: Option<PlanType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    pub amount: Option<f64>,
}

/// Query parameters for listing plans
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanQuery {
    pub client_id: Option<String>,
    pub trainer_id: Option<String>,
}

impl Plan {
    pub async fn find<'e, E>(executor: E, id: &str) -> Result<Option<Plan>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, query: &PlanQuery) -> Result<Vec<Plan>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM plans
            WHERE (?1 IS NULL OR client_id = ?1)
              AND (?2 IS NULL OR trainer_id = ?2)
            ORDER BY start_date DESC, created_at DESC
            "#,
        )
        .bind(&query.client_id)
        .bind(&query.trainer_id)
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, plan: &Plan) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO plans (
                id, client_id, trainer_id, plan_type, start_date, end_date,
                start_time, duration_minutes, amount, payment_status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.client_id)
        .bind(&plan.trainer_id)
        .bind(plan.plan_type)
        .bind(plan.start_date)
        .bind(plan.end_date)
        .bind(plan.start_time)
        .bind(plan.duration_minutes)
        .bind(plan.amount)
        .bind(plan.payment_status)
        .bind(&plan.created_at)
        .bind(&plan.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Overwrite every mutable column from `plan`
    pub async fn update<'e, E>(executor: E, plan: &Plan) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            UPDATE plans SET
                client_id = ?,
                trainer_id = ?,
                plan_type = ?,
                start_date = ?,
                end_date = ?,
                start_time = ?,
                duration_minutes = ?,
                amount = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&plan.client_id)
        .bind(&plan.trainer_id)
        .bind(plan.plan_type)
        .bind(plan.start_date)
        .bind(plan.end_date)
        .bind(plan.start_time)
        .bind(plan.duration_minutes)
        .bind(plan.amount)
        .bind(&plan.updated_at)
        .bind(&plan.id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Record the session time and length used by the latest generation
    pub async fn set_cadence<'e, E>(
        executor: E,
        id: &str,
        start_time: NaiveTime,
        duration_minutes: i64,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE plans SET start_time = ?, duration_minutes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(start_time)
        .bind(duration_minutes)
        .bind(&now)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_payment_status<'e, E>(
        executor: E,
        id: &str,
        status: PaymentStatus,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("UPDATE plans SET payment_status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(&now)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: &str) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_serde_names() {
        assert_eq!(serde_json::to_string(&PlanType::ThreeDays).unwrap(), "\"3_days\"");
        assert_eq!(
            serde_json::from_str::<PlanType>("\"5_days\"").unwrap(),
            PlanType::FiveDays
        );
        assert!(serde_json::from_str::<PlanType>("\"7_days\"").is_err());
    }

    #[test]
    fn test_plan_type_weekdays() {
        assert!(PlanType::ThreeDays.includes(Weekday::Wed));
        assert!(!PlanType::ThreeDays.includes(Weekday::Tue));
        assert!(PlanType::FiveDays.includes(Weekday::Thu));
        assert!(!PlanType::FiveDays.includes(Weekday::Sat));
        assert!(!PlanType::FiveDays.includes(Weekday::Sun));
    }

    #[test]
    fn test_payment_status_display() {
        assert_eq!(PaymentStatus::Pending.to_string(), "pending");
        assert_eq!(PaymentStatus::Paid.to_string(), "paid");
    }
}
