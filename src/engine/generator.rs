//! Session generation for a training plan.
//!
//! A run is split into a pure planning step (`plan_batch`) and a persistence
//! step that applies the batch inside one transaction while holding the
//! plan's lock. Either every insert/delete of a run commits or none does.

use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, info};

use super::{calendar::expand_dates, end_time_for, EngineError, LeaveCalendar, PlanLocks};
use crate::db::{begin_write, Plan, Session, SessionStatus};

/// Inputs of one generation call
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    /// Defaults to the plan's stored start time
    pub start_time: Option<NaiveTime>,
    /// Defaults to the plan's stored duration
    pub duration_minutes: Option<i64>,
    /// Drop still-scheduled sessions before inserting
    pub replace_existing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub created: Vec<NaiveDate>,
    pub deleted_count: u64,
    /// Dates excluded because the trainer is on approved leave
    pub skipped_unavailable: Vec<NaiveDate>,
    /// Dates that already had a session and were left alone
    pub skipped_existing: usize,
}

impl GenerationOutcome {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

/// What a run would do, before anything is written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub to_create: Vec<NaiveDate>,
    pub unavailable: Vec<NaiveDate>,
    pub already_present: usize,
}

/// Decide which expanded dates get a new session.
///
/// A date is skipped if the trainer is on approved leave, or if the plan
/// already holds a session on it (after any replace-mode deletion).
pub fn plan_batch(
    dates: &[NaiveDate],
    leave: &LeaveCalendar,
    occupied: &HashSet<NaiveDate>,
) -> BatchPlan {
    let mut batch = BatchPlan::default();
    for date in dates {
        if !leave.is_bookable(*date) {
            batch.unavailable.push(*date);
        } else if occupied.contains(date) {
            batch.already_present += 1;
        } else {
            batch.to_create.push(*date);
        }
    }
    batch
}

/// Generate (or regenerate) the sessions of `plan_id`.
pub async fn generate(
    db: &SqlitePool,
    locks: &PlanLocks,
    plan_id: &str,
    params: &GenerateParams,
) -> Result<GenerationOutcome, EngineError> {
    let guard = locks.acquire(plan_id).await;
    let result = generate_locked(db, plan_id, params).await;
    drop(guard);

    if matches!(result, Err(EngineError::PlanNotFound(_))) {
        locks.forget_if_idle(plan_id);
    }
    result
}

async fn generate_locked(
    db: &SqlitePool,
    plan_id: &str,
    params: &GenerateParams,
) -> Result<GenerationOutcome, EngineError> {
    let mut tx = begin_write(db).await?;

    let plan = Plan::find(&mut *tx, plan_id)
        .await?
        .ok_or_else(|| EngineError::PlanNotFound(plan_id.to_string()))?;

    let start_time = params.start_time.unwrap_or(plan.start_time);
    let duration_minutes = params.duration_minutes.unwrap_or(plan.duration_minutes);
    let end_time = end_time_for(start_time, duration_minutes)?;

    let dates = expand_dates(plan.start_date, plan.end_date, plan.plan_type)?;

    // One leave snapshot for the whole run
    let leave = LeaveCalendar::load(&mut *tx, &plan.trainer_id, plan.start_date, plan.end_date).await?;

    let deleted_count = if params.replace_existing {
        Session::delete_scheduled_for_plan(&mut *tx, plan_id).await?
    } else {
        0
    };

    let occupied = Session::dates_for_plan(&mut *tx, plan_id).await?;
    let batch = plan_batch(&dates, &leave, &occupied);

    let now = chrono::Utc::now().to_rfc3339();
    for date in &batch.to_create {
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan.id.clone(),
            client_id: plan.client_id.clone(),
            trainer_id: plan.trainer_id.clone(),
            session_date: *date,
            start_time,
            end_time,
            status: SessionStatus::Scheduled,
            notes: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        Session::insert(&mut *tx, &session).await?;
    }

    if start_time != plan.start_time || duration_minutes != plan.duration_minutes {
        Plan::set_cadence(&mut *tx, plan_id, start_time, duration_minutes).await?;
    }

    tx.commit().await?;

    if !batch.unavailable.is_empty() {
        debug!(
            plan_id = %plan_id,
            trainer_id = %plan.trainer_id,
            skipped = batch.unavailable.len(),
            "Skipped dates covered by approved leave"
        );
    }

    info!(
        plan_id = %plan_id,
        created = batch.to_create.len(),
        deleted = deleted_count,
        replace_existing = params.replace_existing,
        "Generated sessions"
    );

    Ok(GenerationOutcome {
        created: batch.to_create,
        deleted_count,
        skipped_unavailable: batch.unavailable,
        skipped_existing: batch.already_present,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_in_memory, LeaveRequest, LeaveStatus, PaymentStatus, PlanType};
    use std::sync::Arc;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        s.parse().unwrap()
    }

    async fn seed_plan(db: &SqlitePool, plan_type: PlanType, start: &str, end: &str) -> Plan {
        let now = chrono::Utc::now().to_rfc3339();
        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: "c1".to_string(),
            trainer_id: "t1".to_string(),
            plan_type,
            start_date: d(start),
            end_date: d(end),
            start_time: t("07:00:00"),
            duration_minutes: 60,
            amount: 100.0,
            payment_status: PaymentStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        };
        Plan::insert(db, &plan).await.unwrap();
        plan
    }

    async fn approve_leave(db: &SqlitePool, staff: &str, start: &str, end: &str) {
        let leave = LeaveRequest {
            id: uuid::Uuid::new_v4().to_string(),
            staff_id: staff.to_string(),
            leave_type: "annual".to_string(),
            start_date: d(start),
            end_date: d(end),
            status: LeaveStatus::Approved,
            reason: None,
            reviewed_by: Some("admin".to_string()),
            reviewed_at: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        LeaveRequest::insert(db, &leave).await.unwrap();
    }

    fn append() -> GenerateParams {
        GenerateParams::default()
    }

    fn replace() -> GenerateParams {
        GenerateParams {
            replace_existing: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_batch_partitions_dates() {
        let dates = vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03"), d("2024-01-04")];
        let leaves = vec![LeaveRequest {
            id: "l".to_string(),
            staff_id: "t1".to_string(),
            leave_type: "sick".to_string(),
            start_date: d("2024-01-03"),
            end_date: d("2024-01-03"),
            status: LeaveStatus::Approved,
            reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: String::new(),
        }];
        let leave = LeaveCalendar::from_leaves(&leaves);
        let occupied: HashSet<_> = [d("2024-01-01")].into_iter().collect();

        let batch = plan_batch(&dates, &leave, &occupied);
        assert_eq!(batch.to_create, vec![d("2024-01-02"), d("2024-01-04")]);
        assert_eq!(batch.unavailable, vec![d("2024-01-03")]);
        assert_eq!(batch.already_present, 1);
    }

    #[tokio::test]
    async fn test_generates_weekdays_with_times() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-07").await;

        let outcome = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        assert_eq!(outcome.created_count(), 5);

        let sessions = Session::list_for_plan(&db, &plan.id).await.unwrap();
        let dates: Vec<_> = sessions.iter().map(|s| s.session_date).collect();
        assert_eq!(
            dates,
            vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03"), d("2024-01-04"), d("2024-01-05")]
        );
        for s in &sessions {
            assert_eq!(s.start_time, t("07:00:00"));
            assert_eq!(s.end_time, t("08:00:00"));
            assert_eq!(s.status, SessionStatus::Scheduled);
            assert_eq!(s.trainer_id, "t1");
            assert_eq!(s.client_id, "c1");
        }
    }

    #[tokio::test]
    async fn test_approved_leave_excludes_date() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-07").await;
        approve_leave(&db, "t1", "2024-01-03", "2024-01-03").await;

        let outcome = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        assert_eq!(
            outcome.created,
            vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-04"), d("2024-01-05")]
        );
        assert_eq!(outcome.skipped_unavailable, vec![d("2024-01-03")]);
    }

    #[tokio::test]
    async fn test_leave_covering_whole_plan_creates_nothing() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::ThreeDays, "2024-01-01", "2024-01-31").await;
        approve_leave(&db, "t1", "2023-12-25", "2024-02-05").await;

        let outcome = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        assert_eq!(outcome.created_count(), 0);
        assert_eq!(Session::count_for_plan(&db, &plan.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_trainers_leave_is_ignored() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::ThreeDays, "2024-01-01", "2024-01-07").await;
        approve_leave(&db, "t2", "2024-01-01", "2024-01-07").await;

        let outcome = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        assert_eq!(outcome.created_count(), 3);
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::ThreeDays, "2024-01-01", "2024-01-14").await;

        let first = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        let second = generate(&db, &locks, &plan.id, &append()).await.unwrap();

        assert_eq!(first.created_count(), 6);
        assert_eq!(second.created_count(), 0);
        assert_eq!(second.skipped_existing, 6);
        assert_eq!(Session::count_for_plan(&db, &plan.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_append_fills_gaps_only() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-05").await;
        generate(&db, &locks, &plan.id, &append()).await.unwrap();

        let sessions = Session::list_for_plan(&db, &plan.id).await.unwrap();
        Session::delete(&db, &sessions[2].id).await.unwrap();

        let outcome = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        assert_eq!(outcome.created, vec![d("2024-01-03")]);
        // Untouched sessions keep their ids
        let after = Session::list_for_plan(&db, &plan.id).await.unwrap();
        assert_eq!(after[0].id, sessions[0].id);
    }

    #[tokio::test]
    async fn test_replace_keeps_history() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-05").await;
        generate(&db, &locks, &plan.id, &append()).await.unwrap();

        let mut sessions = Session::list_for_plan(&db, &plan.id).await.unwrap();
        sessions[0].status = SessionStatus::Completed;
        sessions[1].status = SessionStatus::Cancelled;
        sessions[2].status = SessionStatus::Missed;
        for s in &sessions[..3] {
            Session::update(&db, s).await.unwrap();
        }

        let outcome = generate(&db, &locks, &plan.id, &replace()).await.unwrap();
        assert_eq!(outcome.deleted_count, 2);
        assert_eq!(outcome.created, vec![d("2024-01-04"), d("2024-01-05")]);
        assert_eq!(outcome.skipped_existing, 3);

        let after = Session::list_for_plan(&db, &plan.id).await.unwrap();
        assert_eq!(after.len(), 5);
        for kept in &sessions[..3] {
            let found = after.iter().find(|s| s.id == kept.id).unwrap();
            assert_eq!(found.status, kept.status);
        }
    }

    #[tokio::test]
    async fn test_replace_after_leave_approval_removes_conflicts() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-07").await;
        generate(&db, &locks, &plan.id, &append()).await.unwrap();

        approve_leave(&db, "t1", "2024-01-04", "2024-01-05").await;

        // Append leaves the now-conflicting sessions in place
        let appended = generate(&db, &locks, &plan.id, &append()).await.unwrap();
        assert_eq!(appended.created_count(), 0);
        assert_eq!(Session::count_for_plan(&db, &plan.id).await.unwrap(), 5);

        let replaced = generate(&db, &locks, &plan.id, &replace()).await.unwrap();
        assert_eq!(replaced.deleted_count, 5);
        assert_eq!(replaced.created_count(), 3);
        let dates: Vec<_> = Session::list_for_plan(&db, &plan.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_date)
            .collect();
        assert_eq!(dates, vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03")]);
    }

    #[tokio::test]
    async fn test_overrides_time_and_records_cadence() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::ThreeDays, "2024-01-01", "2024-01-07").await;

        let params = GenerateParams {
            start_time: Some(t("18:30:00")),
            duration_minutes: Some(45),
            replace_existing: false,
        };
        generate(&db, &locks, &plan.id, &params).await.unwrap();

        let sessions = Session::list_for_plan(&db, &plan.id).await.unwrap();
        assert!(sessions.iter().all(|s| s.end_time == t("19:15:00")));

        let stored = Plan::find(&db, &plan.id).await.unwrap().unwrap();
        assert_eq!(stored.start_time, t("18:30:00"));
        assert_eq!(stored.duration_minutes, 45);
    }

    #[tokio::test]
    async fn test_invalid_duration_writes_nothing() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-05").await;
        generate(&db, &locks, &plan.id, &append()).await.unwrap();

        let params = GenerateParams {
            start_time: Some(t("23:30:00")),
            duration_minutes: Some(60),
            replace_existing: true,
        };
        let err = generate(&db, &locks, &plan.id, &params).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
        // The replace never ran
        assert_eq!(Session::count_for_plan(&db, &plan.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_missing_plan() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let err = generate(&db, &locks, "nope", &append()).await.unwrap_err();
        assert!(matches!(err, EngineError::PlanNotFound(id) if id == "nope"));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_huge_duration_override_is_rejected() {
        let db = init_in_memory().await.unwrap();
        let locks = PlanLocks::new();
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-05").await;

        let params = GenerateParams {
            duration_minutes: Some(i64::MAX),
            ..Default::default()
        };
        let err = generate(&db, &locks, &plan.id, &params).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { field: "duration_minutes", .. }));
        assert_eq!(Session::count_for_plan(&db, &plan.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_duplicate() {
        let db = init_in_memory().await.unwrap();
        let locks = Arc::new(PlanLocks::new());
        let plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-31").await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let db = db.clone();
            let locks = locks.clone();
            let plan_id = plan.id.clone();
            handles.push(tokio::spawn(async move {
                let params = GenerateParams {
                    replace_existing: i % 2 == 0,
                    ..Default::default()
                };
                generate(&db, &locks, &plan_id, &params).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // January 2024 has 23 weekdays
        assert_eq!(Session::count_for_plan(&db, &plan.id).await.unwrap(), 23);
    }

    #[tokio::test]
    async fn test_parallel_generation_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::init(dir.path()).await.unwrap();
        let locks = Arc::new(PlanLocks::new());

        let mut plan_ids = Vec::new();
        for i in 0..12 {
            let mut plan = seed_plan(&db, PlanType::FiveDays, "2024-01-01", "2024-01-31").await;
            plan.trainer_id = format!("trainer-{}", i);
            Plan::update(&db, &plan).await.unwrap();
            approve_leave(&db, &plan.trainer_id, "2024-01-15", "2024-01-19").await;
            plan_ids.push(plan.id);
        }

        // Every round mixes replace and append runs across distinct plans
        for round in 0..4 {
            let mut handles = Vec::new();
            for plan_id in &plan_ids {
                let db = db.clone();
                let locks = locks.clone();
                let plan_id = plan_id.clone();
                handles.push(tokio::spawn(async move {
                    let params = GenerateParams {
                        replace_existing: round % 2 == 1,
                        ..Default::default()
                    };
                    generate(&db, &locks, &plan_id, &params).await
                }));
            }
            for h in handles {
                assert!(h.await.unwrap().is_ok());
            }
        }

        // 23 weekdays in January 2024, minus the leave week
        for plan_id in &plan_ids {
            assert_eq!(Session::count_for_plan(&db, plan_id).await.unwrap(), 18);
        }
    }
}
