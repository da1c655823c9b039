//! Trainer availability from approved leave.

use chrono::NaiveDate;
use sqlx::Sqlite;

use crate::db::{LeaveRequest, LeaveStatus};

/// Snapshot of one trainer's approved leave, read once per generation run so
/// every candidate date is judged against the same data.
#[derive(Debug, Clone, Default)]
pub struct LeaveCalendar {
    /// Inclusive `(start, end)` ranges
    blocked: Vec<(NaiveDate, NaiveDate)>,
}

impl LeaveCalendar {
    /// Build from any leave records, keeping only the approved ones
    pub fn from_leaves<'a>(leaves: impl IntoIterator<Item = &'a LeaveRequest>) -> Self {
        let blocked = leaves
            .into_iter()
            .filter(|l| l.status == LeaveStatus::Approved)
            .map(|l| (l.start_date, l.end_date))
            .collect();
        Self { blocked }
    }

    /// Load the trainer's approved leave overlapping `[start, end]`
    pub async fn load<'e, E>(
        executor: E,
        trainer_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let leaves = LeaveRequest::approved_overlapping(executor, trainer_id, start, end).await?;
        Ok(Self::from_leaves(&leaves))
    }

    pub fn is_bookable(&self, date: NaiveDate) -> bool {
        !self
            .blocked
            .iter()
            .any(|(start, end)| *start <= date && date <= *end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn leave(staff: &str, start: &str, end: &str, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: uuid::Uuid::new_v4().to_string(),
            staff_id: staff.to_string(),
            leave_type: "annual".to_string(),
            start_date: d(start),
            end_date: d(end),
            status,
            reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_only_approved_leave_blocks() {
        let leaves = vec![
            leave("t1", "2024-01-02", "2024-01-02", LeaveStatus::Pending),
            leave("t1", "2024-01-03", "2024-01-03", LeaveStatus::Approved),
            leave("t1", "2024-01-04", "2024-01-04", LeaveStatus::Rejected),
        ];
        let calendar = LeaveCalendar::from_leaves(&leaves);

        assert!(calendar.is_bookable(d("2024-01-02")));
        assert!(!calendar.is_bookable(d("2024-01-03")));
        assert!(calendar.is_bookable(d("2024-01-04")));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let leaves = vec![leave("t1", "2024-01-10", "2024-01-12", LeaveStatus::Approved)];
        let calendar = LeaveCalendar::from_leaves(&leaves);

        assert!(calendar.is_bookable(d("2024-01-09")));
        assert!(!calendar.is_bookable(d("2024-01-10")));
        assert!(!calendar.is_bookable(d("2024-01-12")));
        assert!(calendar.is_bookable(d("2024-01-13")));
    }

    #[test]
    fn test_empty_calendar_books_everything() {
        let calendar = LeaveCalendar::default();
        assert!(calendar.is_bookable(d("2024-01-01")));
    }

    #[tokio::test]
    async fn test_load_filters_trainer_status_and_range() {
        let db = init_in_memory().await.unwrap();
        for l in [
            leave("t1", "2024-01-03", "2024-01-03", LeaveStatus::Approved),
            leave("t1", "2024-01-04", "2024-01-04", LeaveStatus::Pending),
            leave("t2", "2024-01-05", "2024-01-05", LeaveStatus::Approved),
            leave("t1", "2023-12-20", "2024-01-01", LeaveStatus::Approved),
            leave("t1", "2024-03-01", "2024-03-05", LeaveStatus::Approved),
        ] {
            LeaveRequest::insert(&db, &l).await.unwrap();
        }

        let calendar = LeaveCalendar::load(&db, "t1", d("2024-01-01"), d("2024-01-07"))
            .await
            .unwrap();

        assert!(!calendar.is_bookable(d("2024-01-01")));
        assert!(calendar.is_bookable(d("2024-01-02")));
        assert!(!calendar.is_bookable(d("2024-01-03")));
        assert!(calendar.is_bookable(d("2024-01-04")));
        assert!(calendar.is_bookable(d("2024-01-05")));
        // Out-of-window leave was not loaded
        assert!(calendar.is_bookable(d("2024-03-02")));
    }
}
