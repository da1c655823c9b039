//! Calendar expansion: (date range, cadence) -> session dates.

use chrono::{Datelike, NaiveDate};

use super::{check_range, EngineError};
use crate::db::PlanType;

/// Every date in `[start, end]` whose weekday belongs to `plan_type`, ascending.
///
/// Boundary weeks are clipped to the range, so a plan starting on a Thursday
/// only gets Thursday and Friday of its first week.
pub fn expand_dates(
    start: NaiveDate,
    end: NaiveDate,
    plan_type: PlanType,
) -> Result<Vec<NaiveDate>, EngineError> {
    check_range(start, end)?;

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| plan_type.includes(d.weekday()))
        .collect())
}

/// Inclusive number of days in `[start, end]`
pub fn span_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}
