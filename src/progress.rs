//! Progress and streak tracking
//!
//! A streak counts consecutive calendar days, in the learner's calendar, with
//! at least one completed session.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::EngineResult;
use crate::identity::LearnerClock;
use crate::storage::{ProgressDelta, ProgressSnapshot, WordStore};

/// Streak after a completion at `completed_at`.
///
/// Same day holds, the day after increments, anything else restarts at 1.
pub fn next_streak(
    current_streak: i64,
    last_reviewed_at: Option<DateTime<Utc>>,
    completed_at: DateTime<Utc>,
    clock: &LearnerClock,
) -> i64 {
    let Some(last) = last_reviewed_at else {
        return 1;
    };

    let last_day = clock.local_date(last);
    let today = clock.local_date(completed_at);

    if last_day == today {
        current_streak.max(1)
    } else if today.pred_opt() == Some(last_day) {
        current_streak + 1
    } else {
        1
    }
}

/// Fold one finished session into the learner's snapshot for the list
pub fn record_session_completion<S: WordStore + ?Sized>(
    store: &S,
    clock: &LearnerClock,
    learner_id: &str,
    list_id: i64,
    items_total: usize,
    items_correct: usize,
    completed_at: DateTime<Utc>,
) -> EngineResult<ProgressSnapshot> {
    let snapshot = store.apply_progress_delta(learner_id, list_id, &|current| ProgressDelta {
        mastered_add: items_correct as i64,
        seen_add: items_total as i64,
        streak_days: next_streak(current.streak_days, current.last_reviewed_at, completed_at, clock),
        last_reviewed_at: completed_at,
    })?;

    info!(
        "Progress for list {}: {} mastered, {} seen, streak {}",
        list_id, snapshot.mastered_count, snapshot.total_seen, snapshot.streak_days
    );
    Ok(snapshot)
}

/// Experience points shown on the dashboard
pub fn xp(snapshot: Option<&ProgressSnapshot>, xp_per_correct: i64) -> i64 {
    snapshot.map(|s| s.mastered_count).unwrap_or(0) * xp_per_correct
}
