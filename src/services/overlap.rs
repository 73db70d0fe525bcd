// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time-overlap policy for activity records.
//!
//! A candidate activity is checked in a fixed order and the first failing
//! check wins:
//! 1. Future-time guard (2 minute tolerance)
//! 2. Point-event duplicates within ±60 seconds
//! 3. Feeding mutual exclusion (overridable)
//! 4. Same-type duration overlap
//! 5. Sleep versus awake-only activities (overridable)
//!
//! `DUPLICATE_ACTIVITY` and `FUTURE_TIME` always block; `OVERLAP_ACTIVITY`
//! can be forced through by the caller.

use crate::db::{ActivityFilter, ActivityQuery, TimeWindow};
use crate::error::AppError;
use crate::models::{effective_end, Activity, ActivityType, ConflictCategory};
use crate::time_utils::{format_utc_rfc3339, saturating_add, saturating_sub};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Allowed clock skew for timestamps slightly in the future.
pub const FUTURE_TOLERANCE_MINUTES: i64 = 2;
/// Half-width of the window in which two point events of one type are duplicates.
pub const POINT_EVENT_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ConflictCode {
    FutureTime,
    DuplicateActivity,
    OverlapActivity,
}

impl fmt::Display for ConflictCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictCode::FutureTime => "FUTURE_TIME",
            ConflictCode::DuplicateActivity => "DUPLICATE_ACTIVITY",
            ConflictCode::OverlapActivity => "OVERLAP_ACTIVITY",
        })
    }
}

/// Why a candidate activity may not be stored as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResult {
    pub code: ConflictCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_activity: Option<Activity>,
}

impl ConflictResult {
    fn new(code: ConflictCode, message: String, conflicting: Option<Activity>) -> Self {
        Self {
            code,
            message,
            conflicting_activity: conflicting,
        }
    }

    /// Only cross-type overlaps may be forced through.
    pub fn is_overridable(&self) -> bool {
        self.code == ConflictCode::OverlapActivity
    }

    /// Whether a caller passing `force` may persist despite this conflict.
    pub fn permits(&self, force: bool) -> bool {
        force && self.is_overridable()
    }
}

/// Activity about to be created or edited.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub baby_id: String,
    pub activity_type: ActivityType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// ID of the record being edited, so it never conflicts with itself.
    pub exclude_id: Option<String>,
}

impl Candidate {
    fn effective_end(&self) -> DateTime<Utc> {
        effective_end(self.activity_type, self.start_time, self.end_time)
    }

    fn filter(&self) -> ActivityFilter {
        ActivityFilter::for_baby(self.baby_id.clone()).excluding(self.exclude_id.as_deref())
    }

    fn overlap_window(&self) -> TimeWindow {
        TimeWindow::Overlaps {
            start: self.start_time,
            end: self.effective_end(),
        }
    }
}

/// Stateless conflict policy over an [`ActivityQuery`] source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapPolicy;

impl OverlapPolicy {
    /// Check a candidate against the current wall clock.
    pub async fn check<Q: ActivityQuery>(
        &self,
        store: &Q,
        candidate: &Candidate,
    ) -> Result<Option<ConflictResult>, AppError> {
        self.check_at(store, candidate, Utc::now()).await
    }

    /// Check a candidate with an explicit notion of "now".
    pub async fn check_at<Q: ActivityQuery>(
        &self,
        store: &Q,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> Result<Option<ConflictResult>, AppError> {
        if let Some(conflict) = check_future_time(candidate, now) {
            return Ok(Some(conflict));
        }

        let activity_type = candidate.activity_type;

        if activity_type.is_point_event() {
            let window = Duration::seconds(POINT_EVENT_WINDOW_SECS);
            let filter = candidate
                .filter()
                .with_types([activity_type])
                .with_window(TimeWindow::StartsBetween {
                    from: saturating_sub(candidate.start_time, window),
                    to: saturating_add(candidate.start_time, window),
                });
            if let Some(existing) = first_match(store, filter).await? {
                let message = format!(
                    "A {} was already recorded at {}",
                    existing.activity_type,
                    format_utc_rfc3339(existing.start_time)
                );
                return Ok(Some(report(
                    candidate,
                    ConflictCode::DuplicateActivity,
                    message,
                    existing,
                )));
            }
        }

        if activity_type.is_feeding() {
            let filter = candidate
                .filter()
                .with_types(ActivityType::members_of(ConflictCategory::FeedingConflict))
                .with_window(candidate.overlap_window());
            if let Some(existing) = first_match(store, filter).await? {
                let message = format!(
                    "This feeding overlaps a {} starting at {}",
                    existing.activity_type,
                    format_utc_rfc3339(existing.start_time)
                );
                return Ok(Some(report(
                    candidate,
                    ConflictCode::OverlapActivity,
                    message,
                    existing,
                )));
            }
        }

        if activity_type.is_same_type_duration() {
            let filter = candidate
                .filter()
                .with_types([activity_type])
                .with_window(candidate.overlap_window());
            if let Some(existing) = first_match(store, filter).await? {
                let message = format!(
                    "Another {} already covers this time (started {})",
                    existing.activity_type,
                    format_utc_rfc3339(existing.start_time)
                );
                return Ok(Some(report(
                    candidate,
                    ConflictCode::DuplicateActivity,
                    message,
                    existing,
                )));
            }
        }

        let opposing = if activity_type == ActivityType::Sleep {
            ActivityType::members_of(ConflictCategory::SleepConflict)
        } else if activity_type.is_sleep_conflict() {
            vec![ActivityType::Sleep]
        } else {
            Vec::new()
        };

        if !opposing.is_empty() {
            let filter = candidate
                .filter()
                .with_types(opposing)
                .with_window(candidate.overlap_window());
            if let Some(existing) = first_match(store, filter).await? {
                let message = if activity_type == ActivityType::Sleep {
                    format!(
                        "Sleep overlaps a {} at {}",
                        existing.activity_type,
                        format_utc_rfc3339(existing.start_time)
                    )
                } else {
                    format!(
                        "{} overlaps a sleep starting at {}",
                        activity_type,
                        format_utc_rfc3339(existing.start_time)
                    )
                };
                return Ok(Some(report(
                    candidate,
                    ConflictCode::OverlapActivity,
                    message,
                    existing,
                )));
            }
        }

        Ok(None)
    }
}

fn check_future_time(candidate: &Candidate, now: DateTime<Utc>) -> Option<ConflictResult> {
    let limit = saturating_add(now, Duration::minutes(FUTURE_TOLERANCE_MINUTES));

    let message = if candidate.start_time > limit {
        "Start time cannot be in the future"
    } else if candidate.end_time.is_some_and(|end| end > limit) {
        "End time cannot be in the future"
    } else {
        return None;
    };

    tracing::debug!(
        baby_id = %candidate.baby_id,
        activity_type = %candidate.activity_type,
        start_time = %candidate.start_time,
        end_time = ?candidate.end_time,
        "Rejected activity in the future"
    );
    Some(ConflictResult::new(
        ConflictCode::FutureTime,
        message.to_string(),
        None,
    ))
}

async fn first_match<Q: ActivityQuery>(
    store: &Q,
    filter: ActivityFilter,
) -> Result<Option<Activity>, AppError> {
    let filter = filter.with_limit(1);
    Ok(store.query_activities(&filter).await?.into_iter().next())
}

fn report(
    candidate: &Candidate,
    code: ConflictCode,
    message: String,
    existing: Activity,
) -> ConflictResult {
    tracing::debug!(
        baby_id = %candidate.baby_id,
        activity_type = %candidate.activity_type,
        code = %code,
        conflicting_id = %existing.id,
        "Activity conflict detected"
    );
    ConflictResult::new(code, message, Some(existing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_103_200, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        base() + Duration::minutes(minutes)
    }

    fn now() -> DateTime<Utc> {
        at(24 * 60)
    }

    fn stored(
        db: &MemoryDb,
        id: &str,
        activity_type: ActivityType,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) {
        db.set_activity(&Activity {
            id: id.to_string(),
            baby_id: "baby".to_string(),
            activity_type,
            start_time: start,
            end_time: end,
            amount_ml: None,
            notes: None,
            created_at: start,
            updated_at: start,
        });
    }

    fn candidate(
        activity_type: ActivityType,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Candidate {
        Candidate {
            baby_id: "baby".to_string(),
            activity_type,
            start_time: start,
            end_time: end,
            exclude_id: None,
        }
    }

    async fn check(db: &MemoryDb, c: &Candidate) -> Option<ConflictResult> {
        OverlapPolicy.check_at(db, c, now()).await.unwrap()
    }

    #[tokio::test]
    async fn test_future_start_is_rejected() {
        let db = MemoryDb::new();
        let c = candidate(ActivityType::Sleep, now() + Duration::minutes(3), None);

        let conflict = check(&db, &c).await.unwrap();
        assert_eq!(conflict.code, ConflictCode::FutureTime);
        assert!(!conflict.permits(true));
        assert!(conflict.conflicting_activity.is_none());
    }

    #[tokio::test]
    async fn test_future_tolerance_and_end_time() {
        let db = MemoryDb::new();

        let within = candidate(ActivityType::Diaper, now() + Duration::seconds(119), None);
        assert!(check(&db, &within).await.is_none());

        let future_end = candidate(
            ActivityType::Bath,
            now() - Duration::minutes(10),
            Some(now() + Duration::minutes(5)),
        );
        assert_eq!(
            check(&db, &future_end).await.unwrap().code,
            ConflictCode::FutureTime
        );
    }

    #[tokio::test]
    async fn test_point_event_duplicates_within_a_minute() {
        for t in ActivityType::members_of(ConflictCategory::PointEvent) {
            let db = MemoryDb::new();
            stored(&db, "existing", t, at(60), Some(at(60)));

            let near = candidate(t, at(60) + Duration::seconds(60), None);
            let conflict = check(&db, &near).await.unwrap();
            assert_eq!(conflict.code, ConflictCode::DuplicateActivity, "{t}");
            assert!(!conflict.permits(true));
            assert_eq!(conflict.conflicting_activity.unwrap().id, "existing");

            let far = candidate(t, at(60) + Duration::seconds(61), None);
            assert!(check(&db, &far).await.is_none(), "{t}");
        }
    }

    #[tokio::test]
    async fn test_feeding_overlap_is_overridable() {
        let db = MemoryDb::new();
        stored(&db, "bf", ActivityType::Breastfeed, at(0), Some(at(20)));

        let bottle = candidate(ActivityType::Bottle, at(10), Some(at(25)));
        let conflict = check(&db, &bottle).await.unwrap();

        assert_eq!(conflict.code, ConflictCode::OverlapActivity);
        assert!(conflict.permits(true));
        assert!(!conflict.permits(false));
    }

    #[tokio::test]
    async fn test_unfinished_feeding_uses_thirty_minute_window() {
        let db = MemoryDb::new();
        stored(&db, "bottle", ActivityType::Bottle, at(0), None);

        let inside = candidate(ActivityType::Breastfeed, at(29), Some(at(40)));
        assert!(check(&db, &inside).await.is_some());

        let after = candidate(ActivityType::Breastfeed, at(30), Some(at(40)));
        assert!(check(&db, &after).await.is_none());

        // The candidate itself has no end: it occupies [-20, 10).
        let before = candidate(ActivityType::Breastfeed, at(-20), None);
        assert!(check(&db, &before).await.is_some());
    }

    #[tokio::test]
    async fn test_same_type_sleep_overlap_is_not_overridable() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));

        let c = candidate(ActivityType::Sleep, at(630), Some(at(645)));
        let conflict = check(&db, &c).await.unwrap();

        assert_eq!(conflict.code, ConflictCode::DuplicateActivity);
        assert!(!conflict.permits(true));
    }

    #[tokio::test]
    async fn test_in_progress_sleep_occupies_four_hours() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(0), None);

        let inside = candidate(ActivityType::Sleep, at(239), Some(at(250)));
        assert_eq!(
            check(&db, &inside).await.unwrap().code,
            ConflictCode::DuplicateActivity
        );

        let after = candidate(ActivityType::Sleep, at(240), Some(at(250)));
        assert!(check(&db, &after).await.is_none());
    }

    #[tokio::test]
    async fn test_sleep_conflicts_both_directions() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));

        let head_lift = candidate(ActivityType::HeadLift, at(630), Some(at(635)));
        let conflict = check(&db, &head_lift).await.unwrap();
        assert_eq!(conflict.code, ConflictCode::OverlapActivity);
        assert!(conflict.permits(true));

        let db = MemoryDb::new();
        stored(&db, "bath", ActivityType::Bath, at(600), Some(at(620)));
        let sleep = candidate(ActivityType::Sleep, at(590), Some(at(700)));
        let conflict = check(&db, &sleep).await.unwrap();
        assert_eq!(conflict.code, ConflictCode::OverlapActivity);
        assert_eq!(conflict.conflicting_activity.unwrap().id, "bath");
    }

    #[tokio::test]
    async fn test_point_event_inside_sleep() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));

        let roll_over = candidate(ActivityType::RollOver, at(620), Some(at(620)));
        assert_eq!(
            check(&db, &roll_over).await.unwrap().code,
            ConflictCode::OverlapActivity
        );

        // Diaper changes are allowed while asleep.
        let diaper = candidate(ActivityType::Diaper, at(620), Some(at(620)));
        assert!(check(&db, &diaper).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_check_runs_before_overlap_checks() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));
        stored(&db, "roll", ActivityType::RollOver, at(620), Some(at(620)));

        let c = candidate(ActivityType::RollOver, at(620) + Duration::seconds(30), None);
        let conflict = check(&db, &c).await.unwrap();
        assert_eq!(conflict.code, ConflictCode::DuplicateActivity);
        assert_eq!(conflict.conflicting_activity.unwrap().id, "roll");
    }

    #[tokio::test]
    async fn test_edit_never_conflicts_with_itself() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));

        let mut c = candidate(ActivityType::Sleep, at(610), Some(at(670)));
        c.exclude_id = Some("sleep".to_string());
        assert!(check(&db, &c).await.is_none());
    }

    #[tokio::test]
    async fn test_other_babies_are_ignored() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));

        let mut c = candidate(ActivityType::Sleep, at(610), Some(at(620)));
        c.baby_id = "twin".to_string();
        assert!(check(&db, &c).await.is_none());
    }

    #[tokio::test]
    async fn test_earliest_match_is_reported() {
        let db = MemoryDb::new();
        stored(&db, "late", ActivityType::Outdoor, at(100), Some(at(200)));
        stored(&db, "early", ActivityType::Outdoor, at(50), Some(at(150)));

        let c = candidate(ActivityType::Outdoor, at(120), Some(at(130)));
        let conflict = check(&db, &c).await.unwrap();
        assert_eq!(conflict.conflicting_activity.unwrap().id, "early");
    }

    #[tokio::test]
    async fn test_worked_example() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), Some(at(660)));

        let sleep = candidate(ActivityType::Sleep, at(630), Some(at(645)));
        assert_eq!(
            check(&db, &sleep).await.unwrap().code,
            ConflictCode::DuplicateActivity
        );

        let head_lift = candidate(ActivityType::HeadLift, at(630), Some(at(635)));
        assert_eq!(
            check(&db, &head_lift).await.unwrap().code,
            ConflictCode::OverlapActivity
        );

        let bottle = candidate(ActivityType::Bottle, at(720), Some(at(735)));
        assert!(check(&db, &bottle).await.is_none());
    }

    #[tokio::test]
    async fn test_extreme_timestamps_do_not_overflow() {
        let db = MemoryDb::new();
        stored(&db, "sleep", ActivityType::Sleep, at(600), None);

        let earliest = candidate(ActivityType::Diaper, DateTime::<Utc>::MIN_UTC, None);
        assert!(check(&db, &earliest).await.is_none());

        let earliest_sleep = candidate(ActivityType::Sleep, DateTime::<Utc>::MIN_UTC, None);
        assert!(check(&db, &earliest_sleep).await.is_none());

        let latest = candidate(ActivityType::Diaper, DateTime::<Utc>::MAX_UTC, None);
        let conflict = OverlapPolicy
            .check_at(&db, &latest, DateTime::<Utc>::MAX_UTC)
            .await
            .unwrap();
        assert!(conflict.is_none());
    }
}
