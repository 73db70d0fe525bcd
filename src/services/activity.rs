// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity recording service.
//!
//! Wraps the store with the create/edit workflow:
//! 1. Validate the request
//! 2. Truncate times to stored precision and normalize point events
//!    (`end_time = start_time`)
//! 3. Run the overlap policy and apply `force` semantics
//! 4. Persist

use crate::db::{ActivityFilter, ActivityQuery, ActivityStore, TimeWindow};
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityType};
use crate::services::overlap::{
    Candidate, ConflictResult, OverlapPolicy, FUTURE_TOLERANCE_MINUTES,
};
use crate::time_utils::{
    saturating_add, saturating_sub, truncate_to_millis, validate_supported,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use validator::Validate;

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 500;
/// How far back listings and in-progress lookups reach by default.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Body of `POST /api/activities`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[validate(length(min = 1, max = 64))]
    pub baby_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[validate(custom(function = "validate_supported"))]
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    #[validate(custom(function = "validate_supported"))]
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(max = 2000))]
    pub amount_ml: Option<u32>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    /// Persist despite an overridable overlap.
    #[serde(default)]
    pub force: bool,
}

/// Body of `PATCH /api/activities/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    #[serde(default, rename = "type")]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    #[validate(custom(function = "validate_supported"))]
    pub start_time: Option<DateTime<Utc>>,
    /// `null` clears the end time (marks the activity as in progress).
    #[serde(default, deserialize_with = "crate::time_utils::double_option")]
    #[validate(custom(function = "validate_supported"))]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "crate::time_utils::double_option")]
    #[validate(range(max = 2000))]
    pub amount_ml: Option<Option<u32>>,
    #[serde(default, deserialize_with = "crate::time_utils::double_option")]
    #[validate(length(max = 500))]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub force: bool,
}

/// Query of the per-baby listing.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListActivitiesQuery {
    #[validate(custom(function = "validate_supported"))]
    pub from: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_supported"))]
    pub to: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub limit: Option<usize>,
}

/// Create, edit, read and delete activities under the overlap policy.
#[derive(Clone)]
pub struct ActivityService {
    store: ActivityStore,
    policy: OverlapPolicy,
}

impl ActivityService {
    pub fn new(store: ActivityStore) -> Self {
        Self {
            store,
            policy: OverlapPolicy,
        }
    }

    pub fn store(&self) -> &ActivityStore {
        &self.store
    }

    /// Record a new activity.
    pub async fn create(&self, req: CreateActivityRequest) -> Result<Activity> {
        req.validate()?;

        let start_time = truncate_to_millis(req.start_time);
        let end_time = normalize_end(
            req.activity_type,
            start_time,
            req.end_time.map(truncate_to_millis),
        )?;

        let candidate = Candidate {
            baby_id: req.baby_id.clone(),
            activity_type: req.activity_type,
            start_time,
            end_time,
            exclude_id: None,
        };
        let conflict = self.policy.check(&self.store, &candidate).await?;
        enforce(conflict, req.force, &candidate)?;

        let now = Utc::now();
        let activity = Activity {
            id: uuid::Uuid::new_v4().to_string(),
            baby_id: req.baby_id,
            activity_type: req.activity_type,
            start_time,
            end_time,
            amount_ml: req.amount_ml,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_activity(&activity).await?;

        tracing::info!(
            activity_id = %activity.id,
            baby_id = %activity.baby_id,
            activity_type = %activity.activity_type,
            "Activity recorded"
        );

        Ok(activity)
    }

    /// Apply a partial edit. The policy only re-runs when the type or times change.
    pub async fn update(&self, id: &str, req: UpdateActivityRequest) -> Result<Activity> {
        req.validate()?;

        let existing = self.get(id).await?;
        let mut updated = existing.clone();

        if let Some(activity_type) = req.activity_type {
            updated.activity_type = activity_type;
        }
        if let Some(start_time) = req.start_time {
            updated.start_time = truncate_to_millis(start_time);
        }
        if let Some(end_time) = req.end_time {
            updated.end_time = end_time.map(truncate_to_millis);
        }
        if let Some(amount_ml) = req.amount_ml {
            updated.amount_ml = amount_ml;
        }
        if let Some(notes) = req.notes {
            updated.notes = notes;
        }

        updated.end_time = normalize_end(
            updated.activity_type,
            updated.start_time,
            updated.end_time,
        )?;

        let timing_changed = updated.activity_type != existing.activity_type
            || updated.start_time != existing.start_time
            || updated.end_time != existing.end_time;

        if timing_changed {
            let candidate = Candidate {
                baby_id: updated.baby_id.clone(),
                activity_type: updated.activity_type,
                start_time: updated.start_time,
                end_time: updated.end_time,
                exclude_id: Some(updated.id.clone()),
            };
            let conflict = self.policy.check(&self.store, &candidate).await?;
            enforce(conflict, req.force, &candidate)?;
        }

        updated.updated_at = Utc::now();
        self.store.update_activity(&updated).await?;

        tracing::info!(
            activity_id = %updated.id,
            baby_id = %updated.baby_id,
            timing_changed,
            "Activity updated"
        );

        Ok(updated)
    }

    pub async fn get(&self, id: &str) -> Result<Activity> {
        self.store
            .get_activity(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete_activity(id).await? {
            return Err(AppError::NotFound(format!("Activity {} not found", id)));
        }
        tracing::info!(activity_id = id, "Activity deleted");
        Ok(())
    }

    /// Activities of one baby that start inside the requested range.
    pub async fn list(&self, baby_id: &str, query: ListActivitiesQuery) -> Result<Vec<Activity>> {
        query.validate()?;

        let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit == 0 {
            return Err(AppError::BadRequest(
                "limit must be greater than 0".to_string(),
            ));
        }
        let limit = limit.min(MAX_LIST_LIMIT);

        let to = query
            .to
            .map(truncate_to_millis)
            .unwrap_or_else(default_upper_bound);
        let from = query.from.map(truncate_to_millis).unwrap_or_else(|| {
            saturating_sub(to, Duration::hours(DEFAULT_LOOKBACK_HOURS))
        });
        if from > to {
            return Err(AppError::BadRequest(
                "'from' must not be after 'to'".to_string(),
            ));
        }

        let mut filter = ActivityFilter::for_baby(baby_id)
            .with_window(TimeWindow::StartsBetween { from, to })
            .with_limit(limit);
        if let Some(activity_type) = query.activity_type {
            filter = filter.with_types([activity_type]);
        }

        self.store.query_activities(&filter).await
    }

    /// Duration activities of one baby that have been started but not ended.
    pub async fn in_progress(&self, baby_id: &str) -> Result<Vec<Activity>> {
        let to = default_upper_bound();
        let filter = ActivityFilter::for_baby(baby_id).with_window(TimeWindow::StartsBetween {
            from: saturating_sub(to, Duration::hours(DEFAULT_LOOKBACK_HOURS)),
            to,
        });

        let activities = self.store.query_activities(&filter).await?;
        Ok(activities
            .into_iter()
            .filter(Activity::is_in_progress)
            .collect())
    }
}

/// Latest start a listing reaches by default: anything the policy would accept.
fn default_upper_bound() -> DateTime<Utc> {
    saturating_add(Utc::now(), Duration::minutes(FUTURE_TOLERANCE_MINUTES))
}

/// Point events are stored with `end_time == start_time`; other types must
/// not end before they start.
fn normalize_end(
    activity_type: ActivityType,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>> {
    if activity_type.is_point_event() {
        return Ok(Some(start_time));
    }
    match end_time {
        Some(end) if end < start_time => Err(AppError::BadRequest(
            "endTime must not be before startTime".to_string(),
        )),
        other => Ok(other),
    }
}

fn enforce(conflict: Option<ConflictResult>, force: bool, candidate: &Candidate) -> Result<()> {
    match conflict {
        None => Ok(()),
        Some(conflict) if conflict.permits(force) => {
            tracing::warn!(
                baby_id = %candidate.baby_id,
                activity_type = %candidate.activity_type,
                code = %conflict.code,
                conflicting_id = ?conflict.conflicting_activity.as_ref().map(|a| a.id.as_str()),
                "Overlap overridden by caller"
            );
            Ok(())
        }
        Some(conflict) => Err(AppError::Conflict(conflict)),
    }
}
