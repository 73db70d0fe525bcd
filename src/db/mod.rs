// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! The overlap policy only needs to *read* activities, through
//! [`ActivityQuery`]. Handlers go through [`ActivityStore`], which dispatches
//! to Firestore in production or to the in-process [`MemoryDb`].
//!
//! No backend offers check-and-insert atomicity: two concurrent creates for
//! the same baby can both pass the conflict check and both be stored.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Activity, ActivityType};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "activities";
}

/// Time constraint of an activity query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Any,
    /// `from <= start_time <= to`
    StartsBetween {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Half-open intersection with `[start, end)`.
    ///
    /// A stored activity without an end time is bounded by its effective end,
    /// so an unfinished sleep occupies four hours rather than forever.
    Overlaps {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeWindow {
    pub fn matches(&self, activity: &Activity) -> bool {
        match *self {
            TimeWindow::Any => true,
            TimeWindow::StartsBetween { from, to } => {
                from <= activity.start_time && activity.start_time <= to
            }
            TimeWindow::Overlaps { start, end } => {
                let existing_end = activity
                    .end_time
                    .unwrap_or_else(|| activity.effective_end());
                activity.start_time < end && existing_end > start
            }
        }
    }
}

/// Activity read query, always scoped to one baby.
#[derive(Debug, Clone)]
pub struct ActivityFilter {
    pub baby_id: String,
    /// Empty matches every type.
    pub types: Vec<ActivityType>,
    pub window: TimeWindow,
    /// Record to ignore, used when re-checking an edited activity.
    pub exclude_id: Option<String>,
    pub limit: Option<usize>,
}

impl ActivityFilter {
    pub fn for_baby(baby_id: impl Into<String>) -> Self {
        Self {
            baby_id: baby_id.into(),
            types: Vec::new(),
            window: TimeWindow::Any,
            exclude_id: None,
            limit: None,
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = ActivityType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn excluding(mut self, id: Option<&str>) -> Self {
        self.exclude_id = id.map(str::to_string);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Exact in-process predicate shared by every backend.
    pub fn matches(&self, activity: &Activity) -> bool {
        activity.baby_id == self.baby_id
            && (self.types.is_empty() || self.types.contains(&activity.activity_type))
            && self.exclude_id.as_deref() != Some(activity.id.as_str())
            && self.window.matches(activity)
    }

    /// Filter, order by start time (ties by id) and truncate to the limit.
    pub fn apply(&self, activities: impl IntoIterator<Item = Activity>) -> Vec<Activity> {
        self.order_and_limit(
            activities
                .into_iter()
                .filter(|a| self.matches(a))
                .collect(),
        )
    }

    /// Order already-matched activities by start time (ties by id) and
    /// truncate to the limit.
    pub fn order_and_limit(&self, mut matched: Vec<Activity>) -> Vec<Activity> {
        matched.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Read capability consumed by the overlap policy.
pub trait ActivityQuery {
    /// Activities matching `filter`, earliest start first.
    fn query_activities(
        &self,
        filter: &ActivityFilter,
    ) -> impl Future<Output = Result<Vec<Activity>, AppError>> + Send;
}

/// Storage backend selected at startup.
#[derive(Clone)]
pub enum ActivityStore {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl ActivityStore {
    pub async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError> {
        match self {
            ActivityStore::Firestore(db) => db.get_activity(id).await,
            ActivityStore::Memory(db) => Ok(db.get_activity(id)),
        }
    }

    pub async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        match self {
            ActivityStore::Firestore(db) => db.set_activity(activity).await,
            ActivityStore::Memory(db) => {
                db.set_activity(activity);
                Ok(())
            }
        }
    }

    pub async fn update_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.insert_activity(activity).await
    }

    /// Returns `false` when no record with `id` existed.
    pub async fn delete_activity(&self, id: &str) -> Result<bool, AppError> {
        match self {
            ActivityStore::Firestore(db) => db.delete_activity(id).await,
            ActivityStore::Memory(db) => Ok(db.delete_activity(id)),
        }
    }
}

impl ActivityQuery for ActivityStore {
    async fn query_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, AppError> {
        match self {
            ActivityStore::Firestore(db) => db.query_activities(filter).await,
            ActivityStore::Memory(db) => db.query_activities(filter).await,
        }
    }
}
