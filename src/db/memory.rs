// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process activity store for local development and tests.

use crate::db::{ActivityFilter, ActivityQuery};
use crate::error::AppError;
use crate::models::Activity;
use dashmap::DashMap;
use std::sync::Arc;

/// Activity store backed by a concurrent map keyed by record ID.
#[derive(Clone, Default)]
pub struct MemoryDb {
    activities: Arc<DashMap<String, Activity>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_activity(&self, id: &str) -> Option<Activity> {
        self.activities.get(id).map(|entry| entry.value().clone())
    }

    /// Insert or replace an activity.
    pub fn set_activity(&self, activity: &Activity) {
        self.activities
            .insert(activity.id.clone(), activity.clone());
    }

    pub fn delete_activity(&self, id: &str) -> bool {
        self.activities.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

impl ActivityQuery for MemoryDb {
    async fn query_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, AppError> {
        // Clone matches out first so no shard lock outlives this call.
        let matched: Vec<Activity> = self
            .activities
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        Ok(filter.order_and_limit(matched))
    }
}
