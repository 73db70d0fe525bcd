// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Activities live in a single `activities` collection keyed by record ID.
//! Queries narrow by baby and time on the server; the exact
//! [`ActivityFilter`] predicate is then applied in process.
//!
//! Firestore cannot express "end time after X or missing", so an overlap
//! window is fetched as the union of two bounded range queries:
//! - records starting before the window end whose stored end falls after
//!   the window start, and
//! - records starting before the window end and no earlier than the longest
//!   synthesized duration before the window start. This covers unfinished
//!   activities, whose end is derived from their start.
//!
//! The overlap query needs a composite index on
//! `(babyId, startTime, endTime)`.

use std::collections::HashSet;

use crate::db::{collections, ActivityFilter, ActivityQuery, TimeWindow};
use crate::error::AppError;
use crate::models::{Activity, DURATION_DEFAULT_HOURS};
use crate::time_utils::{format_utc_rfc3339, saturating_sub};
use chrono::Duration;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by record ID.
    pub async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace an activity.
    pub async fn set_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an activity. Returns `false` if it did not exist.
    pub async fn delete_activity(&self, id: &str) -> Result<bool, AppError> {
        if self.get_activity(id).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(activity_id = id, "Deleted activity");
        Ok(true)
    }
}

/// Server-side range condition on a stored timestamp field. Values are
/// fixed-width RFC3339 strings, so string comparison is chronological.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Bound {
    StartAtLeast(String),
    StartAtMost(String),
    StartBefore(String),
    EndAfter(String),
}

/// Range conditions of the server queries whose union holds every record
/// `window` can match.
fn server_bounds(window: &TimeWindow) -> Vec<Vec<Bound>> {
    match *window {
        TimeWindow::Any => vec![Vec::new()],
        TimeWindow::StartsBetween { from, to } => vec![vec![
            Bound::StartAtLeast(format_utc_rfc3339(from)),
            Bound::StartAtMost(format_utc_rfc3339(to)),
        ]],
        TimeWindow::Overlaps { start, end } => {
            let before_end = Bound::StartBefore(format_utc_rfc3339(end));
            // No synthesized end lies further than this past its start.
            let earliest = saturating_sub(start, Duration::hours(DURATION_DEFAULT_HOURS));
            vec![
                vec![
                    before_end.clone(),
                    Bound::EndAfter(format_utc_rfc3339(start)),
                ],
                vec![before_end, Bound::StartAtLeast(format_utc_rfc3339(earliest))],
            ]
        }
    }
}

impl FirestoreDb {
    async fn select_for_baby(
        &self,
        baby_id: &str,
        bounds: Vec<Bound>,
    ) -> Result<Vec<Activity>, AppError> {
        let baby_id = baby_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                let mut conditions = vec![q.field("babyId").eq(baby_id.clone())];
                conditions.extend(bounds.iter().map(|bound| match bound {
                    Bound::StartAtLeast(v) => {
                        q.field("startTime").greater_than_or_equal(v.clone())
                    }
                    Bound::StartAtMost(v) => q.field("startTime").less_than_or_equal(v.clone()),
                    Bound::StartBefore(v) => q.field("startTime").less_than(v.clone()),
                    Bound::EndAfter(v) => q.field("endTime").greater_than(v.clone()),
                }));
                q.for_all(conditions)
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

impl ActivityQuery for FirestoreDb {
    async fn query_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, AppError> {
        let mut candidates = Vec::new();
        for bounds in server_bounds(&filter.window) {
            candidates.extend(self.select_for_baby(&filter.baby_id, bounds).await?);
        }

        // A record can satisfy both overlap queries.
        let mut seen = HashSet::new();
        candidates.retain(|a: &Activity| seen.insert(a.id.clone()));

        tracing::debug!(
            baby_id = %filter.baby_id,
            fetched = candidates.len(),
            "Queried activities"
        );

        Ok(filter.apply(candidates))
    }
}
