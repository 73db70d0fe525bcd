// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity API routes.

use crate::error::{AppError, Result};
use crate::models::Activity;
use crate::services::activity::{
    CreateActivityRequest, ListActivitiesQuery, UpdateActivityRequest,
};
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Activity routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", post(create_activity))
        .route(
            "/api/activities/{id}",
            get(get_activity)
                .patch(update_activity)
                .delete(delete_activity),
        )
        .route("/api/babies/{baby_id}/activities", get(list_activities))
        .route(
            "/api/babies/{baby_id}/activities/in-progress",
            get(list_in_progress),
        )
}

// ─── Create / Edit ───────────────────────────────────────────

/// Record a new activity.
///
/// Conflicts are answered with `409` and a body naming the conflict code and
/// the record it collides with.
async fn create_activity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>)> {
    tracing::debug!(
        baby_id = %req.baby_id,
        activity_type = %req.activity_type,
        start_time = %req.start_time,
        force = req.force,
        "Creating activity"
    );

    let activity = state.activity_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// Edit an activity; the conflict check excludes the record itself.
async fn update_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<Json<Activity>> {
    let activity = state.activity_service.update(&id, req).await?;
    Ok(Json(activity))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    Ok(Json(state.activity_service.get(&id).await?))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.activity_service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Listings ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
    pub total: u32,
}

impl From<Vec<Activity>> for ActivitiesResponse {
    fn from(activities: Vec<Activity>) -> Self {
        Self {
            total: activities.len() as u32,
            activities,
        }
    }
}

/// Timeline of one baby, earliest first.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Path(baby_id): Path<String>,
    query: std::result::Result<Query<ListActivitiesQuery>, QueryRejection>,
) -> Result<Json<ActivitiesResponse>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;

    tracing::debug!(
        baby_id = %baby_id,
        from = ?query.from,
        to = ?query.to,
        activity_type = ?query.activity_type,
        limit = ?query.limit,
        "Listing activities"
    );

    let activities = state.activity_service.list(&baby_id, query).await?;
    Ok(Json(activities.into()))
}

/// Running timers (e.g. a sleep that has not been ended yet).
async fn list_in_progress(
    State(state): State<Arc<AppState>>,
    Path(baby_id): Path<String>,
) -> Result<Json<ActivitiesResponse>> {
    let activities = state.activity_service.in_progress(&baby_id).await?;
    Ok(Json(activities.into()))
}
