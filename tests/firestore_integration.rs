// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed tests. These require the emulator:
//!
//! ```sh
//! gcloud emulators firestore start --host-port=localhost:8085
//! FIRESTORE_EMULATOR_HOST=localhost:8085 cargo test --test firestore_integration
//! ```

use axum::http::StatusCode;
use bubu_log::db::{ActivityFilter, ActivityQuery, ActivityStore, TimeWindow};
use bubu_log::models::{Activity, ActivityType};
use bubu_log::services::{Candidate, ConflictCode, OverlapPolicy};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{ago, body_json, json_request, ts};

fn unique_baby() -> String {
    format!("baby-{}", uuid::Uuid::new_v4())
}

fn record(baby_id: &str, activity_type: ActivityType, start_min: i64, end_min: Option<i64>) -> Activity {
    Activity {
        id: uuid::Uuid::new_v4().to_string(),
        baby_id: baby_id.to_string(),
        activity_type,
        start_time: ago(start_min),
        end_time: end_min.map(ago),
        amount_ml: None,
        notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_round_trip_and_delete() {
    require_emulator!();

    let db = common::test_db().await;
    let activity = record(&unique_baby(), ActivityType::Bath, 30, Some(20));

    db.set_activity(&activity).await.unwrap();
    let loaded = db.get_activity(&activity.id).await.unwrap().unwrap();
    assert_eq!(loaded.start_time, activity.start_time);
    assert_eq!(loaded.end_time, activity.end_time);

    assert!(db.delete_activity(&activity.id).await.unwrap());
    assert!(!db.delete_activity(&activity.id).await.unwrap());
}

#[tokio::test]
async fn test_query_windows() {
    require_emulator!();

    let db = common::test_db().await;
    let baby = unique_baby();
    let sleep = record(&baby, ActivityType::Sleep, 120, Some(60));
    let diaper = record(&baby, ActivityType::Diaper, 90, Some(90));
    let later = record(&baby, ActivityType::Diaper, 10, Some(10));
    for a in [&sleep, &diaper, &later] {
        db.set_activity(a).await.unwrap();
    }

    let overlapping = db
        .query_activities(&ActivityFilter::for_baby(&baby).with_window(TimeWindow::Overlaps {
            start: ago(100),
            end: ago(80),
        }))
        .await
        .unwrap();
    let ids: Vec<&str> = overlapping.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![sleep.id.as_str(), diaper.id.as_str()]);

    let diapers = db
        .query_activities(
            &ActivityFilter::for_baby(&baby)
                .with_types([ActivityType::Diaper])
                .with_window(TimeWindow::StartsBetween {
                    from: ago(15),
                    to: ago(5),
                }),
        )
        .await
        .unwrap();
    assert_eq!(diapers.len(), 1);
    assert_eq!(diapers[0].id, later.id);
}

#[tokio::test]
async fn test_overlap_query_skips_old_history() {
    require_emulator!();

    let db = common::test_db().await;
    let baby = unique_baby();
    let old_sleep = record(&baby, ActivityType::Sleep, 60 * 48, Some(60 * 47));
    let forgotten = record(&baby, ActivityType::Sleep, 60 * 10, None);
    let long_walk = record(&baby, ActivityType::Outdoor, 60 * 10, Some(50));
    let recent_sleep = record(&baby, ActivityType::Sleep, 180, None);
    for a in [&old_sleep, &forgotten, &long_walk, &recent_sleep] {
        db.set_activity(a).await.unwrap();
    }

    let overlapping = db
        .query_activities(&ActivityFilter::for_baby(&baby).with_window(TimeWindow::Overlaps {
            start: ago(60),
            end: ago(40),
        }))
        .await
        .unwrap();

    let ids: Vec<&str> = overlapping.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![long_walk.id.as_str(), recent_sleep.id.as_str()]);
}

#[tokio::test]
async fn test_policy_against_firestore() {
    require_emulator!();

    let db = common::test_db().await;
    let baby = unique_baby();
    db.set_activity(&record(&baby, ActivityType::Sleep, 120, None))
        .await
        .unwrap();

    let c = Candidate {
        baby_id: baby.clone(),
        activity_type: ActivityType::GasExercise,
        start_time: ago(60),
        end_time: Some(ago(50)),
        exclude_id: None,
    };
    let conflict = OverlapPolicy.check(&db, &c).await.unwrap().unwrap();
    assert_eq!(conflict.code, ConflictCode::OverlapActivity);
}

#[tokio::test]
async fn test_api_over_firestore() {
    require_emulator!();

    let (app, _) = common::create_test_app_with(ActivityStore::Firestore(common::test_db().await));
    let baby = unique_baby();

    let body = json!({
        "babyId": baby,
        "type": "OUTDOOR",
        "startTime": ts(ago(90)),
        "endTime": ts(ago(30))
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/activities", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/activities",
            json!({
                "babyId": baby,
                "type": "OUTDOOR",
                "startTime": ts(ago(60)),
                "endTime": ts(ago(60) + Duration::minutes(10))
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_ACTIVITY");
}
