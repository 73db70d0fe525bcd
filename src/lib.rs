// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bubu-Log: record a baby's day (sleep, feeds, diapers, exercises).
//!
//! This crate provides the backend API for logging activities and enforces
//! the time-overlap rules that keep one baby's timeline consistent.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::ActivityService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub activity_service: ActivityService,
}
