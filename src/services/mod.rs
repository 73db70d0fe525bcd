// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod overlap;

pub use activity::ActivityService;
pub use overlap::{Candidate, ConflictCode, ConflictResult, OverlapPolicy};
