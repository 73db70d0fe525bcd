// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Baby activity model for storage and API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::time_utils::saturating_add;

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Kind of logged activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActivityType {
    Sleep,
    Diaper,
    Breastfeed,
    Bottle,
    Pump,
    HeadLift,
    PassiveExercise,
    RollOver,
    PullToSit,
    GasExercise,
    Bath,
    Outdoor,
    EarlyEducation,
    Supplement,
    SpitUp,
}

/// Conflict category an activity type can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictCategory {
    /// Instantaneous events; stored with `end_time == start_time`.
    PointEvent,
    /// Feeding events that exclude each other in time.
    FeedingConflict,
    /// Duration events that may not overlap a record of the same type.
    SameTypeDuration,
    /// Activities that cannot happen while the baby is asleep.
    SleepConflict,
}

use ConflictCategory::{FeedingConflict, PointEvent, SameTypeDuration, SleepConflict};

impl ActivityType {
    pub const ALL: [ActivityType; 15] = [
        ActivityType::Sleep,
        ActivityType::Diaper,
        ActivityType::Breastfeed,
        ActivityType::Bottle,
        ActivityType::Pump,
        ActivityType::HeadLift,
        ActivityType::PassiveExercise,
        ActivityType::RollOver,
        ActivityType::PullToSit,
        ActivityType::GasExercise,
        ActivityType::Bath,
        ActivityType::Outdoor,
        ActivityType::EarlyEducation,
        ActivityType::Supplement,
        ActivityType::SpitUp,
    ];

    /// Category membership table. Categories are not exclusive.
    pub fn categories(self) -> &'static [ConflictCategory] {
        match self {
            ActivityType::Sleep => &[SameTypeDuration],
            ActivityType::Diaper => &[PointEvent],
            ActivityType::Breastfeed => &[FeedingConflict],
            ActivityType::Bottle => &[FeedingConflict],
            ActivityType::Pump => &[SameTypeDuration],
            ActivityType::HeadLift => &[SameTypeDuration, SleepConflict],
            ActivityType::PassiveExercise => &[SameTypeDuration, SleepConflict],
            ActivityType::RollOver => &[PointEvent, SleepConflict],
            ActivityType::PullToSit => &[PointEvent, SleepConflict],
            ActivityType::GasExercise => &[SameTypeDuration, SleepConflict],
            ActivityType::Bath => &[SameTypeDuration, SleepConflict],
            ActivityType::Outdoor => &[SameTypeDuration],
            ActivityType::EarlyEducation => &[SameTypeDuration, SleepConflict],
            ActivityType::Supplement => &[PointEvent],
            ActivityType::SpitUp => &[PointEvent],
        }
    }

    pub fn in_category(self, category: ConflictCategory) -> bool {
        self.categories().contains(&category)
    }

    pub fn is_point_event(self) -> bool {
        self.in_category(PointEvent)
    }

    pub fn is_feeding(self) -> bool {
        self.in_category(FeedingConflict)
    }

    pub fn is_same_type_duration(self) -> bool {
        self.in_category(SameTypeDuration)
    }

    pub fn is_sleep_conflict(self) -> bool {
        self.in_category(SleepConflict)
    }

    /// All types belonging to `category`, in declaration order.
    pub fn members_of(category: ConflictCategory) -> Vec<ActivityType> {
        Self::ALL
            .into_iter()
            .filter(|t| t.in_category(category))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Sleep => "SLEEP",
            ActivityType::Diaper => "DIAPER",
            ActivityType::Breastfeed => "BREASTFEED",
            ActivityType::Bottle => "BOTTLE",
            ActivityType::Pump => "PUMP",
            ActivityType::HeadLift => "HEAD_LIFT",
            ActivityType::PassiveExercise => "PASSIVE_EXERCISE",
            ActivityType::RollOver => "ROLL_OVER",
            ActivityType::PullToSit => "PULL_TO_SIT",
            ActivityType::GasExercise => "GAS_EXERCISE",
            ActivityType::Bath => "BATH",
            ActivityType::Outdoor => "OUTDOOR",
            ActivityType::EarlyEducation => "EARLY_EDUCATION",
            ActivityType::Supplement => "SUPPLEMENT",
            ActivityType::SpitUp => "SPIT_UP",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown activity type: {0}")]
pub struct UnknownActivityType(pub String);

impl FromStr for ActivityType {
    type Err = UnknownActivityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownActivityType(s.to_string()))
    }
}

/// Stored activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    /// Record ID (also used as document ID)
    pub id: String,
    /// Owning baby; every conflict query is scoped to it
    pub baby_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(with = "crate::time_utils::rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    /// Absent while a duration activity is still running
    #[serde(default, with = "crate::time_utils::rfc3339_option")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub end_time: Option<DateTime<Utc>>,
    /// Volume for bottle feeds and pumping sessions
    #[serde(default)]
    pub amount_ml: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "crate::time_utils::rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::time_utils::rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
}

/// Window assumed for an unfinished feeding.
pub const FEEDING_DEFAULT_MINUTES: i64 = 30;
/// Window assumed for an unfinished duration activity.
pub const DURATION_DEFAULT_HOURS: i64 = 4;
/// Minimal window for everything else, so point events still occupy an instant.
pub const MINIMAL_DURATION_SECS: i64 = 1;

/// End of the window an activity occupies for overlap purposes.
///
/// A real `end` strictly after `start` is used as is. Otherwise the window is
/// synthesized from the type's default duration. The result is never stored.
pub fn effective_end(
    activity_type: ActivityType,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match end {
        Some(end) if end > start => end,
        _ if activity_type.is_feeding() => {
            saturating_add(start, Duration::minutes(FEEDING_DEFAULT_MINUTES))
        }
        _ if activity_type.is_same_type_duration() => {
            saturating_add(start, Duration::hours(DURATION_DEFAULT_HOURS))
        }
        _ => saturating_add(start, Duration::seconds(MINIMAL_DURATION_SECS)),
    }
}

impl Activity {
    /// A duration activity that has been started but not finished.
    pub fn is_in_progress(&self) -> bool {
        self.end_time.is_none() && !self.activity_type.is_point_event()
    }

    pub fn effective_end(&self) -> DateTime<Utc> {
        effective_end(self.activity_type, self.start_time, self.end_time)
    }
}
