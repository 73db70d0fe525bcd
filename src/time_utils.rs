// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Stored timestamps use a fixed-width RFC3339 form (millisecond precision,
//! `Z` suffix) so that lexical order in the document store matches
//! chronological order and range filters can be expressed as string
//! comparisons.

use chrono::{DateTime, Datelike, Duration, SecondsFormat, SubsecRound, Utc};
use validator::ValidationError;

/// Earliest year accepted on input. Later years keep the stored form fixed-width.
pub const MIN_SUPPORTED_YEAR: i32 = 1970;
/// Latest year accepted on input.
pub const MAX_SUPPORTED_YEAR: i32 = 9999;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC3339 timestamp and normalize it to UTC.
pub fn parse_rfc3339_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether a timestamp falls inside the range the log accepts and stores.
pub fn is_supported(date: &DateTime<Utc>) -> bool {
    (MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&date.year())
}

/// Validator hook for request timestamps.
pub fn validate_supported(date: &DateTime<Utc>) -> Result<(), ValidationError> {
    if is_supported(date) {
        Ok(())
    } else {
        Err(ValidationError::new("timestamp_range")
            .with_message("timestamp must fall between years 1970 and 9999".into()))
    }
}

/// Drop precision below what the stored form keeps.
pub fn truncate_to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(3)
}

/// `date + delta`, clamped to the representable range.
pub fn saturating_add(date: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    date.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// `date - delta`, clamped to the representable range.
pub fn saturating_sub(date: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    date.checked_sub_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

/// Serde adapter for required timestamps.
pub mod rfc3339 {
    use super::{format_utc_rfc3339, parse_rfc3339_utc};
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_rfc3339_utc(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid RFC3339 timestamp: {raw}")))
    }
}

/// Serde adapter for optional timestamps.
pub mod rfc3339_option {
    use super::{format_utc_rfc3339, parse_rfc3339_utc};
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&format_utc_rfc3339(*date)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| {
                parse_rfc3339_utc(&raw)
                    .ok_or_else(|| D::Error::custom(format!("invalid RFC3339 timestamp: {raw}")))
            })
            .transpose()
    }
}

/// Deserialize a patch field where an explicit `null` differs from absence.
///
/// Use with `#[serde(default)]`: a missing field stays `None`, `null` becomes
/// `Some(None)` and a value becomes `Some(Some(v))`.
pub fn double_option<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(d).map(Some)
}
