// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and timestamp serialization.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializer for a patch field that may set a timestamp or clear it.
///
/// `None` leaves the field out of the patch (callers pair this with
/// `skip_serializing_if`); `Some(None)` writes an explicit null and
/// `Some(Some(t))` writes a native Firestore timestamp.
pub mod patch_timestamp {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(value: &Option<Option<DateTime<Utc>>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => firestore::serialize_as_null_timestamp::serialize(inner, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2025-03-01T08:30:00.000Z");
    }
}
