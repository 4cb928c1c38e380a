//! Serialization utilities for durations
//!
//! Configuration files express delays as integer milliseconds; these
//! modules plug into `#[serde(with = "...")]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// Serialize `Duration` as milliseconds (u64)
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// use holdfast_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     base: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serialize a Duration as milliseconds, saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Same as [`duration_millis`] for `Option<Duration>` fields
///
/// Pair with `#[serde(default)]` so a missing key reads as `None`.
pub mod duration_millis_opt {
    use super::*;

    /// Serialize an optional Duration as optional milliseconds
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional milliseconds into an optional Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for duration serde helpers.

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct DelaySection {
        #[serde(with = "duration_millis")]
        base: Duration,
        #[serde(default, with = "duration_millis_opt")]
        max_delay: Option<Duration>,
    }

    /// Tests that Duration serializes to milliseconds as u64
    #[test]
    fn test_duration_millis_serialize() {
        let data = DelaySection { base: Duration::from_millis(1500), max_delay: None };

        let json = serde_json::to_string(&data).expect("Should serialize valid struct");
        assert!(json.contains("1500"), "Should contain milliseconds value");
        assert!(json.contains("\"max_delay\":null"));
    }

    /// Tests that a missing optional key reads as `None`
    #[test]
    fn test_duration_millis_opt_missing_key() {
        let data: DelaySection =
            serde_json::from_str(r#"{"base":250}"#).expect("Should deserialize valid JSON");

        assert_eq!(data.base, Duration::from_millis(250));
        assert_eq!(data.max_delay, None);
    }

    /// Tests that a present optional key reads as `Some`
    #[test]
    fn test_duration_millis_opt_present() {
        let data: DelaySection = serde_json::from_str(r#"{"base":0,"max_delay":1000}"#)
            .expect("Should deserialize valid JSON");

        assert_eq!(data.base, Duration::ZERO);
        assert_eq!(data.max_delay, Some(Duration::from_secs(1)));
    }

    /// Validates that `Duration::MAX` saturates instead of failing.
    ///
    /// Assertions:
    /// - Ensures the serialized value equals `u64::MAX`.
    #[test]
    fn test_duration_millis_saturates() {
        let data = DelaySection { base: Duration::MAX, max_delay: None };
        let json = serde_json::to_string(&data).expect("Should serialize");
        assert!(json.contains(&u64::MAX.to_string()));
    }

    /// Tests that non-numeric input is rejected
    #[test]
    fn test_duration_millis_deserialize_invalid_json() {
        let result: Result<DelaySection, _> = serde_json::from_str(r#"{"base":"soon"}"#);
        assert!(result.is_err());
    }
}
