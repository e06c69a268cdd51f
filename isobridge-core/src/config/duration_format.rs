//! Duration fields in the configuration file.
//!
//! Durations are written as humantime strings (`500ms`, `5s`, `1m 30s`).
//! Bare integers are accepted as seconds so `"terminate_grace": 5` keeps
//! working for hand-edited files.

use std::fmt;
use std::time::Duration;

use serde::Deserializer;
use serde::de::{self, Unexpected, Visitor};

use super::error::ConfigError;

/// Parse a humantime duration string.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s.trim()).map_err(|e| ConfigError::InvalidDuration {
        value: s.to_string(),
        reason: e.to_string(),
    })
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a duration string like \"5s\" or a number of seconds")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
        parse_duration(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
        Ok(Duration::from_secs(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
        u64::try_from(v)
            .map(Duration::from_secs)
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }
}

/// Deserialize a duration from a humantime string or a number of seconds.
///
/// Dispatches on the token directly instead of going through an untagged
/// enum, which cannot see numbers once serde_json keeps them as raw text.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_parse_humantime() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration(" 1m 30s ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse_duration("soon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn test_deserialize_text_and_seconds() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(with = "super")]
            grace: Duration,
        }

        let h: Holder = serde_json::from_str(r#"{"grace": "250ms"}"#).unwrap();
        assert_eq!(h.grace, Duration::from_millis(250));

        let h: Holder = serde_json::from_str(r#"{"grace": 3}"#).unwrap();
        assert_eq!(h.grace, Duration::from_secs(3));

        let bad: Result<Holder, _> = serde_json::from_str(r#"{"grace": "later"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_deserialize_rejects_negative_and_fractional_seconds() {
        #[derive(Debug, Deserialize)]
        struct Holder {
            #[serde(with = "super")]
            #[allow(dead_code)]
            grace: Duration,
        }

        assert!(serde_json::from_str::<Holder>(r#"{"grace": -1}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"grace": 1.5}"#).is_err());
    }

    #[test]
    fn test_deserialize_seconds_from_value() {
        // Numbers read into a `Value` first take a different path than
        // numbers read straight from text.
        #[derive(Deserialize)]
        struct Holder {
            #[serde(with = "super")]
            grace: Duration,
        }

        let value = serde_json::json!({ "grace": 7 });
        let h: Holder = serde_json::from_value(value).unwrap();
        assert_eq!(h.grace, Duration::from_secs(7));
    }
}
