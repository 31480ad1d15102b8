use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp wrapper around `chrono::DateTime<Utc>`.
///
/// Services treat this as the cluster-wide time source; every stored
/// timestamp (heartbeats, registration times) is a `UtcTime`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcTime {
    inner: DateTime<Utc>,
}

impl UtcTime {
    /// Get the current UTC time.
    pub fn now() -> Self {
        Self { inner: Utc::now() }
    }

    /// Reconstruct from milliseconds since the Unix epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    pub fn from_timestamp_millis(millis: i64) -> Self {
        Self {
            inner: DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default(),
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.inner.timestamp_millis()
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.inner.timestamp()
    }
}

impl fmt::Debug for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UtcTime({})", self.inner.to_rfc3339())
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.to_rfc3339())
    }
}

impl Default for UtcTime {
    fn default() -> Self {
        Self {
            inner: DateTime::<Utc>::default(),
        }
    }
}

impl From<DateTime<Utc>> for UtcTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self { inner: dt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_time_now() {
        let t = UtcTime::now();
        assert!(t.timestamp() > 0);
    }

    #[test]
    fn test_utc_time_millis_roundtrip() {
        let t = UtcTime::now();
        let ms = t.timestamp_millis();
        let back = UtcTime::from_timestamp_millis(ms);
        assert_eq!(back.timestamp_millis(), ms);
    }

    #[test]
    fn test_utc_time_default_is_epoch() {
        let t = UtcTime::default();
        assert_eq!(t.timestamp(), 0);
    }

    #[test]
    fn test_utc_time_ordering() {
        let a = UtcTime::from_timestamp_millis(1_000);
        let b = UtcTime::from_timestamp_millis(2_000);
        assert!(a < b);
    }

    #[test]
    fn test_utc_time_serde() {
        let t = UtcTime::now();
        let json = serde_json::to_string(&t).unwrap();
        let parsed: UtcTime = serde_json::from_str(&json).unwrap();
        assert_eq!(t, parsed);
    }
}
