//! Message types exchanged with producers and consumers.
//!
//! Field names follow the wire format used by the browser client and the
//! rendering engine, so they are renamed explicitly rather than derived
//! from the Rust field names.

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An orientation update pushed by a producer.
///
/// Decoding is lenient about shape so that any browser client can talk to
/// the relay:
/// - field names match ignoring ASCII case (`ID`, `id`, `Username`, ...);
/// - missing fields and `null` values leave the field empty or `0.0`;
/// - a repeated field keeps its last value;
/// - unknown fields are ignored.
///
/// A value of the wrong type is still an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProducerUpdate {
    /// Producer identity chosen by the client.
    #[serde(rename = "ID")]
    pub id: String,
    /// Display name.
    pub username: String,
    /// Forward/back tilt in degrees.
    pub beta: f64,
    /// Left/right tilt in degrees.
    pub gamma: f64,
}

impl ProducerUpdate {
    /// Create a new producer update.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, beta: f64, gamma: f64) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            beta,
            gamma,
        }
    }
}

impl<'de> Deserialize<'de> for ProducerUpdate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ProducerUpdateVisitor)
    }
}

struct ProducerUpdateVisitor;

impl<'de> Visitor<'de> for ProducerUpdateVisitor {
    type Value = ProducerUpdate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a producer update object")
    }

    // A bare `null` document decodes to an empty update.
    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(ProducerUpdate::default())
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut update = ProducerUpdate::default();
        while let Some(key) = map.next_key::<String>()? {
            if key.eq_ignore_ascii_case("id") {
                if let Some(id) = map.next_value::<Option<String>>()? {
                    update.id = id;
                }
            } else if key.eq_ignore_ascii_case("username") {
                if let Some(username) = map.next_value::<Option<String>>()? {
                    update.username = username;
                }
            } else if key.eq_ignore_ascii_case("beta") {
                if let Some(beta) = map.next_value::<Option<f64>>()? {
                    update.beta = beta;
                }
            } else if key.eq_ignore_ascii_case("gamma") {
                if let Some(gamma) = map.next_value::<Option<f64>>()? {
                    update.gamma = gamma;
                }
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(update)
    }
}

/// The latest known orientation of one producer, as sent to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOrientation {
    /// Display name.
    pub username: String,
    /// Forward/back tilt in degrees.
    pub fb_tilt: f64,
    /// Left/right tilt in degrees.
    pub lr_tilt: f64,
    /// Second of the minute (0-59) at which the server recorded the sample.
    pub last_update: u8,
}

/// The full state pushed to consumers, keyed by integer producer id.
///
/// JSON object keys are the decimal form of the id. Keys are emitted in
/// numeric order (`"2"` before `"10"`), not string order; consumers read
/// the object by key and do not depend on either.
pub type Aggregate = BTreeMap<i64, DeviceOrientation>;

/// Parse a producer id into its aggregate key.
///
/// Accepts an optional sign followed by decimal digits within the `i64`
/// range. Anything else has no key and is left out of the aggregate.
#[must_use]
pub fn aggregate_key(producer_id: &str) -> Option<i64> {
    producer_id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_key() {
        assert_eq!(aggregate_key("1"), Some(1));
        assert_eq!(aggregate_key("42017"), Some(42017));
        assert_eq!(aggregate_key("-7"), Some(-7));
        assert_eq!(aggregate_key("+7"), Some(7));
        assert_eq!(aggregate_key("007"), Some(7));
        assert_eq!(aggregate_key("abc"), None);
        assert_eq!(aggregate_key(""), None);
        assert_eq!(aggregate_key(" 1"), None);
        assert_eq!(aggregate_key("1.5"), None);
        assert_eq!(aggregate_key("99999999999999999999"), None);
    }

    #[test]
    fn test_producer_update_new() {
        let update = ProducerUpdate::new("1", "a", 0.5, -0.2);
        assert_eq!(update.id, "1");
        assert_eq!(update.username, "a");
        assert_eq!(update.beta, 0.5);
        assert_eq!(update.gamma, -0.2);
    }
}
