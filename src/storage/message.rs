// Stored message record

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A message as persisted and as rendered in the list endpoint.
///
/// Field order is the wire order: `content`, `author`, `timestamp`, `verified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub author: String,
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<FixedOffset>,
    pub verified: bool,
}

impl Message {
    pub fn new(
        author: &str,
        content: &str,
        timestamp: DateTime<FixedOffset>,
        verified: bool,
    ) -> Self {
        Self {
            content: content.to_string(),
            author: author.to_string(),
            timestamp,
            verified,
        }
    }

    /// Timestamp in its wire form
    pub fn timestamp_string(&self) -> String {
        timestamp_format::render(&self.timestamp)
    }
}

/// RFC 3339 with a numeric offset; fractional seconds only when non-zero
pub mod timestamp_format {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn render(ts: &DateTime<FixedOffset>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    pub fn serialize<S>(ts: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&render(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}
