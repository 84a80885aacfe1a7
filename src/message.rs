use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WallError;

/// One entry on the wall. Both fields are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    #[serde(with = "iso_millis")]
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Strips surrounding whitespace and rejects text that is left empty.
    ///
    /// The timestamp is truncated to milliseconds, the precision it is
    /// stored with.
    pub fn new(raw_text: &str, now: DateTime<Utc>) -> Result<Message, WallError> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(WallError::InvalidInput);
        }
        Ok(Message {
            text: text.to_string(),
            timestamp: now.trunc_subsecs(3),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

pub type Messages = Vec<Message>;

/// `YYYY-MM-DDTHH:MM:SS.sssZ`. Fixed width, so string order is time order.
/// Any RFC 3339 timestamp is accepted when reading.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
