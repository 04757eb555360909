use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

const SYNTHESIZED_PREFIX: &str = "webhook-";

/// Which ingestion path produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    PolledFeed,
    Webhook,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::PolledFeed => "polled_feed",
            Origin::Webhook => "webhook",
        }
    }
}

/// Dedup key of an event. Upstream ids and synthesized ids live in separate
/// variants, so the two can never compare equal even if their text matches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Upstream(String),
    Synthesized(Uuid),
}

impl Identity {
    /// Fresh identity for a delivery that carries none. UUIDv7 is time ordered
    /// and random in its low bits, so two arrivals in the same millisecond
    /// still get distinct values.
    pub fn synthesize() -> Self {
        Identity::Synthesized(Uuid::now_v7())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Upstream(id) => f.write_str(id),
            Identity::Synthesized(uuid) => write!(f, "{}{}", SYNTHESIZED_PREFIX, uuid),
        }
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let synthesized = raw
            .strip_prefix(SYNTHESIZED_PREFIX)
            .and_then(|rest| Uuid::parse_str(rest).ok());
        Ok(match synthesized {
            Some(uuid) => Identity::Synthesized(uuid),
            None => Identity::Upstream(raw),
        })
    }
}

/// Canonical activity event. Only built by the normalizer and never mutated
/// once admitted to a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "id")]
    pub identity: Identity,
    #[serde(rename = "type")]
    pub category: String,
    pub actor: String,
    #[serde(rename = "created_at", with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub origin: Origin,
    pub payload_summary: String,
    #[serde(rename = "repo")]
    pub repo_scope: String,
    /// Set when the source timestamp could not be parsed and `occurred_at`
    /// holds the processing time instead.
    #[serde(default)]
    pub approximate_time: bool,
}
