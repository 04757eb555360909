use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::warn;

use crate::api::ActivityError;
use crate::event::{Event, Identity, Origin};

pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_WEBHOOK_CATEGORY: &str = "webhook";
pub const DEFAULT_EXCERPT_BYTES: usize = 1024;

/// Raw input to the normalizer, tagged by ingestion path. The two paths have
/// different field requirements: feed records must carry `id` and
/// `created_at`, webhook payloads are accepted in any shape.
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    Feed {
        record: &'a Value,
        repo_scope: &'a str,
    },
    Webhook {
        payload: &'a Value,
    },
}

impl RawRecord<'_> {
    pub fn origin(&self) -> Origin {
        match self {
            RawRecord::Feed { .. } => Origin::PolledFeed,
            RawRecord::Webhook { .. } => Origin::Webhook,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    excerpt_bytes: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_EXCERPT_BYTES)
    }
}

impl Normalizer {
    pub fn new(excerpt_bytes: usize) -> Self {
        Self { excerpt_bytes }
    }

    /// Builds the canonical event for `raw`. `now` is the processing time,
    /// used as the webhook arrival time and as the fallback for unparsable
    /// feed timestamps.
    pub fn normalize(
        &self,
        raw: RawRecord<'_>,
        now: OffsetDateTime,
    ) -> Result<Event, ActivityError> {
        match raw {
            RawRecord::Feed { record, repo_scope } => {
                self.normalize_feed(record, repo_scope, now)
            }
            RawRecord::Webhook { payload } => Ok(self.normalize_webhook(payload, now)),
        }
    }

    fn normalize_feed(
        &self,
        record: &Value,
        repo_scope: &str,
        now: OffsetDateTime,
    ) -> Result<Event, ActivityError> {
        if !record.is_object() {
            return Err(ActivityError::MalformedRecord(
                "record is not an object".to_owned(),
            ));
        }

        let identity = match record.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Identity::Upstream(id.clone()),
            Some(Value::Number(id)) => Identity::Upstream(id.to_string()),
            Some(_) => {
                return Err(ActivityError::MalformedRecord(
                    "'id' is not a string or number".to_owned(),
                ))
            }
            None => {
                return Err(ActivityError::MalformedRecord(
                    "missing required field 'id'".to_owned(),
                ))
            }
        };

        let created_at = record
            .get("created_at")
            .ok_or_else(|| {
                ActivityError::MalformedRecord("missing required field 'created_at'".to_owned())
            })?
            .as_str()
            .ok_or_else(|| {
                ActivityError::MalformedRecord("'created_at' is not a string".to_owned())
            })?;

        let (occurred_at, approximate_time) = match parse_timestamp(created_at) {
            Some(parsed) => (parsed, false),
            None => {
                warn!(
                    id = %identity,
                    created_at,
                    "unparsable feed timestamp, using processing time"
                );
                (now, true)
            }
        };

        Ok(Event {
            identity,
            category: string_field(record, "type").unwrap_or(UNKNOWN).to_owned(),
            actor: feed_actor(record).unwrap_or(UNKNOWN).to_owned(),
            occurred_at,
            origin: Origin::PolledFeed,
            payload_summary: self.excerpt(record),
            repo_scope: repo_scope.to_owned(),
            approximate_time,
        })
    }

    fn normalize_webhook(&self, payload: &Value, now: OffsetDateTime) -> Event {
        let category = string_field(payload, "action").unwrap_or(DEFAULT_WEBHOOK_CATEGORY);
        let actor = payload
            .get("sender")
            .and_then(|sender| string_field(sender, "login"))
            .unwrap_or(UNKNOWN);
        let repo_scope = payload
            .get("repository")
            .and_then(|repository| string_field(repository, "full_name"))
            .unwrap_or(UNKNOWN);

        Event {
            identity: Identity::synthesize(),
            category: category.to_owned(),
            actor: actor.to_owned(),
            occurred_at: now,
            origin: Origin::Webhook,
            payload_summary: self.excerpt(payload),
            repo_scope: repo_scope.to_owned(),
            approximate_time: false,
        }
    }

    fn excerpt(&self, body: &Value) -> String {
        let mut text = body.to_string();
        if text.len() > self.excerpt_bytes {
            let mut cut = self.excerpt_bytes;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        text
    }
}

/// Parses an RFC 3339 timestamp and moves it to UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .map(|parsed| parsed.to_offset(UtcOffset::UTC))
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

// The events API nests the actor, older dumps flatten it to a login string.
fn feed_actor(record: &Value) -> Option<&str> {
    match record.get("actor")? {
        Value::String(login) if !login.is_empty() => Some(login),
        actor @ Value::Object(_) => {
            string_field(actor, "login").or_else(|| string_field(actor, "display_login"))
        }
        _ => None,
    }
}
