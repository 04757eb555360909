use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use time::Duration;
use tracing::{info, instrument, warn};

use crate::api::ActivityError;
use crate::event::Event;
use crate::normalizer::{Normalizer, RawRecord};
use crate::store::EventStore;
use crate::time::TimeSource;

pub const DEFAULT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub new_count: usize,
    /// Records dropped by the normalizer
    pub skipped: usize,
    pub total_count: usize,
    /// Leading newly admitted events, in batch order
    pub sample: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReceipt {
    pub event: Event,
    pub admitted: bool,
}

/// Drives both ingestion paths against one shared store. Cheap to clone, every
/// clone talks to the same store.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn EventStore + Send + Sync>,
    timesource: Arc<dyn TimeSource + Send + Sync>,
    normalizer: Normalizer,
    window: Duration,
    sample_size: usize,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn EventStore + Send + Sync>,
        timesource: Arc<dyn TimeSource + Send + Sync>,
        normalizer: Normalizer,
        window: Duration,
        sample_size: usize,
    ) -> Self {
        Self {
            store,
            timesource,
            normalizer,
            window,
            sample_size,
        }
    }

    /// Ingests one fetched feed batch. A defective record is skipped; only a
    /// batch that is not a sequence fails the cycle.
    #[instrument(skip_all, fields(repo = repo_scope))]
    pub fn poll_cycle(
        &self,
        repo_scope: &str,
        raw_batch: &Value,
    ) -> Result<PollSummary, ActivityError> {
        let records = raw_batch.as_array().ok_or_else(|| {
            ActivityError::InvalidFeedBatch(format!(
                "expected a list of events, got {}",
                kind(raw_batch)
            ))
        })?;

        let now = self.timesource.current_time();
        let mut new_count = 0;
        let mut skipped = 0;
        let mut sample = Vec::with_capacity(self.sample_size.min(records.len()));

        for record in records {
            let event = match self
                .normalizer
                .normalize(RawRecord::Feed { record, repo_scope }, now)
            {
                Ok(event) => event,
                Err(err) => {
                    warn!("skipping feed record: {}", err);
                    skipped += 1;
                    continue;
                }
            };

            let candidate = (sample.len() < self.sample_size).then(|| event.clone());
            if self.store.admit(event).admitted {
                new_count += 1;
                sample.extend(candidate);
            }
        }

        if skipped > 0 {
            counter!("activity_records_skipped_total").increment(skipped as u64);
        }

        let summary = PollSummary {
            new_count,
            skipped,
            total_count: self.store.count(),
            sample,
        };
        info!(
            batch_size = records.len(),
            new_events = summary.new_count,
            skipped = summary.skipped,
            total_events = summary.total_count,
            "poll cycle complete"
        );
        Ok(summary)
    }

    /// Ingests one webhook delivery. Any JSON object is accepted; the receipt
    /// is returned even when the identity was already present.
    #[instrument(skip_all)]
    pub fn accept_webhook(&self, raw_payload: &Value) -> Result<WebhookReceipt, ActivityError> {
        if !raw_payload.is_object() {
            return Err(ActivityError::InvalidWebhookBody(format!(
                "expected a JSON object, got {}",
                kind(raw_payload)
            )));
        }

        let event = self.normalizer.normalize(
            RawRecord::Webhook {
                payload: raw_payload,
            },
            self.timesource.current_time(),
        )?;
        let admission = self.store.admit(event.clone());

        info!(
            id = %event.identity,
            category = event.category.as_str(),
            repo = event.repo_scope.as_str(),
            admitted = admission.admitted,
            "webhook received"
        );

        Ok(WebhookReceipt {
            event,
            admitted: admission.admitted,
        })
    }

    /// Events inside the trailing window, newest first.
    pub fn recent(&self) -> Vec<Event> {
        self.store
            .query_window(self.timesource.current_time(), self.window)
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn clear(&self) -> usize {
        let removed = self.store.clear();
        info!(removed, "store cleared");
        removed
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
