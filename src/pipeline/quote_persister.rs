use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::storage::{DynamicBlobStore, JSON_CONTENT_TYPE};
use crate::types::queue_message::QueueMessage;

pub const REQUIRED_FIELDS: [&str; 4] = ["ticker", "timestamp", "price", "currency"];

const WRITE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%6f";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("message body is not a JSON object: {0}")]
    InvalidJson(String),

    #[error("missing required fields in message: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("field {0} must be a non-empty string")]
    InvalidField(&'static str),

    #[error("failed to store {key}: {reason}")]
    Storage { key: String, reason: String },
}

/// The batch stopped at `message_id`; the first `persisted` messages were already written.
#[derive(Debug, Error)]
#[error("batch failed at message {message_id} after {persisted} persisted: {error}")]
pub struct BatchFailure {
    pub message_id: String,
    pub persisted: usize,
    pub error: PersistError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub keys: Vec<String>,
}

impl BatchReport {
    pub fn persisted(&self) -> usize {
        self.keys.len()
    }
}

/// Writes each queued quote to the blob store as its own object.
pub struct QuotePersister {
    store: DynamicBlobStore,
    prefix: String,
    last_write_micros: Option<i64>,
}

impl QuotePersister {
    pub fn new(store: DynamicBlobStore, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            last_write_micros: None,
        }
    }

    /// Persists messages in order and stops at the first failure. Messages written before the
    /// failure stay written; the caller is expected to leave the whole batch for redelivery.
    pub async fn process_batch(
        &mut self,
        messages: &[QueueMessage],
    ) -> Result<BatchReport, BatchFailure> {
        let mut report = BatchReport::default();

        for message in messages {
            match self.persist(message).await {
                Ok(key) => report.keys.push(key),
                Err(error) => {
                    error!(
                        message_id = %message.id,
                        persisted = report.persisted(),
                        error = %error,
                        "failed to persist message"
                    );

                    return Err(BatchFailure {
                        message_id: message.id.clone(),
                        persisted: report.persisted(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn persist(&mut self, message: &QueueMessage) -> Result<String, PersistError> {
        let fields = parse_body(&message.body)?;
        let ticker = string_field(&fields, "ticker")?;
        let timestamp = string_field(&fields, "timestamp")?;

        let write_time = self.next_write_time();
        let key = object_key(&self.prefix, ticker, timestamp, write_time);

        self.store
            .put_object(&key, message.body.as_bytes().to_vec(), JSON_CONTENT_TYPE)
            .await
            .map_err(|e| PersistError::Storage {
                key: key.clone(),
                reason: format!("{e:#}"),
            })?;

        info!(%ticker, %timestamp, %key, "persisted quote");

        Ok(key)
    }

    /// Wall-clock time truncated to microseconds, bumped so it always moves forward.
    fn next_write_time(&mut self) -> DateTime<Utc> {
        let micros = next_write_micros(self.last_write_micros, Utc::now().timestamp_micros());
        self.last_write_micros = Some(micros);

        DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }
}

fn next_write_micros(last: Option<i64>, now: i64) -> i64 {
    match last {
        Some(last) if now <= last => last + 1,
        _ => now,
    }
}

fn parse_body(body: &str) -> Result<Map<String, Value>, PersistError> {
    let fields = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => return Err(PersistError::InvalidJson(format!("got {other}"))),
        Err(e) => return Err(PersistError::InvalidJson(e.to_string())),
    };

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !fields.contains_key(*field))
        .collect();

    if !missing.is_empty() {
        return Err(PersistError::MissingFields(missing));
    }

    Ok(fields)
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, PersistError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or(PersistError::InvalidField(name))
}

pub fn object_key(prefix: &str, ticker: &str, timestamp: &str, write_time: DateTime<Utc>) -> String {
    format!(
        "{prefix}/{ticker}/{timestamp}_{}.json",
        write_time.format(WRITE_TIME_FORMAT)
    )
}
