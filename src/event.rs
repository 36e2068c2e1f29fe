use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Structured event payload: a mapping of field name to JSON value.
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// Payload field names accepted as an explicit event timestamp, in
/// precedence order: the first field present wins.
const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "Timestamp", "@timestamp"];

/// Payload field that overrides the client's dataset for a single event.
const DATASET_FIELD: &str = "dataset";

/// One event as handed to the transmission engine: the raw payload plus the
/// resolved timestamp, the resolved dataset, and the correlation metadata
/// used to match the later acknowledgment. `correlation_id` is `None` only
/// on the untracked fast path, where no acknowledgment will be awaited.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub data: EventData,
    /// Explicit timestamp from the payload, if one was present and parsed.
    /// Left empty otherwise; the transmission stamps the send time itself.
    pub timestamp: Option<DateTime<Utc>>,
    pub dataset: String,
    pub correlation_id: Option<Uuid>,
}

impl EventEnvelope {
    pub fn new(data: EventData, default_dataset: &str, correlation_id: Option<Uuid>) -> Self {
        let timestamp = extract_timestamp(&data);
        let dataset = data
            .get(DATASET_FIELD)
            .and_then(|value| value.as_str())
            .unwrap_or(default_dataset)
            .to_string();
        Self {
            data,
            timestamp,
            dataset,
            correlation_id,
        }
    }
}

/// Pulls an explicit timestamp out of the payload, honoring the field
/// precedence above. A present-but-unparseable value does not fall through
/// to the next field; it defers to the transmission's default stamping.
fn extract_timestamp(data: &EventData) -> Option<DateTime<Utc>> {
    let (field, value) = TIMESTAMP_FIELDS
        .iter()
        .find_map(|field| data.get(*field).map(|value| (*field, value)))?;

    match value.as_str().map(DateTime::parse_from_rfc3339) {
        Some(Ok(parsed)) => Some(parsed.with_timezone(&Utc)),
        _ => {
            tracing::debug!(
                field = %field,
                "Explicit timestamp field is not an RFC 3339 string, using send time"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> EventData {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn lowercase_timestamp_takes_precedence() {
        let data = payload(json!({
            "timestamp": "2026-01-02T03:04:05Z",
            "Timestamp": "2020-01-01T00:00:00Z",
            "@timestamp": "2010-01-01T00:00:00Z",
        }));
        let parsed = extract_timestamp(&data).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-02T03:04:05+00:00");
    }

    #[test]
    fn at_timestamp_is_the_last_fallback() {
        let data = payload(json!({ "@timestamp": "2026-03-04T05:06:07Z" }));
        let parsed = extract_timestamp(&data).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-04T05:06:07+00:00");
    }

    #[test]
    fn missing_timestamp_defers_to_transmission() {
        let data = payload(json!({ "service_name": "checkout" }));
        assert!(extract_timestamp(&data).is_none());
    }

    #[test]
    fn unparseable_timestamp_defers_to_transmission() {
        let data = payload(json!({ "timestamp": "yesterday-ish" }));
        assert!(extract_timestamp(&data).is_none());
    }

    #[test]
    fn dataset_field_overrides_default() {
        let data = payload(json!({ "dataset": "per-event-dataset" }));
        let envelope = EventEnvelope::new(data, "default-dataset", None);
        assert_eq!(envelope.dataset, "per-event-dataset");

        let envelope = EventEnvelope::new(payload(json!({})), "default-dataset", None);
        assert_eq!(envelope.dataset, "default-dataset");
    }
}
