use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::AckError;
use crate::event::{EventData, EventEnvelope};
use crate::response::AckRecord;

/// Delivery seam between the batching engine and the collector.
///
/// Implementations deliver one batch for a single dataset and report one
/// acknowledgment record per event. Tests inject scripted implementations;
/// production uses [`HttpTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_batch(&self, dataset: &str, events: &[EventEnvelope]) -> Vec<AckRecord>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP delivery to a Honeycomb-compatible collector.
///
/// Batches are posted to `{api_host}/1/batch/{dataset}` with the write key
/// in the `X-Honeycomb-Team` header. The collector answers a per-event array
/// of statuses; a batch-level failure maps onto every event in the batch.
pub struct HttpTransport {
    client: reqwest::Client,
    api_host: String,
    write_key: String,
    sample_rate: u32,
}

/// One event in the batch request body.
#[derive(Serialize)]
struct BatchItem<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    samplerate: u32,
    data: &'a EventData,
}

/// Per-event entry in the batch response body.
#[derive(Deserialize)]
struct BatchItemStatus {
    status: u16,
    #[serde(default)]
    error: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy.as_str())
                    .with_context(|| format!("Invalid proxy URL: {proxy}"))?,
            );
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_host: config.api_host.trim_end_matches('/').to_string(),
            write_key: config.write_key.clone(),
            sample_rate: config.sample_rate,
        })
    }

    fn batch_body<'a>(&self, events: &'a [EventEnvelope]) -> Vec<BatchItem<'a>> {
        events
            .iter()
            .map(|envelope| BatchItem {
                time: envelope.timestamp.map(|timestamp| timestamp.to_rfc3339()),
                samplerate: self.sample_rate,
                data: &envelope.data,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_batch(&self, dataset: &str, events: &[EventEnvelope]) -> Vec<AckRecord> {
        let url = format!("{}/1/batch/{}", self.api_host, dataset);
        let body = self.batch_body(events);
        let started = Instant::now();

        let response = match self
            .client
            .post(&url)
            .header("X-Honeycomb-Team", &self.write_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(dataset = %dataset, error = %error, "Batch delivery failed");
                let ack = AckError::new(error.to_string());
                return events
                    .iter()
                    .map(|envelope| AckRecord::error(envelope.correlation_id, ack.clone()))
                    .collect();
            }
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let http_status = response.status();

        // A batch-level rejection (bad write key, unknown dataset) carries no
        // per-event statuses; report the batch status for every event.
        if !http_status.is_success() {
            tracing::warn!(
                dataset = %dataset,
                status = http_status.as_u16(),
                "Collector rejected the batch"
            );
            return events
                .iter()
                .map(|envelope| AckRecord {
                    correlation_id: envelope.correlation_id,
                    status_code: Some(http_status.as_u16()),
                    error: None,
                    duration_ms: Some(duration_ms),
                    body: None,
                })
                .collect();
        }

        let statuses: Vec<BatchItemStatus> = match response.json().await {
            Ok(statuses) => statuses,
            Err(error) => {
                tracing::warn!(dataset = %dataset, error = %error, "Unreadable batch response");
                let ack = AckError::new(error.to_string());
                return events
                    .iter()
                    .map(|envelope| AckRecord::error(envelope.correlation_id, ack.clone()))
                    .collect();
            }
        };

        events
            .iter()
            .enumerate()
            .map(|(index, envelope)| match statuses.get(index) {
                Some(item) => AckRecord {
                    correlation_id: envelope.correlation_id,
                    status_code: Some(item.status),
                    error: item.error.clone().map(AckError::new),
                    duration_ms: Some(duration_ms),
                    body: None,
                },
                None => AckRecord::error(
                    envelope.correlation_id,
                    AckError::new("collector response is missing a status for this event"),
                ),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_body_carries_time_samplerate_and_data() {
        let mut config = ClientConfig::new("key", "dataset");
        config.sample_rate = 4;
        let transport = HttpTransport::new(&config).expect("transport should build");

        let data = json!({ "service_name": "checkout", "timestamp": "2026-05-06T07:08:09Z" })
            .as_object()
            .cloned()
            .unwrap_or_default();
        let envelope = EventEnvelope::new(data, "dataset", None);
        let body = transport.batch_body(std::slice::from_ref(&envelope));

        let serialized = serde_json::to_value(&body).expect("body should serialize");
        assert_eq!(serialized[0]["samplerate"], 4);
        assert_eq!(serialized[0]["time"], "2026-05-06T07:08:09+00:00");
        assert_eq!(serialized[0]["data"]["service_name"], "checkout");
    }

    #[test]
    fn invalid_proxy_is_rejected() {
        let mut config = ClientConfig::new("key", "dataset");
        config.proxy = Some("not a proxy url".to_string());
        assert!(HttpTransport::new(&config).is_err());
    }
}
