use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderSettings;
use crate::domain::repository::EventProcessor;
use crate::domain::types::Event;

pub const X_EVENT_ID: &str = "x-hooktrail-event-id";
pub const X_EVENT_TYPE: &str = "x-hooktrail-event-type";

/// Forwards the stored payload to the downstream handler configured for the
/// event's provider. Any transport error or non-2xx reply fails the attempt.
#[derive(Clone)]
pub struct HttpEventProcessor {
    client: reqwest::Client,
    endpoints: Arc<ProviderSettings>,
}

impl HttpEventProcessor {
    pub fn new(endpoints: ProviderSettings, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
        })
    }
}

impl EventProcessor for HttpEventProcessor {
    async fn process(&self, event: &Event) -> Result<(), String> {
        let url = self
            .endpoints
            .get(event.provider)
            .ok_or_else(|| format!("no processor configured for provider {}", event.provider))?;

        let response = self
            .client
            .post(url)
            .header(X_EVENT_ID, event.id.to_string())
            .header(X_EVENT_TYPE, event.event_type.as_str())
            .json(&event.payload)
            .send()
            .await
            .map_err(|e| format!("processor request failed: {e}"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("processor responded with {status}"))
        }
    }
}
