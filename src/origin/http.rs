//! HTTP origin client

use super::OriginSource;
use crate::config::OriginConfig;
use crate::error::OriginError;
use crate::record::Record;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Origin reached over HTTP GET, one URL per post
pub struct HttpOrigin {
    client: Client,
    endpoint_template: String,
}

impl HttpOrigin {
    pub fn new(config: &OriginConfig) -> Result<Self, OriginError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OriginError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint_template: config.endpoint_template.clone(),
        })
    }

    /// Substitute the id into the endpoint template
    pub fn url_for(&self, id: i64) -> String {
        let mut buf = itoa::Buffer::new();
        let id = buf.format(id);
        if self.endpoint_template.contains("{id}") {
            self.endpoint_template.replace("{id}", id)
        } else {
            self.endpoint_template.replacen("{}", id, 1)
        }
    }
}

fn classify(err: &reqwest::Error) -> OriginError {
    if err.is_timeout() {
        OriginError::Timeout
    } else if err.is_connect() {
        OriginError::Connect(err.to_string())
    } else {
        OriginError::Transport(err.to_string())
    }
}

#[async_trait]
impl OriginSource for HttpOrigin {
    async fn fetch(&self, id: i64) -> Result<Record, OriginError> {
        let url = self.url_for(id);
        debug!(id, url = %url, "Fetching from origin");

        let response = self.client.get(&url).send().await.map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| classify(&e))?;
        let record = Record::from_json(&body).map_err(|e| OriginError::Malformed(e.to_string()))?;

        if record.id != id {
            return Err(OriginError::Malformed(format!(
                "requested id {id}, payload carries id {}",
                record.id
            )));
        }

        Ok(record)
    }
}
