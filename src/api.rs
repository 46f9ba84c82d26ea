use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChatError;
use crate::location::Location;
use crate::reply::{parse_reply, BackendResponse};

/// Body of `POST /api/chat`. Coordinates are sent as `null` while unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl ChatRequest {
    pub fn new(message: &str, history: Vec<HistoryEntry>, location: Option<Location>) -> Self {
        Self {
            message: message.to_string(),
            history,
            latitude: location.map(|l| l.lat),
            longitude: location.map(|l| l.lon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub api: Option<String>,
    pub model: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ChatError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Sends one chat message and classifies the reply.
    pub async fn send(&self, request: &ChatRequest) -> Result<BackendResponse, ChatError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(
            %url,
            chars = request.message.chars().count(),
            located = request.latitude.is_some(),
            "sending chat message"
        );

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            // The status is what matters; an unreadable body is left empty
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        let reply = parse_reply(&body)?;
        debug!(shape = reply_shape(&reply), "reply classified");
        Ok(reply)
    }

    pub async fn health(&self) -> Result<HealthStatus, ChatError> {
        let url = format!("{}/api/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn reply_shape(reply: &BackendResponse) -> &'static str {
    match reply {
        BackendResponse::Text { .. } => "text",
        BackendResponse::Stations { .. } => "stations",
        BackendResponse::Parkings { .. } => "parkings",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_location_sends_nulls() {
        let request = ChatRequest::new("prix gazole", Vec::new(), None);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"message": "prix gazole", "history": [], "latitude": null, "longitude": null})
        );
    }

    #[test]
    fn test_request_with_location() {
        let here = Location { lat: 48.1173, lon: -1.6778 };
        let request = ChatRequest::new("parkings", Vec::new(), Some(here));
        assert_eq!(request.latitude, Some(48.1173));
        assert_eq!(request.longitude, Some(-1.6778));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ChatClient::new("http://127.0.0.1:8000/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }
}
