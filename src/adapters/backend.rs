//! HTTP client for the assistant backend.
//!
//! Endpoint: POST /process-voice
//! Request:  {"text": "..."}
//! Reply:    {"response": "..."} or {"error": "..."}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::VoiceError;
use crate::domain::AssistantMessage;

use super::ResponseSource;

/// Default backend route
pub const PROCESS_VOICE_PATH: &str = "/process-voice";

/// Request body
#[derive(Debug, Serialize)]
struct ProcessVoiceRequest<'a> {
    text: &'a str,
}

/// Reply body; exactly one field is expected to be set
#[derive(Debug, Default, Deserialize)]
struct ProcessVoiceResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Backend client over HTTP
pub struct HttpResponseSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpResponseSource {
    /// Create a client for `base_url` + `path`
    pub fn new(base_url: &str, path: &str) -> Self {
        let endpoint = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    /// Full URL requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Map an HTTP status and body to a reply or a typed failure
pub fn interpret_response(status: u16, body: &str) -> Result<AssistantMessage, VoiceError> {
    if !(200..300).contains(&status) {
        return Err(VoiceError::Server { status });
    }

    let parsed: ProcessVoiceResponse = serde_json::from_str(body)
        .map_err(|_| VoiceError::application("Malformed response from server"))?;

    if let Some(message) = parsed.error.filter(|e| !e.trim().is_empty()) {
        return Err(VoiceError::Application { message });
    }

    parsed
        .response
        .and_then(AssistantMessage::new)
        .ok_or_else(|| VoiceError::application("Empty response from server"))
}

#[async_trait]
impl ResponseSource for HttpResponseSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, text: &str) -> Result<AssistantMessage, VoiceError> {
        if text.trim().is_empty() {
            return Err(VoiceError::application("No input provided"));
        }

        debug!(endpoint = %self.endpoint, chars = text.len(), "Sending transcript");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ProcessVoiceRequest { text })
            .send()
            .await
            .map_err(|e| VoiceError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| VoiceError::Network(e.to_string()))?;

        let message = interpret_response(status, &body)?;
        info!(status, chars = message.as_str().len(), "Backend replied");
        Ok(message)
    }
}
