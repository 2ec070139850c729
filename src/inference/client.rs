//! HTTP client for the hosted text-completion endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::InferenceError;
use crate::config::InferenceSettings;

/// Stop sequence marking end-of-turn in the hosted model's chat template.
pub const END_OF_TURN: &str = "<|end_of_turn|>";

/// Decoding parameters sent with every invocation.
///
/// Classification must be replayable: the same report and config should
/// yield materially the same result, so the pipeline always decodes
/// greedily with a fixed parameter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
    pub max_tokens: u32,
}

impl DecodingParams {
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            top_k: 1,
            top_p: 1.0,
            stop_sequences: vec![END_OF_TURN.to_string()],
            max_tokens: 2048,
        }
    }
}

/// Hosted inference endpoint abstraction (allows mocking).
pub trait InferenceClient: Send + Sync {
    fn invoke(&self, prompt: &str, params: &DecodingParams) -> Result<String, InferenceError>;
}

/// Request body for the endpoint's /invoke route.
#[derive(Serialize)]
struct InvokeRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a DecodingParams,
}

/// Response body from /invoke.
#[derive(Deserialize)]
struct InvokeResponse {
    output_text: String,
}

/// Blocking HTTP client for the inference endpoint.
pub struct HttpInferenceClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpInferenceClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Connection(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        Self::new(&settings.base_url, &settings.model, settings.timeout_secs)
    }
}

impl InferenceClient for HttpInferenceClient {
    fn invoke(&self, prompt: &str, params: &DecodingParams) -> Result<String, InferenceError> {
        let url = format!("{}/invoke", self.base_url);
        let body = InvokeRequest {
            model: &self.model,
            prompt,
            params,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                InferenceError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                InferenceError::Timeout(self.timeout_secs)
            } else {
                InferenceError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InvokeResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.output_text)
    }
}

/// Mock inference client for testing — replays a scripted reply queue and
/// records every prompt it was given.
pub struct MockInferenceClient {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockInferenceClient {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// How many times `invoke` has been called.
    pub fn invocation_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// All prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl InferenceClient for MockInferenceClient {
    fn invoke(&self, prompt: &str, _params: &DecodingParams) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        // The last reply sticks, so single-reply mocks answer every call
        if replies.len() > 1 {
            Ok(replies.pop_front().unwrap_or_default())
        } else {
            replies
                .front()
                .cloned()
                .ok_or_else(|| InferenceError::ResponseParsing("mock reply queue empty".into()))
        }
    }
}

/// Mock client whose every invocation fails with a transport fault.
pub struct FailingInferenceClient;

impl InferenceClient for FailingInferenceClient {
    fn invoke(&self, _prompt: &str, _params: &DecodingParams) -> Result<String, InferenceError> {
        Err(InferenceError::Connection("http://mock-endpoint".into()))
    }
}
