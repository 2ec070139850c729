//! Best-effort result delivery over a live push channel.

use std::sync::Mutex;

use serde_json::Value;

use super::{ChannelError, ConnectionDescriptor};

/// Push-channel abstraction (allows mocking).
pub trait PushChannel: Send + Sync {
    fn send(&self, descriptor: &ConnectionDescriptor, payload: &Value) -> Result<(), ChannelError>;
}

/// Blocking HTTP push channel: POSTs the payload to the channel endpoint's
/// per-connection route.
pub struct HttpPushChannel {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpPushChannel {
    pub fn new(timeout_secs: u64) -> Result<Self, ChannelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

impl PushChannel for HttpPushChannel {
    fn send(&self, descriptor: &ConnectionDescriptor, payload: &Value) -> Result<(), ChannelError> {
        let url = format!(
            "{}/connections/{}",
            descriptor.channel_address.trim_end_matches('/'),
            descriptor.connection_id
        );

        let response = self.client.post(&url).json(payload).send().map_err(|e| {
            if e.is_timeout() {
                ChannelError::Timeout(self.timeout_secs)
            } else {
                ChannelError::Transport(descriptor.channel_address.clone())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            // A 410 here is the well-known "client went away" case
            return Err(ChannelError::Stale {
                connection_id: descriptor.connection_id.clone(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

/// Mock channel for testing — records every payload it delivers.
#[derive(Default)]
pub struct RecordingPushChannel {
    sent: Mutex<Vec<(ConnectionDescriptor, Value)>>,
}

impl RecordingPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(ConnectionDescriptor, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

impl PushChannel for RecordingPushChannel {
    fn send(&self, descriptor: &ConnectionDescriptor, payload: &Value) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((descriptor.clone(), payload.clone()));
        Ok(())
    }
}

/// Mock channel whose every send fails as a stale connection.
pub struct FailingPushChannel;

impl PushChannel for FailingPushChannel {
    fn send(&self, descriptor: &ConnectionDescriptor, _payload: &Value) -> Result<(), ChannelError> {
        Err(ChannelError::Stale {
            connection_id: descriptor.connection_id.clone(),
            status: 410,
        })
    }
}
