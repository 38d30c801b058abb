use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::core::errors::SessionError;

pub const DEFAULT_START_FAILURE: &str = "Failed to start camera";

/// Body of a `/start_camera` reply. The service answers
/// `{"status": "success" | "error", "message": ...}` on every status code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartAck {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl StartAck {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn into_result(self) -> Result<Self, SessionError> {
        if self.is_success() {
            return Ok(self);
        }
        let reason = self
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_START_FAILURE.to_owned());
        Err(SessionError::RemoteRejection(reason))
    }
}

/// Page rendered by the remote service for a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

#[async_trait]
pub trait RemoteCamera: Send + Sync {
    async fn start_camera(&self, camera_index: u32) -> Result<StartAck, SessionError>;
    async fn stop_camera(&self) -> Result<(), SessionError>;
    async fn capture_frame(&self) -> Result<CaptureResult, SessionError>;
    /// Fire-and-forget release of the remote camera. Must not block the caller.
    fn dispatch_release(&self) -> JoinHandle<()>;
    fn feed_url(&self, cache_buster: u64) -> String;
}
