use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::errors::SessionError;

use super::traits::{CaptureResult, DEFAULT_START_FAILURE, RemoteCamera, StartAck};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct HttpRemoteCamera {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct StartCameraRequest {
    camera_index: u32,
}

impl HttpRemoteCamera {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        // Control calls carry no overall timeout; only connecting is bounded.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed to build remote camera http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RemoteCamera for HttpRemoteCamera {
    async fn start_camera(&self, camera_index: u32) -> Result<StartAck, SessionError> {
        let response = self
            .client
            .post(self.endpoint("/start_camera"))
            .json(&StartCameraRequest { camera_index })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        let ack: StartAck = serde_json::from_slice(&body).map_err(|err| {
            warn!(%status, "unreadable /start_camera reply: {err}");
            SessionError::RemoteRejection(DEFAULT_START_FAILURE.to_owned())
        })?;

        debug!(%status, reply_status = %ack.status, "camera start response");
        Ok(ack)
    }

    async fn stop_camera(&self) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.endpoint("/stop_camera"))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "remote reported stop failure");
        }
        Ok(())
    }

    async fn capture_frame(&self) -> Result<CaptureResult, SessionError> {
        let response = self
            .client
            .post(self.endpoint("/capture_frame"))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body("")
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("text/html; charset=utf-8")
            .to_owned();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SessionError::RemoteRejection(format!(
                "capture_frame returned {status}"
            )));
        }

        info!(%status, bytes = body.len(), "capture page received");
        Ok(CaptureResult {
            status: status.as_u16(),
            content_type,
            body,
        })
    }

    fn dispatch_release(&self) -> JoinHandle<()> {
        let request = self.client.post(self.endpoint("/stop_camera"));
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => debug!(status = %response.status(), "release beacon delivered"),
                Err(err) => warn!("release beacon failed: {err}"),
            }
        })
    }

    fn feed_url(&self, cache_buster: u64) -> String {
        format!("{}/video_feed?t={cache_buster}", self.base_url)
    }
}
