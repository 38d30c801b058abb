use std::{
    pin::pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use reqwest::{Client, Response, header::CACHE_CONTROL};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::core::{errors::SessionError, state::FeedSource};

use super::jpeg::JpegFrameAccumulator;

#[derive(Debug, Clone)]
pub struct FeedFault {
    pub generation: u64,
    pub error: SessionError,
}

pub struct FeedPlayer {
    client: Client,
    faults: mpsc::Sender<FeedFault>,
    latest_frame: Arc<Mutex<Option<Bytes>>>,
    cancel_tx: Mutex<Option<watch::Sender<bool>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedPlayer {
    pub fn new(client: Client, faults: mpsc::Sender<FeedFault>) -> Self {
        Self {
            client,
            faults,
            latest_frame: Arc::new(Mutex::new(None)),
            cancel_tx: Mutex::new(None),
        }
    }

    /// Must be called inside a tokio runtime.
    pub fn play(&self, source: &FeedSource) {
        self.stop_reader();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        *lock(&self.cancel_tx) = Some(cancel_tx);

        let reader = StreamReader {
            client: self.client.clone(),
            source: source.clone(),
            latest_frame: self.latest_frame.clone(),
            faults: self.faults.clone(),
        };
        tokio::spawn(reader.run(cancel_rx));
    }

    pub fn clear(&self) {
        self.stop_reader();
        *lock(&self.latest_frame) = None;
    }

    pub fn latest_frame(&self) -> Option<Bytes> {
        lock(&self.latest_frame).clone()
    }

    fn stop_reader(&self) {
        if let Some(cancel_tx) = lock(&self.cancel_tx).take() {
            let _ = cancel_tx.send(true);
        }
    }
}

struct StreamReader {
    client: Client,
    source: FeedSource,
    latest_frame: Arc<Mutex<Option<Bytes>>>,
    faults: mpsc::Sender<FeedFault>,
}

impl StreamReader {
    async fn run(self, mut cancel_rx: watch::Receiver<bool>) {
        let request = self
            .client
            .get(&self.source.url)
            .header(CACHE_CONTROL, "no-cache")
            .send();
        let response = tokio::select! {
            _ = cancel_rx.changed() => return,
            response = request => response,
        };

        let result = match response {
            Ok(response) if response.status().is_success() => {
                self.pump(response, &mut cancel_rx).await
            }
            Ok(response) => Err(format!("stream returned {}", response.status())),
            Err(err) => Err(err.to_string()),
        };

        match result {
            Ok(frames) => debug!(
                generation = self.source.generation,
                frames, "video feed closed"
            ),
            Err(_) if *cancel_rx.borrow() => {}
            Err(reason) => {
                warn!(generation = self.source.generation, "video feed failed: {reason}");
                let fault = FeedFault {
                    generation: self.source.generation,
                    error: SessionError::StreamFault(reason),
                };
                match self.faults.try_send(fault) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("feed fault channel full, dropping fault report")
                    }
                    Err(TrySendError::Closed(_)) => debug!("no listener for feed faults"),
                }
            }
        }
    }

    async fn pump(
        &self,
        response: Response,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<u64, String> {
        info!(url = %self.source.url, "video feed attached");
        let mut stream = pin!(response.bytes_stream());
        let mut frames = JpegFrameAccumulator::new();
        loop {
            tokio::select! {
                _ = cancel_rx.changed() => return Ok(frames.frames()),
                chunk = stream.next() => match chunk {
                    None => return Ok(frames.frames()),
                    Some(Ok(chunk)) => {
                        if let Some(frame) = frames.push_chunk(&chunk) {
                            *lock(&self.latest_frame) = Some(frame);
                        }
                    }
                    Some(Err(err)) => return Err(err.to_string()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        Router,
        http::{StatusCode, header::CONTENT_TYPE},
        routing::get,
    };
    use reqwest::Client;
    use tokio::{sync::mpsc, time::timeout};

    use crate::{
        core::{errors::SessionError, state::FeedSource},
        test_support::serve,
    };

    use super::FeedPlayer;

    fn mjpeg_body() -> Vec<u8> {
        let mut body = Vec::new();
        for payload in [b"first".as_slice(), b"second".as_slice()] {
            body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            body.extend_from_slice(&[0xFF, 0xD8]);
            body.extend_from_slice(payload);
            body.extend_from_slice(&[0xFF, 0xD9, b'\r', b'\n']);
        }
        body
    }

    fn source(base: &str, generation: u64) -> FeedSource {
        FeedSource {
            url: format!("{base}/video_feed?t={generation}"),
            generation,
        }
    }

    #[tokio::test]
    async fn keeps_latest_frame_from_stream() {
        let router = Router::new().route(
            "/video_feed",
            get(|| async {
                (
                    [(CONTENT_TYPE, "multipart/x-mixed-replace; boundary=frame")],
                    mjpeg_body(),
                )
            }),
        );
        let base = serve(router).await;
        let (fault_tx, mut fault_rx) = mpsc::channel(4);
        let player = FeedPlayer::new(Client::new(), fault_tx);

        player.play(&source(&base, 1));

        let newest = b"\xFF\xD8second\xFF\xD9".as_slice();
        let mut frame = None;
        for _ in 0..100 {
            frame = player.latest_frame();
            if frame.as_deref() == Some(newest) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(frame.as_deref(), Some(newest));
        assert!(fault_rx.try_recv().is_err());

        player.clear();
        assert!(player.latest_frame().is_none());
    }

    #[tokio::test]
    async fn failed_stream_reports_fault_for_its_generation() {
        let router = Router::new().route(
            "/video_feed",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(router).await;
        let (fault_tx, mut fault_rx) = mpsc::channel(4);
        let player = FeedPlayer::new(Client::new(), fault_tx);

        player.play(&source(&base, 7));

        let fault = timeout(Duration::from_secs(5), fault_rx.recv())
            .await
            .expect("fault should be reported in time")
            .expect("fault channel should stay open");
        assert_eq!(fault.generation, 7);
        assert!(matches!(fault.error, SessionError::StreamFault(_)));
        assert!(fault.error.to_string().contains("500"));
    }

    #[tokio::test]
    async fn unreachable_stream_reports_fault() {
        let (fault_tx, mut fault_rx) = mpsc::channel(4);
        let player = FeedPlayer::new(Client::new(), fault_tx);

        player.play(&source("http://127.0.0.1:9", 3));

        let fault = timeout(Duration::from_secs(5), fault_rx.recv())
            .await
            .expect("fault should be reported in time")
            .expect("fault channel should stay open");
        assert_eq!(fault.generation, 3);
    }
}
