use std::{future::Future, panic, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    core::{
        errors::SessionError,
        state::{AnalysisMethod, FeedSource, SessionState, SessionStatus},
    },
    feed::FeedFault,
    remote::{CaptureResult, RemoteCamera},
};

use super::{
    cache_buster::CacheBuster,
    retry::{FeedRetryState, RetryPolicy, wait_or_cancel},
    view::{NoticeLevel, SessionView},
};

const CAPTURE_NEEDS_CAMERA: &str = "Please start the camera first";

#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Pause between the start acknowledgment and attaching the stream.
    pub settle: Duration,
    pub retry: RetryPolicy,
}

impl SessionTiming {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settle: config.start_settle,
            retry: RetryPolicy {
                backoff: config.feed_retry_backoff,
                max_attempts: config.feed_retry_max_attempts,
            },
        }
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            retry: RetryPolicy {
                backoff: Duration::from_millis(1000),
                max_attempts: 10,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Stop,
    Release,
}

#[derive(Debug, Default)]
struct FeedElement {
    source: Option<FeedSource>,
}

#[derive(Debug, Default)]
struct CameraSession {
    state: SessionState,
    method: AnalysisMethod,
    feed: Option<FeedElement>,
    retry: FeedRetryState,
    cache_buster: CacheBuster,
    generation: u64,
    // Requested while `Starting`; applied once the start settles.
    teardown: Option<Teardown>,
}

impl CameraSession {
    fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    fn source(&self) -> Option<&FeedSource> {
        self.feed.as_ref().and_then(|feed| feed.source.as_ref())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.source()
            .is_some_and(|source| source.generation == generation)
    }

    fn assign_source(&mut self, url: String) -> FeedSource {
        self.generation += 1;
        let source = FeedSource {
            url,
            generation: self.generation,
        };
        self.feed.get_or_insert_with(FeedElement::default).source = Some(source.clone());
        source
    }

    fn clear_source(&mut self) {
        if let Some(feed) = self.feed.as_mut() {
            feed.source = None;
        }
    }
}

// Transitions run on their own task: a dropped caller does not abort them
// halfway through `Starting` or `Stopping`.
async fn run_detached<T, F>(transition: F) -> Result<T, SessionError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(transition).await.map_err(|err| {
        if err.is_panic() {
            panic::resume_unwind(err.into_panic());
        }
        SessionError::Interrupted(err.to_string())
    })
}

pub struct CameraSessionController<R: RemoteCamera, V: SessionView> {
    remote: R,
    view: Arc<V>,
    camera_index: u32,
    timing: SessionTiming,
    session: Mutex<CameraSession>,
}

impl<R, V> CameraSessionController<R, V>
where
    R: RemoteCamera + 'static,
    V: SessionView + 'static,
{
    pub fn new(remote: R, view: Arc<V>, camera_index: u32, timing: SessionTiming) -> Self {
        Self {
            remote,
            view,
            camera_index,
            timing,
            session: Mutex::new(CameraSession::default()),
        }
    }

    pub fn view(&self) -> &Arc<V> {
        &self.view
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_active()
    }

    pub async fn status(&self) -> SessionStatus {
        let session = self.session.lock().await;
        SessionStatus {
            state: session.state,
            active: session.is_active(),
            method: session.method,
            feed_source: session.source().cloned(),
            retry_attempts: session.retry.attempts(),
        }
    }

    pub async fn start(self: &Arc<Self>) -> Result<FeedSource, SessionError> {
        let controller = Arc::clone(self);
        run_detached(async move { controller.run_start().await }).await?
    }

    async fn run_start(&self) -> Result<FeedSource, SessionError> {
        {
            let mut session = self.session.lock().await;
            if session.state != SessionState::Idle {
                let err = SessionError::TransitionConflict {
                    state: session.state,
                };
                drop(session);
                warn!("camera start rejected: {err}");
                self.view.notify(NoticeLevel::Error, &format!("Unable to start camera: {err}"));
                return Err(err);
            }
            session.state = SessionState::Starting;
            session.teardown = None;
        }

        self.view.set_start_busy(true);
        self.view.notify(NoticeLevel::Info, "Initializing camera...");
        info!(camera_index = self.camera_index, "requesting remote camera start");

        let ack = match self
            .remote
            .start_camera(self.camera_index)
            .await
            .and_then(|ack| ack.into_result())
        {
            Ok(ack) => ack,
            Err(err) => return Err(self.fail_start(err).await),
        };

        // The stream endpoint is not always serving frames right after the ack.
        sleep(self.timing.settle).await;

        let activated = {
            let mut session = self.session.lock().await;
            match session.teardown.take() {
                Some(teardown) => {
                    session.state = SessionState::Stopping;
                    Err(teardown)
                }
                None => {
                    session.retry.reset();
                    if session.feed.is_none() {
                        self.view.mount_feed();
                    }
                    let cache_buster = session.cache_buster.next();
                    let source = session.assign_source(self.remote.feed_url(cache_buster));
                    session.state = SessionState::Active;
                    self.view.set_feed_source(Some(&source));
                    Ok(source)
                }
            }
        };
        let source = match activated {
            Ok(source) => source,
            Err(teardown) => return Err(self.abandon_start(teardown).await),
        };

        self.view.set_live_visible(true);
        self.view
            .notify(NoticeLevel::Success, "Camera started successfully!");
        self.view.set_start_busy(false);
        info!(url = %source.url, reply = ?ack.message, "camera session active");
        Ok(source)
    }

    async fn fail_start(&self, err: SessionError) -> SessionError {
        error!("error starting camera: {err}");
        {
            let mut session = self.session.lock().await;
            session.state = SessionState::Idle;
            session.teardown = None;
        }
        self.view
            .notify(NoticeLevel::Error, &format!("Unable to start camera: {err}"));
        self.view.set_start_busy(false);
        err
    }

    async fn abandon_start(&self, teardown: Teardown) -> SessionError {
        let reason = match teardown {
            Teardown::Stop => {
                info!("method switched during start, stopping remote camera");
                if let Err(err) = self.remote.stop_camera().await {
                    warn!("error stopping camera: {err}");
                }
                "method switched while the camera was starting"
            }
            Teardown::Release => {
                info!("unloaded during start, releasing remote camera");
                let _ = self.remote.dispatch_release();
                "unloaded while the camera was starting"
            }
        };

        self.session.lock().await.state = SessionState::Idle;
        self.view.set_start_busy(false);
        if teardown == Teardown::Stop {
            self.view.notify(NoticeLevel::Info, "Camera stopped");
        }
        SessionError::Interrupted(reason.to_string())
    }

    pub async fn stop(self: &Arc<Self>) -> bool {
        let controller = Arc::clone(self);
        match run_detached(async move { controller.run_stop().await }).await {
            Ok(stopped) => stopped,
            Err(err) => {
                warn!("camera stop did not finish: {err}");
                false
            }
        }
    }

    async fn run_stop(&self) -> bool {
        {
            let mut session = self.session.lock().await;
            if !session.is_active() {
                return false;
            }
            session.state = SessionState::Stopping;
            session.retry.cancel();
            session.clear_source();
            self.view.set_feed_source(None);
        }

        if let Err(err) = self.remote.stop_camera().await {
            warn!("error stopping camera: {err}");
        }

        self.session.lock().await.state = SessionState::Idle;
        self.view.set_live_visible(false);
        self.view.set_preview_visible(false);
        self.view.notify(NoticeLevel::Info, "Camera stopped");
        info!("camera session stopped");
        true
    }

    pub async fn capture(&self) -> Result<CaptureResult, SessionError> {
        if !self.is_active().await {
            self.view.notify(NoticeLevel::Error, CAPTURE_NEEDS_CAMERA);
            return Err(SessionError::PreconditionViolation(CAPTURE_NEEDS_CAMERA));
        }

        self.view.notify(NoticeLevel::Info, "Capturing image...");
        match self.remote.capture_frame().await {
            Ok(result) => {
                self.view.show_capture(&result);
                Ok(result)
            }
            Err(err) => {
                error!("error capturing image: {err}");
                self.view
                    .notify(NoticeLevel::Error, &format!("Failed to capture image: {err}"));
                Err(err)
            }
        }
    }

    pub fn retake(&self) {
        self.view.set_preview_visible(false);
        self.view.set_live_visible(true);
    }

    /// Leaving the camera method while a start is in flight stops the camera
    /// as soon as that start settles. Returns true if a session was or will be
    /// stopped.
    pub async fn select_method(self: &Arc<Self>, method: AnalysisMethod) -> bool {
        let leaving_camera = method != AnalysisMethod::Camera;
        {
            let mut session = self.session.lock().await;
            session.method = method;
            match session.state {
                SessionState::Active if leaving_camera => {}
                SessionState::Starting if leaving_camera => {
                    session.teardown.get_or_insert(Teardown::Stop);
                    info!(?method, "method switched during start, stop deferred");
                    return true;
                }
                SessionState::Starting => {
                    if session.teardown == Some(Teardown::Stop) {
                        session.teardown = None;
                    }
                    return false;
                }
                _ => return false,
            }
        }

        info!(?method, "method switched away from camera, stopping session");
        self.stop().await
    }

    pub async fn unload(&self) -> Option<JoinHandle<()>> {
        let mut session = self.session.lock().await;
        match session.state {
            SessionState::Active => {}
            SessionState::Starting => {
                session.teardown = Some(Teardown::Release);
                info!("unload during start, release deferred");
                return None;
            }
            SessionState::Idle | SessionState::Stopping => return None,
        }

        let beacon = self.remote.dispatch_release();
        session.retry.cancel();
        session.clear_source();
        session.state = SessionState::Idle;
        self.view.set_feed_source(None);
        info!("unload released remote camera");
        Some(beacon)
    }

    /// Called by the feed surface when `generation` failed to load. Schedules
    /// at most one reattach per failed source. Returns true if one was scheduled.
    pub async fn report_feed_error(self: &Arc<Self>, generation: u64) -> bool {
        let cancel_rx = {
            let mut session = self.session.lock().await;
            if !session.is_active()
                || !session.is_current(generation)
                || session.retry.is_pending_for(generation)
            {
                debug!(generation, "ignoring stale video feed error");
                return false;
            }

            error!(generation, "video feed error");
            let scheduled = session.retry.schedule(&self.timing.retry, generation);
            match scheduled {
                Some(cancel_rx) => cancel_rx,
                None => {
                    warn!(
                        attempts = session.retry.attempts(),
                        "video feed retries exhausted"
                    );
                    drop(session);
                    self.view.notify(NoticeLevel::Error, "Video feed unavailable");
                    return false;
                }
            }
        };

        self.view
            .notify(NoticeLevel::Error, "Video feed error. Retrying...");
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.reattach_feed(generation, cancel_rx).await;
        });
        true
    }

    pub async fn forward_feed_faults(self: Arc<Self>, mut faults: mpsc::Receiver<FeedFault>) {
        while let Some(fault) = faults.recv().await {
            warn!(generation = fault.generation, "{}", fault.error);
            self.report_feed_error(fault.generation).await;
        }
        debug!("feed fault channel closed");
    }

    async fn reattach_feed(&self, failed: u64, cancel_rx: watch::Receiver<bool>) {
        if !wait_or_cancel(self.timing.retry.backoff, cancel_rx).await {
            debug!(generation = failed, "video feed retry cancelled");
            return;
        }

        let mut session = self.session.lock().await;
        if !session.retry.is_pending_for(failed) {
            return;
        }
        session.retry.finish();
        if !session.is_active() || !session.is_current(failed) {
            return;
        }

        let cache_buster = session.cache_buster.next();
        let source = session.assign_source(self.remote.feed_url(cache_buster));
        self.view.set_feed_source(Some(&source));
        info!(
            attempt = session.retry.attempts(),
            url = %source.url,
            "reattaching video feed"
        );
    }
}
