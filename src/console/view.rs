use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    core::state::FeedSource,
    feed::FeedPlayer,
    remote::CaptureResult,
    session::{NoticeLevel, SessionView},
};

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    #[serde(skip)]
    expires_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiSnapshot {
    pub start_busy: bool,
    pub live_visible: bool,
    pub preview_visible: bool,
    pub feed_mounted: bool,
    pub feed_url: Option<String>,
    pub has_capture: bool,
}

#[derive(Default)]
struct UiState {
    snapshot: UiSnapshot,
    notice: Option<Notice>,
    capture: Option<CaptureResult>,
}

pub struct ConsoleView {
    ui: Mutex<UiState>,
    notice_duration: Duration,
    player: FeedPlayer,
}

impl ConsoleView {
    pub fn new(player: FeedPlayer, notice_duration: Duration) -> Self {
        Self {
            ui: Mutex::new(UiState::default()),
            notice_duration,
            player,
        }
    }

    fn ui(&self) -> MutexGuard<'_, UiState> {
        self.ui.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.ui().snapshot.clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        let mut ui = self.ui();
        if ui
            .notice
            .as_ref()
            .is_some_and(|notice| Instant::now() >= notice.expires_at)
        {
            ui.notice = None;
        }
        ui.notice.clone()
    }

    pub fn capture(&self) -> Option<CaptureResult> {
        self.ui().capture.clone()
    }

    pub fn latest_frame(&self) -> Option<Bytes> {
        self.player.latest_frame()
    }
}

impl SessionView for ConsoleView {
    fn set_start_busy(&self, busy: bool) {
        self.ui().snapshot.start_busy = busy;
    }

    fn set_live_visible(&self, visible: bool) {
        self.ui().snapshot.live_visible = visible;
    }

    fn set_preview_visible(&self, visible: bool) {
        self.ui().snapshot.preview_visible = visible;
    }

    fn show_capture(&self, result: &CaptureResult) {
        let mut ui = self.ui();
        ui.capture = Some(result.clone());
        ui.snapshot.has_capture = true;
        ui.snapshot.preview_visible = true;
        ui.snapshot.live_visible = false;
    }

    fn mount_feed(&self) {
        self.ui().snapshot.feed_mounted = true;
    }

    fn set_feed_source(&self, source: Option<&FeedSource>) {
        self.ui().snapshot.feed_url = source.map(|source| source.url.clone());
        match source {
            Some(source) => self.player.play(source),
            None => self.player.clear(),
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => warn!(notice = %message, "error notice shown"),
            NoticeLevel::Info | NoticeLevel::Success => info!(notice = %message, "notice shown"),
        }
        self.ui().notice = Some(Notice {
            level,
            message: message.to_owned(),
            expires_at: Instant::now() + self.notice_duration,
        });
    }
}
