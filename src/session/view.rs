use serde::Serialize;

use crate::{core::state::FeedSource, remote::CaptureResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

pub trait SessionView: Send + Sync {
    fn set_start_busy(&self, busy: bool);
    fn set_live_visible(&self, visible: bool);
    fn set_preview_visible(&self, visible: bool);
    fn show_capture(&self, result: &CaptureResult);
    fn mount_feed(&self);
    fn set_feed_source(&self, source: Option<&FeedSource>);
    fn notify(&self, level: NoticeLevel, message: &str);
}
