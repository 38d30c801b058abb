pub mod cache_buster;
pub mod controller;
pub mod retry;
pub mod view;

pub use controller::{CameraSessionController, SessionTiming};
pub use view::{NoticeLevel, SessionView};
