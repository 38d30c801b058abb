use std::sync::Arc;

use serde::Serialize;

use crate::{
    config::AppConfig,
    console::{ConsoleView, Notice, UiSnapshot},
    core::state::SessionStatus,
    remote::http::HttpRemoteCamera,
    session::CameraSessionController,
};

pub type ConsoleController = CameraSessionController<HttpRemoteCamera, ConsoleView>;

pub struct AppState {
    pub config: AppConfig,
    pub controller: Arc<ConsoleController>,
}

#[derive(Debug, Serialize)]
pub struct ConsoleStatus {
    pub session: SessionStatus,
    pub ui: UiSnapshot,
    pub notice: Option<Notice>,
}

impl AppState {
    pub fn new(config: AppConfig, controller: Arc<ConsoleController>) -> Self {
        Self { config, controller }
    }

    pub fn view(&self) -> &ConsoleView {
        self.controller.view()
    }

    pub async fn console_status(&self) -> ConsoleStatus {
        ConsoleStatus {
            session: self.controller.status().await,
            ui: self.view().snapshot(),
            notice: self.view().notice(),
        }
    }
}
