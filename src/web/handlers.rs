use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    app_state::{AppState, ConsoleStatus},
    core::{errors::AppError, state::AnalysisMethod},
    remote::CaptureResult,
};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    app: String,
}

#[derive(Deserialize)]
pub struct MethodRequest {
    method: AnalysisMethod,
}

pub async fn root() -> Redirect {
    Redirect::to("/static/index.html")
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app: state.config.app_name.clone(),
    })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ConsoleStatus> {
    Json(state.console_status().await)
}

pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<ConsoleStatus>, AppError> {
    state.controller.start().await?;
    Ok(Json(state.console_status().await))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<ConsoleStatus> {
    if !state.controller.stop().await {
        info!("stop requested without a live session");
    }
    Json(state.console_status().await)
}

pub async fn capture(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let page = state.controller.capture().await?;
    capture_response(page)
}

pub async fn preview(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let Some(page) = state.view().capture() else {
        return Err(AppError::new(StatusCode::NOT_FOUND, "nothing captured yet"));
    };
    capture_response(page)
}

fn capture_response(page: CaptureResult) -> Result<Response, AppError> {
    let content_type = HeaderValue::from_str(&page.content_type)
        .map_err(|err| AppError::internal(format!("invalid capture content type: {err}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok((StatusCode::OK, headers, page.body).into_response())
}

pub async fn retake(State(state): State<Arc<AppState>>) -> Json<ConsoleStatus> {
    state.controller.retake();
    Json(state.console_status().await)
}

pub async fn select_method(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MethodRequest>,
) -> Json<ConsoleStatus> {
    state.controller.select_method(payload.method).await;
    Json(state.console_status().await)
}

pub async fn frame(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let Some(frame) = state.view().latest_frame() else {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "no video frame received yet; start the camera and retry",
        ));
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok((StatusCode::OK, headers, frame).into_response())
}
