use std::{env, net::SocketAddr, time::Duration};

use anyhow::{Context, bail};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub bind_addr: SocketAddr,
    pub remote_base_url: String,
    pub camera_index: u32,
    pub start_settle: Duration,
    pub feed_retry_backoff: Duration,
    pub feed_retry_max_attempts: u32,
    pub notice_duration: Duration,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "camera-console".to_owned());
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8090".to_owned())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        let remote_base_url = env::var("REMOTE_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:5000".to_owned());
        if !remote_base_url.starts_with("http://") && !remote_base_url.starts_with("https://") {
            bail!("REMOTE_BASE_URL must start with http:// or https://, got {remote_base_url}");
        }

        let camera_index = parse_or("CAMERA_INDEX", 1);
        let start_settle = Duration::from_millis(parse_or("START_SETTLE_MS", 300));
        let feed_retry_backoff = Duration::from_millis(parse_or("FEED_RETRY_BACKOFF_MS", 1000));
        let feed_retry_max_attempts = parse_or("FEED_RETRY_MAX_ATTEMPTS", 10);
        let notice_duration = Duration::from_millis(parse_or("NOTICE_DURATION_MS", 3000));
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "info".to_owned());

        Ok(Self {
            app_name,
            bind_addr,
            remote_base_url,
            camera_index,
            start_settle,
            feed_retry_backoff,
            feed_retry_max_attempts,
            notice_duration,
            log_level,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
