use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct CacheBuster {
    last: u64,
}

impl CacheBuster {
    pub fn next(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }
}
