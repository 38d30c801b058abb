use std::time::Duration;

use tokio::{sync::watch, time::sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// Zero means retry forever.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }
}

#[derive(Debug, Default)]
pub struct FeedRetryState {
    attempts: u32,
    pending_for: Option<u64>,
    cancel_tx: Option<watch::Sender<bool>>,
}

impl FeedRetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_pending_for(&self, generation: u64) -> bool {
        self.pending_for == Some(generation)
    }

    /// `None` once the policy is exhausted.
    pub fn schedule(
        &mut self,
        policy: &RetryPolicy,
        generation: u64,
    ) -> Option<watch::Receiver<bool>> {
        let attempt = self.attempts + 1;
        if !policy.allows(attempt) {
            return None;
        }

        self.cancel();
        self.attempts = attempt;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_tx = Some(cancel_tx);
        self.pending_for = Some(generation);
        Some(cancel_rx)
    }

    pub fn cancel(&mut self) -> bool {
        self.pending_for = None;
        match self.cancel_tx.take() {
            Some(cancel_tx) => {
                let _ = cancel_tx.send(true);
                true
            }
            None => false,
        }
    }

    pub fn finish(&mut self) {
        self.pending_for = None;
        self.cancel_tx = None;
    }

    pub fn reset(&mut self) {
        self.cancel();
        self.attempts = 0;
    }
}

pub async fn wait_or_cancel(backoff: Duration, mut cancel_rx: watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(backoff) => !*cancel_rx.borrow(),
        _ = cancel_rx.changed() => false,
    }
}
