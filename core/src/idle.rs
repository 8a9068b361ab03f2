//! Inactivity deadline shared by a request and its upload body.
//!
//! # Design
//! The idle timeout must only fire when nothing moves. While a transport is
//! still consuming a streamed request body, `send` may legitimately run far
//! longer than the timeout. The body stream therefore records activity on
//! every chunk it hands out, and `IdleTimer::run` keeps re-arming its sleep
//! until a full idle period passes with no recorded activity.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{sleep_until, Instant};

use crate::http::BodyStream;

#[derive(Debug, Clone)]
pub(crate) struct IdleTimer {
    idle: Duration,
    last_activity: Arc<Mutex<Instant>>,
}

impl IdleTimer {
    pub(crate) fn new(idle: Duration) -> Self {
        Self {
            idle,
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub(crate) fn touch(&self) {
        let mut last = self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Instant::now();
    }

    fn deadline(&self) -> Instant {
        let last = *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        last + self.idle
    }

    /// Wrap an upload body so each chunk pulled by the transport counts as
    /// activity.
    pub(crate) fn watch_body(&self, body: BodyStream) -> BodyStream {
        let timer = self.clone();
        Box::pin(body.inspect(move |_| timer.touch()))
    }

    /// Drive `fut` to completion, or return `None` once a whole idle period
    /// passes without activity.
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            let deadline = self.deadline();
            tokio::select! {
                output = &mut fut => return Some(output),
                _ = sleep_until(deadline) => {
                    if Instant::now() >= self.deadline() {
                        return None;
                    }
                }
            }
        }
    }
}
