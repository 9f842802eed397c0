//! The one scheduler that drives session countdowns.
//!
//! A `SessionTicker` owns a tokio task that emits a `TickSignal` per period.
//! The receiver applies each signal with `SessionWorkflowService::tick`.
//! Dropping the ticker aborts the task, so no timer outlives its session.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

const CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSignal {
    /// 1-based count of signals sent by this ticker.
    pub sequence: u64,
}

#[derive(Debug)]
pub struct SessionTicker {
    handle: JoinHandle<()>,
    period: Duration,
}

impl SessionTicker {
    /// Spawn a ticker firing every `period`, the first time one period from now.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(period: Duration) -> (Self, mpsc::Receiver<TickSignal>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            let mut sequence = 0_u64;
            loop {
                interval.tick().await;
                sequence += 1;
                if tx.send(TickSignal { sequence }).await.is_err() {
                    break;
                }
            }
        });
        (Self { handle, period }, rx)
    }

    /// One-second ticker, the granularity of every countdown.
    #[must_use]
    pub fn every_second() -> (Self, mpsc::Receiver<TickSignal>) {
        Self::start(Duration::from_secs(1))
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
