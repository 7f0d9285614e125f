//! Owned periodic timer

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Periodic ticks owned by one component. Stopped explicitly or on drop.
pub struct ScopedTicker {
    period: Duration,
    task: Option<JoinHandle<()>>,
    ticks: Option<mpsc::Receiver<u64>>,
}

impl ScopedTicker {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None, ticks: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Starts ticking; the first tick fires one period from now. Restarts a running ticker.
    pub fn start(&mut self) {
        self.stop();

        // Unconsumed ticks coalesce into one.
        let (tx, rx) = mpsc::channel(1);
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut count = 0u64;
            loop {
                interval.tick().await;
                count += 1;
                match tx.try_send(count) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });

        debug!("Ticker started every {:?}", period);
        self.task = Some(task);
        self.ticks = Some(rx);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Ticker stopped");
        }
        self.ticks = None;
    }

    /// Next tick number, `None` once stopped.
    pub async fn tick(&mut self) -> Option<u64> {
        self.ticks.as_mut()?.recv().await
    }
}

impl Drop for ScopedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
