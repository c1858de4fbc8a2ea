//! Download throughput metering
//!
//! While a FETCH is in flight, a one-second ticker reports how many
//! messages and bytes have arrived and the rate so far. Aborting the
//! ticker is an expected cancellation, never an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug)]
pub struct FetchTimer {
    bytes: Arc<AtomicU64>,
    messages: Arc<AtomicU64>,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    started_at: Instant,
    bytes_start: u64,
    ticker: JoinHandle<()>,
}

impl FetchTimer {
    /// `bytes` is the transport's read counter.
    #[must_use]
    pub fn new(bytes: Arc<AtomicU64>) -> Self {
        Self {
            bytes,
            messages: Arc::new(AtomicU64::new(0)),
            running: None,
        }
    }

    /// Shared view of the completed-message counter for the parser
    /// adapter.
    #[must_use]
    pub fn messages_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.messages)
    }

    #[must_use]
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn increase_messages(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall-clock and byte baselines and arm the ticker.
    pub fn start(&mut self) {
        self.stop_ticker();
        let started_at = Instant::now();
        let bytes_start = self.bytes.load(Ordering::Relaxed);
        let bytes = Arc::clone(&self.bytes);
        let messages = Arc::clone(&self.messages);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + Duration::from_secs(1),
                Duration::from_secs(1),
            );
            loop {
                interval.tick().await;
                report(started_at, bytes_start, &bytes, &messages);
            }
        });
        self.running = Some(Running {
            started_at,
            bytes_start,
            ticker,
        });
    }

    /// Cancel the ticker and print the final summary.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.ticker.abort();
            report(
                running.started_at,
                running.bytes_start,
                &self.bytes,
                &self.messages,
            );
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(running) = self.running.take() {
            running.ticker.abort();
        }
    }
}

impl Drop for FetchTimer {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

fn report(started_at: Instant, bytes_start: u64, bytes: &AtomicU64, messages: &AtomicU64) {
    let elapsed_ms = started_at.elapsed().as_millis().max(1) as f64;
    let fetched = bytes.load(Ordering::Relaxed) - bytes_start;
    let rate = (fetched as f64 * 1024.0) / (elapsed_ms * 1000.0);
    info!(
        "Fetched {} messages ({} bytes) in {:.3} s (@ {:.3} KiB/s)",
        messages.load(Ordering::Relaxed),
        fetched,
        elapsed_ms / 1000.0,
        rate
    );
}
