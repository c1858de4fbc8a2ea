//! SIGINT/SIGTERM handling
//!
//! A background task publishes a running signal count on a watch
//! channel. The driver interprets count 1 as "finish the in-flight
//! message, log out, close cleanly" and count 2 as "give up now".

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, warn};

/// Receiving end of the shutdown counter.
pub type ShutdownSignal = watch::Receiver<u32>;

/// A shutdown channel not backed by OS signals, for tests and embedders
/// that trigger the quit themselves.
#[must_use]
pub fn shutdown_channel() -> (watch::Sender<u32>, ShutdownSignal) {
    watch::channel(0)
}

/// Spawn the OS signal listener task.
pub fn spawn_signal_listener() -> std::io::Result<ShutdownSignal> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = watch::channel(0u32);
    tokio::spawn(async move {
        let mut count = 0u32;
        loop {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            count += 1;
            if count == 1 {
                warn!("Got signal: {name}");
            } else {
                error!("Got a signal ({name}) the second time - immediate exit");
            }
            if tx.send(count).is_err() {
                return;
            }
        }
    });
    Ok(rx)
}
