//! Ctrl+C shutdown handling
//!
//! A broadcast channel lets every task of a binary observe one shutdown.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shutdown signal type (unit type, just signals "shutdown now")
pub type ShutdownSignal = ();

pub type ShutdownSender = broadcast::Sender<ShutdownSignal>;

pub type ShutdownReceiver = broadcast::Receiver<ShutdownSignal>;

/// Setup shutdown handling with Ctrl+C signal
///
/// Returns (sender, receiver); the sender can be cloned for additional
/// shutdown triggers.
///
/// # Example
/// ```ignore
/// let (_shutdown_tx, shutdown_rx) = setup_shutdown();
/// reader.run(shutdown_rx).await?;
/// ```
pub fn setup_shutdown() -> (ShutdownSender, ShutdownReceiver) {
    let (tx, rx) = broadcast::channel::<ShutdownSignal>(1);

    let tx_clone = tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, initiating shutdown"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        let _ = tx_clone.send(());
    });

    (tx, rx)
}
