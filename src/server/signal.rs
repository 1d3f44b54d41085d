// Signal handling module
//
// SIGTERM and SIGINT (Ctrl+C) both request a graceful shutdown.

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Spawn a task that notifies `shutdown` once a termination signal arrives.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                logger::log_warning(&format!(
                    "Failed to register SIGTERM handler, only Ctrl+C will stop the server: {e}"
                ));
                None
            }
        };

        let received = match sigterm {
            Some(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    _ = wait_for_ctrl_c() => "SIGINT",
                }
            }
            None => {
                wait_for_ctrl_c().await;
                "SIGINT"
            }
        };

        logger::log_info(&format!("{received} received, shutting down gracefully"));
        shutdown.notify_one();
    });
}

/// Non-unix fallback: only Ctrl+C is supported
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        wait_for_ctrl_c().await;
        logger::log_info("Ctrl+C received, shutting down gracefully");
        shutdown.notify_one();
    });
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        logger::log_warning(&format!("Failed to listen for Ctrl+C: {e}"));
        std::future::pending::<()>().await;
    }
}
