//! Signal handling and best-effort shutdown.
//!
//! On SIGINT or SIGTERM the cached database connection is closed before the
//! process exits. A close that fails or hangs is logged and abandoned.

use crate::constants::DEFAULT_CLOSE_TIMEOUT;
use crate::database::{ConnectionManager, Connector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal that can be awaited.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn recv(&mut self) {
        let _ = self.receiver.wait_for(|&v| v).await;
    }
}

/// Controller for managing shutdown.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
    shutting_down: Arc<AtomicBool>,

    /// Upper bound on closing the database connection.
    close_timeout: Duration,
}

impl ShutdownController {
    /// Create a new shutdown controller with the default close timeout.
    pub fn new() -> Self {
        Self::with_close_timeout(DEFAULT_CLOSE_TIMEOUT)
    }

    /// Create a shutdown controller with a custom close timeout.
    pub fn with_close_timeout(close_timeout: Duration) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            shutting_down: Arc::new(AtomicBool::new(false)),
            close_timeout,
        }
    }

    /// Get a shutdown signal receiver.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Check if shutdown is in progress.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Initiating shutdown...");
            let _ = self.sender.send(true);
        }
    }

    /// Close the database connection, giving up after the close timeout.
    pub async fn graceful_shutdown<C: Connector>(&self, connection: &ConnectionManager<C>) {
        self.shutdown();

        match tokio::time::timeout(self.close_timeout, connection.close()).await {
            Ok(()) => info!("Shutdown complete"),
            Err(_) => warn!(
                "Closing the database connection took longer than {} seconds; exiting anyway",
                self.close_timeout.as_secs()
            ),
        }
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared shutdown controller type.
pub type SharedShutdownController = Arc<ShutdownController>;

/// Create a new shared shutdown controller.
pub fn new_shutdown_controller() -> SharedShutdownController {
    Arc::new(ShutdownController::new())
}

/// Install handlers for Ctrl+C (SIGINT) and, on Unix, SIGTERM.
pub async fn install_signal_handlers(controller: SharedShutdownController) {
    let ctrl_c_controller = controller.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c_controller.shutdown();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });

    #[cfg(unix)]
    {
        let term_controller = controller;
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating shutdown...");
                    term_controller.shutdown();
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                }
            }
        });
    }

    #[cfg(not(unix))]
    drop(controller);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DbConnection, ResultRow, SqlParam};
    use crate::error::ServerError;
    use async_trait::async_trait;

    struct SlowConnector {
        close_delay: Duration,
    }

    struct SlowConnection {
        close_delay: Duration,
    }

    #[async_trait]
    impl DbConnection for SlowConnection {
        fn is_connected(&self) -> bool {
            true
        }

        async fn query(&mut self, _sql: &str, _params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError> {
            Ok(Vec::new())
        }

        async fn close(&mut self) -> Result<(), ServerError> {
            tokio::time::sleep(self.close_delay).await;
            Err(ServerError::connection("socket already closed"))
        }
    }

    #[async_trait]
    impl Connector for SlowConnector {
        type Connection = SlowConnection;

        async fn access_token(&self) -> Result<String, ServerError> {
            Ok("token".to_string())
        }

        async fn open(&self, _token: String) -> Result<SlowConnection, ServerError> {
            Ok(SlowConnection {
                close_delay: self.close_delay,
            })
        }
    }

    #[test]
    fn test_shutdown_controller_creation() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutting_down());
        assert_eq!(controller.close_timeout(), DEFAULT_CLOSE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let controller = ShutdownController::new();
        let mut signal = controller.signal();

        let pending = tokio::time::timeout(Duration::from_millis(20), signal.recv()).await;
        assert!(pending.is_err());

        controller.shutdown();
        assert!(controller.is_shutting_down());
        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .unwrap();
    }

    #[test]
    fn test_shutdown_idempotent() {
        let controller = ShutdownController::new();

        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_failed_close_does_not_block_shutdown() {
        let controller = new_shutdown_controller();
        let manager = ConnectionManager::new(SlowConnector {
            close_delay: Duration::ZERO,
        });
        drop(manager.connect().await.unwrap());

        controller.graceful_shutdown(&manager).await;
        assert!(controller.is_shutting_down());
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_hanging_close_is_abandoned() {
        let controller = ShutdownController::with_close_timeout(Duration::from_millis(20));
        let manager = ConnectionManager::new(SlowConnector {
            close_delay: Duration::from_secs(60),
        });
        drop(manager.connect().await.unwrap());

        let started = std::time::Instant::now();
        controller.graceful_shutdown(&manager).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_signal_wakes_waiter() {
        let controller = new_shutdown_controller();
        let mut signal = controller.signal();

        let waiter = tokio::spawn(async move { signal.recv().await });
        controller.shutdown();
        waiter.await.unwrap();
    }
}
