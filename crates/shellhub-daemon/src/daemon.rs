//! Daemon lifecycle management.

use anyhow::{Context, Result};
use shellhub_core::{DaemonConfig, Metrics, NotificationHub};
use shellhub_index::{ContentCache, ContentLoader, DocumentIndex, HierarchyResolver};
use shellhub_ipc::IpcServer;
use shellhub_scanner::{
    BuiltinDrivers, DriverContentLoader, DriverFactory, Orchestrator, ScanContext, TaskRegistry,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::handler::{DaemonHandler, Services};
use crate::signals;

/// The main daemon process
pub struct Daemon {
    config: DaemonConfig,
    shutdown_tx: broadcast::Sender<()>,
    is_running: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new(config: DaemonConfig) -> Result<Self> {
        // Ensure data directories exist
        config
            .ensure_dirs()
            .context("Failed to create data directories")?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            shutdown_tx,
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the daemon
    pub async fn run(&self) -> Result<()> {
        // Check single instance
        self.acquire_pid_lock()?;

        // Mark as running
        self.is_running.store(true, Ordering::SeqCst);

        tracing::info!(
            socket = %self.config.socket_path.display(),
            database = %self.config.database_path().display(),
            "Daemon starting"
        );

        // Initialize components
        let index = DocumentIndex::open(
            &self.config.database_path(),
            self.config.paging.clone(),
            self.config.default_endpoints.clone(),
        )
        .context("Failed to open document index")?;
        index
            .seed_defaults()
            .await
            .context("Failed to seed default endpoints")?;

        let metrics = Arc::new(Metrics::new());
        let cache = Arc::new(
            ContentCache::new(self.config.cache.max_documents).with_metrics(Arc::clone(&metrics)),
        );
        let hub = Arc::new(NotificationHub::default());
        let registry = Arc::new(TaskRegistry::new());
        let drivers: Arc<dyn DriverFactory> = Arc::new(BuiltinDrivers);

        let orchestrator = Orchestrator::start(ScanContext {
            index: index.clone(),
            cache: Arc::clone(&cache),
            hub: Arc::clone(&hub),
            registry: Arc::clone(&registry),
            metrics: Arc::clone(&metrics),
            drivers: Arc::clone(&drivers),
            config: self.config.scan.clone(),
        })
        .await
        .context("Failed to start scan orchestrator")?;

        let loader: Arc<dyn ContentLoader> = Arc::new(DriverContentLoader::new(
            index.clone(),
            Arc::clone(&cache),
            registry,
            drivers,
            orchestrator.clone(),
        ));
        let hierarchy = HierarchyResolver::new(index.clone(), Arc::clone(&loader));

        let handler = Arc::new(DaemonHandler::new(
            Services {
                index,
                cache,
                hub,
                metrics,
                orchestrator: orchestrator.clone(),
                loader,
                hierarchy,
            },
            self.shutdown_tx.clone(),
        ));

        let ipc_server = IpcServer::new(&self.config.socket_path, handler)
            .await
            .context("Failed to create IPC server")?;

        // Set up shutdown signal
        let shutdown_rx = self.shutdown_tx.subscribe();

        // Run components
        tokio::select! {
            result = ipc_server.run() => {
                if let Err(e) = result {
                    tracing::error!("IPC server error: {}", e);
                }
            }
            _ = signals::wait_for_shutdown(shutdown_rx) => {
                tracing::info!("Shutdown signal received");
            }
        }

        if let Err(e) = orchestrator.shutdown().await {
            tracing::warn!(error = %e, "Orchestrator did not shut down cleanly");
        }

        // Cleanup
        self.cleanup().await?;

        Ok(())
    }

    /// Acquire PID lock to ensure single instance
    fn acquire_pid_lock(&self) -> Result<()> {
        let pid_file = &self.config.pid_file;

        if pid_file.exists() {
            // Read existing PID
            if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if is_process_running(pid) {
                        anyhow::bail!("Daemon already running (PID: {})", pid);
                    }
                }
            }
            // Stale PID file, remove it
            std::fs::remove_file(pid_file)?;
        }

        std::fs::write(pid_file, std::process::id().to_string())
            .with_context(|| format!("Failed to write PID file {}", pid_file.display()))?;

        tracing::debug!(pid = std::process::id(), "PID lock acquired");

        Ok(())
    }

    /// Cleanup resources on shutdown
    async fn cleanup(&self) -> Result<()> {
        tracing::info!("Cleaning up...");

        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }

        if self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }

        self.is_running.store(false, Ordering::SeqCst);

        tracing::info!("Cleanup complete");

        Ok(())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        // Release the lock even on panic, but only if we took it
        if self.is_running.load(Ordering::SeqCst) && self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }
    }
}

/// Check if a process is running by PID
fn is_process_running(pid: u32) -> bool {
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_config(dir: &Path) -> DaemonConfig {
        DaemonConfig {
            socket_path: dir.join("shellhub.sock"),
            data_dir: dir.join("data"),
            pid_file: dir.join("shellhub.pid"),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_process_running() {
        // Current process should be running
        assert!(is_process_running(std::process::id()));

        // Very high PID should not exist
        assert!(!is_process_running(999999999));
    }

    #[test]
    fn test_new_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let daemon = Daemon::new(config.clone()).unwrap();
        assert!(config.data_dir.is_dir());
        assert!(!daemon.is_running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_pid_lock_rejects_live_process_and_replaces_stale() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let daemon = Daemon::new(config.clone()).unwrap();

        std::fs::write(&config.pid_file, std::process::id().to_string()).unwrap();
        assert!(daemon.acquire_pid_lock().is_err());

        std::fs::write(&config.pid_file, "999999999").unwrap();
        daemon.acquire_pid_lock().unwrap();
        let pid = std::fs::read_to_string(&config.pid_file).unwrap();
        assert_eq!(pid, std::process::id().to_string());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let daemon = Arc::new(Daemon::new(config.clone()).unwrap());

        let runner = {
            let daemon = Arc::clone(&daemon);
            tokio::spawn(async move { daemon.run().await })
        };

        for _ in 0..100 {
            if config.socket_path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(config.pid_file.exists());

        // The shutdown receiver is subscribed right after the socket is bound
        while daemon.shutdown_tx.send(()).is_err() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        runner.await.unwrap().unwrap();

        assert!(!config.socket_path.exists());
        assert!(!config.pid_file.exists());
        assert!(config.database_path().exists());
    }
}
