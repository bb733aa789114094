//! Application state module
//!
//! Contains the state shared by the admin listener and the shutdown path.

use std::time::Instant;

use tokio::sync::broadcast;
use tracing::info;

use crate::backup::{BackupManager, TownBackup};
use crate::config::ServerConfig;
use crate::error::Result;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// The one backup manager of this process
    pub backups: BackupManager,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
    /// Process start time
    started_at: Instant,
}

impl AppState {
    /// Create the application state and prepare the backup manager.
    ///
    /// The backup directory is created here; the worker thread is started
    /// separately with [`AppState::start_backups`].
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Result<Self> {
        let job = TownBackup::with_extension(
            &config.towns_path,
            &config.backup.directory,
            &config.backup.extension,
        );
        let backups = BackupManager::new(job);
        backups.initialize(config.backup.interval())?;

        info!(
            towns = %config.towns_path.display(),
            backup_dir = %config.backup.directory.display(),
            interval = %config.backup.interval(),
            "Backup manager initialized"
        );

        Ok(Self {
            config,
            backups,
            shutdown_tx,
            started_at: Instant::now(),
        })
    }

    /// Start the periodic backup worker if enabled in the configuration
    pub fn start_backups(&self) -> Result<()> {
        if !self.config.backup.enabled {
            info!("Periodic backups disabled");
            return Ok(());
        }
        self.backups.start()?;
        Ok(())
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
