//! Backup scheduler
//!
//! Runs [`TownBackup::backup_all_towns`] on a single background thread at a
//! fixed interval. The worker sleeps in bounded slices (1 second in seconds
//! mode, 15 minutes in hours mode) and is also woken directly by
//! [`BackupManager::stop`], so shutdown never waits for a full interval.
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopping --join--> Stopped
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{error, info, warn};

use super::TownBackup;
use crate::error::BackupError;

/// Poll slice in seconds mode
const SECONDS_SLICE: Duration = Duration::from_secs(1);

/// Poll slice in hours mode
const HOURS_SLICE: Duration = Duration::from_secs(15 * 60);

/// Interval between scheduled backups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupInterval {
    /// Coarse production cadence
    Hours(u32),
    /// Fine-grained cadence, meant for testing
    Seconds(u32),
}

impl Default for BackupInterval {
    fn default() -> Self {
        Self::Hours(4)
    }
}

impl BackupInterval {
    /// Pick the mode from configuration values: a nonzero `seconds` selects
    /// seconds mode, otherwise `hours` is used.
    pub fn from_parts(hours: u32, seconds: u32) -> Self {
        if seconds > 0 {
            Self::Seconds(seconds)
        } else {
            Self::Hours(hours)
        }
    }

    /// Full interval length
    pub fn duration(&self) -> Duration {
        match *self {
            Self::Hours(h) => Duration::from_secs(u64::from(h) * 3600),
            Self::Seconds(s) => Duration::from_secs(u64::from(s)),
        }
    }

    /// Longest single sleep of the worker between stop checks
    pub fn poll_slice(&self) -> Duration {
        match self {
            Self::Hours(_) => HOURS_SLICE,
            Self::Seconds(_) => SECONDS_SLICE,
        }
    }

    pub fn is_seconds_mode(&self) -> bool {
        matches!(self, Self::Seconds(_))
    }
}

impl fmt::Display for BackupInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hours(h) => write!(f, "{} hour(s)", h),
            Self::Seconds(s) => write!(f, "{} second(s) (testing mode)", s),
        }
    }
}

/// Cooperative stop flag with a wakeup for sleeping workers
#[derive(Debug, Default)]
struct StopSignal {
    stopped: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl StopSignal {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.cvar.notify_all();
    }

    /// Sleep for up to `timeout`; returns true if a stop was requested
    fn wait(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        if self.is_stopped() {
            return true;
        }
        self.cvar.wait_for(&mut guard, timeout);
        self.is_stopped()
    }
}

/// State shared between the manager and its worker thread
#[derive(Debug)]
struct Shared {
    job: TownBackup,
    last_backup: Mutex<DateTime<Local>>,
    signal: StopSignal,
}

impl Shared {
    /// Run a bulk backup and record its start time. Scheduled runs pass
    /// `cancellable` so a stop request ends them between files.
    fn run_backup(&self, cancellable: bool) -> usize {
        let started = Local::now();
        let count = self
            .job
            .backup_all_towns_until(|| cancellable && self.signal.is_stopped());
        *self.last_backup.lock() = started;
        count
    }

    /// Time left until the next backup is due, `None` if it is due now
    fn time_until_due(&self, interval: BackupInterval) -> Option<Duration> {
        let elapsed = (Local::now() - *self.last_backup.lock())
            .to_std()
            .unwrap_or_default();
        interval
            .duration()
            .checked_sub(elapsed)
            .filter(|left| !left.is_zero())
    }
}

/// Owns the backup job and its periodic worker thread.
///
/// Construct one per process and share it by reference; dropping the manager
/// stops the worker.
#[derive(Debug)]
pub struct BackupManager {
    shared: Arc<Shared>,
    interval: RwLock<BackupInterval>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackupManager {
    /// Create a stopped manager with the default interval
    pub fn new(job: TownBackup) -> Self {
        Self {
            shared: Arc::new(Shared {
                job,
                last_backup: Mutex::new(Local::now()),
                signal: StopSignal::default(),
            }),
            interval: RwLock::new(BackupInterval::default()),
            worker: Mutex::new(None),
        }
    }

    /// Set the interval and make sure the backup root exists.
    ///
    /// A running worker keeps its interval until it is restarted.
    pub fn initialize(&self, interval: BackupInterval) -> Result<(), BackupError> {
        *self.interval.write() = interval;

        let backup_dir = self.shared.job.backup_dir();
        std::fs::create_dir_all(backup_dir).map_err(|source| BackupError::DirectoryUnavailable {
            path: backup_dir.to_path_buf(),
            source,
        })?;

        info!(
            interval = %interval,
            backup_dir = %backup_dir.display(),
            "[BACKUP] Backup manager initialized"
        );
        Ok(())
    }

    /// Spawn the worker thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<(), BackupError> {
        let mut worker = self.worker.lock();

        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("[BACKUP] Backup thread already running");
            return Ok(());
        }

        let interval = *self.interval.read();
        if interval.duration().is_zero() {
            warn!(interval = %interval, "[BACKUP] Backup interval is zero, thread not started");
            return Ok(());
        }

        self.shared.signal.reset();
        let shared = Arc::clone(&self.shared);

        let handle = thread::Builder::new()
            .name("town-backup".to_string())
            .spawn(move || run_worker(&shared, interval))
            .map_err(BackupError::Worker)?;

        *worker = Some(handle);
        info!("[BACKUP] Backup thread started");
        Ok(())
    }

    /// Signal the worker and wait for it to exit. Does nothing if it is not
    /// running.
    ///
    /// A backup already in progress finishes its current file first.
    pub fn stop(&self) {
        self.shared.signal.trigger();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        if handle.join().is_err() {
            error!("[BACKUP] Backup thread panicked");
        } else {
            info!("[BACKUP] Backup thread stopped");
        }
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run a bulk backup on the calling thread.
    ///
    /// Serialized with scheduled runs; the next scheduled run is pushed back
    /// by one interval.
    pub fn backup_now(&self) -> usize {
        info!("[BACKUP] Starting on-demand backup of all towns");
        self.shared.run_backup(false)
    }

    /// Back up all towns without touching the schedule
    pub fn backup_all_towns(&self) -> usize {
        self.shared.job.backup_all_towns()
    }

    /// Time the last backup run started (construction time if none ran)
    pub fn last_backup_time(&self) -> DateTime<Local> {
        *self.shared.last_backup.lock()
    }

    pub fn interval(&self) -> BackupInterval {
        *self.interval.read()
    }

    /// The underlying backup job
    pub fn job(&self) -> &TownBackup {
        &self.shared.job
    }
}

impl Drop for BackupManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(shared: &Shared, interval: BackupInterval) {
    info!(interval = %interval, "[BACKUP] Backup worker running");

    loop {
        if shared.signal.is_stopped() {
            break;
        }

        match shared.time_until_due(interval) {
            Some(left) => {
                if shared.signal.wait(left.min(interval.poll_slice())) {
                    break;
                }
            }
            None => {
                info!("[BACKUP] Starting scheduled backup of all towns");
                let count = shared.run_backup(true);
                info!(count, "[BACKUP] Scheduled backup completed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;

    fn manager_in(dir: &std::path::Path) -> BackupManager {
        let towns = dir.join("towns");
        fs::create_dir_all(&towns).unwrap();
        BackupManager::new(TownBackup::new(towns, dir.join("town_backups")))
    }

    #[test]
    fn test_interval_modes() {
        assert_eq!(BackupInterval::from_parts(4, 0), BackupInterval::Hours(4));
        assert_eq!(BackupInterval::from_parts(4, 30), BackupInterval::Seconds(30));

        assert_eq!(BackupInterval::Hours(2).duration(), Duration::from_secs(7200));
        assert_eq!(BackupInterval::Hours(2).poll_slice(), Duration::from_secs(900));
        assert_eq!(BackupInterval::Seconds(5).poll_slice(), Duration::from_secs(1));
        assert!(BackupInterval::Seconds(5).is_seconds_mode());
    }

    #[test]
    fn test_initialize_creates_backup_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        manager.initialize(BackupInterval::Hours(2)).unwrap();
        assert!(dir.path().join("town_backups").is_dir());
        assert_eq!(manager.interval(), BackupInterval::Hours(2));
    }

    #[test]
    fn test_stop_is_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        manager.initialize(BackupInterval::Seconds(3600)).unwrap();

        manager.start().unwrap();
        assert!(manager.is_running());
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        manager.stop();
        assert!(begin.elapsed() < Duration::from_millis(1500));
        assert!(!manager.is_running());
    }

    #[test]
    fn test_stop_is_prompt_in_hours_mode() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        manager.initialize(BackupInterval::Hours(4)).unwrap();

        manager.start().unwrap();
        let begin = Instant::now();
        manager.stop();
        assert!(begin.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_start_twice_and_stop_when_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        manager.stop();
        manager.start().unwrap();
        manager.start().unwrap();
        assert!(manager.is_running());
        manager.stop();
        manager.stop();
        assert!(!manager.is_running());

        // can be restarted after a stop
        manager.start().unwrap();
        assert!(manager.is_running());
    }

    #[test]
    fn test_scheduled_run_in_seconds_mode() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        fs::write(dir.path().join("towns").join("lisa.pb"), b"saxophone").unwrap();

        manager.initialize(BackupInterval::Seconds(1)).unwrap();
        manager.start().unwrap();

        let latest = dir.path().join("town_backups").join("lisa.pb.latest.bak");
        let deadline = Instant::now() + Duration::from_secs(10);
        while !latest.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(100));
        }
        manager.stop();

        assert_eq!(fs::read(&latest).unwrap(), b"saxophone");
    }

    #[test]
    fn test_backup_now_updates_last_backup() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        fs::write(dir.path().join("towns").join("maggie.pb"), b"pacifier").unwrap();

        let before = manager.last_backup_time();
        thread::sleep(Duration::from_millis(10));

        assert_eq!(manager.backup_now(), 1);
        assert!(manager.last_backup_time() > before);
        assert_eq!(manager.backup_now(), 0);
    }
}
