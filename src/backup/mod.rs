//! Town backup module
//!
//! Copies town save files into a dated backup tree:
//! - [`TownBackup`] performs single-file and bulk backups
//! - [`policy`] decides whether a file needs a new backup and names the copies
//! - [`scheduler`] runs bulk backups periodically on a background thread
//!
//! Failures here are logged rather than returned to a caller, since the
//! scheduled runs have no one to report to. A failed file never aborts the
//! rest of a bulk run.

pub mod policy;
pub mod scheduler;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::compression::Archive;
use crate::error::BackupError;

pub use policy::should_create_backup;
pub use scheduler::{BackupInterval, BackupManager};

/// Default extension of town save files
pub const DEFAULT_EXTENSION: &str = "pb";

/// Result of a single-file backup attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A dated copy was written and the baseline refreshed
    Created { dated: PathBuf, latest: PathBuf },
    /// The policy decided no backup was needed
    Skipped,
}

impl BackupOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Backs up town files from one source directory into one backup root
#[derive(Debug)]
pub struct TownBackup {
    /// Directory holding the live town files
    source_dir: PathBuf,
    /// Root of the backup tree
    backup_dir: PathBuf,
    /// Extension (without dot) of files to back up
    extension: String,
    /// Serializes compare-and-copy runs between scheduled and manual triggers
    run_lock: Mutex<()>,
}

impl TownBackup {
    /// Create a backup job for `*.pb` files
    pub fn new(source_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(source_dir, backup_dir, DEFAULT_EXTENSION)
    }

    /// Create a backup job for files with a custom extension
    pub fn with_extension(
        source_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        let extension: String = extension.into();
        Self {
            source_dir: source_dir.into(),
            backup_dir: backup_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Back up a single file if the policy calls for it.
    ///
    /// Writes `{root}/{date}/{name}.{timestamp}.bak` and refreshes
    /// `{root}/{name}.latest.bak`, overwriting existing files.
    pub fn backup_town_file(&self, source: &Path) -> Result<BackupOutcome, BackupError> {
        let _guard = self.run_lock.lock();
        self.backup_file_locked(source)
    }

    fn backup_file_locked(&self, source: &Path) -> Result<BackupOutcome, BackupError> {
        if !source.exists() {
            warn!(source = %source.display(), "[BACKUP] Source file does not exist");
            return Err(BackupError::SourceMissing(source.to_path_buf()));
        }

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BackupError::SourceMissing(source.to_path_buf()))?;

        let latest = policy::latest_backup_path(&self.backup_dir, &file_name);
        if !should_create_backup(source, &latest) {
            info!(
                source = %source.display(),
                "[BACKUP] Skipping backup - current backup is larger or identical"
            );
            return Ok(BackupOutcome::Skipped);
        }

        let now = Local::now();
        let dated = policy::dated_backup_path(&self.backup_dir, &file_name, &now);

        match copy_backup(source, &dated, &latest) {
            Ok(bytes) => {
                info!(
                    source = %source.display(),
                    backup = %dated.display(),
                    bytes,
                    "[BACKUP] Successfully backed up town file"
                );
                Ok(BackupOutcome::Created { dated, latest })
            }
            Err(e) => {
                error!(source = %source.display(), error = %e, "[BACKUP] Error backing up file");
                Err(e)
            }
        }
    }

    /// Back up every matching file in the source directory (non-recursive).
    ///
    /// Returns the number of files backed up. Skipped and failed files are
    /// not counted; failing to prepare the backup root or to list the source
    /// directory returns 0.
    pub fn backup_all_towns(&self) -> usize {
        self.backup_all_towns_until(|| false)
    }

    /// Like [`backup_all_towns`](Self::backup_all_towns), but checks `stop`
    /// before each file and ends the run early once it returns true.
    pub fn backup_all_towns_until(&self, stop: impl Fn() -> bool) -> usize {
        let _guard = self.run_lock.lock();

        info!(
            source = %self.source_dir.display(),
            backup_dir = %self.backup_dir.display(),
            "[BACKUP] Starting backup of all town files"
        );

        if let Err(e) = self.ensure_backup_dir() {
            error!(error = %e, "[BACKUP] Failed to create backup directory");
            return 0;
        }

        let candidates = match self.list_town_files() {
            Ok(files) => files,
            Err(e) => {
                error!(
                    source = %self.source_dir.display(),
                    error = %e,
                    "[BACKUP] Error during backup of all towns"
                );
                return 0;
            }
        };

        let mut success_count = 0;
        for path in &candidates {
            if stop() {
                warn!("[BACKUP] Stop requested, ending backup run early");
                break;
            }
            if let Ok(BackupOutcome::Created { .. }) = self.backup_file_locked(path) {
                success_count += 1;
            }
        }

        info!(
            count = success_count,
            "[BACKUP] Completed backup of all town files"
        );
        success_count
    }

    /// Pack every baseline (`*.latest.bak`) file into one zip archive.
    ///
    /// Returns the number of entries written.
    pub fn export_latest(&self, dest: &Path, comment: &str) -> Result<usize, BackupError> {
        let _guard = self.run_lock.lock();
        self.export_locked(dest, comment)
    }

    /// Export the baselines into a new archive in `dir`, named after the
    /// current time. An existing archive is never overwritten; a numeric
    /// suffix is added instead.
    ///
    /// Returns the number of entries and the archive path.
    pub fn export_latest_into(
        &self,
        dir: &Path,
        comment: &str,
    ) -> Result<(usize, PathBuf), BackupError> {
        let _guard = self.run_lock.lock();
        let dest = policy::export_archive_path(dir, &Local::now());
        let count = self.export_locked(&dest, comment)?;
        Ok((count, dest))
    }

    fn export_locked(&self, dest: &Path, comment: &str) -> Result<usize, BackupError> {
        let entries =
            fs::read_dir(&self.backup_dir).map_err(|e| BackupError::io(&self.backup_dir, e))?;

        let mut archive = Archive::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::io(&self.backup_dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_file() || !name.ends_with(policy::LATEST_SUFFIX) {
                continue;
            }

            let data = fs::read(&path).map_err(|e| BackupError::io(&path, e))?;
            archive.add(name, data);
        }

        archive.write(dest, comment)?;
        info!(
            archive = %dest.display(),
            entries = archive.len(),
            "[BACKUP] Exported latest town backups"
        );
        Ok(archive.len())
    }

    fn ensure_backup_dir(&self) -> Result<(), BackupError> {
        if self.backup_dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.backup_dir).map_err(|source| BackupError::DirectoryUnavailable {
            path: self.backup_dir.clone(),
            source,
        })
    }

    fn list_town_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.source_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()) {
                files.push(path);
            }
        }
        files.sort();
        debug!(count = files.len(), "[BACKUP] Found town files");
        Ok(files)
    }
}

/// Copy `source` to the dated path (creating its day directory) and to the
/// baseline path. Returns the number of bytes copied.
fn copy_backup(source: &Path, dated: &Path, latest: &Path) -> Result<u64, BackupError> {
    if let Some(day_dir) = dated.parent() {
        fs::create_dir_all(day_dir).map_err(|e| BackupError::io(day_dir, e))?;
    }
    fs::copy(source, dated).map_err(|e| BackupError::io(dated, e))?;
    fs::copy(source, latest).map_err(|e| BackupError::io(latest, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, TownBackup) {
        let dir = tempfile::tempdir().unwrap();
        let towns = dir.path().join("towns");
        fs::create_dir_all(&towns).unwrap();
        let job = TownBackup::new(&towns, dir.path().join("town_backups"));
        (dir, job)
    }

    #[test]
    fn test_backup_single_file() {
        let (_dir, job) = setup();
        let source = job.source_dir().join("marge.pb");
        fs::write(&source, b"town data").unwrap();

        let outcome = job.backup_town_file(&source).unwrap();
        let BackupOutcome::Created { dated, latest } = outcome else {
            panic!("expected a backup to be created");
        };

        assert_eq!(fs::read(&dated).unwrap(), b"town data");
        assert_eq!(fs::read(&latest).unwrap(), b"town data");
        assert_eq!(latest, job.backup_dir().join("marge.pb.latest.bak"));
        assert!(dated
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("marge.pb."));
    }

    #[test]
    fn test_unchanged_file_is_skipped() {
        let (_dir, job) = setup();
        let source = job.source_dir().join("bart.pb");
        fs::write(&source, b"town data").unwrap();

        assert!(job.backup_town_file(&source).unwrap().is_created());
        assert_eq!(job.backup_town_file(&source).unwrap(), BackupOutcome::Skipped);
    }

    #[test]
    fn test_missing_source() {
        let (_dir, job) = setup();
        let result = job.backup_town_file(&job.source_dir().join("nobody.pb"));
        assert!(matches!(result, Err(BackupError::SourceMissing(_))));
    }

    #[test]
    fn test_missing_source_dir_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let job = TownBackup::new(dir.path().join("no_towns"), dir.path().join("backups"));

        assert_eq!(job.backup_all_towns(), 0);
        assert!(dir.path().join("backups").is_dir());
    }

    #[test]
    fn test_extension_filter() {
        let (_dir, job) = setup();
        fs::write(job.source_dir().join("a.pb"), b"1").unwrap();
        fs::write(job.source_dir().join("b.txt"), b"2").unwrap();
        fs::create_dir(job.source_dir().join("dir.pb")).unwrap();

        let files = job.list_town_files().unwrap();
        assert_eq!(files, vec![job.source_dir().join("a.pb")]);
    }

    #[test]
    fn test_failed_file_does_not_abort_bulk_run() {
        let (_dir, job) = setup();
        fs::write(job.source_dir().join("a.pb"), vec![b'a'; 64 * 1024]).unwrap();
        fs::write(job.source_dir().join("b.pb"), b"bbbb").unwrap();
        fs::write(job.source_dir().join("c.pb"), b"cc").unwrap();

        // a directory where the baseline copy of a.pb must go
        fs::create_dir_all(job.backup_dir().join("a.pb.latest.bak")).unwrap();

        assert_eq!(job.backup_all_towns(), 2);
        assert_eq!(fs::read(job.backup_dir().join("b.pb.latest.bak")).unwrap(), b"bbbb");
        assert_eq!(fs::read(job.backup_dir().join("c.pb.latest.bak")).unwrap(), b"cc");
    }

    #[test]
    fn test_export_into_never_overwrites() {
        let (_dir, job) = setup();
        fs::write(job.source_dir().join("a.pb"), b"aaa").unwrap();
        assert_eq!(job.backup_all_towns(), 1);

        let exports = job.backup_dir().join("exports");
        let (first_count, first) = job.export_latest_into(&exports, "").unwrap();
        let (_, second) = job.export_latest_into(&exports, "").unwrap();

        assert_eq!(first_count, 1);
        assert_ne!(first, second);
        assert!(first.is_file());
        assert!(second.is_file());
    }

    #[test]
    fn test_export_latest() {
        let (_dir, job) = setup();
        fs::write(job.source_dir().join("a.pb"), b"aaa").unwrap();
        fs::write(job.source_dir().join("b.pb"), b"bbbb").unwrap();
        assert_eq!(job.backup_all_towns(), 2);

        let dest = job.backup_dir().join("exports").join("towns.zip");
        assert_eq!(job.export_latest(&dest, "export").unwrap(), 2);

        let entries = crate::compression::extract(&fs::read(&dest).unwrap()).unwrap();
        assert_eq!(entries.get("a.pb.latest.bak").map(Vec::as_slice), Some(&b"aaa"[..]));
        assert_eq!(entries.get("b.pb.latest.bak").map(Vec::as_slice), Some(&b"bbbb"[..]));
    }
}
