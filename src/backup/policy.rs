//! Backup decision and on-disk naming
//!
//! Layout under the backup root:
//!
//! ```text
//! {root}/{YYYY-MM-DD}/{file}.{YYYYMMDD_HHMMSS}.bak   dated copy
//! {root}/{file}.latest.bak                          comparison baseline
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::{error, warn};

/// Suffix of the rolling baseline file
pub const LATEST_SUFFIX: &str = ".latest.bak";

/// Format of the timestamp embedded in dated backup names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format of the per-day subdirectory name
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Decide whether `source` warrants a new backup given the current baseline.
///
/// - no baseline: back up
/// - source smaller than baseline: skip, the save looks rolled back or
///   corrupted
/// - same size: back up only if the source was modified after the baseline
/// - source larger: back up
///
/// Metadata errors are logged and treated as "skip".
pub fn should_create_backup(source: &Path, existing_backup: &Path) -> bool {
    if !existing_backup.exists() {
        return true;
    }

    let (source_meta, backup_meta) = match (fs::metadata(source), fs::metadata(existing_backup)) {
        (Ok(s), Ok(b)) => (s, b),
        (Err(e), _) | (_, Err(e)) => {
            error!(
                source = %source.display(),
                backup = %existing_backup.display(),
                error = %e,
                "[BACKUP] Error checking file sizes"
            );
            return false;
        }
    };

    let source_size = source_meta.len();
    let backup_size = backup_meta.len();

    if source_size < backup_size {
        warn!(
            source = %source.display(),
            source_size,
            backup_size,
            "[BACKUP] Source file is smaller than backup, skipping backup"
        );
        return false;
    }

    if source_size == backup_size {
        return match (source_meta.modified(), backup_meta.modified()) {
            (Ok(source_time), Ok(backup_time)) => source_time > backup_time,
            (Err(e), _) | (_, Err(e)) => {
                error!(
                    source = %source.display(),
                    error = %e,
                    "[BACKUP] Error reading modification times"
                );
                false
            }
        };
    }

    true
}

/// Path of the dated, timestamped copy of `file_name` taken at `at`
pub fn dated_backup_path<Tz>(root: &Path, file_name: &str, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    root.join(at.format(DATE_FORMAT).to_string()).join(format!(
        "{}.{}.bak",
        file_name,
        at.format(TIMESTAMP_FORMAT)
    ))
}

/// Path of the rolling baseline copy of `file_name`
pub fn latest_backup_path(root: &Path, file_name: &str) -> PathBuf {
    root.join(format!("{}{}", file_name, LATEST_SUFFIX))
}

/// Free path for an export archive taken at `at`: `towns_{timestamp}.zip`,
/// or `towns_{timestamp}_{n}.zip` when that name is already taken
pub fn export_archive_path<Tz>(dir: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format(TIMESTAMP_FORMAT).to_string();
    let mut path = dir.join(format!("towns_{}.zip", stamp));
    let mut suffix = 1u32;
    while path.exists() {
        path = dir.join(format!("towns_{}_{}.zip", stamp, suffix));
        suffix += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn write_file(path: &Path, len: usize, modified: SystemTime) {
        fs::write(path, vec![b'x'; len]).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[test]
    fn test_no_baseline_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("town.pb");
        fs::write(&source, b"data").unwrap();

        assert!(should_create_backup(&source, &dir.path().join("missing.latest.bak")));
    }

    #[test]
    fn test_size_rules() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("town.pb");
        let backup = dir.path().join("town.pb.latest.bak");
        let now = SystemTime::now();

        write_file(&backup, 100, now);

        write_file(&source, 99, now + Duration::from_secs(60));
        assert!(!should_create_backup(&source, &backup), "smaller source must be skipped");

        write_file(&source, 101, now - Duration::from_secs(60));
        assert!(should_create_backup(&source, &backup), "larger source must be backed up");
    }

    #[test]
    fn test_equal_size_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("town.pb");
        let backup = dir.path().join("town.pb.latest.bak");
        let now = SystemTime::now();

        write_file(&backup, 100, now);

        write_file(&source, 100, now + Duration::from_secs(5));
        assert!(should_create_backup(&source, &backup));

        write_file(&source, 100, now);
        assert!(!should_create_backup(&source, &backup));

        write_file(&source, 100, now - Duration::from_secs(5));
        assert!(!should_create_backup(&source, &backup));
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("town.pb.latest.bak");
        fs::write(&backup, b"data").unwrap();

        assert!(!should_create_backup(&dir.path().join("gone.pb"), &backup));
    }

    #[test]
    fn test_backup_paths() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let root = Path::new("town_backups");

        assert_eq!(
            dated_backup_path(root, "homer.pb", &at),
            PathBuf::from("town_backups/2024-03-09/homer.pb.20240309_070501.bak")
        );
        assert_eq!(
            latest_backup_path(root, "homer.pb"),
            PathBuf::from("town_backups/homer.pb.latest.bak")
        );

        let dir = tempfile::tempdir().unwrap();
        let first = export_archive_path(dir.path(), &at);
        assert_eq!(first, dir.path().join("towns_20240309_070501.zip"));
        fs::write(&first, b"zip").unwrap();
        assert_eq!(
            export_archive_path(dir.path(), &at),
            dir.path().join("towns_20240309_070501_1.zip")
        );

        // local times format the same way
        let local = Local::now();
        let path = dated_backup_path(root, "a.pb", &local);
        assert!(path.starts_with(root.join(local.format(DATE_FORMAT).to_string())));
    }
}
