//! Zip archive support
//!
//! An [`Archive`] collects named byte payloads in memory and writes them to a
//! single zip file. [`extract`] performs the reverse for an in-memory archive
//! blob. The container format sits behind the [`ArchiveBackend`] trait;
//! [`ZipBackend`] is the only backend shipped.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::CodecError;

/// Maximum deflate level used for archive entries
const ENTRY_COMPRESSION_LEVEL: i64 = 9;

/// Upper bound on the buffer reserved up front for one entry
const MAX_ENTRY_PREALLOC: u64 = 1024 * 1024;

/// Ordered mapping of slash-normalized entry names to payloads
pub type Entries = BTreeMap<String, Vec<u8>>;

/// A container format able to persist and restore a set of entries
pub trait ArchiveBackend {
    /// Serialize `entries` into `writer`, embedding `comment` if it is not empty
    fn write_entries<W: Write + Seek>(
        &self,
        writer: W,
        entries: &Entries,
        comment: &str,
    ) -> Result<(), CodecError>;

    /// Read every entry from `reader`.
    ///
    /// Entries that cannot be opened or read are skipped.
    fn read_entries<R: Read + Seek>(&self, reader: R) -> Result<Entries, CodecError>;
}

/// Zip container with deflate-compressed entries
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipBackend;

impl ArchiveBackend for ZipBackend {
    fn write_entries<W: Write + Seek>(
        &self,
        writer: W,
        entries: &Entries,
        comment: &str,
    ) -> Result<(), CodecError> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(ENTRY_COMPRESSION_LEVEL))
            .large_file(entries.values().any(|data| data.len() > u32::MAX as usize));

        for (name, data) in entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        if !comment.is_empty() {
            zip.set_comment(comment);
        }

        zip.finish()?;
        Ok(())
    }

    fn read_entries<R: Read + Seek>(&self, reader: R) -> Result<Entries, CodecError> {
        let mut zip = ZipArchive::new(reader)?;
        let mut entries = Entries::new();

        for index in 0..zip.len() {
            let mut file = match zip.by_index(index) {
                Ok(file) => file,
                Err(_) => continue,
            };
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let mut content = Vec::with_capacity(entry_capacity(file.size()));
            if file.read_to_end(&mut content).is_err() {
                continue;
            }

            entries.insert(name, content);
        }

        Ok(entries)
    }
}

/// Initial buffer size for an entry. The declared size comes from the
/// archive itself and is only trusted up to [`MAX_ENTRY_PREALLOC`].
fn entry_capacity(declared: u64) -> usize {
    declared.min(MAX_ENTRY_PREALLOC) as usize
}

/// In-memory archive builder
#[derive(Debug, Default)]
pub struct Archive<B: ArchiveBackend = ZipBackend> {
    files: Entries,
    backend: B,
}

impl Archive<ZipBackend> {
    /// Create an empty zip archive
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: ArchiveBackend> Archive<B> {
    /// Create an empty archive using a specific backend
    pub fn with_backend(backend: B) -> Self {
        Self {
            files: Entries::new(),
            backend,
        }
    }

    /// Add an entry, replacing any previous entry with the same name.
    ///
    /// Backslashes in `name` are converted to forward slashes.
    pub fn add(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into().replace('\\', "/");
        self.files.insert(name, data.into());
    }

    /// Get an entry by its normalized name
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over entry names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Write the archive to `path`, creating parent directories as needed.
    ///
    /// An existing file at `path` is truncated. On failure the file content
    /// is unspecified.
    pub fn write(&self, path: impl AsRef<Path>, comment: &str) -> Result<(), CodecError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        self.backend.write_entries(file, &self.files, comment)
    }

    /// Consume the archive and return its entries
    pub fn into_entries(self) -> Entries {
        self.files
    }
}

/// Expand a serialized zip archive into its entries.
///
/// The bytes are staged in a private temporary file, which is removed when
/// this function returns on every path.
pub fn extract(data: &[u8]) -> Result<Entries, CodecError> {
    extract_with(&ZipBackend, data)
}

/// Expand a serialized archive with a specific backend
pub fn extract_with<B: ArchiveBackend>(backend: &B, data: &[u8]) -> Result<Entries, CodecError> {
    let mut staged = tempfile::NamedTempFile::new()?;
    staged.write_all(data)?;
    staged.flush()?;

    let file = staged.as_file_mut();
    file.seek(SeekFrom::Start(0))?;
    backend.read_entries(file)
}
