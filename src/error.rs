//! Error handling module
//!
//! Defines the error types for the TSTO server core. Each component has its
//! own error enum; `ServerError` wraps them for callers that mix components.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the TSTO server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Compression and archive errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// HTTP parsing errors
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Backup errors
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Network errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Compression and archive errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Failed to decompress data: {0}")]
    DecompressionFailed(String),

    #[error("Compressed stream ended before completion")]
    TruncatedStream,

    #[error("Decompressed output exceeds {0} bytes")]
    OutputTooLarge(usize),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<zip::result::ZipError> for CodecError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => CodecError::Io(e),
            other => CodecError::Archive(other.to_string()),
        }
    }
}

/// HTTP message errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Empty request")]
    EmptyRequest,

    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Request head is not valid UTF-8")]
    InvalidEncoding,

    #[error("Incomplete chunk")]
    IncompleteChunk,

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Chunk data not terminated by CRLF")]
    MalformedChunk,
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Request too large: {0} bytes")]
    RequestTooLarge(usize),
}

/// Backup errors
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Source file does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Backup directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive export failed: {0}")]
    Export(#[from] CodecError),

    #[error("Failed to spawn backup worker: {0}")]
    Worker(#[source] io::Error),
}

impl BackupError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BackupError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for TSTO server operations
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HttpError::MalformedRequestLine("GET /".to_string());
        assert_eq!(err.to_string(), "Malformed request line: GET /");

        let err = CodecError::DecompressionFailed("invalid stored block lengths".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to decompress data: invalid stored block lengths"
        );

        let err = BackupError::SourceMissing(PathBuf::from("towns/a.pb"));
        assert_eq!(err.to_string(), "Source file does not exist: towns/a.pb");
    }

    #[test]
    fn test_error_wrapping() {
        let err: ServerError = HttpError::IncompleteChunk.into();
        assert!(matches!(err, ServerError::Http(HttpError::IncompleteChunk)));
        assert_eq!(err.to_string(), "HTTP error: Incomplete chunk");

        let err: ServerError = CodecError::TruncatedStream.into();
        assert!(matches!(err, ServerError::Codec(_)));

        let err: ServerError = NetworkError::RequestTooLarge(70000).into();
        assert_eq!(err.to_string(), "Network error: Request too large: 70000 bytes");
    }

    #[test]
    fn test_backup_io_helper() {
        let err = BackupError::io(
            "town_backups/x.bak",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "I/O error on town_backups/x.bak: denied");
    }
}
