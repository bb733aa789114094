//! Compression module
//!
//! Symmetric zlib compression for raw byte payloads plus gzip-framed
//! decompression for request bodies sent with `Content-Encoding: gzip`.
//!
//! Decoding works through the payload in fixed [`CHUNK`]-sized output slices
//! and only succeeds once the decoder reports stream end, so truncated or
//! corrupt input is always reported as an error rather than returned as a
//! partial payload.
//!
//! Multiple named payloads can be grouped into a zip container with
//! [`archive::Archive`].

pub mod archive;

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::error::CodecError;

pub use archive::{extract, Archive, ArchiveBackend, ZipBackend};

/// Size of the working buffer used while encoding and decoding (16 KiB)
pub const CHUNK: usize = 16 * 1024;

/// Compress data at maximum compression level.
///
/// The output is a zlib-wrapped deflate stream. Empty input yields empty
/// output.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    for chunk in data.chunks(CHUNK) {
        encoder
            .write_all(chunk)
            .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;
    }

    encoder
        .finish()
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))
}

/// Decompress a zlib stream, or a gzip-framed stream when `is_gzip` is set.
pub fn decompress(data: &[u8], is_gzip: bool) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    if is_gzip {
        inflate_gzip(data, usize::MAX)
    } else {
        inflate_zlib(data)
    }
}

/// Decompress a gzip-framed stream
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    decompress(data, true)
}

/// Decompress a gzip-framed stream whose output may not exceed `limit` bytes.
///
/// Decoding stops with [`CodecError::OutputTooLarge`] as soon as the limit is
/// crossed, before the rest of the stream is inflated.
pub fn decompress_gzip_limited(data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    inflate_gzip(data, limit)
}

fn inflate_zlib(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut stream = Decompress::new(true);
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut buffer = vec![0u8; CHUNK];

    loop {
        let consumed = stream.total_in() as usize;
        let before_out = stream.total_out();

        let status = stream
            .decompress(&data[consumed..], &mut buffer, FlushDecompress::None)
            .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;

        let produced = (stream.total_out() - before_out) as usize;
        result.extend_from_slice(&buffer[..produced]);

        match status {
            Status::StreamEnd => return Ok(result),
            Status::BufError => return Err(CodecError::TruncatedStream),
            Status::Ok => {
                let input_left = data.len() - stream.total_in() as usize;
                let progressed = stream.total_in() as usize > consumed || produced > 0;

                // A full output slice may still hold pending data even with
                // no input left.
                if !progressed || (input_left == 0 && produced < buffer.len()) {
                    return Err(CodecError::TruncatedStream);
                }
            }
        }
    }
}

fn inflate_gzip(data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(data);
    let mut result = Vec::with_capacity(data.len().saturating_mul(2).min(limit));
    let mut buffer = vec![0u8; CHUNK];

    loop {
        let read = decoder.read(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => CodecError::TruncatedStream,
            _ => CodecError::DecompressionFailed(e.to_string()),
        })?;

        if read == 0 {
            break;
        }
        if result.len() + read > limit {
            return Err(CodecError::OutputTooLarge(limit));
        }
        result.extend_from_slice(&buffer[..read]);
    }

    // End of stream is only reported after the trailer checksum matched
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;

    fn sample_payload() -> Vec<u8> {
        (0..100_000u32)
            .flat_map(|i| format!("town-entity-{}\n", i % 997).into_bytes())
            .collect()
    }

    #[test]
    fn test_empty_round_trip() {
        assert!(compress(&[]).unwrap().is_empty());
        assert!(decompress(&[], false).unwrap().is_empty());
        assert!(decompress_gzip(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_larger_than_chunk() {
        let payload = sample_payload();
        assert!(payload.len() > CHUNK * 4);

        let compressed = compress(&payload).unwrap();
        assert!(compressed.len() < payload.len());

        let restored = decompress(&compressed, false).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_round_trip_small() {
        let payload = b"Wiki";
        let restored = decompress(&compress(payload).unwrap(), false).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_gzip_from_standard_encoder() {
        let payload = sample_payload();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let gzipped = encoder.finish().unwrap();

        assert_eq!(decompress_gzip(&gzipped).unwrap(), payload);
    }

    #[test]
    fn test_gzip_output_limit() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&vec![0u8; 4 * 1024 * 1024]).unwrap();
        let gzipped = encoder.finish().unwrap();

        let result = decompress_gzip_limited(&gzipped, 1024 * 1024);
        assert!(matches!(result, Err(CodecError::OutputTooLarge(1048576))));

        let restored = decompress_gzip_limited(&gzipped, 4 * 1024 * 1024).unwrap();
        assert_eq!(restored.len(), 4 * 1024 * 1024);
    }

    #[test]
    fn test_truncated_zlib_rejected() {
        let compressed = compress(&sample_payload()).unwrap();
        let truncated = &compressed[..compressed.len() / 2];

        assert!(decompress(truncated, false).is_err());
    }

    #[test]
    fn test_truncated_gzip_rejected() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&sample_payload()).unwrap();
        let gzipped = encoder.finish().unwrap();

        assert!(decompress_gzip(&gzipped[..gzipped.len() - 4]).is_err());
        assert!(decompress_gzip(&gzipped[..gzipped.len() / 3]).is_err());
    }

    #[test]
    fn test_corrupt_stream_rejected() {
        let result = decompress(b"definitely not zlib data", false);
        assert!(matches!(result, Err(CodecError::DecompressionFailed(_))));
    }

    #[test]
    fn test_zlib_is_not_gzip() {
        let compressed = compress(b"payload").unwrap();
        assert!(decompress_gzip(&compressed).is_err());
    }
}
