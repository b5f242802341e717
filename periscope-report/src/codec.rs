//! Binary wire codec for reports.
//!
//! Reports cross the wire as bincode, optionally wrapped in a gzip stream.
//! The receiver distinguishes the two solely by the Content-Encoding header
//! value it was handed; see [`decode_body`].

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::report::Report;

/// Content-Encoding value for compressed report bodies.
pub const GZIP_ENCODING: &str = "gzip";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("report encode failed: {0}")]
    Encode(#[source] bincode::Error),
    #[error("report decode failed: {0}")]
    Decode(#[source] bincode::Error),
    #[error("gzip stream error: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Deterministic binary serialization of the full report graph.
pub fn encode(report: &Report) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(report).map_err(CodecError::Encode)
}

/// Inverse of [`encode`]. Truncated or malformed input is an error; a
/// partially decoded report is never returned.
pub fn decode(bytes: &[u8]) -> Result<Report, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}

/// Encode and wrap in a gzip stream. The sender must also set the
/// `Content-Encoding: gzip` marker on the request.
pub fn encode_gzip(report: &Report) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&encode(report)?)?;
    Ok(encoder.finish()?)
}

/// Decode a request body, transparently handling compressed and
/// uncompressed payloads based on the Content-Encoding marker alone.
pub fn decode_body(body: &[u8], content_encoding: Option<&str>) -> Result<Report, CodecError> {
    let gzipped = content_encoding
        .map(|e| e.contains(GZIP_ENCODING))
        .unwrap_or(false);
    if gzipped {
        let mut raw = Vec::new();
        GzDecoder::new(body).read_to_end(&mut raw)?;
        decode(&raw)
    } else {
        decode(body)
    }
}
