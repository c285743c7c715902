//! Transparent decompression of compressed CSV inputs.
//!
//! Detection strategy, in order:
//! 1. the file name's extension (`.gz`, `.zst`, `.bz2`, `.xz`)
//! 2. magic bytes at the start of the stream
//! 3. no compression
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! A file whose extension names a codec that was compiled out is rejected
//! with [`Error::UnsupportedFormat`] rather than being parsed as raw bytes.

use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Decompression codec for input streams.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd").
    fn name(&self) -> &'static str;

    /// Lowercase file extensions including the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Signature at the start of a compressed stream.
    fn magic_bytes(&self) -> &'static [u8];

    /// Wrap a reader with decompression.
    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;
}

/// Codecs compiled into this build.
#[allow(unused_mut)]
fn codecs() -> Vec<&'static dyn CompressionCodec> {
    let mut codecs: Vec<&'static dyn CompressionCodec> = Vec::new();
    #[cfg(feature = "compression-gzip")]
    codecs.push(&GzipCodec);
    #[cfg(feature = "compression-zstd")]
    codecs.push(&ZstdCodec);
    #[cfg(feature = "compression-bzip2")]
    codecs.push(&Bzip2Codec);
    #[cfg(feature = "compression-xz")]
    codecs.push(&XzCodec);
    codecs
}

/// Extensions of every known codec, compiled in or not.
const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    (".gz", "gzip"),
    (".gzip", "gzip"),
    (".zst", "zstd"),
    (".zstd", "zstd"),
    (".bz2", "bzip2"),
    (".xz", "xz"),
];

fn detect_from_extension(path: &Path) -> Result<Option<&'static dyn CompressionCodec>> {
    let name = path.to_string_lossy().to_lowercase();

    for codec in codecs() {
        if codec.extensions().iter().any(|ext| name.ends_with(ext)) {
            return Ok(Some(codec));
        }
    }
    if let Some((_, codec)) = KNOWN_EXTENSIONS.iter().find(|(ext, _)| name.ends_with(ext)) {
        return Err(Error::UnsupportedFormat(format!(
            "{} is {codec}-compressed but the compression-{codec} feature is disabled",
            path.display()
        )));
    }
    Ok(None)
}

/// Peek at the stream head without consuming it.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<&'static dyn CompressionCodec> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    codecs()
        .into_iter()
        .find(|codec| buf.starts_with(codec.magic_bytes()))
}

/// Wrap `reader` with a decompressor if `path_hint` or the stream head calls
/// for one.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for a codec that is not compiled in
/// and [`Error::Io`] if the decompressor cannot be initialised.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    let path_hint = path_hint.as_ref();

    if let Some(codec) = detect_from_extension(path_hint)? {
        debug!(path = %path_hint.display(), codec = codec.name(), "decompressing by extension");
        return Ok(codec.wrap_reader(Box::new(reader))?);
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader) {
        debug!(path = %path_hint.display(), codec = codec.name(), "decompressing by magic bytes");
        return Ok(codec.wrap_reader(Box::new(buf_reader))?);
    }

    Ok(Box::new(buf_reader))
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> &'static [u8] {
        &[0x1f, 0x8b]
    }

    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> &'static [u8] {
        &[0x28, 0xb5, 0x2f, 0xfd]
    }

    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".bz2"]
    }

    // "BZ" alone also matches plain text such as a header cell.
    fn magic_bytes(&self) -> &'static [u8] {
        b"BZh"
    }

    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use bzip2::read::MultiBzDecoder;
        Ok(Box::new(MultiBzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &'static str {
        "xz"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> &'static [u8] {
        &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]
    }

    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use xz2::read::XzDecoder;
        Ok(Box::new(XzDecoder::new(reader)))
    }
}
