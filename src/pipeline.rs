//! Per-file conversion: read, transform, write, one chunk at a time.
//!
//! [`ConversionPipeline`] is a lazy iterator of written [`Part`]s. Nothing is
//! read until the first call to `next`, and at most one chunk is held in
//! memory.
//!
//! # Encoding fallback
//!
//! When a chunk fails to decode and a fallback encoding other than the
//! current one is configured, the pipeline restarts from the beginning of
//! the file with the fallback encoding. This happens at most once per file.
//! Parts from the restarted run reuse the same indices, and therefore the
//! same file names, overwriting those written by the aborted attempt.

use crate::chunk::Chunk;
use crate::config::ConvertOptions;
use crate::error::{Error, Result};
use crate::io::csv::ChunkReader;
use crate::io::parquet::{ChunkWriter, Part, part_base_name};
use encoding_rs::Encoding;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lazy sequence of parts for one source file.
pub struct ConversionPipeline {
    source: PathBuf,
    base_name: String,
    options: ConvertOptions,
    writer: ChunkWriter,
    reader: Option<ChunkReader>,
    encoding: &'static Encoding,
    fallback_used: bool,
    next_index: usize,
    rows_written: usize,
    done: bool,
}

impl std::fmt::Debug for ConversionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionPipeline")
            .field("source", &self.source)
            .field("encoding", &self.encoding.name())
            .field("fallback_used", &self.fallback_used)
            .field("next_index", &self.next_index)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Start converting `path`. See [`ConversionPipeline`].
///
/// # Errors
///
/// Fails before any data is read for invalid options
/// ([`Error::Config`]) or a missing source ([`Error::NotFound`]).
pub fn convert(path: impl AsRef<Path>, options: &ConvertOptions) -> Result<ConversionPipeline> {
    ConversionPipeline::new(path, options.clone())
}

/// Convert `path` completely and return the parts on disk, in index order.
///
/// Parts from an attempt aborted by the encoding fallback are replaced by
/// their namesakes from the restarted attempt. On error, every part written
/// so far is removed, so a failed file leaves nothing in `output_dir`.
///
/// # Errors
///
/// The first error the pipeline yields.
pub fn convert_all(path: impl AsRef<Path>, options: &ConvertOptions) -> Result<Vec<Part>> {
    let mut parts = BTreeMap::new();
    for part in convert(path, options)? {
        match part {
            Ok(part) => {
                parts.insert(part.index, part);
            }
            Err(err) => {
                for part in parts.values() {
                    remove_part(&part.path);
                }
                return Err(err);
            }
        }
    }
    Ok(parts.into_values().collect())
}

fn remove_part(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(part = %path.display(), error = %err, "could not remove part");
        }
    }
}

impl ConversionPipeline {
    /// # Errors
    ///
    /// See [`convert`].
    pub fn new(path: impl AsRef<Path>, options: ConvertOptions) -> Result<Self> {
        options.validate()?;
        let source = path.as_ref().to_path_buf();
        if !source.is_file() {
            return Err(Error::NotFound(source.display().to_string()));
        }

        Ok(Self {
            base_name: part_base_name(&source),
            writer: ChunkWriter::new(options.output_dir.clone(), options.codec),
            encoding: options.primary_encoding(),
            source,
            options,
            reader: None,
            fallback_used: false,
            next_index: 1,
            rows_written: 0,
            done: false,
        })
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Shared prefix of every part name.
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Encoding of the current attempt.
    #[must_use]
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// True once the pipeline has restarted with the fallback encoding.
    #[must_use]
    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    /// Rows written by the current attempt.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn fallback(&self) -> Option<&'static Encoding> {
        if self.fallback_used {
            return None;
        }
        self.options
            .fallback_encoding
            .filter(|&fallback| fallback != self.encoding)
    }

    fn restart_with(&mut self, fallback: &'static Encoding, cause: &Error) {
        warn!(
            source = %self.source.display(),
            from = self.encoding.name(),
            to = fallback.name(),
            error = %cause,
            "decode failed, restarting with fallback encoding"
        );
        self.reader = None;
        self.encoding = fallback;
        self.fallback_used = true;
        self.next_index = 1;
        self.rows_written = 0;
    }

    fn apply_transform(&self, chunk: Chunk) -> Result<Chunk> {
        match &self.options.transform {
            Some(transform) => transform
                .apply(chunk, &self.options.transform_args)
                .map_err(Error::Transform),
            None => Ok(chunk),
        }
    }

    fn step(&mut self) -> Result<Option<Part>> {
        if self.reader.is_none() {
            let reader =
                ChunkReader::open(&self.source, self.options.read_options(self.encoding))?;
            self.reader = Some(reader);
        }

        let chunk = match self.reader.as_mut().and_then(Iterator::next) {
            Some(chunk) => chunk?,
            None => return Ok(None),
        };
        let chunk = self.apply_transform(chunk)?;
        let part = self.writer.write(&chunk, &self.base_name, self.next_index)?;

        self.next_index += 1;
        self.rows_written += part.rows;
        debug!(part = %part.file_name, rows = part.rows, "part ready");
        Ok(Some(part))
    }
}

impl Iterator for ConversionPipeline {
    type Item = Result<Part>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.step() {
                Ok(Some(part)) => return Some(Ok(part)),
                Ok(None) => {
                    self.done = true;
                    info!(
                        source = %self.source.display(),
                        parts = self.next_index - 1,
                        rows = self.rows_written,
                        encoding = self.encoding.name(),
                        "converted"
                    );
                    return None;
                }
                Err(err) if err.is_decode() => match self.fallback() {
                    Some(fallback) => self.restart_with(fallback, &err),
                    None => {
                        self.done = true;
                        return Some(Err(err));
                    }
                },
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl std::iter::FusedIterator for ConversionPipeline {}
