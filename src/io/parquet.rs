//! Parquet part files.
//!
//! Each chunk becomes one self-contained Parquet file named
//! `{base}_part_{index:04}.parquet`, plus a `.{codec}` suffix when a codec
//! was chosen explicitly. Parts are written to a temporary name and renamed
//! into place, so a reader never sees a half-written part.

use crate::chunk::Chunk;
use crate::config::Codec;
use crate::error::Result;
use arrow::compute::concat_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One written part file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Local path of the part.
    pub path: PathBuf,
    /// File name alone, used as the upload key suffix.
    pub file_name: String,
    /// 1-based position within the source file.
    pub index: usize,
    pub rows: usize,
    /// Codec the data is compressed with.
    pub codec: Codec,
}

/// Base name that part files of `source` share.
///
/// Everything before the first `.csv` (case-insensitive) in the file name, or
/// before the first dot when there is no `.csv`.
///
/// ```
/// use parquetify::io::parquet::part_base_name;
///
/// assert_eq!(part_base_name("in/sunspots.csv.gz"), "sunspots");
/// assert_eq!(part_base_name("dump.tsv"), "dump");
/// ```
pub fn part_base_name(source: impl AsRef<Path>) -> String {
    let name = source
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let base = match name.to_ascii_lowercase().find(".csv") {
        Some(end) => &name[..end],
        None => name.split('.').next().unwrap_or_default(),
    };
    if base.is_empty() {
        name
    } else {
        base.to_string()
    }
}

/// File name of part `index` of `base`.
#[must_use]
pub fn part_file_name(base: &str, index: usize, codec: Option<Codec>) -> String {
    match codec.and_then(Codec::suffix) {
        Some(suffix) => format!("{base}_part_{index:04}.parquet.{suffix}"),
        None => format!("{base}_part_{index:04}.parquet"),
    }
}

/// Writes chunks as numbered Parquet parts into one directory.
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    output_dir: PathBuf,
    codec: Option<Codec>,
}

impl ChunkWriter {
    /// `codec: None` writes Snappy without a file-name suffix.
    pub fn new(output_dir: impl Into<PathBuf>, codec: Option<Codec>) -> Self {
        Self {
            output_dir: output_dir.into(),
            codec,
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn effective_codec(&self) -> Codec {
        self.codec.unwrap_or(Codec::Snappy)
    }

    /// Write `chunk` as part `index` of `base_name`, replacing any existing
    /// file of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] or [`crate::Error::Parquet`]. No partial
    /// file is left behind on failure.
    pub fn write(&self, chunk: &Chunk, base_name: &str, index: usize) -> Result<Part> {
        if !self.output_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.output_dir)?;
        }

        let file_name = part_file_name(base_name, index, self.codec);
        let path = self.output_dir.join(&file_name);
        let staging = self.output_dir.join(format!(".{file_name}.tmp"));

        let written = self
            .write_file(chunk, &staging)
            .and_then(|()| fs::rename(&staging, &path).map_err(Into::into));
        if let Err(err) = written {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }

        debug!(part = %path.display(), rows = chunk.num_rows(), "wrote part");
        Ok(Part {
            path,
            file_name,
            index,
            rows: chunk.num_rows(),
            codec: self.effective_codec(),
        })
    }

    fn write_file(&self, chunk: &Chunk, path: &Path) -> Result<()> {
        let props = WriterProperties::builder()
            .set_compression(self.effective_codec().to_parquet())
            .build();
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, chunk.schema(), Some(props))?;
        writer.write(chunk.batch())?;
        writer.close()?;
        Ok(())
    }
}

/// Read a part file back into a single chunk.
///
/// # Errors
///
/// Returns [`crate::Error::Io`], [`crate::Error::Parquet`] or
/// [`crate::Error::Arrow`].
pub fn read_part(path: impl AsRef<Path>) -> Result<Chunk> {
    let file = File::open(path.as_ref())?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Chunk::new(concat_batches(&schema, &batches)?))
}
