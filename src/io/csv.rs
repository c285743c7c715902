//! Chunked CSV reading.
//!
//! [`ChunkReader`] streams a delimited text file as a sequence of
//! [`Chunk`]s of at most `chunk_size` rows. Only one chunk is materialized at
//! a time.
//!
//! # Design notes
//! - Fields are decoded strictly with the configured encoding; see
//!   [`crate::io::encoding`].
//! - `skip_rows` discards records *before* the header row.
//! - Column types come from the [`ColumnTypeMap`] when declared, otherwise
//!   they are inferred per chunk: `Int64`, then `Float64`, then `Boolean`,
//!   then `Utf8`. Chunks of one file may therefore disagree on a column's
//!   type unless it is declared.
//! - Short rows are padded with nulls; rows with more fields than the header
//!   are [`Error::Malformed`].

use crate::chunk::Chunk;
use crate::config::{ColumnType, ColumnTypeMap, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::io::compression::auto_detect_reader;
use crate::io::encoding::{decode_field, strip_bom};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use csv::ByteRecord;
use encoding_rs::{Encoding, UTF_8};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Cell values read as null.
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Reader settings, derived from [`crate::ConvertOptions`] for one attempt.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub chunk_size: usize,
    pub skip_rows: usize,
    pub has_header: bool,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub column_types: ColumnTypeMap,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_rows: 0,
            has_header: true,
            delimiter: b',',
            encoding: UTF_8,
            column_types: ColumnTypeMap::default(),
        }
    }
}

/// Lazy, fused iterator of chunks over one CSV file.
pub struct ChunkReader {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read>>,
    options: ReadOptions,
    columns: Vec<String>,
    /// First data record, already consumed to count columns of a headerless file.
    pending: Option<ByteRecord>,
    rows_read: u64,
    done: bool,
}

impl std::fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("rows_read", &self.rows_read)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

fn record_line(record: &ByteRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

fn is_null(value: &str) -> bool {
    NULL_TOKENS.contains(&value)
}

/// Header names with blanks filled and duplicates suffixed `.1`, `.2`, ...
fn normalize_header(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if name.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                name
            };
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

impl ChunkReader {
    /// Open `path`, skip leading records and read the header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened, [`Error::Decode`]
    /// if the header is not valid in the configured encoding, and
    /// [`Error::Config`] for a zero `chunk_size`.
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if options.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }

        let file = File::open(&path)?;
        let input = auto_detect_reader(file, &path)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter)
            .from_reader(input);

        let mut this = Self {
            path,
            reader,
            options,
            columns: Vec::new(),
            pending: None,
            rows_read: 0,
            done: false,
        };
        this.read_header()?;
        debug!(
            path = %this.path.display(),
            encoding = this.options.encoding.name(),
            columns = this.columns.len(),
            "opened csv"
        );
        Ok(this)
    }

    fn read_header(&mut self) -> Result<()> {
        let mut record = ByteRecord::new();
        for _ in 0..self.options.skip_rows {
            if !self.reader.read_byte_record(&mut record)? {
                self.done = true;
                return Ok(());
            }
        }

        if !self.reader.read_byte_record(&mut record)? {
            self.done = true;
            return Ok(());
        }

        if self.options.has_header {
            let line = record_line(&record);
            let encoding = self.options.encoding;
            let mut names = Vec::with_capacity(record.len());
            for (i, field) in record.iter().enumerate() {
                let mut name = decode_field(field, encoding, line)?;
                if i == 0 {
                    name = strip_bom(name);
                }
                names.push(name.into_owned());
            }
            self.columns = normalize_header(names);
        } else {
            self.columns = (0..record.len()).map(|i| format!("column_{i}")).collect();
            self.pending = Some(record);
        }
        Ok(())
    }

    /// Column names, after header normalization.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows produced so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        let width = self.columns.len();
        let limit = self.options.chunk_size;
        let encoding = self.options.encoding;

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(limit.min(8192)); width];
        let mut lines: Vec<u64> = Vec::with_capacity(limit.min(8192));
        let (mut record, mut have_pending) = match self.pending.take() {
            Some(pending) => (pending, true),
            None => (ByteRecord::new(), false),
        };

        while lines.len() < limit {
            if have_pending {
                have_pending = false;
            } else if !self.reader.read_byte_record(&mut record)? {
                break;
            }
            let line = record_line(&record);

            if record.len() > width {
                return Err(Error::Malformed {
                    line,
                    message: format!("expected {width} fields, found {}", record.len()),
                });
            }

            for (column, cell) in cells.iter_mut().enumerate() {
                let value = match record.get(column) {
                    Some(bytes) => {
                        let text = decode_field(bytes, encoding, line)?;
                        (!is_null(text.trim())).then(|| text.into_owned())
                    }
                    None => None,
                };
                cell.push(value);
            }
            lines.push(line);
        }

        if lines.is_empty() {
            return Ok(None);
        }

        let rows = lines.len();
        let mut fields = Vec::with_capacity(width);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(width);
        for (name, values) in self.columns.iter().zip(cells) {
            let ty = self
                .options
                .column_types
                .get(name)
                .unwrap_or_else(|| infer_type(&values));
            arrays.push(build_array(name, values, ty, &lines)?);
            fields.push(Field::new(name.as_str(), ty.data_type(), true));
        }

        let batch = RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(rows)),
        )?;
        self.rows_read += rows as u64;
        trace!(path = %self.path.display(), rows, total = self.rows_read, "read chunk");
        Ok(Some(Chunk::new(batch)))
    }
}

impl Iterator for ChunkReader {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for ChunkReader {}

// ============================================================================
// Type inference and column building
// ============================================================================

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Narrowest type that every non-null value parses as. All-null is `Utf8`.
pub fn infer_type(values: &[Option<String>]) -> ColumnType {
    let mut present = values.iter().flatten().map(|v| v.trim()).peekable();
    if present.peek().is_none() {
        return ColumnType::Utf8;
    }
    let present: Vec<&str> = present.collect();

    if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        ColumnType::Int64
    } else if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        ColumnType::Float64
    } else if present.iter().all(|v| parse_bool(v).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Utf8
    }
}

fn parse_column<T>(
    column: &str,
    values: &[Option<String>],
    lines: &[u64],
    target: ColumnType,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .iter()
        .zip(lines)
        .map(|(value, &line)| match value {
            None => Ok(None),
            Some(raw) => parse(raw.trim()).map(Some).ok_or_else(|| Error::Cast {
                column: column.to_string(),
                value: raw.clone(),
                target: target.name(),
                line,
            }),
        })
        .collect()
}

fn build_array(
    column: &str,
    values: Vec<Option<String>>,
    ty: ColumnType,
    lines: &[u64],
) -> Result<ArrayRef> {
    Ok(match ty {
        ColumnType::Utf8 => Arc::new(StringArray::from(values)),
        ColumnType::Int64 => Arc::new(Int64Array::from(parse_column(
            column,
            &values,
            lines,
            ty,
            |v| v.parse::<i64>().ok(),
        )?)),
        ColumnType::Float64 => Arc::new(Float64Array::from(parse_column(
            column,
            &values,
            lines,
            ty,
            |v| v.parse::<f64>().ok(),
        )?)),
        ColumnType::Boolean => Arc::new(BooleanArray::from(parse_column(
            column, &values, lines, ty, parse_bool,
        )?)),
    })
}
