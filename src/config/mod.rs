//! Conversion options and the static column-type map.
//!
//! [`ConvertOptions`] is the single value object every entry point takes.
//! It is validated once, when a pipeline or orchestrator is built, so the
//! streaming loop never re-checks arguments.
//!
//! File-based configuration (TOML plus environment overrides) lives in
//! [`settings`] and converts into these types.

pub mod settings;

use crate::chunk::{ChunkTransform, TransformArgs};
use crate::error::{Error, Result};
use crate::io::csv::ReadOptions;
use crate::io::encoding;
use arrow::datatypes::DataType;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub use settings::Settings;

/// Rows per chunk when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

// ============================================================================
// Column types
// ============================================================================

/// Scalar type a column can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    Boolean,
}

impl ColumnType {
    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Self::Utf8 => DataType::Utf8,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Boolean => DataType::Boolean,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "string" | "utf8" | "text" | "object" => Ok(Self::Utf8),
            "int" | "integer" | "int64" | "i64" | "long" => Ok(Self::Int64),
            "float" | "float64" | "double" | "f64" | "number" => Ok(Self::Float64),
            "bool" | "boolean" => Ok(Self::Boolean),
            other => Err(Error::Config(format!("unknown column type {other:?}"))),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Column name to declared type. Names that match no column are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ColumnTypeMap(BTreeMap<String, ColumnType>);

impl ColumnTypeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, ty: ColumnType) -> Self {
        self.0.insert(column.into(), ty);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, ty: ColumnType) {
        self.0.insert(column.into(), ty);
    }

    /// Type declared for `column`, matched verbatim first and then with
    /// surrounding whitespace removed.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.0
            .get(column)
            .or_else(|| self.0.get(column.trim()))
            .copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `COLUMN=TYPE` entries, as given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an entry without `=` or with an unknown type.
    pub fn parse_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (column, ty) = entry
                .rsplit_once('=')
                .ok_or_else(|| Error::Config(format!("expected COLUMN=TYPE, got {entry:?}")))?;
            map.insert(column.trim(), ty.parse()?);
        }
        Ok(map)
    }
}

impl FromIterator<(String, ColumnType)> for ColumnTypeMap {
    fn from_iter<T: IntoIterator<Item = (String, ColumnType)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Output codec and input format
// ============================================================================

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Codec {
    Snappy,
    Gzip,
    Zstd,
    Brotli,
    Lz4,
    Uncompressed,
}

impl Codec {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Brotli => "brotli",
            Self::Lz4 => "lz4",
            Self::Uncompressed => "uncompressed",
        }
    }

    /// Extra file-name suffix for parts written with this codec.
    #[must_use]
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Uncompressed => None,
            other => Some(other.name()),
        }
    }

    #[must_use]
    pub fn to_parquet(self) -> Compression {
        match self {
            Self::Snappy => Compression::SNAPPY,
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Brotli => Compression::BROTLI(BrotliLevel::default()),
            Self::Lz4 => Compression::LZ4_RAW,
            Self::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "gzip" | "gz" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            "brotli" => Ok(Self::Brotli),
            "lz4" => Ok(Self::Lz4),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => Err(Error::Config(format!("unknown compression codec {other:?}"))),
        }
    }
}

impl TryFrom<String> for Codec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Input file format. Delimited text is the only one supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileFormat {
    #[default]
    Csv,
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("csv") {
            Ok(Self::Csv)
        } else {
            Err(Error::UnsupportedFormat(s.to_string()))
        }
    }
}

// ============================================================================
// ConvertOptions
// ============================================================================

/// Everything that controls how one file is read, transformed and written.
#[derive(Clone)]
pub struct ConvertOptions {
    /// Maximum rows per chunk, and therefore per part.
    pub chunk_size: usize,
    /// Leading records discarded before the header row.
    pub skip_rows: usize,
    pub has_header: bool,
    pub delimiter: u8,
    /// Primary text encoding; `None` means UTF-8.
    pub encoding: Option<&'static Encoding>,
    /// Encoding used for the single restart after a decode failure.
    pub fallback_encoding: Option<&'static Encoding>,
    pub column_types: ColumnTypeMap,
    /// Explicit codec. `None` writes Snappy without a file-name suffix.
    pub codec: Option<Codec>,
    /// Directory that receives the part files.
    pub output_dir: PathBuf,
    pub file_format: FileFormat,
    pub transform: Option<Arc<dyn ChunkTransform>>,
    pub transform_args: TransformArgs,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_rows: 0,
            has_header: true,
            delimiter: b',',
            encoding: None,
            fallback_encoding: Some(WINDOWS_1252),
            column_types: ColumnTypeMap::default(),
            codec: None,
            output_dir: PathBuf::from("."),
            file_format: FileFormat::Csv,
            transform: None,
            transform_args: TransformArgs::default(),
        }
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("chunk_size", &self.chunk_size)
            .field("skip_rows", &self.skip_rows)
            .field("has_header", &self.has_header)
            .field("delimiter", &char::from(self.delimiter))
            .field("encoding", &self.encoding.map(Encoding::name))
            .field("fallback_encoding", &self.fallback_encoding.map(Encoding::name))
            .field("column_types", &self.column_types)
            .field("codec", &self.codec)
            .field("output_dir", &self.output_dir)
            .field("file_format", &self.file_format)
            .field("transform", &self.transform.is_some())
            .field("transform_args", &self.transform_args)
            .finish()
    }
}

impl ConvertOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the primary encoding from a WHATWG label such as `"latin1"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown or non-ASCII-compatible labels.
    pub fn with_encoding_label(mut self, label: &str) -> Result<Self> {
        self.encoding = Some(encoding::resolve(label)?);
        Ok(self)
    }

    /// Set (or, with `None`, disable) the fallback encoding.
    #[must_use]
    pub fn with_fallback_encoding(mut self, encoding: Option<&'static Encoding>) -> Self {
        self.fallback_encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_column_types(mut self, column_types: ColumnTypeMap) -> Self {
        self.column_types = column_types;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Select the input format by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for anything but `csv`.
    pub fn with_file_type(mut self, file_type: &str) -> Result<Self> {
        self.file_format = file_type.parse()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_transform(mut self, transform: impl ChunkTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn with_transform_args(mut self, args: TransformArgs) -> Self {
        self.transform_args = args;
        self
    }

    /// Primary encoding, defaulting to UTF-8.
    #[must_use]
    pub fn primary_encoding(&self) -> &'static Encoding {
        self.encoding.unwrap_or(UTF_8)
    }

    /// Check option values that cannot be enforced by the types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }
        if matches!(self.delimiter, b'\n' | b'\r' | b'"') {
            return Err(Error::Config(format!(
                "invalid delimiter {:?}",
                char::from(self.delimiter)
            )));
        }
        for enc in [Some(self.primary_encoding()), self.fallback_encoding]
            .into_iter()
            .flatten()
        {
            if !enc.is_ascii_compatible() {
                return Err(Error::Config(format!(
                    "encoding {} is not ASCII-compatible",
                    enc.name()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn read_options(&self, encoding: &'static Encoding) -> ReadOptions {
        ReadOptions {
            chunk_size: self.chunk_size,
            skip_rows: self.skip_rows,
            has_header: self.has_header,
            delimiter: self.delimiter,
            encoding,
            column_types: self.column_types.clone(),
        }
    }
}
