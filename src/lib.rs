//! # parquetify
//!
//! Chunked conversion of delimited text (CSV) into Parquet, with optional
//! upload of the resulting parts to object storage.
//!
//! A source file is streamed in bounded chunks: each chunk is read, passed
//! through an optional user transform, and written as its own numbered
//! Parquet part, so memory use depends on `chunk_size` rather than file size.
//!
//! ## Quick Start
//!
//! ```no_run
//! use parquetify::{Codec, ConvertOptions, convert};
//! # fn main() -> parquetify::Result<()> {
//!
//! let options = ConvertOptions::new()
//!     .with_chunk_size(50_000)
//!     .with_codec(Codec::Zstd)
//!     .with_output_dir("out");
//!
//! for part in convert("sunspots.csv", &options)? {
//!     let part = part?;
//!     println!("{} ({} rows)", part.path.display(), part.rows);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transforms
//!
//! Any `Fn(Chunk, &TransformArgs) -> anyhow::Result<Chunk>` can be applied to
//! every chunk before it is written:
//!
//! ```no_run
//! use parquetify::{Chunk, ConvertOptions, TransformArgs, convert_all};
//! # fn main() -> parquetify::Result<()> {
//!
//! let options = ConvertOptions::new()
//!     .with_transform(|chunk: Chunk, args: &TransformArgs| -> anyhow::Result<Chunk> {
//!         let station = args.get_str("station").unwrap_or("unknown");
//!         Ok(chunk.with_constant("station", station)?)
//!     })
//!     .with_transform_args(TransformArgs::new().with("station", "greenwich"));
//!
//! let parts = convert_all("sunspots.csv", &options)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`io`] - CSV chunk reader, Parquet part writer, input decompression, globbing
//! - [`chunk`] - the [`Chunk`] table type and the [`ChunkTransform`] trait
//! - [`pipeline`] - per-file conversion with one-shot encoding fallback
//! - [`transfer`] - single-file and storage-scan upload orchestration
//! - [`storage`] - the [`ObjectStorage`] trait with local, in-memory and S3 backends
//! - [`config`] - [`ConvertOptions`] and file/environment [`Settings`]
//! - [`logging`] - `tracing` subscriber setup for binaries

pub mod chunk;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod transfer;

pub use chunk::{Chunk, ChunkTransform, Scalar, TransformArgs};
pub use config::{Codec, ColumnType, ColumnTypeMap, ConvertOptions, FileFormat, Settings};
pub use error::{Error, Result};
pub use io::csv::{ChunkReader, ReadOptions};
pub use io::parquet::{ChunkWriter, Part, part_base_name, read_part};
pub use pipeline::{ConversionPipeline, convert, convert_all};
pub use storage::{FakeStorage, LocalStorage, ObjectStorage, RetryConfig};
pub use transfer::{
    FileReport, LogObserver, ObjectOutcome, ObjectReport, TransferConfig, TransferObserver,
    TransferOrchestrator, TransferReport,
};
