//! File formats on local disk: compressed CSV in, Parquet parts out.

pub mod compression;
pub mod csv;
pub mod encoding;
pub mod glob;
pub mod parquet;
