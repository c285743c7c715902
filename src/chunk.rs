//! The in-memory unit of work: a bounded, columnar slice of one input file.
//!
//! A [`Chunk`] wraps an Arrow [`RecordBatch`]. Transforms receive a chunk by
//! value and return a (possibly different) chunk, so column edits never copy
//! the untouched columns.

use crate::error::Result;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray, new_null_array,
};
use arrow::compute::{CastOptions, cast, cast_with_options, filter_record_batch};
use arrow::datatypes::{DataType, Field, FieldRef, Float64Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single typed value, used to fill constant columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A bounded table slice with a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    batch: RecordBatch,
}

impl From<RecordBatch> for Chunk {
    fn from(batch: RecordBatch) -> Self {
        Self { batch }
    }
}

fn column_missing(name: &str) -> ArrowError {
    ArrowError::SchemaError(format!("no column named {name:?}"))
}

/// Cast to `Float64`, failing on any non-null value that does not convert.
fn strict_f64(column: &ArrayRef) -> std::result::Result<ArrayRef, ArrowError> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    cast_with_options(column, &DataType::Float64, &options)
}

impl Chunk {
    #[must_use]
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    #[must_use]
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Add `array` as column `name`, replacing an existing column of that name.
    ///
    /// # Errors
    ///
    /// Fails when the array length differs from the chunk's row count.
    pub fn with_column(self, name: &str, array: ArrayRef) -> Result<Self> {
        let rows = self.num_rows();
        if array.len() != rows {
            return Err(ArrowError::InvalidArgumentError(format!(
                "column {name:?} has {} rows, chunk has {rows}",
                array.len()
            ))
            .into());
        }

        let schema = self.batch.schema();
        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut columns = self.batch.columns().to_vec();
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));

        match schema.index_of(name) {
            Ok(i) => {
                fields[i] = field;
                columns[i] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }

        let batch = RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            columns,
            &RecordBatchOptions::new().with_row_count(Some(rows)),
        )?;
        Ok(Self { batch })
    }

    /// Add a column holding `value` in every row.
    ///
    /// # Errors
    ///
    /// See [`Chunk::with_column`].
    pub fn with_constant(self, name: &str, value: impl Into<Scalar>) -> Result<Self> {
        let rows = self.num_rows();
        let array: ArrayRef = match value.into() {
            Scalar::Null => new_null_array(&DataType::Utf8, rows),
            Scalar::Bool(v) => Arc::new(BooleanArray::from(vec![v; rows])),
            Scalar::Int(v) => Arc::new(Int64Array::from(vec![v; rows])),
            Scalar::Float(v) => Arc::new(Float64Array::from(vec![v; rows])),
            Scalar::Str(v) => Arc::new(StringArray::from(vec![v.as_str(); rows])),
        };
        self.with_column(name, array)
    }

    /// Replace numeric column `name` with `f` applied to every non-null value.
    /// The result is always `Float64`.
    ///
    /// # Errors
    ///
    /// Fails when the column is missing or holds a value that is not a
    /// number.
    pub fn map_f64(self, name: &str, f: impl Fn(f64) -> f64) -> Result<Self> {
        let column = self.column(name).ok_or_else(|| column_missing(name))?;
        let values = strict_f64(column)?;
        let mapped: Float64Array = values
            .as_primitive::<Float64Type>()
            .unary::<_, Float64Type>(|v| f(v));
        self.with_column(name, Arc::new(mapped))
    }

    /// Keep the rows where `mask` is true.
    ///
    /// # Errors
    ///
    /// Fails when the mask length differs from the row count.
    pub fn filter(self, mask: &BooleanArray) -> Result<Self> {
        Ok(Self {
            batch: filter_record_batch(&self.batch, mask)?,
        })
    }

    /// # Errors
    ///
    /// Fails when the column does not exist.
    pub fn drop_column(mut self, name: &str) -> Result<Self> {
        let index = self.batch.schema().index_of(name)?;
        self.batch.remove_column(index);
        Ok(self)
    }

    /// Column values as `f64`, nulls preserved.
    ///
    /// # Errors
    ///
    /// Fails when the column is missing or holds a value that is not a
    /// number.
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.column(name).ok_or_else(|| column_missing(name))?;
        let values = strict_f64(column)?;
        Ok(values.as_primitive::<Float64Type>().iter().collect())
    }

    /// Column values rendered as strings, nulls preserved.
    ///
    /// # Errors
    ///
    /// Fails when the column is missing.
    pub fn string_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self.column(name).ok_or_else(|| column_missing(name))?;
        let values = cast(column, &DataType::Utf8)?;
        Ok(values
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }
}

/// Named arguments handed to every transform call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformArgs(BTreeMap<String, serde_json::Value>);

impl TransformArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(serde_json::Value::as_f64)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for TransformArgs {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A caller-supplied chunk-to-chunk function.
///
/// Closures of the shape `Fn(Chunk, &TransformArgs) -> anyhow::Result<Chunk>`
/// implement this trait directly.
pub trait ChunkTransform: Send + Sync {
    /// # Errors
    ///
    /// Any error aborts the file being converted.
    fn apply(&self, chunk: Chunk, args: &TransformArgs) -> anyhow::Result<Chunk>;
}

impl<F> ChunkTransform for F
where
    F: Fn(Chunk, &TransformArgs) -> anyhow::Result<Chunk> + Send + Sync,
{
    fn apply(&self, chunk: Chunk, args: &TransformArgs) -> anyhow::Result<Chunk> {
        self(chunk, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Chunk {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("value", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
                Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])),
            ],
        )
        .unwrap();
        Chunk::new(batch)
    }

    #[test]
    fn constant_column_is_appended() {
        let chunk = sample().with_constant("source", "sensor-7").unwrap();
        assert_eq!(chunk.column_names(), vec!["name", "value", "source"]);
        assert_eq!(
            chunk.string_values("source").unwrap(),
            vec![Some("sensor-7".to_string()); 3]
        );
    }

    #[test]
    fn map_f64_keeps_nulls_and_replaces_in_place() {
        let chunk = sample().map_f64("value", |v| v * 10.0).unwrap();
        assert_eq!(chunk.column_names(), vec!["name", "value"]);
        assert_eq!(
            chunk.f64_values("value").unwrap(),
            vec![Some(10.0), None, Some(30.0)]
        );
    }

    #[test]
    fn map_f64_rejects_text_values() {
        let err = sample().map_f64("name", |v| v + 1.0).unwrap_err();
        assert!(matches!(err, crate::Error::Arrow(_)));
        assert!(sample().f64_values("name").is_err());
    }

    #[test]
    fn numeric_text_still_maps() {
        let chunk = sample()
            .with_column("text", Arc::new(StringArray::from(vec![Some("1.5"), None, Some("2")])))
            .unwrap()
            .map_f64("text", |v| v * 2.0)
            .unwrap();
        assert_eq!(chunk.f64_values("text").unwrap(), vec![Some(3.0), None, Some(4.0)]);
    }

    #[test]
    fn filter_and_drop() {
        let mask = BooleanArray::from(vec![true, false, true]);
        let chunk = sample().filter(&mask).unwrap().drop_column("name").unwrap();
        assert_eq!(chunk.num_rows(), 2);
        assert_eq!(chunk.column_names(), vec!["value"]);
    }

    #[test]
    fn wrong_length_column_is_rejected() {
        let err = sample()
            .with_column("x", Arc::new(Int64Array::from(vec![1])))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Arrow(_)));
    }

    #[test]
    fn closures_are_transforms() {
        let transform = |chunk: Chunk, args: &TransformArgs| -> anyhow::Result<Chunk> {
            let label = args.get_str("label").unwrap_or("none");
            Ok(chunk.with_constant("label", label)?)
        };
        let args = TransformArgs::new().with("label", "x");
        let out = transform.apply(sample(), &args).unwrap();
        assert_eq!(out.string_values("label").unwrap()[0].as_deref(), Some("x"));
    }
}
