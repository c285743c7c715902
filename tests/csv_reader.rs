mod common;

use arrow::datatypes::DataType;
use common::*;
use parquetify::{ChunkReader, ColumnType, ColumnTypeMap, Error, ReadOptions};

fn reader(path: &std::path::Path, chunk_size: usize) -> parquetify::Result<ChunkReader> {
    ChunkReader::open(
        path,
        ReadOptions {
            chunk_size,
            ..ReadOptions::default()
        },
    )
}

#[test]
fn chunks_are_bounded_by_chunk_size() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_sunspots(tmp.path())?;

    let mut reader = reader(&path, 12)?;
    assert_eq!(reader.columns(), ["Month", "Sunspots"]);

    let sizes: Vec<usize> = reader
        .by_ref()
        .map(|chunk| chunk.map(|c| c.num_rows()))
        .collect::<Result<_, _>>()?;
    assert_eq!(sizes, vec![12, 12, 4]);
    assert_eq!(reader.rows_read(), 28);
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn sunspots_types_are_inferred() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_sunspots(tmp.path())?;

    let chunk = reader(&path, 100)?.next().expect("one chunk")?;
    let schema = chunk.schema();
    assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
    assert_eq!(schema.field(1).data_type(), &DataType::Float64);
    assert_eq!(
        chunk.string_values("Month")?.first().cloned().flatten().as_deref(),
        Some("1749-01")
    );
    Ok(())
}

#[test]
fn headerless_files_get_positional_names() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_file(tmp.path(), "raw.csv", "1,x\n2,y\n3,z\n")?;

    let options = ReadOptions {
        has_header: false,
        chunk_size: 2,
        ..ReadOptions::default()
    };
    let mut reader = ChunkReader::open(&path, options)?;
    assert_eq!(reader.columns(), ["column_0", "column_1"]);

    let first = reader.next().expect("first chunk")?;
    assert_eq!(first.f64_values("column_0")?, vec![Some(1.0), Some(2.0)]);
    let second = reader.next().expect("second chunk")?;
    assert_eq!(second.string_values("column_1")?, vec![Some("z".to_string())]);
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn short_rows_are_padded_and_null_tokens_read_as_null() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_file(tmp.path(), "gaps.csv", "a,b,c\n1,NA,x\n2\n,3.5,null\n")?;

    let chunk = reader(&path, 10)?.next().expect("chunk")?;
    assert_eq!(chunk.num_rows(), 3);
    assert_eq!(chunk.f64_values("a")?, vec![Some(1.0), Some(2.0), None]);
    assert_eq!(chunk.f64_values("b")?, vec![None, None, Some(3.5)]);
    assert_eq!(chunk.string_values("c")?, vec![Some("x".to_string()), None, None]);
    Ok(())
}

#[test]
fn byte_order_mark_is_stripped_from_header() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_file(tmp.path(), "bom.csv", "\u{feff}id,name\n1,a\n")?;

    let reader = reader(&path, 10)?;
    assert_eq!(reader.columns(), ["id", "name"]);
    Ok(())
}

#[test]
fn custom_delimiter() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_file(tmp.path(), "semi.csv", "x;y\n1;true\n2;false\n")?;

    let options = ReadOptions {
        delimiter: b';',
        ..ReadOptions::default()
    };
    let chunk = ChunkReader::open(&path, options)?.next().expect("chunk")?;
    assert_eq!(chunk.schema().field(1).data_type(), &DataType::Boolean);
    assert_eq!(chunk.f64_values("x")?, vec![Some(1.0), Some(2.0)]);
    Ok(())
}

#[test]
fn declared_type_that_does_not_parse_is_a_cast_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_sunspots(tmp.path())?;

    let options = ReadOptions {
        column_types: ColumnTypeMap::new().with("Sunspots", ColumnType::Int64),
        ..ReadOptions::default()
    };
    let mut reader = ChunkReader::open(&path, options)?;

    match reader.next() {
        Some(Err(Error::Cast { column, value, target, line })) => {
            assert_eq!(column, "Sunspots");
            assert_eq!(value, "58.0");
            assert_eq!(target, "int64");
            assert_eq!(line, 2);
        }
        other => panic!("expected a cast error, got {other:?}"),
    }
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn chunks_may_infer_different_types() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_file(tmp.path(), "mixed.csv", "v\n1\n2\n2.5\n3.5\n")?;

    let chunks: Vec<_> = reader(&path, 2)?.collect::<Result<_, _>>()?;
    assert_eq!(chunks[0].schema().field(0).data_type(), &DataType::Int64);
    assert_eq!(chunks[1].schema().field(0).data_type(), &DataType::Float64);
    Ok(())
}

#[test]
fn skip_rows_past_end_yields_nothing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_file(tmp.path(), "short.csv", "a\n1\n")?;

    let options = ReadOptions {
        skip_rows: 5,
        ..ReadOptions::default()
    };
    let mut reader = ChunkReader::open(&path, options)?;
    assert!(reader.columns().is_empty());
    assert!(reader.next().is_none());
    Ok(())
}
