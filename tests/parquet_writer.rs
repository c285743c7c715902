use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquetify::{Chunk, ChunkWriter, Codec, read_part};
use std::sync::Arc;

fn sample(rows: usize) -> anyhow::Result<Chunk> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("station", DataType::Utf8, true),
        Field::new("reading", DataType::Float64, true),
    ]));
    let stations: Vec<String> = (0..rows).map(|i| format!("s{i}")).collect();
    let readings: Vec<f64> = (0..rows).map(|i| i as f64 * 0.5).collect();
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(stations)),
            Arc::new(Float64Array::from(readings)),
        ],
    )?;
    Ok(Chunk::new(batch))
}

#[test]
fn written_part_reads_back_unchanged() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let writer = ChunkWriter::new(tmp.path().join("nested/out"), None);
    let chunk = sample(5)?;

    let part = writer.write(&chunk, "readings", 7)?;

    assert_eq!(part.file_name, "readings_part_0007.parquet");
    assert_eq!(part.index, 7);
    assert_eq!(part.rows, 5);
    assert_eq!(part.codec, Codec::Snappy);
    assert!(part.path.starts_with(writer.output_dir()));
    let back = read_part(&part.path)?;
    assert_eq!(back.column_names(), chunk.column_names());
    assert_eq!(back.batch().columns(), chunk.batch().columns());
    Ok(())
}

#[test]
fn explicit_codecs_add_a_suffix() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let chunk = sample(3)?;

    for (codec, name) in [
        (Codec::Gzip, "r_part_0001.parquet.gzip"),
        (Codec::Snappy, "r_part_0001.parquet.snappy"),
        (Codec::Uncompressed, "r_part_0001.parquet"),
    ] {
        let part = ChunkWriter::new(tmp.path().join(codec.name()), Some(codec)).write(&chunk, "r", 1)?;
        assert_eq!(part.file_name, name);
        assert_eq!(part.codec, codec);
        assert_eq!(read_part(&part.path)?.num_rows(), 3);
    }
    Ok(())
}

#[test]
fn zero_row_chunk_is_still_a_valid_part() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let part = ChunkWriter::new(tmp.path(), None).write(&sample(0)?, "empty", 1)?;

    let back = read_part(&part.path)?;
    assert_eq!(back.num_rows(), 0);
    assert_eq!(back.column_names(), vec!["station", "reading"]);
    Ok(())
}

#[test]
fn rewriting_an_index_replaces_the_part() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let writer = ChunkWriter::new(tmp.path(), None);

    writer.write(&sample(4)?, "r", 1)?;
    let part = writer.write(&sample(2)?, "r", 1)?;

    assert_eq!(read_part(&part.path)?.num_rows(), 2);
    let files: Vec<_> = std::fs::read_dir(tmp.path())?.collect::<Result<_, _>>()?;
    assert_eq!(files.len(), 1);
    Ok(())
}
