mod common;

use common::*;
use parquetify::{
    Chunk, Codec, ColumnType, ColumnTypeMap, ConvertOptions, Error, TransformArgs, convert,
    convert_all, read_part,
};
use std::fs;

fn options_in(dir: &std::path::Path) -> ConvertOptions {
    ConvertOptions::new()
        .with_chunk_size(10)
        .with_output_dir(dir.join("out"))
}

#[test]
fn sunspots_split_into_three_parts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let parts = convert_all(&source, &options_in(tmp.path()))?;

    assert_eq!(rows_per_part(&parts), vec![10, 10, 8]);
    let names: Vec<_> = parts.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "sunspots_part_0001.parquet",
            "sunspots_part_0002.parquet",
            "sunspots_part_0003.parquet"
        ]
    );
    assert!(parts.iter().all(|p| p.codec == Codec::Snappy));
    assert_close(sum_column(&parts, "Sunspots")?, SUNSPOTS_SUM);
    Ok(())
}

#[test]
fn pipeline_is_lazy_and_ordered() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;
    let out = tmp.path().join("out");

    let mut pipeline = convert(&source, &options_in(tmp.path()))?;
    assert!(list_dir(&out)?.is_empty());

    let first = pipeline.next().expect("first part")?;
    assert_eq!(first.index, 1);
    assert_eq!(list_dir(&out)?, vec!["sunspots_part_0001.parquet"]);

    let rest: Vec<_> = pipeline.by_ref().collect::<Result<_, _>>()?;
    assert_eq!(rest.iter().map(|p| p.index).collect::<Vec<_>>(), vec![2, 3]);
    assert!(pipeline.next().is_none());
    Ok(())
}

#[test]
fn transform_adds_one_to_every_value() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let options = options_in(tmp.path())
        .with_transform(|chunk: Chunk, _: &TransformArgs| -> anyhow::Result<Chunk> {
            Ok(chunk.map_f64("Sunspots", |v| v + 1.0)?)
        });
    let parts = convert_all(&source, &options)?;

    assert_close(sum_column(&parts, "Sunspots")?, 2215.0);
    Ok(())
}

#[test]
fn skip_rows_drops_leading_title_line() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_file(
        tmp.path(),
        "titled.csv",
        format!("Monthly mean total sunspot number\n{}", sunspots_csv()),
    )?;

    let parts = convert_all(&source, &options_in(tmp.path()).with_skip_rows(1))?;

    assert_eq!(rows_per_part(&parts), vec![10, 10, 8]);
    assert_close(sum_column(&parts, "Sunspots")?, SUNSPOTS_SUM);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_input_matches_plain_input() -> anyhow::Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let tmp = tempfile::tempdir()?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(sunspots_csv().as_bytes())?;
    let source = write_file(tmp.path(), "sunspots.csv.gz", encoder.finish()?)?;

    let parts = convert_all(&source, &options_in(tmp.path()))?;

    assert_eq!(parts[0].file_name, "sunspots_part_0001.parquet");
    assert_eq!(rows_per_part(&parts), vec![10, 10, 8]);
    assert_close(sum_column(&parts, "Sunspots")?, SUNSPOTS_SUM);
    Ok(())
}

#[test]
fn declared_types_override_inference() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let types = ColumnTypeMap::new()
        .with("Month", ColumnType::Utf8)
        .with("Sunspots", ColumnType::Float64)
        .with("Sunspts", ColumnType::Int64);
    let parts = convert_all(&source, &options_in(tmp.path()).with_column_types(types))?;

    assert_close(sum_column(&parts, "Sunspots")?, SUNSPOTS_SUM);
    let chunk = read_part(&parts[0].path)?;
    assert_eq!(chunk.column_names(), vec!["Month", "Sunspots"]);
    Ok(())
}

#[test]
fn transform_columns_appear_in_every_part() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let options = options_in(tmp.path())
        .with_transform(|chunk: Chunk, args: &TransformArgs| -> anyhow::Result<Chunk> {
            let station = args.get_str("station").unwrap_or("unknown").to_string();
            let doubled = chunk.column("Sunspots").cloned();
            let chunk = match doubled {
                Some(values) => chunk.with_column("Doubled", values)?,
                None => anyhow::bail!("no Sunspots column"),
            };
            Ok(chunk
                .map_f64("Doubled", |v| v * 2.0)?
                .with_constant("Station", station)?)
        })
        .with_transform_args(TransformArgs::new().with("station", "greenwich"));
    let parts = convert_all(&source, &options)?;

    assert_eq!(parts.len(), 3);
    for part in &parts {
        let chunk = read_part(&part.path)?;
        assert_eq!(chunk.column_names(), vec!["Month", "Sunspots", "Doubled", "Station"]);
        let stations = chunk.string_values("Station")?;
        assert_eq!(stations.len(), part.rows);
        assert!(stations.iter().all(|s| s.as_deref() == Some("greenwich")));
    }
    assert_close(sum_column(&parts, "Doubled")?, 2.0 * SUNSPOTS_SUM);
    Ok(())
}

#[test]
fn transform_may_drop_rows() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let options = options_in(tmp.path())
        .with_transform(|chunk: Chunk, _: &TransformArgs| -> anyhow::Result<Chunk> {
            let mask: arrow::array::BooleanArray = chunk
                .f64_values("Sunspots")?
                .into_iter()
                .map(|v| v.map(|v| v >= 100.0))
                .collect();
            Ok(chunk.filter(&mask)?)
        });
    let parts = convert_all(&source, &options)?;

    // 158.6, 100.0 and 103.0 all fall in the second chunk.
    assert_eq!(rows_per_part(&parts), vec![0, 3, 0]);
    assert_close(sum_column(&parts, "Sunspots")?, 361.6);
    Ok(())
}

#[test]
fn repeated_runs_partition_identically() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let first = convert_all(&source, &options_in(tmp.path()).with_output_dir(tmp.path().join("a")))?;
    let second =
        convert_all(&source, &options_in(tmp.path()).with_output_dir(tmp.path().join("b")))?;

    assert_eq!(rows_per_part(&first), rows_per_part(&second));
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.file_name, b.file_name);
        assert_eq!(read_part(&a.path)?, read_part(&b.path)?);
    }
    Ok(())
}

#[test]
fn explicit_codec_is_in_the_file_name() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let parts = convert_all(&source, &options_in(tmp.path()).with_codec(Codec::Zstd))?;

    assert_eq!(parts[2].file_name, "sunspots_part_0003.parquet.zstd");
    assert_close(sum_column(&parts, "Sunspots")?, SUNSPOTS_SUM);
    Ok(())
}

/// Four rows; the Windows-1252 byte for "ï" sits in the second chunk.
fn latin1_file(dir: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    let mut bytes = b"name,value\ncafe,1\ntea,2\n".to_vec();
    bytes.extend_from_slice(b"na\xefve,3\nlatte,4\n");
    write_file(dir, "menu.csv", bytes)
}

#[test]
fn latin1_input_restarts_with_fallback_encoding() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = latin1_file(tmp.path())?;
    let options = options_in(tmp.path()).with_chunk_size(2);

    let mut pipeline = convert(&source, &options)?;
    let indices: Vec<usize> = pipeline
        .by_ref()
        .map(|part| part.map(|p| p.index))
        .collect::<Result<_, _>>()?;

    // Part 1 from the UTF-8 attempt, then the full restart.
    assert_eq!(indices, vec![1, 1, 2]);
    assert!(pipeline.fallback_used());
    assert_eq!(pipeline.encoding().name(), "windows-1252");

    let parts = convert_all(&source, &options)?;
    assert_eq!(rows_per_part(&parts), vec![2, 2]);
    let names = read_part(&parts[1].path)?.string_values("name")?;
    assert_eq!(names, vec![Some("naïve".to_string()), Some("latte".to_string())]);
    Ok(())
}

#[test]
fn decode_error_without_fallback() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = latin1_file(tmp.path())?;
    let options = options_in(tmp.path())
        .with_chunk_size(2)
        .with_fallback_encoding(None);

    let err = convert_all(&source, &options).unwrap_err();
    assert!(matches!(err, Error::Decode { encoding: "UTF-8", line: 4 }));
    Ok(())
}

#[test]
fn explicit_latin1_needs_no_fallback() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = latin1_file(tmp.path())?;
    let options = options_in(tmp.path()).with_encoding_label("latin1")?;

    let mut pipeline = convert(&source, &options)?;
    let parts: Vec<_> = pipeline.by_ref().collect::<Result<_, _>>()?;
    assert_eq!(parts.len(), 1);
    assert!(!pipeline.fallback_used());
    Ok(())
}

#[test]
fn empty_and_header_only_files_produce_no_parts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let empty = write_file(tmp.path(), "empty.csv", "")?;
    let header = write_file(tmp.path(), "header.csv", "Month,Sunspots\n")?;

    assert!(convert_all(&empty, &options_in(tmp.path()))?.is_empty());
    assert!(convert_all(&header, &options_in(tmp.path()))?.is_empty());
    assert!(list_dir(&tmp.path().join("out"))?.is_empty());
    Ok(())
}

#[test]
fn invalid_options_fail_before_reading() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let err = convert(&source, &options_in(tmp.path()).with_chunk_size(0)).unwrap_err();
    assert!(err.is_config());

    let err = convert(tmp.path().join("missing.csv"), &options_in(tmp.path())).unwrap_err();
    assert!(err.is_not_found());

    let err = ConvertOptions::new().with_file_type("json").unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    Ok(())
}

#[test]
fn transform_failure_aborts_the_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let options = options_in(tmp.path())
        .with_transform(|chunk: Chunk, _: &TransformArgs| -> anyhow::Result<Chunk> {
            Ok(chunk.drop_column("Missing")?)
        });
    let mut pipeline = convert(&source, &options)?;

    assert!(matches!(pipeline.next(), Some(Err(Error::Transform(_)))));
    assert!(pipeline.next().is_none());
    Ok(())
}

#[test]
fn overlong_row_is_malformed() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_file(tmp.path(), "bad.csv", "a,b\n1,2\n3,4,5\n")?;

    let err = convert_all(&source, &options_in(tmp.path())).unwrap_err();
    assert!(matches!(err, Error::Malformed { line: 3, .. }));
    fs::remove_file(&source)?;
    Ok(())
}

#[test]
fn numeric_transform_on_text_column_fails_instead_of_nulling() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_sunspots(tmp.path())?;

    let options = options_in(tmp.path())
        .with_transform(|chunk: Chunk, _: &TransformArgs| -> anyhow::Result<Chunk> {
            Ok(chunk.map_f64("Month", |v| v + 1.0)?)
        });

    let err = convert_all(&source, &options).unwrap_err();
    assert!(matches!(err, Error::Transform(_)));
    assert!(list_dir(&tmp.path().join("out"))?.is_empty());
    Ok(())
}

#[test]
fn failure_mid_file_removes_parts_already_written() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_file(tmp.path(), "late.csv", "a,b\n1,2\n3,4\n5,6\n7,8,9\n")?;

    let mut pipeline = convert(&source, &options_in(tmp.path()).with_chunk_size(2))?;
    assert_eq!(pipeline.next().expect("first part")?.rows, 2);
    assert!(matches!(pipeline.next(), Some(Err(Error::Malformed { line: 5, .. }))));

    let err = convert_all(&source, &options_in(tmp.path()).with_chunk_size(2)).unwrap_err();
    assert!(matches!(err, Error::Malformed { line: 5, .. }));
    assert!(list_dir(&tmp.path().join("out"))?.is_empty());
    Ok(())
}

#[test]
fn padded_header_keeps_its_spaces_and_takes_declared_types() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = write_file(tmp.path(), "padded.csv", "Month, Sunspots\n1749-01,58\n1749-02,62\n")?;

    let types = ColumnTypeMap::parse_entries([" Sunspots=float64"])?;
    let parts = convert_all(&source, &options_in(tmp.path()).with_column_types(types))?;

    let chunk = read_part(&parts[0].path)?;
    assert_eq!(chunk.column_names(), vec!["Month", " Sunspots"]);
    assert_eq!(
        chunk.schema().field(1).data_type(),
        &arrow::datatypes::DataType::Float64
    );
    assert_close(sum_column(&parts, " Sunspots")?, 120.0);
    Ok(())
}
