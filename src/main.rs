use anyhow::{Context, Result, ensure};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use parquetify::config::settings::{ConvertSettings, Settings};
use parquetify::io::glob::expand_inputs;
use parquetify::logging::{self, Verbosity};
use parquetify::{ObjectOutcome, TransferOrchestrator, convert_all, read_part};
use std::path::PathBuf;
use std::process::ExitCode;

fn config_arg(required: bool) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .required(required)
        .help("Settings file (TOML); PARQUETIFY_* environment variables override it")
}

fn cli() -> Command {
    Command::new("parquetify")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert CSV files into chunked Parquet parts and move them to object storage")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More log output (-v progress, -vv per chunk)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only log errors"),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert local files into Parquet parts")
                .arg(
                    Arg::new("inputs")
                        .value_name("PATTERN")
                        .required(true)
                        .num_args(1..)
                        .help("Files or glob patterns, e.g. 'data/**/*.csv'"),
                )
                .arg(config_arg(false))
                .arg(
                    Arg::new("chunk-size")
                        .long("chunk-size")
                        .value_name("ROWS")
                        .value_parser(value_parser!(usize))
                        .help("Rows per part [default: 100000]"),
                )
                .arg(
                    Arg::new("skip-rows")
                        .long("skip-rows")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("Records to discard before the header"),
                )
                .arg(
                    Arg::new("encoding")
                        .long("encoding")
                        .value_name("LABEL")
                        .help("Input text encoding [default: utf-8]"),
                )
                .arg(
                    Arg::new("fallback-encoding")
                        .long("fallback-encoding")
                        .value_name("LABEL")
                        .help("Encoding retried once after a decode failure, or 'none'"),
                )
                .arg(
                    Arg::new("compression")
                        .long("compression")
                        .value_name("CODEC")
                        .help("snappy, gzip, zstd, brotli, lz4 or none"),
                )
                .arg(
                    Arg::new("dtype")
                        .long("dtype")
                        .value_name("COL=TYPE")
                        .action(ArgAction::Append)
                        .help("Pin a column type (utf8, int64, float64, boolean)"),
                )
                .arg(
                    Arg::new("delimiter")
                        .long("delimiter")
                        .short('d')
                        .value_name("CHAR"),
                )
                .arg(
                    Arg::new("no-header")
                        .long("no-header")
                        .action(ArgAction::SetTrue)
                        .help("First record is data; columns are named column_0, column_1, ..."),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("verify")
                        .long("verify")
                        .action(ArgAction::SetTrue)
                        .help("Read every part back and check its row count"),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Convert one local file and upload its parts to the target bucket")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(config_arg(true)),
        )
        .subcommand(
            Command::new("sync")
                .about("Convert every object under the source prefix and upload the parts")
                .arg(config_arg(true)),
        )
}

fn load_settings(m: &ArgMatches) -> Result<Settings> {
    let path = m.get_one::<PathBuf>("config");
    Settings::load(path.map(PathBuf::as_path)).context("load settings")
}

/// Flags win over the configured verbosity.
fn init_logging(m: &ArgMatches, configured: Verbosity) -> Result<()> {
    let verbose = m.get_count("verbose");
    let quiet = m.get_flag("quiet");
    let verbosity = if verbose == 0 && !quiet {
        configured
    } else {
        Verbosity::from_flags(verbose, quiet)
    };
    logging::init(verbosity)?;
    Ok(())
}

fn apply_overrides(settings: &mut ConvertSettings, m: &ArgMatches) -> Result<()> {
    if let Some(&rows) = m.get_one::<usize>("chunk-size") {
        settings.chunk_size = rows;
    }
    if let Some(&rows) = m.get_one::<usize>("skip-rows") {
        settings.skip_rows = rows;
    }
    if let Some(label) = m.get_one::<String>("encoding") {
        settings.encoding = Some(label.clone());
    }
    if let Some(label) = m.get_one::<String>("fallback-encoding") {
        settings.fallback_encoding = label.clone();
    }
    if let Some(codec) = m.get_one::<String>("compression") {
        settings.compression = Some(codec.parse()?);
    }
    if let Some(entries) = m.get_many::<String>("dtype") {
        settings.dtype.extend(entries.cloned());
    }
    if let Some(delimiter) = m.get_one::<String>("delimiter") {
        settings.delimiter = delimiter.clone();
    }
    if m.get_flag("no-header") {
        settings.has_header = false;
    }
    if let Some(dir) = m.get_one::<PathBuf>("output-dir") {
        settings.output_dir = dir.clone();
    }
    Ok(())
}

fn run_convert(m: &ArgMatches) -> Result<ExitCode> {
    let settings = load_settings(m)?;
    init_logging(m, settings.log.verbosity)?;

    let mut convert_settings = settings.convert;
    apply_overrides(&mut convert_settings, m)?;
    let options = convert_settings.to_options()?;
    let verify = m.get_flag("verify");

    let patterns: Vec<String> = m
        .get_many::<String>("inputs")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    for file in expand_inputs(&patterns)? {
        let parts =
            convert_all(&file, &options).with_context(|| format!("convert {}", file.display()))?;
        for part in &parts {
            if verify {
                let chunk = read_part(&part.path)?;
                ensure!(
                    chunk.num_rows() == part.rows,
                    "{} has {} rows, expected {}",
                    part.path.display(),
                    chunk.num_rows(),
                    part.rows
                );
            }
            println!("{}", part.path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn orchestrator(settings: &Settings) -> Result<TransferOrchestrator> {
    let storage = settings.storage.build()?;
    let options = settings.convert.to_options()?;
    Ok(TransferOrchestrator::new(
        storage,
        settings.transfer.to_config(),
        options,
    )?)
}

fn run_upload(m: &ArgMatches) -> Result<ExitCode> {
    let settings = load_settings(m)?;
    init_logging(m, settings.log.verbosity)?;

    let file = m
        .get_one::<PathBuf>("file")
        .context("missing FILE argument")?;
    let report = orchestrator(&settings)?
        .convert_and_upload(file)
        .with_context(|| format!("upload {}", file.display()))?;

    for key in &report.uploaded_keys {
        println!("{key}");
    }
    eprintln!(
        "{}: {} parts, {} rows{}",
        file.display(),
        report.parts(),
        report.rows,
        if report.fallback_used { " (fallback encoding)" } else { "" }
    );
    Ok(ExitCode::SUCCESS)
}

fn run_sync(m: &ArgMatches) -> Result<ExitCode> {
    let settings = load_settings(m)?;
    init_logging(m, settings.log.verbosity)?;

    let report = orchestrator(&settings)?.convert_and_upload_from_storage()?;

    for object in &report.objects {
        match &object.outcome {
            ObjectOutcome::Converted(file) => println!(
                "converted {}: {} parts, {} rows",
                object.key,
                file.parts(),
                file.rows
            ),
            ObjectOutcome::Skipped { reason, .. } => println!("skipped {}: {reason}", object.key),
            ObjectOutcome::Failed { error } => println!("failed {}: {error}", object.key),
        }
    }
    println!(
        "{} converted, {} skipped, {} failed; {} parts, {} rows uploaded",
        report.converted().count(),
        report.skipped().count(),
        report.failed().count(),
        report.parts_uploaded(),
        report.rows_uploaded()
    );

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("convert", m)) => run_convert(m),
        Some(("upload", m)) => run_upload(m),
        Some(("sync", m)) => run_sync(m),
        _ => {
            eprintln!("Please specify a valid subcommand");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
