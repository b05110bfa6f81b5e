use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chronicle_files::convention::timespan;
use chronicle_files::{
    CancellationToken, FlatFileSource, ReadRequest, Representation, SourceConfig,
    StructuredFileEngine,
};
use clap::{Parser, Subcommand};
use log::info;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

#[derive(Parser)]
#[command(
    name = "chronicle-files",
    version,
    about = "Inspect and read date/time structured file archives"
)]
struct Cli {
    /// Source config (JSON with root and per-stream naming conventions)
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured streams
    Streams,
    /// Print the time range covered by a stream
    Range { stream: String },
    /// Print the share of a window backed by files
    Availability {
        stream: String,
        /// Window begin (RFC 3339)
        #[arg(long)]
        begin: String,
        /// Window end (RFC 3339)
        #[arg(long)]
        end: String,
        /// Expected file size in bytes; presence counts as full otherwise
        #[arg(long = "file-size")]
        file_size: Option<u64>,
        /// Worker threads for scoring (overrides the config)
        #[arg(long)]
        parallelism: Option<usize>,
    },
    /// Read raw samples of a window into a file
    Read {
        stream: String,
        #[arg(long)]
        begin: String,
        #[arg(long)]
        end: String,
        /// Sample period as [d.]hh:mm:ss[.fffffff]
        #[arg(long = "sample-period")]
        sample_period: String,
        /// Bytes per sample
        #[arg(long = "element-size", default_value_t = 8)]
        element_size: usize,
        /// Data output path; status bytes go to `<output>.status`
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = SourceConfig::load(&cli.config)?;
    let mut out = io::BufWriter::new(io::stdout());
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Streams => {
            let mut ids: Vec<&String> = config.streams.keys().collect();
            ids.sort();
            for id in ids {
                writeln!(out, "{id}")?;
            }
        }
        Commands::Range { stream } => {
            let source = FlatFileSource::from_config(&config);
            let engine = StructuredFileEngine::new(config.root(), source)?;
            let range = engine.time_range(&stream, &cancel)?;
            if range.is_empty() {
                writeln!(out, "{stream}: no data")?;
            } else {
                writeln!(
                    out,
                    "{stream}: {} .. {}",
                    range.begin.format(&Rfc3339)?,
                    range.end.format(&Rfc3339)?
                )?;
            }
        }
        Commands::Availability {
            stream,
            begin,
            end,
            file_size,
            parallelism,
        } => {
            let mut source = FlatFileSource::from_config(&config);
            if let Some(bytes) = file_size {
                source = source.with_expected_file_size(bytes);
            }
            let mut options = config.availability_options();
            if let Some(parallelism) = parallelism {
                options.parallelism = parallelism.max(1);
            }
            let engine = StructuredFileEngine::new(config.root(), source)?;
            let availability = engine.availability_with(
                &stream,
                parse_utc(&begin)?,
                parse_utc(&end)?,
                &options,
                &cancel,
            )?;
            writeln!(out, "{stream}: {:.2}%", availability * 100.0)?;
        }
        Commands::Read {
            stream,
            begin,
            end,
            sample_period,
            element_size,
            output,
        } => {
            let sample_period = timespan::parse(&sample_period)
                .ok_or_else(|| format!("invalid sample period '{sample_period}'"))?;
            let (begin, end) = (parse_utc(&begin)?, parse_utc(&end)?);
            let representation = Representation::new(sample_period, element_size);
            let (mut data, mut status) = representation.create_buffers(begin, end)?;

            let source = FlatFileSource::from_config(&config);
            let engine = StructuredFileEngine::new(config.root(), source)?;
            let mut request = ReadRequest::new(&stream, representation, &mut data, &mut status);
            engine.read(begin, end, &mut request, &cancel)?;

            let confirmed = status.iter().filter(|&&flag| flag == 1).count();
            write_outputs(&output, &data, &status)?;
            info!("wrote {} to {}", stream, output.display());
            writeln!(
                out,
                "{stream}: {confirmed} of {} samples confirmed",
                status.len()
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_utc(text: &str) -> Result<OffsetDateTime, Box<dyn Error>> {
    let value = OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|err| format!("invalid timestamp '{text}': {err}"))?;
    Ok(value.to_offset(UtcOffset::UTC))
}

fn write_outputs(output: &Path, data: &[u8], status: &[u8]) -> io::Result<()> {
    fs::write(output, data)?;
    let mut status_path = output.as_os_str().to_owned();
    status_path.push(".status");
    fs::write(PathBuf::from(status_path), status)
}
