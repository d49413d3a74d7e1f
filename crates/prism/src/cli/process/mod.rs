//! The `prism process` command for applying a batch.

mod setup;
mod summary;

use clap::{Args, ValueEnum};
use prism_core::{BatchProcessor, BatchProgress, OutputFormat as CoreOutputFormat, OutputWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use setup::{apply_overrides, read_batch};
use summary::{create_progress_bar, print_summary};

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Batch file (JSON); use `-` to read from stdin
    #[arg(required = true)]
    pub batch: PathBuf,

    /// Directory containing source images named by id (e.g. `12.jpg`)
    #[arg(long, env = "PRISM_IMAGES_DIR")]
    pub images: Option<String>,

    /// Write results here instead of over the source images
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Number of records processed concurrently
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Resolve and report everything, but apply no effects
    #[arg(long)]
    pub dry_run: bool,
}

/// Supported report formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON document
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: prism_core::Config) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args)?;
    let batch = read_batch(&args.batch)?;

    let format = match args.format {
        Some(format) => format.into(),
        // Validated by apply_overrides
        None => CoreOutputFormat::parse(&config.output.format).unwrap_or(CoreOutputFormat::Json),
    };

    let processor = BatchProcessor::new(&config);
    tracing::info!(
        "Loaded {} batch entr{} from {:?}",
        batch.len(),
        if batch.len() == 1 { "y" } else { "ies" },
        args.batch
    );

    let progress = create_progress_bar(batch.len() as u64);
    let report = processor
        .process_with_progress(&batch, |event| match event {
            BatchProgress::Started { records, .. } => progress.set_length(records as u64),
            BatchProgress::Record(record) => {
                progress.set_message(format!("image {}", record.id));
                progress.inc(1);
            }
        })
        .await?;
    progress.finish_and_clear();

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut writer = OutputWriter::new(writer, format, config.output.pretty);
    writer.write_report(&report)?;
    writer.flush()?;
    if let Some(path) = &args.output {
        tracing::info!("Report written to {:?}", path);
    }

    print_summary(&report, processor.backend_name(), args.dry_run);
    Ok(())
}
