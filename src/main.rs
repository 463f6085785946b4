use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

mod charts;
mod completion;
mod error;
mod export;
mod fields;
mod filters;
mod ingest;
mod job;
mod kpi;
mod models;
mod pipeline;
mod report;
mod retry;
mod schedule;
mod sheets;
mod worker;

use completion::GeminiClient;
use export::ExportFormat;
use job::{AnalysisJob, PauseSignal};
use models::{DatasetCollection, FilterSpec, Record};
use pipeline::{Pipeline, PipelineConfig, RunOutcome};
use schedule::Frequency;
use sheets::{SheetTarget, SheetsClient, TabularStore, WriteMode};
use worker::{AggregationRequest, AggregationWorker};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Parser)]
#[command(name = "ticket-insights")]
#[command(about = "Ticket dashboard aggregation and batched AI ticket analysis", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScheduleFrequency {
    Hourly,
    Daily,
}

#[derive(clap::Args)]
struct SheetArgs {
    /// Spreadsheet URL containing `/d/<id>`
    #[arg(long)]
    sheet_url: String,
    #[arg(long)]
    sheet: String,
    #[arg(long, default_value_t = 1)]
    start_row: u32,
}

impl SheetArgs {
    fn target(&self) -> anyhow::Result<SheetTarget> {
        Ok(SheetTarget::from_url(
            &self.sheet_url,
            &self.sheet,
            self.start_row,
        )?)
    }
}

#[derive(clap::Args)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    format: ExportFormat,
    /// Write results here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter a dataset collection and compute KPIs and chart series
    Aggregate {
        /// JSON object of datasets keyed like `KSA_Widget`
        #[arg(long)]
        datasets: Option<PathBuf>,
        /// JSON array of rows used when no datasets file is given
        #[arg(long)]
        raw: Option<PathBuf>,
        #[arg(long, default_value = "All")]
        country: String,
        #[arg(long, default_value = "Widget")]
        source: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        compare: bool,
        #[arg(long)]
        csat_only: bool,
        #[arg(long)]
        test_mode: bool,
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze a CSV or JSON ticket file in batches (Ctrl-C pauses)
    Analyze {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        /// Save the job here when it pauses, stops or completes
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Continue a paused or stopped analysis from its checkpoint
    Resume {
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Check that a sheet is reachable
    CheckSheet {
        #[command(flatten)]
        sheet: SheetArgs,
    },
    /// Read rows from a sheet
    Fetch {
        #[command(flatten)]
        sheet: SheetArgs,
        /// Turn the first row into field names
        #[arg(long)]
        records: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Append or overwrite rows in a sheet from a JSON array
    Push {
        #[command(flatten)]
        sheet: SheetArgs,
        #[arg(long)]
        data: PathBuf,
        #[arg(long, value_enum, default_value_t = WriteMode::Append)]
        mode: WriteMode,
    },
    /// Fetch a sheet on a repeating schedule
    Schedule {
        #[command(flatten)]
        sheet: SheetArgs,
        #[arg(long, value_enum, default_value_t = ScheduleFrequency::Hourly)]
        frequency: ScheduleFrequency,
        /// Daily run time as HH:MM
        #[arg(long)]
        at: Option<String>,
        /// Stop after this many runs
        #[arg(long)]
        runs: Option<usize>,
        /// Directory receiving one JSON file per run
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

fn write_output(out: Option<&Path>, body: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Results written to {}.", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn sheets_client() -> anyhow::Result<SheetsClient> {
    let token = std::env::var("GOOGLE_ACCESS_TOKEN")
        .context("GOOGLE_ACCESS_TOKEN must be set to an OAuth token with the spreadsheets scope")?;
    Ok(SheetsClient::new(token, std::env::var("SHEETS_API_BASE").ok()))
}

async fn run_analysis(
    mut job: AnalysisJob,
    model: &str,
    checkpoint: Option<&Path>,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .context("GEMINI_API_KEY must be set to run ticket analysis")?;
    let client = GeminiClient::new(api_key, std::env::var("GEMINI_API_BASE").ok());

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(client, PipelineConfig::default()).with_events(events_tx);

    let pause = PauseSignal::default();
    let on_interrupt = pause.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt.request() {
                warn!("interrupted again, exiting without saving");
                std::process::exit(130);
            }
            warn!("pause requested, stopping after the current batch (Ctrl-C again to quit)");
        }
    });
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{event}");
        }
    });

    let outcome = pipeline.run(&mut job, model, &pause).await;
    drop(pipeline);
    printer.await?;

    if let Some(path) = checkpoint {
        job.save(path)?;
        debug!(path = %path.display(), "checkpoint saved");
    }

    match &outcome {
        RunOutcome::Completed => println!("Analysis Complete!"),
        RunOutcome::Paused => println!(
            "Analysis Paused at ticket {} of {}.",
            job.cursor,
            job.tickets.len()
        ),
        RunOutcome::Stopped { message } => {
            error!(%message, "analysis stopped");
            println!("Error: {message}. Processing paused; resume to retry from ticket {}.", job.cursor);
        }
    }
    if !matches!(outcome, RunOutcome::Completed) && checkpoint.is_none() {
        println!("No checkpoint given; partial results are below.");
    }

    let rendered = export::render(&job.results, output.format)?;
    write_output(output.out.as_deref(), &rendered)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Aggregate {
            datasets,
            raw,
            country,
            source,
            start,
            end,
            compare,
            csat_only,
            test_mode,
            format,
            out,
        } => {
            let database: Option<DatasetCollection> =
                datasets.as_deref().map(read_json).transpose()?;
            let raw_data: Option<Vec<Record>> = raw.as_deref().map(read_json).transpose()?;
            if database.is_none() && raw_data.is_none() {
                anyhow::bail!("provide --datasets or --raw");
            }

            let filter_params = FilterSpec {
                country,
                source,
                start_date: start,
                end_date: end,
                compare_enabled: compare,
                csat_only_enabled: csat_only,
                test_mode,
            };
            let request = AggregationRequest {
                raw_data,
                database,
                filter_params: filter_params.clone(),
            };

            let worker = AggregationWorker::spawn();
            let response = worker.submit(request).await?;
            let body = match format {
                ReportFormat::Json => serde_json::to_string_pretty(&response)?,
                ReportFormat::Markdown => report::build_report(&filter_params, &response),
            };
            write_output(out.as_deref(), &body)?;
        }
        Commands::Analyze {
            file,
            model,
            checkpoint,
            output,
        } => {
            let tickets = ingest::load_tickets(&file)
                .context("Error parsing file. Ensure valid JSON or CSV")?;
            println!("File loaded. Found {} tickets.", tickets.len());
            let job = AnalysisJob::new(tickets);
            info!(job = %job.id, "analysis job created");
            run_analysis(job, &model, checkpoint.as_deref(), &output).await?;
        }
        Commands::Resume {
            checkpoint,
            model,
            output,
        } => {
            let job = AnalysisJob::load(&checkpoint)?;
            if !job.can_run() {
                println!("Job {} is already complete.", job.id);
                let rendered = export::render(&job.results, output.format)?;
                return write_output(output.out.as_deref(), &rendered);
            }
            println!(
                "Resuming job {} at ticket {} of {}.",
                job.id,
                job.cursor,
                job.tickets.len()
            );
            run_analysis(job, &model, Some(&checkpoint), &output).await?;
        }
        Commands::CheckSheet { sheet } => {
            let target = sheet.target()?;
            sheets_client()?.probe(&target).await?;
            println!("Connection Successful! Sheet is accessible.");
        }
        Commands::Fetch {
            sheet,
            records,
            out,
        } => {
            let target = sheet.target()?;
            let rows = sheets_client()?.fetch_rows(&target).await?;
            let body = if records {
                serde_json::to_string_pretty(&sheets::rows_to_records(&rows))?
            } else {
                serde_json::to_string_pretty(&rows)?
            };
            println!("Fetch complete. Retrieved {} rows.", rows.len());
            write_output(out.as_deref(), &body)?;
        }
        Commands::Push { sheet, data, mode } => {
            let target = sheet.target()?;
            let json: serde_json::Value = read_json(&data)?;
            let grid = sheets::value_grid(&json)?;
            sheets_client()?.write_rows(&target, mode, &grid).await?;
            match mode {
                WriteMode::Append => println!("Append successful! {} rows.", grid.len()),
                WriteMode::Update => println!("Update successful!"),
            }
        }
        Commands::Schedule {
            sheet,
            frequency,
            at,
            runs,
            out_dir,
        } => {
            let frequency = match frequency {
                ScheduleFrequency::Hourly => Frequency::Hourly,
                ScheduleFrequency::Daily => {
                    let at = at.context("--at HH:MM is required for a daily schedule")?;
                    let time = NaiveTime::parse_from_str(&at, "%H:%M")
                        .with_context(|| format!("invalid time {at}, expected HH:MM"))?;
                    Frequency::Daily(time)
                }
            };
            let target = sheet.target()?;
            let client = sheets_client()?;
            let (client, target, out_dir) = (&client, &target, &out_dir);
            println!("Scheduler started.");

            schedule::run_schedule(frequency, runs, move || async move {
                match client.fetch_rows(&target).await {
                    Ok(rows) => {
                        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
                        let path = out_dir.join(format!("fetch-{stamp}.json"));
                        let written = serde_json::to_string_pretty(&rows)
                            .map_err(anyhow::Error::from)
                            .and_then(|body| Ok(std::fs::write(&path, body)?));
                        match written {
                            Ok(()) => println!("Fetched {} rows into {}.", rows.len(), path.display()),
                            Err(err) => error!(error = %err, "failed to store scheduled fetch"),
                        }
                    }
                    Err(err) => error!(error = %err, "scheduled fetch failed"),
                }
            })
            .await;
        }
    }

    Ok(())
}
