use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use retailcrab_core::checkpoint::{CheckpointStore, FsCheckpointStore};
use retailcrab_core::config::{PipelineConfig, RetryPolicy};
use retailcrab_core::pipeline::{Pipeline, PipelineMetrics, checkpoint_open_windows};
use retailcrab_core::sink::{ConsoleSink, JsonLinesSink, OutputStream, SinkDispatcher};
use retailcrab_core::source::{ChannelSource, SourceMessage};
use retailcrab_core::types::format_event_time;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "retailcrab")]
#[command(about = "Windowed KPIs over a stream of retail transactions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process JSON-lines transactions and emit raw events and window KPIs.
    Run {
        /// Input file, or `-` for stdin. One JSON payload per line; the line
        /// number is the source offset.
        #[arg(long, default_value = "-")]
        input: String,
        #[arg(long)]
        checkpoint_dir: PathBuf,
        /// `console`, `none`, or a JSON-lines file path.
        #[arg(long, default_value = "console")]
        raw_output: SinkTarget,
        #[arg(long, default_value = "console")]
        global_output: SinkTarget,
        #[arg(long, default_value = "console")]
        country_output: SinkTarget,
        #[arg(long, default_value_t = 60_000)]
        trigger_interval_ms: u64,
        #[arg(long, default_value_t = 60_000)]
        watermark_delay_ms: u64,
        #[arg(long, default_value_t = 60_000)]
        window_size_ms: u64,
        /// Defaults to the window size.
        #[arg(long)]
        window_slide_ms: Option<u64>,
        #[arg(long, default_value_t = 0)]
        allowed_lateness_ms: u64,
        #[arg(long, default_value_t = 10_000)]
        max_batch_size: usize,
        #[arg(long, default_value_t = 1)]
        checkpoint_every: u32,
        #[arg(long, default_value_t = 30_000)]
        sink_barrier_timeout_ms: u64,
        #[arg(long, default_value_t = 5)]
        sink_max_attempts: u32,
        #[arg(long, default_value_t = 100)]
        sink_initial_backoff_ms: u64,
        #[arg(long, default_value_t = 1_000)]
        raw_flush_ms: u64,
        #[arg(long, default_value_t = 0)]
        kpi_flush_ms: u64,
    },
    /// Print synthetic transactions as JSON lines.
    Generate {
        #[arg(long, default_value_t = 100)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Event time of the first transaction (RFC 3339).
        #[arg(long, default_value = "2020-11-20T10:00:00Z")]
        start: String,
        /// Mean spacing between transactions.
        #[arg(long, default_value_t = 5_000)]
        step_ms: i64,
    },
    /// Show what the latest checkpoint in a directory holds.
    InspectCheckpoint {
        #[arg(long)]
        checkpoint_dir: PathBuf,
    },
}

/// Where one output stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SinkTarget {
    Console,
    Disabled,
    File(PathBuf),
}

impl FromStr for SinkTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err("sink target must not be empty".to_string()),
            "console" => Ok(Self::Console),
            "none" => Ok(Self::Disabled),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            input,
            checkpoint_dir,
            raw_output,
            global_output,
            country_output,
            trigger_interval_ms,
            watermark_delay_ms,
            window_size_ms,
            window_slide_ms,
            allowed_lateness_ms,
            max_batch_size,
            checkpoint_every,
            sink_barrier_timeout_ms,
            sink_max_attempts,
            sink_initial_backoff_ms,
            raw_flush_ms,
            kpi_flush_ms,
        } => {
            let config = PipelineConfig {
                trigger_interval: Duration::from_millis(trigger_interval_ms),
                watermark_delay: Duration::from_millis(watermark_delay_ms),
                window_size: Duration::from_millis(window_size_ms),
                window_slide: Duration::from_millis(window_slide_ms.unwrap_or(window_size_ms)),
                allowed_lateness: Duration::from_millis(allowed_lateness_ms),
                max_batch_size,
                checkpoint_every,
                sink_barrier_timeout: Duration::from_millis(sink_barrier_timeout_ms),
                retry: RetryPolicy {
                    max_attempts: sink_max_attempts,
                    initial_backoff: Duration::from_millis(sink_initial_backoff_ms),
                    ..RetryPolicy::default()
                },
            };
            let mut dispatcher = SinkDispatcher::new(config.retry.clone());
            let raw_flush = Duration::from_millis(raw_flush_ms);
            let kpi_flush = Duration::from_millis(kpi_flush_ms);
            register_sink(&mut dispatcher, OutputStream::RawEvents, &raw_output, raw_flush)?;
            register_sink(&mut dispatcher, OutputStream::GlobalKpi, &global_output, kpi_flush)?;
            register_sink(&mut dispatcher, OutputStream::CountryKpi, &country_output, kpi_flush)?;

            let store = FsCheckpointStore::new(&checkpoint_dir).with_context(|| {
                format!("failed to open checkpoint dir {}", checkpoint_dir.display())
            })?;
            let pipeline = Pipeline::new(config, store, dispatcher)?;
            let metrics = run_pipeline(pipeline, &input, max_batch_size).await?;
            tracing::info!(
                batches = metrics.batches,
                received = metrics.received,
                decode_failures = metrics.decode_failures,
                late_dropped = metrics.late_dropped,
                global_windows = metrics.global_windows_emitted,
                country_windows = metrics.country_windows_emitted,
                sink_failures = metrics.sink_failures,
                checkpoints = metrics.checkpoints_written,
                "run finished"
            );
        }
        Commands::Generate {
            count,
            seed,
            start,
            step_ms,
        } => {
            let start = DateTime::parse_from_rfc3339(&start)
                .with_context(|| format!("invalid --start timestamp {start:?}"))?
                .with_timezone(&Utc);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for event in generate_events(seed, count, start.timestamp_millis(), step_ms) {
                writeln!(out, "{event}")?;
            }
            out.flush()?;
        }
        Commands::InspectCheckpoint { checkpoint_dir } => {
            let store = FsCheckpointStore::new(&checkpoint_dir)?;
            match store.load()? {
                None => println!("no checkpoint in {}", checkpoint_dir.display()),
                Some(checkpoint) => {
                    let watermark = checkpoint
                        .watermark
                        .map(format_event_time)
                        .unwrap_or_else(|| "none".to_string());
                    println!(
                        "batch_id={} source_offset={} watermark={} created_at={}",
                        checkpoint.batch_id,
                        checkpoint.source_offset,
                        watermark,
                        format_event_time(checkpoint.created_at_ms)
                    );
                    for (aggregator, open) in checkpoint_open_windows(&checkpoint)? {
                        println!("aggregator={aggregator} open_windows={open}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    // stdout belongs to the console sinks.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn register_sink(
    dispatcher: &mut SinkDispatcher,
    stream: OutputStream,
    target: &SinkTarget,
    flush_interval: Duration,
) -> anyhow::Result<()> {
    let name = stream.to_string();
    match target {
        SinkTarget::Disabled => Ok(()),
        SinkTarget::Console => dispatcher.register(
            name.clone(),
            stream,
            Box::new(ConsoleSink::new(name)),
            flush_interval,
        ),
        SinkTarget::File(path) => {
            let sink = JsonLinesSink::open(path)
                .with_context(|| format!("failed to open {} for {name}", path.display()))?;
            dispatcher.register(name, stream, Box::new(sink), flush_interval)
        }
    }
}

/// Run the blocking pipeline off the async runtime, cancelling it on Ctrl-C.
async fn run_pipeline<C>(
    pipeline: Pipeline<C>,
    input: &str,
    max_batch_size: usize,
) -> anyhow::Result<PipelineMetrics>
where
    C: CheckpointStore + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(max_batch_size);
    spawn_reader(input, tx)?;

    let cancel = CancellationToken::new();
    let mut task = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || {
            let mut source = ChannelSource::new(rx, max_batch_size);
            pipeline.run(&mut source, &cancel)
        }
    });

    tokio::select! {
        result = &mut task => return result.context("pipeline task panicked")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::info!("ctrl-c received, finishing current batch");
            cancel.cancel();
        }
    }
    task.await.context("pipeline task panicked")?
}

/// Feed input lines into the channel from a dedicated thread.
///
/// The whole input is sent from the start on every run; the source skips
/// offsets that the checkpoint already covers.
fn spawn_reader(input: &str, tx: Sender<SourceMessage>) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead + Send> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(Path::new(input))
            .with_context(|| format!("failed to open input {input}"))?;
        Box::new(BufReader::new(file))
    };
    let label = input.to_string();
    thread::Builder::new()
        .name("input-reader".to_string())
        .spawn(move || read_lines(reader, &tx, &label))
        .context("failed to spawn input reader")?;
    Ok(())
}

fn read_lines(reader: Box<dyn BufRead + Send>, tx: &Sender<SourceMessage>, label: &str) {
    for (offset, line) in reader.split(b'\n').enumerate() {
        let mut line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(input = label, offset, "input read failed: {err}");
                return;
            }
        };
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if tx.send(SourceMessage::new(offset as u64, line)).is_err() {
            // Pipeline stopped.
            return;
        }
    }
    tracing::info!(input = label, "input exhausted");
}

const COUNTRIES: [&str; 6] = [
    "United Kingdom",
    "France",
    "Germany",
    "EIRE",
    "Spain",
    "Netherlands",
];

const CATALOGUE: [(&str, &str, f64); 6] = [
    ("85123A", "WHITE HANGING HEART T-LIGHT HOLDER", 2.55),
    ("71053", "WHITE METAL LANTERN", 3.39),
    ("84406B", "CREAM CUPID HEARTS COAT HANGER", 2.75),
    ("22423", "REGENCY CAKESTAND 3 TIER", 12.75),
    ("21485", "RETROSPOT HEART HOT WATER BOTTLE", 4.95),
    ("23499", "SET 12 VINTAGE DOILY CHALK", 0.42),
];

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

/// Synthetic transactions: roughly `step_ms` apart with jitter of up to two
/// steps either way, about one in eight a return.
fn generate_events(seed: u64, count: usize, start_ms: i64, step_ms: i64) -> Vec<serde_json::Value> {
    let mut state = seed;
    let step = step_ms.max(1);
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let jitter = (lcg_next(&mut state) % (4 * step as u64 + 1)) as i64 - 2 * step;
        let ts = start_ms + i as i64 * step + jitter;
        let country = COUNTRIES[(lcg_next(&mut state) % COUNTRIES.len() as u64) as usize];
        let kind = if lcg_next(&mut state) % 8 == 0 {
            "RETURN"
        } else {
            "ORDER"
        };
        let item_count = (lcg_next(&mut state) % 4) as usize + 1;
        let items: Vec<serde_json::Value> = (0..item_count)
            .map(|_| {
                let (sku, title, price) =
                    CATALOGUE[(lcg_next(&mut state) % CATALOGUE.len() as u64) as usize];
                let quantity = (lcg_next(&mut state) % 12) + 1;
                serde_json::json!({
                    "SKU": sku,
                    "title": title,
                    "unit_price": price,
                    "quantity": quantity,
                })
            })
            .collect();
        out.push(serde_json::json!({
            "invoice_no": 154_132_541_653_705_i64 + i as i64,
            "country": country,
            "timestamp": format_event_time(ts),
            "type": kind,
            "items": items,
        }));
    }
    out
}
