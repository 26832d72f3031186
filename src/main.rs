use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pool_scan_rs::executor::TaskExecutor;
use pool_scan_rs::ports;
use pool_scan_rs::queue::DEFAULT_QUEUE_CAPACITY;
use pool_scan_rs::report::render_report;
use pool_scan_rs::scanner::PortScanner;
use pool_scan_rs::types::{ScanReport, ScanResult, ScanSummary};

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// pool-scan — bounded worker-pool task executor and TCP connect port scanner.
#[derive(Debug, Parser)]
#[command(name = "pool-scan", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan common ports, a port range and an explicit port list on one host.
    Scan(ScanArgs),
    /// Run a batch of sample jobs through the executor and print their results.
    Tasks(TasksArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Host name or IP address to scan.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Number of concurrent probe workers.
    #[arg(long, default_value_t = 100)]
    workers: usize,

    /// Pending probes buffered before submission waits.
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Inclusive port range for the range phase.
    #[arg(long, default_value = "1-1024")]
    range: String,

    /// Comma-separated ports and ranges for the explicit-list phase.
    #[arg(long, default_value = "22,80,443,3000,5432")]
    ports: String,

    /// Read the explicit list from a file instead (one port or range per line).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Also list closed ports in every phase (always on for the explicit list).
    #[arg(long = "show-closed", default_value_t = false)]
    show_closed: bool,

    /// Write all phase reports as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct TasksArgs {
    /// Jobs submitted per phase.
    #[arg(long, default_value_t = 20)]
    count: usize,

    /// Number of workers.
    #[arg(long, default_value_t = 10)]
    workers: usize,

    /// Simulated work per job in milliseconds.
    #[arg(long = "job-ms", default_value_t = 2000)]
    job_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan(args) => run_scan(args).await,
        Command::Tasks(args) => run_tasks(args).await,
    }
}

async fn run_scan(args: ScanArgs) -> Result<()> {
    let (start, end) = ports::parse_range(&args.range).context("invalid --range")?;
    let specific = match args.ports_file.as_deref() {
        Some(path) => ports::load_ports_from_path(path)?,
        None => ports::parse_ports_str(&args.ports).context("invalid --ports")?,
    };

    let scanner = PortScanner::new(
        args.host.clone(),
        Duration::from_millis(args.timeout_ms),
        args.workers,
    )
    .with_queue_capacity(args.queue_capacity);

    println!("Starting port scan on {}...", scanner.host());
    println!(
        "Workers: {} | Timeout: {:?}",
        scanner.workers(),
        scanner.timeout()
    );

    let mut reports = Vec::new();

    println!("\n--- Scanning Common Ports ---");
    let started_at = now_rfc3339();
    let t0 = Instant::now();
    let results = scanner.scan_common_ports().await?;
    reports.push(finish_phase("common", &args, started_at, t0, results, args.show_closed));

    println!("\n--- Scanning Ports {start}-{end} ---");
    let started_at = now_rfc3339();
    let t0 = Instant::now();
    let results = scanner.scan_range(start, end).await?;
    reports.push(finish_phase("range", &args, started_at, t0, results, args.show_closed));

    println!("\n--- Scanning Specific Ports ---");
    let started_at = now_rfc3339();
    let t0 = Instant::now();
    let results = scanner.scan_specific_ports(&specific).await?;
    reports.push(finish_phase("specific", &args, started_at, t0, results, true));

    if let Some(path) = args.output.as_deref() {
        if let Err(e) = write_reports_json(path, &reports) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }
    Ok(())
}

fn finish_phase(
    phase: &str,
    args: &ScanArgs,
    started_at: String,
    t0: Instant,
    results: Vec<ScanResult>,
    show_closed: bool,
) -> ScanReport {
    let elapsed = t0.elapsed();
    print!("{}", render_report(&results, show_closed));
    println!("Scan completed in {:?}", elapsed);
    ScanReport {
        phase: phase.to_string(),
        host: args.host.clone(),
        started_at,
        elapsed_ms: elapsed.as_millis() as u64,
        summary: ScanSummary::from_results(&results),
        results,
    }
}

async fn run_tasks(args: TasksArgs) -> Result<()> {
    let executor = TaskExecutor::new(args.workers)?;
    let mut rng = rand::rng();
    let job_time = Duration::from_millis(args.job_ms);

    info!(count = args.count, workers = args.workers, "first phase");
    for i in 0..args.count {
        let value = sample_value(&mut rng);
        executor
            .submit(
                move || async move {
                    tokio::time::sleep(job_time).await;
                    value
                },
                format!("This is task number {i}"),
            )
            .await?;
    }

    info!(count = args.count, "second phase");
    for i in 0..args.count {
        let value = sample_value(&mut rng);
        executor
            .submit_blocking(
                move || {
                    std::thread::sleep(job_time);
                    value
                },
                format!("This is blocking task number {i}"),
            )
            .await?;
    }

    executor.shutdown().await?;
    let mut results: Vec<(u64, u64)> = executor.into_results().await?.into_iter().collect();
    results.sort_unstable_by_key(|(id, _)| *id);
    for (id, value) in &results {
        println!("task {id:>3} -> {value}");
    }
    println!("{} tasks completed", results.len());
    Ok(())
}

fn sample_value(rng: &mut impl Rng) -> u64 {
    rng.random_range(0..12_002_023)
}

fn write_reports_json(path: &Path, reports: &[ScanReport]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, reports)?;
    Ok(())
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
