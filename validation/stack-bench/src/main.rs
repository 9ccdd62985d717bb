//! Benchmark CLI for lazy raster stacks.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use raster_stack::ChunkSpec;
use stack_bench::{BenchConfig, BenchRunner, ResultsReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack-bench")]
#[command(about = "Graph construction and compute benchmarks for lazy raster stacks", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StackArgs {
    /// Number of items
    #[arg(long, default_value = "50")]
    items: usize,

    /// Number of assets per item
    #[arg(long, default_value = "20")]
    assets: usize,

    /// Output rows
    #[arg(long, default_value = "10000")]
    rows: usize,

    /// Output cols
    #[arg(long, default_value = "10000")]
    cols: usize,

    /// Chunk size: `N`, `-1`, or `rows,cols`
    #[arg(long, default_value = "2000", allow_hyphen_values = true)]
    chunksize: ChunkSpec,

    /// Fraction of asset-table cells with a URL
    #[arg(long, default_value = "1.0")]
    density: f64,
}

impl StackArgs {
    fn into_config(self, name: &str) -> BenchConfig {
        BenchConfig {
            name: name.to_string(),
            description: String::new(),
            items: self.items,
            assets: self.assets,
            rows: self.rows,
            cols: self.cols,
            chunksize: self.chunksize,
            density: self.density,
            fill_value: raster_stack::FillValue::nan(),
            errors_as_nodata: Default::default(),
            threads: 0,
            sample: None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a stack and report on its graph without computing
    Graph {
        #[command(flatten)]
        stack: StackArgs,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Build a stack and compute its chunks
    Compute {
        #[command(flatten)]
        stack: StackArgs,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Compute only this many chunks
        #[arg(short, long)]
        sample: Option<usize>,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Run a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Only build the graph
        #[arg(long)]
        graph_only: bool,

        /// Override the worker thread count
        #[arg(short, long)]
        threads: Option<usize>,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn graph(config: BenchConfig, output: &str) -> anyhow::Result<()> {
    config.validate()?;
    let report = BenchRunner::new(config).run_graph()?;
    match output {
        "json" => println!("{}", ResultsReport::format_json(&report)?),
        _ => println!("{}", ResultsReport::format_graph_table(&report)),
    }
    Ok(())
}

fn compute(config: BenchConfig, output: &str) -> anyhow::Result<()> {
    config.validate()?;
    let report = BenchRunner::new(config).run_compute()?;
    match output {
        "json" => println!("{}", ResultsReport::format_json(&report)?),
        _ => println!("{}", ResultsReport::format_compute_table(&report)),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    match cli.command {
        Commands::Graph { stack, output } => graph(stack.into_config("cli"), &output),
        Commands::Compute {
            stack,
            threads,
            sample,
            output,
        } => {
            let mut config = stack.into_config("cli");
            config.threads = threads;
            config.sample = sample;
            compute(config, &output)
        }
        Commands::Run {
            scenario,
            graph_only,
            threads,
            output,
        } => {
            let mut config = BenchConfig::from_file(&scenario)?;
            if let Some(t) = threads {
                config.threads = t;
            }
            info!(
                scenario = %config.name,
                path = %scenario.display(),
                "Loaded scenario"
            );
            if graph_only {
                graph(config, &output)
            } else {
                compute(config, &output)
            }
        }
    }
}
