use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ttgamma::config::RunConfig;
use ttgamma::histoer::accumulator::Accumulator;
use ttgamma::runner::process_chunks;

#[derive(Parser)]
#[command(name = "ttgamma")]
#[command(about = "Selection and systematic histograms for ttgamma chunks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every chunk listed in a run configuration
    Run {
        /// Run configuration (YAML, or JSON with a .json extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for the merged histograms (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = all logical cores).
        #[arg(long, default_value = "0")]
        threads: usize,
    },
}

fn write_json(output: Option<&Path>, accumulator: &Accumulator) -> ttgamma::Result<()> {
    let text = serde_json::to_string_pretty(accumulator)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn run(config: &Path, output: Option<&Path>, threads: usize) -> ttgamma::Result<bool> {
    if threads > 0
        && let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
    {
        log::warn!("Could not configure {threads} threads: {e}");
    }

    let config = RunConfig::load(config)?;
    let summary = process_chunks(&config)?;
    write_json(output, &summary.output)?;

    for failure in &summary.failures {
        log::error!(
            "{} ({}): {}",
            failure.path.display(),
            failure.dataset,
            failure.error
        );
    }
    Ok(summary.failures.is_empty())
}

fn main() -> ExitCode {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            output,
            threads,
        } => run(&config, output.as_deref(), threads),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            log::error!("Some chunks failed; their events are missing from the output");
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
