use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use orderlake_core::config::PipelineConfig;
use orderlake_core::export::export_dashboard_json;
use orderlake_core::legacy::run_legacy;
use orderlake_core::pipeline::{run_pipeline, Layer};
use orderlake_core::report::{LayerState, PipelineReport, Progress};

#[derive(Parser)]
#[command(name = "orderlake", version, about = "Layered sales-order pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the layered pipeline (bronze -> silver -> gold)
    Run {
        /// Source to process; repeat for several, omit to auto-discover
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Layer to run
        #[arg(long, value_enum, default_value = "all")]
        layer: LayerArg,

        #[arg(long, default_value = "orderlake.toml")]
        config: PathBuf,
    },
    /// Export gold metrics as dashboard JSON
    Export {
        #[arg(long, default_value = "orderlake.toml")]
        config: PathBuf,

        #[arg(long, default_value = "dashboard/data.json")]
        out: PathBuf,
    },
    /// Run the old single-pass flat-directory workflow
    Legacy {
        #[arg(long, default_value = "orderlake.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayerArg {
    Bronze,
    Silver,
    Gold,
    All,
}

impl LayerArg {
    fn layers(self) -> Option<Vec<Layer>> {
        match self {
            LayerArg::Bronze => Some(vec![Layer::Bronze]),
            LayerArg::Silver => Some(vec![Layer::Silver]),
            LayerArg::Gold => Some(vec![Layer::Gold]),
            LayerArg::All => None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            sources,
            layer,
            config,
        } => {
            let config = PipelineConfig::load(&config)?;
            let sources = if sources.is_empty() {
                None
            } else {
                Some(sources)
            };
            let report = run_pipeline(&config, sources, layer.layers(), &Progress::none())
                .context("pipeline run failed")?;
            print_summary(&report);
            if report.failed_sources() == report.sources.len() {
                anyhow::bail!("every source failed");
            }
        }
        Command::Export { config, out } => {
            let config = PipelineConfig::load(&config)?;
            let dashboard =
                export_dashboard_json(&config.gold_dir(), config.output.format, &out)
                    .context("dashboard export failed")?;
            println!(
                "wrote {} ({} monthly rows, {} sources)",
                out.display(),
                dashboard.monthly.len(),
                dashboard.sources.len()
            );
        }
        Command::Legacy { config } => {
            let config = PipelineConfig::load(&config)?;
            let report = run_legacy(&config, &Progress::none()).context("legacy run failed")?;
            for (source, rows) in &report.sources {
                println!("  {source}: {rows} rows");
            }
            println!(
                "combined: {} rows ({} dropped in cleaning)",
                report.combined_rows, report.rows_dropped
            );
        }
    }
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    println!("\nPipeline summary:");
    for source in &report.sources {
        match &source.error {
            Some(error) => println!("  {}: FAILED ({error})", source.source),
            None => println!(
                "  {}: bronze {} rows, silver {} rows ({} dropped)",
                source.source,
                source.bronze.rows,
                source.silver.rows,
                source.silver.rows_dropped
            ),
        }
        for warning in source.bronze.warnings.iter().chain(&source.silver.warnings) {
            println!("    warning: {warning}");
        }
    }
    if report.gold.state == LayerState::Completed {
        println!("  gold: {} combined rows", report.gold.rows);
        for warning in &report.gold.warnings {
            println!("    warning: {warning}");
        }
    }
}
