//! Login Anomaly - Main Entry Point
//!
//! Scores login attempts from the command line.

use clap::Parser;
use login_anomaly::cli::{cmd_rescore, cmd_score, Cli, Commands, ScoreOverrides};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "login_anomaly=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            data,
            trusted,
            config,
            trees,
            contamination,
            seed,
            jobs,
            top,
            output,
            timeline,
            model_out,
        } => {
            let overrides = ScoreOverrides {
                trees,
                contamination,
                seed,
                jobs,
                top,
            };
            cmd_score(
                &data,
                trusted.as_deref(),
                config.as_deref(),
                &overrides,
                output.as_deref(),
                timeline.as_deref(),
                model_out.as_deref(),
            )?;
        }
        Commands::Rescore {
            model,
            data,
            output,
            timeline,
            top,
        } => {
            cmd_rescore(&model, &data, output.as_deref(), timeline.as_deref(), top)?;
        }
    }

    Ok(())
}
