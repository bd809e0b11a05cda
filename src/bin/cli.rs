//! Comment Harvester CLI
//!
//! Local execution entry point for one-off harvest runs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use comment_harvester::{
    error::Result,
    models::{Config, Credentials},
    pipeline::{HarvestRequest, run_harvest},
    source::SourceKind,
};
use tokio_util::sync::CancellationToken;

/// Comment Harvester - YouTube / Instagram comments within a date window
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvest platform comments within a date window into CSV"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest comments of one account or channel
    Harvest {
        /// Account handle or channel name
        #[arg(long)]
        account: String,

        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End of the window: 00:00 of this date in the reference zone (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Source to harvest from (default: [harvest].source)
        #[arg(long)]
        source: Option<SourceKind>,

        /// Export file (default: {output_dir}/{source}_comments.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration and credentials
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Configuration: {}", cli.config.display());
    config.validate()?;

    let credentials = Credentials::from_env();

    match cli.command {
        Command::Harvest {
            account,
            start,
            end,
            source,
            output,
            json,
        } => {
            let mut request = HarvestRequest::new(account, start, end);
            request.source = source;
            request.output = output;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received, cancelling harvest...");
                    on_signal.cancel();
                }
            });

            let report = run_harvest(&config, &credentials, &request, &cancel).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                log::info!(
                    "Harvest complete! {} comments -> {}",
                    report.comment_count,
                    report.exported_path.display()
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK (source: {})", config.harvest.source);

            for kind in [SourceKind::YouTube, SourceKind::Instagram] {
                match credentials.require_for(kind) {
                    Ok(()) => log::info!("✓ Credentials for {} present", kind),
                    Err(e) => log::warn!("✗ {}: {}", kind, e),
                }
            }

            credentials.require_for(config.harvest.source)?;
            log::info!("All validations passed!");
        }
    }

    Ok(())
}
