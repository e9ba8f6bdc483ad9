// Entrypoint: parse flags, set up logging and configuration, log in and
// run the upload workflow. Any error aborts the run with a non-zero exit.

use anyhow::Context;
use clap::{ArgAction, Parser};
use idr_mask_upload::api::ApiClient;
use idr_mask_upload::config::{Config, CONFIG_ENV_VAR};
use idr_mask_upload::workflow::{self, RunOptions};
use idr_mask_upload::{logging, ui};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Attach cell/nuclei outline masks to the images of corrected plates", long_about = None)]
struct Cli {
    #[arg(short, long, action = ArgAction::Count, help = "Increase the command verbosity")]
    verbose: u8,
    #[arg(short, long, action = ArgAction::Count, help = "Decrease the command verbosity")]
    quiet: u8,
    #[arg(short = 'n', long, help = "Run command in dry-run mode")]
    dry_run: bool,
    #[arg(long, env = CONFIG_ENV_VAR, help = "Path to a TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, env = "OMERO_WEB_URL", help = "Base URL of the repository gateway")]
    server: Option<String>,
    #[arg(short, long, env = "OMERO_USER")]
    username: Option<String>,
    #[arg(long, env = "OMERO_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, help = "Show a progress bar over wells")]
    progress: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logger(logging::level_from_counts(cli.verbose, cli.quiet));

    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.server.apply_overrides(cli.server, cli.username, cli.password);

    let credentials =
        ui::resolve_credentials(&config.server).context("Failed to read credentials")?;
    let api = ApiClient::connect(&config.server, &credentials)
        .with_context(|| format!("Failed to connect to {}", config.server.url))?;

    if cli.dry_run {
        log::info!("Dry run: masks are checked but not uploaded");
    }
    let options = RunOptions {
        dry_run: cli.dry_run,
        progress: cli.progress,
    };
    let summary = workflow::run(&api, &config, options)?;
    log::info!(
        "Done: {} wells processed, {} plates skipped, {} masks verified, {} annotations linked",
        summary.wells_processed,
        summary.plates_skipped,
        summary.masks_verified,
        summary.annotations_linked
    );
    Ok(())
}
