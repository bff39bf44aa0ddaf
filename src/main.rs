//! # Jekyll Post Bot
//!
//! Writes one Markdown post per run into a Jekyll `_posts` directory using an
//! OpenAI-compatible LLM.
//!
//! ## Modes
//!
//! - `post`: a daily post about the next unclaimed idea in a CSV queue, a
//!   dated theme, or a default theme
//! - `market`: a breaking-news alert, written only when a ticker's daily move
//!   crosses a threshold
//!
//! ## Usage
//!
//! ```sh
//! jekyll_post_bot --toc --images post --queue ideas.csv
//! jekyll_post_bot market --ticker VOO --threshold 1.0
//! ```
//!
//! ## Architecture
//!
//! 1. **Configure**: resolve CLI flags and the clock into a `RunConfig`
//! 2. **Select**: claim a queue item, or check the market move
//! 3. **Generate**: prompt the LLM under a bounded retry policy
//! 4. **Assemble**: enforce canonical front matter and resolve images
//! 5. **Write**: one file into the posts directory

use awful_aj::{config as llm, config_dir, template};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod assembler;
mod cli;
mod config;
mod error;
mod images;
mod market;
mod models;
mod outputs;
mod pipeline;
mod prompts;
mod queue;
mod themes;
mod utils;

use api::{AskFnWrapper, Generator, TokioSleeper};
use cli::Cli;
use config::{Mode, RunConfig, RunStamp};
use error::PostError;
use images::HttpImageResolver;
use market::YahooQuotes;
use pipeline::{MarketOutcome, run_market, run_post};
use utils::ensure_writable_dir;

/// Timeout for the quote API.
const QUOTE_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("jekyll_post_bot starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let run = match RunConfig::from_cli(&args, RunStamp::now()) {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        date = %run.stamp.date(),
        posts_dir = %run.posts_dir.display(),
        toc = run.toc,
        images = run.images.placeholders,
        cover = run.images.cover,
        "Run configured"
    );

    if let Err(e) = ensure_writable_dir(&run.posts_dir).await {
        error!(
            path = %run.posts_dir.display(),
            error = %e,
            "Posts directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load template & config ----
    // Checked before any network call or queue claim.
    let conf_file = match &run.llm_config {
        Some(path) => path.clone(),
        None => config_dir()
            .map_err(|e| PostError::Configuration(format!("no config directory: {e}")))?
            .join("config.yaml"),
    };
    let llm_config = load_llm_config(&conf_file)?;
    info!(config_path = %conf_file.display(), "Loaded configuration");

    let template = template::load_template(&run.template)
        .await
        .map_err(|e| PostError::Configuration(format!("template {}: {e}", run.template)))?;
    info!(template = %run.template, "Loaded template");

    let generator = Generator::new(
        AskFnWrapper {
            config: &llm_config,
            template: &template,
        },
        run.retry.clone(),
        TokioSleeper,
    );
    let resolver = HttpImageResolver::new(&run.images, run.asset_layout())?;

    match &run.mode {
        Mode::Post(settings) => {
            let path = run_post(&run, settings, &generator, &resolver).await?;
            info!(path = %path.display(), "Daily post written");
        }
        Mode::Market(settings) => {
            let quotes = YahooQuotes::new(QUOTE_TIMEOUT)?;
            match run_market(&run, settings, &quotes, &generator, &resolver).await? {
                MarketOutcome::Written(path) => {
                    info!(path = %path.display(), "Market alert written")
                }
                MarketOutcome::BelowThreshold(snapshot) => info!(
                    change = %snapshot.signed_change(),
                    threshold = settings.threshold,
                    "No alert needed"
                ),
                MarketOutcome::NoData => info!("No market data; nothing written"),
            }
        }
    }

    info!(elapsed_secs = start_time.elapsed().as_secs_f64(), "Run complete");

    Ok(())
}

fn load_llm_config(path: &Path) -> Result<llm::AwfulJadeConfig, PostError> {
    if !path.is_file() {
        return Err(PostError::Configuration(format!(
            "LLM config not found at {}",
            path.display()
        )));
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| PostError::Configuration(format!("not a valid config filename: {}", path.display())))?;
    llm::load_config(path_str)
        .map_err(|e| PostError::Configuration(format!("{}: {e}", path.display())))
}
