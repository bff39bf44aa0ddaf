//! Run configuration, built once at process entry.
//!
//! Every component receives the pieces of [`RunConfig`] it needs by
//! reference. The run's date and time are captured exactly once in
//! [`RunStamp`] so the front matter, the filenames and the image directories
//! all agree on the same moment.

use crate::api::{Backoff, RetryPolicy};
use crate::cli::{Cli, Command, MarketArgs, PostArgs};
use crate::error::{PostError, Result};
use crate::images::AssetLayout;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::path::PathBuf;
use std::time::Duration;

/// The single date/time a run is stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp {
    at: NaiveDateTime,
}

impl RunStamp {
    pub fn now() -> Self {
        Self::from_local(Local::now())
    }

    pub fn from_local(now: DateTime<Local>) -> Self {
        Self {
            at: now.naive_local(),
        }
    }

    pub fn from_parts(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            at: NaiveDateTime::new(date, time),
        }
    }

    pub fn naive_date(&self) -> NaiveDate {
        self.at.date()
    }

    /// `YYYY-MM-DD`, the canonical front matter date.
    pub fn date(&self) -> String {
        self.at.format("%Y-%m-%d").to_string()
    }

    /// `YYYYMMDD`, used as the image directory key.
    pub fn compact_date(&self) -> String {
        self.at.format("%Y%m%d").to_string()
    }

    pub fn hhmm(&self) -> String {
        self.at.format("%H%M").to_string()
    }

    /// Second-resolution local timestamp written to the queue on claim.
    pub fn claimed_at(&self) -> String {
        self.at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Where the work-item queue lives and how its columns are read.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub path: PathBuf,
    pub status_column: String,
    pub name_column: String,
    pub claimed_at_column: String,
    pub done_tokens: Vec<String>,
    pub claimed_token: String,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub placeholders: bool,
    pub cover: bool,
    pub endpoint: String,
    pub width: u32,
    pub height: u32,
    pub timeout: Duration,
    pub assets_dir: PathBuf,
    pub public_prefix: String,
}

#[derive(Debug, Clone)]
pub struct PostSettings {
    pub queue: Option<QueueSettings>,
    pub themes: Option<PathBuf>,
    pub default_theme: String,
}

#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub ticker: String,
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Post(PostSettings),
    Market(MarketSettings),
}

/// Everything a run needs, resolved from the CLI and the clock.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub stamp: RunStamp,
    pub posts_dir: PathBuf,
    pub llm_config: Option<PathBuf>,
    pub template: String,
    pub author: String,
    pub toc: bool,
    pub images: ImageSettings,
    pub retry: RetryPolicy,
    pub mode: Mode,
}

impl RunConfig {
    /// Resolve the CLI into a config, validating values no network call
    /// should ever see.
    pub fn from_cli(cli: &Cli, stamp: RunStamp) -> Result<Self> {
        if cli.max_attempts == 0 {
            return Err(PostError::Configuration(
                "--max-attempts must be at least 1".to_string(),
            ));
        }

        let mode = match &cli.command {
            Command::Post(args) => Mode::Post(post_settings(args)?),
            Command::Market(args) => Mode::Market(market_settings(args)?),
        };

        Ok(Self {
            stamp,
            posts_dir: PathBuf::from(&cli.posts_dir),
            llm_config: cli.config.as_ref().map(PathBuf::from),
            template: cli.template.clone(),
            author: cli.author.clone(),
            toc: cli.toc,
            images: ImageSettings {
                placeholders: cli.images,
                cover: cli.cover,
                endpoint: cli.image_endpoint.clone(),
                width: 1200,
                height: 630,
                timeout: Duration::from_secs(cli.image_timeout_secs),
                assets_dir: PathBuf::from(&cli.assets_dir),
                public_prefix: cli.assets_public_prefix.trim_end_matches('/').to_string(),
            },
            retry: match cli.backoff {
                Backoff::Fixed => {
                    RetryPolicy::fixed(cli.max_attempts, Duration::from_secs(cli.retry_delay_secs))
                }
                Backoff::Exponential => RetryPolicy::exponential(
                    cli.max_attempts,
                    Duration::from_secs(cli.retry_delay_secs),
                ),
            },
            mode,
        })
    }

    /// Key of the per-post image directory. Market alerts can fire more
    /// than once a day, so their key carries the time as well.
    pub fn image_key(&self) -> String {
        match self.mode {
            Mode::Post(_) => self.stamp.compact_date(),
            Mode::Market(_) => format!("{}{}", self.stamp.compact_date(), self.stamp.hhmm()),
        }
    }

    /// The one layout both the front matter and the image resolver use.
    pub fn asset_layout(&self) -> AssetLayout {
        AssetLayout::new(&self.images, self.image_key())
    }
}

fn post_settings(args: &PostArgs) -> Result<PostSettings> {
    let queue = match &args.queue {
        Some(path) => {
            let done_tokens: Vec<String> = args
                .done_tokens
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            let claimed_token = args.claimed_token.trim().to_string();
            if !done_tokens.contains(&claimed_token) {
                return Err(PostError::Configuration(format!(
                    "claimed token {claimed_token:?} is not one of the done tokens {done_tokens:?}"
                )));
            }
            Some(QueueSettings {
                path: PathBuf::from(path),
                status_column: args.status_column.clone(),
                name_column: args.name_column.clone(),
                claimed_at_column: args.claimed_at_column.clone(),
                done_tokens,
                claimed_token,
            })
        }
        None => None,
    };

    Ok(PostSettings {
        queue,
        themes: args.themes.as_ref().map(PathBuf::from),
        default_theme: args.default_theme.clone(),
    })
}

fn market_settings(args: &MarketArgs) -> Result<MarketSettings> {
    if args.ticker.trim().is_empty() {
        return Err(PostError::Configuration("ticker must not be empty".to_string()));
    }
    if !args.threshold.is_finite() || args.threshold < 0.0 {
        return Err(PostError::Configuration(format!(
            "threshold must be a non-negative number, got {}",
            args.threshold
        )));
    }
    Ok(MarketSettings {
        ticker: args.ticker.trim().to_string(),
        threshold: args.threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn stamp() -> RunStamp {
        RunStamp::from_parts(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveTime::from_hms_opt(7, 5, 9).unwrap(),
        )
    }

    #[test]
    fn test_run_stamp_formats() {
        let s = stamp();
        assert_eq!(s.date(), "2025-06-01");
        assert_eq!(s.compact_date(), "20250601");
        assert_eq!(s.hhmm(), "0705");
        assert_eq!(s.claimed_at(), "2025-06-01 07:05:09");
    }

    #[test]
    fn test_from_cli_post_with_queue() {
        let cli = Cli::parse_from(["bot", "--toc", "post", "--queue", "ideas.csv"]);
        let config = RunConfig::from_cli(&cli, stamp()).unwrap();

        assert!(config.toc);
        assert_eq!(config.image_key(), "20250601");
        let Mode::Post(post) = &config.mode else {
            panic!("expected post mode");
        };
        let queue = post.queue.as_ref().unwrap();
        assert_eq!(queue.path, PathBuf::from("ideas.csv"));
        assert_eq!(queue.claimed_token, "Done");
    }

    #[test]
    fn test_from_cli_rejects_unknown_claimed_token() {
        let cli = Cli::parse_from([
            "bot",
            "post",
            "--queue",
            "ideas.csv",
            "--claimed-token",
            "Used",
        ]);
        let err = RunConfig::from_cli(&cli, stamp()).unwrap_err();
        assert!(matches!(err, PostError::Configuration(_)));
    }

    #[test]
    fn test_from_cli_market_image_key_has_time() {
        let cli = Cli::parse_from(["bot", "market"]);
        let config = RunConfig::from_cli(&cli, stamp()).unwrap();
        assert_eq!(config.image_key(), "202506010705");
        assert_eq!(
            config.asset_layout().front_matter_path("cover.jpg"),
            "posts/202506010705/cover.jpg"
        );
    }

    #[test]
    fn test_from_cli_retry_policy() {
        let cli = Cli::parse_from(["bot", "market"]);
        let config = RunConfig::from_cli(&cli, stamp()).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_for(2), Duration::from_secs(10));

        let cli = Cli::parse_from([
            "bot",
            "--backoff",
            "exponential",
            "--retry-delay-secs",
            "2",
            "market",
        ]);
        let config = RunConfig::from_cli(&cli, stamp()).unwrap();
        assert_eq!(config.retry.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_from_cli_rejects_zero_attempts() {
        let cli = Cli::parse_from(["bot", "--max-attempts", "0", "market"]);
        assert!(RunConfig::from_cli(&cli, stamp()).is_err());
    }

    #[test]
    fn test_from_cli_rejects_negative_threshold() {
        let cli = Cli::parse_from(["bot", "market", "--threshold=-1"]);
        assert!(RunConfig::from_cli(&cli, stamp()).is_err());
    }
}
