//! Command-line interface definitions for the post bot.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also be provided through environment variables, which is
//! how the scheduled CI job configures a run.

use crate::api::Backoff;
use clap::{Args, Parser, Subcommand};

/// Command-line arguments shared by every run.
///
/// # Examples
///
/// ```sh
/// # Daily post, topic from the idea queue, with images
/// jekyll_post_bot --images post --queue ./ideas.csv
///
/// # Daily post with a dated theme file
/// jekyll_post_bot post --themes ./themes.yaml
///
/// # Market alert when VOO moved 1% or more
/// jekyll_post_bot market --ticker VOO --threshold 1.0
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory the finished Markdown post is written to
    #[arg(short, long, env = "POSTS_DIR", default_value = "_posts")]
    pub posts_dir: String,

    /// Directory generated images are saved under
    #[arg(long, env = "ASSETS_DIR", default_value = "assets/img")]
    pub assets_dir: String,

    /// Path prefix used when embedding images in the post body
    #[arg(long, env = "ASSETS_PUBLIC_PREFIX", default_value = "./assets/img")]
    pub assets_public_prefix: String,

    /// Optional path to the LLM config.yaml file
    #[arg(short, long, env = "POST_BOT_CONFIG")]
    pub config: Option<String>,

    /// Name of the chat template used for generation
    #[arg(short, long, env = "POST_BOT_TEMPLATE", default_value = "blog_post")]
    pub template: String,

    /// Author written into the front matter
    #[arg(long, env = "POST_AUTHOR", default_value = "Blog Bot")]
    pub author: String,

    /// Require a table of contents (`toc: true`) in the front matter
    #[arg(long, env = "POST_TOC")]
    pub toc: bool,

    /// Resolve `[[IMG: ...]]` placeholders through the image endpoint
    #[arg(long, env = "POST_IMAGES")]
    pub images: bool,

    /// Also fetch a cover image for the `img:` front matter path
    #[arg(long, env = "POST_COVER")]
    pub cover: bool,

    /// Image generation endpoint; the description is appended as a path segment
    #[arg(
        long,
        env = "IMAGE_ENDPOINT",
        default_value = "https://image.pollinations.ai/prompt/"
    )]
    pub image_endpoint: String,

    /// Seconds before an image download is abandoned
    #[arg(long, env = "IMAGE_TIMEOUT_SECS", default_value_t = 30)]
    pub image_timeout_secs: u64,

    /// Maximum number of generation attempts
    #[arg(long, env = "GENERATION_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    /// Seconds to wait between generation attempts
    #[arg(long, env = "GENERATION_RETRY_SECS", default_value_t = 10)]
    pub retry_delay_secs: u64,

    /// Whether the wait stays fixed or doubles after each failure
    #[arg(long, env = "GENERATION_BACKOFF", value_enum, default_value_t = Backoff::Fixed)]
    pub backoff: Backoff,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the daily post
    Post(PostArgs),
    /// Write a breaking-news post when a quote moved past the threshold
    Market(MarketArgs),
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// CSV idea queue; the first unclaimed row becomes the topic
    #[arg(short, long, env = "POST_QUEUE")]
    pub queue: Option<String>,

    /// YAML file mapping `YYYY-MM-DD` to a theme for that day
    #[arg(long, env = "POST_THEMES")]
    pub themes: Option<String>,

    /// Theme used when neither the queue nor the theme file supply one
    #[arg(
        long,
        env = "POST_DEFAULT_THEME",
        default_value = "Pick one: today's Python technique or the latest AI news"
    )]
    pub default_theme: String,

    /// Queue column holding the claim status
    #[arg(long, default_value = "status")]
    pub status_column: String,

    /// Queue column holding the topic's display name
    #[arg(long, default_value = "name")]
    pub name_column: String,

    /// Queue column stamped with the claim time
    #[arg(long, default_value = "claimed_at")]
    pub claimed_at_column: String,

    /// Status values that mark a row as already used
    #[arg(long, value_delimiter = ',', default_value = "Done,Complete,済,完了")]
    pub done_tokens: Vec<String>,

    /// Status value written when a row is claimed
    #[arg(long, default_value = "Done")]
    pub claimed_token: String,
}

#[derive(Args, Debug)]
pub struct MarketArgs {
    /// Ticker symbol to watch
    #[arg(long, env = "MARKET_TICKER", default_value = "VOO")]
    pub ticker: String,

    /// Absolute percent change that triggers a post
    #[arg(long, env = "MARKET_THRESHOLD", default_value_t = 1.0)]
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_post_defaults() {
        let cli = Cli::parse_from(["jekyll_post_bot", "post"]);

        assert_eq!(cli.posts_dir, "_posts");
        assert_eq!(cli.max_attempts, 3);
        assert!(!cli.toc);
        match cli.command {
            Command::Post(args) => {
                assert!(args.queue.is_none());
                assert_eq!(args.status_column, "status");
                assert_eq!(args.done_tokens, vec!["Done", "Complete", "済", "完了"]);
                assert_eq!(args.claimed_token, "Done");
            }
            other => panic!("expected post, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_post_with_queue() {
        let cli = Cli::parse_from([
            "jekyll_post_bot",
            "-p",
            "/tmp/posts",
            "--toc",
            "--images",
            "post",
            "-q",
            "ideas.csv",
            "--done-tokens",
            "yes,ok",
        ]);

        assert_eq!(cli.posts_dir, "/tmp/posts");
        assert!(cli.toc);
        assert!(cli.images);
        let Command::Post(args) = cli.command else {
            panic!("expected post");
        };
        assert_eq!(args.queue.as_deref(), Some("ideas.csv"));
        assert_eq!(args.done_tokens, vec!["yes", "ok"]);
    }

    #[test]
    fn test_cli_market() {
        let cli = Cli::parse_from([
            "jekyll_post_bot",
            "market",
            "--ticker",
            "NVDA",
            "--threshold",
            "2.5",
        ]);

        let Command::Market(args) = cli.command else {
            panic!("expected market");
        };
        assert_eq!(args.ticker, "NVDA");
        assert_eq!(args.threshold, 2.5);
    }
}
