//! Run orchestration.
//!
//! ```text
//! post:   topic (queue → dated theme → default) → prompt → generate
//!         → normalize → images → write
//! market: closes → threshold gate → prompt → generate
//!         → normalize → images → write
//! ```
//!
//! The generator, image resolver and quote source are passed in, so a whole
//! run can be exercised with in-memory fakes.

use crate::api::{AskAsync, Generator, Sleeper};
use crate::assembler::normalize;
use crate::config::{MarketSettings, PostSettings, QueueSettings, RunConfig};
use crate::error::Result;
use crate::images::{
    COVER_FILE, ImageResolver, fetch_cover, resolve_image_placeholders, strip_image_placeholders,
};
use crate::market::{MarketSnapshot, QuoteSource};
use crate::models::{GeneratedDocument, WorkItem};
use crate::outputs::{market_filename, post_filename, write_post};
use crate::prompts::{FrontMatterValues, market_prompt, post_prompt};
use crate::queue::claim_and_persist;
use crate::themes::ThemeOverrides;
use crate::utils::truncate_for_log;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Where a daily post's subject came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// A row claimed from the idea queue.
    Claimed { name: Option<String>, context: String },
    /// The theme file's entry for today.
    Dated(String),
    Default(String),
}

impl Topic {
    pub fn theme(&self) -> String {
        match self {
            Topic::Claimed { context, .. } => format!(
                "Write about the following item, using every detail below as source material:\n{context}"
            ),
            Topic::Dated(theme) | Topic::Default(theme) => theme.clone(),
        }
    }

    /// Name used in the output filename. Only queue items are named.
    pub fn name(&self) -> Option<&str> {
        match self {
            Topic::Claimed { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

/// What a market run did.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketOutcome {
    Written(PathBuf),
    BelowThreshold(MarketSnapshot),
    NoData,
}

/// Pick today's topic. An exhausted queue or missing theme falls back to the
/// default; any other queue failure aborts so a claim is never lost.
#[instrument(level = "info", skip_all)]
pub async fn select_topic(config: &RunConfig, settings: &PostSettings) -> Result<Topic> {
    if let Some(queue) = &settings.queue {
        match claim_and_persist(queue, &config.stamp.claimed_at()) {
            Ok(claim) => return Ok(claimed_topic(queue, &claim.item)),
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "Idea queue yielded no item; using a fallback theme");
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(path) = &settings.themes {
        match ThemeOverrides::load(path).await {
            Ok(overrides) => {
                if let Some(theme) = overrides.theme_for(config.stamp.naive_date()) {
                    info!(%theme, "Using dated theme");
                    return Ok(Topic::Dated(theme.to_string()));
                }
                debug!("No dated theme for today");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Theme file unreadable; using default theme"),
        }
    }

    Ok(Topic::Default(settings.default_theme.clone()))
}

fn claimed_topic(queue: &QueueSettings, item: &WorkItem) -> Topic {
    let skip = [queue.status_column.as_str(), queue.claimed_at_column.as_str()];
    Topic::Claimed {
        name: item.display_name(&queue.name_column).map(str::to_string),
        context: item.context(&skip),
    }
}

/// Normalize raw output and settle its images.
async fn finish<R: ImageResolver>(
    config: &RunConfig,
    raw: &str,
    date: &str,
    img: &str,
    resolver: &R,
    cover_fallback: &str,
) -> String {
    let text = normalize(raw, date, img, config.toc);

    let text = if config.images.placeholders {
        resolve_image_placeholders(&text, resolver).await
    } else {
        strip_image_placeholders(&text)
    };

    if config.images.cover {
        let description = GeneratedDocument::split(&text)
            .title()
            .unwrap_or_else(|| cover_fallback.to_string());
        fetch_cover(resolver, &description).await;
    }

    text
}

/// Write the daily post.
#[instrument(level = "info", skip_all, fields(date = %config.stamp.date()))]
pub async fn run_post<T, S, R>(
    config: &RunConfig,
    settings: &PostSettings,
    generator: &Generator<T, S>,
    resolver: &R,
) -> Result<PathBuf>
where
    T: AskAsync<Response = String>,
    S: Sleeper,
    R: ImageResolver,
{
    let topic = select_topic(config, settings).await?;
    let theme = topic.theme();
    info!(theme = %truncate_for_log(&theme, 120), "Selected topic");

    let date = config.stamp.date();
    let img = config.asset_layout().front_matter_path(COVER_FILE);
    let prompt = post_prompt(
        &theme,
        &FrontMatterValues {
            date: &date,
            img: &img,
            author: &config.author,
            toc: config.toc,
            images: config.images.placeholders,
        },
    );

    let raw = generator.generate(&prompt).await?;
    let cover_fallback = topic.name().unwrap_or(&theme).to_string();
    let text = finish(config, &raw, &date, &img, resolver, &cover_fallback).await;

    write_post(&config.posts_dir, &post_filename(&date, topic.name()), &text).await
}

/// Write a market alert if the move is big enough.
#[instrument(level = "info", skip_all, fields(ticker = %settings.ticker, threshold = settings.threshold))]
pub async fn run_market<Q, T, S, R>(
    config: &RunConfig,
    settings: &MarketSettings,
    quotes: &Q,
    generator: &Generator<T, S>,
    resolver: &R,
) -> Result<MarketOutcome>
where
    Q: QuoteSource,
    T: AskAsync<Response = String>,
    S: Sleeper,
    R: ImageResolver,
{
    let snapshot = match quotes
        .closes(&settings.ticker)
        .await
        .and_then(|closes| MarketSnapshot::from_closes(&settings.ticker, &closes))
    {
        Ok(snapshot) => snapshot,
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "Failed to fetch market data; no alert");
            return Ok(MarketOutcome::NoData);
        }
        Err(e) => return Err(e),
    };

    info!(
        change = %snapshot.signed_change(),
        price = snapshot.price,
        "Checked market move"
    );
    if !snapshot.should_emit(settings.threshold) {
        info!("Change within normal range; no alert");
        return Ok(MarketOutcome::BelowThreshold(snapshot));
    }
    info!("Threshold exceeded; generating alert");

    let date = config.stamp.date();
    let img = config.asset_layout().front_matter_path(COVER_FILE);
    let prompt = market_prompt(
        &snapshot,
        &FrontMatterValues {
            date: &date,
            img: &img,
            author: &config.author,
            toc: config.toc,
            images: config.images.placeholders,
        },
    );

    let raw = generator.generate(&prompt).await?;
    let cover_fallback = format!("{} stock chart {}", snapshot.ticker, snapshot.trend());
    let text = finish(config, &raw, &date, &img, resolver, &cover_fallback).await;

    let filename = market_filename(&date, &config.stamp.hhmm());
    let path = write_post(&config.posts_dir, &filename, &text).await?;
    Ok(MarketOutcome::Written(path))
}
