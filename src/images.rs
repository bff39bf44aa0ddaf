//! Image placeholders and generated illustrations.
//!
//! The generator marks where an illustration belongs with
//! `[[IMG: <description>]]`. Each placeholder is handed to an
//! [`ImageResolver`]; a resolved image becomes a Markdown embed, a failed
//! one is dropped from the text. Failures never reach the caller.
//!
//! [`AssetLayout`] derives the front matter path, the public embed path and
//! the on-disk path from the same key so the three can't drift apart.

use crate::config::ImageSettings;
use crate::error::{PostError, Result};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[IMG:\s*(.*?)\]\]").expect("valid regex"));

pub const COVER_FILE: &str = "cover.jpg";

/// Paths for every image belonging to one post.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    /// Directory images are written under, e.g. `assets/img`.
    pub assets_dir: PathBuf,
    /// Prefix used in body embeds, e.g. `./assets/img`.
    pub public_prefix: String,
    /// Per-post directory key, e.g. `20250601`.
    pub key: String,
}

impl AssetLayout {
    pub fn new(settings: &ImageSettings, key: impl Into<String>) -> Self {
        Self {
            assets_dir: settings.assets_dir.clone(),
            public_prefix: settings.public_prefix.clone(),
            key: key.into(),
        }
    }

    /// Value for the `img:` front matter key, relative to the assets root.
    pub fn front_matter_path(&self, file: &str) -> String {
        format!("posts/{}/{}", self.key, file)
    }

    pub fn public_path(&self, file: &str) -> String {
        format!("{}/{}", self.public_prefix, self.front_matter_path(file))
    }

    pub fn save_path(&self, file: &str) -> PathBuf {
        self.assets_dir.join("posts").join(&self.key).join(file)
    }
}

/// One image to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub description: String,
    pub file_name: String,
}

impl ImageRequest {
    /// Request for the `ordinal`-th placeholder (1-based) of a post.
    pub fn placeholder(description: &str, ordinal: usize) -> Self {
        Self {
            description: description.to_string(),
            file_name: format!("image_{ordinal}.jpg"),
        }
    }
}

/// Something that can turn a description into an image at a known path.
pub trait ImageResolver {
    /// Produce the image and return the path to embed it with.
    async fn resolve(&self, request: &ImageRequest) -> Result<String>;
}

/// Fetches images from a templated generation endpoint
/// (`<endpoint>/<description>?width=..&height=..&nologo=true&seed=..`).
#[derive(Debug)]
pub struct HttpImageResolver {
    client: reqwest::Client,
    endpoint: String,
    width: u32,
    height: u32,
    layout: AssetLayout,
}

impl HttpImageResolver {
    pub fn new(settings: &ImageSettings, layout: AssetLayout) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            width: settings.width,
            height: settings.height,
            layout,
        })
    }

    /// Build the request URL. The seed varies the image between runs.
    pub fn image_url(&self, description: &str, seed: u32) -> Result<Url> {
        let base = if self.endpoint.ends_with('/') {
            self.endpoint.clone()
        } else {
            format!("{}/", self.endpoint)
        };
        let base = Url::parse(&base).map_err(|e| {
            PostError::Configuration(format!("invalid image endpoint {}: {e}", self.endpoint))
        })?;
        let mut url = base
            .join(&urlencoding::encode(description))
            .map_err(|e| PostError::ResourceFetch {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("width", &self.width.to_string())
            .append_pair("height", &self.height.to_string())
            .append_pair("nologo", "true")
            .append_pair("seed", &seed.to_string());
        Ok(url)
    }
}

impl ImageResolver for HttpImageResolver {
    #[instrument(level = "info", skip_all, fields(file = %request.file_name))]
    async fn resolve(&self, request: &ImageRequest) -> Result<String> {
        let seed: u32 = rng().random_range(0..1_000_000);
        let url = self.image_url(&request.description, seed)?;
        let fetch_err = |reason: String| PostError::ResourceFetch {
            url: url.to_string(),
            reason,
        };

        let t0 = Instant::now();
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(fetch_err(format!("HTTP {}", resp.status())));
        }
        let bytes = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;

        let path = self.layout.save_path(&request.file_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Saved generated image"
        );
        Ok(self.layout.public_path(&request.file_name))
    }
}

/// Placeholder descriptions in order of appearance, duplicates included.
pub fn placeholder_descriptions(body: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect()
}

/// Replace every `[[IMG: ...]]` placeholder in `body`.
///
/// Placeholders are numbered by occurrence (1-based) to name their files.
/// Replacement is keyed on the description text, so two placeholders with
/// the same description share the first one's image.
#[instrument(level = "info", skip_all)]
pub async fn resolve_image_placeholders<R: ImageResolver>(body: &str, resolver: &R) -> String {
    let mut embeds: HashMap<String, Option<String>> = HashMap::new();

    let found = placeholder_descriptions(body);
    for (i, description) in found.iter().enumerate().unique_by(|(_, d)| *d) {
        let request = ImageRequest::placeholder(description, i + 1);
        let embed = match resolver.resolve(&request).await {
            Ok(path) => Some(format!("![{description}]({path})")),
            Err(e) => {
                warn!(description = %description, error = %e, "Image unavailable; dropping placeholder");
                None
            }
        };
        embeds.insert(description.clone(), embed);
    }

    let out = PLACEHOLDER.replace_all(body, |caps: &regex::Captures<'_>| {
        embeds.get(&caps[1]).cloned().flatten().unwrap_or_default()
    });

    debug!(
        placeholders = found.len(),
        resolved = embeds.values().filter(|e| e.is_some()).count(),
        "Resolved image placeholders"
    );
    out.into_owned()
}

/// Remove every placeholder without resolving it, for runs with images
/// turned off.
pub fn strip_image_placeholders(body: &str) -> String {
    let out = PLACEHOLDER.replace_all(body, "");
    debug!(
        placeholders = PLACEHOLDER.find_iter(body).count(),
        "Images disabled; stripped placeholders"
    );
    out.into_owned()
}

/// Fetch the cover image named by the `img:` front matter path. Returns
/// whether the cover now exists.
#[instrument(level = "info", skip_all)]
pub async fn fetch_cover<R: ImageResolver>(resolver: &R, description: &str) -> bool {
    let request = ImageRequest {
        description: description.to_string(),
        file_name: COVER_FILE.to_string(),
    };
    match resolver.resolve(&request).await {
        Ok(path) => {
            info!(%path, "Cover image ready");
            true
        }
        Err(e) => {
            warn!(error = %e, "Cover image unavailable; post keeps its img path");
            false
        }
    }
}
