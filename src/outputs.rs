//! Output document naming and writing.
//!
//! # Output Structure
//!
//! ```text
//! _posts/
//! ├── 2025-06-01-daily-update.md         # daily post, no topic name
//! ├── 2025-06-02-standing-desk.md        # daily post from a queue item
//! └── 2025-06-02-1430-market-alert.md    # market alert, time keeps same-day alerts apart
//! ```
//!
//! Writing is the last step of a run; a written post is never touched again.

use crate::error::Result;
use crate::utils::slugify_title;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Filename for a daily post, optionally named after its topic.
pub fn post_filename(date: &str, topic: Option<&str>) -> String {
    let slug = topic.map(slugify_title).unwrap_or_default();
    if slug.is_empty() {
        format!("{date}-daily-update.md")
    } else {
        format!("{date}-{slug}.md")
    }
}

pub fn market_filename(date: &str, hhmm: &str) -> String {
    format!("{date}-{hhmm}-market-alert.md")
}

/// Write the finished post into `posts_dir`, creating it if needed.
#[instrument(level = "info", skip_all, fields(posts_dir = %posts_dir.display(), %filename))]
pub async fn write_post(posts_dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(posts_dir).await?;
    let path = posts_dir.join(filename);
    fs::write(&path, content).await?;
    info!(path = %path.display(), bytes = content.len(), "Wrote post");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_filename() {
        assert_eq!(post_filename("2025-06-01", None), "2025-06-01-daily-update.md");
        assert_eq!(
            post_filename("2025-06-01", Some("Standing Desk!")),
            "2025-06-01-standing-desk.md"
        );
        assert_eq!(post_filename("2025-06-01", Some("???")), "2025-06-01-daily-update.md");
    }

    #[test]
    fn test_market_filename() {
        assert_eq!(market_filename("2025-06-02", "1430"), "2025-06-02-1430-market-alert.md");
    }

    #[tokio::test]
    async fn test_write_post_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("_posts");
        let path = write_post(&posts, "2025-06-01-daily-update.md", "---\nlayout: post\n---\n")
            .await
            .unwrap();

        assert_eq!(path, posts.join("2025-06-01-daily-update.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "---\nlayout: post\n---\n");
    }
}
