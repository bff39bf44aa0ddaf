//! Dated theme overrides.
//!
//! A YAML mapping from ISO date to a theme, e.g.
//!
//! ```yaml
//! "2025-06-01": "Rust 1.88 release highlights"
//! "2025-12-24": "A Christmas Eve reading list"
//! ```
//!
//! When the run date has an entry, it replaces the default "pick any topic"
//! instruction.

use crate::error::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct ThemeOverrides {
    themes: BTreeMap<NaiveDate, String>,
}

impl ThemeOverrides {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let overrides = Self::parse(&raw)?;
        info!(entries = overrides.themes.len(), "Loaded theme overrides");
        Ok(overrides)
    }

    /// Parse the YAML mapping. Keys that are not `YYYY-MM-DD` dates are
    /// skipped with a warning rather than failing the whole file.
    pub fn parse(raw: &str) -> Result<Self> {
        let entries: BTreeMap<String, String> = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(raw)?
        };

        let mut themes = BTreeMap::new();
        for (key, theme) in entries {
            match NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d") {
                Ok(date) => {
                    themes.insert(date, theme);
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring theme with a non-date key"),
            }
        }
        Ok(Self { themes })
    }

    pub fn theme_for(&self, date: NaiveDate) -> Option<&str> {
        self.themes
            .get(&date)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_theme_for_matching_date() {
        let overrides = ThemeOverrides::parse(
            "\"2025-06-01\": \"Rust 1.88 highlights\"\n\"2025-06-02\": \"Async closures\"\n",
        )
        .unwrap();

        assert_eq!(overrides.theme_for(date(2025, 6, 1)), Some("Rust 1.88 highlights"));
        assert_eq!(overrides.theme_for(date(2025, 6, 3)), None);
    }

    #[test]
    fn test_bad_keys_and_blank_themes_are_ignored() {
        let overrides =
            ThemeOverrides::parse("someday: \"later\"\n\"2025-06-01\": \"  \"\n").unwrap();
        assert_eq!(overrides.theme_for(date(2025, 6, 1)), None);
    }

    #[test]
    fn test_empty_file_has_no_overrides() {
        let overrides = ThemeOverrides::parse("  \n").unwrap();
        assert_eq!(overrides.theme_for(date(2025, 6, 1)), None);
    }

    #[test]
    fn test_non_mapping_is_an_error() {
        assert!(ThemeOverrides::parse("- just\n- a list\n").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.yaml");
        tokio::fs::write(&path, "\"2025-12-24\": \"A Christmas Eve reading list\"\n")
            .await
            .unwrap();

        let overrides = ThemeOverrides::load(&path).await.unwrap();
        assert_eq!(
            overrides.theme_for(date(2025, 12, 24)),
            Some("A Christmas Eve reading list")
        );
    }
}
