//! Data models for the idea queue and generated posts.
//!
//! - [`WorkQueue`] / [`WorkItem`]: the CSV-backed list of candidate topics
//! - [`ClaimStatus`]: whether a row has already been turned into a post
//! - [`FrontMatter`] / [`GeneratedDocument`]: a generated post split into its
//!   Jekyll front matter block and body

use serde::Deserialize;

/// Whether a queue row is still available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Unclaimed,
    Claimed,
}

/// One row of the idea queue.
///
/// Cells are kept by position so a rewrite reproduces every row as read.
/// Duplicate header names each keep their own cell, and cells past the
/// header row's width are carried in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkItem {
    /// `(header, value)` in column order.
    pub fields: Vec<(String, String)>,
    pub extra: Vec<String>,
}

impl WorkItem {
    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == column)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite the first column named `column`, or append it.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        match self.fields.iter_mut().find(|(h, _)| h == column) {
            Some((_, v)) => *v = value.into(),
            None => self.fields.push((column.to_string(), value.into())),
        }
    }

    /// Give a short row an empty cell for every header it lacks, so cells
    /// added later line up with their header.
    pub fn pad_to(&mut self, headers: &[String]) {
        for h in headers.iter().skip(self.fields.len()) {
            self.fields.push((h.clone(), String::new()));
        }
    }

    /// A row is claimed when its trimmed status is one of `done_tokens`.
    /// Matching is case-sensitive; a missing or empty status is unclaimed.
    pub fn status(&self, column: &str, done_tokens: &[String]) -> ClaimStatus {
        let status = self.get(column).map(str::trim).unwrap_or_default();
        if !status.is_empty() && done_tokens.iter().any(|t| t == status) {
            ClaimStatus::Claimed
        } else {
            ClaimStatus::Unclaimed
        }
    }

    pub fn display_name(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Non-empty cells rendered as `column: value`, in column order,
    /// leaving out bookkeeping columns listed in `skip`. Cells without a
    /// header name are rendered as the bare value.
    pub fn context(&self, skip: &[&str]) -> String {
        self.fields
            .iter()
            .filter(|(h, _)| !skip.contains(&h.as_str()))
            .map(|(h, v)| (h.as_str(), v.trim()))
            .chain(self.extra.iter().map(|v| ("", v.trim())))
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| if h.is_empty() { v.to_string() } else { format!("{h}: {v}") })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The full contents of the idea queue: header row plus every data row, in
/// file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkQueue {
    pub headers: Vec<String>,
    pub items: Vec<WorkItem>,
}

impl WorkQueue {
    /// Append `column` to the header row if it is missing.
    ///
    /// Rows wider than the header row first get unnamed header cells over
    /// their extra cells, so the new column lands past every existing value.
    pub fn ensure_column(&mut self, column: &str) {
        if self.headers.iter().any(|h| h == column) {
            return;
        }

        let width = self
            .items
            .iter()
            .map(|item| item.fields.len() + item.extra.len())
            .max()
            .unwrap_or(0);
        if width > self.headers.len() {
            self.headers.resize(width, String::new());
            for item in &mut self.items {
                let named = item.fields.len();
                let extra = std::mem::take(&mut item.extra);
                item.fields
                    .extend(self.headers[named..].iter().cloned().zip(extra));
            }
        }

        self.headers.push(column.to_string());
    }

    /// A row's cells in column order: short rows are padded with empty
    /// cells to the header width, extra cells follow.
    pub fn row(&self, item: &WorkItem) -> Vec<String> {
        let mut cells: Vec<String> = item.fields.iter().map(|(_, v)| v.clone()).collect();
        if cells.len() < self.headers.len() {
            cells.resize(self.headers.len(), String::new());
        }
        cells.extend(item.extra.iter().cloned());
        cells
    }
}

/// The front matter keys read back out of a generated post. The post text
/// is never re-serialized from this struct; every other key is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontMatter {
    pub title: Option<String>,
}

/// A generated post split at its front matter delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    /// Raw text between the `---` delimiter lines, if a block was found.
    pub front_matter: Option<String>,
    pub body: String,
}

impl GeneratedDocument {
    pub fn split(text: &str) -> Self {
        let mut lines = text.lines();
        if lines.next().map(str::trim) != Some("---") {
            return Self {
                front_matter: None,
                body: text.to_string(),
            };
        }

        let mut block = Vec::new();
        for line in lines.by_ref() {
            if line.trim() == "---" {
                return Self {
                    front_matter: Some(block.join("\n")),
                    body: lines.collect::<Vec<_>>().join("\n"),
                };
            }
            block.push(line);
        }

        Self {
            front_matter: None,
            body: text.to_string(),
        }
    }

    /// Parse the front matter block. Generators regularly emit YAML that does
    /// not quite parse (unquoted colons in titles), so failure is `None`.
    pub fn front_matter(&self) -> Option<FrontMatter> {
        let block = self.front_matter.as_deref()?;
        match serde_yaml::from_str::<FrontMatter>(block) {
            Ok(fm) => Some(fm),
            Err(e) => {
                tracing::debug!(error = %e, "Front matter did not parse as YAML");
                None
            }
        }
    }

    pub fn title(&self) -> Option<String> {
        self.front_matter()
            .and_then(|fm| fm.title)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, &str)]) -> WorkItem {
        WorkItem {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            extra: Vec::new(),
        }
    }

    fn tokens() -> Vec<String> {
        vec!["Done".to_string(), "済".to_string()]
    }

    #[test]
    fn test_status_trims_and_matches_exactly() {
        assert_eq!(item(&[("status", " Done ")]).status("status", &tokens()), ClaimStatus::Claimed);
        assert_eq!(item(&[("status", "済")]).status("status", &tokens()), ClaimStatus::Claimed);
        assert_eq!(item(&[("status", "done")]).status("status", &tokens()), ClaimStatus::Unclaimed);
        assert_eq!(item(&[("status", "")]).status("status", &tokens()), ClaimStatus::Unclaimed);
        assert_eq!(item(&[("name", "x")]).status("status", &tokens()), ClaimStatus::Unclaimed);
    }

    #[test]
    fn test_context_keeps_column_order_and_skips_bookkeeping() {
        let mut row = item(&[("name", "Desk lamp"), ("status", ""), ("price", "3,980"), ("notes", " ")]);
        row.extra.push("dimmable".to_string());

        assert_eq!(row.context(&["status"]), "name: Desk lamp\nprice: 3,980\ndimmable");
        assert_eq!(row.display_name("name"), Some("Desk lamp"));
        assert_eq!(row.display_name("notes"), None);
    }

    #[test]
    fn test_queue_row_fills_missing_columns() {
        let mut queue = WorkQueue {
            headers: vec!["name".into(), "status".into()],
            items: vec![item(&[("name", "a")])],
        };
        queue.ensure_column("claimed_at");
        queue.ensure_column("claimed_at");

        assert_eq!(queue.headers.len(), 3);
        assert_eq!(queue.row(&queue.items[0]), vec!["a", "", ""]);
    }

    #[test]
    fn test_duplicate_columns_keep_their_own_cells() {
        let mut row = item(&[("name", "Lamp"), ("note", "a"), ("note", "b")]);
        row.set("note", "c");

        assert_eq!(row.get("note"), Some("c"));
        assert_eq!(row.fields[2], ("note".to_string(), "b".to_string()));
    }

    #[test]
    fn test_new_column_lands_after_extra_cells() {
        let mut wide = item(&[("name", "Lamp"), ("status", "済")]);
        wide.extra = vec!["warm".to_string(), "dimmable".to_string()];
        let mut queue = WorkQueue {
            headers: vec!["name".into(), "status".into()],
            items: vec![wide, item(&[("name", "Desk"), ("status", "")])],
        };
        queue.ensure_column("claimed_at");

        assert_eq!(queue.headers, vec!["name", "status", "", "", "claimed_at"]);
        assert_eq!(queue.row(&queue.items[0]), vec!["Lamp", "済", "warm", "dimmable", ""]);
        assert_eq!(queue.row(&queue.items[1]), vec!["Desk", "", "", "", ""]);
        assert!(queue.items[0].extra.is_empty());
    }

    #[test]
    fn test_split_and_read_title() {
        let text = "---\nlayout: post\ntitle: \"Rust in 2025\"\ndate: 2025-06-01\ntags: [Rust, CLI]\n---\n\nBody line";
        let doc = GeneratedDocument::split(text);

        assert_eq!(doc.body, "\nBody line");
        assert_eq!(doc.title().as_deref(), Some("Rust in 2025"));
        assert!(doc.front_matter().is_some());
    }

    #[test]
    fn test_split_without_front_matter() {
        let doc = GeneratedDocument::split("# Just a heading");
        assert!(doc.front_matter.is_none());
        assert!(doc.title().is_none());
    }

    #[test]
    fn test_unparseable_front_matter_is_none() {
        let doc = GeneratedDocument::split("---\ntitle: a: b: c\n---\nbody");
        assert!(doc.front_matter.is_some());
        assert!(doc.title().is_none());
    }
}
