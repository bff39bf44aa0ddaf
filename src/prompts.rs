//! Prompt text sent to the generator.
//!
//! The prompts ask for the exact front matter the assembler will enforce
//! anyway; steering the model toward it keeps the rest of the block (title,
//! tags, description) consistent with the canonical values.

use crate::market::MarketSnapshot;
use std::fmt::Write;

/// Values the generated front matter must carry.
#[derive(Debug, Clone)]
pub struct FrontMatterValues<'a> {
    pub date: &'a str,
    pub img: &'a str,
    pub author: &'a str,
    pub toc: bool,
    pub images: bool,
}

fn front_matter_rules(out: &mut String, fm: &FrontMatterValues<'_>) {
    let _ = writeln!(out, "## Required format");
    let _ = writeln!(
        out,
        "1. Start with Jekyll front matter exactly like this, keeping every key. \
         Wrap `title` and `description` in double quotes:"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "---");
    let _ = writeln!(out, "layout: post");
    if fm.toc {
        let _ = writeln!(out, "toc: true");
    }
    let _ = writeln!(out, "read_time: true");
    let _ = writeln!(out, "show_date: true");
    let _ = writeln!(out, "title: \"<title>\"");
    let _ = writeln!(out, "date: {}", fm.date);
    let _ = writeln!(out, "img: {}", fm.img);
    let _ = writeln!(out, "tags: [Tag1, Tag2]");
    let _ = writeln!(out, "category: tech");
    let _ = writeln!(out, "author: {}", fm.author);
    let _ = writeln!(out, "description: \"<one sentence summary>\"");
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "2. Use `<tweet>key point</tweet>` at least once to highlight a key point."
    );
    let _ = writeln!(
        out,
        "3. Put code in fenced blocks with a language tag, never indented blocks."
    );
    if fm.images {
        let _ = writeln!(
            out,
            "4. Where an illustration helps, write `[[IMG: short visual description]]` on its own line."
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Output only the Markdown document. Do not wrap it in ```markdown fences."
    );
}

/// Prompt for the daily post. `theme` is either a dated theme, a queue
/// item's context, or the default instruction.
pub fn post_prompt(theme: &str, fm: &FrontMatterValues<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are a professional tech blogger. Write a blog post for a GitHub Pages (Jekyll) site."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Theme");
    let _ = writeln!(out, "{}", theme.trim());
    let _ = writeln!(out);
    front_matter_rules(&mut out, fm);
    out
}

/// Prompt for a breaking-news post about a market move.
pub fn market_prompt(snapshot: &MarketSnapshot, fm: &FrontMatterValues<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are a finance blogger. Write an urgent breaking-news post for investors based on this market data."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Market data");
    let _ = writeln!(out, "* Ticker: {}", snapshot.ticker);
    let _ = writeln!(out, "* Price: {:.2} USD", snapshot.price);
    let _ = writeln!(
        out,
        "* Change: {}% ({})",
        snapshot.signed_change(),
        snapshot.trend()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Content");
    let _ = writeln!(out, "- The title should make readers want to click.");
    let _ = writeln!(
        out,
        "- Include `<tweet>{} moved {:.2}% on the day. Where does the market go next?</tweet>`.",
        snapshot.ticker, snapshot.change_percent
    );
    let _ = writeln!(
        out,
        "- Discuss plausible drivers (rates, earnings, geopolitical risk); speculation is fine."
    );
    let _ = writeln!(out);
    front_matter_rules(&mut out, fm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm(toc: bool, images: bool) -> FrontMatterValues<'static> {
        FrontMatterValues {
            date: "2025-06-01",
            img: "posts/20250601/cover.jpg",
            author: "Blog Bot",
            toc,
            images,
        }
    }

    #[test]
    fn test_post_prompt_carries_canonical_values() {
        let p = post_prompt("  Python decorators \n", &fm(false, false));
        assert!(p.contains("## Theme\nPython decorators\n"));
        assert!(p.contains("date: 2025-06-01\n"));
        assert!(p.contains("img: posts/20250601/cover.jpg\n"));
        assert!(p.contains("author: Blog Bot\n"));
        assert!(!p.contains("toc: true"));
        assert!(!p.contains("[[IMG:"));
    }

    #[test]
    fn test_post_prompt_toc_and_images() {
        let p = post_prompt("x", &fm(true, true));
        assert!(p.contains("layout: post\ntoc: true\n"));
        assert!(p.contains("[[IMG: short visual description]]"));
    }

    #[test]
    fn test_market_prompt_formats_numbers() {
        let snap = MarketSnapshot::from_closes("VOO", &[500.0, 507.5]).unwrap();
        let p = market_prompt(&snap, &fm(false, false));
        assert!(p.contains("* Price: 507.50 USD"));
        assert!(p.contains("* Change: +1.50% (surge)"));
        assert!(p.contains("<tweet>VOO moved 1.50% on the day."));
    }
}
