//! Post-processing of raw generator output.
//!
//! Whatever the model produced, the finished post carries the date, image
//! path and table-of-contents flag the run decided on. The transformation is
//! pure text in, text out and never fails; an empty or malformed response
//! simply comes back without a front matter block.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use tracing::{debug, instrument};

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A```[A-Za-z0-9_+.-]*[ \t]*(?:\r?\n)?").expect("valid regex"));
static DATE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^date:[ \t]*[^\r\n]*").expect("valid regex"));
static IMG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^img:[ \t]*[^\r\n]*").expect("valid regex"));
static TOC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^toc:[ \t]*[^\r\n]*").expect("valid regex"));

const TOC_TRUE: &str = "toc: true";
const TOC_FALSE: &str = "toc: false";
const LAYOUT_POST: &str = "layout: post";

/// Remove a wrapping code fence (` ```markdown ... ``` `) and surrounding
/// whitespace.
pub fn strip_fences(raw: &str) -> String {
    let text = raw.trim();
    let text = LEADING_FENCE.replace(text, "");
    let text = text.strip_suffix("```").unwrap_or(&text);
    text.trim().to_string()
}

/// Normalize a generated post.
///
/// 1. Strip a wrapping code fence and trim.
/// 2. Overwrite every `date:` line with `canonical_date` and every `img:`
///    line with `canonical_img`. Missing lines are not inserted.
/// 3. Overwrite every `toc:` line with the required flag. When there is no
///    such line and `toc` is set, insert `toc: true` after the first
///    `layout: post` line.
#[instrument(level = "debug", skip_all, fields(%canonical_date, %canonical_img, toc))]
pub fn normalize(raw: &str, canonical_date: &str, canonical_img: &str, toc: bool) -> String {
    let text = strip_fences(raw);

    let date_line = format!("date: {canonical_date}");
    let img_line = format!("img: {canonical_img}");
    let dates = DATE_LINE.find_iter(&text).count();
    let text = DATE_LINE.replace_all(&text, NoExpand(&date_line));
    let imgs = IMG_LINE.find_iter(&text).count();
    let text = IMG_LINE.replace_all(&text, NoExpand(&img_line));
    debug!(dates, imgs, "Overwrote front matter lines");

    let toc_line = if toc { TOC_TRUE } else { TOC_FALSE };
    if TOC_LINE.is_match(&text) {
        TOC_LINE.replace_all(&text, NoExpand(toc_line)).into_owned()
    } else if toc {
        insert_toc(&text)
    } else {
        text.into_owned()
    }
}

fn insert_toc(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + TOC_TRUE.len() + 1);
    let mut inserted = false;
    for line in text.split_inclusive('\n') {
        out.push_str(line);
        if !inserted && line.trim_end_matches(['\r', '\n']) == LAYOUT_POST {
            if !line.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(TOC_TRUE);
            out.push('\n');
            inserted = true;
        }
    }

    if !inserted {
        debug!("No `layout: post` line; toc flag not inserted");
    }
    out
}
