//! Inline a site's shared stylesheet and script into a page.
//!
//! Generated sites reference `styles.css` and `script.js` from every page.
//! A sandboxed preview has no server to fetch them from, so the page is
//! rewritten into a single self-contained document: the external references
//! are removed and the file contents are inlined in their place.

use crate::pages::resolve;
use regex::Regex;
use sitekit_core::{SCRIPT, STYLESHEET};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static STYLESHEET_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*\bhref\s*=\s*["']styles\.css["'][^>]*>"#).unwrap()
});
static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script\b[^>]*\bsrc\s*=\s*["']script\.js["'][^>]*>\s*</script\s*>"#)
        .unwrap()
});

/// Assemble the self-contained document for one page of a site.
///
/// `page_name` is resolved first, so an unknown page falls back to the entry
/// point. A site without any HTML page assembles to an empty string, which
/// callers render as a blank page.
pub fn assemble(files: &BTreeMap<String, String>, page_name: &str) -> String {
    let Some(page) = resolve(files, page_name) else {
        tracing::debug!(requested = page_name, "No HTML page to assemble");
        return String::new();
    };

    let html = files.get(page).map(String::as_str).unwrap_or_default();
    inline_assets(
        html,
        files.get(STYLESHEET).map(String::as_str),
        files.get(SCRIPT).map(String::as_str),
    )
}

/// Inline CSS and JS into an HTML document.
///
/// Every `<link>` to `styles.css` and every `<script src="script.js">` is
/// stripped before the matching block is injected, so each asset is applied
/// exactly once. Absent assets are skipped.
pub fn inline_assets(html: &str, css: Option<&str>, js: Option<&str>) -> String {
    let mut doc = html.to_string();

    if let Some(css) = css {
        doc = STYLESHEET_LINK.replace_all(&doc, "").into_owned();
        doc = inject_style(&doc, css);
    }

    if let Some(js) = js {
        doc = SCRIPT_TAG.replace_all(&doc, "").into_owned();
        doc = inject_script(&doc, js);
    }

    doc
}

/// Insert a `<style>` block before `</head>`.
///
/// Without `</head>` the block goes right after an opening `<head>`; without
/// any head a new one is synthesized after `<html>` or at the very top.
fn inject_style(doc: &str, css: &str) -> String {
    let block = format!("<style>{}</style>", css);
    let lower = doc.to_ascii_lowercase();

    if let Some(pos) = lower.find("</head>") {
        return format!("{}{}\n{}", &doc[..pos], block, &doc[pos..]);
    }

    if let Some(end) = open_tag_end(&lower, "head") {
        return format!("{}\n{}{}", &doc[..end], block, &doc[end..]);
    }

    let head = format!("<head>\n{}\n</head>", block);
    match open_tag_end(&lower, "html") {
        Some(end) => format!("{}{}{}", &doc[..end], head, &doc[end..]),
        None => format!("{}\n{}", head, doc),
    }
}

/// Insert a `<script>` block before the last `</body>`, or append it
pub fn inject_script(doc: &str, js: &str) -> String {
    insert_before_body_end(doc, &format!("<script>{}</script>", js))
}

/// Insert markup before the last `</body>`, or append it when there is none
pub fn insert_before_body_end(doc: &str, markup: &str) -> String {
    match doc.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{}\n{}", &doc[..pos], markup, &doc[pos..]),
        None => format!("{}{}", doc, markup),
    }
}

/// Byte offset just past the `>` of the first `<tag ...>` in a lowercased document.
///
/// Only whole tag names match: looking for `head` skips `<header>`.
fn open_tag_end(lower: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let name_end = from + found + needle.len();
        match lower[name_end..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_ascii_whitespace() => {
                return lower[name_end..].find('>').map(|gt| name_end + gt + 1);
            }
            Some(_) => from = name_end,
            None => return None,
        }
    }
    None
}
