//! Page registry: which files of a site are navigable, and which one to show.

use sitekit_core::{ENTRY_POINT, is_html_page};
use std::collections::BTreeMap;

/// HTML entry points of a site, in filename order
pub fn list_pages(files: &BTreeMap<String, String>) -> Vec<&str> {
    files
        .keys()
        .map(String::as_str)
        .filter(|name| is_html_page(name))
        .collect()
}

/// Resolve a requested page against a file set.
///
/// Returns the requested page if it is an HTML page of the site, otherwise
/// `index.html` if present, otherwise the first page in filename order.
/// `None` means the site has no page at all.
pub fn resolve<'a>(files: &'a BTreeMap<String, String>, requested: &str) -> Option<&'a str> {
    if is_html_page(requested)
        && let Some((name, _)) = files.get_key_value(requested)
    {
        return Some(name.as_str());
    }
    entry_point(files)
}

/// Default page of a site: `index.html`, else the first HTML page
pub fn entry_point(files: &BTreeMap<String, String>) -> Option<&str> {
    if let Some((name, _)) = files.get_key_value(ENTRY_POINT) {
        return Some(name.as_str());
    }
    files
        .keys()
        .map(String::as_str)
        .find(|name| is_html_page(name))
}
