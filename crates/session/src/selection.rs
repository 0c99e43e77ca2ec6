use sitekit_assembler::pages::{entry_point, resolve};
use std::collections::BTreeMap;

/// The page currently shown for a site.
///
/// Always a page of the active file set, or empty when the site has none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    current: Option<String>,
}

impl PageSelection {
    /// Start on the entry point of a file set
    pub fn for_files(files: &BTreeMap<String, String>) -> Self {
        Self {
            current: entry_point(files).map(str::to_string),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Select a page, falling back per the page registry when it is absent
    pub fn select(&mut self, files: &BTreeMap<String, String>, requested: &str) -> Option<&str> {
        self.current = resolve(files, requested).map(str::to_string);
        self.current()
    }

    /// Re-check the selection against a new file set.
    ///
    /// The current page is kept when it still exists; otherwise the
    /// selection silently moves to the fallback page.
    pub fn revalidate(&mut self, files: &BTreeMap<String, String>) -> Option<&str> {
        self.current = match self.current.as_deref() {
            Some(page) => resolve(files, page),
            None => entry_point(files),
        }
        .map(str::to_string);
        self.current()
    }
}
