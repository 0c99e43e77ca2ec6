//! Sandboxed rendering of assembled pages with in-surface link interception.
//!
//! The rendering surface (an iframe in a browser host, a buffer in tests) is
//! abstracted behind [`Surface`]. After every load the renderer re-attaches
//! its click interceptor, because replacing the document discards any
//! listener attached to the previous one.

use sitekit_assembler::{assemble, resolve};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface document is not accessible: {0}")]
    Inaccessible(String),
}

/// Capability interface of an isolated rendering surface
pub trait Surface {
    /// Replace the surface content with a complete HTML document
    fn render(&mut self, document: &str);

    /// Attach a capturing click listener to the current document
    fn attach_interceptor(&mut self) -> Result<(), SurfaceError>;
}

/// A click inside the surface, reduced to what interception needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    href: Option<String>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl LinkClick {
    /// Click whose nearest enclosing anchor has this `href`
    pub fn on_anchor(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }

    /// Click that is not inside any link
    pub fn outside_link() -> Self {
        Self::default()
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Intercepted: swap to this page instead of navigating the surface
    Navigate(String),
    /// Left to the surface's default behavior
    Default,
}

/// Page name targeted by an internal `.html` link, if the link is one.
///
/// Query strings and fragments are ignored for the check. Links with a URL
/// scheme (`https:`, `mailto:`, ...) or protocol-relative links are external
/// and never intercepted. The result is the final path segment.
pub fn link_target(href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with("//") || has_scheme(href) {
        return None;
    }

    let path = href.split(['?', '#']).next().unwrap_or_default();
    if !path.ends_with(".html") {
        return None;
    }

    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Site-relative path an internal link points at, seen from `current`.
///
/// Relative links resolve against the directory of the linking page and a
/// leading `/` means the site root; `.` and `..` segments are applied.
/// `None` for links that are not internal `.html` links or that climb above
/// the root.
pub fn link_path(current: Option<&str>, href: &str) -> Option<String> {
    link_target(href)?;
    let path = href.trim().split(['?', '#']).next().unwrap_or_default();

    let mut segments: Vec<&str> = match current {
        Some(page) if !path.starts_with('/') => page
            .rsplit_once('/')
            .map(|(dir, _)| dir.split('/').collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            name => segments.push(name),
        }
    }

    Some(segments.join("/"))
}

fn has_scheme(href: &str) -> bool {
    let Some((scheme, _)) = href.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Hosts assembled pages inside a [`Surface`] and intercepts internal links
pub struct SandboxedRenderer<S: Surface> {
    surface: S,
    page: Option<String>,
    intercepting: bool,
}

impl<S: Surface> SandboxedRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            page: None,
            intercepting: false,
        }
    }

    /// Assemble a page and load it into the surface.
    ///
    /// The page is resolved against the file set first; a site with no page
    /// renders an empty document. Returns the page actually shown.
    pub fn load(&mut self, files: &BTreeMap<String, String>, page: &str) -> Option<&str> {
        self.page = resolve(files, page).map(str::to_string);
        let document = match self.page.as_deref() {
            Some(resolved) => assemble(files, resolved),
            None => String::new(),
        };
        self.surface.render(&document);

        self.intercepting = match self.surface.attach_interceptor() {
            Ok(()) => true,
            Err(e) => {
                // Links keep working as plain in-surface navigation.
                warn!(error = %e, "Link interception unavailable");
                false
            }
        };

        debug!(page = ?self.page, bytes = document.len(), "Surface loaded");
        self.page.as_deref()
    }

    /// Decide what a click inside the surface does.
    ///
    /// Internal `.html` links are cancelled (default and propagation) and
    /// turned into a navigation request; everything else is left alone.
    pub fn handle_click(&mut self, click: &mut LinkClick) -> ClickOutcome {
        if !self.intercepting {
            return ClickOutcome::Default;
        }

        match click.href().and_then(link_target) {
            Some(target) => {
                click.prevent_default();
                click.stop_propagation();
                ClickOutcome::Navigate(target)
            }
            None => ClickOutcome::Default,
        }
    }

    pub fn current_page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub fn is_intercepting(&self) -> bool {
        self.intercepting
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory surface recording every render and attach
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub documents: Vec<String>,
        pub attaches: usize,
        pub locked: bool,
    }

    impl RecordingSurface {
        pub fn locked() -> Self {
            Self {
                locked: true,
                ..Self::default()
            }
        }

        pub fn last(&self) -> &str {
            self.documents.last().map(String::as_str).unwrap_or_default()
        }
    }

    impl Surface for RecordingSurface {
        fn render(&mut self, document: &str) {
            self.documents.push(document.to_string());
        }

        fn attach_interceptor(&mut self) -> Result<(), SurfaceError> {
            if self.locked {
                return Err(SurfaceError::Inaccessible("cross-origin".to_string()));
            }
            self.attaches += 1;
            Ok(())
        }
    }
}
