//! Surface backed by an HTML document served to a sandboxed iframe.
//!
//! The host page cannot reach into a sandboxed, cross-origin frame, so the
//! click interceptor travels inside the document itself: a capturing
//! listener that cancels internal `.html` links and reports the link path
//! to the host with `postMessage`; the host resolves it against the page
//! being shown.

use crate::renderer::{Surface, SurfaceError};
use sitekit_assembler::inject::insert_before_body_end;

/// Message type posted to the host window on an intercepted click
pub const NAVIGATE_MESSAGE: &str = "sitekit:navigate";

/// Marker attribute identifying the injected interceptor
const INTERCEPTOR_MARKER: &str = "data-sitekit-interceptor";

const INTERCEPTOR_JS: &str = r#"(function () {
  document.addEventListener('click', function (event) {
    var anchor = event.target && event.target.closest ? event.target.closest('a') : null;
    if (!anchor) return;
    var href = (anchor.getAttribute('href') || '').trim();
    if (!href || href.indexOf('//') === 0 || /^[a-z][a-z0-9+.-]*:/i.test(href)) return;
    var path = href.split(/[?#]/)[0];
    if (!/\.html$/.test(path) || !path.split('/').pop()) return;
    event.preventDefault();
    event.stopPropagation();
    window.parent.postMessage({ type: 'sitekit:navigate', href: path }, '*');
  }, true);
})();"#;

/// Iframe-backed surface holding the document to serve
#[derive(Debug, Default, Clone)]
pub struct FrameSurface {
    document: String,
}

impl FrameSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document to serve to the iframe, interceptor included
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn has_interceptor(&self) -> bool {
        self.document.contains(INTERCEPTOR_MARKER)
    }
}

impl Surface for FrameSurface {
    fn render(&mut self, document: &str) {
        self.document = document.to_string();
    }

    fn attach_interceptor(&mut self) -> Result<(), SurfaceError> {
        if self.has_interceptor() {
            return Ok(());
        }
        let tag = format!("<script {}>{}</script>", INTERCEPTOR_MARKER, INTERCEPTOR_JS);
        self.document = insert_before_body_end(&self.document, &tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{LinkClick, SandboxedRenderer};
    use std::collections::BTreeMap;

    fn site_files() -> BTreeMap<String, String> {
        [
            ("index.html", "<html><body><a href='team.html'>Team</a></body></html>"),
            ("team.html", "<html><body>Team</body></html>"),
            ("script.js", "track()"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_interceptor_injected_once_per_load() {
        let mut renderer = SandboxedRenderer::new(FrameSurface::new());
        renderer.load(&site_files(), "index.html");

        let doc = renderer.surface().document();
        assert_eq!(doc.matches(INTERCEPTOR_MARKER).count(), 1);
        assert!(doc.contains(NAVIGATE_MESSAGE));
        assert!(doc.contains("href: path"));
        assert!(doc.ends_with("</script>\n</body></html>"));

        renderer.surface_mut().attach_interceptor().unwrap();
        assert_eq!(renderer.surface().document().matches(INTERCEPTOR_MARKER).count(), 1);
    }

    #[test]
    fn test_interceptor_follows_page_swaps() {
        let files = site_files();
        let mut renderer = SandboxedRenderer::new(FrameSurface::new());
        renderer.load(&files, "index.html");

        let mut click = LinkClick::on_anchor("team.html");
        renderer.handle_click(&mut click);
        renderer.load(&files, "team.html");

        let doc = renderer.surface().document();
        assert!(doc.contains("<body>Team"));
        assert!(doc.contains("<script>track()</script>"));
        assert!(renderer.surface().has_interceptor());
    }

    #[test]
    fn test_interceptor_on_empty_document() {
        let mut surface = FrameSurface::new();
        surface.render("");
        surface.attach_interceptor().unwrap();
        assert!(surface.document().starts_with("<script data-sitekit-interceptor>"));
    }

    #[test]
    fn test_site_script_runs_before_interceptor() {
        let mut renderer = SandboxedRenderer::new(FrameSurface::new());
        renderer.load(&site_files(), "index.html");

        let doc = renderer.surface().document();
        let site_script = doc.find("<script>track()</script>").unwrap();
        let interceptor = doc.find(INTERCEPTOR_MARKER).unwrap();
        assert!(site_script < interceptor);
    }
}
