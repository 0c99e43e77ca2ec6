use crate::regenerate::{Completion, RegenerateError, RegenerationController, Ticket};
use crate::renderer::{ClickOutcome, LinkClick, SandboxedRenderer, Surface, link_path, link_target};
use crate::selection::PageSelection;
use sitekit_assembler::list_pages;
use sitekit_client::{ApiError, SiteApi};
use sitekit_core::{GeneratedSite, SiteId};
use tracing::info;

/// Presentation state for one generated site.
///
/// Sole owner of the working site, the page selection, the renderer and the
/// regeneration controller. Every mutation goes through `&mut self`, so a page
/// swap always sees the most recently applied site.
pub struct PreviewSession<S: Surface> {
    site: GeneratedSite,
    selection: PageSelection,
    renderer: SandboxedRenderer<S>,
    controller: RegenerationController,
}

impl<S: Surface> PreviewSession<S> {
    /// Open a site on `requested` (or the entry point) and render it
    pub fn open(site: GeneratedSite, surface: S, requested: Option<&str>) -> Self {
        let mut selection = PageSelection::for_files(&site.files);
        if let Some(page) = requested {
            selection.select(&site.files, page);
        }

        let mut session = Self {
            site,
            selection,
            renderer: SandboxedRenderer::new(surface),
            controller: RegenerationController::new(),
        };
        session.reload();
        session
    }

    pub fn site(&self) -> &GeneratedSite {
        &self.site
    }

    pub fn current_page(&self) -> Option<&str> {
        self.selection.current()
    }

    /// Navigable pages of the working site, for tabs
    pub fn pages(&self) -> Vec<&str> {
        list_pages(&self.site.files)
    }

    pub fn renderer(&self) -> &SandboxedRenderer<S> {
        &self.renderer
    }

    pub fn controller(&self) -> &RegenerationController {
        &self.controller
    }

    /// Explicit page selection (tab click or navigation request)
    pub fn select_page(&mut self, requested: &str) -> Option<&str> {
        self.selection.select(&self.site.files, requested);
        self.reload();
        self.current_page()
    }

    /// Route a click from inside the surface; intercepted links swap pages
    pub fn click(&mut self, click: &mut LinkClick) -> ClickOutcome {
        match self.renderer.handle_click(click) {
            ClickOutcome::Navigate(page) => {
                let target = click
                    .href()
                    .and_then(|href| self.link_destination(href))
                    .unwrap_or(page);
                self.select_page(&target);
                ClickOutcome::Navigate(target)
            }
            ClickOutcome::Default => ClickOutcome::Default,
        }
    }

    /// Follow an internal link reported by the surface.
    ///
    /// Anything other than an internal `.html` link leaves the selection
    /// alone. Returns the page now shown.
    pub fn follow_link(&mut self, href: &str) -> Option<&str> {
        if let Some(target) = self.link_destination(href) {
            self.select_page(&target);
        }
        self.current_page()
    }

    /// Page a link leads to: the file it names relative to the current
    /// page when that exists, otherwise its final segment.
    fn link_destination(&self, href: &str) -> Option<String> {
        let segment = link_target(href)?;
        Some(
            link_path(self.current_page(), href)
                .filter(|path| self.site.files.contains_key(path))
                .unwrap_or(segment),
        )
    }

    /// Replace the working site wholesale and revalidate the selection
    pub fn replace_site(&mut self, site: GeneratedSite) -> Option<&str> {
        info!(site = %site.id, files = site.files.len(), "Replacing working site");
        self.site = site;
        self.selection.revalidate(&self.site.files);
        self.reload();
        self.current_page()
    }

    /// Start a regeneration; returns the ticket and the site it targets
    pub fn begin_regeneration(
        &mut self,
        modification_request: &str,
    ) -> Result<(Ticket, SiteId), RegenerateError> {
        let ticket = self.controller.begin(modification_request)?;
        Ok((ticket, self.site.id.clone()))
    }

    /// Apply the backend's answer for a regeneration.
    ///
    /// On success the site is replaced in full and the page re-resolved; on
    /// failure the working site is untouched. Returns the page now shown.
    pub fn finish_regeneration(
        &mut self,
        ticket: Ticket,
        result: Result<GeneratedSite, ApiError>,
    ) -> Result<Option<String>, RegenerateError> {
        match self.controller.complete(ticket, result) {
            Completion::Success(site) => Ok(self.replace_site(site).map(str::to_string)),
            Completion::Failure(e) => Err(RegenerateError::Api(e)),
            Completion::Stale => Err(RegenerateError::Stale),
        }
    }

    /// Regenerate through the backend in one step
    pub async fn regenerate(
        &mut self,
        api: &dyn SiteApi,
        modification_request: &str,
    ) -> Result<Option<String>, RegenerateError> {
        let (ticket, id) = self.begin_regeneration(modification_request)?;
        let result = api.regenerate(&id, modification_request).await;
        self.finish_regeneration(ticket, result)
    }

    /// Drop a regeneration whose caller went away before it completed
    pub fn abandon_regeneration(&mut self, ticket: Ticket) {
        self.controller.abandon(ticket);
    }

    /// Tear the view down; a pending regeneration will be discarded
    pub fn close(&mut self) {
        self.controller.retire();
    }

    fn reload(&mut self) {
        let page = self.selection.current().unwrap_or_default().to_string();
        self.renderer.load(&self.site.files, &page);
    }
}
