//! Client for the website generation backend.
//!
//! The backend owns generation, storage and authorization. This crate only
//! knows its request/response contracts, behind the [`SiteApi`] trait so the
//! presentation layer can be driven by a stub in tests.

pub mod error;
pub mod http;

pub use error::{ApiError, Result};
pub use http::HttpSiteApi;

use async_trait::async_trait;
use sitekit_core::{GeneratedSite, SiteId, SiteSummary};
use std::collections::BTreeMap;

/// Free-form generation preferences (color scheme, tone, ...)
pub type Preferences = BTreeMap<String, String>;

#[async_trait]
pub trait SiteApi: Send + Sync {
    /// Generate a new site from a natural-language description
    async fn generate(&self, description: &str, preferences: &Preferences)
    -> Result<GeneratedSite>;

    /// Regenerate a site; the result is the complete new file set
    async fn regenerate(&self, id: &SiteId, modification_request: &str) -> Result<GeneratedSite>;

    async fn get_site(&self, id: &SiteId) -> Result<GeneratedSite>;

    async fn list_sites(&self) -> Result<Vec<SiteSummary>>;

    async fn delete_site(&self, id: &SiteId) -> Result<()>;

    /// Zip archive of the site's files
    async fn download_site(&self, id: &SiteId) -> Result<Vec<u8>>;

    /// Ask the backend to expand a short description into a better prompt
    async fn improve_prompt(&self, prompt: &str) -> Result<String>;

    /// Generation suggestions for a description; the shape is backend-defined
    async fn suggestions(&self, description: &str) -> Result<serde_json::Value>;
}
