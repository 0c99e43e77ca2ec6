pub mod assemble;
pub mod configure;
pub mod export;
pub mod preview;
pub mod sites;

use anyhow::{Context, Result};
use clap::Args;
use sitekit_client::{HttpSiteApi, SiteApi};
use sitekit_core::config::default_config_path;
use sitekit_core::{Config, GeneratedSite, SiteId, load_config};
use std::io::{self, Write};
use std::path::PathBuf;

/// Load ~/.sitekit/config.toml and apply environment overrides
pub fn settings() -> Result<Config> {
    let path = default_config_path()?;
    let config =
        load_config(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(config.with_env()?)
}

pub fn client(config: &Config) -> Result<HttpSiteApi> {
    HttpSiteApi::new(&config.api).context("Failed to create API client")
}

/// Where a site's files come from: the backend or a local directory
#[derive(Debug, Clone, Args)]
pub struct SiteSource {
    /// Website id on the backend
    #[arg(required_unless_present = "dir")]
    pub id: Option<String>,

    /// Directory holding the site's files
    #[arg(long, conflicts_with = "id")]
    pub dir: Option<PathBuf>,
}

impl SiteSource {
    pub fn is_local(&self) -> bool {
        self.dir.is_some()
    }

    pub async fn load(&self, config: &Config) -> Result<GeneratedSite> {
        match (&self.dir, &self.id) {
            (Some(dir), _) => GeneratedSite::from_dir(dir)
                .with_context(|| format!("Failed to load site from {}", dir.display())),
            (None, Some(id)) => fetch_site(config, &SiteId::new(id.as_str())).await,
            (None, None) => anyhow::bail!("Either a website id or --dir is required"),
        }
    }
}

pub async fn fetch_site(config: &Config, id: &SiteId) -> Result<GeneratedSite> {
    client(config)?
        .get_site(id)
        .await
        .with_context(|| format!("Failed to fetch website {}", id))
}

/// Parse a `key=value` generation preference
pub fn parse_preference(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty preference name in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn read_input(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Ask a yes/no question; anything but y/yes is a no
pub fn confirm(question: &str) -> Result<bool> {
    let answer = read_input(&format!("❓ {} (y/N): ", question))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}
