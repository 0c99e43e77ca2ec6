//! Commands that talk to the generation backend.

use super::{client, confirm, fetch_site};
use anyhow::{Context, Result};
use sitekit_assembler::{entry_point, list_pages};
use sitekit_client::{Preferences, SiteApi};
use sitekit_core::{Config, GeneratedSite, SiteId, SiteSummary};
use sitekit_session::{FrameSurface, PreviewSession};
use std::fs;
use std::path::PathBuf;

const DESCRIPTION_WIDTH: usize = 60;

pub async fn generate(
    config: &Config,
    description: &str,
    preferences: Vec<(String, String)>,
) -> Result<()> {
    println!("✨ Generating website...");
    let preferences: Preferences = preferences.into_iter().collect();
    for (key, value) in &preferences {
        println!("   {}: {}", key, value);
    }

    let site = client(config)?
        .generate(description, &preferences)
        .await
        .context("Failed to generate website")?;

    println!("\n✅ Generated website {}", site.id);
    for line in describe_site(&site) {
        println!("{}", line);
    }
    println!("\n💡 Preview it with: sitekit preview {}", site.id);
    Ok(())
}

pub async fn improve(config: &Config, prompt: &str) -> Result<()> {
    let improved = client(config)?
        .improve_prompt(prompt)
        .await
        .context("Failed to improve prompt")?;
    println!("{}", improved);
    Ok(())
}

pub async fn suggest(config: &Config, description: &str) -> Result<()> {
    let suggestions = client(config)?
        .suggestions(description)
        .await
        .context("Failed to get suggestions")?;
    println!("{}", serde_json::to_string_pretty(&suggestions)?);
    Ok(())
}

pub async fn list(config: &Config) -> Result<()> {
    let sites = client(config)?
        .list_sites()
        .await
        .context("Failed to list websites")?;

    if sites.is_empty() {
        println!("No websites yet. Create one with: sitekit generate \"<description>\"");
        return Ok(());
    }

    println!("📚 {} website(s)\n", sites.len());
    for summary in &sites {
        println!("{}", format_summary(summary));
    }
    Ok(())
}

pub async fn show(config: &Config, id: &str) -> Result<()> {
    let site = fetch_site(config, &SiteId::new(id)).await?;
    println!("🌐 Website {}\n", site.id);
    for line in describe_site(&site) {
        println!("{}", line);
    }
    Ok(())
}

/// Regenerate a site and report which page the viewer lands on
pub async fn regenerate(
    config: &Config,
    id: &str,
    request: &str,
    page: Option<String>,
) -> Result<()> {
    let api = client(config)?;
    let site = api
        .get_site(&SiteId::new(id))
        .await
        .with_context(|| format!("Failed to fetch website {}", id))?;

    let mut session = PreviewSession::open(site, FrameSurface::new(), page.as_deref());
    println!("🔄 Regenerating website {}...", id);
    if let Some(current) = session.current_page() {
        println!("   Viewing: {}", current);
    }

    let shown = session.regenerate(&api, request).await?;

    println!("\n✅ Website regenerated");
    match shown {
        Some(page) => println!("   Showing: {}", page),
        None => println!("   ⚠️  The regenerated site has no HTML pages"),
    }
    for line in describe_site(session.site()) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn delete(config: &Config, id: &str, force: bool) -> Result<()> {
    if !force && !confirm(&format!("Delete website {}?", id))? {
        println!("Cancelled");
        return Ok(());
    }

    client(config)?
        .delete_site(&SiteId::new(id))
        .await
        .with_context(|| format!("Failed to delete website {}", id))?;
    println!("🗑️  Deleted website {}", id);
    Ok(())
}

pub async fn download(config: &Config, id: &str, output: PathBuf) -> Result<()> {
    let bytes = client(config)?
        .download_site(&SiteId::new(id))
        .await
        .with_context(|| format!("Failed to download website {}", id))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("📦 Saved {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

/// Page list (entry point marked) followed by every file with its size
fn describe_site(site: &GeneratedSite) -> Vec<String> {
    let entry = entry_point(&site.files);
    let pages = list_pages(&site.files);

    let mut lines = vec![format!("   Pages ({}):", pages.len())];
    for page in pages {
        let marker = if Some(page) == entry { " (entry)" } else { "" };
        lines.push(format!("     • {}{}", page, marker));
    }

    lines.push(format!("   Files ({}):", site.files.len()));
    for (name, content) in &site.files {
        lines.push(format!("     {:<24} {:>8} bytes", name, content.len()));
    }
    lines
}

fn format_summary(summary: &SiteSummary) -> String {
    let created = summary
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "  {:>6}  {:<16}  {}",
        summary.id,
        created,
        truncate(&summary.description, DESCRIPTION_WIDTH)
    )
}

fn truncate(text: &str, width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let cut: String = flat.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
