use super::SiteSource;
use anyhow::{Context, Result};
use sitekit_assembler::{assemble, resolve};
use sitekit_core::{Config, ENTRY_POINT};
use std::fs;
use std::path::PathBuf;

/// Assemble one page and print it (or write it to `output`).
///
/// Status goes to stderr so stdout carries only the document.
pub async fn run(
    config: &Config,
    source: &SiteSource,
    page: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let site = source.load(config).await?;
    let requested = page.as_deref().unwrap_or(ENTRY_POINT);

    match resolve(&site.files, requested) {
        Some(resolved) if resolved != requested => {
            eprintln!("⚠️  {} not found, showing {}", requested, resolved);
        }
        Some(_) => {}
        None => eprintln!("⚠️  Website {} has no HTML pages", site.id),
    }

    let document = assemble(&site.files, requested);
    match output {
        Some(path) => {
            fs::write(&path, &document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Wrote {} ({} bytes)", path.display(), document.len());
        }
        None => println!("{}", document),
    }
    Ok(())
}
