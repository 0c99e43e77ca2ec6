use super::read_input;
use anyhow::{Context, Result};
use sitekit_core::config::{
    ApiConfig, default_config_path, normalize_token, save_config, validate_base_url,
};
use sitekit_core::{Config, load_config};

/// Interactively set the backend URL and API token
pub fn run() -> Result<()> {
    println!("🔧 Configuring sitekit...\n");

    let path = default_config_path()?;
    let existing =
        load_config(&path).with_context(|| format!("Failed to load {}", path.display()))?;

    println!("📋 You'll need:");
    println!("   1. The generation backend URL (default: {})", existing.api.base_url);
    println!("   2. An API token, if the backend requires sign-in");
    println!();

    let url_input = read_input(&format!("Backend URL [current: {}]: ", existing.api.base_url))?;

    let token_prompt = match existing.api.token.as_deref() {
        Some(token) => format!(
            "API Token [current: {}] (press Enter to keep, 'none' to remove): ",
            mask_token(token)
        ),
        None => "API Token (optional, press Enter to skip): ".to_string(),
    };
    let token_input = read_input(&token_prompt)?;

    let config = apply_answers(existing, &url_input, &token_input)?;
    save_config(&path, &config)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!();
    println!("✅ Configuration saved to {}", path.display());
    println!("   Backend: {}", config.api.base_url);
    if config.api.token.is_none() {
        println!("   💡 Tip: set SITEKIT_TOKEN to authenticate for a single run");
    }
    println!();
    println!("🚀 Ready! Try: sitekit generate \"a landing page for a bakery\"");

    Ok(())
}

/// Merge prompt answers into the existing config; blank answers keep the current value
fn apply_answers(existing: Config, url_input: &str, token_input: &str) -> Result<Config> {
    let base_url = if url_input.is_empty() {
        existing.api.base_url
    } else {
        validate_base_url(url_input, "backend URL")?
    };

    let token = if token_input.is_empty() {
        existing.api.token
    } else if token_input.eq_ignore_ascii_case("none") {
        None
    } else {
        normalize_token(Some(token_input.to_string()))
    };

    Ok(Config {
        api: ApiConfig { base_url, token },
        preview: existing.preview,
    })
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(6).collect();
    format!("{}...", visible)
}
