use crate::inject::assemble;
use sitekit_core::{Error, GeneratedSite, Result, SCRIPT, STYLESHEET, is_html_page};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Write a site to disk as self-contained pages.
///
/// Every HTML page is assembled with the shared stylesheet and script
/// inlined; the shared assets themselves are not written. Any other file is
/// copied through unchanged. Every name is validated before anything is
/// written, so a bad name leaves no partial export behind. Returns the
/// written paths.
pub fn export_site(site: &GeneratedSite, output: &Path) -> Result<Vec<PathBuf>> {
    let entries = site
        .files
        .iter()
        .filter(|(name, _)| *name != STYLESHEET && *name != SCRIPT)
        .map(|(name, content)| Ok((name, content, validate_path(name, "file name")?)))
        .collect::<Result<Vec<_>>>()?;

    fs::create_dir_all(output)?;

    let mut written = Vec::new();
    for (name, content, relative) in entries {
        let target = output.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if is_html_page(name) {
            fs::write(&target, assemble(&site.files, name))?;
        } else {
            fs::write(&target, content)?;
        }
        tracing::debug!(file = %name, path = %target.display(), "Exported");
        written.push(target);
    }

    Ok(written)
}

/// Validate a filename from the backend before it touches the filesystem.
///
/// Rejects absolute paths, parent directory references (`..`) and empty
/// names, so a generated file set can never write outside the export
/// directory.
pub fn validate_path(path_str: &str, field_name: &str) -> Result<PathBuf> {
    if path_str.trim().is_empty() {
        return Err(Error::InvalidData(format!(
            "Empty path in '{}' field",
            field_name
        )));
    }

    let path = Path::new(path_str);

    if path.is_absolute() || path_str.starts_with('/') || path_str.starts_with('\\') {
        return Err(Error::InvalidData(format!(
            "Absolute paths not allowed in '{}': '{}'. Use relative paths only.",
            field_name, path_str
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(Error::InvalidData(format!(
                    "Parent directory references (..) not allowed in '{}': '{}'",
                    field_name, path_str
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::InvalidData(format!(
                    "Absolute paths not allowed in '{}': '{}'. Use relative paths only.",
                    field_name, path_str
                )));
            }
            _ => {}
        }
    }

    Ok(path.to_path_buf())
}
