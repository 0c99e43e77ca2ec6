use super::SiteSource;
use anyhow::{Context, Result};
use sitekit_assembler::export_site;
use sitekit_core::Config;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Write every page as a self-contained HTML file, optionally zipped
pub async fn run(config: &Config, source: &SiteSource, output: PathBuf, zip: bool) -> Result<()> {
    let site = source.load(config).await?;
    println!("📤 Exporting website {} to {}", site.id, output.display());

    let written = export_site(&site, &output)
        .with_context(|| format!("Failed to export to {}", output.display()))?;
    for path in &written {
        println!("   ✓ {}", path.strip_prefix(&output).unwrap_or(path).display());
    }

    if zip {
        let archive = archive_path(&output)?;
        create_archive(&output, &archive)?;
        println!("📦 Archive: {}", archive.display());
    }

    println!("\n✅ Exported {} file(s)", written.len());
    Ok(())
}

/// `<dir>.zip` next to an exported directory, keeping any dots in its name
fn archive_path(dir: &Path) -> Result<PathBuf> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dir.display()))?;
    let Some(name) = dir.file_name() else {
        anyhow::bail!("Cannot name an archive for {}", dir.display());
    };
    let mut archive = name.to_os_string();
    archive.push(".zip");
    Ok(dir.with_file_name(archive))
}

/// Package a directory into a deflated zip archive
fn create_archive(dir: &Path, archive: &Path) -> Result<()> {
    let file = File::create(archive)
        .with_context(|| format!("Failed to create {}", archive.display()))?;
    let mut zip = ZipWriter::new(file);

    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let relative = path
            .strip_prefix(dir)
            .context("Failed to get relative path")?;

        // Zip entry names always use forward slashes
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;

        let mut f = File::open(path)?;
        std::io::copy(&mut f, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitekit_core::GeneratedSite;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_archive_contains_exported_pages() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("site");
        let site = GeneratedSite::new(
            "3",
            [
                ("index.html", "<html><head></head><body>Home</body></html>"),
                ("blog/post.html", "<p>Post</p>"),
                ("styles.css", "body{}"),
            ],
        );
        export_site(&site, &output).unwrap();

        let archive = temp.path().join("site.zip");
        create_archive(&output, &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["blog/post.html", "index.html"]);

        let mut index = String::new();
        zip.by_name("index.html")
            .unwrap()
            .read_to_string(&mut index)
            .unwrap();
        assert!(index.contains("<style>body{}</style>"));
    }

    #[test]
    fn test_archive_path_appends_zip() {
        let temp = TempDir::new().unwrap();
        let versioned = temp.path().join("site.v2");
        std::fs::create_dir(&versioned).unwrap();

        let archive = archive_path(&versioned).unwrap();
        assert_eq!(archive.file_name().unwrap(), "site.v2.zip");
        assert_eq!(archive.parent(), versioned.canonicalize().unwrap().parent());
    }

    #[test]
    fn test_archive_path_for_current_directory() {
        let temp = TempDir::new().unwrap();
        let site = temp.path().join("site");
        std::fs::create_dir(&site).unwrap();

        let archive = archive_path(&site.join(".")).unwrap();
        assert_eq!(archive.file_name().unwrap(), "site.zip");
        assert!(!archive.starts_with(site.canonicalize().unwrap()));
    }
}
