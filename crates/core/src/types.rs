use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Default page shown when no specific page is requested
pub const ENTRY_POINT: &str = "index.html";

/// Stylesheet shared by every page of a generated site
pub const STYLESHEET: &str = "styles.css";

/// Script shared by every page of a generated site
pub const SCRIPT: &str = "script.js";

/// Whether a filename is a navigable HTML page
pub fn is_html_page(name: &str) -> bool {
    name.ends_with(".html")
}

/// Opaque site identifier assigned by the generation service.
///
/// The backend emits integers, but nothing here depends on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for SiteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SiteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for SiteId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for SiteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => SiteId(s),
            RawId::Number(n) => SiteId(n.to_string()),
        })
    }
}

/// One generated multi-file website.
///
/// Replaced wholesale on regeneration; files are never merged individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSite {
    pub id: SiteId,
    /// Filename to raw text content, ordered by filename
    #[serde(alias = "generated_files")]
    pub files: BTreeMap<String, String>,
}

impl GeneratedSite {
    pub fn new<K, V>(id: impl Into<SiteId>, files: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: id.into(),
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load a site from a local directory.
    ///
    /// Every readable text file becomes an entry keyed by its forward-slash
    /// relative path. Hidden files and directories are skipped.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::InvalidData(format!(
                "Site directory does not exist: {}",
                dir.display()
            )));
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| Error::InvalidData(e.to_string()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match fs::read_to_string(entry.path()) {
                Ok(content) => {
                    files.insert(name, content);
                }
                Err(e) => {
                    tracing::debug!(file = %name, error = %e, "Skipping non-text file");
                }
            }
        }

        if !files.keys().any(|name| is_html_page(name)) {
            return Err(Error::InvalidData(format!(
                "No .html pages found in {}",
                dir.display()
            )));
        }

        Ok(Self {
            id: SiteId::new("local"),
            files,
        })
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// HTML pages in filename order
    pub fn html_pages(&self) -> impl Iterator<Item = &str> {
        self.files
            .keys()
            .map(String::as_str)
            .filter(|name| is_html_page(name))
    }

    pub fn stylesheet(&self) -> Option<&str> {
        self.file(STYLESHEET)
    }

    pub fn script(&self) -> Option<&str> {
        self.file(SCRIPT)
    }
}

/// Listing entry for a previously generated site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSummary {
    pub id: SiteId,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Leading snippet of the entry page, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Parse a backend timestamp: RFC 3339, or a naive ISO-8601 value taken as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_site_id_accepts_number_and_string() {
        let id: SiteId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");

        let id: SiteId = serde_json::from_str("\"abc-1\"").unwrap();
        assert_eq!(id.to_string(), "abc-1");
    }

    #[test]
    fn test_generated_site_reads_backend_field_name() {
        let json = r#"{"id": 7, "generated_files": {"index.html": "<html></html>", "styles.css": "a{}"}}"#;
        let site: GeneratedSite = serde_json::from_str(json).unwrap();
        assert_eq!(site.id, SiteId::from(7u64));
        assert_eq!(site.stylesheet(), Some("a{}"));
        assert_eq!(site.script(), None);
    }

    #[test]
    fn test_html_pages_are_ordered_and_filtered() {
        let site = GeneratedSite::new(
            "1",
            [
                ("services.html", ""),
                ("about.html", ""),
                ("styles.css", ""),
                ("index.html", ""),
                ("notes.htm", ""),
            ],
        );
        let pages: Vec<_> = site.html_pages().collect();
        assert_eq!(pages, vec!["about.html", "index.html", "services.html"]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let naive = parse_timestamp("2025-03-01T12:30:45.123456").unwrap();
        assert_eq!(naive.to_rfc3339(), "2025-03-01T12:30:45.123456+00:00");

        let plain = parse_timestamp("2025-03-01T12:30:45").unwrap();
        assert_eq!(plain.timestamp(), naive.timestamp());

        let offset = parse_timestamp("2025-03-01T14:30:45+02:00").unwrap();
        assert_eq!(offset.timestamp(), plain.timestamp());

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_summary_tolerates_missing_fields() {
        let summary: SiteSummary = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(summary.description, "");
        assert!(summary.created_at.is_none());

        let summary: SiteSummary =
            serde_json::from_str(r#"{"id": 3, "created_at": "not a date"}"#).unwrap();
        assert!(summary.created_at.is_none());
    }

    #[test]
    fn test_from_dir_loads_nested_files_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("styles.css"), "body{}").unwrap();
        fs::write(dir.path().join(".DS_Store"), "junk").unwrap();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/post.html"), "<p>post</p>").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();

        let site = GeneratedSite::from_dir(dir.path()).unwrap();
        let names: Vec<_> = site.files.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["blog/post.html", "index.html", "styles.css"]);
        assert_eq!(site.id.as_str(), "local");
    }

    #[test]
    fn test_from_dir_requires_an_html_page() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("styles.css"), "body{}").unwrap();

        let result = GeneratedSite::from_dir(dir.path());
        assert!(result.unwrap_err().to_string().contains("No .html pages"));
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let result = GeneratedSite::from_dir("/definitely/not/here");
        assert!(result.is_err());
    }
}
