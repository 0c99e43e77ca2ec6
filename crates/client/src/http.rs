use crate::error::{ApiError, Result};
use crate::{Preferences, SiteApi};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sitekit_core::config::ApiConfig;
use sitekit_core::{GeneratedSite, SiteId, SiteSummary};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Single-site response wrapper: `{"website": {...}}`
#[derive(Debug, Deserialize)]
struct SiteEnvelope {
    website: WireSite,
}

#[derive(Debug, Deserialize)]
struct WireSite {
    id: SiteId,
    #[serde(default, alias = "files")]
    generated_files: Option<BTreeMap<String, String>>,
}

impl From<WireSite> for GeneratedSite {
    fn from(site: WireSite) -> Self {
        GeneratedSite {
            id: site.id,
            files: site.generated_files.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    websites: Vec<SiteSummary>,
}

#[derive(Debug, Deserialize)]
struct ImprovedPrompt {
    improved_prompt: String,
}

#[derive(Debug, Deserialize)]
struct Suggestions {
    suggestions: serde_json::Value,
}

/// Backend error body: `{"error": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// reqwest-backed [`SiteApi`]
#[derive(Clone)]
pub struct HttpSiteApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSiteApi {
    /// Create a client for the configured backend.
    ///
    /// The bearer token, when present, is attached to every request.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::Config(format!("Invalid API token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a JSON body, mapping non-2xx to `ApiError::Status`
    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Turn a non-2xx response into an error carrying the backend's message
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => err.error,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

fn require_text(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidRequest(format!("{} is required", what)));
    }
    Ok(())
}

#[async_trait]
impl SiteApi for HttpSiteApi {
    async fn generate(
        &self,
        description: &str,
        preferences: &Preferences,
    ) -> Result<GeneratedSite> {
        require_text(description, "Description")?;
        info!(preferences = preferences.len(), "Requesting site generation");

        let body = serde_json::json!({
            "description": description,
            "preferences": preferences,
        });
        let envelope: SiteEnvelope = self
            .send_json(self.client.post(self.url("/ai/generate")).json(&body))
            .await?;

        let site = GeneratedSite::from(envelope.website);
        debug!(site = %site.id, files = site.files.len(), "Site generated");
        Ok(site)
    }

    async fn regenerate(&self, id: &SiteId, modification_request: &str) -> Result<GeneratedSite> {
        require_text(modification_request, "Modification request")?;
        info!(site = %id, "Requesting site regeneration");

        let body = serde_json::json!({ "modification_request": modification_request });
        let envelope: SiteEnvelope = self
            .send_json(
                self.client
                    .post(self.url(&format!("/ai/regenerate/{}", id)))
                    .json(&body),
            )
            .await?;

        Ok(envelope.website.into())
    }

    async fn get_site(&self, id: &SiteId) -> Result<GeneratedSite> {
        debug!(site = %id, "Fetching site");
        let envelope: SiteEnvelope = self
            .send_json(self.client.get(self.url(&format!("/ai/websites/{}", id))))
            .await?;
        Ok(envelope.website.into())
    }

    async fn list_sites(&self) -> Result<Vec<SiteSummary>> {
        let envelope: ListEnvelope = self
            .send_json(self.client.get(self.url("/ai/websites")))
            .await?;
        Ok(envelope.websites)
    }

    async fn delete_site(&self, id: &SiteId) -> Result<()> {
        info!(site = %id, "Deleting site");
        let response = self
            .client
            .delete(self.url(&format!("/ai/websites/{}", id)))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn download_site(&self, id: &SiteId) -> Result<Vec<u8>> {
        // The download route also accepts the credential as a query parameter,
        // which is what browser-initiated downloads rely on.
        let mut request = self
            .client
            .get(self.url(&format!("/ai/websites/{}/download", id)));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let response = check_status(request.send().await?).await?;
        let bytes = response.bytes().await?;
        debug!(site = %id, bytes = bytes.len(), "Downloaded archive");
        Ok(bytes.to_vec())
    }

    async fn improve_prompt(&self, prompt: &str) -> Result<String> {
        require_text(prompt, "Prompt")?;
        let body = serde_json::json!({ "prompt": prompt });
        let improved: ImprovedPrompt = self
            .send_json(self.client.post(self.url("/ai/improve-prompt")).json(&body))
            .await?;
        Ok(improved.improved_prompt)
    }

    async fn suggestions(&self, description: &str) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "description": description });
        let suggestions: Suggestions = self
            .send_json(self.client.post(self.url("/ai/suggestions")).json(&body))
            .await?;
        Ok(suggestions.suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    /// Serve a stub backend on an ephemeral port and return its API base URL
    async fn spawn_backend(routes: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().nest("/api", routes);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn client(base_url: &str, token: Option<&str>) -> HttpSiteApi {
        HttpSiteApi::new(&ApiConfig {
            base_url: base_url.to_string(),
            token: token.map(str::to_string),
        })
        .unwrap()
    }

    fn website(id: u64, files: Value) -> Value {
        json!({
            "website": {
                "id": id,
                "user_id": 1,
                "description": "bakery",
                "generated_files": files,
                "created_at": "2025-01-01T10:00:00.000001",
                "file_path": "uploads/ai/user_1"
            },
            "preview": "<html></html>",
            "download_url": format!("/api/ai/websites/{}/download", id),
            "files": ["index.html"]
        })
    }

    #[tokio::test]
    async fn test_generate_sends_description_and_preferences() {
        let routes = Router::new().route(
            "/ai/generate",
            post(|Json(body): Json<Value>| async move {
                let color = body["preferences"]["color"].as_str().unwrap_or("none").to_string();
                let description = body["description"].as_str().unwrap_or_default().to_string();
                (
                    StatusCode::CREATED,
                    Json(website(
                        12,
                        json!({
                            "index.html": format!("<h1>{}</h1>", description),
                            "styles.css": format!("h1{{color:{}}}", color)
                        }),
                    )),
                )
            }),
        );
        let api = client(&spawn_backend(routes).await, Some("tok"));

        let mut prefs = Preferences::new();
        prefs.insert("color".to_string(), "teal".to_string());
        let site = api.generate("A bakery", &prefs).await.unwrap();

        assert_eq!(site.id.as_str(), "12");
        assert_eq!(site.file("index.html"), Some("<h1>A bakery</h1>"));
        assert_eq!(site.stylesheet(), Some("h1{color:teal}"));
    }

    #[tokio::test]
    async fn test_empty_description_is_refused_locally() {
        // Nothing listens here; the request must not be attempted.
        let api = client("http://127.0.0.1:9/api", None);
        let result = api.generate("   ", &Preferences::new()).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));

        let result = api.regenerate(&SiteId::from("1"), "").await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_regenerate_returns_full_replacement() {
        let routes = Router::new().route(
            "/ai/regenerate/{id}",
            post(|Path(id): Path<u64>, Json(body): Json<Value>| async move {
                let request = body["modification_request"].as_str().unwrap_or_default();
                Json(website(id, json!({ "index.html": format!("<p>{}</p>", request) })))
            }),
        );
        let api = client(&spawn_backend(routes).await, None);

        let site = api
            .regenerate(&SiteId::from("5"), "make it blue")
            .await
            .unwrap();
        assert_eq!(site.id.as_str(), "5");
        assert_eq!(site.files.len(), 1);
        assert_eq!(site.file("index.html"), Some("<p>make it blue</p>"));
    }

    #[tokio::test]
    async fn test_error_field_becomes_message() {
        let routes = Router::new().route(
            "/ai/regenerate/{id}",
            post(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "Unauthorized" })),
                )
            }),
        );
        let api = client(&spawn_backend(routes).await, None);

        match api.regenerate(&SiteId::from("5"), "x").await {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("expected status error, got {:?}", other.map(|s| s.id)),
        }
    }

    #[tokio::test]
    async fn test_plain_text_error_body() {
        let routes = Router::new().route(
            "/ai/websites/{id}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom\n").into_response() }),
        );
        let api = client(&spawn_backend(routes).await, None);

        let err = api.get_site(&SiteId::from("1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Server error (500): boom");
    }

    #[tokio::test]
    async fn test_get_site_with_null_files() {
        let routes = Router::new().route(
            "/ai/websites/{id}",
            get(|Path(id): Path<u64>| async move { Json(json!({ "website": { "id": id, "generated_files": null } })) }),
        );
        let api = client(&spawn_backend(routes).await, None);

        let site = api.get_site(&SiteId::from("8")).await.unwrap();
        assert_eq!(site.id.as_str(), "8");
        assert!(site.files.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let routes = Router::new().route(
            "/ai/websites/{id}",
            get(|| async { Json(json!({ "site": {} })) }),
        );
        let api = client(&spawn_backend(routes).await, None);

        let result = api.get_site(&SiteId::from("1")).await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn test_list_sites() {
        let routes = Router::new().route(
            "/ai/websites",
            get(|| async {
                Json(json!({
                    "websites": [
                        { "id": 2, "description": "Gym", "created_at": "2025-02-02T08:00:00", "preview": "<html>" },
                        { "id": 1, "description": "Cafe", "created_at": "2025-01-01T08:00:00" }
                    ]
                }))
            }),
        );
        let api = client(&spawn_backend(routes).await, None);

        let sites = api.list_sites().await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].description, "Gym");
        assert_eq!(sites[0].preview.as_deref(), Some("<html>"));
        assert!(sites[1].created_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_site_reports_missing() {
        let routes = Router::new().route(
            "/ai/websites/{id}",
            axum::routing::delete(|Path(id): Path<u64>| async move {
                if id == 1 {
                    (StatusCode::OK, Json(json!({ "message": "Website deleted successfully" })))
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
                }
            }),
        );
        let api = client(&spawn_backend(routes).await, None);

        api.delete_site(&SiteId::from("1")).await.unwrap();
        let err = api.delete_site(&SiteId::from("2")).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_download_sends_credential_both_ways() {
        let routes = Router::new().route(
            "/ai/websites/{id}/download",
            get(
                |Query(query): Query<HashMap<String, String>>, headers: AxumHeaders| async move {
                    let from_query = query.get("token").map(String::as_str);
                    let from_header = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok());
                    if from_query == Some("s3cret") && from_header == Some("Bearer s3cret") {
                        (StatusCode::OK, vec![0x50, 0x4b, 0x03, 0x04]).into_response()
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Token is missing" })))
                            .into_response()
                    }
                },
            ),
        );
        let base = spawn_backend(routes).await;

        let bytes = client(&base, Some("s3cret"))
            .download_site(&SiteId::from("3"))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);

        let err = client(&base, None)
            .download_site(&SiteId::from("3"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Server error (401): Token is missing");
    }

    #[tokio::test]
    async fn test_improve_prompt_and_suggestions() {
        let routes = Router::new()
            .route(
                "/ai/improve-prompt",
                post(|Json(body): Json<Value>| async move {
                    let prompt = body["prompt"].as_str().unwrap_or_default();
                    Json(json!({
                        "original_prompt": prompt,
                        "improved_prompt": format!("{} with a menu page", prompt)
                    }))
                }),
            )
            .route(
                "/ai/suggestions",
                post(|| async { Json(json!({ "suggestions": { "pages": ["menu.html"] } })) }),
            );
        let api = client(&spawn_backend(routes).await, None);

        let improved = api.improve_prompt("cafe site").await.unwrap();
        assert_eq!(improved, "cafe site with a menu page");

        let suggestions = api.suggestions("cafe").await.unwrap();
        assert_eq!(suggestions["pages"][0], "menu.html");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{}/api", addr), None);
        let result = api.list_sites().await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }

    #[test]
    fn test_invalid_token_characters() {
        let result = HttpSiteApi::new(&ApiConfig {
            base_url: "http://localhost:5000/api".to_string(),
            token: Some("bad\ntoken".to_string()),
        });
        assert!(matches!(result, Err(ApiError::Config(_))));
    }
}
