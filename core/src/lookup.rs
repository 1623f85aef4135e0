// core/src/lookup.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_LOOKUP_URL: &str = "https://giscus.app/api/discussions/categories";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// A discussion category as returned by the lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub emoji: String,
    pub name: String,
}

/// Lookup result for an eligible repository. Category order is server-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub repository_id: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Why a lookup failed. The validator only cares that it failed; the
/// variants exist for logs and for the CLI's error output.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("repository identifier is empty")]
    EmptyIdentifier,

    #[error("invalid lookup endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("repository not eligible ({status}): {message}")]
    NotEligible { status: u16, message: String },
}

/// The external service that resolves `owner/name` to a repository id and
/// its discussion categories.
#[async_trait]
pub trait RepositoryLookup: Send + Sync {
    async fn lookup(&self, identifier: &str) -> Result<RepositoryInfo, LookupError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the categories endpoint: `GET {endpoint}?repo={identifier}`.
#[derive(Debug, Clone)]
pub struct HttpLookup {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpLookup {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, LookupError> {
        let endpoint = Url::parse(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("discuss-embed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, identifier: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("repo", identifier);
        url
    }
}

#[async_trait]
impl RepositoryLookup for HttpLookup {
    async fn lookup(&self, identifier: &str) -> Result<RepositoryInfo, LookupError> {
        if identifier.trim().is_empty() {
            return Err(LookupError::EmptyIdentifier);
        }

        let url = self.request_url(identifier);
        debug!(url = %url, "Looking up repository");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!(repo = identifier, status = status.as_u16(), error = %message, "Lookup rejected");
            return Err(LookupError::NotEligible {
                status: status.as_u16(),
                message,
            });
        }

        let info: RepositoryInfo = response.json().await?;
        debug!(
            repo = identifier,
            repository_id = %info.repository_id,
            categories = info.categories.len(),
            "Lookup succeeded"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpLookup {
        HttpLookup::new(
            &format!("{}/api/discussions/categories", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/discussions/categories"))
            .and(query_param("repo", "octo/demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "repositoryId": "R_1",
                "categories": [
                    { "id": "C_2", "emoji": "📣", "name": "Announcements" },
                    { "id": "C_1", "emoji": "💬", "name": "General" }
                ]
            })))
            .mount(&server)
            .await;

        let info = client_for(&server).lookup("octo/demo").await.unwrap();
        assert_eq!(info.repository_id, "R_1");
        let ids: Vec<_> = info.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C_2", "C_1"]);
    }

    #[tokio::test]
    async fn test_lookup_not_eligible() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/discussions/categories"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({ "error": "giscus is not installed on this repository" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).lookup("octo/private").await.unwrap_err();
        match err {
            LookupError::NotEligible { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("not installed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).lookup("octo/demo").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_identifier_is_rejected_locally() {
        let lookup = HttpLookup::new(DEFAULT_LOOKUP_URL, DEFAULT_LOOKUP_TIMEOUT).unwrap();
        assert_eq!(lookup.endpoint().as_str(), DEFAULT_LOOKUP_URL);
        assert!(matches!(
            lookup.lookup("  ").await,
            Err(LookupError::EmptyIdentifier)
        ));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpLookup::new("not a url", DEFAULT_LOOKUP_TIMEOUT),
            Err(LookupError::InvalidEndpoint(_))
        ));
    }
}
