//! HTTP client for the feed (write) and query (read) services.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::feed::{CreateFeedRequest, FeedResponse};

/// Typed HTTP client for the feed endpoints.
///
/// The write side (`POST /feeds`) and the read side (`GET /feeds`,
/// `GET /feeds/search`) usually run as separate services, so each call
/// takes the base URL of the service it targets from the client's
/// configuration.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    command_url: Url,
    query_url: Url,
}

impl FeedClient {
    /// Create a new `FeedClient`.
    ///
    /// * `command_url` – root URL of the `feed` service.
    /// * `query_url` – root URL of the `query` service.
    pub fn new(command_url: Url, query_url: Url) -> Self {
        Self {
            http: Client::new(),
            command_url,
            query_url,
        }
    }

    /// `POST /feeds` – create a feed.
    pub async fn create_feed(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<FeedResponse, ClientError> {
        let url = self.command_url.join("/feeds")?;
        let body = CreateFeedRequest {
            title: title.into(),
            description: description.into(),
        };

        let resp = self.http.post(url).json(&body).send().await?;
        parse_response(resp).await
    }

    /// `GET /feeds` – list every feed.
    pub async fn list_feeds(&self) -> Result<Vec<FeedResponse>, ClientError> {
        let url = self.query_url.join("/feeds")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /feeds/search?q=…` – full-text search over title and description.
    pub async fn search_feeds(&self, query: &str) -> Result<Vec<FeedResponse>, ClientError> {
        let url = self.query_url.join("/feeds/search")?;
        let resp = self.http.get(url).query(&[("q", query)]).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed_json(title: &str) -> serde_json::Value {
        json!({
            "id": "018f2f0e-8f7a-7cc4-9a39-0b3e5c1d2e4f",
            "title": title,
            "description": "d",
            "created_at": "2024-05-01T12:00:00Z",
        })
    }

    async fn client(server: &MockServer) -> FeedClient {
        let url = Url::parse(&server.uri()).unwrap();
        FeedClient::new(url.clone(), url)
    }

    #[tokio::test]
    async fn test_create_feed_posts_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/feeds"))
            .and(body_json(json!({ "title": "t", "description": "d" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(feed_json("t")))
            .expect(1)
            .mount(&server)
            .await;

        let feed = client(&server).await.create_feed("t", "d").await.unwrap();
        assert_eq!(feed.title, "t");
    }

    #[tokio::test]
    async fn test_search_sends_query_and_reports_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/search"))
            .and(query_param("q", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([feed_json("rust")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feeds"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal server error"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let found = client.search_feeds("rust").await.unwrap();
        assert_eq!(found.len(), 1);

        let err = client.list_feeds().await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status, .. } if status.as_u16() == 500));
    }
}
