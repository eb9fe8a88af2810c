use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::domain::DomainError;

/// Stream type for HTTP responses
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DomainError>> + Send>>;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Client with a whole-request timeout, which bounds every LLM call
    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::provider("http", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                "http",
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.send(url, headers, body)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to parse response: {}", e)))
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError> {
        let response = self.send(url, headers, body).await?;

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| DomainError::provider("http", format!("Stream error: {}", e)))
        });

        Ok(Box::pin(stream))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_json_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/chat", server.uri());
        let body = serde_json::json!({"messages": []});

        let response = client
            .post_json(&url, vec![("api-key", "secret")], &body)
            .await
            .unwrap();

        assert_eq!(response["ok"], true);
    }

    #[tokio::test]
    async fn test_post_json_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let err = client
            .post_json(&server.uri(), vec![], &serde_json::json!({}))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("429"));
        assert!(message.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_post_json_stream_yields_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let mut stream = client
            .post_json_stream(&server.uri(), vec![], &serde_json::json!({}))
            .await
            .unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(String::from_utf8(collected).unwrap(), "data: [DONE]\n\n");
    }
}
