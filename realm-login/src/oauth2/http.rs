//! Shared outbound HTTP client for identity providers
//!
//! Every provider request (token exchange and resource owner lookups) goes
//! through one `reqwest` client with redirects disabled and a bounded timeout,
//! so a stalled provider surfaces as an error instead of a hung request.

use std::time::Duration;

use crate::config::HttpSettings;
use crate::oauth2::types::OAuthError;

/// Errors raised by the outbound HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    /// The request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response could not be converted for the OAuth2 client
    #[error("Invalid HTTP response: {0}")]
    Response(#[from] http::Error),
}

/// Outbound HTTP client with timeout
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Build a client from the HTTP settings
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpClientError> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            inner,
            timeout: settings.timeout(),
        })
    }

    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Underlying `reqwest` client, used as the token exchange transport
    #[must_use]
    pub const fn reqwest(&self) -> &reqwest::Client {
        &self.inner
    }

    /// GET a JSON document with bearer authentication
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Timeout` when the provider does not answer in
    /// time, and `OAuthError::ResourceOwnerFailed` for transport errors,
    /// non-success statuses and invalid JSON.
    pub async fn get_json(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<serde_json::Value, OAuthError> {
        let response = self
            .inner
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::ResourceOwnerFailed(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::ResourceOwnerFailed(format!("Failed to parse JSON: {e}")))
    }

    fn request_error(&self, error: &reqwest::Error) -> OAuthError {
        if error.is_timeout() {
            OAuthError::Timeout(self.timeout)
        } else {
            OAuthError::ResourceOwnerFailed(error.to_string())
        }
    }
}

/// Execute an OAuth2 request with the given `reqwest` client
///
/// Headers and body are forwarded as-is; the response body is fully buffered.
///
/// # Errors
///
/// Returns an error if the request fails to send, the body cannot be read,
/// or the response cannot be rebuilt
pub async fn execute(
    client: reqwest::Client,
    request: oauth2::HttpRequest,
) -> Result<oauth2::HttpResponse, HttpClientError> {
    let method = request.method().clone();
    let url = request.uri().to_string();
    let headers = request.headers().clone();
    let body = request.into_body();

    let response = client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    let mut builder = http::Response::builder().status(status_code);
    for (name, value) in &headers {
        builder = builder.header(name, value);
    }

    Ok(builder.body(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(timeout_secs: u64) -> HttpClient {
        HttpClient::new(&HttpSettings {
            timeout_secs,
            ..HttpSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_json_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(5)
            .get_json(&format!("{}/user", server.uri()), "abc")
            .await
            .unwrap();
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn test_get_json_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client(5)
            .get_json(&format!("{}/user", server.uri()), "abc")
            .await;
        assert!(matches!(result, Err(OAuthError::ResourceOwnerFailed(msg)) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_get_json_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(serde_json::json!({})),
            )
            .mount(&server)
            .await;

        let result = client(1)
            .get_json(&format!("{}/slow", server.uri()), "abc")
            .await;
        assert!(matches!(result, Err(OAuthError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_execute_does_not_follow_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .mount(&server)
            .await;

        let request = http::Request::builder()
            .method("POST")
            .uri(format!("{}/token", server.uri()))
            .body(Vec::new())
            .unwrap();

        let response = execute(client(5).inner, request).await.unwrap();
        assert_eq!(response.status(), 302);
    }
}
