// Source fetcher: one HTTP request per call

use crate::error::FetchError;
use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP method for a source request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Everything needed to issue one request
///
/// `context` fields are not sent anywhere; they are copied into every record
/// extracted from this request's response (e.g. the county code a feed was
/// requested for).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub endpoint: String,
    pub method: Method,
    pub params: Vec<(String, String)>,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    pub context: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Get,
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn post(endpoint: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            body: Some(body.into()),
            ..Self::get(endpoint)
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }
}

/// Body and status of a completed request
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub body: String,
    pub status: u16,
    pub fetched_at: NaiveDateTime,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a terminal error
    pub fn ensure_success(self, endpoint: &str) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: self.status,
            })
        }
    }
}

/// Reject anything that is not an absolute http(s) URL before touching the network
pub fn validate_endpoint(endpoint: &str) -> Result<Url, FetchError> {
    let invalid = |reason: &str| FetchError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    if endpoint.trim().is_empty() {
        return Err(invalid("endpoint is empty"));
    }

    let url = Url::parse(endpoint.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// HTTP client shared by every request of a run
pub struct SourceFetcher {
    client: Client,
    raw_dump_dir: Option<PathBuf>,
}

impl SourceFetcher {
    pub fn new(timeout_secs: u64, raw_dump_dir: Option<PathBuf>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Dashfeed-Ingest/0.1")
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            raw_dump_dir,
        })
    }

    /// Issue the request and return the body whatever the status code
    pub async fn fetch(&self, request: &RequestSpec) -> Result<RawResponse, FetchError> {
        let url = validate_endpoint(&request.endpoint)?;
        let headers = header_map(&request.headers)?;

        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self
                .client
                .post(url)
                .body(request.body.clone().unwrap_or_default()),
        };

        debug!(
            endpoint = %request.endpoint,
            method = ?request.method,
            params = request.params.len(),
            "Sending request"
        );

        let network = |source| FetchError::Network {
            endpoint: request.endpoint.clone(),
            source,
        };

        let response = builder
            .query(&request.params)
            .headers(headers)
            .send()
            .await
            .map_err(network)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(network)?;

        info!(
            endpoint = %request.endpoint,
            status,
            bytes = body.len(),
            "Fetched source"
        );

        Ok(RawResponse {
            body,
            status,
            fetched_at: chrono::Local::now().naive_local(),
        })
    }

    /// Write a response body under the raw-dump directory, if one is configured
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn dump_raw(&self, task: &str, index: usize, extension: &str, body: &str) {
        let Some(dir) = &self.raw_dump_dir else {
            return;
        };

        let path = dir.join(format!("{}_{}.{}", task, index, extension));
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;

        match result {
            Ok(()) => debug!(path = %path.display(), "Wrote raw response"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write raw response"),
        }
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("https://waterservices.usgs.gov/nwis/iv/").is_ok());
        assert!(matches!(
            validate_endpoint(""),
            Err(FetchError::InvalidEndpoint { .. })
        ));
        assert!(validate_endpoint("   ").is_err());
        assert!(validate_endpoint("/relative/path").is_err());
        assert!(validate_endpoint("ftp://example.test/file").is_err());
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_before_network() {
        let fetcher = SourceFetcher::new(5, None).unwrap();
        let err = fetcher.fetch(&RequestSpec::get("not a url")).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_get_with_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nwis/iv/"))
            .and(query_param("stateCd", "md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = SourceFetcher::new(5, None).unwrap();
        let request = RequestSpec::get(format!("{}/nwis/iv/", server.uri())).param("stateCd", "md");
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{}");
    }

    #[tokio::test]
    async fn test_post_with_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(header("x-api-key", "abc"))
            .and(body_string("{\"q\":1}"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = SourceFetcher::new(5, None).unwrap();
        let request = RequestSpec::post(format!("{}/api", server.uri()), "{\"q\":1}")
            .header("x-api-key", "abc");
        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn test_error_status_is_returned_then_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let fetcher = SourceFetcher::new(5, None).unwrap();
        let response = fetcher.fetch(&RequestSpec::get(server.uri())).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(matches!(
            response.ensure_success(&server.uri()),
            Err(FetchError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_dump_raw_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SourceFetcher::new(5, Some(dir.path().join("raw"))).unwrap();
        fetcher.dump_raw("hospital-status", 2, "html", "<html/>").await;

        let written = std::fs::read_to_string(dir.path().join("raw/hospital-status_2.html")).unwrap();
        assert_eq!(written, "<html/>");
    }
}
