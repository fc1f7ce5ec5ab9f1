//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. `Client` builds an `HttpRequest`,
//! hands it to a `Transport`, and inspects the `HttpResponse` that comes
//! back. Keeping the wire call behind a trait lets the retry loop and the
//! observers be tested without a network, while `UreqTransport` does the
//! real blocking I/O.
//!
//! All fields use owned types (`String`, `Vec`) so requests can be replayed
//! verbatim on every retry attempt.

use std::fmt;
use std::time::Duration;


/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound HTTP call described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, without the query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Size of the request payload in bytes.
    pub fn content_length(&self) -> usize {
        self.body.as_ref().map_or(0, String::len)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup. Returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Size of the response payload in bytes.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Executes one HTTP round-trip.
///
/// Implementations must return non-2xx statuses as `Ok` responses; only
/// failures that produced no response at all are `Err`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// A request that produced no HTTP response.
#[derive(Debug, thiserror::Error)]
#[error("{method} {url}: {message}")]
pub struct TransportError {
    pub method: HttpMethod,
    pub url: String,
    pub message: String,
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        // Status codes are data here: the client interprets 4xx/5xx itself.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match request.method {
            HttpMethod::Get => decorate(self.agent.get(&request.url), request).call(),
            HttpMethod::Delete => decorate(self.agent.delete(&request.url), request).call(),
            HttpMethod::Post => {
                send_body(decorate(self.agent.post(&request.url), request), request)
            }
            HttpMethod::Put => {
                send_body(decorate(self.agent.put(&request.url), request), request)
            }
        };
        let mut response = result.map_err(|e| transport_error(request, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| transport_error(request, e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn decorate<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    builder
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match &request.body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn transport_error(request: &HttpRequest, error: ureq::Error) -> TransportError {
    TransportError {
        method: request.method,
        url: request.url.clone(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: Vec<(&str, &str)>, body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn header_lookup_ignores_case() {
        let resp = response(vec![("retry-after", "7")], "");
        assert_eq!(resp.header("Retry-After"), Some("7"));
        assert_eq!(resp.header("RETRY-AFTER"), Some("7"));
        assert_eq!(resp.header("content-type"), None);
    }

    #[test]
    fn content_lengths_count_body_bytes() {
        assert_eq!(response(Vec::new(), "héllo").content_length(), 6);

        let req = HttpRequest {
            method: HttpMethod::Post,
            url: "https://acme.zendesk.com/api/v2/users.json".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(r#"{"a":1}"#.to_string()),
        };
        assert_eq!(req.content_length(), 7);
        assert_eq!(HttpRequest { body: None, ..req }.content_length(), 0);
    }

    #[test]
    fn success_range_is_2xx() {
        let mut resp = response(Vec::new(), "");
        for (status, ok) in [
            (199, false),
            (200, true),
            (204, true),
            (299, true),
            (301, false),
            (429, false),
        ] {
            resp.status = status;
            assert_eq!(resp.is_success(), ok, "status {status}");
        }
    }

    #[test]
    fn method_display_is_uppercase() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
