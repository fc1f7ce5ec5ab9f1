//! Zendesk API client: URL construction, verb wrappers and rate-limit retry.
//!
//! # Design
//! Every verb funnels into `Client::send`, which executes the request,
//! notifies the observers, and on a 429 sleeps for the server's
//! `Retry-After` before replaying the identical request. The loop is bounded
//! by the client's `RetryPolicy`.
//!
//! `get` and `delete` return the raw `HttpResponse`; `get_json`, `post` and
//! `put` decode the body and turn non-2xx statuses into `ApiError`.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::observer::{Interceptors, RequestObserver, ResponseObserver};
use crate::retry::{parse_retry_after, Sleeper, ThreadSleeper};
use crate::ticket::TicketApi;
use crate::user::UserApi;

/// Blocking client for one Zendesk tenant.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    interceptors: Interceptors,
}

impl Client {
    /// Client over a `ureq` transport with default size-logging observers.
    pub fn new(config: ClientConfig) -> Self {
        let transport = Arc::new(UreqTransport::new(config.timeout));
        Self {
            config,
            transport,
            sleeper: Arc::new(ThreadSleeper),
            interceptors: Interceptors::default(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace both observers.
    pub fn set_interceptors(&mut self, interceptors: Interceptors) {
        self.interceptors = interceptors;
    }

    /// Replace both observers; a `None` slot gets the default size logger.
    pub fn intercept(
        &mut self,
        request: Option<Arc<dyn RequestObserver>>,
        response: Option<Arc<dyn ResponseObserver>>,
    ) {
        self.set_interceptors(Interceptors::new(request, response));
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    pub fn ticket(&self) -> TicketApi<'_> {
        TicketApi::new(self)
    }

    /// Absolute URL for an endpoint path such as `users/7.json`.
    pub fn full_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.config.base_url(),
            self.config.api_version,
            path.trim_start_matches('/')
        )
    }

    /// Build the request for `path`, adding auth and content headers.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(credentials) = &self.config.credentials {
            headers.push(("authorization".to_string(), credentials.header_value()));
        }
        HttpRequest {
            method,
            url: self.full_url(path),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers,
            body,
        }
    }

    /// GET `path` with query parameters. The response is returned whatever
    /// its status.
    pub fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        self.send(self.build_request(HttpMethod::Get, path, query, None))
    }

    /// GET `path` and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        parse_json(&self.get(path, query)?)
    }

    /// POST `body` as JSON to `path` and decode the JSON reply.
    pub fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.build_request(HttpMethod::Post, path, &[], Some(encode(body)?));
        parse_json(&self.send(request)?)
    }

    /// PUT `body` as JSON to `path` and decode the JSON reply.
    pub fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.build_request(HttpMethod::Put, path, &[], Some(encode(body)?));
        parse_json(&self.send(request)?)
    }

    /// DELETE `path`. The response is returned whatever its status.
    pub fn delete(&self, path: &str) -> Result<HttpResponse, ApiError> {
        self.send(self.build_request(HttpMethod::Delete, path, &[], None))
    }

    /// Execute `request`, sleeping and replaying it while the server answers
    /// 429 with a usable `Retry-After`.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let policy = &self.config.retry;
        let unit = policy.unit_for(request.method);
        let mut retries = 0;
        let mut waited = Duration::ZERO;

        loop {
            debug!(
                method = %request.method,
                url = %request.url,
                attempt = retries + 1,
                "executing request"
            );
            let response = self.transport.execute(&request)?;
            self.interceptors.notify(&request, &response);

            if response.status != 429 {
                return Ok(response);
            }

            let retry_after = response.header("retry-after");
            let Some(delay) = retry_after.and_then(|value| parse_retry_after(value, unit)) else {
                warn!(
                    retry_after = ?retry_after,
                    url = %request.url,
                    "rate limited without a usable Retry-After"
                );
                return Ok(response);
            };

            let over_budget = waited
                .checked_add(delay)
                .map_or(true, |total| total > policy.max_total_wait);
            if retries >= policy.max_retries || over_budget {
                warn!(
                    retries,
                    waited = ?waited,
                    next_delay = ?delay,
                    "giving up on rate-limited request"
                );
                return Err(ApiError::RateLimitExceeded { retries, waited });
            }

            warn!(delay = ?delay, url = %request.url, "rate limited, sleeping before retry");
            self.sleeper.sleep(delay);
            waited += delay;
            retries += 1;
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
pub fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

/// Check the status, then decode the JSON body into `T`.
pub fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;
    use crate::config::Credentials;
    use crate::http::TransportError;
    use crate::retry::{RetryAfterUnit, RetryPolicy};
    use crate::testing::{ok, reply, throttled, Harness, ScriptedTransport};

    fn counting_interceptors() -> (Interceptors, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let requests = Arc::new(AtomicUsize::new(0));
        let responses = Arc::new(AtomicUsize::new(0));
        let (req, resp) = (Arc::clone(&requests), Arc::clone(&responses));
        let interceptors = Interceptors::default()
            .with_request(move |_: &HttpRequest| {
                req.fetch_add(1, Ordering::SeqCst);
            })
            .with_response(move |_: &HttpResponse| {
                resp.fetch_add(1, Ordering::SeqCst);
            });
        (interceptors, requests, responses)
    }

    #[test]
    fn full_url_joins_tenant_version_and_path() {
        let client = Client::new(ClientConfig::new("acme"));
        assert_eq!(
            client.full_url("users/7.json"),
            "https://acme.zendesk.com/api/v2/users/7.json"
        );
        assert_eq!(
            client.full_url("/tickets.json"),
            "https://acme.zendesk.com/api/v2/tickets.json"
        );

        let client = Client::new(ClientConfig::new("acme").with_api_version("v1"));
        assert_eq!(client.full_url("x"), "https://acme.zendesk.com/api/v1/x");
    }

    #[test]
    fn build_request_sets_headers() {
        let config =
            ClientConfig::new("acme").with_credentials(Credentials::Bearer("tok".to_string()));
        let client = Client::new(config);

        let req = client.build_request(HttpMethod::Get, "users.json", &[("page", "2")], None);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(
            req.headers,
            vec![
                ("accept".to_string(), "application/json".to_string()),
                ("authorization".to_string(), "Bearer tok".to_string()),
            ]
        );

        let req = client.build_request(HttpMethod::Post, "users.json", &[], Some("{}".to_string()));
        assert!(req
            .headers
            .contains(&("content-type".to_string(), "application/json".to_string())));
    }

    #[test]
    fn success_decodes_and_observes_once() {
        let mut h = Harness::new(vec![reply(201, Vec::new(), r#"{"name":"x"}"#)]);
        let (interceptors, requests, responses) = counting_interceptors();
        h.client.set_interceptors(interceptors);

        let value: Value = h.client.post("users.json", &json!({"name": "x"})).unwrap();

        assert_eq!(value, json!({"name": "x"}));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(responses.load(Ordering::SeqCst), 1);
        assert!(h.delays().is_empty());
        assert_eq!(h.requests()[0].body.as_deref(), Some(r#"{"name":"x"}"#));
    }

    #[test]
    fn get_retry_after_is_seconds() {
        let h = Harness::new(vec![throttled("2"), ok("{}")]);

        let resp = h.client.get("users.json", &[("page", "1")]).unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(h.delays(), vec![Duration::from_secs(2)]);
        let sent = h.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[test]
    fn mutating_verbs_read_retry_after_as_minutes() {
        let h = Harness::new(vec![
            throttled("2"),
            ok("{}"),
            throttled("2"),
            ok("{}"),
            throttled("2"),
            reply(204, Vec::new(), ""),
        ]);

        let _: Value = h.client.post("users.json", &json!({})).unwrap();
        let _: Value = h.client.put("users/1.json", &json!({})).unwrap();
        let resp = h.client.delete("users/1.json").unwrap();

        assert_eq!(resp.status, 204);
        assert_eq!(h.delays(), vec![Duration::from_secs(120); 3]);
        let sent = h.requests();
        assert_eq!(sent[0], sent[1]);
        assert_eq!(sent[2], sent[3]);
        assert_eq!(sent[4], sent[5]);
    }

    #[test]
    fn unified_unit_applies_to_mutations() {
        let config = ClientConfig::new("acme")
            .with_retry(RetryPolicy::default().with_unit(RetryAfterUnit::Seconds));
        let h = Harness::with_config(config, vec![throttled("2"), ok("{}")]);

        let _: Value = h.client.post("users.json", &json!({})).unwrap();

        assert_eq!(h.delays(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn malformed_retry_after_returns_429_without_sleeping() {
        let h = Harness::new(vec![throttled("later")]);

        let resp = h.client.get("users.json", &[]).unwrap();

        assert_eq!(resp.status, 429);
        assert!(h.delays().is_empty());
        assert_eq!(h.requests().len(), 1);
    }

    #[test]
    fn missing_retry_after_surfaces_as_http_error_on_typed_calls() {
        let h = Harness::new(vec![reply(429, Vec::new(), "slow down")]);

        let err = h.client.post::<_, Value>("users.json", &json!({})).unwrap_err();

        assert!(matches!(err, ApiError::HttpError { status: 429, .. }));
        assert!(h.delays().is_empty());
    }

    #[test]
    fn repeated_429s_sleep_once_each_then_succeed() {
        let mut h = Harness::new(vec![
            throttled("1"),
            throttled("2"),
            throttled("3"),
            ok(r#"{"count":1}"#),
        ]);
        let (interceptors, requests, responses) = counting_interceptors();
        h.client.set_interceptors(interceptors);

        let value: Value = h.client.get_json("users.json", &[]).unwrap();

        assert_eq!(value, json!({"count": 1}));
        assert_eq!(
            h.delays(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(3)]
        );
        assert_eq!(requests.load(Ordering::SeqCst), 4);
        assert_eq!(responses.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn retry_count_is_bounded() {
        let config =
            ClientConfig::new("acme").with_retry(RetryPolicy::default().with_max_retries(3));
        let h = Harness::with_config(config, vec![throttled("1"); 4]);

        let err = h.client.get("users.json", &[]).unwrap_err();

        match err {
            ApiError::RateLimitExceeded { retries, waited } => {
                assert_eq!(retries, 3);
                assert_eq!(waited, Duration::from_secs(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.delays().len(), 3);
        assert_eq!(h.requests().len(), 4);
    }

    #[test]
    fn total_wait_is_bounded() {
        let config = ClientConfig::new("acme")
            .with_retry(RetryPolicy::default().with_max_total_wait(Duration::from_secs(5)));
        let h = Harness::with_config(config, vec![throttled("3"), throttled("3")]);

        let err = h.client.get("users.json", &[]).unwrap_err();

        assert!(matches!(
            err,
            ApiError::RateLimitExceeded { retries: 1, waited } if waited == Duration::from_secs(3)
        ));
        assert_eq!(h.delays(), vec![Duration::from_secs(3)]);
    }

    #[test]
    fn huge_retry_after_exceeds_budget_instead_of_overflowing() {
        let config = ClientConfig::new("acme")
            .with_retry(RetryPolicy::default().with_max_total_wait(Duration::from_secs(3600)));
        let h = Harness::with_config(
            config,
            vec![throttled("2100"), throttled("18446744073709549568"), ok("{}")],
        );

        let err = h.client.get("users.json", &[]).unwrap_err();

        match err {
            ApiError::RateLimitExceeded { retries, waited } => {
                assert_eq!(retries, 1);
                assert_eq!(waited, Duration::from_secs(2100));
            }
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
        assert_eq!(h.delays(), vec![Duration::from_secs(2100)]);
        assert_eq!(h.requests().len(), 2);
    }

    #[test]
    fn transport_error_on_retry_propagates() {
        let mut h = Harness::new(vec![throttled("1")]);
        h.transport.replies.lock().unwrap().push_back(Err(TransportError {
            method: HttpMethod::Get,
            url: "https://acme.zendesk.com/api/v2/users.json".to_string(),
            message: "connection reset".to_string(),
        }));
        let (interceptors, requests, _) = counting_interceptors();
        h.client.set_interceptors(interceptors);

        let err = h.client.get("users.json", &[]).unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(h.delays(), vec![Duration::from_secs(1)]);
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(h.requests().len(), 2);
    }

    #[test]
    fn transport_error_propagates_without_observers() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.replies.lock().unwrap().push_back(Err(TransportError {
            method: HttpMethod::Get,
            url: "https://acme.zendesk.com/api/v2/users.json".to_string(),
            message: "connection refused".to_string(),
        }));
        let mut client = Client::new(ClientConfig::new("acme")).with_transport(transport);
        let (interceptors, requests, _) = counting_interceptors();
        client.set_interceptors(interceptors);

        let err = client.get("users.json", &[]).unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(requests.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_body_is_an_error() {
        let h = Harness::new(vec![ok("not json")]);

        let err = h.client.get_json::<Value>("users.json", &[]).unwrap_err();

        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn status_mapping() {
        assert!(check_status(&reply(204, Vec::new(), "")).is_ok());
        assert!(matches!(
            check_status(&reply(404, Vec::new(), "")),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            check_status(&reply(500, Vec::new(), "boom")),
            Err(ApiError::HttpError { status: 500, ref body }) if body == "boom"
        ));
    }

    #[test]
    fn default_observers_log_once_per_attempt() {
        let logs = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = Arc::clone(&logs);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || LogSink(Arc::clone(&sink)))
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let h = Harness::new(vec![throttled("1"), ok(r#"{"a":1}"#)]);
        let resp = tracing::subscriber::with_default(subscriber, || {
            h.client.get("users.json", &[]).unwrap()
        });

        assert_eq!(resp.body, r#"{"a":1}"#);
        let output = String::from_utf8(logs.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("request size").count(), 2);
        assert_eq!(output.matches("response size").count(), 2);
    }

    #[test]
    fn intercept_with_none_restores_defaults() {
        let mut h = Harness::new(vec![ok("{}")]);
        let (interceptors, requests, _) = counting_interceptors();
        h.client.set_interceptors(interceptors);
        h.client.intercept(None, None);

        h.client.get("users.json", &[]).unwrap();

        assert_eq!(requests.load(Ordering::SeqCst), 0);
    }

    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
