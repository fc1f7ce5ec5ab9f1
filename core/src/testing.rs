//! In-memory transport and sleeper for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::retry::Sleeper;

/// Replays canned replies and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    pub replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            seen: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left")
    }
}

#[derive(Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub(crate) fn reply(status: u16, headers: Vec<(&str, &str)>, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: body.to_string(),
    }
}

pub(crate) fn ok(body: &str) -> HttpResponse {
    reply(200, Vec::new(), body)
}

pub(crate) fn throttled(retry_after: &str) -> HttpResponse {
    reply(429, vec![("retry-after", retry_after)], "")
}

/// A client wired to a scripted transport and a recording sleeper.
pub(crate) struct Harness {
    pub client: Client,
    pub transport: Arc<ScriptedTransport>,
    sleeper: Arc<RecordingSleeper>,
}

impl Harness {
    pub fn new(replies: Vec<HttpResponse>) -> Self {
        Self::with_config(ClientConfig::new("acme"), replies)
    }

    pub fn with_config(config: ClientConfig, replies: Vec<HttpResponse>) -> Self {
        let transport = ScriptedTransport::new(replies);
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = Client::new(config)
            .with_transport(transport.clone())
            .with_sleeper(sleeper.clone());
        Self {
            client,
            transport,
            sleeper,
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.sleeper.delays.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.transport.requests()
    }
}
