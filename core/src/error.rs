//! Error types for the Zendesk client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the record does not exist" from "the server returned an unexpected
//! status." All other non-2xx responses land in `HttpError` with the raw
//! status code and body for debugging. A 429 is only an error once the retry
//! policy gives up (`RateLimitExceeded`).

use std::time::Duration;

use thiserror::Error;

use crate::http::TransportError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request produced no HTTP response (connect, TLS, timeout, read).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// Still rate limited after the retry policy's bounds were reached.
    #[error("rate limit exceeded after {retries} retries ({waited:?} spent waiting)")]
    RateLimitExceeded { retries: u32, waited: Duration },

    #[error("missing configuration: {0} is not set")]
    MissingConfig(&'static str),
}
