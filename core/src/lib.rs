//! Blocking client for the Zendesk REST API.
//!
//! # Overview
//! `Client` addresses one tenant (`https://{domain}.zendesk.com/api/{version}`)
//! and exposes the four HTTP verbs plus typed accessors for users and
//! tickets. Rate-limited calls (HTTP 429) are slept on and replayed
//! transparently, and every attempt is reported to a pair of observers.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the network sits behind the `Transport` trait, with `UreqTransport` as
//!   the default.
//! - Retry bounds, the `Retry-After` unit and sleeping live in `retry`.
//! - Observers are configured up front through `Interceptors`; unset slots
//!   log payload sizes via `tracing`.
//! - Decode failures and exhausted retries are explicit `ApiError`s.
//!
//! ```no_run
//! use zendesk_core::{Client, ClientConfig, Credentials, NewTicket};
//!
//! let config = ClientConfig::new("acme").with_credentials(Credentials::ApiToken {
//!     email: "agent@acme.com".to_string(),
//!     token: "secret".to_string(),
//! });
//! let client = Client::new(config);
//! let ticket = client.ticket().create(&NewTicket::new("Printer", "It is on fire"))?;
//! println!("created ticket {}", ticket.id);
//! # Ok::<(), zendesk_core::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observer;
pub mod retry;
pub mod ticket;
pub mod types;
pub mod user;

#[cfg(test)]
mod testing;

pub use client::{check_status, parse_json, Client};
pub use config::{ClientConfig, Credentials};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use observer::{Interceptors, RequestObserver, ResponseObserver, SizeLogger};
pub use retry::{RetryAfterUnit, RetryPolicy, Sleeper, ThreadSleeper};
pub use ticket::TicketApi;
pub use types::{
    Comment, ListParams, NewTicket, NewUser, SortOrder, Ticket, TicketPage, TicketPriority,
    TicketStatus, TicketType, TicketUpdate, User, UserPage, UserRole, UserUpdate,
};
pub use user::UserApi;
