//! In-memory emulation of the Zendesk users/tickets API under `/api/v2`.
//!
//! Records get sequential ids starting at 1. `MockState::throttle` makes the
//! next N requests answer 429, optionally with a `Retry-After` value, so
//! clients can be driven through their rate-limit handling.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

const DEFAULT_PER_PAGE: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub phone: Option<String>,
    pub suspended: bool,
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub suspended: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: u64,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub priority: Option<String>,
    pub requester_id: Option<u64>,
    pub assignee_id: Option<u64>,
    pub tags: Vec<String>,
    pub comment_count: usize,
}

#[derive(Deserialize)]
pub struct Comment {
    pub body: String,
}

#[derive(Deserialize)]
pub struct NewTicket {
    pub subject: String,
    pub comment: Comment,
    pub priority: Option<String>,
    pub requester_id: Option<u64>,
    pub assignee_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<u64>,
    pub comment: Option<Comment>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct UserBody<T> {
    user: T,
}

#[derive(Deserialize)]
struct TicketBody<T> {
    ticket: T,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

/// A request as seen by the mock, before routing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub authorization: Option<String>,
}

struct Store<T> {
    next_id: u64,
    records: BTreeMap<u64, T>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

impl<T> Store<T> {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

struct Throttle {
    remaining: u32,
    retry_after: Option<String>,
}

#[derive(Default)]
struct Inner {
    users: RwLock<Store<User>>,
    tickets: RwLock<Store<Ticket>>,
    throttle: Mutex<Option<Throttle>>,
    recorded: Mutex<Vec<Recorded>>,
    hits: AtomicUsize,
}

/// Shared handle on the mock's data and rate-limit switch.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Inner>,
}

impl MockState {
    /// Answer the next `count` requests with 429 and the given `Retry-After`.
    pub fn throttle(&self, count: u32, retry_after: Option<&str>) {
        let mut throttle = self.inner.throttle.lock().unwrap_or_else(PoisonError::into_inner);
        *throttle = Some(Throttle {
            remaining: count,
            retry_after: retry_after.map(str::to_string),
        });
    }

    /// Number of requests received, throttled ones included.
    pub fn hits(&self) -> usize {
        self.inner.hits.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.inner
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Consume one throttled slot, returning its `Retry-After` value.
    fn take_throttle(&self) -> Option<Option<String>> {
        let mut guard = self.inner.throttle.lock().unwrap_or_else(PoisonError::into_inner);
        let throttle = guard.as_mut()?;
        if throttle.remaining == 0 {
            *guard = None;
            return None;
        }
        throttle.remaining -= 1;
        Some(throttle.retry_after.clone())
    }

    fn record(&self, request: &Request) {
        self.inner.hits.fetch_add(1, Ordering::SeqCst);
        let recorded = Recorded {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            authorization: request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        self.inner
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(recorded);
    }
}

pub fn app() -> Router {
    app_with_state(MockState::default())
}

pub fn app_with_state(state: MockState) -> Router {
    Router::new()
        .route("/api/v2/users.json", get(list_users).post(create_user))
        .route("/api/v2/users/search.json", get(search_users))
        .route(
            "/api/v2/users/{file}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/v2/tickets.json", get(list_tickets).post(create_ticket))
        .route(
            "/api/v2/tickets/{file}",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
        .route("/api/v2/echo.json", post(echo))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, MockState::default()).await
}

pub async fn serve(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn rate_limit(State(state): State<MockState>, request: Request, next: Next) -> Response {
    state.record(&request);
    let Some(retry_after) = state.take_throttle() else {
        return next.run(request).await;
    };

    debug!(uri = %request.uri(), retry_after = ?retry_after, "throttling request");
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({"error": "APIRateLimitExceeded"})),
    )
        .into_response();
    if let Some(value) = retry_after.and_then(|v| HeaderValue::from_str(&v).ok()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// `7.json` -> 7. Anything else is an unknown route.
fn record_id(file: &str) -> Result<u64, StatusCode> {
    file.strip_suffix(".json")
        .and_then(|id| id.parse().ok())
        .ok_or(StatusCode::NOT_FOUND)
}

/// Slice one page out of `records` in Zendesk's offset-pagination shape.
fn page<T: Clone + Serialize>(
    key: &str,
    path: &str,
    records: &BTreeMap<u64, T>,
    query: &ListQuery,
) -> Value {
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
    let page = query.page.unwrap_or(1).max(1);
    let items: Vec<T> = records
        .values()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .cloned()
        .collect();
    let link = |n: usize| format!("/api/v2/{path}?page={n}&per_page={per_page}");
    let next_page = (page.saturating_mul(per_page) < records.len()).then(|| link(page + 1));
    let previous_page = (page > 1).then(|| link(page - 1));

    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), json!(items));
    body.insert("next_page".to_string(), json!(next_page));
    body.insert("previous_page".to_string(), json!(previous_page));
    body.insert("count".to_string(), json!(records.len()));
    Value::Object(body)
}

async fn list_users(State(state): State<MockState>, Query(query): Query<ListQuery>) -> Json<Value> {
    let users = state.inner.users.read().await;
    Json(page("users", "users.json", &users.records, &query))
}

async fn search_users(
    State(state): State<MockState>,
    Query(search): Query<SearchQuery>,
) -> Json<Value> {
    let users = state.inner.users.read().await;
    let matches: Vec<User> = match search.query.strip_prefix("email:") {
        Some(email) => users
            .records
            .values()
            .filter(|u| u.email.as_deref() == Some(email))
            .cloned()
            .collect(),
        None => users
            .records
            .values()
            .filter(|u| u.name.contains(&search.query))
            .cloned()
            .collect(),
    };
    Json(json!({
        "users": matches,
        "next_page": null,
        "previous_page": null,
        "count": matches.len(),
    }))
}

async fn create_user(
    State(state): State<MockState>,
    Json(body): Json<UserBody<NewUser>>,
) -> (StatusCode, Json<Value>) {
    let input = body.user;
    let mut users = state.inner.users.write().await;
    let user = User {
        id: users.allocate(),
        name: input.name,
        email: input.email,
        role: input.role.unwrap_or_else(|| "end-user".to_string()),
        phone: input.phone,
        suspended: false,
        tags: input.tags,
    };
    info!(id = user.id, "created user");
    users.records.insert(user.id, user.clone());
    (StatusCode::CREATED, Json(json!({"user": user})))
}

async fn get_user(
    State(state): State<MockState>,
    Path(file): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let id = record_id(&file)?;
    let users = state.inner.users.read().await;
    let user = users.records.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({"user": user})))
}

async fn update_user(
    State(state): State<MockState>,
    Path(file): Path<String>,
    Json(body): Json<UserBody<UserUpdate>>,
) -> Result<Json<Value>, StatusCode> {
    let id = record_id(&file)?;
    let input = body.user;
    let mut users = state.inner.users.write().await;
    let user = users.records.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(email) = input.email {
        user.email = Some(email);
    }
    if let Some(role) = input.role {
        user.role = role;
    }
    if let Some(phone) = input.phone {
        user.phone = Some(phone);
    }
    if let Some(suspended) = input.suspended {
        user.suspended = suspended;
    }
    if let Some(tags) = input.tags {
        user.tags = tags;
    }
    Ok(Json(json!({"user": user})))
}

async fn delete_user(
    State(state): State<MockState>,
    Path(file): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let id = record_id(&file)?;
    let mut users = state.inner.users.write().await;
    users
        .records
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_tickets(
    State(state): State<MockState>,
    Query(query): Query<ListQuery>,
) -> Json<Value> {
    let tickets = state.inner.tickets.read().await;
    Json(page("tickets", "tickets.json", &tickets.records, &query))
}

async fn create_ticket(
    State(state): State<MockState>,
    Json(body): Json<TicketBody<NewTicket>>,
) -> (StatusCode, Json<Value>) {
    let input = body.ticket;
    let mut tickets = state.inner.tickets.write().await;
    let ticket = Ticket {
        id: tickets.allocate(),
        subject: input.subject,
        description: input.comment.body,
        status: "new".to_string(),
        priority: input.priority,
        requester_id: input.requester_id,
        assignee_id: input.assignee_id,
        tags: input.tags,
        comment_count: 1,
    };
    info!(id = ticket.id, "created ticket");
    tickets.records.insert(ticket.id, ticket.clone());
    (StatusCode::CREATED, Json(json!({"ticket": ticket})))
}

async fn get_ticket(
    State(state): State<MockState>,
    Path(file): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let id = record_id(&file)?;
    let tickets = state.inner.tickets.read().await;
    let ticket = tickets.records.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({"ticket": ticket})))
}

async fn update_ticket(
    State(state): State<MockState>,
    Path(file): Path<String>,
    Json(body): Json<TicketBody<TicketUpdate>>,
) -> Result<Json<Value>, StatusCode> {
    let id = record_id(&file)?;
    let input = body.ticket;
    let mut tickets = state.inner.tickets.write().await;
    let ticket = tickets.records.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(subject) = input.subject {
        ticket.subject = subject;
    }
    if let Some(status) = input.status {
        ticket.status = status;
    }
    if let Some(priority) = input.priority {
        ticket.priority = Some(priority);
    }
    if let Some(assignee_id) = input.assignee_id {
        ticket.assignee_id = Some(assignee_id);
    }
    if input.comment.is_some() {
        ticket.comment_count += 1;
    }
    if let Some(tags) = input.tags {
        ticket.tags = tags;
    }
    Ok(Json(json!({"ticket": ticket})))
}

async fn delete_ticket(
    State(state): State<MockState>,
    Path(file): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let id = record_id(&file)?;
    let mut tickets = state.inner.tickets.write().await;
    tickets
        .records
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}
