//! In-process mock of the package-tracking API for client tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use parcelwatch_core::auth::MemorySlot;
use parcelwatch_core::models::Package;
use parcelwatch_core::{ApiClient, Session};
use serde::Deserialize;
use serde_json::json;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "abc123";
pub const RESET_TOKEN: &str = "reset-ok";

/// One received request: method, path and Authorization header.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
}

pub struct MockState {
    pub valid_token: String,
    pub packages: Vec<Package>,
    pub next_id: i64,
    pub usernames: Vec<String>,
    pub requests: Vec<Recorded>,
    /// Delay before answering a rejected package listing.
    pub reject_delay: Option<Duration>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            valid_token: TOKEN.to_string(),
            packages: Vec::new(),
            next_id: 1,
            usernames: vec![USERNAME.to_string()],
            requests: Vec::new(),
            reject_delay: None,
        }
    }
}

#[derive(Clone)]
pub struct Mock {
    state: Arc<Mutex<MockState>>,
}

impl Mock {
    pub fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.lock().requests.last().cloned().expect("no request recorded")
    }

    /// Simulate the server expiring every issued token.
    pub fn expire_tokens(&self) {
        self.lock().valid_token = "rotated".to_string();
    }

    pub fn seed_package(&self, tracking_number: &str, carrier: Option<&str>, label: Option<&str>) -> i64 {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.packages.push(Package {
            id,
            tracking_number: tracking_number.to_string(),
            carrier: carrier.map(str::to_string),
            description: label.map(str::to_string),
            status: Some("Registered".to_string()),
            last_location: None,
            created_at: Some("2024-01-14T14:20:00".to_string()),
            updated_at: None,
        });
        id
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": "Could not validate credentials" })),
    )
        .into_response()
}

/// Record the request and report whether it carried the valid token.
fn record(mock: &Mock, method: &'static str, path: String, headers: &HeaderMap) -> bool {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut state = mock.lock();
    let authorized = authorization.as_deref() == Some(format!("Bearer {}", state.valid_token).as_str());
    state.requests.push(Recorded {
        method,
        path,
        authorization,
    });
    authorized
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ResetRequestBody {
    email: String,
}

#[derive(Deserialize)]
struct ResetBody {
    token: String,
    new_password: String,
}

#[derive(Deserialize)]
struct CreateBody {
    tracking_number: String,
    carrier: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct UpdateBody {
    carrier: Option<String>,
    description: Option<String>,
}

async fn login(State(mock): State<Mock>, headers: HeaderMap, Form(form): Form<LoginForm>) -> Response {
    record(&mock, "POST", "/api/auth/login".into(), &headers);
    if form.username == USERNAME && form.password == PASSWORD {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Incorrect username or password")
    }
}

async fn register(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<RegisterBody>) -> Response {
    record(&mock, "POST", "/api/auth/register".into(), &headers);
    let mut state = mock.lock();
    if state.usernames.contains(&body.username) {
        return detail(StatusCode::BAD_REQUEST, "Email or username already registered");
    }
    if body.password.len() < 8 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [{ "loc": ["body", "password"], "msg": "too short", "type": "value_error" }] })),
        )
            .into_response();
    }
    state.usernames.push(body.username.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "id": state.usernames.len(), "email": body.email, "username": body.username, "is_active": true })),
    )
        .into_response()
}

async fn reset_request(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<ResetRequestBody>) -> Response {
    record(&mock, "POST", "/api/auth/password-reset-request".into(), &headers);
    if body.email == "alice@example.com" {
        Json(json!({ "message": "If the email exists, a password reset link has been sent" })).into_response()
    } else {
        detail(StatusCode::NOT_FOUND, "User not found")
    }
}

async fn reset_password(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<ResetBody>) -> Response {
    record(&mock, "POST", "/api/auth/password-reset".into(), &headers);
    if body.token == RESET_TOKEN && body.new_password.len() >= 8 {
        Json(json!({ "message": "Password reset successfully" })).into_response()
    } else {
        detail(StatusCode::BAD_REQUEST, "Invalid or expired reset token")
    }
}

async fn list_packages(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    if !record(&mock, "GET", "/api/packages/".into(), &headers) {
        let delay = mock.lock().reject_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        return unauthorized();
    }
    Json(mock.lock().packages.clone()).into_response()
}

async fn create_package(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<CreateBody>) -> Response {
    if !record(&mock, "POST", "/api/packages/".into(), &headers) {
        return unauthorized();
    }
    if body.tracking_number == "BAD" {
        return detail(StatusCode::BAD_REQUEST, "Invalid tracking number format for gls");
    }
    let mut state = mock.lock();
    let package = Package {
        id: state.next_id,
        tracking_number: body.tracking_number,
        carrier: Some(body.carrier.unwrap_or_else(|| "auto".to_string())),
        description: body.description,
        status: None,
        last_location: None,
        created_at: Some("2024-01-15T10:00:00".to_string()),
        updated_at: None,
    };
    state.next_id += 1;
    state.packages.push(package.clone());
    (StatusCode::CREATED, Json(package)).into_response()
}

async fn get_package(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !record(&mock, "GET", format!("/api/packages/{}", id), &headers) {
        return unauthorized();
    }
    match mock.lock().packages.iter().find(|p| p.id == id) {
        Some(p) => Json(p.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Package not found"),
    }
}

async fn update_package(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> Response {
    if !record(&mock, "PUT", format!("/api/packages/{}", id), &headers) {
        return unauthorized();
    }
    let mut state = mock.lock();
    match state.packages.iter_mut().find(|p| p.id == id) {
        Some(p) => {
            if body.carrier.is_some() {
                p.carrier = body.carrier;
            }
            if body.description.is_some() {
                p.description = body.description;
            }
            p.updated_at = Some("2024-01-16T08:00:00".to_string());
            Json(p.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Package not found"),
    }
}

async fn delete_package(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !record(&mock, "DELETE", format!("/api/packages/{}", id), &headers) {
        return unauthorized();
    }
    let mut state = mock.lock();
    let before = state.packages.len();
    state.packages.retain(|p| p.id != id);
    if state.packages.len() == before {
        detail(StatusCode::NOT_FOUND, "Package not found")
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// Tracking numbers starting with FAIL report a carrier error inside a 200,
/// DOWN answers 503, anything else gets an unordered three-event history.
async fn track_package(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !record(&mock, "GET", format!("/api/packages/{}/track", id), &headers) {
        return unauthorized();
    }
    let package = mock.lock().packages.iter().find(|p| p.id == id).cloned();
    let Some(package) = package else {
        return detail(StatusCode::NOT_FOUND, "Package not found");
    };
    if package.tracking_number.starts_with("FAIL") {
        return Json(json!({
            "status": "error",
            "location": null,
            "history": [],
            "error": "Carrier service unavailable",
        }))
        .into_response();
    }
    if package.tracking_number.starts_with("DOWN") {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "GLS API timeout");
    }
    Json(json!({
        "status": "Out for Delivery",
        "location": "Local Delivery Depot",
        "carrier": package.carrier,
        "error": null,
        "history": [
            { "timestamp": "2024-01-15T09:45:00", "status": "In transit", "location": "Distribution Center" },
            { "timestamp": "2024-01-16T07:30:00", "status": "Out for delivery", "location": "Local Delivery Depot" },
            { "timestamp": "2024-01-14T14:20:00", "status": "Package received at depot", "location": "Regional Hub" }
        ]
    }))
    .into_response()
}

async fn carriers(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    if !record(&mock, "GET", "/api/packages/carriers".into(), &headers) {
        return unauthorized();
    }
    Json(json!({ "carriers": ["correos", "gls", "seur"] })).into_response()
}

/// Start the mock on an ephemeral port.
pub async fn start_server() -> (String, Mock) {
    let mock = Mock {
        state: Arc::new(Mutex::new(MockState::default())),
    };
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/password-reset-request", post(reset_request))
        .route("/api/auth/password-reset", post(reset_password))
        .route("/api/packages/", get(list_packages).post(create_package))
        .route("/api/packages/carriers", get(carriers))
        .route(
            "/api/packages/:id",
            get(get_package).put(update_package).delete(delete_package),
        )
        .route("/api/packages/:id/track", get(track_package))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });
    (format!("http://{addr}"), mock)
}

/// Mock server plus a client with an empty in-memory session.
pub async fn setup() -> (ApiClient, Mock) {
    let (base, mock) = start_server().await;
    let session = Arc::new(Session::new(Box::new(MemorySlot::default())));
    let api = ApiClient::new(&base, session).expect("client");
    (api, mock)
}

pub async fn logged_in() -> (ApiClient, Mock) {
    let (api, mock) = setup().await;
    api.login(USERNAME, PASSWORD).await.expect("login");
    (api, mock)
}
