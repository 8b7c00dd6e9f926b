use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const PAGE_SIZE: usize = 2;
pub const PASSWORD: &str = "hunter2";
/// Sent with single-user lookups; other routes are not cacheable.
pub const USER_CACHE_CONTROL: &str = "private, max-age=60";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<User>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub session: Session,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub user: Credentials,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Clone)]
pub struct AppState {
    users: Arc<Vec<User>>,
    sessions: Arc<RwLock<HashMap<Uuid, u64>>>,
}

impl AppState {
    fn seeded() -> Self {
        let users = ["ada", "grace", "linus", "barbara", "ken"]
            .iter()
            .zip(1..)
            .map(|(name, id)| User {
                id,
                username: name.to_string(),
                email: format!("{name}@example.com"),
            })
            .collect();
        Self {
            users: Arc::new(users),
            sessions: Arc::default(),
        }
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/api/v1/users", get(list_users))
        .route("/api/v1/users/{id}", get(get_user))
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/me", get(current_user))
        .route("/api/v1/teapot", get(teapot))
        .route("/api/v1/greeting", get(greeting))
        .with_state(AppState::seeded())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Pages are 1-based; a missing or zero page means the first one.
async fn list_users(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Json<UserPage> {
    let page = query.page.unwrap_or(1).max(1);
    let users = state
        .users
        .iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .cloned()
        .collect();
    Json(UserPage { users })
}

async fn get_user(State(state): State<AppState>, Path(id): Path<u64>) -> Result<impl IntoResponse, StatusCode> {
    state
        .users
        .iter()
        .find(|u| u.id == id)
        .cloned()
        .map(cacheable_user)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<(StatusCode, Json<SessionEnvelope>), StatusCode> {
    let user = state
        .users
        .iter()
        .find(|u| u.username == input.user.username)
        .filter(|_| input.user.password == PASSWORD)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let session = Session {
        token: Uuid::new_v4(),
        user_id: user.id,
    };
    state.sessions.write().await.insert(session.token, user.id);
    Ok((StatusCode::CREATED, Json(SessionEnvelope { session })))
}

async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|t| Uuid::parse_str(t).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let user_id = *state.sessions.read().await.get(&token).ok_or(StatusCode::UNAUTHORIZED)?;
    state
        .users
        .iter()
        .find(|u| u.id == user_id)
        .cloned()
        .map(cacheable_user)
        .ok_or(StatusCode::UNAUTHORIZED)
}

fn cacheable_user(user: User) -> impl IntoResponse {
    ([(header::CACHE_CONTROL, USER_CACHE_CONTROL)], Json(UserEnvelope { user }))
}

async fn teapot() -> (StatusCode, &'static str) {
    (StatusCode::IM_A_TEAPOT, "short and stout")
}

/// JSON body encoded as ISO-8859-1, declared through the charset parameter.
async fn greeting() -> impl IntoResponse {
    let text = r#"{"greeting":{"text":"¡hola, señor!"}}"#;
    let body: Vec<u8> = text.chars().map(|c| c as u8).collect();
    ([(header::CONTENT_TYPE, "application/json; charset=iso-8859-1")], body)
}
