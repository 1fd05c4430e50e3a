use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use nosh_core::models::{FeedComment, FeedPost};
use nosh_core::storage::{SERVER_STATE_KEY, Storage};
use nosh_core::sync::{Envelope, SyncPush, apply_push};

const BODY_LIMIT: usize = 5 * 1024 * 1024; // 5 MB

#[derive(Clone)]
struct AppState {
    storage: Arc<Mutex<Storage>>,
    api_key: Option<String>,
}

// --- Request types ---

#[derive(Deserialize)]
struct CreatePostRequest {
    author: String,
    body: String,
}

#[derive(Deserialize)]
struct AuthorRequest {
    author: String,
}

#[derive(Deserialize)]
struct CommentRequest {
    author: String,
    body: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(Envelope::<()>::err(message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(Envelope::<()>::err("Invalid or missing API key")),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn health() -> Json<Envelope<serde_json::Value>> {
    Json(Envelope::ok(serde_json::json!({ "status": "ok" })))
}

async fn get_nutrition(
    State(state): State<AppState>,
) -> Result<Json<Envelope<nosh_core::state::NutritionState>>, ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let stored = storage.kv_get(SERVER_STATE_KEY).context("database error")?;
    match stored {
        // A fresh server has no document; clients treat 404 as "push everything"
        None => Err(ApiError::NotFound("No nutrition data yet".to_string())),
        Some(_) => Ok(Json(Envelope::ok(storage.load_state(SERVER_STATE_KEY)))),
    }
}

async fn put_nutrition(
    State(state): State<AppState>,
    Json(push): Json<SyncPush>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut doc = storage.load_state(SERVER_STATE_KEY);
    let applied = apply_push(&mut doc, push);
    storage.save_state(SERVER_STATE_KEY, &doc);
    Ok(Json(Envelope::ok(
        serde_json::json!({ "applied_days": applied }),
    )))
}

async fn list_feed(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<FeedPost>>>, ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let posts = storage.list_posts(50).context("database error")?;
    Ok(Json(Envelope::ok(posts)))
}

async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Envelope<FeedPost>>), ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let post = storage
        .insert_post(&req.author, &req.body)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(post))))
}

async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AuthorRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if storage.get_post(&id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("Post {id} not found")));
    }
    let liked = storage
        .toggle_like(&id, &req.author)
        .context("database error")?;
    Ok(Json(Envelope::ok(serde_json::json!({ "liked": liked }))))
}

async fn comment_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Envelope<FeedComment>>), ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if storage.get_post(&id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("Post {id} not found")));
    }
    let comment = storage
        .add_comment(&id, &req.author, &req.body)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(comment))))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AuthorRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let storage = state
        .storage
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if storage.get_post(&id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("Post {id} not found")));
    }
    storage
        .delete_post(&id, &req.author)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    Ok(Json(Envelope::ok(serde_json::json!({ "deleted": true }))))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/api/nutrition", get(get_nutrition).put(put_nutrition))
        .route("/api/feed", get(list_feed).post(create_post))
        .route("/api/feed/{id}", axum::routing::delete(delete_post))
        .route("/api/feed/{id}/like", axum::routing::post(like_post))
        .route(
            "/api/feed/{id}/comments",
            axum::routing::post(comment_post),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health))
        .merge(authed)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    storage: Storage,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        storage: Arc::new(Mutex::new(storage)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
