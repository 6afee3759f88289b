use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, Method},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use messageai_shared::constants::UPLOAD_FOLDERS;
use messageai_shared::protocol::{PushRequest, PushResponse, UploadRequest, UploadResponse};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::media_store::{content_type_for, MediaStore};
use crate::presign::UploadSigner;
use crate::push::PushDispatcher;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub media_store: Arc<MediaStore>,
    pub signer: UploadSigner,
    pub push: PushDispatcher,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub async fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let media_store =
            MediaStore::new(config.media_storage_path.clone(), config.max_upload_size).await?;
        Ok(Self {
            media_store: Arc::new(media_store),
            signer: UploadSigner::new(config.upload_signing_key, config.upload_url_ttl),
            push: PushDispatcher::from_config(&config),
            rate_limiter: RateLimiter::from_config(&config),
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(request_upload))
        .route("/objects/*key", put(put_object))
        .route("/media/*key", get(get_media))
        .route("/notify", post(notify))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct SignedQuery {
    expires: i64,
    signature: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Hand out a signed URL the client `PUT`s the object bytes to.
async fn request_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ServerError> {
    if !UPLOAD_FOLDERS.contains(&req.folder.as_str()) {
        return Err(ServerError::BadRequest(format!("Unknown folder: {}", req.folder)));
    }
    if req.content_type.trim().is_empty() {
        return Err(ServerError::BadRequest("Missing content type".to_string()));
    }

    let key = UploadSigner::object_key(&req.folder, &req.filename)?;
    let upload_url = state
        .signer
        .upload_url(&state.config.public_base_url, &key, Utc::now().timestamp());

    info!(key = %key, content_type = %req.content_type, "Upload URL issued");
    Ok(Json(UploadResponse { upload_url, key }))
}

async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    state
        .signer
        .verify(&key, query.expires, &query.signature, Utc::now().timestamp())?;
    state.media_store.put(&key, &body).await?;

    info!(key = %key, size = body.len(), "Object uploaded");
    Ok(axum::http::StatusCode::OK)
}

async fn get_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.media_store.get(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data))
}

async fn notify(
    State(state): State<AppState>,
    Json(req): Json<PushRequest>,
) -> Result<Json<PushResponse>, ServerError> {
    let result = state.push.dispatch(&req).await?;
    Ok(Json(result))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
