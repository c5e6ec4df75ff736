//! API Routes

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{
        sse::{Event, Sse},
        AppendHeaders, IntoResponse,
    },
    routing::{get, post},
    Form, Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::{self, AuthUser, KeyUser};
use crate::change_feed;
use crate::device_registry::{Device, HitResponse, RegisterResponse, UpdateDeviceRequest};
use crate::error::{Error, Result};
use crate::mac_resolver;
use crate::models::MessageResponse;
use crate::state::AppState;
use crate::user_store::{CreateUserRequest, UpdatePasswordRequest, UserInfo};

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Auth
        .route("/token", post(login))
        .route("/logout", post(logout))
        // Device-facing (identified by MAC, no principal required)
        .route("/device/register", post(register_device))
        .route("/device/hit", post(record_hit))
        // Admin
        .route("/admin/device", post(update_device))
        .route("/admin/devices", get(list_devices))
        .route("/admin/user", post(create_user))
        .route("/admin/user/password", post(update_user_password))
        .route("/admin/users", get(list_users))
        .route("/admin/events", get(event_stream))
        .with_state(state)
}

// ========================================
// Auth
// ========================================

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    is_key_user: bool,
}

/// POST /token - verify credentials, set the access-token cookie
async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse> {
    let user = state
        .users
        .authenticate(&form.username, &form.password)
        .await?
        .ok_or_else(|| Error::Unauthorized("Incorrect username or password".to_string()))?;

    let token = auth::issue_token(&state.config.jwt_secret, &user)?;

    tracing::info!(username = %user.username, "User logged in");

    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth::TOKEN_COOKIE,
        token,
        auth::TOKEN_TTL_SECS
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(TokenResponse {
            access_token: token,
            token_type: "bearer",
            is_key_user: user.is_key_user,
        }),
    ))
}

/// POST /logout - clear the access-token cookie
async fn logout() -> impl IntoResponse {
    let cookie = format!("{}=; Path=/; Max-Age=0", auth::TOKEN_COOKIE);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

// ========================================
// Device-facing endpoints
// ========================================

/// Resolve the caller's MAC address from its transport identity
async fn resolve_caller_mac(headers: &HeaderMap, peer: SocketAddr) -> Result<String> {
    let ip = mac_resolver::client_ip(headers, peer);

    mac_resolver::resolve_mac(ip).await.ok_or_else(|| {
        tracing::warn!(ip = %ip, "Could not resolve caller MAC address");
        Error::BadRequest("Could not determine device MAC address".to_string())
    })
}

/// POST /device/register - assign (or return) the caller's order slot
async fn register_device(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<RegisterResponse>> {
    let mac = resolve_caller_mac(&headers, peer).await?;
    let device = state.registry.register(&mac).await?;

    Ok(Json(RegisterResponse {
        order: device.order,
        assigned: device.order,
    }))
}

/// POST /device/hit - increment the caller's hit counter
async fn record_hit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<HitResponse>> {
    let mac = resolve_caller_mac(&headers, peer).await?;
    let device = state.registry.record_hit(&mac).await?;

    Ok(Json(HitResponse {
        counter: device.hit_counter,
        max_hits: device.max_hits,
        order: device.order,
    }))
}

// ========================================
// Admin endpoints
// ========================================

/// POST /admin/device - update slot, threshold and name
async fn update_device(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(req): Json<UpdateDeviceRequest>,
) -> Result<Json<MessageResponse>> {
    state.registry.admin_update(&req).await?;

    Ok(Json(MessageResponse::new(
        "Device properties updated successfully",
    )))
}

/// GET /admin/devices - full device snapshot
async fn list_devices(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Vec<Device>>> {
    Ok(Json(state.registry.list().await?))
}

/// POST /admin/user - create a user (key users only)
async fn create_user(
    State(state): State<AppState>,
    KeyUser(_user): KeyUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    state.users.create(&req).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

/// POST /admin/user/password - replace a user's password (key users only)
async fn update_user_password(
    State(state): State<AppState>,
    KeyUser(_user): KeyUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state.users.update_password(&req).await?;

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// GET /admin/users - full user snapshot (key users only)
async fn list_users(
    State(state): State<AppState>,
    KeyUser(_user): KeyUser,
) -> Result<Json<Vec<UserInfo>>> {
    Ok(Json(state.users.list().await?))
}

// ========================================
// Change feed (SSE)
// ========================================

/// GET /admin/events - persistent change-feed connection
///
/// The feed task owns the sender; this handler bridges the receiver into
/// the SSE body. Dropping the body (client disconnect) closes the channel,
/// which the feed loop observes at the top of its next iteration.
async fn event_stream(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<change_feed::FeedEvent>(32);

    tokio::spawn(change_feed::run_feed(state.clone(), user, tx));

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok::<Event, Infallible>(Event::default().event(event.name).data(event.data))
    });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            // Disable proxy buffering so events are delivered immediately
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}
