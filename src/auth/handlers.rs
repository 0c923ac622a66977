use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            LoginRequest, MessageResponse, PublicUser, RegisterRequest, RequestResetRequest,
            ResetPasswordRequest, TokenResponse,
        },
        extractors::AuthUser,
    },
    error::{AppError, AppResult},
    extract::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/request-password-reset", post(request_password_reset))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let token = state
        .auth
        .register(
            payload.email.as_deref(),
            payload.password.as_deref(),
            payload.username.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state
        .auth
        .login(payload.email.as_deref(), payload.password.as_deref())
        .await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RequestResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = state
        .auth
        .request_password_reset(payload.email.as_deref())
        .await?;
    Ok(Json(MessageResponse { message }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = state
        .auth
        .reset_password(payload.token.as_deref(), payload.new_password.as_deref())
        .await?;
    Ok(Json(MessageResponse { message }))
}

#[instrument(skip(state, claims))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<PublicUser>> {
    // A valid token for a deleted account is no longer a valid session.
    let user = state
        .auth
        .current_user(claims.id)
        .await?
        .ok_or(AppError::InvalidToken)?;
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
        username: user.username,
    }))
}
