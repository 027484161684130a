//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use bazaar_core::models::auth::Credentials;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LogoutRequest, RefreshRequest, SignupRequest,
    SuccessResponse, TokenResponse, UserResponse,
};
use crate::services::auth;

/// `POST /signup` — create a new user account.
pub async fn signup_handler(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = auth::register(state.identities.as_ref(), &state.credentials, body.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `POST /login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = auth::login(
        state.identities.as_ref(),
        state.tokens.as_ref(),
        &state.credentials,
        &state.issuer,
        state.config.refresh_token_ttl,
        Credentials {
            email: body.email,
            password: body.password,
        },
    )
    .await?;
    Ok(Json(pair.into()))
}

/// `POST /token/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = auth::refresh(
        state.identities.as_ref(),
        state.tokens.as_ref(),
        &state.issuer,
        state.config.refresh_token_ttl,
        &body.refresh_token,
    )
    .await?;
    Ok(Json(pair.into()))
}

/// `POST /logout` — revoke a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<SuccessResponse>> {
    auth::logout(state.tokens.as_ref(), body.refresh_token.as_deref()).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `POST /users/change-password` — replace the password after checking the old one.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    auth::change_password(
        state.identities.as_ref(),
        state.tokens.as_ref(),
        &state.credentials,
        Credentials {
            email: body.email,
            password: body.old_password,
        },
        body.new_password,
    )
    .await?;
    Ok(Json(SuccessResponse { success: true }))
}
