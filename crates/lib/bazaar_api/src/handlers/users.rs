//! User profile handlers. Both routes sit behind `require_auth`.

use axum::Json;
use axum::extract::{Extension, Path, State};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserResponse;
use crate::services::auth;

/// `GET /users/{user_id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = auth::get_user(state.identities.as_ref(), user_id).await?;
    Ok(Json(user.into()))
}

/// `GET /users/me` — the user named by the bearer token.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let user = auth::get_user(state.identities.as_ref(), claims.id).await?;
    Ok(Json(user.into()))
}
