use axum::{extract::State, Extension, Json};
use serde::Serialize;
use validator::Validate;

use super::AppState;
use crate::auth::{authenticate, AuthContext};
use crate::error::AppError;
use crate::forms::LoginForm;
use crate::permissions::NavItem;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in_minutes: i64,
    pub user: AuthContext,
    pub navigation: Vec<NavItem>,
}

/// `POST /auth/login`
pub async fn login(State(state): State<AppState>, Json(form): Json<LoginForm>) -> Result<Json<LoginResponse>, AppError> {
    form.validate()?;

    let context = authenticate(&state.security, &state.config.module_id, &form.usuario, &form.contrasena).await?;
    let token = state.sessions.issue(&context)?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in_minutes: state.config.session_ttl_minutes,
        navigation: context.permissions.navigation(),
        user: context,
    }))
}

/// `GET /api/me`
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<AuthContext> {
    Json(auth)
}

/// `GET /api/navigation`
pub async fn navigation(Extension(auth): Extension<AuthContext>) -> Json<Vec<NavItem>> {
    Json(auth.permissions.navigation())
}
