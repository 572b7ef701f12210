//! Lending settings endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, repository::settings::LendingSettings};

use super::AuthenticatedUser;

/// Get current lending settings
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current settings", body = LendingSettings)
    )
)]
pub async fn get_settings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LendingSettings>> {
    claims.require_admin()?;

    let settings = state.services.settings.get_settings().await?;
    Ok(Json(settings))
}

/// Update lending settings
#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    request_body = LendingSettings,
    responses(
        (status = 200, description = "Updated settings", body = LendingSettings)
    )
)]
pub async fn update_settings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(settings): Json<LendingSettings>,
) -> AppResult<Json<LendingSettings>> {
    claims.require_admin()?;

    let settings = state.services.settings.update_settings(settings).await?;
    Ok(Json(settings))
}
