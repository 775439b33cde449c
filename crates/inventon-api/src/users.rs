use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use inventon_types::api::Claims;

use crate::auth::AppState;
use crate::error::blocking;

/// Records that the caller interacted with the bot.
pub async fn observe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let profile = state.profile_of(&claims);
    let created = blocking(move || state.tickets.observe_user(&profile)).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!({ "user_id": claims.sub, "created": created }))))
}
