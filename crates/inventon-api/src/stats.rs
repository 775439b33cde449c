use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use inventon_core::stats::{Period, SummaryReport};
use inventon_types::api::{Claims, SummaryQuery};

use crate::auth::AppState;
use crate::error::blocking;

pub async fn summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let report = blocking(move || {
        let period = query.period.as_deref().unwrap_or("week").parse::<Period>()?;
        state.stats.summary(period).map(SummaryReport::from)
    })
    .await?;
    Ok(Json(report))
}

pub async fn my_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let stats = blocking(move || state.stats.per_user(claims.sub)).await?;
    Ok(Json(stats))
}

pub async fn user_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let stats = blocking(move || state.stats.per_user(user_id)).await?;
    Ok(Json(stats))
}

pub async fn overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let overview = blocking(move || state.stats.overview()).await?;
    Ok(Json(overview))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let dashboard = blocking(move || state.stats.dashboard()).await?;
    Ok(Json(dashboard))
}
