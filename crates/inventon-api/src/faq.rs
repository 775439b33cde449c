use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use inventon_core::faq::parse_keywords;
use inventon_types::api::{
    AddFaqRequest, Claims, FaqSearchQuery, SuggestRequest, SuggestResponse, UpdateFaqRequest,
};
use inventon_types::models::FaqPatch;

use crate::auth::AppState;
use crate::error::blocking;

pub async fn list_faq(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let entries = blocking(move || state.faq.list_all()).await?;
    Ok(Json(entries))
}

pub async fn get_faq(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let entry = blocking(move || state.faq.get(id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(entry))
}

pub async fn add_faq(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddFaqRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let keywords = req.keywords.as_deref().map(parse_keywords).unwrap_or_default();
    let entry = blocking(move || {
        state
            .faq
            .add(&req.question, &req.answer, keywords, Some(claims.sub))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update_faq(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFaqRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let patch = FaqPatch {
        question_text: req.question,
        answer_text: req.answer,
        keywords: req.keywords.as_deref().map(parse_keywords),
    };
    let entry = blocking(move || state.faq.update(id, patch)).await?;
    Ok(Json(entry))
}

pub async fn delete_faq(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let entry = blocking(move || state.faq.delete(id)).await?;
    Ok(Json(entry))
}

pub async fn search_faq(
    State(state): State<AppState>,
    Query(query): Query<FaqSearchQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let entries = blocking(move || state.faq.search(&query.q)).await?;
    Ok(Json(entries))
}

/// Called for ordinary chat messages; returns an empty list for non-questions.
pub async fn suggest(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let suggestions = blocking(move || state.faq.auto_suggest(&req.message)).await?;
    Ok(Json(SuggestResponse { suggestions }))
}
