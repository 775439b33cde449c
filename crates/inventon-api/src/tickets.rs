use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use inventon_core::tickets::{SearchScope, SubmitTicket};
use inventon_types::api::{
    Claims, ListTicketsQuery, PostAnswerRequest, SearchTicketsQuery, SetStatusRequest,
    SubmitTicketRequest,
};
use inventon_types::models::{Ticket, TicketDetails};

use crate::auth::AppState;
use crate::error::blocking;

pub async fn submit_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitTicketRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let owner = state.profile_of(&claims);
    let fields = SubmitTicket {
        title: req.title,
        environment: req.environment,
        language: req.language,
        error_text: req.error_text,
        purpose: req.purpose,
        details: TicketDetails {
            code_snippet: req.code_snippet,
            log_files: req.log_files,
            screenshot_ref: req.screenshot_ref,
            attempted_solutions: req.attempted_solutions,
        },
    };

    let ticket = blocking(move || state.tickets.submit(&owner, req.channel_id, fields)).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Administrative listing across all owners.
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let tickets =
        blocking(move || state.tickets.list(query.status.as_deref(), query.limit)).await?;
    Ok(Json(tickets))
}

pub async fn my_tickets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let tickets = blocking(move || state.tickets.list_for_owner(claims.sub)).await?;
    Ok(Json(tickets))
}

pub async fn search_tickets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchTicketsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let tickets = blocking(move || {
        let scope = query.scope.as_deref().unwrap_or("all").parse::<SearchScope>()?;
        state.tickets.search(&query.q, scope)
    })
    .await?;
    Ok(Json(tickets))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let lookup = state.clone();
    let ticket = blocking(move || lookup.tickets.get(ticket_id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    ensure_visible(&state, &claims, &ticket)?;
    Ok(Json(ticket))
}

pub async fn get_ticket_by_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(channel_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let lookup = state.clone();
    let ticket = blocking(move || lookup.tickets.get_by_channel(channel_id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    ensure_visible(&state, &claims, &ticket)?;
    Ok(Json(ticket))
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let ticket = blocking(move || state.tickets.set_status(ticket_id, &req.status)).await?;
    Ok(Json(ticket))
}

/// Owners may add details to their own tickets.
pub async fn attach_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<i64>,
    Json(details): Json<TicketDetails>,
) -> Result<impl IntoResponse, StatusCode> {
    let lookup = state.clone();
    let ticket = blocking(move || lookup.tickets.get(ticket_id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    ensure_visible(&state, &claims, &ticket)?;

    let ticket = blocking(move || state.tickets.attach_details(ticket_id, details)).await?;
    Ok(Json(ticket))
}

pub async fn post_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<i64>,
    Json(req): Json<PostAnswerRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_privileged(&claims)?;
    let posted = blocking(move || {
        state
            .tickets
            .post_answer(ticket_id, claims.sub, &req.text, req.is_solution)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(posted)))
}

pub async fn list_answers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let lookup = state.clone();
    let ticket = blocking(move || lookup.tickets.get(ticket_id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    ensure_visible(&state, &claims, &ticket)?;

    let answers = blocking(move || state.tickets.answers(ticket_id)).await?;
    Ok(Json(answers))
}

/// Tickets are visible to their owner and to privileged members.
fn ensure_visible(state: &AppState, claims: &Claims, ticket: &Ticket) -> Result<(), StatusCode> {
    if ticket.owner_id == claims.sub {
        return Ok(());
    }
    state.require_privileged(claims)
}
