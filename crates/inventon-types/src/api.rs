use serde::{Deserialize, Serialize};

use crate::models::FaqEntry;

// -- JWT Claims --

/// Claims minted by the chat-bot front end for the member it acts on behalf of.
/// Role ids, the blanket administrator permission and server ownership are
/// facts the platform knows. The core only combines them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<i64>,
    #[serde(default)]
    pub administrator: bool,
    #[serde(default)]
    pub owner: bool,
    pub exp: usize,
}

// -- Tickets --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitTicketRequest {
    pub channel_id: i64,
    pub title: Option<String>,
    pub environment: String,
    pub language: String,
    pub error_text: String,
    pub purpose: String,
    pub code_snippet: Option<String>,
    pub log_files: Option<String>,
    pub screenshot_ref: Option<String>,
    pub attempted_solutions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostAnswerRequest {
    pub text: String,
    #[serde(default)]
    pub is_solution: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchTicketsQuery {
    pub q: String,
    pub scope: Option<String>,
}

// -- FAQ --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddFaqRequest {
    pub question: String,
    pub answer: String,
    /// Comma-separated search terms.
    pub keywords: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFaqRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FaqSearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuggestRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<FaqEntry>,
}

// -- Stats --

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub period: Option<String>,
}
