//! Ticket lifecycle: submission, status changes and answers.
//!
//! Any status may move to any other status. Operators can reopen a ticket
//! that was marked solved by mistake, so validity is only membership in
//! [`TicketStatus::ALL`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use inventon_types::models::{
    Answer, AnswerFilter, Counter, NewAnswer, NewTicket, ResponseTimeSample, Ticket,
    TicketDetails, TicketFilter, TicketStatus, UserProfile, format_timestamp, parse_timestamp,
};
use inventon_types::{Error, RecordStore, Result};

use crate::stats::StatisticsAggregator;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 50;
const TITLE_PURPOSE_CHARS: usize = 50;

/// Fields a user supplies when filing a question.
#[derive(Debug, Clone, Default)]
pub struct SubmitTicket {
    pub title: Option<String>,
    pub environment: String,
    pub language: String,
    pub error_text: String,
    pub purpose: String,
    pub details: TicketDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Title,
    Error,
    Code,
    All,
}

impl FromStr for SearchScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(Self::Title),
            "error" => Ok(Self::Error),
            "code" => Ok(Self::Code),
            "all" => Ok(Self::All),
            other => Err(Error::validation(format!(
                "unknown search scope '{}' (expected title, error, code or all)",
                other
            ))),
        }
    }
}

impl SearchScope {
    fn matches(&self, ticket: &Ticket, needle: &str) -> bool {
        let hit = |field: &str| field.to_lowercase().contains(needle);
        let code = || ticket.code_snippet.as_deref().is_some_and(|c| hit(c));
        match self {
            Self::Title => hit(&ticket.title),
            Self::Error => hit(&ticket.error_text),
            Self::Code => code(),
            Self::All => {
                hit(&ticket.title) || hit(&ticket.error_text) || hit(&ticket.purpose) || code()
            }
        }
    }
}

/// Result of posting an answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerPosted {
    pub answer: Answer,
    pub ticket: Ticket,
    /// Recorded only for solutions on tickets with a readable `created_at`.
    pub response_time: Option<ResponseTimeSample>,
}

#[derive(Clone)]
pub struct TicketManager {
    store: Arc<dyn RecordStore>,
    stats: StatisticsAggregator,
}

impl TicketManager {
    pub fn new(store: Arc<dyn RecordStore>, stats: StatisticsAggregator) -> Self {
        Self { store, stats }
    }

    /// Records an interaction with `profile`. Returns `true` for a first sighting.
    pub fn observe_user(&self, profile: &UserProfile) -> Result<bool> {
        let created = self.store.upsert_user(profile)?;
        if created {
            self.stats.increment(Counter::NewUsers, 1)?;
            info!("New user {} ({})", profile.username, profile.user_id);
        }
        Ok(created)
    }

    pub fn submit(
        &self,
        owner: &UserProfile,
        channel_id: i64,
        fields: SubmitTicket,
    ) -> Result<Ticket> {
        require("environment", &fields.environment)?;
        require("language", &fields.language)?;
        require("error_text", &fields.error_text)?;
        require("purpose", &fields.purpose)?;

        self.observe_user(owner)?;

        let title = fields
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| derive_title(&fields.language, &fields.purpose));

        let ticket = self.store.insert_ticket(NewTicket {
            owner_id: owner.user_id,
            channel_id,
            title,
            environment: fields.environment,
            language: fields.language,
            error_text: fields.error_text,
            purpose: fields.purpose,
            code_snippet: fields.details.code_snippet,
            log_files: fields.details.log_files,
            screenshot_ref: fields.details.screenshot_ref,
            attempted_solutions: fields.details.attempted_solutions,
            created_at: now(),
        })?;

        self.stats.increment(Counter::QuestionsCreated, 1)?;
        info!(
            "Ticket {} opened by {} on channel {}",
            ticket.id, owner.user_id, channel_id
        );
        Ok(ticket)
    }

    pub fn set_status(&self, ticket_id: i64, status: &str) -> Result<Ticket> {
        let status = status.parse::<TicketStatus>()?;
        self.transition(ticket_id, status)
    }

    fn transition(&self, ticket_id: i64, status: TicketStatus) -> Result<Ticket> {
        if !self.store.update_ticket_status(ticket_id, status, &now())? {
            return Err(Error::not_found("ticket", ticket_id));
        }
        info!("Ticket {} -> {}", ticket_id, status);
        self.require_ticket(ticket_id)
    }

    /// Attaches an answer. A solution also marks the ticket solved and records
    /// how long it waited. The writes are independent, so a store failure part
    /// way through leaves the answer in place without the later effects.
    pub fn post_answer(
        &self,
        ticket_id: i64,
        author_id: i64,
        text: &str,
        is_solution: bool,
    ) -> Result<AnswerPosted> {
        require("text", text)?;
        let mut ticket = self.require_ticket(ticket_id)?;

        let answer = self.store.insert_answer(NewAnswer {
            ticket_id,
            author_id,
            text: text.to_string(),
            is_solution,
            created_at: now(),
        })?;

        let mut response_time = None;
        if is_solution {
            ticket = self.transition(ticket_id, TicketStatus::Solved)?;
            self.stats.increment(Counter::QuestionsSolved, 1)?;
            response_time = self.record_response_time(&ticket);
        }

        self.stats.increment(Counter::AnswersGiven, 1)?;

        Ok(AnswerPosted {
            answer,
            ticket,
            response_time,
        })
    }

    /// Never fails the enclosing answer: problems are logged and dropped.
    fn record_response_time(&self, ticket: &Ticket) -> Option<ResponseTimeSample> {
        let Some(created) = parse_timestamp(&ticket.created_at) else {
            warn!(
                "Ticket {} has unreadable created_at '{}', skipping response time",
                ticket.id, ticket.created_at
            );
            return None;
        };

        let minutes = (Utc::now() - created).num_minutes().max(0);
        match self.store.insert_response_time(ticket.id, minutes, &now()) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Failed to record response time for ticket {}: {}", ticket.id, e);
                None
            }
        }
    }

    pub fn attach_details(&self, ticket_id: i64, details: TicketDetails) -> Result<Ticket> {
        if details.is_empty() {
            return Err(Error::validation("no details supplied"));
        }
        if !self.store.update_ticket_details(ticket_id, &details, &now())? {
            return Err(Error::not_found("ticket", ticket_id));
        }
        self.require_ticket(ticket_id)
    }

    pub fn get(&self, ticket_id: i64) -> Result<Option<Ticket>> {
        self.store.get_ticket(ticket_id)
    }

    pub fn get_by_channel(&self, channel_id: i64) -> Result<Option<Ticket>> {
        self.store.get_ticket_by_channel(channel_id)
    }

    /// Newest first, unbounded.
    pub fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Ticket>> {
        self.store.scan_tickets(&TicketFilter {
            owner_id: Some(owner_id),
            ..Default::default()
        })
    }

    /// Newest first, optionally filtered by status.
    pub fn list(&self, status: Option<&str>, limit: Option<u32>) -> Result<Vec<Ticket>> {
        let status = status.map(str::parse::<TicketStatus>).transpose()?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.store.scan_tickets(&TicketFilter {
            status,
            limit: Some(limit),
            ..Default::default()
        })
    }

    /// Case-insensitive substring search, newest first.
    pub fn search(&self, keyword: &str, scope: SearchScope) -> Result<Vec<Ticket>> {
        require("keyword", keyword)?;
        let needle = keyword.trim().to_lowercase();
        let tickets = self.store.scan_tickets(&TicketFilter::default())?;
        Ok(tickets
            .into_iter()
            .filter(|t| scope.matches(t, &needle))
            .collect())
    }

    /// Oldest first.
    pub fn answers(&self, ticket_id: i64) -> Result<Vec<Answer>> {
        self.require_ticket(ticket_id)?;
        self.store.scan_answers(&AnswerFilter {
            ticket_id: Some(ticket_id),
            ..Default::default()
        })
    }

    fn require_ticket(&self, ticket_id: i64) -> Result<Ticket> {
        self.store
            .get_ticket(ticket_id)?
            .ok_or(Error::not_found("ticket", ticket_id))
    }
}

/// `[language] purpose`, purpose cut to 50 characters.
pub fn derive_title(language: &str, purpose: &str) -> String {
    let purpose = purpose.trim();
    if purpose.chars().count() > TITLE_PURPOSE_CHARS {
        let cut: String = purpose.chars().take(TITLE_PURPOSE_CHARS).collect();
        format!("[{}] {}...", language.trim(), cut)
    } else {
        format!("[{}] {}", language.trim(), purpose)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn now() -> String {
    format_timestamp(Utc::now())
}
