use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identity and display data for a community member, as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    /// Informational only. Privilege is always recomputed by the authorization gate.
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Solved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Solved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Solved => "solved",
            Self::Closed => "closed",
        }
    }

    /// Open and in-progress tickets still need attention.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}

/// A tracked support request. One ticket per private conversation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub owner_id: i64,
    pub channel_id: i64,
    pub title: String,
    pub environment: String,
    pub language: String,
    pub error_text: String,
    pub purpose: String,
    pub code_snippet: Option<String>,
    pub log_files: Option<String>,
    pub screenshot_ref: Option<String>,
    pub attempted_solutions: Option<String>,
    pub status: TicketStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Ticket fields supplied at insert time. The store assigns `id` and `status = open`.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub owner_id: i64,
    pub channel_id: i64,
    pub title: String,
    pub environment: String,
    pub language: String,
    pub error_text: String,
    pub purpose: String,
    pub code_snippet: Option<String>,
    pub log_files: Option<String>,
    pub screenshot_ref: Option<String>,
    pub attempted_solutions: Option<String>,
    pub created_at: String,
}

/// Optional ticket fields that can be attached after submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketDetails {
    pub code_snippet: Option<String>,
    pub log_files: Option<String>,
    pub screenshot_ref: Option<String>,
    pub attempted_solutions: Option<String>,
}

impl TicketDetails {
    pub fn is_empty(&self) -> bool {
        self.code_snippet.is_none()
            && self.log_files.is_none()
            && self.screenshot_ref.is_none()
            && self.attempted_solutions.is_none()
    }
}

/// Predicate for ticket scans. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub owner_id: Option<i64>,
    pub status: Option<TicketStatus>,
    /// Inclusive lower bound on `created_at`.
    pub created_since: Option<String>,
    /// Inclusive lower bound on `updated_at`.
    pub updated_since: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub ticket_id: i64,
    pub author_id: i64,
    pub text: String,
    pub is_solution: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub ticket_id: i64,
    pub author_id: i64,
    pub text: String,
    pub is_solution: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerFilter {
    pub ticket_id: Option<i64>,
    pub created_since: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: i64,
    pub question_text: String,
    pub answer_text: String,
    pub keywords: Vec<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

impl FaqEntry {
    /// Keywords in their persisted form, the string substring search runs against.
    pub fn keywords_joined(&self) -> String {
        join_keywords(&self.keywords)
    }
}

#[derive(Debug, Clone)]
pub struct NewFaqEntry {
    pub question_text: String,
    pub answer_text: String,
    pub keywords: Vec<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

/// Partial FAQ update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaqPatch {
    pub question_text: Option<String>,
    pub answer_text: Option<String>,
    pub keywords: Option<Vec<String>>,
}

impl FaqPatch {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none() && self.answer_text.is_none() && self.keywords.is_none()
    }
}

pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(",")
}

pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    QuestionsCreated,
    QuestionsSolved,
    AnswersGiven,
    NewUsers,
    FaqSearches,
}

impl Counter {
    /// Column name in both storage backends.
    pub fn column(&self) -> &'static str {
        match self {
            Self::QuestionsCreated => "questions_created",
            Self::QuestionsSolved => "questions_solved",
            Self::AnswersGiven => "answers_given",
            Self::NewUsers => "new_users",
            Self::FaqSearches => "faq_searches",
        }
    }
}

/// Per-calendar-day aggregate row holding named event counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounterSet {
    pub date: NaiveDate,
    pub questions_created: i64,
    pub questions_solved: i64,
    pub answers_given: i64,
    pub new_users: i64,
    pub faq_searches: i64,
}

impl DailyCounterSet {
    pub fn get(&self, counter: Counter) -> i64 {
        match counter {
            Counter::QuestionsCreated => self.questions_created,
            Counter::QuestionsSolved => self.questions_solved,
            Counter::AnswersGiven => self.answers_given,
            Counter::NewUsers => self.new_users,
            Counter::FaqSearches => self.faq_searches,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTimeSample {
    pub id: i64,
    pub ticket_id: i64,
    pub minutes: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseTimeFilter {
    pub ticket_ids: Option<Vec<i64>>,
    pub created_since: Option<String>,
}

// -- Timestamps --

/// Canonical persisted timestamp form: RFC 3339, UTC, whole seconds.
/// Fixed width, so lexical order matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a persisted timestamp. Accepts RFC 3339 and the bare
/// `YYYY-MM-DD HH:MM:SS` form SQLite's `CURRENT_TIMESTAMP` produces (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_only_known_values() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), status);
        }
        assert!(matches!(
            "resolved".parse::<TicketStatus>(),
            Err(Error::InvalidStatus(s)) if s == "resolved"
        ));
        assert!("Open".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn keywords_split_and_join() {
        let keywords = split_keywords(" python, import ,, error ");
        assert_eq!(keywords, vec!["python", "import", "error"]);
        assert_eq!(join_keywords(&keywords), "python,import,error");
        assert!(split_keywords("").is_empty());
    }

    #[test]
    fn timestamps_parse_both_forms() {
        let now = Utc::now();
        let formatted = format_timestamp(now);
        assert_eq!(parse_timestamp(&formatted).unwrap().timestamp(), now.timestamp());
        assert!(parse_timestamp("2024-05-01 10:30:00").is_some());
        assert!(parse_timestamp("not a timestamp").is_none());
    }
}
