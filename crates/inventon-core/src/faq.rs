//! FAQ storage and keyword lookup.
//!
//! Matching is plain case-insensitive substring search over the question,
//! the answer and the comma-joined keywords. There is no relevance ranking.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use inventon_types::models::{
    Counter, FaqEntry, FaqPatch, NewFaqEntry, format_timestamp, split_keywords,
};
use inventon_types::{Error, RecordStore, Result};

use crate::stats::StatisticsAggregator;

/// Substrings that mark a chat message as a question worth answering from the FAQ.
pub const QUESTION_INDICATORS: &[&str] = &[
    "?", "how", "why", "what", "when", "where", "help", "problem", "error", "어떻게", "왜", "뭐",
    "언제", "어디서", "도움", "문제", "오류", "에러",
];

const SUGGEST_KEYWORDS: usize = 3;
const SUGGEST_RESULTS: usize = 2;
const MIN_TOKEN_CHARS: usize = 3;

#[derive(Clone)]
pub struct FaqIndex {
    store: Arc<dyn RecordStore>,
    stats: StatisticsAggregator,
}

impl FaqIndex {
    pub fn new(store: Arc<dyn RecordStore>, stats: StatisticsAggregator) -> Self {
        Self { store, stats }
    }

    pub fn add(
        &self,
        question: &str,
        answer: &str,
        keywords: Vec<String>,
        created_by: Option<i64>,
    ) -> Result<FaqEntry> {
        require("question", question)?;
        require("answer", answer)?;

        let entry = self.store.insert_faq(NewFaqEntry {
            question_text: question.trim().to_string(),
            answer_text: answer.trim().to_string(),
            keywords,
            created_by,
            created_at: format_timestamp(Utc::now()),
        })?;
        info!("FAQ {} added", entry.id);
        Ok(entry)
    }

    pub fn update(&self, id: i64, patch: FaqPatch) -> Result<FaqEntry> {
        if patch.is_empty() {
            return Err(Error::validation("nothing to update"));
        }
        if let Some(question) = &patch.question_text {
            require("question", question)?;
        }
        if let Some(answer) = &patch.answer_text {
            require("answer", answer)?;
        }

        if !self.store.update_faq(id, &patch)? {
            return Err(Error::not_found("faq", id));
        }
        info!("FAQ {} updated", id);
        self.require_entry(id)
    }

    /// Returns the entry as it was before removal.
    pub fn delete(&self, id: i64) -> Result<FaqEntry> {
        let entry = self.require_entry(id)?;
        if !self.store.delete_faq(id)? {
            return Err(Error::not_found("faq", id));
        }
        info!("FAQ {} deleted", id);
        Ok(entry)
    }

    pub fn get(&self, id: i64) -> Result<Option<FaqEntry>> {
        self.store.get_faq(id)
    }

    /// Newest first.
    pub fn list_all(&self) -> Result<Vec<FaqEntry>> {
        self.store.list_faq()
    }

    /// User-initiated search. Counts towards the daily `faq_searches` total.
    pub fn search(&self, keyword: &str) -> Result<Vec<FaqEntry>> {
        require("keyword", keyword)?;
        let matches = self.lookup(keyword)?;
        self.stats.increment(Counter::FaqSearches, 1)?;
        Ok(matches)
    }

    /// Up to two entries matching the first three keywords of `message`, or
    /// nothing when the message does not read like a question.
    pub fn auto_suggest(&self, message: &str) -> Result<Vec<FaqEntry>> {
        let message = message.to_lowercase();
        if !contains_indicator(&message) {
            return Ok(vec![]);
        }

        let keywords = suggestion_keywords(&message);
        if keywords.is_empty() {
            return Ok(vec![]);
        }
        debug!("Auto-suggest keywords: {:?}", keywords);

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for keyword in &keywords {
            for entry in self.lookup(keyword)? {
                if seen.insert(entry.id) {
                    suggestions.push(entry);
                }
            }
        }
        suggestions.truncate(SUGGEST_RESULTS);
        Ok(suggestions)
    }

    fn lookup(&self, keyword: &str) -> Result<Vec<FaqEntry>> {
        let needle = keyword.trim().to_lowercase();
        let entries = self.store.list_faq()?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.question_text.to_lowercase().contains(&needle)
                    || entry.answer_text.to_lowercase().contains(&needle)
                    || entry.keywords_joined().to_lowercase().contains(&needle)
            })
            .collect())
    }

    fn require_entry(&self, id: i64) -> Result<FaqEntry> {
        self.store
            .get_faq(id)?
            .ok_or(Error::not_found("faq", id))
    }
}

/// Splits a comma-separated keyword list, dropping blanks.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    split_keywords(raw)
}

/// Case-insensitive; takes raw message text.
pub fn has_question_indicator(message: &str) -> bool {
    contains_indicator(&message.to_lowercase())
}

/// `message` must already be lower-cased.
fn contains_indicator(message: &str) -> bool {
    QUESTION_INDICATORS
        .iter()
        .any(|indicator| message.contains(*indicator))
}

/// First three distinct word tokens longer than two characters.
fn suggestion_keywords(message: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let tokens = message
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS);
    for token in tokens {
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
        if keywords.len() == SUGGEST_KEYWORDS {
            break;
        }
    }
    keywords
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}
