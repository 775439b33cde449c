use std::time::Duration;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{
    Answer, AnswerFilter, Counter, DailyCounterSet, FaqEntry, FaqPatch, NewAnswer, NewFaqEntry,
    NewTicket, ResponseTimeFilter, ResponseTimeSample, Ticket, TicketDetails, TicketFilter,
    TicketStatus, User, UserProfile,
};

/// Durable storage for users, tickets, answers, FAQ entries, daily counters
/// and response-time samples.
///
/// Implementations must keep two operations atomic without any lock held by
/// the caller:
/// - [`upsert_counter`](RecordStore::upsert_counter) is a single
///   insert-or-add, never read-modify-write.
/// - [`insert_ticket`](RecordStore::insert_ticket) rejects a second ticket on
///   the same channel with `Error::DuplicateKey` instead of overwriting.
///
/// Point lookups return `Ok(None)` for missing records. Updates and deletes
/// return `Ok(false)` when nothing matched.
pub trait RecordStore: Send + Sync {
    // -- Users --

    /// Insert-or-replace. Returns `true` when the user did not exist before.
    fn upsert_user(&self, profile: &UserProfile) -> Result<bool>;
    fn get_user(&self, user_id: i64) -> Result<Option<User>>;
    fn count_users(&self) -> Result<u64>;

    // -- Tickets --

    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket>;
    fn get_ticket(&self, id: i64) -> Result<Option<Ticket>>;
    fn get_ticket_by_channel(&self, channel_id: i64) -> Result<Option<Ticket>>;
    fn update_ticket_status(&self, id: i64, status: TicketStatus, updated_at: &str)
    -> Result<bool>;
    fn update_ticket_details(
        &self,
        id: i64,
        details: &TicketDetails,
        updated_at: &str,
    ) -> Result<bool>;
    /// Matching tickets, newest first.
    fn scan_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>>;

    // -- Answers --

    fn insert_answer(&self, answer: NewAnswer) -> Result<Answer>;
    /// Matching answers, oldest first.
    fn scan_answers(&self, filter: &AnswerFilter) -> Result<Vec<Answer>>;

    // -- FAQ --

    fn insert_faq(&self, entry: NewFaqEntry) -> Result<FaqEntry>;
    fn get_faq(&self, id: i64) -> Result<Option<FaqEntry>>;
    fn update_faq(&self, id: i64, patch: &FaqPatch) -> Result<bool>;
    fn delete_faq(&self, id: i64) -> Result<bool>;
    /// All entries, newest first.
    fn list_faq(&self) -> Result<Vec<FaqEntry>>;

    // -- Daily counters --

    /// Adds `delta` to `counter` for `date`, creating the day on first use.
    /// Returns the counter's new value.
    fn upsert_counter(&self, date: NaiveDate, counter: Counter, delta: i64) -> Result<i64>;
    /// Counter rows on or after `since`, oldest first.
    fn daily_counters(&self, since: NaiveDate) -> Result<Vec<DailyCounterSet>>;

    // -- Response times --

    fn insert_response_time(
        &self,
        ticket_id: i64,
        minutes: i64,
        created_at: &str,
    ) -> Result<ResponseTimeSample>;
    fn scan_response_times(&self, filter: &ResponseTimeFilter) -> Result<Vec<ResponseTimeSample>>;
}

/// Which backend holds the records. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Local SQLite file.
    Sqlite { path: String },
    /// Remote PostgREST-compatible API (e.g. Supabase).
    Remote {
        url: String,
        api_key: String,
        timeout: Duration,
    },
}
