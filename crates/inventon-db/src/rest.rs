//! Remote record store speaking the PostgREST dialect (Supabase and friends).
//!
//! Tables and columns are identical to the SQLite schema in `migrations`, so
//! callers observe the same records whichever backend is configured. The
//! remote database must expose one function for atomic counter increments:
//!
//! ```sql
//! create function increment_daily_stat(p_date date, p_field text, p_delta int)
//! returns bigint language plpgsql as $$
//! declare new_value bigint;
//! begin
//!   execute format(
//!     'insert into daily_stats (date, %1$I) values ($1, $2)
//!      on conflict (date) do update set %1$I = daily_stats.%1$I + excluded.%1$I
//!      returning %1$I', p_field)
//!   into new_value using p_date, p_delta;
//!   return new_value;
//! end $$;
//! ```
//!
//! Timestamp columns are `timestamptz`, so `order` and `gte` compare instants
//! whatever offset or precision a row was written with.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use inventon_types::models::{
    Answer, AnswerFilter, Counter, DailyCounterSet, FaqEntry, FaqPatch, NewAnswer, NewFaqEntry,
    NewTicket, ResponseTimeFilter, ResponseTimeSample, Ticket, TicketDetails, TicketFilter,
    TicketStatus, User, UserProfile, join_keywords, split_keywords,
};
use inventon_types::{Error, RecordStore, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = format!("{}/rest/v1", url.trim_end_matches('/'));
        debug!("Remote record store at {}", base_url);
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let req = self.authed(self.client.get(self.table_url(table))).query(query);
        decode(send(req)?)
    }

    fn insert<T: DeserializeOwned>(&self, table: &str, body: &Value) -> Result<T> {
        let req = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(body);
        first(decode(send(req)?)?, table)
    }

    fn patch(&self, table: &str, query: &[(&str, String)], body: &Value) -> Result<bool> {
        let req = self
            .authed(self.client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(query)
            .json(body);
        let rows: Vec<Value> = decode(send(req)?)?;
        Ok(!rows.is_empty())
    }
}

impl RecordStore for RestStore {
    // -- Users --

    fn upsert_user(&self, profile: &UserProfile) -> Result<bool> {
        let now = inventon_types::models::format_timestamp(chrono::Utc::now());
        let req = self
            .authed(self.client.post(self.table_url("users")))
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .query(&[("on_conflict", "user_id")])
            .json(&json!({
                "user_id": profile.user_id,
                "username": profile.username,
                "display_name": profile.display_name,
                "is_admin": profile.is_admin,
                "created_at": now,
            }));
        let inserted: Vec<Value> = decode(send(req)?)?;
        if !inserted.is_empty() {
            return Ok(true);
        }

        self.patch(
            "users",
            &[("user_id", eq(profile.user_id))],
            &json!({
                "username": profile.username,
                "display_name": profile.display_name,
                "is_admin": profile.is_admin,
            }),
        )?;
        Ok(false)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let rows: Vec<UserRow> = self.select("users", &[("user_id", eq(user_id))])?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    fn count_users(&self) -> Result<u64> {
        let req = self
            .authed(self.client.get(self.table_url("users")))
            .header("Prefer", "count=exact")
            .query(&[("select", "user_id"), ("limit", "1")]);
        let resp = send(req)?;
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| Error::unavailable("missing Content-Range total on count"))
    }

    // -- Tickets --

    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        let body = json!({
            "user_id": ticket.owner_id,
            "thread_id": ticket.channel_id,
            "title": ticket.title,
            "os": ticket.environment,
            "programming_language": ticket.language,
            "error_message": ticket.error_text,
            "purpose": ticket.purpose,
            "code_snippet": ticket.code_snippet,
            "log_files": ticket.log_files,
            "screenshot_url": ticket.screenshot_ref,
            "attempted_solutions": ticket.attempted_solutions,
            "status": TicketStatus::Open.as_str(),
            "created_at": ticket.created_at,
            "updated_at": ticket.created_at,
        });
        let row: QuestionRow = self.insert("questions", &body).map_err(|e| match e {
            Error::DuplicateKey(_) => Error::DuplicateKey(format!(
                "channel {} is already bound to a ticket",
                ticket.channel_id
            )),
            other => other,
        })?;
        row.try_into()
    }

    fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let rows: Vec<QuestionRow> = self.select("questions", &[("id", eq(id))])?;
        rows.into_iter().next().map(TryInto::try_into).transpose()
    }

    fn get_ticket_by_channel(&self, channel_id: i64) -> Result<Option<Ticket>> {
        let rows: Vec<QuestionRow> = self.select("questions", &[("thread_id", eq(channel_id))])?;
        rows.into_iter().next().map(TryInto::try_into).transpose()
    }

    fn update_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
        updated_at: &str,
    ) -> Result<bool> {
        self.patch(
            "questions",
            &[("id", eq(id))],
            &json!({ "status": status.as_str(), "updated_at": updated_at }),
        )
    }

    fn update_ticket_details(
        &self,
        id: i64,
        details: &TicketDetails,
        updated_at: &str,
    ) -> Result<bool> {
        let mut body = Map::new();
        body.insert("updated_at".into(), json!(updated_at));
        let fields = [
            ("code_snippet", &details.code_snippet),
            ("log_files", &details.log_files),
            ("screenshot_url", &details.screenshot_ref),
            ("attempted_solutions", &details.attempted_solutions),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                body.insert(column.into(), json!(value));
            }
        }
        self.patch("questions", &[("id", eq(id))], &Value::Object(body))
    }

    fn scan_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let mut query = vec![("order", "created_at.desc,id.desc".to_string())];
        if let Some(owner_id) = filter.owner_id {
            query.push(("user_id", eq(owner_id)));
        }
        if let Some(status) = filter.status {
            query.push(("status", eq(status.as_str())));
        }
        if let Some(since) = &filter.created_since {
            query.push(("created_at", gte(since)));
        }
        if let Some(since) = &filter.updated_since {
            query.push(("updated_at", gte(since)));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }

        let rows: Vec<QuestionRow> = self.select("questions", &query)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    // -- Answers --

    fn insert_answer(&self, answer: NewAnswer) -> Result<Answer> {
        let row: AnswerRow = self.insert(
            "answers",
            &json!({
                "question_id": answer.ticket_id,
                "admin_id": answer.author_id,
                "answer_text": answer.text,
                "is_solution": answer.is_solution,
                "created_at": answer.created_at,
            }),
        )?;
        Ok(row.into())
    }

    fn scan_answers(&self, filter: &AnswerFilter) -> Result<Vec<Answer>> {
        let mut query = vec![("order", "created_at.asc,id.asc".to_string())];
        if let Some(ticket_id) = filter.ticket_id {
            query.push(("question_id", eq(ticket_id)));
        }
        if let Some(since) = &filter.created_since {
            query.push(("created_at", gte(since)));
        }
        let rows: Vec<AnswerRow> = self.select("answers", &query)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // -- FAQ --

    fn insert_faq(&self, entry: NewFaqEntry) -> Result<FaqEntry> {
        let keywords = (!entry.keywords.is_empty()).then(|| join_keywords(&entry.keywords));
        let row: FaqRow = self.insert(
            "faq",
            &json!({
                "question": entry.question_text,
                "answer": entry.answer_text,
                "keywords": keywords,
                "created_by": entry.created_by,
                "created_at": entry.created_at,
            }),
        )?;
        Ok(row.into())
    }

    fn get_faq(&self, id: i64) -> Result<Option<FaqEntry>> {
        let rows: Vec<FaqRow> = self.select("faq", &[("id", eq(id))])?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    fn update_faq(&self, id: i64, patch: &FaqPatch) -> Result<bool> {
        let mut body = Map::new();
        if let Some(question) = &patch.question_text {
            body.insert("question".into(), json!(question));
        }
        if let Some(answer) = &patch.answer_text {
            body.insert("answer".into(), json!(answer));
        }
        if let Some(keywords) = &patch.keywords {
            let joined = (!keywords.is_empty()).then(|| join_keywords(keywords));
            body.insert("keywords".into(), json!(joined));
        }
        if body.is_empty() {
            return self.get_faq(id).map(|entry| entry.is_some());
        }
        self.patch("faq", &[("id", eq(id))], &Value::Object(body))
    }

    fn delete_faq(&self, id: i64) -> Result<bool> {
        let req = self
            .authed(self.client.delete(self.table_url("faq")))
            .header("Prefer", "return=representation")
            .query(&[("id", eq(id))]);
        let rows: Vec<Value> = decode(send(req)?)?;
        Ok(!rows.is_empty())
    }

    fn list_faq(&self) -> Result<Vec<FaqEntry>> {
        let rows: Vec<FaqRow> =
            self.select("faq", &[("order", "created_at.desc,id.desc".to_string())])?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // -- Daily counters --

    fn upsert_counter(&self, date: NaiveDate, counter: Counter, delta: i64) -> Result<i64> {
        let req = self
            .authed(
                self.client
                    .post(format!("{}/rpc/increment_daily_stat", self.base_url)),
            )
            .json(&json!({
                "p_date": date.format(DATE_FORMAT).to_string(),
                "p_field": counter.column(),
                "p_delta": delta,
            }));
        decode(send(req)?)
    }

    fn daily_counters(&self, since: NaiveDate) -> Result<Vec<DailyCounterSet>> {
        let rows: Vec<DailyStatsRow> = self.select(
            "daily_stats",
            &[
                ("date", gte(&since.format(DATE_FORMAT).to_string())),
                ("order", "date.asc".to_string()),
            ],
        )?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    // -- Response times --

    fn insert_response_time(
        &self,
        ticket_id: i64,
        minutes: i64,
        created_at: &str,
    ) -> Result<ResponseTimeSample> {
        let row: ResponseTimeRow = self.insert(
            "response_times",
            &json!({
                "question_id": ticket_id,
                "response_time_minutes": minutes,
                "created_at": created_at,
            }),
        )?;
        Ok(row.into())
    }

    fn scan_response_times(&self, filter: &ResponseTimeFilter) -> Result<Vec<ResponseTimeSample>> {
        let mut query = vec![("order", "created_at.asc,id.asc".to_string())];
        if let Some(ids) = &filter.ticket_ids {
            if ids.is_empty() {
                return Ok(vec![]);
            }
            query.push(("question_id", in_list(ids)));
        }
        if let Some(since) = &filter.created_since {
            query.push(("created_at", gte(since)));
        }
        let rows: Vec<ResponseTimeRow> = self.select("response_times", &query)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Transport helpers --

fn send(req: RequestBuilder) -> Result<Response> {
    let resp = req.send().map_err(|e| {
        warn!("Remote store request failed: {}", e);
        Error::unavailable(e)
    })?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    if status == StatusCode::CONFLICT && is_unique_violation(&body) {
        return Err(Error::DuplicateKey(body));
    }
    warn!("Remote store returned {}: {}", status, body);
    Err(Error::unavailable(format!("remote store returned {}: {}", status, body)))
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json::<T>().map_err(Error::unavailable)
}

fn first<T>(rows: Vec<T>, table: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::unavailable(format!("insert into {} returned no row", table)))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

fn gte(value: &str) -> String {
    format!("gte.{}", value)
}

fn in_list(ids: &[i64]) -> String {
    let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
    format!("in.({})", ids.join(","))
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`.
fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.parse().ok()
}

fn is_unique_violation(body: &str) -> bool {
    #[derive(Deserialize)]
    struct PgError {
        code: Option<String>,
    }
    serde_json::from_str::<PgError>(body)
        .ok()
        .and_then(|e| e.code)
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

// -- Wire rows --

#[derive(Deserialize)]
struct UserRow {
    user_id: i64,
    username: String,
    display_name: Option<String>,
    #[serde(default)]
    is_admin: bool,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
struct QuestionRow {
    id: i64,
    user_id: i64,
    thread_id: i64,
    title: String,
    os: String,
    programming_language: String,
    error_message: String,
    purpose: String,
    code_snippet: Option<String>,
    log_files: Option<String>,
    screenshot_url: Option<String>,
    attempted_solutions: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<QuestionRow> for Ticket {
    type Error = Error;

    fn try_from(row: QuestionRow) -> Result<Self> {
        let status = row
            .status
            .parse::<TicketStatus>()
            .map_err(|e| Error::unavailable(format!("corrupt ticket {}: {}", row.id, e)))?;
        Ok(Ticket {
            id: row.id,
            owner_id: row.user_id,
            channel_id: row.thread_id,
            title: row.title,
            environment: row.os,
            language: row.programming_language,
            error_text: row.error_message,
            purpose: row.purpose,
            code_snippet: row.code_snippet,
            log_files: row.log_files,
            screenshot_ref: row.screenshot_url,
            attempted_solutions: row.attempted_solutions,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Deserialize)]
struct AnswerRow {
    id: i64,
    question_id: i64,
    admin_id: i64,
    answer_text: String,
    is_solution: bool,
    created_at: String,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            id: row.id,
            ticket_id: row.question_id,
            author_id: row.admin_id,
            text: row.answer_text,
            is_solution: row.is_solution,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
struct FaqRow {
    id: i64,
    question: String,
    answer: String,
    keywords: Option<String>,
    created_by: Option<i64>,
    created_at: String,
}

impl From<FaqRow> for FaqEntry {
    fn from(row: FaqRow) -> Self {
        FaqEntry {
            id: row.id,
            question_text: row.question,
            answer_text: row.answer,
            keywords: row.keywords.as_deref().map(split_keywords).unwrap_or_default(),
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
struct DailyStatsRow {
    date: String,
    #[serde(default)]
    questions_created: i64,
    #[serde(default)]
    questions_solved: i64,
    #[serde(default)]
    answers_given: i64,
    #[serde(default)]
    new_users: i64,
    #[serde(default)]
    faq_searches: i64,
}

impl TryFrom<DailyStatsRow> for DailyCounterSet {
    type Error = Error;

    fn try_from(row: DailyStatsRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
            .map_err(|e| Error::unavailable(format!("corrupt daily_stats date '{}': {}", row.date, e)))?;
        Ok(DailyCounterSet {
            date,
            questions_created: row.questions_created,
            questions_solved: row.questions_solved,
            answers_given: row.answers_given,
            new_users: row.new_users,
            faq_searches: row.faq_searches,
        })
    }
}

#[derive(Deserialize)]
struct ResponseTimeRow {
    id: i64,
    question_id: i64,
    response_time_minutes: i64,
    created_at: String,
}

impl From<ResponseTimeRow> for ResponseTimeSample {
    fn from(row: ResponseTimeRow) -> Self {
        ResponseTimeSample {
            id: row.id,
            ticket_id: row.question_id,
            minutes: row.response_time_minutes,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total_parses_counts() {
        assert_eq!(content_range_total("0-0/42"), Some(42));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-9/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[test]
    fn unique_violation_detected_from_error_body() {
        assert!(is_unique_violation(
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#
        ));
        assert!(!is_unique_violation(r#"{"code":"23503","message":"foreign key"}"#));
        assert!(!is_unique_violation("not json"));
    }

    #[test]
    fn filter_operators_render_postgrest_syntax() {
        assert_eq!(eq(5), "eq.5");
        assert_eq!(eq("solved"), "eq.solved");
        assert_eq!(gte("2024-01-01"), "gte.2024-01-01");
        assert_eq!(in_list(&[1, 2, 3]), "in.(1,2,3)");
    }

    #[test]
    fn rows_decode_into_models() {
        let row: QuestionRow = serde_json::from_value(json!({
            "id": 3, "user_id": 1, "thread_id": 99, "title": "t", "os": "Linux",
            "programming_language": "Python", "error_message": "TypeError",
            "purpose": "parse file", "code_snippet": null, "log_files": null,
            "screenshot_url": null, "attempted_solutions": null, "status": "in_progress",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let ticket: Ticket = row.try_into().unwrap();
        assert_eq!(ticket.channel_id, 99);
        assert_eq!(ticket.status, TicketStatus::InProgress);

        let faq: FaqEntry = serde_json::from_value::<FaqRow>(json!({
            "id": 1, "question": "q", "answer": "a", "keywords": "pip,install",
            "created_by": null, "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
        .into();
        assert_eq!(faq.keywords, vec!["pip", "install"]);
    }

    #[test]
    fn base_url_trims_trailing_slash() {
        let store = RestStore::new("https://db.example.com/", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(store.table_url("faq"), "https://db.example.com/rest/v1/faq");
    }

    mod against_server {
        use super::*;
        use mockito::{Matcher, Server, ServerGuard};

        fn store(server: &ServerGuard) -> RestStore {
            RestStore::new(&server.url(), "anon-key", Duration::from_secs(5)).unwrap()
        }

        fn profile() -> UserProfile {
            UserProfile {
                user_id: 7,
                username: "ferris".into(),
                display_name: Some("Ferris".into()),
                is_admin: false,
            }
        }

        fn user_row() -> String {
            json!([{
                "user_id": 7, "username": "ferris", "display_name": "Ferris",
                "is_admin": false, "created_at": "2026-10-18T12:00:00Z"
            }])
            .to_string()
        }

        fn new_ticket() -> NewTicket {
            NewTicket {
                owner_id: 7,
                channel_id: 42,
                title: "[Python] parse file".into(),
                environment: "Linux".into(),
                language: "Python".into(),
                error_text: "TypeError".into(),
                purpose: "parse file".into(),
                code_snippet: None,
                log_files: None,
                screenshot_ref: None,
                attempted_solutions: None,
                created_at: "2026-10-18T12:00:00Z".into(),
            }
        }

        #[test]
        fn duplicate_channel_maps_to_duplicate_key() {
            let mut server = Server::new();
            let mock = server
                .mock("POST", "/rest/v1/questions")
                .match_header("apikey", "anon-key")
                .match_header("authorization", "Bearer anon-key")
                .match_body(Matcher::PartialJson(json!({ "thread_id": 42, "status": "open" })))
                .with_status(409)
                .with_header("content-type", "application/json")
                .with_body(r#"{"code":"23505","message":"duplicate key value"}"#)
                .create();

            let err = store(&server).insert_ticket(new_ticket()).unwrap_err();
            assert!(matches!(&err, Error::DuplicateKey(msg) if msg.contains("channel 42")));
            mock.assert();
        }

        #[test]
        fn other_conflicts_and_outages_are_unavailable() {
            let mut server = Server::new();
            let _fk = server
                .mock("POST", "/rest/v1/questions")
                .with_status(409)
                .with_body(r#"{"code":"23503","message":"violates foreign key constraint"}"#)
                .create();
            assert!(matches!(
                store(&server).insert_ticket(new_ticket()),
                Err(Error::StoreUnavailable(_))
            ));

            let _down = server
                .mock("GET", "/rest/v1/faq")
                .match_query(Matcher::Any)
                .with_status(503)
                .create();
            assert!(matches!(store(&server).list_faq(), Err(Error::StoreUnavailable(_))));
        }

        #[test]
        fn upsert_user_reports_created_when_row_is_returned() {
            let mut server = Server::new();
            let insert = server
                .mock("POST", "/rest/v1/users")
                .match_query(Matcher::UrlEncoded("on_conflict".into(), "user_id".into()))
                .match_header("prefer", Matcher::Regex("resolution=ignore-duplicates".into()))
                .match_body(Matcher::PartialJson(json!({ "user_id": 7, "username": "ferris" })))
                .with_status(201)
                .with_body(user_row())
                .create();
            let update = server
                .mock("PATCH", "/rest/v1/users")
                .match_query(Matcher::Any)
                .expect(0)
                .create();

            assert!(store(&server).upsert_user(&profile()).unwrap());
            insert.assert();
            update.assert();
        }

        #[test]
        fn upsert_user_updates_profile_when_duplicate_is_ignored() {
            let mut server = Server::new();
            let insert = server
                .mock("POST", "/rest/v1/users")
                .match_query(Matcher::Any)
                .with_status(201)
                .with_body("[]")
                .create();
            let update = server
                .mock("PATCH", "/rest/v1/users")
                .match_query(Matcher::UrlEncoded("user_id".into(), "eq.7".into()))
                .match_body(Matcher::Json(json!({
                    "username": "ferris",
                    "display_name": "Ferris",
                    "is_admin": false,
                })))
                .with_status(200)
                .with_body(user_row())
                .create();

            assert!(!store(&server).upsert_user(&profile()).unwrap());
            insert.assert();
            update.assert();
        }

        #[test]
        fn counter_increment_reads_rpc_scalar() {
            let mut server = Server::new();
            let rpc = server
                .mock("POST", "/rest/v1/rpc/increment_daily_stat")
                .match_body(Matcher::Json(json!({
                    "p_date": "2026-10-18",
                    "p_field": "faq_searches",
                    "p_delta": 1,
                })))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body("3")
                .create();

            let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
            let value = store(&server)
                .upsert_counter(date, Counter::FaqSearches, 1)
                .unwrap();
            assert_eq!(value, 3);
            rpc.assert();
        }

        #[test]
        fn count_users_reads_content_range() {
            let mut server = Server::new();
            let _count = server
                .mock("GET", "/rest/v1/users")
                .match_query(Matcher::Any)
                .match_header("prefer", "count=exact")
                .with_status(206)
                .with_header("content-range", "0-0/12")
                .with_body(r#"[{"user_id":1}]"#)
                .create();
            assert_eq!(store(&server).count_users().unwrap(), 12);
        }
    }
}
