use anyhow::anyhow;
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode, OptionalExtension, ToSql, params, params_from_iter};

use inventon_types::models::{
    Answer, AnswerFilter, Counter, DailyCounterSet, FaqEntry, FaqPatch, NewAnswer, NewFaqEntry,
    NewTicket, ResponseTimeFilter, ResponseTimeSample, Ticket, TicketDetails, TicketFilter,
    TicketStatus, User, UserProfile, join_keywords,
};
use inventon_types::{Error, RecordStore, Result};

use crate::SqliteStore;
use crate::models::{
    ANSWER_COLUMNS, FAQ_COLUMNS, RESPONSE_TIME_COLUMNS, TICKET_COLUMNS, USER_COLUMNS,
    answer_from_row, faq_from_row, response_time_from_row, ticket_from_row, user_from_row,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Typed errors raised inside a closure pass through; anything else means the
/// database itself failed.
fn store_err(e: anyhow::Error) -> Error {
    match e.downcast::<Error>() {
        Ok(err) => err,
        Err(e) => Error::unavailable(e),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
    )
}

impl RecordStore for SqliteStore {
    // -- Users --

    fn upsert_user(&self, profile: &UserProfile) -> Result<bool> {
        let now = inventon_types::models::format_timestamp(chrono::Utc::now());
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO users (user_id, username, display_name, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO NOTHING",
                params![
                    profile.user_id,
                    profile.username,
                    profile.display_name,
                    profile.is_admin,
                    now
                ],
            )?;
            if inserted == 0 {
                tx.execute(
                    "UPDATE users SET username = ?2, display_name = ?3, is_admin = ?4
                     WHERE user_id = ?1",
                    params![
                        profile.user_id,
                        profile.username,
                        profile.display_name,
                        profile.is_admin
                    ],
                )?;
            }
            tx.commit()?;
            Ok(inserted == 1)
        })
        .map_err(store_err)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
            Ok(conn.query_row(&sql, [user_id], user_from_row).optional()?)
        })
        .map_err(store_err)
    }

    fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(count.max(0) as u64)
        })
        .map_err(store_err)
    }

    // -- Tickets --

    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO questions (user_id, thread_id, title, os, programming_language,
                     error_message, purpose, code_snippet, log_files, screenshot_url,
                     attempted_solutions, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'open', ?12, ?12)",
                params![
                    ticket.owner_id,
                    ticket.channel_id,
                    ticket.title,
                    ticket.environment,
                    ticket.language,
                    ticket.error_text,
                    ticket.purpose,
                    ticket.code_snippet,
                    ticket.log_files,
                    ticket.screenshot_ref,
                    ticket.attempted_solutions,
                    ticket.created_at,
                ],
            );

            match result {
                Err(e) if is_unique_violation(&e) && channel_taken(conn, ticket.channel_id)? => {
                    return Err(Error::DuplicateKey(format!(
                        "channel {} is already bound to a ticket",
                        ticket.channel_id
                    ))
                    .into());
                }
                other => {
                    other?;
                }
            }

            let id = conn.last_insert_rowid();
            query_ticket(conn, "id", id)?.ok_or_else(|| anyhow!("ticket {} vanished after insert", id))
        })
        .map_err(store_err)
    }

    fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        self.with_conn(|conn| query_ticket(conn, "id", id)).map_err(store_err)
    }

    fn get_ticket_by_channel(&self, channel_id: i64) -> Result<Option<Ticket>> {
        self.with_conn(|conn| query_ticket(conn, "thread_id", channel_id))
            .map_err(store_err)
    }

    fn update_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
        updated_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE questions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), updated_at, id],
            )?;
            Ok(changed > 0)
        })
        .map_err(store_err)
    }

    fn update_ticket_details(
        &self,
        id: i64,
        details: &TicketDetails,
        updated_at: &str,
    ) -> Result<bool> {
        let mut sets = vec!["updated_at = ?1".to_string()];
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        values.push(Box::new(updated_at.to_string()));

        let fields = [
            ("code_snippet", &details.code_snippet),
            ("log_files", &details.log_files),
            ("screenshot_url", &details.screenshot_ref),
            ("attempted_solutions", &details.attempted_solutions),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                values.push(Box::new(value.clone()));
                sets.push(format!("{} = ?{}", column, values.len()));
            }
        }
        values.push(Box::new(id));
        let sql = format!(
            "UPDATE questions SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );

        self.with_conn(|conn| {
            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(changed > 0)
        })
        .map_err(store_err)
    }

    fn scan_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(owner_id) = filter.owner_id {
            values.push(Box::new(owner_id));
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(Box::new(status.as_str()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(since) = &filter.created_since {
            values.push(Box::new(since.clone()));
            clauses.push(format!("julianday(created_at) >= julianday(?{})", values.len()));
        }
        if let Some(since) = &filter.updated_since {
            values.push(Box::new(since.clone()));
            clauses.push(format!("julianday(updated_at) >= julianday(?{})", values.len()));
        }

        let mut sql = format!("SELECT {TICKET_COLUMNS} FROM questions");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY julianday(created_at) DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), ticket_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .map_err(store_err)
    }

    // -- Answers --

    fn insert_answer(&self, answer: NewAnswer) -> Result<Answer> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO answers (question_id, admin_id, answer_text, is_solution, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    answer.ticket_id,
                    answer.author_id,
                    answer.text,
                    answer.is_solution,
                    answer.created_at
                ],
            )?;
            Ok(Answer {
                id: conn.last_insert_rowid(),
                ticket_id: answer.ticket_id,
                author_id: answer.author_id,
                text: answer.text,
                is_solution: answer.is_solution,
                created_at: answer.created_at,
            })
        })
        .map_err(store_err)
    }

    fn scan_answers(&self, filter: &AnswerFilter) -> Result<Vec<Answer>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ticket_id) = filter.ticket_id {
            values.push(Box::new(ticket_id));
            clauses.push(format!("question_id = ?{}", values.len()));
        }
        if let Some(since) = &filter.created_since {
            values.push(Box::new(since.clone()));
            clauses.push(format!("julianday(created_at) >= julianday(?{})", values.len()));
        }

        let mut sql = format!("SELECT {ANSWER_COLUMNS} FROM answers");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY julianday(created_at) ASC, id ASC");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), answer_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .map_err(store_err)
    }

    // -- FAQ --

    fn insert_faq(&self, entry: NewFaqEntry) -> Result<FaqEntry> {
        let keywords = (!entry.keywords.is_empty()).then(|| join_keywords(&entry.keywords));
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO faq (question, answer, keywords, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.question_text,
                    entry.answer_text,
                    keywords,
                    entry.created_by,
                    entry.created_at
                ],
            )?;
            Ok(FaqEntry {
                id: conn.last_insert_rowid(),
                question_text: entry.question_text,
                answer_text: entry.answer_text,
                keywords: entry.keywords,
                created_by: entry.created_by,
                created_at: entry.created_at,
            })
        })
        .map_err(store_err)
    }

    fn get_faq(&self, id: i64) -> Result<Option<FaqEntry>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {FAQ_COLUMNS} FROM faq WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], faq_from_row).optional()?)
        })
        .map_err(store_err)
    }

    fn update_faq(&self, id: i64, patch: &FaqPatch) -> Result<bool> {
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(question) = &patch.question_text {
            values.push(Box::new(question.clone()));
            sets.push(format!("question = ?{}", values.len()));
        }
        if let Some(answer) = &patch.answer_text {
            values.push(Box::new(answer.clone()));
            sets.push(format!("answer = ?{}", values.len()));
        }
        if let Some(keywords) = &patch.keywords {
            let joined = (!keywords.is_empty()).then(|| join_keywords(keywords));
            values.push(Box::new(joined));
            sets.push(format!("keywords = ?{}", values.len()));
        }

        if sets.is_empty() {
            return self.get_faq(id).map(|entry| entry.is_some());
        }

        values.push(Box::new(id));
        let sql = format!("UPDATE faq SET {} WHERE id = ?{}", sets.join(", "), values.len());

        self.with_conn(|conn| {
            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(changed > 0)
        })
        .map_err(store_err)
    }

    fn delete_faq(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM faq WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
        .map_err(store_err)
    }

    fn list_faq(&self) -> Result<Vec<FaqEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FAQ_COLUMNS} FROM faq ORDER BY julianday(created_at) DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], faq_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .map_err(store_err)
    }

    // -- Daily counters --

    fn upsert_counter(&self, date: NaiveDate, counter: Counter, delta: i64) -> Result<i64> {
        // Column names come from a closed enum, never from callers.
        let column = counter.column();
        let sql = format!(
            "INSERT INTO daily_stats (date, {column}) VALUES (?1, ?2)
             ON CONFLICT(date) DO UPDATE SET {column} = {column} + excluded.{column}
             RETURNING {column}"
        );
        let day = date.format(DATE_FORMAT).to_string();

        self.with_conn(|conn| {
            let value: i64 = conn.query_row(&sql, params![day, delta], |r| r.get(0))?;
            Ok(value)
        })
        .map_err(store_err)
    }

    fn daily_counters(&self, since: NaiveDate) -> Result<Vec<DailyCounterSet>> {
        let since = since.format(DATE_FORMAT).to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date, questions_created, questions_solved, answers_given, new_users,
                        faq_searches
                 FROM daily_stats
                 WHERE date >= ?1
                 ORDER BY date",
            )?;
            let raw = stmt
                .query_map([since], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        [
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                        ],
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            raw.into_iter()
                .map(|(date, [created, solved, answers, users, searches])| -> anyhow::Result<_> {
                    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                        .map_err(|e| anyhow!("corrupt daily_stats date '{}': {}", date, e))?;
                    Ok(DailyCounterSet {
                        date,
                        questions_created: created,
                        questions_solved: solved,
                        answers_given: answers,
                        new_users: users,
                        faq_searches: searches,
                    })
                })
                .collect()
        })
        .map_err(store_err)
    }

    // -- Response times --

    fn insert_response_time(
        &self,
        ticket_id: i64,
        minutes: i64,
        created_at: &str,
    ) -> Result<ResponseTimeSample> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO response_times (question_id, response_time_minutes, created_at)
                 VALUES (?1, ?2, ?3)",
                params![ticket_id, minutes, created_at],
            )?;
            Ok(ResponseTimeSample {
                id: conn.last_insert_rowid(),
                ticket_id,
                minutes,
                created_at: created_at.to_string(),
            })
        })
        .map_err(store_err)
    }

    fn scan_response_times(&self, filter: &ResponseTimeFilter) -> Result<Vec<ResponseTimeSample>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ids) = &filter.ticket_ids {
            if ids.is_empty() {
                return Ok(vec![]);
            }
            let start = values.len() + 1;
            let placeholders: Vec<String> =
                (start..start + ids.len()).map(|i| format!("?{}", i)).collect();
            values.extend(ids.iter().map(|id| Box::new(*id) as Box<dyn ToSql>));
            clauses.push(format!("question_id IN ({})", placeholders.join(", ")));
        }
        if let Some(since) = &filter.created_since {
            values.push(Box::new(since.clone()));
            clauses.push(format!("julianday(created_at) >= julianday(?{})", values.len()));
        }

        let mut sql = format!("SELECT {RESPONSE_TIME_COLUMNS} FROM response_times");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY julianday(created_at) ASC, id ASC");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), response_time_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .map_err(store_err)
    }
}

fn query_ticket(conn: &Connection, column: &str, value: i64) -> anyhow::Result<Option<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM questions WHERE {column} = ?1");
    Ok(conn.query_row(&sql, [value], ticket_from_row).optional()?)
}

/// Distinguishes the unique-channel violation from other constraint failures
/// (e.g. a missing owner row).
fn channel_taken(conn: &Connection, channel_id: i64) -> anyhow::Result<bool> {
    Ok(query_ticket(conn, "thread_id", channel_id)?.is_some())
}
