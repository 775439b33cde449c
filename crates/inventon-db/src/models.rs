//! Row decoders. Column lists here must match the SELECTs in `queries`.

use rusqlite::Row;

use inventon_types::models::{
    Answer, FaqEntry, ResponseTimeSample, Ticket, TicketStatus, User, split_keywords,
};

pub const USER_COLUMNS: &str = "user_id, username, display_name, is_admin, created_at";

pub const TICKET_COLUMNS: &str = "id, user_id, thread_id, title, os, programming_language, \
     error_message, purpose, code_snippet, log_files, screenshot_url, attempted_solutions, \
     status, created_at, updated_at";

pub const ANSWER_COLUMNS: &str = "id, question_id, admin_id, answer_text, is_solution, created_at";

pub const FAQ_COLUMNS: &str = "id, question, answer, keywords, created_by, created_at";

pub const RESPONSE_TIME_COLUMNS: &str = "id, question_id, response_time_minutes, created_at";

pub fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn ticket_from_row(row: &Row) -> rusqlite::Result<Ticket> {
    let status: String = row.get(12)?;
    let status = status.parse::<TicketStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Ticket {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        channel_id: row.get(2)?,
        title: row.get(3)?,
        environment: row.get(4)?,
        language: row.get(5)?,
        error_text: row.get(6)?,
        purpose: row.get(7)?,
        code_snippet: row.get(8)?,
        log_files: row.get(9)?,
        screenshot_ref: row.get(10)?,
        attempted_solutions: row.get(11)?,
        status,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

pub fn answer_from_row(row: &Row) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        author_id: row.get(2)?,
        text: row.get(3)?,
        is_solution: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn faq_from_row(row: &Row) -> rusqlite::Result<FaqEntry> {
    let keywords: Option<String> = row.get(3)?;
    Ok(FaqEntry {
        id: row.get(0)?,
        question_text: row.get(1)?,
        answer_text: row.get(2)?,
        keywords: keywords.as_deref().map(split_keywords).unwrap_or_default(),
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn response_time_from_row(row: &Row) -> rusqlite::Result<ResponseTimeSample> {
    Ok(ResponseTimeSample {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        minutes: row.get(2)?,
        created_at: row.get(3)?,
    })
}
