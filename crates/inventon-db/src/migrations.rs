use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// `format_timestamp` output as an SQLite `strftime` pattern.
const CANONICAL: &str = "%Y-%m-%dT%H:%M:%SZ";

const TIMESTAMP_COLUMNS: &[(&str, &str)] = &[
    ("users", "created_at"),
    ("questions", "created_at"),
    ("questions", "updated_at"),
    ("answers", "created_at"),
    ("faq", "created_at"),
    ("response_times", "created_at"),
];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                user_id         INTEGER PRIMARY KEY,
                username        TEXT NOT NULL,
                display_name    TEXT,
                is_admin        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS questions (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(user_id),
                thread_id           INTEGER NOT NULL UNIQUE,
                title               TEXT NOT NULL,
                os                  TEXT NOT NULL,
                programming_language TEXT NOT NULL,
                error_message       TEXT NOT NULL,
                purpose             TEXT NOT NULL,
                code_snippet        TEXT,
                log_files           TEXT,
                screenshot_url      TEXT,
                attempted_solutions TEXT,
                status              TEXT NOT NULL DEFAULT 'open',
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_questions_user
                ON questions(user_id, created_at);

            CREATE TABLE IF NOT EXISTS answers (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL REFERENCES questions(id),
                admin_id    INTEGER NOT NULL,
                answer_text TEXT NOT NULL,
                is_solution INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_answers_question
                ON answers(question_id);

            CREATE TABLE IF NOT EXISTS faq (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                question    TEXT NOT NULL,
                answer      TEXT NOT NULL,
                keywords    TEXT,
                created_by  INTEGER,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_stats (
                date                TEXT PRIMARY KEY,
                questions_created   INTEGER NOT NULL DEFAULT 0,
                questions_solved    INTEGER NOT NULL DEFAULT 0,
                answers_given       INTEGER NOT NULL DEFAULT 0,
                new_users           INTEGER NOT NULL DEFAULT 0,
                faq_searches        INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS response_times (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id             INTEGER NOT NULL REFERENCES questions(id),
                response_time_minutes   INTEGER NOT NULL,
                created_at              TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (canonical timestamps)");
        let mut sql = String::new();
        for (table, column) in TIMESTAMP_COLUMNS {
            sql.push_str(&format!(
                "UPDATE {table} SET {column} = strftime('{CANONICAL}', {column})
                 WHERE julianday({column}) IS NOT NULL
                   AND {column} <> strftime('{CANONICAL}', {column});\n"
            ));
        }
        sql.push_str("INSERT INTO schema_version (version) VALUES (2);");
        conn.execute_batch(&sql)?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_version(conn: &Connection) -> i64 {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        assert_eq!(schema_version(&conn), 2);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn v2_rewrites_legacy_timestamps() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (user_id, username, created_at)
                 VALUES (1, 'a', '2026-10-18 12:00:00');
             INSERT INTO faq (question, answer, created_at) VALUES
                 ('q1', 'a1', '2026-10-18T14:30:00.250+02:00'),
                 ('q2', 'a2', '2026-10-18T09:00:00Z'),
                 ('q3', 'a3', 'not a date');
             DELETE FROM schema_version WHERE version = 2;",
        )
        .unwrap();

        run(&conn).unwrap();

        let user: String = conn
            .query_row("SELECT created_at FROM users WHERE user_id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(user, "2026-10-18T12:00:00Z");

        let mut stmt = conn.prepare("SELECT created_at FROM faq ORDER BY id").unwrap();
        let faq: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(faq, vec!["2026-10-18T12:30:00Z", "2026-10-18T09:00:00Z", "not a date"]);
        assert_eq!(schema_version(&conn), 2);
    }
}
