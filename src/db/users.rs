use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::User;
use super::{now, parse_timestamp};

const USER_COLUMNS: &str = "id, username, created";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created: String = row.get(2)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created: parse_timestamp(2, &created)?,
    })
}

pub fn create(
    conn: &Connection,
    username: &str,
    password_hash: Option<&str>,
) -> rusqlite::Result<User> {
    conn.execute(
        "INSERT INTO users (username, password_hash, created) VALUES (?1, ?2, ?3)",
        params![username, password_hash, now()],
    )?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        map_user,
    )
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        map_user,
    )
    .optional()
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        params![username],
        map_user,
    )
    .optional()
}

/// Stored bcrypt hash for a username, if the account exists and has one.
pub fn password_hash(conn: &Connection, username: &str) -> rusqlite::Result<Option<(i64, String)>> {
    let row: Option<(i64, Option<String>)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row.and_then(|(id, hash)| hash.map(|hash| (id, hash))))
}

/// Delete a user together with their posts, comments, follows and sessions.
pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
