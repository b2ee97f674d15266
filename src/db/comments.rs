use rusqlite::{params, Connection, Row};

use super::models::{Author, Comment};
use super::{now, parse_timestamp};

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let created: String = row.get(5)?;
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        text: row.get(2)?,
        author: Author {
            id: row.get(3)?,
            username: row.get(4)?,
        },
        created: parse_timestamp(5, &created)?,
    })
}

pub fn create(conn: &Connection, post_id: i64, author_id: i64, text: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, text, created) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, author_id, text, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on a post, oldest first.
pub fn for_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.text, u.id, u.username, c.created
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created ASC, c.id ASC",
    )?;
    let comments = stmt
        .query_map(params![post_id], map_comment)?
        .collect::<Result<_, _>>()?;
    Ok(comments)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
