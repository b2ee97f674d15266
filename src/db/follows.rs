use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Author, Follow};
use super::{now, parse_timestamp};

/// Ensure `user_id` follows `author_id`. Returns whether a new record was created.
///
/// Following yourself is a silent no-op. The `(user_id, author_id)` pair is
/// unique at the table level, so repeated or concurrent calls never duplicate.
pub fn follow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    if user_id == author_id {
        return Ok(false);
    }
    let rows = conn.execute(
        "INSERT INTO follows (user_id, author_id, created) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, author_id) DO NOTHING",
        params![user_id, author_id, now()],
    )?;
    Ok(rows > 0)
}

/// Remove the follow record if there is one. Returns whether anything was deleted.
pub fn unfollow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

pub fn is_following(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
}

pub fn find(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<Option<Follow>> {
    conn.query_row(
        "SELECT f.id, f.created, f.user_id, fu.username, f.author_id, au.username
         FROM follows f
         JOIN users fu ON fu.id = f.user_id
         JOIN users au ON au.id = f.author_id
         WHERE f.user_id = ?1 AND f.author_id = ?2",
        params![user_id, author_id],
        |row| {
            let created: String = row.get(1)?;
            Ok(Follow {
                id: row.get(0)?,
                created: parse_timestamp(1, &created)?,
                user: Author {
                    id: row.get(2)?,
                    username: row.get(3)?,
                },
                author: Author {
                    id: row.get(4)?,
                    username: row.get(5)?,
                },
            })
        },
    )
    .optional()
}

/// Authors `user_id` follows, alphabetically.
pub fn followed_authors(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Author>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username
         FROM follows f
         JOIN users u ON u.id = f.author_id
         WHERE f.user_id = ?1
         ORDER BY u.username",
    )?;
    let authors = stmt
        .query_map(params![user_id], |row| {
            Ok(Author {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(authors)
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use crate::db::users;

    #[test]
    fn follow_is_idempotent() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        let writer = users::create(&conn, "writer", None).unwrap();

        assert!(follow(&conn, reader.id, writer.id).unwrap());
        assert!(!follow(&conn, reader.id, writer.id).unwrap());
        assert_eq!(count(&conn).unwrap(), 1);
        assert!(is_following(&conn, reader.id, writer.id).unwrap());
        assert!(!is_following(&conn, writer.id, reader.id).unwrap());
    }

    #[test]
    fn follow_then_unfollow_restores_count() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        let writer = users::create(&conn, "writer", None).unwrap();
        let before = count(&conn).unwrap();

        follow(&conn, reader.id, writer.id).unwrap();
        assert!(unfollow(&conn, reader.id, writer.id).unwrap());
        assert_eq!(count(&conn).unwrap(), before);

        // Nothing left to remove.
        assert!(!unfollow(&conn, reader.id, writer.id).unwrap());
    }

    #[test]
    fn self_follow_is_a_no_op() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let user = users::create(&conn, "narcissus", None).unwrap();

        assert!(!follow(&conn, user.id, user.id).unwrap());
        assert_eq!(count(&conn).unwrap(), 0);

        // The table refuses it too.
        let direct = conn.execute(
            "INSERT INTO follows (user_id, author_id, created) VALUES (?1, ?1, ?2)",
            params![user.id, now()],
        );
        assert!(direct.is_err());
    }

    #[test]
    fn find_and_followed_authors() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        let zed = users::create(&conn, "zed", None).unwrap();
        let amy = users::create(&conn, "amy", None).unwrap();
        follow(&conn, reader.id, zed.id).unwrap();
        follow(&conn, reader.id, amy.id).unwrap();

        let names: Vec<String> = followed_authors(&conn, reader.id)
            .unwrap()
            .into_iter()
            .map(|a| a.username)
            .collect();
        assert_eq!(names, vec!["amy", "zed"]);

        let record = find(&conn, reader.id, zed.id).unwrap().unwrap();
        assert_eq!(record.to_string(), "reader follows zed");
        assert!(find(&conn, zed.id, reader.id).unwrap().is_none());
    }

    #[test]
    fn deleting_either_user_removes_follow() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        let writer = users::create(&conn, "writer", None).unwrap();
        follow(&conn, reader.id, writer.id).unwrap();

        users::delete(&conn, writer.id).unwrap();
        assert_eq!(count(&conn).unwrap(), 0);
    }
}
