use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use super::models::{Author, Group, Post};
use super::{now, parse_timestamp};

/// Posts joined with their author and (optional) group, ready for display.
const POST_SELECT: &str = "SELECT p.id, p.text, p.created, p.image, u.id, u.username, \
                                  g.id, g.title, g.slug, g.description
                           FROM posts p
                           JOIN users u ON u.id = p.author_id
                           LEFT JOIN post_groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = "ORDER BY p.created DESC, p.id DESC";

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// What an edit changes. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: Option<String>,
    /// `Some(None)` clears the group.
    pub group_id: Option<Option<i64>>,
    pub image: Option<String>,
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let created: String = row.get(2)?;
    let group = match row.get::<_, Option<i64>>(6)? {
        Some(id) => Some(Group {
            id,
            title: row.get(7)?,
            slug: row.get(8)?,
            description: row.get(9)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        created: parse_timestamp(2, &created)?,
        image: row.get(3)?,
        author: Author {
            id: row.get(4)?,
            username: row.get(5)?,
        },
        group,
    })
}

fn query_posts<P: Params>(conn: &Connection, filter: &str, params: P) -> rusqlite::Result<Vec<Post>> {
    let sql = format!("{} {} {}", POST_SELECT, filter, NEWEST_FIRST);
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt.query_map(params, map_post)?.collect::<Result<_, _>>()?;
    Ok(posts)
}

/// Insert a post stamped with the current time; returns its id.
pub fn create(conn: &Connection, post: &NewPost) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (text, created, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post.text, now(), post.author_id, post.group_id, post.image],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1", POST_SELECT),
        params![id],
        map_post,
    )
    .optional()
}

/// Apply an edit. `created` and the author are never touched.
pub fn update(conn: &Connection, id: i64, changes: &PostChanges) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE posts SET
            text = COALESCE(?1, text),
            group_id = CASE WHEN ?2 THEN ?3 ELSE group_id END,
            image = COALESCE(?4, image)
         WHERE id = ?5",
        params![
            changes.text,
            changes.group_id.is_some(),
            changes.group_id.flatten(),
            changes.image,
            id
        ],
    )?;
    Ok(rows > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn all(conn: &Connection) -> rusqlite::Result<Vec<Post>> {
    query_posts(conn, "", params![])
}

pub fn by_group(conn: &Connection, group_id: i64) -> rusqlite::Result<Vec<Post>> {
    query_posts(conn, "WHERE p.group_id = ?1", params![group_id])
}

pub fn by_author(conn: &Connection, author_id: i64) -> rusqlite::Result<Vec<Post>> {
    query_posts(conn, "WHERE p.author_id = ?1", params![author_id])
}

/// Posts of every author `viewer_id` follows.
pub fn by_followed_authors(conn: &Connection, viewer_id: i64) -> rusqlite::Result<Vec<Post>> {
    query_posts(
        conn,
        "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
        params![viewer_id],
    )
}

pub fn count_by_author(conn: &Connection, author_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
        params![author_id],
        |row| row.get(0),
    )
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::groups::{self, NewGroup};
    use crate::db::test_support::test_pool;
    use crate::db::{follows, users};

    fn new_post(author_id: i64, text: &str, group_id: Option<i64>) -> NewPost {
        NewPost {
            author_id,
            text: text.into(),
            group_id,
            image: None,
        }
    }

    fn group(conn: &Connection, slug: &str) -> i64 {
        groups::create(
            conn,
            &NewGroup {
                title: slug.to_uppercase(),
                slug: slug.into(),
                description: format!("about {}", slug),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn create_and_get_joins_author_and_group() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        let group_id = group(&conn, "cats");

        let id = create(
            &conn,
            &NewPost {
                image: Some("posts/cat.gif".into()),
                ..new_post(author.id, "meow", Some(group_id))
            },
        )
        .unwrap();

        let post = get(&conn, id).unwrap().unwrap();
        assert_eq!(post.text, "meow");
        assert_eq!(post.author.username, "leo");
        assert_eq!(post.group.as_ref().map(|g| g.slug.as_str()), Some("cats"));
        assert_eq!(post.group.as_ref().map(|g| g.description.as_str()), Some("about cats"));
        assert_eq!(post.image.as_deref(), Some("posts/cat.gif"));
        assert!(get(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn feeds_are_newest_first() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        for i in 0..5 {
            create(&conn, &new_post(author.id, &format!("post {}", i), None)).unwrap();
        }

        let texts: Vec<String> = all(&conn).unwrap().into_iter().map(|p| p.text).collect();
        assert_eq!(texts, vec!["post 4", "post 3", "post 2", "post 1", "post 0"]);
    }

    #[test]
    fn group_feed_only_contains_group_posts() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        let cats = group(&conn, "cats");
        let dogs = group(&conn, "dogs");
        create(&conn, &new_post(author.id, "meow", Some(cats))).unwrap();
        create(&conn, &new_post(author.id, "no group", None)).unwrap();

        let cat_posts = by_group(&conn, cats).unwrap();
        assert_eq!(cat_posts.len(), 1);
        assert_eq!(cat_posts[0].text, "meow");
        assert!(by_group(&conn, dogs).unwrap().is_empty());
    }

    #[test]
    fn author_feed_and_count() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let leo = users::create(&conn, "leo", None).unwrap();
        let mia = users::create(&conn, "mia", None).unwrap();
        create(&conn, &new_post(leo.id, "one", None)).unwrap();
        create(&conn, &new_post(leo.id, "two", None)).unwrap();
        create(&conn, &new_post(mia.id, "three", None)).unwrap();

        assert_eq!(by_author(&conn, leo.id).unwrap().len(), 2);
        assert_eq!(count_by_author(&conn, leo.id).unwrap(), 2);
        assert_eq!(count_by_author(&conn, mia.id).unwrap(), 1);
        assert_eq!(count(&conn).unwrap(), 3);
    }

    #[test]
    fn followed_authors_feed() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        let followed = users::create(&conn, "followed", None).unwrap();
        let stranger = users::create(&conn, "stranger", None).unwrap();
        follows::follow(&conn, reader.id, followed.id).unwrap();

        create(&conn, &new_post(followed.id, "visible", None)).unwrap();
        create(&conn, &new_post(stranger.id, "hidden", None)).unwrap();

        let texts: Vec<String> = by_followed_authors(&conn, reader.id)
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, vec!["visible"]);
        assert!(by_followed_authors(&conn, stranger.id).unwrap().is_empty());
    }

    #[test]
    fn update_touches_only_supplied_fields() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        let cats = group(&conn, "cats");
        let id = create(
            &conn,
            &NewPost {
                image: Some("posts/a.png".into()),
                ..new_post(author.id, "before", Some(cats))
            },
        )
        .unwrap();
        let original = get(&conn, id).unwrap().unwrap();

        let changed = update(
            &conn,
            id,
            &PostChanges {
                text: Some("after".into()),
                ..PostChanges::default()
            },
        )
        .unwrap();
        assert!(changed);

        let post = get(&conn, id).unwrap().unwrap();
        assert_eq!(post.text, "after");
        assert_eq!(post.group.map(|g| g.id), Some(cats));
        assert_eq!(post.image.as_deref(), Some("posts/a.png"));
        assert_eq!(post.created, original.created);

        update(
            &conn,
            id,
            &PostChanges {
                group_id: Some(None),
                ..PostChanges::default()
            },
        )
        .unwrap();
        assert!(get(&conn, id).unwrap().unwrap().group.is_none());
    }

    #[test]
    fn delete_removes_post_and_comments() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        let id = create(&conn, &new_post(author.id, "short lived", None)).unwrap();
        crate::db::comments::create(&conn, id, author.id, "first!").unwrap();

        assert!(delete(&conn, id).unwrap());
        assert!(get(&conn, id).unwrap().is_none());
        assert!(crate::db::comments::for_post(&conn, id).unwrap().is_empty());
    }
}
