//! Per-view post collections. Every feed is newest first and unpaginated;
//! handlers run the result through [`crate::pagination`].

use rusqlite::Connection;

use crate::db::models::{Comment, Group, Post, User};
use crate::db::{comments, follows, groups, posts, users};
use crate::error::{AppError, AppResult};

pub struct GroupFeed {
    pub group: Group,
    pub posts: Vec<Post>,
}

pub struct ProfileFeed {
    pub author: User,
    pub post_count: i64,
    /// Whether the viewer follows `author`. Always false for anonymous viewers.
    pub following: bool,
    pub posts: Vec<Post>,
}

pub struct PostDetail {
    pub post: Post,
    pub author_post_count: i64,
    pub comments: Vec<Comment>,
}

/// Every post, with author and group joined for display.
pub fn global(conn: &Connection) -> AppResult<Vec<Post>> {
    Ok(posts::all(conn)?)
}

pub fn group(conn: &Connection, slug: &str) -> AppResult<GroupFeed> {
    let group = groups::find_by_slug(conn, slug)?.ok_or(AppError::NotFound)?;
    let posts = posts::by_group(conn, group.id)?;
    Ok(GroupFeed { group, posts })
}

pub fn profile(conn: &Connection, username: &str, viewer: Option<i64>) -> AppResult<ProfileFeed> {
    let author = users::find_by_username(conn, username)?.ok_or(AppError::NotFound)?;
    let post_count = posts::count_by_author(conn, author.id)?;
    let following = match viewer {
        Some(viewer_id) => follows::is_following(conn, viewer_id, author.id)?,
        None => false,
    };
    let posts = posts::by_author(conn, author.id)?;
    Ok(ProfileFeed {
        author,
        post_count,
        following,
        posts,
    })
}

/// Posts from every author the viewer follows.
pub fn following(conn: &Connection, viewer_id: i64) -> AppResult<Vec<Post>> {
    Ok(posts::by_followed_authors(conn, viewer_id)?)
}

pub fn detail(conn: &Connection, post_id: i64) -> AppResult<PostDetail> {
    let post = posts::get(conn, post_id)?.ok_or(AppError::NotFound)?;
    let author_post_count = posts::count_by_author(conn, post.author.id)?;
    let comments = comments::for_post(conn, post.id)?;
    Ok(PostDetail {
        post,
        author_post_count,
        comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::groups::NewGroup;
    use crate::db::posts::NewPost;
    use crate::db::test_support::test_pool;

    fn post(conn: &Connection, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        posts::create(
            conn,
            &NewPost {
                author_id,
                text: text.into(),
                group_id,
                image: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn group_feed_looks_up_by_slug() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        let cats = groups::create(
            &conn,
            &NewGroup {
                title: "Cats".into(),
                slug: "cats".into(),
                description: String::new(),
            },
        )
        .unwrap();
        post(&conn, author.id, "meow", Some(cats.id));
        post(&conn, author.id, "elsewhere", None);

        let feed = group(&conn, "cats").unwrap();
        assert_eq!(feed.group, cats);
        assert_eq!(feed.posts.len(), 1);

        assert!(matches!(group(&conn, "nope"), Err(AppError::NotFound)));
    }

    #[test]
    fn profile_reports_count_and_follow_state() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "writer", None).unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        post(&conn, author.id, "one", None);
        post(&conn, author.id, "two", None);

        let anonymous = profile(&conn, "writer", None).unwrap();
        assert_eq!(anonymous.post_count, 2);
        assert!(!anonymous.following);

        follows::follow(&conn, reader.id, author.id).unwrap();
        let seen_by_reader = profile(&conn, "writer", Some(reader.id)).unwrap();
        assert!(seen_by_reader.following);
        assert_eq!(seen_by_reader.posts[0].text, "two");

        assert!(matches!(profile(&conn, "ghost", None), Err(AppError::NotFound)));
    }

    #[test]
    fn following_feed_is_union_of_followed_authors() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let reader = users::create(&conn, "reader", None).unwrap();
        let a = users::create(&conn, "a", None).unwrap();
        let b = users::create(&conn, "b", None).unwrap();
        let c = users::create(&conn, "c", None).unwrap();
        follows::follow(&conn, reader.id, a.id).unwrap();
        follows::follow(&conn, reader.id, b.id).unwrap();

        post(&conn, a.id, "from a", None);
        post(&conn, c.id, "from c", None);
        post(&conn, b.id, "from b", None);

        let texts: Vec<String> = following(&conn, reader.id)
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, vec!["from b", "from a"]);
    }

    #[test]
    fn detail_includes_comments_and_author_count() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let author = users::create(&conn, "leo", None).unwrap();
        let id = post(&conn, author.id, "hello", None);
        post(&conn, author.id, "again", None);
        comments::create(&conn, id, author.id, "self reply").unwrap();

        let detail = detail(&conn, id).unwrap();
        assert_eq!(detail.post.text, "hello");
        assert_eq!(detail.author_post_count, 2);
        assert_eq!(detail.comments.len(), 1);

        assert!(matches!(super::detail(&conn, 999), Err(AppError::NotFound)));
    }
}
