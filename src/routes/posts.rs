use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};

use crate::db::models::{Comment, Group, Post, User};
use crate::db::posts::{self, NewPost, PostChanges};
use crate::db::{comments, groups};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feed;
use crate::forms::{group_options, CommentForm, GroupOption, PostForm, PostFormErrors};
use crate::pagination::{paginate, Page, PageQuery};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/group_list.html")]
pub struct GroupListTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: User,
    pub post_count: i64,
    pub following: bool,
    pub can_follow: bool,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<String>,
    pub post: Post,
    pub author_post_count: i64,
    pub comments: Vec<Comment>,
    pub can_edit: bool,
    /// Comment box contents; always empty on a fresh render.
    pub comment_text: String,
}

#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: PostFormErrors,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/create/", get(post_create_page).post(post_create))
        .route("/posts/{post_id}/edit/", get(post_edit_page).post(post_edit))
        .route(
            "/posts/{post_id}/comment/",
            get(comment_redirect).post(add_comment),
        )
}

fn profile_url(username: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{}/", encoded)
}

fn detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

// -- Read views --

async fn group_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupListTemplate>> {
    let feed = {
        let conn = state.db.get()?;
        feed::group(&conn, &slug)?
    };

    Ok(Html(GroupListTemplate {
        viewer: viewer.username(),
        group: feed.group,
        page: paginate(feed.posts, query.page.as_deref()),
    }))
}

async fn profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let feed = {
        let conn = state.db.get()?;
        feed::profile(&conn, &username, viewer.id())?
    };
    let can_follow = viewer.id().is_some_and(|id| id != feed.author.id);

    Ok(Html(ProfileTemplate {
        viewer: viewer.username(),
        author: feed.author,
        post_count: feed.post_count,
        following: feed.following,
        can_follow,
        page: paginate(feed.posts, query.page.as_deref()),
    }))
}

async fn post_detail(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(post_id): Path<i64>,
) -> AppResult<Html<PostDetailTemplate>> {
    let detail = {
        let conn = state.db.get()?;
        feed::detail(&conn, post_id)?
    };
    let can_edit = viewer.id().is_some_and(|id| detail.post.is_authored_by(id));

    Ok(Html(PostDetailTemplate {
        viewer: viewer.username(),
        post: detail.post,
        author_post_count: detail.author_post_count,
        comments: detail.comments,
        can_edit,
        comment_text: String::new(),
    }))
}

// -- Create / edit --

async fn post_create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_options(&groups, None),
        current_image: None,
        errors: PostFormErrors::default(),
    }))
}

async fn post_create(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;
    let groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };

    let text = form.text.clone();
    let selected = form.selected_group();
    let clean = match form.validate(&groups) {
        Ok(clean) => clean,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: false,
                action: "/create/".to_string(),
                text,
                groups: group_options(&groups, selected),
                current_image: None,
                errors,
            })
            .into_response());
        }
    };

    let image = match clean.image {
        Some(ref upload) => Some(state.media.save(upload).await?),
        None => None,
    };

    let post_id = {
        let conn = state.db.get()?;
        posts::create(
            &conn,
            &NewPost {
                author_id: user.id,
                text: clean.text,
                group_id: clean.group.for_create(),
                image,
            },
        )?
    };
    tracing::info!("Post {} created by {}", post_id, user.username);

    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn post_edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let (post, groups) = {
        let conn = state.db.get()?;
        let post = posts::get(&conn, post_id)?.ok_or(AppError::NotFound)?;
        (post, groups::list(&conn)?)
    };

    if !post.is_authored_by(user.id) {
        return Ok(Redirect::to(&detail_url(post_id)).into_response());
    }

    let selected = post.group.as_ref().map(|g| g.id);
    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: true,
        action: format!("/posts/{}/edit/", post_id),
        text: post.text,
        groups: group_options(&groups, selected),
        current_image: post.image,
        errors: PostFormErrors::default(),
    })
    .into_response())
}

/// Only the author may edit. Anyone else is bounced to the read-only detail
/// page and nothing is written.
async fn post_edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Response> {
    let (post, groups) = {
        let conn = state.db.get()?;
        let post = posts::get(&conn, post_id)?.ok_or(AppError::NotFound)?;
        (post, groups::list(&conn)?)
    };

    if !post.is_authored_by(user.id) {
        tracing::info!(
            "User {} tried to edit post {} by {}",
            user.username,
            post_id,
            post.author.username
        );
        return Ok(Redirect::to(&detail_url(post_id)).into_response());
    }

    let form = PostForm::from_multipart(multipart).await?;
    let text = form.text.clone();
    let selected = form
        .group
        .as_ref()
        .map(|_| form.selected_group())
        .unwrap_or_else(|| post.group.as_ref().map(|g| g.id));

    let clean = match form.validate(&groups) {
        Ok(clean) => clean,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: true,
                action: format!("/posts/{}/edit/", post_id),
                text,
                groups: group_options(&groups, selected),
                current_image: post.image,
                errors,
            })
            .into_response());
        }
    };

    let image = match clean.image {
        Some(ref upload) => Some(state.media.save(upload).await?),
        None => None,
    };

    {
        let conn = state.db.get()?;
        posts::update(
            &conn,
            post_id,
            &PostChanges {
                text: Some(clean.text),
                group_id: clean.group.for_edit(),
                image,
            },
        )?;
    }
    tracing::info!("Post {} edited by {}", post_id, user.username);

    Ok(Redirect::to(&detail_url(post_id)).into_response())
}

// -- Comments --

/// A GET never writes; after logging in the user just lands on the post.
async fn comment_redirect(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    posts::get(&conn, post_id)?.ok_or(AppError::NotFound)?;
    Ok(Redirect::to(&detail_url(post_id)))
}

/// Always lands back on the post; blank comments are simply not stored.
async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    posts::get(&conn, post_id)?.ok_or(AppError::NotFound)?;

    if let Some(text) = form.cleaned_text() {
        let comment_id = comments::create(&conn, post_id, user.id, text)?;
        tracing::info!(
            "Comment {} added to post {} by {}",
            comment_id,
            post_id,
            user.username
        );
    }

    Ok(Redirect::to(&detail_url(post_id)).into_response())
}
