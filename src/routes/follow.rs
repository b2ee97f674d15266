use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;

use crate::db::models::Post;
use crate::db::{follows, users};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::feed;
use crate::pagination::{paginate, Page, PageQuery};
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<String>,
    pub page: Page<Post>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route(
            "/profile/{username}/follow/",
            get(profile_follow).post(profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(profile_unfollow).post(profile_unfollow),
        )
}

fn profile_url(username: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{}/", encoded)
}

/// Posts from everyone the current user follows.
async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let posts = {
        let conn = state.db.get()?;
        feed::following(&conn, user.id)?
    };

    Ok(Html(FollowTemplate {
        viewer: Some(user.username),
        page: paginate(posts, query.page.as_deref()),
    }))
}

/// Following yourself or someone already followed changes nothing.
async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::follow(&conn, user.id, author.id)? {
        tracing::info!("{} now follows {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::unfollow(&conn, user.id, author.id)? {
        tracing::info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}
