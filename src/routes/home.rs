use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::cache::{PageCache, INDEX_PAGE_PREFIX};
use crate::db::models::Post;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::feed;
use crate::db::posts;
use crate::pagination::{clamp_page_number, page_at, Page, PageQuery, PAGE_SIZE};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub page: Page<Post>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_response(StatusCode::OK, body),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub fn html_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Global feed. Rendered pages are cached per viewer and page number, and
/// writes do not invalidate them: the same HTML is served until the entry
/// expires or the cache is cleared.
pub async fn index(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    // Keyed by the page actually served, so out-of-range numbers share one entry.
    let number = {
        let conn = state.db.get()?;
        let count = usize::try_from(posts::count(&conn)?).unwrap_or(0);
        clamp_page_number(query.page.as_deref(), count, PAGE_SIZE)
    };
    let key = PageCache::key(INDEX_PAGE_PREFIX, viewer.id(), number);

    if let Some(body) = state.page_cache.get(&key).await {
        tracing::debug!("Page cache hit: {}", key);
        return Ok(html_response(StatusCode::OK, body));
    }
    tracing::debug!("Page cache miss: {}", key);

    let posts = {
        let conn = state.db.get()?;
        feed::global(&conn)?
    };

    let body = IndexTemplate {
        viewer: viewer.username(),
        page: page_at(posts, number, PAGE_SIZE),
    }
    .render()?;

    state.page_cache.insert(key, body.clone()).await;
    Ok(html_response(StatusCode::OK, body))
}
