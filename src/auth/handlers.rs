use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::session;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<String>,
    pub next: String,
    pub username: String,
    pub errors: Vec<String>,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

/// Letters, digits and `@ . + - _`, like the usual account name rules.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required.".into());
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "Username must be at most {} characters.",
            USERNAME_MAX_LEN
        ));
    }
    let allowed = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !allowed {
        return Err("Username may contain only letters, digits and @/./+/-/_.".into());
    }
    Ok(())
}

fn logged_in(state: &AppState, user_id: i64, next: &str) -> AppResult<Response> {
    let token = {
        let conn = state.db.get()?;
        session::create_session(&conn, user_id, state.config.auth.session_hours)?
    };

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session::session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )]),
        Redirect::to(safe_next(next)),
    )
        .into_response())
}

// -- Login --

/// GET /auth/login
pub async fn login_page(viewer: MaybeUser, Query(query): Query<NextQuery>) -> Response {
    if viewer.0.is_some() {
        return Redirect::to(safe_next(&query.next)).into_response();
    }

    Html(LoginTemplate {
        viewer: None,
        next: query.next,
        username: String::new(),
        error: None,
    })
    .into_response()
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<Credentials>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let stored = {
        let conn = state.db.get()?;
        users::password_hash(&conn, username)?
    };

    let user_id = stored.and_then(|(id, hash)| {
        bcrypt::verify(&form.password, &hash)
            .unwrap_or(false)
            .then_some(id)
    });

    match user_id {
        Some(id) => {
            tracing::info!("User {} logged in", username);
            logged_in(&state, id, &form.next)
        }
        None => {
            tracing::info!("Failed login for {}", username);
            let page = Html(LoginTemplate {
                viewer: None,
                next: form.next.clone(),
                username: username.to_string(),
                error: Some("Incorrect username or password.".into()),
            });
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
    }
}

// -- Signup --

/// GET /auth/signup
pub async fn signup_page(viewer: MaybeUser, Query(query): Query<NextQuery>) -> Response {
    if viewer.0.is_some() {
        return Redirect::to("/").into_response();
    }

    Html(SignupTemplate {
        viewer: None,
        next: query.next,
        username: String::new(),
        errors: Vec::new(),
    })
    .into_response()
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<Credentials>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let mut errors = Vec::new();

    if let Err(e) = validate_username(&username) {
        errors.push(e);
    }
    if form.password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(format!(
            "Password must be at least {} characters.",
            PASSWORD_MIN_LEN
        ));
    }
    if errors.is_empty() {
        let conn = state.db.get()?;
        if users::find_by_username(&conn, &username)?.is_some() {
            errors.push("A user with that username already exists.".into());
        }
    }

    if !errors.is_empty() {
        let page = Html(SignupTemplate {
            viewer: None,
            next: form.next.clone(),
            username,
            errors,
        });
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    let hash = bcrypt::hash(&form.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;
    let user = {
        let conn = state.db.get()?;
        users::create(&conn, &username, Some(&hash))?
    };
    tracing::info!("User {} signed up", user.username);

    logged_in(&state, user.id, &form.next)
}

// -- Logout --

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session::clear_session_cookie(&state.config.auth.cookie_name),
        )]),
        Redirect::to("/"),
    )
        .into_response())
}
