#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::auth::session;
use yatube::config::Config;
use yatube::db::groups::{self, NewGroup};
use yatube::db::models::{Group, User};
use yatube::db::posts::{self, NewPost};
use yatube::db::{self, users};
use yatube::media::LocalMediaStore;
use yatube::routes;
use yatube::state::AppState;

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const BOUNDARY: &str = "----yatube-test-boundary";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Number of post cards rendered on a feed page.
    pub fn post_cards(&self) -> usize {
        self.body.matches("<article class=\"post\">").count()
    }
}

/// A full application over a throwaway database and media directory.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _tmp: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.resolve_paths(tmp.path());

        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();

        let media = Arc::new(LocalMediaStore::new(config.uploads_path()));
        let state = AppState::new(pool, config, media);
        let router = routes::app(state.clone());

        Self {
            state,
            router,
            _tmp: tmp,
        }
    }

    /// Create a user and return it with a live session cookie.
    pub fn user(&self, username: &str) -> (User, String) {
        let conn = self.state.db.get().unwrap();
        let user = users::create(&conn, username, None).unwrap();
        let token = session::create_session(&conn, user.id, 1).unwrap();
        let cookie = format!("{}={}", self.state.config.auth.cookie_name, token);
        (user, cookie)
    }

    pub fn group(&self, title: &str, slug: &str) -> Group {
        let conn = self.state.db.get().unwrap();
        groups::create(
            &conn,
            &NewGroup {
                title: title.into(),
                slug: slug.into(),
                description: format!("All about {}", title.to_lowercase()),
            },
        )
        .unwrap()
    }

    pub fn post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        let conn = self.state.db.get().unwrap();
        posts::create(
            &conn,
            &NewPost {
                author_id,
                text: text.into(),
                group_id,
                image: None,
            },
        )
        .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Submit the post form, optionally with an image file.
    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        image: Option<(&str, &str, &[u8])>,
    ) -> TestResponse {
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, file_name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }
}
