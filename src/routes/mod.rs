pub mod assets;
pub mod auth;
pub mod follow;
pub mod home;
pub mod media;
pub mod posts;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router with state attached.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .route("/media/{*path}", get(media::serve))
        .merge(posts::router())
        .merge(follow::router())
        .merge(auth::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
