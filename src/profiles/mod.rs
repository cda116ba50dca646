mod page;

use axum::{Router, extract::DefaultBodyLimit, routing::{get, post}};

use crate::{AppState, media::MAX_UPLOAD_BYTES};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account", get(page::account))
        .route("/account/profile", post(page::update_profile))
        .route(
            "/account/posts/{id}/delete",
            get(page::confirm_delete_post).post(page::delete_post),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
}
