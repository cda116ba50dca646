pub mod appresult;
pub mod auth;
pub mod comments;
pub mod config;
pub mod media;
pub mod posts;
pub mod profiles;
pub mod remote;
pub mod res;
pub mod session;

use std::sync::Arc;

use axum::{Router, extract::FromRef};

pub use appresult::{AppError, AppResult};
use comments::CommentViews;
use config::Config;
use remote::RestStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub rest: RestStore,
    pub views: Arc<CommentViews>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestStore::new(
                &config.supabase_url,
                &config.supabase_anon_key,
                &config.storage_bucket,
            )?,
            views: Arc::new(CommentViews::new(config.comment_views)),
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(posts::router())
        .merge(comments::router())
        .merge(profiles::router())
        .merge(auth::router())
        .route("/style.css", axum::routing::get(res::stylesheet))
}
