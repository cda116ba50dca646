use axum::{debug_handler, extract::State, response::Response};
use tower_sessions::Session;
use tracing::warn;

use crate::{
    AppResult, include_res,
    remote::{RemoteStore, RestStore},
    res, session,
};

use super::card;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn home(State(rest): State<RestStore>, session: Session) -> AppResult<Response> {
    let (store, auth) = session::store(&session, &rest).await?;
    let mut notice = session::take_notice(&session).await?;

    let posts = match store.posts().await {
        Ok(posts) => posts,
        Err(e) => {
            warn!(error = %e, "post listing failed");
            notice = notice.or(Some("Could not load posts.".to_owned()));
            Vec::new()
        }
    };

    let cards = if posts.is_empty() {
        include_res!(str, "/pages/posts/none.html").to_owned()
    } else {
        posts.iter().map(card).collect()
    };

    Ok(res::page(
        "Crochet Corner",
        auth.as_ref().map(|a| &a.user),
        notice.as_deref(),
        &include_res!(str, "/pages/home.html").replace("{cards}", &cards),
    ))
}
