mod display;
pub mod render;
mod section;
mod views;

use std::sync::Arc;

use axum::{
    Form, Router, debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::debug;

use crate::{
    AppResult, AppState, include_res,
    remote::{CommentId, PostId, RestStore},
    res, session,
};

pub use display::{
    DisplayComment, ProfileCard, assemble, distinct_authors, merge, merge_own, placeholder_email,
};
pub use section::{CommentError, CommentSection, Confirmation, DeleteOutcome, fetch_comments};
pub use views::CommentViews;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}/comments", post(add_comment))
        .route(
            "/post/{id}/comments/{comment_id}/delete",
            get(confirm_delete).post(delete_comment),
        )
}

#[derive(Deserialize)]
pub(crate) struct AddCommentForm {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
pub(crate) struct ConfirmForm {
    confirm: Option<String>,
}

impl ConfirmForm {
    pub(crate) fn confirmation(&self) -> Confirmation {
        match self.confirm.as_deref() {
            Some("yes") => Confirmation::Confirmed,
            _ => Confirmation::Declined,
        }
    }
}

fn back_to_thread(post_id: PostId) -> Response {
    Redirect::to(&format!("/post/{post_id}#comments")).into_response()
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_comment(
    State(rest): State<RestStore>,
    State(views): State<Arc<CommentViews>>,
    session: Session,
    Path(post_id): Path<PostId>,
    Form(AddCommentForm { content }): Form<AddCommentForm>,
) -> AppResult<Response> {
    let (store, _) = session::store(&session, &rest).await?;
    let section = session::comment_view(&session, &views).await?;

    if section.post_id() != Some(post_id) {
        if let Err(e) = section.open(&store, post_id).await {
            session::flash(&session, e.to_string()).await?;
        }
    }

    match section.submit(&store, post_id, &content).await {
        Ok(_) => {}
        Err(CommentError::SubmissionInFlight) => debug!(post_id, "duplicate submit dropped"),
        Err(e) => session::flash(&session, e.to_string()).await?,
    }

    Ok(back_to_thread(post_id))
}

#[debug_handler]
pub(crate) async fn confirm_delete(
    session: Session,
    Path((post_id, id)): Path<(PostId, CommentId)>,
) -> AppResult<Response> {
    let auth = session::auth(&session).await?;
    let body = include_res!(str, "/pages/confirm.html")
        .replace("{question}", "Are you sure you want to delete this comment?")
        .replace("{action}", &format!("/post/{post_id}/comments/{id}/delete"))
        .replace("{back}", &format!("/post/{post_id}#comments"));

    Ok(res::page("Delete comment", auth.as_ref().map(|a| &a.user), None, &body))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_comment(
    State(rest): State<RestStore>,
    State(views): State<Arc<CommentViews>>,
    session: Session,
    Path((post_id, id)): Path<(PostId, CommentId)>,
    Form(form): Form<ConfirmForm>,
) -> AppResult<Response> {
    let (store, _) = session::store(&session, &rest).await?;
    let section = session::comment_view(&session, &views).await?;

    if let Err(e) = section.delete(&store, id, form.confirmation()).await {
        session::flash(&session, e.to_string()).await?;
    }

    Ok(back_to_thread(post_id))
}
