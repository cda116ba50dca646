use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult, AppState,
    comments::{CommentViews, render},
    include_res,
    remote::{PostId, RemoteStore, RestStore},
    res::{self, escape, markdown},
    session,
};

#[debug_handler(state = AppState)]
pub(crate) async fn post_page(
    State(rest): State<RestStore>,
    State(views): State<Arc<CommentViews>>,
    session: Session,
    Path(post_id): Path<PostId>,
) -> AppResult<Response> {
    let (store, auth) = session::store(&session, &rest).await?;
    let mut notice = session::take_notice(&session).await?;

    let Some(post) = store.post(post_id).await? else {
        return res::sorry("post");
    };

    let section = session::comment_view(&session, &views).await?;
    if let Err(e) = section.open(&store, post_id).await {
        notice = notice.or(Some(e.to_string()));
    }

    let user = auth.as_ref().map(|a| &a.user);
    let image = post
        .image()
        .map(|url| {
            format!(
                r#"<img class="post-image" src="{}" alt="crochet project">"#,
                escape(url)
            )
        })
        .unwrap_or_default();
    let video = post
        .video()
        .map(|url| {
            format!(
                r#"<iframe width="100%" height="315" src="{}" title="Crochet video" allowfullscreen></iframe>"#,
                escape(url)
            )
        })
        .unwrap_or_default();
    let edit = if post.is_authored_by(user) {
        format!(r#"<a class="edit" href="/edit/{post_id}">Edit this post</a>"#)
    } else {
        String::new()
    };

    let comments = render::section(post_id, &section.comments(), &section.draft(), user);
    let body = include_res!(str, "/pages/posts/post.html")
        .replace("{id}", &post_id.to_string())
        .replace("{title}", &escape(&post.title))
        .replace("{image}", &image)
        .replace("{video}", &video)
        .replace("{upvotes}", &post.upvotes.to_string())
        .replace("{edit}", &edit)
        .replace("{comments}", &comments)
        .replace("{content}", &markdown(post.content.as_deref().unwrap_or_default()));

    Ok(res::page(&post.title, user, notice.as_deref(), &body))
}

/// Writes the vote count read just before plus one.
#[debug_handler(state = AppState)]
pub(crate) async fn upvote(
    State(rest): State<RestStore>,
    session: Session,
    Path(post_id): Path<PostId>,
) -> AppResult<Response> {
    let (store, _) = session::store(&session, &rest).await?;
    let Some(post) = store.post(post_id).await? else {
        return res::sorry("post");
    };

    match store.set_upvotes(post_id, post.upvotes + 1).await {
        Ok(()) => info!(post_id, upvotes = post.upvotes + 1, "post upvoted"),
        Err(e) => {
            warn!(post_id, error = %e, "upvote failed");
            session::flash(&session, "Failed to upvote!").await?;
        }
    }

    Ok(Redirect::to(&format!("/post/{post_id}")).into_response())
}
