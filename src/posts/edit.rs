use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult, include_res,
    media::{self, MediaForm, STILL_IMAGE},
    remote::{PostId, PostPatch, RemoteStore, RestStore},
    res::{self, escape},
    session,
};

use super::fields;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn edit_post_page(
    State(rest): State<RestStore>,
    session: Session,
    Path(id): Path<PostId>,
) -> AppResult<Response> {
    let (store, auth) = session::store(&session, &rest).await?;
    let notice = session::take_notice(&session).await?;

    let post = match store.post(id).await {
        Ok(Some(post)) => post,
        Ok(None) => return res::sorry("post"),
        Err(e) => {
            warn!(post_id = id, error = %e, "loading post for edit failed");
            session::flash(&session, "Error loading post").await?;
            return Ok(Redirect::to("/").into_response());
        }
    };

    let current = match post.image() {
        Some(url) => format!(
            r#"<img class="current" src="{}" alt="Current post image"><label>Replace Image (optional):</label>"#,
            escape(url)
        ),
        None => "<label>Add Image (optional):</label>".to_owned(),
    };

    let body = include_res!(str, "/pages/posts/edit.html")
        .replace("{id}", &id.to_string())
        .replace(
            "{fields}",
            &fields(
                &post.title,
                post.content.as_deref().unwrap_or_default(),
                post.video().unwrap_or_default(),
            ),
        )
        .replace("{image_url}", &escape(post.image().unwrap_or_default()))
        .replace("{current}", &current);

    Ok(res::page(
        "Edit post",
        auth.as_ref().map(|a| &a.user),
        notice.as_deref(),
        &body,
    ))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn edit_post(
    State(rest): State<RestStore>,
    session: Session,
    Path(id): Path<PostId>,
    multipart: Multipart,
) -> AppResult<Response> {
    let (store, _) = session::store(&session, &rest).await?;
    let mut form = MediaForm::read(multipart).await?;
    let back = Redirect::to(&format!("/edit/{id}")).into_response();

    let mut image_url = form.field("image_url");
    if let Some(file) = form.file.take() {
        if let Err(e) = STILL_IMAGE.check(&file) {
            session::flash(&session, e.to_string()).await?;
            return Ok(back);
        }

        let path = media::replacement_image_path(&file, media::now_millis());
        match store.upload(file.into_upload(path)).await {
            Ok(url) => image_url = url,
            Err(e) => {
                warn!(post_id = id, error = %e, "replacement image upload failed");
                session::flash(&session, format!("Image upload failed: {e}")).await?;
                return Ok(back);
            }
        }
    }

    let patch = PostPatch {
        title: form.field("title"),
        content: form.field("content"),
        video_url: form.field("video_url"),
        image_url,
    };
    if let Err(e) = store.update_post(id, &patch).await {
        warn!(post_id = id, error = %e, "post update failed");
        session::flash(&session, "Update failed").await?;
        return Ok(back);
    }

    info!(post_id = id, "post updated");
    Ok(Redirect::to(&format!("/post/{id}")).into_response())
}
