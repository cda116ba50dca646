use axum::{
    debug_handler,
    extract::{Multipart, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult, include_res,
    media::{self, MediaForm, POST_IMAGE},
    remote::{NewPost, RemoteStore, RestStore},
    res, session,
};

use super::fields;

const LOGIN_FIRST: &str = "You must be logged in to create a post.";

#[debug_handler]
pub(crate) async fn new_post_page(session: Session) -> AppResult<Response> {
    let Some(auth) = session::auth(&session).await? else {
        session::flash(&session, LOGIN_FIRST).await?;
        return Ok(Redirect::to("/login?return_url=/create").into_response());
    };
    let notice = session::take_notice(&session).await?;

    let body = include_res!(str, "/pages/posts/new.html").replace("{fields}", &fields("", "", ""));
    Ok(res::page("Share a project", Some(&auth.user), notice.as_deref(), &body))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_post(
    State(rest): State<RestStore>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let (store, _) = session::store(&session, &rest).await?;
    let Some(user) = store.session_user().await? else {
        session::flash(&session, LOGIN_FIRST).await?;
        return Ok(Redirect::to("/login?return_url=/create").into_response());
    };

    let mut form = MediaForm::read(multipart).await?;
    let title = form.field("title");
    if title.trim().is_empty() {
        session::flash(&session, "Please give your post a title.").await?;
        return Ok(Redirect::to("/create").into_response());
    }

    let mut image_url = String::new();
    if let Some(file) = form.file.take() {
        if let Err(e) = POST_IMAGE.check(&file) {
            session::flash(&session, e.to_string()).await?;
            return Ok(Redirect::to("/create").into_response());
        }

        let path = media::post_image_path(&file, media::now_millis());
        info!(%path, size = file.bytes.len(), content_type = %file.content_type, "uploading post image");
        match store.upload(file.into_upload(path)).await {
            Ok(url) => image_url = url,
            Err(e) => {
                warn!(error = %e, "post image upload failed");
                session::flash(&session, format!("Image upload failed: {e}")).await?;
                return Ok(Redirect::to("/create").into_response());
            }
        }
    }

    let post = NewPost {
        title,
        content: form.field("content"),
        video_url: form.field("video_url"),
        image_url,
        user_id: user.id,
    };
    if let Err(e) = store.insert_post(&post).await {
        warn!(error = %e, "post insert failed");
        session::flash(&session, "Post creation failed!").await?;
        return Ok(Redirect::to("/create").into_response());
    }

    info!(user_id = %user.id, "post created");
    Ok(Redirect::to("/").into_response())
}
