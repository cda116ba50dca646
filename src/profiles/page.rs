use axum::{
    Form, debug_handler,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use futures_util::future;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult,
    comments::ProfileCard,
    include_res,
    media::{self, MediaForm, STILL_IMAGE},
    posts,
    remote::{PostId, ProfileUpsert, RemoteStore, RestStore},
    res::{self, escape},
    session,
};

fn to_login() -> Response {
    Redirect::to("/login?return_url=/account").into_response()
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn account(State(rest): State<RestStore>, session: Session) -> AppResult<Response> {
    let (store, auth) = session::store(&session, &rest).await?;
    let Some(auth) = auth else {
        return Ok(to_login());
    };
    let user = &auth.user;
    let mut notice = session::take_notice(&session).await?;

    let (profile, posts) = future::join(store.profile(user.id), store.posts_by_user(user.id)).await;

    let profile: ProfileCard = match profile {
        Ok(profile) => profile.map(ProfileCard::from).unwrap_or_default(),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "profile fetch failed");
            ProfileCard::default()
        }
    };

    let posts = match posts {
        Ok(posts) => posts,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "own posts fetch failed");
            notice = notice.or(Some("Could not load your posts.".to_owned()));
            Vec::new()
        }
    };

    let avatar = if profile.avatar_url.is_empty() {
        let initial = user
            .email
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?');
        format!(r#"<div class="avatar large initial">{}</div>"#, escape(&initial.to_string()))
    } else {
        format!(
            r#"<img class="avatar large" src="{}" alt="Profile avatar">"#,
            escape(&profile.avatar_url)
        )
    };
    let bio = if profile.bio.is_empty() {
        "No bio yet - click edit to add one!".to_owned()
    } else {
        escape(&profile.bio)
    };

    let list = if posts.is_empty() {
        include_res!(str, "/pages/profiles/no_posts.html").to_owned()
    } else {
        posts
            .iter()
            .map(|post| {
                include_res!(str, "/pages/profiles/own_post.html")
                    .replace("{id}", &post.id.to_string())
                    .replace("{card}", &posts::card(post))
            })
            .collect()
    };

    let body = include_res!(str, "/pages/profiles/account.html")
        .replace("{avatar}", &avatar)
        .replace("{name}", &escape(user.display_name()))
        .replace("{bio}", &bio)
        .replace("{bio_raw}", &escape(&profile.bio))
        .replace("{avatar_url}", &escape(&profile.avatar_url))
        .replace("{posts}", &list);

    Ok(res::page("My account", Some(user), notice.as_deref(), &body))
}

/// Saves the bio and, if one was picked, a new avatar. The profile row is
/// created on first save.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_profile(
    State(rest): State<RestStore>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let (store, _) = session::store(&session, &rest).await?;
    let Some(user) = store.session_user().await? else {
        return Ok(to_login());
    };
    let back = Redirect::to("/account").into_response();

    let mut form = MediaForm::read(multipart).await?;
    let mut avatar_url = form.field("avatar_url");
    if let Some(file) = form.file.take() {
        if let Err(e) = STILL_IMAGE.check(&file) {
            session::flash(&session, e.to_string()).await?;
            return Ok(back);
        }

        let path = media::avatar_path(user.id, &file, media::now_millis());
        match store.upload(file.into_upload(path)).await {
            Ok(url) => avatar_url = url,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "avatar upload failed");
                session::flash(&session, format!("Avatar upload failed: {e}")).await?;
                return Ok(back);
            }
        }
    }

    let upsert = ProfileUpsert {
        id: user.id,
        bio: form.field("bio"),
        avatar_url,
        updated_at: OffsetDateTime::now_utc(),
    };
    match store.upsert_profile(&upsert).await {
        Ok(()) => {
            info!(user_id = %user.id, "profile updated");
            session::flash(&session, "Profile updated successfully!").await?;
        }
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "profile upsert failed");
            session::flash(&session, "Profile update failed").await?;
        }
    }

    Ok(back)
}

#[debug_handler]
pub(crate) async fn confirm_delete_post(
    session: Session,
    Path(id): Path<PostId>,
) -> AppResult<Response> {
    let Some(auth) = session::auth(&session).await? else {
        return Ok(to_login());
    };
    let body = include_res!(str, "/pages/confirm.html")
        .replace("{question}", "Are you sure you want to delete this post?")
        .replace("{action}", &format!("/account/posts/{id}/delete"))
        .replace("{back}", "/account");

    Ok(res::page("Delete post", Some(&auth.user), None, &body))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_post(
    State(rest): State<RestStore>,
    session: Session,
    Path(id): Path<PostId>,
    Form(form): Form<crate::comments::ConfirmForm>,
) -> AppResult<Response> {
    if form.confirmation() == crate::comments::Confirmation::Declined {
        return Ok(Redirect::to("/account").into_response());
    }

    let (store, _) = session::store(&session, &rest).await?;
    match store.delete_post(id).await {
        Ok(()) => info!(post_id = id, "post deleted"),
        Err(e) => {
            warn!(post_id = id, error = %e, "post delete failed");
            session::flash(&session, "Failed to delete post").await?;
        }
    }

    Ok(Redirect::to("/account").into_response())
}
