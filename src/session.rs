use std::sync::Arc;

use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    AppResult,
    comments::{CommentSection, CommentViews},
    remote::{AuthSession, RemoteError, RestStore},
};

pub const AUTH: &str = "auth";
pub const VIEW_ID: &str = "view_id";
pub const NOTICE: &str = "notice";

pub(crate) async fn auth(session: &Session) -> AppResult<Option<AuthSession>> {
    Ok(session.get::<AuthSession>(AUTH).await?)
}

/// The remote store acting as whoever holds this session. An access token
/// about to expire is refreshed first; a refused refresh signs the visitor out.
pub(crate) async fn store(
    session: &Session,
    rest: &RestStore,
) -> AppResult<(RestStore, Option<AuthSession>)> {
    let auth = match auth(session).await? {
        Some(current) if current.needs_refresh(OffsetDateTime::now_utc()) => {
            renew(session, rest, &current).await?
        }
        other => other,
    };
    Ok((rest.scoped(auth.clone()), auth))
}

async fn renew(
    session: &Session,
    rest: &RestStore,
    current: &AuthSession,
) -> AppResult<Option<AuthSession>> {
    match rest.refresh(&current.refresh_token).await {
        Ok(renewed) => {
            debug!(user_id = %renewed.user.id, "session token renewed");
            session.insert(AUTH, &renewed).await?;
            Ok(Some(renewed))
        }
        Err(RemoteError::Status { status, message }) => {
            info!(user_id = %current.user.id, status, %message, "refresh refused, signing out");
            session.remove::<AuthSession>(AUTH).await?;
            flash(session, "Your session has expired. Please log in again.").await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Queues a message for the next rendered page.
pub(crate) async fn flash(session: &Session, message: impl Into<String>) -> AppResult<()> {
    session.insert(NOTICE, message.into()).await?;
    Ok(())
}

pub(crate) async fn take_notice(session: &Session) -> AppResult<Option<String>> {
    Ok(session.remove::<String>(NOTICE).await?)
}

pub(crate) async fn comment_view(
    session: &Session,
    views: &CommentViews,
) -> AppResult<Arc<CommentSection>> {
    let view_id = match session.get::<Uuid>(VIEW_ID).await? {
        Some(id) => id,
        None => {
            let id = Uuid::now_v7();
            session.insert(VIEW_ID, id).await?;
            id
        }
    };

    Ok(views.get_or_insert(view_id))
}

/// Drops the comment view bound to this session's previous identity.
pub(crate) async fn reset_view(session: &Session, views: &CommentViews) -> AppResult<()> {
    if let Some(view_id) = session.remove::<Uuid>(VIEW_ID).await? {
        views.forget(&view_id);
    }
    Ok(())
}
