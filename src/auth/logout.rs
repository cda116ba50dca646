use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State},
    response::Redirect,
};
use tower_sessions::Session;

use crate::{AppResult, AppState, comments::CommentViews, session};

use super::ReturnUrlQuery;

#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    State(views): State<Arc<CommentViews>>,
    Query(query): Query<ReturnUrlQuery>,
    session: Session,
) -> AppResult<Redirect> {
    session::reset_view(&session, &views).await?;
    session.flush().await?;
    Ok(Redirect::to(&query.target()))
}
