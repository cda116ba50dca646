use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AppResult, AppState,
    comments::CommentViews,
    include_res,
    remote::RestStore,
    res::{self, escape},
    session::{self, AUTH},
};

use super::{CredentialsForm, ReturnUrlQuery};

#[debug_handler]
pub(crate) async fn login_page(
    Query(query): Query<ReturnUrlQuery>,
    session: Session,
) -> AppResult<Response> {
    let notice = session::take_notice(&session).await?;
    let body = include_res!(str, "/pages/login.html")
        .replace("{return_url}", &escape(&query.target()));
    Ok(res::page("Log in", None, notice.as_deref(), &body))
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(rest): State<RestStore>,
    State(views): State<Arc<CommentViews>>,
    Query(query): Query<ReturnUrlQuery>,
    session: Session,
    Form(CredentialsForm { email, password }): Form<CredentialsForm>,
) -> AppResult<Response> {
    let auth = match rest.sign_in(email.trim(), &password).await {
        Ok(auth) => auth,
        Err(e) => {
            warn!(error = %e, "sign-in rejected");
            session::flash(&session, e.to_string()).await?;
            return Ok(Redirect::to("/login").into_response());
        }
    };

    session::reset_view(&session, &views).await?;
    session.cycle_id().await?;
    session.insert(AUTH, &auth).await?;

    info!(user_id = %auth.user.id, "welcome {}", auth.user.display_name());
    Ok(Redirect::to(&query.target()).into_response())
}
