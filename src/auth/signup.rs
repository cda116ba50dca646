use axum::{
    Form, debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{AppResult, include_res, remote::RestStore, res, session};

use super::CredentialsForm;

#[debug_handler]
pub(crate) async fn signup_page(session: Session) -> AppResult<Response> {
    let notice = session::take_notice(&session).await?;
    Ok(res::page(
        "Sign up",
        None,
        notice.as_deref(),
        include_res!(str, "/pages/signup.html"),
    ))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn signup(
    State(rest): State<RestStore>,
    session: Session,
    Form(CredentialsForm { email, password }): Form<CredentialsForm>,
) -> AppResult<Response> {
    if let Err(e) = rest.sign_up(email.trim(), &password).await {
        warn!(error = %e, "sign-up rejected");
        session::flash(&session, e.to_string()).await?;
        return Ok(Redirect::to("/signup").into_response());
    }

    info!("new account registered");
    session::flash(&session, "Check your inbox to confirm your email, then log in.").await?;
    Ok(Redirect::to("/login").into_response())
}
