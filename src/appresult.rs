use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{
    remote::RemoteError,
    res::{self, escape},
};

pub type AppResult<T> = Result<T, AppError>;

/// Failure of a request handler. Rendered as an error page inside the
/// normal layout.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<RemoteError>() {
            Some(RemoteError::Transport(_) | RemoteError::Unavailable(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(%status, error = ?self.0, "request failed");

        let body = format!(
            r#"<section class="error"><h1>Something went wrong</h1><p>{}</p><a href="/">Back to all posts</a></section>"#,
            escape(&format!("{:#}", self.0))
        );
        (status, res::page("Error", None, None, &body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
