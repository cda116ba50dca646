mod login;
mod logout;
mod signup;

use axum::{Router, routing::get};
use serde::Deserialize;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/signup", get(signup::signup_page).post(signup::signup))
        .route("/logout", get(logout::logout))
}

#[derive(Deserialize)]
pub(crate) struct ReturnUrlQuery {
    pub(crate) return_url: Option<String>,
}

impl ReturnUrlQuery {
    /// Only same-site paths are followed. Browsers read a backslash as `/`
    /// and drop tabs and newlines, so those never pass.
    pub(crate) fn target(self) -> String {
        self.return_url
            .filter(|url| is_local_path(url))
            .unwrap_or_else(|| "/".to_owned())
    }
}

fn is_local_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.contains('\\')
        && !url.chars().any(char::is_control)
}

#[derive(Deserialize)]
pub(crate) struct CredentialsForm {
    pub(crate) email: String,
    pub(crate) password: String,
}
