mod edit;
mod home;
mod new;
mod page;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{
    AppState, include_res,
    media::MAX_UPLOAD_BYTES,
    remote::Post,
    res::{escape, short_date},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/post/{id}", get(page::post_page))
        .route("/post/{id}/upvote", post(page::upvote))
        .route("/create", get(new::new_post_page).post(new::new_post))
        .route("/edit/{id}", get(edit::edit_post_page).post(edit::edit_post))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
}

/// Card shown in post listings.
pub(crate) fn card(post: &Post) -> String {
    let thumbnail = match post.image() {
        Some(url) => format!(
            r#"<img class="thumb" src="{}" alt="{}">"#,
            escape(url),
            escape(&post.title)
        ),
        None => r#"<div class="thumb none">🧶</div>"#.to_owned(),
    };
    let preview = post
        .content
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| format!(r#"<p class="preview">{}</p>"#, escape(c)))
        .unwrap_or_default();

    include_res!(str, "/pages/posts/card.html")
        .replace("{id}", &post.id.to_string())
        .replace("{thumbnail}", &thumbnail)
        .replace("{title}", &escape(&post.title))
        .replace("{preview}", &preview)
        .replace("{upvotes}", &post.upvotes.to_string())
        .replace("{date}", &short_date(post.created_at))
}

/// Title/content/video fields shared by the create and edit forms.
pub(crate) fn fields(title: &str, content: &str, video_url: &str) -> String {
    include_res!(str, "/pages/posts/fields.html")
        .replace("{title}", &escape(title))
        .replace("{content}", &escape(content))
        .replace("{video_url}", &escape(video_url))
}
