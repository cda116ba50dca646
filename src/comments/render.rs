use crate::{
    include_res,
    remote::{PostId, SessionUser},
    res::{escape, long_date, markdown},
};

use super::DisplayComment;

fn avatar(comment: &DisplayComment) -> String {
    if comment.profile.avatar_url.is_empty() {
        format!(
            r#"<div class="avatar initial">{}</div>"#,
            escape(&comment.avatar_initial().to_string())
        )
    } else {
        format!(
            r#"<img class="avatar" src="{}" alt="{}'s avatar">"#,
            escape(&comment.profile.avatar_url),
            escape(&comment.user_email)
        )
    }
}

pub fn comment(comment: &DisplayComment, viewer: Option<&SessionUser>) -> String {
    let bio = match comment.profile.bio.as_str() {
        "" => String::new(),
        bio => format!(r#"<span class="bio">{}</span>"#, escape(bio)),
    };
    let delete = if comment.is_authored_by(viewer) {
        include_res!(str, "/pages/comments/delete_button.html")
            .replace("{post_id}", &comment.comment.post_id.to_string())
            .replace("{id}", &comment.comment.id.to_string())
    } else {
        String::new()
    };

    include_res!(str, "/pages/comments/comment.html")
        .replace("{id}", &comment.comment.id.to_string())
        .replace("{avatar}", &avatar(comment))
        .replace("{name}", &escape(comment.display_name()))
        .replace("{bio}", &bio)
        .replace("{date}", &long_date(comment.comment.created_at))
        .replace("{delete}", &delete)
        .replace("{content}", &markdown(&comment.comment.content))
}

/// The whole comment block: heading, form, and list.
pub fn section(
    post_id: PostId,
    comments: &[DisplayComment],
    draft: &str,
    viewer: Option<&SessionUser>,
) -> String {
    let list = if comments.is_empty() {
        include_res!(str, "/pages/comments/empty.html").to_owned()
    } else {
        comments.iter().map(|c| comment(c, viewer)).collect()
    };

    include_res!(str, "/pages/comments/section.html")
        .replace("{count}", &comments.len().to_string())
        .replace("{post_id}", &post_id.to_string())
        .replace("{draft}", &escape(draft))
        .replace("{comments}", &list)
}
