use axum::response::{Html, IntoResponse, Response};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{AppResult, remote::SessionUser};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

const LONG_DATE: &[BorrowedFormatItem<'_>] =
    format_description!("[month repr:short] [day padding:none], [year], [hour]:[minute]");
const SHORT_DATE: &[BorrowedFormatItem<'_>] =
    format_description!("[month repr:short] [day padding:none]");

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

const LINK_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Relative URLs and the schemes in [`LINK_SCHEMES`] pass; anything else
/// becomes `#`.
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url
        .split_once(':')
        .map(|(head, _)| head)
        .filter(|head| !head.contains(['/', '?', '#']));

    let blocked = scheme
        .is_some_and(|scheme| !LINK_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme.trim())));
    if blocked { CowStr::Borrowed("#") } else { url }
}

/// Renders user-written Markdown. Embedded HTML is shown as text, link and
/// image targets are limited to safe schemes, and braces are encoded so the
/// output is inert to template placeholders.
pub fn markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        _ => event,
    });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html.replace('{', "&#123;").replace('}', "&#125;")
}

pub fn long_date(at: OffsetDateTime) -> String {
    at.format(LONG_DATE).unwrap_or_default()
}

pub fn short_date(at: OffsetDateTime) -> String {
    at.format(SHORT_DATE).unwrap_or_default()
}

/// Wraps a page body in the shared layout.
pub fn page(title: &str, user: Option<&SessionUser>, notice: Option<&str>, body: &str) -> Response {
    let nav = match user {
        Some(user) => include_res!(str, "/pages/nav_user.html")
            .replace("{name}", &escape(user.display_name())),
        None => include_res!(str, "/pages/nav_guest.html").to_owned(),
    };
    let notice = notice
        .map(|n| format!(r#"<p class="notice">{}</p>"#, escape(n)))
        .unwrap_or_default();

    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{nav}", &nav)
            .replace("{notice}", &notice)
            .replace("{body}", body),
    )
    .into_response()
}

pub async fn stylesheet() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/css")],
        include_res!(str, "/style.css"),
    )
}

pub fn sorry(what: &str) -> AppResult<Response> {
    Ok((
        axum::http::StatusCode::NOT_FOUND,
        page(
            "Not found",
            None,
            None,
            &include_res!(str, "/pages/sorry.html").replace("{what}", &escape(what)),
        ),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"yarn" & 'hook'</b>"#),
            "&lt;b&gt;&quot;yarn&quot; &amp; &#39;hook&#39;&lt;/b&gt;"
        );
        assert_eq!(escape("{body}"), "&#123;body&#125;");
    }

    #[test]
    fn markdown_neutralises_raw_html() {
        let html = markdown("**chain** <script>alert(1)</script>");
        assert!(html.contains("<strong>chain</strong>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!markdown("{comments}").contains("{comments}"));
    }

    #[test]
    fn markdown_drops_script_links() {
        for body in [
            "[cute hat](javascript:alert(document.domain))",
            "[hat](JavaScript:alert(1))",
            "<javascript:alert(1)>",
            "![pattern](data:text/html;base64,PHNjcmlwdD4=)",
            "[hat](vbscript:msgbox)",
        ] {
            let html = markdown(body);
            let lower = html.to_lowercase();
            for attr in [r#"href="javascript"#, r#"href="vbscript"#, r#"src="data"#] {
                assert!(!lower.contains(attr), "{body} -> {html}");
            }
            assert!(html.contains(r##"="#""##), "{body} -> {html}");
        }
    }

    #[test]
    fn markdown_keeps_ordinary_links() {
        assert!(markdown("[shop](https://yarn.example/hooks)").contains(r#"href="https://yarn.example/hooks""#));
        assert!(markdown("[me](mailto:granny@yarn.club)").contains(r#"href="mailto:granny@yarn.club""#));
        assert!(markdown("[post](/post/3)").contains(r#"href="/post/3""#));
        assert!(markdown("[odd](/a:b)").contains(r#"href="/a:b""#));
    }

    #[test]
    fn formats_dates() {
        let at = datetime!(2024-03-05 14:07 UTC);
        assert_eq!(long_date(at), "Mar 5, 2024, 14:07");
        assert_eq!(short_date(at), "Mar 5");
    }
}
