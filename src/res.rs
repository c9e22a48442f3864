use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use time::OffsetDateTime;

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Escapes text for use in element bodies and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    html::push_html(&mut out, std::iter::once(Event::Text(CowStr::from(text))));
    out.replace('"', "&quot;").replace('\'', "&#39;")
}

/// Relative links and http(s)/mailto only.
fn is_safe_url(url: &str) -> bool {
    // browsers ignore these inside a scheme
    let url: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();

    match url.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(at) if url[at..].starts_with(':') => {
            let scheme = url[..at].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

fn neutralize(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) { url } else { CowStr::from("#") }
}

/// Renders message markdown. Raw HTML in the source is shown as text and
/// links with other schemes than http(s) or mailto point nowhere.
pub fn render_content(content: &str) -> String {
    let parser = Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
                link_type,
                dest_url: neutralize(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
                link_type,
                dest_url: neutralize(dest_url),
                title,
                id,
            }),
            _ => event,
        });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub fn avatar_html(avatar: Option<&str>, name: &str) -> String {
    let initial: String = name.chars().next().map(String::from).unwrap_or_default();
    match avatar {
        Some(url) => format!(r#"<img class="avatar" src="{}" alt="{}">"#, escape(url), escape(&initial)),
        None => format!(r#"<span class="avatar">{}</span>"#, escape(&initial)),
    }
}

pub fn clock(at: OffsetDateTime) -> String {
    format!("{:04}-{:02}-{:02} {:02}:{:02}", at.year(), u8::from(at.month()), at.day(), at.hour(), at.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_attributes() {
        assert_eq!(escape(r#"<a href="x">'"#), "&lt;a href=&quot;x&quot;&gt;&#39;");
    }

    #[test]
    fn markdown_keeps_formatting_but_not_html() {
        let html = render_content("**hi** <script>alert(1)</script>");
        assert!(html.contains("<strong>hi</strong>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn script_urls_are_not_linked() {
        for content in [
            "[click](javascript:alert(document.domain))",
            "[click](JavaScript:alert(1))",
            "<javascript:alert(1)>",
            "[click](  JAVASCRIPT:alert(1)  )",
            "![pic](data:text/html;base64,PHNjcmlwdD4=)",
        ] {
            let html = render_content(content).to_ascii_lowercase();
            assert!(!html.contains(r#"href="javascript"#), "{content} -> {html}");
            assert!(!html.contains(r#"src="data"#), "{content} -> {html}");
        }

        let html = render_content("[click](javascript:alert(1))");
        assert!(html.contains(r##"href="#""##), "{html}");
    }

    #[test]
    fn ordinary_links_survive() {
        assert!(render_content("[wemake](https://wemake.example/p)").contains(r#"href="https://wemake.example/p""#));
        assert!(render_content("[me](mailto:me@wemake.example)").contains(r#"href="mailto:me@wemake.example""#));
        assert!(render_content("[room](/m/4?x=a:b)").contains(r#"href="/m/4?x=a:b""#));
    }

    #[test]
    fn avatar_falls_back_to_initial() {
        assert_eq!(avatar_html(None, "Nico"), r#"<span class="avatar">N</span>"#);
        assert!(avatar_html(Some("https://x/a.png"), "Nico").contains(r#"src="https://x/a.png""#));
    }
}
