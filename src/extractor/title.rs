use reqwest::Url;

use super::{Page, UNTITLED};

/// Pages on this host are titled by their repository path instead of rendered headings.
const REPOSITORY_HOST: &str = "github.com";

/// Heading, then document metadata, then class-based fallbacks.
const TITLE_CASCADE: &[TitleSource] = &[
    TitleSource::Text("h1"),
    TitleSource::Text("title"),
    TitleSource::Meta(r#"meta[property="og:title"]"#),
    TitleSource::Text(".title"),
    TitleSource::Text(r#"[class*="title"]"#),
];

enum TitleSource {
    Text(&'static str),
    Meta(&'static str),
}

pub fn resolve_title(page: &Page) -> String {
    if let Some(path) = repository_path(page.url()) {
        return path;
    }

    TITLE_CASCADE
        .iter()
        .find_map(|source| match source {
            TitleSource::Text(css) => page.first_text(css),
            TitleSource::Meta(css) => page.meta_content(css),
        })
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// `owner/repo/...` for code-hosting URLs, `None` for anything else.
pub fn repository_path(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    if host != REPOSITORY_HOST {
        return None;
    }
    let path = url.path().trim_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}
