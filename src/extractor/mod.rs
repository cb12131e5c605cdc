pub mod content;
pub mod keywords;
pub mod title;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bookmark::domain_of;

pub const SUMMARY_LEN: usize = 200;
pub const ELLIPSIS: &str = "...";
pub const UNTITLED: &str = "Untitled";

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Best-effort view of one captured page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub url: String,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
}

impl ExtractionResult {
    /// Result used when nothing could be read from the page.
    pub fn placeholder(url: &str) -> Self {
        ExtractionResult {
            title: UNTITLED.to_string(),
            content: String::new(),
            summary: String::new(),
            keywords: Vec::new(),
            url: url.to_string(),
            domain: domain_for(url),
            timestamp: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.content.is_empty()
    }
}

/// A loaded page: the parsed document plus the URL it was loaded from.
pub struct Page {
    url: String,
    document: Html,
}

impl Page {
    pub fn parse(url: &str, html: &str) -> Self {
        Page {
            url: url.to_string(),
            document: Html::parse_document(html),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(css).ok()?;
        self.document.select(&selector).next()
    }

    pub fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'_>> {
        self.document.select(selector).collect()
    }

    /// Collapsed text of the first match, if non-empty.
    pub fn first_text(&self, css: &str) -> Option<String> {
        let text = collapse_whitespace(&self.select_first(css)?.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    }

    /// `content` attribute of the first matching `<meta>`.
    pub fn meta_content(&self, css: &str) -> Option<String> {
        let value = self.select_first(css)?.value().attr("content")?.trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    pub fn body(&self) -> Option<ElementRef<'_>> {
        self.select_first("body")
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.document.root_element()
    }

    /// Icon declared by the page, resolved against the page URL, else `/favicon.ico`.
    pub fn favicon(&self) -> Option<String> {
        let base = Url::parse(&self.url).ok()?;
        let declared = self
            .select_first(r#"link[rel~="icon"]"#)
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| base.join(href.trim()).ok());
        match declared {
            Some(url) => Some(url.to_string()),
            None => base.join("/favicon.ico").ok().map(|u| u.to_string()),
        }
    }
}

/// Run the full extraction over a page. Never fails: missing pieces come back empty.
pub fn extract(page: &Page) -> ExtractionResult {
    let title = title::resolve_title(page);
    let content = content::resolve_content(page);
    let summary = summarize(&content);
    let keywords = keywords::extract_keywords(&content);

    let result = ExtractionResult {
        title,
        content,
        summary,
        keywords,
        url: page.url().to_string(),
        domain: domain_for(page.url()),
        timestamp: Utc::now(),
    };
    if result.is_degraded() {
        debug!("Extraction degraded for {}: no readable content", page.url());
    }
    result
}

/// Parse raw HTML and extract in one step, returning the page's favicon alongside.
/// The parsed document never outlives this call.
pub fn extract_html(url: &str, html: &str) -> (ExtractionResult, Option<String>) {
    if html.trim().is_empty() {
        debug!("Empty document for {}", url);
        return (ExtractionResult::placeholder(url), None);
    }
    let page = Page::parse(url, html);
    (extract(&page), page.favicon())
}

/// First `SUMMARY_LEN` characters, with `ELLIPSIS` appended only when truncated.
pub fn summarize(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(SUMMARY_LEN).collect();
    if chars.next().is_some() {
        format!("{}{}", head, ELLIPSIS)
    } else {
        head
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

fn domain_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| domain_of(&u))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_keeps_short_content_whole() {
        let content = "a".repeat(SUMMARY_LEN);
        assert_eq!(summarize(&content), content);
    }

    #[test]
    fn summary_truncates_long_content_with_marker() {
        let content = "é".repeat(SUMMARY_LEN + 1);
        let summary = summarize(&content);
        assert!(summary.ends_with(ELLIPSIS));
        let head = summary.trim_end_matches(ELLIPSIS);
        assert_eq!(head.chars().count(), SUMMARY_LEN);
        assert!(content.starts_with(head));
    }

    #[test]
    fn body_text_fallback_without_containers() {
        let body = "Plain page body with exactly fifty characters ok!!";
        assert_eq!(body.chars().count(), 50);
        let html = format!("<html><head><title>T</title></head><body><p>{}</p></body></html>", body);
        let (result, favicon) = extract_html("https://example.com/x", &html);
        assert_eq!(favicon.as_deref(), Some("https://example.com/favicon.ico"));
        assert_eq!(result.content, body);
        assert_eq!(result.summary, result.content);
        assert_eq!(result.domain, "example.com");
    }

    #[test]
    fn empty_document_degrades_to_placeholder() {
        let (result, favicon) = extract_html("https://www.example.org/", "   ");
        assert!(favicon.is_none());
        assert_eq!(result.title, UNTITLED);
        assert!(result.content.is_empty());
        assert!(result.summary.is_empty());
        assert!(result.keywords.is_empty());
        assert_eq!(result.domain, "example.org");
        assert!(result.is_degraded());
    }

    #[test]
    fn garbage_markup_does_not_panic() {
        let (result, _) = extract_html("not a url", "<div><<<>>><p>unterminated");
        assert_eq!(result.domain, "");
        assert_eq!(result.title, UNTITLED);
        assert!(result.content.contains("unterminated"));
    }

    #[test]
    fn favicon_prefers_declared_icon() {
        let page = Page::parse(
            "https://example.com/a/b",
            r#"<html><head><link rel="shortcut icon" href="/static/icon.png"></head></html>"#,
        );
        assert_eq!(
            page.favicon().as_deref(),
            Some("https://example.com/static/icon.png")
        );
    }

    #[test]
    fn favicon_falls_back_to_origin() {
        let page = Page::parse("https://example.com/a/b", "<html></html>");
        assert_eq!(page.favicon().as_deref(), Some("https://example.com/favicon.ico"));
    }

}
