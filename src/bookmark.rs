use std::fmt;

use chrono::{DateTime, Local, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, CaptureResult};
use crate::extractor::keywords::extract_keywords;
use crate::extractor::{collapse_whitespace, summarize, ExtractionResult, UNTITLED};
use crate::tagger::dedup_tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkType {
    Page,
    Link,
    Selection,
    Quick,
    Bookmark,
}

impl BookmarkType {
    /// Human label used in generated summaries.
    pub fn label(self) -> &'static str {
        match self {
            BookmarkType::Page => "page",
            BookmarkType::Link => "link",
            BookmarkType::Selection => "selected text",
            BookmarkType::Quick => "quick capture",
            BookmarkType::Bookmark => "manual bookmark",
        }
    }
}

impl fmt::Display for BookmarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookmarkType::Page => "page",
            BookmarkType::Link => "link",
            BookmarkType::Selection => "selection",
            BookmarkType::Quick => "quick",
            BookmarkType::Bookmark => "bookmark",
        };
        f.write_str(s)
    }
}

/// Raw input of one capture, before enrichment.
#[derive(Debug, Clone)]
pub struct CaptureInput {
    pub url: String,
    pub title: Option<String>,
    pub kind: BookmarkType,
    pub selection: Option<String>,
    pub note: String,
    pub favicon: Option<String>,
}

impl CaptureInput {
    pub fn new(url: impl Into<String>, kind: BookmarkType) -> Self {
        CaptureInput {
            url: url.into(),
            title: None,
            kind,
            selection: None,
            note: String::new(),
            favicon: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    pub url: String,
    pub title: String,
    pub tags: Vec<String>,
    pub note: String,
    pub favicon: Option<String>,
    pub domain: String,
    pub content: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub extracted_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: BookmarkType,
}

/// Host of an absolute URL with a leading `www.` removed.
pub fn domain_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Merge capture input, extraction and tags into the canonical record.
pub fn assemble(
    capture: CaptureInput,
    extraction: ExtractionResult,
    tags: Vec<String>,
) -> CaptureResult<BookmarkRecord> {
    let parsed =
        Url::parse(capture.url.trim()).map_err(|_| CaptureError::InvalidUrl(capture.url.clone()))?;
    let domain = domain_of(&parsed).ok_or_else(|| CaptureError::InvalidUrl(capture.url.clone()))?;

    let title = capture
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| Some(extraction.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| UNTITLED.to_string());

    // A selection replaces the page body as the record's content
    let selection = capture
        .selection
        .as_deref()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty());
    let (summary, keywords, content) = match selection {
        Some(text) => (summarize(&text), extract_keywords(&text), text),
        None => (extraction.summary, extraction.keywords, extraction.content),
    };

    Ok(BookmarkRecord {
        url: capture.url.trim().to_string(),
        title,
        tags: dedup_tags(tags),
        note: capture.note.trim().to_string(),
        favicon: capture.favicon.filter(|f| !f.is_empty()),
        domain,
        content,
        summary,
        keywords,
        extracted_at: extraction.timestamp,
        kind: capture.kind,
    })
}

impl BookmarkRecord {
    /// One-line description: origin, capture kind and note.
    pub fn generate_summary(&self) -> String {
        let domain = (!self.domain.is_empty()).then(|| format!("from {}", self.domain));
        let parts: Vec<String> = [
            domain,
            Some(self.kind.label().to_string()),
            Some(self.note.clone()),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();

        if parts.is_empty() {
            format!("page bookmark: {}", self.title)
        } else {
            parts.join(" - ")
        }
    }

    /// Markdown-like body. Sections without data are left out.
    pub fn generate_content(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let title = if self.title.is_empty() { UNTITLED } else { self.title.as_str() };

        lines.push(format!("# {}", title));
        lines.push(String::new());
        lines.push(format!("**URL**: {}", self.url));
        if !self.domain.is_empty() {
            lines.push(format!("**Domain**: {}", self.domain));
        }
        lines.push(format!("**Saved**: {}", format_timestamp(&self.extracted_at)));
        if !self.tags.is_empty() {
            lines.push(format!("**Tags**: {}", self.tags.join(", ")));
        }
        if !self.keywords.is_empty() {
            lines.push(format!("**Keywords**: {}", self.keywords.join(", ")));
        }

        let mut section = |heading: &str, body: &str| {
            lines.push(String::new());
            lines.push(format!("## {}", heading));
            lines.push(body.to_string());
        };
        if !self.note.is_empty() {
            section("Note", &self.note);
        }
        if !self.summary.is_empty() && self.summary != self.note {
            section("Summary", &self.summary);
        }
        if !self.content.is_empty() {
            section("Content", &self.content);
        }

        lines.join("\n")
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Shape of the document posted to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub uid: i64,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub source: String,
    pub favicon: String,
    pub tags: String,
    pub evaluate: i32,
}

impl RemoteDocument {
    pub fn from_record(record: &BookmarkRecord, uid: i64) -> Self {
        RemoteDocument {
            uid,
            url: record.url.clone(),
            title: if record.title.is_empty() {
                UNTITLED.to_string()
            } else {
                record.title.clone()
            },
            summary: record.generate_summary(),
            content: record.generate_content(),
            source: record.url.clone(),
            favicon: record.favicon.clone().unwrap_or_default(),
            tags: record.tags.join(", "),
            evaluate: 0,
        }
    }
}
