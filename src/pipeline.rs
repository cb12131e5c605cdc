use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bookmark::{assemble, BookmarkRecord, BookmarkType, CaptureInput};
use crate::cache::LocalCache;
use crate::config::Config;
use crate::error::{CaptureResult, StoreError};
use crate::extractor::{extract_html, ExtractionResult, UNTITLED};
use crate::fetch::FetchedPage;
use crate::store::KvStore;
use crate::sync::{SyncClient, Synced};
use crate::tagger::{dedup_tags, suggest_tags};

pub const DRAFT_KEY: &str = "draft";
pub const LINK_TAG: &str = "链接";
pub const SELECTION_TAGS: &[&str] = &["选中内容", "文本"];

/// The page a capture starts from, as the host sees it.
#[derive(Debug, Clone, Default)]
pub struct Tab {
    pub url: String,
    pub title: Option<String>,
    pub favicon: Option<String>,
    /// Loaded document, when the host could read it.
    pub html: Option<String>,
}

/// What exactly was captured on the tab.
#[derive(Debug, Clone)]
pub enum CaptureContext {
    Page,
    Link {
        url: String,
        target_html: Option<String>,
    },
    Selection {
        text: String,
    },
}

/// User edits applied to a draft before it is saved.
#[derive(Debug, Clone, Default)]
pub struct DraftEdits {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub note: Option<String>,
}

/// Tally of a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub synced: usize,
    pub local_only: usize,
    pub failed: usize,
}

pub struct Pipeline<S> {
    config: Config,
    store: S,
    cache: LocalCache<S>,
    sync: SyncClient,
}

impl<S: KvStore + Clone> Pipeline<S> {
    pub fn new(config: Config, store: S) -> Self {
        let sync = SyncClient::new(config.sync_settings());
        Pipeline {
            cache: LocalCache::new(store.clone()),
            store,
            sync,
            config,
        }
    }

    pub fn cache(&mut self) -> &mut LocalCache<S> {
        &mut self.cache
    }

    /// Capture without user interaction: extract, tag, assemble, sync, persist.
    pub async fn capture_quick(
        &mut self,
        tab: &Tab,
        context: CaptureContext,
        tags: Vec<String>,
    ) -> CaptureResult<Synced> {
        let tab_title = tab.title.clone().filter(|t| !t.trim().is_empty());

        let (input, extraction, context_tags) = match context {
            CaptureContext::Page => {
                let (extraction, favicon) = read_document(&tab.url, tab.html.as_deref());
                let mut input = CaptureInput::new(tab.url.clone(), BookmarkType::Quick);
                input.title = tab_title;
                input.note = "Saved via quick capture".to_string();
                input.favicon = tab.favicon.clone().or(favicon);
                (input, extraction, Vec::new())
            }
            CaptureContext::Link { url, target_html } => {
                let (extraction, favicon) = read_document(&url, target_html.as_deref());
                let mut input = CaptureInput::new(url.clone(), BookmarkType::Link);
                input.favicon = favicon;
                input.title = Some(extraction.title.clone())
                    .filter(|t| t != UNTITLED)
                    .or(Some(url));
                input.note = format!("Link saved from {}", tab_title.as_deref().unwrap_or(&tab.url));
                (input, extraction, vec![LINK_TAG.to_string()])
            }
            CaptureContext::Selection { text } => {
                let (extraction, favicon) = read_document(&tab.url, tab.html.as_deref());
                let page_title = tab_title.unwrap_or_else(|| extraction.title.clone());
                let mut input = CaptureInput::new(tab.url.clone(), BookmarkType::Selection);
                input.title = Some(format!("{} - selection", page_title));
                input.note = format!("Selected from {}", page_title);
                input.selection = Some(text);
                input.favicon = tab.favicon.clone().or(favicon);
                let context_tags: Vec<String> = SELECTION_TAGS.iter().map(|t| t.to_string()).collect();
                (input, extraction, context_tags)
            }
        };

        let auto_tags = self.auto_tags(&input, &extraction);
        let all_tags = dedup_tags(tags.into_iter().chain(context_tags).chain(auto_tags));

        // Malformed URLs stop here, before anything is persisted
        let record = assemble(input, extraction, all_tags)?;
        info!("Captured {} ({}) with tags [{}]", record.url, record.kind, record.tags.join(", "));
        self.sync.sync_and_persist(record, &mut self.cache).await
    }

    /// Build an editable draft of the tab. Nothing is persisted.
    pub fn capture_interactive(&self, tab: &Tab) -> CaptureResult<BookmarkRecord> {
        let (extraction, favicon) = read_document(&tab.url, tab.html.as_deref());
        let mut input = CaptureInput::new(tab.url.clone(), BookmarkType::Bookmark);
        input.title = tab.title.clone().filter(|t| !t.trim().is_empty());
        input.favicon = tab.favicon.clone().or(favicon);

        let auto_tags = self.auto_tags(&input, &extraction);
        let tags = dedup_tags(self.config.prefill_tags().into_iter().chain(auto_tags));
        assemble(input, extraction, tags)
    }

    /// Apply the user's edits to a draft and run it through sync and persistence.
    /// The stashed draft is cleared once the record is kept somewhere, and left for a retry otherwise.
    pub async fn save_draft(&mut self, draft: BookmarkRecord, edits: DraftEdits) -> CaptureResult<Synced> {
        let record = apply_edits(draft, edits);
        let result = self.sync.sync_and_persist(record, &mut self.cache).await;
        let kept = match &result {
            Ok(_) => true,
            Err(e) => e.is_sync_failure(),
        };
        if kept {
            if let Err(e) = self.store.set_one(DRAFT_KEY, Value::Null) {
                warn!("Saved draft could not be cleared: {}", e);
            }
        } else {
            warn!("Draft kept for retry");
        }
        result
    }

    /// Capture many fetched pages. Extraction runs in parallel, sync runs in order.
    pub async fn capture_batch(&mut self, pages: Vec<FetchedPage>, tags: &[String]) -> BatchReport {
        let mut prepared = Vec::with_capacity(pages.len());
        for chunk in pages.chunks(500) {
            let results: Vec<_> = chunk
                .par_iter()
                .map(|page| {
                    if let Some(error) = &page.error {
                        debug!("{} unavailable after {}ms: {}", page.url, page.latency_ms, error);
                    }
                    let (extraction, favicon) = read_document(&page.url, page.html.as_deref());
                    (page.url.clone(), extraction, favicon)
                })
                .collect();
            prepared.extend(results);
        }

        let mut report = BatchReport::default();
        for (url, extraction, favicon) in prepared {
            let mut input = CaptureInput::new(url, BookmarkType::Page);
            input.favicon = favicon;
            let auto_tags = self.auto_tags(&input, &extraction);
            let all_tags = dedup_tags(tags.iter().map(String::as_str).chain(auto_tags.iter().map(String::as_str)));

            let record = match assemble(input, extraction, all_tags) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping batch entry: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            match self.sync.sync_and_persist(record, &mut self.cache).await {
                Ok(_) => report.synced += 1,
                Err(e) if e.is_sync_failure() => report.local_only += 1,
                Err(_) => report.failed += 1,
            }
        }
        info!(
            "Batch done: {} synced, {} local only, {} failed",
            report.synced, report.local_only, report.failed
        );
        report
    }

    /// Keep a draft around until the user saves it.
    pub fn stash_draft(&self, draft: &BookmarkRecord) -> CaptureResult<()> {
        let value = serde_json::to_value(draft).map_err(StoreError::from)?;
        self.store.set_one(DRAFT_KEY, value)?;
        Ok(())
    }

    /// The stashed draft, if any. Reading leaves it in place.
    pub fn load_draft(&self) -> CaptureResult<Option<BookmarkRecord>> {
        match self.store.get_one(DRAFT_KEY)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value).map_err(StoreError::from)?)),
        }
    }

    fn auto_tags(&self, input: &CaptureInput, extraction: &ExtractionResult) -> Vec<String> {
        if !self.config.auto_tags {
            return Vec::new();
        }
        let title = input.title.as_deref().unwrap_or(&extraction.title);
        suggest_tags(&input.url, title)
    }
}

/// Extraction plus favicon, or a placeholder when the host had no document.
fn read_document(url: &str, html: Option<&str>) -> (ExtractionResult, Option<String>) {
    match html {
        Some(html) => extract_html(url, html),
        None => {
            debug!("No document for {}, using placeholder extraction", url);
            (ExtractionResult::placeholder(url), None)
        }
    }
}

fn apply_edits(draft: BookmarkRecord, edits: DraftEdits) -> BookmarkRecord {
    BookmarkRecord {
        title: edits
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or(draft.title),
        tags: edits.tags.map(dedup_tags).unwrap_or(draft.tags),
        note: edits.note.map(|n| n.trim().to_string()).unwrap_or(draft.note),
        ..draft
    }
}
