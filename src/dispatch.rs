use tracing::{debug, warn};

use crate::bookmark::BookmarkRecord;
use crate::error::CaptureResult;
use crate::pipeline::{CaptureContext, DraftEdits, Pipeline, Tab};
use crate::store::KvStore;
use crate::sync::Synced;

/// Context-menu entries the host registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    BookmarkPage,
    BookmarkLink,
    BookmarkSelection,
}

/// Keyboard shortcuts the host registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Ctrl+Shift+S
    QuickSave,
    /// Ctrl+Shift+D
    OpenEditor,
}

#[derive(Debug, Clone)]
pub enum HostEvent {
    Menu {
        item: MenuItem,
        tab: Tab,
        link_url: Option<String>,
        link_html: Option<String>,
        selection: Option<String>,
        tags: Vec<String>,
    },
    Shortcut {
        shortcut: Shortcut,
        tab: Tab,
        tags: Vec<String>,
    },
    /// The user confirmed an edited draft.
    Save {
        draft: BookmarkRecord,
        edits: DraftEdits,
    },
}

/// Which entry point an event lands on.
#[derive(Debug, Clone)]
pub enum Route {
    Quick {
        tab: Tab,
        context: CaptureContext,
        tags: Vec<String>,
    },
    Interactive {
        tab: Tab,
    },
    SaveDraft {
        draft: BookmarkRecord,
        edits: DraftEdits,
    },
    Ignore(&'static str),
}

#[derive(Debug)]
pub enum Outcome {
    Saved(Synced),
    Drafted(BookmarkRecord),
    Ignored(&'static str),
}

pub fn route(event: HostEvent) -> Route {
    match event {
        HostEvent::Menu {
            item: MenuItem::BookmarkPage,
            tab,
            ..
        } => Route::Interactive { tab },
        HostEvent::Menu {
            item: MenuItem::BookmarkLink,
            tab,
            link_url,
            link_html,
            tags,
            ..
        } => match link_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => Route::Quick {
                tab,
                context: CaptureContext::Link {
                    url: url.trim().to_string(),
                    target_html: link_html,
                },
                tags,
            },
            None => Route::Ignore("link menu used without a link"),
        },
        HostEvent::Menu {
            item: MenuItem::BookmarkSelection,
            tab,
            selection,
            tags,
            ..
        } => match selection.filter(|s| !s.trim().is_empty()) {
            Some(text) => Route::Quick {
                tab,
                context: CaptureContext::Selection { text },
                tags,
            },
            None => Route::Ignore("selection menu used without selected text"),
        },
        HostEvent::Shortcut {
            shortcut: Shortcut::QuickSave,
            tab,
            tags,
        } => Route::Quick {
            tab,
            context: CaptureContext::Page,
            tags,
        },
        HostEvent::Shortcut {
            shortcut: Shortcut::OpenEditor,
            tab,
            ..
        } => Route::Interactive { tab },
        HostEvent::Save { draft, edits } => Route::SaveDraft { draft, edits },
    }
}

/// Route an event and run the entry point it maps to.
pub async fn dispatch<S: KvStore + Clone>(pipeline: &mut Pipeline<S>, event: HostEvent) -> CaptureResult<Outcome> {
    match route(event) {
        Route::Quick { tab, context, tags } => {
            debug!("Quick capture of {}", tab.url);
            pipeline.capture_quick(&tab, context, tags).await.map(Outcome::Saved)
        }
        Route::Interactive { tab } => {
            debug!("Drafting {}", tab.url);
            pipeline.capture_interactive(&tab).map(Outcome::Drafted)
        }
        Route::SaveDraft { draft, edits } => pipeline.save_draft(draft, edits).await.map(Outcome::Saved),
        Route::Ignore(reason) => {
            warn!("Ignoring event: {}", reason);
            Ok(Outcome::Ignored(reason))
        }
    }
}
