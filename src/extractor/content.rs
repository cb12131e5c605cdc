use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{collapse_whitespace, Page};

/// A candidate must be longer than this (in characters) to be accepted.
pub const MIN_CONTENT_LEN: usize = 100;

/// Deeper subtrees are ignored.
const MAX_DEPTH: usize = 256;

/// Content containers in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    r#"[role="main"]"#,
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".post-body",
    ".markdown-body",
    ".rich_media_content",
    ".Post-RichText",
    "#js_content",
    ".content",
    "#content",
    "main",
    ".main-content",
];

const STRIP_SELECTOR: &str = "script, style, noscript, template, iframe, nav, header, footer, aside, \
     .ad, .ads, .advert, .advertisement, \
     .social, .share, .sharing, .social-share, \
     .comment, .comments, #comments, .comment-list";

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th",
    "section", "article", "main", "blockquote", "pre", "table", "dd", "dt", "figcaption",
];

static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .collect()
});

static STRIP: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse(STRIP_SELECTOR).ok());

/// Cleaned text of the first container that clears `MIN_CONTENT_LEN`, else of the whole body.
pub fn resolve_content(page: &Page) -> String {
    for selector in CONTAINERS.iter() {
        for candidate in page.select_all(selector) {
            let text = clean_text(candidate);
            if text.chars().count() > MIN_CONTENT_LEN {
                return text;
            }
        }
    }

    match page.body() {
        Some(body) => clean_text(body),
        None => clean_text(page.root()),
    }
}

/// Text of `element` with boilerplate subtrees removed and whitespace collapsed.
pub fn clean_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, STRIP.as_ref(), 0, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, strip: Option<&Selector>, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        return;
    }
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if strip.is_some_and(|s| s.matches(&child_el)) {
                continue;
            }
            collect_text(child_el, strip, depth + 1, out);
            if BLOCK_TAGS.contains(&child_el.value().name()) {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(word: &str) -> String {
        vec![word; 40].join(" ")
    }

    #[test]
    fn article_region_is_preferred() {
        let body = long_text("alpha");
        let html = format!(
            "<html><body><nav>Home About</nav><article><p>{}</p></article>\
             <div class=\"content\">{}</div></body></html>",
            body,
            long_text("beta")
        );
        let page = Page::parse("https://example.com", &html);
        assert_eq!(resolve_content(&page), body);
    }

    #[test]
    fn short_match_is_skipped_for_later_selector() {
        let real = long_text("gamma");
        let html = format!(
            "<html><body><article>Share this!</article>\
             <div class=\"entry-content\"><p>{}</p></div></body></html>",
            real
        );
        let page = Page::parse("https://example.com", &html);
        assert_eq!(resolve_content(&page), real);
    }

    #[test]
    fn boilerplate_is_stripped_inside_container() {
        let text = long_text("delta");
        let html = format!(
            "<html><body><article>\
               <header>Byline</header>\
               <script>var x = 1;</script>\
               <style>.a {{ color: red }}</style>\
               <p>{}</p>\
               <div class=\"social\">Tweet</div>\
               <aside>Related</aside>\
               <div class=\"comments\">First!</div>\
               <footer>Copyright</footer>\
             </article></body></html>",
            text
        );
        let page = Page::parse("https://example.com", &html);
        assert_eq!(resolve_content(&page), text);
    }

    #[test]
    fn falls_back_to_body_when_no_candidate_is_long_enough() {
        let html = "<html><body><main>tiny</main><p>rest of page</p><script>x()</script></body></html>";
        let page = Page::parse("https://example.com", html);
        assert_eq!(resolve_content(&page), "tiny rest of page");
    }

    #[test]
    fn block_elements_do_not_glue_words() {
        let html = "<html><body><p>one</p><p>two</p><span>th</span><span>ree</span></body></html>";
        let page = Page::parse("https://example.com", html);
        assert_eq!(resolve_content(&page), "one two three");
    }

    #[test]
    fn threshold_is_strictly_greater() {
        let exact = "x".repeat(MIN_CONTENT_LEN);
        let html = format!(
            "<html><body><article>{}</article><p>tail</p></body></html>",
            exact
        );
        let page = Page::parse("https://example.com", &html);
        assert_eq!(resolve_content(&page), format!("{} tail", exact));
    }
}
