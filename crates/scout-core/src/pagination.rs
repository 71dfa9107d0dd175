//! Pagination state machine.
//!
//! Each site's [`PaginationConfig`] becomes a [`Paginator`] that, given the
//! page just visited, decides where to go next:
//!
//! ```text
//! Single        --advance-->  Exhausted
//! NextButton    --advance-->  Next(href of next control) | Exhausted   (also on a revisit)
//! NumberedLinks --advance-->  Next(queued link)          | Exhausted   (queue filled from page 1)
//! UrlPattern    --advance-->  Next(pattern with n+1)
//!
//! any candidate once visited >= ceiling              -->  SafetyLimit
//! ```
//!
//! The ceiling is `min(max_pages, GLOBAL_SAFETY_CEILING)`; the page that would
//! exceed it is never handed out. Relative links resolve against the
//! document's `<base href>` when it has one, else against the page URL.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::config::{PAGE_PLACEHOLDER, PaginationConfig, SiteConfig, parse_selector};
use crate::driver::RenderedPage;
use crate::error::AppError;

/// Hard upper bound on pages visited per site.
pub const GLOBAL_SAFETY_CEILING: u32 = 20;

static BASE_HREF: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("base selector is valid"));

/// Outcome of asking the paginator for the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTurn {
    /// Fetch this URL next.
    Next(String),
    /// The site has no further pages.
    Exhausted,
    /// More pages may exist but the page ceiling has been reached.
    SafetyLimit,
}

#[derive(Debug)]
enum Strategy {
    Single,
    NextButton {
        selector: Selector,
        /// Pages already handed out, start URL included.
        seen: HashSet<String>,
    },
    NumberedLinks {
        selector: Selector,
        queue: VecDeque<String>,
        collected: bool,
    },
    UrlPattern {
        pattern: String,
    },
}

/// Per-site pagination state.
#[derive(Debug)]
pub struct Paginator {
    strategy: Strategy,
    start_url: String,
    ceiling: u32,
    visited: u32,
}

impl Paginator {
    pub fn new(site: &SiteConfig) -> Result<Self, AppError> {
        let strategy = match &site.pagination {
            None => Strategy::Single,
            Some(PaginationConfig::NextButton { next_selector, .. }) => Strategy::NextButton {
                selector: parse_selector("pagination.next_selector", next_selector)?,
                seen: Url::parse(&site.url)
                    .map(String::from)
                    .into_iter()
                    .collect(),
            },
            Some(PaginationConfig::NumberedLinks { links_selector, .. }) => {
                Strategy::NumberedLinks {
                    selector: parse_selector("pagination.links_selector", links_selector)?,
                    queue: VecDeque::new(),
                    collected: false,
                }
            }
            Some(PaginationConfig::UrlPattern { url_pattern, .. }) => Strategy::UrlPattern {
                pattern: url_pattern.clone(),
            },
        };

        Ok(Self {
            strategy,
            start_url: site.url.clone(),
            ceiling: site.page_ceiling(),
            visited: 0,
        })
    }

    /// Pages visited (or attempted) so far.
    pub fn pages_visited(&self) -> u32 {
        self.visited
    }

    /// Record the page just visited and decide what comes next.
    ///
    /// `current` is `None` when the page could not be loaded; strategies that
    /// need the document to continue then report exhaustion.
    pub fn advance(&mut self, current: Option<&RenderedPage>) -> PageTurn {
        self.visited += 1;

        let candidate = match &mut self.strategy {
            Strategy::Single => None,
            Strategy::NextButton { selector, seen } => {
                if let Some(page) = current {
                    seen.insert(page.url().to_string());
                }
                current
                    .and_then(|page| find_next_link(page, selector))
                    .filter(|next| {
                        let fresh = seen.insert(next.clone());
                        if !fresh {
                            tracing::debug!(url = %next, "Next link leads back to a visited page");
                        }
                        fresh
                    })
            }
            Strategy::NumberedLinks {
                selector,
                queue,
                collected,
            } => {
                if !*collected {
                    if let Some(page) = current {
                        *queue = collect_page_links(page, selector, &self.start_url);
                        tracing::debug!(links = queue.len(), "Collected numbered page links");
                    }
                    *collected = true;
                }
                queue.front().cloned()
            }
            Strategy::UrlPattern { pattern } => {
                Some(pattern.replace(PAGE_PLACEHOLDER, &(self.visited + 1).to_string()))
            }
        };

        match candidate {
            None => PageTurn::Exhausted,
            Some(_) if self.visited >= self.ceiling => PageTurn::SafetyLimit,
            Some(url) => {
                if let Strategy::NumberedLinks { queue, .. } = &mut self.strategy {
                    queue.pop_front();
                }
                PageTurn::Next(url)
            }
        }
    }
}

/// The URL relative links resolve against: a usable `<base href>`, else the
/// page URL.
pub(crate) fn document_base(document: &Html, page_url: &Url) -> Url {
    document
        .select(&BASE_HREF)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_href(page_url, href))
        .unwrap_or_else(|| page_url.clone())
}

/// Resolve an `href` against `base`, keeping only http(s) targets.
pub(crate) fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn find_next_link(page: &RenderedPage, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(page.rendered_html());
    let href = document
        .select(selector)
        .find_map(|el| el.value().attr("href").map(str::to_owned))?;
    let next = resolve_href(&document_base(&document, page.url()), &href)?;
    if next == *page.url() {
        return None;
    }
    Some(next.into())
}

fn collect_page_links(page: &RenderedPage, selector: &Selector, start_url: &str) -> VecDeque<String> {
    let document = Html::parse_document(page.rendered_html());
    let base = document_base(&document, page.url());
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(page.url().to_string());
    if let Ok(start) = Url::parse(start_url) {
        seen.insert(start.to_string());
    }

    document
        .select(selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_href(&base, href))
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::site_config;

    fn page(url: &str, html: &str) -> RenderedPage {
        RenderedPage::new(Url::parse(url).unwrap(), html.to_string())
    }

    fn next_button_site(max_pages: Option<u32>) -> SiteConfig {
        site_config("https://jobs.example.com/list").with_pagination(PaginationConfig::NextButton {
            next_selector: "a.next".into(),
            max_pages,
        })
    }

    #[test]
    fn single_page_exhausts_immediately() {
        let mut paginator = Paginator::new(&site_config("https://jobs.example.com/")).unwrap();
        let current = page("https://jobs.example.com/", "<ul></ul>");
        assert_eq!(paginator.advance(Some(&current)), PageTurn::Exhausted);
        assert_eq!(paginator.pages_visited(), 1);
    }

    #[test]
    fn next_button_follows_relative_href() {
        let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
        let current = page(
            "https://jobs.example.com/list",
            r#"<a class="next" href="/list?page=2">Next</a>"#,
        );
        assert_eq!(
            paginator.advance(Some(&current)),
            PageTurn::Next("https://jobs.example.com/list?page=2".into())
        );
    }

    #[test]
    fn next_button_absent_is_terminal() {
        let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
        let current = page("https://jobs.example.com/list", "<span>last page</span>");
        assert_eq!(paginator.advance(Some(&current)), PageTurn::Exhausted);
    }

    #[test]
    fn next_button_without_usable_href_is_terminal() {
        for html in [
            r#"<a class="next">Next</a>"#,
            r##"<a class="next" href="#">Next</a>"##,
            r#"<a class="next" href="javascript:void(0)">Next</a>"#,
            r#"<a class="next" href="/list">Next</a>"#,
        ] {
            let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
            let current = page("https://jobs.example.com/list", html);
            assert_eq!(paginator.advance(Some(&current)), PageTurn::Exhausted, "{html}");
        }
    }

    #[test]
    fn next_button_cycle_is_terminal() {
        let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
        let first = page(
            "https://jobs.example.com/list",
            r#"<a class="next" href="/list?page=2">Next</a>"#,
        );
        let second = page(
            "https://jobs.example.com/list?page=2",
            r#"<a class="next" href="/list">Next</a>"#,
        );

        assert!(matches!(paginator.advance(Some(&first)), PageTurn::Next(_)));
        assert_eq!(paginator.advance(Some(&second)), PageTurn::Exhausted);
    }

    #[test]
    fn next_button_longer_cycle_is_terminal() {
        let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
        let pages = [
            page("https://jobs.example.com/list", r#"<a class="next" href="?page=2">n</a>"#),
            page("https://jobs.example.com/list?page=2", r#"<a class="next" href="?page=3">n</a>"#),
            page("https://jobs.example.com/list?page=3", r#"<a class="next" href="?page=2">n</a>"#),
        ];

        assert!(matches!(paginator.advance(Some(&pages[0])), PageTurn::Next(_)));
        assert!(matches!(paginator.advance(Some(&pages[1])), PageTurn::Next(_)));
        assert_eq!(paginator.advance(Some(&pages[2])), PageTurn::Exhausted);
        assert_eq!(paginator.pages_visited(), 3);
    }

    #[test]
    fn next_button_honors_base_href() {
        let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
        let current = page(
            "https://jobs.example.com/list",
            r#"<html><head><base href="https://jobs.example.com/v2/"></head>
               <body><a class="next" href="list?page=2">Next</a></body></html>"#,
        );
        assert_eq!(
            paginator.advance(Some(&current)),
            PageTurn::Next("https://jobs.example.com/v2/list?page=2".into())
        );
    }

    #[test]
    fn next_button_failed_page_is_terminal() {
        let mut paginator = Paginator::new(&next_button_site(None)).unwrap();
        assert_eq!(paginator.advance(None), PageTurn::Exhausted);
    }

    #[test]
    fn next_button_stops_at_max_pages() {
        let mut paginator = Paginator::new(&next_button_site(Some(2))).unwrap();
        let first = page(
            "https://jobs.example.com/list",
            r#"<a class="next" href="/list?page=2">Next</a>"#,
        );
        let second = page(
            "https://jobs.example.com/list?page=2",
            r#"<a class="next" href="/list?page=3">Next</a>"#,
        );
        assert!(matches!(paginator.advance(Some(&first)), PageTurn::Next(_)));
        assert_eq!(paginator.advance(Some(&second)), PageTurn::SafetyLimit);
    }

    #[test]
    fn numbered_links_visit_each_unique_link_once_in_order() {
        let site = site_config("https://jobs.example.com/list").with_pagination(
            PaginationConfig::NumberedLinks {
                links_selector: ".pages a".into(),
                max_pages: None,
            },
        );
        let mut paginator = Paginator::new(&site).unwrap();
        let first = page(
            "https://jobs.example.com/list",
            r#"<div class="pages">
                 <a href="/list">1</a>
                 <a href="/list?p=3">3</a>
                 <a href="/list?p=2">2</a>
                 <a href="/list?p=3">3</a>
                 <a href="https://jobs.example.com/list?p=4">4</a>
               </div>"#,
        );

        let mut visited = Vec::new();
        let mut current = Some(first);
        loop {
            match paginator.advance(current.as_ref()) {
                PageTurn::Next(url) => {
                    current = Some(page(&url, "<p>later page, no links</p>"));
                    visited.push(url);
                }
                turn => {
                    assert_eq!(turn, PageTurn::Exhausted);
                    break;
                }
            }
        }

        assert_eq!(
            visited,
            vec![
                "https://jobs.example.com/list?p=3",
                "https://jobs.example.com/list?p=2",
                "https://jobs.example.com/list?p=4",
            ]
        );
        assert_eq!(paginator.pages_visited(), 4);
    }

    #[test]
    fn numbered_links_never_exceed_max_pages() {
        let site = site_config("https://jobs.example.com/list").with_pagination(
            PaginationConfig::NumberedLinks {
                links_selector: ".pages a".into(),
                max_pages: Some(2),
            },
        );
        let mut paginator = Paginator::new(&site).unwrap();
        let first = page(
            "https://jobs.example.com/list",
            r#"<div class="pages"><a href="?p=2">2</a><a href="?p=3">3</a><a href="?p=4">4</a></div>"#,
        );

        assert_eq!(
            paginator.advance(Some(&first)),
            PageTurn::Next("https://jobs.example.com/list?p=2".into())
        );
        assert_eq!(paginator.advance(None), PageTurn::SafetyLimit);
    }

    #[test]
    fn numbered_links_continue_past_failed_page() {
        let site = site_config("https://jobs.example.com/list").with_pagination(
            PaginationConfig::NumberedLinks {
                links_selector: ".pages a".into(),
                max_pages: None,
            },
        );
        let mut paginator = Paginator::new(&site).unwrap();
        let first = page(
            "https://jobs.example.com/list",
            r#"<div class="pages"><a href="?p=2">2</a><a href="?p=3">3</a></div>"#,
        );
        assert!(matches!(paginator.advance(Some(&first)), PageTurn::Next(_)));
        assert_eq!(
            paginator.advance(None),
            PageTurn::Next("https://jobs.example.com/list?p=3".into())
        );
        assert_eq!(paginator.advance(None), PageTurn::Exhausted);
    }

    #[test]
    fn url_pattern_counts_up_and_stops_at_ceiling() {
        let site = site_config("https://jobs.example.com/search?page=1").with_pagination(
            PaginationConfig::UrlPattern {
                url_pattern: "https://jobs.example.com/search?page={page}".into(),
                max_pages: Some(3),
            },
        );
        let mut paginator = Paginator::new(&site).unwrap();
        let any = page("https://jobs.example.com/search?page=1", "<ul></ul>");

        assert_eq!(
            paginator.advance(Some(&any)),
            PageTurn::Next("https://jobs.example.com/search?page=2".into())
        );
        assert_eq!(
            paginator.advance(Some(&any)),
            PageTurn::Next("https://jobs.example.com/search?page=3".into())
        );
        assert_eq!(paginator.advance(Some(&any)), PageTurn::SafetyLimit);
        assert_eq!(paginator.pages_visited(), 3);
    }

    #[test]
    fn url_pattern_uses_global_ceiling_by_default() {
        let site = site_config("https://jobs.example.com/search").with_pagination(
            PaginationConfig::UrlPattern {
                url_pattern: "https://jobs.example.com/search?page={page}".into(),
                max_pages: None,
            },
        );
        let mut paginator = Paginator::new(&site).unwrap();

        let mut next_urls = 0;
        while let PageTurn::Next(_) = paginator.advance(None) {
            next_urls += 1;
        }
        assert_eq!(next_urls, GLOBAL_SAFETY_CEILING - 1);
        assert_eq!(paginator.pages_visited(), GLOBAL_SAFETY_CEILING);
    }

    #[test]
    fn resolve_href_rejects_non_http() {
        let base = Url::parse("https://example.com/a/b").unwrap();
        assert_eq!(
            resolve_href(&base, "c?x=1").map(String::from),
            Some("https://example.com/a/c?x=1".to_string())
        );
        assert!(resolve_href(&base, "mailto:jobs@example.com").is_none());
        assert!(resolve_href(&base, "  ").is_none());
        assert!(resolve_href(&base, "#top").is_none());
    }
}
