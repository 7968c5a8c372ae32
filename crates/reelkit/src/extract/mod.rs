//! HTML record extraction.
//!
//! Listing pages render one "card" per media entry. The site ships more than
//! one card markup, so extraction runs an ordered list of [`CardStrategy`]
//! values and keeps the output of the first one that yields records.

pub mod count;
pub mod page;
mod utils;

pub use count::{find_total_in_html, find_total_records, total_pages};
pub use page::{ComponentDescriptor, DESCRIPTOR_ATTR, find_component_descriptor, find_csrf_token};
pub use utils::{absolutize, capture_group_1, capture_group_1_owned};

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use crate::error::{Result, ScrapeError};
use crate::media::MediaRecord;

static RELATIVE_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\s+\w+\s+ago)").unwrap());
static VIEW_COUNT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d.,KkMm]+)\s+views").unwrap());

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static MEDIA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("video, img").unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".title, .video-title, [data-title], h3, h2, h4").unwrap()
});
static DURATION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".duration, .video-duration, [data-duration]").unwrap()
});
static INFO_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".info, .video-info, .meta, .stats").unwrap()
});

/// One card markup variant.
pub struct CardStrategy {
    pub name: &'static str,
    selector: Selector,
}

impl CardStrategy {
    fn new(name: &'static str, selector: &str) -> Self {
        Self {
            name,
            // Strategy selectors are constants.
            selector: Selector::parse(selector).unwrap(),
        }
    }

    fn cards<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        document.select(&self.selector)
    }
}

static STRATEGIES: LazyLock<Vec<CardStrategy>> = LazyLock::new(|| {
    vec![
        // Grid layout: `<div class="video-card">` wrapping thumbnail, title and stats.
        CardStrategy::new("grid", ".video-card, .media-card"),
        // List layout used by the alternate theme.
        CardStrategy::new("list", "li.video-item, div.video-item, article.video"),
        // Last resort: any element tagged with a video id.
        CardStrategy::new("tagged", "[data-video-id]"),
    ]
});

/// Turns listing HTML into [`MediaRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    origin: String,
    path_marker: String,
}

impl RecordExtractor {
    pub fn new(origin: impl Into<String>, path_marker: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            path_marker: path_marker.into(),
        }
    }

    /// Extract records from a full document.
    pub fn extract_document(&self, html: &str) -> Vec<MediaRecord> {
        self.extract(&Html::parse_document(html))
    }

    /// Extract records from an HTML fragment, such as a protocol response.
    pub fn extract_fragment(&self, html: &str) -> Vec<MediaRecord> {
        self.extract(&Html::parse_fragment(html))
    }

    /// Records of the first strategy that finds any, in document order.
    pub fn extract(&self, document: &Html) -> Vec<MediaRecord> {
        for strategy in STRATEGIES.iter() {
            let records = self.run_strategy(strategy, document);
            if !records.is_empty() {
                debug!(
                    strategy = strategy.name,
                    count = records.len(),
                    "extracted records"
                );
                return records;
            }
        }
        trace!("no card strategy matched");
        Vec::new()
    }

    fn run_strategy(&self, strategy: &CardStrategy, document: &Html) -> Vec<MediaRecord> {
        let mut records = Vec::new();
        for card in strategy.cards(document) {
            match self.extract_card(card) {
                Ok(record) => records.push(record),
                Err(e) => trace!(strategy = strategy.name, error = %e, "skipping card"),
            }
        }
        records
    }

    /// Build a record from one card. The marker anchor is the only hard requirement.
    pub fn extract_card(&self, card: ElementRef<'_>) -> Result<MediaRecord> {
        let href = card
            .select(&ANCHOR_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.contains(&self.path_marker))
            .ok_or_else(|| ScrapeError::extraction("card has no watch anchor"))?;
        let page_url = absolutize(&self.origin, href);

        let id = ["data-video-id", "data-id"]
            .iter()
            .find_map(|attr| card.value().attr(attr))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| id_from_href(href, &self.path_marker));

        let title = card_title(card).unwrap_or_default();

        let thumbnail = card
            .select(&MEDIA_SELECTOR)
            .find_map(media_source)
            .map(|src| absolutize(&self.origin, src))
            .unwrap_or_default();

        let duration = card
            .select(&DURATION_SELECTOR)
            .next()
            .and_then(|el| last_non_empty_line(&element_text(el)));

        let info = card.select(&INFO_SELECTOR).next().map(element_text);
        let relative_date = info
            .as_deref()
            .and_then(|text| capture_group_1_owned(&RELATIVE_DATE_REGEX, text));
        let view_count = info
            .as_deref()
            .and_then(|text| capture_group_1_owned(&VIEW_COUNT_REGEX, text));

        Ok(MediaRecord::new(id, title, page_url)
            .thumbnail_url(thumbnail)
            .duration_opt(duration)
            .view_count_opt(view_count)
            .relative_date_opt(relative_date))
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn card_title(card: ElementRef<'_>) -> Option<String> {
    let from_heading = card.select(&TITLE_SELECTOR).next().and_then(|el| {
        el.value()
            .attr("data-title")
            .map(ToOwned::to_owned)
            .or_else(|| Some(collapse_whitespace(&element_text(el))))
    });
    from_heading
        .filter(|title| !title.is_empty())
        .or_else(|| {
            card.select(&ANCHOR_SELECTOR)
                .find_map(|a| a.value().attr("title"))
                .map(collapse_whitespace)
        })
        .or_else(|| {
            card.select(&MEDIA_SELECTOR)
                .find_map(|m| m.value().attr("alt"))
                .map(collapse_whitespace)
        })
        .filter(|title| !title.is_empty())
        .or_else(|| {
            card.select(&ANCHOR_SELECTOR)
                .next()
                .map(|a| collapse_whitespace(&element_text(a)))
        })
        .filter(|title| !title.is_empty())
}

/// `poster`, then `src`, then `data-src`. Inline `data:` placeholders do not count.
fn media_source<'a>(media: ElementRef<'a>) -> Option<&'a str> {
    ["poster", "src", "data-src"]
        .iter()
        .filter_map(|attr| media.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty() && !value.starts_with("data:"))
}

fn last_non_empty_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(ToOwned::to_owned)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Path segment after the marker, else the first query value, else the whole href.
fn id_from_href(href: &str, marker: &str) -> String {
    let rest = href.split_once(marker).map_or(href, |(_, rest)| rest);
    let segment = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if !segment.is_empty() {
        return segment.to_string();
    }

    rest.split_once('?')
        .and_then(|(_, query)| {
            query
                .split(['&', '#'])
                .filter_map(|pair| pair.split_once('='))
                .map(|(_, value)| value.trim())
                .find(|value| !value.is_empty())
        })
        .unwrap_or(href.trim())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://videos.test";

    fn extractor() -> RecordExtractor {
        RecordExtractor::new(ORIGIN, "/watch/")
    }

    const GRID: &str = r#"
        <div class="grid">
          <div class="video-card">
            <a href="/watch/abc" title="Anchor title"><img src="/thumbs/abc.jpg" alt="alt"></a>
            <h3 class="title">  First   clip </h3>
            <span class="duration">
              HD
              12:34
            </span>
            <div class="info">3 days ago · 1.2K views</div>
          </div>
          <div class="video-card">
            <a href="/profile/bob">no watch link</a>
          </div>
          <div class="video-card" data-id="xyz">
            <a href="https://other.example/watch/xyz"><video poster="https://cdn.test/p.jpg" src="/v.mp4"></video></a>
            <div class="info">no stats</div>
          </div>
        </div>
    "#;

    #[test]
    fn test_grid_cards() {
        let records = extractor().extract_fragment(GRID);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "abc");
        assert_eq!(first.title, "First clip");
        assert_eq!(first.page_url, "https://videos.test/watch/abc");
        assert_eq!(first.thumbnail_url, "https://videos.test/thumbs/abc.jpg");
        assert_eq!(first.duration.as_deref(), Some("12:34"));
        assert_eq!(first.relative_date.as_deref(), Some("3 days ago"));
        assert_eq!(first.view_count.as_deref(), Some("1.2K"));
        assert!(first.embed_url.is_empty());

        let second = &records[1];
        assert_eq!(second.id, "xyz");
        assert_eq!(second.page_url, "https://other.example/watch/xyz");
        assert_eq!(second.thumbnail_url, "https://cdn.test/p.jpg");
        assert_eq!(second.duration, None);
        assert_eq!(second.relative_date, None);
        assert_eq!(second.view_count, None);
    }

    #[test]
    fn test_missing_duration_keeps_other_fields() {
        let html = r#"<div class="video-card"><a href="/watch/q1" title="Q"><img data-src="/t/q1.jpg"></a><div class="info">5 hours ago 10 views</div></div>"#;
        let records = extractor().extract_fragment(html);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.duration, None);
        assert_eq!(record.title, "Q");
        assert_eq!(record.thumbnail_url, "https://videos.test/t/q1.jpg");
        assert_eq!(record.relative_date.as_deref(), Some("5 hours ago"));
        assert_eq!(record.view_count.as_deref(), Some("10"));
    }

    #[test]
    fn test_list_variant() {
        let html = r#"
            <ul>
              <li class="video-item"><a href="/watch/l1">One</a><img src="data:image/gif;base64,R0" data-src="https://cdn.test/l1.jpg"></li>
              <li class="video-item"><a href="/watch/l2?t=1">Two</a></li>
            </ul>"#;
        let records = extractor().extract_document(html);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["l1", "l2"]);
        assert_eq!(records[1].title, "Two");
        assert_eq!(records[0].thumbnail_url, "https://cdn.test/l1.jpg");
        assert!(records[1].thumbnail_url.is_empty());
    }

    #[test]
    fn test_first_matching_strategy_wins() {
        let html = r#"
            <div class="video-card"><a href="/watch/g1">G</a></div>
            <div data-video-id="t1"><a href="/watch/t1">T</a></div>"#;
        let records = extractor().extract_fragment(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "g1");
    }

    #[test]
    fn test_id_falls_back_to_query_then_href() {
        let html = r#"
            <div class="video-card"><a href="/watch/?v=abc">Query</a></div>
            <div class="video-card"><a href="/watch/">Bare</a></div>"#;
        let records = extractor().extract_fragment(html);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["abc", "/watch/"]);
        assert_eq!(records[0].page_url, "https://videos.test/watch/?v=abc");
    }

    #[test]
    fn test_no_cards() {
        assert!(extractor().extract_document("<html><body><p>nothing</p></body></html>").is_empty());
        assert!(extractor().extract_fragment("").is_empty());
    }

    #[test]
    fn test_last_non_empty_line() {
        assert_eq!(last_non_empty_line("a\n b \n\n").as_deref(), Some("b"));
        assert_eq!(last_non_empty_line(" \n "), None);
    }
}
