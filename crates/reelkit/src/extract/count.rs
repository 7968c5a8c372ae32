//! Total-record detection and page arithmetic.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::utils::capture_group_1;

static OF_TOTAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bof\s+(\d{1,3}(?:,\d{3})+|\d+)\b").unwrap());
static TOTAL_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:"|&quot;)total(?:"|&quot;)\s*:\s*(\d+)"#).unwrap());
static COUNT_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:"|&quot;)count(?:"|&quot;)\s*:\s*(\d+)"#).unwrap());

fn parse_count(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

/// Total record count of a listing, searched in priority order: the visible
/// `of N` text, then a quoted `total` field, then a quoted `count` field in
/// the raw markup. First match wins.
pub fn find_total_records(text: &str, raw_html: &str) -> Option<u64> {
    capture_group_1(&OF_TOTAL_REGEX, text)
        .and_then(parse_count)
        .or_else(|| capture_group_1(&TOTAL_FIELD_REGEX, raw_html).and_then(parse_count))
        .or_else(|| capture_group_1(&COUNT_FIELD_REGEX, raw_html).and_then(parse_count))
}

/// [`find_total_records`] over a parsed document and the markup it came from.
pub fn find_total_in_html(document: &Html, raw_html: &str) -> Option<u64> {
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    find_total_records(&text, raw_html)
}

/// `ceil(total / page_size)`, never below `current_page`. Without a count, a
/// full page implies at least one more.
pub fn total_pages(
    total_records: Option<u64>,
    current_page: u32,
    records_on_page: usize,
    page_size: u32,
) -> u32 {
    let page_size = page_size.max(1);
    match total_records {
        Some(total) => {
            let pages = total.div_ceil(u64::from(page_size));
            u32::try_from(pages).unwrap_or(u32::MAX).max(current_page)
        }
        None if records_on_page >= page_size as usize => current_page.saturating_add(1),
        None => current_page,
    }
}
