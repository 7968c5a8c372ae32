//! Pure lookups over a watch page and over unpacked player configuration.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::extract::capture_group_1;

static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src]").unwrap());
static VIDEO_SOURCE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video source[src]").unwrap());
static VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video[src]").unwrap());
static DATA_URL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-embed], [data-src], [data-url]").unwrap());
static OG_IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name]").unwrap());

static MEDIA_URL_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#""?hls2"?\s*:\s*"([^"]+)""#).unwrap(),
        Regex::new(r#""?hls4"?\s*:\s*"([^"]+)""#).unwrap(),
        Regex::new(r#"file\s*:\s*"([^"]+)""#).unwrap(),
    ]
});

const DATA_URL_ATTRS: [&str; 3] = ["data-embed", "data-src", "data-url"];

/// Where on the page an embed reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedSource {
    Iframe,
    Video,
    DataAttribute,
}

/// First embed reference on the page: a keyword-matching iframe, then a
/// `<video>` source, then an absolute URL in a `data-*` attribute.
pub fn find_embed_url(
    document: &Html,
    page_url: &Url,
    keywords: &[String],
) -> Option<(String, EmbedSource)> {
    let iframe = document
        .select(&IFRAME_SELECTOR)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| {
            let lower = src.to_ascii_lowercase();
            keywords.iter().any(|k| lower.contains(&k.to_ascii_lowercase()))
        });
    if let Some(src) = iframe.and_then(|src| resolve(page_url, src)) {
        return Some((src, EmbedSource::Iframe));
    }

    let video = document
        .select(&VIDEO_SOURCE_SELECTOR)
        .chain(document.select(&VIDEO_SELECTOR))
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.starts_with("blob:"));
    if let Some(src) = video.and_then(|src| resolve(page_url, src)) {
        return Some((src, EmbedSource::Video));
    }

    document
        .select(&DATA_URL_SELECTOR)
        // Lazy-loaded thumbnails also use `data-src`.
        .filter(|el| el.value().name() != "img")
        .find_map(absolute_data_url)
        .map(|url| (url, EmbedSource::DataAttribute))
}

fn absolute_data_url(element: ElementRef<'_>) -> Option<String> {
    DATA_URL_ATTRS
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(str::trim)
        .find_map(|value| {
            if value.starts_with("https://") || value.starts_with("http://") {
                Some(value.to_string())
            } else {
                value.strip_prefix("//").map(|rest| format!("https://{rest}"))
            }
        })
}

fn resolve(page_url: &Url, src: &str) -> Option<String> {
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    page_url.join(src).ok().map(String::from)
}

/// `og:image`, falling back to the value of the hidden input named `input_name`.
pub fn find_thumbnail(document: &Html, input_name: &str) -> Option<String> {
    document
        .select(&OG_IMAGE_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .or_else(|| {
            document
                .select(&INPUT_SELECTOR)
                .filter(|input| input.value().attr("name") == Some(input_name))
                .filter_map(|input| input.value().attr("value"))
                .map(str::trim)
                .find(|value| !value.is_empty())
        })
        .map(ToOwned::to_owned)
}

/// Whether `embed_url`'s host belongs to one of the packed-player families.
pub fn is_obfuscated_host(embed_url: &str, families: &[String]) -> bool {
    let Ok(url) = Url::parse(embed_url) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    families
        .iter()
        .any(|family| host.contains(&family.to_ascii_lowercase()))
}

/// Media URL declared in unpacked player configuration: `hls2`, then `hls4`,
/// then `file`.
pub fn find_media_url(unpacked: &str) -> Option<String> {
    MEDIA_URL_PATTERNS
        .iter()
        .find_map(|re| capture_group_1(re, unpacked))
        .map(upgrade_protocol_relative)
}

fn upgrade_protocol_relative(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}
