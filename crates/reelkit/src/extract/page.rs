//! Landing-page metadata: the CSRF token and the listing component descriptor.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, trace};

static CSRF_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="csrf-token"]"#).unwrap());

/// Attribute holding a component's initial state as JSON.
pub const DESCRIPTOR_ATTR: &str = "wire:initial-data";

/// The protocol state a listing component declares on first render.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    pub name: String,
    pub fingerprint: Value,
    pub server_memo: Value,
}

impl ComponentDescriptor {
    /// Parse a descriptor attribute value. Entities are already decoded by the
    /// HTML parser; anything left encoded is decoded here.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => serde_json::from_str(&decode_entities(raw)).ok()?,
        };
        let fingerprint = value.get_mut("fingerprint")?.take();
        let server_memo = value.get_mut("serverMemo")?.take();
        let name = fingerprint.get("name")?.as_str()?.to_string();
        Some(Self {
            name,
            fingerprint,
            server_memo,
        })
    }
}

pub fn find_csrf_token(document: &Html) -> Option<String> {
    document
        .select(&CSRF_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

/// First component descriptor whose name matches `name_pattern`.
pub fn find_component_descriptor(
    document: &Html,
    name_pattern: &Regex,
) -> Option<ComponentDescriptor> {
    let mut seen = Vec::new();
    let found = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|element| element.value().attr(DESCRIPTOR_ATTR))
        .filter_map(|raw| {
            let descriptor = ComponentDescriptor::parse(raw);
            if descriptor.is_none() {
                trace!("unparseable component descriptor");
            }
            descriptor
        })
        .find(|descriptor| {
            let matched = name_pattern.is_match(&descriptor.name);
            if !matched {
                seen.push(descriptor.name.clone());
            }
            matched
        });
    if found.is_none() && !seen.is_empty() {
        debug!(components = ?seen, "no listing component among descriptors");
    }
    found
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
