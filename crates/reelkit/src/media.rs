use serde::{Deserialize, Serialize};

/// A single listing entry scraped from a card.
///
/// `page_url` is always absolute. `embed_url` stays empty until the embed
/// resolver has been run against `page_url`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration: Option<String>,
    pub view_count: Option<String>,
    pub relative_date: Option<String>,
    pub page_url: String,
    #[serde(default)]
    pub embed_url: String,
}

impl MediaRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            thumbnail_url: String::new(),
            duration: None,
            view_count: None,
            relative_date: None,
            page_url: page_url.into(),
            embed_url: String::new(),
        }
    }

    pub fn thumbnail_url(mut self, thumbnail_url: impl Into<String>) -> Self {
        self.thumbnail_url = thumbnail_url.into();
        self
    }

    pub fn duration_opt(mut self, duration: Option<String>) -> Self {
        self.duration = duration;
        self
    }

    pub fn view_count_opt(mut self, view_count: Option<String>) -> Self {
        self.view_count = view_count;
        self
    }

    pub fn relative_date_opt(mut self, relative_date: Option<String>) -> Self {
        self.relative_date = relative_date;
        self
    }

    /// Attaches the result of a separate embed resolution.
    pub fn attach_embed(&mut self, resolution: &EmbedResolution) {
        self.embed_url = resolution.embed_url.clone();
        if self.thumbnail_url.is_empty() && !resolution.thumbnail_url.is_empty() {
            self.thumbnail_url = resolution.thumbnail_url.clone();
        }
    }
}

/// One page of a subject's listing.
///
/// Constructed through [`PageResult::new`] so `has_more` always equals
/// `current_page < total_pages`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub subject: String,
    pub records: Vec<MediaRecord>,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

impl PageResult {
    pub fn new(
        subject: impl Into<String>,
        records: Vec<MediaRecord>,
        current_page: u32,
        total_pages: u32,
    ) -> Self {
        Self {
            subject: subject.into(),
            records,
            current_page,
            total_pages,
            has_more: current_page < total_pages,
        }
    }

    /// The degraded result every failure path returns.
    pub fn empty(subject: impl Into<String>, current_page: u32) -> Self {
        Self::new(subject, Vec::new(), current_page, current_page)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Playable media reference recovered from a watch page. Either field may be empty.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedResolution {
    pub embed_url: String,
    pub thumbnail_url: String,
}

impl EmbedResolution {
    pub fn is_empty(&self) -> bool {
        self.embed_url.is_empty() && self.thumbnail_url.is_empty()
    }
}
