use anyhow::Result;
#[cfg(feature = "colored-output")]
use colored::*;
use reelkit::{EmbedResolution, MediaRecord, PageResult};
use serde::Serialize;

use crate::cli::OutputFormat;

/// Unpacked scripts and the media URL found in them, if any.
#[derive(Debug, Serialize)]
pub struct UnpackReport<'a> {
    pub blocks: &'a [String],
    pub media_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ResolveReport<'a> {
    url: &'a str,
    #[serde(flatten)]
    resolution: &'a EmbedResolution,
}

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_page(&self, page: &PageResult, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_page_pretty(page)),
            OutputFormat::Json => to_json(page, true),
            OutputFormat::JsonCompact => to_json(page, false),
        }
    }

    pub fn format_resolution(
        &self,
        url: &str,
        resolution: &EmbedResolution,
        format: OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_resolution_pretty(url, resolution)),
            OutputFormat::Json => to_json(&ResolveReport { url, resolution }, true),
            OutputFormat::JsonCompact => to_json(&ResolveReport { url, resolution }, false),
        }
    }

    pub fn format_unpacked(&self, report: &UnpackReport<'_>, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_unpacked_pretty(report)),
            OutputFormat::Json => to_json(report, true),
            OutputFormat::JsonCompact => to_json(report, false),
        }
    }

    fn format_page_pretty(&self, page: &PageResult) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize(
            &format!(
                "{} - page {} of {}",
                page.subject, page.current_page, page.total_pages
            ),
            &Color::Green,
            true,
        ));
        output.push('\n');

        if page.records.is_empty() {
            output.push_str("  No records\n");
            return output;
        }

        for (i, record) in page.records.iter().enumerate() {
            output.push_str(&self.format_record(i + 1, record));
        }

        if page.has_more {
            output.push_str(&format!(
                "\n{}\n",
                self.colorize(
                    &format!("More available: --page {}", page.current_page + 1),
                    &Color::Yellow,
                    false
                )
            ));
        }
        output
    }

    fn format_record(&self, index: usize, record: &MediaRecord) -> String {
        let mut output = format!(
            "\n{} {}\n",
            self.colorize(&format!("{index:>3}."), &Color::Yellow, true),
            self.colorize(&record.title, &Color::Cyan, true)
        );

        let mut field = |name: &str, value: &str, color: Color| {
            if !value.is_empty() {
                output.push_str(&format!(
                    "     {}: {}\n",
                    self.colorize(name, &Color::Yellow, false),
                    self.colorize(value, &color, false)
                ));
            }
        };
        field("ID", &record.id, Color::Cyan);
        field("Page", &record.page_url, Color::Blue);
        field("Thumbnail", &record.thumbnail_url, Color::Blue);
        field("Duration", record.duration.as_deref().unwrap_or_default(), Color::Cyan);
        field("Views", record.view_count.as_deref().unwrap_or_default(), Color::Cyan);
        field("Added", record.relative_date.as_deref().unwrap_or_default(), Color::Cyan);
        field("Embed", &record.embed_url, Color::Green);
        output
    }

    fn format_resolution_pretty(&self, url: &str, resolution: &EmbedResolution) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize("Embed Resolution:", &Color::Green, true));
        output.push('\n');
        output.push_str(&format!(
            "  {}: {}\n",
            self.colorize("Page", &Color::Yellow, false),
            self.colorize(url, &Color::Blue, false)
        ));

        let embed = if resolution.embed_url.is_empty() {
            "(none found)"
        } else {
            resolution.embed_url.as_str()
        };
        output.push_str(&format!(
            "  {}: {}\n",
            self.colorize("Embed", &Color::Yellow, false),
            self.colorize(embed, &Color::Cyan, false)
        ));
        if !resolution.thumbnail_url.is_empty() {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize("Thumbnail", &Color::Yellow, false),
                self.colorize(&resolution.thumbnail_url, &Color::Blue, false)
            ));
        }
        output
    }

    fn format_unpacked_pretty(&self, report: &UnpackReport<'_>) -> String {
        let mut output = String::new();
        if let Some(media_url) = report.media_url {
            output.push_str(&format!(
                "{}: {}\n\n",
                self.colorize("Media URL", &Color::Green, true),
                self.colorize(media_url, &Color::Blue, false)
            ));
        }
        for (i, block) in report.blocks.iter().enumerate() {
            output.push_str(&self.colorize(
                &format!("Block {} ({} bytes)", i + 1, block.len()),
                &Color::Yellow,
                true,
            ));
            output.push('\n');
            output.push_str(block);
            output.push_str("\n\n");
        }
        output
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(Into::into)
}
