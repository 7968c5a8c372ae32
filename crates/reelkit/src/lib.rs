//! Session-backed listing pagination for server-rendered video sites.
//!
//! A subject's landing page seeds a [`session::Session`] holding the listing
//! component's protocol state, cookies and CSRF token. Later pages replay the
//! component's "load more" call against that state. Records found on a page
//! can then be resolved to playable embeds, including hosts that hide their
//! player configuration behind the `eval(function(p,a,c,k,e,d)...)` packer.
//!
//! ```no_run
//! use reelkit::{Scraper, ScraperConfig};
//!
//! # async fn run() -> reelkit::Result<()> {
//! let scraper = Scraper::new(ScraperConfig::default().with_origin("https://videos.example"))?;
//! let page = scraper.get_page("alice", 1).await;
//! let records = scraper.resolve_records(page.records, 4).await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod http;
pub mod media;
pub mod service;
pub mod session;
pub mod unpacker;

pub use cache::{Cache, FileCache, MemoryCache};
pub use client::PaginatedClient;
pub use config::ScraperConfig;
pub use embed::EmbedResolver;
pub use error::{Result, ScrapeError};
pub use extract::RecordExtractor;
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use media::{EmbedResolution, MediaRecord, PageResult};
pub use service::Scraper;
pub use session::{Session, SessionStore};
