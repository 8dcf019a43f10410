//! Per-source bulletin scrapers
//!
//! One [`SourceScraper`] implementation per court, selected through a closed,
//! statically built [`SourceRegistry`]. The source set changes rarely and
//! must be auditable; unknown codes are a configuration error surfaced by the
//! dispatcher, not a runtime-discoverable set.

mod tjrj;
mod tjsp;

pub use tjrj::TjrjScraper;
pub use tjsp::TjspScraper;

use crate::extract::{extract_parties, extract_process_number};
use crate::fetcher::Fetcher;
use async_trait::async_trait;
use chrono::NaiveDate;
use diario_common::db::models::{PublicationDraft, PublicationType};
use std::collections::HashMap;
use std::sync::Arc;

/// Raw field bag pulled from one bulletin entry before validation.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Entry text with markup stripped
    pub content: String,
    /// Section heading the entry appeared under, when the source has one
    pub section_title: Option<String>,
}

/// A scraper for one court source.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    /// Short uppercase code identifying the court
    fn source_code(&self) -> &'static str;

    /// Scrape all bulletin entries for one date.
    ///
    /// Fetch failures (after retries) and whole-page parse failures degrade
    /// to an empty list, logged; they never propagate past this surface.
    async fn scrape_date(&self, target_date: NaiveDate) -> Vec<PublicationDraft>;

    /// Map a raw field bag into a validated draft.
    ///
    /// Entries with empty content yield `None` and are dropped; all other
    /// malformed fields degrade to absent or default values.
    fn parse_entry(
        &self,
        target_date: NaiveDate,
        page_url: &str,
        raw: RawEntry,
    ) -> Option<PublicationDraft>;
}

/// Build a draft from normalized entry content, applying the shared
/// field-extraction rules. Returns `None` when the content is empty.
pub(crate) fn build_draft(
    source_code: &str,
    target_date: NaiveDate,
    page_url: &str,
    content: &str,
    publication_type: PublicationType,
) -> Option<PublicationDraft> {
    let content = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if content.is_empty() {
        return None;
    }

    Some(PublicationDraft {
        source_code: source_code.to_string(),
        publication_date: target_date,
        process_number: extract_process_number(&content),
        parties: extract_parties(&content),
        publication_type,
        source_url: Some(page_url.to_string()),
        content,
    })
}

/// Closed mapping from source code to scraper.
pub struct SourceRegistry {
    scrapers: HashMap<&'static str, Arc<dyn SourceScraper>>,
}

impl SourceRegistry {
    /// Empty registry, for tests and custom wiring
    pub fn new() -> Self {
        Self {
            scrapers: HashMap::new(),
        }
    }

    /// The production registry: every known court source.
    pub fn builtin(fetcher: Arc<Fetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TjspScraper::new(fetcher.clone())));
        registry.register(Arc::new(TjrjScraper::new(fetcher)));
        registry
    }

    pub fn register(&mut self, scraper: Arc<dyn SourceScraper>) {
        self.scrapers.insert(scraper.source_code(), scraper);
    }

    pub fn get(&self, source_code: &str) -> Option<Arc<dyn SourceScraper>> {
        self.scrapers.get(source_code).cloned()
    }

    /// Registered source codes, sorted for deterministic fan-out order
    pub fn codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.scrapers.keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
