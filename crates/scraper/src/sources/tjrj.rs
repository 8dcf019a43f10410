//! Tribunal de Justiça do Rio de Janeiro
//!
//! Sectioned layout: entries are grouped under `div.diario-section` blocks
//! whose `h3` title doubles as the classification signal.

use super::{build_draft, RawEntry, SourceScraper};
use crate::extract::classify;
use crate::fetcher::Fetcher;
use async_trait::async_trait;
use chrono::NaiveDate;
use diario_common::db::models::{PublicationDraft, PublicationType};
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};

const BASE_URL: &str =
    "http://www.tjrj.jus.br/web/guest/institucional/dir-gerais/dgcon/diario-oficial";

pub struct TjrjScraper {
    fetcher: Arc<Fetcher>,
}

impl TjrjScraper {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    fn query_url(target_date: NaiveDate) -> String {
        format!("{}?data={}", BASE_URL, target_date.format("%Y-%m-%d"))
    }

    fn parse_page(&self, html: &str, target_date: NaiveDate, url: &str) -> Vec<PublicationDraft> {
        let document = Html::parse_document(html);
        let section_selector = Selector::parse("div.diario-section").unwrap();
        let title_selector = Selector::parse("h3").unwrap();
        let item_selector = Selector::parse("p.publicacao").unwrap();

        let mut drafts = Vec::new();
        for section in document.select(&section_selector) {
            let section_title = section
                .select(&title_selector)
                .next()
                .map(|h| h.text().collect::<Vec<_>>().join(" "));

            for item in section.select(&item_selector) {
                let content = item.text().collect::<Vec<_>>().join(" ");
                let raw = RawEntry {
                    content,
                    section_title: section_title.clone(),
                };
                match self.parse_entry(target_date, url, raw) {
                    Some(draft) => drafts.push(draft),
                    None => {
                        warn!(source = self.source_code(), "Dropping entry with empty content")
                    }
                }
            }
        }

        debug!(
            source = self.source_code(),
            count = drafts.len(),
            "Parsed bulletin entries"
        );
        drafts
    }
}

#[async_trait]
impl SourceScraper for TjrjScraper {
    fn source_code(&self) -> &'static str {
        "TJRJ"
    }

    async fn scrape_date(&self, target_date: NaiveDate) -> Vec<PublicationDraft> {
        let url = Self::query_url(target_date);

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(
                    source = self.source_code(),
                    %target_date,
                    error = %e,
                    "Scrape failed, yielding empty run"
                );
                return Vec::new();
            }
        };

        self.parse_page(&html, target_date, &url)
    }

    fn parse_entry(
        &self,
        target_date: NaiveDate,
        page_url: &str,
        raw: RawEntry,
    ) -> Option<PublicationDraft> {
        // Section title carries the classification; a section without a
        // title falls to the catch-all category
        let publication_type = raw
            .section_title
            .as_deref()
            .map(classify)
            .unwrap_or(PublicationType::Outros);

        build_draft(
            self.source_code(),
            target_date,
            page_url,
            &raw.content,
            publication_type,
        )
    }
}
