//! Tribunal de Justiça de São Paulo
//!
//! Flat layout: the daily bulletin is a single list of `div.publicacao-item`
//! entries with no section headings, so classification comes from each
//! entry's own text.

use super::{build_draft, RawEntry, SourceScraper};
use crate::extract::classify;
use crate::fetcher::Fetcher;
use async_trait::async_trait;
use chrono::NaiveDate;
use diario_common::db::models::PublicationDraft;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};

const BASE_URL: &str = "https://www.tjsp.jus.br/DiarioJusticaEletronico";

pub struct TjspScraper {
    fetcher: Arc<Fetcher>,
}

impl TjspScraper {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    fn query_url(target_date: NaiveDate) -> String {
        format!("{}?data={}", BASE_URL, target_date.format("%d/%m/%Y"))
    }

    fn parse_page(&self, html: &str, target_date: NaiveDate, url: &str) -> Vec<PublicationDraft> {
        let document = Html::parse_document(html);
        let item_selector = Selector::parse("div.publicacao-item").unwrap();

        let mut drafts = Vec::new();
        for item in document.select(&item_selector) {
            let content = item.text().collect::<Vec<_>>().join(" ");
            let raw = RawEntry {
                content,
                section_title: None,
            };
            match self.parse_entry(target_date, url, raw) {
                Some(draft) => drafts.push(draft),
                None => warn!(source = self.source_code(), "Dropping entry with empty content"),
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
impl SourceScraper for TjspScraper {
    fn source_code(&self) -> &'static str {
        "TJSP"
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
        // No section headings on this source: classify from the entry itself
        let publication_type = classify(&raw.content);
        build_draft(
            self.source_code(),
            target_date,
            page_url,
            &raw.content,
            publication_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::{AlwaysFailing, FixedPage};
    use diario_common::db::models::PublicationType;
    use std::time::Duration;

    const PAGE: &str = r#"
        <html><body>
          <div class="publicacao-item">
            Intimação - Processo nº 1234567-12.2024.8.26.0100 - Autor: João Silva - Réu: Banco Azul
          </div>
          <div class="publicacao-item">   </div>
          <div class="publicacao-item">
            Comunicado administrativo sem número de processo
          </div>
        </body></html>
    "#;

    fn scraper_for(page: &str) -> TjspScraper {
        let fetcher = Arc::new(Fetcher::new(
            Arc::new(FixedPage::new(page)),
            1,
            Duration::ZERO,
        ));
        TjspScraper::new(fetcher)
    }

    #[tokio::test]
    async fn test_scrape_date_extracts_entries_and_drops_empty_ones() {
        let scraper = scraper_for(PAGE);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let drafts = scraper.scrape_date(date).await;

        // The blank entry is dropped, not fatal
        assert_eq!(drafts.len(), 2);

        let first = &drafts[0];
        assert_eq!(first.source_code, "TJSP");
        assert_eq!(first.publication_date, date);
        assert_eq!(
            first.process_number.as_deref(),
            Some("1234567-12.2024.8.26.0100")
        );
        assert!(first.parties.contains(&"João Silva".to_string()));
        assert_eq!(first.publication_type, PublicationType::Intimacao);

        let second = &drafts[1];
        assert_eq!(second.process_number, None);
        assert_eq!(second.publication_type, PublicationType::Outros);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_empty_run() {
        let fetcher = Arc::new(Fetcher::new(
            Arc::new(AlwaysFailing::new()),
            2,
            Duration::ZERO,
        ));
        let scraper = TjspScraper::new(fetcher);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert!(scraper.scrape_date(date).await.is_empty());
    }

    #[tokio::test]
    async fn test_page_without_entries_yields_empty_run() {
        let scraper = scraper_for("<html><body><p>nada aqui</p></body></html>");
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert!(scraper.scrape_date(date).await.is_empty());
    }

    #[test]
    fn test_query_url_uses_brazilian_date_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            TjspScraper::query_url(date),
            "https://www.tjsp.jus.br/DiarioJusticaEletronico?data=05/03/2024"
        );
    }
}
