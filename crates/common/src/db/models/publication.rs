//! Publication entity and the transient draft produced by scrapers

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

/// Publication classification
///
/// Closed category set; anything the keyword tables cannot place falls to
/// `Outros`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationType {
    Decisao,
    Despacho,
    Edital,
    Intimacao,
    #[default]
    Outros,
}

impl From<String> for PublicationType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DECISAO" => PublicationType::Decisao,
            "DESPACHO" => PublicationType::Despacho,
            "EDITAL" => PublicationType::Edital,
            "INTIMACAO" => PublicationType::Intimacao,
            _ => PublicationType::Outros,
        }
    }
}

impl From<PublicationType> for String {
    fn from(t: PublicationType) -> Self {
        match t {
            PublicationType::Decisao => "DECISAO".to_string(),
            PublicationType::Despacho => "DESPACHO".to_string(),
            PublicationType::Edital => "EDITAL".to_string(),
            PublicationType::Intimacao => "INTIMACAO".to_string(),
            PublicationType::Outros => "OUTROS".to_string(),
        }
    }
}

/// Candidate record extracted from one bulletin entry.
///
/// Produced by a source scraper and consumed by the ingestor; never persisted
/// directly. A draft with empty content is invalid and is rejected before it
/// reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PublicationDraft {
    /// Short uppercase court code, e.g. "TJSP"
    pub source_code: String,

    /// Calendar date the bulletin covers
    pub publication_date: NaiveDate,

    /// Canonical case number, when one was found in the entry text
    pub process_number: Option<String>,

    /// Full extracted text body
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,

    /// Extracted party names, deduplicated and capped
    pub parties: Vec<String>,

    pub publication_type: PublicationType,

    /// Page the entry was scraped from
    pub source_url: Option<String>,
}

impl PublicationDraft {
    /// Whether the draft carries usable content.
    ///
    /// Stricter than the derive check: whitespace-only content is rejected
    /// too.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Deterministic duplicate-suppression key.
    ///
    /// SHA-256 over (source, date, process number) when the process number is
    /// present. When it is absent the key falls back to the normalized
    /// content body, so entries without a case number still dedup instead of
    /// accumulating unbounded copies.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_code.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.publication_date.to_string().as_bytes());
        hasher.update([0u8]);
        match &self.process_number {
            Some(number) => hasher.update(number.as_bytes()),
            None => hasher.update(normalize_content(&self.content).as_bytes()),
        }
        hex::encode(hasher.finalize())
    }
}

/// Lowercase and collapse whitespace so cosmetic markup differences do not
/// defeat the content-based dedup key.
fn normalize_content(content: &str) -> String {
    content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub source_code: String,

    pub publication_date: Date,

    #[sea_orm(column_type = "Text", nullable)]
    pub process_number: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Party names as a JSONB array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub parties: Json,

    #[sea_orm(column_type = "Text")]
    pub publication_type: String,

    /// Duplicate-suppression key; unique-indexed so concurrent identical
    /// candidates cannot race past the pre-insert existence check
    #[sea_orm(column_type = "Text", unique)]
    pub dedup_key: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_url: Option<String>,

    pub scraped_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the classification as an enum
    pub fn publication_type(&self) -> PublicationType {
        PublicationType::from(self.publication_type.clone())
    }

    /// Get the party names as a plain vector
    pub fn party_names(&self) -> Vec<String> {
        serde_json::from_value(self.parties.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
