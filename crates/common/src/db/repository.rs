//! Repository pattern for publication storage
//!
//! The scraping pipeline only ever touches storage through the
//! [`PublicationStore`] trait: one existence probe and one insert. The
//! concrete [`Repository`] backs it with SeaORM; tests back it with an
//! in-memory fake.

use crate::db::models::{
    Publication, PublicationActiveModel, PublicationColumn, PublicationDraft, PublicationEntity,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr};
use uuid::Uuid;

/// Storage boundary consumed by the ingestion pipeline.
#[async_trait]
pub trait PublicationStore: Send + Sync {
    /// Look up an existing publication by its duplicate-suppression key.
    async fn find_by_dedup_key(&self, key: &str) -> Result<Option<Publication>>;

    /// Persist a draft, assigning identity and timestamps.
    ///
    /// Returns `AppError::Duplicate` when the unique index on the dedup key
    /// rejects the row; callers treat that as "already exists", not failure.
    async fn insert_publication(&self, draft: &PublicationDraft) -> Result<Publication>;
}

/// Repository for publication data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl PublicationStore for Repository {
    async fn find_by_dedup_key(&self, key: &str) -> Result<Option<Publication>> {
        PublicationEntity::find()
            .filter(PublicationColumn::DedupKey.eq(key))
            .one(self.pool.conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_publication(&self, draft: &PublicationDraft) -> Result<Publication> {
        let now = chrono::Utc::now();

        let model = PublicationActiveModel {
            id: Set(Uuid::new_v4()),
            source_code: Set(draft.source_code.clone()),
            publication_date: Set(draft.publication_date),
            process_number: Set(draft.process_number.clone()),
            content: Set(draft.content.clone()),
            parties: Set(serde_json::to_value(&draft.parties)?),
            publication_type: Set(String::from(draft.publication_type)),
            dedup_key: Set(draft.dedup_key()),
            source_url: Set(draft.source_url.clone()),
            scraped_at: Set(now.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match model.insert(self.pool.conn()).await {
            Ok(publication) => Ok(publication),
            // The unique index on dedup_key is the authority on duplicates;
            // a violation here means another run won the race.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(AppError::Duplicate {
                    message: format!(
                        "publication already exists for dedup key {}",
                        draft.dedup_key()
                    ),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
