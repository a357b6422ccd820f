//! Migration steps, mutations and tracking records.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::nosql::{CollectionAccessor, Document, IndexModel, NoSqlResult};

/// Identifier of a step. Unique per target collection, ascending in
/// application order, never reused once applied anywhere.
pub type MigrationId = u64;

/// The change a step makes to its target collection.
#[async_trait]
pub trait Mutation: Send + Sync {
    async fn apply(&self, target: &CollectionAccessor) -> NoSqlResult<()>;
}

/// Create an index on the target collection.
#[derive(Debug, Clone)]
pub struct CreateIndex(pub IndexModel);

#[async_trait]
impl Mutation for CreateIndex {
    async fn apply(&self, target: &CollectionAccessor) -> NoSqlResult<()> {
        target.create_index(self.0.clone()).await
    }
}

/// Seed documents into the target collection.
#[derive(Debug, Clone)]
pub struct InsertDocuments(pub Vec<Document>);

#[async_trait]
impl Mutation for InsertDocuments {
    async fn apply(&self, target: &CollectionAccessor) -> NoSqlResult<()> {
        for document in &self.0 {
            target.insert_one(document.clone()).await?;
        }
        Ok(())
    }
}

/// A named, ordered unit of change scoped to one collection.
#[derive(Clone)]
pub struct MigrationStep {
    pub id: MigrationId,
    pub name: String,
    /// Name of the collection the mutation applies to.
    pub target: String,
    mutation: Arc<dyn Mutation>,
}

impl MigrationStep {
    pub fn new(
        id: MigrationId,
        name: impl Into<String>,
        target: impl Into<String>,
        mutation: impl Mutation + 'static,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            target: target.into(),
            mutation: Arc::new(mutation),
        }
    }

    pub(crate) async fn apply(&self, target: &CollectionAccessor) -> NoSqlResult<()> {
        self.mutation.apply(target).await
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("target", &self.target)
            .finish()
    }
}

/// Persisted fact: step `migration_id` was applied to `collection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration_id: MigrationId,
    pub name: String,
    pub collection: String,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

impl MigrationRecord {
    pub fn new(step: &MigrationStep) -> Self {
        Self {
            migration_id: step.id,
            name: step.name.clone(),
            collection: step.target.clone(),
            applied_at: OffsetDateTime::now_utc(),
        }
    }

    /// Filter selecting the record of `id` on `collection`.
    pub fn filter(id: MigrationId, collection: &str) -> Document {
        let mut filter = Document::new();
        filter.insert("migration_id".into(), id.into());
        filter.insert("collection".into(), collection.into());
        filter
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    pub fn from_document(document: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(document))
    }
}
