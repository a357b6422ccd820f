//! Migration runner.
//!
//! # Responsibilities
//! - Apply pending steps to one target collection, in ascending id order
//! - Skip steps already recorded in the tracking collection
//! - Record every applied step
//! - Distinguish "mutation failed" from "mutation applied, record lost"
//!
//! # Design Decisions
//! - Sequential only: steps may depend on earlier ones
//! - No retries and no rollback: the first failure aborts the run, and
//!   steps recorded before it stay recorded
//! - The tracking collection carries a unique index on
//!   (migration_id, collection), so a record can exist at most once

use std::collections::BTreeSet;

use thiserror::Error;

use crate::migrations::step::{MigrationId, MigrationRecord, MigrationStep};
use crate::nosql::{CollectionAccessor, Document, IndexModel, IndexOrder, NoSqlError};

/// Name of the unique index kept on the tracking collection.
pub const TRACKING_INDEX: &str = "migration_id_1_collection_1";

/// Errors raised while migrating a collection. All are fatal to startup.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The supplied step list is unusable (duplicate ids, wrong target).
    #[error("invalid migration steps for '{collection}': {message}")]
    InvalidSteps { collection: String, message: String },

    /// The tracking collection could not be prepared.
    #[error("tracking collection '{tracking}' unavailable: {source}")]
    Tracking {
        tracking: String,
        #[source]
        source: NoSqlError,
    },

    /// Reading the tracking record of a step failed.
    #[error("cannot look up migration {step} for '{collection}': {source}")]
    Lookup {
        collection: String,
        step: MigrationId,
        #[source]
        source: NoSqlError,
    },

    /// The step's mutation failed. Nothing was recorded for it.
    #[error("migration {step} ({name}) failed on '{collection}': {source}")]
    Step {
        collection: String,
        step: MigrationId,
        name: String,
        #[source]
        source: NoSqlError,
    },

    /// The mutation was applied but its record was not written. Re-running
    /// would apply it again.
    #[error(
        "migration {step} ({name}) was applied to '{collection}' but its record \
         could not be written; manual intervention required: {source}"
    )]
    PartialMigration {
        collection: String,
        step: MigrationId,
        name: String,
        #[source]
        source: NoSqlError,
    },
}

impl MigrationError {
    pub fn is_partial(&self) -> bool {
        matches!(self, MigrationError::PartialMigration { .. })
    }

    /// The step the error is about, when there is one.
    pub fn step(&self) -> Option<MigrationId> {
        match self {
            MigrationError::Lookup { step, .. }
            | MigrationError::Step { step, .. }
            | MigrationError::PartialMigration { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub collection: String,
    /// Steps applied during this run, in application order.
    pub applied: Vec<MigrationId>,
    /// Steps that were already recorded.
    pub skipped: Vec<MigrationId>,
}

/// Applies migration steps, tracking progress in a shared collection.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    tracking: CollectionAccessor,
}

impl MigrationRunner {
    pub fn new(tracking: CollectionAccessor) -> Self {
        Self { tracking }
    }

    pub fn tracking(&self) -> &CollectionAccessor {
        &self.tracking
    }

    /// Apply every pending step of `steps` to `target`.
    pub async fn run(
        &self,
        target: &CollectionAccessor,
        mut steps: Vec<MigrationStep>,
    ) -> Result<MigrationReport, MigrationError> {
        let collection = target.name().to_string();
        validate_steps(&collection, &steps)?;
        steps.sort_by_key(|step| step.id);

        let mut report = MigrationReport {
            collection: collection.clone(),
            ..MigrationReport::default()
        };
        if steps.is_empty() {
            return Ok(report);
        }

        self.ensure_tracking_index().await?;

        for step in &steps {
            let existing = self
                .tracking
                .find_one(MigrationRecord::filter(step.id, &collection))
                .await
                .map_err(|source| MigrationError::Lookup {
                    collection: collection.clone(),
                    step: step.id,
                    source,
                })?;
            if existing.is_some() {
                tracing::debug!(
                    collection = %collection,
                    step = step.id,
                    name = %step.name,
                    "Migration already applied, skipping"
                );
                report.skipped.push(step.id);
                continue;
            }

            step.apply(target)
                .await
                .map_err(|source| MigrationError::Step {
                    collection: collection.clone(),
                    step: step.id,
                    name: step.name.clone(),
                    source,
                })?;

            self.record(step).await.map_err(|source| {
                tracing::error!(
                    collection = %collection,
                    step = step.id,
                    name = %step.name,
                    error = %source,
                    "Migration applied but not recorded"
                );
                MigrationError::PartialMigration {
                    collection: collection.clone(),
                    step: step.id,
                    name: step.name.clone(),
                    source,
                }
            })?;

            tracing::info!(
                collection = %collection,
                step = step.id,
                name = %step.name,
                "Migration applied"
            );
            report.applied.push(step.id);
        }

        Ok(report)
    }

    /// Records of the steps applied to `collection`, in id order.
    pub async fn applied(&self, collection: &str) -> Result<Vec<MigrationRecord>, MigrationError> {
        let tracking_error = |source| MigrationError::Tracking {
            tracking: self.tracking.name().to_string(),
            source,
        };

        let mut filter = Document::new();
        filter.insert("collection".into(), collection.into());
        let documents = self.tracking.find(filter).await.map_err(tracking_error)?;

        let mut records = documents
            .into_iter()
            .map(MigrationRecord::from_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| tracking_error(NoSqlError::operation(self.tracking.name(), "find", e)))?;
        records.sort_by_key(|record| record.migration_id);
        Ok(records)
    }

    async fn ensure_tracking_index(&self) -> Result<(), MigrationError> {
        let index = IndexModel {
            name: TRACKING_INDEX.to_string(),
            keys: vec![
                ("migration_id".to_string(), IndexOrder::Ascending),
                ("collection".to_string(), IndexOrder::Ascending),
            ],
            unique: true,
        };
        self.tracking
            .create_index(index)
            .await
            .map_err(|source| MigrationError::Tracking {
                tracking: self.tracking.name().to_string(),
                source,
            })
    }

    async fn record(&self, step: &MigrationStep) -> Result<(), NoSqlError> {
        let document = MigrationRecord::new(step)
            .to_document()
            .map_err(|e| NoSqlError::operation(self.tracking.name(), "insert_one", e))?;
        self.tracking.insert_one(document).await
    }
}

fn validate_steps(collection: &str, steps: &[MigrationStep]) -> Result<(), MigrationError> {
    let invalid = |message: String| MigrationError::InvalidSteps {
        collection: collection.to_string(),
        message,
    };

    let mut ids = BTreeSet::new();
    for step in steps {
        if step.target != collection {
            return Err(invalid(format!(
                "step {} targets '{}'",
                step.id, step.target
            )));
        }
        if !ids.insert(step.id) {
            return Err(invalid(format!("duplicate step id {}", step.id)));
        }
    }
    Ok(())
}
