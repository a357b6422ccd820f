//! Hotel collection migrations.
//!
//! Append-only: never renumber or reorder a step once it has shipped.

use crate::migrations::step::{CreateIndex, MigrationStep};
use crate::nosql::IndexModel;

/// Steps for the hotels collection named `collection`.
pub fn hotel_migrations(collection: &str) -> Vec<MigrationStep> {
    vec![MigrationStep::new(
        1,
        "create-index-on-name",
        collection,
        CreateIndex(IndexModel::ascending("name")),
    )]
}
