//! # Storage
//!
//! Storage collaborators for the pipeline output.
//!
//! Both tables are derived snapshots: each run replaces them wholesale.
//! A replace either lands completely or leaves the previous contents intact.
//!
//! - [`Snapshot`]: in-memory tables, saved to a file explicitly by the host
//! - [`RedbStore`]: disk-backed tables in a redb database (ACID)

mod redb_store;
mod snapshot;

pub use redb_store::RedbStore;
pub use snapshot::Snapshot;

use crate::{CanonicalRecord, EnrichedRecord, NeoError, NeoId};
use std::collections::BTreeSet;

/// Common interface of the storage backends.
pub trait RecordStore {
    /// Replace the canonical table.
    fn replace_canonical(&mut self, records: &[CanonicalRecord]) -> Result<(), NeoError>;

    /// Replace the enriched table.
    fn replace_enriched(&mut self, records: &[EnrichedRecord]) -> Result<(), NeoError>;

    /// Replace both tables as one unit and count the run.
    fn replace_run(
        &mut self,
        canonical: &[CanonicalRecord],
        enriched: &[EnrichedRecord],
    ) -> Result<(), NeoError>;

    /// Canonical records in stored order.
    fn load_canonical(&self) -> Result<Vec<CanonicalRecord>, NeoError>;

    /// Enriched records in stored order.
    fn load_enriched(&self) -> Result<Vec<EnrichedRecord>, NeoError>;

    /// Look up one enriched record by id.
    fn get_enriched(&self, id: NeoId) -> Result<Option<EnrichedRecord>, NeoError>;

    fn canonical_count(&self) -> Result<usize, NeoError>;

    fn enriched_count(&self) -> Result<usize, NeoError>;

    /// Number of completed `replace_run` calls.
    fn run_count(&self) -> Result<u64, NeoError>;
}

/// Reject tables that carry an id twice.
pub(crate) fn ensure_unique_ids(ids: impl IntoIterator<Item = NeoId>) -> Result<(), NeoError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(NeoError::InvariantViolation(format!(
                "duplicate id {} in stored table",
                id
            )));
        }
    }
    Ok(())
}
