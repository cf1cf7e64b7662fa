//! In-memory storage backend.

use super::{RecordStore, ensure_unique_ids};
use crate::{CanonicalRecord, EnrichedRecord, NeoError, NeoId};
use serde::{Deserialize, Serialize};

/// Both tables held in memory.
///
/// This is also the payload of the snapshot file format
/// (see [`crate::formats::persistence`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    canonical: Vec<CanonicalRecord>,
    enriched: Vec<EnrichedRecord>,
    runs: u64,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the canonical table.
    #[must_use]
    pub fn canonical(&self) -> &[CanonicalRecord] {
        &self.canonical
    }

    /// Borrow the enriched table.
    #[must_use]
    pub fn enriched(&self) -> &[EnrichedRecord] {
        &self.enriched
    }
}

impl RecordStore for Snapshot {
    fn replace_canonical(&mut self, records: &[CanonicalRecord]) -> Result<(), NeoError> {
        ensure_unique_ids(records.iter().map(|r| r.id))?;
        self.canonical = records.to_vec();
        Ok(())
    }

    fn replace_enriched(&mut self, records: &[EnrichedRecord]) -> Result<(), NeoError> {
        ensure_unique_ids(records.iter().map(EnrichedRecord::id))?;
        self.enriched = records.to_vec();
        Ok(())
    }

    fn replace_run(
        &mut self,
        canonical: &[CanonicalRecord],
        enriched: &[EnrichedRecord],
    ) -> Result<(), NeoError> {
        // Check both tables before touching either.
        ensure_unique_ids(canonical.iter().map(|r| r.id))?;
        ensure_unique_ids(enriched.iter().map(EnrichedRecord::id))?;

        self.canonical = canonical.to_vec();
        self.enriched = enriched.to_vec();
        self.runs += 1;
        Ok(())
    }

    fn load_canonical(&self) -> Result<Vec<CanonicalRecord>, NeoError> {
        Ok(self.canonical.clone())
    }

    fn load_enriched(&self) -> Result<Vec<EnrichedRecord>, NeoError> {
        Ok(self.enriched.clone())
    }

    fn get_enriched(&self, id: NeoId) -> Result<Option<EnrichedRecord>, NeoError> {
        Ok(self.enriched.iter().find(|r| r.id() == id).cloned())
    }

    fn canonical_count(&self) -> Result<usize, NeoError> {
        Ok(self.canonical.len())
    }

    fn enriched_count(&self) -> Result<usize, NeoError> {
        Ok(self.enriched.len())
    }

    fn run_count(&self) -> Result<u64, NeoError> {
        Ok(self.runs)
    }
}
