//! # Catalog
//!
//! The stored result of the last pipeline run, over one of two backends.
//!
//! ## Storage Backends
//!
//! - `InMemory`: a [`Snapshot`] (fast, volatile unless the host saves it)
//! - `Persistent`: a [`RedbStore`] for disk-backed ACID storage

use crate::formats::{snapshot_from_bytes, snapshot_to_bytes};
use crate::pipeline::PipelineOutput;
use crate::primitives::MAX_PAGE_SIZE;
use crate::storage::{RecordStore, RedbStore, Snapshot};
use crate::summary::{CatalogStats, PortfolioSummary, top_by_risk};
use crate::{CanonicalRecord, EnrichedRecord, NeoError, NeoId, PolicyStatus};
use std::path::Path;

/// Storage backend for a Catalog.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory tables (fast, volatile).
    InMemory(Snapshot),
    /// Disk-backed tables using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Snapshot::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

/// One page of enriched records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage {
    /// Records matching the filter before paging.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub records: Vec<EnrichedRecord>,
}

/// Read and replace access to the stored tables.
#[derive(Debug, Default)]
pub struct Catalog {
    backend: StorageBackend,
}

impl Catalog {
    /// Create an empty in-memory catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            backend: StorageBackend::InMemory(snapshot),
        }
    }

    /// Decode a snapshot file's contents into an in-memory catalog.
    pub fn from_snapshot_bytes(bytes: &[u8]) -> Result<Self, NeoError> {
        Ok(Self::with_snapshot(snapshot_from_bytes(bytes)?))
    }

    /// Open or create a persistent catalog backed by redb.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, NeoError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            StorageBackend::InMemory(_) => "file",
            StorageBackend::Persistent(_) => "redb",
        }
    }

    /// Borrow the backend as a record store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        match &self.backend {
            StorageBackend::InMemory(snapshot) => snapshot,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn RecordStore {
        match &mut self.backend {
            StorageBackend::InMemory(snapshot) => snapshot,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    /// Serialize the current tables in the snapshot file format.
    ///
    /// Works for both backends; for redb the tables are read first.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, NeoError> {
        match &self.backend {
            StorageBackend::InMemory(snapshot) => snapshot_to_bytes(snapshot),
            StorageBackend::Persistent(redb) => {
                let mut snapshot = Snapshot::new();
                snapshot.replace_canonical(&redb.load_canonical()?)?;
                snapshot.replace_enriched(&redb.load_enriched()?)?;
                snapshot_to_bytes(&snapshot)
            }
        }
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Replace both tables with the output of a full run.
    pub fn store_output(&mut self, output: &PipelineOutput) -> Result<(), NeoError> {
        self.store_mut()
            .replace_run(&output.canonical, &output.enriched)
    }

    /// Replace the tables after a refinement-only run.
    ///
    /// The enriched table is cleared: it was derived from the previous
    /// canonical table and no longer matches.
    pub fn store_canonical(&mut self, canonical: &[CanonicalRecord]) -> Result<(), NeoError> {
        self.store_mut().replace_run(canonical, &[])
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Figures over the canonical table.
    pub fn catalog_stats(&self) -> Result<CatalogStats, NeoError> {
        Ok(CatalogStats::from_records(&self.store().load_canonical()?))
    }

    /// Dashboard KPIs over the enriched table.
    pub fn summary(&self, risk_tolerance: f64) -> Result<PortfolioSummary, NeoError> {
        Ok(PortfolioSummary::from_records(
            &self.store().load_enriched()?,
            risk_tolerance,
        ))
    }

    /// The `n` highest-risk records.
    pub fn top(&self, n: usize) -> Result<Vec<EnrichedRecord>, NeoError> {
        let records = self.store().load_enriched()?;
        Ok(top_by_risk(&records, n.min(MAX_PAGE_SIZE))
            .into_iter()
            .cloned()
            .collect())
    }

    /// One enriched record, or `RecordNotFound`.
    pub fn record(&self, id: NeoId) -> Result<EnrichedRecord, NeoError> {
        self.store()
            .get_enriched(id)?
            .ok_or(NeoError::RecordNotFound(id))
    }

    /// A page of enriched records in stored order, optionally filtered by
    /// decision. `limit` is capped at `MAX_PAGE_SIZE`.
    pub fn page(
        &self,
        status: Option<PolicyStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<RecordPage, NeoError> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let matching: Vec<EnrichedRecord> = self
            .store()
            .load_enriched()?
            .into_iter()
            .filter(|r| status.is_none_or(|s| r.policy_status == s))
            .collect();

        Ok(RecordPage {
            total: matching.len(),
            offset,
            limit,
            records: matching.into_iter().skip(offset).take(limit).collect(),
        })
    }
}
