//! # redb-backed Record Storage
//!
//! A disk-backed store for the canonical and enriched tables using the redb
//! embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Transactions
//!
//! Every replace runs inside one write transaction. The transaction is
//! committed when all writes succeed and aborted as soon as one fails, so a
//! reader sees either the previous tables or the new ones, never a mix.

use super::{RecordStore, ensure_unique_ids};
use crate::{CanonicalRecord, EnrichedRecord, NeoError, NeoId};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Table for canonical records: row(u64) -> serialized CanonicalRecord bytes
const CANONICAL: TableDefinition<u64, &[u8]> = TableDefinition::new("canonical");

/// Table for enriched records: row(u64) -> serialized EnrichedRecord bytes
const ENRICHED: TableDefinition<u64, &[u8]> = TableDefinition::new("enriched");

/// Index for enriched lookups: NeoId(i64) -> row(u64)
const ENRICHED_INDEX: TableDefinition<i64, u64> = TableDefinition::new("enriched_index");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const RUNS_KEY: &str = "runs";

fn io(e: impl std::fmt::Display) -> NeoError {
    NeoError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NeoError> {
    postcard::to_allocvec(value).map_err(|e| NeoError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, NeoError> {
    postcard::from_bytes(bytes).map_err(|e| NeoError::DeserializationError(e.to_string()))
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a record database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NeoError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(CANONICAL).map_err(io)?;
            let _ = write_txn.open_table(ENRICHED).map_err(io)?;
            let _ = write_txn.open_table(ENRICHED_INDEX).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        Ok(Self { db, path })
    }

    /// Run `write` in one transaction: commit on success, abort on failure.
    fn transaction<F>(&self, write: F) -> Result<(), NeoError>
    where
        F: FnOnce(&WriteTransaction) -> Result<(), NeoError>,
    {
        let write_txn = self.db.begin_write().map_err(io)?;
        match write(&write_txn) {
            Ok(()) => write_txn.commit().map_err(io),
            Err(err) => match write_txn.abort() {
                Ok(()) => Err(err),
                Err(abort_err) => Err(NeoError::IoError(format!(
                    "{}; rollback failed: {}",
                    err, abort_err
                ))),
            },
        }
    }

    fn count(
        &self,
        definition: TableDefinition<'static, u64, &'static [u8]>,
    ) -> Result<usize, NeoError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(definition).map_err(io)?;
        let count = table.len().map_err(io)?;
        Ok(count as usize)
    }

    fn load_rows<T: DeserializeOwned>(
        &self,
        definition: TableDefinition<'static, u64, &'static [u8]>,
    ) -> Result<Vec<T>, NeoError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(definition).map_err(io)?;

        let mut rows = Vec::with_capacity(table.len().map_err(io)? as usize);
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }
}

/// Wholesale replace of the canonical table inside `write_txn`.
fn write_canonical(
    write_txn: &WriteTransaction,
    records: &[CanonicalRecord],
) -> Result<(), NeoError> {
    ensure_unique_ids(records.iter().map(|r| r.id))?;

    write_txn.delete_table(CANONICAL).map_err(io)?;
    let mut table = write_txn.open_table(CANONICAL).map_err(io)?;
    for (row, record) in records.iter().enumerate() {
        let bytes = encode(record)?;
        table.insert(row as u64, bytes.as_slice()).map_err(io)?;
    }
    Ok(())
}

/// Wholesale replace of the enriched table and its id index inside `write_txn`.
///
/// A duplicate id is detected while the index is rebuilt and fails the write.
fn write_enriched(
    write_txn: &WriteTransaction,
    records: &[EnrichedRecord],
) -> Result<(), NeoError> {
    write_txn.delete_table(ENRICHED).map_err(io)?;
    write_txn.delete_table(ENRICHED_INDEX).map_err(io)?;

    let mut table = write_txn.open_table(ENRICHED).map_err(io)?;
    let mut index = write_txn.open_table(ENRICHED_INDEX).map_err(io)?;
    for (row, record) in records.iter().enumerate() {
        let row = row as u64;
        let bytes = encode(record)?;
        table.insert(row, bytes.as_slice()).map_err(io)?;

        let replaced = index
            .insert(record.id().value(), row)
            .map_err(io)?
            .is_some();
        if replaced {
            return Err(NeoError::InvariantViolation(format!(
                "duplicate id {} in stored table",
                record.id()
            )));
        }
    }
    Ok(())
}

fn bump_runs(write_txn: &WriteTransaction) -> Result<(), NeoError> {
    let mut meta = write_txn.open_table(METADATA).map_err(io)?;
    let runs = meta
        .get(RUNS_KEY)
        .map_err(io)?
        .map(|v| v.value())
        .unwrap_or(0);
    meta.insert(RUNS_KEY, runs + 1).map_err(io)?;
    Ok(())
}

impl RecordStore for RedbStore {
    fn replace_canonical(&mut self, records: &[CanonicalRecord]) -> Result<(), NeoError> {
        self.transaction(|txn| write_canonical(txn, records))
    }

    fn replace_enriched(&mut self, records: &[EnrichedRecord]) -> Result<(), NeoError> {
        self.transaction(|txn| write_enriched(txn, records))
    }

    fn replace_run(
        &mut self,
        canonical: &[CanonicalRecord],
        enriched: &[EnrichedRecord],
    ) -> Result<(), NeoError> {
        self.transaction(|txn| {
            write_canonical(txn, canonical)?;
            write_enriched(txn, enriched)?;
            bump_runs(txn)
        })
    }

    fn load_canonical(&self) -> Result<Vec<CanonicalRecord>, NeoError> {
        self.load_rows(CANONICAL)
    }

    fn load_enriched(&self) -> Result<Vec<EnrichedRecord>, NeoError> {
        self.load_rows(ENRICHED)
    }

    fn get_enriched(&self, id: NeoId) -> Result<Option<EnrichedRecord>, NeoError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let index = read_txn.open_table(ENRICHED_INDEX).map_err(io)?;
        let Some(row) = index.get(id.value()).map_err(io)?.map(|v| v.value()) else {
            return Ok(None);
        };

        let table = read_txn.open_table(ENRICHED).map_err(io)?;
        match table.get(row).map_err(io)? {
            Some(bytes) => decode(bytes.value()).map(Some),
            None => Err(NeoError::InvariantViolation(format!(
                "index points to missing row {} for id {}",
                row, id
            ))),
        }
    }

    fn canonical_count(&self) -> Result<usize, NeoError> {
        self.count(CANONICAL)
    }

    fn enriched_count(&self) -> Result<usize, NeoError> {
        self.count(ENRICHED)
    }

    fn run_count(&self) -> Result<u64, NeoError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let meta = read_txn.open_table(METADATA).map_err(io)?;
        Ok(meta
            .get(RUNS_KEY)
            .map_err(io)?
            .map(|v| v.value())
            .unwrap_or(0))
    }
}
