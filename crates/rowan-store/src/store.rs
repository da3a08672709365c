//! RocksDB-backed request store.

use std::path::Path;

use rocksdb::{
    ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded, Options, WriteBatch,
    WriteOptions,
};
use rowan_core::StoredRequest;

use crate::{
    error::{StorageError, StorageResult},
    keys,
};

const CF_REQUESTS: &str = "requests";

type Db = DBWithThreadMode<MultiThreaded>;

/// Write options used for every mutation: flushed through the WAL before
/// success is reported, so an acknowledged put survives a crash.
fn durable_writes() -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(true);
    opts
}

/// Durable, ordered persistence of [`StoredRequest`] records.
///
/// The store is safe to share across tasks; RocksDB serializes concurrent
/// writers internally and readers iterate over consistent snapshots.
pub struct RequestStore {
    db: Db,
}

impl RequestStore {
    /// Opens or creates the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors =
            vec![ColumnFamilyDescriptor::new(CF_REQUESTS, Options::default())];
        let db = Db::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    /// Inserts or overwrites the record at its `(delivery_time, uid)` key.
    pub fn put(&self, request: &StoredRequest) -> StorageResult<()> {
        let cf = self.db.cf_handle(CF_REQUESTS).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {CF_REQUESTS}"))
        })?;
        let value = serde_json::to_vec(request)?;
        self.db
            .put_cf_opt(&cf, keys::key_of(request), &value, &durable_writes())?;
        Ok(())
    }

    /// Returns up to `n` unscheduled records in ascending key order.
    ///
    /// Records with `scheduled = true` are skipped without counting
    /// against `n`. The scan reads a snapshot; no locks are held after
    /// return.
    pub fn next(&self, n: usize) -> StorageResult<Vec<StoredRequest>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let cf = self.db.cf_handle(CF_REQUESTS).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {CF_REQUESTS}"))
        })?;

        let mut results = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            let request: StoredRequest = serde_json::from_slice(&value)?;
            if request.scheduled {
                continue;
            }
            results.push(request);
            if results.len() == n {
                break;
            }
        }
        Ok(results)
    }

    /// Atomically replaces `current` with `next` in a single write batch.
    ///
    /// Used when the key changes across retries: the delete and the put
    /// commit together, so the logical request is never missing or present
    /// at two keys.
    pub fn reschedule(
        &self,
        current: &StoredRequest,
        next: &StoredRequest,
    ) -> StorageResult<()> {
        let cf = self.db.cf_handle(CF_REQUESTS).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {CF_REQUESTS}"))
        })?;
        let value = serde_json::to_vec(next)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf, keys::key_of(current));
        batch.put_cf(&cf, keys::key_of(next), &value);
        self.db.write_opt(batch, &durable_writes())?;
        Ok(())
    }

    /// Removes the record at the request's key. Deleting an absent key is
    /// not an error.
    pub fn delete(&self, request: &StoredRequest) -> StorageResult<()> {
        let cf = self.db.cf_handle(CF_REQUESTS).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {CF_REQUESTS}"))
        })?;
        self.db
            .delete_cf_opt(&cf, keys::key_of(request), &durable_writes())?;
        Ok(())
    }

    /// Returns the number of records currently marked in-flight.
    pub fn scheduled_count(&self) -> StorageResult<usize> {
        let cf = self.db.cf_handle(CF_REQUESTS).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {CF_REQUESTS}"))
        })?;

        let mut count = 0;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            let request: StoredRequest = serde_json::from_slice(&value)?;
            if request.scheduled {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Clears stale in-flight flags left behind by an ungraceful shutdown.
    ///
    /// The `scheduled` flag is only meaningful within a single process
    /// lifetime. Must run before the dispatcher's first pass; returns the
    /// number of recovered records.
    pub fn recover_inflight(&self) -> StorageResult<usize> {
        let cf = self.db.cf_handle(CF_REQUESTS).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {CF_REQUESTS}"))
        })?;

        let mut batch = WriteBatch::default();
        let mut recovered = 0;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let mut request: StoredRequest = serde_json::from_slice(&value)?;
            if !request.scheduled {
                continue;
            }
            request.scheduled = false;
            batch.put_cf(&cf, key, serde_json::to_vec(&request)?);
            recovered += 1;
        }
        if recovered > 0 {
            self.db.write_opt(batch, &durable_writes())?;
        }
        Ok(recovered)
    }
}
