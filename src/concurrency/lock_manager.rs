use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::{DbError, Oid, Result, Rid, TxnId};

use super::Transaction;

/// Lock modes requested by the executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    Exclusive,
}

/// Table and row locking surface consumed by the executors.
///
/// A false return means the lock was not granted; an Err(TransactionAborted)
/// means the transaction has been killed and the query must fail.
pub trait LockManager: Send + Sync {
    fn lock_table(&self, txn: &Transaction, mode: LockMode, oid: Oid) -> Result<bool>;
    fn unlock_table(&self, txn: &Transaction, oid: Oid) -> Result<bool>;
    fn lock_row(&self, txn: &Transaction, mode: LockMode, oid: Oid, rid: Rid) -> Result<bool>;
    fn unlock_row(&self, txn: &Transaction, oid: Oid, rid: Rid) -> Result<bool>;
}

/// Permissive lock manager: grants every compatible request immediately and
/// records what is held, which is all the executors (and their tests) need.
/// Honors the transaction's aborted flag so abort paths are exercisable.
#[derive(Default)]
pub struct RegistryLockManager {
    table_locks: Mutex<HashMap<(TxnId, Oid), LockMode>>,
    row_locks: Mutex<HashMap<(TxnId, Oid, Rid), LockMode>>,
}

impl RegistryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_alive(&self, txn: &Transaction) -> Result<()> {
        if txn.is_aborted() {
            return Err(DbError::TransactionAborted);
        }
        Ok(())
    }

    pub fn held_row_locks(&self, txn_id: TxnId) -> usize {
        self.row_locks
            .lock()
            .keys()
            .filter(|(t, _, _)| *t == txn_id)
            .count()
    }

    pub fn held_table_locks(&self, txn_id: TxnId) -> usize {
        self.table_locks
            .lock()
            .keys()
            .filter(|(t, _)| *t == txn_id)
            .count()
    }
}

impl LockManager for RegistryLockManager {
    fn lock_table(&self, txn: &Transaction, mode: LockMode, oid: Oid) -> Result<bool> {
        self.check_alive(txn)?;
        self.table_locks.lock().insert((txn.id(), oid), mode);
        Ok(true)
    }

    fn unlock_table(&self, txn: &Transaction, oid: Oid) -> Result<bool> {
        Ok(self.table_locks.lock().remove(&(txn.id(), oid)).is_some())
    }

    fn lock_row(&self, txn: &Transaction, mode: LockMode, oid: Oid, rid: Rid) -> Result<bool> {
        self.check_alive(txn)?;
        self.row_locks.lock().insert((txn.id(), oid, rid), mode);
        Ok(true)
    }

    fn unlock_row(&self, txn: &Transaction, oid: Oid, rid: Rid) -> Result<bool> {
        Ok(self.row_locks.lock().remove(&(txn.id(), oid, rid)).is_some())
    }
}
