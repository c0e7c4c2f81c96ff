use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::common::{DbError, Oid, Result, Rid};
use crate::concurrency::{LockManager, LockMode, Transaction};

/// Counters for the nested-loop-join rewind invariant: the right child must
/// be re-initialized for (almost) every left tuple consumed.
#[derive(Default)]
pub struct NljCheck {
    pub right_init_count: AtomicUsize,
    pub left_next_count: AtomicUsize,
}

impl NljCheck {
    pub fn record_right_init(&self) {
        self.right_init_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_left_next(&self) {
        self.left_next_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-query context handed to every executor.
pub struct ExecutorContext {
    catalog: Arc<Catalog>,
    bpm: Arc<BufferPoolManager>,
    txn: Arc<Transaction>,
    lock_manager: Arc<dyn LockManager>,
    nlj_checks: Mutex<Vec<Arc<NljCheck>>>,
}

impl ExecutorContext {
    pub fn new(
        catalog: Arc<Catalog>,
        bpm: Arc<BufferPoolManager>,
        txn: Arc<Transaction>,
        lock_manager: Arc<dyn LockManager>,
    ) -> Self {
        Self {
            catalog,
            bpm,
            txn,
            lock_manager,
            nlj_checks: Mutex::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn txn(&self) -> &Arc<Transaction> {
        &self.txn
    }

    pub fn register_nlj_check(&self) -> Arc<NljCheck> {
        let check = Arc::new(NljCheck::default());
        self.nlj_checks.lock().push(Arc::clone(&check));
        check
    }

    pub fn nlj_checks(&self) -> Vec<Arc<NljCheck>> {
        self.nlj_checks.lock().clone()
    }

    /// Lock helpers: a refused or aborted lock becomes a query failure.
    pub fn lock_table(&self, mode: LockMode, oid: Oid) -> Result<()> {
        match self.lock_manager.lock_table(&self.txn, mode, oid) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DbError::Execution(format!(
                "failed to lock table {oid}"
            ))),
            Err(e) => Err(DbError::Execution(format!("lock table {oid}: {e}"))),
        }
    }

    pub fn unlock_table(&self, oid: Oid) -> Result<()> {
        self.lock_manager
            .unlock_table(&self.txn, oid)
            .map(|_| ())
            .map_err(|e| DbError::Execution(format!("unlock table {oid}: {e}")))
    }

    pub fn lock_row(&self, mode: LockMode, oid: Oid, rid: Rid) -> Result<()> {
        match self.lock_manager.lock_row(&self.txn, mode, oid, rid) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DbError::Execution(format!(
                "failed to lock row {rid} of table {oid}"
            ))),
            Err(e) => Err(DbError::Execution(format!("lock row {rid}: {e}"))),
        }
    }

    pub fn unlock_row(&self, oid: Oid, rid: Rid) -> Result<()> {
        self.lock_manager
            .unlock_row(&self.txn, oid, rid)
            .map(|_| ())
            .map_err(|e| DbError::Execution(format!("unlock row {rid}: {e}")))
    }
}
