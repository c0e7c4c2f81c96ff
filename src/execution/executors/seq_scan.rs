use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{Result, Rid};
use crate::concurrency::{IsolationLevel, LockMode};
use crate::execution::{ExecutorContext, SeqScanPlan};
use crate::storage::table::TableIterator;
use crate::types::Tuple;

/// Full scan of a table heap, skipping tombstoned tuples.
///
/// At READ_COMMITTED and above the scan takes IS on the table and S on each
/// emitted row; READ_COMMITTED releases all of them once the scan finishes.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: SeqScanPlan,
    table: Option<Arc<TableInfo>>,
    iter: Option<TableIterator>,
    locked_rows: Vec<Rid>,
    table_locked: bool,
    finished: bool,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: SeqScanPlan) -> Self {
        Self {
            ctx,
            plan,
            table: None,
            iter: None,
            locked_rows: Vec::new(),
            table_locked: false,
            finished: false,
        }
    }

    fn takes_locks(&self) -> bool {
        self.ctx.txn().isolation_level() >= IsolationLevel::ReadCommitted
    }

    pub fn init(&mut self) -> Result<()> {
        let table = self.ctx.catalog().get_table(self.plan.table_oid)?;

        if self.takes_locks() && !self.table_locked {
            self.ctx
                .lock_table(LockMode::IntentionShared, self.plan.table_oid)?;
            self.table_locked = true;
        }

        self.iter = Some(table.heap.iter()?);
        self.table = Some(table);
        self.locked_rows.clear();
        self.finished = false;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.finished {
            return Ok(None);
        }
        let takes_locks = self.takes_locks();
        let iter = self.iter.as_mut().expect("init() before next()");

        while let Some((meta, tuple)) = iter.next()? {
            if meta.is_deleted {
                continue;
            }
            let rid = tuple.rid();
            if takes_locks {
                self.ctx
                    .lock_row(LockMode::Shared, self.plan.table_oid, rid)?;
                self.locked_rows.push(rid);
            }
            return Ok(Some((tuple, rid)));
        }

        self.finished = true;
        if self.ctx.txn().isolation_level() == IsolationLevel::ReadCommitted {
            for rid in self.locked_rows.drain(..) {
                self.ctx.unlock_row(self.plan.table_oid, rid)?;
            }
            if self.table_locked {
                self.ctx.unlock_table(self.plan.table_oid)?;
                self.table_locked = false;
            }
        }
        Ok(None)
    }
}
