use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{DbError, Result, Rid};
use crate::execution::{ExecutorContext, IndexScanPlan};
use crate::index::BTreeIterator;
use crate::types::Tuple;

/// Scan in index key order: drives a B+Tree leaf iterator and looks each
/// rid up in the base table, skipping tombstones.
pub struct IndexScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: IndexScanPlan,
    table: Option<Arc<TableInfo>>,
    iter: Option<BTreeIterator>,
}

impl IndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: IndexScanPlan) -> Self {
        Self {
            ctx,
            plan,
            table: None,
            iter: None,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        let index = self.ctx.catalog().get_index(self.plan.index_oid)?;
        let table = self
            .ctx
            .catalog()
            .get_table_by_name(&index.table_name)
            .ok_or_else(|| DbError::Execution(format!("table {} vanished", index.table_name)))?;
        self.iter = Some(index.index.begin()?);
        self.table = Some(table);
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let iter = self.iter.as_mut().expect("init() before next()");
        let table = self.table.as_ref().expect("init() before next()");

        while let Some((_key, rid)) = iter.next()? {
            let Some((meta, tuple)) = table.heap.get_tuple(rid)? else {
                continue;
            };
            if meta.is_deleted {
                continue;
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }
}
