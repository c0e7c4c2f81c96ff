use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{Result, Rid};
use crate::concurrency::LockMode;
use crate::execution::{DeletePlan, ExecutorContext};
use crate::storage::page::TupleMeta;
use crate::types::{Tuple, Value};

use super::Executor;

/// Tombstones every child tuple and removes its index entries, then emits
/// one tuple holding the number of deleted rows.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    plan: DeletePlan,
    child: Box<Executor>,
    table: Option<Arc<TableInfo>>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: DeletePlan, child: Box<Executor>) -> Self {
        Self {
            ctx,
            plan,
            child,
            table: None,
            done: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.ctx
            .lock_table(LockMode::IntentionExclusive, self.plan.table_oid)?;
        self.table = Some(self.ctx.catalog().get_table(self.plan.table_oid)?);
        self.done = false;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        let table = self.table.as_ref().expect("init() before next()");
        let indexes = self.ctx.catalog().get_table_indexes(&table.name);

        let mut deleted = 0i32;
        while let Some((tuple, rid)) = self.child.next()? {
            self.ctx
                .lock_row(LockMode::Exclusive, self.plan.table_oid, rid)?;
            table
                .heap
                .update_tuple_meta(TupleMeta { is_deleted: true }, rid)?;
            for index in &indexes {
                if let Some(key) = tuple.index_key(&index.key_attrs) {
                    index.index.remove(key)?;
                }
            }
            deleted += 1;
        }

        self.done = true;
        let count = Tuple::new(
            Arc::clone(&self.plan.output_schema),
            vec![Value::Integer(deleted)],
        );
        Ok(Some((count, Rid::invalid())))
    }
}
