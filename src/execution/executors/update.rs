use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{Result, Rid};
use crate::concurrency::LockMode;
use crate::execution::{ExecutorContext, UpdatePlan};
use crate::storage::page::TupleMeta;
use crate::types::{Tuple, Value};

use super::Executor;

/// Update as tombstone-and-insert: the old row is tombstoned and unindexed,
/// the target expressions produce the replacement row, and the replacement
/// is inserted and indexed. Emits one tuple holding the update count.
pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    plan: UpdatePlan,
    child: Box<Executor>,
    table: Option<Arc<TableInfo>>,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: UpdatePlan, child: Box<Executor>) -> Self {
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

        let mut updated = 0i32;
        while let Some((old_tuple, rid)) = self.child.next()? {
            self.ctx
                .lock_row(LockMode::Exclusive, self.plan.table_oid, rid)?;

            table
                .heap
                .update_tuple_meta(TupleMeta { is_deleted: true }, rid)?;
            for index in &indexes {
                if let Some(key) = old_tuple.index_key(&index.key_attrs) {
                    index.index.remove(key)?;
                }
            }

            let values: Vec<Value> = self
                .plan
                .target_expressions
                .iter()
                .map(|e| e.evaluate(&old_tuple))
                .collect();
            let new_tuple = Tuple::new(Arc::clone(&table.schema), values);

            if let Some(new_rid) = table.heap.insert_tuple(TupleMeta::default(), &new_tuple)? {
                self.ctx
                    .lock_row(LockMode::Exclusive, self.plan.table_oid, new_rid)?;
                for index in &indexes {
                    if let Some(key) = new_tuple.index_key(&index.key_attrs) {
                        index.index.insert(key, new_rid)?;
                    }
                }
            }
            updated += 1;
        }

        self.done = true;
        let count = Tuple::new(
            Arc::clone(&self.plan.output_schema),
            vec![Value::Integer(updated)],
        );
        Ok(Some((count, Rid::invalid())))
    }
}
