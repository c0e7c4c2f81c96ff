use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{Result, Rid};
use crate::concurrency::LockMode;
use crate::execution::{ExecutorContext, InsertPlan};
use crate::storage::page::TupleMeta;
use crate::types::{Tuple, Value};

use super::Executor;

/// Inserts every child tuple into the table and all its indexes, then emits
/// one tuple holding the number of inserted rows.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    plan: InsertPlan,
    child: Box<Executor>,
    table: Option<Arc<TableInfo>>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: InsertPlan, child: Box<Executor>) -> Self {
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

        let mut inserted = 0i32;
        while let Some((tuple, _)) = self.child.next()? {
            let Some(rid) = table.heap.insert_tuple(TupleMeta::default(), &tuple)? else {
                continue;
            };
            self.ctx
                .lock_row(LockMode::Exclusive, self.plan.table_oid, rid)?;
            for index in &indexes {
                if let Some(key) = tuple.index_key(&index.key_attrs) {
                    index.index.insert(key, rid)?;
                }
            }
            inserted += 1;
        }

        self.done = true;
        let count = Tuple::new(
            Arc::clone(&self.plan.output_schema),
            vec![Value::Integer(inserted)],
        );
        Ok(Some((count, Rid::invalid())))
    }
}
