use std::sync::Arc;

use crate::common::{Result, Rid};
use crate::execution::ValuesPlan;
use crate::types::{Schema, Tuple};

/// Emits a literal list of rows. The row expressions are evaluated against
/// an empty tuple, so only constants make sense here.
pub struct ValuesExecutor {
    plan: ValuesPlan,
    cursor: usize,
    empty: Tuple,
}

impl ValuesExecutor {
    pub fn new(plan: ValuesPlan) -> Self {
        Self {
            plan,
            cursor: 0,
            empty: Tuple::new(Arc::new(Schema::new(vec![])), vec![]),
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some(row) = self.plan.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let values = row.iter().map(|e| e.evaluate(&self.empty)).collect();
        let tuple = Tuple::new(Arc::clone(&self.plan.output_schema), values);
        Ok(Some((tuple, Rid::invalid())))
    }
}
