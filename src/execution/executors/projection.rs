use std::sync::Arc;

use crate::common::{Result, Rid};
use crate::execution::ProjectionPlan;
use crate::types::Tuple;

use super::Executor;

/// Evaluates an expression vector per child tuple.
pub struct ProjectionExecutor {
    plan: ProjectionPlan,
    child: Box<Executor>,
}

impl ProjectionExecutor {
    pub fn new(plan: ProjectionPlan, child: Box<Executor>) -> Self {
        Self { plan, child }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some((tuple, rid)) = self.child.next()? else {
            return Ok(None);
        };
        let values = self
            .plan
            .expressions
            .iter()
            .map(|e| e.evaluate(&tuple))
            .collect();
        let projected = Tuple::new(Arc::clone(&self.plan.output_schema), values).with_rid(rid);
        Ok(Some((projected, rid)))
    }
}
