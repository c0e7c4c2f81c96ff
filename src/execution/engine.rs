use std::sync::Arc;

use log::warn;

use crate::common::Result;
use crate::types::Tuple;

use super::executors::Executor;
use super::{ExecutorContext, PlanNode};

/// Drives a plan tree to completion: build the operator tree, initialize
/// it, and pull root-first until end-of-stream.
///
/// Any execution error fails the whole query; no partial result set is
/// returned. After a successful run the engine asserts the cross-executor
/// nested-loop-join invariant recorded in the context.
pub struct ExecutionEngine;

impl ExecutionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        plan: &Arc<PlanNode>,
        ctx: &Arc<ExecutorContext>,
    ) -> Result<Vec<Tuple>> {
        let result = self.poll(plan, ctx);
        if let Err(e) = &result {
            warn!("query failed: {e}");
            return result;
        }
        self.perform_checks(ctx);
        result
    }

    fn poll(&self, plan: &Arc<PlanNode>, ctx: &Arc<ExecutorContext>) -> Result<Vec<Tuple>> {
        let mut executor = Executor::create(ctx, plan)?;
        executor.init()?;

        let mut results = Vec::new();
        while let Some((tuple, _rid)) = executor.next()? {
            results.push(tuple);
        }
        Ok(results)
    }

    /// The right side of every nested loop join must have been rewound once
    /// per consumed left tuple (off-by-one allowed).
    fn perform_checks(&self, ctx: &Arc<ExecutorContext>) {
        use std::sync::atomic::Ordering;

        for check in ctx.nlj_checks() {
            let right_inits = check.right_init_count.load(Ordering::Relaxed);
            let left_nexts = check.left_next_count.load(Ordering::Relaxed);
            assert!(
                right_inits + 1 >= left_nexts,
                "nested loop join did not rewind its right side per left tuple \
                 ({right_inits} inits for {left_nexts} pulls)"
            );
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}
