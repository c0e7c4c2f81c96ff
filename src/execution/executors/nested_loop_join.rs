use std::sync::Arc;

use crate::common::{Result, Rid};
use crate::execution::{ExecutorContext, JoinType, NestedLoopJoinPlan, NljCheck};
use crate::types::{Tuple, Value};

use super::Executor;

/// Nested loop join over materialized children, INNER and LEFT.
///
/// The right child is rewound (re-initialized) once per left tuple; the
/// engine cross-checks that against the number of left pulls.
pub struct NestedLoopJoinExecutor {
    plan: NestedLoopJoinPlan,
    left: Box<Executor>,
    right: Box<Executor>,
    check: Arc<NljCheck>,
    left_tuples: Vec<Tuple>,
    right_tuples: Vec<Tuple>,
    left_pos: usize,
    right_pos: usize,
    matched: bool,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        ctx: &ExecutorContext,
        plan: NestedLoopJoinPlan,
        left: Box<Executor>,
        right: Box<Executor>,
    ) -> Self {
        Self {
            plan,
            left,
            right,
            check: ctx.register_nlj_check(),
            left_tuples: Vec::new(),
            right_tuples: Vec::new(),
            left_pos: 0,
            right_pos: 0,
            matched: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.check.record_right_init();

        self.left_tuples.clear();
        self.right_tuples.clear();
        self.left_pos = 0;
        self.right_pos = 0;
        self.matched = false;

        loop {
            self.check.record_left_next();
            let Some((tuple, _)) = self.left.next()? else {
                break;
            };
            self.left_tuples.push(tuple);
        }
        while let Some((tuple, _)) = self.right.next()? {
            self.right_tuples.push(tuple);
        }

        // One rewind of the right side per buffered left tuple.
        for _ in 0..self.left_tuples.len() {
            self.right.init()?;
            self.check.record_right_init();
        }
        Ok(())
    }

    fn joined(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        values.extend(right.values().iter().cloned());
        Tuple::new(Arc::clone(&self.plan.output_schema), values)
    }

    fn null_padded(&self, left: &Tuple) -> Tuple {
        let right_width = self.plan.right.output_schema().column_count();
        let mut values = left.values().to_vec();
        values.extend(std::iter::repeat(Value::Null).take(right_width));
        Tuple::new(Arc::clone(&self.plan.output_schema), values)
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.left_pos >= self.left_tuples.len() {
                return Ok(None);
            }
            let left_tuple = &self.left_tuples[self.left_pos];

            while self.right_pos < self.right_tuples.len() {
                let right_tuple = &self.right_tuples[self.right_pos];
                self.right_pos += 1;
                if self
                    .plan
                    .predicate
                    .evaluate_join(left_tuple, right_tuple)
                    .is_true()
                {
                    self.matched = true;
                    return Ok(Some((self.joined(left_tuple, right_tuple), Rid::invalid())));
                }
            }

            let emit_padded = self.plan.join_type == JoinType::Left && !self.matched;
            let padded = emit_padded.then(|| self.null_padded(left_tuple));
            self.left_pos += 1;
            self.right_pos = 0;
            self.matched = false;
            if let Some(tuple) = padded {
                return Ok(Some((tuple, Rid::invalid())));
            }
        }
    }
}
