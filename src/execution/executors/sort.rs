use std::cmp::Ordering;

use crate::common::{Result, Rid};
use crate::execution::{Expression, OrderByType, SortPlan};
use crate::types::Tuple;

use super::Executor;

/// Compares two tuples under an ORDER BY list: first differing key decides,
/// DESC flips it, incomparable values tie.
pub(crate) fn compare_by(
    order_bys: &[(OrderByType, Expression)],
    a: &Tuple,
    b: &Tuple,
) -> Ordering {
    for (order, expr) in order_bys {
        let av = expr.evaluate(a);
        let bv = expr.evaluate(b);
        match av.compare(&bv) {
            None | Some(Ordering::Equal) => continue,
            Some(ord) => {
                return if *order == OrderByType::Desc {
                    ord.reverse()
                } else {
                    ord
                };
            }
        }
    }
    Ordering::Equal
}

/// Buffers the child fully at init, then emits in sorted order.
pub struct SortExecutor {
    plan: SortPlan,
    child: Box<Executor>,
    tuples: Vec<Tuple>,
    cursor: usize,
}

impl SortExecutor {
    pub fn new(plan: SortPlan, child: Box<Executor>) -> Self {
        Self {
            plan,
            child,
            tuples: Vec::new(),
            cursor: 0,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.tuples.clear();
        self.cursor = 0;

        while let Some((tuple, _)) = self.child.next()? {
            self.tuples.push(tuple);
        }
        let order_bys = &self.plan.order_bys;
        self.tuples.sort_by(|a, b| compare_by(order_bys, a, b));
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some(tuple) = self.tuples.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let rid = tuple.rid();
        Ok(Some((tuple.clone(), rid)))
    }
}
