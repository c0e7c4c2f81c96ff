use std::cmp::Ordering;

use crate::common::{Result, Rid};
use crate::execution::TopNPlan;
use crate::types::Tuple;

use super::sort::compare_by;
use super::Executor;

/// TopN keeps the n best tuples under the ORDER BY comparator in a bounded
/// sift heap whose root is the worst kept element, so an incoming tuple
/// only displaces the root. Emission drains the heap worst-first and plays
/// it back in reverse.
pub struct TopNExecutor {
    plan: TopNPlan,
    child: Box<Executor>,
    heap: Vec<Tuple>,
    /// Sorted output, best first; `cursor` walks it during emission.
    sorted: Vec<Tuple>,
    cursor: usize,
}

impl TopNExecutor {
    pub fn new(plan: TopNPlan, child: Box<Executor>) -> Self {
        Self {
            plan,
            child,
            heap: Vec::new(),
            sorted: Vec::new(),
            cursor: 0,
        }
    }

    /// True if `a` sorts after `b`, i.e. `a` is the worse of the two.
    fn worse(&self, a: &Tuple, b: &Tuple) -> bool {
        compare_by(&self.plan.order_bys, a, b) == Ordering::Greater
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.worse(&self.heap[i], &self.heap[parent]) {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let mut worst = i;
            for child in [2 * i + 1, 2 * i + 2] {
                if child < self.heap.len() && self.worse(&self.heap[child], &self.heap[worst]) {
                    worst = child;
                }
            }
            if worst == i {
                break;
            }
            self.heap.swap(i, worst);
            i = worst;
        }
    }

    fn pop_worst(&mut self) -> Option<Tuple> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let worst = self.heap.pop();
        self.sift_down(0);
        worst
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.heap.clear();
        self.sorted.clear();
        self.cursor = 0;

        if self.plan.n == 0 {
            while self.child.next()?.is_some() {}
            return Ok(());
        }

        while let Some((tuple, _)) = self.child.next()? {
            self.heap.push(tuple);
            self.sift_up(self.heap.len() - 1);
            if self.heap.len() > self.plan.n {
                self.pop_worst();
            }
        }

        while let Some(tuple) = self.pop_worst() {
            self.sorted.push(tuple);
        }
        self.sorted.reverse();
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some(tuple) = self.sorted.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let rid = tuple.rid();
        Ok(Some((tuple.clone(), rid)))
    }
}
