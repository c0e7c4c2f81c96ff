mod aggregation;
mod delete;
mod filter;
mod hash_join;
mod index_scan;
mod insert;
mod limit;
mod nested_loop_join;
mod projection;
mod seq_scan;
mod sort;
mod topn;
mod update;
mod values;

use std::sync::Arc;

pub use aggregation::AggregationExecutor;
pub use delete::DeleteExecutor;
pub use filter::FilterExecutor;
pub use hash_join::HashJoinExecutor;
pub use index_scan::IndexScanExecutor;
pub use insert::InsertExecutor;
pub use limit::LimitExecutor;
pub use nested_loop_join::NestedLoopJoinExecutor;
pub use projection::ProjectionExecutor;
pub use seq_scan::SeqScanExecutor;
pub use sort::SortExecutor;
pub use topn::TopNExecutor;
pub use update::UpdateExecutor;
pub use values::ValuesExecutor;

use crate::common::{Result, Rid};
use crate::execution::{ExecutorContext, PlanNode};
use crate::types::Tuple;

/// Physical operator: a closed set of variants sharing the two-method
/// `init`/`next` interface. `next` returning None is end-of-stream; an
/// error fails the query.
///
/// `init` may be called any number of times and fully resets the operator.
pub enum Executor {
    SeqScan(SeqScanExecutor),
    IndexScan(IndexScanExecutor),
    Filter(FilterExecutor),
    Projection(ProjectionExecutor),
    Values(ValuesExecutor),
    NestedLoopJoin(NestedLoopJoinExecutor),
    HashJoin(HashJoinExecutor),
    Aggregation(AggregationExecutor),
    Sort(SortExecutor),
    TopN(TopNExecutor),
    Limit(LimitExecutor),
    Insert(InsertExecutor),
    Update(UpdateExecutor),
    Delete(DeleteExecutor),
}

impl Executor {
    /// Builds the operator tree for a plan, bottom-up.
    pub fn create(ctx: &Arc<ExecutorContext>, plan: &Arc<PlanNode>) -> Result<Executor> {
        Ok(match plan.as_ref() {
            PlanNode::SeqScan(p) => {
                Executor::SeqScan(SeqScanExecutor::new(Arc::clone(ctx), p.clone()))
            }
            PlanNode::IndexScan(p) => {
                Executor::IndexScan(IndexScanExecutor::new(Arc::clone(ctx), p.clone()))
            }
            PlanNode::Filter(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Filter(FilterExecutor::new(p.clone(), Box::new(child)))
            }
            PlanNode::Projection(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Projection(ProjectionExecutor::new(p.clone(), Box::new(child)))
            }
            PlanNode::Values(p) => Executor::Values(ValuesExecutor::new(p.clone())),
            PlanNode::NestedLoopJoin(p) => {
                let left = Executor::create(ctx, &p.left)?;
                let right = Executor::create(ctx, &p.right)?;
                Executor::NestedLoopJoin(NestedLoopJoinExecutor::new(
                    ctx,
                    p.clone(),
                    Box::new(left),
                    Box::new(right),
                ))
            }
            PlanNode::HashJoin(p) => {
                let left = Executor::create(ctx, &p.left)?;
                let right = Executor::create(ctx, &p.right)?;
                Executor::HashJoin(HashJoinExecutor::new(
                    p.clone(),
                    Box::new(left),
                    Box::new(right),
                ))
            }
            PlanNode::Aggregation(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Aggregation(AggregationExecutor::new(p.clone(), Box::new(child)))
            }
            PlanNode::Sort(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Sort(SortExecutor::new(p.clone(), Box::new(child)))
            }
            PlanNode::TopN(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::TopN(TopNExecutor::new(p.clone(), Box::new(child)))
            }
            PlanNode::Limit(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Limit(LimitExecutor::new(p.clone(), Box::new(child)))
            }
            PlanNode::Insert(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Insert(InsertExecutor::new(
                    Arc::clone(ctx),
                    p.clone(),
                    Box::new(child),
                ))
            }
            PlanNode::Update(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Update(UpdateExecutor::new(
                    Arc::clone(ctx),
                    p.clone(),
                    Box::new(child),
                ))
            }
            PlanNode::Delete(p) => {
                let child = Executor::create(ctx, &p.child)?;
                Executor::Delete(DeleteExecutor::new(
                    Arc::clone(ctx),
                    p.clone(),
                    Box::new(child),
                ))
            }
        })
    }

    pub fn init(&mut self) -> Result<()> {
        match self {
            Executor::SeqScan(e) => e.init(),
            Executor::IndexScan(e) => e.init(),
            Executor::Filter(e) => e.init(),
            Executor::Projection(e) => e.init(),
            Executor::Values(e) => e.init(),
            Executor::NestedLoopJoin(e) => e.init(),
            Executor::HashJoin(e) => e.init(),
            Executor::Aggregation(e) => e.init(),
            Executor::Sort(e) => e.init(),
            Executor::TopN(e) => e.init(),
            Executor::Limit(e) => e.init(),
            Executor::Insert(e) => e.init(),
            Executor::Update(e) => e.init(),
            Executor::Delete(e) => e.init(),
        }
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        match self {
            Executor::SeqScan(e) => e.next(),
            Executor::IndexScan(e) => e.next(),
            Executor::Filter(e) => e.next(),
            Executor::Projection(e) => e.next(),
            Executor::Values(e) => e.next(),
            Executor::NestedLoopJoin(e) => e.next(),
            Executor::HashJoin(e) => e.next(),
            Executor::Aggregation(e) => e.next(),
            Executor::Sort(e) => e.next(),
            Executor::TopN(e) => e.next(),
            Executor::Limit(e) => e.next(),
            Executor::Insert(e) => e.next(),
            Executor::Update(e) => e.next(),
            Executor::Delete(e) => e.next(),
        }
    }
}
