mod context;
mod engine;
mod expression;
pub mod executors;
mod plan;

pub use context::{ExecutorContext, NljCheck};
pub use engine::ExecutionEngine;
pub use expression::{ComparisonOp, Expression, LogicOp};
pub use plan::{
    mutation_count_schema, AggregationPlan, AggregationType, DeletePlan, FilterPlan, HashJoinPlan,
    IndexScanPlan, InsertPlan, JoinType, LimitPlan, NestedLoopJoinPlan, OrderByType, PlanNode,
    ProjectionPlan, SeqScanPlan, SortPlan, TopNPlan, UpdatePlan, ValuesPlan,
};
