use std::sync::Arc;

use crate::common::Oid;
use crate::types::{Column, DataType, Schema};

use super::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Clone)]
pub struct SeqScanPlan {
    pub table_oid: Oid,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct IndexScanPlan {
    pub index_oid: Oid,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct FilterPlan {
    pub predicate: Expression,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct ProjectionPlan {
    pub expressions: Vec<Expression>,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

/// Literal rows, used as the source of INSERT and in tests.
#[derive(Clone)]
pub struct ValuesPlan {
    pub rows: Vec<Vec<Expression>>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct NestedLoopJoinPlan {
    pub join_type: JoinType,
    pub predicate: Expression,
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct HashJoinPlan {
    pub join_type: JoinType,
    pub left_key_expressions: Vec<Expression>,
    pub right_key_expressions: Vec<Expression>,
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct AggregationPlan {
    pub group_bys: Vec<Expression>,
    pub aggregates: Vec<Expression>,
    pub agg_types: Vec<AggregationType>,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct SortPlan {
    pub order_bys: Vec<(OrderByType, Expression)>,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct TopNPlan {
    pub n: usize,
    pub order_bys: Vec<(OrderByType, Expression)>,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct LimitPlan {
    pub limit: usize,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct InsertPlan {
    pub table_oid: Oid,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct UpdatePlan {
    pub table_oid: Oid,
    pub target_expressions: Vec<Expression>,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

#[derive(Clone)]
pub struct DeletePlan {
    pub table_oid: Oid,
    pub child: Arc<PlanNode>,
    pub output_schema: Arc<Schema>,
}

/// Physical plan node. A closed set: the executor factory matches on it
/// exhaustively.
#[derive(Clone)]
pub enum PlanNode {
    SeqScan(SeqScanPlan),
    IndexScan(IndexScanPlan),
    Filter(FilterPlan),
    Projection(ProjectionPlan),
    Values(ValuesPlan),
    NestedLoopJoin(NestedLoopJoinPlan),
    HashJoin(HashJoinPlan),
    Aggregation(AggregationPlan),
    Sort(SortPlan),
    TopN(TopNPlan),
    Limit(LimitPlan),
    Insert(InsertPlan),
    Update(UpdatePlan),
    Delete(DeletePlan),
}

impl PlanNode {
    pub fn output_schema(&self) -> &Arc<Schema> {
        match self {
            PlanNode::SeqScan(p) => &p.output_schema,
            PlanNode::IndexScan(p) => &p.output_schema,
            PlanNode::Filter(p) => &p.output_schema,
            PlanNode::Projection(p) => &p.output_schema,
            PlanNode::Values(p) => &p.output_schema,
            PlanNode::NestedLoopJoin(p) => &p.output_schema,
            PlanNode::HashJoin(p) => &p.output_schema,
            PlanNode::Aggregation(p) => &p.output_schema,
            PlanNode::Sort(p) => &p.output_schema,
            PlanNode::TopN(p) => &p.output_schema,
            PlanNode::Limit(p) => &p.output_schema,
            PlanNode::Insert(p) => &p.output_schema,
            PlanNode::Update(p) => &p.output_schema,
            PlanNode::Delete(p) => &p.output_schema,
        }
    }

    pub fn children(&self) -> Vec<&Arc<PlanNode>> {
        match self {
            PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_) => vec![],
            PlanNode::Filter(p) => vec![&p.child],
            PlanNode::Projection(p) => vec![&p.child],
            PlanNode::NestedLoopJoin(p) => vec![&p.left, &p.right],
            PlanNode::HashJoin(p) => vec![&p.left, &p.right],
            PlanNode::Aggregation(p) => vec![&p.child],
            PlanNode::Sort(p) => vec![&p.child],
            PlanNode::TopN(p) => vec![&p.child],
            PlanNode::Limit(p) => vec![&p.child],
            PlanNode::Insert(p) => vec![&p.child],
            PlanNode::Update(p) => vec![&p.child],
            PlanNode::Delete(p) => vec![&p.child],
        }
    }
}

/// Schema of the single-count tuple the mutation executors emit.
pub fn mutation_count_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![Column::new("count", DataType::Integer)]))
}
