//! Rule-based plan rewrites, applied bottom-up over the plan tree.

use std::sync::Arc;

use crate::execution::{
    ComparisonOp, Expression, HashJoinPlan, LogicOp, PlanNode, TopNPlan,
};

/// Applies every rewrite rule.
pub fn optimize(plan: &Arc<PlanNode>) -> Arc<PlanNode> {
    let plan = nlj_to_hash_join(plan);
    sort_limit_to_topn(&plan)
}

/// Rebuilds a node with each child replaced by `f(child)`.
fn map_children(
    plan: &PlanNode,
    f: &dyn Fn(&Arc<PlanNode>) -> Arc<PlanNode>,
) -> PlanNode {
    let mut node = plan.clone();
    match &mut node {
        PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_) => {}
        PlanNode::Filter(p) => p.child = f(&p.child),
        PlanNode::Projection(p) => p.child = f(&p.child),
        PlanNode::NestedLoopJoin(p) => {
            p.left = f(&p.left);
            p.right = f(&p.right);
        }
        PlanNode::HashJoin(p) => {
            p.left = f(&p.left);
            p.right = f(&p.right);
        }
        PlanNode::Aggregation(p) => p.child = f(&p.child),
        PlanNode::Sort(p) => p.child = f(&p.child),
        PlanNode::TopN(p) => p.child = f(&p.child),
        PlanNode::Limit(p) => p.child = f(&p.child),
        PlanNode::Insert(p) => p.child = f(&p.child),
        PlanNode::Update(p) => p.child = f(&p.child),
        PlanNode::Delete(p) => p.child = f(&p.child),
    }
    node
}

/// Collects the equi-join key expressions out of a predicate that is a
/// conjunction of `column = column` comparisons with the two columns on
/// opposite join sides (in either order). Key expressions are normalized to
/// side 0 so each executor evaluates them against its own input, and appear
/// in the order encountered.
fn extract_equi_conjuncts(
    expr: &Expression,
    left_keys: &mut Vec<Expression>,
    right_keys: &mut Vec<Expression>,
) -> bool {
    match expr {
        Expression::Comparison {
            op: ComparisonOp::Equal,
            left,
            right,
        } => {
            let (
                Expression::ColumnValue {
                    tuple_index: left_side,
                    column_index: left_col,
                },
                Expression::ColumnValue {
                    tuple_index: right_side,
                    column_index: right_col,
                },
            ) = (left.as_ref(), right.as_ref())
            else {
                return false;
            };
            match (*left_side, *right_side) {
                (0, 1) => {
                    left_keys.push(Expression::column(*left_col));
                    right_keys.push(Expression::column(*right_col));
                    true
                }
                (1, 0) => {
                    left_keys.push(Expression::column(*right_col));
                    right_keys.push(Expression::column(*left_col));
                    true
                }
                _ => false,
            }
        }
        Expression::Logic {
            op: LogicOp::And,
            left,
            right,
        } => {
            extract_equi_conjuncts(left, left_keys, right_keys)
                && extract_equi_conjuncts(right, left_keys, right_keys)
        }
        _ => false,
    }
}

/// NestedLoopJoin -> HashJoin when the predicate is a pure equi-join
/// conjunction. Join type and output schema carry over unchanged.
pub fn nlj_to_hash_join(plan: &Arc<PlanNode>) -> Arc<PlanNode> {
    let node = map_children(plan, &|child| nlj_to_hash_join(child));

    if let PlanNode::NestedLoopJoin(nlj) = &node {
        let mut left_keys = Vec::new();
        let mut right_keys = Vec::new();
        if extract_equi_conjuncts(&nlj.predicate, &mut left_keys, &mut right_keys) {
            return Arc::new(PlanNode::HashJoin(HashJoinPlan {
                join_type: nlj.join_type,
                left_key_expressions: left_keys,
                right_key_expressions: right_keys,
                left: Arc::clone(&nlj.left),
                right: Arc::clone(&nlj.right),
                output_schema: Arc::clone(&nlj.output_schema),
            }));
        }
    }
    Arc::new(node)
}

/// Limit over Sort -> TopN(limit, order_bys).
pub fn sort_limit_to_topn(plan: &Arc<PlanNode>) -> Arc<PlanNode> {
    let node = map_children(plan, &|child| sort_limit_to_topn(child));

    if let PlanNode::Limit(limit) = &node {
        if let PlanNode::Sort(sort) = limit.child.as_ref() {
            return Arc::new(PlanNode::TopN(TopNPlan {
                n: limit.limit,
                order_bys: sort.order_bys.clone(),
                child: Arc::clone(&sort.child),
                output_schema: Arc::clone(&limit.output_schema),
            }));
        }
    }
    Arc::new(node)
}
