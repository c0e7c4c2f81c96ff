//! Optimizer rule tests: rewrites fire where they should, preserve the
//! output schema, and preserve the result multiset.

use std::sync::Arc;

use siltdb::buffer::BufferPoolManager;
use siltdb::catalog::Catalog;
use siltdb::common::Oid;
use siltdb::concurrency::{IsolationLevel, RegistryLockManager, Transaction};
use siltdb::execution::{
    ComparisonOp, ExecutionEngine, Expression, ExecutorContext, InsertPlan, JoinType, LimitPlan,
    NestedLoopJoinPlan, OrderByType, PlanNode, SeqScanPlan, SortPlan, ValuesPlan,
    mutation_count_schema,
};
use siltdb::optimizer::optimize;
use siltdb::storage::disk::DiskManager;
use siltdb::types::{Column, DataType, Schema, Tuple, Value};

use tempfile::NamedTempFile;

struct TestDb {
    bpm: Arc<BufferPoolManager>,
    catalog: Arc<Catalog>,
    engine: ExecutionEngine,
    _temp: NamedTempFile,
}

impl TestDb {
    fn new() -> Self {
        let temp = NamedTempFile::new().unwrap();
        let disk = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(128, 2, disk));
        let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));
        Self {
            bpm,
            catalog,
            engine: ExecutionEngine::new(),
            _temp: temp,
        }
    }

    fn ctx(&self) -> Arc<ExecutorContext> {
        Arc::new(ExecutorContext::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.bpm),
            Arc::new(Transaction::new(1, IsolationLevel::ReadUncommitted)),
            Arc::new(RegistryLockManager::new()),
        ))
    }

    fn table_with_rows(&self, name: &str, rows: &[(i32, i32)]) -> Oid {
        let table = self
            .catalog
            .create_table(
                name,
                Schema::new(vec![
                    Column::new("a", DataType::Integer),
                    Column::new("b", DataType::Integer),
                ]),
            )
            .unwrap();
        let values = rows
            .iter()
            .map(|(a, b)| vec![Expression::constant(*a), Expression::constant(*b)])
            .collect();
        let plan = Arc::new(PlanNode::Insert(InsertPlan {
            table_oid: table.oid,
            child: Arc::new(PlanNode::Values(ValuesPlan {
                rows: values,
                output_schema: Arc::clone(&table.schema),
            })),
            output_schema: mutation_count_schema(),
        }));
        self.engine.execute(&plan, &self.ctx()).unwrap();
        table.oid
    }

    fn scan_plan(&self, oid: Oid) -> Arc<PlanNode> {
        let table = self.catalog.get_table(oid).unwrap();
        Arc::new(PlanNode::SeqScan(SeqScanPlan {
            table_oid: oid,
            output_schema: Arc::clone(&table.schema),
        }))
    }

    fn run(&self, plan: &Arc<PlanNode>) -> Vec<Tuple> {
        self.engine.execute(plan, &self.ctx()).unwrap()
    }
}

fn sorted_rows(tuples: &[Tuple]) -> Vec<Vec<Value>> {
    let mut rows: Vec<Vec<Value>> = tuples.iter().map(|t| t.values().to_vec()).collect();
    rows.sort_by_key(|r| format!("{r:?}"));
    rows
}

fn nlj_plan(db: &TestDb, left: Oid, right: Oid, predicate: Expression) -> Arc<PlanNode> {
    let l = db.catalog.get_table(left).unwrap();
    let r = db.catalog.get_table(right).unwrap();
    Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        join_type: JoinType::Inner,
        predicate,
        left: db.scan_plan(left),
        right: db.scan_plan(right),
        output_schema: Arc::new(Schema::join(&l.schema, &r.schema)),
    }))
}

#[test]
fn test_single_equality_becomes_hash_join() {
    let db = TestDb::new();
    let left = db.table_with_rows("l", &[(1, 10), (2, 20)]);
    let right = db.table_with_rows("r", &[(2, 200), (3, 300)]);

    let plan = nlj_plan(
        &db,
        left,
        right,
        Expression::equal(Expression::column_of(0, 0), Expression::column_of(1, 0)),
    );
    let optimized = optimize(&plan);

    let PlanNode::HashJoin(hash) = optimized.as_ref() else {
        panic!("equi-join was not rewritten to a hash join");
    };
    assert_eq!(hash.left_key_expressions.len(), 1);
    assert_eq!(hash.output_schema, *plan.output_schema());

    assert_eq!(sorted_rows(&db.run(&plan)), sorted_rows(&db.run(&optimized)));
}

#[test]
fn test_reversed_sides_normalize() {
    let db = TestDb::new();
    let left = db.table_with_rows("l", &[(1, 10), (2, 20), (3, 30)]);
    let right = db.table_with_rows("r", &[(2, 20), (3, 99)]);

    // right.col = left.col, and an AND of two equalities.
    let predicate = Expression::and(
        Expression::equal(Expression::column_of(1, 0), Expression::column_of(0, 0)),
        Expression::equal(Expression::column_of(0, 1), Expression::column_of(1, 1)),
    );
    let plan = nlj_plan(&db, left, right, predicate);
    let optimized = optimize(&plan);

    let PlanNode::HashJoin(hash) = optimized.as_ref() else {
        panic!("conjunctive equi-join was not rewritten");
    };
    assert_eq!(hash.left_key_expressions.len(), 2);
    assert_eq!(hash.right_key_expressions.len(), 2);

    assert_eq!(sorted_rows(&db.run(&plan)), sorted_rows(&db.run(&optimized)));
}

#[test]
fn test_non_equi_join_is_left_alone() {
    let db = TestDb::new();
    let left = db.table_with_rows("l", &[(1, 10)]);
    let right = db.table_with_rows("r", &[(2, 20)]);

    let plan = nlj_plan(
        &db,
        left,
        right,
        Expression::comparison(
            ComparisonOp::LessThan,
            Expression::column_of(0, 0),
            Expression::column_of(1, 0),
        ),
    );
    let optimized = optimize(&plan);
    assert!(matches!(optimized.as_ref(), PlanNode::NestedLoopJoin(_)));

    // Same-side equality must not be rewritten either.
    let plan = nlj_plan(
        &db,
        left,
        right,
        Expression::equal(Expression::column_of(0, 0), Expression::column_of(0, 1)),
    );
    let optimized = optimize(&plan);
    assert!(matches!(optimized.as_ref(), PlanNode::NestedLoopJoin(_)));
}

#[test]
fn test_sort_limit_collapses_to_topn() {
    let db = TestDb::new();
    let oid = db.table_with_rows("t", &[(5, 0), (1, 0), (4, 0), (9, 0), (2, 0)]);

    let scan = db.scan_plan(oid);
    let plan = Arc::new(PlanNode::Limit(LimitPlan {
        limit: 3,
        child: Arc::new(PlanNode::Sort(SortPlan {
            order_bys: vec![(OrderByType::Asc, Expression::column(0))],
            child: Arc::clone(&scan),
            output_schema: Arc::clone(scan.output_schema()),
        })),
        output_schema: Arc::clone(scan.output_schema()),
    }));

    let optimized = optimize(&plan);
    let PlanNode::TopN(topn) = optimized.as_ref() else {
        panic!("limit-over-sort was not rewritten to top-n");
    };
    assert_eq!(topn.n, 3);
    assert!(matches!(topn.child.as_ref(), PlanNode::SeqScan(_)));
    assert_eq!(topn.output_schema, *plan.output_schema());

    // Ordered output must match exactly, not just as a multiset.
    let expected: Vec<Vec<Value>> = db
        .run(&plan)
        .iter()
        .map(|t| t.values().to_vec())
        .collect();
    let got: Vec<Vec<Value>> = db
        .run(&optimized)
        .iter()
        .map(|t| t.values().to_vec())
        .collect();
    assert_eq!(expected, got);
    assert_eq!(got[0][0], Value::Integer(1));
}

#[test]
fn test_rules_rewrite_below_other_nodes() {
    let db = TestDb::new();
    let left = db.table_with_rows("l", &[(1, 10), (2, 20)]);
    let right = db.table_with_rows("r", &[(1, 11), (2, 22)]);

    // Limit(Sort(NLJ)) rewrites both: TopN over HashJoin.
    let join = nlj_plan(
        &db,
        left,
        right,
        Expression::equal(Expression::column_of(0, 0), Expression::column_of(1, 0)),
    );
    let plan = Arc::new(PlanNode::Limit(LimitPlan {
        limit: 1,
        child: Arc::new(PlanNode::Sort(SortPlan {
            order_bys: vec![(OrderByType::Desc, Expression::column(0))],
            child: Arc::clone(&join),
            output_schema: Arc::clone(join.output_schema()),
        })),
        output_schema: Arc::clone(join.output_schema()),
    }));

    let optimized = optimize(&plan);
    let PlanNode::TopN(topn) = optimized.as_ref() else {
        panic!("outer limit-over-sort was not rewritten");
    };
    assert!(matches!(topn.child.as_ref(), PlanNode::HashJoin(_)));

    let rows = db.run(&optimized);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(0), &Value::Integer(2));
}
