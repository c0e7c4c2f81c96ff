use std::sync::Arc;

use siltdb::buffer::BufferPoolManager;
use siltdb::catalog::Catalog;
use siltdb::concurrency::{IsolationLevel, RegistryLockManager, Transaction};
use siltdb::execution::{
    mutation_count_schema, ExecutionEngine, Expression, ExecutorContext, InsertPlan, PlanNode,
    SeqScanPlan, ValuesPlan,
};
use siltdb::storage::disk::DiskManager;
use siltdb::types::{Column, DataType, Schema};

fn main() {
    env_logger::init();

    println!("siltdb - a disk-oriented relational database engine");
    println!("===================================================\n");

    let db_path = "demo.db";
    let disk = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));

    let table = catalog
        .create_table(
            "users",
            Schema::new(vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::VarChar),
            ]),
        )
        .expect("failed to create table");
    println!("created table '{}' (oid {})", table.name, table.oid);

    let txn = Arc::new(Transaction::new(1, IsolationLevel::ReadCommitted));
    let lock_manager = Arc::new(RegistryLockManager::new());
    let ctx = Arc::new(ExecutorContext::new(
        Arc::clone(&catalog),
        Arc::clone(&bpm),
        txn,
        lock_manager,
    ));
    let engine = ExecutionEngine::new();

    // INSERT INTO users VALUES (1, 'ada'), (2, 'grace'), (3, 'edsger')
    let rows = vec![
        vec![Expression::constant(1), Expression::constant("ada")],
        vec![Expression::constant(2), Expression::constant("grace")],
        vec![Expression::constant(3), Expression::constant("edsger")],
    ];
    let insert = Arc::new(PlanNode::Insert(InsertPlan {
        table_oid: table.oid,
        child: Arc::new(PlanNode::Values(ValuesPlan {
            rows,
            output_schema: Arc::clone(&table.schema),
        })),
        output_schema: mutation_count_schema(),
    }));
    let result = engine.execute(&insert, &ctx).expect("insert failed");
    println!("inserted {} rows", result[0].value(0));

    // SELECT * FROM users
    let scan = Arc::new(PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        output_schema: Arc::clone(&table.schema),
    }));
    let rows = engine.execute(&scan, &ctx).expect("scan failed");
    println!("\nusers:");
    for row in &rows {
        println!("  ({}, {})", row.value(0), row.value(1));
    }

    bpm.flush_all_pages().expect("flush failed");
    std::fs::remove_file(db_path).ok();
    println!("\ndone");
}
