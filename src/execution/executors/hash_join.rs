use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::{Result, Rid};
use crate::execution::{Expression, HashJoinPlan, JoinType};
use crate::types::{Tuple, Value};

use super::Executor;

/// Equijoin key. Rows whose key contains a NULL never participate: they are
/// excluded from the build table, and a NULL probe key misses.
#[derive(Clone)]
struct JoinKey(Vec<Value>);

impl JoinKey {
    /// None if any component is NULL.
    fn from_tuple(exprs: &[Expression], tuple: &Tuple) -> Option<JoinKey> {
        let values: Vec<Value> = exprs.iter().map(|e| e.evaluate(tuple)).collect();
        if values.iter().any(Value::is_null) {
            return None;
        }
        Some(JoinKey(values))
    }
}

impl PartialEq for JoinKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.sql_eq(b) == Some(true))
    }
}

impl Eq for JoinKey {}

impl Hash for JoinKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            match value {
                Value::Null => {}
                Value::Boolean(b) => b.hash(state),
                Value::Integer(v) => (*v as i64).hash(state),
                Value::BigInt(v) => v.hash(state),
                Value::Double(v) => v.to_bits().hash(state),
                Value::Varchar(s) => s.hash(state),
            }
        }
    }
}

/// Hash join: builds a table over the right child at init, probes with each
/// left tuple. LEFT joins null-pad left tuples whose bucket is absent.
pub struct HashJoinExecutor {
    plan: HashJoinPlan,
    left: Box<Executor>,
    right: Box<Executor>,
    table: HashMap<JoinKey, Vec<Vec<Value>>>,
    current_left: Option<Tuple>,
    bucket: Vec<Vec<Value>>,
    bucket_pos: usize,
    pending_pad: bool,
}

impl HashJoinExecutor {
    pub fn new(plan: HashJoinPlan, left: Box<Executor>, right: Box<Executor>) -> Self {
        Self {
            plan,
            left,
            right,
            table: HashMap::new(),
            current_left: None,
            bucket: Vec::new(),
            bucket_pos: 0,
            pending_pad: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.table.clear();
        self.current_left = None;
        self.bucket.clear();
        self.bucket_pos = 0;
        self.pending_pad = false;

        while let Some((tuple, _)) = self.right.next()? {
            if let Some(key) = JoinKey::from_tuple(&self.plan.right_key_expressions, &tuple) {
                self.table
                    .entry(key)
                    .or_default()
                    .push(tuple.values().to_vec());
            }
        }
        Ok(())
    }

    fn joined(&self, left: &Tuple, right_values: &[Value]) -> Tuple {
        let mut values = left.values().to_vec();
        values.extend(right_values.iter().cloned());
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
            if self.bucket_pos < self.bucket.len() {
                let left = self.current_left.as_ref().expect("probing a left tuple");
                let row = self.joined(left, &self.bucket[self.bucket_pos]);
                self.bucket_pos += 1;
                return Ok(Some((row, Rid::invalid())));
            }

            if self.pending_pad {
                self.pending_pad = false;
                let left = self.current_left.as_ref().expect("probing a left tuple");
                return Ok(Some((self.null_padded(left), Rid::invalid())));
            }

            let Some((tuple, _)) = self.left.next()? else {
                return Ok(None);
            };

            self.bucket_pos = 0;
            match JoinKey::from_tuple(&self.plan.left_key_expressions, &tuple)
                .and_then(|key| self.table.get(&key))
            {
                Some(bucket) => {
                    self.bucket = bucket.clone();
                    self.pending_pad = false;
                }
                None => {
                    self.bucket.clear();
                    self.pending_pad = self.plan.join_type == JoinType::Left;
                }
            }
            self.current_left = Some(tuple);
        }
    }
}
