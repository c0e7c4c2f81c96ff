use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::{Result, Rid};
use crate::execution::{AggregationPlan, AggregationType};
use crate::types::{Tuple, Value};

use super::Executor;

/// Group-by key. Unlike join keys, NULL groups with NULL.
#[derive(Clone)]
struct AggregateKey(Vec<Value>);

impl PartialEq for AggregateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| {
                match (a, b) {
                    (Value::Null, Value::Null) => true,
                    (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
                    _ => a == b,
                }
            })
    }
}

impl Eq for AggregateKey {}

impl Hash for AggregateKey {
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

/// Hash aggregation: builds group -> running aggregates at init, then
/// streams the groups out.
///
/// Empty input with an empty group-by list yields exactly one row whose
/// aggregates are the initial values (COUNT(*) = 0, the rest NULL); empty
/// input with group-bys yields nothing.
pub struct AggregationExecutor {
    plan: AggregationPlan,
    child: Box<Executor>,
    results: Vec<(Vec<Value>, Vec<Value>)>,
    cursor: usize,
}

impl AggregationExecutor {
    pub fn new(plan: AggregationPlan, child: Box<Executor>) -> Self {
        Self {
            plan,
            child,
            results: Vec::new(),
            cursor: 0,
        }
    }

    fn initial_values(&self) -> Vec<Value> {
        self.plan
            .agg_types
            .iter()
            .map(|t| match t {
                AggregationType::CountStar => Value::Integer(0),
                _ => Value::Null,
            })
            .collect()
    }

    fn combine(&self, running: &mut [Value], inputs: &[Value]) {
        for ((slot, agg_type), input) in running
            .iter_mut()
            .zip(self.plan.agg_types.iter())
            .zip(inputs.iter())
        {
            match agg_type {
                AggregationType::CountStar => {
                    *slot = slot
                        .checked_add(&Value::Integer(1))
                        .expect("count is an integer");
                }
                AggregationType::Count => {
                    if !input.is_null() {
                        *slot = match slot {
                            Value::Null => Value::Integer(1),
                            ref other => other
                                .checked_add(&Value::Integer(1))
                                .expect("count is an integer"),
                        };
                    }
                }
                AggregationType::Sum => {
                    if !input.is_null() {
                        *slot = match slot {
                            Value::Null => input.clone(),
                            ref other => other.checked_add(input).unwrap_or(Value::Null),
                        };
                    }
                }
                AggregationType::Min => {
                    if !input.is_null() {
                        let replace = match slot.compare(input) {
                            None => true,
                            Some(ord) => ord.is_gt(),
                        };
                        if replace {
                            *slot = input.clone();
                        }
                    }
                }
                AggregationType::Max => {
                    if !input.is_null() {
                        let replace = match slot.compare(input) {
                            None => true,
                            Some(ord) => ord.is_lt(),
                        };
                        if replace {
                            *slot = input.clone();
                        }
                    }
                }
            }
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.results.clear();
        self.cursor = 0;

        let mut table: HashMap<AggregateKey, Vec<Value>> = HashMap::new();
        let mut order: Vec<AggregateKey> = Vec::new();

        while let Some((tuple, _)) = self.child.next()? {
            let key = AggregateKey(
                self.plan
                    .group_bys
                    .iter()
                    .map(|e| e.evaluate(&tuple))
                    .collect(),
            );
            let inputs: Vec<Value> = self
                .plan
                .aggregates
                .iter()
                .map(|e| e.evaluate(&tuple))
                .collect();

            let running = table.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                self.initial_values()
            });
            self.combine(running, &inputs);
        }

        if table.is_empty() && self.plan.group_bys.is_empty() {
            self.results.push((Vec::new(), self.initial_values()));
        } else {
            for key in order {
                let values = table.remove(&key).expect("key recorded at insert");
                self.results.push((key.0, values));
            }
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some((group, aggs)) = self.results.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let mut values = group.clone();
        values.extend(aggs.iter().cloned());
        let tuple = Tuple::new(Arc::clone(&self.plan.output_schema), values);
        Ok(Some((tuple, Rid::invalid())))
    }
}
