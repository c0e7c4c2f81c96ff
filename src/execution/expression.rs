use std::cmp::Ordering;

use crate::types::{Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Expression tree evaluated against one tuple (or a pair, for joins).
///
/// `tuple_index` on a column reference selects the join side: 0 is the left
/// (or only) tuple, 1 the right.
#[derive(Debug, Clone)]
pub enum Expression {
    ColumnValue {
        tuple_index: usize,
        column_index: usize,
    },
    Constant(Value),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logic {
        op: LogicOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    /// Column of the single input (side 0).
    pub fn column(column_index: usize) -> Expression {
        Expression::ColumnValue {
            tuple_index: 0,
            column_index,
        }
    }

    /// Column of one side of a join.
    pub fn column_of(tuple_index: usize, column_index: usize) -> Expression {
        Expression::ColumnValue {
            tuple_index,
            column_index,
        }
    }

    pub fn constant(value: impl Into<Value>) -> Expression {
        Expression::Constant(value.into())
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Expression {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equal(left: Expression, right: Expression) -> Expression {
        Self::comparison(ComparisonOp::Equal, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Expression {
        Expression::Logic {
            op: LogicOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple) -> Value {
        self.eval(tuple, None)
    }

    pub fn evaluate_join(&self, left: &Tuple, right: &Tuple) -> Value {
        self.eval(left, Some(right))
    }

    fn eval(&self, left: &Tuple, right: Option<&Tuple>) -> Value {
        match self {
            Expression::ColumnValue {
                tuple_index,
                column_index,
            } => {
                let source = if *tuple_index == 0 {
                    left
                } else {
                    right.unwrap_or(left)
                };
                source
                    .values()
                    .get(*column_index)
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Expression::Constant(value) => value.clone(),
            Expression::Comparison { op, left: l, right: r } => {
                let lv = l.eval(left, right);
                let rv = r.eval(left, right);
                match lv.compare(&rv) {
                    None => Value::Null,
                    Some(ordering) => Value::Boolean(match op {
                        ComparisonOp::Equal => ordering == Ordering::Equal,
                        ComparisonOp::NotEqual => ordering != Ordering::Equal,
                        ComparisonOp::LessThan => ordering == Ordering::Less,
                        ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
                        ComparisonOp::GreaterThan => ordering == Ordering::Greater,
                        ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
                    }),
                }
            }
            Expression::Logic { op, left: l, right: r } => {
                let lv = l.eval(left, right);
                let rv = r.eval(left, right);
                match op {
                    LogicOp::And => match (as_bool(&lv), as_bool(&rv)) {
                        (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                        (Some(true), Some(true)) => Value::Boolean(true),
                        _ => Value::Null,
                    },
                    LogicOp::Or => match (as_bool(&lv), as_bool(&rv)) {
                        (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                        (Some(false), Some(false)) => Value::Boolean(false),
                        _ => Value::Null,
                    },
                }
            }
        }
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        _ => None,
    }
}
