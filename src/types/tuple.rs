use std::sync::Arc;

use crate::common::Rid;

use super::{Schema, Value};

/// A single row: typed values laid out by a schema, identified by the `Rid`
/// of its heap slot once stored.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    rid: Rid,
}

impl Tuple {
    /// # Panics
    /// Panics if the value count does not match the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "value count must match schema column count"
        );
        Self {
            schema,
            values,
            rid: Rid::invalid(),
        }
    }

    pub fn with_rid(mut self, rid: Rid) -> Self {
        self.rid = rid;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = rid;
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Heap encoding: null bitmap followed by each non-null column in
    /// schema order.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let mut out = vec![0u8; self.schema.null_bitmap_size()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                out[i / 8] |= 1 << (i % 8);
            }
        }
        for (i, column) in self.schema.columns().enumerate() {
            let value = &self.values[i];
            if value.is_null() {
                continue;
            }
            out.extend(value.serialize(column.data_type())?);
        }
        Some(out)
    }

    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        let bitmap_size = schema.null_bitmap_size();
        let bitmap = data.get(..bitmap_size)?;
        let mut offset = bitmap_size;

        let mut values = Vec::with_capacity(schema.column_count());
        for (i, column) in schema.columns().enumerate() {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                values.push(Value::Null);
                continue;
            }
            let (value, used) = Value::deserialize(&data[offset..], column.data_type())?;
            offset += used;
            values.push(value);
        }
        Some(Self {
            schema,
            values,
            rid: Rid::invalid(),
        })
    }

    /// First key attribute as the index's integer key.
    pub fn index_key(&self, key_attrs: &[usize]) -> Option<i64> {
        self.values.get(*key_attrs.first()?)?.as_i64()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}
