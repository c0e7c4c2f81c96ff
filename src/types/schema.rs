use std::collections::HashMap;
use std::sync::Arc;

use super::DataType;

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Ordered column list describing a tuple layout.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    name_to_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let name_to_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            columns,
            name_to_index,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Bytes in the per-tuple null bitmap.
    pub fn null_bitmap_size(&self) -> usize {
        self.columns.len().div_ceil(8)
    }

    /// Schema of a subset of columns, in the given order.
    pub fn project(&self, column_indices: &[usize]) -> Option<Schema> {
        let columns: Option<Vec<Column>> = column_indices
            .iter()
            .map(|&i| self.columns.get(i).cloned())
            .collect();
        columns.map(Schema::new)
    }

    /// Concatenation of two schemas, as produced by a join.
    pub fn join(left: &Schema, right: &Schema) -> Schema {
        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().cloned());
        Schema::new(columns)
    }

    pub fn into_arc(self) -> Arc<Schema> {
        Arc::new(self)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::VarChar),
            Column::nullable("score", DataType::Double),
        ])
    }

    #[test]
    fn test_lookup() {
        let schema = sample();
        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
        assert!(schema.column(2).unwrap().is_nullable());
    }

    #[test]
    fn test_project_and_join() {
        let schema = sample();
        let projected = schema.project(&[2, 0]).unwrap();
        assert_eq!(projected.column(0).unwrap().name(), "score");
        assert_eq!(projected.column(1).unwrap().name(), "id");

        let joined = Schema::join(&schema, &projected);
        assert_eq!(joined.column_count(), 5);
        assert_eq!(joined.column(3).unwrap().name(), "score");
    }

    #[test]
    fn test_null_bitmap_size() {
        assert_eq!(sample().null_bitmap_size(), 1);
        let wide = Schema::new(
            (0..9)
                .map(|i| Column::new(format!("c{i}"), DataType::Integer))
                .collect(),
        );
        assert_eq!(wide.null_bitmap_size(), 2);
    }
}
