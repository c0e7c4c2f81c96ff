use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::BufferPoolManager;
use crate::common::{DbError, Oid, Result};
use crate::index::{BPlusTree, I64Comparator};
use crate::storage::table::TableHeap;
use crate::types::Schema;

/// Everything the executors need to know about a table.
pub struct TableInfo {
    pub oid: Oid,
    pub name: String,
    pub schema: Arc<Schema>,
    pub heap: Arc<TableHeap>,
}

/// Everything the executors need to know about an index.
pub struct IndexInfo {
    pub oid: Oid,
    pub name: String,
    pub table_name: String,
    pub key_schema: Arc<Schema>,
    pub key_attrs: Vec<usize>,
    pub index: Arc<BPlusTree>,
}

/// In-memory registry resolving table and index names/oids to their
/// metadata and storage objects.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<Oid, Arc<TableInfo>>>,
    table_names: RwLock<HashMap<String, Oid>>,
    indexes: RwLock<HashMap<Oid, Arc<IndexInfo>>>,
    /// table name -> index oids on that table
    table_indexes: RwLock<HashMap<String, Vec<Oid>>>,
    next_oid: AtomicU32,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            table_indexes: RwLock::new(HashMap::new()),
            next_oid: AtomicU32::new(0),
        }
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<TableInfo>> {
        let schema = schema.into_arc();
        let heap = Arc::new(TableHeap::new(Arc::clone(&self.bpm), Arc::clone(&schema))?);
        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);

        let info = Arc::new(TableInfo {
            oid,
            name: name.to_string(),
            schema,
            heap,
        });
        self.tables.write().insert(oid, Arc::clone(&info));
        self.table_names.write().insert(name.to_string(), oid);
        self.table_indexes
            .write()
            .entry(name.to_string())
            .or_default();
        Ok(info)
    }

    pub fn get_table(&self, oid: Oid) -> Result<Arc<TableInfo>> {
        self.tables
            .read()
            .get(&oid)
            .cloned()
            .ok_or(DbError::TableNotFound(oid))
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let oid = *self.table_names.read().get(name)?;
        self.tables.read().get(&oid).cloned()
    }

    /// Creates a B+Tree index over the given key attributes of a table and
    /// backfills it from the existing rows.
    pub fn create_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_attrs: Vec<usize>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Arc<IndexInfo>> {
        let table = self
            .get_table_by_name(table_name)
            .ok_or(DbError::TableNotFound(u32::MAX))?;
        let key_schema = table
            .schema
            .project(&key_attrs)
            .ok_or_else(|| DbError::Execution("index key attribute out of range".into()))?
            .into_arc();

        let index = Arc::new(BPlusTree::new(
            Arc::clone(&self.bpm),
            Arc::new(I64Comparator),
            leaf_max_size,
            internal_max_size,
        )?);

        // Backfill from live rows.
        let mut iter = table.heap.iter()?;
        while let Some((meta, tuple)) = iter.next()? {
            if meta.is_deleted {
                continue;
            }
            if let Some(key) = tuple.index_key(&key_attrs) {
                index.insert(key, tuple.rid())?;
            }
        }

        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.to_string(),
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index,
        });
        self.indexes.write().insert(oid, Arc::clone(&info));
        self.table_indexes
            .write()
            .entry(table_name.to_string())
            .or_default()
            .push(oid);
        Ok(info)
    }

    pub fn get_index(&self, oid: Oid) -> Result<Arc<IndexInfo>> {
        self.indexes
            .read()
            .get(&oid)
            .cloned()
            .ok_or(DbError::IndexNotFound(oid))
    }

    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let oids = self.table_indexes.read();
        let indexes = self.indexes.read();
        oids.get(table_name)
            .map(|ids| ids.iter().filter_map(|oid| indexes.get(oid).cloned()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use crate::storage::page::TupleMeta;
    use crate::types::{Column, DataType, Tuple, Value};
    use tempfile::NamedTempFile;

    fn setup() -> (Catalog, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));
        (Catalog::new(bpm), temp)
    }

    fn user_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::VarChar),
        ])
    }

    #[test]
    fn test_create_and_resolve_table() {
        let (catalog, _temp) = setup();
        let info = catalog.create_table("users", user_schema()).unwrap();

        assert_eq!(catalog.get_table(info.oid).unwrap().name, "users");
        assert!(catalog.get_table_by_name("users").is_some());
        assert!(catalog.get_table_by_name("ghosts").is_none());
        assert!(catalog.get_table(999).is_err());
    }

    #[test]
    fn test_create_index_backfills() {
        let (catalog, _temp) = setup();
        let table = catalog.create_table("users", user_schema()).unwrap();

        for i in [5, 1, 9] {
            let tuple = Tuple::new(
                Arc::clone(&table.schema),
                vec![Value::Integer(i), Value::Varchar(format!("u{i}"))],
            );
            table.heap.insert_tuple(TupleMeta::default(), &tuple).unwrap();
        }

        let index = catalog
            .create_index("users_by_id", "users", vec![0], 16, 16)
            .unwrap();
        assert!(index.index.get_value(5).unwrap().is_some());
        assert!(index.index.get_value(2).unwrap().is_none());
        assert_eq!(catalog.get_table_indexes("users").len(), 1);
    }
}
