mod catalog;

pub use catalog::{Catalog, IndexInfo, TableInfo};
