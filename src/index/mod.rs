pub mod btree;
pub mod btree_iterator;
pub mod btree_page;
pub mod key_comparator;

pub use btree::BPlusTree;
pub use btree_iterator::BTreeIterator;
pub use key_comparator::{I64Comparator, KeyComparator, ReverseComparator};
