//! A persistent copy-on-write trie keyed on bytes.
//!
//! Mutating operations return a new `Trie` sharing every untouched subtree
//! with the original; existing snapshots are never affected. Values are
//! type-erased payloads: a lookup misses both when the path is absent and
//! when the stored payload is not of the requested type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct TrieNode {
    children: HashMap<u8, Arc<TrieNode>>,
    value: Option<Payload>,
}

impl TrieNode {
    fn shallow_clone(&self) -> TrieNode {
        TrieNode {
            children: self.children.clone(),
            value: self.value.clone(),
        }
    }
}

#[derive(Default, Clone)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Looks the key up, returning the payload only if it exists and is of
    /// type `T`.
    pub fn get<T: 'static>(&self, key: &[u8]) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for byte in key {
            node = node.children.get(byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie with `key` bound to `value`, cloning only the
    /// nodes along the path.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let payload: Payload = Arc::new(value);
        let root = Self::put_node(self.root.as_deref(), key, payload);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    fn put_node(node: Option<&TrieNode>, key: &[u8], payload: Payload) -> TrieNode {
        let mut fresh = node.map(TrieNode::shallow_clone).unwrap_or_default();
        match key.split_first() {
            None => {
                fresh.value = Some(payload);
            }
            Some((&byte, rest)) => {
                let child = fresh.children.get(&byte).cloned();
                let rebuilt = Self::put_node(child.as_deref(), rest, payload);
                fresh.children.insert(byte, Arc::new(rebuilt));
            }
        }
        fresh
    }

    /// Returns a new trie without a value at `key`. Nodes left with neither
    /// value nor children are pruned bottom-up; a missing path leaves the
    /// trie unchanged.
    pub fn remove(&self, key: &[u8]) -> Trie {
        match &self.root {
            None => Trie::new(),
            Some(root) => Trie {
                root: Self::remove_node(root, key),
            },
        }
    }

    fn remove_node(node: &Arc<TrieNode>, key: &[u8]) -> Option<Arc<TrieNode>> {
        match key.split_first() {
            None => {
                if node.children.is_empty() {
                    return None;
                }
                Some(Arc::new(TrieNode {
                    children: node.children.clone(),
                    value: None,
                }))
            }
            Some((byte, rest)) => {
                let Some(child) = node.children.get(byte) else {
                    // Path absent: nothing to remove.
                    return Some(Arc::clone(node));
                };
                let mut fresh = node.shallow_clone();
                match Self::remove_node(child, rest) {
                    Some(rebuilt) => {
                        fresh.children.insert(*byte, rebuilt);
                    }
                    None => {
                        fresh.children.remove(byte);
                    }
                }
                if fresh.children.is_empty() && fresh.value.is_none() {
                    return None;
                }
                Some(Arc::new(fresh))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_miss_on_absent_path() {
        let trie = Trie::new();
        assert!(trie.get::<u32>(b"missing").is_none());

        let trie = trie.put(b"hit", 1u32);
        assert!(trie.get::<u32>(b"hi").is_none());
        assert!(trie.get::<u32>(b"hits").is_none());
        assert_eq!(trie.get::<u32>(b"hit"), Some(&1));
    }

    #[test]
    fn test_get_miss_on_type_mismatch() {
        let trie = Trie::new().put(b"key", 42u32);
        assert_eq!(trie.get::<u32>(b"key"), Some(&42));
        assert!(trie.get::<String>(b"key").is_none());
        assert!(trie.get::<u64>(b"key").is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let trie = Trie::new().put(b"key", 1u32);
        let trie = trie.put(b"key", String::from("two"));
        assert!(trie.get::<u32>(b"key").is_none());
        assert_eq!(trie.get::<String>(b"key").map(String::as_str), Some("two"));
    }

    #[test]
    fn test_prefix_keys_coexist() {
        let trie = Trie::new().put(b"a", 1u32).put(b"ab", 2u32).put(b"abc", 3u32);
        assert_eq!(trie.get::<u32>(b"a"), Some(&1));
        assert_eq!(trie.get::<u32>(b"ab"), Some(&2));
        assert_eq!(trie.get::<u32>(b"abc"), Some(&3));
        assert!(trie.get::<u32>(b"b").is_none());
    }

    #[test]
    fn test_snapshots_are_isolated() {
        let v1 = Trie::new().put(b"k", 1u32);
        let v2 = v1.put(b"k", 2u32);
        let v3 = v2.remove(b"k");

        assert_eq!(v1.get::<u32>(b"k"), Some(&1));
        assert_eq!(v2.get::<u32>(b"k"), Some(&2));
        assert!(v3.get::<u32>(b"k").is_none());
    }

    #[test]
    fn test_remove_prunes_empty_branches() {
        let trie = Trie::new().put(b"deep/nested/key", 9u32);
        let trie = trie.remove(b"deep/nested/key");
        // The whole branch collapses away.
        assert!(trie.root.is_none());
        assert!(trie.get::<u32>(b"deep").is_none());
    }

    #[test]
    fn test_remove_keeps_prefix_value() {
        let trie = Trie::new().put(b"ab", 1u32).put(b"abcd", 2u32);
        let trie = trie.remove(b"abcd");
        assert_eq!(trie.get::<u32>(b"ab"), Some(&1));
        assert!(trie.get::<u32>(b"abcd").is_none());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let trie = Trie::new().put(b"here", 5u32);
        let trie = trie.remove(b"elsewhere");
        assert_eq!(trie.get::<u32>(b"here"), Some(&5));
    }

    #[test]
    fn test_empty_key() {
        let trie = Trie::new().put(b"", 7u32);
        assert_eq!(trie.get::<u32>(b""), Some(&7));
        let trie = trie.remove(b"");
        assert!(trie.get::<u32>(b"").is_none());
    }

    #[test]
    fn test_non_copy_payload() {
        let trie = Trie::new().put(b"owned", vec![1u8, 2, 3]);
        assert_eq!(trie.get::<Vec<u8>>(b"owned"), Some(&vec![1u8, 2, 3]));
    }
}
