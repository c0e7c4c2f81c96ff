//! Persistent trie integration tests: copy-on-write snapshot behavior.

use std::sync::Arc;
use std::thread;

use siltdb::trie::Trie;

#[test]
fn test_versions_accumulate_independently() {
    let mut versions = vec![Trie::new()];
    for i in 0..20u32 {
        let next = versions.last().unwrap().put(format!("key{i}").as_bytes(), i);
        versions.push(next);
    }

    // Version v contains exactly keys 0..v.
    for (v, trie) in versions.iter().enumerate() {
        for i in 0..20u32 {
            let expected = (i as usize) < v;
            assert_eq!(
                trie.get::<u32>(format!("key{i}").as_bytes()).is_some(),
                expected,
                "version {v}, key {i}"
            );
        }
    }
}

#[test]
fn test_remove_creates_new_version() {
    let base = Trie::new().put(b"shared", 1u32).put(b"gone", 2u32);
    let trimmed = base.remove(b"gone");

    assert_eq!(base.get::<u32>(b"gone"), Some(&2));
    assert!(trimmed.get::<u32>(b"gone").is_none());
    assert_eq!(trimmed.get::<u32>(b"shared"), Some(&1));
}

#[test]
fn test_typed_lookup_is_strict() {
    let trie = Trie::new()
        .put(b"int", 7u32)
        .put(b"text", String::from("seven"))
        .put(b"wide", 7u64);

    assert_eq!(trie.get::<u32>(b"int"), Some(&7));
    assert!(trie.get::<u64>(b"int").is_none());
    assert!(trie.get::<String>(b"int").is_none());
    assert_eq!(trie.get::<u64>(b"wide"), Some(&7));
    assert_eq!(trie.get::<String>(b"text").map(String::as_str), Some("seven"));
}

#[test]
fn test_snapshots_shared_across_threads() {
    let trie = Arc::new(
        (0..100u32).fold(Trie::new(), |t, i| t.put(format!("k{i}").as_bytes(), i)),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let trie = Arc::clone(&trie);
            thread::spawn(move || {
                for i in 0..100u32 {
                    assert_eq!(trie.get::<u32>(format!("k{i}").as_bytes()), Some(&i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
