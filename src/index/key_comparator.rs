use std::cmp::Ordering;

/// Ordering over index keys, injected into the B+Tree.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: i64, b: i64) -> Ordering;
}

/// Natural signed-integer ordering.
pub struct I64Comparator;

impl KeyComparator for I64Comparator {
    fn compare(&self, a: i64, b: i64) -> Ordering {
        a.cmp(&b)
    }
}

/// Reverses another comparator. Mostly useful in tests that need a
/// non-natural ordering to prove the comparator is actually consulted.
pub struct ReverseComparator<C>(pub C);

impl<C: KeyComparator> KeyComparator for ReverseComparator<C> {
    fn compare(&self, a: i64, b: i64) -> Ordering {
        self.0.compare(b, a)
    }
}
