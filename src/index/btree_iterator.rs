use std::sync::Arc;

use crate::buffer::{BasicPageGuard, BufferPoolManager};
use crate::common::{Result, Rid};

use super::btree_page::LeafPageRef;

/// Forward iterator over the leaf chain in key order.
///
/// Holds one pinned leaf at a time and a slot index into it. The leaf
/// reference is recomputed from the guard on every access, so the pin is the
/// only state carried between calls; the end iterator holds no page.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    guard: Option<BasicPageGuard>,
    index: usize,
}

impl BTreeIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        guard: Option<BasicPageGuard>,
        index: usize,
    ) -> Self {
        Self { bpm, guard, index }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            guard: None,
            index: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Yields the next (key, rid) pair, following the leaf chain at page
    /// boundaries. The next leaf is pinned before the current one is
    /// released.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<(i64, Rid)>> {
        loop {
            let Some(guard) = self.guard.as_ref() else {
                return Ok(None);
            };

            let next_page_id = {
                let data = guard.data();
                let leaf = LeafPageRef::new(&data);
                if self.index < leaf.size() {
                    let entry = (leaf.key_at(self.index), leaf.rid_at(self.index));
                    self.index += 1;
                    return Ok(Some(entry));
                }
                leaf.next_page_id()
            };

            if next_page_id.is_valid() {
                let next_guard = self.bpm.fetch_basic(next_page_id)?;
                self.guard = Some(next_guard);
            } else {
                self.guard = None;
            }
            self.index = 0;
        }
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(i64, Rid)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BTreeIterator::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
