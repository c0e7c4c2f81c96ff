use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for a single frame
#[derive(Debug)]
struct LruKNode {
    /// Up to k most recent access timestamps (oldest at front)
    history: VecDeque<Timestamp>,
    is_evictable: bool,
}

impl LruKNode {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    /// The ordering key for this node: its oldest retained timestamp.
    ///
    /// While the frame is young (fewer than k accesses) this is the first
    /// access ever made; once mature it is the k-th most recent access, so
    /// ascending key order equals descending backward k-distance.
    fn order_key(&self) -> Timestamp {
        *self.history.front().expect("node has at least one access")
    }
}

struct ReplacerCore {
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than k accesses (+inf k-distance), keyed by first access
    young: BTreeSet<(Timestamp, FrameId)>,
    /// Frames with k accesses, keyed by k-th most recent access
    mature: BTreeSet<(Timestamp, FrameId)>,
    num_evictable: usize,
    clock: Timestamp,
}

/// LRU-K replacement policy.
///
/// Evicts the frame whose backward k-distance (logical time since the k-th
/// most recent access) is largest. Frames with fewer than k recorded accesses
/// have +inf distance and are preferred as victims; among those the one with
/// the oldest first access wins. Non-evictable frames are skipped.
pub struct LruKReplacer {
    k: usize,
    max_frames: usize,
    core: Mutex<ReplacerCore>,
}

impl LruKReplacer {
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            k,
            max_frames,
            core: Mutex::new(ReplacerCore {
                nodes: HashMap::new(),
                young: BTreeSet::new(),
                mature: BTreeSet::new(),
                num_evictable: 0,
                clock: 0,
            }),
        }
    }

    /// Records an access to the given frame at the next logical timestamp.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut core = self.core.lock();
        let now = core.clock;
        core.clock += 1;

        let k = self.k;
        let node = core.nodes.entry(frame_id).or_insert_with(LruKNode::new);

        let old_key = node.history.front().map(|&ts| (ts, frame_id));
        let was_mature = node.history.len() >= k;

        node.history.push_back(now);
        while node.history.len() > k {
            node.history.pop_front();
        }
        let new_key = (node.order_key(), frame_id);
        let is_mature = node.history.len() >= k;

        if let Some(key) = old_key {
            if was_mature {
                core.mature.remove(&key);
            } else {
                core.young.remove(&key);
            }
        }
        if is_mature {
            core.mature.insert(new_key);
        } else {
            core.young.insert(new_key);
        }
    }

    /// Evicts the frame with the largest backward k-distance.
    /// Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut core = self.core.lock();
        if core.num_evictable == 0 {
            return None;
        }

        // Any young frame beats any mature frame, so the young list is
        // searched first. Within a list the set order already encodes the
        // eviction priority.
        let victim = core
            .young
            .iter()
            .chain(core.mature.iter())
            .find(|(_, fid)| core.nodes[fid].is_evictable)
            .map(|&(_, fid)| fid)?;

        let node = core.nodes.remove(&victim).expect("victim is tracked");
        let key = (node.order_key(), victim);
        if node.history.len() >= self.k {
            core.mature.remove(&key);
        } else {
            core.young.remove(&key);
        }
        core.num_evictable -= 1;

        Some(victim)
    }

    /// Toggles whether a frame counts toward `size()` and may be evicted.
    /// Unknown frames are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut core = self.core.lock();
        if let Some(node) = core.nodes.get_mut(&frame_id) {
            if node.is_evictable != is_evictable {
                node.is_evictable = is_evictable;
                if is_evictable {
                    core.num_evictable += 1;
                } else {
                    core.num_evictable -= 1;
                }
            }
        }
    }

    /// Removes a frame from the replacer entirely.
    ///
    /// # Panics
    /// Panics if the frame is tracked but not evictable: removing a pinned
    /// frame is a programmer error.
    pub fn remove(&self, frame_id: FrameId) {
        let mut core = self.core.lock();
        let Some(node) = core.nodes.remove(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "cannot remove non-evictable frame {frame_id} from the replacer"
        );

        let key = (node.order_key(), frame_id);
        if node.history.len() >= self.k {
            core.mature.remove(&key);
        } else {
            core.young.remove(&key);
        }
        core.num_evictable -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.core.lock().num_evictable
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_infinite_distance_fifo() {
        let replacer = LruKReplacer::new(2, 10);

        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }
        assert_eq!(replacer.size(), 3);

        // All frames have a single access: +inf distance, oldest first access wins.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_young_beats_mature() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 1 has < k accesses and so +inf distance.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_largest_k_distance_wins() {
        let replacer = LruKReplacer::new(2, 10);

        // Frames 0, 1, 2 each accessed twice in order.
        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }

        // Frame 0's 2nd-most-recent access is oldest, so its k-distance is largest.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_interleaved_accesses() {
        let replacer = LruKReplacer::new(2, 10);

        // access 1; access 2; access 3; access 1; access 2
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));
        replacer.record_access(FrameId::new(3));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));

        for i in 1..=3 {
            replacer.set_evictable(FrameId::new(i), true);
        }

        // Frame 3 is the only one with fewer than k accesses.
        assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    }

    #[test]
    fn test_set_evictable_toggles_size() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_non_evictable_skipped() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 0 has the older access but is pinned.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_pinned_panics() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(FrameId::new(0));
        replacer.remove(FrameId::new(0));
    }

    #[test]
    fn test_k_equals_one_is_plain_lru() {
        let replacer = LruKReplacer::new(1, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 1 is least recently used.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }
}
