use std::sync::Arc;

use log::debug;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{PageId, Result, Rid};

use super::btree_page::{
    page_type, BTreeHeaderPage, BTreeHeaderPageRef, BTreePageType, InternalPage, InternalPageRef,
    LeafPage, LeafPageRef,
};
use super::{BTreeIterator, KeyComparator};

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Remove,
}

/// Latches retained during a write descent: the header page while the root
/// may still change, and every ancestor from the last safe node down.
struct WriteContext {
    header: Option<WritePageGuard>,
    /// Root page id at descent time; the root cannot move while any latch
    /// from this context is held.
    root_page_id: PageId,
    /// (ancestor guard, child index taken during the descent)
    ancestors: Vec<(WritePageGuard, usize)>,
}

impl WriteContext {
    /// Drops the header latch and all ancestor latches in one shot.
    fn release_ancestors(&mut self) {
        self.header = None;
        self.ancestors.clear();
    }
}

/// Outcome of rebalancing one underfull node against a sibling.
enum FixOutcome {
    /// An entry was borrowed; the subtree is balanced again.
    Borrowed,
    /// The node was merged into its left sibling and must be deleted.
    MergedAway,
    /// The right sibling was merged into the node and has been deleted.
    AbsorbedSibling,
}

/// A concurrent B+Tree index over (i64 key, Rid) pairs with unique keys.
///
/// The tree is identified by a stable header page holding the root page id.
/// Readers descend with hand-over-hand read latches; writers descend with
/// write latches, releasing all ancestors as soon as the current node cannot
/// split (insert) or underflow (delete).
pub struct BPlusTree {
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: Arc<dyn KeyComparator>,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree {
    /// Creates a new tree: allocates the header page and an empty leaf root.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let mut header_guard = bpm.new_write_guarded()?;
        let header_page_id = header_guard.page_id();

        let mut root_guard = bpm.new_write_guarded()?;
        LeafPage::init(root_guard.data_mut(), leaf_max_size);
        BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(root_guard.page_id());

        drop(root_guard);
        drop(header_guard);

        Ok(Self {
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    /// Reopens an existing tree by its header page id.
    pub fn open(
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        Self {
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.fetch_read(self.header_page_id)?;
        Ok(BTreeHeaderPageRef::new(guard.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        let root_id = self.root_page_id()?;
        let guard = self.bpm.fetch_read(root_id)?;
        Ok(match page_type(guard.data()) {
            BTreePageType::Leaf => LeafPageRef::new(guard.data()).size() == 0,
            _ => false,
        })
    }

    /// Point lookup. Read latches are taken hand-over-hand: the child is
    /// latched before the parent is released, and at most two pages are held
    /// at any moment.
    pub fn get_value(&self, key: i64) -> Result<Option<Rid>> {
        let cmp = &*self.comparator;

        let header = self.bpm.fetch_read(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header.data()).root_page_id();
        let mut cur = self.bpm.fetch_read(root_id)?;
        drop(header);

        loop {
            match page_type(cur.data()) {
                BTreePageType::Leaf => {
                    let leaf = LeafPageRef::new(cur.data());
                    let pos = leaf.lower_bound(key, cmp);
                    if pos < leaf.size() && cmp.compare(leaf.key_at(pos), key).is_eq() {
                        return Ok(Some(leaf.rid_at(pos)));
                    }
                    return Ok(None);
                }
                BTreePageType::Internal => {
                    let child_id = {
                        let node = InternalPageRef::new(cur.data());
                        node.child_at(node.find_child(key, cmp))
                    };
                    let child = self.bpm.fetch_read(child_id)?;
                    cur = child;
                }
                BTreePageType::Invalid => {
                    unreachable!("descended into an uninitialized page")
                }
            }
        }
    }

    /// Whether the node cannot split (insert) or underflow (delete) and so
    /// allows all ancestor latches to be released.
    fn is_safe(&self, data: &[u8], op: WriteOp, is_root: bool) -> bool {
        match (page_type(data), op) {
            (BTreePageType::Leaf, WriteOp::Insert) => {
                LeafPageRef::new(data).size() < self.leaf_max_size
            }
            (BTreePageType::Internal, WriteOp::Insert) => {
                InternalPageRef::new(data).size() < self.internal_max_size
            }
            (BTreePageType::Leaf, WriteOp::Remove) => {
                let leaf = LeafPageRef::new(data);
                is_root || leaf.size() > leaf.min_size()
            }
            (BTreePageType::Internal, WriteOp::Remove) => {
                let node = InternalPageRef::new(data);
                if is_root {
                    node.size() > 2
                } else {
                    node.size() > node.min_size()
                }
            }
            (BTreePageType::Invalid, _) => {
                unreachable!("descended into an uninitialized page")
            }
        }
    }

    /// Write descent with latch crabbing. Returns the retained latches and
    /// the write-latched target leaf.
    fn descend_write(&self, key: i64, op: WriteOp) -> Result<(WriteContext, WritePageGuard)> {
        let cmp = &*self.comparator;

        let header = self.bpm.fetch_write(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header.data()).root_page_id();

        let mut ctx = WriteContext {
            header: Some(header),
            root_page_id: root_id,
            ancestors: Vec::new(),
        };
        let mut cur = self.bpm.fetch_write(root_id)?;
        let mut depth = 0;

        loop {
            if self.is_safe(cur.data(), op, depth == 0) {
                ctx.release_ancestors();
            }
            match page_type(cur.data()) {
                BTreePageType::Leaf => return Ok((ctx, cur)),
                BTreePageType::Internal => {
                    let (idx, child_id) = {
                        let node = InternalPageRef::new(cur.data());
                        let idx = node.find_child(key, cmp);
                        (idx, node.child_at(idx))
                    };
                    let child = self.bpm.fetch_write(child_id)?;
                    ctx.ancestors.push((cur, idx));
                    cur = child;
                    depth += 1;
                }
                BTreePageType::Invalid => {
                    unreachable!("descended into an uninitialized page")
                }
            }
        }
    }

    /// Unique-key insert. Returns false if the key already exists. A failed
    /// page allocation surfaces before any page is modified.
    pub fn insert(&self, key: i64, rid: Rid) -> Result<bool> {
        let cmp = &*self.comparator;
        let (mut ctx, mut leaf_guard) = self.descend_write(key, WriteOp::Insert)?;

        let pos = {
            let leaf = LeafPageRef::new(leaf_guard.data());
            let pos = leaf.lower_bound(key, cmp);
            if pos < leaf.size() && cmp.compare(leaf.key_at(pos), key).is_eq() {
                return Ok(false);
            }
            pos
        };

        let will_split = LeafPageRef::new(leaf_guard.data()).size() + 1 > self.leaf_max_size;
        if !will_split {
            LeafPage::new(leaf_guard.data_mut()).insert_at(pos, key, rid);
            return Ok(true);
        }

        // Every page the split cascade will need, allocated up front: one
        // leaf sibling, one sibling per unsafe retained ancestor, and a new
        // root if the header is still latched (the whole path is unsafe).
        let needed = if ctx.header.is_some() {
            ctx.ancestors.len() + 2
        } else {
            ctx.ancestors.len()
        };
        let mut fresh: Vec<WritePageGuard> = Vec::with_capacity(needed);
        for _ in 0..needed {
            fresh.push(self.bpm.new_write_guarded()?);
        }

        let mut sibling_guard = fresh.pop().expect("leaf sibling pre-allocated");
        let sibling_id = sibling_guard.page_id();
        let separator = {
            let mut leaf = LeafPage::new(leaf_guard.data_mut());
            let mut sibling = LeafPage::init(sibling_guard.data_mut(), self.leaf_max_size);
            leaf.insert_at(pos, key, rid);
            sibling.set_next_page_id(leaf.next_page_id());
            let separator = leaf.split_into(&mut sibling);
            leaf.set_next_page_id(sibling_id);
            separator
        };
        drop(sibling_guard);
        drop(leaf_guard);

        let mut pending = Some((separator, sibling_id));
        while let Some((sep_key, new_child)) = pending.take() {
            match ctx.ancestors.pop() {
                Some((mut parent_guard, _)) => {
                    InternalPage::new(parent_guard.data_mut()).insert(sep_key, new_child, cmp);
                    if InternalPageRef::new(parent_guard.data()).size() > self.internal_max_size {
                        let mut new_sibling = fresh.pop().expect("internal sibling pre-allocated");
                        let new_sibling_id = new_sibling.page_id();
                        let pushed_up = {
                            let mut node = InternalPage::new(parent_guard.data_mut());
                            let mut sibling = InternalPage::init(
                                new_sibling.data_mut(),
                                self.internal_max_size,
                            );
                            node.split_into(&mut sibling)
                        };
                        pending = Some((pushed_up, new_sibling_id));
                    }
                }
                None => {
                    let mut header_guard =
                        ctx.header.take().expect("header retained for a root split");
                    let old_root = BTreeHeaderPageRef::new(header_guard.data()).root_page_id();
                    let mut new_root = fresh.pop().expect("root page pre-allocated");
                    let new_root_id = new_root.page_id();
                    InternalPage::init(new_root.data_mut(), self.internal_max_size)
                        .init_root(old_root, sep_key, new_child);
                    BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(new_root_id);
                    debug!("root split: {old_root} -> {new_root_id}");
                }
            }
        }
        debug_assert!(fresh.is_empty(), "split cascade used every pre-allocated page");

        Ok(true)
    }

    /// Removes the key if present. Missing keys are a no-op.
    pub fn remove(&self, key: i64) -> Result<()> {
        let cmp = &*self.comparator;
        let (mut ctx, mut leaf_guard) = self.descend_write(key, WriteOp::Remove)?;

        {
            let leaf = LeafPageRef::new(leaf_guard.data());
            let pos = leaf.lower_bound(key, cmp);
            if pos >= leaf.size() || !cmp.compare(leaf.key_at(pos), key).is_eq() {
                return Ok(());
            }
            LeafPage::new(leaf_guard.data_mut()).remove_at(pos);
        }

        // An empty ancestor stack means the leaf was either safe or the
        // root; neither needs rebalancing.
        let underfull = {
            let leaf = LeafPageRef::new(leaf_guard.data());
            !ctx.ancestors.is_empty() && leaf.size() < leaf.min_size()
        };
        if !underfull {
            return Ok(());
        }

        let mut child_guard = leaf_guard;
        let mut child_is_leaf = true;
        loop {
            let (mut parent_guard, child_idx) = ctx
                .ancestors
                .pop()
                .expect("an unsafe child retains its parent latch");

            let outcome = if child_is_leaf {
                self.fix_leaf(&mut parent_guard, child_idx, &mut child_guard)?
            } else {
                self.fix_internal(&mut parent_guard, child_idx, &mut child_guard)?
            };

            let child_id = child_guard.page_id();
            drop(child_guard);
            if matches!(outcome, FixOutcome::MergedAway) {
                let _ = self.bpm.delete_page(child_id);
            }

            let parent_size = InternalPageRef::new(parent_guard.data()).size();
            if parent_guard.page_id() == ctx.root_page_id {
                if parent_size == 1 {
                    // The root shrank to a single child: it becomes the root.
                    let new_root = InternalPageRef::new(parent_guard.data()).child_at(0);
                    let mut header_guard = ctx
                        .header
                        .take()
                        .expect("header retained while the root can change");
                    BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(new_root);
                    debug!("root collapse: {} -> {new_root}", parent_guard.page_id());
                    let old_root = parent_guard.page_id();
                    drop(parent_guard);
                    let _ = self.bpm.delete_page(old_root);
                }
                break;
            }
            if parent_size >= (self.internal_max_size + 1) / 2 {
                break;
            }

            child_guard = parent_guard;
            child_is_leaf = false;
        }

        Ok(())
    }

    /// Rebalances an underfull leaf against a sibling under the same parent:
    /// borrow if the sibling has spare entries, merge otherwise.
    fn fix_leaf(
        &self,
        parent: &mut WritePageGuard,
        child_idx: usize,
        child: &mut WritePageGuard,
    ) -> Result<FixOutcome> {
        if child_idx > 0 {
            let left_id = InternalPageRef::new(parent.data()).child_at(child_idx - 1);
            let mut left = self.bpm.fetch_write(left_id)?;

            let spare = {
                let l = LeafPageRef::new(left.data());
                l.size() > l.min_size()
            };
            if spare {
                let (key, rid) = {
                    let l = LeafPageRef::new(left.data());
                    (l.key_at(l.size() - 1), l.rid_at(l.size() - 1))
                };
                {
                    let mut l = LeafPage::new(left.data_mut());
                    let last = l.size() - 1;
                    l.remove_at(last);
                }
                LeafPage::new(child.data_mut()).push_front(key, rid);
                InternalPage::new(parent.data_mut()).set_key_at(child_idx, key);
                return Ok(FixOutcome::Borrowed);
            }

            {
                let mut l = LeafPage::new(left.data_mut());
                let c = LeafPageRef::new(child.data());
                l.absorb(&c);
                l.set_next_page_id(c.next_page_id());
            }
            InternalPage::new(parent.data_mut()).remove_at(child_idx);
            return Ok(FixOutcome::MergedAway);
        }

        let right_id = InternalPageRef::new(parent.data()).child_at(child_idx + 1);
        let mut right = self.bpm.fetch_write(right_id)?;

        let spare = {
            let r = LeafPageRef::new(right.data());
            r.size() > r.min_size()
        };
        if spare {
            let (key, rid, new_first) = {
                let r = LeafPageRef::new(right.data());
                (r.key_at(0), r.rid_at(0), r.key_at(1))
            };
            LeafPage::new(right.data_mut()).remove_at(0);
            LeafPage::new(child.data_mut()).push_back(key, rid);
            InternalPage::new(parent.data_mut()).set_key_at(child_idx + 1, new_first);
            return Ok(FixOutcome::Borrowed);
        }

        {
            let mut c = LeafPage::new(child.data_mut());
            let r = LeafPageRef::new(right.data());
            c.absorb(&r);
            c.set_next_page_id(r.next_page_id());
        }
        InternalPage::new(parent.data_mut()).remove_at(child_idx + 1);
        drop(right);
        let _ = self.bpm.delete_page(right_id);
        Ok(FixOutcome::AbsorbedSibling)
    }

    /// Rebalances an underfull internal node; separators rotate through the
    /// parent on borrows and merge down on merges.
    fn fix_internal(
        &self,
        parent: &mut WritePageGuard,
        child_idx: usize,
        child: &mut WritePageGuard,
    ) -> Result<FixOutcome> {
        if child_idx > 0 {
            let left_id = InternalPageRef::new(parent.data()).child_at(child_idx - 1);
            let mut left = self.bpm.fetch_write(left_id)?;

            let spare = {
                let l = InternalPageRef::new(left.data());
                l.size() > l.min_size()
            };
            let separator = InternalPageRef::new(parent.data()).key_at(child_idx);
            if spare {
                let (last_key, last_child) = {
                    let l = InternalPageRef::new(left.data());
                    (l.key_at(l.size() - 1), l.child_at(l.size() - 1))
                };
                {
                    let mut l = InternalPage::new(left.data_mut());
                    let last = l.size() - 1;
                    l.remove_at(last);
                }
                {
                    // The old separator drops down onto the entry that held
                    // the reserved slot, and the borrowed child takes its
                    // place at index 0.
                    let mut c = InternalPage::new(child.data_mut());
                    c.set_key_at(0, separator);
                    c.insert_at(0, 0, last_child);
                }
                InternalPage::new(parent.data_mut()).set_key_at(child_idx, last_key);
                return Ok(FixOutcome::Borrowed);
            }

            {
                let mut l = InternalPage::new(left.data_mut());
                let c = InternalPageRef::new(child.data());
                l.push_back(separator, c.child_at(0));
                for i in 1..c.size() {
                    l.push_back(c.key_at(i), c.child_at(i));
                }
            }
            InternalPage::new(parent.data_mut()).remove_at(child_idx);
            return Ok(FixOutcome::MergedAway);
        }

        let right_id = InternalPageRef::new(parent.data()).child_at(child_idx + 1);
        let mut right = self.bpm.fetch_write(right_id)?;

        let spare = {
            let r = InternalPageRef::new(right.data());
            r.size() > r.min_size()
        };
        let separator = InternalPageRef::new(parent.data()).key_at(child_idx + 1);
        if spare {
            let (first_child, next_key) = {
                let r = InternalPageRef::new(right.data());
                (r.child_at(0), r.key_at(1))
            };
            InternalPage::new(child.data_mut()).push_back(separator, first_child);
            InternalPage::new(right.data_mut()).remove_at(0);
            InternalPage::new(parent.data_mut()).set_key_at(child_idx + 1, next_key);
            return Ok(FixOutcome::Borrowed);
        }

        {
            let mut c = InternalPage::new(child.data_mut());
            let r = InternalPageRef::new(right.data());
            c.push_back(separator, r.child_at(0));
            for i in 1..r.size() {
                c.push_back(r.key_at(i), r.child_at(i));
            }
        }
        InternalPage::new(parent.data_mut()).remove_at(child_idx + 1);
        drop(right);
        let _ = self.bpm.delete_page(right_id);
        Ok(FixOutcome::AbsorbedSibling)
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<BTreeIterator> {
        let header = self.bpm.fetch_read(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header.data()).root_page_id();
        let mut cur = self.bpm.fetch_read(root_id)?;
        drop(header);

        loop {
            match page_type(cur.data()) {
                BTreePageType::Leaf => {
                    let basic = self.bpm.fetch_basic(cur.page_id())?;
                    drop(cur);
                    return Ok(BTreeIterator::new(Arc::clone(&self.bpm), Some(basic), 0));
                }
                BTreePageType::Internal => {
                    let child_id = InternalPageRef::new(cur.data()).child_at(0);
                    let child = self.bpm.fetch_read(child_id)?;
                    cur = child;
                }
                BTreePageType::Invalid => {
                    unreachable!("descended into an uninitialized page")
                }
            }
        }
    }

    /// Iterator positioned at the given key, or the end iterator if the key
    /// is not present.
    pub fn begin_at(&self, key: i64) -> Result<BTreeIterator> {
        let cmp = &*self.comparator;

        let header = self.bpm.fetch_read(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header.data()).root_page_id();
        let mut cur = self.bpm.fetch_read(root_id)?;
        drop(header);

        loop {
            match page_type(cur.data()) {
                BTreePageType::Leaf => {
                    let pos = {
                        let leaf = LeafPageRef::new(cur.data());
                        let pos = leaf.lower_bound(key, cmp);
                        if pos >= leaf.size() || !cmp.compare(leaf.key_at(pos), key).is_eq() {
                            return Ok(BTreeIterator::end(Arc::clone(&self.bpm)));
                        }
                        pos
                    };
                    let basic = self.bpm.fetch_basic(cur.page_id())?;
                    drop(cur);
                    return Ok(BTreeIterator::new(Arc::clone(&self.bpm), Some(basic), pos));
                }
                BTreePageType::Internal => {
                    let child_id = {
                        let node = InternalPageRef::new(cur.data());
                        node.child_at(node.find_child(key, cmp))
                    };
                    let child = self.bpm.fetch_read(child_id)?;
                    cur = child;
                }
                BTreePageType::Invalid => {
                    unreachable!("descended into an uninitialized page")
                }
            }
        }
    }

    /// Walks the whole tree asserting its structural invariants: uniform
    /// leaf depth, minimum fill of non-root nodes, sorted keys, separator
    /// bounds, and a leaf chain that yields every key in ascending order.
    /// Debug aid for tests.
    pub fn verify_integrity(&self) -> Result<()> {
        let root_id = self.root_page_id()?;
        let mut leaf_depth = None;
        self.verify_node(root_id, true, None, None, 0, &mut leaf_depth)?;

        // Leaf chain is ascending and starts at the leftmost leaf.
        let mut iter = self.begin()?;
        let mut prev: Option<i64> = None;
        while let Some((key, _)) = iter.next()? {
            if let Some(p) = prev {
                assert!(
                    self.comparator.compare(p, key).is_lt(),
                    "leaf chain out of order: {p} !< {key}"
                );
            }
            prev = Some(key);
        }
        Ok(())
    }

    fn verify_node(
        &self,
        page_id: PageId,
        is_root: bool,
        lower: Option<i64>,
        upper: Option<i64>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> Result<()> {
        let cmp = &*self.comparator;
        let guard = self.bpm.fetch_basic(page_id)?;
        let data = guard.data();

        match page_type(&data) {
            BTreePageType::Leaf => {
                let leaf = LeafPageRef::new(&data);
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) => {
                        assert_eq!(depth, expected, "leaves at differing depths")
                    }
                }
                if !is_root {
                    assert!(
                        leaf.size() >= leaf.min_size(),
                        "leaf {page_id} underfull: {} < {}",
                        leaf.size(),
                        leaf.min_size()
                    );
                }
                for i in 0..leaf.size() {
                    let key = leaf.key_at(i);
                    if i > 0 {
                        assert!(cmp.compare(leaf.key_at(i - 1), key).is_lt());
                    }
                    if let Some(lo) = lower {
                        assert!(cmp.compare(lo, key).is_le(), "key below separator");
                    }
                    if let Some(hi) = upper {
                        assert!(cmp.compare(key, hi).is_lt(), "key above separator");
                    }
                }
            }
            BTreePageType::Internal => {
                let (size, min_size, children) = {
                    let node = InternalPageRef::new(&data);
                    let children: Vec<(PageId, Option<i64>, Option<i64>)> = (0..node.size())
                        .map(|i| {
                            let lo = if i == 0 { lower } else { Some(node.key_at(i)) };
                            let hi = if i + 1 < node.size() {
                                Some(node.key_at(i + 1))
                            } else {
                                upper
                            };
                            (node.child_at(i), lo, hi)
                        })
                        .collect();
                    (node.size(), node.min_size(), children)
                };
                if is_root {
                    assert!(size >= 2, "internal root with fewer than two children");
                } else {
                    assert!(size >= min_size, "internal {page_id} underfull");
                }
                drop(data);
                drop(guard);
                for (child, lo, hi) in children {
                    self.verify_node(child, false, lo, hi, depth + 1, leaf_depth)?;
                }
            }
            BTreePageType::Invalid => panic!("uninitialized page {page_id} reachable"),
        }
        Ok(())
    }
}
