use crate::common::{PageId, SlotId, INVALID_PAGE_ID, PAGE_SIZE};

/// Slotted heap page layout:
///
/// | Field          | Offset | Size |
/// |----------------|--------|------|
/// | next_page_id   | 0      | 4    |
/// | tuple_count    | 4      | 2    |
/// | free_space_end | 6      | 2    |
///
/// The slot array grows up from offset 8 (one 6-byte slot per tuple:
/// offset u16, length u16, meta u16), while tuple payloads grow down from
/// the end of the page. Bit 0 of a slot's meta word is the tombstone flag.
const NEXT_PAGE_ID_OFFSET: usize = 0;
const TUPLE_COUNT_OFFSET: usize = 4;
const FREE_SPACE_END_OFFSET: usize = 6;
const SLOTS_OFFSET: usize = 8;
const SLOT_SIZE: usize = 6;

const META_DELETED: u16 = 1;

/// Per-tuple metadata stored in the slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TupleMeta {
    pub is_deleted: bool,
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Read-only view of a table page.
pub struct TablePageRef<'a> {
    data: &'a [u8],
}

impl<'a> TablePageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, NEXT_PAGE_ID_OFFSET))
    }

    pub fn tuple_count(&self) -> usize {
        read_u16(self.data, TUPLE_COUNT_OFFSET) as usize
    }

    fn slot(&self, slot: SlotId) -> Option<(usize, usize, u16)> {
        if slot.as_usize() >= self.tuple_count() {
            return None;
        }
        let base = SLOTS_OFFSET + slot.as_usize() * SLOT_SIZE;
        Some((
            read_u16(self.data, base) as usize,
            read_u16(self.data, base + 2) as usize,
            read_u16(self.data, base + 4),
        ))
    }

    pub fn tuple_meta(&self, slot: SlotId) -> Option<TupleMeta> {
        self.slot(slot).map(|(_, _, meta)| TupleMeta {
            is_deleted: meta & META_DELETED != 0,
        })
    }

    pub fn tuple_bytes(&self, slot: SlotId) -> Option<&'a [u8]> {
        let (offset, len, _) = self.slot(slot)?;
        self.data.get(offset..offset + len)
    }

    pub fn free_space(&self) -> usize {
        let slots_end = SLOTS_OFFSET + self.tuple_count() * SLOT_SIZE;
        let data_start = read_u16(self.data, FREE_SPACE_END_OFFSET) as usize;
        data_start.saturating_sub(slots_end)
    }
}

/// Mutable view of a table page.
pub struct TablePage<'a> {
    data: &'a mut [u8],
}

impl<'a> TablePage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    pub fn init(data: &'a mut [u8]) -> Self {
        data.fill(0);
        write_u32(data, NEXT_PAGE_ID_OFFSET, INVALID_PAGE_ID.as_u32());
        write_u16(data, FREE_SPACE_END_OFFSET, PAGE_SIZE as u16);
        Self { data }
    }

    pub fn as_ref(&self) -> TablePageRef<'_> {
        TablePageRef::new(self.data)
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, NEXT_PAGE_ID_OFFSET))
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        write_u32(self.data, NEXT_PAGE_ID_OFFSET, page_id.as_u32());
    }

    pub fn tuple_count(&self) -> usize {
        read_u16(self.data, TUPLE_COUNT_OFFSET) as usize
    }

    /// Appends a tuple, returning its slot, or None if the page lacks room
    /// for the payload plus a slot entry.
    pub fn insert_tuple(&mut self, meta: TupleMeta, tuple: &[u8]) -> Option<SlotId> {
        let count = self.tuple_count();
        let slots_end = SLOTS_OFFSET + (count + 1) * SLOT_SIZE;
        let data_start = read_u16(self.data, FREE_SPACE_END_OFFSET) as usize;
        if slots_end + tuple.len() > data_start {
            return None;
        }

        let offset = data_start - tuple.len();
        self.data[offset..data_start].copy_from_slice(tuple);

        let base = SLOTS_OFFSET + count * SLOT_SIZE;
        write_u16(self.data, base, offset as u16);
        write_u16(self.data, base + 2, tuple.len() as u16);
        write_u16(self.data, base + 4, if meta.is_deleted { META_DELETED } else { 0 });

        write_u16(self.data, FREE_SPACE_END_OFFSET, offset as u16);
        write_u16(self.data, TUPLE_COUNT_OFFSET, (count + 1) as u16);
        Some(SlotId::new(count as u16))
    }

    pub fn set_tuple_meta(&mut self, slot: SlotId, meta: TupleMeta) -> bool {
        if slot.as_usize() >= self.tuple_count() {
            return false;
        }
        let base = SLOTS_OFFSET + slot.as_usize() * SLOT_SIZE;
        write_u16(self.data, base + 4, if meta.is_deleted { META_DELETED } else { 0 });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_read() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut data);

        let s0 = page.insert_tuple(TupleMeta::default(), b"hello").unwrap();
        let s1 = page.insert_tuple(TupleMeta::default(), b"world!").unwrap();
        assert_eq!(s0, SlotId::new(0));
        assert_eq!(s1, SlotId::new(1));

        let page = TablePageRef::new(&data);
        assert_eq!(page.tuple_count(), 2);
        assert_eq!(page.tuple_bytes(SlotId::new(0)).unwrap(), b"hello");
        assert_eq!(page.tuple_bytes(SlotId::new(1)).unwrap(), b"world!");
        assert!(page.tuple_bytes(SlotId::new(2)).is_none());
    }

    #[test]
    fn test_tombstone() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut data);
        let slot = page.insert_tuple(TupleMeta::default(), b"row").unwrap();

        assert!(page.set_tuple_meta(slot, TupleMeta { is_deleted: true }));

        let page = TablePageRef::new(&data);
        assert!(page.tuple_meta(slot).unwrap().is_deleted);
        // The payload stays readable; tombstoning is metadata only.
        assert_eq!(page.tuple_bytes(slot).unwrap(), b"row");
    }

    #[test]
    fn test_page_fills_up() {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut data);

        let big = vec![1u8; 1000];
        let mut inserted = 0;
        while page.insert_tuple(TupleMeta::default(), &big).is_some() {
            inserted += 1;
        }
        assert_eq!(inserted, 4);
        // A small tuple still fails once free space is exhausted by slots.
        assert!(page.insert_tuple(TupleMeta::default(), &vec![0u8; 4000]).is_none());
    }
}
