use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::CommonCodec;
use crate::storage::PageNo;

/// Bytes [0, 2) are reserved: page 0 of a file carries the file type tag
/// and page size exponent there.
pub const OFFSET_NEXT_BUCKET: usize = 2;
pub const OFFSET_NUM_SLOTS: usize = 4;
pub const SLOT_DIR_START: usize = 6;
pub const SLOT_WIDTH: usize = 2;
pub const EMPTY_SLOT: u16 = 0;

/// Largest tuple an empty bucket page can hold.
pub fn max_tuple_size(page_size: usize) -> usize {
    page_size - SLOT_DIR_START - SLOT_WIDTH
}

/// Slotted bucket page view over raw page bytes.
///
/// ```text
/// | reserved | next bucket | num slots | slot 0 | slot 1 | ... -> free <- ... | tuple 1 | tuple 0 |
/// 0          2             4           6                                      ^ data start     page size
/// ```
///
/// Slots hold the byte offset of their tuple, `EMPTY_SLOT` when unused. The
/// tuple region is kept contiguous, so a tuple ends where the next higher
/// live offset (or the page) begins.
#[derive(Debug)]
pub struct BucketPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> BucketPage<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.bytes().len()
    }

    pub fn num_slots(&self) -> u16 {
        CommonCodec::read_u16_at(self.bytes(), OFFSET_NUM_SLOTS)
    }

    pub fn slot_value(&self, slot: u16) -> u16 {
        CommonCodec::read_u16_at(self.bytes(), Self::slot_position(slot))
    }

    /// Overflow page that continues this bucket's chain.
    pub fn next_bucket(&self) -> Option<PageNo> {
        match CommonCodec::read_u16_at(self.bytes(), OFFSET_NEXT_BUCKET) {
            0 => None,
            page_no => Some(page_no as PageNo),
        }
    }

    fn slot_position(slot: u16) -> usize {
        SLOT_DIR_START + SLOT_WIDTH * slot as usize
    }

    /// End of the slot directory.
    pub fn slots_end(&self) -> usize {
        Self::slot_position(self.num_slots())
    }

    fn live_offsets(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.num_slots())
            .map(|slot| self.slot_value(slot))
            .filter(|offset| *offset != EMPTY_SLOT)
    }

    /// Lowest byte of the tuple region, the page size when it is empty.
    pub fn tuple_data_start(&self) -> usize {
        self.live_offsets()
            .map(|offset| offset as usize)
            .min()
            .unwrap_or(self.page_size())
    }

    pub fn free_space(&self) -> usize {
        self.tuple_data_start().saturating_sub(self.slots_end())
    }

    pub fn num_tuples(&self) -> usize {
        self.live_offsets().count()
    }

    pub fn is_live(&self, slot: u16) -> bool {
        slot < self.num_slots() && self.slot_value(slot) != EMPTY_SLOT
    }

    /// First live slot at or after `from`.
    pub fn next_live_slot(&self, from: u16) -> Option<u16> {
        (from..self.num_slots()).find(|slot| self.slot_value(*slot) != EMPTY_SLOT)
    }

    /// Externally visible offset of `slot`: the position of its directory entry.
    pub fn slot_offset(slot: u16) -> u16 {
        Self::slot_position(slot) as u16
    }

    /// Slot whose directory entry sits at `offset`, without checking that
    /// the slot currently exists.
    pub fn slot_for_offset(offset: u16) -> HashFileResult<u16> {
        let offset = offset as usize;
        if offset < SLOT_DIR_START || (offset - SLOT_DIR_START) % SLOT_WIDTH != 0 {
            return Err(HashFileError::InvalidPointer(format!(
                "offset {} is not a slot directory entry",
                offset
            )));
        }
        Ok(((offset - SLOT_DIR_START) / SLOT_WIDTH) as u16)
    }

    pub fn slot_index_from_offset(&self, offset: u16) -> HashFileResult<u16> {
        let slot = Self::slot_for_offset(offset)?;
        if slot >= self.num_slots() {
            return Err(HashFileError::InvalidPointer(format!(
                "slot {} is past the {} slots of the page",
                slot,
                self.num_slots()
            )));
        }
        Ok(slot)
    }

    fn live_slot_offset(&self, slot: u16) -> HashFileResult<u16> {
        if slot >= self.num_slots() {
            return Err(HashFileError::InvalidPointer(format!(
                "slot {} is past the {} slots of the page",
                slot,
                self.num_slots()
            )));
        }
        match self.slot_value(slot) {
            EMPTY_SLOT => Err(HashFileError::InvalidPointer(format!(
                "slot {} is empty",
                slot
            ))),
            offset => Ok(offset),
        }
    }

    pub fn tuple_length(&self, slot: u16) -> HashFileResult<usize> {
        let offset = self.live_slot_offset(slot)?;
        let end = self
            .live_offsets()
            .filter(|other| *other > offset)
            .min()
            .map(|other| other as usize)
            .unwrap_or(self.page_size());
        Ok(end - offset as usize)
    }

    pub fn tuple_data(&self, slot: u16) -> HashFileResult<&[u8]> {
        let offset = self.live_slot_offset(slot)? as usize;
        let len = self.tuple_length(slot)?;
        Ok(&self.bytes()[offset..offset + len])
    }

    /// Checks that directory, tuple bytes and free space add up to the page.
    pub fn sanity_check(&self) -> HashFileResult<()> {
        let page_size = self.page_size();
        let slots_end = self.slots_end();
        if slots_end > page_size {
            return Err(HashFileError::Storage(format!(
                "slot directory of {} slots overruns a {}-byte page",
                self.num_slots(),
                page_size
            )));
        }
        let mut offsets = self.live_offsets().collect::<Vec<u16>>();
        offsets.sort_unstable();
        for pair in offsets.windows(2) {
            if pair[0] == pair[1] {
                return Err(HashFileError::Storage(format!(
                    "two slots share offset {}",
                    pair[0]
                )));
            }
        }
        if let Some(lowest) = offsets.first() {
            if (*lowest as usize) < slots_end {
                return Err(HashFileError::Storage(format!(
                    "tuple at {} overlaps the slot directory ending at {}",
                    lowest, slots_end
                )));
            }
        }
        let mut tuple_bytes = 0;
        for slot in 0..self.num_slots() {
            if self.is_live(slot) {
                tuple_bytes += self.tuple_length(slot)?;
            }
        }
        if slots_end + tuple_bytes + self.free_space() != page_size {
            return Err(HashFileError::Storage(format!(
                "directory {} + tuples {} + free {} != page size {}",
                slots_end,
                tuple_bytes,
                self.free_space(),
                page_size
            )));
        }
        Ok(())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> BucketPage<T> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Empties the page and unlinks it. The reserved bytes are left alone.
    pub fn init_new_page(&mut self) {
        self.bytes_mut()[OFFSET_NEXT_BUCKET..].fill(0);
    }

    pub fn set_num_slots(&mut self, num_slots: u16) {
        CommonCodec::write_u16_at(self.bytes_mut(), OFFSET_NUM_SLOTS, num_slots);
    }

    pub fn set_slot_value(&mut self, slot: u16, offset: u16) {
        CommonCodec::write_u16_at(self.bytes_mut(), Self::slot_position(slot), offset);
    }

    pub fn set_next_bucket(&mut self, next: Option<PageNo>) -> HashFileResult<()> {
        let raw = match next {
            None => 0,
            Some(page_no) => u16::try_from(page_no)
                .ok()
                .filter(|raw| *raw != 0)
                .ok_or_else(|| {
                    HashFileError::Storage(format!("page {} cannot be chained", page_no))
                })?,
        };
        CommonCodec::write_u16_at(self.bytes_mut(), OFFSET_NEXT_BUCKET, raw);
        Ok(())
    }

    /// Reserves `size` bytes at the low end of the tuple region and returns
    /// the slot pointing at them. Reuses the first empty slot if any.
    pub fn alloc_new_tuple(&mut self, size: usize) -> HashFileResult<u16> {
        if size == 0 {
            return Err(HashFileError::Storage(
                "cannot allocate an empty tuple".to_string(),
            ));
        }
        let num_slots = self.num_slots();
        let reusable = (0..num_slots).find(|slot| self.slot_value(*slot) == EMPTY_SLOT);
        let needed = size + if reusable.is_some() { 0 } else { SLOT_WIDTH };
        if self.free_space() < needed {
            return Err(HashFileError::Storage(format!(
                "{} bytes needed but only {} free",
                needed,
                self.free_space()
            )));
        }
        let offset = (self.tuple_data_start() - size) as u16;
        let slot = match reusable {
            Some(slot) => slot,
            None => {
                self.set_num_slots(num_slots + 1);
                num_slots
            }
        };
        self.set_slot_value(slot, offset);
        Ok(slot)
    }

    /// Allocates a slot for `tuple` and copies it in.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> HashFileResult<u16> {
        let slot = self.alloc_new_tuple(tuple.len())?;
        let offset = self.slot_value(slot) as usize;
        self.bytes_mut()[offset..offset + tuple.len()].copy_from_slice(tuple);
        Ok(slot)
    }

    /// Removes the tuple in `slot` and compacts the tuple region: lower
    /// tuples slide up over the freed bytes. Trailing empty slots are
    /// dropped from the directory.
    pub fn delete_tuple(&mut self, slot: u16) -> HashFileResult<()> {
        let offset = self.live_slot_offset(slot)?;
        let len = self.tuple_length(slot)?;
        let start = self.tuple_data_start();
        let offset_usize = offset as usize;

        self.bytes_mut()
            .copy_within(start..offset_usize, start + len);
        self.bytes_mut()[start..start + len].fill(0);
        for other in 0..self.num_slots() {
            let value = self.slot_value(other);
            if value != EMPTY_SLOT && value < offset {
                self.set_slot_value(other, value + len as u16);
            }
        }
        self.set_slot_value(slot, EMPTY_SLOT);

        let mut num_slots = self.num_slots();
        while num_slots > 0 && self.slot_value(num_slots - 1) == EMPTY_SLOT {
            num_slots -= 1;
        }
        self.set_num_slots(num_slots);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_page(page_size: usize) -> BucketPage<Vec<u8>> {
        let mut page = BucketPage::new(vec![0xAB; page_size]);
        page.init_new_page();
        page
    }

    #[test]
    fn init_keeps_reserved_bytes() {
        let page = empty_page(512);
        assert_eq!(page.bytes()[0], 0xAB);
        assert_eq!(page.bytes()[1], 0xAB);
        assert_eq!(page.num_slots(), 0);
        assert_eq!(page.next_bucket(), None);
        assert_eq!(page.free_space(), 512 - SLOT_DIR_START);
        page.sanity_check().unwrap();
    }

    #[test]
    fn alloc_and_read_tuples() {
        let mut page = empty_page(512);
        let a = page.insert_tuple(b"aaaa").unwrap();
        let b = page.insert_tuple(b"bbbbbbbb").unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(page.slot_value(0), 508);
        assert_eq!(page.slot_value(1), 500);
        assert_eq!(page.tuple_data(0).unwrap(), b"aaaa");
        assert_eq!(page.tuple_data(1).unwrap(), b"bbbbbbbb");
        assert_eq!(page.tuple_length(1).unwrap(), 8);
        assert_eq!(page.free_space(), 512 - 10 - 12);
        page.sanity_check().unwrap();
    }

    #[test]
    fn delete_compacts_and_keeps_slot_indices() {
        let mut page = empty_page(512);
        page.insert_tuple(b"first").unwrap();
        page.insert_tuple(b"second").unwrap();
        page.insert_tuple(b"third").unwrap();
        let free_before = page.free_space();

        page.delete_tuple(1).unwrap();
        page.sanity_check().unwrap();
        assert_eq!(page.free_space(), free_before + 6);
        assert_eq!(page.num_slots(), 3);
        assert!(!page.is_live(1));
        assert_eq!(page.tuple_data(0).unwrap(), b"first");
        assert_eq!(page.tuple_data(2).unwrap(), b"third");

        // The empty slot is reused.
        assert_eq!(page.insert_tuple(b"4th").unwrap(), 1);
        assert_eq!(page.tuple_data(1).unwrap(), b"4th");
        assert_eq!(page.tuple_data(2).unwrap(), b"third");
        page.sanity_check().unwrap();
    }

    #[test]
    fn delete_trims_trailing_slots() {
        let mut page = empty_page(512);
        for _ in 0..3 {
            page.insert_tuple(b"xyz").unwrap();
        }
        page.delete_tuple(1).unwrap();
        page.delete_tuple(2).unwrap();
        assert_eq!(page.num_slots(), 1);
        page.delete_tuple(0).unwrap();
        assert_eq!(page.num_slots(), 0);
        assert_eq!(page.free_space(), 512 - SLOT_DIR_START);
        assert!(page.bytes()[SLOT_DIR_START..].iter().all(|b| *b == 0));
    }

    #[test]
    fn delete_empty_slot_is_invalid_pointer() {
        let mut page = empty_page(512);
        page.insert_tuple(b"a").unwrap();
        page.insert_tuple(b"b").unwrap();
        page.delete_tuple(0).unwrap();
        assert!(matches!(
            page.delete_tuple(0),
            Err(HashFileError::InvalidPointer(_))
        ));
        assert!(matches!(
            page.delete_tuple(9),
            Err(HashFileError::InvalidPointer(_))
        ));
    }

    #[test]
    fn alloc_fails_when_full() {
        let mut page = empty_page(512);
        let max = max_tuple_size(512);
        assert!(page.alloc_new_tuple(max + 1).is_err());
        page.alloc_new_tuple(max).unwrap();
        assert_eq!(page.free_space(), 0);
        assert!(page.alloc_new_tuple(1).is_err());
        assert!(page.alloc_new_tuple(0).is_err());
    }

    #[test]
    fn offsets_resolve_to_slots() {
        let mut page = empty_page(512);
        page.insert_tuple(b"a").unwrap();
        page.insert_tuple(b"b").unwrap();
        let offset = BucketPage::<Vec<u8>>::slot_offset(1);
        assert_eq!(offset, 8);
        assert_eq!(page.slot_index_from_offset(offset).unwrap(), 1);
        assert!(page.slot_index_from_offset(7).is_err());
        assert!(page.slot_index_from_offset(4).is_err());
        assert!(page.slot_index_from_offset(10).is_err());
        assert_eq!(BucketPage::<Vec<u8>>::slot_for_offset(10).unwrap(), 2);
    }

    #[test]
    fn next_bucket_links() {
        let mut page = empty_page(512);
        page.set_next_bucket(Some(7)).unwrap();
        assert_eq!(page.next_bucket(), Some(7));
        assert!(page.set_next_bucket(Some(0)).is_err());
        assert!(page.set_next_bucket(Some(70_000)).is_err());
        page.set_next_bucket(None).unwrap();
        assert_eq!(page.next_bucket(), None);
    }

    #[test]
    fn sanity_check_detects_overlap() {
        let mut page = empty_page(512);
        page.insert_tuple(b"abcd").unwrap();
        page.set_slot_value(0, 4);
        assert!(page.sanity_check().is_err());
    }
}
