use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use parking_lot::RwLock;

use crate::buffer::{BufferManager, DBFile};
use crate::catalog::{DataType, SchemaRef, StatsCollector, TableStats};
use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::TupleCodec;
use crate::storage::file_type::DBFileType;
use crate::storage::hash::{compute_bucket_number, split_needed, TupleHasher};
use crate::storage::page::{
    max_tuple_size, BucketPage, HeaderPage, HeaderState, SLOT_DIR_START, SLOT_WIDTH,
};
use crate::storage::tuple::Tuple;
use crate::storage::tuple_file::{
    FileKind, FilePointer, FileTuple, HashLayout, HashedTupleFile, TupleFile,
};
use crate::storage::PageNo;
use crate::utils::scalar::ScalarValue;

/// A tuple leaving the bucket being split, with the slot it occupies now.
#[derive(Debug)]
struct Mover {
    kind: FileKind,
    page_no: PageNo,
    slot: u16,
    tuple: Tuple,
    bytes: Vec<u8>,
}

/// Linear hash tuple file.
///
/// Bucket `b` lives on page `b + 1` of the primary file, page 0 being the
/// header. Full buckets chain into pages of the overflow file through their
/// next-bucket link. Page 0 of the overflow file is never linked, so a link
/// of 0 ends a chain.
#[derive(Debug)]
pub struct LinHashTupleFile {
    pub(super) primary: DBFile,
    pub(super) overflow: DBFile,
    pub(super) schema: SchemaRef,
    pub(super) hash_columns: Vec<usize>,
    pub(super) stats: RwLock<TableStats>,
    pub(super) buffer: Arc<BufferManager>,
}

impl LinHashTupleFile {
    fn file(&self, kind: FileKind) -> &DBFile {
        match kind {
            FileKind::Primary => &self.primary,
            FileKind::Overflow => &self.overflow,
        }
    }

    pub fn primary_file(&self) -> &DBFile {
        &self.primary
    }

    pub fn overflow_file(&self) -> &DBFile {
        &self.overflow
    }

    pub fn header_state(&self) -> HashFileResult<HeaderState> {
        let guard = self.buffer.load_page_read(&self.primary, 0)?;
        Ok(HeaderPage::new(guard.data()).state())
    }

    fn store_state(&self, state: &HeaderState) -> HashFileResult<()> {
        let mut guard = self.buffer.load_page(&self.primary, 0, false)?;
        HeaderPage::new(guard.data_mut()).set_state(state);
        Ok(())
    }

    /// Page count of the overflow file, its unused page 0 included.
    pub fn overflow_page_count(&self) -> HashFileResult<PageNo> {
        self.buffer.num_pages(&self.overflow)
    }

    /// Rewrites the schema, hash key and statistics sections of the header.
    pub fn save_metadata(&self) -> HashFileResult<()> {
        let schema = bincode::serialize(self.schema.as_ref())?;
        let stats = bincode::serialize(&*self.stats.read())?;
        let hash_columns = self
            .hash_columns
            .iter()
            .map(|col| *col as u16)
            .collect::<Vec<u16>>();
        let mut guard = self.buffer.load_page(&self.primary, 0, false)?;
        HeaderPage::new(guard.data_mut()).write_metadata(&schema, &hash_columns, &stats)
    }

    fn encode(&self, tuple: &Tuple) -> HashFileResult<Vec<u8>> {
        if tuple.data.len() != self.schema.column_count() {
            return Err(HashFileError::Internal(format!(
                "tuple has {} values but table {} has {} columns",
                tuple.data.len(),
                self.primary.name,
                self.schema.column_count()
            )));
        }
        for (column, value) in self.schema.columns.iter().zip(tuple.data.iter()) {
            if ScalarValue::new_empty(column.data_type).data_type() != value.data_type() {
                return Err(HashFileError::Internal(format!(
                    "value {} does not match column {} of type {}",
                    value, column.name, column.data_type
                )));
            }
            if value.is_null() && !column.nullable {
                return Err(HashFileError::Storage(format!(
                    "column {} of {} is not nullable",
                    column.name, self.primary.name
                )));
            }
            if let (DataType::Varchar(Some(max_len)), ScalarValue::Varchar(Some(s))) =
                (column.data_type, value)
            {
                if s.len() > max_len {
                    return Err(HashFileError::Storage(format!(
                        "value of {} bytes exceeds column {} limit of {}",
                        s.len(),
                        column.name,
                        max_len
                    )));
                }
            }
        }
        let bytes = TupleCodec::encode(tuple);
        if bytes.len() > max_tuple_size(self.primary.page_size) {
            return Err(HashFileError::TupleTooLarge {
                size: bytes.len(),
                page_size: self.primary.page_size,
            });
        }
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> HashFileResult<Tuple> {
        Ok(TupleCodec::decode(bytes, self.schema.clone())?.0)
    }

    fn bucket_of(&self, tuple: &Tuple, state: &HeaderState) -> HashFileResult<u32> {
        let hash = TupleHasher::hash_columns(tuple, &self.hash_columns)?;
        Ok(compute_bucket_number(hash, state))
    }

    /// Stores `bytes` in the first page of the tuple's bucket chain with
    /// room for it, appending a new overflow page when none has.
    fn insert_without_split(
        &self,
        tuple: &Tuple,
        bytes: &[u8],
        state: &HeaderState,
    ) -> HashFileResult<FilePointer> {
        let bucket = self.bucket_of(tuple, state)?;
        let needed = bytes.len() + SLOT_WIDTH;
        let mut kind = FileKind::Primary;
        let mut page_no = bucket + 1;

        loop {
            let mut guard = self.buffer.load_page(self.file(kind), page_no, false)?;
            let (free_space, next) = {
                let page = BucketPage::new(guard.data());
                (page.free_space(), page.next_bucket())
            };
            trace!(
                "Bucket {} {:?} page {} has {} bytes free, {} needed",
                bucket,
                kind,
                page_no,
                free_space,
                needed
            );

            if free_space >= needed {
                let mut page = BucketPage::new(guard.data_mut());
                let slot = page.insert_tuple(bytes)?;
                #[cfg(debug_assertions)]
                page.sanity_check()?;
                return Ok(FilePointer::new(
                    kind,
                    page_no,
                    BucketPage::<&[u8]>::slot_offset(slot),
                ));
            }

            match next {
                Some(next_page) => {
                    kind = FileKind::Overflow;
                    page_no = next_page;
                }
                None => {
                    let new_page = self.buffer.num_pages(&self.overflow)?;
                    if new_page > u16::MAX as PageNo {
                        return Err(HashFileError::Storage(format!(
                            "overflow file of {} is full",
                            self.primary.name
                        )));
                    }
                    let mut new_guard = self.buffer.load_page(&self.overflow, new_page, true)?;
                    let slot = {
                        let mut new_bucket_page = BucketPage::new(new_guard.data_mut());
                        new_bucket_page.init_new_page();
                        new_bucket_page.insert_tuple(bytes)?
                    };
                    BucketPage::new(guard.data_mut()).set_next_bucket(Some(new_page))?;
                    debug!(
                        "Chained overflow page {} after {:?} page {} of bucket {}",
                        new_page, kind, page_no, bucket
                    );
                    return Ok(FilePointer::new(
                        FileKind::Overflow,
                        new_page,
                        BucketPage::<&[u8]>::slot_offset(slot),
                    ));
                }
            }
        }
    }

    /// Runs at most one split. Returns whether it did.
    fn split_check(&self, state: HeaderState) -> HashFileResult<bool> {
        let overflow_pages = self.buffer.num_pages(&self.overflow)?;
        if !split_needed(overflow_pages, &state) {
            return Ok(false);
        }
        self.split(state)?;
        Ok(true)
    }

    /// Address of a stored copy of `tuple` in `bucket`'s chain.
    fn locate(&self, tuple: &Tuple, bucket: u32) -> HashFileResult<FilePointer> {
        let mut kind = FileKind::Primary;
        let mut page_no = bucket + 1;
        loop {
            let guard = self.buffer.load_page_read(self.file(kind), page_no)?;
            let page = BucketPage::new(guard.data());
            let mut slot = 0;
            while let Some(live) = page.next_live_slot(slot) {
                if self.decode(page.tuple_data(live)?)?.data == tuple.data {
                    return Ok(FilePointer::new(
                        kind,
                        page_no,
                        BucketPage::<&[u8]>::slot_offset(live),
                    ));
                }
                slot = live + 1;
            }
            match page.next_bucket() {
                Some(next_page) => {
                    kind = FileKind::Overflow;
                    page_no = next_page;
                }
                None => {
                    return Err(HashFileError::Internal(format!(
                        "tuple {} vanished from bucket {} of {}",
                        tuple, bucket, self.primary.name
                    )))
                }
            }
        }
    }

    /// Tuples of `bucket`'s chain that belong elsewhere under `state`.
    fn collect_movers(&self, bucket: u32, state: &HeaderState) -> HashFileResult<Vec<Mover>> {
        let mut movers = Vec::new();
        let mut kind = FileKind::Primary;
        let mut page_no = bucket + 1;
        loop {
            let guard = self.buffer.load_page_read(self.file(kind), page_no)?;
            let page = BucketPage::new(guard.data());
            let mut slot = 0;
            while let Some(live) = page.next_live_slot(slot) {
                let bytes = page.tuple_data(live)?.to_vec();
                let tuple = self.decode(&bytes)?;
                if self.bucket_of(&tuple, state)? != bucket {
                    movers.push(Mover {
                        kind,
                        page_no,
                        slot: live,
                        tuple,
                        bytes,
                    });
                }
                slot = live + 1;
            }
            match page.next_bucket() {
                Some(next_page) => {
                    kind = FileKind::Overflow;
                    page_no = next_page;
                }
                None => return Ok(movers),
            }
        }
    }

    /// Upper bound on the chain length needed to hold `movers` in an empty
    /// bucket, its primary page included.
    fn chain_pages_for(&self, movers: &[Mover]) -> usize {
        let capacity = self.primary.page_size - SLOT_DIR_START;
        let mut pages = 0;
        let mut free = 0;
        for mover in movers {
            let needed = mover.bytes.len() + SLOT_WIDTH;
            if needed > free {
                pages += 1;
                free = capacity;
            }
            free -= needed;
        }
        pages
    }

    /// Splits bucket `state.next` into itself and bucket `N*2^level + next`.
    ///
    /// Fails without touching any page when the split cannot complete. Each
    /// moving tuple is copied into the new bucket before its old slot is
    /// deleted.
    fn split(&self, state: HeaderState) -> HashFileResult<()> {
        let old_bucket = state.next as u32;
        let new_bucket = u32::try_from(state.total_buckets()).map_err(|_| {
            HashFileError::Storage(format!("bucket space of {} exhausted", self.primary.name))
        })?;
        let mut advanced = state;
        advanced.advance_split()?;

        let movers = self.collect_movers(old_bucket, &advanced)?;
        let extra_pages = self.chain_pages_for(&movers).saturating_sub(1);
        let overflow_pages = self.buffer.num_pages(&self.overflow)? as usize;
        if overflow_pages + extra_pages > u16::MAX as usize + 1 {
            return Err(HashFileError::Storage(format!(
                "overflow file of {} has no room for the {} tuples leaving bucket {}",
                self.primary.name,
                movers.len(),
                old_bucket
            )));
        }

        {
            let mut guard = self.buffer.load_page(&self.primary, new_bucket + 1, true)?;
            BucketPage::new(guard.data_mut()).init_new_page();
        }
        self.store_state(&advanced)?;

        for mover in &movers {
            self.insert_without_split(&mover.tuple, &mover.bytes, &advanced)?;
            let mut guard = self
                .buffer
                .load_page(self.file(mover.kind), mover.page_no, false)?;
            let mut page = BucketPage::new(guard.data_mut());
            page.delete_tuple(mover.slot)?;
            #[cfg(debug_assertions)]
            page.sanity_check()?;
        }
        debug!(
            "Split bucket {} of {} into {}: moved {} tuples, now level {} next {}",
            old_bucket,
            self.primary.name,
            new_bucket,
            movers.len(),
            advanced.level,
            advanced.next
        );
        Ok(())
    }

    /// Whether `fptr` still addresses a copy of `tuple`.
    fn holds(&self, fptr: &FilePointer, tuple: &Tuple) -> HashFileResult<bool> {
        match self.get_tuple(fptr) {
            Ok(found) => Ok(found.tuple.data == tuple.data),
            Err(HashFileError::InvalidPointer(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Page-sequential scan from `slot` of the given page. Running off the
    /// primary file continues at page 1 of the overflow file.
    fn scan_from(
        &self,
        mut kind: FileKind,
        mut page_no: PageNo,
        mut slot: u16,
    ) -> HashFileResult<Option<FileTuple>> {
        loop {
            let guard = match self.buffer.load_page_read(self.file(kind), page_no) {
                Ok(guard) => guard,
                Err(e) if e.is_end_of_file() => {
                    if kind == FileKind::Primary && self.buffer.num_pages(&self.overflow)? > 1 {
                        kind = FileKind::Overflow;
                        page_no = 1;
                        slot = 0;
                        continue;
                    }
                    debug!("End of scan over {}", self.primary.name);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            let page = BucketPage::new(guard.data());
            if let Some(live) = page.next_live_slot(slot) {
                let tuple = self.decode(page.tuple_data(live)?)?;
                return Ok(Some(FileTuple {
                    pointer: FilePointer::new(
                        kind,
                        page_no,
                        BucketPage::<&[u8]>::slot_offset(live),
                    ),
                    tuple,
                }));
            }
            page_no += 1;
            slot = 0;
        }
    }

    fn matches_key(&self, tuple: &Tuple, key: &Tuple) -> HashFileResult<bool> {
        for (idx, col) in self.hash_columns.iter().enumerate() {
            if tuple.value(*col)? != key.value(idx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Chain walk from `slot` of the given page for the next tuple whose key
    /// equals `key`.
    fn find_from(
        &self,
        key: &Tuple,
        mut kind: FileKind,
        mut page_no: PageNo,
        mut slot: u16,
    ) -> HashFileResult<Option<FileTuple>> {
        loop {
            let guard = self.buffer.load_page_read(self.file(kind), page_no)?;
            let page = BucketPage::new(guard.data());
            while let Some(live) = page.next_live_slot(slot) {
                let tuple = self.decode(page.tuple_data(live)?)?;
                if self.matches_key(&tuple, key)? {
                    return Ok(Some(FileTuple {
                        pointer: FilePointer::new(
                            kind,
                            page_no,
                            BucketPage::<&[u8]>::slot_offset(live),
                        ),
                        tuple,
                    }));
                }
                slot = live + 1;
            }
            match page.next_bucket() {
                Some(next_page) => {
                    kind = FileKind::Overflow;
                    page_no = next_page;
                    slot = 0;
                }
                None => return Ok(None),
            }
        }
    }

    fn check_key(&self, key: &Tuple) -> HashFileResult<()> {
        if key.data.len() != self.hash_columns.len() {
            return Err(HashFileError::Plan(format!(
                "lookup key has {} values but the hash key of {} has {} columns",
                key.data.len(),
                self.primary.name,
                self.hash_columns.len()
            )));
        }
        Ok(())
    }

    fn resume_slot(prev: &FilePointer) -> HashFileResult<u16> {
        if prev.page_no == 0 {
            return Err(HashFileError::InvalidPointer(format!(
                "{} points at a header page",
                prev
            )));
        }
        Ok(BucketPage::<&[u8]>::slot_for_offset(prev.offset)? + 1)
    }

    fn verify_chain(
        &self,
        bucket: u32,
        state: &HeaderState,
        overflow_pages: PageNo,
        linked: &mut HashSet<PageNo>,
        problems: &mut Vec<String>,
    ) -> HashFileResult<()> {
        let mut kind = FileKind::Primary;
        let mut page_no = bucket + 1;
        loop {
            let guard = self.buffer.load_page_read(self.file(kind), page_no)?;
            let page = BucketPage::new(guard.data());
            if let Err(e) = page.sanity_check() {
                problems.push(format!("{:?} page {}: {}", kind, page_no, e));
                return Ok(());
            }
            let mut slot = 0;
            while let Some(live) = page.next_live_slot(slot) {
                match page.tuple_data(live).and_then(|bytes| self.decode(bytes)) {
                    Ok(tuple) => {
                        let home = self.bucket_of(&tuple, state)?;
                        if home != bucket {
                            problems.push(format!(
                                "{:?} page {} slot {} holds a tuple of bucket {} in bucket {}",
                                kind, page_no, live, home, bucket
                            ));
                        }
                    }
                    Err(e) => problems.push(format!(
                        "{:?} page {} slot {} does not decode: {}",
                        kind, page_no, live, e
                    )),
                }
                slot = live + 1;
            }
            match page.next_bucket() {
                None => return Ok(()),
                Some(next_page) if next_page >= overflow_pages => {
                    problems.push(format!(
                        "{:?} page {} links to missing overflow page {}",
                        kind, page_no, next_page
                    ));
                    return Ok(());
                }
                Some(next_page) if !linked.insert(next_page) => {
                    problems.push(format!(
                        "overflow page {} is linked twice (from {:?} page {})",
                        next_page, kind, page_no
                    ));
                    return Ok(());
                }
                Some(next_page) => {
                    kind = FileKind::Overflow;
                    page_no = next_page;
                }
            }
        }
    }
}

impl TupleFile for LinHashTupleFile {
    fn file_type(&self) -> DBFileType {
        DBFileType::LinearHash
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn stats(&self) -> TableStats {
        self.stats.read().clone()
    }

    fn get_first_tuple(&self) -> HashFileResult<Option<FileTuple>> {
        self.scan_from(FileKind::Primary, 1, 0)
    }

    fn get_next_tuple(&self, prev: &FilePointer) -> HashFileResult<Option<FileTuple>> {
        let slot = Self::resume_slot(prev)?;
        self.scan_from(prev.file, prev.page_no, slot)
    }

    fn get_tuple(&self, fptr: &FilePointer) -> HashFileResult<FileTuple> {
        if fptr.page_no == 0 {
            return Err(HashFileError::InvalidPointer(format!(
                "{} points at a header page",
                fptr
            )));
        }
        let guard = match self.buffer.load_page_read(self.file(fptr.file), fptr.page_no) {
            Ok(guard) => guard,
            Err(e) if e.is_end_of_file() => {
                return Err(HashFileError::InvalidPointer(format!(
                    "{} is past the end of the file",
                    fptr
                )))
            }
            Err(e) => return Err(e),
        };
        let page = BucketPage::new(guard.data());
        let slot = page.slot_index_from_offset(fptr.offset)?;
        let tuple = self.decode(page.tuple_data(slot)?)?;
        Ok(FileTuple {
            pointer: *fptr,
            tuple,
        })
    }

    fn add_tuple(&self, tuple: &Tuple) -> HashFileResult<FilePointer> {
        let bytes = self.encode(tuple)?;
        let state = self.header_state()?;
        let fptr = self.insert_without_split(tuple, &bytes, &state)?;
        match self.split_check(state) {
            Ok(false) => return Ok(fptr),
            Ok(true) => {}
            // The tuple is already stored, so the insert itself succeeded.
            Err(e) => warn!(
                "Split of {} after inserting {} failed: {}",
                self.primary.name, tuple, e
            ),
        }
        // The split may have moved the new tuple into the split image.
        if self.holds(&fptr, tuple)? {
            return Ok(fptr);
        }
        let home = self.bucket_of(tuple, &self.header_state()?)?;
        self.locate(tuple, home)
    }

    fn update_tuple(&self, _fptr: &FilePointer, _tuple: &Tuple) -> HashFileResult<()> {
        Err(HashFileError::UnsupportedOperation(
            "linear hash files cannot update tuples in place; delete and re-insert instead"
                .to_string(),
        ))
    }

    fn delete_tuple(&self, fptr: &FilePointer) -> HashFileResult<()> {
        if fptr.page_no == 0 {
            return Err(HashFileError::InvalidPointer(format!(
                "{} points at a header page",
                fptr
            )));
        }
        let mut guard = match self.buffer.load_page(self.file(fptr.file), fptr.page_no, false) {
            Ok(guard) => guard,
            Err(e) if e.is_end_of_file() => {
                return Err(HashFileError::InvalidPointer(format!(
                    "{} is past the end of the file",
                    fptr
                )))
            }
            Err(e) => return Err(e),
        };
        let slot = BucketPage::new(guard.data()).slot_index_from_offset(fptr.offset)?;
        let mut page = BucketPage::new(guard.data_mut());
        page.delete_tuple(slot)?;
        #[cfg(debug_assertions)]
        page.sanity_check()?;
        Ok(())
    }

    fn analyze(&self) -> HashFileResult<()> {
        let mut collector = StatsCollector::new(&self.schema);
        for kind in [FileKind::Primary, FileKind::Overflow] {
            let file = self.file(kind);
            for page_no in 1..self.buffer.num_pages(file)? {
                collector.record_page();
                let guard = self.buffer.load_page_read(file, page_no)?;
                let page = BucketPage::new(guard.data());
                let mut slot = 0;
                while let Some(live) = page.next_live_slot(slot) {
                    let bytes = page.tuple_data(live)?;
                    collector.record_tuple(&self.decode(bytes)?, bytes.len());
                    slot = live + 1;
                }
            }
        }
        let stats = collector.finish();
        info!(
            "Analyzed {}: {} tuples in {} data pages",
            self.primary.name, stats.num_tuples, stats.num_data_pages
        );
        *self.stats.write() = stats;
        self.save_metadata()
    }

    fn verify(&self) -> HashFileResult<Vec<String>> {
        let mut problems = Vec::new();
        let state = self.header_state()?;
        if state.next as u64 >= state.bucket_count() {
            problems.push(format!(
                "split frontier {} is outside the {} buckets of level {}",
                state.next,
                state.bucket_count(),
                state.level
            ));
            return Ok(problems);
        }

        let primary_pages = self.buffer.num_pages(&self.primary)? as u64;
        if primary_pages != state.total_buckets() + 1 {
            problems.push(format!(
                "primary file has {} pages but {} buckets exist",
                primary_pages,
                state.total_buckets()
            ));
            return Ok(problems);
        }

        let overflow_pages = self.buffer.num_pages(&self.overflow)?;
        let mut linked = HashSet::new();
        for bucket in 0..state.total_buckets() as u32 {
            self.verify_chain(bucket, &state, overflow_pages, &mut linked, &mut problems)?;
        }
        let unlinked = (overflow_pages.saturating_sub(1) as usize).saturating_sub(linked.len());
        if unlinked > 0 {
            problems.push(format!("{} overflow pages belong to no bucket", unlinked));
        }
        Ok(problems)
    }

    fn optimize(&self) -> HashFileResult<()> {
        Err(HashFileError::UnsupportedOperation(
            "linear hash files cannot be optimized".to_string(),
        ))
    }

    fn as_hashed(&self) -> Option<&dyn HashedTupleFile> {
        Some(self)
    }
}

impl HashedTupleFile for LinHashTupleFile {
    fn key_columns(&self) -> &[usize] {
        &self.hash_columns
    }

    fn find_first_tuple_equals(&self, key: &Tuple) -> HashFileResult<Option<FileTuple>> {
        self.check_key(key)?;
        let state = self.header_state()?;
        let bucket = compute_bucket_number(TupleHasher::hash_values(&key.data), &state);
        self.find_from(key, FileKind::Primary, bucket + 1, 0)
    }

    fn find_next_tuple_equals(
        &self,
        prev: &FilePointer,
        key: &Tuple,
    ) -> HashFileResult<Option<FileTuple>> {
        self.check_key(key)?;
        let slot = Self::resume_slot(prev)?;
        self.find_from(key, prev.file, prev.page_no, slot)
    }

    fn layout(&self) -> HashFileResult<HashLayout> {
        let state = self.header_state()?;
        Ok(HashLayout {
            buckets: state.total_buckets(),
            overflow_pages: self.buffer.num_pages(&self.overflow)?.saturating_sub(1),
        })
    }
}
