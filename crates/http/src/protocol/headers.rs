use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use cio_sockets::pool::ObjectPool;

use crate::buffer::{CharBufferBuilder, CharSeq, hash_lower_case};
use crate::ensure;
use crate::protocol::{EXPECTED_HEADERS_QTY, HEADER_SIZE, ParseError};

const NAME_HASH: usize = 0;
const VALUE_HASH: usize = 1;
const NAME_START: usize = 2;
const NAME_END: usize = 3;
const VALUE_START: usize = 4;
const VALUE_END: usize = 5;

/// Offsets of one parsed header line inside the message builder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderEntry {
    pub(crate) name_hash: u32,
    pub(crate) value_hash: u32,
    pub(crate) name: (usize, usize),
    pub(crate) value: (usize, usize),
}

/// The header index of one message, stored in a pooled array.
///
/// Entry `i` occupies `[i * HEADER_SIZE, (i + 1) * HEADER_SIZE)`; its layout
/// is given by the slot constants above. The array goes back to the pool on
/// drop.
pub(crate) struct HeaderTable {
    indexes: ManuallyDrop<Box<Vec<u32>>>,
    pool: Arc<dyn ObjectPool<Vec<u32>>>,
    len: usize,
}

impl HeaderTable {
    pub(crate) fn new(pool: Arc<dyn ObjectPool<Vec<u32>>>) -> Self {
        Self { indexes: ManuallyDrop::new(pool.borrow()), pool, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn put(&mut self, entry: HeaderEntry) -> Result<(), ParseError> {
        ensure!(
            self.len < EXPECTED_HEADERS_QTY,
            ParseError::not_supported(format!("more than {EXPECTED_HEADERS_QTY} headers"))
        );

        let base = self.len * HEADER_SIZE;
        let slots = &mut self.indexes[base..base + HEADER_SIZE];
        slots[NAME_HASH] = entry.name_hash;
        slots[VALUE_HASH] = entry.value_hash;
        slots[NAME_START] = offset(entry.name.0)?;
        slots[NAME_END] = offset(entry.name.1)?;
        slots[VALUE_START] = offset(entry.value.0)?;
        slots[VALUE_END] = offset(entry.value.1)?;

        self.len += 1;
        Ok(())
    }

    #[inline]
    fn slot(&self, entry: usize, slot: usize) -> u32 {
        self.indexes[entry * HEADER_SIZE + slot]
    }

    #[inline]
    fn range(&self, entry: usize, start_slot: usize, end_slot: usize) -> (usize, usize) {
        (self.slot(entry, start_slot) as usize, self.slot(entry, end_slot) as usize)
    }
}

fn offset(index: usize) -> Result<u32, ParseError> {
    u32::try_from(index).map_err(|e| ParseError::not_supported(format!("header offset {index} does not fit in the index table: {e}")))
}

impl Drop for HeaderTable {
    fn drop(&mut self) {
        // SAFETY: `indexes` is never touched again after drop.
        let indexes = unsafe { ManuallyDrop::take(&mut self.indexes) };
        self.pool.recycle(indexes);
    }
}

/// The headers of a parsed message.
///
/// Lookups compare precomputed case-insensitive hashes first and confirm a
/// hash match on the name characters, so `get("content-length")` finds
/// `Content-Length`. Values are returned as views into the message buffer.
#[derive(Clone, Copy)]
pub struct HttpHeaders<'a> {
    table: &'a HeaderTable,
    builder: &'a CharBufferBuilder,
}

impl<'a> HttpHeaders<'a> {
    pub(crate) fn new(table: &'a HeaderTable, builder: &'a CharBufferBuilder) -> Self {
        Self { table, builder }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Returns the value of the first header named `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<CharSeq<'a>> {
        let hash = hash_lower_case(name.chars());
        (0..self.table.len())
            .find(|&entry| self.table.slot(entry, NAME_HASH) == hash && self.name(entry).eq_ignore_ascii_case(name))
            .map(|entry| self.value(entry))
    }

    /// Returns every value of the headers named `name`, in arrival order.
    pub fn get_all<'n>(&self, name: &'n str) -> impl Iterator<Item = CharSeq<'a>> + use<'a, 'n> {
        let headers = *self;
        let hash = hash_lower_case(name.chars());
        (0..self.table.len())
            .filter(move |&entry| headers.table.slot(entry, NAME_HASH) == hash && headers.name(entry).eq_ignore_ascii_case(name))
            .map(move |entry| headers.value(entry))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The case-insensitive hash of the value of entry `index`, computed at parse time.
    pub fn value_hash(&self, index: usize) -> Option<u32> {
        (index < self.table.len()).then(|| self.table.slot(index, VALUE_HASH))
    }

    /// Iterates over `(name, value)` pairs in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (CharSeq<'a>, CharSeq<'a>)> + use<'a> {
        let headers = *self;
        (0..self.table.len()).map(move |entry| (headers.name(entry), headers.value(entry)))
    }

    fn name(&self, entry: usize) -> CharSeq<'a> {
        let (start, end) = self.table.range(entry, NAME_START, NAME_END);
        self.builder.view(start, end)
    }

    fn value(&self, entry: usize) -> CharSeq<'a> {
        let (start, end) = self.table.range(entry, VALUE_START, VALUE_END);
        self.builder.view(start, end)
    }
}

impl fmt::Debug for HttpHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::{HttpPools, PoolConfig};

    fn entry(builder: &CharBufferBuilder, name: (usize, usize), value: (usize, usize)) -> HeaderEntry {
        HeaderEntry {
            name_hash: builder.hash_lower_case(name.0, name.1).unwrap(),
            value_hash: builder.hash_lower_case(value.0, value.1).unwrap(),
            name,
            value,
        }
    }

    #[test]
    fn lookup_ignores_case_and_keeps_order() {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();
        let mut builder = pools.char_buffer();
        builder.append_str("Host: localhostAccept: text/htmlaccept: */*");

        let mut table = HeaderTable::new(Arc::clone(pools.header_arrays()));
        table.put(entry(&builder, (0, 4), (6, 15))).unwrap();
        table.put(entry(&builder, (15, 21), (23, 32))).unwrap();
        table.put(entry(&builder, (32, 38), (40, 43))).unwrap();

        let headers = HttpHeaders::new(&table, &builder);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("host").unwrap(), "localhost");
        assert_eq!(headers.get("HOST").unwrap(), "localhost");
        assert_eq!(headers.get("Accept").unwrap(), "text/html");
        assert_eq!(headers.get_all("ACCEPT").map(|v| v.to_string()).collect::<Vec<_>>(), ["text/html", "*/*"]);
        assert!(headers.get("Content-Length").is_none());
        assert!(!headers.contains("Hos"));
        assert_eq!(headers.value_hash(0), Some(hash_lower_case("LOCALHOST".chars())));
        assert_eq!(headers.value_hash(3), None);

        let names: Vec<String> = headers.iter().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, ["Host", "Accept", "accept"]);
    }

    #[test]
    fn table_is_bounded() {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();
        let mut builder = pools.char_buffer();
        builder.append_str("X-A: b");

        let mut table = HeaderTable::new(Arc::clone(pools.header_arrays()));
        for _ in 0..EXPECTED_HEADERS_QTY {
            table.put(entry(&builder, (0, 3), (5, 6))).unwrap();
        }

        let err = table.put(entry(&builder, (0, 3), (5, 6))).unwrap_err();
        assert!(matches!(err, ParseError::NotSupported { .. }));
        assert_eq!(table.len(), EXPECTED_HEADERS_QTY);
    }
}
