//! Sorted key/value tables backing the in-memory engine.

use crate::status::{EngineResult, Status};
use crate::types::{DbFlags, KeyCompare, PutFlags};
use std::cmp::Ordering;

fn lexicographic(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Compares keys byte-wise starting from the last byte.
fn reverse_lexicographic(a: &[u8], b: &[u8]) -> Ordering {
    a.iter().rev().cmp(b.iter().rev())
}

/// Native-endian unsigned integer order for 4 and 8 byte keys.
fn native_integer(a: &[u8], b: &[u8]) -> Ordering {
    match (a.len(), b.len()) {
        (4, 4) => {
            let x = u32::from_ne_bytes([a[0], a[1], a[2], a[3]]);
            let y = u32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
            x.cmp(&y)
        }
        (8, 8) => {
            let mut x = [0u8; 8];
            let mut y = [0u8; 8];
            x.copy_from_slice(a);
            y.copy_from_slice(b);
            u64::from_ne_bytes(x).cmp(&u64::from_ne_bytes(y))
        }
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Default key order implied by the persisted database flags.
pub(crate) fn default_key_compare(flags: DbFlags) -> KeyCompare {
    if flags.contains(DbFlags::INTEGER_KEY) {
        native_integer
    } else if flags.contains(DbFlags::REVERSE_KEY) {
        reverse_lexicographic
    } else {
        lexicographic
    }
}

/// One database's entries, kept sorted by `(key_cmp(key), dup_cmp(value))`.
///
/// Non-dup-sorted tables hold at most one entry per key.
#[derive(Clone)]
pub(crate) struct Table {
    flags: DbFlags,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    key_cmp: KeyCompare,
    dup_cmp: KeyCompare,
    bytes: u64,
}

impl Table {
    pub(crate) fn new(flags: DbFlags) -> Self {
        let flags = flags.difference(DbFlags::CREATE);
        Self {
            flags,
            entries: Vec::new(),
            key_cmp: default_key_compare(flags),
            dup_cmp: lexicographic,
            bytes: 0,
        }
    }

    /// Rebuilds a table from persisted entries.
    pub(crate) fn from_entries(flags: DbFlags, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        let mut table = Self::new(flags);
        table.bytes = entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        table.entries = entries;
        table.resort();
        table
    }

    pub(crate) fn flags(&self) -> DbFlags {
        self.flags
    }

    pub(crate) fn is_dup_sort(&self) -> bool {
        self.flags.contains(DbFlags::DUP_SORT)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn entries(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.entries
    }

    pub(crate) fn entry(&self, index: usize) -> Option<(&[u8], &[u8])> {
        self.entries
            .get(index)
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub(crate) fn compare_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
        (self.key_cmp)(a, b)
    }

    /// Installs custom comparators; `None` restores the flag default.
    pub(crate) fn set_comparators(&mut self, key: Option<KeyCompare>, dup: Option<KeyCompare>) {
        self.key_cmp = key.unwrap_or_else(|| default_key_compare(self.flags));
        self.dup_cmp = dup.unwrap_or(lexicographic);
        self.resort();
    }

    fn resort(&mut self) {
        let key_cmp = self.key_cmp;
        let dup_cmp = self.dup_cmp;
        let dup = self.is_dup_sort();
        self.entries.sort_by(|(ak, av), (bk, bv)| {
            let ord = key_cmp(ak, bk);
            if dup {
                ord.then_with(|| dup_cmp(av, bv))
            } else {
                ord
            }
        });
        if !dup {
            // A comparator that merges distinct keys keeps the last write.
            let mut deduped: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(self.entries.len());
            for entry in self.entries.drain(..) {
                match deduped.last_mut() {
                    Some(last) if key_cmp(&last.0, &entry.0) == Ordering::Equal => *last = entry,
                    _ => deduped.push(entry),
                }
            }
            self.entries = deduped;
            self.bytes = self
                .entries
                .iter()
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
        }
    }

    /// First index whose key is not less than `key`.
    pub(crate) fn lower_bound(&self, key: &[u8]) -> usize {
        self.entries
            .partition_point(|(k, _)| (self.key_cmp)(k, key) == Ordering::Less)
    }

    /// Index range `[start, end)` of the entries stored under `key`.
    pub(crate) fn key_range(&self, key: &[u8]) -> (usize, usize) {
        let start = self.lower_bound(key);
        let end = self
            .entries
            .partition_point(|(k, _)| (self.key_cmp)(k, key) != Ordering::Greater);
        (start, end.max(start))
    }

    /// Locates an exact pair; `Err` carries the insertion point.
    pub(crate) fn find(&self, key: &[u8], value: &[u8]) -> Result<usize, usize> {
        if self.is_dup_sort() {
            self.entries.binary_search_by(|(k, v)| {
                (self.key_cmp)(k, key).then_with(|| (self.dup_cmp)(v, value))
            })
        } else {
            self.entries.binary_search_by(|(k, _)| (self.key_cmp)(k, key))
        }
    }

    /// First index at or after `(key, value)` within `key`'s range.
    pub(crate) fn lower_bound_pair(&self, key: &[u8], value: &[u8]) -> usize {
        let (start, end) = self.key_range(key);
        start
            + self.entries[start..end]
                .partition_point(|(_, v)| (self.dup_cmp)(v, value) == Ordering::Less)
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let (start, end) = self.key_range(key);
        if start < end {
            Some(self.entries[start].1.as_slice())
        } else {
            None
        }
    }

    pub(crate) fn put(&mut self, key: &[u8], value: &[u8], flags: PutFlags) -> EngineResult<()> {
        let (start, end) = self.key_range(key);
        let key_exists = start < end;

        if flags.contains(PutFlags::NO_OVERWRITE) && key_exists {
            return Err(Status::KEY_EXIST);
        }
        if flags.contains(PutFlags::APPEND) {
            if let Some((last, _)) = self.entries.last() {
                let ord = (self.key_cmp)(last, key);
                let in_order = ord == Ordering::Less || (self.is_dup_sort() && ord == Ordering::Equal);
                if !in_order {
                    return Err(Status::KEY_EXIST);
                }
            }
        }

        if self.is_dup_sort() {
            match self.find(key, value) {
                Ok(_) if flags.contains(PutFlags::NO_DUP_DATA) => Err(Status::KEY_EXIST),
                Ok(_) => Ok(()),
                Err(index) => {
                    self.bytes += (key.len() + value.len()) as u64;
                    self.entries.insert(index, (key.to_vec(), value.to_vec()));
                    Ok(())
                }
            }
        } else if key_exists {
            let old = std::mem::replace(&mut self.entries[start].1, value.to_vec());
            self.bytes = self.bytes - old.len() as u64 + value.len() as u64;
            Ok(())
        } else {
            self.bytes += (key.len() + value.len()) as u64;
            self.entries.insert(start, (key.to_vec(), value.to_vec()));
            Ok(())
        }
    }

    pub(crate) fn delete(&mut self, key: &[u8], value: Option<&[u8]>) -> EngineResult<()> {
        match value {
            Some(value) if self.is_dup_sort() => {
                let index = self.find(key, value).map_err(|_| Status::NOT_FOUND)?;
                let (k, v) = self.entries.remove(index);
                self.bytes -= (k.len() + v.len()) as u64;
                Ok(())
            }
            _ => {
                let (start, end) = self.key_range(key);
                if start == end {
                    return Err(Status::NOT_FOUND);
                }
                for (k, v) in self.entries.drain(start..end) {
                    self.bytes -= (k.len() + v.len()) as u64;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("flags", &self.flags)
            .field("entries", &self.entries.len())
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(table: &Table) -> Vec<Vec<u8>> {
        table.entries().iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn put_keeps_entries_sorted() {
        let mut table = Table::new(DbFlags::empty());
        table.put(b"b", b"2", PutFlags::empty()).unwrap();
        table.put(b"a", b"1", PutFlags::empty()).unwrap();
        table.put(b"c", b"3", PutFlags::empty()).unwrap();
        assert_eq!(keys(&table), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(table.bytes(), 6);
    }

    #[test]
    fn put_overwrites_without_dup_sort() {
        let mut table = Table::new(DbFlags::empty());
        table.put(b"k", b"old", PutFlags::empty()).unwrap();
        table.put(b"k", b"newer", PutFlags::empty()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(b"k"), Some(&b"newer"[..]));
        assert_eq!(table.bytes(), 6);
    }

    #[test]
    fn no_overwrite_rejects_existing_key() {
        let mut table = Table::new(DbFlags::empty());
        table.put(b"k", b"v", PutFlags::empty()).unwrap();
        assert_eq!(
            table.put(b"k", b"w", PutFlags::NO_OVERWRITE),
            Err(Status::KEY_EXIST)
        );
    }

    #[test]
    fn append_requires_order() {
        let mut table = Table::new(DbFlags::empty());
        table.put(b"b", b"", PutFlags::APPEND).unwrap();
        assert_eq!(table.put(b"a", b"", PutFlags::APPEND), Err(Status::KEY_EXIST));
        table.put(b"c", b"", PutFlags::APPEND).unwrap();
    }

    #[test]
    fn dup_sort_keeps_sorted_values() {
        let mut table = Table::new(DbFlags::DUP_SORT);
        table.put(b"k", b"2", PutFlags::empty()).unwrap();
        table.put(b"k", b"1", PutFlags::empty()).unwrap();
        table.put(b"k", b"2", PutFlags::empty()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b"k"), Some(&b"1"[..]));
        assert_eq!(
            table.put(b"k", b"1", PutFlags::NO_DUP_DATA),
            Err(Status::KEY_EXIST)
        );
    }

    #[test]
    fn delete_single_duplicate() {
        let mut table = Table::new(DbFlags::DUP_SORT);
        table.put(b"k", b"1", PutFlags::empty()).unwrap();
        table.put(b"k", b"2", PutFlags::empty()).unwrap();
        table.delete(b"k", Some(b"1")).unwrap();
        assert_eq!(table.get(b"k"), Some(&b"2"[..]));
        assert_eq!(table.delete(b"k", Some(b"1")), Err(Status::NOT_FOUND));
        table.delete(b"k", None).unwrap();
        assert!(table.get(b"k").is_none());
        assert_eq!(table.bytes(), 0);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut table = Table::new(DbFlags::empty());
        assert_eq!(table.delete(b"missing", None), Err(Status::NOT_FOUND));
    }

    #[test]
    fn reverse_key_orders_from_last_byte() {
        let mut table = Table::new(DbFlags::REVERSE_KEY);
        table.put(b"ba", b"", PutFlags::empty()).unwrap();
        table.put(b"ab", b"", PutFlags::empty()).unwrap();
        assert_eq!(keys(&table), vec![b"ba".to_vec(), b"ab".to_vec()]);
    }

    #[test]
    fn integer_key_orders_numerically() {
        let mut table = Table::new(DbFlags::INTEGER_KEY);
        table
            .put(&256u32.to_ne_bytes(), b"", PutFlags::empty())
            .unwrap();
        table.put(&1u32.to_ne_bytes(), b"", PutFlags::empty()).unwrap();
        assert_eq!(table.entries()[0].0, 1u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn custom_comparator_resorts() {
        fn descending(a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }
        let mut table = Table::new(DbFlags::empty());
        table.put(b"a", b"", PutFlags::empty()).unwrap();
        table.put(b"b", b"", PutFlags::empty()).unwrap();
        table.set_comparators(Some(descending), None);
        assert_eq!(keys(&table), vec![b"b".to_vec(), b"a".to_vec()]);
        assert_eq!(table.lower_bound(b"a"), 1);
    }

    #[test]
    fn lower_bound_pair_within_key() {
        let mut table = Table::new(DbFlags::DUP_SORT);
        for v in [b"1", b"3", b"5"] {
            table.put(b"k", v, PutFlags::empty()).unwrap();
        }
        assert_eq!(table.lower_bound_pair(b"k", b"2"), 1);
        assert_eq!(table.lower_bound_pair(b"k", b"9"), 3);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        proptest! {
            #[test]
            fn matches_ordered_map(ops in prop::collection::vec(
                (prop::collection::vec(any::<u8>(), 1..8), prop::collection::vec(any::<u8>(), 0..8), any::<bool>()),
                0..64,
            )) {
                let mut table = Table::new(DbFlags::empty());
                let mut model = BTreeMap::new();
                for (key, value, insert) in ops {
                    if insert {
                        table.put(&key, &value, PutFlags::empty()).unwrap();
                        model.insert(key, value);
                    } else {
                        let expected = model.remove(&key).map(|_| ()).ok_or(Status::NOT_FOUND);
                        prop_assert_eq!(table.delete(&key, None), expected);
                    }
                }
                let expected: Vec<_> = model.into_iter().collect();
                prop_assert_eq!(table.entries(), &expected[..]);
                let bytes: u64 = expected.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
                prop_assert_eq!(table.bytes(), bytes);
            }
        }
    }
}
