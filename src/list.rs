//! Accumulator for bucket listing results.
//!
//! Listings can run to millions of keys, so entries are stored in fixed-size
//! blocks rather than one contiguous vector. Pushing never moves previously
//! stored entries and growth cost is bounded by the block size. Callers walk
//! the results through [`ObjectList::iter`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entries per arena block.
const BLOCK_ENTRIES: usize = 1024;

/// One object (or common prefix) returned by a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectEntry {
    pub key: String,
    pub length: u64,
    /// Absent for common-prefix entries, which have no timestamp.
    pub created: Option<DateTime<Utc>>,
}

/// Metadata returned by a HEAD request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectStatus {
    pub length: u64,
    pub created: Option<DateTime<Utc>>,
}

/// Block-arena of listing entries, reused across list calls.
#[derive(Debug, Default)]
pub struct ObjectList {
    blocks: Vec<Vec<ObjectEntry>>,
    len: usize,
}

impl ObjectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all entries but keeps allocated blocks for reuse.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.clear();
        }
        self.len = 0;
    }

    pub fn push(&mut self, entry: ObjectEntry) {
        let block_idx = self.len / BLOCK_ENTRIES;
        if block_idx == self.blocks.len() {
            self.blocks.push(Vec::with_capacity(BLOCK_ENTRIES));
        }
        self.blocks[block_idx].push(entry);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.blocks.iter().flat_map(|b| b.iter()).take(self.len)
    }

    /// Key of the most recently pushed entry, used as the v1 list marker.
    pub fn last_key(&self) -> Option<&str> {
        if self.len == 0 {
            return None;
        }
        let idx = self.len - 1;
        Some(self.blocks[idx / BLOCK_ENTRIES][idx % BLOCK_ENTRIES].key.as_str())
    }
}

impl<'a> IntoIterator for &'a ObjectList {
    type Item = &'a ObjectEntry;
    type IntoIter = Box<dyn Iterator<Item = &'a ObjectEntry> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
