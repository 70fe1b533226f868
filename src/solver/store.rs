//! The two alternating hash/tree heaps and the per-bucket slot counters.
//!
//! Layer r lives on heap `r % 2` at word offset `r/2` inside the common slot
//! cell (xenoncat's fixed layout): the tree word of layer r sits exactly one
//! word before layer r+2's, and because DIGITBITS >= 16 shortens the hash
//! tail by at least one word every two digits, layer r+2 never reaches back
//! over layer r's tree word. Ancestor nodes therefore stay intact until
//! solution reconstruction, while hash tails are overwritten two rounds after
//! they were produced.

use std::sync::atomic::{AtomicU32, Ordering};

use super::layout::{Dims, MAX_HASH_WORDS};

fn zeroed(words: usize) -> Box<[AtomicU32]> {
    (0..words).map(|_| AtomicU32::new(0)).collect()
}

pub(crate) struct HashHeaps {
    heaps: [Box<[AtomicU32]>; 2],
    slot_words: usize,
    nslots: usize,
}

impl HashHeaps {
    pub(crate) fn new(dims: &Dims) -> Self {
        let words = dims.nbuckets * dims.nslots * dims.slot_words;
        HashHeaps {
            heaps: [zeroed(words), zeroed(words)],
            slot_words: dims.slot_words,
            nslots: dims.nslots,
        }
    }

    #[inline]
    fn slot_base(&self, r: usize, bucket: usize, slot: usize) -> usize {
        (bucket * self.nslots + slot) * self.slot_words + r / 2
    }

    #[inline]
    pub(crate) fn node(&self, r: usize, bucket: usize, slot: usize) -> u32 {
        self.heaps[r & 1][self.slot_base(r, bucket, slot)].load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_node(&self, r: usize, bucket: usize, slot: usize, word: u32) {
        self.heaps[r & 1][self.slot_base(r, bucket, slot)].store(word, Ordering::Relaxed);
    }

    /// Loads the first `units` words of a slot's hash tail.
    #[inline]
    pub(crate) fn load_hash(
        &self,
        r: usize,
        bucket: usize,
        slot: usize,
        units: usize,
        out: &mut [u32; MAX_HASH_WORDS],
    ) {
        let base = self.slot_base(r, bucket, slot) + 1;
        let heap = &self.heaps[r & 1];
        for (i, w) in out[..units].iter_mut().enumerate() {
            *w = heap[base + i].load(Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn set_hash_word(&self, r: usize, bucket: usize, slot: usize, i: usize, word: u32) {
        let base = self.slot_base(r, bucket, slot) + 1;
        self.heaps[r & 1][base + i].store(word, Ordering::Relaxed);
    }
}

/// One row of counters per heap parity; the row for layer r is drained while
/// layer r+1 is written, which frees it for layer r+2 on the same heap.
pub(crate) struct SlotCounters {
    rows: Box<[AtomicU32]>,
    nbuckets: usize,
    nslots: u32,
}

impl SlotCounters {
    pub(crate) fn new(dims: &Dims) -> Self {
        SlotCounters {
            rows: zeroed(2 * dims.nbuckets),
            nbuckets: dims.nbuckets,
            nslots: dims.nslots as u32,
        }
    }

    pub(crate) fn reset(&self) {
        for c in self.rows.iter() {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Claims the next slot of a bucket, returning its index. Values at or
    /// beyond NSLOTS mean the bucket is full and the write must be dropped.
    /// Relaxed is enough: payload visibility is provided by the inter-digit
    /// barrier, not by the counter.
    #[inline]
    pub(crate) fn claim(&self, r: usize, bucket: usize) -> u32 {
        self.rows[(r & 1) * self.nbuckets + bucket].fetch_add(1, Ordering::Relaxed)
    }

    /// Reads and clears a bucket's count in one step; the bucket's storage is
    /// about to be reused on the same heap.
    #[inline]
    pub(crate) fn drain(&self, r: usize, bucket: usize) -> u32 {
        self.rows[(r & 1) * self.nbuckets + bucket]
            .swap(0, Ordering::Relaxed)
            .min(self.nslots)
    }

    /// Current count without draining, clamped to NSLOTS.
    #[cfg(test)]
    pub(crate) fn peek(&self, r: usize, bucket: usize) -> u32 {
        self.rows[(r & 1) * self.nbuckets + bucket]
            .load(Ordering::Relaxed)
            .min(self.nslots)
    }
}
