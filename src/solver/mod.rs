//! The bucketed collide-and-XOR engine.
//!
//! Solving proceeds in K+1 digits. Digit 0 expands the seeded BLAKE2b state
//! into 2^(n/(k+1)+1) hashes and scatters them into buckets keyed by the
//! leading BUCKBITS. Each following round drains the previous layer bucket by
//! bucket, pairs up slots whose sub-digit matches (so the full digit of the
//! pair's XOR is zero), and writes the XOR of the surviving hash tails one
//! layer deeper. The final digit looks for pairs whose entire remainder
//! cancels and walks the tree of slot references back to 2^K leaf indices.
//!
//! Workers are symmetric: buckets (and BLAKE2b blocks in digit 0) are dealt
//! round-robin, and a barrier separates consecutive digits. All shared words
//! are relaxed atomics; the barrier's release-acquire edge is what publishes
//! one digit's writes to the next.

mod collision;
mod layout;
mod store;
mod tree;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

use blake2b_simd::State as Blake2bState;
use tracing::debug;

use crate::blake2b;
use crate::params::Params;

use collision::CollisionData;
use layout::{leading_digit, word_nibble, xor_digit, Dims, MAX_HASH_WORDS};
use store::{HashHeaps, SlotCounters};
use tree::{TreeCodec, TreeNode};

pub use collision::PairIndex;

/// Construction-time solver policy.
#[derive(Clone, Debug)]
pub struct Options {
    /// Worker threads; 0 is treated as 1.
    pub threads: usize,
    /// Ceiling on stored solutions per nonce. Candidates found beyond it are
    /// counted but not stored.
    pub max_sols: usize,
    /// Collision index realisation.
    pub pair_index: PairIndex,
    /// Carry the sub-digit in the tree node (`Some(true)`), re-read it from
    /// the stored hash bytes (`Some(false)`), or pick automatically based on
    /// whether the node still fits a word (`None`).
    pub cached_sub_digit: Option<bool>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            threads: 1,
            max_sols: 8,
            pair_index: PairIndex::default(),
            cached_sub_digit: None,
        }
    }
}

/// A solver could not be constructed for the requested parameters.
#[derive(Debug)]
pub struct SolverError(pub(crate) ErrorKind);

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    InvalidParams,
    UndeclaredLayout { digit_bits: u32 },
    NodeWidth { bits: u32 },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ErrorKind::InvalidParams => f.write_str("invalid parameters"),
            ErrorKind::UndeclaredLayout { digit_bits } => {
                write!(f, "no declared byte layout for {}-bit digits", digit_bits)
            }
            ErrorKind::NodeWidth { bits } => {
                write!(f, "{}-bit tree nodes do not fit a word", bits)
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// Dropped-work counters for one solve; statistical, never fatal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Insertions dropped because a bucket was full.
    pub bucket_full: u32,
    /// Slots skipped because a collision-index chain was full.
    pub index_full: u32,
    /// Pairs skipped because their trailing hash words were identical.
    pub duplicate_hash: u32,
}

/// Outcome of one solve run.
#[derive(Clone, Debug)]
pub struct SolveResult {
    /// Stored proofs, each 2^K tree-ordered leaf indices.
    pub solutions: Vec<Vec<u32>>,
    /// Accepted candidates, including any beyond the `max_sols` ceiling.
    pub candidates: u32,
    pub stats: SolveStats,
}

pub struct Solver {
    dims: Dims,
    codec: TreeCodec,
    threads: usize,
    max_sols: usize,
    pair_index: PairIndex,
    base_state: Option<Blake2bState>,
    heaps: HashHeaps,
    counters: SlotCounters,
    xfull: AtomicU32,
    bfull: AtomicU32,
    hfull: AtomicU32,
    nsols: AtomicU32,
    sols: Mutex<Vec<Vec<u32>>>,
}

impl Solver {
    pub fn new(n: u32, k: u32, options: Options) -> Result<Self, SolverError> {
        let p = Params::new(n, k).ok_or(SolverError(ErrorKind::InvalidParams))?;
        let digit_bits = p.digit_bits();
        // Declared byte layouts: (BUCKBITS, RESTBITS) in (12,4), (16,4), (20,4).
        if !matches!(digit_bits, 16 | 20 | 24) {
            return Err(SolverError(ErrorKind::UndeclaredLayout { digit_bits }));
        }

        let fits = TreeCodec::node_bits(&p, true) <= 32;
        let cached = match options.cached_sub_digit {
            Some(true) if !fits => {
                return Err(SolverError(ErrorKind::NodeWidth {
                    bits: TreeCodec::node_bits(&p, true),
                }))
            }
            Some(cached) => cached,
            None => fits,
        };

        let dims = Dims::new(&p, cached);
        // Layer r+2 must nest to the right of layer r's tree word; DIGITBITS
        // >= 16 makes the tails shrink fast enough.
        for r in 0..dims.k as usize {
            assert!(r / 2 + 1 + dims.hash_words(r) <= dims.slot_words);
        }

        let heaps = HashHeaps::new(&dims);
        let counters = SlotCounters::new(&dims);
        Ok(Solver {
            codec: TreeCodec::new(&p, cached),
            threads: options.threads.max(1),
            max_sols: options.max_sols,
            pair_index: options.pair_index,
            base_state: None,
            heaps,
            counters,
            xfull: AtomicU32::new(0),
            bfull: AtomicU32::new(0),
            hfull: AtomicU32::new(0),
            nsols: AtomicU32::new(0),
            sols: Mutex::new(Vec::new()),
            dims,
        })
    }

    /// Seeds the hash state with arbitrary input and nonce bytes.
    pub fn set_input(&mut self, input: &[u8], nonce: &[u8]) {
        let mut state = blake2b::initialise_state(self.dims.n, self.dims.k, self.dims.hash_output);
        state.update(input);
        state.update(nonce);
        self.base_state = Some(state);
    }

    /// Seeds the hash state with a block header and a 32-byte little-endian
    /// nonce derived from `nonce`.
    pub fn set_header(&mut self, header: &[u8; 108], nonce: u32) {
        let mut nonce_bytes = [0u8; 32];
        nonce_bytes[..4].copy_from_slice(&nonce.to_le_bytes());
        self.set_input(header, &nonce_bytes);
    }

    /// Runs the full digit pipeline for the current input and nonce.
    ///
    /// Panics if no input has been set.
    pub fn solve(&mut self) -> SolveResult {
        let state = self
            .base_state
            .clone()
            .expect("input and nonce must be set before solving");

        self.counters.reset();
        self.xfull.store(0, Ordering::Relaxed);
        self.bfull.store(0, Ordering::Relaxed);
        self.hfull.store(0, Ordering::Relaxed);
        self.nsols.store(0, Ordering::Relaxed);
        self.sols.lock().unwrap().clear();

        let barrier = Barrier::new(self.threads);
        let this = &*self;
        if this.threads == 1 {
            this.worker(0, &barrier, state);
        } else {
            thread::scope(|scope| {
                for id in 0..this.threads {
                    let state = state.clone();
                    let barrier = &barrier;
                    scope.spawn(move || this.worker(id, barrier, state));
                }
            });
        }

        let solutions = std::mem::take(&mut *self.sols.lock().unwrap());
        SolveResult {
            solutions,
            candidates: self.nsols.load(Ordering::Relaxed),
            stats: SolveStats {
                bucket_full: self.bfull.load(Ordering::Relaxed),
                index_full: self.xfull.load(Ordering::Relaxed),
                duplicate_hash: self.hfull.load(Ordering::Relaxed),
            },
        }
    }

    /// Solves successive nonces until one yields solutions or `next_nonce`
    /// runs out, returning the first productive nonce's proofs.
    pub fn solve_with_nonces<const N: usize>(
        &mut self,
        input: &[u8],
        mut next_nonce: impl FnMut() -> Option<[u8; N]>,
    ) -> Vec<Vec<u32>> {
        loop {
            let nonce = match next_nonce() {
                Some(nonce) => nonce,
                None => return Vec::new(),
            };
            self.set_input(input, &nonce);
            let result = self.solve();
            if !result.solutions.is_empty() {
                return result.solutions;
            }
        }
    }

    fn worker(&self, id: usize, barrier: &Barrier, blake_base: Blake2bState) {
        let mut logged = (0u32, 0u32, 0u32);
        let mut log_digit = |digit: u32| {
            let x = self.xfull.load(Ordering::Relaxed);
            let b = self.bfull.load(Ordering::Relaxed);
            let h = self.hfull.load(Ordering::Relaxed);
            debug!(
                "digit {digit}: xfull {} bfull {} hfull {}",
                x - logged.0,
                b - logged.1,
                h - logged.2,
            );
            logged = (x, b, h);
        };

        self.digit0(id, &blake_base);
        barrier.wait();
        if id == 0 {
            log_digit(0);
        }
        barrier.wait();
        for r in 1..self.dims.k as usize {
            self.collide_round(r, id);
            barrier.wait();
            if id == 0 {
                log_digit(r as u32);
            }
            barrier.wait();
        }
        self.digit_k(id);
    }

    /// Digit 0: expand BLAKE2b blocks and scatter the hashes into layer 0.
    fn digit0(&self, id: usize, blake_base: &Blake2bState) {
        let d = &self.dims;
        let n_bytes = (d.n / 8) as usize;
        let tail_bytes = d.hash_bytes(0);
        let tail_words = d.hash_words(0);
        let bo = tail_words * 4 - tail_bytes;

        for block in (id..d.nblocks as usize).step_by(self.threads) {
            let hash = blake2b::generate_hash(blake_base, block as u32);
            let bytes = hash.as_bytes();
            for i in 0..d.hashes_per_blake as usize {
                let index = block as u32 * d.hashes_per_blake + i as u32;
                if index >= d.nhashes {
                    break;
                }
                let ph = &bytes[i * n_bytes..(i + 1) * n_bytes];
                let (bucketid, xhash) = leading_digit(ph, d.buck_nibbles);
                let bucketid = bucketid as usize;

                let slot = self.counters.claim(0, bucketid);
                if slot >= d.nslots as u32 {
                    self.bfull.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let slot = slot as usize;

                self.heaps
                    .set_node(0, bucketid, slot, self.codec.leaf(index, xhash));
                // Surviving suffix, right-aligned behind `bo` pad bytes.
                let mut buf = [0u8; MAX_HASH_WORDS * 4];
                buf[bo..bo + tail_bytes].copy_from_slice(&ph[n_bytes - tail_bytes..]);
                for w in 0..tail_words {
                    let word = u32::from_le_bytes(buf[w * 4..w * 4 + 4].try_into().unwrap());
                    self.heaps.set_hash_word(0, bucketid, slot, w, word);
                }
            }
        }
    }

    /// Round r: drain layer r-1, pair slots on the sub-digit of digit r-1,
    /// and write the XORed tails into layer r.
    fn collide_round(&self, r: usize, id: usize) {
        let d = &self.dims;
        let g = d.geometry(r);
        let mut cd = CollisionData::new(self.pair_index);
        let mut h0 = [0u32; MAX_HASH_WORDS];
        let mut h1 = [0u32; MAX_HASH_WORDS];

        for bucketid in (id..d.nbuckets).step_by(self.threads) {
            cd.clear();
            let bsize = self.counters.drain(r - 1, bucketid);
            for s1 in 0..bsize as usize {
                self.heaps.load_hash(r - 1, bucketid, s1, g.prev_units, &mut h1);
                let xh = if d.cached {
                    self.codec.xhash(self.heaps.node(r - 1, bucketid, s1))
                } else {
                    word_nibble(&h1, g.xhash_nibble)
                };
                if !cd.add_slot(s1 as u32, xh) {
                    self.xfull.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                while cd.next_collision() {
                    let s0 = cd.slot() as usize;
                    self.heaps.load_hash(r - 1, bucketid, s0, g.prev_units, &mut h0);
                    // Identical tails would leave no bits to bind deeper
                    // digits and breed degenerate trees.
                    if h0[g.prev_units - 1] == h1[g.prev_units - 1] {
                        self.hfull.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    let (xorbucketid, xorxhash) =
                        xor_digit(&h0, &h1, g.digit_nibble, d.buck_nibbles);
                    let xorbucketid = xorbucketid as usize;
                    let xorslot = self.counters.claim(r, xorbucketid);
                    if xorslot >= d.nslots as u32 {
                        self.bfull.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let xorslot = xorslot as usize;

                    let node = self.codec.encode(TreeNode {
                        bucketid: bucketid as u32,
                        slotid0: s0 as u32,
                        slotid1: s1 as u32,
                        xhash: xorxhash,
                    });
                    self.heaps.set_node(r, xorbucketid, xorslot, node);
                    for i in 0..g.next_units {
                        self.heaps.set_hash_word(
                            r,
                            xorbucketid,
                            xorslot,
                            i,
                            h0[i + g.dunits] ^ h1[i + g.dunits],
                        );
                    }
                }
            }
        }
    }

    /// Final digit: pairs whose whole remainder cancels are candidate trees.
    fn digit_k(&self, id: usize) {
        let d = &self.dims;
        let k = d.k as usize;
        let g = d.geometry(k);
        let mut cd = CollisionData::new(self.pair_index);
        let mut h0 = [0u32; MAX_HASH_WORDS];
        let mut h1 = [0u32; MAX_HASH_WORDS];

        for bucketid in (id..d.nbuckets).step_by(self.threads) {
            cd.clear();
            let bsize = self.counters.drain(k - 1, bucketid);
            for s1 in 0..bsize as usize {
                self.heaps.load_hash(k - 1, bucketid, s1, g.prev_units, &mut h1);
                let xh = if d.cached {
                    self.codec.xhash(self.heaps.node(k - 1, bucketid, s1))
                } else {
                    word_nibble(&h1, g.xhash_nibble)
                };
                if !cd.add_slot(s1 as u32, xh) {
                    continue;
                }
                while cd.next_collision() {
                    let s0 = cd.slot() as usize;
                    self.heaps.load_hash(k - 1, bucketid, s0, g.prev_units, &mut h0);
                    if h0[g.prev_units - 1] == h1[g.prev_units - 1] {
                        self.candidate(bucketid, s0, s1);
                    }
                }
            }
        }
    }

    /// Expands a final-digit pair into leaf indices, rejects duplicates, and
    /// stores the proof in canonical tree order.
    fn candidate(&self, bucketid: usize, s0: usize, s1: usize) {
        let mut indices = vec![0u32; self.dims.proof_size];
        self.list_pair(self.dims.k as usize, bucketid, s0, s1, &mut indices);

        let mut sorted = indices.clone();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[1] <= w[0]) {
            return;
        }

        let soli = self.nsols.fetch_add(1, Ordering::Relaxed) as usize;
        if soli < self.max_sols {
            self.sols.lock().unwrap().push(indices);
        }
    }

    /// Lists the leaves below the pair `(s0, s1)` of `bucketid` on layer
    /// r-1, left half then right half, swapping the halves so the smaller
    /// leading index comes first.
    fn list_pair(&self, r: usize, bucketid: usize, s0: usize, s1: usize, out: &mut [u32]) {
        let half = out.len() / 2;
        let n0 = self.heaps.node(r - 1, bucketid, s0);
        let n1 = self.heaps.node(r - 1, bucketid, s1);
        self.list_indices(r - 1, n0, &mut out[..half]);
        self.list_indices(r - 1, n1, &mut out[half..]);
        // out[half] is the first element of the right half.
        if out[0] > out[half] {
            let (left, right) = out.split_at_mut(half);
            left.swap_with_slice(right);
        }
    }

    fn list_indices(&self, r: usize, node: u32, out: &mut [u32]) {
        if r == 0 {
            out[0] = self.codec.index(node);
            return;
        }
        let t = self.codec.decode(node);
        self.list_pair(
            r,
            t.bucketid as usize,
            t.slotid0 as usize,
            t.slotid1 as usize,
            out,
        );
    }

    /// Bucket-fill histogram of the given layer's undrained counters:
    /// `hist[s]` counts buckets holding s slots, with the last bin collecting
    /// full buckets.
    #[cfg(test)]
    fn fill_histogram(&self, r: usize) -> Vec<u32> {
        let mut hist = vec![0u32; self.dims.nslots + 1];
        for b in 0..self.dims.nbuckets {
            hist[self.counters.peek(r, b) as usize] += 1;
        }
        hist
    }
}
