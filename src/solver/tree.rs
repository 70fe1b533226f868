//! Bit-packed tree nodes.
//!
//! A node names its two children as slots of one bucket on the previous
//! layer, packed into a single `u32` as `bucketid | slotid0 | slotid1` with
//! an optional trailing sub-digit. At layer 0 there are no children; the same
//! word re-interprets `(bucketid, slotid0)` as the raw hash index.

use crate::params::{Params, REST_BITS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TreeNode {
    pub(crate) bucketid: u32,
    pub(crate) slotid0: u32,
    pub(crate) slotid1: u32,
    pub(crate) xhash: u32,
}

/// Field widths for one solver instance.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TreeCodec {
    buck_bits: u32,
    slot_bits: u32,
    cached: bool,
}

impl TreeCodec {
    pub(crate) fn new(p: &Params, cached: bool) -> Self {
        TreeCodec {
            buck_bits: p.buck_bits(),
            slot_bits: p.slot_bits(),
            cached,
        }
    }

    /// Total width of the packed node.
    pub(crate) fn node_bits(p: &Params, cached: bool) -> u32 {
        p.buck_bits() + 2 * p.slot_bits() + if cached { REST_BITS } else { 0 }
    }

    fn slot_mask(&self) -> u32 {
        (1 << self.slot_bits) - 1
    }

    pub(crate) fn encode(&self, t: TreeNode) -> u32 {
        debug_assert!(t.bucketid >> self.buck_bits == 0);
        debug_assert!(t.slotid0 >> self.slot_bits == 0);
        debug_assert!(t.slotid1 >> self.slot_bits == 0);
        let w = (((t.bucketid << self.slot_bits) | t.slotid0) << self.slot_bits) | t.slotid1;
        if self.cached {
            debug_assert!(t.xhash >> REST_BITS == 0);
            (w << REST_BITS) | t.xhash
        } else {
            w
        }
    }

    pub(crate) fn decode(&self, mut w: u32) -> TreeNode {
        let xhash = if self.cached {
            let xh = w & ((1 << REST_BITS) - 1);
            w >>= REST_BITS;
            xh
        } else {
            0
        };
        let slotid1 = w & self.slot_mask();
        w >>= self.slot_bits;
        let slotid0 = w & self.slot_mask();
        w >>= self.slot_bits;
        TreeNode {
            bucketid: w,
            slotid0,
            slotid1,
            xhash,
        }
    }

    /// Layer-0 node carrying a raw hash index.
    pub(crate) fn leaf(&self, index: u32, xhash: u32) -> u32 {
        self.encode(TreeNode {
            bucketid: index >> self.slot_bits,
            slotid0: index & self.slot_mask(),
            slotid1: 0,
            xhash,
        })
    }

    /// The hash index of a layer-0 node.
    pub(crate) fn index(&self, w: u32) -> u32 {
        let t = self.decode(w);
        (t.bucketid << self.slot_bits) | t.slotid0
    }

    /// The cached sub-digit of a node.
    pub(crate) fn xhash(&self, w: u32) -> u32 {
        debug_assert!(self.cached);
        w & ((1 << REST_BITS) - 1)
    }
}
