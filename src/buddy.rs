//! The buddy core: partitions an arbitrary-sized region into power-of-two blocks once, then
//! serves allocate/deallocate by splitting and buddy-merging those blocks.

use alloc::vec::Vec;

use crate::arith::{align, aligned_size, bits_needed_for, lower2, upper2};
use crate::block::BucketSet;
use crate::error::AllocError;

/// A fixed region `[base, base + total_size)`, managed as a buddy allocator with bit-width
/// bucketed free lists.
///
/// `BuddyCore` owns only bookkeeping: it never reads or writes the memory it describes. The
/// caller is responsible for the region's contents and lifetime outliving the allocator.
#[derive(Debug)]
pub struct BuddyCore {
    base: u64,
    total_size: u64,
    available_size: u64,
    min_block_size: u64,
    default_alignment: Option<u64>,
    buckets: BucketSet,
}

impl BuddyCore {
    /// Partitions `[base, base + total_size)` into power-of-two blocks no smaller than
    /// `min_block_size`.
    ///
    /// Panics if `min_block_size` is not a power of two, or if `total_size < min_block_size` —
    /// both are programmer errors caught eagerly rather than deferred to the first allocation.
    #[must_use]
    pub fn new(base: u64, total_size: u64, min_block_size: u64) -> Self {
        Self::with_default_alignment(base, total_size, min_block_size, None)
    }

    /// As `new`, but `size`-only allocation requests (via `Allocator::allocate_default`, §4.4)
    /// use `default_alignment`.
    #[must_use]
    pub fn with_default_alignment(
        base: u64,
        total_size: u64,
        min_block_size: u64,
        default_alignment: Option<u64>,
    ) -> Self {
        assert!(min_block_size.is_power_of_two(), "min_block_size must be a power of two");
        assert!(total_size >= min_block_size, "total_size must be at least min_block_size");
        if let Some(a) = default_alignment {
            assert!(a.is_power_of_two(), "default_alignment must be a power of two");
        }

        let mut buckets = BucketSet::new();
        let (clipped_total, block_sizes) = peel_into_blocks(total_size, min_block_size);

        log::trace!(
            "buddy core init: base={base:#x} total_size={total_size:#x} clipped_to={clipped_total:#x} \
             min_block_size={min_block_size:#x} blocks={}",
            block_sizes.len()
        );

        let mut offset = 0u64;
        for size in block_sizes {
            buckets.insert(offset, size);
            offset += size;
        }

        Self {
            base,
            total_size: clipped_total,
            available_size: clipped_total,
            min_block_size,
            default_alignment,
            buckets,
        }
    }

    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    #[must_use]
    pub fn available_size(&self) -> u64 {
        self.available_size
    }

    #[must_use]
    pub fn min_block_size(&self) -> u64 {
        self.min_block_size
    }

    #[must_use]
    pub fn default_alignment(&self) -> Option<u64> {
        self.default_alignment
    }

    /// The smallest region size able to hold a single allocation of logical size `n`: since this
    /// is a strict buddy allocator, the largest free block after construction is
    /// `lower2(total_size)`, so a region must be at least `upper2(n)` bytes to serve it.
    #[must_use]
    pub fn min_region_for(n: u64) -> u64 {
        upper2(n)
    }

    /// Direct access to the free-list buckets, for invariant-checking and tests.
    #[must_use]
    pub fn buckets(&self) -> &BucketSet {
        &self.buckets
    }

    /// Validates `alignment` is usable; `0` and non-powers-of-two are rejected.
    fn validate_alignment(alignment: u64) -> Result<(), AllocError> {
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(AllocError::InvalidArgument { reason: "alignment must be a power of two" });
        }
        Ok(())
    }

    /// Allocates `size` bytes aligned to `alignment`, returning the address (not an offset) at
    /// which the allocation starts. `size == 0` is permitted and is charged `min_block_size`.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Result<u64, AllocError> {
        Self::validate_alignment(alignment)?;

        let charge_size = size.max(1);
        let bucket_hint = bits_needed_for(charge_size);

        let Some((off, block_size)) = self.buckets.take_first_fit(self.base, charge_size, alignment)
        else {
            return Err(AllocError::OutOfMemory { requested: size, available: self.available_size });
        };
        let _ = bucket_hint; // bucket dispatch already happened inside take_first_fit

        let consumed = self.split_down(off, block_size, charge_size, alignment);
        self.available_size -= consumed;

        let addr = align(self.base + off, alignment);
        log::trace!(
            "allocate(size={size:#x}, align={alignment:#x}) -> addr={addr:#x} charged={consumed:#x}"
        );
        Ok(addr)
    }

    /// Non-throwing variant of `allocate`: returns `None` instead of `Err(OutOfMemory)`.
    /// Precondition violations (bad alignment) still surface, since those are programmer error
    /// regardless of which variant is called.
    pub fn allocate_or_none(&mut self, size: u64, alignment: u64) -> Result<Option<u64>, AllocError> {
        match self.allocate(size, alignment) {
            Ok(addr) => Ok(Some(addr)),
            Err(AllocError::OutOfMemory { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Splits the block at `off` (size `block_size`) down to the smallest power of two that
    /// still fits `aligned_size(base + off, alignment, size)`, pushing each upper half back onto
    /// the free lists. Returns the charged (consumed) size.
    fn split_down(&mut self, off: u64, mut block_size: u64, size: u64, alignment: u64) -> u64 {
        loop {
            let half = block_size / 2;
            if half < self.min_block_size || aligned_size(self.base + off, alignment, size) > half {
                break;
            }
            let upper_off = off + half;
            self.buckets.insert(upper_off, half);
            log::trace!("split: block at {off:#x} size {block_size:#x} -> halves of {half:#x}");
            block_size = half;
        }
        block_size
    }

    /// Deallocates the block previously returned by `allocate(size, alignment)`. The caller must
    /// pass back exactly the arguments used to allocate — this is not checked and is undefined
    /// behavior if violated (§7).
    pub fn deallocate(&mut self, returned_address: u64, size: u64, alignment: u64) {
        let charge_size = size.max(1);
        let aligned_base = align(self.base, alignment);
        let off = returned_address - aligned_base;
        let delta = aligned_base - self.base;
        let original_size = upper2(charge_size + delta).max(self.min_block_size);

        self.available_size += original_size;
        log::trace!(
            "deallocate(addr={returned_address:#x}, size={size:#x}, align={alignment:#x}) -> \
             block=({off:#x}, {original_size:#x})"
        );
        self.merge(off, original_size);
    }

    /// Repeatedly merges `(off, size)` with its buddy while the buddy is free, then inserts the
    /// resulting block.
    fn merge(&mut self, mut off: u64, mut size: u64) {
        loop {
            let buddy_off = off ^ size;
            if self.buckets.remove_exact(buddy_off, size) {
                log::trace!("merge: ({off:#x},{size:#x}) + buddy ({buddy_off:#x},{size:#x})");
                off = off.min(buddy_off);
                size *= 2;
            } else {
                break;
            }
        }
        self.buckets.insert(off, size);
    }
}

/// Decomposes `total_size` into strictly decreasing powers of two, each `>= min_block_size`,
/// peeling `lower2(remaining)` at a time until the remainder falls below `min_block_size` (which
/// is then clipped, cumulatively, from the reported total). Returns `(clipped_total_size,
/// block_sizes_largest_first)`.
fn peel_into_blocks(total_size: u64, min_block_size: u64) -> (u64, Vec<u64>) {
    let mut remaining = total_size;
    let mut sizes = Vec::new();
    while remaining >= min_block_size {
        let p = lower2(remaining);
        sizes.push(p);
        remaining -= p;
    }
    let clipped_total = total_size - remaining;

    // Blocks are peeled largest-first; addresses are assigned smallest-first (ascending by
    // size), so the smallest blocks land at the low end of the region. This is what makes the
    // final per-bucket ordering come out ascending by size without an extra sort pass later.
    sizes.sort_unstable();
    (clipped_total, sizes)
}
