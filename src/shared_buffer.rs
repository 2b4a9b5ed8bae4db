//! A best-fit, coalescing free-range recycler over a single logical buffer.
//!
//! Unlike `BuddyCore`, `SharedBufferAllocator` has no notion of a fixed region size or of
//! power-of-two blocks: it only tracks which `(offset, size)` ranges are currently free. It does
//! not grow the buffer itself — a caller that wants "allocate, or extend the buffer if nothing
//! free fits" tracks its own high-water mark and falls back to appending past the end when
//! `available_range` comes up empty. This mirrors how the collaborator is used upstream: the
//! allocator answers "is there a free range" and "make this range and that range one", nothing
//! more.

use alloc::vec::Vec;

/// One free range, `[offset, offset + size)`, kept in a list sorted ascending by `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRange {
    pub offset: u64,
    pub size: u64,
}

/// Tracks free ranges over a logical buffer whose total extent is the caller's concern, not
/// this type's.
#[derive(Debug, Default)]
pub struct SharedBufferAllocator {
    free: Vec<FreeRange>,
}

impl SharedBufferAllocator {
    /// An allocator with no free ranges registered yet.
    #[must_use]
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Sum of `size` over every free range.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.free.iter().map(|r| r.size).sum()
    }

    #[must_use]
    pub fn free_ranges(&self) -> &[FreeRange] {
        &self.free
    }

    /// Index of the smallest free range able to hold `size` bytes (a size lower-bound), or
    /// `None` if none fits.
    #[must_use]
    pub fn available_range(&self, size: u64) -> Option<usize> {
        let pos = self.free.partition_point(|r| r.size < size);
        (pos < self.free.len()).then_some(pos)
    }

    /// Removes and returns the free range at `index`.
    pub fn take_range(&mut self, index: usize) -> FreeRange {
        self.free.remove(index)
    }

    /// Consumes `need` bytes from `range` (previously found via `available_range` and removed via
    /// `take_range`), re-registering the `range.size - need` remainder if nonzero. Returns the
    /// offset of the consumed sub-range — always `range.offset`.
    pub fn claim(&mut self, range: FreeRange, need: u64) -> u64 {
        let remainder = range.size - need;
        if remainder > 0 {
            self.add_free_range(range.offset + need, remainder);
        }
        log::trace!("shared_buffer claim(range=({:#x},{:#x}), need={need:#x})", range.offset, range.size);
        range.offset
    }

    /// Registers `[offset, offset + size)` as free, coalescing with an immediately-preceding free
    /// range whose end equals `offset` and/or an immediately-following free range whose start
    /// equals `offset + size`.
    pub fn relinquish(&mut self, offset: u64, size: u64) {
        self.add_free_range(offset, size);
    }

    fn add_free_range(&mut self, mut offset: u64, mut size: u64) {
        let mut previous_adjacent = None;
        let mut next_adjacent = None;
        for (index, r) in self.free.iter().enumerate() {
            if r.offset + r.size == offset {
                previous_adjacent = Some(index);
            } else if offset + size == r.offset {
                next_adjacent = Some(index);
            }
            if previous_adjacent.is_some() && next_adjacent.is_some() {
                break;
            }
        }

        if let Some(index) = previous_adjacent {
            let previous = self.free.remove(index);
            offset = previous.offset;
            size += previous.size;
            if let Some(next_index) = next_adjacent.as_mut() {
                if index < *next_index {
                    *next_index -= 1;
                }
            }
        }
        if let Some(index) = next_adjacent {
            let next = self.free.remove(index);
            size += next.size;
        }

        log::trace!("shared_buffer add_free_range -> ({offset:#x},{size:#x})");
        let pos = self.free.partition_point(|r| r.size < size);
        self.free.insert(pos, FreeRange { offset, size });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mirrors the caller-side "allocate, or grow the buffer" choreography: find a free range,
    /// or fall back to appending past the current high-water mark.
    fn get_allocation(sba: &mut SharedBufferAllocator, buffer_size: &mut u64, size: u64) -> u64 {
        let range = match sba.available_range(size) {
            Some(index) => sba.take_range(index),
            None => {
                let range = FreeRange { offset: *buffer_size, size };
                *buffer_size += size;
                range
            }
        };
        sba.claim(range, size)
    }

    #[test]
    fn sequential_claims_grow_the_buffer() {
        let mut sba = SharedBufferAllocator::new();
        let mut buffer_size = 0u64;

        assert_eq!(get_allocation(&mut sba, &mut buffer_size, 5 * 1024), 0);
        assert_eq!(get_allocation(&mut sba, &mut buffer_size, 15 * 1024), 5 * 1024);
        assert_eq!(get_allocation(&mut sba, &mut buffer_size, 10 * 1024), 20 * 1024);
        assert!(sba.free_ranges().is_empty());
    }

    #[test]
    fn relinquished_middle_range_is_reused_before_growing() {
        let mut sba = SharedBufferAllocator::new();
        let mut buffer_size = 0u64;

        let a0 = get_allocation(&mut sba, &mut buffer_size, 5 * 1024);
        let a1 = get_allocation(&mut sba, &mut buffer_size, 15 * 1024);
        let _a2 = get_allocation(&mut sba, &mut buffer_size, 10 * 1024);

        sba.relinquish(a1, 15 * 1024);

        // Reusing the freed (5K, 15K) range for a 10K claim leaves a (15K, 5K) remainder rather
        // than growing the buffer further.
        let a3 = get_allocation(&mut sba, &mut buffer_size, 10 * 1024);
        assert_eq!(a3, 5 * 1024);
        assert_eq!(sba.free_ranges(), &[FreeRange { offset: 15 * 1024, size: 5 * 1024 }]);

        // Relinquishing the first claim and the just-reused one closes the gap on both sides of
        // the remainder, coalescing everything from 0 into one range.
        sba.relinquish(a0, 5 * 1024);
        sba.relinquish(a3, 10 * 1024);
        assert_eq!(sba.free_ranges(), &[FreeRange { offset: 0, size: 20 * 1024 }]);
    }

    #[test]
    fn relinquish_coalesces_with_both_neighbors() {
        let mut sba = SharedBufferAllocator::new();
        sba.relinquish(0, 100);
        sba.relinquish(200, 100);
        sba.relinquish(100, 100);
        assert_eq!(sba.free_ranges(), &[FreeRange { offset: 0, size: 300 }]);
    }

    #[test]
    fn best_fit_prefers_the_smallest_sufficient_range() {
        let mut sba = SharedBufferAllocator::new();
        sba.relinquish(0, 30);
        sba.relinquish(100, 50);

        let index = sba.available_range(25).unwrap();
        let range = sba.take_range(index);
        assert_eq!(range, FreeRange { offset: 0, size: 30 });
        assert_eq!(sba.claim(range, 25), 0);
        assert_eq!(sba.free_ranges(), &[FreeRange { offset: 25, size: 5 }, FreeRange { offset: 100, size: 50 }]);
    }

    #[test]
    fn available_range_reports_none_when_nothing_fits() {
        let mut sba = SharedBufferAllocator::new();
        sba.relinquish(0, 10);
        assert!(sba.available_range(11).is_none());
    }
}
