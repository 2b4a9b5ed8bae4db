//! Typed, pointer-based facade over `BuddyCore`.
//!
//! `BuddyCore` deals entirely in integer offsets; `Allocator` adds the base pointer back in and
//! hands out `NonNull<T>` instead, the way a caller managing a real memory-mapped region wants.
//! The facade itself never logs — diagnostic tracing lives in the core it wraps.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::buddy::BuddyCore;
use crate::error::AllocError;

/// Owns one `BuddyCore` and exposes it through typed pointers rather than raw offsets.
///
/// `T` is a marker for the element type most commonly allocated through this instance; it has no
/// effect beyond `allocate`/`deallocate`'s return/argument types defaulting to `NonNull<T>`.
/// Single-byte or mixed-type regions should use `T = u8` (the default) and cast as needed.
///
/// `Allocator` is `Send` (the region it describes can be handed to another thread) but
/// deliberately not `Sync`: concurrent access to the same region from multiple threads without
/// external synchronization is out of scope (§6).
#[derive(Debug)]
pub struct Allocator<T = u8> {
    core: BuddyCore,
    _marker: PhantomData<*mut T>,
}

// SAFETY: `Allocator` holds no thread-affine state (no raw OS handles, no thread-local data); the
// region it describes is just an address range plus `Vec`-backed bookkeeping, both of which are
// safe to move across threads. `PhantomData<*mut T>` would otherwise suppress the auto-trait.
unsafe impl<T> Send for Allocator<T> {}

impl<T> Allocator<T> {
    /// Manages `[base, base + total_size)`, partitioned into blocks no smaller than
    /// `min_block_size`. `base` is an address, not a pointer — typically
    /// `region.as_ptr() as u64`.
    #[must_use]
    pub fn new(base: u64, total_size: u64, min_block_size: u64) -> Self {
        Self { core: BuddyCore::new(base, total_size, min_block_size), _marker: PhantomData }
    }

    /// As `new`, additionally fixing the alignment used by `allocate_default`.
    #[must_use]
    pub fn with_default_alignment(
        base: u64,
        total_size: u64,
        min_block_size: u64,
        default_alignment: u64,
    ) -> Self {
        Self {
            core: BuddyCore::with_default_alignment(
                base,
                total_size,
                min_block_size,
                Some(default_alignment),
            ),
            _marker: PhantomData,
        }
    }

    /// Manages the region starting at `region.as_ptr()`, of length `region.len()`.
    #[must_use]
    pub fn from_slice(region: &mut [u8], min_block_size: u64) -> Self {
        Self::new(region.as_mut_ptr() as u64, region.len() as u64, min_block_size)
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.core.total_size()
    }

    #[must_use]
    pub fn available_size(&self) -> u64 {
        self.core.available_size()
    }

    #[must_use]
    pub fn base(&self) -> u64 {
        self.core.base()
    }

    /// The smallest region size able to hold a single allocation of `n` bytes (§4.3).
    #[must_use]
    pub fn min_region_for(n: u64) -> u64 {
        BuddyCore::min_region_for(n)
    }

    /// Allocates storage for one `T`, aligned to `align_of::<T>()`.
    pub fn allocate(&mut self) -> Result<NonNull<T>, AllocError> {
        self.allocate_with(core::mem::size_of::<T>() as u64, core::mem::align_of::<T>() as u64)
    }

    /// Allocates `size` bytes aligned to `alignment`, reinterpreted as a `NonNull<T>`. The caller
    /// is responsible for `size`/`alignment` making sense for `T` if the pointer is later
    /// dereferenced as `T`.
    pub fn allocate_with(&mut self, size: u64, alignment: u64) -> Result<NonNull<T>, AllocError> {
        let addr = self.core.allocate(size, alignment)?;
        // SAFETY: `BuddyCore::allocate` only returns addresses within `[base, base+total_size)`,
        // which is non-null by construction (callers never pass `base == 0` for a live region).
        Ok(unsafe { NonNull::new_unchecked(addr as *mut T) })
    }

    /// As `allocate_with`, but returns `Ok(None)` on exhaustion instead of `Err(OutOfMemory)`.
    pub fn allocate_or_none(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<Option<NonNull<T>>, AllocError> {
        match self.core.allocate_or_none(size, alignment)? {
            Some(addr) => Ok(Some(unsafe { NonNull::new_unchecked(addr as *mut T) })),
            None => Ok(None),
        }
    }

    /// Deallocates a pointer previously returned by `allocate`.
    ///
    /// # Safety
    /// `ptr` must have come from `self.allocate()` and must not have already been deallocated.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<T>) {
        self.deallocate_with(
            ptr,
            core::mem::size_of::<T>() as u64,
            core::mem::align_of::<T>() as u64,
        );
    }

    /// Deallocates a pointer previously returned by `allocate_with(size, alignment)`.
    ///
    /// # Safety
    /// `ptr`, `size`, and `alignment` must exactly match a prior `allocate_with` call on this
    /// allocator that has not since been deallocated (§7).
    pub unsafe fn deallocate_with(&mut self, ptr: NonNull<T>, size: u64, alignment: u64) {
        self.core.deallocate(ptr.as_ptr() as u64, size, alignment);
    }
}
