//! A borrowing, `Copy`able handle onto an `Allocator`, sized for passing into container types the
//! way a C++ STL allocator would be passed as a template parameter.

use core::ptr::NonNull;

use crate::error::AllocError;
use crate::facade::Allocator;

/// A cheap, `Copy` handle that borrows an `Allocator<T>` for the duration of `'a`.
///
/// Where `Allocator` owns the region and is moved around as a whole, `ElementAllocator` is what
/// gets threaded into a container: it compares equal to any other handle over the same
/// `Allocator`, and (with the `allocator_api` feature) implements `core::alloc::Allocator`.
#[derive(Debug)]
pub struct ElementAllocator<'a, T> {
    inner: &'a core::cell::UnsafeCell<Allocator<T>>,
}

impl<'a, T> Clone for ElementAllocator<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'a, T> Copy for ElementAllocator<'a, T> {}

impl<'a, T> PartialEq for ElementAllocator<'a, T> {
    /// Two handles are equal exactly when they borrow the same underlying `Allocator` — matching
    /// the STL allocator contract that same-typed allocators over the same arena are
    /// interchangeable.
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.inner, other.inner)
    }
}
impl<'a, T> Eq for ElementAllocator<'a, T> {}

impl<'a, T> ElementAllocator<'a, T> {
    /// Wraps `allocator` for use as a container's element allocator.
    ///
    /// The `UnsafeCell` here plays the role of interior mutability a container allocator needs:
    /// `alloc_n`/`dealloc_n` take `&self`, matching `core::alloc::Allocator`'s signature, while
    /// the wrapped `Allocator` itself requires `&mut self` to mutate its free lists.
    #[must_use]
    pub fn new(allocator: &'a core::cell::UnsafeCell<Allocator<T>>) -> Self {
        Self { inner: allocator }
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut Allocator<T>) -> R) -> R {
        // SAFETY: `ElementAllocator` is not `Sync` (it holds a `&UnsafeCell`, which isn't `Sync`
        // unless `T: Sync`, and regardless this type does nothing to serialize access), so no
        // other thread can be concurrently calling through a clone of this handle; `&self`
        // methods never re-enter each other, so this is the only live borrow.
        f(unsafe { &mut *self.inner.get() })
    }

    /// Allocates storage for `n` contiguous `T`s.
    pub fn alloc_n(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let size = core::mem::size_of::<T>() as u64 * n as u64;
        let align = core::mem::align_of::<T>() as u64;
        self.with_mut(|a| a.allocate_with(size, align))
    }

    /// Deallocates storage previously returned by `alloc_n(n)` on this same handle.
    ///
    /// # Safety
    /// `ptr` must have come from `self.alloc_n(n)` (same `n`) and must not have already been
    /// deallocated.
    pub unsafe fn dealloc_n(&self, ptr: NonNull<T>, n: usize) {
        let size = core::mem::size_of::<T>() as u64 * n as u64;
        let align = core::mem::align_of::<T>() as u64;
        self.with_mut(|a| a.deallocate_with(ptr, size, align));
    }
}

#[cfg(feature = "allocator_api")]
mod allocator_api_impl {
    use super::ElementAllocator;
    use core::alloc::{AllocError as CoreAllocError, Allocator as CoreAllocator, Layout};
    use core::ptr::NonNull;

    // SAFETY: `alloc_n`/`dealloc_n` are backed by the same buddy core for the lifetime of `'a`,
    // and a `Layout`'s `(size, align)` pair round-trips exactly through `allocate_with`/
    // `deallocate_with` the way `core::alloc::Allocator` requires.
    unsafe impl<'a, T> CoreAllocator for ElementAllocator<'a, T> {
        fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, CoreAllocError> {
            let addr = self
                .with_mut(|a| a.allocate_with(layout.size() as u64, layout.align() as u64))
                .map_err(|_| CoreAllocError)?;
            let ptr = NonNull::slice_from_raw_parts(addr.cast::<u8>(), layout.size());
            Ok(ptr)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            self.with_mut(|a| {
                a.deallocate_with(ptr.cast::<T>(), layout.size() as u64, layout.align() as u64);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::UnsafeCell;

    #[test]
    fn equality_is_identity_of_the_borrowed_allocator() {
        let region_a = UnsafeCell::new(Allocator::<u8>::new(0x1000, 4096, 64));
        let region_b = UnsafeCell::new(Allocator::<u8>::new(0x2000, 4096, 64));

        let a1 = ElementAllocator::new(&region_a);
        let a2 = ElementAllocator::new(&region_a);
        let b1 = ElementAllocator::new(&region_b);

        assert_eq!(a1, a2);
        assert_ne!(a1, b1);
    }

    #[test]
    fn alloc_n_and_dealloc_n_roundtrip() {
        let region = UnsafeCell::new(Allocator::<u32>::new(0x10_0000, 4096, 64));
        let handle = ElementAllocator::new(&region);

        let p = handle.alloc_n(4).unwrap();
        unsafe { handle.dealloc_n(p, 4) };

        let available = unsafe { (*region.get()).available_size() };
        let total = unsafe { (*region.get()).total_size() };
        assert_eq!(available, total);
    }
}
