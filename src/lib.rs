//! `regionalloc`: a fixed-region buddy allocator.
//!
//! Given a caller-owned range of addresses, [`BuddyCore`] partitions it once into power-of-two
//! blocks and then serves `allocate`/`deallocate` by splitting blocks down and buddy-merging them
//! back, keeping free-block bookkeeping in four bit-width-bucketed lists ([`block::BucketSet`])
//! rather than one list sized for the worst case.
//!
//! Most callers want [`facade::Allocator`], which wraps the core in typed, pointer-returning
//! methods. [`container::ElementAllocator`] adapts an `Allocator` for use as a container's element
//! allocator (optionally implementing `core::alloc::Allocator` behind the `allocator_api`
//! feature). [`shared_buffer::SharedBufferAllocator`] is an unrelated, simpler best-fit
//! sub-allocator for carving arbitrary-sized ranges out of one shared buffer.
//!
//! This crate does not allocate or map any memory itself — it only does the bookkeeping. The
//! caller supplies the region (a static buffer, a `Vec`'s spare capacity, a memory-mapped range)
//! and is responsible for its lifetime.
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(feature = "allocator_api", feature(allocator_api))]

extern crate alloc;

pub mod arith;
pub mod block;
pub mod buddy;
pub mod container;
pub mod error;
pub mod facade;
pub mod shared_buffer;

pub use buddy::BuddyCore;
pub use container::ElementAllocator;
pub use error::AllocError;
pub use facade::Allocator;
pub use shared_buffer::SharedBufferAllocator;
