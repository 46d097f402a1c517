// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A fixed-block-size memory pool allocator: a user-space allocator that serves variable-sized
//! allocation requests out of a single pre-reserved contiguous backing region divided into
//! uniformly sized blocks.
//!
//! The pool trades general-purpose flexibility for predictable O(1) average-case allocation, no
//! per-request system calls, cache-friendly locality, and a bounded, inspectable memory footprint.
//! [`Pool`] is the entry point:
//!
//! ```
//! use std::num::NonZero;
//!
//! use blockpool::Pool;
//!
//! let mut pool = Pool::new(NonZero::new(64).unwrap(), NonZero::new(16).unwrap())?;
//! let a = pool.reserve(100)?;
//! pool.free(a)?;
//! # Ok::<(), blockpool::Error>(())
//! ```
//!
//! `Pool` is single-owner and non-concurrent: no operation may be invoked concurrently with
//! another on the same instance, and the type is deliberately neither `Send` nor `Sync`.
//! Reservations are not relocated or compacted, block sizes are fixed for a pool's lifetime, and
//! the allocator makes no alignment promises beyond byte alignment — callers requesting typed
//! storage must choose a block size that accommodates their alignment needs.

mod backing_region;
mod block;
mod error;
mod pool;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use pool::Pool;
