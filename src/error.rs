// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;

/// Any error that may arise from constructing or operating a [`Pool`][crate::Pool].
///
/// Grounded on `oxidizer_io::Error`: a `thiserror`-derived, `#[non_exhaustive]` enum with one
/// variant per caller-visible failure mode, so new variants can be added without a breaking
/// change.
///
/// Invalid-free and double-free are programmer bugs per the allocator's contract (the address
/// must have been returned by this exact pool's `reserve` and not yet freed). In debug builds
/// they additionally trip a `debug_assert!` so misuse is caught at the call site during
/// development; release builds skip the assertion and return the typed variant below instead of
/// invoking undefined behavior.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The backing allocation for a new pool could not be obtained.
    #[error("failed to allocate a backing region of {requested_bytes} bytes")]
    Construction {
        /// `block_size * block_count` bytes that construction attempted to allocate.
        requested_bytes: usize,
    },

    /// No contiguous free run large enough to satisfy the request exists in the pool.
    #[error("no contiguous free run of {requested_bytes} bytes was found")]
    OutOfRoom {
        /// The byte count that was requested and could not be satisfied.
        requested_bytes: usize,
    },

    /// The requested size exceeds the pool's total capacity and could never be satisfied.
    #[error(
        "requested {requested_bytes} bytes exceeds the pool's total capacity of {total_capacity} bytes"
    )]
    Oversize {
        /// The byte count that was requested.
        requested_bytes: usize,
        /// `block_size * block_count` for the pool that rejected the request.
        total_capacity: usize,
    },

    /// The address passed to `free` was not the head of a block reserved by this pool.
    #[error("address {address:p} is not a block head reserved by this pool")]
    InvalidAddress {
        /// The offending address.
        address: NonNull<u8>,
    },

    /// The address passed to `free` names a block that is already free.
    #[error("address {address:p} was already freed")]
    DoubleFree {
        /// The offending address.
        address: NonNull<u8>,
    },
}

// SAFETY: `Error` only ever carries `NonNull<u8>` values that round-trip through `Pool`'s own
// single-owner API; it never dereferences them, only prints/compares the numeric address, so it
// carries no more of a thread-safety liability than the `usize` it is equivalent to.
unsafe impl Send for Error {}
// SAFETY: see above.
unsafe impl Sync for Error {}

/// A specialized [`Result`][std::result::Result] for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
