// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Write as _;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::backing_region::BackingRegion;
use crate::block::Block;
use crate::error::Error;

/// A fixed-block-size memory pool: one pre-reserved backing region divided into uniform blocks,
/// serving variable-sized reservations via a first-fit search with a rotating cursor.
///
/// `Pool` is a single-owner, non-concurrent abstraction (see the crate docs); it deliberately does
/// not implement `Send`/`Sync` — `Block::data` is a raw pointer into the pool's own backing
/// region, and moving the `Pool` value itself never invalidates that pointer, since the region
/// lives behind a stable heap allocation the `Pool` only ever holds a handle to.
#[derive(Debug)]
pub struct Pool {
    backing: BackingRegion,
    blocks: Box<[Block]>,
    block_size: NonZero<usize>,
    cursor: usize,
    bytes_in_use: usize,
}

impl Pool {
    /// Allocates a backing region of `block_size.get() * block_count.get()` bytes and an index of
    /// `block_count.get()` blocks, all initially free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if the backing allocation cannot be obtained (either the
    /// requested size overflows what the host allocator can describe, or the allocator itself
    /// refuses the request).
    pub fn new(block_size: NonZero<usize>, block_count: NonZero<usize>) -> Result<Self, Error> {
        let Some(backing) = BackingRegion::try_new(block_size, block_count) else {
            return Err(Error::Construction {
                requested_bytes: block_size.get().saturating_mul(block_count.get()),
            });
        };

        let blocks = (0..block_count.get())
            .map(|index| Block::new(backing.block_address(index), index))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        tracing::debug!(
            block_size = block_size.get(),
            block_count = block_count.get(),
            "pool constructed"
        );

        Ok(Self {
            backing,
            blocks,
            block_size,
            cursor: 0,
            bytes_in_use: 0,
        })
    }

    /// Total bytes owned by the backing region (`block_size * block_count`).
    pub fn total_capacity(&self) -> usize {
        self.backing.size()
    }

    /// Number of blocks in the index.
    pub fn total_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of `used_size` over the head blocks of all currently outstanding reservations.
    pub const fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// `ceil(n_bytes / block_size)` — how many consecutive blocks a reservation of `n_bytes` would
    /// occupy, without actually reserving anything.
    pub fn blocks_needed(&self, n_bytes: usize) -> usize {
        n_bytes.div_ceil(self.block_size.get())
    }

    /// Reserves a contiguous run of blocks covering at least `n_bytes`, returning the address of
    /// the run's first byte.
    ///
    /// Searches the block index starting at the cursor, wrapping at most once, skipping occupied
    /// runs in a single step and probing free runs for enough accumulated capacity. On success the
    /// cursor is left just past the newly reserved run, biasing future searches away from it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Oversize`] if `n_bytes` exceeds [`Pool::total_capacity`], or
    /// [`Error::OutOfRoom`] if no contiguous free run large enough exists. Either way the pool's
    /// state — including the cursor — is left unchanged.
    #[cfg_attr(test, mutants::skip)] // Mutating the budget counter can cause infinite loops.
    pub fn reserve(&mut self, n_bytes: usize) -> Result<NonNull<u8>, Error> {
        debug_assert!(n_bytes >= 1, "reserve requires a non-zero byte count");

        let total_capacity = self.total_capacity();
        if n_bytes > total_capacity {
            tracing::warn!(n_bytes, total_capacity, "reservation exceeds total capacity");
            return Err(Error::Oversize {
                requested_bytes: n_bytes,
                total_capacity,
            });
        }

        let block_size = self.block_size.get();
        let block_count = self.blocks.len();

        let mut pos = Some(self.cursor);
        let mut examined = 0usize;
        let mut head = None;

        while examined < block_count {
            let cur = pos.unwrap_or(0);
            examined += 1;

            let used = self.blocks[cur].used_size();
            if used > 0 {
                let skip = used.div_ceil(block_size);
                let dst_from_last = block_count - 1 - cur;
                if dst_from_last < skip {
                    // The skip would run past the end of the index; wrap instead of stepping out
                    // of bounds.
                    examined += dst_from_last;
                    pos = Some(0);
                } else {
                    examined += skip - 1;
                    pos = Some(cur + skip);
                }
                continue;
            }

            let mut available = block_size;
            let mut next = (cur + 1 < block_count).then_some(cur + 1);
            while available < n_bytes {
                match next {
                    Some(candidate) if self.blocks[candidate].is_free() => {
                        available += block_size;
                        examined += 1;
                        next = (candidate + 1 < block_count).then_some(candidate + 1);
                    }
                    _ => break,
                }
            }

            if available >= n_bytes {
                head = Some(cur);
                break;
            }

            match next {
                None => {
                    pos = None;
                }
                Some(terminator) => {
                    examined += 1;
                    pos = (terminator + 1 < block_count).then_some(terminator + 1);
                }
            }
        }

        let Some(head) = head else {
            tracing::warn!(n_bytes, "no contiguous free run found");
            return Err(Error::OutOfRoom {
                requested_bytes: n_bytes,
            });
        };

        let address = self.blocks[head].data();
        self.bytes_in_use += n_bytes;

        let mut remaining = n_bytes;
        let mut idx = head;
        while remaining > 0 {
            self.blocks[idx].mark_used(remaining);
            remaining = remaining.saturating_sub(block_size);
            idx += 1;
        }
        let run_length = idx - head;
        self.cursor = if idx >= block_count { 0 } else { idx };

        tracing::trace!(?address, run_length, "reserved run");
        Ok(address)
    }

    /// Frees the run whose head block's address is `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `address` is not the head of a block belonging to this
    /// pool, or [`Error::DoubleFree`] if the block it names is already free. Both conditions first
    /// trip a `debug_assert!` in debug builds (this is a programmer bug per the pool's contract —
    /// the address must have come from this pool's own `reserve` and not yet been freed); release
    /// builds skip the assertion and return the typed error instead.
    pub fn free(&mut self, address: NonNull<u8>) -> Result<(), Error> {
        let index = self.backing.address_to_block_index(address);
        debug_assert!(
            index.is_some(),
            "address {address:p} is not a block head reserved by this pool"
        );
        let Some(index) = index else {
            return Err(Error::InvalidAddress { address });
        };

        let used_size = self.blocks[index].used_size();
        debug_assert_ne!(used_size, 0, "address {address:p} was already freed");
        if used_size == 0 {
            return Err(Error::DoubleFree { address });
        }

        self.bytes_in_use -= used_size;

        let run_length = used_size.div_ceil(self.block_size.get());
        for block in &mut self.blocks[index..index + run_length] {
            block.mark_free();
        }

        if cfg!(debug_assertions) {
            self.backing.zero(address, run_length * self.block_size.get());
        }

        tracing::trace!(?address, run_length, "freed run");
        Ok(())
    }

    /// Frees every block, resets the cursor to 0 and `bytes_in_use` to 0. All addresses previously
    /// returned by `reserve` become invalid.
    pub fn clear(&mut self) {
        for block in &mut self.blocks {
            block.mark_free();
        }
        self.cursor = 0;
        self.bytes_in_use = 0;

        tracing::debug!("pool cleared");
    }

    /// A per-block occupancy table: rows of ten blocks, one `Block:  NNNN | ` line followed by the
    /// matching `Memory: NNNN | ` line of `used_size` values, then a blank line. Byte-for-byte
    /// compatible with the dump format of the system this pool's algorithm is adapted from.
    pub fn dump_pool_state(&self) -> String {
        let mut out = String::new();
        for chunk in self.blocks.chunks(10) {
            for block in chunk {
                let _ = write!(out, "Block:  {:04} | ", block.index());
            }
            out.push('\n');
            for block in chunk {
                let _ = write!(out, "Memory: {:04} | ", block.used_size());
            }
            out.push_str("\n\n");
        }
        out
    }

    /// A verbatim snapshot of the backing region's bytes.
    pub fn dump_memory_state(&self) -> Vec<u8> {
        self.backing.as_slice().to_vec()
    }
}
