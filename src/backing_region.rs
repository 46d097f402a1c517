// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::slice;

/// The single contiguous byte buffer that backs a [`Pool`][crate::pool::Pool], divided into
/// `block_count` slices of `block_size` bytes each.
///
/// Grounded on the allocate/deallocate pair in `Block::new`/`Drop for Block` from the memory
/// crate this is adapted from: one `Layout`-described allocation, held behind a `NonNull<u8>`,
/// released in a single matching `dealloc` call. Unlike that block, which leaves its bytes
/// uninitialized until the caller fills them, this region is always zero-initialized: it is read
/// back wholesale by [`Pool::dump_memory_state`][crate::pool::Pool::dump_memory_state], and doing
/// that through a safe `&[u8]` would be unsound over uninitialized bytes. This is a strictly
/// safer superset of only zeroing in debug builds.
#[derive(Debug)]
pub(crate) struct BackingRegion {
    base: NonNull<u8>,
    size: usize,
    block_size: NonZero<usize>,
}

impl BackingRegion {
    /// `None` covers both an overflowing size and a layout that exceeds `isize::MAX`; both are
    /// reported as construction failure by `try_new`, same as the host allocator refusing.
    fn layout(size: usize) -> Option<Layout> {
        Layout::array::<u8>(size).ok()
    }

    /// Allocates a zeroed region of `block_size.get() * block_count.get()` bytes.
    ///
    /// Returns `None` if the size overflows or the host allocator refuses the request, so
    /// construction failure is reportable to the caller rather than aborting the process (unlike
    /// the teacher's `Block::new`, which treats allocation failure as fatal — appropriate for
    /// tiny per-block allocations, but not for a pool whose whole point is one large up-front
    /// reservation that a caller may reasonably want to retry at a smaller size).
    pub(crate) fn try_new(block_size: NonZero<usize>, block_count: NonZero<usize>) -> Option<Self> {
        let size = block_size.get().checked_mul(block_count.get())?;
        let layout = Self::layout(size)?;

        // SAFETY: layout has non-zero size, since both block_size and block_count are NonZero.
        let data = unsafe { alloc_zeroed(layout) };

        let base = NonNull::new(data)?;

        Some(Self {
            base,
            size,
            block_size,
        })
    }

    pub(crate) const fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    /// Address of the first byte of block `index`.
    pub(crate) fn block_address(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index * self.block_size.get() < self.size);

        // SAFETY: index * block_size < size, which was itself checked to fit an isize-sized
        // allocation in `new`, so this offset stays within the bounds of the same allocation.
        unsafe { self.base.add(index * self.block_size.get()) }
    }

    /// Resolves `address` to a block index, valid only when `address` lies within this region and
    /// is aligned to a block boundary. Returns `None` otherwise, which is how the release engine
    /// tells "not from this pool" apart from a genuine head-block address.
    pub(crate) fn address_to_block_index(&self, address: NonNull<u8>) -> Option<usize> {
        let base = self.base.as_ptr() as usize;
        let address = address.as_ptr() as usize;

        let offset = address.checked_sub(base)?;
        if offset >= self.size {
            return None;
        }
        if offset % self.block_size.get() != 0 {
            return None;
        }

        Some(offset / self.block_size.get())
    }

    /// Zeroes `len` bytes starting at `address`, which must lie within this region.
    pub(crate) fn zero(&mut self, address: NonNull<u8>, len: usize) {
        debug_assert!(self.address_to_block_index(address).is_some());

        // SAFETY: caller-supplied address/len describe a run previously reserved from this
        // region, so the range lies entirely within the single allocation owned by `self`.
        unsafe {
            ptr::write_bytes(address.as_ptr(), 0, len);
        }
    }

    /// A verbatim snapshot of the whole region's bytes.
    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: base/size describe a single initialized allocation owned by self for its
        // entire lifetime (always zero-initialized by `new`, and only ever mutated byte-for-byte
        // afterwards), and `self` outlives the returned slice due to the borrow.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.size) }
    }
}

impl Drop for BackingRegion {
    fn drop(&mut self) {
        // `self.size` already produced a valid `Layout` in `try_new`, so it does here too.
        let Some(layout) = Self::layout(self.size) else {
            unreachable!("size was already validated as a layout by try_new");
        };

        // SAFETY: base/layout match the arguments used in the allocation performed by `new`.
        unsafe {
            dealloc(self.base.as_ptr(), layout);
        }
    }
}
