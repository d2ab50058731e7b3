//! Swap slot allocator and block I/O.
//!
//! Anonymous pages that are evicted from their frame need somewhere to go.
//! This module hands out fixed-size slots over a disk-shaped backing store
//! and moves whole pages in and out of them.
//!
//! There is no real second virtio device to swap to in this kernel, so the
//! backing store is a pool of physical pages obtained from the same
//! allocator as everything else (see [`super::page`]). Slots are still
//! addressed and sized the way a real swap partition would be: in
//! [`SECTOR_SIZE`]-byte sectors, [`SECTORS_PER_PAGE`] of them per page, so
//! the allocator and the read/write API would not need to change if a real
//! block device ever replaced the backing pool.

use alloc::vec::Vec;
use core::ptr::NonNull;

use super::{PAGE_SIZE, page};
use crate::sync::{Once, SpinLock};

/// Sector size of the (simulated) swap device.
pub const SECTOR_SIZE: usize = 512;

/// Sectors that make up a single swapped-out page.
pub const SECTORS_PER_PAGE: usize = PAGE_SIZE / SECTOR_SIZE;

/// Number of page-sized slots the swap device can hold.
///
/// 2048 slots is 8 MiB of swap, plenty for the small programs this kernel
/// runs, without eating too much of the physical pool backing it.
const SWAP_SLOTS: usize = 2048;

/// Sentinel meaning "no slot assigned".
pub const NO_SLOT: usize = usize::MAX;

struct SwapDevice {
    /// One backing physical page per slot. Allocated once at [`init`] and
    /// never freed; the kernel doesn't give swap memory back.
    slots: Vec<NonNull<u8>>,
    /// `true` at index `i` means slot `i` is in use.
    used: Vec<bool>,
}

unsafe impl Send for SwapDevice {}

static SWAP: Once<SpinLock<SwapDevice>> = Once::new();

pub fn init() {
    let mut slots = Vec::with_capacity(SWAP_SLOTS);
    for _ in 0..SWAP_SLOTS {
        let Some(page) = page::alloc_page() else {
            break;
        };
        slots.push(page);
    }
    let used = alloc::vec![false; slots.len()];
    SWAP.init(SpinLock::new(SwapDevice { slots, used }));
}

/// Allocates a free swap slot.
///
/// Returns `None` if the swap device is full.
pub fn alloc_slot() -> Option<usize> {
    let mut dev = SWAP.get().lock();
    let idx = dev.used.iter().position(|&used| !used)?;
    dev.used[idx] = true;
    Some(idx)
}

/// Releases a swap slot back to the free pool.
///
/// The caller must not read from `idx` again until it is reallocated.
pub fn free_slot(idx: usize) {
    let mut dev = SWAP.get().lock();
    assert!(dev.used[idx], "freeing unallocated swap slot {idx}");
    dev.used[idx] = false;
}

/// Writes a full page of data into swap slot `idx`.
pub fn write_slot(idx: usize, data: &[u8; PAGE_SIZE]) {
    let dev = SWAP.get().lock();
    assert!(dev.used[idx], "writing to unallocated swap slot {idx}");
    unsafe {
        dev.slots[idx].copy_from_nonoverlapping(NonNull::from(data).cast(), PAGE_SIZE);
    }
}

/// Reads a full page of data out of swap slot `idx`.
pub fn read_slot(idx: usize, data: &mut [u8; PAGE_SIZE]) {
    let dev = SWAP.get().lock();
    assert!(dev.used[idx], "reading from unallocated swap slot {idx}");
    unsafe {
        NonNull::from(data)
            .cast::<u8>()
            .copy_from_nonoverlapping(dev.slots[idx], PAGE_SIZE);
    }
}
