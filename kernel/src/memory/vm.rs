//! Virtual memory core.
//!
//! Ties the supplemental page table ([`super::spt`]), the frame table
//! ([`super::frame`]), and the swap device ([`super::swap`]) together into
//! the operations a process actually calls: claiming a page on fault,
//! growing the stack, mapping and unmapping files, and copying an address
//! space at `fork`.

use crate::{
    error::KernelError,
    file::File,
    fs,
    proc::{Proc, ProcPrivateData},
};

use super::{
    PAGE_SIZE, PageRound as _, PhysAddr, VirtAddr,
    frame,
    layout::{STACK_HEURISTIC, STACK_LIMIT, USER_STACK},
    page_table::PtEntryFlags,
    spt::{self, InitFn, MmapRegion},
    swap,
};

/// Brings up the physical pool and swap device the claim engine draws on.
pub fn vm_init() {
    frame::init();
    swap::init();
}

/// Registers a fresh anonymous page at `va`, left `Uninit` until first
/// touched (§4.1).
pub fn vm_alloc_page(
    owner_private: &mut ProcPrivateData,
    owner: &'static Proc,
    va: VirtAddr,
    writable: bool,
) -> Result<(), KernelError> {
    vm_alloc_page_with_initializer(owner_private, owner, va, writable, None)
}

/// As [`vm_alloc_page`], but `init` (if given) runs once against the
/// page's freshly zeroed bytes the first time it is claimed.
pub fn vm_alloc_page_with_initializer(
    owner_private: &mut ProcPrivateData,
    owner: &'static Proc,
    va: VirtAddr,
    writable: bool,
    init: Option<InitFn>,
) -> Result<(), KernelError> {
    let va = va.page_rounddown();
    let page = spt::alloc_anon(va, writable, owner, init);
    owner_private.spt_mut().insert(page)?;
    Ok(())
}

/// Installs a frame for the SPT entry at `va`, allocating or evicting as
/// needed and running whatever first-population the page's state calls
/// for (§4.3). A no-op if the page is already resident.
pub fn vm_claim_page(
    owner: &'static Proc,
    owner_private: &mut ProcPrivateData,
    va: VirtAddr,
) -> Result<(), KernelError> {
    let va = va.page_rounddown();
    let page_ref = owner_private
        .spt()
        .find(va)
        .ok_or(KernelError::NotMapped(va))?;

    if page_ref.lock().is_resident() {
        return Ok(());
    }

    let mut frame = frame::get_frame(owner, owner_private)?;

    let mut page = page_ref.lock();
    if page.is_resident() {
        // Lost a race with another fault on the same page.
        drop(page);
        frame::free(frame);
        return Ok(());
    }

    frame.bind(page_ref.clone(), owner, va);
    let id = frame::add(frame);
    frame::pin(id);

    let perm = if page.writable() {
        PtEntryFlags::URW
    } else {
        PtEntryFlags::UR
    };
    let kva = frame::kva(id);

    if let Err(e) = owner_private
        .pagetable_mut()
        .map_page(va, PhysAddr::new(kva.addr().get()), perm)
    {
        frame::unpin(id);
        frame::free(frame::remove(id));
        return Err(e);
    }

    if let Err(e) = page.swap_in(id) {
        let _ = owner_private.pagetable_mut().unmap_page(va);
        frame::unpin(id);
        frame::free(frame::remove(id));
        return Err(e);
    }

    frame::unpin(id);
    Ok(())
}

/// Entry point from the trap handler for a page fault taken in user mode
/// (§4.7). `fault_va` is the faulting address (`stval`); `sp` is the
/// trapframe's saved user stack pointer at the moment of the fault.
///
/// An address with no SPT entry is still honoured as stack growth when
/// [`is_stack_growth`] says so; any other unmapped or out-of-range address
/// fails, which the caller turns into process termination.
pub fn vm_try_handle_fault(
    owner: &'static Proc,
    owner_private: &mut ProcPrivateData,
    fault_va: VirtAddr,
    sp: usize,
) -> Result<(), KernelError> {
    let rounded = fault_va.page_rounddown();

    if owner_private.spt().find(rounded).is_none() {
        if !is_stack_growth(fault_va, sp) {
            return Err(KernelError::NotMapped(rounded));
        }
        vm_alloc_page(owner_private, owner, rounded, true)?;
    }

    vm_claim_page(owner, owner_private, rounded)
}

/// Whether an unmapped fault below the stack should be treated as ordinary
/// growth rather than a wild access (§4.7, §8 boundary example).
///
/// Honoured when `fault_va` sits below [`USER_STACK`], within
/// [`STACK_LIMIT`] of it, and no more than [`STACK_HEURISTIC`] bytes below
/// the faulting instruction's own stack pointer: a `push`-like store may
/// touch one word below `sp` before the page backing it has ever been
/// claimed.
fn is_stack_growth(fault_va: VirtAddr, sp: usize) -> bool {
    if fault_va >= USER_STACK {
        return false;
    }
    let fault = fault_va.addr();
    if USER_STACK.addr() - fault > STACK_LIMIT {
        return false;
    }
    fault + STACK_HEURISTIC >= sp
}

/// Maps `length` bytes of `file` starting at `offset` into the caller's
/// address space as demand-paged, file-backed pages (§4.6).
///
/// `length` must be a positive multiple of the page size. The mapping is
/// placed in the gap between the process's contiguous image
/// (text/data/heap) and the stack's guard range; callers that need a
/// specific address are not yet supported. Returns the base address
/// chosen.
pub fn do_mmap(
    owner: &'static Proc,
    owner_private: &mut ProcPrivateData,
    length: usize,
    writable: bool,
    file: &File,
    offset: usize,
) -> Result<VirtAddr, KernelError> {
    if length == 0 || length % PAGE_SIZE != 0 {
        return Err(KernelError::InvalidMmapLength);
    }
    let page_count = length / PAGE_SIZE;
    let inode = file.inode().ok_or(KernelError::Unknown)?.clone();

    let file_size = {
        let tx = fs::begin_readonly_tx();
        let mut ip = inode.to_tx(&tx);
        let mut lip = ip.lock();
        let size = lip.stat().size as usize;
        lip.unlock();
        ip.put();
        tx.end();
        size
    };

    let stack_floor = USER_STACK
        .byte_sub(STACK_LIMIT)
        .unwrap_or(VirtAddr::MIN);

    let mut candidate = owner_private.pagetable().size().page_roundup();
    let start_va = loop {
        let start = VirtAddr::new(candidate)?;
        let end = start.byte_add(length)?;
        if end > stack_floor {
            return Err(KernelError::MmapOverlap);
        }
        if !owner_private.spt().overlaps(start, page_count) {
            break start;
        }
        candidate += PAGE_SIZE;
    };

    for i in 0..page_count {
        let va = start_va.byte_add(i * PAGE_SIZE)?;
        let page_off = offset + i * PAGE_SIZE;
        let read_bytes = file_size.saturating_sub(page_off).min(PAGE_SIZE);
        let zero_bytes = PAGE_SIZE - read_bytes;
        let page = spt::alloc_file(
            va,
            writable,
            owner,
            inode.clone(),
            page_off,
            read_bytes,
            zero_bytes,
            None,
        );
        if let Err(e) = owner_private.spt_mut().insert(page) {
            let (spt, pt) = owner_private.spt_and_pagetable_mut();
            for j in 0..i {
                let va = start_va.byte_add(j * PAGE_SIZE).unwrap();
                let _ = spt.remove(va, pt);
            }
            return Err(e);
        }
    }

    owner_private.mmap_regions_mut().push(MmapRegion {
        start_va,
        page_count,
        file: inode,
    });

    Ok(start_va)
}

/// Tears down the mapping created by the `do_mmap` call that started at
/// `addr`, writing back any dirty file-backed pages as it goes (§4.6).
pub fn do_munmap(owner_private: &mut ProcPrivateData, addr: VirtAddr) -> Result<(), KernelError> {
    let addr = addr.page_rounddown();
    let regions = owner_private.mmap_regions_mut();
    let idx = regions
        .iter()
        .position(|r| r.start_va == addr)
        .ok_or(KernelError::MunmapNotFound(addr))?;
    let region = regions.swap_remove(idx);

    // The region record is already gone, so every one of its pages must be
    // attempted here even if an earlier one fails — otherwise a partial
    // failure leaves the rest of the region resident with nothing left
    // pointing at it, unreachable by any future `do_munmap`.
    let (spt, pt) = owner_private.spt_and_pagetable_mut();
    let mut first_err = None;
    for i in 0..region.page_count {
        let result = region
            .start_va
            .byte_add(i * PAGE_SIZE)
            .and_then(|va| spt.remove(va, pt));
        if let Err(e) = result {
            first_err.get_or_insert(e);
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Duplicates `parent`'s supplemental page table into `child` for `fork`
/// (§4.8). Pages are recreated `Uninit` in the child so the two address
/// spaces never share a frame; any content the parent already has in
/// memory (resident or swapped) is captured at copy time so it survives
/// independently of what happens to the parent's copy afterwards.
pub fn spt_copy(
    parent: &ProcPrivateData,
    child: &mut ProcPrivateData,
    child_owner: &'static Proc,
) -> Result<(), KernelError> {
    for (_va, page_ref) in parent.spt().iter() {
        let page = page_ref.lock().duplicate_for_fork(child_owner);
        if let Err(e) = child.spt_mut().insert(page) {
            // Unwind: drop everything copied in so far for this process.
            let (spt, pt) = child.spt_and_pagetable_mut();
            for (va, _) in parent.spt().iter() {
                let _ = spt.remove(va, pt);
            }
            return Err(e);
        }
    }
    child
        .mmap_regions_mut()
        .extend(parent.mmap_regions().iter().cloned());
    Ok(())
}

/// Tears down every SPT entry and `mmap` region. Called once, from
/// `exit`, before the process's private data is otherwise released (§4.9).
pub fn spt_kill(private: &mut ProcPrivateData) {
    private.mmap_regions_mut().clear();
    let (spt, pt) = private.spt_and_pagetable_mut();
    spt.kill(pt);
}
