//! Supplemental page table.
//!
//! The SPT is the per-process map from page-aligned virtual address to
//! [`Page`], independent of the hardware page table the platform installs.
//! A page is born [`PageState::Uninit`] and becomes either an `Anon` or a
//! `File` page the first time it is claimed (§4.1); which variant it
//! becomes, and how its bytes are first populated, is recorded at
//! allocation time as a [`PageKind`] plus an optional [`InitFn`] hook.

use alloc::{boxed::Box, collections::BTreeMap, collections::btree_map::Entry, sync::Arc};
use core::{mem, ptr::NonNull};

use crate::{error::KernelError, fs, fs::Inode, proc::Proc, sync::SpinLock};

use super::{
    PAGE_SIZE, PageRound as _, VirtAddr,
    frame::{self, FrameId},
    swap,
    vm_user::UserPageTable,
};

/// Runs once, against the frame's freshly populated bytes, right after a
/// page's Uninit -> {Anon, File} transition.
pub type InitFn = Box<dyn FnOnce(&mut [u8; PAGE_SIZE]) -> Result<(), KernelError> + Send>;

/// Which variant an Uninit page becomes on first fault, and the payload
/// that variant needs to get there.
pub enum PageKind {
    Anon,
    File {
        file: Inode,
        offset: usize,
        read_bytes: usize,
        zero_bytes: usize,
    },
}

enum PageState {
    Uninit {
        kind: PageKind,
        init: Option<InitFn>,
    },
    Anon {
        /// `swap::NO_SLOT` while resident or never yet swapped.
        swap_idx: usize,
    },
    File {
        file: Inode,
        offset: usize,
        read_bytes: usize,
        zero_bytes: usize,
    },
}

/// One page-aligned entry of a process's address space.
pub struct Page {
    va: VirtAddr,
    writable: bool,
    owner: &'static Proc,
    frame: Option<FrameId>,
    state: PageState,
}

pub type PageRef = Arc<SpinLock<Page>>;

impl Page {
    fn new_uninit(
        va: VirtAddr,
        writable: bool,
        owner: &'static Proc,
        kind: PageKind,
        init: Option<InitFn>,
    ) -> Self {
        Self {
            va,
            writable,
            owner,
            frame: None,
            state: PageState::Uninit { kind, init },
        }
    }

    pub fn va(&self) -> VirtAddr {
        self.va
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn owner(&self) -> &'static Proc {
        self.owner
    }

    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    pub(super) fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    /// Binds this page to the frame at `id` and populates its bytes.
    ///
    /// Dispatches on the current state: an Uninit page performs its
    /// first-population transition (§4.1), an Anon page reads back its
    /// swap slot, a File page re-reads its backing bytes.
    pub(super) fn swap_in(&mut self, id: FrameId) -> Result<(), KernelError> {
        let kva = frame::kva(id);
        match mem::replace(
            &mut self.state,
            PageState::Anon {
                swap_idx: swap::NO_SLOT,
            },
        ) {
            PageState::Uninit { kind, init } => {
                match kind {
                    PageKind::Anon => {
                        unsafe { kva.write_bytes(0, PAGE_SIZE) };
                        self.state = PageState::Anon {
                            swap_idx: swap::NO_SLOT,
                        };
                    }
                    PageKind::File {
                        file,
                        offset,
                        read_bytes,
                        zero_bytes,
                    } => {
                        lazy_load(kva, &file, offset, read_bytes, zero_bytes)?;
                        self.state = PageState::File {
                            file,
                            offset,
                            read_bytes,
                            zero_bytes,
                        };
                    }
                }
                if let Some(init) = init {
                    init(unsafe { kva.cast::<[u8; PAGE_SIZE]>().as_mut() })?;
                }
            }
            PageState::Anon { mut swap_idx } => {
                if swap_idx != swap::NO_SLOT {
                    swap::read_slot(swap_idx, unsafe {
                        kva.cast::<[u8; PAGE_SIZE]>().as_mut()
                    });
                    swap::free_slot(swap_idx);
                    swap_idx = swap::NO_SLOT;
                }
                self.state = PageState::Anon { swap_idx };
            }
            PageState::File {
                file,
                offset,
                read_bytes,
                zero_bytes,
            } => {
                lazy_load(kva, &file, offset, read_bytes, zero_bytes)?;
                self.state = PageState::File {
                    file,
                    offset,
                    read_bytes,
                    zero_bytes,
                };
            }
        }
        self.frame = Some(id);
        Ok(())
    }

    /// Writes this page's bytes back to their backing store (swap for
    /// Anon, the file for a dirty File page) and forgets the variant
    /// metadata that made it resident. Does not touch the MMU mapping or
    /// the frame table; the caller does that.
    pub(super) fn swap_out(&mut self, kva: NonNull<u8>, dirty: bool) -> Result<(), KernelError> {
        match &mut self.state {
            PageState::Uninit { .. } => unreachable!("swapping out an unbound Uninit page"),
            PageState::Anon { swap_idx } => {
                let slot = swap::alloc_slot().ok_or(KernelError::SwapFull)?;
                swap::write_slot(slot, unsafe { kva.cast::<[u8; PAGE_SIZE]>().as_ref() });
                *swap_idx = slot;
            }
            PageState::File {
                file,
                offset,
                read_bytes,
                ..
            } => {
                if dirty {
                    write_back(kva, file, *offset, *read_bytes)?;
                }
            }
        }
        Ok(())
    }

    /// Clears the frame binding without touching the backing store;
    /// called by the frame table once it has finished relocating a victim.
    pub(super) fn clear_frame(&mut self) {
        self.frame = None;
    }

    /// Produces the page that should occupy the same address in a forked
    /// child (§4.8): same kind and permissions, but freshly `Uninit` so the
    /// child establishes its own frame on first touch. Anon content the
    /// parent already holds (resident or swapped) is captured into the new
    /// page's initializer so the copy survives independently of whatever
    /// happens to the parent's frame or swap slot afterwards.
    pub(super) fn duplicate_for_fork(&self, owner: &'static Proc) -> Page {
        match &self.state {
            PageState::Uninit { kind, .. } => {
                let kind = match kind {
                    PageKind::Anon => PageKind::Anon,
                    PageKind::File {
                        file,
                        offset,
                        read_bytes,
                        zero_bytes,
                    } => PageKind::File {
                        file: file.clone(),
                        offset: *offset,
                        read_bytes: *read_bytes,
                        zero_bytes: *zero_bytes,
                    },
                };
                Page::new_uninit(self.va, self.writable, owner, kind, None)
            }
            PageState::Anon { swap_idx } => {
                let mut buf = Box::new([0u8; PAGE_SIZE]);
                if let Some(id) = self.frame {
                    let kva = frame::kva(id);
                    unsafe {
                        buf.copy_from_slice(core::slice::from_raw_parts(kva.as_ptr(), PAGE_SIZE));
                    }
                } else if *swap_idx != swap::NO_SLOT {
                    swap::read_slot(*swap_idx, &mut buf);
                }
                let init: InitFn = Box::new(move |dst| {
                    dst.copy_from_slice(&*buf);
                    Ok(())
                });
                Page::new_uninit(self.va, self.writable, owner, PageKind::Anon, Some(init))
            }
            PageState::File {
                file,
                offset,
                read_bytes,
                zero_bytes,
            } => Page::new_uninit(
                self.va,
                self.writable,
                owner,
                PageKind::File {
                    file: file.clone(),
                    offset: *offset,
                    read_bytes: *read_bytes,
                    zero_bytes: *zero_bytes,
                },
                None,
            ),
        }
    }

    /// Tears this page down: unmaps it from the owner's page table if
    /// resident, releases the frame, and releases any swap slot it holds.
    ///
    /// `pt` must be the owner's page table. The caller (always the owner
    /// itself, tearing down its own SPT) passes it directly rather than
    /// borrowing `ProcPrivateData` again, since it typically already holds
    /// it.
    fn destroy(&mut self, pt: &mut UserPageTable) -> Result<(), KernelError> {
        if let Some(id) = self.frame.take() {
            let kva = frame::kva(id);
            if let PageState::File {
                file,
                offset,
                read_bytes,
                ..
            } = &self.state
                && pt.is_dirty(self.va).unwrap_or(true)
            {
                write_back(kva, file, *offset, *read_bytes)?;
            }
            pt.unmap_page(self.va)?;
            frame::remove(id);
        }
        if let PageState::Anon { swap_idx } = &mut self.state
            && *swap_idx != swap::NO_SLOT
        {
            // Open question resolved: release the slot on destroy so the
            // swap bitmap invariant (§8.5) holds even for a page that
            // exits while swapped out.
            swap::free_slot(*swap_idx);
            *swap_idx = swap::NO_SLOT;
        }
        Ok(())
    }
}

/// Reads `read_bytes` from `file` at `offset` into `kva`, zero-fills the
/// trailing `zero_bytes`. A short read fails the claim (§7).
fn lazy_load(
    kva: NonNull<u8>,
    file: &Inode,
    offset: usize,
    read_bytes: usize,
    zero_bytes: usize,
) -> Result<(), KernelError> {
    let buf = unsafe { core::slice::from_raw_parts_mut(kva.as_ptr(), read_bytes) };
    let tx = fs::begin_readonly_tx();
    let mut ip = file.to_tx(&tx);
    let mut lip = ip.lock();
    let n = lip.read_kernel(buf, offset)?;
    lip.unlock();
    ip.put();
    tx.end();
    if n != read_bytes {
        return Err(KernelError::Unknown);
    }
    if zero_bytes > 0 {
        unsafe { kva.byte_add(read_bytes).write_bytes(0, zero_bytes) };
    }
    Ok(())
}

/// Writes `read_bytes` from `kva` back to `file` at `offset`.
fn write_back(kva: NonNull<u8>, file: &Inode, offset: usize, read_bytes: usize) -> Result<(), KernelError> {
    let buf = unsafe { core::slice::from_raw_parts(kva.as_ptr(), read_bytes) };
    let tx = fs::begin_tx();
    let mut ip = file.to_tx(&tx);
    let mut lip = ip.lock();
    let n = lip.write_kernel(buf, offset)?;
    lip.unlock();
    ip.put();
    tx.end();
    if n != read_bytes {
        return Err(KernelError::Unknown);
    }
    Ok(())
}

/// A contiguous run of File pages created by one `do_mmap` call, all
/// sharing the region's reopened file handle.
#[derive(Clone)]
pub struct MmapRegion {
    pub start_va: VirtAddr,
    pub page_count: usize,
    pub file: Inode,
}

/// Per-process map from page-aligned virtual address to [`Page`].
pub struct Spt {
    pages: BTreeMap<usize, PageRef>,
}

impl Spt {
    pub const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn find(&self, va: VirtAddr) -> Option<PageRef> {
        self.pages.get(&va.page_rounddown().addr()).cloned()
    }

    /// Inserts a freshly allocated page. Fails if `va` is already mapped.
    pub fn insert(&mut self, page: Page) -> Result<PageRef, KernelError> {
        assert!(page.va.is_page_aligned());
        let va = page.va;
        let page = Arc::new(SpinLock::new(page));
        match self.pages.entry(va.addr()) {
            Entry::Vacant(e) => {
                e.insert(Arc::clone(&page));
                Ok(page)
            }
            Entry::Occupied(_) => Err(KernelError::AlreadyMapped(va)),
        }
    }

    /// Removes and destroys the page at `va`.
    pub fn remove(&mut self, va: VirtAddr, pt: &mut UserPageTable) -> Result<(), KernelError> {
        let va = va.page_rounddown();
        let page = self
            .pages
            .remove(&va.addr())
            .ok_or(KernelError::NotMapped(va))?;
        page.lock().destroy(pt)
    }

    /// Iterates every page currently tracked, in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (VirtAddr, &PageRef)> {
        self.pages
            .iter()
            .map(|(&addr, page)| (VirtAddr::new(addr).expect("stored address always valid"), page))
    }

    /// `true` if any page in `[start, start + page_count * PGSIZE)` exists.
    pub fn overlaps(&self, start: VirtAddr, page_count: usize) -> bool {
        (0..page_count).any(|i| {
            let va = start.byte_add(i * PAGE_SIZE).unwrap_or(VirtAddr::MAX);
            self.pages.contains_key(&va.addr())
        })
    }

    /// Tears down every page. Used when a process exits.
    pub fn kill(&mut self, pt: &mut UserPageTable) {
        for (_, page) in mem::take(&mut self.pages) {
            let _ = page.lock().destroy(pt);
        }
    }
}

impl Default for Spt {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn alloc_anon(
    va: VirtAddr,
    writable: bool,
    owner: &'static Proc,
    init: Option<InitFn>,
) -> Page {
    Page::new_uninit(va, writable, owner, PageKind::Anon, init)
}

#[expect(clippy::too_many_arguments)]
pub(super) fn alloc_file(
    va: VirtAddr,
    writable: bool,
    owner: &'static Proc,
    file: Inode,
    offset: usize,
    read_bytes: usize,
    zero_bytes: usize,
    init: Option<InitFn>,
) -> Page {
    Page::new_uninit(
        va,
        writable,
        owner,
        PageKind::File {
            file,
            offset,
            read_bytes,
            zero_bytes,
        },
        init,
    )
}
