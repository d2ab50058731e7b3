//! Frame table and clock-based page replacement.
//!
//! A frame is one physical page handed out to a user process through the
//! claim engine in [`super::vm`]. The frame table is the reverse map from
//! physical page to the [`spt::Page`](super::spt::PageInner) that currently
//! owns it, plus the clock hand used to pick a victim when the physical
//! pool runs dry.
//!
//! Frames are added to the table lazily: a freshly allocated or
//! freshly evicted frame is just a `(kva, None)` pair until the claim
//! engine has finished binding it to a page and installing the mapping.
//! Only then does it get a stable slot and a [`FrameId`]. This keeps a
//! frame that fails to bind (e.g. the initializer callback errors out) from
//! ever being visible to the clock sweep.

use alloc::vec::Vec;
use core::ptr::NonNull;

use super::{VirtAddr, page, vm_user::UserPageTable};
use crate::{
    error::KernelError,
    proc::{Proc, ProcPrivateData},
    sync::SpinLock,
};

use super::spt::PageRef;

/// Index into the frame table. Stable for the lifetime of the binding.
pub type FrameId = usize;

/// A physical page on loan to a user process.
pub struct Frame {
    kva: NonNull<u8>,
    /// Set once the claim engine has bound this frame to a page; `None`
    /// between allocation/eviction and binding.
    binding: Option<Binding>,
    /// Set by the claim/evict engine while I/O or mapping changes are in
    /// flight, so the clock sweep skips this frame instead of racing it.
    pinned: bool,
}

struct Binding {
    page: PageRef,
    owner: &'static Proc,
    va: VirtAddr,
}

impl Frame {
    pub fn kva(&self) -> NonNull<u8> {
        self.kva
    }

    /// Binds a freshly claimed frame to the page and address that now own
    /// it. Must be called before [`add`].
    pub fn bind(&mut self, page: PageRef, owner: &'static Proc, va: VirtAddr) {
        assert!(self.binding.is_none(), "frame already bound");
        self.binding = Some(Binding { page, owner, va });
    }
}

struct FrameTable {
    slots: Vec<Option<Frame>>,
    hand: usize,
}

impl FrameTable {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            hand: 0,
        }
    }
}

static TABLE: SpinLock<FrameTable> = SpinLock::new(FrameTable::new());

pub fn init() {
    // The table grows lazily as frames are added; nothing to preallocate.
}

/// Obtains a frame for the claim engine to bind, allocating fresh physical
/// memory when available and evicting a victim frame otherwise.
///
/// `owner`/`owner_private` identify the process on whose behalf the frame
/// is being claimed; if eviction has to inspect or clear a PTE belonging to
/// a *different* process, its private data is obtained from that process
/// directly, since `owner_private` cannot be borrowed twice.
pub fn get_frame(
    owner: &'static Proc,
    owner_private: &mut ProcPrivateData,
) -> Result<Frame, KernelError> {
    if let Some(kva) = page::alloc_page() {
        return Ok(Frame {
            kva,
            binding: None,
            pinned: false,
        });
    }
    evict_frame(owner, owner_private)
}

/// Registers a bound frame in the table and returns its stable id.
///
/// The frame's `pinned` flag is left set to whatever the caller most
/// recently left it at; the claim engine typically pins across mapping
/// install and swap-in, then calls [`unpin`] once the page is usable.
pub fn add(frame: Frame) -> FrameId {
    assert!(frame.binding.is_some(), "adding unbound frame to table");
    let mut table = TABLE.lock();
    if let Some(idx) = table.slots.iter().position(Option::is_none) {
        table.slots[idx] = Some(frame);
        idx
    } else {
        table.slots.push(Some(frame));
        table.slots.len() - 1
    }
}

/// Removes a frame from the table, e.g. when its page is destroyed.
///
/// Repairs the clock hand so it never points past the end of the table.
pub fn remove(id: FrameId) -> Frame {
    let mut table = TABLE.lock();
    let frame = table.slots[id].take().expect("removing empty frame slot");
    if table.hand > id {
        table.hand -= 1;
    }
    frame
}

/// Releases a frame's physical page back to the allocator, regardless of
/// whether it ever finished binding.
///
/// Used by the claim engine to unwind a frame it obtained from
/// [`get_frame`] but failed to finish installing, including one already
/// pulled back out of the table with [`remove`].
pub fn free(frame: Frame) {
    unsafe {
        page::free_page(frame.kva);
    }
}

pub fn pin(id: FrameId) {
    TABLE.lock().slots[id].as_mut().unwrap().pinned = true;
}

pub fn unpin(id: FrameId) {
    TABLE.lock().slots[id].as_mut().unwrap().pinned = false;
}

pub fn kva(id: FrameId) -> NonNull<u8> {
    TABLE.lock().slots[id].as_ref().unwrap().kva
}

/// Runs a closure with exclusive access to the user page table that owns
/// the frame at `id`, whether or not that's the currently running process.
fn with_owner_pagetable<R>(
    owner: &'static Proc,
    requester: &'static Proc,
    requester_private: &mut ProcPrivateData,
    f: impl FnOnce(&mut UserPageTable) -> R,
) -> R {
    if core::ptr::eq(owner, requester) {
        f(requester_private.pagetable_mut())
    } else {
        let mut guard = owner
            .borrow_private()
            .expect("evicting a frame owned by an exited process");
        f(guard.pagetable_mut())
    }
}

fn evict_frame(
    requester: &'static Proc,
    requester_private: &mut ProcPrivateData,
) -> Result<Frame, KernelError> {
    // Two full sweeps: the first clears accessed bits and gives every
    // frame a second chance, the second is guaranteed to find a victim
    // among the now-unset bits unless every frame is pinned.
    for _ in 0..2 {
        let victim = {
            let mut table = TABLE.lock();
            if table.slots.is_empty() {
                return Err(KernelError::NoEvictableFrame);
            }
            let len = table.slots.len();
            let mut found = None;
            for _ in 0..len {
                let idx = table.hand;
                table.hand = (table.hand + 1) % len;

                let Some(frame) = &table.slots[idx] else {
                    continue;
                };
                if frame.pinned {
                    continue;
                }
                let Some(binding) = &frame.binding else {
                    continue;
                };

                let accessed = with_owner_pagetable(
                    binding.owner,
                    requester,
                    requester_private,
                    |pt| pt.is_accessed(binding.va),
                )
                .unwrap_or(false);

                if accessed {
                    let _ = with_owner_pagetable(
                        binding.owner,
                        requester,
                        requester_private,
                        |pt| pt.clear_accessed(binding.va),
                    );
                    continue;
                }

                found = Some(idx);
                break;
            }

            let Some(idx) = found else {
                continue;
            };
            table.slots[idx].take().unwrap()
        };

        let binding = victim.binding.as_ref().unwrap();
        let dirty = with_owner_pagetable(binding.owner, requester, requester_private, |pt| {
            pt.is_dirty(binding.va)
        })
        .unwrap_or(true);

        binding.page.lock().swap_out(victim.kva, dirty)?;

        with_owner_pagetable(binding.owner, requester, requester_private, |pt| {
            pt.unmap_page(binding.va)
        })?;

        let Binding { page, .. } = victim.binding.unwrap();
        page.lock().clear_frame();

        return Ok(Frame {
            kva: victim.kva,
            binding: None,
            pinned: false,
        });
    }

    Err(KernelError::NoEvictableFrame)
}
