pub use self::addr::{PageRound, PhysAddr, PhysPageNum, VirtAddr};

/// Bytes per page
pub const PAGE_SIZE: usize = 4096;

/// Bits of offset within a page
pub const PAGE_SHIFT: usize = 12;

pub(crate) mod addr;
pub mod frame;
pub mod heap;
pub mod kernel;
pub mod layout;
pub mod page;
pub(crate) mod page_table;
pub mod spt;
pub mod swap;
pub(crate) mod vm;
pub(crate) mod vm_user;
