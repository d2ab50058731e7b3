use ov6_types::process::ProcId;

use crate::{fs::InodeNo, memory::VirtAddr};

/// Errors that can occur anywhere inside the kernel.
///
/// This is the single error currency used across process management,
/// memory management, and the file system. Syscall handlers collapse it
/// down to [`ov6_syscall::SyscallError`] before it crosses the user
/// boundary, so variants only need to be precise enough for kernel-side
/// logging and control flow.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("unknown error")]
    Unknown,

    #[error("no free page")]
    NoFreePage,

    #[error("no free process slot")]
    NoFreeProc,

    #[error("process has no children")]
    NoChildProcess,

    #[error("process {0} not found")]
    ProcessNotFound(ProcId),

    #[error("virtual address {0:#x} too large")]
    TooLargeVirtualAddress(usize),

    #[error("virtual address underflow")]
    VirtualAddressUnderflow,

    #[error("address {0:?} not mapped")]
    AddressNotMapped(VirtAddr),

    #[error("address {0:?} inaccessible with requested permission")]
    InaccessibleMemory(VirtAddr),

    #[error("no free file descriptor table entry")]
    NoFreeFileDescriptorTableEntry,

    #[error("file descriptor not found")]
    FileDescriptorNotFound,

    #[error("file descriptor not open for reading")]
    FileDescriptorNotReadable,

    #[error("file descriptor not open for writing")]
    FileDescriptorNotWritable,

    #[error("too many open files in the system")]
    TooManyOpenFilesSystem,

    #[error("inode {0:?} has corrupted type {1}")]
    CorruptedInodeType(InodeNo, i16),

    #[error("path too long")]
    PathTooLong,

    #[error("cannot chdir into non-directory")]
    ChdirNotDir,

    #[error("cannot open directory for writing")]
    OpenDirAsWritable,

    #[error("invalid executable")]
    InvalidExecutable,

    #[error("argument list too large")]
    ArgumentListTooLarge,

    #[error("argument list too long")]
    ArgumentListTooLong,

    #[error("swap device is full")]
    SwapFull,

    #[error("no frame available for eviction")]
    NoEvictableFrame,

    #[error("address {0:?} is not backed by the supplemental page table")]
    NotMapped(VirtAddr),

    #[error("address {0:?} already has a supplemental page table entry")]
    AlreadyMapped(VirtAddr),

    #[error("mmap request overlaps an existing mapping")]
    MmapOverlap,

    #[error("mmap length must be a positive multiple of the page size")]
    InvalidMmapLength,

    #[error("no mapping to unmap at address {0:?}")]
    MunmapNotFound(VirtAddr),
}

impl From<KernelError> for ov6_syscall::SyscallError {
    fn from(_error: KernelError) -> Self {
        // The syscall ABI only distinguishes success from failure; all
        // kernel errors collapse to a single errno-like value at the
        // user/kernel boundary.
        Self::Unknown
    }
}
