//! Compile-time tunables shared across the kernel.

#![no_std]

/// Maximum number of processes.
pub const NPROC: usize = 64;

/// Maximum number of CPUs.
pub const NCPU: usize = 8;

/// Maximum major device number.
pub const NDEV: usize = 10;

/// Open files per process.
pub const NOFILE: usize = 16;

/// Open files per system.
pub const NFILE: usize = 100;

/// Maximum number of active i-nodes held in memory.
pub const NINODE: usize = 50;

/// Device number of the file system root disk.
pub const ROOT_DEV: usize = 1;

/// Maximum length of an exec argument list.
pub const MAX_ARG: usize = 32;

/// Maximum length of a path string.
pub const MAX_PATH: usize = 128;

/// Max # of blocks any single FS transaction writes.
pub const MAX_OP_BLOCKS: usize = 10;

/// Max data blocks in the on-disk log.
pub const LOG_SIZE: usize = MAX_OP_BLOCKS * 3;

/// Size of the disk block cache, in blocks.
pub const NBUF: usize = MAX_OP_BLOCKS * 3;

/// How far below the top of the user address space a stack-growth page
/// fault is still honoured, in bytes.
pub const STACK_LIMIT: usize = 1024 * 1024;
