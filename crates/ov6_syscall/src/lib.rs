#![no_std]

use core::{any, fmt, marker::PhantomData, ptr};

use bitflags::bitflags;
use dataview::Pod;
use strum::FromRepr;

mod register;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct OpenFlags: usize {
        const READ_ONLY = 0x000;
        const WRITE_ONLY = 0x001;
        const READ_WRITE = 0x002;
        const CREATE = 0x200;
        const TRUNC = 0x400;
    }
}

#[repr(C)]
#[derive(Pod)]
pub struct Stat {
    /// File system's disk device
    pub dev: i32,
    /// Inode number
    pub ino: u32,
    /// Type of file
    pub ty: i16,
    /// Number of links to file
    pub nlink: i16,
    pub padding: [u8; 4],
    /// Size of file in bytes
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
#[repr(i16)]
pub enum StatType {
    Dir = 1,
    File = 2,
    Dev = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(usize)]
pub enum SyscallCode {
    Fork = 1,
    Exit = 2,
    Wait = 3,
    Pipe = 4,
    Read = 5,
    Kill = 6,
    Exec = 7,
    Fstat = 8,
    Chdir = 9,
    Dup = 10,
    Getpid = 11,
    Sbrk = 12,
    Sleep = 13,
    Uptime = 14,
    Open = 15,
    Write = 16,
    Mknod = 17,
    Unlink = 18,
    Link = 19,
    Mkdir = 20,
    Close = 21,
}

pub trait Syscall {
    const CODE: SyscallCode;
    type Return: RegisterValue;
}

pub type ReturnType<T> = <T as Syscall>::Return;
pub type ReturnTypeRepr<T> = <<T as Syscall>::Return as RegisterValue>::Repr;

#[must_use]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register<T, const N: usize> {
    pub a: [usize; N],
    _phantom: PhantomData<T>,
}

pub trait RegisterValue {
    type Repr;

    fn encode(self) -> Self::Repr;
    fn decode(repr: Self::Repr) -> Self;
}

/// A reference to a user-space object, carried across the syscall ABI.
pub struct UserRef<T>
where
    T: ?Sized + 'static,
{
    addr: usize,
    _phantom: PhantomData<&'static T>,
}

impl<T> fmt::Debug for UserRef<T>
where
    T: ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} as &{}", self.addr, any::type_name::<T>())
    }
}

impl<T> UserRef<T>
where
    T: ?Sized,
{
    /// Creates a new `UserRef` from a reference.
    pub fn new(r: &T) -> Self {
        Self {
            addr: ptr::from_ref(r).addr(),
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr
    }

    #[must_use]
    pub const fn size(&self) -> usize
    where
        T: Sized,
    {
        size_of::<T>()
    }

    #[must_use]
    pub fn as_bytes(&self) -> UserSlice<u8>
    where
        T: Pod + Sized,
    {
        UserSlice {
            addr: self.addr,
            len: size_of::<T>(),
            _phantom: PhantomData,
        }
    }
}

/// A mutable reference to a user-space object, carried across the syscall ABI.
pub struct UserMutRef<T>
where
    T: ?Sized + 'static,
{
    addr: usize,
    _phantom: PhantomData<&'static mut T>,
}

impl<T> fmt::Debug for UserMutRef<T>
where
    T: ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} as &mut {}", self.addr, any::type_name::<T>())
    }
}

impl<T> UserMutRef<T>
where
    T: ?Sized,
{
    /// Creates a new `UserMutRef` from a mutable reference.
    pub fn new(r: &mut T) -> Self {
        Self {
            addr: ptr::from_mut(r).addr(),
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr
    }

    #[must_use]
    pub const fn size(&self) -> usize
    where
        T: Sized,
    {
        size_of::<T>()
    }

    #[must_use]
    pub fn as_bytes_mut(&mut self) -> UserMutSlice<u8>
    where
        T: Pod + Sized,
    {
        UserMutSlice {
            addr: self.addr,
            len: size_of::<T>(),
            _phantom: PhantomData,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct UserSlice<T> {
    addr: usize,
    len: usize,
    _phantom: PhantomData<T>,
}

unsafe impl<T> Pod for UserSlice<T> where T: Pod {}

impl<T> fmt::Debug for UserSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x} as &[{}; {}]",
            self.addr,
            any::type_name::<T>(),
            self.len
        )
    }
}

impl<T> UserSlice<T> {
    #[must_use]
    pub fn new(s: &[T]) -> Self {
        Self {
            addr: s.as_ptr().addr(),
            len: s.len(),
            _phantom: PhantomData,
        }
    }

    /// Creates a `UserSlice` from raw parts.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the provided address and length are valid.
    #[must_use]
    pub const unsafe fn from_raw_parts(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[expect(clippy::len_without_is_empty)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn size(&self) -> Option<usize>
    where
        T: Sized,
    {
        size_of::<T>().checked_mul(self.len)
    }

    #[must_use]
    #[track_caller]
    pub const fn nth(&self, n: usize) -> UserRef<T> {
        assert!(n < self.len());
        UserRef {
            addr: self.addr + n * size_of::<T>(),
            _phantom: PhantomData,
        }
    }

    #[must_use]
    #[track_caller]
    pub const fn skip(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self {
            addr: self.addr + amt * size_of::<T>(),
            len: self.len - amt,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    #[track_caller]
    pub const fn take(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self {
            addr: self.addr,
            len: amt,
            _phantom: PhantomData,
        }
    }
}

#[derive(PartialEq, Eq)]
#[repr(C)]
pub struct UserMutSlice<T> {
    addr: usize,
    len: usize,
    _phantom: PhantomData<T>,
}

unsafe impl<T> Pod for UserMutSlice<T> where T: Pod {}

impl<T> fmt::Debug for UserMutSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x} as &mut [{}; {}]",
            self.addr,
            any::type_name::<T>(),
            self.len
        )
    }
}

impl<T> UserMutSlice<T> {
    #[must_use]
    pub fn new(s: &mut [T]) -> Self {
        Self {
            addr: s.as_mut_ptr().addr(),
            len: s.len(),
            _phantom: PhantomData,
        }
    }

    /// Creates a `UserMutSlice` from raw parts.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the provided address and length are valid.
    #[must_use]
    pub const unsafe fn from_raw_parts(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[expect(clippy::len_without_is_empty)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn size(&self) -> Option<usize>
    where
        T: Sized,
    {
        size_of::<T>().checked_mul(self.len)
    }

    #[must_use]
    #[track_caller]
    pub const fn nth_mut(&mut self, n: usize) -> UserMutRef<T> {
        assert!(n < self.len());
        UserMutRef {
            addr: self.addr + n * size_of::<T>(),
            _phantom: PhantomData,
        }
    }

    #[must_use]
    #[track_caller]
    pub const fn skip_mut(&mut self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self {
            addr: self.addr + amt * size_of::<T>(),
            len: self.len - amt,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    #[track_caller]
    pub const fn take_mut(&mut self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self {
            addr: self.addr,
            len: amt,
            _phantom: PhantomData,
        }
    }
}

pub mod syscall {
    use core::convert::Infallible;

    use ov6_types::{fs::RawFd, process::ProcId};

    use crate::{Syscall, SyscallCode, SyscallError};

    macro_rules! syscall {
        ($name:ident => fn(..) -> $ret:ty) => {
            pub struct $name {}

            impl Syscall for $name {
                type Return = $ret;

                const CODE: SyscallCode = SyscallCode::$name;
            }
        };
    }

    syscall!(Fork => fn(..) -> Result<Option<ProcId>, SyscallError>);
    syscall!(Exit => fn(..) -> Infallible);
    syscall!(Wait => fn(..) -> Result<ProcId, SyscallError>);
    syscall!(Pipe => fn(..) -> Result<(), SyscallError>);
    syscall!(Read => fn(..) -> Result<usize, SyscallError>);
    syscall!(Kill => fn(..) -> Result<(), SyscallError>);
    syscall!(Exec => fn(..) -> Result<Infallible, SyscallError>);
    syscall!(Fstat => fn(..) -> Result<(), SyscallError>);
    syscall!(Chdir => fn(..) -> Result<(), SyscallError>);
    syscall!(Dup => fn(..) -> Result<RawFd, SyscallError>);
    syscall!(Getpid => fn(..) -> ProcId);
    syscall!(Sbrk => fn(..) -> Result<usize, SyscallError>);
    syscall!(Sleep => fn(..) -> ());
    syscall!(Uptime => fn(..) -> u64);
    syscall!(Open => fn(..) -> Result<RawFd, SyscallError>);
    syscall!(Write => fn(..) -> Result<usize, SyscallError>);
    syscall!(Mknod => fn(..) -> Result<(), SyscallError>);
    syscall!(Unlink => fn(..) -> Result<(), SyscallError>);
    syscall!(Link => fn(..) -> Result<(), SyscallError>);
    syscall!(Mkdir => fn(..) -> Result<(), SyscallError>);
    syscall!(Close => fn(..) -> Result<(), SyscallError>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(isize)]
pub enum SyscallError {
    Unknown = -1,
}
