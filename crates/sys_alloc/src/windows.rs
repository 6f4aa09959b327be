use std::io::{self, Error};
use std::mem;
use std::ptr::{self, NonNull};

use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

pub fn page_size() -> usize {
    unsafe {
        let mut info: SYSTEM_INFO = mem::zeroed();
        GetSystemInfo(&mut info);
        let size = info.dwPageSize as usize;
        if size == 0 {
            4096
        } else {
            size
        }
    }
}

pub struct RegionInner {
    ptr: NonNull<u8>,
    len: usize,
}

impl RegionInner {
    /// Reserves and commits `len` bytes. Committed pages are zero-filled.
    pub fn map(len: usize, _populate: bool) -> io::Result<Self> {
        // SAFETY: a null base address lets the system choose the range.
        let ptr = unsafe {
            VirtualAlloc(
                ptr::null(),
                len,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };

        NonNull::new(ptr.cast::<u8>())
            .map(|ptr| Self { ptr, len })
            .ok_or_else(Error::last_os_error)
    }

    pub const fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub const fn len(&self) -> usize {
        self.len
    }
}

impl Drop for RegionInner {
    fn drop(&mut self) {
        // SAFETY: ptr is the base returned by VirtualAlloc; MEM_RELEASE
        // requires a zero size.
        unsafe {
            VirtualFree(self.ptr.as_ptr().cast(), 0, MEM_RELEASE);
        }
    }
}
