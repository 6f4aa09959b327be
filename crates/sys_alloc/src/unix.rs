use std::io::{self, Error};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(any(target_os = "linux", target_os = "android"))]
const MAP_POPULATE: libc::c_int = libc::MAP_POPULATE;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const MAP_POPULATE: libc::c_int = 0;

/// Returns the system page size, cached atomically.
pub fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            #[allow(clippy::cast_sign_loss)]
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
            PAGE_SIZE.store(page_size, Ordering::Relaxed);
            page_size
        }
        page_size => page_size,
    }
}

pub struct RegionInner {
    ptr: NonNull<u8>,
    len: usize,
}

impl RegionInner {
    /// Maps `len` bytes of anonymous, zero-filled, read-write memory.
    ///
    /// `len` must already be a multiple of the page size.
    pub fn map(len: usize, populate: bool) -> io::Result<Self> {
        let populate = if populate { MAP_POPULATE } else { 0 };
        let flags = libc::MAP_PRIVATE | libc::MAP_ANON | populate;
        let prot = libc::PROT_READ | libc::PROT_WRITE;

        // SAFETY: a null hint lets the kernel choose a fresh range, so no
        // existing mapping can be clobbered.
        let ptr = unsafe { libc::mmap(ptr::null_mut(), len, prot, flags, -1, 0) };

        if ptr == libc::MAP_FAILED {
            return Err(Error::last_os_error());
        }

        NonNull::new(ptr.cast::<u8>())
            .map(|ptr| Self { ptr, len })
            .ok_or_else(|| Error::new(io::ErrorKind::Other, "mmap returned null"))
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
        // SAFETY: ptr/len describe exactly the mapping created in `map`.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}
