//! Memory-mapped register access
//!
//! Maps the XDMA user node `MAP_SHARED` and accesses registers with
//! volatile loads and stores. The node is opened `O_SYNC` so the kernel
//! maps the BAR uncached.

use crate::backend::{BackendType, RegisterBus};
use crate::error::{Result, XdmaError};
use crate::window::AccessMode;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::File;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

/// Memory-mapped register bus
///
/// Owns the mapping and the file backing it; both are released on drop.
#[derive(Debug)]
pub struct MmapBus {
    ptr: NonNull<u8>,
    len: usize,
    _file: File,
    path: PathBuf,
}

impl MmapBus {
    /// Map `len` bytes of the device node starting at offset 0
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `DeviceUnavailable` if the node cannot be opened
    /// - `MapFailed` if `len` is zero or the kernel refuses the mapping
    pub fn open(path: &Path, mode: AccessMode, len: usize) -> Result<Self> {
        let file = super::open_sync(path, mode)?;

        if len == 0 {
            return Err(XdmaError::map_failed(path, "window length is 0"));
        }

        let prot = if mode.is_writable() {
            ProtFlags::READ | ProtFlags::WRITE
        } else {
            ProtFlags::READ
        };

        // SAFETY: mmap of a device node we just opened.
        // - fd is valid and kept alive in `_file` for the lifetime of the mapping
        // - len is non-zero (checked above)
        // - MAP_SHARED so stores reach the device instead of a private copy
        // - the mapping is released exactly once, in Drop
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                len,
                prot,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| XdmaError::map_failed(path, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| XdmaError::map_failed(path, "mmap returned a null mapping"))?;

        tracing::info!("Mapped {} ({len:#x} bytes at {ptr:p})", path.display());

        Ok(Self {
            ptr,
            len,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Mapping length in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the mapping is empty (never, once constructed)
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 || offset.checked_add(4).map_or(true, |end| end > self.len) {
            return Err(XdmaError::InvalidOffset {
                offset,
                len: self.len,
            });
        }
        Ok(())
    }
}

impl RegisterBus for MmapBus {
    fn read32(&mut self, offset: usize) -> Result<u32> {
        self.check(offset)?;

        // SAFETY: volatile read from the mapped window.
        // - offset + 4 <= len and offset is 4-byte aligned (checked above)
        // - ptr came from a successful mmap of len bytes
        // - volatile: the hardware changes the value between reads
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("Read u32 @ {offset:#x} = {value:#x}");
        Ok(value)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;

        tracing::trace!("Write u32 @ {offset:#x} = {value:#x}");

        // SAFETY: volatile write into the mapped window.
        // - offset + 4 <= len and offset is 4-byte aligned (checked above)
        // - ptr came from a successful mmap of len bytes with PROT_WRITE
        //   (a read-only window never reaches the bus with a write)
        // - volatile: every store is a bus transaction with side effects
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
        // Keep START after the configuration writes that precede it
        fence(Ordering::SeqCst);

        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Mapped
    }
}

impl Drop for MmapBus {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} ({:#x} bytes)", self.path.display(), self.len);

        // SAFETY: ptr/len are exactly what mmap returned in open(); Drop runs once
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.len) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: MmapBus owns its mapping exclusively; moving it between threads
// does not invalidate the mapping, and every access takes &mut self.
unsafe impl Send for MmapBus {}
