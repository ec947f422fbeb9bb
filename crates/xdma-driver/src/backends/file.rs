//! Offset-addressed register access
//!
//! The XDMA user node maps file offsets one-to-one onto AXI-Lite addresses,
//! so a 4-byte `pread`/`pwrite` at the register offset is one bus
//! transaction.

use crate::backend::{BackendType, RegisterBus};
use crate::error::{Result, XdmaError};
use crate::window::AccessMode;
use rustix::io::{pread, pwrite};
use std::fs::File;
use std::path::{Path, PathBuf};

const WORD: usize = std::mem::size_of::<u32>();

/// `pread`/`pwrite` register bus
#[derive(Debug)]
pub struct FileBus {
    file: File,
    path: PathBuf,
}

impl FileBus {
    /// Open the device node with `O_SYNC`
    ///
    /// # Errors
    ///
    /// Returns `XdmaError::DeviceUnavailable` if the node cannot be opened.
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self> {
        let file = super::open_sync(path, mode)?;
        tracing::debug!("Opened {} for offset-addressed access ({mode:?})", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Device node path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegisterBus for FileBus {
    fn read32(&mut self, offset: usize) -> Result<u32> {
        let mut buf = [0u8; WORD];
        let n = pread(&self.file, &mut buf, offset as u64)
            .map_err(|e| XdmaError::io_fault(offset, format!("pread failed: {e}")))?;
        if n != WORD {
            return Err(XdmaError::io_fault(
                offset,
                format!("short read: {n} of {WORD} bytes"),
            ));
        }
        let value = u32::from_ne_bytes(buf);
        tracing::trace!("pread u32 @ {offset:#x} = {value:#x}");
        Ok(value)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        tracing::trace!("pwrite u32 @ {offset:#x} = {value:#x}");
        let n = pwrite(&self.file, &value.to_ne_bytes(), offset as u64)
            .map_err(|e| XdmaError::io_fault(offset, format!("pwrite failed: {e}")))?;
        if n != WORD {
            return Err(XdmaError::io_fault(
                offset,
                format!("short write: {n} of {WORD} bytes"),
            ));
        }
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::FileOffset
    }
}

impl Drop for FileBus {
    fn drop(&mut self) {
        tracing::debug!("Closing {}", self.path.display());
    }
}
