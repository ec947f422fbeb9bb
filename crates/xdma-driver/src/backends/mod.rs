//! Register bus implementations
//!
//! Three buses available:
//! - **File**: `pread`/`pwrite` on the XDMA user node opened `O_SYNC`
//! - **Mmap**: volatile access through a shared mapping of the same node
//! - **Simulated**: in-process register model of the accelerator, for tests
//!   and dry runs without a card

pub mod file;
pub mod mmap;
pub mod simulated;

pub use file::FileBus;
pub use mmap::MmapBus;
pub use simulated::{SimulatedBus, SimulatedDevice};

use rustix::fs::OFlags;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::{Result, XdmaError};
use crate::window::AccessMode;

/// Open the device node uncached: every write reaches the bus before the
/// call returns, in program order.
pub(crate) fn open_sync(path: &Path, mode: AccessMode) -> Result<File> {
    // O_SYNC bits are small positive values, the cast cannot wrap
    #[allow(clippy::cast_possible_wrap)]
    let sync_flag = OFlags::SYNC.bits() as i32;

    OpenOptions::new()
        .read(true)
        .write(mode.is_writable())
        .custom_flags(sync_flag)
        .open(path)
        .map_err(|e| XdmaError::device_unavailable(path, e))
}
