//! Register bus abstraction
//!
//! A [`RegisterBus`] moves one 32-bit word to or from a register offset.
//! Three buses exist: offset-addressed `pread`/`pwrite` on the XDMA user
//! node, an `mmap` of the same node, and an in-process simulated device.
//! Offset validation happens in [`RegisterWindow`](crate::RegisterWindow)
//! before a bus is called.

use crate::backends::{FileBus, MmapBus};
use crate::error::{Result, XdmaError};
use crate::window::WindowOptions;
use std::fmt::Debug;

/// One 32-bit register transaction at a time
pub trait RegisterBus: Debug + Send {
    /// Read the register at `offset`
    ///
    /// # Errors
    ///
    /// Returns `XdmaError::IoFault` if fewer than 4 bytes were transferred.
    fn read32(&mut self, offset: usize) -> Result<u32>;

    /// Write the register at `offset`, synchronously
    ///
    /// # Errors
    ///
    /// Returns `XdmaError::IoFault` if fewer than 4 bytes were transferred.
    fn write32(&mut self, offset: usize, value: u32) -> Result<()>;

    /// Bus type for diagnostics
    fn backend_type(&self) -> BackendType;
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `pread`/`pwrite` at the register offset
    FileOffset,

    /// Volatile loads and stores through an `mmap` of the node
    Mapped,

    /// In-process register model, no hardware required
    Simulated,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileOffset => write!(f, "file-offset"),
            Self::Mapped => write!(f, "mmap"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// How the window reaches the registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMethod {
    /// Offset-addressed `pread`/`pwrite`
    #[default]
    FileOffset,

    /// Require `mmap`; fail with `MapFailed` if it is unavailable
    Mapped,

    /// Try `mmap`, fall back to offset addressing with a warning
    Auto,
}

/// Open the bus requested by `options`
///
/// `Mapped` never degrades. `Auto` only falls back when the mapping itself
/// fails; an unopenable node is reported as `DeviceUnavailable` either way.
///
/// # Errors
///
/// Returns `DeviceUnavailable` if the node cannot be opened and `MapFailed`
/// if a required mapping cannot be created.
pub fn select_backend(options: &WindowOptions) -> Result<Box<dyn RegisterBus>> {
    match options.access {
        AccessMethod::FileOffset => {
            FileBus::open(&options.path, options.mode).map(|b| Box::new(b) as Box<dyn RegisterBus>)
        }

        AccessMethod::Mapped => MmapBus::open(&options.path, options.mode, options.len)
            .map(|b| Box::new(b) as Box<dyn RegisterBus>),

        AccessMethod::Auto => match MmapBus::open(&options.path, options.mode, options.len) {
            Ok(bus) => Ok(Box::new(bus) as Box<dyn RegisterBus>),
            Err(XdmaError::MapFailed { path, reason }) => {
                tracing::warn!(
                    "mmap of {} unavailable ({reason}), falling back to pread/pwrite",
                    path.display()
                );
                FileBus::open(&options.path, options.mode)
                    .map(|b| Box::new(b) as Box<dyn RegisterBus>)
            }
            Err(e) => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::AccessMode;
    use std::path::PathBuf;

    fn options(path: PathBuf, access: AccessMethod) -> WindowOptions {
        WindowOptions {
            path,
            mode: AccessMode::ReadWrite,
            access,
            len: 0x1000,
        }
    }

    #[test]
    fn missing_node_is_device_unavailable_for_every_method() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xdma9_user");
        for access in [AccessMethod::FileOffset, AccessMethod::Mapped, AccessMethod::Auto] {
            let err = select_backend(&options(path.clone(), access)).unwrap_err();
            assert!(
                matches!(err, XdmaError::DeviceUnavailable { .. }),
                "{access:?}: {err}"
            );
        }
    }

    #[test]
    fn auto_falls_back_when_mapping_is_impossible() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut opts = options(file.path().to_path_buf(), AccessMethod::Mapped);
        opts.len = 0;
        assert!(matches!(
            select_backend(&opts).unwrap_err(),
            XdmaError::MapFailed { .. }
        ));

        opts.access = AccessMethod::Auto;
        let bus = select_backend(&opts).unwrap();
        assert_eq!(bus.backend_type(), BackendType::FileOffset);
    }

    #[test]
    fn backend_type_display() {
        assert_eq!(BackendType::FileOffset.to_string(), "file-offset");
        assert_eq!(BackendType::Mapped.to_string(), "mmap");
        assert_eq!(BackendType::Simulated.to_string(), "simulated");
    }
}
