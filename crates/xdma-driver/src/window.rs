//! Register window
//!
//! Exclusive, bounds-checked access to the accelerator's 32-bit registers.
//! The window validates every offset before it reaches a bus, turns a
//! failed transaction into a terminal fault, and releases the device on
//! `close()` or drop, whichever comes first.

use crate::backend::{select_backend, AccessMethod, BackendType, RegisterBus};
use crate::error::{Result, XdmaError};
use std::path::{Path, PathBuf};
use xdma_chip::bar::{DEFAULT_USER_NODE, WINDOW_SIZE};
use xdma_chip::regs::REGISTER_BYTES;

/// Pattern written by [`RegisterWindow::loopback_test`], OR-ed with the
/// register index.
pub const LOOPBACK_PATTERN: u32 = 0xA5A5_0000;

/// Read/write permission on the device node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Observation only; writes are refused before reaching the bus
    ReadOnly,
    /// Full control
    #[default]
    ReadWrite,
}

impl AccessMode {
    /// True if writes are permitted
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Options for opening a register window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    /// Device node, e.g. `/dev/xdma0_user`
    pub path: PathBuf,
    /// Read/write permission
    pub mode: AccessMode,
    /// Offset-addressed or mapped access
    pub access: AccessMethod,
    /// Window length in bytes
    pub len: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_USER_NODE),
            mode: AccessMode::ReadWrite,
            access: AccessMethod::FileOffset,
            len: WINDOW_SIZE,
        }
    }
}

impl WindowOptions {
    /// Default options for the node at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// One register of a loopback self-test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackResult {
    /// Register offset
    pub offset: usize,
    /// Value written
    pub wrote: u32,
    /// Value read back
    pub read: u32,
}

impl LoopbackResult {
    /// True if the register held the written value
    #[must_use]
    pub const fn matches(&self) -> bool {
        self.wrote == self.read
    }
}

/// Exclusive access to a fixed block of 32-bit registers
#[derive(Debug)]
pub struct RegisterWindow {
    bus: Option<Box<dyn RegisterBus>>,
    label: String,
    len: usize,
    mode: AccessMode,
    faulted: bool,
}

impl RegisterWindow {
    /// Open the device node described by `options`
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the node cannot be opened, or
    /// `MapFailed` if `AccessMethod::Mapped` was requested and the mapping
    /// failed.
    pub fn open(options: &WindowOptions) -> Result<Self> {
        let bus = select_backend(options)?;
        tracing::info!(
            "Opened register window {} ({:#x} bytes, {}, {:?})",
            options.path.display(),
            options.len,
            bus.backend_type(),
            options.mode
        );
        Ok(Self::from_bus(
            bus,
            options.len,
            options.mode,
            options.path.display().to_string(),
        ))
    }

    /// Open `path` read-write with offset addressing
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the node cannot be opened.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&WindowOptions::new(path.as_ref()))
    }

    /// Wrap an already-open bus
    pub fn from_bus(
        bus: Box<dyn RegisterBus>,
        len: usize,
        mode: AccessMode,
        label: impl Into<String>,
    ) -> Self {
        Self {
            bus: Some(bus),
            label: label.into(),
            len,
            mode,
            faulted: false,
        }
    }

    /// Read the register at `offset`
    ///
    /// # Errors
    ///
    /// - `InvalidOffset` if `offset` is unaligned or outside the window
    /// - `InvalidState` if the window is closed or has faulted
    /// - `IoFault` if the transaction did not complete; the window is
    ///   unusable afterwards
    pub fn read32(&mut self, offset: usize) -> Result<u32> {
        self.check_offset(offset)?;
        let bus = self.usable_bus("read register")?;
        let result = bus.read32(offset);
        self.record(result)
    }

    /// Write the register at `offset`
    ///
    /// # Errors
    ///
    /// As [`read32`](Self::read32), plus `ReadOnly` if the window was
    /// opened without write permission.
    pub fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check_offset(offset)?;
        if !self.mode.is_writable() {
            return Err(XdmaError::ReadOnly { offset });
        }
        let bus = self.usable_bus("write register")?;
        let result = bus.write32(offset, value);
        self.record(result)
    }

    /// Read consecutive registers starting at `offset`
    ///
    /// # Errors
    ///
    /// Stops at the first failing read.
    pub fn dump(&mut self, offset: usize, count: usize) -> Result<Vec<(usize, u32)>> {
        (0..count)
            .map(|i| offset + i * REGISTER_BYTES)
            .map(|off| self.read32(off).map(|v| (off, v)))
            .collect()
    }

    /// Write `LOOPBACK_PATTERN | i` to the `i`-th offset, then read every
    /// offset back
    ///
    /// Only meaningful for plain storage registers; a self-clearing or
    /// read-only register will report a mismatch.
    ///
    /// # Errors
    ///
    /// Stops at the first failing transaction.
    pub fn loopback_test(&mut self, offsets: &[usize]) -> Result<Vec<LoopbackResult>> {
        let mut written = Vec::with_capacity(offsets.len());
        for (i, &offset) in offsets.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let wrote = LOOPBACK_PATTERN | (i as u32 & 0xFFFF);
            self.write32(offset, wrote)?;
            written.push((offset, wrote));
        }

        let mut results = Vec::with_capacity(written.len());
        for (offset, wrote) in written {
            let read = self.read32(offset)?;
            if read != wrote {
                tracing::warn!("Loopback mismatch @ {offset:#x}: wrote {wrote:#010x}, read {read:#010x}");
            }
            results.push(LoopbackResult {
                offset,
                wrote,
                read,
            });
        }
        Ok(results)
    }

    /// Release the device; safe to call more than once
    pub fn close(&mut self) {
        if let Some(bus) = self.bus.take() {
            tracing::info!("Closing register window {} ({})", self.label, bus.backend_type());
            drop(bus);
        }
    }

    /// True until `close()`
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.bus.is_some()
    }

    /// True once a transaction has failed
    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Window length in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length window
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Access mode
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Device label (node path or "simulated")
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bus type, or `None` once closed
    #[must_use]
    pub fn backend_type(&self) -> Option<BackendType> {
        self.bus.as_ref().map(|b| b.backend_type())
    }

    fn check_offset(&self, offset: usize) -> Result<()> {
        let in_range = offset
            .checked_add(REGISTER_BYTES)
            .is_some_and(|end| end <= self.len);
        if offset % REGISTER_BYTES != 0 || !in_range {
            return Err(XdmaError::InvalidOffset {
                offset,
                len: self.len,
            });
        }
        Ok(())
    }

    fn usable_bus(&mut self, operation: &'static str) -> Result<&mut Box<dyn RegisterBus>> {
        if self.faulted {
            return Err(XdmaError::invalid_state(operation, "faulted window"));
        }
        self.bus
            .as_mut()
            .ok_or_else(|| XdmaError::invalid_state(operation, "closed window"))
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_io_fault() {
                tracing::error!("Register window {} faulted: {e}", self.label);
                self.faulted = true;
            }
        }
        result
    }
}

impl Drop for RegisterWindow {
    fn drop(&mut self) {
        self.close();
    }
}
