//! Register-level control of an FPGA accelerator behind an XDMA user BAR.
//!
//! The accelerator is driven entirely through a small AXI-Lite register
//! window: configuration bits or a transfer descriptor are written, START is
//! pulsed, and BUSY/DONE are polled. This crate encodes that protocol with
//! the bit-level rules the hardware expects:
//!
//! - reserved bits are never written (rejected or masked before the bus)
//! - START is a pulse, optionally followed by an explicit deassert write
//! - DONE is sticky until the next START
//! - status polling sleeps between reads and is always time-bounded
//!
//! # Layers
//!
//! ```text
//! AcceleratorController   configure / arm → trigger → poll / wait → result
//!         │  RegisterMap (combined or split layout)
//! RegisterWindow          bounds-checked read32/write32, terminal faults
//!         │
//! RegisterBus             FileBus (pread/pwrite) | MmapBus | SimulatedBus
//! ```
//!
//! # Quick start
//!
//! ```
//! use std::time::Duration;
//! use xdma_driver::{
//!     AcceleratorController, ControllerConfig, RegisterLayout, RoutingMask, SessionState,
//!     SimulatedDevice,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // On hardware: RegisterWindow::open_path("/dev/xdma0_user")?
//! let device = SimulatedDevice::with_layout(RegisterLayout::Combined);
//! let mut ctrl = AcceleratorController::with_config(
//!     device.window(),
//!     RegisterLayout::Combined.register_map(),
//!     ControllerConfig::unthrottled(),
//! )?;
//!
//! ctrl.configure_routing(RoutingMask::STACK1)?;
//! ctrl.trigger()?;
//! let outcome = ctrl.wait_until_done(Duration::from_millis(1), Duration::from_secs(1))?;
//!
//! assert!(outcome.status.done);
//! assert_eq!(ctrl.state(), SessionState::Done);
//! ctrl.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
mod config;
mod controller;
mod discovery;
mod error;
mod flags;
mod map;
mod session;
mod window;

/// Register model (re-exported from xdma-chip).
pub mod regs {
    pub use xdma_chip::bar;
    pub use xdma_chip::regs::{combined, split, REGISTER_BYTES};
}

pub use backend::{select_backend, AccessMethod, BackendType, RegisterBus};
pub use backends::{FileBus, MmapBus, SimulatedBus, SimulatedDevice};
pub use config::{
    ControllerConfig, PollPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, MIN_POLL_INTERVAL,
};
pub use controller::{AcceleratorController, WaitOutcome};
pub use discovery::{DeviceInfo, DeviceManager};
pub use error::{Result, XdmaError};
pub use flags::{ControlWord, RoutingMask, Status};
pub use map::{RegisterLayout, RegisterMap, TransferRegs};
pub use session::{SessionState, TransferDescriptor, TransferResult};
pub use window::{AccessMode, LoopbackResult, RegisterWindow, WindowOptions, LOOPBACK_PATTERN};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AcceleratorController, AccessMethod, AccessMode, ControllerConfig, PollPolicy,
        RegisterLayout, RegisterMap, RegisterWindow, Result, RoutingMask, SessionState,
        SimulatedDevice, Status, TransferDescriptor, WindowOptions, XdmaError,
    };
}
