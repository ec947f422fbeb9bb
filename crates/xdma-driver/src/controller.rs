//! Accelerator controller
//!
//! Drives the START/BUSY/DONE protocol over a [`RegisterWindow`]:
//!
//! 1. `configure_routing` (combined layout) and/or `arm_transfer` (split
//!    layout) write the configuration registers
//! 2. `trigger` pulses START with the configuration bits preserved
//! 3. `poll_status` / `wait_until_done` observe BUSY and DONE
//! 4. `read_result` (split layout) reads RD_ADDR/RD_LEN after DONE
//!
//! The controller owns its window. Concurrent sessions over one register
//! block are not supported; callers that share a card must serialize the
//! whole configure → trigger → wait sequence themselves.

use crate::config::{ControllerConfig, PollPolicy};
use crate::error::{Result, XdmaError};
use crate::flags::{ControlWord, RoutingMask, Status};
use crate::map::RegisterMap;
use crate::session::{SessionState, TransferDescriptor, TransferResult};
use crate::window::RegisterWindow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Successful wait for DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Status reads issued, including the one that saw DONE
    pub polls: u32,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Final status
    pub status: Status,
}

/// Register-level controller for one accelerator
#[derive(Debug)]
pub struct AcceleratorController {
    window: RegisterWindow,
    map: RegisterMap,
    config: ControllerConfig,
    state: SessionState,
    routing: RoutingMask,
    transfer: Option<TransferDescriptor>,
}

impl AcceleratorController {
    /// Take ownership of `window` and drive it with `map`
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for a closed or faulted window and
    /// `InvalidOffset` if the map does not fit the window.
    pub fn new(window: RegisterWindow, map: RegisterMap) -> Result<Self> {
        Self::with_config(window, map, ControllerConfig::default())
    }

    /// As [`new`](Self::new), with explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for a closed or faulted window and
    /// `InvalidOffset` if the map does not fit the window.
    pub fn with_config(
        window: RegisterWindow,
        map: RegisterMap,
        config: ControllerConfig,
    ) -> Result<Self> {
        if !window.is_open() {
            return Err(XdmaError::invalid_state("attach controller", "closed window"));
        }
        if window.is_faulted() {
            return Err(XdmaError::invalid_state("attach controller", "faulted window"));
        }
        map.validate(window.len())?;

        info!(
            "Controller attached to {} ({} layout, deassert_start={}, poll floor {:?})",
            window.label(),
            map.name,
            config.deassert_start,
            config.min_poll_interval
        );

        Ok(Self {
            window,
            map,
            config,
            state: SessionState::Idle,
            routing: RoutingMask::empty(),
            transfer: None,
        })
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Register map in use
    #[must_use]
    pub const fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Last routing selection written
    #[must_use]
    pub const fn routing(&self) -> RoutingMask {
        self.routing
    }

    /// Last transfer descriptor armed, with its result once read
    #[must_use]
    pub const fn transfer(&self) -> Option<TransferDescriptor> {
        self.transfer
    }

    /// The underlying window
    #[must_use]
    pub const fn window(&self) -> &RegisterWindow {
        &self.window
    }

    /// Write the HBM routing selects, with START and reserved bits clear
    ///
    /// Bits of `select` outside the routing field are dropped, not rejected;
    /// the value actually written is returned so the caller can see what
    /// took effect.
    ///
    /// # Errors
    ///
    /// - `Unsupported` if the register map has no routing field
    /// - `InvalidState` unless the session is Idle, Armed or Done
    /// - `IoFault` if the write fails (session moves to Error)
    pub fn configure_routing(&mut self, select: RoutingMask) -> Result<RoutingMask> {
        let Some(routing_bits) = self.map.routing else {
            return Err(XdmaError::Unsupported {
                operation: "configure_routing",
                layout: self.map.name,
            });
        };
        self.require(self.state.can_configure(), "configure routing")?;

        let effective = select.bits() & routing_bits;
        let dropped = select.bits() & !effective;
        if dropped != 0 {
            warn!(
                "Routing select {:#010x} carries bits outside the routing field; writing {effective:#010x}",
                select.bits()
            );
        }

        let routing = RoutingMask::from_bits_retain(effective);
        let word = self.control_value(routing, false)?;
        self.write_reg(self.map.ctrl, word)?;

        self.routing = routing;
        debug!("Routing configured: {}", self.routing);
        self.transition(SessionState::Armed);
        Ok(self.routing)
    }

    /// Write WR_ADDR then WR_LEN
    ///
    /// Both writes complete before this returns, and therefore before any
    /// `trigger()`.
    ///
    /// # Errors
    ///
    /// - `Unsupported` if the register map has no transfer registers
    /// - `InvalidState` unless the session is Idle, Armed or Done
    /// - `IoFault` if either write fails (session moves to Error)
    pub fn arm_transfer(&mut self, write_addr: u32, write_len: u32) -> Result<()> {
        let Some(regs) = self.map.transfer else {
            return Err(XdmaError::Unsupported {
                operation: "arm_transfer",
                layout: self.map.name,
            });
        };
        self.require(self.state.can_configure(), "arm transfer")?;

        self.write_reg(regs.wr_addr, write_addr)?;
        self.write_reg(regs.wr_len, write_len)?;

        self.transfer = Some(TransferDescriptor::new(write_addr, write_len));
        debug!("Transfer armed: addr={write_addr:#010x} len={write_len}");
        self.transition(SessionState::Armed);
        Ok(())
    }

    /// Pulse START
    ///
    /// Writes the last configuration word with START set, then (if
    /// `deassert_start`) the configuration word alone. DONE is cleared by
    /// the hardware on START.
    ///
    /// # Errors
    ///
    /// - `InvalidState` while a run is in progress, after an I/O fault, or
    ///   on a transfer layout with no descriptor armed
    /// - `IoFault` if a write fails (session moves to Error)
    pub fn trigger(&mut self) -> Result<SessionState> {
        self.require(self.state.can_trigger(), "trigger")?;
        if self.map.transfer.is_some() && self.transfer.is_none() {
            return Err(XdmaError::invalid_state(
                "trigger",
                format!("{} (no transfer armed)", self.state),
            ));
        }

        let start_word = self.control_value(self.routing, true)?;
        let config_bits = self.control_value(self.routing, false)?;

        self.write_reg(self.map.ctrl, start_word)?;
        if self.config.deassert_start {
            self.write_reg(self.map.ctrl, config_bits)?;
        }

        if let Some(t) = self.transfer.as_mut() {
            t.result = None;
        }
        self.transition(SessionState::Started);
        Ok(self.state)
    }

    /// Read BUSY and DONE
    ///
    /// Does not write the hardware. Advances the session from Started to
    /// Busy or Done as the bits are observed; DONE stays set until the next
    /// `trigger()`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` after an I/O fault
    /// - `IoFault` if the read fails (session moves to Error)
    pub fn poll_status(&mut self) -> Result<Status> {
        self.require(self.state != SessionState::Error, "poll status")?;

        let raw = self.read_reg(self.map.status)?;
        let status = Status::decode(raw, self.map.busy, self.map.done);
        trace!("Status {raw:#010x}: {status}");

        if self.state.is_running() {
            if status.done {
                self.transition(SessionState::Done);
            } else if status.busy {
                self.transition(SessionState::Busy);
            }
        }
        Ok(status)
    }

    /// Poll every `poll_interval` until DONE, giving up after `timeout`
    ///
    /// The interval is raised to `min_poll_interval` if it is shorter. The
    /// thread sleeps between polls; a poll is never issued once the next
    /// sleep would end past `timeout`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if START has not been pulsed
    /// - `TimedOut` if DONE was not seen in time (session stays Started or Busy)
    /// - `IoFault` if a read fails (session moves to Error)
    pub fn wait_until_done(&mut self, poll_interval: Duration, timeout: Duration) -> Result<WaitOutcome> {
        self.wait_inner(PollPolicy::new(poll_interval, timeout), None)
    }

    /// Wait with the configured default policy
    ///
    /// # Errors
    ///
    /// As [`wait_until_done`](Self::wait_until_done).
    pub fn wait(&mut self) -> Result<WaitOutcome> {
        self.wait_inner(self.config.default_wait, None)
    }

    /// As [`wait_until_done`](Self::wait_until_done), also returning
    /// `Cancelled` once `cancel` is raised
    ///
    /// # Errors
    ///
    /// As [`wait_until_done`](Self::wait_until_done), plus `Cancelled`.
    pub fn wait_until_done_cancellable(
        &mut self,
        policy: PollPolicy,
        cancel: &AtomicBool,
    ) -> Result<WaitOutcome> {
        self.wait_inner(policy, Some(cancel))
    }

    /// Read RD_ADDR and RD_LEN
    ///
    /// # Errors
    ///
    /// - `Unsupported` if the register map has no transfer registers
    /// - `NotReady` unless the session is Done
    /// - `IoFault` if a read fails (session moves to Error)
    pub fn read_result(&mut self) -> Result<TransferDescriptor> {
        let Some(regs) = self.map.transfer else {
            return Err(XdmaError::Unsupported {
                operation: "read_result",
                layout: self.map.name,
            });
        };
        if self.state != SessionState::Done {
            return Err(XdmaError::not_ready(self.state));
        }
        let Some(mut descriptor) = self.transfer else {
            return Err(XdmaError::not_ready(self.state));
        };

        let read_addr = self.read_reg(regs.rd_addr)?;
        let read_len = self.read_reg(regs.rd_len)?;

        descriptor.result = Some(TransferResult {
            read_addr,
            read_len,
        });
        self.transfer = Some(descriptor);
        debug!("Result: addr={read_addr:#010x} len={read_len}");
        Ok(descriptor)
    }

    /// Raw control register readback
    ///
    /// On the combined layout this includes BUSY/DONE, since control and
    /// status share the word. Does not change the session state.
    ///
    /// # Errors
    ///
    /// - `InvalidState` after an I/O fault
    /// - `IoFault` if the read fails (session moves to Error)
    pub fn read_control(&mut self) -> Result<u32> {
        self.require(self.state != SessionState::Error, "read control")?;
        self.read_reg(self.map.ctrl)
    }

    /// Decoded CTRL/STATUS word of a layout with routing selects
    ///
    /// # Errors
    ///
    /// - `Unsupported` if the register map has no routing field
    /// - `InvalidState` after an I/O fault
    /// - `IoFault` if the read fails (session moves to Error)
    pub fn control_word(&mut self) -> Result<ControlWord> {
        if self.map.routing.is_none() {
            return Err(XdmaError::Unsupported {
                operation: "control_word",
                layout: self.map.name,
            });
        }
        let raw = self.read_control()?;
        if raw & ControlWord::RESERVED_BITS != 0 {
            warn!("CTRL/STATUS reads back reserved bits: {raw:#010x}");
        }
        Ok(ControlWord::from_bits_retain(raw))
    }

    /// Release the controller and hand back its window
    #[must_use]
    pub fn into_window(self) -> RegisterWindow {
        self.window
    }

    /// End the session and release the device
    pub fn close(mut self) {
        if self.state.is_running() {
            warn!("Session closed while running (state {})", self.state);
        } else {
            info!("Session closed in state {}", self.state);
        }
        self.window.close();
    }

    /// CTRL value for `routing`, with or without START
    ///
    /// Layouts with routing selects go through [`ControlWord`], which
    /// refuses reserved bits; every value is then checked against the map.
    fn control_value(&self, routing: RoutingMask, start: bool) -> Result<u32> {
        let raw = if self.map.routing.is_some() {
            let word = ControlWord::from_routing(routing);
            let word = if start { word.with_start() } else { word };
            ControlWord::try_from_raw(word.bits())?.bits()
        } else if start {
            self.map.start
        } else {
            0
        };
        self.map.check_control(raw)
    }

    fn wait_inner(&mut self, policy: PollPolicy, cancel: Option<&AtomicBool>) -> Result<WaitOutcome> {
        self.require(self.state.can_wait(), "wait for DONE")?;

        let interval = self.config.effective_interval(policy.interval);
        if interval != policy.interval {
            debug!(
                "Poll interval {:?} below floor, using {interval:?}",
                policy.interval
            );
        }

        let start = Instant::now();
        let mut polls = 0u32;
        loop {
            let status = self.poll_status()?;
            polls = polls.saturating_add(1);

            if status.done {
                let elapsed = start.elapsed();
                debug!("DONE after {polls} polls ({elapsed:?})");
                return Ok(WaitOutcome {
                    polls,
                    elapsed,
                    status,
                });
            }

            let elapsed = start.elapsed();
            if policy.timeout.saturating_sub(elapsed) < interval {
                warn!(
                    "Timed out waiting for DONE after {polls} polls ({elapsed:?}, state {})",
                    self.state
                );
                return Err(XdmaError::TimedOut {
                    elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    polls,
                });
            }

            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                debug!("Wait cancelled after {polls} polls");
                return Err(XdmaError::Cancelled { polls });
            }

            std::thread::sleep(interval);
        }
    }

    fn require(&self, allowed: bool, operation: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(XdmaError::invalid_state(operation, self.state))
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session {} -> {next}", self.state);
            self.state = next;
        }
    }

    fn fault(&mut self, e: XdmaError) -> XdmaError {
        if e.is_io_fault() {
            error!("Session failed in state {}: {e}", self.state);
            self.state = SessionState::Error;
        }
        e
    }

    fn read_reg(&mut self, offset: usize) -> Result<u32> {
        let result = self.window.read32(offset);
        result.map_err(|e| self.fault(e))
    }

    fn write_reg(&mut self, offset: usize, value: u32) -> Result<()> {
        let result = self.window.write32(offset, value);
        result.map_err(|e| self.fault(e))
    }
}
