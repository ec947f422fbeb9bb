//! Simulated accelerator
//!
//! A register-level model of the FPGA control window, so the whole
//! configure → trigger → wait sequence runs without a card:
//!
//! - START is write-one-to-pulse: it never reads back as set
//! - BUSY rises on START and stays up for a configurable number of status reads
//! - DONE rises when BUSY falls and stays up until the next START
//! - status bits and result registers ignore writes
//! - every other offset is plain read/write storage
//!
//! The model is parameterized by the same [`RegisterMap`] the controller
//! uses, so both layouts (and custom maps) behave consistently.
//! [`SimulatedDevice`] is a cloneable handle: tests keep one clone to
//! inspect the device while the window owns the bus.

use crate::backend::{BackendType, RegisterBus};
use crate::error::{Result, XdmaError};
use crate::map::{RegisterLayout, RegisterMap};
use crate::window::{AccessMode, RegisterWindow};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use xdma_chip::bar::WINDOW_SIZE;

/// Status reads a START stays busy for, unless overridden.
pub const DEFAULT_LATENCY_POLLS: u32 = 3;

/// Handle to a simulated accelerator
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    model: Arc<Mutex<DeviceModel>>,
}

#[derive(Debug)]
struct DeviceModel {
    map: RegisterMap,
    regs: Vec<u32>,
    ctrl_latch: u32,
    busy: bool,
    done: bool,
    latency: u32,
    remaining: u32,
    starts: u32,
    status_reads: u32,
    writes: Vec<(usize, u32)>,
    fail_read: bool,
    fail_write: bool,
    result: Option<(u32, u32)>,
}

impl SimulatedDevice {
    /// New idle device for `map` with a 4 KiB window
    #[must_use]
    pub fn new(map: RegisterMap) -> Self {
        Self {
            model: Arc::new(Mutex::new(DeviceModel {
                map,
                regs: vec![0; WINDOW_SIZE / 4],
                ctrl_latch: 0,
                busy: false,
                done: false,
                latency: DEFAULT_LATENCY_POLLS,
                remaining: 0,
                starts: 0,
                status_reads: 0,
                writes: Vec::new(),
                fail_read: false,
                fail_write: false,
                result: None,
            })),
        }
    }

    /// New idle device for one of the shipped layouts
    #[must_use]
    pub fn with_layout(layout: RegisterLayout) -> Self {
        Self::new(layout.register_map())
    }

    /// Number of status reads a run stays busy for; DONE is reported on
    /// the `polls`-th read after START (the first read for 0 or 1)
    #[must_use]
    pub fn with_latency(self, polls: u32) -> Self {
        self.lock().latency = polls;
        self
    }

    /// Window over this device
    #[must_use]
    pub fn window(&self) -> RegisterWindow {
        RegisterWindow::from_bus(
            Box::new(self.bus()),
            WINDOW_SIZE,
            AccessMode::ReadWrite,
            "simulated",
        )
    }

    /// Bus over this device
    #[must_use]
    pub fn bus(&self) -> SimulatedBus {
        SimulatedBus {
            device: self.clone(),
        }
    }

    /// Register value as the next read would return it, without the read's
    /// side effects
    #[must_use]
    pub fn peek(&self, offset: usize) -> u32 {
        let model = self.lock();
        if offset == model.map.status {
            model.status_word()
        } else if offset == model.map.ctrl {
            model.ctrl_latch
        } else {
            model.regs.get(offset / 4).copied().unwrap_or(0)
        }
    }

    /// Number of START pulses seen
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.lock().starts
    }

    /// Number of status register reads
    #[must_use]
    pub fn status_reads(&self) -> u32 {
        self.lock().status_reads
    }

    /// Every write that reached the bus, in order
    #[must_use]
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.lock().writes.clone()
    }

    /// Hardware BUSY flag
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Hardware DONE flag
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Report the next read as a short transfer
    pub fn fail_next_read(&self) {
        self.lock().fail_read = true;
    }

    /// Report the next write as a short transfer
    pub fn fail_next_write(&self) {
        self.lock().fail_write = true;
    }

    /// Result registers to publish on completion instead of echoing the
    /// transfer descriptor
    pub fn set_result(&self, read_addr: u32, read_len: u32) {
        self.lock().result = Some((read_addr, read_len));
    }

    fn lock(&self) -> MutexGuard<'_, DeviceModel> {
        // The model holds no invariants a panicking test could break halfway
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceModel {
    fn hw_bits(&self) -> u32 {
        self.map.busy | self.map.done
    }

    fn status_word(&self) -> u32 {
        let mut word = if self.map.shares_ctrl_status() {
            self.ctrl_latch
        } else {
            0
        };
        if self.busy {
            word |= self.map.busy;
        }
        if self.done {
            word |= self.map.done;
        }
        word
    }

    fn is_result_reg(&self, offset: usize) -> bool {
        self.map
            .transfer
            .is_some_and(|t| offset == t.rd_addr || offset == t.rd_len)
    }

    fn start(&mut self) {
        self.busy = true;
        self.done = false;
        self.remaining = self.latency;
        self.starts += 1;
        tracing::trace!("sim: START #{} (busy for {} polls)", self.starts, self.latency);
    }

    fn advance(&mut self) {
        if !self.busy {
            return;
        }
        if self.remaining <= 1 {
            self.complete();
        } else {
            self.remaining -= 1;
        }
    }

    fn complete(&mut self) {
        self.busy = false;
        self.done = true;
        if let Some(t) = self.map.transfer {
            let stored = |regs: &[u32], offset: usize| regs.get(offset / 4).copied().unwrap_or(0);
            let (addr, len) = self.result.unwrap_or((
                stored(&self.regs, t.wr_addr),
                stored(&self.regs, t.wr_len),
            ));
            for (offset, value) in [(t.rd_addr, addr), (t.rd_len, len)] {
                if let Some(slot) = self.regs.get_mut(offset / 4) {
                    *slot = value;
                }
            }
        }
        tracing::trace!("sim: DONE");
    }

    fn slot(&mut self, offset: usize) -> Result<&mut u32> {
        self.regs
            .get_mut(offset / 4)
            .ok_or_else(|| XdmaError::io_fault(offset, "outside simulated window"))
    }

    fn read(&mut self, offset: usize) -> Result<u32> {
        if std::mem::take(&mut self.fail_read) {
            return Err(XdmaError::io_fault(offset, "short read: 0 of 4 bytes"));
        }
        if offset == self.map.status {
            self.status_reads += 1;
            self.advance();
            return Ok(self.status_word());
        }
        if offset == self.map.ctrl {
            return Ok(self.ctrl_latch);
        }
        self.slot(offset).map(|v| *v)
    }

    fn write(&mut self, offset: usize, value: u32) -> Result<()> {
        if std::mem::take(&mut self.fail_write) {
            return Err(XdmaError::io_fault(offset, "short write: 0 of 4 bytes"));
        }
        self.writes.push((offset, value));

        if offset == self.map.ctrl {
            if value & self.map.start != 0 {
                self.start();
            }
            let hw = if self.map.shares_ctrl_status() {
                self.hw_bits()
            } else {
                0
            };
            self.ctrl_latch = value & !(self.map.start | hw);
            return Ok(());
        }
        if offset == self.map.status || self.is_result_reg(offset) {
            return Ok(());
        }
        *self.slot(offset)? = value;
        Ok(())
    }
}

/// Register bus over a [`SimulatedDevice`]
#[derive(Debug)]
pub struct SimulatedBus {
    device: SimulatedDevice,
}

impl RegisterBus for SimulatedBus {
    fn read32(&mut self, offset: usize) -> Result<u32> {
        self.device.lock().read(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.device.lock().write(offset, value)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdma_chip::regs::{combined, split};

    #[test]
    fn start_is_a_pulse() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Combined);
        let mut bus = dev.bus();
        bus.write32(0, combined::HBM_WR1 | combined::START).unwrap();
        assert_eq!(dev.start_count(), 1);
        assert_eq!(dev.peek(0) & combined::START, 0);
        assert_eq!(dev.peek(0) & combined::HBM_WR1, combined::HBM_WR1);
    }

    #[test]
    fn done_after_latency_and_sticky() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Combined).with_latency(3);
        let mut bus = dev.bus();
        bus.write32(0, combined::START).unwrap();

        assert_eq!(bus.read32(0).unwrap() & combined::STATUS_MASK, combined::BUSY);
        assert_eq!(bus.read32(0).unwrap() & combined::STATUS_MASK, combined::BUSY);
        assert_eq!(bus.read32(0).unwrap() & combined::STATUS_MASK, combined::DONE);
        for _ in 0..5 {
            assert_eq!(bus.read32(0).unwrap() & combined::STATUS_MASK, combined::DONE);
        }

        bus.write32(0, combined::START).unwrap();
        assert!(!dev.is_done());
        assert!(dev.is_busy());
    }

    #[test]
    fn split_status_is_read_only() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Split);
        let mut bus = dev.bus();
        bus.write32(split::STATUS, split::DONE).unwrap();
        assert_eq!(bus.read32(split::STATUS).unwrap(), 0);
    }

    #[test]
    fn split_completion_echoes_descriptor() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Split).with_latency(1);
        let mut bus = dev.bus();
        bus.write32(split::WR_ADDR, 0x8000_0000).unwrap();
        bus.write32(split::WR_LEN, 4096).unwrap();
        bus.write32(split::CTRL, split::START).unwrap();
        assert_eq!(bus.read32(split::STATUS).unwrap(), split::DONE);
        assert_eq!(bus.read32(split::RD_ADDR).unwrap(), 0x8000_0000);
        assert_eq!(bus.read32(split::RD_LEN).unwrap(), 4096);
    }

    #[test]
    fn result_override() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Split).with_latency(0);
        dev.set_result(0x1000, 64);
        let mut bus = dev.bus();
        bus.write32(split::CTRL, split::START).unwrap();
        bus.read32(split::STATUS).unwrap();
        assert_eq!(dev.peek(split::RD_ADDR), 0x1000);
        assert_eq!(dev.peek(split::RD_LEN), 64);
    }

    #[test]
    fn injected_faults_fire_once() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Split);
        let mut bus = dev.bus();
        dev.fail_next_read();
        assert!(bus.read32(0x20).unwrap_err().is_io_fault());
        assert!(bus.read32(0x20).is_ok());

        dev.fail_next_write();
        assert!(bus.write32(0x20, 1).unwrap_err().is_io_fault());
        assert!(dev.writes().is_empty());
    }

    #[test]
    fn plain_registers_store_values() {
        let dev = SimulatedDevice::with_layout(RegisterLayout::Combined);
        let mut bus = dev.bus();
        bus.write32(0xFFC, 0xA5A5_0005).unwrap();
        assert_eq!(bus.read32(0xFFC).unwrap(), 0xA5A5_0005);
        assert_eq!(bus.backend_type(), BackendType::Simulated);
    }
}
