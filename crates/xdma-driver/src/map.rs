//! Register-map configuration
//!
//! Both shipped layouts share the same START/BUSY/DONE protocol and differ
//! only in where the bits live and which optional register groups exist.
//! The controller is parameterized by a [`RegisterMap`]; routing selects and
//! transfer descriptors are capabilities a map may or may not carry.

use crate::error::{Result, XdmaError};
use std::fmt;
use xdma_chip::regs::{self, combined, split};

/// Named register layouts shipped with the bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterLayout {
    /// One CTRL/STATUS word with HBM routing selects
    Combined,
    /// Separate CTRL, STATUS and transfer descriptor registers
    Split,
}

impl RegisterLayout {
    /// Register map for this layout
    #[must_use]
    pub const fn register_map(self) -> RegisterMap {
        match self {
            Self::Combined => RegisterMap::COMBINED,
            Self::Split => RegisterMap::SPLIT,
        }
    }
}

impl fmt::Display for RegisterLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.register_map().name)
    }
}

/// Transfer descriptor register group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRegs {
    /// Write address register
    pub wr_addr: usize,
    /// Write length register
    pub wr_len: usize,
    /// Result address register, valid after DONE
    pub rd_addr: usize,
    /// Result length register, valid after DONE
    pub rd_len: usize,
}

/// Where the control protocol lives inside the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// Human-readable layout name
    pub name: &'static str,
    /// Control register offset
    pub ctrl: usize,
    /// Status register offset (equal to `ctrl` when they share a word)
    pub status: usize,
    /// START bit in the control register
    pub start: u32,
    /// BUSY bit in the status register
    pub busy: u32,
    /// DONE bit in the status register
    pub done: u32,
    /// Every bit software may set in the control register
    pub ctrl_writable: u32,
    /// Routing select bits, if the layout has them
    pub routing: Option<u32>,
    /// Transfer descriptor registers, if the layout has them
    pub transfer: Option<TransferRegs>,
}

impl RegisterMap {
    /// Combined CTRL/STATUS layout with HBM routing
    pub const COMBINED: Self = Self {
        name: "combined",
        ctrl: combined::CTRL_STATUS,
        status: combined::CTRL_STATUS,
        start: combined::START,
        busy: combined::BUSY,
        done: combined::DONE,
        ctrl_writable: combined::WRITABLE_MASK,
        routing: Some(combined::ROUTING_MASK),
        transfer: None,
    };

    /// Split layout with a transfer descriptor
    pub const SPLIT: Self = Self {
        name: "split",
        ctrl: split::CTRL,
        status: split::STATUS,
        start: split::START,
        busy: split::BUSY,
        done: split::DONE,
        ctrl_writable: split::CTRL_WRITABLE_MASK,
        routing: None,
        transfer: Some(TransferRegs {
            wr_addr: split::WR_ADDR,
            wr_len: split::WR_LEN,
            rd_addr: split::RD_ADDR,
            rd_len: split::RD_LEN,
        }),
    };

    /// True when control and status are the same register
    #[must_use]
    pub const fn shares_ctrl_status(&self) -> bool {
        self.ctrl == self.status
    }

    /// Every register offset the protocol touches
    #[must_use]
    pub fn offsets(&self) -> Vec<usize> {
        let mut offsets = vec![self.ctrl];
        if !self.shares_ctrl_status() {
            offsets.push(self.status);
        }
        if let Some(t) = self.transfer {
            offsets.extend([t.wr_addr, t.wr_len, t.rd_addr, t.rd_len]);
        }
        offsets
    }

    /// Bytes of window the map needs
    #[must_use]
    pub fn span(&self) -> usize {
        self.offsets()
            .into_iter()
            .map(|off| off.saturating_add(regs::REGISTER_BYTES))
            .max()
            .unwrap_or(regs::REGISTER_BYTES)
    }

    /// First `count` word offsets from 0 that the protocol does not use
    ///
    /// Safe targets for a loopback self-test: CTRL, STATUS and the
    /// transfer registers are skipped.
    #[must_use]
    pub fn scratch_offsets(&self, count: usize) -> Vec<usize> {
        let protocol = self.offsets();
        (0..)
            .map(|i: usize| i * regs::REGISTER_BYTES)
            .filter(|off| !protocol.contains(off))
            .take(count)
            .collect()
    }

    /// Check that every register is aligned and inside a window of `len` bytes
    ///
    /// # Errors
    ///
    /// Returns `XdmaError::InvalidOffset` for the first offending register.
    pub fn validate(&self, len: usize) -> Result<()> {
        for offset in self.offsets() {
            let fits = offset
                .checked_add(regs::REGISTER_BYTES)
                .is_some_and(|end| end <= len);
            if offset % regs::REGISTER_BYTES != 0 || !fits {
                return Err(XdmaError::InvalidOffset { offset, len });
            }
        }
        Ok(())
    }

    /// Reject control values carrying bits outside `ctrl_writable`
    ///
    /// # Errors
    ///
    /// Returns `XdmaError::ReservedBits` naming the offending bits.
    pub fn check_control(&self, value: u32) -> Result<u32> {
        let reserved = value & !self.ctrl_writable;
        if reserved != 0 {
            return Err(XdmaError::ReservedBits { value, reserved });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_fits_in_one_word() {
        let map = RegisterMap::COMBINED;
        assert!(map.shares_ctrl_status());
        assert_eq!(map.offsets(), vec![0x00]);
        assert_eq!(map.span(), 4);
        assert!(map.transfer.is_none());
    }

    #[test]
    fn split_spans_six_registers() {
        let map = RegisterMap::SPLIT;
        assert!(!map.shares_ctrl_status());
        assert_eq!(map.offsets(), vec![0x00, 0x0C, 0x04, 0x08, 0x10, 0x14]);
        assert_eq!(map.span(), 0x18);
        assert!(map.routing.is_none());
    }

    #[test]
    fn validate_rejects_small_window() {
        assert!(RegisterMap::SPLIT.validate(0x18).is_ok());
        let err = RegisterMap::SPLIT.validate(0x14).unwrap_err();
        assert!(matches!(err, XdmaError::InvalidOffset { offset: 0x10, len: 0x14 }));
    }

    #[test]
    fn validate_rejects_unaligned_custom_map() {
        let map = RegisterMap {
            status: 0x06,
            ..RegisterMap::SPLIT
        };
        assert!(matches!(
            map.validate(0x1000),
            Err(XdmaError::InvalidOffset { offset: 0x06, .. })
        ));
    }

    #[test]
    fn check_control_rejects_status_and_reserved_bits() {
        let map = RegisterMap::COMBINED;
        assert_eq!(map.check_control(0xF1).unwrap(), 0xF1);
        assert!(map.check_control(combined::RESERVED).is_err());
        assert!(map.check_control(combined::BUSY).is_err());
        assert!(map.check_control(0x100).is_err());

        let map = RegisterMap::SPLIT;
        assert!(map.check_control(split::START).is_ok());
        assert!(map.check_control(0x2).is_err());
    }

    #[test]
    fn layouts_resolve_to_maps() {
        assert_eq!(RegisterLayout::Combined.register_map(), RegisterMap::COMBINED);
        assert_eq!(RegisterLayout::Split.to_string(), "split");
    }

    #[test]
    fn scratch_offsets_skip_protocol_registers() {
        assert_eq!(RegisterMap::COMBINED.scratch_offsets(3), vec![0x04, 0x08, 0x0C]);
        let split = RegisterMap::SPLIT.scratch_offsets(2);
        assert_eq!(split, vec![0x18, 0x1C]);
        assert!(RegisterMap::SPLIT.scratch_offsets(0).is_empty());
    }

    #[test]
    fn offsets_near_usize_max_do_not_fit() {
        let map = RegisterMap {
            status: usize::MAX - 3,
            ..RegisterMap::SPLIT
        };
        assert!(matches!(
            map.validate(0x1000),
            Err(XdmaError::InvalidOffset { offset, .. }) if offset == usize::MAX - 3
        ));
        assert_eq!(map.span(), usize::MAX);
    }
}
