//! Typed control and status words
//!
//! Raw `u32` register values only exist at the bus boundary. Everything the
//! controller writes goes through these types, so a reserved bit is caught
//! here instead of reaching the hardware.

use crate::error::{Result, XdmaError};
use std::fmt;
use xdma_chip::regs::combined;

/// CTRL/STATUS word of the combined register layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ControlWord(u32);

bitflags::bitflags! {
    impl ControlWord: u32 {
        const START   = combined::START;
        const BUSY    = combined::BUSY;
        const DONE    = combined::DONE;
        const HBM_WR0 = combined::HBM_WR0;
        const HBM_RD0 = combined::HBM_RD0;
        const HBM_WR1 = combined::HBM_WR1;
        const HBM_RD1 = combined::HBM_RD1;
    }
}

impl ControlWord {
    /// Bits that must always be written as 0: bit 3 and bits [31:8].
    pub const RESERVED_BITS: u32 = combined::RESERVED | !combined::ALLOWED_MASK;

    /// Build a control word from a raw value, rejecting reserved bits.
    ///
    /// # Errors
    ///
    /// Returns `XdmaError::ReservedBits` if any reserved bit is set.
    pub fn try_from_raw(raw: u32) -> Result<Self> {
        let reserved = raw & Self::RESERVED_BITS;
        if reserved != 0 {
            return Err(XdmaError::ReservedBits {
                value: raw,
                reserved,
            });
        }
        Ok(Self(raw))
    }

    /// Control word carrying only a routing selection.
    #[must_use]
    pub const fn from_routing(routing: RoutingMask) -> Self {
        Self(routing.bits() & combined::ROUTING_MASK)
    }

    /// Routing selects held in this word.
    #[must_use]
    pub const fn routing(self) -> RoutingMask {
        RoutingMask::from_bits_truncate(self.0)
    }

    /// Same word with START set.
    #[must_use]
    pub const fn with_start(self) -> Self {
        Self(self.0 | combined::START)
    }

    /// Status bits carried in this word.
    #[must_use]
    pub const fn status(self) -> Status {
        Status {
            busy: self.0 & combined::BUSY != 0,
            done: self.0 & combined::DONE != 0,
        }
    }
}

impl fmt::Debug for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControlWord({:#010x}: {self})", self.0)
    }
}

impl fmt::Display for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

/// HBM port routing selects: a set bit routes that port to the accelerator,
/// a clear bit leaves it with the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct RoutingMask(u32);

bitflags::bitflags! {
    impl RoutingMask: u32 {
        const HBM_WR0 = combined::HBM_WR0;
        const HBM_RD0 = combined::HBM_RD0;
        const HBM_WR1 = combined::HBM_WR1;
        const HBM_RD1 = combined::HBM_RD1;

        const STACK0 = Self::HBM_WR0.bits() | Self::HBM_RD0.bits();
        const STACK1 = Self::HBM_WR1.bits() | Self::HBM_RD1.bits();
    }
}

impl fmt::Debug for RoutingMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingMask({:#04x})", self.0)
    }
}

impl fmt::Display for RoutingMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports = [
            (Self::HBM_WR0, "WR0"),
            (Self::HBM_RD0, "RD0"),
            (Self::HBM_WR1, "WR1"),
            (Self::HBM_RD1, "RD1"),
        ];
        let routed: Vec<&str> = ports
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if routed.is_empty() {
            write!(f, "host")
        } else {
            write!(f, "{}", routed.join(","))
        }
    }
}

/// Decoded BUSY/DONE status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    /// Accelerator is running
    pub busy: bool,
    /// Last START has completed (sticky until the next START)
    pub done: bool,
}

impl Status {
    /// Decode a raw status register, ignoring every bit outside the two masks.
    #[must_use]
    pub const fn decode(raw: u32, busy_mask: u32, done_mask: u32) -> Self {
        Self {
            busy: raw & busy_mask != 0,
            done: raw & done_mask != 0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BUSY={} DONE={}", u8::from(self.busy), u8::from(self.done))
    }
}
