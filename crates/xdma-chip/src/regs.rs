//! AXI-Lite register map for the accelerator control window.
//!
//! All registers are 32 bits wide and 4-byte aligned. Offsets are relative
//! to the start of the user BAR.
//!
//! ```text
//! combined (single CTRL/STATUS word)
//!   0x00  bit 0    START   W1P
//!         bit 1    BUSY    RO
//!         bit 2    DONE    RO, sticky, cleared on START
//!         bit 3    reserved
//!         bit 4-7  HBM_WR0 HBM_RD0 HBM_WR1 HBM_RD1  (0 = host, 1 = TFHE PU)
//!         bit 8-31 reserved, must be written as 0
//!
//! split
//!   0x00  CTRL     bit 0 START (W1P)
//!   0x04  WR_ADDR
//!   0x08  WR_LEN
//!   0x0C  STATUS   bit 0 BUSY, bit 1 DONE
//!   0x10  RD_ADDR  valid after DONE
//!   0x14  RD_LEN   valid after DONE
//! ```

/// Width of every register in bytes.
pub const REGISTER_BYTES: usize = 4;

/// Single combined control/status register layout.
pub mod combined {
    /// CTRL/STATUS register.
    pub const CTRL_STATUS: usize = 0x00;

    /// Write 1 to trigger. Not sticky.
    pub const START: u32 = 1 << 0;
    /// Set by hardware while the accelerator runs.
    pub const BUSY: u32 = 1 << 1;
    /// Sticky completion flag, cleared by hardware on START.
    pub const DONE: u32 = 1 << 2;
    /// Reserved, must be written as 0.
    pub const RESERVED: u32 = 1 << 3;

    /// HBM stack 0 write port routed to the accelerator.
    pub const HBM_WR0: u32 = 1 << 4;
    /// HBM stack 0 read port routed to the accelerator.
    pub const HBM_RD0: u32 = 1 << 5;
    /// HBM stack 1 write port routed to the accelerator.
    pub const HBM_WR1: u32 = 1 << 6;
    /// HBM stack 1 read port routed to the accelerator.
    pub const HBM_RD1: u32 = 1 << 7;

    /// All four routing selects.
    pub const ROUTING_MASK: u32 = HBM_WR0 | HBM_RD0 | HBM_WR1 | HBM_RD1;

    /// Bits [31:8] are reserved; only the low byte is ever driven.
    pub const ALLOWED_MASK: u32 = 0x0000_00FF;

    /// Bits software may set in a control write.
    pub const WRITABLE_MASK: u32 = START | ROUTING_MASK;

    /// Bits driven by hardware.
    pub const STATUS_MASK: u32 = BUSY | DONE;
}

/// Split control / transfer-descriptor / status register layout.
pub mod split {
    /// Control register.
    pub const CTRL: usize = 0x00;
    /// Transfer write address.
    pub const WR_ADDR: usize = 0x04;
    /// Transfer write length in bytes.
    pub const WR_LEN: usize = 0x08;
    /// Status register.
    pub const STATUS: usize = 0x0C;
    /// Result read address, valid after DONE.
    pub const RD_ADDR: usize = 0x10;
    /// Result read length, valid after DONE.
    pub const RD_LEN: usize = 0x14;

    /// CTRL bit 0: write 1 to trigger.
    pub const START: u32 = 1 << 0;
    /// Bits software may set in CTRL.
    pub const CTRL_WRITABLE_MASK: u32 = START;

    /// STATUS bit 0.
    pub const BUSY: u32 = 1 << 0;
    /// STATUS bit 1, sticky until the next START.
    pub const DONE: u32 = 1 << 1;
    /// Bits the hardware defines in STATUS.
    pub const STATUS_MASK: u32 = BUSY | DONE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_bits_are_disjoint() {
        let bits = [
            combined::START,
            combined::BUSY,
            combined::DONE,
            combined::RESERVED,
            combined::HBM_WR0,
            combined::HBM_RD0,
            combined::HBM_WR1,
            combined::HBM_RD1,
        ];
        let mut seen = 0u32;
        for bit in bits {
            assert_eq!(seen & bit, 0, "bit {bit:#x} defined twice");
            seen |= bit;
        }
        assert_eq!(seen, combined::ALLOWED_MASK);
    }

    #[test]
    fn combined_writable_excludes_status_and_reserved() {
        assert_eq!(combined::WRITABLE_MASK & combined::STATUS_MASK, 0);
        assert_eq!(combined::WRITABLE_MASK & combined::RESERVED, 0);
        assert_eq!(combined::ROUTING_MASK, 0xF0);
    }

    #[test]
    fn split_offsets_are_word_aligned_and_distinct() {
        let offsets = [
            split::CTRL,
            split::WR_ADDR,
            split::WR_LEN,
            split::STATUS,
            split::RD_ADDR,
            split::RD_LEN,
        ];
        for (i, off) in offsets.iter().enumerate() {
            assert_eq!(off % REGISTER_BYTES, 0);
            assert_eq!(*off, i * REGISTER_BYTES);
        }
    }
}
