//! Register model for the TFHE accelerator behind an XDMA user BAR.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the AXI-Lite control window the FPGA design exposes through
//! the XDMA `*_user` character device: register offsets, bit definitions and
//! window geometry.
//!
//! Two register layouts have shipped with the bitstream:
//!
//! | Layout | Registers |
//! |--------|-----------|
//! | [`regs::combined`] | one CTRL/STATUS word at 0x00 with START/BUSY/DONE and HBM routing selects |
//! | [`regs::split`] | CTRL, WR_ADDR, WR_LEN, STATUS, RD_ADDR, RD_LEN at 0x00..=0x14 |
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`bar`] | Window geometry, register width, XDMA device node naming |
//! | [`regs`] | Register offsets and bit definitions for both layouts |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bar;
pub mod regs;
