//! Session state and transfer descriptors

use std::fmt;

/// Where a controller session is in the START/BUSY/DONE protocol
///
/// ```text
/// Idle ──configure/arm──▶ Armed ──trigger──▶ Started ──poll──▶ Busy ──poll──▶ Done
///   │                       ▲                                                  │
///   └───────trigger─────────┼──────────────────────────────────────────────────┤
///                           └──────────────────configure/arm───────────────────┘
/// any state ──I/O fault──▶ Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Nothing written yet
    #[default]
    Idle,
    /// Configuration or transfer registers written, START not yet pulsed
    Armed,
    /// START pulsed, hardware not yet observed running
    Started,
    /// BUSY observed
    Busy,
    /// DONE observed (sticky until the next START)
    Done,
    /// A register transaction failed; the window is unusable
    Error,
}

impl SessionState {
    /// START pulsed and DONE not yet observed
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Started | Self::Busy)
    }

    /// Configuration registers may be written
    #[must_use]
    pub const fn can_configure(self) -> bool {
        matches!(self, Self::Idle | Self::Armed | Self::Done)
    }

    /// START may be pulsed
    #[must_use]
    pub const fn can_trigger(self) -> bool {
        matches!(self, Self::Idle | Self::Armed | Self::Done)
    }

    /// A wait for DONE can terminate
    #[must_use]
    pub const fn can_wait(self) -> bool {
        matches!(self, Self::Started | Self::Busy | Self::Done)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Armed => "Armed",
            Self::Started => "Started",
            Self::Busy => "Busy",
            Self::Done => "Done",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Transfer parameters armed before START, and the result published at DONE
///
/// Address and length are opaque here; the hardware validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// Value written to WR_ADDR
    pub write_addr: u32,
    /// Value written to WR_LEN
    pub write_len: u32,
    /// RD_ADDR/RD_LEN, present only after DONE
    pub result: Option<TransferResult>,
}

impl TransferDescriptor {
    /// Descriptor with no result yet
    #[must_use]
    pub const fn new(write_addr: u32, write_len: u32) -> Self {
        Self {
            write_addr,
            write_len,
            result: None,
        }
    }
}

/// Result registers read after DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    /// RD_ADDR
    pub read_addr: u32,
    /// RD_LEN
    pub read_len: u32,
}
