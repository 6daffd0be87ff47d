//! Processor condition: the signal a host inspects after every step.
//!
//! ```text
//! Startup --reset--> Normal | Halted
//! Normal  --step---> Normal | Halted | Stopped | Breakpoint(n) | Finished
//! Stopped --wake---> Normal
//! Breakpoint(n) --resume--> Normal
//! ```
//!
//! `Halted` and `Finished` are terminal.

/// Execution condition of a [`Processor`](crate::Processor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Condition {
    /// Constructed, reset not yet taken.
    #[default]
    Startup,
    /// Ready for the next instruction.
    Normal,
    /// The host declared the run complete.
    Finished,
    /// Unrecoverable: bus error, address error, double fault.
    Halted,
    /// STOP executed; waiting for an external wake.
    Stopped,
    /// BKPT #n executed (n in 0..=7). The processor only produces 0..=7;
    /// [`Condition::to_raw`] keeps the low three bits of anything larger.
    Breakpoint(u8),
}

/// Raw encodings used by hosts that store the condition numerically.
const RAW_STARTUP: i32 = 0;
const RAW_NORMAL: i32 = 1;
const RAW_FINISHED: i32 = 2;
const RAW_HALTED: i32 = -1;
const RAW_STOPPED: i32 = -2;
const RAW_BKPT_0: i32 = 0xF0;

impl Condition {
    /// Whether the next `step` will execute an instruction.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Whether no transition can leave this condition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted | Self::Finished)
    }

    /// Breakpoint number, if this is a breakpoint marker.
    #[must_use]
    pub const fn breakpoint(self) -> Option<u8> {
        match self {
            Self::Breakpoint(n) => Some(n),
            _ => None,
        }
    }

    /// Numeric encoding. Breakpoint numbers are masked to 0..=7, so a
    /// hand-built `Breakpoint(n)` with `n > 7` does not round-trip.
    #[must_use]
    pub const fn to_raw(self) -> i32 {
        match self {
            Self::Startup => RAW_STARTUP,
            Self::Normal => RAW_NORMAL,
            Self::Finished => RAW_FINISHED,
            Self::Halted => RAW_HALTED,
            Self::Stopped => RAW_STOPPED,
            Self::Breakpoint(n) => RAW_BKPT_0 | (n & 7) as i32,
        }
    }

    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            RAW_STARTUP => Some(Self::Startup),
            RAW_NORMAL => Some(Self::Normal),
            RAW_FINISHED => Some(Self::Finished),
            RAW_HALTED => Some(Self::Halted),
            RAW_STOPPED => Some(Self::Stopped),
            _ if raw & !7 == RAW_BKPT_0 => Some(Self::Breakpoint((raw & 7) as u8)),
            _ => None,
        }
    }
}
