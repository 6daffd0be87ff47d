//! Programmer-visible register file.
//!
//! - D0-D7: data registers
//! - A0-A6: address registers
//! - A7: the active stack pointer, aliased to USP or SSP by the S bit
//! - PC, SR
//! - VBR, SFC, DFC, CACR: control registers reached through MOVEC (68010+)

use crate::flags::{IPL_MASK, S, T1};

/// Register file shared by every model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Data registers D0-D7.
    pub d: [u32; 8],
    /// Address registers A0-A6. A7 lives in `usp`/`ssp`.
    pub a: [u32; 7],
    /// User stack pointer.
    pub usp: u32,
    /// Supervisor stack pointer.
    pub ssp: u32,
    pub pc: u32,
    pub sr: u16,
    /// Vector base register.
    pub vbr: u32,
    /// Source function code (3 bits).
    pub sfc: u8,
    /// Destination function code (3 bits).
    pub dfc: u8,
    /// Cache control register. Stored, never interpreted.
    pub cacr: u32,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Registers in their reset state: supervisor mode, interrupt mask 7.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            d: [0; 8],
            a: [0; 7],
            usp: 0,
            ssp: 0,
            pc: 0,
            sr: 0x2700,
            vbr: 0,
            sfc: 0,
            dfc: 0,
            cacr: 0,
        }
    }

    /// Address register `n` (0-7). A7 reads the active stack pointer.
    #[must_use]
    pub fn a(&self, n: usize) -> u32 {
        debug_assert!(n < 8);
        if n < 7 { self.a[n] } else { self.active_sp() }
    }

    /// Write address register `n` (0-7). A7 writes the active stack pointer.
    pub fn set_a(&mut self, n: usize, value: u32) {
        debug_assert!(n < 8);
        if n < 7 {
            self.a[n] = value;
        } else {
            self.set_active_sp(value);
        }
    }

    #[must_use]
    pub const fn active_sp(&self) -> u32 {
        if self.is_supervisor() { self.ssp } else { self.usp }
    }

    pub fn set_active_sp(&mut self, value: u32) {
        if self.is_supervisor() {
            self.ssp = value;
        } else {
            self.usp = value;
        }
    }

    #[must_use]
    pub const fn is_supervisor(&self) -> bool {
        self.sr & S != 0
    }

    /// Whether trace-on-every-instruction is enabled.
    #[must_use]
    pub const fn is_trace(&self) -> bool {
        self.sr & T1 != 0
    }

    #[must_use]
    pub const fn interrupt_mask(&self) -> u8 {
        ((self.sr & IPL_MASK) >> 8) as u8
    }

    pub fn set_interrupt_mask(&mut self, level: u8) {
        self.sr = (self.sr & !IPL_MASK) | (u16::from(level & 0x07) << 8);
    }

    /// Condition code register (low byte of SR).
    #[must_use]
    pub const fn ccr(&self) -> u8 {
        (self.sr & 0xFF) as u8
    }

    /// Replace the condition codes, keeping the system byte.
    pub fn set_ccr(&mut self, value: u8) {
        self.sr = (self.sr & 0xFF00) | u16::from(value & 0x1F);
    }

    /// Replace SR, restricted to the writable bits in `mask`.
    ///
    /// Clearing S switches A7 to the user stack pointer and vice versa; the
    /// alias follows automatically since A7 is derived from S.
    pub fn set_sr(&mut self, value: u16, mask: u16) {
        self.sr = value & mask;
    }

    /// Read a register by its 4-bit encoding (0-7 = Dn, 8-15 = An).
    #[must_use]
    pub fn reg(&self, r: u8) -> u32 {
        let n = usize::from(r & 7);
        if r & 8 == 0 { self.d[n] } else { self.a(n) }
    }

    /// Write a register by its 4-bit encoding (0-7 = Dn, 8-15 = An).
    pub fn set_reg(&mut self, r: u8, value: u32) {
        let n = usize::from(r & 7);
        if r & 8 == 0 {
            self.d[n] = value;
        } else {
            self.set_a(n, value);
        }
    }
}
