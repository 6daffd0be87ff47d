//! Fault classification and exception processing.
//!
//! Faults are detected synchronously during fetch, decode or execute and
//! come back to [`Processor::step`] as a [`Fault`]. From there:
//! - Bus and address errors halt the processor under [`FaultPolicy::Halt`]
//!   (the default), or vector through a long frame under
//!   [`FaultPolicy::Vector`].
//! - Privilege violations, illegal opcodes, line A/F, TRAP and TRAPV always
//!   vector through a short frame.
//! - A malformed frame seen by RTE halts.
//! - A fault while stacking a frame (double fault) halts.
//!
//! Short frame ("format 0"):
//! - 68000: SR, PC (6 bytes)
//! - 68010+: SR, PC, format/vector word (8 bytes)
//!
//! Long frame ("format 6", 68010+), from SP upward: SR, PC, `0x6000 |
//! offset`, instruction address, fault address, access word, IR (20 bytes).
//! The 68000 has no format word and builds its group 0 frame instead: access
//! word, fault address, IR, SR, PC (14 bytes).

use std::fmt;

use log::{debug, warn};
use thiserror::Error;

use crate::alu::Size;
use crate::memory::{Access, FunctionCode, Memory};
use crate::processor::Processor;

/// The bus cycle that faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCycle {
    pub addr: u32,
    pub access: Access,
    pub fc: FunctionCode,
}

impl BusCycle {
    /// Access word stacked in long frames: R/W in bit 4, I/N in bit 3, FC
    /// in bits 2-0.
    #[must_use]
    pub const fn access_word(self) -> u16 {
        let read = match self.access {
            Access::Read | Access::Exec => 0x10,
            Access::Write => 0,
        };
        let not_instruction = match self.access {
            Access::Exec => 0,
            Access::Read | Access::Write => 0x08,
        };
        read | not_instruction | self.fc.bits() as u16
    }
}

impl fmt::Display for BusCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {:#010x} ({:?})", self.access, self.addr, self.fc)
    }
}

/// A fault raised while executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("bus error: {0}")]
    BusError(BusCycle),
    #[error("address error: {0}")]
    AddressError(BusCycle),
    #[error("privilege violation")]
    PrivilegeViolation,
    #[error("illegal instruction")]
    IllegalInstruction,
    #[error("line 1010 emulator")]
    LineA,
    #[error("line 1111 emulator")]
    LineF,
    #[error("trap #{0}")]
    Trap(u8),
    #[error("trapv")]
    TrapV,
    #[error("stack frame format error")]
    FormatError,
}

impl Fault {
    /// Exception vector number.
    #[must_use]
    pub const fn vector(self) -> u8 {
        match self {
            Self::BusError(_) => 2,
            Self::AddressError(_) => 3,
            Self::IllegalInstruction => 4,
            Self::TrapV => 7,
            Self::PrivilegeViolation => 8,
            Self::LineA => 10,
            Self::LineF => 11,
            Self::FormatError => 14,
            Self::Trap(n) => 32 + (n & 0x0F),
        }
    }

    /// Byte offset of the vector in the vector table.
    #[must_use]
    pub const fn vector_offset(self) -> u16 {
        self.vector() as u16 * 4
    }

    /// Fault for an opcode with no decode-table entry.
    #[must_use]
    pub const fn unimplemented(opcode: u16) -> Self {
        match opcode >> 12 {
            0xA => Self::LineA,
            0xF => Self::LineF,
            _ => Self::IllegalInstruction,
        }
    }
}

/// What to do with bus and address errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FaultPolicy {
    /// Stop executing instructions.
    #[default]
    Halt,
    /// Stack a long frame and jump through vector 2 or 3.
    Vector,
}

impl<M: Memory> Processor<M> {
    /// Route a fault from the current step.
    pub(crate) fn raise(&mut self, fault: Fault) {
        match fault {
            Fault::BusError(cycle) | Fault::AddressError(cycle) => {
                debug!("{fault} in {:#06x} at {:#010x}", self.opcode(), self.instruction_address());
                match self.fault_policy() {
                    FaultPolicy::Halt => {
                        if matches!(fault, Fault::BusError(_)) {
                            self.bus_error();
                        } else {
                            self.address_error();
                        }
                    }
                    FaultPolicy::Vector => {
                        let address = self.instruction_address();
                        self.take_exception_format_6(fault.vector_offset(), address, cycle);
                    }
                }
            }
            Fault::FormatError => self.format_error(),
            Fault::Trap(_) | Fault::TrapV => {
                debug!("{fault} at {:#010x}", self.instruction_address());
                self.take_exception_format_0(fault.vector_offset());
            }
            Fault::PrivilegeViolation | Fault::IllegalInstruction | Fault::LineA | Fault::LineF => {
                debug!(
                    "{fault}: opcode {:#06x} at {:#010x}",
                    self.opcode(),
                    self.instruction_address()
                );
                self.regs.pc = self.instruction_address();
                self.take_exception_format_0(fault.vector_offset());
            }
        }
    }

    /// Bus error entry point: halts and yields the value of the failed
    /// transfer, which is always zero.
    pub fn bus_error(&mut self) -> u32 {
        self.halt();
        0
    }

    /// Address error entry point: halts and yields zero.
    pub fn address_error(&mut self) -> u32 {
        self.halt();
        0
    }

    /// RTE found a frame format it does not understand.
    pub fn format_error(&mut self) {
        warn!("unrecognised exception frame format");
        self.halt();
    }

    /// Stack a short frame and jump through `vector_offset`.
    ///
    /// Returns `false` if the frame could not be written or the vector could
    /// not be read, in which case the processor is halted.
    pub fn take_exception_format_0(&mut self, vector_offset: u16) -> bool {
        let sr = self.enter_exception();
        let stacked = self.stack_short_frame(sr, vector_offset);
        self.finish_exception(stacked)
    }

    /// Stack a long frame describing the faulted bus cycle and jump through
    /// `vector_offset`.
    pub fn take_exception_format_6(
        &mut self,
        vector_offset: u16,
        instruction_address: u32,
        cycle: BusCycle,
    ) -> bool {
        let sr = self.enter_exception();
        let stacked = self.stack_long_frame(sr, vector_offset, instruction_address, cycle);
        self.finish_exception(stacked)
    }

    /// Return from exception: restore SR and PC from the frame at SP.
    ///
    /// On models with a format word, only formats 0 and 6 are accepted.
    pub(crate) fn return_from_exception(&mut self) -> Result<(), Fault> {
        let sp = self.regs.a(7);
        let sr = self.read_mem(sp, Size::Word)? as u16;
        let pc = self.read_mem(sp.wrapping_add(2), Size::Long)?;
        let frame_len = if self.model().capabilities().format_word {
            let format = self.read_mem(sp.wrapping_add(6), Size::Word)? >> 12;
            match format {
                0 => 8,
                6 => 20,
                _ => return Err(Fault::FormatError),
            }
        } else {
            6
        };

        self.regs.set_a(7, sp.wrapping_add(frame_len));
        self.regs.set_sr(sr, self.model().sr_mask());
        self.regs.pc = pc;
        Ok(())
    }

    /// Switch to supervisor mode with tracing off. Returns the old SR.
    fn enter_exception(&mut self) -> u16 {
        let sr = self.regs.sr;
        self.regs.sr = (sr | crate::flags::S) & !crate::flags::TRACE_MASK;
        sr
    }

    fn stack_short_frame(&mut self, sr: u16, vector_offset: u16) -> Result<(), Fault> {
        let pc = self.regs.pc;
        if self.model().capabilities().format_word {
            self.push_word(vector_offset & 0x0FFF)?;
        }
        self.push_long(pc)?;
        self.push_word(sr)?;
        self.jump_to_vector(vector_offset)
    }

    fn stack_long_frame(
        &mut self,
        sr: u16,
        vector_offset: u16,
        instruction_address: u32,
        cycle: BusCycle,
    ) -> Result<(), Fault> {
        let pc = self.regs.pc;
        let ir = self.opcode();
        if self.model().capabilities().format_word {
            self.push_word(ir)?;
            self.push_word(cycle.access_word())?;
            self.push_long(cycle.addr)?;
            self.push_long(instruction_address)?;
            self.push_word(0x6000 | (vector_offset & 0x0FFF))?;
            self.push_long(pc)?;
            self.push_word(sr)?;
        } else {
            self.push_long(pc)?;
            self.push_word(sr)?;
            self.push_word(ir)?;
            self.push_long(cycle.addr)?;
            self.push_word(cycle.access_word())?;
        }
        self.jump_to_vector(vector_offset)
    }

    /// Load PC from the vector table. Models without a VBR use a table at 0.
    fn jump_to_vector(&mut self, vector_offset: u16) -> Result<(), Fault> {
        let base = if self.model().capabilities().vbr {
            self.regs.vbr
        } else {
            0
        };
        let addr = base.wrapping_add(u32::from(vector_offset));
        let fc = FunctionCode::SupervisorData;
        self.regs.pc = self
            .mem
            .get_long(addr, fc)
            .map_err(|_| Fault::BusError(BusCycle { addr, access: Access::Read, fc }))?;
        Ok(())
    }

    fn finish_exception(&mut self, stacked: Result<(), Fault>) -> bool {
        match stacked {
            Ok(()) => {
                debug!("exception handler at {:#010x}", self.regs.pc);
                true
            }
            Err(fault) => {
                warn!("double fault while stacking exception frame: {fault}");
                self.halt();
                false
            }
        }
    }
}
