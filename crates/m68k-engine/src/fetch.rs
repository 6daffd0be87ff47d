//! Operand fetchers and the parameter block they fill.
//!
//! Each decode-table entry names a [`Fetch`] shape. Running it consumes the
//! instruction's extension words and produces up to four [`Operand`]s for
//! the paired microcode. Slot layout per shape is documented on the variant.

use std::ops::Index;

use crate::alu::Size;
use crate::ea::AddrMode;
use crate::exceptions::Fault;
use crate::memory::Memory;
use crate::processor::Processor;

/// Capacity of a parameter block.
pub const MAX_PARAMS: usize = 4;

/// One resolved operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operand {
    #[default]
    Empty,
    /// Data register Dn.
    Data(u8),
    /// Address register An (A7 is the active stack pointer).
    Addr(u8),
    /// Data-space address.
    Memory(u32),
    /// Program-space address (PC-relative modes). Read-only.
    PcRelative(u32),
    Immediate(u32),
    Size(Size),
}

impl Operand {
    /// Numeric payload of an immediate or an address; zero otherwise.
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::Immediate(v) | Self::Memory(v) | Self::PcRelative(v) => v,
            _ => 0,
        }
    }

    /// Operation size carried in a `Size` slot; long otherwise.
    #[must_use]
    pub const fn size(self) -> Size {
        match self {
            Self::Size(size) => size,
            _ => Size::Long,
        }
    }

    /// 4-bit register code (0-7 = Dn, 8-15 = An) for register operands.
    #[must_use]
    pub const fn reg_code(self) -> Option<u8> {
        match self {
            Self::Data(n) => Some(n),
            Self::Addr(n) => Some(n | 8),
            _ => None,
        }
    }
}

/// Fixed-capacity operand block, alive for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    slots: [Operand; MAX_PARAMS],
    len: usize,
}

impl Params {
    fn push(&mut self, operand: Operand) {
        debug_assert!(self.len < MAX_PARAMS);
        if let Some(slot) = self.slots.get_mut(self.len) {
            *slot = operand;
            self.len += 1;
        }
    }

    fn of<const N: usize>(operands: [Operand; N]) -> Self {
        let mut params = Self::default();
        for operand in operands {
            params.push(operand);
        }
        params
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Operand] {
        &self.slots[..self.len]
    }
}

impl Index<usize> for Params {
    type Output = Operand;

    fn index(&self, index: usize) -> &Operand {
        &self.slots[index]
    }
}

/// Operand shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// No operands.
    None,
    /// `[#sext8, Dn]`
    Moveq,
    /// `[Rx, Ry]` by opmode.
    Exg,
    /// `[An, #sext16]`
    Link,
    /// `[An, #long]`
    LinkLong,
    /// `[An]` from bits 2-0.
    AddrRegister,
    /// `[Dn]` from bits 2-0.
    DataRegister,
    /// `[Dn, d16(An), size]`
    Movep,
    /// `[#word]`
    ImmediateWord,
    /// `[#vector]` from bits 3-0.
    TrapVector,
    /// `[#n]` from bits 2-0.
    BreakpointNumber,
    /// `[#cc, #target]`
    Branch,
    /// `[#cc, Dn, #target]`
    DecrementBranch,
    /// `[#cc, <ea>]`, byte sized.
    SetCondition,
    /// `[address]`
    Control,
    /// `[address, An]`
    LoadAddress,
    /// `[size, <ea>]`
    Unary,
    /// `[size, <src>, <dst>]`
    Move,
    /// `[size, <src>, An]`
    MoveAddress,
    /// `[size, #1-8, <ea>]`
    Quick,
    /// `[size, <ea>, Dn]` or `[size, Dn, <ea>]` by opmode bit 8.
    RegisterEa,
    /// `[size, <ea>, An]`, word or long by opmode bit 8.
    AddressEa,
    /// `[size, #imm, <ea>]`
    ImmediateEa,
    /// `[word, <ea>]` for SR and CCR transfers.
    StatusWord,
    /// `[#control register, Rn]` from the extension word.
    ControlRegister,
}

/// Size field in bits 7-6.
fn size_76(opcode: u16) -> Size {
    Size::from_bits(opcode >> 6).unwrap_or(Size::Long)
}

fn ea_low(opcode: u16) -> Result<AddrMode, Fault> {
    AddrMode::from_opcode(opcode).ok_or(Fault::IllegalInstruction)
}

/// Register field in bits 11-9.
const fn reg_hi(opcode: u16) -> u8 {
    ((opcode >> 9) & 7) as u8
}

const fn reg_lo(opcode: u16) -> u8 {
    (opcode & 7) as u8
}

impl<M: Memory> Processor<M> {
    /// Run a fetcher against the current opcode.
    pub(crate) fn fetch_operands(&mut self, fetch: Fetch) -> Result<Params, Fault> {
        let op = self.opcode();
        let params = match fetch {
            Fetch::None => Params::default(),
            Fetch::Moveq => Params::of([
                Operand::Immediate(Size::Byte.sign_extend(u32::from(op))),
                Operand::Data(reg_hi(op)),
            ]),
            Fetch::Exg => {
                let (x, y) = match (op >> 3) & 0x1F {
                    0x08 => (Operand::Data(reg_hi(op)), Operand::Data(reg_lo(op))),
                    0x09 => (Operand::Addr(reg_hi(op)), Operand::Addr(reg_lo(op))),
                    _ => (Operand::Data(reg_hi(op)), Operand::Addr(reg_lo(op))),
                };
                Params::of([x, y])
            }
            Fetch::Link => {
                let disp = Size::Word.sign_extend(u32::from(self.fetch_word()?));
                Params::of([Operand::Addr(reg_lo(op)), Operand::Immediate(disp)])
            }
            Fetch::LinkLong => {
                let disp = self.fetch_long()?;
                Params::of([Operand::Addr(reg_lo(op)), Operand::Immediate(disp)])
            }
            Fetch::AddrRegister => Params::of([Operand::Addr(reg_lo(op))]),
            Fetch::DataRegister => Params::of([Operand::Data(reg_lo(op))]),
            Fetch::Movep => {
                let disp = self.fetch_word()? as i16;
                let addr = self
                    .regs
                    .a(reg_lo(op).into())
                    .wrapping_add_signed(disp.into());
                let size = if op & 0x0040 != 0 { Size::Long } else { Size::Word };
                Params::of([
                    Operand::Data(reg_hi(op)),
                    Operand::Memory(addr),
                    Operand::Size(size),
                ])
            }
            Fetch::ImmediateWord => {
                Params::of([Operand::Immediate(u32::from(self.fetch_word()?))])
            }
            Fetch::TrapVector => Params::of([Operand::Immediate(u32::from(op & 0x0F))]),
            Fetch::BreakpointNumber => Params::of([Operand::Immediate(u32::from(op & 0x07))]),
            Fetch::Branch => {
                let target = self.branch_target(op)?;
                Params::of([
                    Operand::Immediate(u32::from((op >> 8) & 0x0F)),
                    Operand::Immediate(target),
                ])
            }
            Fetch::DecrementBranch => {
                let base = self.regs.pc;
                let disp = self.fetch_word()? as i16;
                Params::of([
                    Operand::Immediate(u32::from((op >> 8) & 0x0F)),
                    Operand::Data(reg_lo(op)),
                    Operand::Immediate(base.wrapping_add_signed(disp.into())),
                ])
            }
            Fetch::SetCondition => {
                let dst = self.resolve_ea(ea_low(op)?, Size::Byte)?;
                Params::of([Operand::Immediate(u32::from((op >> 8) & 0x0F)), dst])
            }
            Fetch::Control => Params::of([Operand::Memory(self.control_address(ea_low(op)?)?)]),
            Fetch::LoadAddress => {
                let addr = self.control_address(ea_low(op)?)?;
                Params::of([Operand::Memory(addr), Operand::Addr(reg_hi(op))])
            }
            Fetch::Unary => {
                let size = size_76(op);
                let dst = self.resolve_ea(ea_low(op)?, size)?;
                Params::of([Operand::Size(size), dst])
            }
            Fetch::Move => {
                let size = Size::from_move_bits(op >> 12).ok_or(Fault::IllegalInstruction)?;
                let src = self.resolve_ea(ea_low(op)?, size)?;
                let dst_mode =
                    AddrMode::from_move_destination(op).ok_or(Fault::IllegalInstruction)?;
                let dst = self.resolve_ea(dst_mode, size)?;
                Params::of([Operand::Size(size), src, dst])
            }
            Fetch::MoveAddress => {
                let size = Size::from_move_bits(op >> 12).ok_or(Fault::IllegalInstruction)?;
                let src = self.resolve_ea(ea_low(op)?, size)?;
                Params::of([Operand::Size(size), src, Operand::Addr(reg_hi(op))])
            }
            Fetch::Quick => {
                let size = size_76(op);
                let data = match reg_hi(op) {
                    0 => 8,
                    n => u32::from(n),
                };
                let dst = self.resolve_ea(ea_low(op)?, size)?;
                Params::of([Operand::Size(size), Operand::Immediate(data), dst])
            }
            Fetch::RegisterEa => {
                let size = size_76(op);
                let ea = self.resolve_ea(ea_low(op)?, size)?;
                let dn = Operand::Data(reg_hi(op));
                if op & 0x0100 == 0 {
                    Params::of([Operand::Size(size), ea, dn])
                } else {
                    Params::of([Operand::Size(size), dn, ea])
                }
            }
            Fetch::AddressEa => {
                let size = if op & 0x0100 == 0 { Size::Word } else { Size::Long };
                let src = self.resolve_ea(ea_low(op)?, size)?;
                Params::of([Operand::Size(size), src, Operand::Addr(reg_hi(op))])
            }
            Fetch::ImmediateEa => {
                let size = size_76(op);
                let imm = self.fetch_immediate(size)?;
                let dst = self.resolve_ea(ea_low(op)?, size)?;
                Params::of([Operand::Size(size), Operand::Immediate(imm), dst])
            }
            Fetch::StatusWord => {
                let ea = self.resolve_ea(ea_low(op)?, Size::Word)?;
                Params::of([Operand::Size(Size::Word), ea])
            }
            Fetch::ControlRegister => {
                let ext = self.fetch_word()?;
                let n = ((ext >> 12) & 7) as u8;
                let reg = if ext & 0x8000 != 0 {
                    Operand::Addr(n)
                } else {
                    Operand::Data(n)
                };
                Params::of([Operand::Immediate(u32::from(ext & 0x0FFF)), reg])
            }
        };
        Ok(params)
    }

    /// Bcc/BRA/BSR target. The base is the address following the opcode.
    ///
    /// An 8-bit displacement of 0 selects a 16-bit extension word; on the
    /// 68020 and later 0xFF selects a 32-bit one.
    fn branch_target(&mut self, op: u16) -> Result<u32, Fault> {
        let base = self.regs.pc;
        let disp = match op as u8 {
            0x00 => i32::from(self.fetch_word()? as i16),
            0xFF if self.model().capabilities().ext_020 => self.fetch_long()? as i32,
            d => i32::from(d as i8),
        };
        Ok(base.wrapping_add_signed(disp))
    }
}
