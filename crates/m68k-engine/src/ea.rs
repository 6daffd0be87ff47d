//! Addressing modes and effective address resolution.
//!
//! Resolution happens while operands are fetched: extension words are
//! consumed from the instruction stream, (An)+ and -(An) update the
//! register, and the result is an [`Operand`] naming a register, a memory
//! address, or an immediate value. Nothing is read from the target here.

use crate::alu::Size;
use crate::exceptions::Fault;
use crate::fetch::Operand;
use crate::memory::Memory;
use crate::processor::Processor;

/// The twelve 68000 addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// Dn
    DataReg(u8),
    /// An
    AddrReg(u8),
    /// (An)
    AddrInd(u8),
    /// (An)+
    AddrIndPostInc(u8),
    /// -(An)
    AddrIndPreDec(u8),
    /// d16(An)
    AddrIndDisp(u8),
    /// d8(An,Xn)
    AddrIndIndex(u8),
    /// (xxx).W
    AbsShort,
    /// (xxx).L
    AbsLong,
    /// d16(PC)
    PcDisp,
    /// d8(PC,Xn)
    PcIndex,
    /// #imm
    Immediate,
}

impl AddrMode {
    /// Decode the 3-bit mode and register fields.
    #[must_use]
    pub fn decode(mode: u16, reg: u16) -> Option<Self> {
        let r = (reg & 7) as u8;
        match mode & 7 {
            0 => Some(Self::DataReg(r)),
            1 => Some(Self::AddrReg(r)),
            2 => Some(Self::AddrInd(r)),
            3 => Some(Self::AddrIndPostInc(r)),
            4 => Some(Self::AddrIndPreDec(r)),
            5 => Some(Self::AddrIndDisp(r)),
            6 => Some(Self::AddrIndIndex(r)),
            _ => match r {
                0 => Some(Self::AbsShort),
                1 => Some(Self::AbsLong),
                2 => Some(Self::PcDisp),
                3 => Some(Self::PcIndex),
                4 => Some(Self::Immediate),
                _ => None,
            },
        }
    }

    /// Mode from the low six bits of an opcode.
    #[must_use]
    pub fn from_opcode(opcode: u16) -> Option<Self> {
        Self::decode(opcode >> 3, opcode)
    }

    /// Mode from the destination field of MOVE (bits 11-6, reg/mode swapped).
    #[must_use]
    pub fn from_move_destination(opcode: u16) -> Option<Self> {
        Self::decode(opcode >> 6, opcode >> 9)
    }

    /// Anything but An.
    #[must_use]
    pub fn is_data(self) -> bool {
        !matches!(self, Self::AddrReg(_))
    }

    /// Anything but Dn and An.
    #[must_use]
    pub fn is_memory(self) -> bool {
        !matches!(self, Self::DataReg(_) | Self::AddrReg(_))
    }

    /// Modes that name an address without an implied access size.
    #[must_use]
    pub fn is_control(self) -> bool {
        matches!(
            self,
            Self::AddrInd(_)
                | Self::AddrIndDisp(_)
                | Self::AddrIndIndex(_)
                | Self::AbsShort
                | Self::AbsLong
                | Self::PcDisp
                | Self::PcIndex
        )
    }

    #[must_use]
    pub fn is_alterable(self) -> bool {
        !matches!(self, Self::PcDisp | Self::PcIndex | Self::Immediate)
    }

    #[must_use]
    pub fn is_data_alterable(self) -> bool {
        self.is_data() && self.is_alterable()
    }

    #[must_use]
    pub fn is_memory_alterable(self) -> bool {
        self.is_memory() && self.is_alterable()
    }
}

impl<M: Memory> Processor<M> {
    /// Resolve `mode` for an access of `size`.
    pub(crate) fn resolve_ea(&mut self, mode: AddrMode, size: Size) -> Result<Operand, Fault> {
        let operand = match mode {
            AddrMode::DataReg(r) => Operand::Data(r),
            AddrMode::AddrReg(r) => Operand::Addr(r),
            AddrMode::AddrInd(r) => Operand::Memory(self.regs.a(r.into())),
            AddrMode::AddrIndPostInc(r) => {
                let addr = self.regs.a(r.into());
                self.regs
                    .set_a(r.into(), addr.wrapping_add(step_for(r, size)));
                Operand::Memory(addr)
            }
            AddrMode::AddrIndPreDec(r) => {
                let addr = self.regs.a(r.into()).wrapping_sub(step_for(r, size));
                self.regs.set_a(r.into(), addr);
                Operand::Memory(addr)
            }
            AddrMode::AddrIndDisp(r) => {
                let disp = self.fetch_word()? as i16;
                Operand::Memory(self.regs.a(r.into()).wrapping_add_signed(disp.into()))
            }
            AddrMode::AddrIndIndex(r) => {
                let base = self.regs.a(r.into());
                Operand::Memory(self.index_ea(base)?)
            }
            AddrMode::AbsShort => Operand::Memory(self.fetch_word()? as i16 as u32),
            AddrMode::AbsLong => Operand::Memory(self.fetch_long()?),
            AddrMode::PcDisp => {
                let base = self.regs.pc;
                let disp = self.fetch_word()? as i16;
                Operand::PcRelative(base.wrapping_add_signed(disp.into()))
            }
            AddrMode::PcIndex => {
                let base = self.regs.pc;
                Operand::PcRelative(self.index_ea(base)?)
            }
            AddrMode::Immediate => Operand::Immediate(self.fetch_immediate(size)?),
        };
        Ok(operand)
    }

    /// Resolve a control mode to its address.
    pub(crate) fn control_address(&mut self, mode: AddrMode) -> Result<u32, Fault> {
        match self.resolve_ea(mode, Size::Long)? {
            Operand::Memory(addr) | Operand::PcRelative(addr) => Ok(addr),
            _ => Err(Fault::IllegalInstruction),
        }
    }

    /// Immediate data of `size`; a byte occupies the low half of a word.
    pub(crate) fn fetch_immediate(&mut self, size: Size) -> Result<u32, Fault> {
        match size {
            Size::Byte => Ok(u32::from(self.fetch_word()? & 0xFF)),
            Size::Word => Ok(u32::from(self.fetch_word()?)),
            Size::Long => self.fetch_long(),
        }
    }

    /// base + d8 + Xn, consuming a brief extension word.
    ///
    /// The 68020 and later honor the scale field. The full extension format
    /// is not supported and decodes as an illegal instruction.
    fn index_ea(&mut self, base: u32) -> Result<u32, Fault> {
        let ext = self.fetch_word()?;
        let disp = i32::from(ext as u8 as i8);
        let xn = self.regs.reg((ext >> 12) as u8 & 0x0F);
        let xn = if ext & 0x0800 != 0 {
            xn as i32
        } else {
            i32::from(xn as u16 as i16)
        };

        let scale = if self.model().capabilities().ext_020 {
            if ext & 0x0100 != 0 {
                return Err(Fault::IllegalInstruction);
            }
            (ext >> 9) & 3
        } else {
            0
        };

        Ok(base
            .wrapping_add_signed(disp)
            .wrapping_add_signed(xn.wrapping_shl(scale.into())))
    }
}

/// Post-increment / pre-decrement step. Byte accesses keep A7 even.
const fn step_for(r: u8, size: Size) -> u32 {
    if r == 7 && matches!(size, Size::Byte) {
        2
    } else {
        size.bytes()
    }
}
