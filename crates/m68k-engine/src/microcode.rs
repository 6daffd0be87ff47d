//! Instruction semantics.
//!
//! Each [`Op`] names one instruction family. Handlers receive operands
//! already resolved by the paired fetcher (see [`Fetch`](crate::fetch::Fetch)
//! for slot layouts) and mutate registers, memory and condition codes. A
//! handler that faults returns at the fault; whatever it wrote before that
//! point stays written.

use log::debug;

use crate::alu::{self, Size};
use crate::exceptions::Fault;
use crate::fetch::{Operand, Params};
use crate::flags::{C, CCR_MASK, N, V, Status, Z};
use crate::memory::{FunctionCode, Memory};
use crate::processor::Processor;

/// Microcode tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Moveq,
    Exg,
    Link,
    Unlk,
    MoveToUsp,
    MoveFromUsp,
    MovepToMemory,
    MovepFromMemory,

    Stop,
    Bkpt,
    Illegal,
    Reset,
    Trap,
    Trapv,
    Rte,
    Rts,
    Rtr,
    Rtd,
    Jmp,
    Jsr,
    Lea,
    Pea,
    Bcc,
    Bsr,
    Dbcc,
    Scc,

    Move,
    Movea,
    Swap,
    ExtW,
    ExtL,
    Extb,
    Clr,
    Tst,
    Neg,
    Not,

    MoveFromSr,
    MoveToSr,
    MoveFromCcr,
    MoveToCcr,
    OriToCcr,
    AndiToCcr,
    EoriToCcr,
    OriToSr,
    AndiToSr,
    EoriToSr,
    MovecFrom,
    MovecTo,

    Add,
    Sub,
    Cmp,
    And,
    Or,
    Eor,
    Adda,
    Suba,
    Cmpa,
}

/// MOVEC control register codes.
const CR_SFC: u32 = 0x000;
const CR_DFC: u32 = 0x001;
const CR_CACR: u32 = 0x002;
const CR_USP: u32 = 0x800;
const CR_VBR: u32 = 0x801;

impl<M: Memory> Processor<M> {
    pub(crate) fn run_microcode(&mut self, op: Op, p: &Params) -> Result<(), Fault> {
        match op {
            Op::Nop => Ok(()),
            Op::Moveq => {
                let value = p[0].value();
                self.write_operand(p[1], Size::Long, value)?;
                self.regs.sr = Status::logical(self.regs.sr, value, Size::Long);
                Ok(())
            }
            Op::Exg => {
                let (x, y) = reg_pair(p)?;
                let tmp = self.regs.reg(x);
                self.regs.set_reg(x, self.regs.reg(y));
                self.regs.set_reg(y, tmp);
                Ok(())
            }
            Op::Link => self.link(p),
            Op::Unlk => self.unlk(p),
            Op::MoveToUsp => {
                self.regs.usp = self.read_operand(p[0], Size::Long)?;
                Ok(())
            }
            Op::MoveFromUsp => self.write_operand(p[0], Size::Long, self.regs.usp),
            Op::MovepToMemory => self.movep_to_memory(p),
            Op::MovepFromMemory => self.movep_from_memory(p),

            Op::Stop => {
                self.regs.set_sr(p[0].value() as u16, self.model().sr_mask());
                self.stop();
                Ok(())
            }
            Op::Bkpt => {
                self.breakpoint(p[0].value() as u8);
                Ok(())
            }
            Op::Illegal => Err(Fault::IllegalInstruction),
            Op::Reset => {
                debug!("RESET asserted at {:#010x}", self.instruction_address());
                Ok(())
            }
            Op::Trap => Err(Fault::Trap(p[0].value() as u8)),
            Op::Trapv => {
                if self.regs.sr & V != 0 {
                    Err(Fault::TrapV)
                } else {
                    Ok(())
                }
            }
            Op::Rte => self.return_from_exception(),
            Op::Rts => {
                self.regs.pc = self.pop_long()?;
                Ok(())
            }
            Op::Rtr => {
                let ccr = self.pop_word()?;
                let pc = self.pop_long()?;
                self.regs.set_ccr(ccr as u8);
                self.regs.pc = pc;
                Ok(())
            }
            Op::Rtd => {
                let pc = self.pop_long()?;
                let sp = self.regs.a(7);
                self.regs
                    .set_a(7, sp.wrapping_add(Size::Word.sign_extend(p[0].value())));
                self.regs.pc = pc;
                Ok(())
            }
            Op::Jmp => {
                self.regs.pc = p[0].value();
                Ok(())
            }
            Op::Jsr | Op::Bsr => {
                let target = p[p.len() - 1].value();
                self.push_long(self.regs.pc)?;
                self.regs.pc = target;
                Ok(())
            }
            Op::Lea => self.write_operand(p[1], Size::Long, p[0].value()),
            Op::Pea => self.push_long(p[0].value()),
            Op::Bcc => {
                if Status::condition(self.regs.sr, p[0].value() as u8) {
                    self.regs.pc = p[1].value();
                }
                Ok(())
            }
            Op::Dbcc => {
                if !Status::condition(self.regs.sr, p[0].value() as u8) {
                    let count = self.read_operand(p[1], Size::Word)?.wrapping_sub(1) & 0xFFFF;
                    self.write_operand(p[1], Size::Word, count)?;
                    if count != 0xFFFF {
                        self.regs.pc = p[2].value();
                    }
                }
                Ok(())
            }
            Op::Scc => {
                let set = Status::condition(self.regs.sr, p[0].value() as u8);
                self.write_operand(p[1], Size::Byte, if set { 0xFF } else { 0 })
            }

            Op::Move => {
                let size = p[0].size();
                let value = self.read_operand(p[1], size)?;
                self.write_operand(p[2], size, value)?;
                self.regs.sr = Status::logical(self.regs.sr, value, size);
                Ok(())
            }
            Op::Movea => {
                let size = p[0].size();
                let value = size.sign_extend(self.read_operand(p[1], size)?);
                self.write_operand(p[2], Size::Long, value)
            }
            Op::Swap => {
                let value = self.read_operand(p[0], Size::Long)?.rotate_left(16);
                self.write_operand(p[0], Size::Long, value)?;
                self.regs.sr = Status::logical(self.regs.sr, value, Size::Long);
                Ok(())
            }
            Op::ExtW => self.extend(p[0], Size::Byte, Size::Word),
            Op::ExtL => self.extend(p[0], Size::Word, Size::Long),
            Op::Extb => self.extend(p[0], Size::Byte, Size::Long),
            Op::Clr => {
                self.write_operand(p[1], p[0].size(), 0)?;
                self.regs.sr = (self.regs.sr & !(N | V | C)) | Z;
                Ok(())
            }
            Op::Tst => {
                let size = p[0].size();
                let value = self.read_operand(p[1], size)?;
                self.regs.sr = Status::logical(self.regs.sr, value, size);
                Ok(())
            }
            Op::Neg => {
                let size = p[0].size();
                let value = self.read_operand(p[1], size)?;
                let (result, sr) = alu::neg(value, size, self.regs.sr);
                self.write_operand(p[1], size, result)?;
                self.regs.sr = sr;
                Ok(())
            }
            Op::Not => {
                let size = p[0].size();
                let result = !self.read_operand(p[1], size)? & size.mask();
                self.write_operand(p[1], size, result)?;
                self.regs.sr = Status::logical(self.regs.sr, result, size);
                Ok(())
            }

            Op::MoveFromSr => self.write_operand(p[1], Size::Word, u32::from(self.regs.sr)),
            Op::MoveFromCcr => {
                self.write_operand(p[1], Size::Word, u32::from(self.regs.ccr()))
            }
            Op::MoveToCcr => {
                let value = self.read_operand(p[1], Size::Word)?;
                self.regs.set_ccr(value as u8);
                Ok(())
            }
            Op::MoveToSr => {
                let value = self.read_operand(p[1], Size::Word)?;
                self.regs.set_sr(value as u16, self.model().sr_mask());
                Ok(())
            }
            Op::OriToCcr => self.update_ccr(|ccr, imm| ccr | imm, p),
            Op::AndiToCcr => self.update_ccr(|ccr, imm| ccr & imm, p),
            Op::EoriToCcr => self.update_ccr(|ccr, imm| ccr ^ imm, p),
            Op::OriToSr => self.update_sr(|sr, imm| sr | imm, p),
            Op::AndiToSr => self.update_sr(|sr, imm| sr & imm, p),
            Op::EoriToSr => self.update_sr(|sr, imm| sr ^ imm, p),
            Op::MovecFrom => {
                let value = self.control_register(p[0].value())?;
                self.write_operand(p[1], Size::Long, value)
            }
            Op::MovecTo => {
                let value = self.read_operand(p[1], Size::Long)?;
                self.set_control_register(p[0].value(), value)
            }

            Op::Add | Op::Sub => self.add_sub(op == Op::Add, p),
            Op::Cmp => {
                let size = p[0].size();
                let src = self.read_operand(p[1], size)?;
                let dst = self.read_operand(p[2], size)?;
                self.regs.sr = alu::cmp(src, dst, size, self.regs.sr);
                Ok(())
            }
            Op::And => self.logical(p, |s, d| s & d),
            Op::Or => self.logical(p, |s, d| s | d),
            Op::Eor => self.logical(p, |s, d| s ^ d),
            Op::Adda | Op::Suba => {
                let size = p[0].size();
                let src = size.sign_extend(self.read_operand(p[1], size)?);
                let dst = self.read_operand(p[2], Size::Long)?;
                let result = if op == Op::Adda {
                    dst.wrapping_add(src)
                } else {
                    dst.wrapping_sub(src)
                };
                self.write_operand(p[2], Size::Long, result)
            }
            Op::Cmpa => {
                let size = p[0].size();
                let src = size.sign_extend(self.read_operand(p[1], size)?);
                let dst = self.read_operand(p[2], Size::Long)?;
                self.regs.sr = alu::cmp(src, dst, Size::Long, self.regs.sr);
                Ok(())
            }
        }
    }

    /// LINK An,#d: SP -= 4, (SP) = An, An = SP, SP += d.
    ///
    /// An is read after the decrement, so LINK A7 stores the new SP.
    fn link(&mut self, p: &Params) -> Result<(), Fault> {
        let an = p[0];
        let sp = self.regs.a(7).wrapping_sub(4);
        let value = if an == Operand::Addr(7) {
            sp
        } else {
            self.read_operand(an, Size::Long)?
        };
        self.write_mem(sp, Size::Long, value)?;
        self.regs.set_a(7, sp);
        self.write_operand(an, Size::Long, sp)?;
        self.regs.set_a(7, sp.wrapping_add(p[1].value()));
        Ok(())
    }

    /// UNLK An: SP = An, An = pop.
    fn unlk(&mut self, p: &Params) -> Result<(), Fault> {
        let frame = self.read_operand(p[0], Size::Long)?;
        let saved = self.read_mem(frame, Size::Long)?;
        self.regs.set_a(7, frame.wrapping_add(4));
        self.write_operand(p[0], Size::Long, saved)
    }

    /// MOVEP Dn,d(An): the register's bytes go to every other address, high
    /// byte first.
    fn movep_to_memory(&mut self, p: &Params) -> Result<(), Fault> {
        let value = self.read_operand(p[0], Size::Long)?;
        let addr = p[1].value();
        let count = p[2].size().bytes();
        for i in 0..count {
            let shift = (count - 1 - i) * 8;
            self.write_mem(addr.wrapping_add(i * 2), Size::Byte, value >> shift)?;
        }
        Ok(())
    }

    fn movep_from_memory(&mut self, p: &Params) -> Result<(), Fault> {
        let addr = p[1].value();
        let size = p[2].size();
        let mut value = 0;
        for i in 0..size.bytes() {
            value = (value << 8) | self.read_mem(addr.wrapping_add(i * 2), Size::Byte)?;
        }
        self.write_operand(p[0], size, value)
    }

    /// Sign-extend the low `from` bits of Dn to `to`.
    fn extend(&mut self, dn: Operand, from: Size, to: Size) -> Result<(), Fault> {
        let value = from.sign_extend(self.read_operand(dn, from)?) & to.mask();
        self.write_operand(dn, to, value)?;
        self.regs.sr = Status::logical(self.regs.sr, value, to);
        Ok(())
    }

    /// ADD/SUB and their immediate and quick forms. An destinations use
    /// the whole register and leave the flags alone.
    fn add_sub(&mut self, add: bool, p: &Params) -> Result<(), Fault> {
        let size = p[0].size();
        if let Operand::Addr(_) = p[2] {
            let src = size.sign_extend(self.read_operand(p[1], size)?);
            let dst = self.read_operand(p[2], Size::Long)?;
            let result = if add {
                dst.wrapping_add(src)
            } else {
                dst.wrapping_sub(src)
            };
            return self.write_operand(p[2], Size::Long, result);
        }

        let src = self.read_operand(p[1], size)?;
        let dst = self.read_operand(p[2], size)?;
        let (result, sr) = if add {
            alu::add(src, dst, size, self.regs.sr)
        } else {
            alu::sub(src, dst, size, self.regs.sr)
        };
        self.write_operand(p[2], size, result)?;
        self.regs.sr = sr;
        Ok(())
    }

    fn logical(&mut self, p: &Params, f: impl Fn(u32, u32) -> u32) -> Result<(), Fault> {
        let size = p[0].size();
        let src = self.read_operand(p[1], size)?;
        let dst = self.read_operand(p[2], size)?;
        let result = f(src, dst) & size.mask();
        self.write_operand(p[2], size, result)?;
        self.regs.sr = Status::logical(self.regs.sr, result, size);
        Ok(())
    }

    fn update_ccr(&mut self, f: impl Fn(u16, u16) -> u16, p: &Params) -> Result<(), Fault> {
        let ccr = f(u16::from(self.regs.ccr()), p[0].value() as u16) & CCR_MASK;
        self.regs.set_ccr(ccr as u8);
        Ok(())
    }

    fn update_sr(&mut self, f: impl Fn(u16, u16) -> u16, p: &Params) -> Result<(), Fault> {
        let sr = f(self.regs.sr, p[0].value() as u16);
        self.regs.set_sr(sr, self.model().sr_mask());
        Ok(())
    }

    fn control_register(&self, code: u32) -> Result<u32, Fault> {
        match code {
            CR_SFC => Ok(u32::from(self.regs.sfc)),
            CR_DFC => Ok(u32::from(self.regs.dfc)),
            CR_CACR if self.model().capabilities().cacr => Ok(self.regs.cacr),
            CR_USP => Ok(self.regs.usp),
            CR_VBR => Ok(self.regs.vbr),
            _ => Err(Fault::IllegalInstruction),
        }
    }

    fn set_control_register(&mut self, code: u32, value: u32) -> Result<(), Fault> {
        match code {
            CR_SFC => self.regs.sfc = FunctionCode::from_bits(value as u8).bits(),
            CR_DFC => self.regs.dfc = FunctionCode::from_bits(value as u8).bits(),
            CR_CACR if self.model().capabilities().cacr => self.regs.cacr = value,
            CR_USP => self.regs.usp = value,
            CR_VBR => self.regs.vbr = value,
            _ => return Err(Fault::IllegalInstruction),
        }
        Ok(())
    }
}

/// Register codes of the two EXG operands.
fn reg_pair(p: &Params) -> Result<(u8, u8), Fault> {
    match (p[0].reg_code(), p[1].reg_code()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Fault::IllegalInstruction),
    }
}
