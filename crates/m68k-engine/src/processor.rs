//! Processor state and the host stepping contract.
//!
//! A host builds a [`Processor`] around a [`Memory`] implementation, calls
//! [`Processor::step`] repeatedly and branches on the returned
//! [`Condition`]. One step decodes and executes exactly one instruction;
//! nothing is left half-done across a step boundary.

use log::{info, trace, warn};

use crate::alu::Size;
use crate::condition::Condition;
use crate::config::ProcessorConfig;
use crate::decode::decode;
use crate::exceptions::{BusCycle, Fault, FaultPolicy};
use crate::fetch::Operand;
use crate::memory::{Access, FunctionCode, Memory};
use crate::model::Model;
use crate::registers::Registers;

/// Reset value of SR: supervisor, interrupts masked.
const RESET_SR: u16 = 0x2700;

/// One emulated 68k processor bound to its memory.
#[derive(Debug)]
pub struct Processor<M: Memory> {
    pub regs: Registers,
    pub mem: M,
    model: Model,
    condition: Condition,
    /// Opcode of the current (or last) instruction.
    opcode: u16,
    /// Address of the current (or last) instruction's opcode word.
    instruction_address: u32,
    fault_policy: FaultPolicy,
}

impl<M: Memory> Processor<M> {
    /// A processor in the `Startup` condition.
    pub fn new(model: Model, mem: M) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            model,
            condition: Condition::Startup,
            opcode: 0,
            instruction_address: 0,
            fault_policy: FaultPolicy::default(),
        }
    }

    pub fn with_config(config: &ProcessorConfig, mem: M) -> Self {
        let mut cpu = Self::new(config.model, mem);
        cpu.fault_policy = config.fault_policy;
        cpu
    }

    #[must_use]
    pub const fn model(&self) -> Model {
        self.model
    }

    #[must_use]
    pub const fn condition(&self) -> Condition {
        self.condition
    }

    #[must_use]
    pub const fn opcode(&self) -> u16 {
        self.opcode
    }

    #[must_use]
    pub const fn instruction_address(&self) -> u32 {
        self.instruction_address
    }

    #[must_use]
    pub const fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub fn set_fault_policy(&mut self, policy: FaultPolicy) {
        self.fault_policy = policy;
    }

    /// Give the memory back to the host.
    pub fn into_memory(self) -> M {
        self.mem
    }

    // Transitions

    /// Take the reset exception: SSP from long 0, PC from long 4, SR 0x2700,
    /// VBR 0. Halts if either vector is unreadable.
    pub fn reset(&mut self) {
        self.regs.sr = RESET_SR;
        self.regs.vbr = 0;
        let fc = FunctionCode::SupervisorData;
        let vectors = self
            .mem
            .get_long(0, fc)
            .and_then(|ssp| Ok((ssp, self.mem.get_long(4, fc)?)));
        match vectors {
            Ok((ssp, pc)) => {
                self.regs.ssp = ssp;
                self.regs.pc = pc;
                info!("{} reset: ssp={ssp:#010x} pc={pc:#010x}", self.model);
                self.condition = Condition::Normal;
            }
            Err(e) => {
                warn!("reset vectors unreadable: {e}");
                self.halt();
            }
        }
    }

    /// Leave `Startup` with registers already set up by the host.
    pub fn start(&mut self) {
        if self.condition == Condition::Startup {
            self.condition = Condition::Normal;
        }
    }

    /// Execute one instruction.
    ///
    /// From `Startup` this takes the reset exception instead. In any
    /// condition other than `Normal` it does nothing; a halted processor
    /// stays halted.
    pub fn step(&mut self) -> Condition {
        match self.condition {
            Condition::Startup => self.reset(),
            Condition::Normal => {
                if let Err(fault) = self.execute() {
                    self.raise(fault);
                }
            }
            _ => {}
        }
        self.condition
    }

    /// Step until the condition leaves `Normal` or `limit` instructions
    /// have run. Returns the number of steps taken.
    pub fn run(&mut self, limit: u64) -> u64 {
        let mut steps = 0;
        if self.condition == Condition::Startup {
            self.reset();
        }
        while steps < limit && self.condition.is_running() {
            self.step();
            steps += 1;
        }
        steps
    }

    pub fn halt(&mut self) {
        if self.condition != Condition::Halted {
            warn!(
                "halted at {:#010x} (opcode {:#06x})",
                self.instruction_address, self.opcode
            );
        }
        self.condition = Condition::Halted;
    }

    pub(crate) fn stop(&mut self) {
        self.condition = Condition::Stopped;
    }

    pub(crate) fn breakpoint(&mut self, n: u8) {
        self.condition = Condition::Breakpoint(n & 7);
    }

    /// Mark the run complete. Only meaningful from `Normal`.
    pub fn finish(&mut self) -> bool {
        self.transition(Condition::Normal, Condition::Finished)
    }

    /// External wake event for a stopped processor.
    pub fn wake(&mut self) -> bool {
        self.transition(Condition::Stopped, Condition::Normal)
    }

    /// Continue after a breakpoint marker.
    pub fn resume(&mut self) -> bool {
        if let Condition::Breakpoint(n) = self.condition {
            info!("resuming from breakpoint {n}");
            self.condition = Condition::Normal;
            true
        } else {
            false
        }
    }

    fn transition(&mut self, from: Condition, to: Condition) -> bool {
        if self.condition == from {
            info!("{from:?} -> {to:?}");
            self.condition = to;
            true
        } else {
            false
        }
    }

    // Dispatch

    fn execute(&mut self) -> Result<(), Fault> {
        self.instruction_address = self.regs.pc;
        self.opcode = self.fetch_word()?;

        let insn = decode(self.opcode, self.model).ok_or(Fault::unimplemented(self.opcode))?;
        trace!(
            "{:#010x}: {:04x} {:?}",
            self.instruction_address, self.opcode, insn.op
        );

        let saved = self.regs;
        let params = self.fetch_operands(insn.fetch)?;
        if !insn.flags.permits(self.model, self.regs.is_supervisor()) {
            // Undo (An)+/-(An) side effects of the operand fetch.
            self.regs = saved;
            return Err(Fault::PrivilegeViolation);
        }
        self.run_microcode(insn.op, &params)
    }

    // Memory access

    #[must_use]
    pub const fn data_space(&self) -> FunctionCode {
        FunctionCode::from_flags(self.regs.is_supervisor(), false)
    }

    #[must_use]
    pub const fn program_space(&self) -> FunctionCode {
        FunctionCode::from_flags(self.regs.is_supervisor(), true)
    }

    /// Whether a word/long data access at `addr` is an address error.
    #[must_use]
    pub const fn badly_aligned_data(&self, addr: u32) -> bool {
        self.model.faults_unaligned_data() && addr & 1 != 0
    }

    pub fn read_mem(&self, addr: u32, size: Size) -> Result<u32, Fault> {
        self.read_space(addr, size, self.data_space())
    }

    pub fn write_mem(&mut self, addr: u32, size: Size, value: u32) -> Result<(), Fault> {
        let fc = self.data_space();
        let cycle = BusCycle {
            addr,
            access: Access::Write,
            fc,
        };
        if size != Size::Byte && self.badly_aligned_data(addr) {
            return Err(Fault::AddressError(cycle));
        }
        self.mem
            .put(addr, size.bytes(), value, fc)
            .map_err(|e| bus_fault(cycle, e))
    }

    fn read_space(&self, addr: u32, size: Size, fc: FunctionCode) -> Result<u32, Fault> {
        let cycle = BusCycle {
            addr,
            access: Access::Read,
            fc,
        };
        if size != Size::Byte && self.badly_aligned_data(addr) {
            return Err(Fault::AddressError(cycle));
        }
        self.mem
            .get(addr, size.bytes(), fc, Access::Read)
            .map_err(|e| bus_fault(cycle, e))
    }

    /// Next instruction-stream word; advances PC.
    pub fn fetch_word(&mut self) -> Result<u16, Fault> {
        let pc = self.regs.pc;
        let cycle = BusCycle {
            addr: pc,
            access: Access::Exec,
            fc: self.program_space(),
        };
        if pc & 1 != 0 {
            return Err(Fault::AddressError(cycle));
        }
        let word = self
            .mem
            .get_instruction_word(pc, cycle.fc)
            .map_err(|e| bus_fault(cycle, e))?;
        self.regs.pc = pc.wrapping_add(2);
        Ok(word)
    }

    pub fn fetch_long(&mut self) -> Result<u32, Fault> {
        let hi = self.fetch_word()?;
        let lo = self.fetch_word()?;
        Ok((u32::from(hi) << 16) | u32::from(lo))
    }

    /// Read an operand. Register operands yield their low `size` bits.
    pub(crate) fn read_operand(&self, operand: Operand, size: Size) -> Result<u32, Fault> {
        match operand {
            Operand::Data(n) => Ok(self.regs.d[usize::from(n)] & size.mask()),
            Operand::Addr(n) => Ok(self.regs.a(n.into()) & size.mask()),
            Operand::Memory(addr) => self.read_mem(addr, size),
            Operand::PcRelative(addr) => self.read_space(addr, size, self.program_space()),
            Operand::Immediate(value) => Ok(value & size.mask()),
            Operand::Empty | Operand::Size(_) => Err(Fault::IllegalInstruction),
        }
    }

    /// Write an operand. Data registers keep their bits above `size`;
    /// address registers take the whole value.
    pub(crate) fn write_operand(
        &mut self,
        operand: Operand,
        size: Size,
        value: u32,
    ) -> Result<(), Fault> {
        match operand {
            Operand::Data(n) => {
                let d = &mut self.regs.d[usize::from(n)];
                *d = size.merge(*d, value);
                Ok(())
            }
            Operand::Addr(n) => {
                self.regs.set_a(n.into(), value);
                Ok(())
            }
            Operand::Memory(addr) => self.write_mem(addr, size, value),
            _ => Err(Fault::IllegalInstruction),
        }
    }

    // Stack

    /// Push onto the active stack. SP moves only if the write succeeds.
    pub fn push_word(&mut self, value: u16) -> Result<(), Fault> {
        self.push(Size::Word, u32::from(value))
    }

    pub fn push_long(&mut self, value: u32) -> Result<(), Fault> {
        self.push(Size::Long, value)
    }

    pub fn pop_word(&mut self) -> Result<u16, Fault> {
        self.pop(Size::Word).map(|v| v as u16)
    }

    pub fn pop_long(&mut self) -> Result<u32, Fault> {
        self.pop(Size::Long)
    }

    fn push(&mut self, size: Size, value: u32) -> Result<(), Fault> {
        let sp = self.regs.a(7).wrapping_sub(size.bytes());
        self.write_mem(sp, size, value)?;
        self.regs.set_a(7, sp);
        Ok(())
    }

    fn pop(&mut self, size: Size) -> Result<u32, Fault> {
        let sp = self.regs.a(7);
        let value = self.read_mem(sp, size)?;
        self.regs.set_a(7, sp.wrapping_add(size.bytes()));
        Ok(value)
    }
}

fn bus_fault(cycle: BusCycle, err: crate::memory::MemoryError) -> Fault {
    trace!("translation failed: {err}");
    Fault::BusError(cycle)
}
