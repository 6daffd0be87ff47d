//! Opcode decode.
//!
//! Every implemented instruction has one immutable [`Instruction`] entry:
//! the fetcher that resolves its operands, the microcode that executes it,
//! and its privilege flags. [`decode`] selects an entry by the opcode's line
//! (bits 15-12) and refines on the remaining fields, rejecting addressing
//! modes the instruction does not accept. `None` means the opcode has no
//! entry on this model and raises the illegal instruction (or line A/F)
//! exception.

use crate::ea::AddrMode;
use crate::fetch::Fetch;
use crate::microcode::Op;
use crate::model::Model;

/// Privilege requirement of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Unprivileged,
    /// Supervisor mode only.
    Privileged,
    /// Supervisor mode only, except on the 68000 (MOVE from SR).
    PrivilegedExceptOn68000,
}

impl Privilege {
    /// Whether the instruction may run in the current mode.
    #[must_use]
    pub fn permits(self, model: Model, supervisor: bool) -> bool {
        match self {
            Self::Unprivileged => true,
            Self::Privileged => supervisor,
            Self::PrivilegedExceptOn68000 => supervisor || model == Model::M68000,
        }
    }
}

/// One decode-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub fetch: Fetch,
    pub op: Op,
    pub flags: Privilege,
}

const fn plain(fetch: Fetch, op: Op) -> Instruction {
    Instruction {
        fetch,
        op,
        flags: Privilege::Unprivileged,
    }
}

const fn privileged(fetch: Fetch, op: Op) -> Instruction {
    Instruction {
        fetch,
        op,
        flags: Privilege::Privileged,
    }
}

// Line 0
static ORI_TO_CCR: Instruction = plain(Fetch::ImmediateWord, Op::OriToCcr);
static ORI_TO_SR: Instruction = privileged(Fetch::ImmediateWord, Op::OriToSr);
static ANDI_TO_CCR: Instruction = plain(Fetch::ImmediateWord, Op::AndiToCcr);
static ANDI_TO_SR: Instruction = privileged(Fetch::ImmediateWord, Op::AndiToSr);
static EORI_TO_CCR: Instruction = plain(Fetch::ImmediateWord, Op::EoriToCcr);
static EORI_TO_SR: Instruction = privileged(Fetch::ImmediateWord, Op::EoriToSr);
static MOVEP_TO_REG: Instruction = plain(Fetch::Movep, Op::MovepFromMemory);
static MOVEP_TO_MEM: Instruction = plain(Fetch::Movep, Op::MovepToMemory);
static ORI: Instruction = plain(Fetch::ImmediateEa, Op::Or);
static ANDI: Instruction = plain(Fetch::ImmediateEa, Op::And);
static SUBI: Instruction = plain(Fetch::ImmediateEa, Op::Sub);
static ADDI: Instruction = plain(Fetch::ImmediateEa, Op::Add);
static EORI: Instruction = plain(Fetch::ImmediateEa, Op::Eor);
static CMPI: Instruction = plain(Fetch::ImmediateEa, Op::Cmp);

// Lines 1-3
static MOVE: Instruction = plain(Fetch::Move, Op::Move);
static MOVEA: Instruction = plain(Fetch::MoveAddress, Op::Movea);

// Line 4
static MOVE_FROM_SR: Instruction = Instruction {
    fetch: Fetch::StatusWord,
    op: Op::MoveFromSr,
    flags: Privilege::PrivilegedExceptOn68000,
};
static MOVE_FROM_CCR: Instruction = plain(Fetch::StatusWord, Op::MoveFromCcr);
static MOVE_TO_CCR: Instruction = plain(Fetch::StatusWord, Op::MoveToCcr);
static MOVE_TO_SR: Instruction = privileged(Fetch::StatusWord, Op::MoveToSr);
static CLR: Instruction = plain(Fetch::Unary, Op::Clr);
static NEG: Instruction = plain(Fetch::Unary, Op::Neg);
static NOT: Instruction = plain(Fetch::Unary, Op::Not);
static TST: Instruction = plain(Fetch::Unary, Op::Tst);
static SWAP: Instruction = plain(Fetch::DataRegister, Op::Swap);
static BKPT: Instruction = plain(Fetch::BreakpointNumber, Op::Bkpt);
static PEA: Instruction = plain(Fetch::Control, Op::Pea);
static EXT_W: Instruction = plain(Fetch::DataRegister, Op::ExtW);
static EXT_L: Instruction = plain(Fetch::DataRegister, Op::ExtL);
static EXTB_L: Instruction = plain(Fetch::DataRegister, Op::Extb);
static LINK_L: Instruction = plain(Fetch::LinkLong, Op::Link);
static ILLEGAL: Instruction = plain(Fetch::None, Op::Illegal);
static TRAP: Instruction = plain(Fetch::TrapVector, Op::Trap);
static LINK: Instruction = plain(Fetch::Link, Op::Link);
static UNLK: Instruction = plain(Fetch::AddrRegister, Op::Unlk);
static MOVE_TO_USP: Instruction = privileged(Fetch::AddrRegister, Op::MoveToUsp);
static MOVE_FROM_USP: Instruction = privileged(Fetch::AddrRegister, Op::MoveFromUsp);
static RESET: Instruction = privileged(Fetch::None, Op::Reset);
static NOP: Instruction = plain(Fetch::None, Op::Nop);
static STOP: Instruction = privileged(Fetch::ImmediateWord, Op::Stop);
static RTE: Instruction = privileged(Fetch::None, Op::Rte);
static RTD: Instruction = plain(Fetch::ImmediateWord, Op::Rtd);
static RTS: Instruction = plain(Fetch::None, Op::Rts);
static TRAPV: Instruction = plain(Fetch::None, Op::Trapv);
static RTR: Instruction = plain(Fetch::None, Op::Rtr);
static MOVEC_FROM: Instruction = privileged(Fetch::ControlRegister, Op::MovecFrom);
static MOVEC_TO: Instruction = privileged(Fetch::ControlRegister, Op::MovecTo);
static JSR: Instruction = plain(Fetch::Control, Op::Jsr);
static JMP: Instruction = plain(Fetch::Control, Op::Jmp);
static LEA: Instruction = plain(Fetch::LoadAddress, Op::Lea);

// Line 5
static ADDQ: Instruction = plain(Fetch::Quick, Op::Add);
static SUBQ: Instruction = plain(Fetch::Quick, Op::Sub);
static SCC: Instruction = plain(Fetch::SetCondition, Op::Scc);
static DBCC: Instruction = plain(Fetch::DecrementBranch, Op::Dbcc);

// Line 6
static BCC: Instruction = plain(Fetch::Branch, Op::Bcc);
static BSR: Instruction = plain(Fetch::Branch, Op::Bsr);

// Line 7
static MOVEQ: Instruction = plain(Fetch::Moveq, Op::Moveq);

// Lines 8-D
static OR: Instruction = plain(Fetch::RegisterEa, Op::Or);
static SUB: Instruction = plain(Fetch::RegisterEa, Op::Sub);
static SUBA: Instruction = plain(Fetch::AddressEa, Op::Suba);
static CMP: Instruction = plain(Fetch::RegisterEa, Op::Cmp);
static CMPA: Instruction = plain(Fetch::AddressEa, Op::Cmpa);
static EOR: Instruction = plain(Fetch::RegisterEa, Op::Eor);
static AND: Instruction = plain(Fetch::RegisterEa, Op::And);
static EXG: Instruction = plain(Fetch::Exg, Op::Exg);
static ADD: Instruction = plain(Fetch::RegisterEa, Op::Add);
static ADDA: Instruction = plain(Fetch::AddressEa, Op::Adda);

/// Look up the entry for `opcode` on `model`.
#[must_use]
pub fn decode(opcode: u16, model: Model) -> Option<&'static Instruction> {
    match opcode >> 12 {
        0x0 => line_0(opcode, model),
        0x1..=0x3 => line_move(opcode),
        0x4 => line_4(opcode, model),
        0x5 => line_5(opcode),
        0x6 => Some(if opcode & 0x0F00 == 0x0100 { &BSR } else { &BCC }),
        0x7 => (opcode & 0x0100 == 0).then_some(&MOVEQ),
        0x8 => line_logical(opcode, &OR),
        0x9 => line_arith(opcode, &SUB, &SUBA),
        0xB => line_b(opcode),
        0xC => line_c(opcode),
        0xD => line_arith(opcode, &ADD, &ADDA),
        // Line A, shifts and rotates, line F
        _ => None,
    }
}

/// Low six bits as an addressing mode.
fn ea(opcode: u16) -> Option<AddrMode> {
    AddrMode::from_opcode(opcode)
}

/// `entry` if the low-six-bit EA satisfies `accept`.
fn with_ea(
    opcode: u16,
    accept: impl Fn(AddrMode) -> bool,
    entry: &'static Instruction,
) -> Option<&'static Instruction> {
    ea(opcode).filter(|&mode| accept(mode)).map(|_| entry)
}

/// Size bits 7-6 are 00, 01 or 10.
fn sized(opcode: u16) -> bool {
    opcode & 0x00C0 != 0x00C0
}

/// Source EA for sized reads: An is not a byte operand.
fn readable(mode: AddrMode, opcode: u16) -> bool {
    !(matches!(mode, AddrMode::AddrReg(_)) && opcode & 0x00C0 == 0)
}

fn line_0(opcode: u16, model: Model) -> Option<&'static Instruction> {
    match opcode {
        0x003C => return Some(&ORI_TO_CCR),
        0x007C => return Some(&ORI_TO_SR),
        0x023C => return Some(&ANDI_TO_CCR),
        0x027C => return Some(&ANDI_TO_SR),
        0x0A3C => return Some(&EORI_TO_CCR),
        0x0A7C => return Some(&EORI_TO_SR),
        _ => {}
    }

    if opcode & 0xF138 == 0x0108 {
        return Some(if opcode & 0x0080 == 0 {
            &MOVEP_TO_REG
        } else {
            &MOVEP_TO_MEM
        });
    }
    // Dynamic and static bit operations, MOVES, CAS, CMP2/CHK2
    if opcode & 0x0100 != 0 || !sized(opcode) {
        return None;
    }

    let entry = match (opcode >> 9) & 7 {
        0 => &ORI,
        1 => &ANDI,
        2 => &SUBI,
        3 => &ADDI,
        5 => &EORI,
        6 => &CMPI,
        _ => return None,
    };
    // CMPI accepts PC-relative sources from the 68020 on.
    if entry.op == Op::Cmp && model.capabilities().ext_020 {
        with_ea(opcode, |m| m.is_data() && m != AddrMode::Immediate, entry)
    } else {
        with_ea(opcode, AddrMode::is_data_alterable, entry)
    }
}

fn line_move(opcode: u16) -> Option<&'static Instruction> {
    let src = ea(opcode)?;
    let dst = AddrMode::from_move_destination(opcode)?;
    let byte = opcode >> 12 == 1;
    if byte && matches!(src, AddrMode::AddrReg(_)) {
        return None;
    }
    match dst {
        AddrMode::AddrReg(_) if !byte => Some(&MOVEA),
        _ if dst.is_data_alterable() => Some(&MOVE),
        _ => None,
    }
}

fn line_4(opcode: u16, model: Model) -> Option<&'static Instruction> {
    let caps = model.capabilities();
    match opcode {
        0x4AFC => return Some(&ILLEGAL),
        0x4E70 => return Some(&RESET),
        0x4E71 => return Some(&NOP),
        0x4E72 => return Some(&STOP),
        0x4E73 => return Some(&RTE),
        0x4E74 => return caps.rtd.then_some(&RTD),
        0x4E75 => return Some(&RTS),
        0x4E76 => return Some(&TRAPV),
        0x4E77 => return Some(&RTR),
        0x4E7A => return caps.movec.then_some(&MOVEC_FROM),
        0x4E7B => return caps.movec.then_some(&MOVEC_TO),
        _ => {}
    }

    match opcode & 0xFFF8 {
        0x4E40 | 0x4E48 => return Some(&TRAP),
        0x4E50 => return Some(&LINK),
        0x4E58 => return Some(&UNLK),
        0x4E60 => return Some(&MOVE_TO_USP),
        0x4E68 => return Some(&MOVE_FROM_USP),
        0x4840 => return Some(&SWAP),
        0x4848 => return Some(&BKPT),
        0x4880 => return Some(&EXT_W),
        0x48C0 => return Some(&EXT_L),
        0x49C0 => return caps.ext_020.then_some(&EXTB_L),
        0x4808 => return caps.ext_020.then_some(&LINK_L),
        _ => {}
    }

    if opcode & 0xF1C0 == 0x41C0 {
        return with_ea(opcode, AddrMode::is_control, &LEA);
    }

    match opcode & 0xFFC0 {
        0x40C0 => return with_ea(opcode, AddrMode::is_data_alterable, &MOVE_FROM_SR),
        0x42C0 if caps.move_from_ccr => {
            return with_ea(opcode, AddrMode::is_data_alterable, &MOVE_FROM_CCR);
        }
        0x44C0 => return with_ea(opcode, AddrMode::is_data, &MOVE_TO_CCR),
        0x46C0 => return with_ea(opcode, AddrMode::is_data, &MOVE_TO_SR),
        0x4840 => return with_ea(opcode, AddrMode::is_control, &PEA),
        0x4E80 => return with_ea(opcode, AddrMode::is_control, &JSR),
        0x4EC0 => return with_ea(opcode, AddrMode::is_control, &JMP),
        _ => {}
    }

    if !sized(opcode) {
        return None;
    }
    match opcode & 0xFF00 {
        0x4200 => with_ea(opcode, AddrMode::is_data_alterable, &CLR),
        0x4400 => with_ea(opcode, AddrMode::is_data_alterable, &NEG),
        0x4600 => with_ea(opcode, AddrMode::is_data_alterable, &NOT),
        0x4A00 if caps.ext_020 => with_ea(opcode, |m| readable(m, opcode), &TST),
        0x4A00 => with_ea(opcode, AddrMode::is_data_alterable, &TST),
        _ => None,
    }
}

fn line_5(opcode: u16) -> Option<&'static Instruction> {
    if !sized(opcode) {
        return match ea(opcode) {
            Some(AddrMode::AddrReg(_)) => Some(&DBCC),
            Some(mode) if mode.is_data_alterable() => Some(&SCC),
            _ => None,
        };
    }
    let entry = if opcode & 0x0100 == 0 { &ADDQ } else { &SUBQ };
    with_ea(opcode, |m| m.is_alterable() && readable(m, opcode), entry)
}

/// OR and AND share a layout.
fn line_logical(opcode: u16, entry: &'static Instruction) -> Option<&'static Instruction> {
    if !sized(opcode) {
        // DIVU/DIVS, MULU/MULS
        return None;
    }
    if opcode & 0x0100 == 0 {
        with_ea(opcode, AddrMode::is_data, entry)
    } else {
        // Register-to-register forms here are SBCD/ABCD/PACK/UNPK/EXG.
        with_ea(opcode, AddrMode::is_memory_alterable, entry)
    }
}

/// ADD/ADDA and SUB/SUBA.
fn line_arith(
    opcode: u16,
    entry: &'static Instruction,
    address: &'static Instruction,
) -> Option<&'static Instruction> {
    if !sized(opcode) {
        return ea(opcode).map(|_| address);
    }
    if opcode & 0x0100 == 0 {
        with_ea(opcode, |m| readable(m, opcode), entry)
    } else {
        // ADDX/SUBX occupy the register forms.
        with_ea(opcode, AddrMode::is_memory_alterable, entry)
    }
}

fn line_b(opcode: u16) -> Option<&'static Instruction> {
    if !sized(opcode) {
        return ea(opcode).map(|_| &CMPA);
    }
    if opcode & 0x0100 == 0 {
        with_ea(opcode, |m| readable(m, opcode), &CMP)
    } else {
        // CMPM uses mode 001.
        with_ea(opcode, AddrMode::is_data_alterable, &EOR)
    }
}

fn line_c(opcode: u16) -> Option<&'static Instruction> {
    if matches!(opcode & 0x01F8, 0x0140 | 0x0148 | 0x0188) {
        return Some(&EXG);
    }
    line_logical(opcode, &AND)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(opcode: u16, model: Model) -> Option<Op> {
        decode(opcode, model).map(|insn| insn.op)
    }

    #[test]
    fn decodes_core_instructions() {
        assert_eq!(op(0x4E71, Model::M68000), Some(Op::Nop));
        assert_eq!(op(0x70FF, Model::M68000), Some(Op::Moveq));
        assert_eq!(op(0xC141, Model::M68000), Some(Op::Exg));
        assert_eq!(op(0xC34F, Model::M68000), Some(Op::Exg));
        assert_eq!(op(0xC189, Model::M68000), Some(Op::Exg));
        assert_eq!(op(0x4E56, Model::M68000), Some(Op::Link));
        assert_eq!(op(0x4E5E, Model::M68000), Some(Op::Unlk));
        assert_eq!(op(0x4E60, Model::M68000), Some(Op::MoveToUsp));
        assert_eq!(op(0x4E6F, Model::M68000), Some(Op::MoveFromUsp));
        assert_eq!(op(0x0308, Model::M68000), Some(Op::MovepFromMemory));
        assert_eq!(op(0x01C8, Model::M68000), Some(Op::MovepToMemory));
    }

    #[test]
    fn privilege_flags() {
        let move_usp = decode(0x4E60, Model::M68000).unwrap();
        assert_eq!(move_usp.flags, Privilege::Privileged);

        let from_sr = decode(0x40C0, Model::M68000).unwrap();
        assert_eq!(from_sr.flags, Privilege::PrivilegedExceptOn68000);
        assert!(from_sr.flags.permits(Model::M68000, false));
        assert!(!from_sr.flags.permits(Model::M68010, false));
        assert!(from_sr.flags.permits(Model::M68010, true));
    }

    #[test]
    fn model_gated_entries() {
        assert_eq!(op(0x4E7A, Model::M68000), None);
        assert_eq!(op(0x4E7A, Model::M68010), Some(Op::MovecFrom));
        assert_eq!(op(0x42C0, Model::M68000), None);
        assert_eq!(op(0x42C0, Model::M68010), Some(Op::MoveFromCcr));
        assert_eq!(op(0x49C0, Model::M68010), None);
        assert_eq!(op(0x49C0, Model::M68020), Some(Op::Extb));
        assert_eq!(op(0x480E, Model::M68040), Some(Op::Link));
        assert_eq!(op(0x4E74, Model::M68000), None);
        assert_eq!(op(0x4E74, Model::M68010), Some(Op::Rtd));
    }

    #[test]
    fn rejects_invalid_modes() {
        // MOVE.B A0,D0
        assert_eq!(op(0x1008, Model::M68000), None);
        // MOVE.W D0,#imm
        assert_eq!(op(0x39C0, Model::M68000), None);
        // CLR A0
        assert_eq!(op(0x4248, Model::M68000), None);
        // JMP (A0)+
        assert_eq!(op(0x4ED8, Model::M68000), None);
        // TST.W d16(PC) is 68020+
        assert_eq!(op(0x4A7A, Model::M68000), None);
        assert_eq!(op(0x4A7A, Model::M68020), Some(Op::Tst));
    }

    #[test]
    fn unimplemented_groups_are_empty() {
        assert_eq!(op(0xE348, Model::M68000), None); // LSL
        assert_eq!(op(0xC0C1, Model::M68000), None); // MULU
        assert_eq!(op(0xA000, Model::M68000), None);
        assert_eq!(op(0xF000, Model::M68040), None);
        assert_eq!(op(0x48E7, Model::M68000), None); // MOVEM
    }

    #[test]
    fn branch_and_quick_forms() {
        assert_eq!(op(0x6000, Model::M68000), Some(Op::Bcc));
        assert_eq!(op(0x6100, Model::M68000), Some(Op::Bsr));
        assert_eq!(op(0x51C8, Model::M68000), Some(Op::Dbcc));
        assert_eq!(op(0x57C0, Model::M68000), Some(Op::Scc));
        assert_eq!(op(0x5288, Model::M68000), Some(Op::Add));
        assert_eq!(op(0x5308, Model::M68000), None); // SUBQ.B #1,A0
    }
}
