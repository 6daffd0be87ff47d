//! Instruction tests: one program per test, stepped to completion.

use m68k_engine::flags::{C, N, X, Z};
use m68k_engine::{Condition, FunctionCode, Memory, MemoryRegion, Model, Processor};

const CODE: u32 = 0x4000;
const STACK: u32 = 0x8000;
const RAM_SIZE: usize = 0x10000;

/// Helper to load words into memory (big-endian).
fn load_words(buf: &mut [u8], addr: u32, words: &[u16]) {
    for (i, &word) in words.iter().enumerate() {
        let base = addr as usize + i * 2;
        buf[base..base + 2].copy_from_slice(&word.to_be_bytes());
    }
}

/// A running processor in supervisor mode with `words` at `CODE`.
fn boot<'a>(model: Model, buf: &'a mut [u8], words: &[u16]) -> Processor<MemoryRegion<'a>> {
    load_words(buf, CODE, words);
    let mut cpu = Processor::new(model, MemoryRegion::new(buf));
    cpu.start();
    cpu.regs.pc = CODE;
    cpu.regs.ssp = STACK;
    cpu
}

fn long_at(cpu: &Processor<MemoryRegion<'_>>, addr: u32) -> u32 {
    cpu.mem.get_long(addr, FunctionCode::SupervisorData).unwrap()
}

fn byte_at(cpu: &Processor<MemoryRegion<'_>>, addr: u32) -> u8 {
    cpu.mem.get_byte(addr, FunctionCode::SupervisorData).unwrap()
}

#[test]
fn test_nop() {
    let mut buf = vec![0u8; RAM_SIZE];
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4E71]);
    let before = cpu.regs;

    assert_eq!(cpu.step(), Condition::Normal);
    assert_eq!(cpu.regs.pc, CODE + 2);
    assert_eq!(cpu.regs.d, before.d);
    assert_eq!(cpu.regs.sr, before.sr);
}

#[test]
fn test_moveq_negative() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVEQ #-1,D0
    let mut cpu = boot(Model::M68000, &mut buf, &[0x70FF]);
    cpu.regs.sr |= C;

    cpu.step();

    assert_eq!(cpu.regs.d[0], 0xFFFF_FFFF);
    assert_eq!(cpu.regs.ccr(), N as u8);
}

#[test]
fn test_moveq_zero_keeps_extend() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVEQ #0,D3
    let mut cpu = boot(Model::M68000, &mut buf, &[0x7600]);
    cpu.regs.d[3] = 0xDEAD_BEEF;
    cpu.regs.sr |= X;

    cpu.step();

    assert_eq!(cpu.regs.d[3], 0);
    assert_eq!(cpu.regs.ccr(), (X | Z) as u8);
}

#[test]
fn test_exg_leaves_flags() {
    let mut buf = vec![0u8; RAM_SIZE];
    // EXG D0,D1 ; EXG D2,A3
    let mut cpu = boot(Model::M68000, &mut buf, &[0xC141, 0xC58B]);
    cpu.regs.d[0] = 0x1111_1111;
    cpu.regs.d[1] = 0x2222_2222;
    cpu.regs.d[2] = 0x3333_3333;
    cpu.regs.a[3] = 0x4444_4444;
    cpu.regs.set_ccr(0x1F);

    cpu.step();
    cpu.step();

    assert_eq!(cpu.regs.d[0], 0x2222_2222);
    assert_eq!(cpu.regs.d[1], 0x1111_1111);
    assert_eq!(cpu.regs.d[2], 0x4444_4444);
    assert_eq!(cpu.regs.a[3], 0x3333_3333);
    assert_eq!(cpu.regs.ccr(), 0x1F);
}

#[test]
fn test_link_unlk() {
    let mut buf = vec![0u8; RAM_SIZE];
    // LINK A6,#-8 ; UNLK A6
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4E56, 0xFFF8, 0x4E5E]);
    cpu.regs.ssp = 0x1000;
    cpu.regs.a[6] = 0x2000;

    cpu.step();
    assert_eq!(long_at(&cpu, 0x0FFC), 0x2000);
    assert_eq!(cpu.regs.a[6], 0x0FFC);
    assert_eq!(cpu.regs.a(7), 0x0FF4);

    cpu.step();
    assert_eq!(cpu.regs.a[6], 0x2000);
    assert_eq!(cpu.regs.a(7), 0x1000);
    assert_eq!(cpu.regs.pc, CODE + 6);
}

#[test]
fn test_link_a7_stores_decremented_sp() {
    let mut buf = vec![0u8; RAM_SIZE];
    // LINK A7,#-4
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4E57, 0xFFFC]);
    cpu.regs.ssp = 0x0800;

    assert_eq!(cpu.step(), Condition::Normal);

    assert_eq!(long_at(&cpu, 0x07FC), 0x07FC);
    assert_eq!(cpu.regs.a(7), 0x07F8);
}

#[test]
fn test_link_long_on_68020() {
    let mut buf = vec![0u8; RAM_SIZE];
    // LINK.L A5,#-0x100
    let mut cpu = boot(Model::M68020, &mut buf, &[0x480D, 0xFFFF, 0xFF00]);
    cpu.regs.a[5] = 0x1234;

    cpu.step();

    assert_eq!(long_at(&cpu, STACK - 4), 0x1234);
    assert_eq!(cpu.regs.a[5], STACK - 4);
    assert_eq!(cpu.regs.a(7), STACK - 4 - 0x100);
}

#[test]
fn test_move_usp() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVE A2,USP ; MOVE USP,A4
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4E62, 0x4E6C]);
    cpu.regs.a[2] = 0x0000_7000;

    cpu.step();
    assert_eq!(cpu.regs.usp, 0x7000);
    cpu.step();
    assert_eq!(cpu.regs.a[4], 0x7000);
}

#[test]
fn test_movep_round_trip() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVEP.L D0,0(A0) ; MOVEP.W 0(A0),D1
    let mut cpu = boot(Model::M68000, &mut buf, &[0x01C8, 0x0000, 0x0308, 0x0000]);
    cpu.regs.d[0] = 0x1234_5678;
    cpu.regs.d[1] = 0xFFFF_0000;
    cpu.regs.a[0] = 0x3000;

    cpu.step();
    assert_eq!(byte_at(&cpu, 0x3000), 0x12);
    assert_eq!(byte_at(&cpu, 0x3001), 0x00);
    assert_eq!(byte_at(&cpu, 0x3002), 0x34);
    assert_eq!(byte_at(&cpu, 0x3004), 0x56);
    assert_eq!(byte_at(&cpu, 0x3006), 0x78);

    cpu.step();
    assert_eq!(cpu.regs.d[1], 0xFFFF_1234);
}

#[test]
fn test_move_word_sets_negative() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVE.W D0,D1
    let mut cpu = boot(Model::M68000, &mut buf, &[0x3200]);
    cpu.regs.d[0] = 0x0001_8000;
    cpu.regs.d[1] = 0xAAAA_AAAA;

    cpu.step();

    assert_eq!(cpu.regs.d[1], 0xAAAA_8000);
    assert_eq!(cpu.regs.ccr(), N as u8);
}

#[test]
fn test_move_byte_postincrement() {
    let mut buf = vec![0u8; RAM_SIZE];
    buf[0x3000] = 0x80;
    buf[0x3002] = 0x7F;
    // MOVE.B (A0)+,D0 ; MOVE.B (A7)+,D1
    let mut cpu = boot(Model::M68000, &mut buf, &[0x1018, 0x121F]);
    cpu.regs.a[0] = 0x3000;
    cpu.regs.ssp = 0x3002;

    cpu.step();
    assert_eq!(cpu.regs.d[0] & 0xFF, 0x80);
    assert_eq!(cpu.regs.a[0], 0x3001);

    cpu.step();
    assert_eq!(cpu.regs.d[1] & 0xFF, 0x7F);
    assert_eq!(cpu.regs.ssp, 0x3004, "byte access through A7 keeps it even");
}

#[test]
fn test_add_long_carry() {
    let mut buf = vec![0u8; RAM_SIZE];
    // ADD.L D1,D0
    let mut cpu = boot(Model::M68000, &mut buf, &[0xD081]);
    cpu.regs.d[0] = 1;
    cpu.regs.d[1] = 0xFFFF_FFFF;

    cpu.step();

    assert_eq!(cpu.regs.d[0], 0);
    assert_eq!(cpu.regs.ccr(), (X | Z | C) as u8);
}

#[test]
fn test_addq_to_address_register_keeps_flags() {
    let mut buf = vec![0u8; RAM_SIZE];
    // ADDQ.W #8,A1
    let mut cpu = boot(Model::M68000, &mut buf, &[0x5049]);
    cpu.regs.a[1] = 0x0000_FFFC;
    cpu.regs.set_ccr(0x04);

    cpu.step();

    assert_eq!(cpu.regs.a[1], 0x0001_0004);
    assert_eq!(cpu.regs.ccr(), 0x04);
}

#[test]
fn test_cmp_and_branch() {
    let mut buf = vec![0u8; RAM_SIZE];
    // CMP.W D1,D0 ; BEQ.S *+4 ; MOVEQ #1,D0 ; MOVEQ #2,D1
    let mut cpu = boot(Model::M68000, &mut buf, &[0xB041, 0x6702, 0x7001, 0x7202]);
    cpu.regs.d[0] = 5;
    cpu.regs.d[1] = 5;

    cpu.step();
    assert_ne!(cpu.regs.sr & Z, 0);
    cpu.step();
    assert_eq!(cpu.regs.pc, CODE + 6);
    cpu.step();
    assert_eq!(cpu.regs.d[0], 5);
    assert_eq!(cpu.regs.d[1], 2);
}

#[test]
fn test_branch_word_displacement() {
    let mut buf = vec![0u8; RAM_SIZE];
    // BRA.W *+0x100
    let mut cpu = boot(Model::M68000, &mut buf, &[0x6000, 0x00FE]);

    cpu.step();

    assert_eq!(cpu.regs.pc, CODE + 0x100);
}

#[test]
fn test_dbf_loop() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVEQ #3,D0 ; loop: ADDQ.L #1,D1 ; DBF D0,loop
    let mut cpu = boot(Model::M68000, &mut buf, &[0x7003, 0x5281, 0x51C8, 0xFFFC]);

    assert_eq!(cpu.run(9), 9);

    assert_eq!(cpu.regs.d[1], 4);
    assert_eq!(cpu.regs.d[0] & 0xFFFF, 0xFFFF);
    assert_eq!(cpu.regs.pc, CODE + 8);
}

#[test]
fn test_jsr_rts() {
    let mut buf = vec![0u8; RAM_SIZE];
    // JSR (A0)
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4E90]);
    let sub = CODE + 0x100;
    cpu.mem.put_word(sub, 0x4E75, FunctionCode::SupervisorData).unwrap();
    cpu.regs.a[0] = sub;

    cpu.step();
    assert_eq!(cpu.regs.pc, sub);
    assert_eq!(cpu.regs.ssp, STACK - 4);
    assert_eq!(long_at(&cpu, STACK - 4), CODE + 2);

    cpu.step();
    assert_eq!(cpu.regs.pc, CODE + 2);
    assert_eq!(cpu.regs.ssp, STACK);
}

#[test]
fn test_bsr_pushes_return_address() {
    let mut buf = vec![0u8; RAM_SIZE];
    // BSR.S *+0x12
    let mut cpu = boot(Model::M68000, &mut buf, &[0x6110]);

    cpu.step();

    assert_eq!(cpu.regs.pc, CODE + 0x12);
    assert_eq!(long_at(&cpu, STACK - 4), CODE + 2);
}

#[test]
fn test_lea_pea() {
    let mut buf = vec![0u8; RAM_SIZE];
    // LEA 16(A0),A1 ; PEA (A1)
    let mut cpu = boot(Model::M68000, &mut buf, &[0x43E8, 0x0010, 0x4851]);
    cpu.regs.a[0] = 0x3000;

    cpu.step();
    assert_eq!(cpu.regs.a[1], 0x3010);
    cpu.step();
    assert_eq!(long_at(&cpu, STACK - 4), 0x3010);
}

#[test]
fn test_clr_tst_neg_not() {
    let mut buf = vec![0u8; RAM_SIZE];
    // CLR.W D0 ; NEG.L D1 ; NOT.B D2 ; TST.L D1
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4240, 0x4481, 0x4602, 0x4A81]);
    cpu.regs.d[0] = 0x1234_5678;
    cpu.regs.d[1] = 1;
    cpu.regs.d[2] = 0x0000_000F;

    cpu.step();
    assert_eq!(cpu.regs.d[0], 0x1234_0000);
    assert_eq!(cpu.regs.ccr(), Z as u8);

    cpu.step();
    assert_eq!(cpu.regs.d[1], 0xFFFF_FFFF);
    assert_eq!(cpu.regs.ccr(), (X | N | C) as u8);

    cpu.step();
    assert_eq!(cpu.regs.d[2], 0x0000_00F0);

    cpu.step();
    assert_eq!(cpu.regs.sr & N, N);
}

#[test]
fn test_swap_and_extend() {
    let mut buf = vec![0u8; RAM_SIZE];
    // SWAP D0 ; EXT.W D1 ; EXT.L D2
    let mut cpu = boot(Model::M68000, &mut buf, &[0x4840, 0x4881, 0x48C2]);
    cpu.regs.d[0] = 0x1234_5678;
    cpu.regs.d[1] = 0x1111_1180;
    cpu.regs.d[2] = 0x0000_8000;

    cpu.run(3);

    assert_eq!(cpu.regs.d[0], 0x5678_1234);
    assert_eq!(cpu.regs.d[1], 0x1111_FF80);
    assert_eq!(cpu.regs.d[2], 0xFFFF_8000);
}

#[test]
fn test_extb_on_68020() {
    let mut buf = vec![0u8; RAM_SIZE];
    // EXTB.L D0
    let mut cpu = boot(Model::M68020, &mut buf, &[0x49C0]);
    cpu.regs.d[0] = 0x1234_5680;

    cpu.step();

    assert_eq!(cpu.regs.d[0], 0xFFFF_FF80);
    assert_eq!(cpu.regs.sr & N, N);
}

#[test]
fn test_immediate_logic_and_ccr() {
    let mut buf = vec![0u8; RAM_SIZE];
    // ORI.B #$F0,D0 ; ANDI.W #$00FF,D0 ; ORI #$11,CCR
    let mut cpu = boot(
        Model::M68000,
        &mut buf,
        &[0x0000, 0x00F0, 0x0240, 0x00FF, 0x003C, 0x0011],
    );
    cpu.regs.d[0] = 0xABCD_0F0F;

    cpu.run(3);

    assert_eq!(cpu.regs.d[0], 0xABCD_00FF);
    assert_eq!(cpu.regs.ccr() & (X | C) as u8, (X | C) as u8);
}

#[test]
fn test_scc() {
    let mut buf = vec![0u8; RAM_SIZE];
    // SEQ D0 ; SNE D1
    let mut cpu = boot(Model::M68000, &mut buf, &[0x57C0, 0x56C1]);
    cpu.regs.set_ccr(Z as u8);

    cpu.run(2);

    assert_eq!(cpu.regs.d[0] & 0xFF, 0xFF);
    assert_eq!(cpu.regs.d[1] & 0xFF, 0x00);
}

#[test]
fn test_movec_vbr_on_68010() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVEC D0,VBR ; MOVEC VBR,D1
    let mut cpu = boot(Model::M68010, &mut buf, &[0x4E7B, 0x0801, 0x4E7A, 0x1801]);
    cpu.regs.d[0] = 0x0000_2000;

    cpu.step();
    assert_eq!(cpu.regs.vbr, 0x2000);
    cpu.step();
    assert_eq!(cpu.regs.d[1], 0x2000);
}

#[test]
fn test_pc_relative_tst_on_68020() {
    let mut buf = vec![0u8; RAM_SIZE];
    // TST.W (4,PC) ; NOP ; dc.w $8000
    let mut cpu = boot(Model::M68020, &mut buf, &[0x4A7A, 0x0004, 0x4E71, 0x8000]);

    cpu.step();

    assert_eq!(cpu.regs.sr & N, N);
}

#[test]
fn test_failed_write_halts() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVE.L D0,(A0)
    let mut cpu = boot(Model::M68000, &mut buf, &[0x2080]);
    cpu.regs.a[0] = 0x00FF_0000;

    assert_eq!(cpu.step(), Condition::Halted);
    let snapshot = cpu.regs;
    assert_eq!(cpu.step(), Condition::Halted);
    assert_eq!(cpu.regs, snapshot);
}

#[test]
fn test_failed_movep_keeps_bytes_already_written() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVEP.L D0,0(A0): the third byte falls past the end of RAM
    let mut cpu = boot(Model::M68000, &mut buf, &[0x01C8, 0x0000]);
    cpu.regs.d[0] = 0x1234_5678;
    cpu.regs.a[0] = 0xFFFC;

    assert_eq!(cpu.step(), Condition::Halted);
    assert_eq!(byte_at(&cpu, 0xFFFC), 0x12);
    assert_eq!(byte_at(&cpu, 0xFFFE), 0x34);
}

#[test]
fn test_failed_write_keeps_postincrement() {
    let mut buf = vec![0u8; RAM_SIZE];
    // MOVE.L (A0)+,(A1)
    let mut cpu = boot(Model::M68000, &mut buf, &[0x2298]);
    cpu.regs.a[0] = 0x0100;
    cpu.regs.a[1] = 0x00FF_0000;

    assert_eq!(cpu.step(), Condition::Halted);
    assert_eq!(cpu.regs.a[0], 0x0104);
    assert_eq!(cpu.step(), Condition::Halted);
    assert_eq!(cpu.regs.a[0], 0x0104);
}
