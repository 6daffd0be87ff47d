//! Operand sizes and arithmetic with flag computation.
//!
//! Each operation returns the masked result together with the updated SR.

use crate::flags::{C, N, V, X, Z};

/// Operation size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    /// 8-bit byte.
    Byte,
    /// 16-bit word.
    Word,
    /// 32-bit long.
    Long,
}

impl Size {
    /// Standard two-bit size field (00=byte, 01=word, 10=long).
    #[must_use]
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits & 0x03 {
            0 => Some(Self::Byte),
            1 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    /// MOVE size field (01=byte, 11=word, 10=long).
    #[must_use]
    pub fn from_move_bits(bits: u16) -> Option<Self> {
        match bits & 0x03 {
            1 => Some(Self::Byte),
            3 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
        }
    }

    #[must_use]
    pub const fn msb_mask(self) -> u32 {
        match self {
            Self::Byte => 0x80,
            Self::Word => 0x8000,
            Self::Long => 0x8000_0000,
        }
    }

    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Long => 0xFFFF_FFFF,
        }
    }

    /// Sign-extend a value of this size to 32 bits.
    #[must_use]
    pub const fn sign_extend(self, value: u32) -> u32 {
        match self {
            Self::Byte => value as u8 as i8 as i32 as u32,
            Self::Word => value as u16 as i16 as i32 as u32,
            Self::Long => value,
        }
    }

    /// Replace the low bits of `dst` covered by this size with `value`.
    #[must_use]
    pub const fn merge(self, dst: u32, value: u32) -> u32 {
        (dst & !self.mask()) | (value & self.mask())
    }
}

fn nz(flags: u16, result: u32, size: Size) -> u16 {
    let mut flags = flags;
    if result == 0 {
        flags |= Z;
    }
    if result & size.msb_mask() != 0 {
        flags |= N;
    }
    flags
}

/// `dst + src` (ADD, ADDI, ADDQ).
#[must_use]
pub fn add(src: u32, dst: u32, size: Size, sr: u16) -> (u32, u16) {
    let msb = size.msb_mask();
    let s = src & size.mask();
    let d = dst & size.mask();
    let result = s.wrapping_add(d) & size.mask();

    let mut flags = nz(sr & !(C | V | Z | N | X), result, size);
    let carry = (s & d) | ((s | d) & !result);
    if carry & msb != 0 {
        flags |= C | X;
    }
    if (s ^ result) & (d ^ result) & msb != 0 {
        flags |= V;
    }
    (result, flags)
}

/// `dst - src` (SUB, SUBI, SUBQ).
#[must_use]
pub fn sub(src: u32, dst: u32, size: Size, sr: u16) -> (u32, u16) {
    let msb = size.msb_mask();
    let s = src & size.mask();
    let d = dst & size.mask();
    let result = d.wrapping_sub(s) & size.mask();

    let mut flags = nz(sr & !(C | V | Z | N | X), result, size);
    let borrow = (!d & s) | ((!d | s) & result);
    if borrow & msb != 0 {
        flags |= C | X;
    }
    if (s ^ d) & (result ^ d) & msb != 0 {
        flags |= V;
    }
    (result, flags)
}

/// Compare: flags of `dst - src` with X preserved.
#[must_use]
pub fn cmp(src: u32, dst: u32, size: Size, sr: u16) -> u16 {
    let (_, flags) = sub(src, dst, size, sr);
    (flags & !X) | (sr & X)
}

/// `0 - dst` (NEG).
#[must_use]
pub fn neg(dst: u32, size: Size, sr: u16) -> (u32, u16) {
    sub(dst, 0, size, sr)
}
