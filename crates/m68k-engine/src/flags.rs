//! Status register bits and condition evaluation.
//!
//! Layout (bit-exact with the hardware):
//! - Bits 0-4: condition codes C, V, Z, N, X
//! - Bits 8-10: interrupt priority mask
//! - Bit 12: master/interrupt state (68020+, stored only)
//! - Bit 13: supervisor
//! - Bits 14-15: trace enable T0, T1 (T0 is 68020+)

use crate::alu::Size;

/// Carry.
pub const C: u16 = 0x0001;
/// Overflow.
pub const V: u16 = 0x0002;
/// Zero.
pub const Z: u16 = 0x0004;
/// Negative.
pub const N: u16 = 0x0008;
/// Extend.
pub const X: u16 = 0x0010;

/// Interrupt priority mask field.
pub const IPL_MASK: u16 = 0x0700;
/// Master/interrupt state.
pub const M: u16 = 0x1000;
/// Supervisor state.
pub const S: u16 = 0x2000;
/// Trace on change of flow (68020+).
pub const T0: u16 = 0x4000;
/// Trace on any instruction.
pub const T1: u16 = 0x8000;
/// Both trace bits.
pub const TRACE_MASK: u16 = T0 | T1;

/// Condition code bits.
pub const CCR_MASK: u16 = 0x001F;

/// Status register helpers. All take and return a full SR value.
pub struct Status;

impl Status {
    /// Set N and Z from a result of the given size.
    #[must_use]
    pub fn update_nz(sr: u16, value: u32, size: Size) -> u16 {
        let value = value & size.mask();
        let sr = Self::set_if(sr, Z, value == 0);
        Self::set_if(sr, N, value & size.msb_mask() != 0)
    }

    /// Flags for a move-class result: N and Z from the value, V and C clear,
    /// X untouched.
    #[must_use]
    pub fn logical(sr: u16, value: u32, size: Size) -> u16 {
        Self::clear_vc(Self::update_nz(sr, value, size))
    }

    /// Clear V and C.
    #[must_use]
    pub fn clear_vc(sr: u16) -> u16 {
        sr & !(V | C)
    }

    /// Set `flag` if `condition` holds, clear it otherwise.
    #[must_use]
    pub fn set_if(sr: u16, flag: u16, condition: bool) -> u16 {
        if condition { sr | flag } else { sr & !flag }
    }

    /// Evaluate one of the sixteen condition tests used by Bcc, Scc and DBcc.
    #[must_use]
    pub fn condition(sr: u16, cc: u8) -> bool {
        let c = sr & C != 0;
        let v = sr & V != 0;
        let z = sr & Z != 0;
        let n = sr & N != 0;
        match cc & 0x0F {
            0x0 => true,           // T
            0x1 => false,          // F
            0x2 => !c && !z,       // HI
            0x3 => c || z,         // LS
            0x4 => !c,             // CC
            0x5 => c,              // CS
            0x6 => !z,             // NE
            0x7 => z,              // EQ
            0x8 => !v,             // VC
            0x9 => v,              // VS
            0xA => !n,             // PL
            0xB => n,              // MI
            0xC => n == v,         // GE
            0xD => n != v,         // LT
            0xE => !z && (n == v), // GT
            _ => z || (n != v),    // LE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_nz_respects_size() {
        let sr = Status::update_nz(0, 0x0000_0080, Size::Byte);
        assert_eq!(sr & (N | Z), N);
        let sr = Status::update_nz(0, 0x0000_0080, Size::Word);
        assert_eq!(sr & (N | Z), 0);
        let sr = Status::update_nz(N, 0x1_0000, Size::Word);
        assert_eq!(sr & (N | Z), Z);
    }

    #[test]
    fn logical_keeps_extend() {
        let sr = Status::logical(X | V | C, 1, Size::Long);
        assert_eq!(sr, X);
    }

    #[test]
    fn signed_conditions() {
        // N set, V clear: less than
        assert!(Status::condition(N, 0xD));
        assert!(!Status::condition(N, 0xC));
        // N and V both set: greater or equal
        assert!(Status::condition(N | V, 0xC));
        assert!(Status::condition(Z, 0xF));
        assert!(!Status::condition(Z, 0xE));
    }

    #[test]
    fn unsigned_conditions() {
        assert!(Status::condition(0, 0x2));
        assert!(!Status::condition(C, 0x2));
        assert!(Status::condition(Z, 0x3));
        assert!(Status::condition(C, 0x5));
    }
}
