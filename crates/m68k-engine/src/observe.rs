//! Named read-only access to processor state for hosts and debuggers.

use std::fmt;

use crate::flags::{C, N, V, X, Z};
use crate::memory::Memory;
use crate::processor::Processor;

/// A queried value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    I32(i32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::I32(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

/// Components that expose their state by path.
pub trait Observable {
    /// Query one property, e.g. `pc`, `d3` or `flags.z`. `None` for an
    /// unknown path.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path `query` understands.
    fn query_paths(&self) -> &'static [&'static str];
}

/// Paths understood by [`Processor`].
#[rustfmt::skip]
pub const QUERY_PATHS: &[&str] = &[
    "d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7",
    "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7",
    "usp", "ssp", "pc", "sr", "ccr",
    "vbr", "sfc", "dfc", "cacr",
    "flags.x", "flags.n", "flags.z", "flags.v", "flags.c",
    "flags.s", "flags.t", "int_mask",
    "opcode", "condition",
];

impl<M: Memory> Observable for Processor<M> {
    fn query(&self, path: &str) -> Option<Value> {
        let regs = &self.regs;
        if let Some(n) = register_index(path, 'd') {
            return Some(regs.d[n].into());
        }
        if let Some(n) = register_index(path, 'a') {
            return Some(regs.a(n).into());
        }
        match path {
            "usp" => Some(regs.usp.into()),
            "ssp" => Some(regs.ssp.into()),
            "pc" => Some(regs.pc.into()),
            "sr" => Some(regs.sr.into()),
            "ccr" => Some(regs.ccr().into()),
            "vbr" => Some(regs.vbr.into()),
            "sfc" => Some(regs.sfc.into()),
            "dfc" => Some(regs.dfc.into()),
            "cacr" => Some(regs.cacr.into()),
            "flags.x" => Some((regs.sr & X != 0).into()),
            "flags.n" => Some((regs.sr & N != 0).into()),
            "flags.z" => Some((regs.sr & Z != 0).into()),
            "flags.v" => Some((regs.sr & V != 0).into()),
            "flags.c" => Some((regs.sr & C != 0).into()),
            "flags.s" => Some(regs.is_supervisor().into()),
            "flags.t" => Some(regs.is_trace().into()),
            "int_mask" => Some(regs.interrupt_mask().into()),
            "opcode" => Some(self.opcode().into()),
            "condition" => Some(Value::I32(self.condition().to_raw())),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

/// `d3` -> 3 for `prefix` 'd'.
fn register_index(path: &str, prefix: char) -> Option<usize> {
    let digit = path.strip_prefix(prefix)?;
    match digit.as_bytes() {
        [d @ b'0'..=b'7'] => Some(usize::from(d - b'0')),
        _ => None,
    }
}
