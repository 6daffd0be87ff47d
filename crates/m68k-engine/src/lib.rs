//! Instruction-at-a-time interpreter for the Motorola 68000 family.
//!
//! The engine executes one instruction per [`Processor::step`] against a
//! host-supplied [`Memory`] and reports the resulting [`Condition`]. It models
//! the programmer-visible state of the 68000, 68010, 68020, 68030 and 68040
//! integer units; timing, caches, the MMU and the FPU are not emulated.
//!
//! # Architecture
//!
//! - `memory`: address translation with function codes and the optional
//!   low-memory protection policy.
//! - `decode`: a static table of [`Instruction`] entries, each naming an
//!   operand fetcher, a microcode operation and a privilege class.
//! - `fetch` / `ea`: operand fetchers and effective address resolution.
//! - `microcode`: instruction semantics over fetched operands.
//! - `exceptions`: fault classification, frame building and RTE.
//!
//! Faults travel as `Result<_, Fault>` from the point of detection back to
//! the step loop, which is the only place exceptions are taken.

pub mod alu;
pub mod condition;
pub mod config;
pub mod decode;
mod ea;
pub mod exceptions;
pub mod fetch;
pub mod flags;
pub mod memory;
pub mod microcode;
pub mod model;
pub mod observe;
pub mod processor;
pub mod registers;

pub use alu::Size;
pub use condition::Condition;
pub use config::ProcessorConfig;
pub use decode::{Instruction, Privilege, decode};
pub use ea::AddrMode;
pub use exceptions::{BusCycle, Fault, FaultPolicy};
pub use fetch::{Fetch, MAX_PARAMS, Operand, Params};
pub use flags::Status;
pub use memory::{
    Access, FunctionCode, LOW_MEMORY_LIMIT, MapError, Memory, MemoryError, MemoryMap,
    MemoryMapBuilder, MemoryRegion, RegionPolicy,
};
pub use microcode::Op;
pub use model::{Capabilities, Model, ModelParseError};
pub use observe::{Observable, QUERY_PATHS, Value};
pub use processor::Processor;
pub use registers::Registers;
