//! A register-allocating RISC-V (RV32) backend for a linear three-address
//! IR.
//!
//! The crate takes a [`tac::TacProg`] — flat three-address code over virtual
//! registers, produced by an external frontend — and emits textual RV32
//! assembly: data sections for globals, then one register-allocated,
//! stack-frame-disciplined body per function.
//!
//! ```
//! use rv32_codegen::tac::{Label, TacFunc, TacInstr, TacProg, TempPool};
//!
//! let mut temps = TempPool::new();
//! let t = temps.fresh();
//! let mut func = TacFunc::new(Label::new("main"), vec![]);
//! func.push(TacInstr::LoadImm { dst: t, value: 42 });
//! func.push(TacInstr::Return { value: Some(t) });
//!
//! let mut prog = TacProg::new();
//! prog.funcs.push(func);
//! let asm = rv32_codegen::emit_program(&prog).unwrap();
//! assert!(asm.contains("main:"));
//! ```

pub mod backend;
pub mod tac;

use thiserror::Error;

pub use backend::{emit_program, emit_program_with_policy};

/// Fatal backend failures.  Both variants indicate that the input IR is
/// outside the supported subset or that an internal invariant broke; neither
/// is a diagnosable user error, and no partial output is produced.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// A function or call site needs more argument temps than the calling
    /// convention can pass in registers.  Stack-passed arguments are not
    /// supported.
    #[error(
        "call to `{func}` passes {count} arguments but only {max} argument registers are available"
    )]
    UnsupportedCall {
        func: String,
        count: usize,
        max: usize,
    },

    /// A stack reload was requested for a temp that was never spilled.
    /// Indicates an allocator bug or a liveness/use mismatch.
    #[error("temp {0} has no stack slot assigned")]
    MissingStackSlot(tac::Temp),
}
