//! RV32 backend — lowers TAC to register-allocated RISC-V assembly.
//!
//! Module layout:
//! - `abi`         — physical registers, register classes, frame constants
//! - `instruction` — typed machine instructions and operands
//! - `cfg`         — basic-block partitioning and control-flow edges
//! - `liveness`    — dataflow-based liveness analysis
//! - `isel`        — instruction selection (TAC → RV32 over temps)
//! - `regalloc`    — per-block register allocation with spilling
//! - `emitter`     — stack frames, prologue/epilogue, assembly text
//!
//! The per-function pipeline is: instruction selection, CFG construction,
//! liveness analysis, register allocation driving the subroutine emitter.
//! The program emitter wraps all functions with the global-data sections.

pub mod abi;
pub mod cfg;
pub mod emitter;
pub mod instruction;
pub mod isel;
pub mod liveness;
pub mod regalloc;

use crate::tac::TacProg;
use crate::CodegenError;
use cfg::CfgBuilder;
use emitter::AsmPrinter;
use isel::select_instrs;
use liveness::LivenessAnalyzer;
use log::debug;
use regalloc::{BruteRegAlloc, EvictionPolicy, RandomEviction};

/// Emit assembly for a whole program with the default (random) eviction
/// policy.
pub fn emit_program(prog: &TacProg) -> Result<String, CodegenError> {
    emit_program_with_policy(prog, Box::new(RandomEviction::new()))
}

/// Emit assembly for a whole program with a specific spill-eviction policy.
pub fn emit_program_with_policy(
    prog: &TacProg,
    policy: Box<dyn EvictionPolicy>,
) -> Result<String, CodegenError> {
    let mut printer = AsmPrinter::new();
    print_globals(&mut printer, prog);

    let analyzer = LivenessAnalyzer::new();
    let mut reg_alloc = BruteRegAlloc::with_policy(policy);
    for func in &prog.funcs {
        debug!("compiling function {}", func.entry);
        let (seq, info) = select_instrs(func)?;
        let mut graph = CfgBuilder::new().build(seq);
        analyzer.analyze(&mut graph);
        reg_alloc.accept(&graph, &info, &mut printer)?;
    }

    Ok(printer.finish())
}

/// Data sections: initialized globals as `.word`s in `.data`, uninitialized
/// ones as reserved spans in `.bss`.
fn print_globals(printer: &mut AsmPrinter, prog: &TacProg) {
    let initialized: Vec<_> = prog.globals.iter().filter(|g| g.init.is_some()).collect();
    let uninitialized: Vec<_> = prog.globals.iter().filter(|g| g.init.is_none()).collect();

    if !initialized.is_empty() {
        printer.println(".data");
        for var in &initialized {
            printer.println(format!(".globl {}", var.name));
            printer.println(format!("{}:", var.name));
            printer.println(format!("    .word {}", var.init.unwrap_or(0)));
        }
        printer.println("");
    }

    if !uninitialized.is_empty() {
        printer.println(".bss");
        for var in &uninitialized {
            printer.println(format!(".globl {}", var.name));
            printer.println(format!("{}:", var.name));
            printer.println(format!("    .space {}", var.size));
        }
        printer.println("");
    }

    printer.println(".text");
    printer.println(".global main");
    printer.println("");
}
