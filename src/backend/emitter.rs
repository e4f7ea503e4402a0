//! Assembly output — the text printer and the per-function emitter.
//!
//! The [`SubroutineEmitter`] buffers the allocated instruction stream for one
//! function and owns its stack-frame bookkeeping: spill-slot offsets are
//! handed out monotonically on first spill, and the prologue/epilogue are
//! synthesized once the final frame size is known.

use super::abi::{Reg, EPILOGUE_SUFFIX, WORD_SIZE};
use super::instruction::RvInstr;
use super::isel::SubroutineInfo;
use crate::tac::{Label, Temp};
use crate::CodegenError;
use std::collections::HashMap;

// ── Printer ─────────────────────────────────────────────────────────────

/// Accumulates the output assembly line by line.
#[derive(Debug, Default)]
pub struct AsmPrinter {
    lines: Vec<String>,
}

impl AsmPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn println(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn print_label(&mut self, label: &Label) {
        self.lines.push(format!("{label}:"));
    }

    pub fn print_instr(&mut self, instr: &RvInstr) {
        self.lines.push(format!("    {instr}"));
    }

    pub fn print_comment(&mut self, comment: &str) {
        self.lines.push(format!("    # {comment}"));
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

// ── Per-function emission ───────────────────────────────────────────────

/// Stack frame layout, fp-relative (frame pointer == post-prologue sp):
///
/// ```text
/// fp + 0 .. 4*S       saved callee-saved registers (one word each)
/// fp + 4*S            saved return address
/// fp + 4*S + 4        caller's frame pointer
/// fp + 4*S + 8 ..     spill slots, one word per spilled temp
/// ```
///
/// where `S = Reg::CALLEE_SAVED.len()`.  The region up to the first spill
/// slot is reserved unconditionally; only used callee-saved registers are
/// actually written there.
pub struct SubroutineEmitter<'a> {
    info: SubroutineInfo,
    printer: &'a mut AsmPrinter,
    /// Allocated instructions for this function, flushed by `emit_func`.
    buf: Vec<RvInstr>,
    /// Frame offset of each spilled temp, by temp index.
    offsets: HashMap<u32, i32>,
    /// Next unassigned frame offset; grows by one word per spilled temp.
    next_local_offset: i32,
}

const RA_OFFSET: i32 = WORD_SIZE * Reg::CALLEE_SAVED.len() as i32;
const OLD_FP_OFFSET: i32 = RA_OFFSET + WORD_SIZE;
const FIRST_SPILL_OFFSET: i32 = OLD_FP_OFFSET + WORD_SIZE;

impl<'a> SubroutineEmitter<'a> {
    pub fn new(printer: &'a mut AsmPrinter, info: &SubroutineInfo) -> Self {
        printer.print_label(&info.entry);
        Self {
            info: info.clone(),
            printer,
            buf: Vec::new(),
            offsets: HashMap::new(),
            next_local_offset: FIRST_SPILL_OFFSET,
        }
    }

    /// Append an allocated instruction to the function body.
    pub fn emit(&mut self, instr: RvInstr) {
        self.buf.push(instr);
    }

    pub fn emit_label(&mut self, label: Label) {
        self.buf.push(RvInstr::Label(label));
    }

    /// Spill `temp` from `src` to its stack slot, assigning the slot on the
    /// first spill.
    pub fn emit_store_to_stack(&mut self, src: Reg, temp: Temp) {
        let offset = *self.offsets.entry(temp.0).or_insert_with(|| {
            let o = self.next_local_offset;
            self.next_local_offset += WORD_SIZE;
            o
        });
        self.buf.push(RvInstr::Sw {
            src: src.into(),
            base: Reg::Fp.into(),
            offset,
        });
    }

    /// Reload `temp` from its stack slot into `dst`.  A temp that was never
    /// spilled has no slot; asking for one is an allocator bug.
    pub fn emit_load_from_stack(&mut self, dst: Reg, src: Temp) -> Result<(), CodegenError> {
        let offset = *self
            .offsets
            .get(&src.0)
            .ok_or(CodegenError::MissingStackSlot(src))?;
        self.buf.push(RvInstr::Lw {
            dst: dst.into(),
            base: Reg::Fp.into(),
            offset,
        });
        Ok(())
    }

    /// Total frame size in bytes: the fixed reserved region plus one word
    /// per distinct spilled temp.
    pub fn frame_size(&self) -> i32 {
        self.next_local_offset
    }

    /// Synthesize the complete function: prologue, body, shared epilogue.
    /// Every return site in the body jumps to the epilogue label rather than
    /// duplicating the teardown.
    pub fn emit_func(self, used_callee: &[Reg]) {
        let frame = self.frame_size();
        let p = self.printer;

        p.print_comment("start of prologue");
        p.print_instr(&RvInstr::SpAdd { offset: -frame });
        p.print_instr(&RvInstr::Sw {
            src: Reg::Fp.into(),
            base: Reg::Sp.into(),
            offset: OLD_FP_OFFSET,
        });
        p.print_instr(&RvInstr::Mv {
            dst: Reg::Fp.into(),
            src: Reg::Sp.into(),
        });
        for (i, &reg) in Reg::CALLEE_SAVED.iter().enumerate() {
            if used_callee.contains(&reg) {
                p.print_instr(&RvInstr::Sw {
                    src: reg.into(),
                    base: Reg::Fp.into(),
                    offset: WORD_SIZE * i as i32,
                });
            }
        }
        p.print_instr(&RvInstr::Sw {
            src: Reg::Ra.into(),
            base: Reg::Fp.into(),
            offset: RA_OFFSET,
        });
        p.print_comment("end of prologue");
        p.println("");

        p.print_comment("start of body");
        for instr in &self.buf {
            match instr {
                RvInstr::Label(l) => p.print_label(l),
                _ => p.print_instr(instr),
            }
        }
        p.print_comment("end of body");
        p.println("");

        let epilogue = Label::new(format!("{}{}", self.info.entry, EPILOGUE_SUFFIX));
        p.print_label(&epilogue);
        p.print_comment("start of epilogue");
        for (i, &reg) in Reg::CALLEE_SAVED.iter().enumerate() {
            if used_callee.contains(&reg) {
                p.print_instr(&RvInstr::Lw {
                    dst: reg.into(),
                    base: Reg::Fp.into(),
                    offset: WORD_SIZE * i as i32,
                });
            }
        }
        p.print_instr(&RvInstr::Lw {
            dst: Reg::Ra.into(),
            base: Reg::Fp.into(),
            offset: RA_OFFSET,
        });
        p.print_instr(&RvInstr::Mv {
            dst: Reg::Sp.into(),
            src: Reg::Fp.into(),
        });
        p.print_instr(&RvInstr::Lw {
            dst: Reg::Fp.into(),
            base: Reg::Sp.into(),
            offset: OLD_FP_OFFSET,
        });
        p.print_instr(&RvInstr::SpAdd { offset: frame });
        p.print_comment("end of epilogue");
        p.println("");

        p.print_instr(&RvInstr::Ret);
        p.println("");
    }
}
