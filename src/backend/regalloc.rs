//! Brute-force per-block register allocation.
//!
//! Bindings from temps to physical registers are block-local: every block is
//! allocated from a clean register file, and values that must survive a block
//! boundary are written to their stack slots before the block ends.
//! Persistence across blocks happens through memory, never through carried
//! register state.

use super::abi::Reg;
use super::cfg::{BasicBlock, Cfg, Loc};
use super::emitter::{AsmPrinter, SubroutineEmitter};
use super::instruction::{Operand, RvInstr};
use super::isel::SubroutineInfo;
use crate::tac::Temp;
use crate::CodegenError;
use log::trace;
use rand::Rng;
use std::collections::{HashMap, HashSet};

// ── Eviction policy ─────────────────────────────────────────────────────

/// Chooses the register to evict when every allocatable register holds a
/// live value.  Any choice is correct (the occupant is spilled first); the
/// policy only affects code quality.
pub trait EvictionPolicy {
    fn pick(&mut self, candidates: &[Reg]) -> Reg;
}

/// Default policy: an unweighted random choice.  Deliberately simple — no
/// use-distance or LRU bookkeeping.
#[derive(Debug, Default)]
pub struct RandomEviction;

impl RandomEviction {
    pub fn new() -> Self {
        Self
    }
}

impl EvictionPolicy for RandomEviction {
    fn pick(&mut self, candidates: &[Reg]) -> Reg {
        candidates[rand::thread_rng().gen_range(0..candidates.len())]
    }
}

/// Always evicts the first candidate.  Deterministic; meant for tests that
/// need stable output.
#[derive(Debug, Default)]
pub struct EvictFirst;

impl EvictionPolicy for EvictFirst {
    fn pick(&mut self, candidates: &[Reg]) -> Reg {
        candidates[0]
    }
}

// ── Register file ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct RegState {
    /// Temp currently backed by this register; `Some` iff occupied.
    temp: Option<Temp>,
    /// Ever bound during the current function.  Monotonic within a function;
    /// drives callee-saved save/restore in the prologue/epilogue.
    used: bool,
}

/// Occupancy and usage state for the allocatable registers.  One value per
/// allocator; reset per function, with occupancy additionally dropped at
/// every block boundary.
#[derive(Debug)]
pub struct RegisterFile {
    states: [RegState; Reg::ALLOCATABLE.len()],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            states: [RegState::default(); Reg::ALLOCATABLE.len()],
        }
    }

    fn slot(reg: Reg) -> usize {
        Reg::ALLOCATABLE
            .iter()
            .position(|&r| r == reg)
            .expect("not an allocatable register")
    }

    /// Full reset at function entry: occupancy and `used` flags.
    pub fn reset(&mut self) {
        self.states = [RegState::default(); Reg::ALLOCATABLE.len()];
    }

    pub fn occupant(&self, reg: Reg) -> Option<Temp> {
        self.states[Self::slot(reg)].temp
    }

    pub fn is_occupied(&self, reg: Reg) -> bool {
        self.occupant(reg).is_some()
    }

    fn bind(&mut self, reg: Reg, temp: Temp) {
        let state = &mut self.states[Self::slot(reg)];
        state.temp = Some(temp);
        state.used = true;
    }

    fn unbind(&mut self, reg: Reg) {
        self.states[Self::slot(reg)].temp = None;
    }

    /// Callee-saved registers bound at least once this function, in the
    /// fixed callee-saved order.
    pub fn used_callee_saved(&self) -> Vec<Reg> {
        Reg::CALLEE_SAVED
            .iter()
            .copied()
            .filter(|&r| self.states[Self::slot(r)].used)
            .collect()
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

// ── Allocator ───────────────────────────────────────────────────────────

pub struct BruteRegAlloc {
    regs: RegisterFile,
    /// temp index → register currently holding it.  Kept consistent with
    /// the register file's occupancy at all times.
    bindings: HashMap<u32, Reg>,
    policy: Box<dyn EvictionPolicy>,
}

impl BruteRegAlloc {
    pub fn new() -> Self {
        Self::with_policy(Box::new(RandomEviction::new()))
    }

    pub fn with_policy(policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            regs: RegisterFile::new(),
            bindings: HashMap::new(),
            policy,
        }
    }

    /// Allocate registers for one function and drive its emission.  Blocks
    /// are processed in program order; unreachable blocks are skipped
    /// entirely (no labels, no code, no liveness contribution).
    pub fn accept(
        &mut self,
        graph: &Cfg,
        info: &SubroutineInfo,
        printer: &mut AsmPrinter,
    ) -> Result<(), CodegenError> {
        let mut sub = SubroutineEmitter::new(printer, info);

        self.regs.reset();
        self.bindings.clear();

        // The calling convention delivers parameters in the argument
        // registers; selection already rejected functions with more
        // parameters than registers.
        for (idx, &arg) in info.arg_temps.iter().enumerate() {
            self.bind(arg, Reg::ARG_REGS[idx]);
        }

        for id in 0..graph.nodes.len() {
            if !graph.is_reachable(id) {
                continue;
            }
            let bb = graph.block(id);
            if let Some(label) = &bb.label {
                sub.emit_label(label.clone());
            }
            self.local_alloc(bb, &mut sub)?;
        }

        sub.emit_func(&self.regs.used_callee_saved());
        Ok(())
    }

    fn bind(&mut self, temp: Temp, reg: Reg) {
        if let Some(old) = self.regs.occupant(reg) {
            self.bindings.remove(&old.0);
        }
        if let Some(old_reg) = self.bindings.insert(temp.0, reg) {
            self.regs.unbind(old_reg);
        }
        self.regs.bind(reg, temp);
    }

    fn unbind(&mut self, temp: Temp) {
        if let Some(reg) = self.bindings.remove(&temp.0) {
            self.regs.unbind(reg);
        }
    }

    /// Allocate one basic block.  Live-out temps are stored to their slots
    /// before the terminator so the next block can reload them; a
    /// non-fallthrough terminator is allocated after those stores so it can
    /// itself reference freshly spilled values.
    fn local_alloc(
        &mut self,
        bb: &BasicBlock,
        sub: &mut SubroutineEmitter<'_>,
    ) -> Result<(), CodegenError> {
        for loc in bb.all_seq() {
            self.alloc_for_loc(loc, sub)?;
        }

        let mut live_out: Vec<u32> = bb.live_out.iter().copied().collect();
        live_out.sort_unstable();
        for t in live_out {
            if let Some(&reg) = self.bindings.get(&t) {
                sub.emit_store_to_stack(reg, Temp(t));
            }
        }

        if let Some(term) = bb.terminator() {
            self.alloc_for_loc(term, sub)?;
        }

        // Bindings are block-local: nothing carries over.
        let bound: Vec<Reg> = self.bindings.values().copied().collect();
        self.bindings.clear();
        for reg in bound {
            self.regs.unbind(reg);
        }
        Ok(())
    }

    fn alloc_for_loc(
        &mut self,
        loc: &Loc,
        sub: &mut SubroutineEmitter<'_>,
    ) -> Result<(), CodegenError> {
        let mut instr = loc.instr.clone();

        if instr.is_call() {
            self.alloc_for_call(&instr, sub)?;
        }

        let src_ops: Vec<Operand> = instr.srcs().into_iter().copied().collect();
        let dst_ops: Vec<Operand> = instr.dsts().into_iter().copied().collect();

        // Registers already handed to this instruction's operands must not be
        // reused for its remaining operands: evicting one would clobber a
        // value the instruction is about to read.
        let mut pinned: Vec<Reg> = Vec::new();
        let mut src_regs = Vec::with_capacity(src_ops.len());
        for op in src_ops {
            let reg = match op {
                Operand::Reg(r) => r,
                Operand::Temp(t) => self.alloc_reg_for(t, true, &loc.live_in, &pinned, sub)?,
            };
            pinned.push(reg);
            src_regs.push(reg);
        }
        let mut dst_regs = Vec::with_capacity(dst_ops.len());
        for op in dst_ops {
            let reg = match op {
                Operand::Reg(r) => r,
                Operand::Temp(t) => self.alloc_reg_for(t, false, &loc.live_in, &pinned, sub)?,
            };
            pinned.push(reg);
            dst_regs.push(reg);
        }

        instr.fill_regs(&dst_regs, &src_regs);
        let was_call = instr.is_call();
        sub.emit(instr);

        if was_call {
            // The callee may clobber every caller-saved register.  Their
            // occupants are all memory-current at this point (spilled above,
            // or loaded from their slots as arguments), so the bindings are
            // dropped rather than stored.
            for reg in Reg::CALLER_SAVED {
                if let Some(temp) = self.regs.occupant(reg) {
                    self.unbind(temp);
                }
            }
        }
        Ok(())
    }

    /// Marshal a call: spill and release every occupied caller-saved
    /// register, store any argument still sitting in a callee-saved one,
    /// then bind each argument temp to its argument register and reload its
    /// value from the stack.
    fn alloc_for_call(
        &mut self,
        instr: &RvInstr,
        sub: &mut SubroutineEmitter<'_>,
    ) -> Result<(), CodegenError> {
        let args = match instr {
            RvInstr::Call { args, .. } => args.clone(),
            _ => return Ok(()),
        };

        for reg in Reg::CALLER_SAVED {
            if let Some(temp) = self.regs.occupant(reg) {
                sub.emit_store_to_stack(reg, temp);
                self.unbind(temp);
            }
        }

        // Arguments resident in callee-saved registers are not covered by
        // the spill above; store them so the loads below find a slot.
        let mut stored: Vec<u32> = Vec::new();
        for op in &args {
            if let Some(t) = op.temp() {
                if let Some(&reg) = self.bindings.get(&t.0) {
                    if !stored.contains(&t.0) {
                        sub.emit_store_to_stack(reg, t);
                        stored.push(t.0);
                    }
                }
            }
        }

        for (idx, op) in args.iter().enumerate() {
            let arg = match op.temp() {
                Some(t) => t,
                None => continue,
            };
            let reg = Reg::ARG_REGS[idx];
            if let Some(temp) = self.regs.occupant(reg) {
                self.unbind(temp);
            }
            self.bind(arg, reg);
            trace!("allocate {arg} to {reg} (call argument)");
            sub.emit_load_from_stack(reg, arg)?;
        }
        Ok(())
    }

    /// Find a register for `temp` at a program point where `live` holds.
    /// Preference order: the existing binding, then any register that is
    /// unoccupied or holds a dead value, then eviction via the policy.
    /// Registers in `pinned` belong to the instruction being allocated and
    /// are never taken over or evicted.
    fn alloc_reg_for(
        &mut self,
        temp: Temp,
        is_read: bool,
        live: &HashSet<u32>,
        pinned: &[Reg],
        sub: &mut SubroutineEmitter<'_>,
    ) -> Result<Reg, CodegenError> {
        if let Some(&reg) = self.bindings.get(&temp.0) {
            return Ok(reg);
        }

        for reg in Reg::ALLOCATABLE {
            if pinned.contains(&reg) {
                continue;
            }
            let takeable = match self.regs.occupant(reg) {
                None => true,
                // A dead occupant can be overwritten without spilling.
                Some(occupant) => !live.contains(&occupant.0),
            };
            if takeable {
                trace!("allocate {temp} to {reg} (read: {is_read})");
                if is_read {
                    sub.emit_load_from_stack(reg, temp)?;
                }
                if let Some(occupant) = self.regs.occupant(reg) {
                    self.unbind(occupant);
                }
                self.bind(temp, reg);
                return Ok(reg);
            }
        }

        let candidates: Vec<Reg> = Reg::ALLOCATABLE
            .iter()
            .copied()
            .filter(|r| !pinned.contains(r))
            .collect();
        let victim = self.policy.pick(&candidates);
        if let Some(occupant) = self.regs.occupant(victim) {
            sub.emit_store_to_stack(victim, occupant);
            trace!("spill {victim} ({occupant})");
            self.unbind(occupant);
        }
        self.bind(temp, victim);
        trace!("allocate {temp} to {victim} (read: {is_read})");
        if is_read {
            sub.emit_load_from_stack(victim, temp)?;
        }
        Ok(victim)
    }
}

impl Default for BruteRegAlloc {
    fn default() -> Self {
        Self::new()
    }
}
