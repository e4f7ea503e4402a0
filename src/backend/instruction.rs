//! Typed RV32 machine instructions.
//!
//! Instruction selection produces these over virtual [`Temp`] operands;
//! register allocation rewrites every bare temp into a physical [`Reg`] via
//! [`RvInstr::fill_regs`].  ABI-fixed operands (`a0` for return values, `sp`
//! for stack bumps) are already physical when selection emits them and pass
//! through allocation unchanged.

use super::abi::Reg;
use crate::tac::{Label, Temp};
use std::fmt;

// ── Operands ────────────────────────────────────────────────────────────

/// An instruction operand: a virtual temp before allocation, a physical
/// register after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Temp(Temp),
    Reg(Reg),
}

impl Operand {
    /// The temp index, if this operand is still virtual.
    pub fn temp(&self) -> Option<Temp> {
        match self {
            Operand::Temp(t) => Some(*t),
            Operand::Reg(_) => None,
        }
    }
}

impl From<Temp> for Operand {
    fn from(t: Temp) -> Self {
        Operand::Temp(t)
    }
}

impl From<Reg> for Operand {
    fn from(r: Reg) -> Self {
        Operand::Reg(r)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(t) => write!(f, "{t}"),
            Operand::Reg(r) => write!(f, "{r}"),
        }
    }
}

// ── Instruction classification ──────────────────────────────────────────

/// Control-flow kind of an instruction; drives basic-block partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrKind {
    Label,
    Seq,
    Jmp,
    CondJmp,
    Ret,
    Call,
}

// ── Operators ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RvUnaryOp {
    Neg,
    Not,
    /// Set if zero (`rd = rs == 0`).
    Seqz,
    /// Set if nonzero (`rd = rs != 0`).
    Snez,
}

impl RvUnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            RvUnaryOp::Neg => "neg",
            RvUnaryOp::Not => "not",
            RvUnaryOp::Seqz => "seqz",
            RvUnaryOp::Snez => "snez",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RvBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Slt,
}

impl RvBinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            RvBinaryOp::Add => "add",
            RvBinaryOp::Sub => "sub",
            RvBinaryOp::Mul => "mul",
            RvBinaryOp::Div => "div",
            RvBinaryOp::Rem => "rem",
            RvBinaryOp::And => "and",
            RvBinaryOp::Or => "or",
            RvBinaryOp::Xor => "xor",
            RvBinaryOp::Slt => "slt",
        }
    }
}

/// Branch condition, encoded in the mnemonic (`beqz` / `bnez`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    Beqz,
    Bnez,
}

impl BranchOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BranchOp::Beqz => "beqz",
            BranchOp::Bnez => "bnez",
        }
    }
}

// ── Instructions ────────────────────────────────────────────────────────

/// One RV32 instruction (or pseudo-instruction).
#[derive(Debug, Clone)]
pub enum RvInstr {
    /// `label:`
    Label(Label),
    /// `li rd, imm`
    Li { dst: Operand, value: i32 },
    /// `la rd, symbol`
    La { dst: Operand, symbol: String },
    /// `lw rd, offset(base)`
    Lw { dst: Operand, base: Operand, offset: i32 },
    /// `sw rs, offset(base)`
    Sw { src: Operand, base: Operand, offset: i32 },
    /// `mv rd, rs`
    Mv { dst: Operand, src: Operand },
    /// `addi sp, sp, offset` — stack-pointer adjustment.
    SpAdd { offset: i32 },
    /// `op rd, rs`
    Unary { op: RvUnaryOp, dst: Operand, src: Operand },
    /// `op rd, rs1, rs2`
    Binary { op: RvBinaryOp, dst: Operand, lhs: Operand, rhs: Operand },
    /// `beqz/bnez rs, target`
    Branch { op: BranchOp, cond: Operand, target: Label },
    /// `j target`
    Jump { target: Label },
    /// `j <entry>_exit` — return site; the target is the function's shared
    /// epilogue, not a block in this function's CFG.
    JumpToEpilogue { target: Label },
    /// `call func` — argument/return marshaling happens during allocation.
    /// `dst` receives the call result via a following `mv dst, a0`.
    Call { func: Label, args: Vec<Operand>, dst: Operand },
    /// `ret` — the one physical return, emitted only in the epilogue.
    Ret,
}

impl RvInstr {
    pub fn kind(&self) -> InstrKind {
        match self {
            RvInstr::Label(_) => InstrKind::Label,
            RvInstr::Jump { .. } => InstrKind::Jmp,
            RvInstr::Branch { .. } => InstrKind::CondJmp,
            RvInstr::JumpToEpilogue { .. } | RvInstr::Ret => InstrKind::Ret,
            RvInstr::Call { .. } => InstrKind::Call,
            _ => InstrKind::Seq,
        }
    }

    pub fn is_label(&self) -> bool {
        self.kind() == InstrKind::Label
    }

    pub fn is_call(&self) -> bool {
        self.kind() == InstrKind::Call
    }

    pub fn is_return(&self) -> bool {
        self.kind() == InstrKind::Ret
    }

    pub fn is_sequential(&self) -> bool {
        self.kind() == InstrKind::Seq
    }

    /// Destination operands, in order.
    pub fn dsts(&self) -> Vec<&Operand> {
        match self {
            RvInstr::Li { dst, .. }
            | RvInstr::La { dst, .. }
            | RvInstr::Lw { dst, .. }
            | RvInstr::Mv { dst, .. }
            | RvInstr::Unary { dst, .. }
            | RvInstr::Binary { dst, .. }
            | RvInstr::Call { dst, .. } => vec![dst],
            _ => Vec::new(),
        }
    }

    /// Source operands, in order.
    pub fn srcs(&self) -> Vec<&Operand> {
        match self {
            RvInstr::Lw { base, .. } => vec![base],
            RvInstr::Sw { src, base, .. } => vec![src, base],
            RvInstr::Mv { src, .. } | RvInstr::Unary { src, .. } => vec![src],
            RvInstr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            RvInstr::Branch { cond, .. } => vec![cond],
            RvInstr::Call { args, .. } => args.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn dsts_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            RvInstr::Li { dst, .. }
            | RvInstr::La { dst, .. }
            | RvInstr::Lw { dst, .. }
            | RvInstr::Mv { dst, .. }
            | RvInstr::Unary { dst, .. }
            | RvInstr::Binary { dst, .. }
            | RvInstr::Call { dst, .. } => vec![dst],
            _ => Vec::new(),
        }
    }

    fn srcs_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            RvInstr::Lw { base, .. } => vec![base],
            RvInstr::Sw { src, base, .. } => vec![src, base],
            RvInstr::Mv { src, .. } | RvInstr::Unary { src, .. } => vec![src],
            RvInstr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            RvInstr::Branch { cond, .. } => vec![cond],
            RvInstr::Call { args, .. } => args.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// Indices of temps this instruction reads.  Physical-register operands
    /// are invisible to dataflow.
    pub fn read_temps(&self) -> Vec<u32> {
        self.srcs().into_iter().filter_map(|o| o.temp()).map(|t| t.0).collect()
    }

    /// Indices of temps this instruction writes.
    pub fn written_temps(&self) -> Vec<u32> {
        self.dsts().into_iter().filter_map(|o| o.temp()).map(|t| t.0).collect()
    }

    /// Replace the operand lists with allocated physical registers.  The
    /// register slices must match the lengths of `dsts()` / `srcs()`.
    pub fn fill_regs(&mut self, dst_regs: &[Reg], src_regs: &[Reg]) {
        for (op, &r) in self.dsts_mut().into_iter().zip(dst_regs) {
            *op = Operand::Reg(r);
        }
        for (op, &r) in self.srcs_mut().into_iter().zip(src_regs) {
            *op = Operand::Reg(r);
        }
    }

    /// Branch target, for jump and conditional-jump instructions whose target
    /// is a block inside the same function.
    pub fn jump_target(&self) -> Option<&Label> {
        match self {
            RvInstr::Jump { target } | RvInstr::Branch { target, .. } => Some(target),
            _ => None,
        }
    }
}

// ── Display — lower to assembly text ────────────────────────────────────

impl fmt::Display for RvInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RvInstr::Label(l) => write!(f, "{l}:"),
            RvInstr::Li { dst, value } => write!(f, "li {dst}, {value}"),
            RvInstr::La { dst, symbol } => write!(f, "la {dst}, {symbol}"),
            RvInstr::Lw { dst, base, offset } => write!(f, "lw {dst}, {offset}({base})"),
            RvInstr::Sw { src, base, offset } => write!(f, "sw {src}, {offset}({base})"),
            RvInstr::Mv { dst, src } => write!(f, "mv {dst}, {src}"),
            RvInstr::SpAdd { offset } => write!(f, "addi {0}, {0}, {1}", Reg::Sp, offset),
            RvInstr::Unary { op, dst, src } => {
                write!(f, "{} {dst}, {src}", op.mnemonic())
            }
            RvInstr::Binary { op, dst, lhs, rhs } => {
                write!(f, "{} {dst}, {lhs}, {rhs}", op.mnemonic())
            }
            RvInstr::Branch { op, cond, target } => {
                write!(f, "{} {cond}, {target}", op.mnemonic())
            }
            RvInstr::Jump { target } => write!(f, "j {target}"),
            RvInstr::JumpToEpilogue { target } => write!(f, "j {target}"),
            RvInstr::Call { func, .. } => write!(f, "call {func}"),
            RvInstr::Ret => write!(f, "ret"),
        }
    }
}
