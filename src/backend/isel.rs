//! Instruction selection — lowers TAC to RV32 instructions over temps.
//!
//! Selection is stateless beyond the output buffer: each TAC instruction maps
//! to a fixed sequence of machine instructions on the same virtual temps.
//! Register binding happens later, in allocation; the only physical registers
//! introduced here are ABI-fixed ones (`a0` for return values, `sp` for stack
//! bumps, `x0` as the zero source).

use super::abi::{Reg, EPILOGUE_SUFFIX};
use super::instruction::{BranchOp, Operand, RvBinaryOp, RvInstr, RvUnaryOp};
use crate::tac::{BinaryOp, CondJumpOp, Label, TacFunc, TacInstr, Temp, UnaryOp};
use crate::CodegenError;

/// Per-function metadata collected during selection, consumed by the
/// subroutine emitter.
#[derive(Debug, Clone)]
pub struct SubroutineInfo {
    pub entry: Label,
    pub arg_temps: Vec<Temp>,
}

/// Lower one function.  Fails if the function or any call it contains needs
/// more arguments than the calling convention can pass in registers.
pub fn select_instrs(func: &TacFunc) -> Result<(Vec<RvInstr>, SubroutineInfo), CodegenError> {
    if func.arg_temps.len() > Reg::ARG_REGS.len() {
        return Err(CodegenError::UnsupportedCall {
            func: func.entry.as_str().to_string(),
            count: func.arg_temps.len(),
            max: Reg::ARG_REGS.len(),
        });
    }

    let mut selector = Selector {
        epilogue: Label::new(format!("{}{}", func.entry, EPILOGUE_SUFFIX)),
        seq: Vec::new(),
    };
    for instr in &func.instrs {
        selector.select(instr)?;
    }

    let info = SubroutineInfo {
        entry: func.entry.clone(),
        arg_temps: func.arg_temps.clone(),
    };
    Ok((selector.seq, info))
}

struct Selector {
    epilogue: Label,
    seq: Vec<RvInstr>,
}

impl Selector {
    fn push(&mut self, instr: RvInstr) {
        self.seq.push(instr);
    }

    fn unary(&mut self, op: RvUnaryOp, dst: impl Into<Operand>, src: impl Into<Operand>) {
        self.push(RvInstr::Unary {
            op,
            dst: dst.into(),
            src: src.into(),
        });
    }

    fn binary(
        &mut self,
        op: RvBinaryOp,
        dst: impl Into<Operand>,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) {
        self.push(RvInstr::Binary {
            op,
            dst: dst.into(),
            lhs: lhs.into(),
            rhs: rhs.into(),
        });
    }

    fn select(&mut self, instr: &TacInstr) -> Result<(), CodegenError> {
        match instr {
            TacInstr::Mark { label } => self.push(RvInstr::Label(label.clone())),

            TacInstr::Assign { dst, src } => self.push(RvInstr::Mv {
                dst: (*dst).into(),
                src: (*src).into(),
            }),

            TacInstr::LoadImm { dst, value } => self.push(RvInstr::Li {
                dst: (*dst).into(),
                value: *value,
            }),

            TacInstr::LoadSymbol { dst, symbol } => self.push(RvInstr::La {
                dst: (*dst).into(),
                symbol: symbol.clone(),
            }),

            TacInstr::Load { dst, base, offset } => self.push(RvInstr::Lw {
                dst: (*dst).into(),
                base: (*base).into(),
                offset: *offset,
            }),

            TacInstr::Store { src, base, offset } => self.push(RvInstr::Sw {
                src: (*src).into(),
                base: (*base).into(),
                offset: *offset,
            }),

            TacInstr::Alloc { dst, size } => {
                self.push(RvInstr::SpAdd { offset: -size });
                self.push(RvInstr::Mv {
                    dst: (*dst).into(),
                    src: Reg::Sp.into(),
                });
            }

            TacInstr::Unary { op, dst, operand } => {
                let op = match op {
                    UnaryOp::Neg => RvUnaryOp::Neg,
                    UnaryOp::BitNot => RvUnaryOp::Not,
                    UnaryOp::Not => RvUnaryOp::Seqz,
                };
                self.unary(op, *dst, *operand);
            }

            TacInstr::Binary { op, dst, lhs, rhs } => self.select_binary(*op, *dst, *lhs, *rhs),

            TacInstr::Jump { target } => self.push(RvInstr::Jump {
                target: target.clone(),
            }),

            TacInstr::CondJump { op, cond, target } => {
                let op = match op {
                    CondJumpOp::Beqz => BranchOp::Beqz,
                    CondJumpOp::Bnez => BranchOp::Bnez,
                };
                self.push(RvInstr::Branch {
                    op,
                    cond: (*cond).into(),
                    target: target.clone(),
                });
            }

            TacInstr::Call { dst, func, args } => {
                if args.len() > Reg::ARG_REGS.len() {
                    return Err(CodegenError::UnsupportedCall {
                        func: func.as_str().to_string(),
                        count: args.len(),
                        max: Reg::ARG_REGS.len(),
                    });
                }
                self.push(RvInstr::Call {
                    func: func.clone(),
                    args: args.iter().map(|&t| t.into()).collect(),
                    dst: (*dst).into(),
                });
                // The ABI delivers the result in a0.
                self.push(RvInstr::Mv {
                    dst: (*dst).into(),
                    src: Reg::RET.into(),
                });
            }

            TacInstr::Return { value } => {
                match value {
                    Some(v) => self.push(RvInstr::Mv {
                        dst: Reg::RET.into(),
                        src: (*v).into(),
                    }),
                    None => self.push(RvInstr::Li {
                        dst: Reg::RET.into(),
                        value: 0,
                    }),
                }
                self.push(RvInstr::JumpToEpilogue {
                    target: self.epilogue.clone(),
                });
            }
        }
        Ok(())
    }

    /// Binary operators without a direct machine equivalent expand to short
    /// idioms over `slt`/`xor` and the set-if-(non)zero pseudo-instructions.
    fn select_binary(&mut self, op: BinaryOp, dst: Temp, lhs: Temp, rhs: Temp) {
        match op {
            BinaryOp::Add => self.binary(RvBinaryOp::Add, dst, lhs, rhs),
            BinaryOp::Sub => self.binary(RvBinaryOp::Sub, dst, lhs, rhs),
            BinaryOp::Mul => self.binary(RvBinaryOp::Mul, dst, lhs, rhs),
            BinaryOp::Div => self.binary(RvBinaryOp::Div, dst, lhs, rhs),
            BinaryOp::Mod => self.binary(RvBinaryOp::Rem, dst, lhs, rhs),

            BinaryOp::LogicalOr => {
                self.binary(RvBinaryOp::Or, dst, lhs, rhs);
                self.unary(RvUnaryOp::Snez, dst, dst);
            }
            BinaryOp::LogicalAnd => {
                // Normalize lhs to a boolean, stretch it into an all-ones /
                // all-zeros mask, mask rhs, then re-normalize.
                self.unary(RvUnaryOp::Snez, dst, lhs);
                self.binary(RvBinaryOp::Sub, dst, Reg::Zero, dst);
                self.binary(RvBinaryOp::And, dst, dst, rhs);
                self.unary(RvUnaryOp::Snez, dst, dst);
            }

            BinaryOp::Eq => {
                self.binary(RvBinaryOp::Xor, dst, lhs, rhs);
                self.unary(RvUnaryOp::Seqz, dst, dst);
            }
            BinaryOp::Ne => {
                self.binary(RvBinaryOp::Xor, dst, lhs, rhs);
                self.unary(RvUnaryOp::Snez, dst, dst);
            }

            BinaryOp::Lt => self.binary(RvBinaryOp::Slt, dst, lhs, rhs),
            BinaryOp::Gt => self.binary(RvBinaryOp::Slt, dst, rhs, lhs),
            BinaryOp::Le => {
                self.binary(RvBinaryOp::Slt, dst, rhs, lhs);
                self.unary(RvUnaryOp::Seqz, dst, dst);
            }
            BinaryOp::Ge => {
                self.binary(RvBinaryOp::Slt, dst, lhs, rhs);
                self.unary(RvUnaryOp::Seqz, dst, dst);
            }
        }
    }
}
