//! The three-address IR ("TAC") consumed by the backend.
//!
//! A program is an ordered list of functions plus an ordered list of global
//! variable descriptors.  Each function body is a flat instruction sequence
//! over virtual registers ([`Temp`]); control flow is expressed with labels
//! and (conditional) jumps.  The frontend that produces this IR is not part
//! of this crate — the types here are the input contract.

use std::fmt;

// ── Virtual registers and labels ────────────────────────────────────────

/// A virtual register.  Identified purely by its index; indices are unique
/// and contiguous within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temp(pub u32);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_T{}", self.0)
    }
}

/// A branch target or function entry label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Fresh-id generators ─────────────────────────────────────────────────

/// Generator for fresh [`Temp`]s.  One pool per function; the counter resets
/// with the pool, so independent functions never share an index space.
#[derive(Debug, Default)]
pub struct TempPool {
    next: u32,
}

impl TempPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> Temp {
        let t = Temp(self.next);
        self.next += 1;
        t
    }

    /// Number of temps handed out so far.
    pub fn count(&self) -> u32 {
        self.next
    }
}

/// Generator for fresh jump-target labels (`.L0`, `.L1`, …).  One pool per
/// program so labels stay unique across functions.
#[derive(Debug, Default)]
pub struct LabelPool {
    next: u32,
}

impl LabelPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> Label {
        let l = Label(format!(".L{}", self.next));
        self.next += 1;
        l
    }
}

// ── Operators ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Bitwise complement.
    BitNot,
    /// Logical not (result is 0 or 1).
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Condition for a conditional jump: branch when the temp is zero / nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondJumpOp {
    Beqz,
    Bnez,
}

// ── Instructions ────────────────────────────────────────────────────────

/// One TAC instruction.  A closed set: anything outside it is a frontend bug,
/// not something the backend diagnoses.
#[derive(Debug, Clone)]
pub enum TacInstr {
    /// `dst = src`
    Assign { dst: Temp, src: Temp },
    /// `dst = value` (32-bit immediate)
    LoadImm { dst: Temp, value: i32 },
    /// `dst = &symbol` (address of a global)
    LoadSymbol { dst: Temp, symbol: String },
    /// `dst = *(base + offset)`
    Load { dst: Temp, base: Temp, offset: i32 },
    /// `*(base + offset) = src`
    Store { src: Temp, base: Temp, offset: i32 },
    /// Bump the stack pointer down by `size` bytes; `dst` receives the new
    /// stack-top address.
    Alloc { dst: Temp, size: i32 },
    /// `dst = op operand`
    Unary { op: UnaryOp, dst: Temp, operand: Temp },
    /// `dst = lhs op rhs`
    Binary { op: BinaryOp, dst: Temp, lhs: Temp, rhs: Temp },
    /// `branch target`
    Jump { target: Label },
    /// `if (cond == 0 / != 0) branch target`
    CondJump { op: CondJumpOp, cond: Temp, target: Label },
    /// `dst = call func(args…)`
    Call { dst: Temp, func: Label, args: Vec<Temp> },
    /// `return value?`
    Return { value: Option<Temp> },
    /// `label:` — branch target inside a function body.
    Mark { label: Label },
}

impl fmt::Display for TacInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacInstr::Assign { dst, src } => write!(f, "{dst} = {src}"),
            TacInstr::LoadImm { dst, value } => write!(f, "{dst} = {value}"),
            TacInstr::LoadSymbol { dst, symbol } => write!(f, "{dst} = LOAD_SYMBOL {symbol}"),
            TacInstr::Load { dst, base, offset } => write!(f, "{dst} = LOAD {base}, {offset}"),
            TacInstr::Store { src, base, offset } => write!(f, "STORE {base}, {offset}, {src}"),
            TacInstr::Alloc { dst, size } => write!(f, "{dst} = ALLOC {size}"),
            TacInstr::Unary { op, dst, operand } => {
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::BitNot => "~",
                    UnaryOp::Not => "!",
                };
                write!(f, "{dst} = {sym}{operand}")
            }
            TacInstr::Binary { op, dst, lhs, rhs } => {
                let sym = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Mod => "%",
                    BinaryOp::LogicalAnd => "&&",
                    BinaryOp::LogicalOr => "||",
                    BinaryOp::Eq => "==",
                    BinaryOp::Ne => "!=",
                    BinaryOp::Lt => "<",
                    BinaryOp::Le => "<=",
                    BinaryOp::Gt => ">",
                    BinaryOp::Ge => ">=",
                };
                write!(f, "{dst} = ({lhs} {sym} {rhs})")
            }
            TacInstr::Jump { target } => write!(f, "branch {target}"),
            TacInstr::CondJump { op, cond, target } => {
                let rel = match op {
                    CondJumpOp::Beqz => "== 0",
                    CondJumpOp::Bnez => "!= 0",
                };
                write!(f, "if ({cond} {rel}) branch {target}")
            }
            TacInstr::Call { dst, func, args } => {
                write!(f, "{dst} = CALL {func}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            TacInstr::Return { value: Some(v) } => write!(f, "return {v}"),
            TacInstr::Return { value: None } => write!(f, "return"),
            TacInstr::Mark { label } => write!(f, "{label}:"),
        }
    }
}

// ── Functions and programs ──────────────────────────────────────────────

/// One function's worth of TAC.
#[derive(Debug, Clone)]
pub struct TacFunc {
    /// Entry label; also names the function in the emitted assembly.
    pub entry: Label,
    /// Parameter temps in declaration order.
    pub arg_temps: Vec<Temp>,
    /// Flat instruction sequence.
    pub instrs: Vec<TacInstr>,
}

impl TacFunc {
    pub fn new(entry: Label, arg_temps: Vec<Temp>) -> Self {
        Self {
            entry,
            arg_temps,
            instrs: Vec::new(),
        }
    }

    pub fn push(&mut self, instr: TacInstr) {
        self.instrs.push(instr);
    }
}

/// A global variable descriptor.  `init == None` means zero-initialized,
/// placed in `.bss` rather than `.data`.
#[derive(Debug, Clone)]
pub struct GlobalVar {
    pub name: String,
    /// Size in bytes.
    pub size: u32,
    pub init: Option<i32>,
}

/// A whole program: functions in emission order plus global descriptors.
#[derive(Debug, Clone, Default)]
pub struct TacProg {
    pub funcs: Vec<TacFunc>,
    pub globals: Vec<GlobalVar>,
}

impl TacProg {
    pub fn new() -> Self {
        Self::default()
    }
}
