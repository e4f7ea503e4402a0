//! Control-flow graph construction.
//!
//! Partitions a flat, already-selected instruction sequence into basic
//! blocks and links them with successor/predecessor edges.  A new block
//! starts at index 0 and at every label; a block ends at (inclusive) any
//! jump, conditional jump, or return, or just before the next label.

use super::instruction::{InstrKind, RvInstr};
use crate::tac::Label;
use std::collections::{HashMap, HashSet};

// ── Program points ──────────────────────────────────────────────────────

/// One instruction plus the set of temps live immediately before it.
/// The per-instruction set is finer than the block-level sets and is what
/// the allocator consults when deciding whether a register's occupant is
/// dead.
#[derive(Debug, Clone)]
pub struct Loc {
    pub instr: RvInstr,
    pub live_in: HashSet<u32>,
}

impl Loc {
    pub fn new(instr: RvInstr) -> Self {
        Self {
            instr,
            live_in: HashSet::new(),
        }
    }
}

// ── Basic blocks ────────────────────────────────────────────────────────

/// How a block transfers control to its successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Falls through to the textually next block.
    Continuous,
    EndByJump,
    EndByCondJump,
    EndByReturn,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: usize,
    /// Entry label of the block, if it started at a label instruction.
    pub label: Option<Label>,
    /// Instructions of the block, label stripped; the terminator (if the
    /// kind is not `Continuous`) is the last entry.
    pub locs: Vec<Loc>,
    pub kind: BlockKind,

    // Filled in by the liveness analyzer.
    pub def: HashSet<u32>,
    pub live_use: HashSet<u32>,
    pub live_in: HashSet<u32>,
    pub live_out: HashSet<u32>,
}

impl BasicBlock {
    fn new(id: usize, label: Option<Label>) -> Self {
        Self {
            id,
            label,
            locs: Vec::new(),
            kind: BlockKind::Continuous,
            def: HashSet::new(),
            live_use: HashSet::new(),
            live_in: HashSet::new(),
            live_out: HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locs.is_empty()
    }

    /// All locs except a non-fallthrough terminator.  The terminator is
    /// allocated separately, after the block's live-out spills.
    pub fn all_seq(&self) -> &[Loc] {
        if self.kind == BlockKind::Continuous {
            &self.locs
        } else {
            &self.locs[..self.locs.len() - 1]
        }
    }

    /// The terminator loc, when the block does not fall through.
    pub fn terminator(&self) -> Option<&Loc> {
        if self.kind == BlockKind::Continuous {
            None
        } else {
            self.locs.last()
        }
    }
}

// ── The graph ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Cfg {
    pub nodes: Vec<BasicBlock>,
    pub edges: Vec<(usize, usize)>,
    /// Per node: (predecessors, successors).
    links: Vec<(HashSet<usize>, HashSet<usize>)>,
    reachable: Vec<bool>,
}

impl Cfg {
    pub fn new(nodes: Vec<BasicBlock>, edges: Vec<(usize, usize)>) -> Self {
        let mut links = vec![(HashSet::new(), HashSet::new()); nodes.len()];
        for &(u, v) in &edges {
            links[u].1.insert(v);
            links[v].0.insert(u);
        }

        let reachable = Self::compute_reachability(nodes.len(), &links);
        Self {
            nodes,
            edges,
            links,
            reachable,
        }
    }

    /// Depth-first traversal from the entry node.  Unreachable nodes stay in
    /// the node list for index stability but are skipped by every pass.
    fn compute_reachability(
        n: usize,
        links: &[(HashSet<usize>, HashSet<usize>)],
    ) -> Vec<bool> {
        let mut reachable = vec![false; n];
        if n == 0 {
            return reachable;
        }
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            if reachable[id] {
                continue;
            }
            reachable[id] = true;
            for &succ in &links[id].1 {
                stack.push(succ);
            }
        }
        reachable
    }

    pub fn is_reachable(&self, id: usize) -> bool {
        self.reachable[id]
    }

    pub fn preds(&self, id: usize) -> &HashSet<usize> {
        &self.links[id].0
    }

    pub fn succs(&self, id: usize) -> &HashSet<usize> {
        &self.links[id].1
    }

    pub fn block(&self, id: usize) -> &BasicBlock {
        &self.nodes[id]
    }
}

// ── Builder ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CfgBuilder;

impl CfgBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(self, seq: Vec<RvInstr>) -> Cfg {
        let mut nodes: Vec<BasicBlock> = Vec::new();
        let mut cur = BasicBlock::new(0, None);

        let close = |nodes: &mut Vec<BasicBlock>, mut bb: BasicBlock, kind: BlockKind| {
            bb.kind = kind;
            nodes.push(bb);
        };

        for instr in seq {
            match instr.kind() {
                InstrKind::Label => {
                    let label = match instr {
                        RvInstr::Label(l) => l,
                        _ => unreachable!(),
                    };
                    // An empty unlabeled block between a terminator and the
                    // next label is not a block; the label absorbs it.
                    if !cur.is_empty() || cur.label.is_some() {
                        close(&mut nodes, cur, BlockKind::Continuous);
                    }
                    cur = BasicBlock::new(nodes.len(), Some(label));
                }
                InstrKind::Jmp => {
                    cur.locs.push(Loc::new(instr));
                    close(&mut nodes, cur, BlockKind::EndByJump);
                    cur = BasicBlock::new(nodes.len(), None);
                }
                InstrKind::CondJmp => {
                    cur.locs.push(Loc::new(instr));
                    close(&mut nodes, cur, BlockKind::EndByCondJump);
                    cur = BasicBlock::new(nodes.len(), None);
                }
                InstrKind::Ret => {
                    cur.locs.push(Loc::new(instr));
                    close(&mut nodes, cur, BlockKind::EndByReturn);
                    cur = BasicBlock::new(nodes.len(), None);
                }
                InstrKind::Seq | InstrKind::Call => {
                    cur.locs.push(Loc::new(instr));
                }
            }
        }
        // The entry block exists even for an empty function.
        if !cur.is_empty() || cur.label.is_some() || nodes.is_empty() {
            close(&mut nodes, cur, BlockKind::Continuous);
        }

        let label_to_block: HashMap<&str, usize> = nodes
            .iter()
            .filter_map(|bb| bb.label.as_ref().map(|l| (l.as_str(), bb.id)))
            .collect();

        let mut edges = Vec::new();
        for bb in &nodes {
            match bb.kind {
                BlockKind::Continuous => {
                    if bb.id + 1 < nodes.len() {
                        edges.push((bb.id, bb.id + 1));
                    }
                }
                BlockKind::EndByJump => {
                    if let Some(target) = Self::target_of(bb) {
                        if let Some(&v) = label_to_block.get(target.as_str()) {
                            edges.push((bb.id, v));
                        }
                    }
                }
                BlockKind::EndByCondJump => {
                    if let Some(target) = Self::target_of(bb) {
                        if let Some(&v) = label_to_block.get(target.as_str()) {
                            edges.push((bb.id, v));
                        }
                    }
                    if bb.id + 1 < nodes.len() {
                        edges.push((bb.id, bb.id + 1));
                    }
                }
                BlockKind::EndByReturn => {}
            }
        }

        Cfg::new(nodes, edges)
    }

    fn target_of(bb: &BasicBlock) -> Option<&Label> {
        bb.locs.last().and_then(|loc| loc.instr.jump_target())
    }
}
