//! Liveness analysis over the CFG.
//!
//! Backward iterative dataflow to a fixed point, producing per-block
//! `live_in` / `live_out` sets, refined to a per-instruction live-in set on
//! every [`Loc`](super::cfg::Loc).  Unreachable blocks are excluded from the
//! iteration and keep empty sets.

use super::cfg::Cfg;
use log::debug;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct LivenessAnalyzer;

impl LivenessAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, graph: &mut Cfg) {
        self.compute_def_and_use(graph);
        self.iterate_to_fixpoint(graph);
        self.refine_per_loc(graph);
    }

    /// Per block: `live_use` = temps read before any write within the block,
    /// `def` = temps written, respecting intra-block order.
    fn compute_def_and_use(&self, graph: &mut Cfg) {
        for bb in &mut graph.nodes {
            bb.def.clear();
            bb.live_use.clear();
            bb.live_in.clear();
            bb.live_out.clear();
            for loc in &bb.locs {
                for t in loc.instr.read_temps() {
                    if !bb.def.contains(&t) {
                        bb.live_use.insert(t);
                    }
                }
                for t in loc.instr.written_temps() {
                    bb.def.insert(t);
                }
            }
        }
    }

    /// `live_out(b) = ∪ live_in(succ)`,
    /// `live_in(b) = live_use(b) ∪ (live_out(b) − def(b))`.
    fn iterate_to_fixpoint(&self, graph: &mut Cfg) {
        let ids: Vec<usize> = (0..graph.nodes.len())
            .rev()
            .filter(|&id| graph.is_reachable(id))
            .collect();

        let mut rounds = 0;
        let mut changed = true;
        while changed {
            changed = false;
            rounds += 1;
            for &id in &ids {
                let mut new_out = HashSet::new();
                for &succ in graph.succs(id) {
                    new_out.extend(graph.nodes[succ].live_in.iter().copied());
                }

                let bb = &graph.nodes[id];
                let mut new_in = bb.live_use.clone();
                for &t in &new_out {
                    if !bb.def.contains(&t) {
                        new_in.insert(t);
                    }
                }

                if new_in != bb.live_in || new_out != bb.live_out {
                    changed = true;
                    let bb = &mut graph.nodes[id];
                    bb.live_in = new_in;
                    bb.live_out = new_out;
                }
            }
        }
        debug!("liveness reached fixed point after {rounds} round(s)");
    }

    /// Walk each reachable block backwards from its `live_out`, recording
    /// the live set holding just before each instruction.
    fn refine_per_loc(&self, graph: &mut Cfg) {
        let reachable: Vec<bool> = (0..graph.nodes.len()).map(|id| graph.is_reachable(id)).collect();
        for bb in &mut graph.nodes {
            if !reachable[bb.id] {
                continue;
            }
            let mut live = bb.live_out.clone();
            for loc in bb.locs.iter_mut().rev() {
                for t in loc.instr.written_temps() {
                    live.remove(&t);
                }
                for t in loc.instr.read_temps() {
                    live.insert(t);
                }
                loc.live_in = live.clone();
            }
        }
    }
}
