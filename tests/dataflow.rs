use rv32_codegen::backend::cfg::CfgBuilder;
use rv32_codegen::backend::isel::select_instrs;
use rv32_codegen::backend::liveness::LivenessAnalyzer;
use rv32_codegen::tac::{CondJumpOp, Label, TacFunc, TacInstr, TempPool};
use std::collections::HashSet;

// ── Fixtures ────────────────────────────────────────────────────────────

/// `main() { return 1 + 2; }` — straight-line, no branches.
fn straight_line() -> TacFunc {
    let mut temps = TempPool::new();
    let t0 = temps.fresh();
    let t1 = temps.fresh();
    let t2 = temps.fresh();
    let mut f = TacFunc::new(Label::new("main"), vec![]);
    f.push(TacInstr::LoadImm { dst: t0, value: 1 });
    f.push(TacInstr::LoadImm { dst: t1, value: 2 });
    f.push(TacInstr::Binary {
        op: rv32_codegen::tac::BinaryOp::Add,
        dst: t2,
        lhs: t0,
        rhs: t1,
    });
    f.push(TacInstr::Return { value: Some(t2) });
    f
}

/// `main() { t1 = cond ? 10 : 20; return t1; }` as a diamond.
fn diamond() -> TacFunc {
    let mut temps = TempPool::new();
    let t0 = temps.fresh();
    let t1 = temps.fresh();
    let l_else = Label::new(".L_else");
    let l_end = Label::new(".L_end");
    let mut f = TacFunc::new(Label::new("main"), vec![]);
    f.push(TacInstr::LoadImm { dst: t0, value: 1 });
    f.push(TacInstr::CondJump {
        op: CondJumpOp::Beqz,
        cond: t0,
        target: l_else.clone(),
    });
    f.push(TacInstr::LoadImm { dst: t1, value: 10 });
    f.push(TacInstr::Jump {
        target: l_end.clone(),
    });
    f.push(TacInstr::Mark { label: l_else });
    f.push(TacInstr::LoadImm { dst: t1, value: 20 });
    f.push(TacInstr::Mark { label: l_end });
    f.push(TacInstr::Return { value: Some(t1) });
    f
}

/// A function with a labeled block that nothing jumps to.
fn with_dead_block() -> TacFunc {
    let mut temps = TempPool::new();
    let t0 = temps.fresh();
    let t1 = temps.fresh();
    let mut f = TacFunc::new(Label::new("main"), vec![]);
    f.push(TacInstr::LoadImm { dst: t0, value: 7 });
    f.push(TacInstr::Return { value: Some(t0) });
    f.push(TacInstr::Mark {
        label: Label::new(".L_dead"),
    });
    f.push(TacInstr::LoadImm { dst: t1, value: 99 });
    f.push(TacInstr::Return { value: Some(t1) });
    f
}

fn build_cfg(func: &TacFunc) -> rv32_codegen::backend::cfg::Cfg {
    let (seq, _info) = select_instrs(func).expect("selection should succeed");
    CfgBuilder::new().build(seq)
}

// ── CFG structure ───────────────────────────────────────────────────────

#[test]
fn straight_line_is_single_block() {
    let cfg = build_cfg(&straight_line());
    assert_eq!(cfg.nodes.len(), 1);
    assert!(cfg.edges.is_empty());
    assert!(cfg.is_reachable(0));
}

#[test]
fn diamond_has_expected_shape() {
    let cfg = build_cfg(&diamond());
    assert_eq!(cfg.nodes.len(), 4);

    let edges: HashSet<(usize, usize)> = cfg.edges.iter().copied().collect();
    // cond-jump: branch target plus fallthrough
    assert!(edges.contains(&(0, 1)), "fallthrough into then-arm");
    assert!(edges.contains(&(0, 2)), "branch edge into else-arm");
    // both arms reach the join
    assert!(edges.contains(&(1, 3)));
    assert!(edges.contains(&(2, 3)));
    assert_eq!(edges.len(), 4);

    for id in 0..cfg.nodes.len() {
        assert!(cfg.is_reachable(id), "block {id} should be reachable");
    }
}

#[test]
fn entry_is_always_reachable() {
    for func in [straight_line(), diamond(), with_dead_block()] {
        let cfg = build_cfg(&func);
        assert!(cfg.is_reachable(0));
    }
}

#[test]
fn reachability_matches_edge_relation() {
    // Reachable exactly when connected to node 0 through the edge set.
    let cfg = build_cfg(&with_dead_block());
    let mut expected = vec![false; cfg.nodes.len()];
    let mut stack = vec![0usize];
    while let Some(id) = stack.pop() {
        if expected[id] {
            continue;
        }
        expected[id] = true;
        for &(u, v) in &cfg.edges {
            if u == id {
                stack.push(v);
            }
        }
    }
    for id in 0..cfg.nodes.len() {
        assert_eq!(cfg.is_reachable(id), expected[id], "block {id}");
    }
}

#[test]
fn dead_block_is_retained_but_unreachable() {
    let cfg = build_cfg(&with_dead_block());
    assert_eq!(cfg.nodes.len(), 2, "dead block stays in the node list");
    assert!(cfg.is_reachable(0));
    assert!(!cfg.is_reachable(1));
    assert!(cfg.edges.is_empty());
}

#[test]
fn return_block_has_no_successors() {
    let cfg = build_cfg(&diamond());
    // The join block ends with the jump to the epilogue.
    assert!(cfg.succs(3).is_empty());
}

// ── Liveness ────────────────────────────────────────────────────────────

#[test]
fn straight_line_liveness_is_empty() {
    let mut cfg = build_cfg(&straight_line());
    LivenessAnalyzer::new().analyze(&mut cfg);
    let bb = cfg.block(0);
    assert!(bb.live_in.is_empty());
    assert!(bb.live_out.is_empty());
}

#[test]
fn fixed_point_equations_hold() {
    let mut cfg = build_cfg(&diamond());
    LivenessAnalyzer::new().analyze(&mut cfg);

    for bb in &cfg.nodes {
        let mut expected = HashSet::new();
        for &succ in cfg.succs(bb.id) {
            expected.extend(cfg.block(succ).live_in.iter().copied());
        }
        assert_eq!(bb.live_out, expected, "live_out equation for block {}", bb.id);

        let mut expected_in = bb.live_use.clone();
        expected_in.extend(bb.live_out.difference(&bb.def).copied());
        assert_eq!(bb.live_in, expected_in, "live_in equation for block {}", bb.id);
    }
}

#[test]
fn analysis_is_idempotent() {
    let mut cfg = build_cfg(&diamond());
    let analyzer = LivenessAnalyzer::new();
    analyzer.analyze(&mut cfg);
    let first: Vec<_> = cfg
        .nodes
        .iter()
        .map(|bb| (bb.live_in.clone(), bb.live_out.clone()))
        .collect();

    analyzer.analyze(&mut cfg);
    let second: Vec<_> = cfg
        .nodes
        .iter()
        .map(|bb| (bb.live_in.clone(), bb.live_out.clone()))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn value_crossing_blocks_is_live_across_the_join() {
    let mut cfg = build_cfg(&diamond());
    LivenessAnalyzer::new().analyze(&mut cfg);

    // t1 (index 1) is written in both arms and read at the join.
    assert!(cfg.block(1).live_out.contains(&1));
    assert!(cfg.block(2).live_out.contains(&1));
    assert!(cfg.block(3).live_in.contains(&1));
    // t0 (index 0) dies at the conditional jump.
    assert!(!cfg.block(0).live_out.contains(&0));
}

#[test]
fn unreachable_blocks_keep_empty_sets() {
    let mut cfg = build_cfg(&with_dead_block());
    LivenessAnalyzer::new().analyze(&mut cfg);

    let dead = cfg.block(1);
    assert!(dead.live_in.is_empty());
    assert!(dead.live_out.is_empty());
    for loc in &dead.locs {
        assert!(loc.live_in.is_empty());
    }
}
