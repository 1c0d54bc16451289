//! The fixed cleanup pass run when a module is finalized.
//!
//! Two rewrites, applied once per defined function:
//!
//! 1. Identity casts (a cast to the type its operand already has) are
//!    removed and their uses rewired to the operand.
//! 2. Blocks unreachable from the entry block are dropped from the layout.

use tracing::debug;

use crate::graph::reachable;
use crate::ops::Op;
use crate::{Function, Module, ValueId};

/// What the cleanup pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub casts_folded: usize,
    pub blocks_removed: usize,
}

/// Run the cleanup pass over every defined function in `module`.
pub fn cleanup_module(module: &mut Module) -> CleanupStats {
    let mut stats = CleanupStats::default();
    for func in module.functions_mut() {
        if func.is_declaration() {
            continue;
        }
        stats.casts_folded += fold_identity_casts(func);
        stats.blocks_removed += remove_unreachable_blocks(func);
    }
    debug!(
        casts_folded = stats.casts_folded,
        blocks_removed = stats.blocks_removed,
        "cleanup finished"
    );
    stats
}

fn fold_identity_casts(func: &mut Function) -> usize {
    let mut folds: Vec<(ValueId, ValueId)> = Vec::new();
    for &block in func.layout() {
        for inst in func.block(block).body() {
            if let Op::Cast { value, to } = &inst.op {
                if let [result] = inst.results.as_slice() {
                    if func.value_type(*value) == to {
                        folds.push((*result, *value));
                    }
                }
            }
        }
    }
    if folds.is_empty() {
        return 0;
    }
    let layout: Vec<_> = func.layout().to_vec();
    for &(result, source) in &folds {
        // A cast of a folded cast resolves to the original operand.
        let mut source = source;
        while let Some(&(_, next)) = folds.iter().find(|(r, _)| *r == source) {
            source = next;
        }
        func.replace_all_uses(result, source);
    }
    for block in layout {
        func.body_mut(block).retain(|inst| {
            !inst
                .results
                .first()
                .is_some_and(|r| folds.iter().any(|(folded, _)| folded == r))
        });
    }
    folds.len()
}

fn remove_unreachable_blocks(func: &mut Function) -> usize {
    let live = reachable(func);
    let dead: Vec<_> = func
        .layout()
        .iter()
        .copied()
        .filter(|b| !live.contains(b))
        .collect();
    for &block in &dead {
        func.remove_from_layout(block);
    }
    dead.len()
}
