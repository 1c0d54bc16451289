//! CFG queries over a [`Function`]'s laid-out blocks.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{BlockId, Function};

/// Distinct predecessors of every laid-out block.
///
/// Blocks with no predecessors are present with an empty list.
pub fn predecessors(func: &Function) -> FxHashMap<BlockId, SmallVec<[BlockId; 2]>> {
    let mut preds: FxHashMap<BlockId, SmallVec<[BlockId; 2]>> = func
        .layout()
        .iter()
        .map(|&b| (b, SmallVec::new()))
        .collect();
    for &block in func.layout() {
        let Some(term) = func.block(block).terminator() else {
            continue;
        };
        let mut seen = FxHashSet::default();
        for succ in term.successors() {
            if seen.insert(succ) {
                preds.entry(succ).or_default().push(block);
            }
        }
    }
    preds
}

/// Number of distinct blocks branching to `block`.
pub fn predecessor_count(func: &Function, block: BlockId) -> usize {
    func.layout()
        .iter()
        .filter(|&&b| {
            func.block(b)
                .terminator()
                .is_some_and(|t| t.successors().contains(&block))
        })
        .count()
}

/// Blocks reachable from the entry block.
pub fn reachable(func: &Function) -> FxHashSet<BlockId> {
    let mut seen = FxHashSet::default();
    let Some(entry) = func.entry() else {
        return seen;
    };
    let mut stack = vec![entry];
    while let Some(block) = stack.pop() {
        if !seen.insert(block) {
            continue;
        }
        if let Some(term) = func.get_block(block).and_then(|b| b.terminator()) {
            stack.extend(term.successors().into_iter().filter(|s| !seen.contains(s)));
        }
    }
    seen
}
