//! Reference matcher: one test per branch, in order.

use ember_ir::{BlockId, CmpOp, Op, Type, ValueId};
use tracing::{trace, warn};

use super::{Match, MatchBranch, MatchPattern, PatternMatcher};
use crate::builder::ModuleBuilder;
use crate::control::Edge;
use crate::error::LowerResult;

/// Tests each branch against the selector in order and jumps to the first
/// that matches, appending the pattern's bindings to its arguments.
/// Falling off the last branch is unreachable.
///
/// Bindings, in order: `Cons` binds head and tail, `Tuple(n)` binds its
/// `n` elements, `MapItem` binds the value, `Binary` binds the segment
/// value and the remaining binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialMatcher;

impl PatternMatcher for SequentialMatcher {
    fn lower_match(&mut self, builder: &mut ModuleBuilder, m: &Match) -> LowerResult<()> {
        for (i, branch) in m.branches.iter().enumerate() {
            if branch.pattern == MatchPattern::Any {
                if i + 1 < m.branches.len() {
                    warn!(
                        skipped = m.branches.len() - i - 1,
                        "branches after a catch-all pattern are unreachable"
                    );
                }
                return builder.build_br(
                    &branch.loc,
                    Edge::new(branch.dest, branch.dest_args.clone()),
                );
            }
            let next = builder.build_block()?;
            lower_branch(builder, m.selector, branch, next)?;
            builder.position_at_end(next)?;
        }
        builder.build_unreachable(&m.loc)
    }
}

/// Test one branch; on failure continue at `next`.
fn lower_branch(
    builder: &mut ModuleBuilder,
    selector: ValueId,
    branch: &MatchBranch,
    next: BlockId,
) -> LowerResult<()> {
    let loc = &branch.loc;
    trace!(pattern = ?branch.pattern, dest = %branch.dest, "match branch");

    let test = match &branch.pattern {
        MatchPattern::Any => {
            return builder.build_br(loc, Edge::new(branch.dest, branch.dest_args.clone()));
        }
        // Binary patterns test and bind in one step.
        MatchPattern::Binary { spec, size } => {
            let results = builder.build_op(
                loc,
                Op::BinaryMatch {
                    bin: selector,
                    spec: *spec,
                    size: *size,
                },
            )?;
            let mut args = branch.dest_args.clone();
            args.extend_from_slice(&results[..2]);
            return builder.build_cond_br(
                loc,
                results[2],
                Edge::new(branch.dest, args),
                Edge::to(next),
            );
        }
        MatchPattern::Cons => Op::IsType {
            value: selector,
            ty: Type::Cons,
        },
        MatchPattern::Tuple(arity) => {
            let arity = builder.build_constant_int(loc, i64::from(*arity))?;
            Op::IsTuple {
                value: selector,
                arity: Some(arity),
            }
        }
        MatchPattern::MapItem(key) => Op::MapContainsKey {
            map: selector,
            key: *key,
        },
        MatchPattern::IsType(tag) => Op::IsType {
            value: selector,
            ty: tag.to_type(),
        },
        MatchPattern::Value(value) => Op::Cmp {
            op: CmpOp::Eq,
            strict: true,
            lhs: selector,
            rhs: *value,
        },
    };
    let cond = builder.build_op(loc, test)?[0];

    let binds = bind_ops(selector, &branch.pattern);
    if binds.is_empty() {
        return builder.build_cond_br(
            loc,
            cond,
            Edge::new(branch.dest, branch.dest_args.clone()),
            Edge::to(next),
        );
    }

    let bind = builder.build_block()?;
    builder.build_cond_br(loc, cond, Edge::to(bind), Edge::to(next))?;
    builder.position_at_end(bind)?;
    let mut args = branch.dest_args.clone();
    for op in binds {
        args.push(builder.build_op(loc, op)?[0]);
    }
    builder.build_br(loc, Edge::new(branch.dest, args))
}

/// Operations extracting the values a pattern binds.
fn bind_ops(selector: ValueId, pattern: &MatchPattern) -> Vec<Op> {
    match pattern {
        MatchPattern::Cons => vec![
            Op::ListHead { list: selector },
            Op::ListTail { list: selector },
        ],
        MatchPattern::Tuple(arity) => (0..*arity)
            .map(|index| Op::TupleElement {
                tuple: selector,
                index,
            })
            .collect(),
        MatchPattern::MapItem(key) => vec![Op::MapGet {
            map: selector,
            key: *key,
        }],
        MatchPattern::Any
        | MatchPattern::IsType(_)
        | MatchPattern::Value(_)
        | MatchPattern::Binary { .. } => Vec::new(),
    }
}
