//! Text rendering of modules.
//!
//! The format is for humans (debug logs, test failure output); nothing
//! parses it back.
//!
//! ```text
//! func @"init:main/0"() -> (term) personality @"lumen_eh_personality" {
//! ^bb0:
//!   %0 = const true : (bool)
//!   return %0
//! }
//! ```

use std::fmt::{self, Write};

use crate::ops::{CatchTypeKind, Op, Terminator};
use crate::{FuncId, Function, Module, ValueId};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module @{:?} {{", self.name())?;
        for (_, global) in self.globals() {
            let linkage = if global.external { "external " } else { "" };
            writeln!(f, "  global {linkage}@{:?} : {}", global.name, global.ty)?;
        }
        for (_, func) in self.functions() {
            write_function(f, self, func)?;
        }
        f.write_str("}\n")
    }
}

/// Display adapter for one function of a module.
pub struct FunctionDisplay<'a> {
    module: &'a Module,
    func: FuncId,
}

impl Module {
    pub fn display_function(&self, func: FuncId) -> FunctionDisplay<'_> {
        FunctionDisplay { module: self, func }
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_function(f, self.module, self.module.function(self.func))
    }
}

fn callee_name(module: &Module, id: FuncId) -> &str {
    module.get_function(id).map_or("<unknown>", Function::name)
}

fn write_values(out: &mut impl Write, values: &[ValueId]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{v}")?;
    }
    Ok(())
}

fn write_function(f: &mut fmt::Formatter<'_>, module: &Module, func: &Function) -> fmt::Result {
    let sig = func.signature();
    let kind = if func.is_declaration() { "declare" } else { "func" };
    write!(f, "  {kind} @{:?}(", func.name())?;
    for (i, ty) in sig.params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    if func.varargs() {
        f.write_str(if sig.params.is_empty() { "..." } else { ", ..." })?;
    }
    f.write_str(") -> (")?;
    for (i, ty) in sig.results.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    f.write_str(")")?;
    if let Some(p) = func.personality() {
        write!(f, " personality @{:?}", callee_name(module, p))?;
    }
    if func.is_declaration() {
        return f.write_str("\n");
    }
    f.write_str(" {\n")?;
    for &block in func.layout() {
        let data = func.block(block);
        write!(f, "  {block}")?;
        if !data.params().is_empty() {
            f.write_str("(")?;
            for (i, &p) in data.params().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}: {}", func.value_type(p))?;
            }
            f.write_str(")")?;
        }
        f.write_str(":\n")?;
        for inst in data.body() {
            f.write_str("    ")?;
            if !inst.results.is_empty() {
                write_values(f, &inst.results)?;
                f.write_str(" = ")?;
            }
            write_op(f, module, &inst.op)?;
            if !inst.results.is_empty() {
                f.write_str(" : (")?;
                for (i, &r) in inst.results.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", func.value_type(r))?;
                }
                f.write_str(")")?;
            }
            f.write_str("\n")?;
        }
        match data.terminator() {
            Some(term) => {
                f.write_str("    ")?;
                write_terminator(f, module, term)?;
                f.write_str("\n")?;
            }
            None => f.write_str("    <unterminated>\n")?,
        }
    }
    f.write_str("  }\n")
}

fn write_op(f: &mut fmt::Formatter<'_>, module: &Module, op: &Op) -> fmt::Result {
    f.write_str(op.name())?;
    match op {
        Op::Const(attr) => write!(f, " {attr}"),
        Op::Cast { value, to } => write!(f, " {value} to {to}"),
        Op::Cmp {
            op,
            strict,
            lhs,
            rhs,
        } => {
            let strictness = if *strict { ".strict" } else { "" };
            write!(f, ".{op:?}{strictness} {lhs}, {rhs}")
        }
        Op::Arith { op, operands } => {
            write!(f, ".{op:?} ")?;
            write_values(f, operands)
        }
        Op::Logical { op, lhs, rhs } => write!(f, ".{op:?} {lhs}, {rhs}"),
        Op::IsType { value, ty } => write!(f, " {value}, {ty}"),
        Op::Call { callee, args, flags } => {
            write!(f, " @{:?}(", callee_name(module, *callee))?;
            write_values(f, args)?;
            f.write_str(")")?;
            if !flags.is_empty() {
                let names: Vec<String> = flags
                    .iter_names()
                    .map(|(name, _)| name.to_ascii_lowercase())
                    .collect();
                write!(f, " {{{}}}", names.join(", "))?;
            }
            Ok(())
        }
        Op::Closure { callee, env } => {
            write!(f, " @{:?} env(", callee_name(module, *callee))?;
            write_values(f, env)?;
            f.write_str(")")
        }
        Op::CatchType(CatchTypeKind::Null) => f.write_str(" null"),
        Op::CatchType(CatchTypeKind::Global(g)) => {
            write!(f, " addressof @{:?}", module.global(*g).name)
        }
        Op::UnpackEnv { env, index } => write!(f, " {env}[{index}]"),
        Op::TupleElement { tuple, index } => write!(f, " {tuple}[{index}]"),
        Op::BinaryPush { spec, .. } | Op::BinaryMatch { spec, .. } => {
            f.write_str(" ")?;
            write_values(f, &op.operands())?;
            write!(f, " {spec:?}")
        }
        _ => {
            let operands = op.operands();
            if !operands.is_empty() {
                f.write_str(" ")?;
                write_values(f, &operands)?;
            }
            Ok(())
        }
    }
}

fn write_edge(f: &mut fmt::Formatter<'_>, dest: impl fmt::Display, args: &[ValueId]) -> fmt::Result {
    write!(f, "{dest}")?;
    if !args.is_empty() {
        f.write_str("(")?;
        write_values(f, args)?;
        f.write_str(")")?;
    }
    Ok(())
}

fn write_terminator(f: &mut fmt::Formatter<'_>, module: &Module, term: &Terminator) -> fmt::Result {
    f.write_str(term.name())?;
    match term {
        Terminator::Br { dest, args } => {
            f.write_str(" ")?;
            write_edge(f, dest, args)
        }
        Terminator::CondBr {
            cond,
            then_dest,
            then_args,
            else_dest,
            else_args,
        } => {
            write!(f, " {cond}, ")?;
            write_edge(f, then_dest, then_args)?;
            f.write_str(", ")?;
            write_edge(f, else_dest, else_args)
        }
        Terminator::Return { values } => {
            if !values.is_empty() {
                f.write_str(" ")?;
                write_values(f, values)?;
            }
            Ok(())
        }
        Terminator::Unreachable => Ok(()),
        Terminator::Throw {
            kind,
            reason,
            trace,
        } => write!(f, " {kind}, {reason}, {trace}"),
        Terminator::Invoke {
            callee,
            args,
            normal,
            normal_args,
            unwind,
        } => {
            write!(f, " @{:?}(", callee_name(module, *callee))?;
            write_values(f, args)?;
            f.write_str(") to ")?;
            write_edge(f, normal, normal_args)?;
            write!(f, " unwind {unwind}")
        }
    }
}
