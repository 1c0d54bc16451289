//! Structural and type verification.
//!
//! The verifier never mutates and never stops at the first problem: it
//! returns every violation it finds so a caller can inspect a malformed
//! module in full. Dominance is not checked.

use crate::ops::{Op, Terminator};
use crate::{BlockId, FuncId, Function, Module, Type, ValueId};

/// A single verification failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("`{func}`: block {block} has no terminator")]
    Unterminated { func: String, block: BlockId },

    #[error("`{func}`: entry block has {found} parameters, signature declares {expected}")]
    EntryArity {
        func: String,
        expected: usize,
        found: usize,
    },

    #[error("`{func}`: entry parameter {index} has type `{found}`, signature declares `{expected}`")]
    EntryType {
        func: String,
        index: usize,
        expected: Type,
        found: Type,
    },

    #[error("`{func}`: edge {from} -> {to} passes {found} arguments, block expects {expected}")]
    EdgeArity {
        func: String,
        from: BlockId,
        to: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("`{func}`: edge {from} -> {to} argument {index} has type `{found}`, parameter expects `{expected}`")]
    EdgeType {
        func: String,
        from: BlockId,
        to: BlockId,
        index: usize,
        expected: Type,
        found: Type,
    },

    #[error("`{func}`: branch condition in {block} has type `{found}`, expected i1 or boolean")]
    ConditionType {
        func: String,
        block: BlockId,
        found: Type,
    },

    #[error("`{func}`: return in {block} yields {found} values, signature declares {expected}")]
    ReturnArity {
        func: String,
        block: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("`{func}`: return value {index} in {block} has type `{found}`, signature declares `{expected}`")]
    ReturnType {
        func: String,
        block: BlockId,
        index: usize,
        expected: Type,
        found: Type,
    },

    #[error("`{func}`: call in {block} to `{callee}` passes {found} arguments, callee takes {expected}")]
    CallArity {
        func: String,
        block: BlockId,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("`{func}`: call in {block} to `{callee}` argument {index} has type `{found}`, callee expects `{expected}`")]
    CallArgType {
        func: String,
        block: BlockId,
        callee: String,
        index: usize,
        expected: Type,
        found: Type,
    },

    #[error("`{func}`: call in {block} to `{callee}` binds {found} results, callee returns {expected}")]
    CallResults {
        func: String,
        block: BlockId,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("`{func}`: {block} targets {target}, which is not laid out")]
    DanglingBlock {
        func: String,
        block: BlockId,
        target: BlockId,
    },

    #[error("`{func}`: {block} references unknown function {callee}")]
    UnknownCallee {
        func: String,
        block: BlockId,
        callee: FuncId,
    },

    #[error("`{func}`: {block} uses undefined value {value}")]
    UndefinedValue {
        func: String,
        block: BlockId,
        value: ValueId,
    },
}

/// Verify every defined function in `module`.
pub fn verify_module(module: &Module) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    for (_, func) in module.functions() {
        if !func.is_declaration() {
            verify_function_into(module, func, &mut errors);
        }
    }
    errors
}

/// Verify a single function.
pub fn verify_function(module: &Module, func: FuncId) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    verify_function_into(module, module.function(func), &mut errors);
    errors
}

struct Checker<'a> {
    module: &'a Module,
    func: &'a Function,
    errors: &'a mut Vec<VerifyError>,
}

fn verify_function_into(module: &Module, func: &Function, errors: &mut Vec<VerifyError>) {
    let mut checker = Checker {
        module,
        func,
        errors,
    };
    checker.check_entry();
    for &block in func.layout() {
        checker.check_block(block);
    }
}

impl Checker<'_> {
    fn name(&self) -> String {
        self.func.name().to_owned()
    }

    fn check_entry(&mut self) {
        let Some(entry) = self.func.entry() else {
            return;
        };
        let params = self.func.block(entry).params();
        let expected = &self.func.signature().params;
        if params.len() != expected.len() {
            self.errors.push(VerifyError::EntryArity {
                func: self.name(),
                expected: expected.len(),
                found: params.len(),
            });
            return;
        }
        for (index, (&p, want)) in params.iter().zip(expected).enumerate() {
            let found = self.func.value_type(p);
            if found != want {
                self.errors.push(VerifyError::EntryType {
                    func: self.name(),
                    index,
                    expected: want.clone(),
                    found: found.clone(),
                });
            }
        }
    }

    fn defined(&mut self, block: BlockId, value: ValueId) -> bool {
        if self.func.contains_value(value) {
            return true;
        }
        self.errors.push(VerifyError::UndefinedValue {
            func: self.name(),
            block,
            value,
        });
        false
    }

    fn check_block(&mut self, block: BlockId) {
        let func = self.func;
        let data = func.block(block);
        for inst in data.body() {
            for v in inst.op.operands() {
                self.defined(block, v);
            }
            if let Op::Call { callee, args, .. } = &inst.op {
                self.check_call(block, *callee, args, Some(inst.results.len()));
            }
        }
        let Some(term) = data.terminator() else {
            self.errors.push(VerifyError::Unterminated {
                func: self.name(),
                block,
            });
            return;
        };
        for v in term.operands() {
            self.defined(block, v);
        }
        self.check_terminator(block, term);
    }

    fn check_call(
        &mut self,
        block: BlockId,
        callee: FuncId,
        args: &[ValueId],
        results: Option<usize>,
    ) {
        let module = self.module;
        let Some(target) = module.get_function(callee) else {
            self.errors.push(VerifyError::UnknownCallee {
                func: self.name(),
                block,
                callee,
            });
            return;
        };
        let target_name = target.name().to_owned();
        let params = &target.signature().params;
        let expected_results = target.signature().results.len();
        let varargs = target.varargs();

        let arity_ok = if varargs {
            args.len() >= params.len()
        } else {
            args.len() == params.len()
        };
        if !arity_ok {
            self.errors.push(VerifyError::CallArity {
                func: self.name(),
                block,
                callee: target_name,
                expected: params.len(),
                found: args.len(),
            });
            return;
        }
        for (index, (&arg, want)) in args.iter().zip(params).enumerate() {
            if !self.func.contains_value(arg) {
                continue;
            }
            let found = self.func.value_type(arg);
            if !found.is_assignable_to(want) {
                self.errors.push(VerifyError::CallArgType {
                    func: self.name(),
                    block,
                    callee: target_name.clone(),
                    index,
                    expected: want.clone(),
                    found: found.clone(),
                });
            }
        }
        if let Some(found) = results {
            if found != expected_results {
                self.errors.push(VerifyError::CallResults {
                    func: self.name(),
                    block,
                    callee: target_name,
                    expected: expected_results,
                    found,
                });
            }
        }
    }

    /// Check an edge carrying values of `arg_types` into `to`.
    fn check_edge(&mut self, from: BlockId, to: BlockId, arg_types: &[Type]) {
        if !self.func.contains_block(to) {
            self.errors.push(VerifyError::DanglingBlock {
                func: self.name(),
                block: from,
                target: to,
            });
            return;
        }
        let params = self.func.block(to).params();
        if params.len() != arg_types.len() {
            self.errors.push(VerifyError::EdgeArity {
                func: self.name(),
                from,
                to,
                expected: params.len(),
                found: arg_types.len(),
            });
            return;
        }
        for (index, (found, &param)) in arg_types.iter().zip(params).enumerate() {
            let want = self.func.value_type(param);
            if !found.is_assignable_to(want) {
                self.errors.push(VerifyError::EdgeType {
                    func: self.name(),
                    from,
                    to,
                    index,
                    expected: want.clone(),
                    found: found.clone(),
                });
            }
        }
    }

    fn types_of(&self, values: &[ValueId]) -> Vec<Type> {
        values
            .iter()
            .map(|&v| {
                if self.func.contains_value(v) {
                    self.func.value_type(v).clone()
                } else {
                    Type::None
                }
            })
            .collect()
    }

    fn check_terminator(&mut self, block: BlockId, term: &Terminator) {
        match term {
            Terminator::Br { dest, args } => {
                let tys = self.types_of(args);
                self.check_edge(block, *dest, &tys);
            }
            Terminator::CondBr {
                cond,
                then_dest,
                then_args,
                else_dest,
                else_args,
            } => {
                if self.func.contains_value(*cond) && !self.func.value_type(*cond).is_boolean_like() {
                    self.errors.push(VerifyError::ConditionType {
                        func: self.name(),
                        block,
                        found: self.func.value_type(*cond).clone(),
                    });
                }
                let tys = self.types_of(then_args);
                self.check_edge(block, *then_dest, &tys);
                let tys = self.types_of(else_args);
                self.check_edge(block, *else_dest, &tys);
            }
            Terminator::Return { values } => {
                let expected = self.func.signature().results.clone();
                if values.len() != expected.len() {
                    self.errors.push(VerifyError::ReturnArity {
                        func: self.name(),
                        block,
                        expected: expected.len(),
                        found: values.len(),
                    });
                    return;
                }
                let found = self.types_of(values);
                for (index, (found, want)) in found.into_iter().zip(expected).enumerate() {
                    if !found.is_assignable_to(&want) {
                        self.errors.push(VerifyError::ReturnType {
                            func: self.name(),
                            block,
                            index,
                            expected: want,
                            found,
                        });
                    }
                }
            }
            Terminator::Unreachable | Terminator::Throw { .. } => {}
            Terminator::Invoke {
                callee,
                args,
                normal,
                normal_args,
                unwind,
            } => {
                self.check_call(block, *callee, args, None);
                let results = self
                    .module
                    .get_function(*callee)
                    .map(|f| f.signature().results.clone())
                    .unwrap_or_default();
                let mut tys = results;
                tys.extend(self.types_of(normal_args));
                self.check_edge(block, *normal, &tys);
                self.check_edge(block, *unwind, &[]);
            }
        }
    }
}
