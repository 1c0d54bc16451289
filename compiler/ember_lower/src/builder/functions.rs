//! Function and block creation.

use ember_ir::{BlockId, FuncId, Signature, Type, TypeCell, ValueId};
use tracing::{debug, trace};

use super::{Cursor, ModuleBuilder};
use crate::error::{LowerError, LowerResult};
use crate::runtime;
use crate::types::{TypeDescriptor, TypeTag};

/// A freshly defined function and its entry block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    pub func: FuncId,
    pub entry: BlockId,
}

fn decode_all(descs: &[TypeDescriptor]) -> LowerResult<Vec<TypeTag>> {
    descs.iter().map(TypeTag::try_from).collect()
}

/// Results of a function with the given result descriptor.
///
/// An absent descriptor and the `None` tag both mean "no results".
fn result_types(result: Option<&TypeDescriptor>) -> LowerResult<Vec<Type>> {
    match result {
        None => Ok(Vec::new()),
        Some(desc) => match TypeTag::try_from(desc)? {
            TypeTag::None => Ok(Vec::new()),
            tag => Ok(vec![tag.to_type()]),
        },
    }
}

impl ModuleBuilder {
    /// The exception personality, declared on first use.
    pub(crate) fn personality(&mut self) -> FuncId {
        if let Some(p) = self.personality {
            return p;
        }
        let p = self
            .module
            .declare_function(runtime::PERSONALITY, Signature::new(vec![], vec![Type::I32]));
        self.module.function_mut(p).set_varargs(true);
        self.personality = Some(p);
        p
    }

    /// Look up `name`, or declare it with `arity` opaque parameters and
    /// one opaque result.
    pub(crate) fn get_or_declare_callee(&mut self, name: &str, arity: usize) -> FuncId {
        if let Some(f) = self.module.function_by_name(name) {
            return f;
        }
        trace!(callee = name, arity, "forward-declaring callee");
        self.module.declare_function(
            name,
            Signature::new(vec![Type::Term; arity], vec![Type::Term]),
        )
    }

    /// Declare `name` without defining it.
    ///
    /// Declaring an existing function returns it unchanged apart from
    /// attaching the personality if it has none.
    pub fn declare_function(
        &mut self,
        name: &str,
        params: &[TypeDescriptor],
        result: Option<&TypeDescriptor>,
    ) -> LowerResult<FuncId> {
        let params: Vec<Type> = decode_all(params)?.iter().map(TypeTag::to_type).collect();
        let results = result_types(result)?;
        let personality = self.personality();
        let func = self
            .module
            .declare_function(name, Signature::new(params, results));
        let f = self.module.function_mut(func);
        if f.personality().is_none() {
            f.set_personality(personality);
        }
        Ok(func)
    }

    /// Define `name` and position the builder at its entry block.
    ///
    /// A forward declaration of the same name is completed in place and
    /// keeps its declared signature. Defining a function that already has
    /// a body is an error.
    pub fn create_function(
        &mut self,
        name: &str,
        params: &[TypeDescriptor],
        result: Option<&TypeDescriptor>,
    ) -> LowerResult<FunctionDecl> {
        if let Some(existing) = self.module.function_by_name(name) {
            if !self.module.function(existing).is_declaration() {
                return Err(LowerError::RedefinedFunction {
                    name: name.to_owned(),
                });
            }
            // Validate the request even though the declaration's signature wins.
            decode_all(params)?;
            result_types(result)?;
        }
        let func = self.declare_function(name, params, result)?;
        let f = self.module.function_mut(func);
        let entry = f.append_block();
        for ty in f.signature().params.clone() {
            f.add_block_param(entry, TypeCell::declared(ty));
        }
        debug!(function = name, %func, params = params.len(), "defining function");
        self.cursor = Some(Cursor { func, block: entry });
        Ok(FunctionDecl { func, entry })
    }

    /// Append a block to `func` with one parameter per descriptor.
    ///
    /// Opaque parameters start provisional and may be narrowed by the
    /// first producer wired to them.
    pub fn append_block(&mut self, func: FuncId, args: &[TypeDescriptor]) -> LowerResult<BlockId> {
        let tags = decode_all(args)?;
        self.function(func)?;
        let f = self.module.function_mut(func);
        let block = f.append_block();
        for tag in &tags {
            f.add_block_param(block, tag.param_cell());
        }
        debug_assert_eq!(f.block(block).params().len(), args.len());
        trace!(%func, %block, params = args.len(), "appended block");
        Ok(block)
    }

    /// Append a block to the current function with the given parameter cells.
    pub(crate) fn create_block(&mut self, cells: Vec<TypeCell>) -> LowerResult<BlockId> {
        let func = self.cursor()?.func;
        let f = self.module.function_mut(func);
        let block = f.append_block();
        for cell in cells {
            f.add_block_param(block, cell);
        }
        Ok(block)
    }

    /// Append a parameterless block to the current function.
    ///
    /// For matchers and other extensions building their own control flow.
    pub fn build_block(&mut self) -> LowerResult<BlockId> {
        self.create_block(Vec::new())
    }

    /// The `index`-th parameter of `block` in the current function.
    pub fn block_argument(&self, block: BlockId, index: usize) -> LowerResult<ValueId> {
        let func = self.cursor()?.func;
        self.check_block(func, block)?;
        let params = self.module.function(func).block(block).params();
        params
            .get(index)
            .copied()
            .ok_or(LowerError::MissingBlockArgument {
                block,
                expected: index + 1,
                found: params.len(),
            })
    }

    /// The `index`-th parameter of the block at the insertion point.
    pub fn current_block_argument(&self, index: usize) -> LowerResult<ValueId> {
        let block = self.cursor()?.block;
        self.block_argument(block, index)
    }
}
