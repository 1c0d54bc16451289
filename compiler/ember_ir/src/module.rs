//! Modules: named collections of functions and globals.

use rustc_hash::FxHashMap;

use crate::{FuncId, Function, GlobalId, Signature, Type};

/// A module-level global symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Global {
    pub name: String,
    pub ty: Type,
    /// Defined outside this module and resolved at link time.
    pub external: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Module {
    name: String,
    functions: Vec<Function>,
    globals: Vec<Global>,
    function_names: FxHashMap<String, FuncId>,
    global_names: FxHashMap<String, GlobalId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Module::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Functions ───────────────────────────────────────────────────

    /// Look up a function by symbol name.
    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.function_names.get(name).copied()
    }

    /// Add a bodiless declaration, or return the existing function of that name.
    pub fn declare_function(&mut self, name: &str, signature: Signature) -> FuncId {
        if let Some(id) = self.function_by_name(name) {
            return id;
        }
        let id = FuncId::from_index(self.functions.len());
        self.functions.push(Function::new(name, signature));
        self.function_names.insert(name.to_owned(), id);
        id
    }

    #[inline]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    #[inline]
    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    #[inline]
    pub fn get_function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// All functions with their handles, in creation order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::from_index(i), f))
    }

    pub(crate) fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut()
    }

    #[inline]
    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    // ── Globals ─────────────────────────────────────────────────────

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.global_names.get(name).copied()
    }

    /// Add a global, or return the existing global of that name.
    pub fn declare_global(&mut self, name: &str, ty: Type, external: bool) -> GlobalId {
        if let Some(id) = self.global_by_name(name) {
            return id;
        }
        let id = GlobalId::from_index(self.globals.len());
        self.globals.push(Global {
            name: name.to_owned(),
            ty,
            external,
        });
        self.global_names.insert(name.to_owned(), id);
        id
    }

    #[inline]
    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(i, g)| (GlobalId::from_index(i), g))
    }
}
