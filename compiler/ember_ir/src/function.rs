//! Functions and basic blocks.
//!
//! A [`Function`] owns arenas of values and blocks. Block order is kept
//! separately in a layout list so blocks can be inserted mid-function
//! (landing pads before their error block, split tails right after the
//! block they came from) without renumbering handles.

use smallvec::SmallVec;
use tracing::warn;

use crate::ops::{BlockExit, Inst, Op, Terminator};
use crate::{BlockId, FuncId, Location, Type, TypeCell, ValueId};

/// Parameter and result types of a function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Signature { params, results }
    }
}

/// Where a value is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueDef {
    /// The `index`-th parameter of `block`.
    Param { block: BlockId, index: u32 },
    /// The `result`-th result of an instruction in `block`.
    Result { block: BlockId, result: u32 },
}

impl ValueDef {
    pub fn block(self) -> BlockId {
        match self {
            ValueDef::Param { block, .. } | ValueDef::Result { block, .. } => block,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
struct ValueData {
    cell: TypeCell,
    def: ValueDef,
}

/// A basic block: typed parameters, a body, and one terminator.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    params: Vec<ValueId>,
    body: Vec<Inst>,
    exit: Option<BlockExit>,
}

impl Block {
    #[inline]
    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    #[inline]
    pub fn body(&self) -> &[Inst] {
        &self.body
    }

    #[inline]
    pub fn exit(&self) -> Option<&BlockExit> {
        self.exit.as_ref()
    }

    #[inline]
    pub fn terminator(&self) -> Option<&Terminator> {
        self.exit.as_ref().map(|e| &e.kind)
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.exit.is_some()
    }
}

/// A function: declared (signature only) or defined (has an entry block).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    name: String,
    signature: Signature,
    varargs: bool,
    personality: Option<FuncId>,
    values: Vec<ValueData>,
    blocks: Vec<Block>,
    layout: Vec<BlockId>,
}

impl Function {
    /// Create a bodiless declaration.
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Function {
            name: name.into(),
            signature,
            varargs: false,
            personality: None,
            values: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn varargs(&self) -> bool {
        self.varargs
    }

    pub fn set_varargs(&mut self, varargs: bool) {
        self.varargs = varargs;
    }

    #[inline]
    pub fn personality(&self) -> Option<FuncId> {
        self.personality
    }

    pub fn set_personality(&mut self, personality: FuncId) {
        self.personality = Some(personality);
    }

    /// A declaration has no body.
    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    /// The entry block, if the function is defined.
    #[inline]
    pub fn entry(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Blocks in layout order.
    #[inline]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Whether `block` is laid out in this function.
    pub fn contains_block(&self, block: BlockId) -> bool {
        self.layout.contains(&block)
    }

    #[inline]
    pub fn contains_value(&self, value: ValueId) -> bool {
        value.index() < self.values.len()
    }

    /// Access a block by handle. Panics on a foreign handle.
    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Access a block by handle, if it belongs to this function.
    #[inline]
    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    // ── Blocks ──────────────────────────────────────────────────────

    fn alloc_block(&mut self) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(Block::default());
        id
    }

    /// Append an empty block at the end of the layout.
    pub fn append_block(&mut self) -> BlockId {
        let id = self.alloc_block();
        self.layout.push(id);
        id
    }

    /// Create an empty block laid out immediately before `before`.
    pub fn insert_block_before(&mut self, before: BlockId) -> BlockId {
        let id = self.alloc_block();
        let pos = self
            .layout
            .iter()
            .position(|&b| b == before)
            .unwrap_or(self.layout.len());
        self.layout.insert(pos, id);
        id
    }

    /// Create an empty block laid out immediately after `after`.
    pub fn insert_block_after(&mut self, after: BlockId) -> BlockId {
        let id = self.alloc_block();
        let pos = self
            .layout
            .iter()
            .position(|&b| b == after)
            .map_or(self.layout.len(), |p| p + 1);
        self.layout.insert(pos, id);
        id
    }

    /// Add a parameter to `block`.
    pub fn add_block_param(&mut self, block: BlockId, cell: TypeCell) -> ValueId {
        #[allow(clippy::cast_possible_truncation)]
        let index = self.blocks[block.index()].params.len() as u32;
        let id = self.alloc_value(cell, ValueDef::Param { block, index });
        self.blocks[block.index()].params.push(id);
        id
    }

    fn alloc_value(&mut self, cell: TypeCell, def: ValueDef) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push(ValueData { cell, def });
        id
    }

    // ── Instructions ────────────────────────────────────────────────

    fn make_inst(
        &mut self,
        block: BlockId,
        op: Op,
        result_types: &[Type],
        loc: Location,
    ) -> Inst {
        let mut results = SmallVec::new();
        for (i, ty) in result_types.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let def = ValueDef::Result {
                block,
                result: i as u32,
            };
            results.push(self.alloc_value(TypeCell::declared(ty.clone()), def));
        }
        Inst { op, results, loc }
    }

    /// Append an instruction to `block`, returning its results.
    pub fn push_inst(
        &mut self,
        block: BlockId,
        op: Op,
        result_types: &[Type],
        loc: Location,
    ) -> SmallVec<[ValueId; 2]> {
        debug_assert!(
            !self.blocks[block.index()].is_terminated(),
            "push_inst: block {block} is already terminated"
        );
        let inst = self.make_inst(block, op, result_types, loc);
        let results = inst.results.clone();
        self.blocks[block.index()].body.push(inst);
        results
    }

    /// Prepend an instruction to `block`, returning its results.
    pub fn insert_inst_at_start(
        &mut self,
        block: BlockId,
        op: Op,
        result_types: &[Type],
        loc: Location,
    ) -> SmallVec<[ValueId; 2]> {
        let inst = self.make_inst(block, op, result_types, loc);
        let results = inst.results.clone();
        self.blocks[block.index()].body.insert(0, inst);
        results
    }

    /// Terminate `block`.
    pub fn set_terminator(&mut self, block: BlockId, kind: Terminator, loc: Location) {
        let slot = &mut self.blocks[block.index()].exit;
        debug_assert!(slot.is_none(), "set_terminator: block {block} is already terminated");
        if let Some(old) = slot {
            warn!(%block, old = old.kind.name(), "replacing existing terminator");
        }
        *slot = Some(BlockExit { kind, loc });
    }

    /// Mutable access to a block's terminator.
    pub fn terminator_mut(&mut self, block: BlockId) -> Option<&mut Terminator> {
        self.blocks[block.index()].exit.as_mut().map(|e| &mut e.kind)
    }

    /// Split `block` before body position `at`.
    ///
    /// Instructions from `at` onward and the terminator move to a new
    /// parameterless block laid out right after `block`. The original block
    /// is left unterminated.
    pub fn split_block(&mut self, block: BlockId, at: usize) -> BlockId {
        let tail = self.insert_block_after(block);
        let src = &mut self.blocks[block.index()];
        let at = at.min(src.body.len());
        let moved: Vec<Inst> = src.body.drain(at..).collect();
        let exit = src.exit.take();
        for inst in &moved {
            for &r in &inst.results {
                if let ValueDef::Result { result, .. } = self.values[r.index()].def {
                    self.values[r.index()].def = ValueDef::Result {
                        block: tail,
                        result,
                    };
                }
            }
        }
        let dst = &mut self.blocks[tail.index()];
        dst.body = moved;
        dst.exit = exit;
        tail
    }

    /// Drop `block` from the layout. Its handle stays allocated.
    pub(crate) fn remove_from_layout(&mut self, block: BlockId) {
        self.layout.retain(|&b| b != block);
    }

    /// Mutable access to the instructions of `block`.
    pub(crate) fn body_mut(&mut self, block: BlockId) -> &mut Vec<Inst> {
        &mut self.blocks[block.index()].body
    }

    // ── Values ──────────────────────────────────────────────────────

    #[inline]
    pub fn value_type(&self, value: ValueId) -> &Type {
        self.values[value.index()].cell.ty()
    }

    #[inline]
    pub fn value_cell(&self, value: ValueId) -> &TypeCell {
        &self.values[value.index()].cell
    }

    #[inline]
    pub fn value_cell_mut(&mut self, value: ValueId) -> &mut TypeCell {
        &mut self.values[value.index()].cell
    }

    #[inline]
    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.values[value.index()].def
    }

    /// The instruction producing `value`, if it is an instruction result.
    pub fn defining_inst(&self, value: ValueId) -> Option<&Inst> {
        match self.value_def(value) {
            ValueDef::Param { .. } => None,
            ValueDef::Result { block, .. } => self.blocks[block.index()]
                .body
                .iter()
                .find(|inst| inst.results.contains(&value)),
        }
    }

    /// The operation producing `value`, if it is an instruction result.
    pub fn defining_op(&self, value: ValueId) -> Option<&Op> {
        self.defining_inst(value).map(|inst| &inst.op)
    }

    /// Number of values allocated so far.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// Replace every use of `from` with `to` across the function.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        for block in &mut self.blocks {
            for inst in &mut block.body {
                inst.op.substitute(from, to);
            }
            if let Some(exit) = &mut block.exit {
                exit.kind.substitute(from, to);
            }
        }
    }
}
