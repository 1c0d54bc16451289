//! Map update chains.
//!
//! A chain of single-key inserts and updates is all-or-nothing: each step
//! branches to the next on success and to the shared error block, with
//! the offending key, on failure.

use ember_ir::{BlockId, Location, MapPutKind, Op, Type, TypeCell, ValueId};
use tracing::trace;

use crate::builder::ModuleBuilder;
use crate::control::Edge;
use crate::error::LowerResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapAction {
    pub kind: MapPutKind,
    pub key: ValueId,
    pub value: ValueId,
}

impl MapAction {
    pub fn insert(key: ValueId, value: ValueId) -> Self {
        MapAction {
            kind: MapPutKind::Insert,
            key,
            value,
        }
    }

    pub fn update(key: ValueId, value: ValueId) -> Self {
        MapAction {
            kind: MapPutKind::Update,
            key,
            value,
        }
    }
}

/// A map update request. `ok` receives the final map; `err` receives the
/// key whose insert or update failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapUpdate {
    pub loc: Location,
    pub map: ValueId,
    pub actions: Vec<MapAction>,
    pub ok: BlockId,
    pub err: BlockId,
}

impl ModuleBuilder {
    pub fn build_map_update(&mut self, update: &MapUpdate) -> LowerResult<()> {
        let MapUpdate {
            loc,
            map,
            actions,
            ok,
            err,
        } = update;
        let func = self.cursor()?.func;
        self.check_block(func, *ok)?;
        self.check_block(func, *err)?;

        let Some((last, init)) = actions.split_last() else {
            trace!(%ok, "empty map update");
            return self.build_br(loc, Edge::new(*ok, vec![*map]));
        };

        let mut current = *map;
        for action in init {
            let cont = self.create_block(vec![TypeCell::declared(Type::boxed(Type::Map))])?;
            self.build_map_put(loc, current, action, cont, *err)?;
            self.position_at_end(cont)?;
            current = self.current_block_argument(0)?;
        }
        self.build_map_put(loc, current, last, *ok, *err)
    }

    /// One step of a chain: put, then branch to `cont` or `err`.
    fn build_map_put(
        &mut self,
        loc: &Location,
        map: ValueId,
        action: &MapAction,
        cont: BlockId,
        err: BlockId,
    ) -> LowerResult<()> {
        let map = self.cast_if_needed(loc, map, &Type::boxed(Type::Map))?;
        let key = self.as_term(loc, action.key)?;
        let value = self.as_term(loc, action.value)?;
        let results = self.emit(
            loc,
            Op::MapPut {
                kind: action.kind,
                map,
                key,
                value,
            },
        )?;
        let (new_map, ok_flag) = (results[0], results[1]);
        trace!(kind = ?action.kind, %cont, "map put");
        self.build_cond_br(
            loc,
            ok_flag,
            Edge::new(cont, vec![new_map]),
            Edge::new(err, vec![key]),
        )
    }
}
