//! Native actions
//!
//! A native is a Rust function taking the gathered arguments of one call.
//! Each native is declared with a spec string written in the same dialect as
//! `func` specs, so parameter classes, refinements and type checks come from
//! one parser. The tables live next to their implementations (`jumps`,
//! `loops`, `ops::*`); this module installs them into lib.

use super::engine::Interpreter;
use super::errors::{ErrorId, Failure};
use super::ops;
use super::symbols::SymId;
use super::unwind::Eval;
use super::{actions, jumps, loops};
use crate::memory::series::{ActionBody, ActionData, SeriesId};
use crate::memory::stack::FrameId;
use crate::memory::value::{ActionCell, Kind, SeriesRef, Value};

pub type NativeFn = fn(&mut Interpreter, &Call) -> Eval;

/// `(name, spec, implementation)` rows of a native table
pub type NativeTable = &'static [(&'static str, &'static str, NativeFn)];

/// Arguments and identity of one native call
#[derive(Debug, Clone)]
pub struct Call {
    /// One cell per parameter, in spec order. Refinements hold `true` or
    /// `none`; arguments of inactive refinements hold `none`.
    pub args: Vec<Value>,
    pub label: Option<SymId>,
    /// Binding carried by the action cell (the varlist for `return`)
    pub binding: Option<SeriesId>,
    /// Datatype a shared native was registered for (type predicates)
    pub kind: Option<Kind>,
    pub frame: FrameId,
}

impl Call {
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or(Value::None)
    }

    /// Whether the refinement in parameter slot `index` was used
    pub fn refined(&self, index: usize) -> bool {
        self.arg(index).is_truthy()
    }

    pub fn int(&self, interp: &mut Interpreter, index: usize) -> Eval<i64> {
        match self.arg(index) {
            Value::Integer(n) => Ok(n),
            other => Err(interp.error(ErrorId::InvalidArg, &[other])),
        }
    }

    pub fn block(&self, interp: &mut Interpreter, index: usize) -> Eval<SeriesRef> {
        match self.arg(index) {
            Value::Block(r) => Ok(r),
            other => Err(interp.error(ErrorId::InvalidArg, &[other])),
        }
    }
}

impl Interpreter {
    /// Keep a value on the data stack for the rest of the current call;
    /// the call frame's exit releases it
    pub(crate) fn hold(&mut self, value: Value) -> usize {
        let slot = self.stack.data_height();
        self.stack.push(value);
        slot
    }

    pub(crate) fn held(&self, slot: usize) -> Value {
        self.stack.data_at(slot)
    }

    pub(crate) fn set_held(&mut self, slot: usize, value: Value) {
        *self.stack.data_at_mut(slot) = value;
    }

    /// Register a native in lib under `name`
    pub fn register_native(&mut self, name: &str, spec: &str, f: NativeFn) -> Result<SeriesId, Failure> {
        self.define_native(name, spec, f, None, false)
    }

    /// Register an infix native; its first parameter takes the value on the left
    pub fn register_infix(&mut self, name: &str, spec: &str, f: NativeFn) -> Result<SeriesId, Failure> {
        self.define_native(name, spec, f, None, true)
    }

    pub(crate) fn define_native(
        &mut self,
        name: &str,
        spec: &str,
        f: NativeFn,
        kind: Option<Kind>,
        infix: bool,
    ) -> Result<SeriesId, Failure> {
        let sym = self.symbols.intern(name);
        let loaded = self.scan_source(spec)?;
        let params = self
            .parse_spec(SeriesRef::head(loaded.block), false)
            .map_err(|unwind| self.failure(unwind))?;
        let action = self.heap.alloc_action(ActionData {
            name: Some(sym),
            params: params.into(),
            body: ActionBody::Native { f, kind },
            infix,
            spec: Some(loaded.block),
        });
        self.heap.fix(action);
        let cell = Value::Action(ActionCell {
            action,
            binding: None,
        });
        let lib = self.lib;
        self.context_put(lib, sym, cell)
            .map_err(|unwind| self.failure(unwind))?;
        Ok(action)
    }

    /// Install every built-in native, datatype word and constant into lib
    pub(crate) fn install_natives(&mut self) -> Result<(), Failure> {
        let tables: [NativeTable; 8] = [
            jumps::NATIVES,
            loops::NATIVES,
            actions::NATIVES,
            ops::control::NATIVES,
            ops::math::NATIVES,
            ops::series::NATIVES,
            ops::data::NATIVES,
            ops::system::NATIVES,
        ];
        for table in tables {
            for &(name, spec, f) in table {
                self.define_native(name, spec, f, None, false)?;
            }
        }
        for &(name, spec, f) in ops::math::INFIX {
            self.define_native(name, spec, f, None, true)?;
        }

        let lib = self.lib;
        for kind in Kind::ALL {
            let name = self.kind_name(kind);
            let sym = self.symbols.intern(name);
            self.context_put(lib, sym, Value::Datatype(kind))
                .map_err(|unwind| self.failure(unwind))?;

            let predicate = format!("{}?", name.trim_end_matches('!'));
            self.define_native(&predicate, "value [any-type!]", ops::data::native_type_predicate, Some(kind), false)?;
        }
        let text = self.symbols.intern("text!");
        let constants = [
            ("true", Value::Logic(true)),
            ("false", Value::Logic(false)),
            ("none", Value::None),
        ];
        for (name, value) in constants {
            let sym = self.symbols.intern(name);
            self.context_put(lib, sym, value)
                .map_err(|unwind| self.failure(unwind))?;
        }
        self.context_put(lib, text, Value::Datatype(Kind::Text))
            .map_err(|unwind| self.failure(unwind))?;
        log::debug!("installed {} lib words", self.heap.context(lib).len());
        Ok(())
    }
}
