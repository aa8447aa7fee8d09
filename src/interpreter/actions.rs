//! User actions and the spec dialect
//!
//! A spec block lists parameters in order:
//! - `word`: evaluated argument
//! - `'word`: argument taken literally, groups and get-words evaluated
//! - `:word`: argument taken literally
//! - `/word`: refinement; the plain parameters after it are its arguments
//! - `/local`: the words after it are locals
//! - `[integer! block!]` after a parameter: accepted types
//! - strings: documentation, ignored
//!
//! `func` adds a definitional `return` slot to every action it makes.

use super::engine::Interpreter;
use super::errors::ErrorId;
use super::natives::{Call, NativeTable};
use super::symbols::{sym, SymId};
use super::type_system::TypeSet;
use super::unwind::Eval;
use crate::memory::series::{ActionBody, ActionData, Param, ParamClass};
use crate::memory::value::{ActionCell, SeriesRef, Value};
use rustc_hash::FxHashSet;

pub const NATIVES: NativeTable = &[
    ("func", "spec [block!] body [block!]", native_func),
    ("function", "spec [block!] body [block!] /with extern [block!]", native_function),
    ("does", "body [block!]", native_does),
    ("infix", "action [action!]", native_infix),
];

impl Interpreter {
    /// Parse a spec block. With `definitional`, a `return` slot is appended.
    pub fn parse_spec(&mut self, spec: SeriesRef, definitional: bool) -> Eval<Vec<Param>> {
        let values = self.heap.array(spec.series)[spec.index()..].to_vec();
        let mut params: Vec<Param> = Vec::new();
        let mut refinement: Option<usize> = None;
        let mut locals = false;
        let mut seen = FxHashSet::default();

        for value in values {
            let (param_sym, class) = match value {
                Value::Text(_) => continue,
                Value::Block(types) => {
                    let parsed = self.parse_typeset(types)?;
                    match params.last_mut().filter(|p| p.takes_arg()) {
                        Some(last) => last.types = parsed,
                        None => return Err(self.error(ErrorId::BadFuncDef, &[value])),
                    }
                    continue;
                }
                Value::Refinement(s) if self.symbols.canon(s) == sym::LOCAL => {
                    locals = true;
                    continue;
                }
                Value::Refinement(s) => {
                    if locals {
                        return Err(self.error(ErrorId::BadFuncDef, &[value]));
                    }
                    refinement = Some(params.len());
                    (s, ParamClass::Refinement)
                }
                Value::Word(w) if locals => (w.sym, ParamClass::Local),
                Value::Word(w) => (w.sym, ParamClass::Normal),
                Value::LitWord(w) if !locals => (w.sym, ParamClass::Quoted { soft: true }),
                Value::GetWord(w) if !locals => (w.sym, ParamClass::Quoted { soft: false }),
                // `return:` style annotations
                Value::SetWord(_) => continue,
                other => return Err(self.error(ErrorId::BadFuncDef, &[other])),
            };
            if !seen.insert(self.symbols.canon(param_sym)) {
                return Err(self.error(ErrorId::BadFuncDef, &[value]));
            }
            let owner = match class {
                ParamClass::Normal | ParamClass::Quoted { .. } => refinement,
                _ => None,
            };
            params.push(Param {
                sym: param_sym,
                class,
                types: if class == ParamClass::Local {
                    TypeSet::ALL
                } else {
                    TypeSet::ANY_VALUE
                },
                refinement: owner,
            });
        }

        if definitional && seen.insert(sym::RETURN) {
            params.push(Param {
                sym: sym::RETURN,
                class: ParamClass::Return,
                types: TypeSet::ALL,
                refinement: None,
            });
        }
        Ok(params)
    }

    fn parse_typeset(&mut self, types: SeriesRef) -> Eval<TypeSet> {
        let words = self.heap.array(types.series)[types.index()..].to_vec();
        let mut set = TypeSet::EMPTY;
        for word in words {
            let named = word.symbol().and_then(|s| {
                let name = self.symbols.name(s).to_lowercase();
                TypeSet::named(&name).or_else(|| self.types.kind_by_name(&name).map(|k| TypeSet::EMPTY.with(k)))
            });
            match named {
                Some(kinds) => set = set.union(kinds),
                None => return Err(self.error(ErrorId::BadFuncDef, &[word])),
            }
        }
        Ok(set)
    }

    /// Make a user action from a spec and a body block
    pub fn make_function(&mut self, spec: SeriesRef, body: SeriesRef) -> Eval {
        let params = self.parse_spec(spec, true)?;
        self.make_action_from(params, spec, body)
    }

    fn make_action_from(&mut self, params: Vec<Param>, spec: SeriesRef, body: SeriesRef) -> Eval {
        let spec_copy = self.copy_array_deep(spec.series, spec.index());
        let body_copy = self.copy_array_deep(body.series, body.index());
        let action = self.heap.alloc_action(ActionData {
            name: None,
            params: params.into(),
            body: ActionBody::User { body: body_copy },
            infix: false,
            spec: Some(spec_copy),
        });
        Ok(Value::Action(ActionCell {
            action,
            binding: None,
        }))
    }

    /// Name an action after the word it is first assigned to
    pub(crate) fn name_action(&mut self, value: Value, name: SymId) {
        if let Value::Action(cell) = value {
            let action = self.heap.action_mut(cell.action);
            if action.name.is_none() {
                action.name = Some(name);
            }
        }
    }
}

fn native_func(interp: &mut Interpreter, call: &Call) -> Eval {
    let spec = call.block(interp, 0)?;
    let body = call.block(interp, 1)?;
    interp.make_function(spec, body)
}

/// `func` whose set-words in the body become locals
fn native_function(interp: &mut Interpreter, call: &Call) -> Eval {
    let spec = call.block(interp, 0)?;
    let body = call.block(interp, 1)?;
    let mut params = interp.parse_spec(spec, true)?;

    let mut excluded: FxHashSet<SymId> = params.iter().map(|p| interp.symbols.canon(p.sym)).collect();
    if call.refined(2) {
        let extern_words = call.block(interp, 3)?;
        for value in &interp.heap.array(extern_words.series)[extern_words.index()..] {
            if let Some(s) = value.symbol() {
                excluded.insert(interp.symbols.canon(s));
            }
        }
    }
    for local in interp.collect_set_words(body.series) {
        if excluded.insert(interp.symbols.canon(local)) {
            params.push(Param {
                sym: local,
                class: ParamClass::Local,
                types: TypeSet::ALL,
                refinement: None,
            });
        }
    }
    interp.make_action_from(params, spec, body)
}

fn native_does(interp: &mut Interpreter, call: &Call) -> Eval {
    let body = call.block(interp, 0)?;
    let spec = interp.heap.alloc_array(&[]);
    interp.make_function(SeriesRef::head(spec), body)
}

/// Infix variant of a two-argument action
fn native_infix(interp: &mut Interpreter, call: &Call) -> Eval {
    let Value::Action(cell) = call.arg(0) else {
        return Err(interp.error(ErrorId::InvalidArg, &[call.arg(0)]));
    };
    let original = interp.heap.action(cell.action).clone();
    if original.arity() != 2 {
        return Err(interp.error(ErrorId::BadFuncDef, &[call.arg(0)]));
    }
    let action = interp.heap.alloc_action(ActionData {
        infix: true,
        ..original
    });
    Ok(Value::Action(ActionCell {
        action,
        binding: cell.binding,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::scan::scan;

    fn spec(interp: &mut Interpreter, text: &str) -> Eval<Vec<Param>> {
        let loaded = scan(&mut interp.heap, &mut interp.symbols, text).unwrap();
        interp.parse_spec(SeriesRef::head(loaded.block), true)
    }

    #[test]
    fn test_spec_classes() {
        let mut interp = Interpreter::new();
        let params = spec(&mut interp, "\"doc\" a 'b :c [block!] /only d /local e").unwrap();
        let classes: Vec<ParamClass> = params.iter().map(|p| p.class).collect();
        assert_eq!(
            classes,
            vec![
                ParamClass::Normal,
                ParamClass::Quoted { soft: true },
                ParamClass::Quoted { soft: false },
                ParamClass::Refinement,
                ParamClass::Normal,
                ParamClass::Local,
                ParamClass::Return,
            ]
        );
        assert_eq!(params[4].refinement, Some(3));
        assert!(params[2].types.contains(crate::memory::value::Kind::Block));
        assert!(!params[2].types.contains(crate::memory::value::Kind::Integer));
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let mut interp = Interpreter::new();
        assert!(spec(&mut interp, "a A").is_err());
        assert!(spec(&mut interp, "a [no-such!]").is_err());
    }
}
