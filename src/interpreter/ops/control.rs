//! Conditionals and block evaluation: `if`, `either`, `unless`, `case`,
//! `switch`, `all`, `any`, `not`, `do`, `reduce`, `compose`

use crate::interpreter::constants::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ErrorId;
use crate::interpreter::natives::{Call, NativeTable};
use crate::interpreter::unwind::{Eval, Unwind};
use crate::memory::series::SeriesId;
use crate::memory::stack::FrameKind;
use crate::memory::value::{SeriesRef, Value};

pub const NATIVES: NativeTable = &[
    ("if", "condition [any-value!] branch [block!]", native_if),
    ("either", "condition [any-value!] true-branch [block!] false-branch [block!]", native_either),
    ("unless", "condition [any-value!] branch [block!]", native_unless),
    ("case", "cases [block!] /all", native_case),
    ("switch", "value [any-value!] cases [block!] /default fallback [block!]", native_switch),
    ("all", "block [block!]", native_all),
    ("any", "block [block!]", native_any),
    ("not", "value [any-value!]", native_not),
    ("do", "value [any-value!]", native_do),
    ("reduce", "value [any-value!]", native_reduce),
    ("compose", "value [block!] /deep /only", native_compose),
];

impl Interpreter {
    /// Evaluate every expression of `block` into a new block
    pub(crate) fn reduce_block(&mut self, block: SeriesRef) -> Eval<SeriesId> {
        self.in_feed(block, |interp, fid| {
            let height = interp.stack.data_height();
            while !interp.at_end(fid) {
                let value = interp.eval_step(fid, true)?;
                if !value.is_unset() {
                    interp.stack.push(value);
                }
            }
            let values = interp.stack.take_from(height);
            Ok(interp.heap.alloc_array(&values))
        })
    }

    /// Copy of `block` with each group replaced by its value; block results
    /// are spliced unless `only`
    fn compose_block(&mut self, block: SeriesRef, deep: bool, only: bool) -> Eval<SeriesId> {
        let mut composing = Vec::new();
        self.compose_nested(block, deep, only, &mut composing)
    }

    /// A nested block already being composed is kept as is
    fn compose_nested(
        &mut self,
        block: SeriesRef,
        deep: bool,
        only: bool,
        composing: &mut Vec<SeriesId>,
    ) -> Eval<SeriesId> {
        let source = self.heap.array(block.series).get(block.index()..).unwrap_or_default().to_vec();
        composing.push(block.series);
        let height = self.stack.data_height();
        for value in source {
            match value {
                Value::Group(r) => match self.do_array(r, FrameKind::Group)? {
                    Value::Block(inner) if !only => {
                        let spliced = self.heap.array(inner.series).get(inner.index()..).unwrap_or_default().to_vec();
                        for item in spliced {
                            self.stack.push(item);
                        }
                    }
                    Value::Unset => {}
                    other => self.stack.push(other),
                },
                Value::Block(r) if deep && !composing.contains(&r.series) => {
                    let composed = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                        self.compose_nested(r, deep, only, composing)
                    })?;
                    self.stack.push(Value::Block(SeriesRef::head(composed)));
                }
                other => self.stack.push(other),
            }
        }
        composing.pop();
        let values = self.stack.take_from(height);
        Ok(self.heap.alloc_array(&values))
    }
}

fn native_if(interp: &mut Interpreter, call: &Call) -> Eval {
    if call.arg(0).is_truthy() {
        let branch = call.block(interp, 1)?;
        interp.do_block(branch)
    } else {
        Ok(Value::None)
    }
}

fn native_either(interp: &mut Interpreter, call: &Call) -> Eval {
    let index = if call.arg(0).is_truthy() { 1 } else { 2 };
    let branch = call.block(interp, index)?;
    interp.do_block(branch)
}

fn native_unless(interp: &mut Interpreter, call: &Call) -> Eval {
    if call.arg(0).is_truthy() {
        Ok(Value::None)
    } else {
        let branch = call.block(interp, 1)?;
        interp.do_block(branch)
    }
}

/// `case [cond1 [...] cond2 [...]]`: the branch of the first true condition,
/// or of every true condition with `/all`
fn native_case(interp: &mut Interpreter, call: &Call) -> Eval {
    let cases = call.block(interp, 0)?;
    let every = call.refined(1);
    interp.in_feed(cases, |interp, fid| {
        let result = interp.hold(Value::None);
        while !interp.at_end(fid) {
            let condition = interp.eval_step(fid, true)?;
            let branch = match interp.fetch(fid) {
                Some(Value::Block(branch)) => branch,
                Some(other) => return Err(interp.error(ErrorId::InvalidArg, &[other])),
                None => return Err(interp.error(ErrorId::NeedValue, &[condition])),
            };
            if condition.is_truthy() {
                let value = interp.do_block(branch)?;
                interp.set_held(result, value);
                if !every {
                    break;
                }
            }
        }
        Ok(interp.held(result))
    })
}

/// `switch value [a [...] b c [...]]`: values sharing a branch fall through
/// to the next block
fn native_switch(interp: &mut Interpreter, call: &Call) -> Eval {
    let value = call.arg(0);
    let cases = call.block(interp, 1)?;
    let entries = interp.heap.array(cases.series)[cases.index()..].to_vec();
    let matched = entries
        .iter()
        .position(|entry| !matches!(entry, Value::Block(_)) && interp.values_equal(entry, &value, false));
    if let Some(at) = matched {
        let branch = entries[at..].iter().find_map(|entry| match entry {
            Value::Block(r) => Some(*r),
            _ => None,
        });
        return match branch {
            Some(branch) => interp.do_block(branch),
            None => Ok(Value::None),
        };
    }
    if call.refined(2) {
        let fallback = call.block(interp, 3)?;
        return interp.do_block(fallback);
    }
    Ok(Value::None)
}

fn native_all(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    interp.in_feed(block, |interp, fid| {
        let mut last = Value::Logic(true);
        while !interp.at_end(fid) {
            last = interp.eval_step(fid, true)?;
            if !last.is_truthy() {
                return Ok(Value::None);
            }
            interp.stack.frame_mut(fid).out = last;
        }
        Ok(last)
    })
}

fn native_any(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    interp.in_feed(block, |interp, fid| {
        while !interp.at_end(fid) {
            let value = interp.eval_step(fid, true)?;
            if value.is_truthy() && !value.is_unset() {
                return Ok(value);
            }
        }
        Ok(Value::None)
    })
}

fn native_not(_: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(!call.arg(0).is_truthy()))
}

fn native_do(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0) {
        Value::Block(r) => interp.do_block(r),
        Value::Group(r) => interp.do_array(r, FrameKind::Group),
        Value::Text(r) => {
            let source = interp.heap.text_string(r.series, r.index());
            let loaded = interp.load_text(&source)?;
            interp.hold(Value::Block(SeriesRef::head(loaded)));
            interp.do_block(SeriesRef::head(loaded))
        }
        Value::Error(error) => Err(Unwind::Error(error)),
        other => Ok(other),
    }
}

fn native_reduce(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0) {
        Value::Block(r) => Ok(Value::Block(SeriesRef::head(interp.reduce_block(r)?))),
        other => Ok(other),
    }
}

fn native_compose(interp: &mut Interpreter, call: &Call) -> Eval {
    let block = call.block(interp, 0)?;
    let composed = interp.compose_block(block, call.refined(1), call.refined(2))?;
    Ok(Value::Block(SeriesRef::head(composed)))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::constants::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::interpreter::engine::Interpreter;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.eval_molded(source) {
            Ok(text) => text,
            Err(failure) => format!("failed: {}", failure),
        }
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(eval("if 1 < 2 ['yes]"), "yes");
        assert_eq!(eval("if false [1]"), "none");
        assert_eq!(eval("either none [1] [2]"), "2");
        assert_eq!(eval("unless false [3]"), "3");
    }

    #[test]
    fn test_case_and_switch() {
        assert_eq!(eval("x: 5 case [x < 3 ['small] x < 10 ['medium] true ['large]]"), "medium");
        assert_eq!(eval("switch 2 [1 ['one] 2 3 ['two-or-three]]"), "two-or-three");
        assert_eq!(eval("switch/default 9 [1 ['one]] ['other]"), "other");
    }

    #[test]
    fn test_all_and_any() {
        assert_eq!(eval("all [1 2 3]"), "3");
        assert_eq!(eval("all [1 none 3]"), "none");
        assert_eq!(eval("any [none false 7]"), "7");
    }

    #[test]
    fn test_reduce_and_compose() {
        assert_eq!(eval("reduce [1 + 2 'a]"), "[3 a]");
        assert_eq!(eval("compose [a (1 + 1) ([b c])]"), "[a 2 b c]");
        assert_eq!(eval("compose/only [([b c])]"), "[[b c]]");
        assert_eq!(eval("compose/deep [x [(2 * 3)]]"), "[x [6]]");
    }

    #[test]
    fn test_do_text() {
        assert_eq!(eval("do \"1 + 2\""), "3");
    }
}
