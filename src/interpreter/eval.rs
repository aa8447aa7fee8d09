//! The evaluator
//!
//! Evaluation walks a frame's feed one expression at a time. Each step:
//! 1. passes a safe point (cancellation check, collection if due)
//! 2. fetches the next element and evaluates it by kind
//! 3. peeks for an infix action and, while one follows, feeds it the value
//!    just produced as its left argument
//!
//! The right argument of an infix action is evaluated without the lookahead
//! of step 3, which makes infix strictly left-to-right: `1 + 2 * 3` is 9.
//!
//! Action calls push an `Action` frame, gather arguments onto the data stack
//! (where the collector can see them), then either run the native or bind a
//! fresh copy of the body to a new varlist and evaluate it.

use super::constants::{STACK_GROW_SIZE, STACK_RED_ZONE};
use super::context::{ContextData, ContextKind};
use super::engine::Interpreter;
use super::errors::ErrorId;
use super::natives::Call;
use super::symbols::SymId;
use super::unwind::{Eval, Unwind};
use crate::memory::series::{ActionBody, Param, ParamClass, SeriesId};
use crate::memory::stack::{Feed, Frame, FrameId, FrameKind, FrameState};
use crate::memory::value::{ActionCell, Binding, SeriesRef, Value, WordCell};
use std::rc::Rc;

/// How a path is being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathMode {
    /// `a/b`: invoke an action found at the end
    Eval,
    /// `:a/b`: fetch only
    Get,
}

impl Interpreter {
    /// Evaluate an array in a new frame, returning its last value
    pub fn do_array(&mut self, array: SeriesRef, kind: FrameKind) -> Eval {
        let fid = self.push_frame(Frame::new(
            kind,
            Some(Feed {
                array: array.series,
                index: array.index(),
            }),
        ))?;
        let result = self.run_frame(fid);
        self.stack.drop_frame(fid);
        result
    }

    /// Evaluate a block value's contents
    pub fn do_block(&mut self, block: SeriesRef) -> Eval {
        self.do_array(block, FrameKind::Block)
    }

    /// Run `f` against a block frame positioned at `block`, for natives
    /// that step through a block one expression at a time
    pub(crate) fn in_feed<T>(
        &mut self,
        block: SeriesRef,
        f: impl FnOnce(&mut Self, FrameId) -> Eval<T>,
    ) -> Eval<T> {
        let fid = self.push_frame(Frame::new(
            FrameKind::Block,
            Some(Feed {
                array: block.series,
                index: block.index(),
            }),
        ))?;
        let result = f(self, fid);
        self.stack.drop_frame(fid);
        result
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) -> Eval<FrameId> {
        match self.stack.push_frame(frame) {
            Ok(fid) => Ok(fid),
            Err(overflow) => {
                log::debug!("{}", overflow);
                Err(self.error(ErrorId::StackOverflow, &[]))
            }
        }
    }

    /// Evaluate every remaining expression of a frame
    pub(crate) fn run_frame(&mut self, fid: FrameId) -> Eval {
        self.stack.frame_mut(fid).out = Value::Unset;
        while !self.at_end(fid) {
            let value = self.eval_step(fid, true)?;
            self.stack.frame_mut(fid).out = value;
        }
        self.stack.frame_mut(fid).state = FrameState::Done;
        Ok(self.stack.frame(fid).out)
    }

    pub(crate) fn at_end(&self, fid: FrameId) -> bool {
        match self.stack.frame(fid).feed {
            Some(feed) => feed.index >= self.heap.len(feed.array),
            None => true,
        }
    }

    /// Next element of a frame's feed without consuming it
    pub(crate) fn peek(&self, fid: FrameId) -> Option<Value> {
        let feed = self.stack.frame(fid).feed?;
        self.heap.array(feed.array).get(feed.index).copied()
    }

    /// Consume the next element of a frame's feed
    pub(crate) fn fetch(&mut self, fid: FrameId) -> Option<Value> {
        let value = self.peek(fid)?;
        let frame = self.stack.frame_mut(fid);
        if let Some(feed) = frame.feed.as_mut() {
            feed.index += 1;
        }
        frame.state = FrameState::Fetched;
        Some(value)
    }

    /// Evaluate one expression from the frame's feed. Every nested
    /// evaluation passes through here, so the host stack is grown here and
    /// only the frame limit bounds recursion.
    pub(crate) fn eval_step(&mut self, fid: FrameId, lookahead: bool) -> Eval {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_step_inner(fid, lookahead))
    }

    fn eval_step_inner(&mut self, fid: FrameId, lookahead: bool) -> Eval {
        self.safe_point()?;
        let Some(value) = self.fetch(fid) else {
            return Ok(Value::Unset);
        };
        let mut out = self.eval_value(fid, value)?;
        if lookahead {
            while let Some((cell, label)) = self.peek_infix(fid) {
                self.fetch(fid);
                out = self.invoke(cell, Some(label), fid, Some(out), &[])?;
            }
        }
        Ok(out)
    }

    /// The next element, when it is a word referring to an infix action
    fn peek_infix(&self, fid: FrameId) -> Option<(ActionCell, SymId)> {
        let Value::Word(word) = self.peek(fid)? else {
            return None;
        };
        let Binding::Bound { context, index } = word.binding else {
            return None;
        };
        match self.heap.context(context).vars.get(index as usize) {
            Some(Value::Action(cell)) if self.heap.action(cell.action).infix => Some((*cell, word.sym)),
            _ => None,
        }
    }

    fn eval_value(&mut self, fid: FrameId, value: Value) -> Eval {
        match value {
            Value::Word(word) => match self.get_var(word)? {
                Value::Action(cell) => {
                    if self.heap.action(cell.action).infix {
                        let first = self.heap.action(cell.action).params.first().map(|p| p.sym);
                        let param = first.map(|s| Value::Word(WordCell::unbound(s))).unwrap_or(Value::None);
                        return Err(self.error(ErrorId::NoArg, &[Value::Word(word), param]));
                    }
                    self.invoke(cell, Some(word.sym), fid, None, &[])
                }
                Value::Unset => Err(self.error(ErrorId::NoValue, &[Value::Word(word)])),
                other => Ok(other),
            },
            Value::SetWord(word) => {
                if self.at_end(fid) {
                    return Err(self.error(ErrorId::NeedValue, &[value]));
                }
                let result = self.eval_step(fid, true)?;
                if result.is_unset() {
                    return Err(self.error(ErrorId::NeedValue, &[value]));
                }
                self.set_var(word, result)?;
                self.name_action(result, word.sym);
                Ok(result)
            }
            Value::GetWord(word) => self.get_var(word),
            Value::LitWord(word) => Ok(Value::Word(word)),
            Value::Group(r) => self.do_array(r, FrameKind::Group),
            Value::Path(r) => self.eval_path(fid, r, PathMode::Eval),
            Value::GetPath(r) => self.eval_path(fid, r, PathMode::Get),
            Value::SetPath(r) => self.set_path(fid, r, value),
            Value::Action(cell) => {
                let label = self.heap.action(cell.action).name;
                self.invoke(cell, label, fid, None, &[])
            }
            other => Ok(other),
        }
    }

    // ---- paths ----

    fn path_elements(&self, r: SeriesRef) -> Vec<Value> {
        let values = self.heap.array(r.series);
        values[r.index().min(values.len())..].to_vec()
    }

    /// Value of a path element used as a picker
    fn path_picker(&mut self, element: Value) -> Eval {
        match element {
            Value::GetWord(word) => self.get_var(word),
            Value::Group(r) => self.do_array(r, FrameKind::Group),
            Value::Word(word) => Ok(Value::Word(word)),
            other => Ok(other),
        }
    }

    fn eval_path(&mut self, fid: FrameId, r: SeriesRef, mode: PathMode) -> Eval {
        let elements = self.path_elements(r);
        let Some((&head, rest)) = elements.split_first() else {
            return Ok(Value::None);
        };
        let head_word = match head {
            Value::Word(w) | Value::GetWord(w) => w,
            other => return Err(self.error(ErrorId::InvalidPath, &[Value::Path(r), other])),
        };
        let guard_height = self.stack.guard_height();
        let result = self.walk_path(fid, r, head_word, rest, mode);
        self.stack.truncate_guards(guard_height);
        result
    }

    fn walk_path(
        &mut self,
        fid: FrameId,
        r: SeriesRef,
        head: WordCell,
        rest: &[Value],
        mode: PathMode,
    ) -> Eval {
        let mut current = self.get_var(head)?;
        let mut label = head.sym;
        for (i, &element) in rest.iter().enumerate() {
            if let Value::Action(cell) = current {
                if mode == PathMode::Eval {
                    let refinements = self.refinement_names(r, &rest[i..])?;
                    return self.invoke(cell, Some(label), fid, None, &refinements);
                }
            }
            self.stack.push_guard(current);
            let picker = self.path_picker(element)?;
            if let Some(s) = picker.symbol() {
                label = s;
            }
            current = self.pick_value(current, picker)?;
        }
        match current {
            Value::Action(cell) if mode == PathMode::Eval => self.invoke(cell, Some(label), fid, None, &[]),
            Value::Unset if mode == PathMode::Eval => {
                Err(self.error(ErrorId::NoValue, &[Value::Path(r)]))
            }
            other => Ok(other),
        }
    }

    fn refinement_names(&mut self, r: SeriesRef, elements: &[Value]) -> Eval<Vec<SymId>> {
        elements
            .iter()
            .map(|element| match element {
                Value::Word(w) => Ok(w.sym),
                other => Err(self.error(ErrorId::BadRefine, &[Value::Path(r), *other])),
            })
            .collect()
    }

    fn set_path(&mut self, fid: FrameId, r: SeriesRef, path: Value) -> Eval {
        let elements = self.path_elements(r);
        let (head, rest) = match elements.split_first() {
            Some((Value::Word(w), rest)) if !rest.is_empty() => (*w, rest),
            _ => return Err(self.error(ErrorId::InvalidPath, &[path, Value::None])),
        };
        if self.at_end(fid) {
            return Err(self.error(ErrorId::NeedValue, &[path]));
        }
        let value = self.eval_step(fid, true)?;
        if value.is_unset() {
            return Err(self.error(ErrorId::NeedValue, &[path]));
        }
        let guard_height = self.stack.guard_height();
        self.stack.push_guard(value);
        let result = self.poke_path(head, rest, value);
        self.stack.truncate_guards(guard_height);
        result.map(|()| value)
    }

    fn poke_path(&mut self, head: WordCell, rest: &[Value], value: Value) -> Eval<()> {
        let mut container = self.get_var(head)?;
        let Some((&last, middle)) = rest.split_last() else {
            return Ok(());
        };
        for &element in middle {
            self.stack.push_guard(container);
            let picker = self.path_picker(element)?;
            container = self.pick_value(container, picker)?;
        }
        self.stack.push_guard(container);
        let picker = self.path_picker(last)?;
        self.poke_value(container, picker, value)
    }

    // ---- invocation ----

    /// Call an action. Arguments come from the feed of frame `caller`;
    /// `left` supplies the first argument of an infix call.
    pub(crate) fn invoke(
        &mut self,
        cell: ActionCell,
        label: Option<SymId>,
        caller: FrameId,
        left: Option<Value>,
        refinements: &[SymId],
    ) -> Eval {
        let action = self.heap.action(cell.action);
        let params = Rc::clone(&action.params);
        let body = action.body;
        let infix = action.infix;

        let mut frame = Frame::new(FrameKind::Action, None);
        frame.action = Some(cell);
        frame.label = label;
        frame.state = FrameState::Dispatching;
        let fid = self.push_frame(frame)?;

        let result = self.call_action(fid, cell, body, &params, infix, label, caller, left, refinements);
        self.stack.drop_frame(fid);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn call_action(
        &mut self,
        fid: FrameId,
        cell: ActionCell,
        body: ActionBody,
        params: &[Param],
        infix: bool,
        label: Option<SymId>,
        caller: FrameId,
        left: Option<Value>,
        refinements: &[SymId],
    ) -> Eval {
        let active = self.active_refinements(params, label, refinements)?;
        let height = self.stack.data_height();
        self.gather_args(params, &active, !infix, label, caller, left)?;
        self.stack.frame_mut(fid).state = FrameState::Executing;
        let args = self.stack.data_from(height).to_vec();

        match body {
            ActionBody::Native { f, kind } => {
                let call = Call {
                    args,
                    label,
                    binding: cell.binding,
                    kind,
                    frame: fid,
                };
                f(self, &call)
            }
            ActionBody::User { body } => self.run_user_action(fid, body, params, args, label),
            ActionBody::Routine(index) => self.call_routine(index, &args),
        }
    }

    /// Which parameter slots hold refinements that were requested
    fn active_refinements(
        &mut self,
        params: &[Param],
        label: Option<SymId>,
        requested: &[SymId],
    ) -> Eval<Vec<bool>> {
        let mut active = vec![false; params.len()];
        for &name in requested {
            let canon = self.symbols.canon(name);
            let slot = params
                .iter()
                .position(|p| p.class == ParamClass::Refinement && self.symbols.canon(p.sym) == canon);
            match slot {
                Some(i) => active[i] = true,
                None => {
                    let shown = label.map(|l| Value::Word(WordCell::unbound(l))).unwrap_or(Value::None);
                    return Err(self.error(ErrorId::BadRefine, &[Value::Refinement(name), shown]));
                }
            }
        }
        Ok(active)
    }

    /// Push one cell per parameter onto the data stack. Infix calls pass
    /// `lookahead = false` so their right argument stops after one value.
    fn gather_args(
        &mut self,
        params: &[Param],
        active: &[bool],
        lookahead: bool,
        label: Option<SymId>,
        caller: FrameId,
        mut left: Option<Value>,
    ) -> Eval<()> {
        for (i, param) in params.iter().enumerate() {
            if let Some(owner) = param.refinement {
                if !active[owner] {
                    self.stack.push(Value::None);
                    continue;
                }
            }
            let arg = match param.class {
                ParamClass::Refinement if active[i] => Value::Logic(true),
                ParamClass::Refinement | ParamClass::Local | ParamClass::Return => Value::None,
                ParamClass::Normal => match left.take() {
                    Some(value) => value,
                    None => {
                        if self.at_end(caller) {
                            return Err(self.missing_arg(label, param));
                        }
                        self.eval_step(caller, lookahead)?
                    }
                },
                ParamClass::Quoted { soft } => match self.fetch(caller) {
                    None => return Err(self.missing_arg(label, param)),
                    Some(value @ (Value::Group(_) | Value::GetWord(_) | Value::GetPath(_))) if soft => {
                        self.eval_value(caller, value)?
                    }
                    Some(value) => value,
                },
            };
            if param.takes_arg() && !param.types.contains(arg.kind()) {
                let shown = label.map(|l| Value::Word(WordCell::unbound(l))).unwrap_or(Value::None);
                let kind = Value::Datatype(arg.kind());
                let name = Value::Word(WordCell::unbound(param.sym));
                return Err(self.error(ErrorId::ExpectArg, &[shown, kind, name]));
            }
            self.stack.push(arg);
        }
        Ok(())
    }

    fn missing_arg(&mut self, label: Option<SymId>, param: &Param) -> Unwind {
        let shown = label.map(|l| Value::Word(WordCell::unbound(l))).unwrap_or(Value::None);
        self.error(ErrorId::NoArg, &[shown, Value::Word(WordCell::unbound(param.sym))])
    }

    /// Run a user action: bind a copy of the body to a fresh varlist
    fn run_user_action(
        &mut self,
        fid: FrameId,
        body: SeriesId,
        params: &[Param],
        args: Vec<Value>,
        label: Option<SymId>,
    ) -> Eval {
        let keys: Vec<(SymId, SymId)> = params.iter().map(|p| (p.sym, self.symbols.canon(p.sym))).collect();
        let mut context = ContextData::with_keys(ContextKind::Frame, &keys);
        context.vars = args;
        let varlist = self.heap.alloc_context(context);
        for (i, param) in params.iter().enumerate() {
            if param.class == ParamClass::Return {
                let definitional = Value::Action(ActionCell {
                    action: self.return_native,
                    binding: Some(varlist),
                });
                self.heap
                    .context_set(varlist, i, definitional)
                    .map_err(|e| self.heap_error(e))?;
            }
        }
        self.stack.frame_mut(fid).varlist = Some(varlist);

        let copy = self.copy_array_deep(body, 0);
        self.bind_deep(copy, &[varlist]);
        self.stack.frame_mut(fid).feed = Some(Feed { array: copy, index: 0 });
        self.snapshot_call(label);

        match self.run_frame(fid) {
            Err(Unwind::Return { target, value }) if target == varlist => Ok(value),
            other => other,
        }
    }
}
