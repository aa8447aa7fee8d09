//! Frame stack
//!
//! This module provides the evaluator's explicit activation records:
//! - [`Stack`]: the frame arena, the data stack and the guard stack
//! - [`Frame`]: one evaluator activation (a block, group, action body or
//!   the top level)
//! - [`FrameState`]: where an activation is in its step cycle
//!
//! # Root Set
//!
//! Everything reachable from the stack is live: each frame's feed array,
//! output cell, action, varlist and label, every cell on the data stack
//! (arguments being gathered) and every guarded value. The evaluator may
//! recurse natively, but it keeps each live cell in one of these places so
//! the collector never has to walk the native call stack.

use super::gc::{Marker, Roots};
use super::series::SeriesId;
use super::value::{ActionCell, Value};
use crate::interpreter::symbols::SymId;
use thiserror::Error;

/// Index of a frame in the arena
pub type FrameId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Top,
    Block,
    Group,
    Action,
}

/// Per-frame state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Entry,
    Fetched,
    Dispatching,
    Executing,
    Done,
}

/// Array position the frame is evaluating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub array: SeriesId,
    pub index: usize,
}

/// One evaluator activation
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub state: FrameState,
    pub feed: Option<Feed>,
    pub out: Value,
    pub action: Option<ActionCell>,
    pub varlist: Option<SeriesId>,
    pub label: Option<SymId>,
    pub caller: Option<FrameId>,
    /// Data stack height when the frame was pushed
    pub data_height: usize,
    pub guard_height: usize,
}

impl Frame {
    pub fn new(kind: FrameKind, feed: Option<Feed>) -> Self {
        Frame {
            kind,
            state: FrameState::Entry,
            feed,
            out: Value::Unset,
            action: None,
            varlist: None,
            label: None,
            caller: None,
            data_height: 0,
            guard_height: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stack depth limit of {limit} frames exceeded")]
pub struct StackOverflow {
    pub limit: usize,
}

/// The frame arena with its data and guard stacks
#[derive(Debug)]
pub struct Stack {
    frames: Vec<Frame>,
    data: Vec<Value>,
    guards: Vec<Value>,
    limit: usize,
}

impl Stack {
    pub fn new(limit: usize) -> Self {
        Stack {
            frames: Vec::new(),
            data: Vec::new(),
            guards: Vec::new(),
            limit,
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Push a frame, linking it to the current top
    pub fn push_frame(&mut self, mut frame: Frame) -> Result<FrameId, StackOverflow> {
        if self.frames.len() >= self.limit {
            return Err(StackOverflow { limit: self.limit });
        }
        frame.caller = self.top();
        frame.data_height = self.data.len();
        frame.guard_height = self.guards.len();
        self.frames.push(frame);
        let id = self.frames.len() - 1;
        log::trace!("push frame {} ({:?})", id, self.frames[id].kind);
        Ok(id)
    }

    /// Drop frame `id` and everything above it, restoring the data and
    /// guard heights it was pushed with. Returns the frame's output.
    pub fn drop_frame(&mut self, id: FrameId) -> Value {
        debug_assert!(id < self.frames.len(), "dropping a frame that is gone");
        let Some(frame) = self.frames.get(id) else {
            return Value::Unset;
        };
        let (out, data_height, guard_height) = (frame.out, frame.data_height, frame.guard_height);
        self.frames.truncate(id);
        self.data.truncate(data_height);
        self.guards.truncate(guard_height);
        log::trace!("drop frame {}", id);
        out
    }

    pub fn top(&self) -> Option<FrameId> {
        self.frames.len().checked_sub(1)
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id]
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Nearest frame (from the top) running an action
    pub fn nearest_action(&self) -> Option<&Frame> {
        self.frames.iter().rev().find(|f| f.kind == FrameKind::Action)
    }

    // ---- data stack ----

    pub fn push(&mut self, value: Value) {
        self.data.push(value);
    }

    pub fn data_height(&self) -> usize {
        self.data.len()
    }

    pub fn data_from(&self, height: usize) -> &[Value] {
        &self.data[height..]
    }

    pub fn data_at(&self, index: usize) -> Value {
        self.data[index]
    }

    pub fn data_at_mut(&mut self, index: usize) -> &mut Value {
        &mut self.data[index]
    }

    /// Pop everything above `height`
    pub fn take_from(&mut self, height: usize) -> Vec<Value> {
        self.data.split_off(height)
    }

    pub fn truncate_data(&mut self, height: usize) {
        self.data.truncate(height);
    }

    // ---- guards ----

    pub fn push_guard(&mut self, value: Value) -> usize {
        self.guards.push(value);
        self.guards.len() - 1
    }

    pub fn guard_height(&self) -> usize {
        self.guards.len()
    }

    pub fn truncate_guards(&mut self, height: usize) {
        self.guards.truncate(height);
    }
}

impl Roots for Stack {
    fn visit_roots(&self, marker: &mut Marker) {
        for frame in &self.frames {
            if let Some(feed) = frame.feed {
                marker.mark_series(feed.array);
            }
            marker.mark_value(&frame.out);
            if let Some(action) = frame.action {
                marker.mark_value(&Value::Action(action));
            }
            if let Some(varlist) = frame.varlist {
                marker.mark_series(varlist);
            }
        }
        marker.mark_values(&self.data);
        marker.mark_values(&self.guards);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::heap::Heap;
    use crate::memory::value::SeriesRef;

    #[test]
    fn test_depth_limit() {
        let mut stack = Stack::new(2);
        stack.push_frame(Frame::new(FrameKind::Top, None)).unwrap();
        stack.push_frame(Frame::new(FrameKind::Block, None)).unwrap();
        assert_eq!(
            stack.push_frame(Frame::new(FrameKind::Block, None)),
            Err(StackOverflow { limit: 2 })
        );
    }

    #[test]
    fn test_drop_restores_heights() {
        let mut stack = Stack::new(8);
        stack.push(Value::Integer(1));
        let id = stack.push_frame(Frame::new(FrameKind::Action, None)).unwrap();
        assert_eq!(stack.frame(id).caller, None);
        stack.push(Value::Integer(2));
        stack.push_guard(Value::Integer(3));
        let inner = stack.push_frame(Frame::new(FrameKind::Group, None)).unwrap();
        assert_eq!(stack.frame(inner).caller, Some(id));
        stack.frame_mut(id).out = Value::Integer(9);

        assert_eq!(stack.drop_frame(id), Value::Integer(9));
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.data_height(), 1);
        assert_eq!(stack.guard_height(), 0);
    }

    #[test]
    fn test_frames_are_roots() {
        let mut heap = Heap::default();
        let mut stack = Stack::new(8);
        let body = heap.alloc_array(&[]);
        let out = heap.alloc_text("out");
        let arg = heap.alloc_text("arg");
        let guarded = heap.alloc_text("guarded");
        heap.alloc_text("garbage");

        let id = stack
            .push_frame(Frame::new(FrameKind::Block, Some(Feed { array: body, index: 0 })))
            .unwrap();
        stack.frame_mut(id).out = Value::Text(SeriesRef::head(out));
        stack.push(Value::Text(SeriesRef::head(arg)));
        stack.push_guard(Value::Text(SeriesRef::head(guarded)));

        let report = heap.collect(&stack);
        assert_eq!(report.freed, 1);
        assert!(heap.is_live(body) && heap.is_live(out) && heap.is_live(arg) && heap.is_live(guarded));

        stack.drop_frame(id);
        heap.collect(&stack);
        assert_eq!(heap.live_count(), 0);
    }
}
