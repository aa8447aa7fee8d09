//! Memory model for the interpreter
//!
//! This module provides the core memory abstractions:
//! - [`value`]: the fixed-width tagged cell ([`value::Value`])
//! - [`pool`]: size-class pools with free-lists of retired buffers
//! - [`series`]: series nodes (arrays, strings, binaries, contexts, actions)
//! - [`heap`]: the generation-checked series arena
//! - [`gc`]: the mark-and-sweep collector over the heap
//! - [`stack`]: the frame arena, data stack and guard stack
//!
//! # Lifetimes
//!
//! Nothing in the heap is reference counted. A series lives exactly as long as
//! it is reachable from a registered root, a `fixed` series, or the [`stack`]
//! when a collection runs. Collections run only when explicitly requested,
//! which the evaluator does at the start of an evaluation step; allocation
//! never collects.

pub mod gc;
pub mod heap;
pub mod pool;
pub mod series;
pub mod stack;
pub mod value;
