//! Interpreter core
//!
//! - [`engine`]: the [`engine::Interpreter`] instance and its host API
//! - [`eval`]: frames, the step evaluator and action dispatch
//! - [`symbols`], [`context`], [`binding`]: words and what they refer to
//! - [`natives`], [`actions`], [`ops`], [`jumps`], [`loops`]: the lib words
//! - [`type_system`], [`mold`]: per-datatype behaviors and rendering
//! - [`unwind`], [`errors`]: non-local exits and error values
//!
//! # Execution Model
//!
//! A block is evaluated one expression at a time against a frame. Infix
//! operators apply strictly left to right, with no precedence. `return`,
//! `break`, `continue`, `throw`, errors and `quit` travel up the host stack
//! as [`unwind::Unwind`] values until a frame that handles them is reached.

pub mod actions;
pub mod binding;
pub mod config;
pub mod constants;
pub mod context;
pub mod engine;
pub mod errors;
pub mod eval;
pub mod jumps;
pub mod loops;
pub mod mold;
pub mod natives;
pub mod ops;
pub mod symbols;
pub mod type_system;
pub mod unwind;
