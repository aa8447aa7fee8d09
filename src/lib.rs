//! # Introduction
//!
//! Rebound is an interpreter for a small REBOL-family language. Code is data:
//! source text loads into blocks of cells, and evaluation walks those blocks
//! directly.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Scanner → Blocks → Binding → Evaluator → Values
//! ```
//!
//! 1. [`parser`] scans source text into nested arrays in the heap.
//! 2. [`interpreter`] binds words to contexts and evaluates blocks with a
//!    frame stack; non-local exits unwind as [`interpreter::unwind::Unwind`].
//! 3. [`memory`] holds cells, series pools and the mark-and-sweep collector.
//! 4. [`interfaces`] is the host surface: codecs, devices behind ports,
//!    extensions and the foreign-function bridge.
//! 5. [`snapshot`] records a step history for the inspector, and [`ui`]
//!    renders it with ratatui; neither is part of the stable library API.
//!
//! ```no_run
//! use rebound::interpreter::engine::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! let value = interp.eval_molded("add-one: func [n] [n + 1] add-one 41");
//! assert_eq!(value.ok().as_deref(), Some("42"));
//! ```

pub mod interfaces;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod snapshot;
pub mod ui;
