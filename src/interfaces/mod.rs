//! Host interfaces
//!
//! The interpreter talks to the outside world through four seams, each a
//! trait plus a registry owned by the [`Interpreter`](crate::interpreter::engine::Interpreter):
//! - [`codec`]: byte formats behind `encode` / `decode`
//! - [`device`]: byte streams behind `port!` values (`open`, `read`, ...)
//! - [`extension`]: modules that add natives, codecs, devices and type
//!   behaviors at runtime
//! - [`ffi`]: foreign routines called through a marshalled call buffer

pub mod codec;
pub mod device;
pub mod extension;
pub mod ffi;
