//! Foreign-function bridge
//!
//! A routine is a host function with a fixed [`ForeignSignature`]. Calling
//! one marshals the argument cells into a little-endian [`CallBuffer`]
//! (pointer arguments travel as indexes into its blob list), runs the host
//! function, then unmarshals the returned bytes into a cell.
//!
//! Call buffer layout per argument:
//! - `I32`: 4 bytes
//! - `I64`, `F64`: 8 bytes
//! - `Pointer(n)`: 8-byte blob index; the blob holds exactly `n` bytes

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ErrorId, Failure};
use crate::interpreter::type_system::TypeSet;
use crate::interpreter::unwind::Eval;
use crate::memory::heap::Heap;
use crate::memory::series::{ActionBody, ActionData, Param, ParamClass, SeriesId};
use crate::memory::value::{ActionCell, Kind, SeriesRef, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignType {
    I32,
    I64,
    F64,
    /// Pointer to a buffer of this many bytes, passed as a `binary!`
    Pointer(usize),
}

impl ForeignType {
    fn width(self) -> usize {
        match self {
            ForeignType::I32 => 4,
            _ => 8,
        }
    }

    /// Cell types accepted for an argument of this type
    fn accepts(self) -> TypeSet {
        match self {
            ForeignType::I32 | ForeignType::I64 => TypeSet::of(&[Kind::Integer]),
            ForeignType::F64 => TypeSet::of(&[Kind::Integer, Kind::Decimal]),
            ForeignType::Pointer(_) => TypeSet::of(&[Kind::Binary]),
        }
    }
}

impl fmt::Display for ForeignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignType::I32 => write!(f, "i32"),
            ForeignType::I64 => write!(f, "i64"),
            ForeignType::F64 => write!(f, "f64"),
            ForeignType::Pointer(n) => write!(f, "pointer({})", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignSignature {
    pub args: Vec<ForeignType>,
    pub ret: Option<ForeignType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },
    #[error("argument {index}: cannot pass {found} as {expected}")]
    Mismatch {
        index: usize,
        expected: ForeignType,
        found: &'static str,
    },
    #[error("argument {index}: {value} does not fit {expected}")]
    OutOfRange {
        index: usize,
        expected: ForeignType,
        value: i64,
    },
    #[error("argument {index}: buffer of {found} bytes where {expected} bytes are required")]
    BufferSize {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("return buffer holds {found} bytes, {expected} needed")]
    ShortReturn { expected: usize, found: usize },
}

/// Marshalled arguments of one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallBuffer {
    pub bytes: Vec<u8>,
    pub blobs: Vec<Vec<u8>>,
}

impl CallBuffer {
    /// Sequential reader over the arguments, for routine implementations
    pub fn reader(&self) -> ArgReader<'_> {
        ArgReader { buffer: self, offset: 0 }
    }
}

pub struct ArgReader<'a> {
    buffer: &'a CallBuffer,
    offset: usize,
}

impl ArgReader<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.buffer.bytes.get(self.offset..self.offset + N)?;
        self.offset += N;
        bytes.try_into().ok()
    }

    pub fn i32(&mut self) -> Option<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    pub fn i64(&mut self) -> Option<i64> {
        self.take::<8>().map(i64::from_le_bytes)
    }

    pub fn f64(&mut self) -> Option<f64> {
        self.take::<8>().map(f64::from_le_bytes)
    }

    pub fn pointer(&mut self) -> Option<&[u8]> {
        let index = self.take::<8>().map(u64::from_le_bytes)?;
        self.buffer.blobs.get(index as usize).map(Vec::as_slice)
    }
}

/// Pack argument cells according to `signature`
pub fn marshal(heap: &Heap, signature: &ForeignSignature, args: &[Value]) -> Result<CallBuffer, MarshalError> {
    if args.len() != signature.args.len() {
        return Err(MarshalError::Arity {
            expected: signature.args.len(),
            found: args.len(),
        });
    }
    let mut buffer = CallBuffer::default();
    for (index, (&ty, arg)) in signature.args.iter().zip(args).enumerate() {
        let mismatch = || MarshalError::Mismatch {
            index,
            expected: ty,
            found: kind_label(arg.kind()),
        };
        match (ty, *arg) {
            (ForeignType::I32, Value::Integer(n)) => {
                let n = i32::try_from(n).map_err(|_| MarshalError::OutOfRange {
                    index,
                    expected: ty,
                    value: n,
                })?;
                buffer.bytes.extend_from_slice(&n.to_le_bytes());
            }
            (ForeignType::I64, Value::Integer(n)) => buffer.bytes.extend_from_slice(&n.to_le_bytes()),
            (ForeignType::F64, Value::Integer(n)) => buffer.bytes.extend_from_slice(&(n as f64).to_le_bytes()),
            (ForeignType::F64, Value::Decimal(d)) => buffer.bytes.extend_from_slice(&d.to_le_bytes()),
            (ForeignType::Pointer(size), Value::Binary(r)) => {
                let bytes = &heap.bytes(r.series)[r.index().min(heap.len(r.series))..];
                if bytes.len() != size {
                    return Err(MarshalError::BufferSize {
                        index,
                        expected: size,
                        found: bytes.len(),
                    });
                }
                buffer.bytes.extend_from_slice(&(buffer.blobs.len() as u64).to_le_bytes());
                buffer.blobs.push(bytes.to_vec());
            }
            _ => return Err(mismatch()),
        }
    }
    Ok(buffer)
}

/// Read a returned buffer as a cell; no return type gives `none`
pub fn unmarshal(heap: &mut Heap, ret: Option<ForeignType>, bytes: &[u8]) -> Result<Value, MarshalError> {
    let Some(ty) = ret else {
        return Ok(Value::None);
    };
    let needed = match ty {
        ForeignType::Pointer(size) => size,
        other => other.width(),
    };
    if bytes.len() < needed {
        return Err(MarshalError::ShortReturn {
            expected: needed,
            found: bytes.len(),
        });
    }
    let mut word = [0u8; 8];
    word[..ty.width().min(needed)].copy_from_slice(&bytes[..ty.width().min(needed)]);
    Ok(match ty {
        ForeignType::I32 => Value::Integer(i32::from_le_bytes([word[0], word[1], word[2], word[3]]) as i64),
        ForeignType::I64 => Value::Integer(i64::from_le_bytes(word)),
        ForeignType::F64 => Value::Decimal(f64::from_le_bytes(word)),
        ForeignType::Pointer(size) => Value::Binary(SeriesRef::head(heap.alloc_binary(&bytes[..size]))),
    })
}

fn kind_label(kind: Kind) -> &'static str {
    match kind {
        Kind::Integer => "integer",
        Kind::Decimal => "decimal",
        Kind::Binary => "binary",
        Kind::Text => "string",
        Kind::None => "none",
        _ => "value",
    }
}

pub type RoutineFn = Box<dyn Fn(&CallBuffer) -> Vec<u8>>;

/// A registered foreign routine
pub struct Routine {
    pub name: String,
    pub signature: ForeignSignature,
    pub target: RoutineFn,
}

impl Interpreter {
    /// Register a host function as a lib action taking one argument per
    /// signature entry
    pub fn register_routine(
        &mut self,
        name: &str,
        signature: ForeignSignature,
        target: RoutineFn,
    ) -> Result<SeriesId, Failure> {
        let params: Vec<Param> = signature
            .args
            .iter()
            .enumerate()
            .map(|(i, ty)| Param {
                sym: self.symbols.intern(&format!("arg{}", i + 1)),
                class: ParamClass::Normal,
                types: ty.accepts(),
                refinement: None,
            })
            .collect();
        let sym = self.symbols.intern(name);
        let index = self.routines.len();
        self.routines.push(Routine {
            name: name.to_string(),
            signature,
            target,
        });
        let action = self.heap.alloc_action(ActionData {
            name: Some(sym),
            params: params.into(),
            body: ActionBody::Routine(index),
            infix: false,
            spec: None,
        });
        self.heap.fix(action);
        let lib = self.lib;
        let cell = Value::Action(ActionCell { action, binding: None });
        self.context_put(lib, sym, cell)
            .map_err(|unwind| self.failure(unwind))?;
        Ok(action)
    }

    pub(crate) fn call_routine(&mut self, index: usize, args: &[Value]) -> Eval {
        let Some(routine) = self.routines.get(index) else {
            return Err(self.error(ErrorId::NoFunction, &[]));
        };
        let result = marshal(&self.heap, &routine.signature, args).map(|buffer| (routine.target)(&buffer));
        let ret = routine.signature.ret;
        let name = routine.name.clone();
        let returned = match result {
            Ok(bytes) => unmarshal(&mut self.heap, ret, &bytes),
            Err(err) => Err(err),
        };
        returned.map_err(|err| {
            log::debug!("marshalling for {} failed: {}", name, err);
            self.error_text(ErrorId::BadMarshal, &[&name, &err.to_string()])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshal_layout() {
        let mut heap = Heap::default();
        let blob = heap.alloc_binary(&[1, 2, 3]);
        let signature = ForeignSignature {
            args: vec![ForeignType::I32, ForeignType::F64, ForeignType::Pointer(3)],
            ret: None,
        };
        let args = [Value::Integer(-2), Value::Integer(1), Value::Binary(SeriesRef::head(blob))];
        let buffer = marshal(&heap, &signature, &args).unwrap();
        assert_eq!(buffer.bytes.len(), 4 + 8 + 8);
        assert_eq!(&buffer.bytes[..4], &(-2i32).to_le_bytes());
        let mut reader = buffer.reader();
        assert_eq!(reader.i32(), Some(-2));
        assert_eq!(reader.f64(), Some(1.0));
        assert_eq!(reader.pointer(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_marshal_errors() {
        let heap = Heap::default();
        let signature = ForeignSignature {
            args: vec![ForeignType::I32],
            ret: None,
        };
        assert!(matches!(
            marshal(&heap, &signature, &[]),
            Err(MarshalError::Arity { expected: 1, found: 0 })
        ));
        assert!(matches!(
            marshal(&heap, &signature, &[Value::Integer(1 << 40)]),
            Err(MarshalError::OutOfRange { index: 0, .. })
        ));
        assert!(matches!(
            marshal(&heap, &signature, &[Value::Decimal(1.5)]),
            Err(MarshalError::Mismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_unmarshal() {
        let mut heap = Heap::default();
        assert_eq!(unmarshal(&mut heap, Some(ForeignType::I64), &7i64.to_le_bytes()), Ok(Value::Integer(7)));
        assert_eq!(unmarshal(&mut heap, None, &[]), Ok(Value::None));
        assert!(matches!(
            unmarshal(&mut heap, Some(ForeignType::I64), &[0, 0]),
            Err(MarshalError::ShortReturn { expected: 8, found: 2 })
        ));
    }
}
