//! Collector, codecs and ports: `recycle`, `stats`, `encode`, `decode`,
//! `open`, `read`, `write`, `close`

use crate::interfaces::codec::{CodecError, Decoded};
use crate::interfaces::device::{Device, DeviceError, DeviceStatus};
use crate::interpreter::constants::{DEVICE_POLL_LIMIT, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::interpreter::context::ContextKind;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ErrorId;
use crate::interpreter::natives::{Call, NativeTable};
use crate::interpreter::unwind::Eval;
use crate::memory::series::{PortData, SeriesId};
use crate::memory::value::{SeriesRef, Value};
use rustc_hash::FxHashSet;

pub const NATIVES: NativeTable = &[
    ("recycle", "", native_recycle),
    ("stats", "", native_stats),
    ("encode", "codec [word! lit-word!] value [any-value!]", native_encode),
    ("decode", "codec [word! lit-word!] data [binary!]", native_decode),
    ("open", "spec [port! word! lit-word! string! file!]", native_open),
    ("read", "source [port! word! lit-word! string! file!]", native_read),
    ("write", "target [port! word! lit-word! string! file!] data [any-value!]", native_write),
    ("close", "port [port!]", native_close),
];

fn native_recycle(interp: &mut Interpreter, _call: &Call) -> Eval {
    let report = interp.recycle();
    log::debug!("recycle freed {} series in {:?}", report.freed, report.elapsed);
    Ok(Value::Integer(report.live as i64))
}

fn native_stats(interp: &mut Interpreter, _call: &Call) -> Eval {
    let stats = interp.heap.stats();
    let fields = [
        ("live", stats.live),
        ("bytes", stats.bytes),
        ("collections", stats.collections),
        ("freed", stats.total_freed),
    ];
    let keys: Vec<_> = fields.iter().map(|(name, _)| interp.symbols.intern(name)).collect();
    let object = interp.make_context(ContextKind::Object, &keys);
    for (&sym, (_, n)) in keys.iter().zip(fields) {
        interp.context_put(object, sym, Value::Integer(n as i64))?;
    }
    Ok(Value::Object(object))
}

// ---- codecs ----

fn codec_name(interp: &Interpreter, value: Value) -> String {
    value
        .symbol()
        .map(|sym| interp.symbols.name(sym).to_string())
        .unwrap_or_default()
}

fn codec_failure(interp: &mut Interpreter, codec: &str, err: CodecError) -> Eval {
    Err(interp.error_text(ErrorId::CodecFailure, &[codec, &err.to_string()]))
}

fn native_encode(interp: &mut Interpreter, call: &Call) -> Eval {
    let name = codec_name(interp, call.arg(0));
    let decoded = match interp.to_decoded(call.arg(1)) {
        Ok(decoded) => decoded,
        Err(err) => return codec_failure(interp, &name, err),
    };
    let encoded = match interp.codecs.get(&name) {
        Some(codec) => codec.encode(&decoded),
        None => return Err(interp.error_text(ErrorId::NoCodec, &[&name])),
    };
    match encoded {
        Ok(bytes) => Ok(Value::Binary(SeriesRef::head(interp.heap.alloc_binary(&bytes)))),
        Err(err) => codec_failure(interp, &name, err),
    }
}

fn native_decode(interp: &mut Interpreter, call: &Call) -> Eval {
    let name = codec_name(interp, call.arg(0));
    let Value::Binary(data) = call.arg(1) else {
        return Err(interp.error(ErrorId::InvalidArg, &[call.arg(1)]));
    };
    let bytes = interp.heap.bytes(data.series).get(data.index()..).unwrap_or_default();
    let decoded = match interp.codecs.decode(&name, bytes) {
        Some(decoded) => decoded,
        None => return Err(interp.error_text(ErrorId::NoCodec, &[&name])),
    };
    match decoded {
        Ok(decoded) => Ok(interp.from_decoded(&decoded)),
        Err(err) => codec_failure(interp, &name, err),
    }
}

impl Interpreter {
    pub(crate) fn to_decoded(&self, value: Value) -> Result<Decoded, CodecError> {
        self.to_decoded_within(value, &mut FxHashSet::default())
    }

    fn to_decoded_within(&self, value: Value, active: &mut FxHashSet<SeriesId>) -> Result<Decoded, CodecError> {
        match value {
            Value::Integer(n) => Ok(Decoded::Integer(n)),
            Value::Decimal(d) => Ok(Decoded::Decimal(d)),
            Value::Text(r) | Value::File(r) => Ok(Decoded::Text(self.heap.text_string(r.series, r.index()))),
            Value::Binary(r) => Ok(Decoded::Binary(
                self.heap.bytes(r.series).get(r.index()..).unwrap_or_default().to_vec(),
            )),
            Value::Block(r) => {
                if !active.insert(r.series) {
                    return Err(CodecError::Unsupported("cyclic block"));
                }
                let items = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                    self.heap
                        .array(r.series)
                        .get(r.index()..)
                        .unwrap_or_default()
                        .iter()
                        .map(|&item| self.to_decoded_within(item, active))
                        .collect::<Result<_, _>>()
                });
                active.remove(&r.series);
                items.map(Decoded::Block)
            }
            other => Err(CodecError::Unsupported(self.kind_name(other.kind()))),
        }
    }

    pub(crate) fn from_decoded(&mut self, decoded: &Decoded) -> Value {
        match decoded {
            Decoded::Integer(n) => Value::Integer(*n),
            Decoded::Decimal(d) => Value::Decimal(*d),
            Decoded::Text(text) => Value::Text(SeriesRef::head(self.heap.alloc_text(text))),
            Decoded::Binary(bytes) => Value::Binary(SeriesRef::head(self.heap.alloc_binary(bytes))),
            Decoded::Block(items) => {
                let block = self.heap.alloc_array(&[]);
                let slot = self.hold(Value::Block(SeriesRef::head(block)));
                for item in items {
                    let value = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.from_decoded(item));
                    if let Err(err) = self.heap.push(block, value) {
                        log::warn!("dropping decoded item: {}", err);
                    }
                }
                self.held(slot)
            }
        }
    }
}

// ---- ports ----

impl Interpreter {
    /// `scheme://target` text, a bare scheme word, or an existing port
    pub(crate) fn make_port(&mut self, spec: Value) -> Eval {
        if let Value::Port(_) = spec {
            return Ok(spec);
        }
        let (scheme, target) = match spec.symbol() {
            Some(sym) => (self.symbols.name(sym).to_string(), String::new()),
            None => {
                let text = self.form(&spec);
                match text.split_once("://") {
                    Some((scheme, target)) => (scheme.to_string(), target.to_string()),
                    None => return Err(self.error(ErrorId::NoScheme, &[spec])),
                }
            }
        };
        if !self.devices.contains(&scheme) {
            return Err(self.error_text(ErrorId::NoScheme, &[&scheme]));
        }
        let scheme = self.symbols.intern(&scheme.to_lowercase());
        let port = self.heap.alloc_port(PortData {
            scheme,
            target,
            handle: None,
        });
        Ok(Value::Port(port))
    }

    fn port_label(&self, port: SeriesId) -> String {
        let data = self.heap.port(port);
        format!("{}://{}", self.symbols.name(data.scheme), data.target)
    }

    /// Run a device operation until it completes, polling for cancellation
    /// and collection between attempts
    fn poll_device<T>(
        &mut self,
        port: SeriesId,
        mut op: impl FnMut(&mut dyn Device) -> Result<DeviceStatus<T>, DeviceError>,
    ) -> Eval<T> {
        let scheme = self.symbols.name(self.heap.port(port).scheme).to_string();
        for _ in 0..DEVICE_POLL_LIMIT {
            let status = match self.devices.get_mut(&scheme) {
                Some(device) => op(device),
                None => return Err(self.error_text(ErrorId::NoScheme, &[&scheme])),
            };
            match status {
                Ok(DeviceStatus::Ready(out)) => return Ok(out),
                Ok(DeviceStatus::Pending) => {
                    self.safe_point()?;
                    std::thread::yield_now();
                }
                Err(err) => {
                    let label = self.port_label(port);
                    return Err(self.error_text(ErrorId::DeviceFailure, &[&label, &err.to_string()]));
                }
            }
        }
        let label = self.port_label(port);
        Err(self.error_text(ErrorId::DeviceFailure, &[&label, "timed out"]))
    }

    fn open_port(&mut self, port: SeriesId) -> Eval<u32> {
        if let Some(handle) = self.heap.port(port).handle {
            return Ok(handle);
        }
        let target = self.heap.port(port).target.clone();
        let handle = self.poll_device(port, |device| device.open(&target))?;
        self.heap.port_mut(port).handle = Some(handle);
        log::debug!("opened {} as handle {}", self.port_label(port), handle);
        Ok(handle)
    }

    fn open_handle(&mut self, port: SeriesId) -> Eval<u32> {
        match self.heap.port(port).handle {
            Some(handle) => Ok(handle),
            None => Err(self.error(ErrorId::NotOpen, &[Value::Port(port)])),
        }
    }

    fn close_port(&mut self, port: SeriesId) -> Eval<()> {
        let handle = self.open_handle(port)?;
        self.poll_device(port, |device| device.close(handle).map(DeviceStatus::Ready))?;
        self.heap.port_mut(port).handle = None;
        Ok(())
    }

    /// Close a port opened for one operation whether or not the operation
    /// succeeded; the operation's own failure wins over a failed close
    fn finish_transient<T>(&mut self, port: SeriesId, transient: bool, result: Eval<T>) -> Eval<T> {
        if !transient {
            return result;
        }
        let closed = self.close_port(port);
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Port from a native argument; anything but a port is opened for the
    /// duration of one operation
    fn port_arg(&mut self, value: Value) -> Eval<(SeriesId, bool)> {
        match value {
            Value::Port(port) => Ok((port, false)),
            other => {
                let Value::Port(port) = self.make_port(other)? else {
                    return Err(self.error(ErrorId::InvalidArg, &[other]));
                };
                self.hold(Value::Port(port));
                self.open_port(port)?;
                Ok((port, true))
            }
        }
    }
}

fn native_open(interp: &mut Interpreter, call: &Call) -> Eval {
    let port = match interp.make_port(call.arg(0))? {
        Value::Port(port) => port,
        other => return Err(interp.error(ErrorId::InvalidArg, &[other])),
    };
    interp.hold(Value::Port(port));
    interp.open_port(port)?;
    Ok(Value::Port(port))
}

fn native_read(interp: &mut Interpreter, call: &Call) -> Eval {
    let (port, transient) = interp.port_arg(call.arg(0))?;
    let read = interp
        .open_handle(port)
        .and_then(|handle| interp.poll_device(port, |device| device.read(handle)));
    let bytes = interp.finish_transient(port, transient, read)?;
    Ok(Value::Binary(SeriesRef::head(interp.heap.alloc_binary(&bytes))))
}

fn native_write(interp: &mut Interpreter, call: &Call) -> Eval {
    let (port, transient) = interp.port_arg(call.arg(0))?;
    let bytes = match call.arg(1) {
        Value::Binary(r) => interp.heap.bytes(r.series).get(r.index()..).unwrap_or_default().to_vec(),
        other => interp.form(&other).into_bytes(),
    };
    let written = interp
        .open_handle(port)
        .and_then(|handle| interp.poll_device(port, |device| device.write(handle, &bytes)));
    interp.finish_transient(port, transient, written)?;
    Ok(Value::Port(port))
}

fn native_close(interp: &mut Interpreter, call: &Call) -> Eval {
    let Value::Port(port) = call.arg(0) else {
        return Err(interp.error(ErrorId::InvalidArg, &[call.arg(0)]));
    };
    interp.close_port(port)?;
    Ok(Value::Port(port))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::engine::Interpreter;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.eval_molded(source) {
            Ok(text) => text,
            Err(failure) => format!("failed: {}", failure.id().unwrap_or_default()),
        }
    }

    #[test]
    fn test_recycle_and_stats() {
        assert_eq!(eval("integer? recycle"), "true");
        assert_eq!(eval("s: stats s/live > 0"), "true");
    }

    #[test]
    fn test_text_codec_natives() {
        assert_eq!(eval("to-text decode 'text encode 'text \"hi\""), "\"hi\"");
        assert_eq!(eval("encode 'text 42"), "#{3432}");
        assert_eq!(eval("encode 'nope 1"), "failed: no-codec");
        assert_eq!(eval("encode 'text [1]"), "failed: codec-failure");
        assert_eq!(eval("b: copy [1] append/only b b encode 'text b"), "failed: codec-failure");
    }

    #[test]
    fn test_memory_port() {
        let source = r#"
            p: open "memory://notes"
            write p "ab"
            write p "cd"
            to-text read p
        "#;
        assert_eq!(eval(source), "\"abcd\"");
        assert_eq!(eval("p: open \"memory://x\" close p read p"), "failed: not-open");
        assert_eq!(eval("open \"ftp://x\""), "failed: no-scheme");
    }
}
