// Extensions, codecs, devices and foreign routines from the host side

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rebound::interfaces::codec::{Codec, CodecError, Decoded};
use rebound::interfaces::device::{Device, DeviceError, DeviceStatus, MemoryDevice};
use rebound::interfaces::extension::{Extension, ExtensionContext, ExtensionError};
use rebound::interfaces::ffi::{ForeignSignature, ForeignType};
use rebound::interpreter::engine::Interpreter;
use rebound::interpreter::mold::Molder;
use rebound::interpreter::natives::Call;
use rebound::interpreter::unwind::Eval;
use rebound::memory::value::{Kind, SeriesRef, Value};

/// Upper-cases text in both directions
struct UpperCodec;

impl Codec for UpperCodec {
    fn name(&self) -> &str {
        "upper"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError> {
        std::str::from_utf8(bytes)
            .map(|text| Decoded::Text(text.to_uppercase()))
            .map_err(|err| CodecError::Malformed(err.to_string()))
    }

    fn encode(&self, value: &Decoded) -> Result<Vec<u8>, CodecError> {
        match value {
            Decoded::Text(text) => Ok(text.to_uppercase().into_bytes()),
            _ => Err(CodecError::Unsupported("non-text")),
        }
    }
}

fn native_shout(interp: &mut Interpreter, call: &Call) -> Eval {
    let text = match call.arg(0) {
        Value::Text(r) => interp.heap.text_string(r.series, r.index()),
        other => interp.form(&other),
    };
    let id = interp.heap.alloc_text(&format!("{}!", text.to_uppercase()));
    Ok(Value::Text(SeriesRef::head(id)))
}

fn mold_issue_loudly(interp: &Interpreter, value: &Value, m: &mut Molder) {
    if let Some(sym) = value.symbol() {
        m.out.push_str("<issue ");
        m.out.push_str(interp.symbols.name(sym));
        m.out.push('>');
    }
}

struct Demo {
    name: &'static str,
    log: Rc<RefCell<Vec<String>>>,
}

impl Extension for Demo {
    fn name(&self) -> &str {
        self.name
    }

    fn init(&mut self, context: &mut ExtensionContext<'_>) -> Result<(), ExtensionError> {
        context.register_native("shout", "text [string!]", native_shout)?;
        context.register_codec(Kind::Text, &[".up"], Box::new(UpperCodec));
        context.register_device("slow", Box::new(MemoryDevice::with_latency(3)));
        let mut entry = context.type_entry(Kind::Issue);
        entry.mold = mold_issue_loudly;
        context.override_type(Kind::Issue, entry);
        self.log.borrow_mut().push(format!("init {}", self.name));
        Ok(())
    }

    fn quit(&mut self) -> Result<(), ExtensionError> {
        self.log.borrow_mut().push(format!("quit {}", self.name));
        Ok(())
    }
}

fn with_demo() -> (Interpreter, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut interp = Interpreter::new();
    interp
        .load_extension(Box::new(Demo {
            name: "demo",
            log: Rc::clone(&log),
        }))
        .unwrap();
    (interp, log)
}

#[test]
fn test_extension_native() {
    let (mut interp, _) = with_demo();
    assert_eq!(interp.eval_molded("shout \"hey\"").unwrap(), "\"HEY!\"");
    let failure = interp.eval_str("shout 1").unwrap_err();
    assert_eq!(failure.id(), Some("expect-arg"));
    assert_eq!(interp.extension_names(), vec!["demo"]);
}

#[test]
fn test_extension_codec() {
    let (mut interp, _) = with_demo();
    assert_eq!(interp.eval_molded("encode 'upper \"abc\"").unwrap(), "#{414243}");
    assert_eq!(interp.eval_molded("decode 'upper #{6869}").unwrap(), "\"HI\"");
    assert_eq!(interp.eval_str("encode 'upper 5").unwrap_err().id(), Some("codec-failure"));
}

#[test]
fn test_extension_device_polls_until_ready() {
    let (mut interp, _) = with_demo();
    let source = r#"
        write "slow://log" "one "
        write "slow://log" "two"
        to-text read "slow://log"
    "#;
    assert_eq!(interp.eval_molded(source).unwrap(), "\"one two\"");
}

#[test]
fn test_extension_overrides_type_behavior() {
    let (mut interp, _) = with_demo();
    assert_eq!(interp.eval_molded("first [#tag]").unwrap(), "<issue tag>");
    assert_eq!(interp.eval_molded("1 + 1").unwrap(), "2");
}

#[test]
fn test_extensions_quit_in_reverse_order() {
    let (mut interp, log) = with_demo();
    interp
        .load_extension(Box::new(Demo {
            name: "second",
            log: Rc::clone(&log),
        }))
        .unwrap();
    drop(interp);
    assert_eq!(
        *log.borrow(),
        vec!["init demo", "init second", "quit second", "quit demo"]
    );
}

fn add_signature(ty: ForeignType) -> ForeignSignature {
    ForeignSignature {
        args: vec![ty, ty],
        ret: Some(ForeignType::I64),
    }
}

#[test]
fn test_routine_call() {
    let mut interp = Interpreter::new();
    interp
        .register_routine(
            "add-i64",
            add_signature(ForeignType::I64),
            Box::new(|buffer| {
                let mut args = buffer.reader();
                let sum = args.i64().unwrap_or(0) + args.i64().unwrap_or(0);
                sum.to_le_bytes().to_vec()
            }),
        )
        .unwrap();
    assert_eq!(interp.eval_molded("add-i64 2 3").unwrap(), "5");
    assert_eq!(interp.eval_str("add-i64 2 \"3\"").unwrap_err().id(), Some("expect-arg"));
}

#[test]
fn test_routine_rejects_values_that_do_not_fit() {
    let mut interp = Interpreter::new();
    interp
        .register_routine(
            "add-i32",
            add_signature(ForeignType::I32),
            Box::new(|buffer| {
                let mut args = buffer.reader();
                let sum = args.i32().unwrap_or(0) as i64 + args.i32().unwrap_or(0) as i64;
                sum.to_le_bytes().to_vec()
            }),
        )
        .unwrap();
    assert_eq!(interp.eval_molded("add-i32 1 2").unwrap(), "3");
    let failure = interp.eval_str("add-i32 1 2147483648").unwrap_err();
    assert_eq!(failure.id(), Some("bad-marshal"));
}

#[test]
fn test_routine_pointer_arguments() {
    let mut interp = Interpreter::new();
    let signature = ForeignSignature {
        args: vec![ForeignType::Pointer(3)],
        ret: Some(ForeignType::I64),
    };
    interp
        .register_routine(
            "sum-bytes",
            signature,
            Box::new(|buffer| {
                let sum: i64 = buffer.reader().pointer().unwrap_or_default().iter().map(|&b| b as i64).sum();
                sum.to_le_bytes().to_vec()
            }),
        )
        .unwrap();
    assert_eq!(interp.eval_molded("sum-bytes #{010203}").unwrap(), "6");
    assert_eq!(interp.eval_str("sum-bytes #{01}").unwrap_err().id(), Some("bad-marshal"));
}

/// Opens anything, fails every read and write, and counts open handles
struct FlakyDevice {
    open: Rc<Cell<usize>>,
    next: u32,
}

impl Device for FlakyDevice {
    fn open(&mut self, _: &str) -> Result<DeviceStatus<u32>, DeviceError> {
        self.open.set(self.open.get() + 1);
        self.next += 1;
        Ok(DeviceStatus::Ready(self.next))
    }

    fn read(&mut self, _: u32) -> Result<DeviceStatus<Vec<u8>>, DeviceError> {
        Err(DeviceError::Io("read refused".into()))
    }

    fn write(&mut self, _: u32, _: &[u8]) -> Result<DeviceStatus<usize>, DeviceError> {
        Err(DeviceError::Io("write refused".into()))
    }

    fn close(&mut self, _: u32) -> Result<(), DeviceError> {
        self.open.set(self.open.get() - 1);
        Ok(())
    }
}

struct Flaky(Rc<Cell<usize>>);

impl Extension for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn init(&mut self, context: &mut ExtensionContext<'_>) -> Result<(), ExtensionError> {
        let device = FlakyDevice {
            open: Rc::clone(&self.0),
            next: 0,
        };
        context.register_device("flaky", Box::new(device));
        Ok(())
    }
}

fn with_flaky() -> (Interpreter, Rc<Cell<usize>>) {
    let open = Rc::new(Cell::new(0));
    let mut interp = Interpreter::new();
    interp.load_extension(Box::new(Flaky(Rc::clone(&open)))).unwrap();
    (interp, open)
}

#[test]
fn test_failed_transient_operations_close_their_port() {
    let (mut interp, open) = with_flaky();
    let failure = interp.eval_str("read \"flaky://x\"").unwrap_err();
    assert_eq!(failure.id(), Some("device-failure"));
    assert_eq!(open.get(), 0);

    assert_eq!(interp.eval_molded("attempt [write \"flaky://x\" \"data\"]").unwrap(), "none");
    assert_eq!(open.get(), 0);
}

#[test]
fn test_collected_ports_release_their_handles() {
    let (mut interp, open) = with_flaky();
    interp.eval_str("p: open \"flaky://x\" q: open \"flaky://y\"").unwrap();
    assert_eq!(open.get(), 2);

    interp.eval_str("p: none").unwrap();
    interp.recycle();
    assert_eq!(open.get(), 1);

    interp.eval_str("close q").unwrap();
    assert_eq!(open.get(), 0);
}
