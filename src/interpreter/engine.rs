// Interpreter instance: heap, stack, symbol table, lib and user contexts

use super::config::Config;
use super::context::{ContextData, ContextKind};
use super::errors::{ErrorId, Failure};
use super::jumps::native_return;
use super::symbols::{sym, Symbols};
use super::type_system::{TypeSet, TypeTable};
use super::unwind::{Eval, Unwind};
use crate::interfaces::codec::CodecRegistry;
use crate::interfaces::device::DeviceRegistry;
use crate::interfaces::extension::Extension;
use crate::interfaces::ffi::Routine;
use crate::memory::gc::CollectReport;
use crate::memory::heap::{Heap, RootId};
use crate::memory::series::{ActionBody, ActionData, Param, ParamClass, SeriesId};
use crate::memory::stack::{Feed, Frame, FrameKind, Stack};
use crate::memory::value::{ActionCell, SeriesRef, Value, WordCell};
use crate::parser::scan::{scan, Loaded};
use crate::parser::lexer::ScanErrorKind;
use crate::snapshot::{MockTerminal, SnapshotEvent, SnapshotManager};
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One interpreter: owns every series, frame and symbol it evaluates with
pub struct Interpreter {
    pub heap: Heap,
    pub stack: Stack,
    pub symbols: Symbols,
    pub types: TypeTable,

    /// Natives, datatypes and constants
    pub lib: SeriesId,

    /// Globals of loaded code
    pub user: SeriesId,

    pub(crate) codecs: CodecRegistry,
    pub(crate) devices: DeviceRegistry,
    pub(crate) routines: Vec<Routine>,
    pub(crate) extensions: Vec<Box<dyn Extension>>,

    /// Captured `print` / `probe` output
    pub(crate) terminal: MockTerminal,

    /// Inspector history, when recording
    pub(crate) snapshots: Option<SnapshotManager>,

    /// Source line of each top-level element being run
    pub(crate) lines: Vec<usize>,
    pub(crate) current_line: usize,

    pub(crate) config: Config,
    cancel: Arc<AtomicBool>,

    /// The definitional `return` native; call frames bind copies of it
    pub(crate) return_native: SeriesId,

    /// Array pairs under comparison; revisiting one means a cycle
    pub(crate) comparing: RefCell<FxHashSet<(SeriesRef, SeriesRef)>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// # Panics
    ///
    /// Only if a built-in native spec fails to parse, which is a build defect.
    pub fn with_config(config: Config) -> Self {
        let mut heap = Heap::new(config.gc_ballast);
        let mut symbols = Symbols::new();

        let lib = heap.alloc_context(ContextData::new(ContextKind::Module));
        let user = heap.alloc_context(ContextData::new(ContextKind::Module));
        heap.fix(lib);
        heap.fix(user);

        let value_sym = symbols.intern("value");
        let return_native = heap.alloc_action(ActionData {
            name: Some(sym::RETURN),
            params: vec![Param {
                sym: value_sym,
                class: ParamClass::Normal,
                types: TypeSet::ALL,
                refinement: None,
            }]
            .into(),
            body: ActionBody::Native {
                f: native_return,
                kind: None,
            },
            infix: false,
            spec: None,
        });
        heap.fix(return_native);

        let snapshots = config
            .snapshots
            .then(|| SnapshotManager::new(config.snapshot_limit));

        let mut interp = Interpreter {
            heap,
            stack: Stack::new(config.stack_limit),
            symbols,
            types: TypeTable::new(),
            lib,
            user,
            codecs: CodecRegistry::with_builtins(),
            devices: DeviceRegistry::with_builtins(),
            routines: Vec::new(),
            extensions: Vec::new(),
            terminal: MockTerminal::new(),
            snapshots,
            lines: Vec::new(),
            current_line: 0,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            return_native,
            comparing: RefCell::new(FxHashSet::default()),
        };

        if let Err(failure) = interp.install_natives() {
            panic!("built-in native table is malformed: {}", failure);
        }
        let return_word = Value::Action(ActionCell {
            action: return_native,
            binding: None,
        });
        if let Err(unwind) = interp.context_put(lib, sym::RETURN, return_word) {
            panic!("cannot define return: {:?}", unwind);
        }
        interp
    }

    // ---- loading ----

    /// Scan source text into an unbound block
    pub(crate) fn scan_source(&mut self, source: &str) -> Result<Loaded, Failure> {
        self.scan_or_error(source).map_err(|unwind| self.failure(unwind))
    }

    fn scan_or_error(&mut self, source: &str) -> Eval<Loaded> {
        match scan(&mut self.heap, &mut self.symbols, source) {
            Ok(loaded) => Ok(loaded),
            Err(err) => {
                let id = match err.kind {
                    ScanErrorKind::Invalid => ErrorId::Invalid,
                    ScanErrorKind::Missing => ErrorId::Missing,
                };
                let at = format!("line {}, column {}", err.location.line, err.location.column);
                Err(self.error_text(id, &[&err.message, &at]))
            }
        }
    }

    /// Scan and bind source text into the user context
    pub fn load(&mut self, source: &str) -> Result<SeriesId, Failure> {
        let loaded = self.scan_source(source)?;
        self.bind_loaded(loaded.block);
        Ok(loaded.block)
    }

    /// `load` as seen from inside an evaluation
    pub(crate) fn load_text(&mut self, source: &str) -> Eval<SeriesId> {
        let loaded = self.scan_or_error(source)?;
        self.bind_loaded(loaded.block);
        Ok(loaded.block)
    }

    // ---- evaluation ----

    /// Load and evaluate source text, returning the last value
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Failure> {
        let loaded = self.scan_source(source)?;
        self.bind_loaded(loaded.block);
        self.lines = loaded.lines;
        let result = self.run_top(loaded.block);
        self.lines.clear();
        result
    }

    /// Evaluate and mold the result
    pub fn eval_molded(&mut self, source: &str) -> Result<String, Failure> {
        let value = self.eval_str(source)?;
        Ok(self.mold(&value))
    }

    /// Evaluate an already loaded block at the top level
    pub fn eval_block(&mut self, block: SeriesId) -> Result<Value, Failure> {
        self.run_top(block)
    }

    fn run_top(&mut self, block: SeriesId) -> Result<Value, Failure> {
        let frame = Frame::new(
            FrameKind::Top,
            Some(Feed {
                array: block,
                index: 0,
            }),
        );
        let fid = match self.stack.push_frame(frame) {
            Ok(fid) => fid,
            Err(_) => {
                let unwind = self.error(ErrorId::StackOverflow, &[]);
                return Err(self.failure(unwind));
            }
        };
        let result = self.run_top_frame(fid);
        let out = self.stack.drop_frame(fid);
        match result {
            Ok(()) => Ok(out),
            Err(unwind) => {
                let failure = self.failure(unwind);
                log::debug!("top level failure: {}", failure);
                Err(failure)
            }
        }
    }

    fn run_top_frame(&mut self, fid: usize) -> Eval<()> {
        loop {
            let Some(index) = self.feed_index(fid) else {
                return Ok(());
            };
            if let Some(&line) = self.lines.get(index) {
                self.current_line = line;
            }
            self.snapshot(SnapshotEvent::Expression);
            let value = self.eval_step(fid, true)?;
            self.stack.frame_mut(fid).out = value;
        }
    }

    /// Feed position of a frame that still has elements to evaluate
    fn feed_index(&self, fid: usize) -> Option<usize> {
        let feed = self.stack.frame(fid).feed?;
        (feed.index < self.heap.len(feed.array)).then_some(feed.index)
    }

    /// Turn a signal that escaped every handler into a host-side failure
    pub(crate) fn failure(&mut self, unwind: Unwind) -> Failure {
        match unwind {
            Unwind::Error(error) => Failure::Error(self.report(error)),
            Unwind::Quit { status } => Failure::Quit(status),
            Unwind::Throw { name: Some(name), .. }
                if name.symbol().map(|s| self.symbols.canon(s)) == Some(sym::HALT) =>
            {
                Failure::Halted
            }
            Unwind::Throw { name, value } => {
                let shown = name.unwrap_or(value);
                self.failure_for(ErrorId::NoCatch, &[shown])
            }
            Unwind::Return { .. } => self.failure_for(ErrorId::NoFunction, &[]),
            Unwind::Break { .. } | Unwind::Continue => self.failure_for(ErrorId::NoLoop, &[]),
        }
    }

    fn failure_for(&mut self, id: ErrorId, args: &[Value]) -> Failure {
        let error = self.error_value(id, args);
        Failure::Error(self.report(error))
    }

    // ---- safe points, collection, guards ----

    /// Checked at the start of every evaluation step
    pub(crate) fn safe_point(&mut self) -> Eval<()> {
        if self.cancel.swap(false, Ordering::SeqCst) {
            log::debug!("evaluation halted");
            return Err(self.halt_signal());
        }
        if self.heap.wants_collection() {
            self.recycle();
        }
        Ok(())
    }

    pub(crate) fn halt_signal(&self) -> Unwind {
        Unwind::Throw {
            name: Some(Value::Word(WordCell::unbound(sym::HALT))),
            value: Value::None,
        }
    }

    /// Run a full collection now, then close the device handles of ports
    /// it freed
    pub fn recycle(&mut self) -> CollectReport {
        let report = self.heap.collect(&self.stack);
        for port in self.heap.take_orphaned_ports() {
            let scheme = self.symbols.name(port.scheme).to_string();
            let (Some(device), Some(handle)) = (self.devices.get_mut(&scheme), port.handle) else {
                continue;
            };
            match device.close(handle) {
                Ok(()) => log::debug!("closed unreachable {}://{}", scheme, port.target),
                Err(err) => log::warn!("closing unreachable {}://{}: {}", scheme, port.target, err),
            }
        }
        report
    }

    /// Keep a value alive across collections until [`Interpreter::release`]
    pub fn retain(&mut self, value: Value) -> RootId {
        self.heap.add_root(value)
    }

    pub fn release(&mut self, root: RootId) -> Option<Value> {
        self.heap.remove_root(root)
    }

    /// Pin `value` while `f` runs
    pub fn guarded<T>(&mut self, value: Value, f: impl FnOnce(&mut Self) -> T) -> T {
        let height = self.stack.guard_height();
        self.stack.push_guard(value);
        let result = f(self);
        self.stack.truncate_guards(height);
        result
    }

    /// Flag polled at every safe point; setting it halts evaluation
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn set_stack_limit(&mut self, limit: usize) {
        self.config.stack_limit = limit;
        self.stack.set_limit(limit);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ---- output ----

    pub(crate) fn print_line(&mut self, text: &str) {
        self.terminal.print(text, self.current_line);
    }

    pub fn terminal(&self) -> &MockTerminal {
        &self.terminal
    }

    /// Everything printed so far
    pub fn output(&self) -> String {
        self.terminal.output()
    }

    /// Drain printed output
    pub fn take_output(&mut self) -> String {
        let output = self.terminal.output();
        self.terminal.clear();
        output
    }

    /// Value of a user-context word, if it has one
    pub fn user_value(&mut self, name: &str) -> Option<Value> {
        let sym = self.symbols.intern(name);
        self.context_get(self.user, sym)
    }

    /// Block value for a freshly loaded array
    pub fn block(&self, id: SeriesId) -> Value {
        Value::Block(SeriesRef::head(id))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.shutdown_extensions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lib_and_user_are_distinct_contexts() {
        let interp = Interpreter::new();
        assert_ne!(interp.lib, interp.user);
        assert!(interp.heap.context(interp.lib).len() > 50);
        assert_eq!(interp.heap.context(interp.user).len(), 0);
    }

    #[test]
    fn test_failure_mapping() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.failure(Unwind::Quit { status: 3 }), Failure::Quit(3));
        assert_eq!(interp.failure(interp.halt_signal()), Failure::Halted);
        let failure = interp.failure(Unwind::Continue);
        assert_eq!(failure.id(), Some("no-loop"));
    }
}
