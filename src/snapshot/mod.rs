// Inspector history: captured output plus a snapshot per evaluation step

use crate::interpreter::constants::NEAR_MOLD_LIMIT;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::symbols::SymId;
use crate::memory::heap::HeapStats;
use crate::memory::stack::{FrameKind, FrameState};
use thiserror::Error;

/// Captures `print` / `probe` output
#[derive(Debug, Clone, Default)]
pub struct MockTerminal {
    pub lines: Vec<TerminalLine>,
}

impl MockTerminal {
    pub fn new() -> Self {
        MockTerminal { lines: Vec::new() }
    }

    /// Print one line; embedded newlines are kept as separate lines
    pub fn print(&mut self, text: &str, line: usize) {
        for part in text.split('\n') {
            self.lines.push(TerminalLine {
                text: part.to_string(),
                line,
            });
        }
    }

    /// Everything printed, one `\n`-terminated line per entry
    pub fn output(&self) -> String {
        self.lines.iter().map(|l| format!("{}\n", l.text)).collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A line of output with the source line that printed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLine {
    pub text: String,
    pub line: usize,
}

/// What triggered a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// A top-level expression is about to run
    Expression,
    /// A function body is about to run
    Call(Option<String>),
}

/// Rendering of one frame at snapshot time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameView {
    pub depth: usize,
    pub kind: FrameKind,
    pub state: FrameState,
    pub label: Option<String>,
    /// Feed position and length
    pub position: Option<(usize, usize)>,
    /// Molded value the frame will continue from, truncated
    pub out: String,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frames: Vec<FrameView>,
    pub heap: HeapStats,
    pub terminal: MockTerminal,
    pub line: usize,
    pub event: SnapshotEvent,
}

impl Snapshot {
    /// Rough memory cost in bytes
    pub fn estimated_size(&self) -> usize {
        let frames: usize = self
            .frames
            .iter()
            .map(|f| 64 + f.out.len() + f.label.as_ref().map_or(0, String::len))
            .sum();
        let terminal: usize = self.terminal.lines.iter().map(|l| 32 + l.text.len()).sum();
        let pools = self.heap.pools.len() * std::mem::size_of::<crate::memory::pool::PoolStats>();
        std::mem::size_of::<Snapshot>() + frames + terminal + pools
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot memory limit exceeded: {used} + {size} > {limit}")]
    LimitExceeded { used: usize, size: usize, limit: usize },
    #[error("already at the first step")]
    AtStart,
    #[error("already at the last step")]
    AtEnd,
    #[error("no steps were recorded")]
    Empty,
}

/// Recorded history with a cursor for stepping through it
#[derive(Debug)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
    position: usize,
    max_memory: usize,
    current_memory: usize,
    recording: bool,
}

impl SnapshotManager {
    pub fn new(max_memory: usize) -> Self {
        SnapshotManager {
            snapshots: Vec::new(),
            position: 0,
            max_memory,
            current_memory: 0,
            recording: true,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        let size = snapshot.estimated_size();
        if self.current_memory + size > self.max_memory {
            return Err(SnapshotError::LimitExceeded {
                used: self.current_memory,
                size,
                limit: self.max_memory,
            });
        }
        self.current_memory += size;
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn step_forward(&mut self) -> Result<(), SnapshotError> {
        if self.snapshots.is_empty() {
            return Err(SnapshotError::Empty);
        }
        if self.position + 1 >= self.snapshots.len() {
            return Err(SnapshotError::AtEnd);
        }
        self.position += 1;
        Ok(())
    }

    pub fn step_backward(&mut self) -> Result<(), SnapshotError> {
        if self.position == 0 {
            return Err(SnapshotError::AtStart);
        }
        self.position -= 1;
        Ok(())
    }

    pub fn rewind_to_start(&mut self) {
        self.position = 0;
    }

    pub fn jump_to_end(&mut self) {
        self.position = self.snapshots.len().saturating_sub(1);
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}

fn truncated(mut text: String) -> String {
    if let Some((cut, _)) = text.char_indices().nth(NEAR_MOLD_LIMIT) {
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

impl Interpreter {
    pub(crate) fn snapshot(&mut self, event: SnapshotEvent) {
        if !self.snapshots.as_ref().is_some_and(SnapshotManager::is_recording) {
            return;
        }
        let frames = self
            .stack
            .frames()
            .iter()
            .enumerate()
            .map(|(depth, frame)| FrameView {
                depth,
                kind: frame.kind,
                state: frame.state,
                label: frame.label.map(|sym| self.symbols.name(sym).to_string()),
                position: frame.feed.map(|feed| (feed.index, self.heap.len(feed.array))),
                out: truncated(self.mold(&frame.out)),
            })
            .collect();
        let snapshot = Snapshot {
            frames,
            heap: self.heap.stats(),
            terminal: self.terminal.clone(),
            line: self.current_line,
            event,
        };
        if let Some(manager) = self.snapshots.as_mut() {
            if let Err(err) = manager.push(snapshot) {
                log::warn!("{}; recording stopped", err);
                manager.stop_recording();
            }
        }
    }

    pub(crate) fn snapshot_call(&mut self, label: Option<SymId>) {
        if self.snapshots.is_some() {
            let name = label.map(|sym| self.symbols.name(sym).to_string());
            self.snapshot(SnapshotEvent::Call(name));
        }
    }

    /// Recorded history, leaving recording off
    pub fn take_snapshots(&mut self) -> Option<SnapshotManager> {
        self.snapshots.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::config::Config;

    #[test]
    fn test_terminal_output() {
        let mut terminal = MockTerminal::new();
        terminal.print("a", 1);
        terminal.print("b\nc", 2);
        assert_eq!(terminal.output(), "a\nb\nc\n");
        assert_eq!(terminal.lines[2].line, 2);
    }

    #[test]
    fn test_records_each_step() {
        let mut interp = Interpreter::with_config(Config::default().with_snapshots(1 << 20));
        interp.eval_str("a: 1\nf: func [x] [x + 1]\nprint f a").unwrap();
        let mut history = interp.take_snapshots().unwrap();
        assert!(history.len() >= 4);
        assert_eq!(history.current().map(|s| s.line), Some(1));
        history.jump_to_end();
        assert_eq!(history.step_forward(), Err(SnapshotError::AtEnd));
        let last = history.current().unwrap();
        assert_eq!(last.line, 3);
        history.rewind_to_start();
        assert_eq!(history.step_backward(), Err(SnapshotError::AtStart));
        let call = (0..history.len()).find_map(|i| match &history.get(i)?.event {
            SnapshotEvent::Call(name) => name.clone(),
            SnapshotEvent::Expression => None,
        });
        assert_eq!(call.as_deref(), Some("f"));
    }

    #[test]
    fn test_limit_stops_recording() {
        let mut interp = Interpreter::with_config(Config::default().with_snapshots(1));
        interp.eval_str("1 2 3").unwrap();
        let history = interp.take_snapshots().unwrap();
        assert!(history.is_empty());
        assert!(!history.is_recording());
    }
}
