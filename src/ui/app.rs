//! Inspector application state and event loop

use crate::snapshot::{Snapshot, SnapshotError, SnapshotManager};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Source,
    Stack,
    Heap,
    Terminal,
}

impl FocusedPane {
    /// Clockwise: source -> terminal -> stack -> heap
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Source => FocusedPane::Terminal,
            FocusedPane::Terminal => FocusedPane::Stack,
            FocusedPane::Stack => FocusedPane::Heap,
            FocusedPane::Heap => FocusedPane::Source,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Source => FocusedPane::Heap,
            FocusedPane::Terminal => FocusedPane::Source,
            FocusedPane::Stack => FocusedPane::Terminal,
            FocusedPane::Heap => FocusedPane::Stack,
        }
    }
}

/// The inspector over a recorded run
pub struct App {
    pub history: SnapshotManager,
    pub source_code: String,

    /// Final outcome of the run, shown once the last step is reached
    pub outcome: Option<String>,

    pub focused_pane: FocusedPane,

    pub source_scroll: usize,
    pub stack_scroll: usize,
    pub heap_scroll: usize,
    pub terminal_scroll: usize,

    /// Visual row the current line is pinned to while stepping
    pub target_line_row: Option<usize>,

    pub should_quit: bool,
    pub status_message: String,

    pub is_playing: bool,
    pub last_play_time: Instant,
    pub last_space_press: Instant,
}

impl App {
    pub fn new(history: SnapshotManager, source_code: String, outcome: Option<String>) -> Self {
        let long_ago = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        App {
            history,
            source_code,
            outcome,
            focused_pane: FocusedPane::Source,
            source_scroll: 0,
            stack_scroll: 0,
            heap_scroll: 0,
            terminal_scroll: 0,
            target_line_row: None,
            should_quit: false,
            status_message: String::from("Ready!"),
            is_playing: false,
            last_play_time: Instant::now(),
            last_space_press: long_ago,
        }
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if self.is_playing && self.last_play_time.elapsed() >= Duration::from_secs(1) {
                if self.history.step_forward().is_ok() {
                    self.status_message = "Playing...".to_string();
                    self.terminal_scroll = usize::MAX;
                } else {
                    self.is_playing = false;
                    self.status_message = "Playback complete".to_string();
                }
                self.last_play_time = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.history.position() + 1 >= self.history.len()
    }

    fn render(&mut self, frame: &mut Frame) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(frame.area());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(main_chunks[0]);

        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(columns[0]);

        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[1]);

        let failed = self.at_end() && self.outcome.is_some();
        let snapshot: Option<&Snapshot> = self.history.current();

        super::panes::render_source_pane(
            frame,
            left_rows[0],
            &self.source_code,
            snapshot.map_or(0, |s| s.line),
            failed,
            self.focused_pane == FocusedPane::Source,
            &mut self.source_scroll,
            &mut self.target_line_row,
        );

        super::panes::render_terminal_pane(
            frame,
            left_rows[1],
            snapshot.map(|s| &s.terminal),
            self.focused_pane == FocusedPane::Terminal,
            &mut self.terminal_scroll,
        );

        super::panes::render_stack_pane(
            frame,
            right_rows[0],
            snapshot.map(|s| s.frames.as_slice()).unwrap_or_default(),
            self.focused_pane == FocusedPane::Stack,
            &mut self.stack_scroll,
        );

        super::panes::render_heap_pane(
            frame,
            right_rows[1],
            snapshot.map(|s| &s.heap),
            self.focused_pane == FocusedPane::Heap,
            &mut self.heap_scroll,
        );

        let message = match (&self.outcome, failed) {
            (Some(outcome), true) => outcome.as_str(),
            _ => self.status_message.as_str(),
        };
        super::panes::render_status_bar(
            frame,
            main_chunks[1],
            message,
            self.history.position(),
            self.history.len(),
            failed,
            self.is_playing,
        );
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char(c @ '1'..='9') => {
                self.is_playing = false;
                let n = c.to_digit(10).unwrap_or(1);
                let stepped = (0..n).take_while(|_| self.history.step_forward().is_ok()).count();
                self.status_message = format!("Stepped forward {} step(s)", stepped);
                self.terminal_scroll = usize::MAX;
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Left => {
                self.is_playing = false;
                let result = self.history.step_backward();
                self.report_step("backward", result);
            }
            KeyCode::Right => {
                self.is_playing = false;
                let result = self.history.step_forward();
                self.report_step("forward", result);
            }
            KeyCode::Up => self.scroll(-1),
            KeyCode::Down => self.scroll(1),
            KeyCode::Char(' ') => {
                // Debounced against key repeat
                if self.last_space_press.elapsed() >= Duration::from_millis(200) {
                    self.last_space_press = Instant::now();
                    self.is_playing = !self.is_playing;
                    if self.is_playing {
                        self.last_play_time = Instant::now()
                            .checked_sub(Duration::from_secs(1))
                            .unwrap_or_else(Instant::now);
                        self.status_message = "Playing...".to_string();
                    } else {
                        self.status_message = "Paused".to_string();
                    }
                }
            }
            KeyCode::Enter => {
                self.is_playing = false;
                self.history.jump_to_end();
                self.status_message = "Jumped to end".to_string();
                self.terminal_scroll = usize::MAX;
            }
            KeyCode::Backspace => {
                self.is_playing = false;
                self.history.rewind_to_start();
                self.status_message = "Jumped to start".to_string();
                self.terminal_scroll = usize::MAX;
            }
            _ => {}
        }
    }

    fn scroll(&mut self, delta: isize) {
        let offset = match self.focused_pane {
            FocusedPane::Source => {
                // Scrolling down moves the current line up
                if let Some(row) = self.target_line_row {
                    self.target_line_row = Some(row.saturating_add_signed(-delta));
                }
                return;
            }
            FocusedPane::Stack => &mut self.stack_scroll,
            FocusedPane::Heap => &mut self.heap_scroll,
            FocusedPane::Terminal => &mut self.terminal_scroll,
        };
        *offset = offset.saturating_add_signed(delta);
    }

    fn report_step(&mut self, direction: &str, result: Result<(), SnapshotError>) {
        match result {
            Ok(()) => {
                self.status_message = format!("Stepped {}", direction);
                self.terminal_scroll = usize::MAX;
            }
            Err(err) => {
                self.status_message = format!("Cannot step {}: {}", direction, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::config::Config;
    use crate::interpreter::engine::Interpreter;
    use crossterm::event::KeyModifiers;

    fn app(source: &str) -> App {
        let mut interp = Interpreter::with_config(Config::default().with_snapshots(1 << 20));
        interp.eval_str(source).unwrap();
        let history = interp.take_snapshots().unwrap();
        App::new(history, source.to_string(), None)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_stepping_keys() {
        let mut app = app("a: 1\nb: 2\nc: 3");
        press(&mut app, KeyCode::Right);
        assert_eq!(app.history.position(), 1);
        press(&mut app, KeyCode::Enter);
        assert!(app.at_end());
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.history.position(), 0);
        press(&mut app, KeyCode::Left);
        assert!(app.status_message.starts_with("Cannot step backward"));
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_focus_cycles() {
        let mut app = app("1");
        for _ in 0..4 {
            press(&mut app, KeyCode::Tab);
        }
        assert_eq!(app.focused_pane, FocusedPane::Source);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focused_pane, FocusedPane::Heap);
    }
}
