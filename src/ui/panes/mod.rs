//! Pane rendering for the inspector
//!
//! - [`source`]: source text with the current line highlighted
//! - [`stack`]: frames at the current step, innermost last
//! - [`heap`]: live series, collections and pool occupancy
//! - [`terminal`]: output printed up to the current step
//! - [`status`]: step counter, keybindings and playback state

pub mod heap;
pub mod source;
pub mod stack;
pub mod status;
pub mod terminal;

pub use heap::render_heap_pane;
pub use source::render_source_pane;
pub use stack::render_stack_pane;
pub use status::render_status_bar;
pub use terminal::render_terminal_pane;

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    style::{Modifier, Style},
    widgets::{Block, Borders},
};

/// Bordered block, highlighted when focused
fn pane_block(title: &str, is_focused: bool) -> Block<'_> {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
}

/// Clamp a scroll offset so the last page stays full
fn clamp_scroll(offset: &mut usize, total: usize, visible: usize) {
    *offset = if total > visible {
        (*offset).min(total - visible)
    } else {
        0
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_scroll() {
        let mut offset = usize::MAX;
        clamp_scroll(&mut offset, 10, 4);
        assert_eq!(offset, 6);
        clamp_scroll(&mut offset, 3, 4);
        assert_eq!(offset, 0);
    }
}
