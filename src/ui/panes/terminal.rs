//! Terminal output pane rendering

use super::{clamp_scroll, pane_block};
use crate::snapshot::MockTerminal;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{List, ListItem, Padding, Paragraph},
    Frame,
};

pub fn render_terminal_pane(
    frame: &mut Frame,
    area: Rect,
    terminal: Option<&MockTerminal>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Output ", is_focused);

    let lines = terminal.map_or(&[][..], |t| t.lines.as_slice());
    if lines.is_empty() {
        let paragraph = Paragraph::new("(no output)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, lines.len(), visible_height);

    let items: Vec<ListItem> = lines
        .iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|line| {
            // gutter: source line that printed this output
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>4} ", line.line), Style::default().fg(DEFAULT_THEME.comment)),
                Span::styled(line.text.as_str(), Style::default().fg(DEFAULT_THEME.fg)),
            ]))
        })
        .collect();

    let list = List::new(items).block(block.padding(Padding::new(1, 0, 0, 0)));
    frame.render_widget(list, area);
}
