//! Status bar rendering with keybindings and state indicators

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

fn badge(text: &str, bg: Color) -> Span<'_> {
    Span::styled(
        text,
        Style::default().bg(bg).fg(Color::Black).add_modifier(Modifier::BOLD),
    )
}

pub fn render_status_bar(
    frame: &mut Frame,
    area: Rect,
    message: &str,
    current_step: usize,
    total_steps: usize,
    is_error: bool,
    is_playing: bool,
) {
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let bar = Style::default().bg(DEFAULT_THEME.current_line_bg);
    let step_text = format!(" Step {}/{} ", (current_step + 1).min(total_steps), total_steps);
    let left_spans = vec![
        badge(&step_text, if is_error { DEFAULT_THEME.error } else { DEFAULT_THEME.primary }),
        Span::styled(" | ", bar.fg(DEFAULT_THEME.comment)),
        Span::styled(
            format!(" {} ", message),
            bar.fg(if is_error { DEFAULT_THEME.error } else { DEFAULT_THEME.fg }),
        ),
    ];
    frame.render_widget(
        Paragraph::new(Line::from(left_spans)).style(bar).alignment(Alignment::Left),
        layout[0],
    );

    let key_style = Style::default().bg(DEFAULT_THEME.comment).fg(Color::Black);
    let desc_style = bar.fg(DEFAULT_THEME.fg);
    let sep_style = bar.fg(DEFAULT_THEME.comment);

    let mut right_spans = Vec::new();
    for (keys, desc) in [(" ←/→ ", " step "), (" ⎵ ", " play "), (" ↵ / ⌫ ", " end/start "), (" tab ", " focus ")] {
        right_spans.push(Span::styled(keys, key_style));
        right_spans.push(Span::styled(desc, desc_style));
        right_spans.push(Span::styled("│", sep_style));
    }
    right_spans.push(Span::styled("q", key_style));
    right_spans.push(Span::styled(" quit ", desc_style));

    let indicator = if is_playing {
        Some(badge(" ▶ PLAYING ", DEFAULT_THEME.secondary))
    } else if total_steps > 0 && current_step + 1 >= total_steps {
        Some(badge(" END ", DEFAULT_THEME.error))
    } else if current_step == 0 {
        Some(badge(" START ", DEFAULT_THEME.success))
    } else {
        None
    };
    if let Some(indicator) = indicator {
        right_spans.push(Span::styled("│", sep_style));
        right_spans.push(indicator);
    }

    frame.render_widget(
        Paragraph::new(Line::from(right_spans)).style(bar).alignment(Alignment::Right),
        layout[1],
    );
}
