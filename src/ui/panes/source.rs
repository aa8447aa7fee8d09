//! Source pane with light highlighting and the current line marked
//!
//! Highlighting is per line and token-shaped only: strings, comments,
//! numbers, set-words and refinements. Braced strings spanning lines are not
//! tracked.

use super::pane_block;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

const DELIMITERS: &[char] = &['[', ']', '(', ')'];

fn token_style(token: &str) -> Style {
    let first = token.chars().next().unwrap_or(' ');
    if token.ends_with(':') {
        Style::default().fg(DEFAULT_THEME.keyword).add_modifier(Modifier::BOLD)
    } else if first == '/' || first == '\'' || first == ':' {
        Style::default().fg(DEFAULT_THEME.type_name)
    } else if first.is_ascii_digit() || (first == '-' && token.len() > 1 && token[1..].starts_with(|c: char| c.is_ascii_digit())) {
        Style::default().fg(DEFAULT_THEME.number)
    } else if token.ends_with('!') {
        Style::default().fg(DEFAULT_THEME.type_name)
    } else if first == '#' || first == '%' {
        Style::default().fg(DEFAULT_THEME.string)
    } else {
        Style::default().fg(DEFAULT_THEME.fg)
    }
}

fn highlight_source_line(line: &str) -> Line<'_> {
    let mut spans = Vec::new();
    let mut rest = line;
    while let Some(c) = rest.chars().next() {
        let end = if c == ';' {
            spans.push(Span::styled(rest, Style::default().fg(DEFAULT_THEME.comment)));
            break;
        } else if c == '"' {
            let mut escaped = false;
            let close = rest[1..].char_indices().find(|&(_, ch)| {
                let hit = ch == '"' && !escaped;
                escaped = ch == '^' && !escaped;
                hit
            });
            let end = close.map_or(rest.len(), |(i, _)| i + 2);
            spans.push(Span::styled(&rest[..end], Style::default().fg(DEFAULT_THEME.string)));
            end
        } else if DELIMITERS.contains(&c) {
            spans.push(Span::styled(&rest[..1], Style::default().fg(DEFAULT_THEME.primary)));
            1
        } else if c.is_whitespace() {
            spans.push(Span::raw(&rest[..c.len_utf8()]));
            c.len_utf8()
        } else {
            let end = rest
                .find(|ch: char| ch.is_whitespace() || DELIMITERS.contains(&ch) || ch == '"' || ch == ';')
                .unwrap_or(rest.len());
            spans.push(Span::styled(&rest[..end], token_style(&rest[..end])));
            end
        };
        rest = &rest[end..];
    }
    Line::from(spans)
}

/// Render the source pane, keeping `current_line` (1-based) at the pinned row
#[allow(clippy::too_many_arguments)]
pub fn render_source_pane(
    frame: &mut Frame,
    area: Rect,
    source_code: &str,
    current_line: usize,
    is_error: bool,
    is_focused: bool,
    scroll_offset: &mut usize,
    target_line_row: &mut Option<usize>,
) {
    let block = pane_block(" Source ", is_focused);

    let lines: Vec<&str> = source_code.lines().collect();
    let total_lines = lines.len();
    let visible_height = area.height.saturating_sub(2).max(1) as usize;

    let target_row = target_line_row
        .unwrap_or(visible_height / 2)
        .min(visible_height.saturating_sub(1));
    *target_line_row = Some(target_row);

    if current_line > 0 && current_line <= total_lines {
        let wanted = (current_line - 1).saturating_sub(target_row);
        *scroll_offset = wanted.min(total_lines.saturating_sub(visible_height));
    }

    let visible_lines: Vec<Line> = lines
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(idx, line)| {
            let is_current = idx + 1 == current_line;
            let mut content = highlight_source_line(line);
            let num_style = if is_current && is_error {
                let error_style = Style::default()
                    .bg(DEFAULT_THEME.error)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD);
                for span in &mut content.spans {
                    span.style = error_style;
                }
                Style::default().fg(DEFAULT_THEME.error).add_modifier(Modifier::BOLD)
            } else if is_current {
                let current = Style::default().bg(DEFAULT_THEME.current_line_bg);
                for span in &mut content.spans {
                    span.style = span.style.patch(current);
                }
                Style::default().fg(DEFAULT_THEME.secondary).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(DEFAULT_THEME.comment)
            };
            let mut spans = vec![Span::styled(format!("{:4} ", idx + 1), num_style)];
            spans.extend(content.spans);
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(visible_lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &str) -> Vec<String> {
        highlight_source_line(line)
            .spans
            .iter()
            .map(|s| s.content.to_string())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    #[test]
    fn test_tokens() {
        assert_eq!(texts("x: [1 \"a b\"] ; note"), vec!["x:", "[", "1", "\"a b\"", "]", "; note"]);
        assert_eq!(texts("print \"q^\"x\""), vec!["print", "\"q^\"x\""]);
    }
}
