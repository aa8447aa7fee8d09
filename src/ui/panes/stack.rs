//! Stack pane: one entry per frame, innermost at the bottom

use super::{clamp_scroll, pane_block};
use crate::memory::stack::{FrameKind, FrameState};
use crate::snapshot::FrameView;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};

fn kind_label(kind: FrameKind) -> &'static str {
    match kind {
        FrameKind::Top => "top",
        FrameKind::Block => "block",
        FrameKind::Group => "group",
        FrameKind::Action => "call",
    }
}

fn state_label(state: FrameState) -> &'static str {
    match state {
        FrameState::Entry => "entry",
        FrameState::Fetched => "fetched",
        FrameState::Dispatching => "gathering",
        FrameState::Executing => "running",
        FrameState::Done => "done",
    }
}

fn frame_lines(view: &FrameView, innermost: bool) -> Vec<ListItem<'static>> {
    let name_style = if innermost {
        Style::default()
            .fg(DEFAULT_THEME.function)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.muted_function)
    };
    let name = match (&view.label, view.kind) {
        (Some(label), _) => label.clone(),
        (None, kind) => kind_label(kind).to_string(),
    };
    let mut header = vec![
        Span::styled(format!("#{} ", view.depth), Style::default().fg(DEFAULT_THEME.comment)),
        Span::styled(name, name_style),
        Span::styled(format!(" [{}]", state_label(view.state)), Style::default().fg(DEFAULT_THEME.comment)),
    ];
    if let Some((index, len)) = view.position {
        header.push(Span::styled(format!(" {}/{}", index, len), Style::default().fg(DEFAULT_THEME.number)));
    }
    let mut lines = vec![ListItem::new(Line::from(header))];
    if !view.out.is_empty() {
        lines.push(ListItem::new(Line::from(vec![
            Span::styled("    out: ", Style::default().fg(DEFAULT_THEME.comment)),
            Span::styled(view.out.clone(), Style::default().fg(DEFAULT_THEME.return_value)),
        ])));
    }
    lines
}

pub fn render_stack_pane(
    frame: &mut Frame,
    area: Rect,
    frames: &[FrameView],
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Frames ", is_focused);
    if frames.is_empty() {
        let empty = ListItem::new("(empty)").style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(List::new([empty]).block(block), area);
        return;
    }

    let items: Vec<ListItem> = frames
        .iter()
        .enumerate()
        .flat_map(|(i, view)| frame_lines(view, i + 1 == frames.len()))
        .collect();

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, items.len(), visible_height);
    let visible: Vec<ListItem> = items.into_iter().skip(*scroll_offset).take(visible_height).collect();
    frame.render_widget(List::new(visible).block(block), area);
}
