//! Heap pane: collector counters and pool occupancy at the current step

use super::{clamp_scroll, pane_block};
use crate::memory::heap::HeapStats;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};

fn counter<'a>(label: &'a str, value: String) -> ListItem<'a> {
    ListItem::new(Line::from(vec![
        Span::styled(format!("{:<12}", label), Style::default().fg(DEFAULT_THEME.comment)),
        Span::styled(value, Style::default().fg(DEFAULT_THEME.number)),
    ]))
}

/// Text bar of `width` cells filled in proportion to `used / total`
fn occupancy_bar(used: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 { 0 } else { (used * width).div_ceil(total).min(width) };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn render_heap_pane(
    frame: &mut Frame,
    area: Rect,
    stats: Option<&HeapStats>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Heap ", is_focused);
    let Some(stats) = stats else {
        let list = List::new([ListItem::new("(no steps recorded)").style(Style::default().fg(DEFAULT_THEME.comment))]);
        frame.render_widget(list.block(block), area);
        return;
    };

    let mut items = vec![
        counter("series", stats.live.to_string()),
        counter("bytes", stats.bytes.to_string()),
        counter("collections", stats.collections.to_string()),
        counter("freed", format!("{} (last {})", stats.total_freed, stats.last_freed)),
        counter("oversized", stats.oversized.to_string()),
        ListItem::new(Span::styled(
            "pools",
            Style::default()
                .fg(DEFAULT_THEME.type_name)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    for pool in stats.pools.iter().filter(|p| p.in_use + p.free > 0) {
        let total = pool.in_use + pool.free;
        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!("{:>6} B ", pool.size), Style::default().fg(DEFAULT_THEME.comment)),
            Span::styled(occupancy_bar(pool.in_use, total, 10), Style::default().fg(DEFAULT_THEME.success)),
            Span::styled(format!(" {}/{}", pool.in_use, total), Style::default().fg(DEFAULT_THEME.fg)),
        ])));
    }

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, items.len(), visible_height);
    let visible: Vec<ListItem> = items.into_iter().skip(*scroll_offset).take(visible_height).collect();
    frame.render_widget(List::new(visible).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_bar() {
        assert_eq!(occupancy_bar(0, 4, 4), "░░░░");
        assert_eq!(occupancy_bar(1, 4, 4), "█░░░");
        assert_eq!(occupancy_bar(3, 3, 4), "████");
        assert_eq!(occupancy_bar(0, 0, 2), "░░");
    }
}
