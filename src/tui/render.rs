use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Padding, Paragraph};

use crate::config::SearchMode;
use crate::explore::context::TARGET_MARK;
use crate::explore::nav::Region;
use crate::explore::tree::{Highlight, Tree, TreeRow};

pub const HELP_TEXT: &str = "\
# Command Reference
=================

## Overall

ctrl-q: exit
ctrl-h / ?: show / hide help message
ctrl-s: focus search text field
ctrl-f: expand text pane to full screen with no borders (nice for term copy)
tab / shift-tab: cycle focus between tree, search and text pane
ctrl-t: switch search between exact function name and free text
ctrl-n: show / hide calls into the standard library and dependencies
ctrl-o: settings

## Tree navigation

K / left-arrow: go to parent
right-arrow: go to next row, whether child or sibling
up-arrow: go to previous sibling
down-arrow: go to next sibling or a child if no sibling exists

enter: hide/show subtree, expanding if necessary

## Text pane

up / down / page-up / page-down / home / end: scroll
";

pub const STATUS_HINT: &str =
    "press 'ctrl-h' to show help, 'ctrl-s' to search or 'ctrl-q' to exit";

#[derive(Debug)]
pub struct RenderData<'a> {
    pub tree: &'a Tree,
    pub rows: &'a [TreeRow],
    pub tree_scroll: usize,
    pub root_count: usize,
    pub needle: &'a str,
    pub search_mode: SearchMode,
    pub include_noise: bool,
    pub detail: &'a str,
    pub detail_title: &'a str,
    pub detail_scroll: u16,
    pub focus: Region,
    pub full_screen: bool,
    pub status: &'a str,
}

/// Outer rectangles of every pane. In full screen only `detail` is non-empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Areas {
    pub frame: Rect,
    pub tree: Rect,
    pub search: Rect,
    pub detail: Rect,
    pub status: Rect,
}

impl Areas {
    /// Rows available for tree lines inside the pane border.
    pub fn tree_rows(&self) -> usize {
        pane_block("", false).inner(self.tree).height.max(1) as usize
    }

    pub fn detail_rows(&self, full_screen: bool) -> usize {
        let inner = if full_screen {
            self.detail
        } else {
            pane_block("", false).inner(self.detail)
        };
        inner.height.max(1) as usize
    }
}

pub fn layout(area: Rect, full_screen: bool) -> Areas {
    if full_screen {
        return Areas {
            detail: area,
            ..Areas::default()
        };
    }

    let frame = area.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    let canvas = frame_block().inner(frame);
    let [panes, status] =
        Layout::vertical([Constraint::Min(6), Constraint::Length(1)]).areas(canvas);
    let [left, detail] =
        Layout::horizontal([Constraint::Fill(1), Constraint::Fill(3)]).areas(panes);
    let [tree, search] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(left);
    Areas {
        frame,
        tree,
        search,
        detail,
        status,
    }
}

pub fn draw(frame: &mut Frame, data: &RenderData<'_>) {
    let areas = layout(frame.area(), data.full_screen);

    if data.full_screen {
        let detail = Paragraph::new(detail_lines(data.detail)).scroll((data.detail_scroll, 0));
        frame.render_widget(detail, areas.detail);
        return;
    }

    frame.render_widget(frame_block(), areas.frame);

    let tree_block = pane_block("CALL TREE", data.focus == Region::Tree);
    let tree_inner = tree_block.inner(areas.tree);
    frame.render_widget(tree_block, areas.tree);
    let lines = tree_lines(
        data.tree,
        data.rows,
        data.tree_scroll,
        tree_inner.height as usize,
        tree_inner.width as usize,
    );
    frame.render_widget(Paragraph::new(lines), tree_inner);

    let search_title = format!("SEARCH  [{}]", data.search_mode.label());
    let search_block = pane_block(&search_title, data.focus == Region::Search);
    let search_inner = search_block.inner(areas.search);
    frame.render_widget(search_block, areas.search);
    frame.render_widget(
        Paragraph::new(search_line(
            data.root_count,
            data.needle,
            data.focus == Region::Search,
        )),
        search_inner,
    );

    let detail_block = pane_block(data.detail_title, data.focus == Region::Detail);
    let detail_inner = detail_block.inner(areas.detail);
    frame.render_widget(detail_block, areas.detail);
    frame.render_widget(
        Paragraph::new(detail_lines(data.detail)).scroll((data.detail_scroll, 0)),
        detail_inner,
    );

    let noise = if data.include_noise { "shown" } else { "hidden" };
    let status = Line::from(vec![
        Span::styled(data.status.to_string(), Style::default().fg(Color::Gray)),
        Span::raw("   "),
        Span::styled(
            format!("std/external calls: {noise}"),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(status).alignment(Alignment::Center),
        areas.status,
    );
}

pub fn search_label(root_count: usize) -> String {
    format!("Search all callsites ({root_count} roots): ")
}

fn search_line(root_count: usize, needle: &str, focused: bool) -> Line<'static> {
    let mut spans = vec![
        Span::styled(search_label(root_count), Style::default().fg(Color::Gray)),
        Span::styled(
            needle.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ];
    if focused {
        spans.push(Span::styled(
            "▌",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
        ));
    }
    Line::from(spans)
}

fn frame_block() -> Block<'static> {
    let title = Line::from(vec![
        Span::styled("callview", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled("[ctrl-h] help", Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled("[ctrl-o] setup", Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled("[ctrl-q] quit", Style::default().fg(Color::DarkGray)),
    ]);
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::DarkGray))
        .padding(Padding::new(1, 1, 0, 0))
        .title(title)
}

fn pane_block(title: &str, focused: bool) -> Block<'static> {
    let (border, title_style) = if focused {
        (
            Style::default().fg(Color::White),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
    } else {
        (
            Style::default().fg(Color::DarkGray),
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        )
    };
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border)
        .title(Span::styled(title.to_string(), title_style))
}

fn tree_lines(
    tree: &Tree,
    rows: &[TreeRow],
    scroll: usize,
    height: usize,
    width: usize,
) -> Vec<Line<'static>> {
    rows.iter()
        .skip(scroll)
        .take(height)
        .map(|row| {
            let node = tree.node(row.id);
            let scaffold = row_prefix(row, node.is_leaf(), node.expanded);
            let mut label_style = match node.highlight {
                Highlight::Normal => Style::default().fg(Color::White),
                Highlight::Dimmed => Style::default().fg(Color::DarkGray),
                Highlight::Match => Style::default().fg(Color::Yellow),
            };
            if tree.current() == Some(row.id) {
                label_style = label_style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
            }
            let room = width.saturating_sub(scaffold.chars().count());
            Line::from(vec![
                Span::styled(scaffold, Style::default().fg(Color::DarkGray)),
                Span::styled(truncate_text(&node.label, room), label_style),
            ])
        })
        .collect()
}

/// Guide lines and fold marker in front of a row label.
///
/// Top-level rows get no guides; deeper rows draw `│` for every ancestor
/// that still has siblings below it.
pub fn row_prefix(row: &TreeRow, is_leaf: bool, expanded: bool) -> String {
    let mut prefix = String::new();
    if row.depth() > 1 {
        for &last in &row.lineage[1..row.depth() - 1] {
            prefix.push_str(if last { "   " } else { "│  " });
        }
        prefix.push_str(if row.lineage.last() == Some(&true) {
            "└─ "
        } else {
            "├─ "
        });
    }
    if !is_leaf {
        prefix.push_str(if expanded { "▾ " } else { "▸ " });
    }
    prefix
}

/// Color the detail text: target source lines, headings and call lines.
pub fn detail_lines(text: &str) -> Vec<Line<'static>> {
    text.lines()
        .map(|line| {
            let style = if line.starts_with(TARGET_MARK) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if line.starts_with('#') {
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)
            } else if line.contains(" -> ") {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Line::from(Span::styled(line.to_string(), style))
        })
        .collect()
}

fn truncate_text(text: &str, max_width: usize) -> String {
    if text.chars().count() <= max_width {
        return text.to_string();
    }
    if max_width <= 3 {
        return text.chars().take(max_width).collect();
    }
    let mut out = text
        .chars()
        .take(max_width.saturating_sub(3))
        .collect::<String>();
    out.push_str("...");
    out
}

pub(crate) fn centered_rect(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let vertical = Layout::vertical([
        Constraint::Percentage((100 - height_percent) / 2),
        Constraint::Percentage(height_percent),
        Constraint::Percentage((100 - height_percent) / 2),
    ])
    .flex(Flex::Center)
    .split(area);
    Layout::horizontal([
        Constraint::Percentage((100 - width_percent) / 2),
        Constraint::Percentage(width_percent),
        Constraint::Percentage((100 - width_percent) / 2),
    ])
    .flex(Flex::Center)
    .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lineage: &[bool]) -> TreeRow {
        let tree = Tree::new("");
        TreeRow {
            id: tree.root(),
            lineage: lineage.to_vec(),
        }
    }

    #[test]
    fn top_level_rows_have_no_guides() {
        assert_eq!(row_prefix(&row(&[false]), true, true), "");
        assert_eq!(row_prefix(&row(&[true]), false, true), "▾ ");
        assert_eq!(row_prefix(&row(&[true]), false, false), "▸ ");
    }

    #[test]
    fn nested_rows_draw_guides_for_open_ancestors() {
        assert_eq!(row_prefix(&row(&[false, true]), true, true), "└─ ");
        assert_eq!(row_prefix(&row(&[false, false, true]), true, true), "│  └─ ");
        assert_eq!(row_prefix(&row(&[false, true, false]), true, true), "   ├─ ");
    }

    #[test]
    fn detail_lines_emphasize_target_line() {
        let text = format!("a -> b (src/lib.rs:3)\n     2  x\n{TARGET_MARK}    3  y\n");
        let lines = detail_lines(&text);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Cyan));
        assert_eq!(lines[1].spans[0].style.fg, None);
        assert_eq!(lines[2].spans[0].style.fg, Some(Color::Yellow));
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_text("main", 10), "main");
        assert_eq!(truncate_text("app::very_long_name", 8), "app::...");
    }

    #[test]
    fn full_screen_gives_the_whole_area_to_detail() {
        let area = Rect::new(0, 0, 80, 24);
        let areas = layout(area, true);
        assert_eq!(areas.detail, area);
        assert_eq!(areas.tree, Rect::default());
        assert_eq!(areas.detail_rows(true), 24);

        let normal = layout(area, false);
        assert!(normal.detail.width > normal.tree.width);
        assert_eq!(normal.search.height, 3);
        assert!(normal.tree_rows() >= 1);
    }

    #[test]
    fn tree_lines_skip_scrolled_rows() {
        let mut tree = Tree::new("");
        let root = tree.root();
        let a = tree.add_child(root, "a", Vec::new());
        tree.add_child(root, "b", Vec::new());
        tree.set_current(Some(a));
        let rows = tree.visible_rows();
        let lines = tree_lines(&tree, &rows, 1, 5, 40);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans[1].content, "b");
    }
}
