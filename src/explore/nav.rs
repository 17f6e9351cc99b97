//! Keyboard navigation over the explored tree and focus handling between panes.

use crate::explore::tree::{Tree, TreeNodeId};

/// Focusable panes, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Tree,
    Search,
    Detail,
}

pub const REGIONS: [Region; 3] = [Region::Tree, Region::Search, Region::Detail];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

/// What the caller should do after [`Navigator::on_tree_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKeyOutcome {
    /// Fully handled.
    Handled,
    /// Fall back to plain row movement, see [`Navigator::default_move`].
    Default,
    /// Expand this leaf further, then mark it expanded.
    Deepen(TreeNodeId),
}

#[derive(Debug, Clone, Default)]
pub struct Navigator {
    focus_idx: usize,
    full_screen: bool,
}

impl Navigator {
    pub fn focused(&self) -> Region {
        REGIONS[self.focus_idx % REGIONS.len()]
    }

    pub fn focus_next(&mut self) -> Region {
        self.focus_idx = (self.focus_idx + 1) % REGIONS.len();
        self.focused()
    }

    pub fn focus_prev(&mut self) -> Region {
        self.focus_idx = (self.focus_idx + REGIONS.len() - 1) % REGIONS.len();
        self.focused()
    }

    pub fn focus(&mut self, region: Region) {
        if let Some(idx) = REGIONS.iter().position(|r| *r == region) {
            self.focus_idx = idx;
        }
    }

    pub fn is_full_screen(&self) -> bool {
        self.full_screen
    }

    /// Switch between the detail pane alone and the full layout.
    pub fn toggle_full_screen(&mut self) -> bool {
        self.full_screen = !self.full_screen;
        self.full_screen
    }

    /// Sibling-wise movement instead of the row-wise default.
    pub fn on_tree_key(&self, tree: &mut Tree, key: TreeKey) -> TreeKeyOutcome {
        let Some(cur) = tree.current() else {
            return TreeKeyOutcome::Default;
        };

        match key {
            TreeKey::Down => match sibling(tree, cur, 1) {
                Some(next) => {
                    tree.set_current(Some(next));
                    TreeKeyOutcome::Handled
                }
                None => TreeKeyOutcome::Default,
            },
            TreeKey::Up => match sibling(tree, cur, -1) {
                Some(prev) => {
                    tree.set_current(Some(prev));
                    TreeKeyOutcome::Handled
                }
                None => TreeKeyOutcome::Default,
            },
            TreeKey::Left => match tree.parent(cur) {
                Some(parent) if parent != tree.root() => {
                    tree.set_current(Some(parent));
                    TreeKeyOutcome::Handled
                }
                _ => TreeKeyOutcome::Default,
            },
            TreeKey::Right => TreeKeyOutcome::Default,
            TreeKey::Enter => {
                let node = tree.node(cur);
                if node.is_leaf() {
                    TreeKeyOutcome::Deepen(cur)
                } else {
                    let expanded = node.expanded;
                    tree.set_expanded(cur, !expanded);
                    TreeKeyOutcome::Handled
                }
            }
        }
    }

    /// Plain tree-view behavior: step to the next or previous visible row.
    pub fn default_move(&self, tree: &mut Tree, key: TreeKey) {
        let cur = tree.current();
        let target = match key {
            TreeKey::Down | TreeKey::Right => tree.next_row(cur),
            TreeKey::Up => tree.prev_row(cur),
            TreeKey::Left | TreeKey::Enter => None,
        };
        if target.is_some() {
            tree.set_current(target);
        } else if cur.is_none() {
            tree.set_current(tree.next_row(None));
        }
    }
}

fn sibling(tree: &Tree, id: TreeNodeId, delta: isize) -> Option<TreeNodeId> {
    let parent = tree.parent(id)?;
    let siblings = tree.children(parent);
    let pos = siblings.iter().position(|s| *s == id)?;
    let target = pos.checked_add_signed(delta)?;
    siblings.get(target).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{Edge, NodeId};

    fn tree() -> (Tree, [TreeNodeId; 5]) {
        let mut tree = Tree::new("Functions");
        let root = tree.root();
        let path = vec![Edge::synthetic(NodeId(0))];
        let a = tree.add_child(root, "a", path.clone());
        let a1 = tree.add_child(a, "a1", path.clone());
        let a2 = tree.add_child(a, "a2", path.clone());
        let b = tree.add_child(root, "b", path.clone());
        let c = tree.add_child(root, "c", path);
        (tree, [a, a1, a2, b, c])
    }

    #[test]
    fn down_skips_over_children_to_next_sibling() {
        let (mut tree, [a, _, _, b, _]) = tree();
        let nav = Navigator::default();
        tree.set_current(Some(a));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Down), TreeKeyOutcome::Handled);
        assert_eq!(tree.current(), Some(b));
    }

    #[test]
    fn down_on_last_child_falls_back_to_next_row() {
        let (mut tree, [_, _, a2, b, _]) = tree();
        let nav = Navigator::default();
        tree.set_current(Some(a2));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Down), TreeKeyOutcome::Default);
        nav.default_move(&mut tree, TreeKey::Down);
        assert_eq!(tree.current(), Some(b));
    }

    #[test]
    fn up_moves_to_previous_sibling_or_row() {
        let (mut tree, [a, a1, a2, b, _]) = tree();
        let nav = Navigator::default();
        tree.set_current(Some(b));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Up), TreeKeyOutcome::Handled);
        assert_eq!(tree.current(), Some(a));

        tree.set_current(Some(a2));
        nav.on_tree_key(&mut tree, TreeKey::Up);
        assert_eq!(tree.current(), Some(a1));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Up), TreeKeyOutcome::Default);
        nav.default_move(&mut tree, TreeKey::Up);
        assert_eq!(tree.current(), Some(a));
    }

    #[test]
    fn left_goes_to_parent_but_never_to_hidden_root() {
        let (mut tree, [a, _, a2, _, _]) = tree();
        let nav = Navigator::default();
        tree.set_current(Some(a2));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Left), TreeKeyOutcome::Handled);
        assert_eq!(tree.current(), Some(a));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Left), TreeKeyOutcome::Default);
        assert_eq!(tree.current(), Some(a));
    }

    #[test]
    fn right_is_plain_row_movement() {
        let (mut tree, [a, a1, _, _, _]) = tree();
        let nav = Navigator::default();
        tree.set_current(Some(a));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Right), TreeKeyOutcome::Default);
        nav.default_move(&mut tree, TreeKey::Right);
        assert_eq!(tree.current(), Some(a1));
    }

    #[test]
    fn enter_toggles_or_requests_deepening() {
        let (mut tree, [a, _, _, b, _]) = tree();
        let nav = Navigator::default();
        tree.set_current(Some(a));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Enter), TreeKeyOutcome::Handled);
        assert!(!tree.node(a).expanded);
        nav.on_tree_key(&mut tree, TreeKey::Enter);
        assert!(tree.node(a).expanded);

        tree.set_current(Some(b));
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Enter), TreeKeyOutcome::Deepen(b));
    }

    #[test]
    fn no_current_node_selects_first_row() {
        let (mut tree, [a, ..]) = tree();
        let nav = Navigator::default();
        assert_eq!(nav.on_tree_key(&mut tree, TreeKey::Down), TreeKeyOutcome::Default);
        nav.default_move(&mut tree, TreeKey::Down);
        assert_eq!(tree.current(), Some(a));
    }

    #[test]
    fn focus_cycles_in_both_directions() {
        let mut nav = Navigator::default();
        assert_eq!(nav.focused(), Region::Tree);
        assert_eq!(nav.focus_next(), Region::Search);
        assert_eq!(nav.focus_next(), Region::Detail);
        assert_eq!(nav.focus_next(), Region::Tree);
        assert_eq!(nav.focus_prev(), Region::Detail);

        nav.focus(Region::Search);
        assert_eq!(nav.focus_next(), Region::Detail);
    }

    #[test]
    fn full_screen_toggle_keeps_tree_state() {
        let (mut tree, [_, _, _, b, _]) = tree();
        tree.set_current(Some(b));
        let mut nav = Navigator::default();
        assert!(nav.toggle_full_screen());
        assert_eq!(tree.current(), Some(b));
        assert!(!nav.toggle_full_screen());
        assert!(!nav.is_full_screen());
    }
}
