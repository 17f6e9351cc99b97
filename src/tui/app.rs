//! Explorer state and the terminal event loop.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use tracing::{debug, error, info, warn};

use crate::backend::LoadedGraph;
use crate::config::{self, Config, SearchMode};
use crate::explore::NoiseFilter;
use crate::explore::builder::TreeBuilder;
use crate::explore::context::path_summary;
use crate::explore::nav::{Navigator, Region, TreeKey, TreeKeyOutcome};
use crate::explore::search::{clear_formatting, highlight_text_matches, mark_matches};
use crate::explore::tree::{Tree, TreeNodeId, TreeRow};
use crate::graph::model::{CallGraph, NodeId};
use crate::tui::input::{self, Action};
use crate::tui::render::{self, HELP_TEXT, RenderData, STATUS_HINT};
use crate::tui::settings::{self, SettingsEvent, SettingsPanelState};

pub struct App {
    graph: CallGraph,
    roots: Vec<NodeId>,
    config: Config,
    config_path: PathBuf,
    noise: NoiseFilter,
    tree: Tree,
    nav: Navigator,
    needle: String,
    detail: String,
    detail_scroll: usize,
    follow_detail_end: bool,
    show_help: bool,
    show_settings: bool,
    settings_state: SettingsPanelState,
    status: Option<String>,
    /// Leaf to deepen once the "expanding" status has been drawn.
    pending_deepen: Option<TreeNodeId>,
    tree_scroll: usize,
    tree_view_rows: usize,
    detail_view_rows: usize,
}

impl App {
    pub fn new(loaded: LoadedGraph, config: Config, config_path: PathBuf) -> Self {
        let LoadedGraph {
            graph,
            requested_packages,
            ..
        } = loaded;
        let roots = graph.roots(&requested_packages);
        info!(roots = roots.len(), nodes = graph.len(), "starting explorer");

        let mut app = Self {
            graph,
            roots,
            noise: NoiseFilter::from_config(&config),
            config,
            config_path,
            tree: Tree::new("callers"),
            nav: Navigator::default(),
            needle: String::new(),
            detail: String::new(),
            detail_scroll: 0,
            follow_detail_end: true,
            show_help: false,
            show_settings: false,
            settings_state: SettingsPanelState::default(),
            status: None,
            pending_deepen: None,
            tree_scroll: 0,
            tree_view_rows: 1,
            detail_view_rows: 1,
        };
        app.rebuild();
        app
    }

    /// Regenerate the whole tree for the current needle, search mode and noise setting.
    fn rebuild(&mut self) {
        let builder = TreeBuilder::new(&self.graph, &self.noise);
        let step = self.config.expand_step;

        if self.needle.is_empty() {
            builder.rebuild(&mut self.tree, &self.roots, step, None);
            clear_formatting(&mut self.tree, true);
            self.tree.set_current(None);
        } else {
            match self.config.search_mode {
                SearchMode::Name => {
                    let matches = mark_matches(&self.graph, &self.roots, &self.needle, &self.noise);
                    builder.rebuild(&mut self.tree, &self.roots, step, Some(&matches));
                    clear_formatting(&mut self.tree, true);
                    let first = self.tree.next_row(None);
                    self.tree.set_current(first);
                }
                SearchMode::Text => {
                    builder.rebuild(&mut self.tree, &self.roots, step, None);
                    let hits = highlight_text_matches(&mut self.tree, &self.graph, &self.needle);
                    debug!(hits = hits.len(), "highlighted text matches");
                }
            }
        }

        self.tree_scroll = 0;
        self.refresh_detail();
    }

    fn refresh_detail(&mut self) {
        if self.show_help {
            self.detail = HELP_TEXT.to_string();
            self.detail_scroll = 0;
            self.follow_detail_end = false;
        } else {
            self.detail = self.summary_of_current();
            self.follow_detail_end = true;
        }
    }

    fn summary_of_current(&self) -> String {
        let Some(id) = self.tree.current() else {
            return self.overview();
        };
        let node = self.tree.node(id);
        match &node.payload {
            Some(path) => path_summary(&self.graph, path, true, self.config.context_lines),
            None => {
                error!(label = %node.label, "tree node carries no call path");
                "error".to_string()
            }
        }
    }

    fn overview(&self) -> String {
        format!(
            "{} functions in the call graph, {} roots in the requested packages.\n\n\
             Select a row to see its call path with source context.",
            self.graph.len(),
            self.roots.len()
        )
    }

    /// Returns `true` when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.status = None;

        if self.show_settings {
            let previous = self.config.clone();
            match settings::handle_key(key, &mut self.settings_state, &mut self.config) {
                SettingsEvent::Changed => self.apply_config(&previous),
                SettingsEvent::Close => self.show_settings = false,
                SettingsEvent::None => {}
            }
            return false;
        }

        match input::action_for_key(key, self.nav.focused()) {
            Action::Quit => return true,
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                self.refresh_detail();
            }
            Action::FocusSearch => self.nav.focus(Region::Search),
            Action::ToggleFullScreen => {
                let full = self.nav.toggle_full_screen();
                debug!(full, "toggled full screen");
            }
            Action::FocusNext => {
                self.nav.focus_next();
            }
            Action::FocusPrev => {
                self.nav.focus_prev();
            }
            Action::ToggleSearchMode => {
                let previous = self.config.clone();
                self.config.search_mode = self.config.search_mode.toggled();
                self.apply_config(&previous);
                self.status
                    .get_or_insert_with(|| format!("search mode: {}", self.config.search_mode.label()));
            }
            Action::ToggleNoise => {
                let previous = self.config.clone();
                self.config.include_noise = !self.config.include_noise;
                self.apply_config(&previous);
            }
            Action::OpenSettings => self.show_settings = true,
            Action::Tree(key) => self.tree_key(key),
            Action::ScrollDetail(delta) => {
                if self.follow_detail_end {
                    self.detail_scroll = self.max_detail_scroll();
                    self.follow_detail_end = false;
                }
                self.detail_scroll = self
                    .detail_scroll
                    .saturating_add_signed(delta)
                    .min(self.max_detail_scroll());
            }
            Action::ScrollDetailEnd => self.follow_detail_end = true,
            Action::InputChar(c) => {
                self.needle.push(c);
                self.on_needle_changed();
            }
            Action::Backspace => {
                if self.needle.pop().is_some() {
                    self.on_needle_changed();
                }
            }
            Action::SubmitText | Action::Cancel => self.nav.focus(Region::Tree),
            Action::Noop => {}
        }
        false
    }

    fn on_needle_changed(&mut self) {
        info!(needle = %self.needle, mode = self.config.search_mode.label(), "search changed");
        self.rebuild();
    }

    fn tree_key(&mut self, key: TreeKey) {
        let before = self.tree.current();
        match self.nav.on_tree_key(&mut self.tree, key) {
            TreeKeyOutcome::Handled => {}
            TreeKeyOutcome::Default => self.nav.default_move(&mut self.tree, key),
            TreeKeyOutcome::Deepen(id) => {
                self.status = Some(format!("expanding node {:?}", self.callee_of(id)));
                self.pending_deepen = Some(id);
            }
        }
        if self.tree.current() != before {
            self.show_help = false;
            self.refresh_detail();
        }
    }

    fn callee_of(&self, id: TreeNodeId) -> &str {
        let node = self.tree.node(id);
        match node.payload.as_ref().and_then(|path| path.last()) {
            Some(edge) => self.graph.display(edge.callee),
            None => &node.label,
        }
    }

    /// Run work that was deferred until after a redraw. Returns `true` if
    /// anything ran and the screen needs drawing again.
    pub fn run_pending(&mut self) -> bool {
        let Some(id) = self.pending_deepen.take() else {
            return false;
        };
        self.deepen(id);
        true
    }

    fn deepen(&mut self, id: TreeNodeId) {
        let builder = TreeBuilder::new(&self.graph, &self.noise);
        match builder.deepen(&mut self.tree, id, self.config.expand_step) {
            Ok(added) => {
                info!(callee = self.callee_of(id), added, "expanded leaf");
                self.status = (added == 0).then(|| "no further calls below this node".to_string());
            }
            Err(err) => {
                warn!("cannot expand leaf: {err:#}");
                self.status = Some(format!("cannot expand: {err}"));
            }
        }
        clear_formatting(&mut self.tree, true);
        self.tree.set_expanded(id, true);
        self.refresh_detail();
    }

    /// Persist the config and redo whatever the changed values affect.
    fn apply_config(&mut self, previous: &Config) {
        self.noise = NoiseFilter::from_config(&self.config);
        if let Err(err) = self.persist_config() {
            warn!("{err:#}");
            self.status = Some(format!("settings not saved: {err}"));
        }

        let reshapes_tree = previous.include_noise != self.config.include_noise
            || previous.noise_prefixes != self.config.noise_prefixes
            || previous.expand_step != self.config.expand_step
            || (previous.search_mode != self.config.search_mode && !self.needle.is_empty());
        if reshapes_tree {
            self.rebuild();
        } else {
            self.refresh_detail();
        }
    }

    fn persist_config(&self) -> Result<()> {
        fs::write(&self.config_path, config::serialize(&self.config))
            .with_context(|| format!("writing {}", self.config_path.display()))
    }

    fn max_detail_scroll(&self) -> usize {
        self.detail
            .lines()
            .count()
            .saturating_sub(self.detail_view_rows)
    }

    fn update_tree_scroll(&mut self, rows: &[TreeRow]) {
        let Some(pos) = self
            .tree
            .current()
            .and_then(|id| rows.iter().position(|r| r.id == id))
        else {
            self.tree_scroll = self.tree_scroll.min(rows.len().saturating_sub(1));
            return;
        };
        let view = self.tree_view_rows.max(1);
        if pos < self.tree_scroll {
            self.tree_scroll = pos;
        } else if pos >= self.tree_scroll + view {
            self.tree_scroll = pos + 1 - view;
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let full_screen = self.nav.is_full_screen();
        let areas = render::layout(frame.area(), full_screen);
        self.tree_view_rows = areas.tree_rows();
        self.detail_view_rows = areas.detail_rows(full_screen);

        let rows = self.tree.visible_rows();
        self.update_tree_scroll(&rows);
        self.detail_scroll = if self.follow_detail_end {
            self.max_detail_scroll()
        } else {
            self.detail_scroll.min(self.max_detail_scroll())
        };

        let data = RenderData {
            tree: &self.tree,
            rows: &rows,
            tree_scroll: self.tree_scroll,
            root_count: self.roots.len(),
            needle: &self.needle,
            search_mode: self.config.search_mode,
            include_noise: self.config.include_noise,
            detail: &self.detail,
            detail_title: if self.show_help { "HELP" } else { "CALL PATH" },
            detail_scroll: u16::try_from(self.detail_scroll).unwrap_or(u16::MAX),
            focus: self.nav.focused(),
            full_screen,
            status: self.status.as_deref().unwrap_or(STATUS_HINT),
        };
        render::draw(frame, &data);

        if self.show_settings {
            settings::draw(frame, &self.settings_state, &self.config);
        }
    }
}

pub fn run(loaded: LoadedGraph, config: Config, config_path: PathBuf) -> Result<()> {
    let mut app = App::new(loaded, config, config_path);

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let _guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|f| app.draw(f))?;
        if app.run_pending() {
            continue;
        }
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if matches!(key.kind, KeyEventKind::Release | KeyEventKind::Repeat) {
                continue;
            }
            if app.handle_key(key) {
                break;
            }
        }
    }

    info!("explorer closed");
    Ok(())
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explore::tree::Highlight;
    use crate::graph::model::fixture::{GraphFixture, packages};
    use crate::workspace::CONFIG_FILE;
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::backend::TestBackend;
    use tempfile::TempDir;

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut App, c: char) -> bool {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn labels(app: &App, id: TreeNodeId) -> Vec<String> {
        app.tree
            .children(id)
            .iter()
            .map(|c| app.tree.node(*c).label.clone())
            .collect()
    }

    fn find(app: &App, prefix: &str) -> TreeNodeId {
        app.tree
            .descendants(app.tree.root())
            .into_iter()
            .find(|id| app.tree.node(*id).label.starts_with(prefix))
            .unwrap_or_else(|| panic!("no tree node {prefix}"))
    }

    /// main -> helperA -> target, main -> helperB, other -> <std> len
    fn app_with(config: Config, dir: &TempDir) -> App {
        let mut fx = GraphFixture::new();
        let main = fx.node("main");
        let helper_a = fx.node("helperA");
        let helper_b = fx.node("helperB");
        let target = fx.node("target");
        let other = fx.node("other");
        let len = fx.node_in("len", "<external>", Some("<std>"));
        fx.call(main, helper_a);
        fx.call(helper_a, target);
        fx.call(main, helper_b);
        fx.call(other, len);

        let loaded = LoadedGraph {
            graph: fx.graph,
            requested_packages: packages(&["app"]),
            diagnostics: Vec::new(),
        };
        App::new(loaded, config, dir.path().join(CONFIG_FILE))
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(200, 40)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn starts_with_every_root_expanded() {
        let dir = TempDir::new().unwrap();
        let app = app_with(Config::default(), &dir);
        let root = app.tree.root();
        assert_eq!(labels(&app, root), vec!["app::main", "app::other"]);
        let main = find(&app, "app::main");
        assert_eq!(labels(&app, main), vec!["app::helperA", "app::helperB"]);
        assert!(labels(&app, find(&app, "app::other")).is_empty(), "std noise hidden");
        assert!(app.detail.contains("2 roots"));
    }

    #[test]
    fn name_search_prunes_to_matching_branches() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        ctrl(&mut app, 's');
        assert_eq!(app.nav.focused(), Region::Search);
        type_text(&mut app, "target");

        let root = app.tree.root();
        assert_eq!(labels(&app, root), vec!["app::main"]);
        let main = find(&app, "app::main");
        assert_eq!(labels(&app, main), vec!["app::helperA"]);
        assert_eq!(app.tree.current(), Some(main));

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.nav.focused(), Region::Tree);
    }

    #[test]
    fn clearing_the_needle_restores_the_full_tree() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        ctrl(&mut app, 's');
        type_text(&mut app, "zz");
        assert!(app.tree.children(app.tree.root()).is_empty());

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.tree.children(app.tree.root()).len(), 2);
        assert_eq!(app.tree.current(), None);
    }

    #[test]
    fn text_search_highlights_without_pruning() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            search_mode: SearchMode::Text,
            ..Config::default()
        };
        let mut app = app_with(config, &dir);
        ctrl(&mut app, 's');
        type_text(&mut app, "helperB");

        assert_eq!(app.tree.children(app.tree.root()).len(), 2);
        let helper_b = find(&app, "app::helperB");
        assert_eq!(app.tree.node(helper_b).highlight, Highlight::Match);
        let other = find(&app, "app::other");
        assert_eq!(app.tree.node(other).highlight, Highlight::Dimmed);
        assert!(app.tree.current().is_some());
    }

    #[test]
    fn enter_on_a_leaf_deepens_after_redraw() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            expand_step: 1,
            ..Config::default()
        };
        let mut app = app_with(config, &dir);
        let helper_a = find(&app, "app::helperA");
        assert!(app.tree.node(helper_a).label.ends_with(" ..."));
        assert!(app.tree.node(helper_a).is_leaf());

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.tree.current(), Some(helper_a));

        press(&mut app, KeyCode::Enter);
        assert!(app.status.as_deref().unwrap_or("").starts_with("expanding node"));
        assert!(app.tree.node(helper_a).is_leaf(), "deferred until run_pending");

        assert!(app.run_pending());
        assert!(!app.run_pending());
        let children = labels(&app, helper_a);
        assert_eq!(children.len(), 1);
        assert!(children[0].starts_with("app::target"));
        assert!(app.tree.node(helper_a).expanded);
    }

    #[test]
    fn ctrl_n_shows_noise_and_saves_config() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        ctrl(&mut app, 'n');

        let other = find(&app, "app::other");
        assert_eq!(labels(&app, other), vec!["<external>::len"]);
        let saved = config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.include_noise);
    }

    #[test]
    fn help_toggles_detail_text() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.detail, HELP_TEXT);
        press(&mut app, KeyCode::Char('?'));
        assert!(app.detail.contains("roots in the requested packages"));
    }

    #[test]
    fn selecting_a_row_shows_its_call_path() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Right);
        assert!(app.detail.contains("app::main -> app::helperA"));
        assert!(app.detail.starts_with("(none) -> app::main"));
    }

    #[test]
    fn drawing_shows_search_label_and_full_screen_hides_tree() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        let normal = screen(&mut app);
        assert!(normal.contains("Search all callsites (2 roots)"));
        assert!(normal.contains("CALL TREE"));

        ctrl(&mut app, 'f');
        let full = screen(&mut app);
        assert!(!full.contains("CALL TREE"));
        assert!(full.contains("roots in the requested packages"));
    }

    #[test]
    fn quit_key_ends_the_loop() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Config::default(), &dir);
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(ctrl(&mut app, 'q'));
    }
}
