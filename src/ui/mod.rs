mod helpers;
mod tree;
mod types;

use std::collections::HashSet;
use std::io::Stdout;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders};
use ratatui::Terminal;

use crate::config::Config;
use crate::feedback::{self, FeedbackEntry};
use crate::github::GithubClient;
use crate::parser;
use crate::sanitize;
use crate::syntax::Highlighter;
use crate::types::{DiffFile, PullRequest, RowKind, SplitRow};

use helpers::{
    fill_area, format_relative_time, open_in_browser, restore_terminal, setup_terminal,
    truncate_or_pad, wrap_text,
};
pub use types::{Focus, HelpMode, LoadingState, PanelState, Screen, StateFilter};
use types::{TreeItem, TreeNode};

const BG_COLOR: Color = Color::Rgb(22, 22, 22);
const DEL_BG: Color = Color::Rgb(60, 30, 30);
const ADD_BG: Color = Color::Rgb(30, 60, 30);
const HEADER_BG: Color = Color::Rgb(30, 30, 40);
const CURSOR_BG: Color = Color::Rgb(45, 45, 65);

/// Trigger comment bodies understood by the upstream bot
const TRIGGER_IMPROVE: &str = "/improve";
const TRIGGER_REVIEW: &str = "/review";

/// After posting a trigger, poll for fresh feedback this many times
const TRIGGER_POLL_ATTEMPTS: u32 = 10;
const TRIGGER_POLL_DELAY: Duration = Duration::from_secs(3);

const PANEL_WIDTH_MIN: u16 = 20;
const PANEL_WIDTH_MAX: u16 = 80;

type Tagged<T> = (u32, T);

enum ChannelEvent<T> {
    Pending,
    Message(T),
    Disconnected,
}

/// Poll a result channel without blocking. A disconnected channel means the
/// worker died before sending; callers must clear the waiting state so no
/// panel is stuck on "Loading" forever.
fn poll_channel<T>(receiver: Option<&mpsc::Receiver<T>>) -> ChannelEvent<T> {
    match receiver {
        None => ChannelEvent::Pending,
        Some(rx) => match rx.try_recv() {
            Ok(msg) => ChannelEvent::Message(msg),
            Err(mpsc::TryRecvError::Empty) => ChannelEvent::Pending,
            Err(mpsc::TryRecvError::Disconnected) => ChannelEvent::Disconnected,
        },
    }
}

const WORKER_DIED: &str = "background task exited unexpectedly";

/// Application state.
///
/// The controller owns every "currently selected" pointer and is the only
/// writer; background fetches report through channels and are applied on the
/// event loop.
pub struct App {
    screen: Screen,
    loading: LoadingState,
    config: Config,
    client: GithubClient,

    // PR list
    prs: Vec<PullRequest>,
    filtered_pr_indices: Vec<usize>,
    selected_pr: usize,
    state_filter: StateFilter,
    pr_search_mode: bool,
    pr_search_query: String,
    // A background list refresh is running; the stale list stays visible
    refreshing: bool,

    // Active selection; the staleness key for in-flight results
    current_pr: Option<PullRequest>,

    // Feedback panel
    feedback_panel: PanelState,
    feedback_entries: Vec<FeedbackEntry>,
    feedback_scroll: usize,

    // Diff panel
    diff_panel: PanelState,
    pub(crate) files: Vec<DiffFile>,
    pub(crate) filtered_indices: Vec<usize>,
    selected_file: usize,
    scroll_offset: usize,
    tree_cursor: usize,
    file_search_mode: bool,
    file_search_query: String,
    pub(crate) collapsed_folders: HashSet<String>,
    pub(crate) cached_tree: Option<Vec<TreeNode>>,
    pub(crate) cached_flat_items: Option<Vec<TreeItem>>,

    focus: Focus,
    help_mode: HelpMode,
    should_quit: bool,
    highlighter: Highlighter,

    // A trigger comment is in flight; shown in the footer
    trigger_pending: Option<String>,

    // Async receivers; results are tagged with the PR number they belong to
    pr_list_receiver: Option<mpsc::Receiver<Result<Vec<PullRequest>, String>>>,
    feedback_receiver: Option<mpsc::Receiver<Tagged<Result<Vec<FeedbackEntry>, String>>>>,
    files_receiver: Option<mpsc::Receiver<Tagged<Result<Vec<DiffFile>, String>>>>,
    trigger_receiver: Option<mpsc::Receiver<Tagged<Result<(Vec<FeedbackEntry>, bool), String>>>>,
}

impl App {
    /// Create the app on the PR list screen
    pub fn new_with_prs(
        config: Config,
        client: GithubClient,
        prs: Vec<PullRequest>,
        refresh_on_start: bool,
    ) -> Self {
        let highlighter = Highlighter::new(&config.display.theme, config.display.min_brightness);
        let pr_count = prs.len();

        let mut app = Self {
            screen: Screen::PrList,
            loading: LoadingState::Idle,
            config,
            client,

            prs,
            filtered_pr_indices: (0..pr_count).collect(),
            selected_pr: 0,
            state_filter: StateFilter::All,
            pr_search_mode: false,
            pr_search_query: String::new(),
            refreshing: false,

            current_pr: None,

            feedback_panel: PanelState::Loading,
            feedback_entries: Vec::new(),
            feedback_scroll: 0,

            diff_panel: PanelState::Loading,
            files: Vec::new(),
            filtered_indices: Vec::new(),
            selected_file: 0,
            scroll_offset: 0,
            tree_cursor: 0,
            file_search_mode: false,
            file_search_query: String::new(),
            collapsed_folders: HashSet::new(),
            cached_tree: None,
            cached_flat_items: None,

            focus: Focus::Tree,
            help_mode: HelpMode::None,
            should_quit: false,
            highlighter,

            trigger_pending: None,

            pr_list_receiver: None,
            feedback_receiver: None,
            files_receiver: None,
            trigger_receiver: None,
        };

        if refresh_on_start {
            app.refresh_pr_list();
        }
        app
    }

    /// Create the app directly on the review screen (direct PR URL mode)
    pub fn new_for_pr(config: Config, client: GithubClient, pr: PullRequest) -> Self {
        let mut app = Self::new_with_prs(config, client, Vec::new(), false);
        app.open_review(pr);
        app
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        // Panel width is UI state that persists across runs
        self.config.save();
        result
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.drain_receivers();

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn drain_receivers(&mut self) {
        match poll_channel(self.pr_list_receiver.as_ref()) {
            ChannelEvent::Message(result) => {
                self.apply_pr_list_result(result);
                self.pr_list_receiver = None;
            }
            ChannelEvent::Disconnected => {
                self.pr_list_receiver = None;
                self.refreshing = false;
                self.loading = LoadingState::Error(WORKER_DIED.to_string());
            }
            ChannelEvent::Pending => {}
        }

        match poll_channel(self.feedback_receiver.as_ref()) {
            ChannelEvent::Message((number, result)) => {
                self.apply_feedback_result(number, result);
                self.feedback_receiver = None;
            }
            ChannelEvent::Disconnected => {
                self.feedback_receiver = None;
                self.feedback_panel = PanelState::Failed(WORKER_DIED.to_string());
            }
            ChannelEvent::Pending => {}
        }

        match poll_channel(self.files_receiver.as_ref()) {
            ChannelEvent::Message((number, result)) => {
                self.apply_files_result(number, result);
                self.files_receiver = None;
            }
            ChannelEvent::Disconnected => {
                self.files_receiver = None;
                self.diff_panel = PanelState::Failed(WORKER_DIED.to_string());
            }
            ChannelEvent::Pending => {}
        }

        match poll_channel(self.trigger_receiver.as_ref()) {
            ChannelEvent::Message((number, result)) => {
                self.apply_trigger_result(number, result);
                self.trigger_receiver = None;
            }
            ChannelEvent::Disconnected => {
                self.trigger_receiver = None;
                self.trigger_pending = None;
                self.loading = LoadingState::Error(WORKER_DIED.to_string());
            }
            ChannelEvent::Pending => {}
        }
    }

    // ========================================================================
    // Applying async results (staleness-checked)
    // ========================================================================

    fn is_current(&self, pr_number: u32) -> bool {
        self.current_pr
            .as_ref()
            .map(|pr| pr.number == pr_number)
            .unwrap_or(false)
    }

    fn apply_pr_list_result(&mut self, result: Result<Vec<PullRequest>, String>) {
        self.refreshing = false;
        match result {
            Ok(prs) => {
                crate::cache::save_cache(&self.client.repo().full_name(), &prs);
                self.prs = prs;
                self.update_filtered_pr_indices();
                self.loading = LoadingState::Idle;
            }
            Err(e) => {
                self.loading = LoadingState::Error(format!("Failed to load pull requests: {}", e));
            }
        }
    }

    fn apply_feedback_result(&mut self, pr_number: u32, result: Result<Vec<FeedbackEntry>, String>) {
        if !self.is_current(pr_number) {
            log::info!("discarding stale feedback result for #{}", pr_number);
            return;
        }

        match result {
            Ok(entries) => {
                self.feedback_entries = entries;
                self.feedback_scroll = 0;
                self.feedback_panel = PanelState::Ready;
            }
            Err(e) => {
                self.feedback_panel = PanelState::Failed(e);
            }
        }
    }

    fn apply_files_result(&mut self, pr_number: u32, result: Result<Vec<DiffFile>, String>) {
        if !self.is_current(pr_number) {
            log::info!("discarding stale file list for #{}", pr_number);
            return;
        }

        match result {
            Ok(files) => {
                let count = files.len();
                self.files = files;
                self.filtered_indices = (0..count).collect();
                // First file selected by default
                self.selected_file = 0;
                self.scroll_offset = 0;
                self.tree_cursor = 0;
                self.collapsed_folders.clear();
                self.invalidate_tree_cache();
                self.diff_panel = PanelState::Ready;
            }
            Err(e) => {
                self.diff_panel = PanelState::Failed(e);
            }
        }
    }

    fn apply_trigger_result(
        &mut self,
        pr_number: u32,
        result: Result<(Vec<FeedbackEntry>, bool), String>,
    ) {
        self.trigger_pending = None;

        match result {
            Ok((entries, fresh)) => {
                if self.is_current(pr_number) {
                    self.feedback_entries = entries;
                    self.feedback_panel = PanelState::Ready;
                }
                self.loading = if fresh {
                    LoadingState::Success("New feedback arrived".to_string())
                } else {
                    LoadingState::Success(
                        "Trigger posted; no new feedback within the wait window".to_string(),
                    )
                };
            }
            Err(e) => {
                self.loading = LoadingState::Error(e);
            }
        }
    }

    // ========================================================================
    // PR list state
    // ========================================================================

    fn update_filtered_pr_indices(&mut self) {
        let filter = self.state_filter;
        let needle = self.pr_search_query.clone();
        self.filtered_pr_indices = self
            .prs
            .iter()
            .enumerate()
            .filter(|(_, pr)| filter.matches(pr) && pr.matches(&needle))
            .map(|(i, _)| i)
            .collect();

        if self.selected_pr >= self.filtered_pr_indices.len() {
            self.selected_pr = self.filtered_pr_indices.len().saturating_sub(1);
        }
    }

    /// Refresh the PR list. With rows already on screen (cached or stale)
    /// they stay visible until the fresh list replaces them; with nothing to
    /// show, a full-screen loading state takes over.
    fn refresh_pr_list(&mut self) {
        if self.refreshing {
            return;
        }
        self.refreshing = true;
        if self.prs.is_empty() {
            self.loading = LoadingState::Loading("Loading pull requests...".to_string());
        }

        let client = self.client.clone();
        let per_page = self.config.github.per_page;
        let (tx, rx) = mpsc::channel();
        self.pr_list_receiver = Some(rx);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(async {
                client
                    .list_pull_requests(per_page)
                    .await
                    .map_err(|e| e.to_string())
            });
            let _ = tx.send(result);
        });
    }

    // ========================================================================
    // Review loading
    // ========================================================================

    fn select_pr(&mut self) {
        if self.filtered_pr_indices.is_empty() {
            return;
        }
        let idx = self.filtered_pr_indices[self.selected_pr];
        let pr = self.prs[idx].clone();
        self.open_review(pr);
    }

    /// Enter the review screen for a PR and start both fetches.
    /// Results from any previously selected PR become stale at this point.
    fn open_review(&mut self, pr: PullRequest) {
        let number = pr.number;
        self.current_pr = Some(pr);
        self.screen = Screen::Review;
        self.focus = Focus::Tree;

        self.feedback_panel = PanelState::Loading;
        self.feedback_entries.clear();
        self.feedback_scroll = 0;

        self.diff_panel = PanelState::Loading;
        self.files.clear();
        self.filtered_indices.clear();
        self.file_search_query.clear();
        self.file_search_mode = false;
        self.selected_file = 0;
        self.scroll_offset = 0;
        self.invalidate_tree_cache();

        self.spawn_feedback_fetch(number);
        self.spawn_files_fetch(number);
    }

    fn spawn_feedback_fetch(&mut self, number: u32) {
        let client = self.client.clone();
        let needle = self.config.github.bot_needle.clone();
        let (tx, rx) = mpsc::channel();
        self.feedback_receiver = Some(rx);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(fetch_feedback(&client, number, &needle));
            let _ = tx.send((number, result));
        });
    }

    fn spawn_files_fetch(&mut self, number: u32) {
        let client = self.client.clone();
        let (tx, rx) = mpsc::channel();
        self.files_receiver = Some(rx);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(async {
                client
                    .fetch_changed_files(number)
                    .await
                    .map_err(|e| e.to_string())
            });
            let _ = tx.send((number, result));
        });
    }

    /// Post a trigger comment, then poll for feedback newer than the current
    /// high-water mark instead of sleeping blind.
    fn post_trigger(&mut self, body: &'static str) {
        let Some(pr) = &self.current_pr else {
            return;
        };
        if self.trigger_pending.is_some() {
            return;
        }

        let number = pr.number;
        let client = self.client.clone();
        let needle = self.config.github.bot_needle.clone();
        let baseline = feedback::latest_timestamp(&self.feedback_entries).map(str::to_string);

        self.trigger_pending = Some(format!("{} posted, waiting for fresh feedback...", body));

        let (tx, rx) = mpsc::channel();
        self.trigger_receiver = Some(rx);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(async {
                client
                    .post_issue_comment(number, body)
                    .await
                    .map_err(|e| e.to_string())?;

                let mut last = Vec::new();
                for _ in 0..TRIGGER_POLL_ATTEMPTS {
                    tokio::time::sleep(TRIGGER_POLL_DELAY).await;
                    let merged = fetch_feedback(&client, number, &needle).await?;
                    let newest = feedback::latest_timestamp(&merged).map(str::to_string);
                    if newest > baseline {
                        return Ok((merged, true));
                    }
                    last = merged;
                }
                Ok((last, false))
            });
            let _ = tx.send((number, result));
        });
    }

    fn reload_current_pr(&mut self) {
        if let Some(pr) = self.current_pr.clone() {
            self.open_review(pr);
        }
    }

    // ========================================================================
    // Key handling
    // ========================================================================

    fn handle_key(&mut self, key: KeyEvent) {
        // If loading, only allow quit
        if matches!(self.loading, LoadingState::Loading(_)) {
            if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                self.should_quit = true;
            }
            return;
        }

        // Clear error or success on any key
        if matches!(
            self.loading,
            LoadingState::Error(_) | LoadingState::Success(_)
        ) {
            self.loading = LoadingState::Idle;
            return;
        }

        match self.screen {
            Screen::PrList => self.handle_key_pr_list(key),
            Screen::Review => self.handle_key_review(key),
        }
    }

    fn handle_key_pr_list(&mut self, key: KeyEvent) {
        if self.help_mode != HelpMode::None {
            self.help_mode = HelpMode::None;
            return;
        }

        if self.pr_search_mode {
            match key.code {
                KeyCode::Esc => {
                    self.pr_search_mode = false;
                    self.pr_search_query.clear();
                    self.update_filtered_pr_indices();
                }
                KeyCode::Enter => {
                    self.pr_search_mode = false;
                }
                KeyCode::Backspace => {
                    self.pr_search_query.pop();
                    self.update_filtered_pr_indices();
                }
                KeyCode::Char(c) => {
                    self.pr_search_query.push(c);
                    self.update_filtered_pr_indices();
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if !self.pr_search_query.is_empty() {
                    self.pr_search_query.clear();
                    self.update_filtered_pr_indices();
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('/') => {
                self.pr_search_mode = true;
                self.pr_search_query.clear();
            }
            KeyCode::Char('s') => {
                self.state_filter = self.state_filter.next();
                self.update_filtered_pr_indices();
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.filtered_pr_indices.is_empty()
                    && self.selected_pr + 1 < self.filtered_pr_indices.len()
                {
                    self.selected_pr += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_pr = self.selected_pr.saturating_sub(1);
            }
            KeyCode::Enter => self.select_pr(),
            KeyCode::Char('o') => {
                if let Some(&idx) = self.filtered_pr_indices.get(self.selected_pr) {
                    open_in_browser(&self.prs[idx].html_url);
                }
            }
            KeyCode::Char('R') => self.refresh_pr_list(),
            KeyCode::Char('?') => self.help_mode = HelpMode::PrList,
            _ => {}
        }
    }

    fn handle_key_review(&mut self, key: KeyEvent) {
        if self.help_mode != HelpMode::None {
            self.help_mode = HelpMode::None;
            return;
        }

        if self.file_search_mode {
            match key.code {
                KeyCode::Esc => {
                    self.file_search_mode = false;
                    self.file_search_query.clear();
                    self.update_filtered_file_indices();
                }
                KeyCode::Enter => {
                    self.file_search_mode = false;
                }
                KeyCode::Backspace => {
                    self.file_search_query.pop();
                    self.update_filtered_file_indices();
                }
                KeyCode::Char(c) => {
                    self.file_search_query.push(c);
                    self.update_filtered_file_indices();
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                self.screen = Screen::PrList;
                self.current_pr = None;
                // Direct-URL mode starts with an empty list
                if self.prs.is_empty() {
                    self.refresh_pr_list();
                }
            }
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Char('?') => self.help_mode = HelpMode::Review,
            KeyCode::Char('/') if self.focus == Focus::Tree => {
                self.file_search_mode = true;
                self.file_search_query.clear();
            }
            KeyCode::Char('m') => self.post_trigger(TRIGGER_IMPROVE),
            KeyCode::Char('u') => self.post_trigger(TRIGGER_REVIEW),
            KeyCode::Char('r') => self.reload_current_pr(),
            KeyCode::Char('o') => {
                if let Some(pr) = &self.current_pr {
                    open_in_browser(&pr.html_url);
                }
            }
            KeyCode::Char('b') => {
                let blob = self
                    .files
                    .get(self.selected_file)
                    .and_then(|f| f.blob_url.as_deref());
                if let Some(url) = blob {
                    open_in_browser(url);
                }
            }
            KeyCode::Char('<') => {
                self.config.navigation.panel_width =
                    (self.config.navigation.panel_width.saturating_sub(5)).max(PANEL_WIDTH_MIN);
            }
            KeyCode::Char('>') => {
                self.config.navigation.panel_width =
                    (self.config.navigation.panel_width + 5).min(PANEL_WIDTH_MAX);
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_down(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(1),
            KeyCode::PageDown => {
                let lines = self.config.navigation.scroll_lines;
                self.move_down(lines);
            }
            KeyCode::PageUp => {
                let lines = self.config.navigation.scroll_lines;
                self.move_up(lines);
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right if self.focus == Focus::Tree => {
                self.activate_tree_item();
            }
            KeyCode::Char('h') | KeyCode::Left if self.focus == Focus::Tree => {
                self.collapse_tree_item();
            }
            _ => {}
        }
    }

    fn move_down(&mut self, lines: usize) {
        match self.focus {
            Focus::Tree => {
                self.ensure_flat_items_cached();
                let len = self.get_flat_items().len();
                if len > 0 {
                    self.tree_cursor = (self.tree_cursor + lines).min(len - 1);
                }
            }
            Focus::Diff => self.scroll_offset += lines,
            Focus::Feedback => self.feedback_scroll += lines,
        }
    }

    fn move_up(&mut self, lines: usize) {
        match self.focus {
            Focus::Tree => self.tree_cursor = self.tree_cursor.saturating_sub(lines),
            Focus::Diff => self.scroll_offset = self.scroll_offset.saturating_sub(lines),
            Focus::Feedback => self.feedback_scroll = self.feedback_scroll.saturating_sub(lines),
        }
    }

    fn activate_tree_item(&mut self) {
        self.ensure_flat_items_cached();
        let item = self.get_flat_items().get(self.tree_cursor).cloned();
        match item {
            Some(TreeItem::Folder { path, .. }) => {
                if !self.collapsed_folders.remove(&path) {
                    self.collapsed_folders.insert(path);
                }
                self.invalidate_tree_cache();
            }
            Some(TreeItem::File { index, .. }) => {
                self.selected_file = index;
                self.scroll_offset = 0;
            }
            None => {}
        }
    }

    fn collapse_tree_item(&mut self) {
        self.ensure_flat_items_cached();
        if let Some(TreeItem::Folder { path, .. }) = self.get_flat_items().get(self.tree_cursor) {
            self.collapsed_folders.insert(path.clone());
            self.invalidate_tree_cache();
        }
    }

    fn update_filtered_file_indices(&mut self) {
        let needle = self.file_search_query.to_lowercase();
        self.filtered_indices = self
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| needle.is_empty() || f.path.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();
        self.tree_cursor = 0;
        self.invalidate_tree_cache();
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn render(&mut self, frame: &mut ratatui::Frame) {
        match &self.loading {
            LoadingState::Loading(msg) => {
                let msg = msg.clone();
                self.render_status_screen(frame, &msg, Color::Yellow);
                return;
            }
            LoadingState::Success(msg) => {
                let msg = msg.clone();
                self.render_status_screen(frame, &msg, Color::Green);
                return;
            }
            LoadingState::Error(msg) => {
                let msg = msg.clone();
                self.render_status_screen(frame, &msg, Color::Red);
                return;
            }
            LoadingState::Idle => {}
        }

        match self.screen {
            Screen::PrList => self.render_pr_list(frame),
            Screen::Review => self.render_review(frame),
        }

        if self.help_mode != HelpMode::None {
            self.render_help(frame);
        }
    }

    fn render_status_screen(&self, frame: &mut ratatui::Frame, message: &str, color: Color) {
        let area = frame.area();
        let buf = frame.buffer_mut();
        fill_area(buf, area, BG_COLOR);

        let y = area.y + area.height / 2;
        let x = area
            .x
            .saturating_add((area.width.saturating_sub(message.len() as u16)) / 2);
        buf.set_string(
            x,
            y,
            message,
            Style::default().fg(color).bg(BG_COLOR).add_modifier(Modifier::BOLD),
        );

        let hint = "press any key";
        if !matches!(self.loading, LoadingState::Loading(_)) {
            let hint_x = area
                .x
                .saturating_add((area.width.saturating_sub(hint.len() as u16)) / 2);
            buf.set_string(
                hint_x,
                y + 2,
                hint,
                Style::default().fg(Color::DarkGray).bg(BG_COLOR),
            );
        }
    }

    fn render_pr_list(&self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        let buf = frame.buffer_mut();
        fill_area(buf, area, BG_COLOR);

        // Header bar
        let header_style = Style::default().bg(HEADER_BG);
        for x in area.x..area.x + area.width {
            buf.set_string(x, area.y, " ", header_style);
            buf.set_string(x, area.y + 1, " ", header_style);
        }

        let name = "監視 kanshi";
        buf.set_string(
            area.x + 1,
            area.y,
            name,
            Style::default()
                .fg(Color::Magenta)
                .bg(HEADER_BG)
                .add_modifier(Modifier::BOLD),
        );

        let repo_label = format!(" │ {} ", self.client.repo().full_name());
        buf.set_string(
            area.x + 13,
            area.y,
            &repo_label,
            Style::default().fg(Color::DarkGray).bg(HEADER_BG),
        );

        let filter_label = format!(" state:{} ", self.state_filter.label());
        let filter_x = area.x + 13 + repo_label.len() as u16;
        buf.set_string(
            filter_x,
            area.y,
            &filter_label,
            Style::default().fg(Color::Cyan).bg(HEADER_BG),
        );

        if self.refreshing {
            buf.set_string(
                filter_x + filter_label.len() as u16,
                area.y,
                " refreshing... ",
                Style::default().fg(Color::Yellow).bg(HEADER_BG),
            );
        }

        // Search line
        let search_info = if self.pr_search_mode {
            format!(" /{}_", self.pr_search_query)
        } else if !self.pr_search_query.is_empty() {
            format!(" search:{}", self.pr_search_query)
        } else {
            String::new()
        };
        if !search_info.is_empty() {
            buf.set_string(
                area.x + 1,
                area.y + 1,
                &search_info,
                Style::default().fg(Color::Yellow).bg(HEADER_BG),
            );
        }

        // List content
        let content_area = Rect {
            x: area.x,
            y: area.y + 2,
            width: area.width,
            height: area.height.saturating_sub(3),
        };

        if self.filtered_pr_indices.is_empty() {
            buf.set_string(
                content_area.x + 2,
                content_area.y + 1,
                "No pull requests found.",
                Style::default().fg(Color::DarkGray).bg(BG_COLOR),
            );
        } else {
            let visible = content_area.height as usize;
            let scroll = self.selected_pr.saturating_sub(visible.saturating_sub(1));

            for (row, &idx) in self
                .filtered_pr_indices
                .iter()
                .skip(scroll)
                .take(visible)
                .enumerate()
            {
                let pr = &self.prs[idx];
                let y = content_area.y + row as u16;
                let is_selected = scroll + row == self.selected_pr;

                let bg = if is_selected { CURSOR_BG } else { BG_COLOR };
                for x in content_area.x..content_area.x + content_area.width {
                    buf.set_string(x, y, " ", Style::default().bg(bg));
                }

                let number = format!("#{:<5}", pr.number);
                buf.set_string(
                    content_area.x + 1,
                    y,
                    &number,
                    Style::default()
                        .fg(Color::Magenta)
                        .bg(bg)
                        .add_modifier(Modifier::BOLD),
                );

                let state = format!("[{}]", pr.state.label());
                buf.set_string(
                    content_area.x + 8,
                    y,
                    &state,
                    Style::default().fg(pr.state.color()).bg(bg),
                );

                let meta = format!(
                    "{} · {} · {} comments",
                    pr.author,
                    pr.age(),
                    pr.comments
                );
                let title_width = content_area
                    .width
                    .saturating_sub(18 + meta.len() as u16 + 3) as usize;
                let title = truncate_or_pad(&pr.title, title_width);
                buf.set_string(
                    content_area.x + 18,
                    y,
                    &title,
                    Style::default().fg(Color::White).bg(bg),
                );

                let meta_x =
                    (content_area.x + content_area.width).saturating_sub(meta.len() as u16 + 2);
                buf.set_string(meta_x, y, &meta, Style::default().fg(Color::DarkGray).bg(bg));
            }
        }

        // Footer hints
        let footer_y = area.y + area.height - 1;
        let hints = " j/k: move   Enter: open   s: state filter   /: search   R: refresh   o: browser   ?: help   q: quit";
        buf.set_string(
            area.x,
            footer_y,
            truncate_or_pad(hints, area.width as usize),
            Style::default().fg(Color::DarkGray).bg(HEADER_BG),
        );
    }

    fn render_review(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();

        // Header: PR summary
        let header_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height: 1,
        };
        let body_area = Rect {
            x: area.x,
            y: area.y + 1,
            width: area.width,
            height: area.height.saturating_sub(2),
        };
        let footer_y = area.y + area.height - 1;

        let tree_width = self.config.navigation.panel_width.min(body_area.width / 2);
        let feedback_height = (body_area.height * 2) / 5;

        let tree_area = Rect {
            x: body_area.x,
            y: body_area.y,
            width: tree_width,
            height: body_area.height.saturating_sub(feedback_height),
        };
        let diff_area = Rect {
            x: body_area.x + tree_width,
            y: body_area.y,
            width: body_area.width.saturating_sub(tree_width),
            height: body_area.height.saturating_sub(feedback_height),
        };
        let feedback_area = Rect {
            x: body_area.x,
            y: body_area.y + tree_area.height,
            width: body_area.width,
            height: feedback_height,
        };

        self.ensure_flat_items_cached();

        let buf = frame.buffer_mut();
        fill_area(buf, area, BG_COLOR);

        // PR summary line
        if let Some(pr) = &self.current_pr {
            let summary = format!(
                " #{} {}  [{}]  {} · opened {} · {} comments",
                pr.number,
                pr.title,
                pr.state.label(),
                pr.author,
                format_relative_time(&pr.created_at),
                pr.comments
            );
            buf.set_string(
                header_area.x,
                header_area.y,
                truncate_or_pad(&summary, header_area.width as usize),
                Style::default()
                    .fg(Color::White)
                    .bg(HEADER_BG)
                    .add_modifier(Modifier::BOLD),
            );
        }

        self.render_tree(frame, tree_area);
        self.render_diff(frame, diff_area);
        self.render_feedback(frame, feedback_area);

        // Footer: hints or in-flight trigger notice
        let buf = frame.buffer_mut();
        let footer = match &self.trigger_pending {
            Some(notice) => format!(" {}", notice),
            None => " Tab: focus   j/k: move   m: /improve   u: /review   r: reload   </>: width   Esc: back   ?: help".to_string(),
        };
        buf.set_string(
            area.x,
            footer_y,
            truncate_or_pad(&footer, area.width as usize),
            Style::default().fg(Color::DarkGray).bg(HEADER_BG),
        );
    }

    fn render_tree(&self, frame: &mut ratatui::Frame, area: Rect) {
        let border_style = if self.focus == Focus::Tree {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let title = if self.file_search_mode {
            format!(" files /{}_ ", self.file_search_query)
        } else {
            format!(" files ({}) ", self.filtered_indices.len())
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let buf = frame.buffer_mut();

        match &self.diff_panel {
            PanelState::Loading => {
                buf.set_string(
                    inner.x + 1,
                    inner.y,
                    "Loading diff...",
                    Style::default().fg(Color::DarkGray).bg(BG_COLOR),
                );
                return;
            }
            PanelState::Failed(e) => {
                let msg = format!("Unable to load diff: {}", e);
                for (i, line) in wrap_text(&msg, inner.width.saturating_sub(2) as usize)
                    .iter()
                    .take(inner.height as usize)
                    .enumerate()
                {
                    buf.set_string(
                        inner.x + 1,
                        inner.y + i as u16,
                        line,
                        Style::default().fg(Color::Red).bg(BG_COLOR),
                    );
                }
                return;
            }
            PanelState::Ready => {}
        }

        let items = self.get_flat_items();
        if items.is_empty() {
            buf.set_string(
                inner.x + 1,
                inner.y,
                "No file changes found.",
                Style::default().fg(Color::DarkGray).bg(BG_COLOR),
            );
            return;
        }

        let visible = inner.height as usize;
        let scroll = self.tree_cursor.saturating_sub(visible.saturating_sub(1));

        for (row, item) in items.iter().skip(scroll).take(visible).enumerate() {
            let y = inner.y + row as u16;
            let is_cursor = scroll + row == self.tree_cursor;
            let bg = if is_cursor { CURSOR_BG } else { BG_COLOR };

            for x in inner.x..inner.x + inner.width {
                buf.set_string(x, y, " ", Style::default().bg(bg));
            }

            match item {
                TreeItem::Folder {
                    name,
                    path,
                    is_last,
                    ancestors_last,
                    ..
                } => {
                    let arrow = if self.collapsed_folders.contains(path) {
                        "▸"
                    } else {
                        "▾"
                    };
                    let prefix = self.get_tree_prefix(*is_last, ancestors_last);
                    let label = format!("{}{} {}/", prefix, arrow, name);
                    buf.set_string(
                        inner.x,
                        y,
                        truncate_or_pad(&label, inner.width as usize),
                        Style::default().fg(Color::Blue).bg(bg),
                    );
                }
                TreeItem::File {
                    index,
                    name,
                    is_last,
                    ancestors_last,
                    ..
                } => {
                    let file = &self.files[*index];
                    let prefix = self.get_tree_prefix(*is_last, ancestors_last);
                    let selected_marker = if *index == self.selected_file { "*" } else { " " };
                    let label = format!(
                        "{}{}{} {} +{} -{}",
                        prefix,
                        selected_marker,
                        file.status.badge(),
                        name,
                        file.additions,
                        file.deletions
                    );
                    let fg = if *index == self.selected_file {
                        Color::White
                    } else {
                        file.status.color()
                    };
                    buf.set_string(
                        inner.x,
                        y,
                        truncate_or_pad(&label, inner.width as usize),
                        Style::default().fg(fg).bg(bg),
                    );
                }
            }
        }
    }

    fn render_diff(&self, frame: &mut ratatui::Frame, area: Rect) {
        let border_style = if self.focus == Focus::Diff {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let title = self
            .files
            .get(self.selected_file)
            .map(|f| format!(" {} [{}] +{} -{} ", f.path, f.status.label(), f.additions, f.deletions))
            .unwrap_or_else(|| " diff ".to_string());

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let buf = frame.buffer_mut();

        if self.diff_panel != PanelState::Ready {
            let msg = match &self.diff_panel {
                PanelState::Loading => "Loading diff...".to_string(),
                PanelState::Failed(_) => "Unable to show diff.".to_string(),
                PanelState::Ready => unreachable!(),
            };
            buf.set_string(
                inner.x + 1,
                inner.y,
                msg,
                Style::default().fg(Color::DarkGray).bg(BG_COLOR),
            );
            return;
        }

        let Some(file) = self.files.get(self.selected_file) else {
            buf.set_string(
                inner.x + 1,
                inner.y,
                "Pick a file to preview the diff.",
                Style::default().fg(Color::DarkGray).bg(BG_COLOR),
            );
            return;
        };

        let Some(rows) = parser::file_rows(file) else {
            // Explicit placeholder instead of an empty table
            buf.set_string(
                inner.x + 1,
                inner.y,
                "Binary file or patch unavailable.",
                Style::default().fg(Color::DarkGray).bg(BG_COLOR),
            );
            return;
        };

        let max_scroll = rows.len().saturating_sub(inner.height as usize);
        let scroll = self.scroll_offset.min(max_scroll);
        let mid = inner.width / 2;

        for (row_idx, row) in rows.iter().skip(scroll).take(inner.height as usize).enumerate() {
            let y = inner.y + row_idx as u16;
            self.render_split_row(buf, inner.x, y, mid, inner.width - mid, row, &file.path);
        }
    }

    fn render_split_row(
        &self,
        buf: &mut ratatui::buffer::Buffer,
        x: u16,
        y: u16,
        left_width: u16,
        right_width: u16,
        row: &SplitRow,
        path: &str,
    ) {
        if row.kind == RowKind::Hunk {
            let text = truncate_or_pad(&row.left, (left_width + right_width) as usize);
            buf.set_string(
                x,
                y,
                &text,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::DIM)
                    .bg(BG_COLOR),
            );
            return;
        }

        let (left_bg, right_bg) = match row.kind {
            RowKind::Del => (DEL_BG, BG_COLOR),
            RowKind::Add => (BG_COLOR, ADD_BG),
            _ => (BG_COLOR, BG_COLOR),
        };

        self.render_half_row(buf, x, y, left_width, row.old_ln, &row.left, left_bg, path);
        self.render_half_row(
            buf,
            x + left_width,
            y,
            right_width,
            row.new_ln,
            &row.right,
            right_bg,
            path,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn render_half_row(
        &self,
        buf: &mut ratatui::buffer::Buffer,
        x: u16,
        y: u16,
        width: u16,
        ln: Option<u32>,
        content: &str,
        bg: Color,
        path: &str,
    ) {
        let max_x = x + width;

        for cx in x..max_x {
            buf.set_string(cx, y, " ", Style::default().bg(bg));
        }

        let gutter = match (ln, self.config.display.show_line_numbers) {
            (Some(n), true) => format!("{:>4} ", n),
            (None, true) => "     ".to_string(),
            _ => String::new(),
        };
        buf.set_string(x, y, &gutter, Style::default().fg(Color::DarkGray).bg(bg));

        if content.is_empty() {
            return;
        }

        let content_x = x + gutter.len() as u16;

        if self.config.display.syntax_highlighting {
            let highlighted = self.highlighter.highlight_line(content, path);
            let mut cx = content_x;
            for span in highlighted.spans {
                let span_style = span.style.bg(bg);
                for ch in span.content.chars() {
                    if cx >= max_x {
                        return;
                    }
                    buf.set_string(cx, y, &ch.to_string(), span_style);
                    cx += 1;
                }
            }
        } else {
            let visible = truncate_or_pad(content, width.saturating_sub(gutter.len() as u16) as usize);
            buf.set_string(content_x, y, &visible, Style::default().fg(Color::White).bg(bg));
        }
    }

    /// Build the display lines for the feedback panel
    fn feedback_lines(&self, width: usize) -> Vec<(String, Style)> {
        let mut lines = Vec::new();

        match &self.feedback_panel {
            PanelState::Loading => {
                lines.push((
                    "Loading feedback...".to_string(),
                    Style::default().fg(Color::DarkGray),
                ));
                return lines;
            }
            PanelState::Failed(e) => {
                lines.push((
                    format!("Unable to load feedback: {}", e),
                    Style::default().fg(Color::Red),
                ));
                return lines;
            }
            PanelState::Ready => {}
        }

        if self.feedback_entries.is_empty() {
            lines.push((
                format!("No {} feedback found.", self.config.github.bot_needle),
                Style::default().fg(Color::DarkGray),
            ));
            return lines;
        }

        for entry in &self.feedback_entries {
            let location = match (&entry.path, entry.line) {
                (Some(path), Some(line)) => format!("  {}:{}", path, line),
                (Some(path), None) => format!("  {}", path),
                _ => String::new(),
            };
            let review_state = entry
                .state
                .as_deref()
                .map(|s| format!(" · {}", s.to_lowercase()))
                .unwrap_or_default();
            let header = format!(
                "● [{}] @{} · {}{}{}",
                entry.kind.label(),
                entry.author,
                format_relative_time(&entry.timestamp),
                review_state,
                location
            );
            lines.push((
                header,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ));

            let body = match &entry.body_html {
                Some(html) => sanitize::text_content(html),
                None => entry.body.clone(),
            };
            let body = if body.trim().is_empty() {
                "(no comment body provided)".to_string()
            } else {
                body
            };
            for line in wrap_text(&body, width.saturating_sub(2)) {
                lines.push((format!("  {}", line), Style::default().fg(Color::White)));
            }

            if let Some(hunk) = &entry.diff_hunk {
                for line in hunk.lines().take(8) {
                    let style = if line.starts_with('+') {
                        Style::default().fg(Color::Green)
                    } else if line.starts_with('-') {
                        Style::default().fg(Color::Red)
                    } else if line.starts_with("@@") {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    };
                    lines.push((format!("  {}", line), style));
                }
            }

            if let Some(url) = &entry.html_url {
                lines.push((
                    format!("  ↗ {}", url),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
                ));
            }

            lines.push((String::new(), Style::default()));
        }

        lines
    }

    fn render_feedback(&self, frame: &mut ratatui::Frame, area: Rect) {
        let border_style = if self.focus == Focus::Feedback {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let title = format!(" {} feedback ({}) ", self.config.github.bot_needle, self.feedback_entries.len());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let buf = frame.buffer_mut();
        let lines = self.feedback_lines(inner.width as usize);

        let max_scroll = lines.len().saturating_sub(inner.height as usize);
        let scroll = self.feedback_scroll.min(max_scroll);

        for (row, (text, style)) in lines.iter().skip(scroll).take(inner.height as usize).enumerate()
        {
            buf.set_string(
                inner.x,
                inner.y + row as u16,
                truncate_or_pad(text, inner.width as usize),
                style.bg(BG_COLOR),
            );
        }
    }

    fn render_help(&self, frame: &mut ratatui::Frame) {
        let area = frame.area();

        let popup_width = 56.min(area.width.saturating_sub(4));
        let popup_height: u16 = match self.help_mode {
            HelpMode::PrList => 13,
            HelpMode::Review => 17,
            HelpMode::None => return,
        };
        let popup_height = popup_height.min(area.height.saturating_sub(4));

        let popup_area = Rect {
            x: area.x + (area.width - popup_width) / 2,
            y: area.y + (area.height - popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        let buf = frame.buffer_mut();
        fill_area(buf, popup_area, HEADER_BG);

        let entries: &[(&str, &str)] = match self.help_mode {
            HelpMode::PrList => &[
                ("j/k", "move selection"),
                ("Enter", "open PR"),
                ("s", "cycle state filter"),
                ("/", "search title or #number"),
                ("R", "refresh list"),
                ("o", "open in browser"),
                ("q", "quit"),
            ],
            HelpMode::Review => &[
                ("Tab", "cycle focus (tree/diff/feedback)"),
                ("j/k", "move / scroll"),
                ("Enter/l", "open file or toggle folder"),
                ("h", "collapse folder"),
                ("/", "filter files (tree focus)"),
                ("m", "request more suggestions (/improve)"),
                ("u", "request updated review (/review)"),
                ("r", "reload PR"),
                ("</>", "adjust tree width"),
                ("o", "open PR in browser"),
                ("b", "open selected file in browser"),
                ("Esc", "back to list"),
            ],
            HelpMode::None => &[],
        };

        buf.set_string(
            popup_area.x + 2,
            popup_area.y + 1,
            "Keys",
            Style::default()
                .fg(Color::Magenta)
                .bg(HEADER_BG)
                .add_modifier(Modifier::BOLD),
        );

        for (i, (key, desc)) in entries.iter().enumerate() {
            let y = popup_area.y + 3 + i as u16;
            if y + 1 >= popup_area.y + popup_area.height {
                break;
            }
            buf.set_string(
                popup_area.x + 2,
                y,
                format!("{:>8}", key),
                Style::default().fg(Color::Cyan).bg(HEADER_BG),
            );
            buf.set_string(
                popup_area.x + 12,
                y,
                *desc,
                Style::default().fg(Color::White).bg(HEADER_BG),
            );
        }
    }
}

/// Fetch and normalize all three feedback sources for a PR.
///
/// The three fetches run concurrently and fail independently; a single
/// failed source is logged and contributes nothing, and the whole fetch
/// fails only when every source failed.
async fn fetch_feedback(
    client: &GithubClient,
    number: u32,
    needle: &str,
) -> Result<Vec<FeedbackEntry>, String> {
    use crate::feedback::{merge_feedback, normalize_batch, FeedbackKind};

    let (reviews, review_comments, issue_comments) = tokio::join!(
        client.fetch_reviews(number),
        client.fetch_review_comments(number),
        client.fetch_issue_comments(number)
    );

    let mut errors = Vec::new();

    let reviews = match reviews {
        Ok(raw) => normalize_batch(raw, FeedbackKind::Review, needle),
        Err(e) => {
            log::warn!("reviews fetch failed for #{}: {}", number, e);
            errors.push(format!("reviews: {}", e));
            Vec::new()
        }
    };
    let review_comments = match review_comments {
        Ok(raw) => normalize_batch(raw, FeedbackKind::ReviewComment, needle),
        Err(e) => {
            log::warn!("review comments fetch failed for #{}: {}", number, e);
            errors.push(format!("review comments: {}", e));
            Vec::new()
        }
    };
    let issue_comments = match issue_comments {
        Ok(raw) => normalize_batch(raw, FeedbackKind::IssueComment, needle),
        Err(e) => {
            log::warn!("issue comments fetch failed for #{}: {}", number, e);
            errors.push(format!("issue comments: {}", e));
            Vec::new()
        }
    };

    if errors.len() == 3 {
        return Err(errors.join("; "));
    }

    Ok(merge_feedback(reviews, review_comments, issue_comments))
}
