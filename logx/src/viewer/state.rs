//! Cursor, viewport and search state of one viewing session.

use super::input::ViewerAction;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
#[error("failed to write {}: {source}", .path.display())]
pub struct SaveError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    SearchEntry,
}

/// How a viewing session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerExit {
    Quit,
    /// Return to whatever opened the viewer.
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Info(String),
    Error(String),
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Message::Info(text) | Message::Error(text) => text,
        }
    }
}

#[derive(Debug)]
pub struct ViewerState {
    lines: Vec<String>,
    server: String,
    file_name: String,
    cursor: usize,
    offset: usize,
    height: usize,
    mode: Mode,
    /// Query being typed in search entry.
    input: String,
    /// Query the current match list was built from.
    query: String,
    matches: Vec<usize>,
    match_pos: usize,
    message: Option<Message>,
}

impl ViewerState {
    pub fn new(
        lines: Vec<String>,
        server: impl Into<String>,
        file_name: impl Into<String>,
        height: usize,
    ) -> Self {
        Self {
            lines,
            server: server.into(),
            file_name: file_name.into(),
            cursor: 0,
            offset: 0,
            height: height.max(1),
            mode: Mode::Browsing,
            input: String::new(),
            query: String::new(),
            matches: Vec::new(),
            match_pos: 0,
            message: None,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Cursor line, `None` when there is nothing to show.
    pub fn cursor(&self) -> Option<usize> {
        (!self.lines.is_empty()).then_some(self.cursor)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Query whose matches are being shown; empty when none.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    /// Zero-based position in [`matches`](Self::matches).
    pub fn match_position(&self) -> Option<usize> {
        (!self.matches.is_empty()).then_some(self.match_pos)
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn is_match(&self, line: usize) -> bool {
        self.matches.binary_search(&line).is_ok()
    }

    /// Indices of the lines inside the viewport.
    pub fn visible_range(&self) -> Range<usize> {
        visible_range(self.offset, self.height, self.lines.len())
    }

    /// Resize the viewport, scrolling only as far as needed to keep the
    /// cursor on screen.
    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        self.scroll_to_cursor();
    }

    pub fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.scroll_to_cursor();
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.lines.len() {
            self.cursor += 1;
            self.scroll_to_cursor();
        }
    }

    fn page_step(&self) -> usize {
        (self.height / 2).max(1)
    }

    /// Half a viewport up; the viewport then starts at the cursor.
    pub fn page_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(self.page_step());
        self.offset = self.cursor;
    }

    /// Half a viewport down, scrolling just enough to keep the cursor on
    /// the last visible row.
    pub fn page_down(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        self.cursor = (self.cursor + self.page_step()).min(self.lines.len() - 1);
        self.scroll_to_cursor();
    }

    pub fn go_top(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn go_bottom(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        self.cursor = self.lines.len() - 1;
        self.offset = self.lines.len().saturating_sub(self.height);
    }

    /// Enter search entry, dropping the previous query and its matches.
    pub fn begin_search(&mut self) {
        self.mode = Mode::SearchEntry;
        self.input.clear();
        self.query.clear();
        self.matches.clear();
        self.match_pos = 0;
        self.message = None;
    }

    pub fn push_search_char(&mut self, c: char) {
        if self.mode == Mode::SearchEntry {
            self.input.push(c);
        }
    }

    pub fn pop_search_char(&mut self) {
        if self.mode == Mode::SearchEntry {
            self.input.pop();
        }
    }

    /// Leave search entry without searching.
    pub fn cancel_search(&mut self) {
        self.mode = Mode::Browsing;
        self.input.clear();
    }

    /// Run the typed query and jump to its first match.
    pub fn commit_search(&mut self) {
        self.mode = Mode::Browsing;
        let query = std::mem::take(&mut self.input);
        self.search(&query);
    }

    /// Case-insensitive substring scan over every line, using the same
    /// matcher as the highlighter. The match list is rebuilt from scratch.
    pub fn search(&mut self, query: &str) {
        self.query = query.to_string();
        self.matches.clear();
        self.match_pos = 0;

        if query.is_empty() {
            self.message = Some(Message::Info("Search cleared".to_string()));
            return;
        }

        self.matches = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| find_ignore_case(line, query).is_some())
            .map(|(idx, _)| idx)
            .collect();
        debug!(query, matches = self.matches.len(), "search");

        match self.matches.first() {
            Some(&first) => {
                self.cursor = first;
                self.reveal_cursor();
                self.message = Some(Message::Info(format!("Found {} matches", self.matches.len())));
            }
            None => {
                self.message = Some(Message::Info("No matches found".to_string()));
            }
        }
    }

    pub fn next_match(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.match_pos = (self.match_pos + 1) % self.matches.len();
        self.cursor = self.matches[self.match_pos];
        self.reveal_cursor();
    }

    pub fn prev_match(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.match_pos = self
            .match_pos
            .checked_sub(1)
            .unwrap_or(self.matches.len() - 1);
        self.cursor = self.matches[self.match_pos];
        self.reveal_cursor();
    }

    /// Name of the file [`save_to`](Self::save_to) writes.
    pub fn saved_file_name(&self) -> String {
        format!("{}_{}.log", sanitize(&self.server), sanitize(&self.file_name))
    }

    /// Write every line (not just the viewport) into `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, SaveError> {
        let path = dir.join(self.saved_file_name());
        fs::write(&path, self.lines.join("\n")).map_err(|source| SaveError {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// [`save_to`](Self::save_to), reporting the outcome on the status line.
    pub fn save(&mut self, dir: &Path) {
        self.message = Some(match self.save_to(dir) {
            Ok(path) => Message::Info(format!("Saved to: {}", path.display())),
            Err(e) => {
                warn!(error = %e, "save failed");
                Message::Error(format!("Error saving: {}", e))
            }
        });
    }

    /// Apply one input action. Returns `Some` when the session should end.
    pub fn apply(&mut self, action: ViewerAction, save_dir: &Path) -> Option<ViewerExit> {
        if self.mode == Mode::Browsing {
            self.message = None;
        }
        match action {
            ViewerAction::Quit => return Some(ViewerExit::Quit),
            ViewerAction::Back => return Some(ViewerExit::Back),
            ViewerAction::Up => self.move_up(),
            ViewerAction::Down => self.move_down(),
            ViewerAction::PageUp => self.page_up(),
            ViewerAction::PageDown => self.page_down(),
            ViewerAction::Top => self.go_top(),
            ViewerAction::Bottom => self.go_bottom(),
            ViewerAction::BeginSearch => self.begin_search(),
            ViewerAction::NextMatch => self.next_match(),
            ViewerAction::PrevMatch => self.prev_match(),
            ViewerAction::Save => self.save(save_dir),
            ViewerAction::SearchChar(c) => self.push_search_char(c),
            ViewerAction::SearchBackspace => self.pop_search_char(),
            ViewerAction::SearchCancel => self.cancel_search(),
            ViewerAction::SearchCommit => self.commit_search(),
        }
        None
    }

    /// `Line x/y`, plus `| Match i/n` while matches exist.
    pub fn status_line(&self) -> String {
        let line = self.cursor().map_or(0, |c| c + 1);
        let mut status = format!("Line {}/{}", line, self.lines.len());
        if let Some(pos) = self.match_position() {
            status.push_str(&format!(" | Match {}/{}", pos + 1, self.matches.len()));
        }
        status
    }

    /// Minimal scroll: move the viewport edge only as far as the cursor.
    fn scroll_to_cursor(&mut self) {
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + self.height {
            self.offset = self.cursor + 1 - self.height;
        }
    }

    /// Centre the cursor if it is off screen; leave the viewport alone
    /// otherwise.
    fn reveal_cursor(&mut self) {
        if self.cursor < self.offset || self.cursor >= self.offset + self.height {
            let centred = self.cursor.saturating_sub(self.height / 2);
            let last_page = self.lines.len().saturating_sub(self.height);
            self.offset = centred.min(last_page);
        }
    }
}

/// `[offset, min(offset + height, total))`.
pub fn visible_range(offset: usize, height: usize, total: usize) -> Range<usize> {
    let start = offset.min(total);
    start..offset.saturating_add(height).min(total)
}

/// Byte range of the first case-insensitive occurrence of `needle`.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    let needle: Vec<char> = needle.chars().flat_map(fold_case).collect();

    // Each folded char remembers the byte span of the char it came from.
    let lowered: Vec<(char, usize, usize)> = haystack
        .char_indices()
        .flat_map(|(start, c)| {
            let end = start + c.len_utf8();
            fold_case(c).map(move |l| (l, start, end))
        })
        .collect();

    lowered
        .windows(needle.len())
        .find(|window| window.iter().map(|(c, _, _)| c).eq(needle.iter()))
        .map(|window| window[0].1..window[window.len() - 1].2)
}

/// Lowercase one char; final sigma folds to `σ`.
fn fold_case(c: char) -> impl Iterator<Item = char> {
    c.to_lowercase().map(|l| if l == 'ς' { 'σ' } else { l })
}

fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbered(count: usize, height: usize) -> ViewerState {
        let lines = (0..count).map(|i| format!("line {}", i)).collect();
        ViewerState::new(lines, "10.0.0.1", "app.log", height)
    }

    fn at(state: &mut ViewerState, line: usize) {
        for _ in 0..line {
            state.move_down();
        }
    }

    #[test]
    fn test_initial_state() {
        let state = numbered(10, 5);
        assert_eq!(state.cursor(), Some(0));
        assert_eq!(state.offset(), 0);
        assert_eq!(state.mode(), Mode::Browsing);
        assert_eq!(state.status_line(), "Line 1/10");
    }

    #[test]
    fn test_empty_content() {
        let mut state = numbered(0, 5);
        assert_eq!(state.cursor(), None);
        for _ in 0..3 {
            state.move_down();
            state.page_down();
            state.go_bottom();
            state.move_up();
        }
        assert_eq!(state.cursor(), None);
        assert_eq!(state.offset(), 0);
        assert_eq!(state.visible_range(), 0..0);
        assert_eq!(state.status_line(), "Line 0/0");
    }

    #[test]
    fn test_move_down_scrolls_minimally() {
        let mut state = numbered(100, 20);
        at(&mut state, 19);
        assert_eq!(state.offset(), 0);
        state.move_down();
        assert_eq!(state.cursor(), Some(20));
        assert_eq!(state.offset(), 1);
        state.move_up();
        assert_eq!(state.offset(), 1);
    }

    #[test]
    fn test_move_clamps_at_bounds() {
        let mut state = numbered(3, 5);
        state.move_up();
        assert_eq!(state.cursor(), Some(0));
        at(&mut state, 10);
        assert_eq!(state.cursor(), Some(2));
    }

    #[test]
    fn test_page_down_from_fifty() {
        let mut state = numbered(100, 20);
        at(&mut state, 50);
        assert_eq!(state.offset(), 31);
        state.page_down();
        assert_eq!(state.cursor(), Some(60));
        assert_eq!(state.offset(), 41);
    }

    #[test]
    fn test_page_up_snaps_offset() {
        let mut state = numbered(100, 20);
        at(&mut state, 50);
        state.page_up();
        assert_eq!(state.cursor(), Some(40));
        assert_eq!(state.offset(), 40);
        for _ in 0..10 {
            state.page_up();
        }
        assert_eq!(state.cursor(), Some(0));
        assert_eq!(state.offset(), 0);
    }

    #[test]
    fn test_top_and_bottom() {
        let mut state = numbered(100, 20);
        state.go_bottom();
        assert_eq!(state.cursor(), Some(99));
        assert_eq!(state.offset(), 80);
        assert_eq!(state.visible_range(), 80..100);
        state.go_top();
        assert_eq!(state.cursor(), Some(0));
        assert_eq!(state.offset(), 0);

        let mut short = numbered(5, 20);
        short.go_bottom();
        assert_eq!(short.offset(), 0);
        assert_eq!(short.cursor(), Some(4));
    }

    #[test]
    fn test_search_is_case_insensitive_and_sorted() {
        let lines = vec![
            "INFO start".to_string(),
            "error: disk".to_string(),
            "ok".to_string(),
            "Fatal ERROR".to_string(),
        ];
        let mut state = ViewerState::new(lines, "h", "a.log", 10);
        state.begin_search();
        for c in "Error".chars() {
            state.push_search_char(c);
        }
        state.commit_search();
        assert_eq!(state.mode(), Mode::Browsing);
        assert_eq!(state.matches(), &[1, 3]);
        assert_eq!(state.cursor(), Some(1));
        assert_eq!(state.query(), "Error");
        assert_eq!(state.message(), Some(&Message::Info("Found 2 matches".into())));
        assert_eq!(state.status_line(), "Line 2/4 | Match 1/2");
    }

    #[test]
    fn test_search_without_hits_keeps_cursor() {
        let mut state = numbered(30, 10);
        at(&mut state, 7);
        state.search("nothing here");
        assert!(state.matches().is_empty());
        assert_eq!(state.cursor(), Some(7));
        assert_eq!(state.message(), Some(&Message::Info("No matches found".into())));
    }

    #[test]
    fn test_search_centres_offscreen_match() {
        let mut state = numbered(100, 20);
        state.search("line 70");
        assert_eq!(state.cursor(), Some(70));
        assert_eq!(state.offset(), 60);
    }

    #[test]
    fn test_search_leaves_viewport_when_match_visible() {
        let mut state = numbered(100, 20);
        state.search("line 5");
        assert_eq!(state.cursor(), Some(5));
        assert_eq!(state.offset(), 0);
    }

    #[test]
    fn test_every_counted_match_is_highlightable() {
        let lines = vec![
            "ΟΔΟΣ closed".to_string(),
            "İstanbul node".to_string(),
            "odos".to_string(),
            "STRASSE".to_string(),
        ];
        for query in ["οδος", "ΟΔΟΣ", "οσ", "i\u{307}stanbul", "istanbul", "NODE", "straße"] {
            let mut state = ViewerState::new(lines.clone(), "h", "a.log", 10);
            state.search(query);
            for (idx, line) in lines.iter().enumerate() {
                assert_eq!(
                    state.matches().contains(&idx),
                    find_ignore_case(line, query).is_some(),
                    "query {:?} on line {:?}",
                    query,
                    line
                );
            }
        }

        let mut state = ViewerState::new(lines.clone(), "h", "a.log", 10);
        state.search("οδος");
        assert_eq!(state.matches(), &[0]);
        assert_eq!(find_ignore_case(&lines[0], "οδος"), Some(0..8));
    }

    #[test]
    fn test_escape_discards_buffer() {
        let mut state = numbered(10, 5);
        state.search("line 3");
        state.begin_search();
        assert!(state.matches().is_empty());
        state.push_search_char('x');
        state.cancel_search();
        assert_eq!(state.mode(), Mode::Browsing);
        assert_eq!(state.input(), "");
        assert!(state.matches().is_empty());
        assert_eq!(state.cursor(), Some(3));
    }

    #[test]
    fn test_backspace_edits_buffer() {
        let mut state = numbered(10, 5);
        state.begin_search();
        state.push_search_char('a');
        state.push_search_char('b');
        state.pop_search_char();
        assert_eq!(state.input(), "a");
        state.pop_search_char();
        state.pop_search_char();
        assert_eq!(state.input(), "");
    }

    #[test]
    fn test_match_cycle_wraps() {
        let mut state = numbered(50, 10);
        state.search("line 1");
        // line 1, line 10..=19
        assert_eq!(state.matches().len(), 11);
        state.prev_match();
        assert_eq!(state.cursor(), Some(19));
        state.next_match();
        assert_eq!(state.cursor(), Some(1));
    }

    #[test]
    fn test_match_navigation_noop_without_matches() {
        let mut state = numbered(10, 5);
        at(&mut state, 4);
        state.next_match();
        state.prev_match();
        assert_eq!(state.cursor(), Some(4));
    }

    #[test]
    fn test_save_writes_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ViewerState::new(
            vec!["a".into(), "b".into(), "c".into()],
            "10.0.0.1",
            "nested/app.log",
            1,
        );
        let path = state.save_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "10.0.0.1_nested_app.log.log");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc");

        state.save(dir.path());
        assert!(matches!(state.message(), Some(Message::Info(m)) if m.starts_with("Saved to: ")));
    }

    #[test]
    fn test_save_error_reported() {
        let mut state = numbered(2, 5);
        state.save(Path::new("/nonexistent/logx/dir"));
        assert!(matches!(state.message(), Some(Message::Error(m)) if m.starts_with("Error saving")));
    }

    #[test]
    fn test_apply_clears_message_in_browsing() {
        let mut state = numbered(10, 5);
        state.search("nope");
        assert!(state.message().is_some());
        assert_eq!(state.apply(ViewerAction::Down, Path::new(".")), None);
        assert!(state.message().is_none());
        assert_eq!(state.apply(ViewerAction::Back, Path::new(".")), Some(ViewerExit::Back));
        assert_eq!(state.apply(ViewerAction::Quit, Path::new(".")), Some(ViewerExit::Quit));
    }

    #[test]
    fn test_resize_keeps_cursor_visible() {
        let mut state = numbered(100, 20);
        at(&mut state, 19);
        state.set_height(5);
        assert_eq!(state.offset(), 15);
        state.set_height(0);
        assert_eq!(state.height(), 1);
        assert_eq!(state.offset(), 19);
    }

    #[test]
    fn test_find_ignore_case() {
        assert_eq!(find_ignore_case("Some ERROR here", "error"), Some(5..10));
        assert_eq!(find_ignore_case("abc", "x"), None);
        assert_eq!(find_ignore_case("abc", ""), None);
        assert_eq!(find_ignore_case("Grüße ÜBER", "über"), Some(8..13));
    }

    #[derive(Debug, Clone)]
    enum Nav {
        Up,
        Down,
        PageUp,
        PageDown,
        Top,
        Bottom,
        Next,
        Prev,
        Resize(usize),
    }

    fn nav() -> impl Strategy<Value = Nav> {
        prop_oneof![
            Just(Nav::Up),
            Just(Nav::Down),
            Just(Nav::PageUp),
            Just(Nav::PageDown),
            Just(Nav::Top),
            Just(Nav::Bottom),
            Just(Nav::Next),
            Just(Nav::Prev),
            (0usize..40).prop_map(Nav::Resize),
        ]
    }

    proptest! {
        #[test]
        fn prop_cursor_stays_in_viewport(
            count in 1usize..300,
            height in 1usize..40,
            ops in proptest::collection::vec(nav(), 0..200),
        ) {
            let mut state = numbered(count, height);
            state.search("7");
            for op in ops {
                match op {
                    Nav::Up => state.move_up(),
                    Nav::Down => state.move_down(),
                    Nav::PageUp => state.page_up(),
                    Nav::PageDown => state.page_down(),
                    Nav::Top => state.go_top(),
                    Nav::Bottom => state.go_bottom(),
                    Nav::Next => state.next_match(),
                    Nav::Prev => state.prev_match(),
                    Nav::Resize(h) => state.set_height(h),
                }
                let cursor = state.cursor().unwrap();
                prop_assert!(cursor < count);
                prop_assert!(state.offset() <= cursor);
                prop_assert!(cursor < state.offset() + state.height());
            }
        }

        #[test]
        fn prop_next_match_is_closed_cycle(count in 1usize..200, height in 1usize..30) {
            let mut state = numbered(count, height);
            state.search("3");
            let matches = state.matches().len();
            prop_assume!(matches > 0);
            let first = state.cursor();
            for _ in 0..matches {
                state.next_match();
            }
            prop_assert_eq!(state.cursor(), first);
        }

        #[test]
        fn prop_search_agrees_with_highlighter(
            lines in proptest::collection::vec("[a-zA-ZσςΣİı ]{0,12}", 0..20),
            query in "[a-zA-ZσςΣİı]{1,3}",
        ) {
            let mut state = ViewerState::new(lines.clone(), "h", "a.log", 10);
            state.search(&query);
            let expected: Vec<usize> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| find_ignore_case(line, &query).is_some())
                .map(|(idx, _)| idx)
                .collect();
            prop_assert_eq!(state.matches(), expected.as_slice());
        }

        #[test]
        fn prop_search_is_idempotent(count in 0usize..200, query in "[a-z0-9 ]{1,3}") {
            let mut state = numbered(count, 10);
            state.search(&query);
            let matches = state.matches().to_vec();
            let cursor = state.cursor();
            state.search(&query);
            prop_assert_eq!(state.matches(), matches.as_slice());
            prop_assert_eq!(state.cursor(), cursor);
            prop_assert!(matches.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
