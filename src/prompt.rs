//! Single-line prompt with history and reverse incremental search
//!
//! The prompt edits a caller-owned list of lines: the history entries with
//! the draft as the last one. Moving up and down walks that list and edits
//! in place, so the borrow lasts exactly as long as [`Prompt::run`].

use crate::config::{ELLIPSIS, PROMPT_MIN_COLS};
use crate::dispatch::DispatchTable;
use crate::keys::Key;
use crate::scroll;
use crate::session::Session;
use crate::text;
use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::Write;
use std::sync::LazyLock;

/// Outcome of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
    Submitted(String),
    Cancelled,
}

/// What a prompt key asks the run loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSignal {
    Submit,
    Cancel,
    Resize,
    ReverseSearch,
}

/// Cursor over the borrowed line list
pub struct PromptState<'a> {
    lines: &'a mut Vec<String>,
    pub y: usize,
    pub x: usize,
}

impl<'a> PromptState<'a> {
    /// Start on the last line with the cursor at its end
    pub fn new(lines: &'a mut Vec<String>) -> Self {
        if lines.is_empty() {
            lines.push(String::new());
        }
        let y = lines.len() - 1;
        let x = text::char_len(&lines[y]);
        Self { lines, y, x }
    }

    pub fn line(&self) -> &str {
        &self.lines[self.y]
    }

    fn line_len(&self) -> usize {
        text::char_len(self.line())
    }

    pub fn up(&mut self) {
        self.y = self.y.saturating_sub(1);
        self.x = self.line_len();
    }

    pub fn down(&mut self) {
        self.y = (self.y + 1).min(self.lines.len() - 1);
        self.x = self.line_len();
    }

    pub fn right(&mut self) {
        self.x = (self.x + 1).min(self.line_len());
    }

    pub fn left(&mut self) {
        self.x = self.x.saturating_sub(1);
    }

    pub fn home(&mut self) {
        self.x = 0;
    }

    pub fn end(&mut self) {
        self.x = self.line_len();
    }

    pub fn ctrl_left(&mut self) {
        self.x = text::prev_word(self.line(), self.x);
    }

    pub fn ctrl_right(&mut self) {
        self.x = text::next_word(self.line(), self.x);
    }

    pub fn backspace(&mut self) {
        if self.x > 0 {
            text::remove_char(&mut self.lines[self.y], self.x - 1);
            self.x -= 1;
        }
    }

    pub fn delete(&mut self) {
        text::remove_char(&mut self.lines[self.y], self.x);
    }

    pub fn cut_to_end(&mut self) {
        text::split_off(&mut self.lines[self.y], self.x);
    }

    pub fn insert(&mut self, c: char) {
        text::insert_char(&mut self.lines[self.y], self.x, c);
        self.x += 1;
    }
}

/// State of one reverse incremental search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseSearch {
    pub query: String,
    idx: usize,
    pub failed: bool,
}

impl ReverseSearch {
    pub fn new(start: usize) -> Self {
        Self {
            query: String::new(),
            idx: start,
            failed: false,
        }
    }

    /// Scan from the search position toward older entries. On a miss the
    /// cursor and query are left alone.
    pub fn search(&mut self, state: &mut PromptState<'_>) {
        for i in (0..=self.idx).rev() {
            if let Some(pos) = state.lines[i].find(&self.query) {
                self.idx = i;
                self.failed = false;
                state.y = i;
                state.x = text::char_index(&state.lines[i], pos);
                return;
            }
        }
        self.failed = true;
    }

    pub fn push(&mut self, c: char) {
        self.query.push(c);
    }

    pub fn pop(&mut self) {
        self.query.pop();
    }

    /// Skip to the next older entry
    pub fn older(&mut self) {
        self.idx = self.idx.saturating_sub(1);
    }

    fn label(&self, base: &str) -> String {
        let failed = if self.failed { "failed " } else { "" };
        format!("{}({}reverse-search)`{}`", base, failed, self.query)
    }
}

pub type PromptHandler = fn(&mut PromptState<'_>) -> Option<PromptSignal>;

/// Prompt-editing key bindings
pub static PROMPT_KEYS: LazyLock<DispatchTable<PromptHandler>> = LazyLock::new(|| {
    DispatchTable::<PromptHandler>::default()
        // movement
        .bind(Key::Up, |s| {
            s.up();
            None
        })
        .bind(Key::Down, |s| {
            s.down();
            None
        })
        .bind(Key::Right, |s| {
            s.right();
            None
        })
        .bind(Key::Left, |s| {
            s.left();
            None
        })
        .bind(Key::Home, |s| {
            s.home();
            None
        })
        .bind(Key::Ctrl('A'), |s| {
            s.home();
            None
        })
        .bind(Key::End, |s| {
            s.end();
            None
        })
        .bind(Key::Ctrl('E'), |s| {
            s.end();
            None
        })
        .bind(Key::CtrlRight, |s| {
            s.ctrl_right();
            None
        })
        .bind(Key::CtrlLeft, |s| {
            s.ctrl_left();
            None
        })
        // editing
        .bind(Key::Backspace, |s| {
            s.backspace();
            None
        })
        .bind(Key::Ctrl('H'), |s| {
            s.backspace();
            None
        })
        .bind(Key::Delete, |s| {
            s.delete();
            None
        })
        .bind(Key::Ctrl('K'), |s| {
            s.cut_to_end();
            None
        })
        // misc
        .bind(Key::Resize, |_| Some(PromptSignal::Resize))
        .bind(Key::Ctrl('R'), |_| Some(PromptSignal::ReverseSearch))
        .bind(Key::Enter, |_| Some(PromptSignal::Submit))
        .bind(Key::Ctrl('C'), |_| Some(PromptSignal::Cancel))
});

/// Label text as drawn in `cols` columns: dropped entirely on tiny screens,
/// cut short with an ellipsis when it doesn't fit
pub fn prompt_label(base: &str, cols: usize) -> String {
    if base.is_empty() || cols < PROMPT_MIN_COLS as usize {
        String::new()
    } else if text::char_len(base) > cols - 6 {
        format!("{}{}: ", text::slice(base, 0, cols - 7), ELLIPSIS)
    } else {
        format!("{}: ", base)
    }
}

pub struct Prompt<'s, 'l> {
    session: &'s mut Session,
    label: String,
    state: PromptState<'l>,
}

impl<'s, 'l> Prompt<'s, 'l> {
    pub fn new(session: &'s mut Session, label: impl Into<String>, lines: &'l mut Vec<String>) -> Self {
        Self {
            session,
            label: label.into(),
            state: PromptState::new(lines),
        }
    }

    pub fn run(mut self) -> Result<PromptResult> {
        loop {
            let base = self.label.clone();
            self.render(&base)?;

            let event = self.session.get_char()?;
            if let Some(handler) = PROMPT_KEYS.lookup(&event.key) {
                let signal = handler(&mut self.state);
                if let Some(result) = self.handle(signal)? {
                    return Ok(result);
                }
            } else if let Some(c) = event.printable() {
                self.state.insert(c);
            }
        }
    }

    fn handle(&mut self, signal: Option<PromptSignal>) -> Result<Option<PromptResult>> {
        Ok(match signal {
            None => None,
            Some(PromptSignal::Submit) => Some(self.submit()),
            Some(PromptSignal::Cancel) => Some(self.session.status.cancelled()),
            Some(PromptSignal::Resize) => {
                self.session.resize()?;
                None
            }
            Some(PromptSignal::ReverseSearch) => self.reverse_search()?,
        })
    }

    fn submit(&self) -> PromptResult {
        PromptResult::Submitted(self.state.line().to_string())
    }

    fn reverse_search(&mut self) -> Result<Option<PromptResult>> {
        let mut search = ReverseSearch::new(self.state.y);
        loop {
            search.search(&mut self.state);
            let base = search.label(&self.label);
            self.render(&base)?;

            let event = self.session.get_char()?;
            match event.key {
                Key::Resize => self.session.resize()?,
                Key::Backspace | Key::Ctrl('H') => search.pop(),
                Key::Ctrl('R') => search.older(),
                Key::Ctrl('C') => return Ok(Some(self.session.status.cancelled())),
                Key::Enter => return Ok(Some(self.submit())),
                _ => match event.printable() {
                    Some(c) => search.push(c),
                    None => {
                        self.state.end();
                        return Ok(None);
                    }
                },
            }
        }
    }

    fn render(&mut self, base: &str) -> Result<()> {
        let margin = self.session.margin;
        let cols = margin.cols as usize;
        let row = margin.footer_row();
        let label = prompt_label(base, cols);
        let label_len = text::char_len(&label);
        let width = cols.saturating_sub(label_len);
        let line = scroll::visible_window(self.state.line(), self.state.x, width);
        let x = label_len + scroll::screen_column(self.state.x, width);

        let out = &mut self.session.term;
        queue!(
            out,
            MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(label),
            Print(line),
            SetAttribute(Attribute::Reset),
            MoveTo(x as u16, row)
        )?;
        out.flush()?;
        Ok(())
    }
}
