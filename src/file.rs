//! An open file - its lines, cursor, selection and undo history
//!
//! The last line is always empty and stands for the final newline, so a
//! buffer with N text lines holds N + 1 entries.

use crate::config::TAB_SIZE;
use crate::dispatch::DispatchTable;
use crate::error::Error;
use crate::keys::Key;
use crate::margin::Margin;
use crate::scroll;
use crate::status::Status;
use crate::text;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Hex SHA-256 of some bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// File content split into lines plus the trailing empty line
#[derive(Debug, PartialEq, Eq)]
pub struct Split {
    pub lines: Vec<String>,
    pub nl: &'static str,
    /// The content did not end in a newline and one was added
    pub added_newline: bool,
    /// Both `\n` and `\r\n` endings occur
    pub mixed_endings: bool,
}

/// Split file content into lines. The more common ending wins; a tie goes
/// to `\n`.
pub fn split_lines(content: &str) -> Split {
    let crlf = content.matches("\r\n").count();
    let lf = content.matches('\n').count() - crlf;
    let nl = if crlf > lf { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    let added_newline = lines.last().is_some_and(|last| !last.is_empty());
    if added_newline {
        lines.push(String::new());
    }
    Split {
        lines,
        nl,
        added_newline,
        mixed_endings: crlf > 0 && lf > 0,
    }
}

/// A reversible edit
///
/// Holds the buffer as it was before the edit; applying it restores that
/// state and yields the action that undoes the restore.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: &'static str,
    lines: Vec<String>,
    y: usize,
    x: usize,
    pub start_modified: bool,
    pub end_modified: bool,
    is_final: bool,
}

impl Action {
    fn snapshot(name: &'static str, file: &File) -> Self {
        Self {
            name,
            lines: file.lines.clone(),
            y: file.y,
            x: file.x,
            start_modified: file.modified,
            end_modified: true,
            is_final: false,
        }
    }

    /// Restore the recorded state, returning the inverse action
    pub fn apply(self, file: &mut File) -> Action {
        let inverse = Action {
            name: self.name,
            lines: std::mem::replace(&mut file.lines, self.lines),
            y: file.y,
            x: file.x,
            start_modified: self.end_modified,
            end_modified: self.start_modified,
            is_final: true,
        };
        file.y = self.y;
        file.x = self.x;
        file.x_hint = self.x;
        file.modified = self.start_modified;
        file.select_start = None;
        inverse
    }
}

/// A match found by [`File::find_from`], in char columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub y: usize,
    pub x: usize,
    pub len: usize,
}

pub type FileHandler = fn(&mut File, &Margin);

/// Buffer-editing key bindings
pub static FILE_KEYS: LazyLock<DispatchTable<FileHandler>> = LazyLock::new(|| {
    DispatchTable::<FileHandler>::default()
        // movement
        .bind(Key::Up, |f, m| f.motion(m, File::up))
        .bind(Key::Down, |f, m| f.motion(m, File::down))
        .bind(Key::Left, |f, m| f.motion(m, File::left))
        .bind(Key::Right, |f, m| f.motion(m, File::right))
        .bind(Key::Home, |f, m| f.motion(m, File::home))
        .bind(Key::Ctrl('A'), |f, m| f.motion(m, File::home))
        .bind(Key::End, |f, m| f.motion(m, File::end))
        .bind(Key::Ctrl('E'), |f, m| f.motion(m, File::end))
        .bind(Key::PageUp, |f, m| f.motion(m, File::page_up))
        .bind(Key::PageDown, |f, m| f.motion(m, File::page_down))
        .bind(Key::CtrlHome, |f, m| f.motion(m, File::ctrl_home))
        .bind(Key::CtrlEnd, |f, m| f.motion(m, File::ctrl_end))
        .bind(Key::CtrlLeft, |f, m| f.motion(m, File::ctrl_left))
        .bind(Key::CtrlRight, |f, m| f.motion(m, File::ctrl_right))
        // selection
        .bind(Key::ShiftUp, |f, m| f.select(m, File::up))
        .bind(Key::ShiftDown, |f, m| f.select(m, File::down))
        .bind(Key::ShiftLeft, |f, m| f.select(m, File::left))
        .bind(Key::ShiftRight, |f, m| f.select(m, File::right))
        .bind(Key::ShiftHome, |f, m| f.select(m, File::home))
        .bind(Key::ShiftEnd, |f, m| f.select(m, File::end))
        .bind(Key::ShiftPageUp, |f, m| f.select(m, File::page_up))
        .bind(Key::ShiftPageDown, |f, m| f.select(m, File::page_down))
        .bind(Key::CtrlShiftLeft, |f, m| f.select(m, File::ctrl_left))
        .bind(Key::CtrlShiftRight, |f, m| f.select(m, File::ctrl_right))
        .bind(Key::CtrlShiftHome, |f, m| f.select(m, File::ctrl_home))
        .bind(Key::CtrlShiftEnd, |f, m| f.select(m, File::ctrl_end))
        // editing
        .bind(Key::Backspace, File::backspace)
        .bind(Key::Ctrl('H'), File::backspace)
        .bind(Key::Delete, File::delete)
        .bind(Key::Enter, File::enter)
        .bind(Key::Tab, File::tab)
});

pub struct File {
    pub filename: Option<PathBuf>,
    pub modified: bool,
    pub lines: Vec<String>,
    pub nl: &'static str,
    /// Hash of the on-disk content when last loaded or saved
    pub sha256: String,
    pub y: usize,
    pub x: usize,
    x_hint: usize,
    /// First line shown on screen
    pub file_y: usize,
    pub select_start: Option<(usize, usize)>,
    pub undo_stack: Vec<Action>,
    pub redo_stack: Vec<Action>,
    /// The content on disk is not valid UTF-8, so saving would corrupt it
    pub undecodable: bool,
    loaded: bool,
}

impl File {
    pub fn new(filename: Option<PathBuf>) -> Self {
        Self {
            filename,
            modified: false,
            lines: vec![String::new()],
            nl: "\n",
            sha256: sha256_hex(b""),
            y: 0,
            x: 0,
            x_hint: 0,
            file_y: 0,
            select_start: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undecodable: false,
            loaded: false,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.filename {
            Some(path) => path.display().to_string(),
            None => "<<new file>>".to_string(),
        }
    }

    /// Read the file from disk the first time it is shown
    pub fn ensure_loaded(&mut self, status: &mut Status) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        let Some(path) = self.filename.clone() else {
            return;
        };

        match std::fs::read(&path) {
            Ok(bytes) => {
                self.sha256 = sha256_hex(&bytes);
                let content = match String::from_utf8(bytes) {
                    Ok(content) => content,
                    Err(e) => {
                        // shown lossily, never written back
                        self.undecodable = true;
                        let err = Error::Encoding { path: path.clone() };
                        log::error!("{}", err);
                        status.update(err.to_string());
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                };
                let split = split_lines(&content);
                self.lines = split.lines;
                self.nl = split.nl;
                log::info!("loaded {} ({} lines)", path.display(), self.lines.len() - 1);
                if self.undecodable {
                    return;
                }
                if split.mixed_endings {
                    let ending = if self.nl == "\r\n" { "CRLF" } else { "LF" };
                    log::warn!("{} has mixed line endings", path.display());
                    status.update(format!("(file has mixed line endings, saving will use {})", ending));
                } else if split.added_newline {
                    status.update("(file had no trailing newline, one will be added)");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("{} does not exist yet", path.display());
            }
            Err(source) => {
                let err = Error::Read { path, source };
                log::error!("{}", err);
                status.update(err.to_string());
            }
        }
    }

    fn line_len(&self, y: usize) -> usize {
        text::char_len(&self.lines[y])
    }

    fn last_line(&self) -> usize {
        self.lines.len() - 1
    }

    // === Undo ===

    /// Stop the running action from absorbing further edits
    pub fn finalize_previous_action(&mut self) {
        if let Some(action) = self.undo_stack.last_mut() {
            action.is_final = true;
        }
    }

    fn continues_action(&self, name: &str) -> bool {
        matches!(self.undo_stack.last(), Some(a) if a.name == name && !a.is_final)
    }

    /// Run an edit, recording it for undo. Non-final edits with the same
    /// name as the running action are folded into it.
    fn edit(&mut self, name: &'static str, is_final: bool, f: impl FnOnce(&mut File)) {
        if is_final || !self.continues_action(name) {
            self.finalize_previous_action();
            self.undo_stack.push(Action::snapshot(name, self));
        }
        self.redo_stack.clear();
        f(self);
        if self.lines.last().is_some_and(|last| !last.is_empty()) {
            self.lines.push(String::new());
        }
        self.modified = true;
        if let Some(action) = self.undo_stack.last_mut() {
            action.end_modified = true;
            action.is_final = is_final;
        }
    }

    /// After a save, only the saved state counts as unmodified
    pub fn mark_saved(&mut self) {
        for stack in [&mut self.undo_stack, &mut self.redo_stack] {
            for (i, action) in stack.iter_mut().rev().enumerate() {
                action.start_modified = true;
                action.end_modified = i != 0;
            }
        }
    }

    // === Movement ===

    fn motion(&mut self, margin: &Margin, f: fn(&mut File, &Margin)) {
        self.finalize_previous_action();
        self.select_start = None;
        f(self, margin);
        self.scroll_screen_if_needed(margin);
    }

    fn select(&mut self, margin: &Margin, f: fn(&mut File, &Margin)) {
        self.finalize_previous_action();
        if self.select_start.is_none() {
            self.select_start = Some((self.y, self.x));
        }
        f(self, margin);
        self.scroll_screen_if_needed(margin);
    }

    fn set_x(&mut self, x: usize) {
        self.x = x;
        self.x_hint = x;
    }

    fn up(&mut self, margin: &Margin) {
        if self.y > 0 {
            self.y -= 1;
            if self.y < self.file_y {
                self.file_y = self.file_y.saturating_sub(margin.scroll_amount());
            }
            self.x = self.x_hint.min(self.line_len(self.y));
        }
    }

    fn down(&mut self, margin: &Margin) {
        if self.y < self.last_line() {
            self.y += 1;
            if self.y >= self.file_y + margin.body_lines() {
                self.file_y += margin.scroll_amount();
            }
            self.x = self.x_hint.min(self.line_len(self.y));
        }
    }

    fn left(&mut self, _margin: &Margin) {
        if self.x > 0 {
            self.set_x(self.x - 1);
        } else if self.y > 0 {
            self.y -= 1;
            self.set_x(self.line_len(self.y));
        }
    }

    fn right(&mut self, _margin: &Margin) {
        if self.x < self.line_len(self.y) {
            self.set_x(self.x + 1);
        } else if self.y < self.last_line() {
            self.y += 1;
            self.set_x(0);
        }
    }

    fn home(&mut self, _margin: &Margin) {
        self.set_x(0);
    }

    fn end(&mut self, _margin: &Margin) {
        self.set_x(self.line_len(self.y));
    }

    fn page_up(&mut self, margin: &Margin) {
        let page = margin.page_size();
        self.y = self.y.saturating_sub(page);
        self.file_y = self.file_y.saturating_sub(page);
        self.x = self.x_hint.min(self.line_len(self.y));
    }

    fn page_down(&mut self, margin: &Margin) {
        let page = margin.page_size();
        self.y = (self.y + page).min(self.last_line());
        self.file_y = (self.file_y + page).min(self.y);
        self.x = self.x_hint.min(self.line_len(self.y));
    }

    fn ctrl_home(&mut self, _margin: &Margin) {
        self.y = 0;
        self.set_x(0);
    }

    fn ctrl_end(&mut self, _margin: &Margin) {
        self.y = self.last_line();
        self.set_x(0);
    }

    fn ctrl_left(&mut self, margin: &Margin) {
        if self.x == 0 {
            self.left(margin);
        } else {
            self.set_x(text::prev_word(&self.lines[self.y], self.x));
        }
    }

    fn ctrl_right(&mut self, margin: &Margin) {
        if self.x >= self.line_len(self.y) {
            self.right(margin);
        } else {
            self.set_x(text::next_word(&self.lines[self.y], self.x));
        }
    }

    /// Jump to a 1-based line; negative numbers count from the end
    pub fn go_to_line(&mut self, lineno: i64, margin: &Margin) {
        self.finalize_previous_action();
        self.select_start = None;
        let count = self.last_line().max(1) as i64;
        let y = if lineno > 0 {
            lineno.min(count) - 1
        } else if lineno < 0 {
            (count + lineno).max(0)
        } else {
            0
        };
        self.y = y as usize;
        self.set_x(0);
        self.scroll_screen_if_needed(margin);
    }

    /// Move the cursor somewhere without touching the selection
    pub fn go_to(&mut self, y: usize, x: usize, margin: &Margin) {
        self.y = y.min(self.last_line());
        self.set_x(x.min(self.line_len(self.y)));
        self.scroll_screen_if_needed(margin);
    }

    pub fn scroll_screen_if_needed(&mut self, margin: &Margin) {
        let body = margin.body_lines().max(1);
        if self.file_y <= self.y && self.y < self.file_y + body {
            return;
        }
        self.file_y = self.y.saturating_sub(body / 2);
    }

    // === Editing ===

    /// Insert a literal character at the cursor
    pub fn c(&mut self, c: char, margin: &Margin) {
        self.select_start = None;
        self.edit("text", false, |f| {
            text::insert_char(&mut f.lines[f.y], f.x, c);
            f.set_x(f.x + 1);
        });
        self.scroll_screen_if_needed(margin);
    }

    fn tab(&mut self, margin: &Margin) {
        self.select_start = None;
        let indent = " ".repeat(TAB_SIZE);
        self.edit("indent", false, |f| {
            text::insert_str(&mut f.lines[f.y], f.x, &indent);
            f.set_x(f.x + TAB_SIZE);
        });
        self.scroll_screen_if_needed(margin);
    }

    fn enter(&mut self, margin: &Margin) {
        self.select_start = None;
        self.edit("newline", false, |f| {
            let rest = text::split_off(&mut f.lines[f.y], f.x);
            f.lines.insert(f.y + 1, rest);
            f.y += 1;
            f.set_x(0);
        });
        self.scroll_screen_if_needed(margin);
    }

    fn backspace(&mut self, margin: &Margin) {
        if self.selection().is_some() {
            self.delete_selection(margin);
            return;
        }
        self.select_start = None;
        if self.x > 0 {
            self.edit("backspace", false, |f| {
                text::remove_char(&mut f.lines[f.y], f.x - 1);
                f.set_x(f.x - 1);
            });
        } else if self.y == self.last_line() && self.y > 0 {
            // the trailing empty line can't be joined away
            self.left(margin);
        } else if self.y > 0 {
            self.edit("backspace", false, |f| {
                let line = f.lines.remove(f.y);
                f.y -= 1;
                f.set_x(f.line_len(f.y));
                f.lines[f.y].push_str(&line);
            });
        }
        self.scroll_screen_if_needed(margin);
    }

    fn delete(&mut self, margin: &Margin) {
        if self.selection().is_some() {
            self.delete_selection(margin);
            return;
        }
        self.select_start = None;
        if self.x < self.line_len(self.y) {
            self.edit("delete", false, |f| {
                text::remove_char(&mut f.lines[f.y], f.x);
            });
        } else if self.y + 2 < self.lines.len() {
            self.edit("delete", false, |f| {
                let next = f.lines.remove(f.y + 1);
                f.lines[f.y].push_str(&next);
            });
        }
    }

    fn delete_selection(&mut self, margin: &Margin) {
        self.cut_selection_named("delete selection", margin);
    }

    // === Selection ===

    /// Normalised (start, end) of the active selection
    pub fn selection(&self) -> Option<((usize, usize), (usize, usize))> {
        let start = self.select_start?;
        let cursor = (self.y, self.x);
        if start == cursor {
            return None;
        }
        Some(if start < cursor { (start, cursor) } else { (cursor, start) })
    }

    fn selection_text(&self, (sy, sx): (usize, usize), (ey, ex): (usize, usize)) -> Vec<String> {
        if sy == ey {
            return vec![text::slice(&self.lines[sy], sx, ex)];
        }
        let mut out = vec![text::slice(&self.lines[sy], sx, self.line_len(sy))];
        out.extend(self.lines[sy + 1..ey].iter().cloned());
        out.push(text::slice(&self.lines[ey], 0, ex));
        out
    }

    fn cut_selection_named(&mut self, name: &'static str, margin: &Margin) -> Vec<String> {
        let Some((start, end)) = self.selection() else {
            self.select_start = None;
            return Vec::new();
        };
        let removed = self.selection_text(start, end);
        self.select_start = None;
        self.edit(name, true, |f| {
            let (sy, sx) = start;
            let (ey, ex) = end;
            let tail = text::slice(&f.lines[ey], ex, f.line_len(ey));
            let mut head = f.lines[sy].clone();
            text::split_off(&mut head, sx);
            head.push_str(&tail);
            f.lines[sy] = head;
            f.lines.drain(sy + 1..=ey);
            f.y = sy;
            f.set_x(sx);
        });
        self.scroll_screen_if_needed(margin);
        removed
    }

    /// Remove the selected text and return it
    pub fn cut_selection(&mut self, margin: &Margin) -> Vec<String> {
        self.cut_selection_named("cut selection", margin)
    }

    /// Insert text (possibly spanning lines) at the cursor
    pub fn uncut_selection(&mut self, pieces: &[String], margin: &Margin) {
        if pieces.is_empty() {
            return;
        }
        self.select_start = None;
        self.edit("uncut selection", true, |f| {
            let after = text::split_off(&mut f.lines[f.y], f.x);
            let Some((first, rest)) = pieces.split_first() else {
                return;
            };
            f.lines[f.y].push_str(first);
            if rest.is_empty() {
                f.set_x(f.x + text::char_len(first));
                f.lines[f.y].push_str(&after);
                return;
            }
            for (i, piece) in rest.iter().enumerate() {
                f.lines.insert(f.y + 1 + i, piece.clone());
            }
            f.y += rest.len();
            f.set_x(f.line_len(f.y));
            f.lines[f.y].push_str(&after);
        });
        self.scroll_screen_if_needed(margin);
    }

    /// Cut the current line, appending it to the buffer when the previous
    /// action was also a line cut
    pub fn cut(&mut self, cut_buffer: &[String]) -> Vec<String> {
        let mut buffer = if self.continues_action("cut") {
            cut_buffer.to_vec()
        } else {
            Vec::new()
        };
        if self.y == self.last_line() {
            return buffer;
        }
        self.select_start = None;
        let y = self.y;
        buffer.push(self.lines[y].clone());
        self.edit("cut", false, |f| {
            f.lines.remove(y);
            f.set_x(0);
        });
        buffer
    }

    /// Insert whole cut lines above the cursor
    pub fn uncut(&mut self, cut_buffer: &[String], margin: &Margin) {
        if cut_buffer.is_empty() {
            return;
        }
        self.select_start = None;
        self.edit("uncut", true, |f| {
            for (i, line) in cut_buffer.iter().enumerate() {
                f.lines.insert(f.y + i, line.clone());
            }
            f.y += cut_buffer.len();
            f.set_x(0);
        });
        self.scroll_screen_if_needed(margin);
    }

    // === Sorting ===

    pub fn sort(&mut self, margin: &Margin) {
        let end = self.last_line();
        self.sort_range(0, end, margin);
    }

    /// Sort the lines the selection touches
    pub fn sort_selection(&mut self, margin: &Margin) {
        let Some(((sy, _), (ey, ex))) = self.selection() else {
            return;
        };
        // a selection ending at column 0 does not include that line
        let end = if ex == 0 && ey > sy { ey } else { ey + 1 };
        self.select_start = None;
        self.sort_range(sy, end.min(self.last_line()), margin);
    }

    fn sort_range(&mut self, start: usize, end: usize, margin: &Margin) {
        self.edit("sort", true, |f| {
            f.lines[start..end].sort();
            f.y = start;
            f.set_x(0);
        });
        self.scroll_screen_if_needed(margin);
    }

    // === Search ===

    /// First match at or after (y, x), without wrapping
    pub fn find_from(&self, re: &Regex, (y, x): (usize, usize)) -> Option<Found> {
        for line_y in y..self.lines.len() {
            let line = &self.lines[line_y];
            let start = if line_y == y {
                if x > text::char_len(line) {
                    continue;
                }
                text::byte_index(line, x)
            } else {
                0
            };
            if let Some(m) = re.find_at(line, start) {
                let mx = text::char_index(line, m.start());
                return Some(Found {
                    y: line_y,
                    x: mx,
                    len: text::char_len(m.as_str()),
                });
            }
        }
        None
    }

    /// Move to the next match after the cursor, wrapping to the top
    pub fn search(&mut self, re: &Regex, status: &mut Status, margin: &Margin) {
        let found = match self.find_from(re, (self.y, self.x + 1)) {
            Some(found) => Some(found),
            None => {
                let found = self.find_from(re, (0, 0));
                if found.is_some() {
                    status.update("search wrapped");
                }
                found
            }
        };
        match found {
            Some(found) => {
                self.finalize_previous_action();
                self.select_start = None;
                self.go_to(found.y, found.x, margin);
            }
            None => status.update("no matches"),
        }
    }

    /// Replace one match, expanding `$n` groups. Returns the replacement's
    /// length in chars.
    pub fn replace_at(&mut self, re: &Regex, found: Found, replacement: &str) -> usize {
        let line = &self.lines[found.y];
        let start = text::byte_index(line, found.x);
        let Some(caps) = re.captures_at(line, start) else {
            return found.len;
        };
        let Some(whole) = caps.get(0) else {
            return found.len;
        };
        let mut expanded = String::new();
        caps.expand(replacement, &mut expanded);
        let new_line = format!("{}{}{}", &line[..whole.start()], expanded, &line[whole.end()..]);
        let new_len = text::char_len(&expanded);

        self.edit("replace", false, |f| {
            f.lines[found.y] = new_line;
            f.y = found.y;
            f.set_x(found.x + new_len);
        });
        new_len
    }

    // === Drawing ===

    pub fn draw(&self, out: &mut impl Write, margin: &Margin) -> io::Result<()> {
        let cols = margin.cols as usize;
        let selection = self.selection();
        for row in 0..margin.body_lines() {
            let screen_y = margin.body_top() + row as u16;
            queue!(out, MoveTo(0, screen_y), Clear(ClearType::CurrentLine))?;
            let y = self.file_y + row;
            if y >= self.lines.len() {
                continue;
            }
            let line = &self.lines[y];
            let x = if y == self.y { self.x } else { 0 };
            let visible = scroll::visible_window(line, x, cols);

            // selection highlighting only when the line is not scrolled
            let highlight = match selection {
                Some(((sy, sx), (ey, ex))) if sy <= y && y <= ey && scroll::line_x(x, cols) == 0 => {
                    let from = if y == sy { sx } else { 0 };
                    let to = if y == ey { ex } else { text::char_len(line) };
                    Some((from.min(cols), to.min(cols)))
                }
                _ => None,
            };
            match highlight {
                Some((from, to)) if from < to => {
                    let chars: Vec<char> = visible.chars().collect();
                    let before: String = chars[..from].iter().collect();
                    let selected: String = chars[from..to].iter().collect();
                    let after: String = chars[to..].iter().collect();
                    queue!(
                        out,
                        Print(before),
                        SetAttribute(Attribute::Reverse),
                        Print(selected),
                        SetAttribute(Attribute::Reset),
                        Print(after)
                    )?;
                }
                _ => queue!(out, Print(visible))?,
            }
        }
        Ok(())
    }

    /// Put the terminal cursor where the file cursor is
    pub fn move_cursor(&self, out: &mut impl Write, margin: &Margin) -> io::Result<()> {
        let x = scroll::screen_column(self.x, margin.cols as usize);
        let y = margin.body_top() as usize + self.y.saturating_sub(self.file_y);
        queue!(out, MoveTo(x as u16, y as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn margin() -> Margin {
        Margin::new(80, 24)
    }

    fn file_with(content: &str) -> File {
        let mut file = File::new(None);
        let split = split_lines(content);
        file.lines = split.lines;
        file.nl = split.nl;
        file.loaded = true;
        file
    }

    fn press(file: &mut File, key: Key) {
        let handler = FILE_KEYS.lookup(&key).unwrap();
        handler(file, &margin());
    }

    fn type_str(file: &mut File, s: &str) {
        for c in s.chars() {
            file.c(c, &margin());
        }
    }

    #[test]
    fn test_split_lines() {
        let split = split_lines("a\nb\n");
        assert_eq!(split.lines, vec!["a".to_string(), "b".to_string(), String::new()]);
        assert_eq!(split.nl, "\n");
        assert!(!split.added_newline);

        let split = split_lines("a\r\nb\r\n");
        assert_eq!(split.lines, vec!["a".to_string(), "b".to_string(), String::new()]);
        assert_eq!(split.nl, "\r\n");
        assert!(!split.mixed_endings);

        let split = split_lines("no newline");
        assert_eq!(split.lines, vec!["no newline".to_string(), String::new()]);
        assert!(split.added_newline);

        let split = split_lines("");
        assert_eq!(split.lines, vec![String::new()]);
        assert!(!split.added_newline);
    }

    #[test]
    fn test_split_lines_mixed_endings() {
        let split = split_lines("a\r\nb\n");
        assert_eq!(split.lines, vec!["a".to_string(), "b".to_string(), String::new()]);
        assert_eq!(split.nl, "\n");
        assert!(split.mixed_endings);

        let split = split_lines("a\r\nb\r\nc\n");
        assert_eq!(split.nl, "\r\n");
        assert!(split.mixed_endings);
    }

    #[test]
    fn test_load_mixed_endings_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.txt");
        std::fs::write(&path, "a\r\nb\r\nc\n").unwrap();
        let mut status = Status::new(25);

        let mut file = File::new(Some(path));
        file.ensure_loaded(&mut status);
        assert_eq!(file.nl, "\r\n");
        assert_eq!(status.message(), "(file has mixed line endings, saving will use CRLF)");
    }

    #[test]
    fn test_load_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"caf\xe9\n").unwrap();
        let mut status = Status::new(25);

        let mut file = File::new(Some(path.clone()));
        file.ensure_loaded(&mut status);
        assert!(file.undecodable);
        assert_eq!(file.lines, vec!["caf\u{fffd}".to_string(), String::new()]);
        assert_eq!(status.message(), format!("{} is not valid UTF-8", path.display()));
    }

    #[test]
    fn test_load_missing_and_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut status = Status::new(25);

        let mut missing = File::new(Some(dir.path().join("new.txt")));
        missing.ensure_loaded(&mut status);
        assert_eq!(missing.lines, vec![String::new()]);
        assert_eq!(missing.sha256, sha256_hex(b""));

        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();
        let mut file = File::new(Some(path));
        file.ensure_loaded(&mut status);
        assert_eq!(file.lines, ["one", "two", ""]);
        assert_eq!(file.sha256, sha256_hex(b"one\ntwo\n"));
        assert!(!file.modified);
    }

    #[test]
    fn test_load_unreadable_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut status = Status::new(25);
        // a directory can't be read as a file
        let mut file = File::new(Some(dir.path().to_path_buf()));
        file.ensure_loaded(&mut status);
        assert!(status.message().starts_with("cannot read"));
        assert_eq!(file.lines, vec![String::new()]);
    }

    #[test]
    fn test_typing_keeps_trailing_line() {
        let mut file = file_with("");
        type_str(&mut file, "hi");
        assert_eq!(file.lines, ["hi", ""]);
        assert!(file.modified);
        press(&mut file, Key::Enter);
        type_str(&mut file, "there");
        assert_eq!(file.lines, ["hi", "there", ""]);
        assert_eq!((file.y, file.x), (1, 5));
    }

    #[test]
    fn test_typing_coalesces_into_one_action() {
        let mut file = file_with("");
        type_str(&mut file, "abc");
        assert_eq!(file.undo_stack.len(), 1);

        press(&mut file, Key::Left);
        type_str(&mut file, "x");
        assert_eq!(file.undo_stack.len(), 2);
        assert!(file.redo_stack.is_empty());
    }

    #[test]
    fn test_undo_then_redo_restores() {
        let mut file = file_with("hello\n");
        file.x = 5;
        type_str(&mut file, " world");
        let after_edit = file.lines.clone();

        let action = file.undo_stack.pop().unwrap();
        let inverse = action.apply(&mut file);
        assert_eq!(file.lines, ["hello", ""]);
        assert!(!file.modified);

        let redo = inverse.apply(&mut file);
        assert_eq!(file.lines, after_edit);
        assert!(file.modified);
        assert_eq!(redo.name, "text");
    }

    #[test]
    fn test_backspace_and_delete() {
        let mut file = file_with("ab\ncd\n");
        file.y = 1;
        press(&mut file, Key::Backspace);
        assert_eq!(file.lines, ["abcd", ""]);
        assert_eq!((file.y, file.x), (0, 2));

        press(&mut file, Key::Delete);
        assert_eq!(file.lines, ["abd", ""]);

        // end of the last text line: nothing to join
        press(&mut file, Key::End);
        press(&mut file, Key::Delete);
        assert_eq!(file.lines, ["abd", ""]);

        // backspace on the trailing line just moves up
        press(&mut file, Key::Down);
        press(&mut file, Key::Backspace);
        assert_eq!(file.lines, ["abd", ""]);
        assert_eq!((file.y, file.x), (0, 3));
    }

    #[test]
    fn test_word_motion() {
        let mut file = file_with("ab cd\nef\n");
        press(&mut file, Key::End);
        press(&mut file, Key::CtrlLeft);
        assert_eq!(file.x, 3);
        press(&mut file, Key::CtrlLeft);
        assert_eq!(file.x, 0);
        press(&mut file, Key::CtrlLeft);
        assert_eq!((file.y, file.x), (0, 0));

        press(&mut file, Key::CtrlRight);
        assert_eq!(file.x, 2);
        press(&mut file, Key::End);
        press(&mut file, Key::CtrlRight);
        assert_eq!((file.y, file.x), (1, 0));
    }

    #[test]
    fn test_vertical_motion_keeps_column_hint() {
        let mut file = file_with("long line\nab\nanother line\n");
        press(&mut file, Key::End);
        press(&mut file, Key::Down);
        assert_eq!(file.x, 2);
        press(&mut file, Key::Down);
        assert_eq!(file.x, 9);
    }

    #[test]
    fn test_cut_selection_round_trip() {
        let mut file = file_with("one two\nthree four\nfive\n");
        file.x = 4;
        press(&mut file, Key::ShiftDown);
        press(&mut file, Key::ShiftRight);
        let before = file.lines.clone();

        let cut = file.cut_selection(&margin());
        assert_eq!(cut, ["two", "three"]);
        assert_eq!(file.lines, ["one  four", "five", ""]);
        assert_eq!((file.y, file.x), (0, 4));

        file.uncut_selection(&cut, &margin());
        assert_eq!(file.lines, before);
    }

    #[test]
    fn test_single_line_selection_round_trip() {
        let mut file = file_with("hello world\n");
        press(&mut file, Key::ShiftEnd);
        let cut = file.cut_selection(&margin());
        assert_eq!(cut, ["hello world"]);
        assert_eq!(file.lines, ["", ""]);
        file.uncut_selection(&cut, &margin());
        assert_eq!(file.lines, ["hello world", ""]);
    }

    #[test]
    fn test_line_cut_accumulates() {
        let mut file = file_with("a\nb\nc\n");
        let buffer = file.cut(&[]);
        let buffer = file.cut(&buffer);
        assert_eq!(buffer, ["a", "b"]);
        assert_eq!(file.lines, ["c", ""]);

        // moving breaks the run, a new cut starts a fresh buffer
        press(&mut file, Key::Right);
        press(&mut file, Key::Left);
        let buffer = file.cut(&buffer);
        assert_eq!(buffer, ["c"]);

        file.uncut(&["a".to_string(), "b".to_string()], &margin());
        assert_eq!(file.lines, ["a", "b", ""]);
        assert_eq!(file.y, 2);
    }

    #[test]
    fn test_sort() {
        let mut file = file_with("c\na\nb\n");
        file.sort(&margin());
        assert_eq!(file.lines, ["a", "b", "c", ""]);

        let mut file = file_with("z\nc\na\nb\n");
        file.y = 1;
        press(&mut file, Key::ShiftDown);
        press(&mut file, Key::ShiftDown);
        // selection ends at column 0 of "b", which is not included
        file.sort_selection(&margin());
        assert_eq!(file.lines, ["z", "a", "c", "b", ""]);
    }

    #[test]
    fn test_search_wraps() {
        let mut file = file_with("foo\nbar\nfoo bar\n");
        let mut status = Status::new(25);
        let re = Regex::new("bar").unwrap();

        file.search(&re, &mut status, &margin());
        assert_eq!((file.y, file.x), (1, 0));
        file.search(&re, &mut status, &margin());
        assert_eq!((file.y, file.x), (2, 4));
        file.search(&re, &mut status, &margin());
        assert_eq!((file.y, file.x), (1, 0));
        assert_eq!(status.message(), "search wrapped");

        let re = Regex::new("nope").unwrap();
        file.search(&re, &mut status, &margin());
        assert_eq!(status.message(), "no matches");
    }

    #[test]
    fn test_replace_at_expands_groups() {
        let mut file = file_with("key=value\n");
        let re = Regex::new(r"(\w+)=(\w+)").unwrap();
        let found = file.find_from(&re, (0, 0)).unwrap();
        let len = file.replace_at(&re, found, "$2=$1");
        assert_eq!(file.lines, ["value=key", ""]);
        assert_eq!(len, 9);
    }

    #[test]
    fn test_go_to_line() {
        let mut file = file_with("a\nb\nc\n");
        file.go_to_line(2, &margin());
        assert_eq!(file.y, 1);
        file.go_to_line(99, &margin());
        assert_eq!(file.y, 2);
        file.go_to_line(-1, &margin());
        assert_eq!(file.y, 2);
        file.go_to_line(-3, &margin());
        assert_eq!(file.y, 0);
    }

    #[test]
    fn test_mark_saved() {
        let mut file = file_with("");
        type_str(&mut file, "a");
        press(&mut file, Key::Enter);
        press(&mut file, Key::Left);
        type_str(&mut file, "b");
        file.mark_saved();

        let flags: Vec<(bool, bool)> = file
            .undo_stack
            .iter()
            .map(|a| (a.start_modified, a.end_modified))
            .collect();
        assert_eq!(flags, [(true, true), (true, true), (true, false)]);
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let small = Margin::new(80, 6);
        let mut file = file_with(&"x\n".repeat(30));
        file.go_to_line(20, &small);
        assert!(file.file_y <= file.y && file.y < file.file_y + small.body_lines());
    }
}
