//! The editing session - open files, the per-file edit loop and the
//! session-level commands (save, quit, undo, search, ...)

use crate::config::{Settings, VERSION_STR};
use crate::dispatch::{route, shared_keys, DispatchTable, Route};
use crate::error::Error;
use crate::file::{sha256_hex, File, FILE_KEYS};
use crate::history::HistoryStore;
use crate::keys::{Key, KeyDecoder, KeyEvent};
use crate::margin::Margin;
use crate::perf::Perf;
use crate::prompt::{Prompt, PromptResult};
use crate::status::Status;
use crate::terminal::Terminal;
use crate::text;
use anyhow::{Context, Result};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
};
use regex::Regex;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Why the edit loop for one file stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditResult {
    Exit,
    Next,
    Prev,
}

/// Last cut text and how it was cut
#[derive(Debug, Default)]
struct CutBuffer {
    lines: Vec<String>,
    from_selection: bool,
}

/// Options for [`Session::prompt`]
#[derive(Debug, Default)]
pub struct PromptOptions<'a> {
    /// History category to offer and record into
    pub history: Option<&'a str>,
    /// Return an empty answer instead of treating it as cancelled
    pub allow_empty: bool,
    /// Show the previous answer and use it for an empty submit
    pub default_prev: bool,
    /// Initial text of the draft line
    pub default: Option<String>,
}

pub type SessionHandler = fn(&mut Session) -> Result<Option<EditResult>>;

/// Session-level key bindings
pub static SESSION_KEYS: LazyLock<DispatchTable<SessionHandler>> = LazyLock::new(|| {
    DispatchTable::<SessionHandler>::default()
        .bind(Key::Resize, |s| {
            s.resize()?;
            Ok(None)
        })
        .bind(Key::Ctrl('_'), Session::go_to_line)
        .bind(Key::Ctrl('C'), Session::current_position)
        .bind(Key::Ctrl('K'), Session::cut)
        .bind(Key::Ctrl('U'), Session::uncut)
        .bind(Key::Alt('u'), Session::undo)
        .bind(Key::Alt('U'), Session::redo)
        .bind(Key::Ctrl('W'), Session::search)
        .bind(Key::Ctrl('\\'), Session::replace)
        .bind(Key::Escape, Session::command)
        .bind(Key::Ctrl('S'), |s| s.save().map(|_| None))
        .bind(Key::Ctrl('O'), |s| s.save_as().map(|_| None))
        .bind(Key::Ctrl('X'), Session::quit)
        .bind(Key::AltLeft, |_| Ok(Some(EditResult::Prev)))
        .bind(Key::AltRight, |_| Ok(Some(EditResult::Next)))
        .bind(Key::Ctrl('Z'), Session::background)
});

/// Normalise a file index that may have run past either end
pub fn wrap_index(i: isize, len: usize) -> isize {
    i.rem_euclid(len as isize)
}

pub struct Session {
    pub term: Box<dyn Terminal>,
    decoder: KeyDecoder,
    pub files: Vec<File>,
    /// Index of the current file; normalised at the top of each edit loop
    pub current: isize,
    pub history: HistoryStore,
    perf: Perf,
    pub status: Status,
    pub margin: Margin,
    cut_buffer: CutBuffer,
}

impl Session {
    /// With no files, a single unnamed buffer is opened
    pub fn new(
        term: Box<dyn Terminal>,
        files: Vec<File>,
        history: HistoryStore,
        perf: Perf,
        settings: &Settings,
    ) -> Result<Self> {
        let (cols, lines) = term.size().context("querying terminal size")?;
        for key in shared_keys(&*FILE_KEYS, &*SESSION_KEYS) {
            log::warn!("{} is bound for both the buffer and the session", key);
        }
        let files = if files.is_empty() {
            vec![File::new(None)]
        } else {
            files
        };
        Ok(Self {
            term,
            decoder: KeyDecoder::new(),
            files,
            current: 0,
            history,
            perf,
            status: Status::new(settings.status_ticks),
            margin: Margin::new(cols, lines),
            cut_buffer: CutBuffer::default(),
        })
    }

    fn index(&self) -> usize {
        self.current as usize
    }

    pub fn file(&self) -> &File {
        &self.files[self.index()]
    }

    pub fn file_mut(&mut self) -> &mut File {
        let i = self.index();
        &mut self.files[i]
    }

    /// Edit files until every one has been closed
    pub fn run(&mut self) -> Result<()> {
        while !self.files.is_empty() {
            self.current = wrap_index(self.current, self.files.len());
            match self.edit()? {
                EditResult::Exit => {
                    let file = self.files.remove(self.index());
                    log::debug!("closed {}", file.display_name());
                }
                EditResult::Next => self.current += 1,
                EditResult::Prev => self.current -= 1,
            }
            self.status.clear();
        }
        self.perf.end();
        Ok(())
    }

    /// The edit loop for the current file
    fn edit(&mut self) -> Result<EditResult> {
        let i = self.index();
        self.files[i].ensure_loaded(&mut self.status);

        loop {
            self.status.tick(&self.margin);
            self.draw()?;
            self.files[i].move_cursor(&mut self.term, &self.margin)?;
            self.term.flush()?;

            let event = self.get_char()?;
            match route(&event, &*FILE_KEYS, &*SESSION_KEYS) {
                Route::Buffer(handler) => handler(&mut self.files[i], &self.margin),
                Route::Session(handler) => {
                    if let Some(result) = handler(self)? {
                        return Ok(result);
                    }
                }
                Route::Literal(c) => self.files[i].c(c, &self.margin),
                Route::Unknown => {
                    log::debug!("unknown key: {}", event);
                    self.status.update(format!("unknown key: {}", event));
                }
            }
        }
    }

    /// Next key event, timing the handling of the previous one
    pub fn get_char(&mut self) -> Result<KeyEvent> {
        self.perf.end();
        let event = self
            .decoder
            .next_key(&mut *self.term)
            .context("reading terminal input")?;
        self.perf.start(event.key.to_string());
        Ok(event)
    }

    // === Drawing ===

    fn header_text(&self) -> String {
        let file = self.file();
        let mut filename = file.display_name();
        if file.modified {
            filename.push_str(" *");
        }
        let files = if self.files.len() > 1 {
            format!("[{}/{}] ", self.index() + 1, self.files.len())
        } else {
            String::new()
        };
        let version_width = text::char_len(VERSION_STR) + 2 + text::char_len(&files);

        let cols = self.margin.cols as usize;
        let name_len = text::char_len(&filename);
        let left = cols.saturating_sub(name_len) / 2;
        let centered = format!("{}{}", " ".repeat(left), filename);
        let centered = format!("{:<width$}", centered, width = cols);
        let centered: String = centered.chars().skip(version_width).collect();

        let header = format!(" {} {}{}{}", VERSION_STR, files, centered, files);
        let header: String = header.chars().take(cols).collect();
        format!("{:<width$}", header, width = cols)
    }

    fn draw(&mut self) -> io::Result<()> {
        if self.margin.header {
            let header = self.header_text();
            queue!(
                self.term,
                MoveTo(0, 0),
                SetAttribute(Attribute::Reverse),
                Print(header),
                SetAttribute(Attribute::Reset)
            )?;
        }
        let i = self.index();
        self.files[i].draw(&mut self.term, &self.margin)?;
        self.status.draw(&mut self.term, &self.margin)
    }

    /// Pick up the new terminal size and redraw everything
    pub fn resize(&mut self) -> Result<()> {
        let (cols, lines) = self.term.size().context("querying terminal size")?;
        self.margin = Margin::new(cols, lines);
        log::debug!("resized to {}x{}", cols, lines);
        let margin = self.margin;
        self.file_mut().scroll_screen_if_needed(&margin);
        self.draw()?;
        self.term.flush()?;
        Ok(())
    }

    // === Prompts ===

    /// Ask for a line of text. An empty answer counts as cancelled unless
    /// `allow_empty` is set.
    pub fn prompt(&mut self, label: &str, opts: PromptOptions<'_>) -> Result<PromptResult> {
        self.status.clear();
        let mut label = label.to_string();
        let mut lines = match opts.history {
            Some(category) => {
                if opts.default_prev {
                    if let Some(prev) = self.history.previous(category) {
                        label = format!("{} [{}]", label, prev);
                    }
                }
                self.history.entries(category).to_vec()
            }
            None => Vec::new(),
        };
        lines.push(opts.default.unwrap_or_default());

        let PromptResult::Submitted(value) = Prompt::new(self, label, &mut lines).run()? else {
            return Ok(PromptResult::Cancelled);
        };

        if let Some(category) = opts.history {
            if !value.is_empty() {
                self.history.record(category, &value);
            } else if opts.default_prev {
                if let Some(prev) = self.history.previous(category) {
                    return Ok(PromptResult::Submitted(prev.to_string()));
                }
            }
        }

        if value.is_empty() && !opts.allow_empty {
            Ok(self.status.cancelled())
        } else {
            Ok(PromptResult::Submitted(value))
        }
    }

    /// Ask a one-key question; `None` when cancelled with ^C
    pub fn quick_prompt(&mut self, label: &str, options: &str) -> Result<Option<char>> {
        loop {
            self.draw_quick_prompt(label)?;

            let event = self.get_char()?;
            match event.key {
                Key::Resize => self.resize()?,
                Key::Ctrl('C') => {
                    self.status.cancelled();
                    return Ok(None);
                }
                Key::Char(c) if options.contains(c) => return Ok(Some(c)),
                _ => {}
            }
        }
    }

    fn draw_quick_prompt(&mut self, label: &str) -> io::Result<()> {
        let cols = self.margin.cols as usize;
        let len = text::char_len(label);
        let line = if len > cols {
            let mut line = text::slice(label, 0, cols.saturating_sub(1));
            line.push(crate::config::ELLIPSIS);
            line
        } else {
            format!("{:<width$}", label, width = cols)
        };
        let x = (len + 1).min(cols.saturating_sub(1));
        let row = self.margin.footer_row();

        let out = &mut self.term;
        queue!(
            out,
            MoveTo(0, row),
            SetAttribute(Attribute::Reverse),
            Print(line),
            SetAttribute(Attribute::Reset),
            MoveTo(x as u16, row)
        )?;
        out.flush()
    }

    // === Commands ===

    fn go_to_line(&mut self) -> Result<Option<EditResult>> {
        let PromptResult::Submitted(response) =
            self.prompt("enter line number", PromptOptions::default())?
        else {
            return Ok(None);
        };
        match response.trim().parse::<i64>() {
            Ok(lineno) => {
                let margin = self.margin;
                self.file_mut().go_to_line(lineno, &margin);
            }
            Err(_) => self.status.update(format!("not an integer: {:?}", response)),
        }
        Ok(None)
    }

    fn current_position(&mut self) -> Result<Option<EditResult>> {
        let file = self.file();
        let line_count = file.lines.len().saturating_sub(1).max(1);
        let lines_word = if line_count == 1 { "line" } else { "lines" };
        let message = format!(
            "line {}, col {} (of {} {})",
            file.y + 1,
            file.x + 1,
            line_count,
            lines_word
        );
        self.status.update(message);
        Ok(None)
    }

    fn cut(&mut self) -> Result<Option<EditResult>> {
        let margin = self.margin;
        let i = self.index();
        let file = &mut self.files[i];
        self.cut_buffer = if file.select_start.is_some() {
            CutBuffer {
                lines: file.cut_selection(&margin),
                from_selection: true,
            }
        } else {
            CutBuffer {
                lines: file.cut(&self.cut_buffer.lines),
                from_selection: false,
            }
        };
        Ok(None)
    }

    fn uncut(&mut self) -> Result<Option<EditResult>> {
        let margin = self.margin;
        let i = self.index();
        let file = &mut self.files[i];
        if self.cut_buffer.from_selection {
            file.uncut_selection(&self.cut_buffer.lines, &margin);
        } else {
            file.uncut(&self.cut_buffer.lines, &margin);
        }
        Ok(None)
    }

    fn undo_redo(&mut self, op: &str, undo: bool) {
        let margin = self.margin;
        let i = self.index();
        let file = &mut self.files[i];
        let action = if undo {
            file.undo_stack.pop()
        } else {
            file.redo_stack.pop()
        };
        let Some(action) = action else {
            self.status.update(format!("nothing to {}!", op));
            return;
        };

        let name = action.name;
        let inverse = action.apply(file);
        if undo {
            file.redo_stack.push(inverse);
        } else {
            file.undo_stack.push(inverse);
        }
        file.scroll_screen_if_needed(&margin);
        self.status.update(format!("{}: {}", op, name));
    }

    fn undo(&mut self) -> Result<Option<EditResult>> {
        self.undo_redo("undo", true);
        Ok(None)
    }

    fn redo(&mut self) -> Result<Option<EditResult>> {
        self.undo_redo("redo", false);
        Ok(None)
    }

    fn get_search_re(&mut self, label: &str) -> Result<Option<Regex>> {
        let opts = PromptOptions {
            history: Some("search"),
            default_prev: true,
            ..PromptOptions::default()
        };
        let PromptResult::Submitted(response) = self.prompt(label, opts)? else {
            return Ok(None);
        };
        match Regex::new(&response) {
            Ok(re) => Ok(Some(re)),
            Err(e) => {
                log::debug!("invalid regex {:?}: {}", response, e);
                self.status.update(format!("invalid regex: {:?}", response));
                Ok(None)
            }
        }
    }

    fn search(&mut self) -> Result<Option<EditResult>> {
        if let Some(re) = self.get_search_re("search")? {
            let margin = self.margin;
            let i = self.index();
            self.files[i].search(&re, &mut self.status, &margin);
        }
        Ok(None)
    }

    fn replace(&mut self) -> Result<Option<EditResult>> {
        let Some(re) = self.get_search_re("search (to replace)")? else {
            return Ok(None);
        };
        let opts = PromptOptions {
            history: Some("replace"),
            allow_empty: true,
            ..PromptOptions::default()
        };
        if let PromptResult::Submitted(replacement) = self.prompt("replace with", opts)? {
            self.replace_matches(&re, &replacement)?;
        }
        Ok(None)
    }

    /// Walk every match from the cursor, wrapping once, asking before each
    /// replacement until "all" is chosen
    fn replace_matches(&mut self, re: &Regex, replacement: &str) -> Result<()> {
        let margin = self.margin;
        let i = self.index();
        self.files[i].finalize_previous_action();

        let start = (self.files[i].y, self.files[i].x);
        let mut limit_x = start.1;
        let mut pos = start;
        let mut wrapped = false;
        let mut matched = false;
        let mut count = 0;
        let mut answer = None;

        loop {
            let found = match self.files[i].find_from(re, pos) {
                Some(found) if wrapped && (found.y, found.x) >= (start.0, limit_x) => None,
                found => found,
            };
            let Some(found) = found else {
                if wrapped {
                    break;
                }
                wrapped = true;
                pos = (0, 0);
                continue;
            };
            matched = true;

            if answer != Some('a') {
                let file = &mut self.files[i];
                file.select_start = Some((found.y, found.x));
                file.go_to(found.y, found.x + found.len, &margin);
                self.draw()?;
                answer = self.quick_prompt("replace [y(es), n(o), a(ll)]?", "yna")?;
                self.files[i].select_start = None;
            }

            match answer {
                Some('y') | Some('a') => {
                    let new_len = self.files[i].replace_at(re, found, replacement);
                    count += 1;
                    if wrapped && found.y == start.0 {
                        limit_x = (limit_x + new_len).saturating_sub(found.len);
                    }
                    // step past empty matches
                    pos = (found.y, found.x + new_len + usize::from(found.len == 0));
                }
                Some(_) => pos = (found.y, found.x + 1),
                None => {
                    self.files[i].finalize_previous_action();
                    return Ok(());
                }
            }
        }

        let file = &mut self.files[i];
        file.finalize_previous_action();
        file.scroll_screen_if_needed(&margin);
        if !matched {
            self.status.update("no matches");
        } else {
            let occurrences = if count == 1 { "occurrence" } else { "occurrences" };
            self.status.update(format!("replaced {} {}", count, occurrences));
        }
        Ok(())
    }

    /// `:q`, `:w`, `:wq` and `:sort`
    fn command(&mut self) -> Result<Option<EditResult>> {
        let opts = PromptOptions {
            history: Some("command"),
            ..PromptOptions::default()
        };
        let PromptResult::Submitted(response) = self.prompt("", opts)? else {
            return Ok(None);
        };
        match response.as_str() {
            ":q" => return Ok(Some(EditResult::Exit)),
            ":w" => {
                self.save()?;
            }
            ":wq" => {
                if self.save()? {
                    return Ok(Some(EditResult::Exit));
                }
            }
            ":sort" => {
                let margin = self.margin;
                let file = self.file_mut();
                if file.select_start.is_some() {
                    file.sort_selection(&margin);
                } else {
                    file.sort(&margin);
                }
                self.status.update("sorted!");
            }
            _ => self.status.update(format!("invalid command: {}", response)),
        }
        Ok(None)
    }

    /// Write the current file. Returns whether it was written.
    pub fn save(&mut self) -> Result<bool> {
        self.file_mut().finalize_previous_action();

        if self.file().undecodable {
            let name = self.file().display_name();
            log::warn!("not saving {}: not valid UTF-8", name);
            self.status.update(format!("(not saving {}: not valid UTF-8)", name));
            return Ok(false);
        }

        if self.file().filename.is_none() {
            match self.prompt("enter filename", PromptOptions::default())? {
                PromptResult::Submitted(name) => self.file_mut().filename = Some(PathBuf::from(name)),
                PromptResult::Cancelled => return Ok(false),
            }
        }

        let i = self.index();
        let file = &mut self.files[i];
        let Some(path) = file.filename.clone() else {
            return Ok(false);
        };

        let on_disk = match std::fs::read(&path) {
            Ok(bytes) => sha256_hex(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => sha256_hex(b""),
            Err(source) => {
                let err = Error::Read { path, source };
                log::error!("{}", err);
                self.status.update(err.to_string());
                return Ok(false);
            }
        };

        let contents = file.lines.join(file.nl);
        let to_save = sha256_hex(contents.as_bytes());

        // accepted when the disk still has what we loaded, or already has
        // exactly what we are about to write
        if on_disk != file.sha256 && on_disk != to_save {
            log::warn!("{} changed on disk, not saving", path.display());
            self.status.update("(file changed on disk, not implemented)");
            return Ok(false);
        }

        if let Err(source) = std::fs::write(&path, &contents) {
            let err = Error::Write { path, source };
            log::error!("{}", err);
            self.status.update(err.to_string());
            return Ok(false);
        }

        file.modified = false;
        file.sha256 = to_save;
        file.mark_saved();
        let num_lines = file.lines.len() - 1;
        let lines = if num_lines == 1 { "line" } else { "lines" };
        log::info!("saved {} ({} {})", path.display(), num_lines, lines);
        self.status.update(format!("saved! ({} {} written)", num_lines, lines));
        Ok(true)
    }

    /// Save under a (possibly new) name
    pub fn save_as(&mut self) -> Result<bool> {
        let opts = PromptOptions {
            default: self.file().filename.as_ref().map(|p| p.display().to_string()),
            ..PromptOptions::default()
        };
        let PromptResult::Submitted(name) = self.prompt("enter filename", opts)? else {
            return Ok(false);
        };

        let path = PathBuf::from(name);
        let file = self.file_mut();
        if file.filename.as_ref() != Some(&path) {
            // the loaded hash belongs to the old path
            file.sha256 = sha256_hex(b"");
            file.filename = Some(path);
        }
        self.save()
    }

    fn quit(&mut self) -> Result<Option<EditResult>> {
        if !self.file().modified {
            return Ok(Some(EditResult::Exit));
        }
        match self.quick_prompt("file is modified - save [y(es), n(o)]?", "yn")? {
            Some('y') => Ok(self.save()?.then_some(EditResult::Exit)),
            Some(_) => Ok(Some(EditResult::Exit)),
            None => Ok(None),
        }
    }

    /// Suspend to the shell (^Z)
    fn background(&mut self) -> Result<Option<EditResult>> {
        self.term.suspend().context("suspending")?;
        self.resize()?;
        Ok(None)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::terminal::testing::ScriptedTerminal;
    use std::fs;
    use std::path::Path;

    const ALT_RIGHT: &str = "\x1b[1;3C";
    const ALT_LEFT: &str = "\x1b[1;3D";

    fn open(path: &Path) -> File {
        File::new(Some(path.to_path_buf()))
    }

    /// Run until the script is exhausted, which surfaces as an input error
    fn run_script(session: &mut Session) {
        let result = session.run();
        assert!(result.is_err(), "session ended before the script did");
    }

    #[test]
    fn test_wrap_index() {
        for len in 1..5usize {
            for i in -20..20isize {
                let wrapped = wrap_index(i, len);
                assert!((0..len as isize).contains(&wrapped));
            }
        }
        assert_eq!(wrap_index(-1, 3), 2);
        assert_eq!(wrap_index(4, 3), 1);
    }

    #[test]
    fn test_tables_are_disjoint() {
        assert!(shared_keys(&*FILE_KEYS, &*SESSION_KEYS).is_empty());
    }

    #[test]
    fn test_next_prev_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<File> = ["a", "b", "c"].map(|n| open(&dir.path().join(n))).into();
        let script = [ALT_RIGHT, ALT_RIGHT, ALT_RIGHT, ALT_RIGHT, "\x18", ALT_LEFT, ALT_LEFT, ALT_LEFT];
        let mut session = scripted_session(&script, files);
        run_script(&mut session);

        // four steps right from "a" lands on "b", which is closed
        let names: Vec<String> = session.files.iter().map(File::display_name).collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with('a') && names[1].ends_with('c'));
        // three steps left from "c" wraps round to "a"
        assert!(session.file().display_name().ends_with('a'));
    }

    #[test]
    fn test_closing_last_file_ends_session() {
        let mut session = scripted_session(&["\x18"], Vec::new());
        session.run().unwrap();
        assert!(session.files.is_empty());
    }

    #[test]
    fn test_header() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![open(&dir.path().join("a")), File::new(None)];
        let mut session = scripted_session(&[], files);
        session.current = 1;
        session.file_mut().modified = true;
        let header = session.header_text();
        assert_eq!(header.chars().count(), 80);
        assert!(header.starts_with(&format!(" {} [2/2] ", VERSION_STR)));
        assert!(header.contains("<<new file>> *"));
    }

    #[test]
    fn test_save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\n").unwrap();

        let mut session = scripted_session(&["b", "\x13", "\x13"], vec![open(&path)]);
        run_script(&mut session);

        assert_eq!(fs::read_to_string(&path).unwrap(), "ba\n");
        assert_eq!(session.status.message(), "saved! (1 line written)");
        assert!(!session.file().modified);
    }

    #[test]
    fn test_save_keeps_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\r\nb\r\n").unwrap();

        let mut session = scripted_session(&["x", "\x13"], vec![open(&path)]);
        run_script(&mut session);
        assert_eq!(fs::read_to_string(&path).unwrap(), "xa\r\nb\r\n");
        assert_eq!(session.status.message(), "saved! (2 lines written)");
    }

    #[test]
    fn test_save_leaves_invalid_utf8_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        fs::write(&path, b"caf\xe9\n").unwrap();

        let mut session = scripted_session(&["\x13"], vec![open(&path)]);
        run_script(&mut session);
        assert_eq!(fs::read(&path).unwrap(), b"caf\xe9\n");
        assert_eq!(
            session.status.message(),
            format!("(not saving {}: not valid UTF-8)", path.display())
        );

        // edits do not make it writable either
        let mut session = scripted_session(&["x", "\x13"], vec![open(&path)]);
        run_script(&mut session);
        assert_eq!(fs::read(&path).unwrap(), b"caf\xe9\n");
        assert!(session.file().modified);
    }

    #[test]
    fn test_save_normalizes_mixed_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\nb\nc\r\n").unwrap();

        let mut session = scripted_session(&["\x13"], vec![open(&path)]);
        run_script(&mut session);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn test_save_detects_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "original\n").unwrap();

        let mut file = open(&path);
        file.ensure_loaded(&mut Status::new(25));
        fs::write(&path, "changed elsewhere\n").unwrap();

        let mut session = scripted_session(&["x", "\x13"], vec![file]);
        run_script(&mut session);

        assert_eq!(fs::read_to_string(&path).unwrap(), "changed elsewhere\n");
        assert_eq!(session.status.message(), "(file changed on disk, not implemented)");
        assert!(session.file().modified);
    }

    #[test]
    fn test_save_accepts_disk_already_matching() {
        // an external write of exactly our content is not a conflict
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\n").unwrap();

        let mut file = open(&path);
        file.ensure_loaded(&mut Status::new(25));
        fs::write(&path, "ba\n").unwrap();

        let mut session = scripted_session(&["b", "\x13"], vec![file]);
        run_script(&mut session);
        assert_eq!(session.status.message(), "saved! (1 line written)");
        assert_eq!(fs::read_to_string(&path).unwrap(), "ba\n");
    }

    #[test]
    fn test_save_unnamed_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        let name = path.display().to_string();

        let mut session = scripted_session(&["hi", "\x13", name.as_str(), "\r"], Vec::new());
        run_script(&mut session);
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi\n");
        assert_eq!(session.file().filename.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_save_unnamed_cancelled() {
        let mut session = scripted_session(&["hi", "\x13", "\x03"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.status.message(), "cancelled");
        assert!(session.file().filename.is_none());
        assert!(session.file().modified);
    }

    #[test]
    fn test_save_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("f.txt");

        let mut session = scripted_session(&["x", "\x13"], vec![open(&path)]);
        run_script(&mut session);
        assert!(session.status.message().starts_with("cannot write"));
        assert!(session.file().modified);
    }

    #[test]
    fn test_save_as_new_path() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.txt");
        let new = dir.path().join("new.txt");
        fs::write(&old, "a\n").unwrap();

        // clear the pre-filled name with ^A ^K, then type the new one
        let new_name = new.display().to_string();
        let script = ["\x0f", "\x01", "\x0b", new_name.as_str(), "\r"];
        let mut session = scripted_session(&script, vec![open(&old)]);
        run_script(&mut session);
        assert_eq!(fs::read_to_string(&new).unwrap(), "a\n");
        assert_eq!(session.file().filename.as_deref(), Some(new.as_path()));
    }

    #[test]
    fn test_undo_redo() {
        let mut session = scripted_session(&["ab", "\x1bu"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.file().lines, [""]);
        assert_eq!(session.status.message(), "undo: text");
        assert!(!session.file().modified);

        let mut session = scripted_session(&["ab", "\x1bu", "\x1bU"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.file().lines, ["ab", ""]);
        assert_eq!(session.status.message(), "redo: text");
        assert!(session.file().modified);

        let mut session = scripted_session(&["\x1bU"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.status.message(), "nothing to redo!");
    }

    #[test]
    fn test_cut_uncut_selection_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "one two\nthree\n").unwrap();

        // select "one two\nth" and cut it, then put it straight back
        let script = ["\x1b[1;2B", "\x1b[1;2C", "\x1b[1;2C", "\x0b", "\x15"];
        let mut session = scripted_session(&script, vec![open(&path)]);
        run_script(&mut session);
        assert_eq!(session.file().lines, ["one two", "three", ""]);
        assert!(session.cut_buffer.from_selection);
    }

    #[test]
    fn test_line_cut_accumulates() {
        let mut file = File::new(None);
        file.lines = vec!["a".into(), "b".into(), "c".into(), String::new()];
        let script = ["\x0b", "\x0b", "\x1b[B", "\x15"];
        let mut session = scripted_session(&script, vec![file]);
        run_script(&mut session);
        assert_eq!(session.cut_buffer.lines, ["a", "b"]);
        assert_eq!(session.file().lines, ["c", "a", "b", ""]);
    }

    #[test]
    fn test_quit_discard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\n").unwrap();

        let mut session = scripted_session(&["x", "\x18", "n"], vec![open(&path)]);
        session.run().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_quit_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\n").unwrap();

        // keys outside the options are ignored
        let mut session = scripted_session(&["x", "\x18", "q", "y"], vec![open(&path)]);
        session.run().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "xa\n");
    }

    #[test]
    fn test_quit_cancelled() {
        let mut session = scripted_session(&["x", "\x18", "\x03"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.files.len(), 1);
        assert_eq!(session.status.message(), "cancelled");
    }

    #[test]
    fn test_quit_save_conflict_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "a\n").unwrap();
        let mut file = open(&path);
        file.ensure_loaded(&mut Status::new(25));
        fs::write(&path, "other\n").unwrap();

        let mut session = scripted_session(&["x", "\x18", "y"], vec![file]);
        run_script(&mut session);
        assert_eq!(session.files.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "other\n");
    }

    #[test]
    fn test_commands() {
        let mut file = File::new(None);
        file.lines = vec!["b".into(), "a".into(), String::new()];
        let mut session = scripted_session(&["\x1b", ":sort\r"], vec![file]);
        run_script(&mut session);
        assert_eq!(session.file().lines, ["a", "b", ""]);
        assert_eq!(session.status.message(), "sorted!");
        assert_eq!(session.history.entries("command"), [":sort"]);

        let mut session = scripted_session(&["\x1b", ":nope\r"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.status.message(), "invalid command: :nope");

        let mut session = scripted_session(&["\x1b", ":q\r"], Vec::new());
        session.run().unwrap();
    }

    #[test]
    fn test_wq_saves_then_exits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        let mut session = scripted_session(&["x", "\x1b", ":wq\r"], vec![open(&path)]);
        session.run().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x\n");
    }

    #[test]
    fn test_go_to_line() {
        let mut file = File::new(None);
        file.lines = vec!["a".into(), "b".into(), "c".into(), String::new()];
        let mut session = scripted_session(&["\x1f", "3\r"], vec![file]);
        run_script(&mut session);
        assert_eq!(session.file().y, 2);

        let mut session = scripted_session(&["\x1f", "abc\r"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.status.message(), "not an integer: \"abc\"");
    }

    #[test]
    fn test_current_position() {
        let mut file = File::new(None);
        file.lines = vec!["ab".into(), String::new()];
        let mut session = scripted_session(&["\x1b[C", "\x03"], vec![file]);
        run_script(&mut session);
        assert_eq!(session.status.message(), "line 1, col 2 (of 1 line)");
    }

    #[test]
    fn test_search_and_history() {
        let mut file = File::new(None);
        file.lines = vec!["foo".into(), "bar".into(), String::new()];
        let script = ["\x17", "bar\r", "\x17", "\r"];
        let mut session = scripted_session(&script, vec![file]);
        run_script(&mut session);
        // the second search reuses the previous pattern and wraps
        assert_eq!((session.file().y, session.file().x), (1, 0));
        assert_eq!(session.status.message(), "search wrapped");
        assert_eq!(session.history.entries("search"), ["bar"]);
    }

    #[test]
    fn test_invalid_regex() {
        let mut session = scripted_session(&["\x17", "(\r"], Vec::new());
        run_script(&mut session);
        assert_eq!(session.status.message(), "invalid regex: \"(\"");
    }

    #[test]
    fn test_replace() {
        let mut file = File::new(None);
        file.lines = vec!["foo foo".into(), "foo".into(), String::new()];
        // no to the first, yes to the second, all for the rest
        let script = ["\x1c", "foo\r", "bar\r", "n", "y", "a"];
        let mut session = scripted_session(&script, vec![file]);
        run_script(&mut session);
        assert_eq!(session.file().lines, ["foo bar", "bar", ""]);
        assert_eq!(session.status.message(), "replaced 2 occurrences");

        // all replacements undo together
        let action = session.file_mut().undo_stack.pop().unwrap();
        action.apply(session.file_mut());
        assert_eq!(session.file().lines, ["foo foo", "foo", ""]);
    }

    #[test]
    fn test_replace_no_matches() {
        let script = ["\x1c", "zzz\r", "x\r"];
        let mut session = scripted_session(&script, Vec::new());
        run_script(&mut session);
        assert_eq!(session.status.message(), "no matches");
    }

    #[test]
    fn test_unknown_key() {
        let mut session = scripted_session(&["\x1b[99~"], Vec::new());
        run_script(&mut session);
        assert!(session.status.message().starts_with("unknown key:"));
    }

    #[test]
    fn test_background() {
        let term = ScriptedTerminal::new(&["\x1a"]);
        let suspends = term.suspends.clone();
        let mut session = session_with(term, Vec::new());
        run_script(&mut session);
        assert_eq!(suspends.get(), 1);
    }

    #[test]
    fn test_resize_is_not_an_unknown_key() {
        let mut term = ScriptedTerminal::new(&["a"]).with_size(40, 10);
        term.append_resize(0);
        let mut session = session_with(term, Vec::new());
        run_script(&mut session);
        assert_eq!(session.margin, Margin::new(40, 10));
        assert_eq!(session.status.message(), "");
        assert_eq!(session.file().lines, ["a", ""]);
    }
}
