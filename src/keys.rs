//! Key decoding - turns raw terminal input into logical key events
//!
//! Single units resolve directly (control chords, backspace, enter, literal
//! characters). An Escape starts a sequence: everything already buffered
//! behind it is read without blocking and the accumulated sequence is looked
//! up in [`SEQUENCE_TABLE`]. A single trailing unit is an Alt-chord; an
//! unlisted longer sequence becomes [`Key::Unknown`].

use crate::terminal::{InputSource, Unit};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::LazyLock;

const ESC: char = '\x1b';

/// Logical key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Literal character (printable or not)
    Char(char),
    /// Control chord, stored as the uppercase letter / symbol (^A, ^_)
    Ctrl(char),
    /// Escape followed by exactly one unit
    Alt(char),
    Escape,
    Enter,
    Tab,
    BackTab,
    Backspace,
    Insert,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    ShiftUp,
    ShiftDown,
    ShiftLeft,
    ShiftRight,
    ShiftHome,
    ShiftEnd,
    ShiftPageUp,
    ShiftPageDown,
    AltUp,
    AltDown,
    AltLeft,
    AltRight,
    CtrlUp,
    CtrlDown,
    CtrlLeft,
    CtrlRight,
    CtrlHome,
    CtrlEnd,
    CtrlShiftLeft,
    CtrlShiftRight,
    CtrlShiftHome,
    CtrlShiftEnd,
    F(u8),
    /// Terminal size changed
    Resize,
    /// Escape sequence with no entry in the sequence table
    Unknown,
}

impl Key {
    /// Resolve a single unit that is not the start of an escape sequence
    fn from_char(c: char) -> Key {
        match c {
            '\r' => Key::Enter,
            '\t' => Key::Tab,
            '\x7f' => Key::Backspace,
            '\x00' => Key::Ctrl('@'),
            '\x01'..='\x1a' => Key::Ctrl((b'A' + (c as u8) - 1) as char),
            '\x1c' => Key::Ctrl('\\'),
            '\x1d' => Key::Ctrl(']'),
            '\x1e' => Key::Ctrl('^'),
            '\x1f' => Key::Ctrl('_'),
            c => Key::Char(c),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{:?}", c),
            Key::Ctrl(c) => write!(f, "^{}", c),
            Key::Alt(c) => write!(f, "M-{}", c),
            Key::F(n) => write!(f, "F{}", n),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Escape sequences the single-unit resolution cannot name
pub static SEQUENCE_TABLE: LazyLock<HashMap<&'static str, Key>> = LazyLock::new(|| {
    HashMap::from([
        // cursor keys, normal and application mode
        ("\x1b[A", Key::Up),
        ("\x1b[B", Key::Down),
        ("\x1b[C", Key::Right),
        ("\x1b[D", Key::Left),
        ("\x1bOA", Key::Up),
        ("\x1bOB", Key::Down),
        ("\x1bOC", Key::Right),
        ("\x1bOD", Key::Left),
        ("\x1b[H", Key::Home),
        ("\x1b[F", Key::End),
        ("\x1bOH", Key::Home),
        ("\x1bOF", Key::End),
        ("\x1b[1~", Key::Home),
        ("\x1b[4~", Key::End),
        ("\x1b[7~", Key::Home),
        ("\x1b[8~", Key::End),
        ("\x1b[2~", Key::Insert),
        ("\x1b[3~", Key::Delete),
        ("\x1b[5~", Key::PageUp),
        ("\x1b[6~", Key::PageDown),
        ("\x1b[Z", Key::BackTab),
        // shift
        ("\x1b[1;2A", Key::ShiftUp),
        ("\x1b[1;2B", Key::ShiftDown),
        ("\x1b[1;2C", Key::ShiftRight),
        ("\x1b[1;2D", Key::ShiftLeft),
        ("\x1b[1;2H", Key::ShiftHome),
        ("\x1b[1;2F", Key::ShiftEnd),
        ("\x1b[5;2~", Key::ShiftPageUp),
        ("\x1b[6;2~", Key::ShiftPageDown),
        // alt
        ("\x1b[1;3A", Key::AltUp),
        ("\x1b[1;3B", Key::AltDown),
        ("\x1b[1;3C", Key::AltRight),
        ("\x1b[1;3D", Key::AltLeft),
        // ctrl
        ("\x1b[1;5A", Key::CtrlUp),
        ("\x1b[1;5B", Key::CtrlDown),
        ("\x1b[1;5C", Key::CtrlRight),
        ("\x1b[1;5D", Key::CtrlLeft),
        ("\x1b[1;5H", Key::CtrlHome),
        ("\x1b[1;5F", Key::CtrlEnd),
        // ctrl + shift
        ("\x1b[1;6C", Key::CtrlShiftRight),
        ("\x1b[1;6D", Key::CtrlShiftLeft),
        ("\x1b[1;6H", Key::CtrlShiftHome),
        ("\x1b[1;6F", Key::CtrlShiftEnd),
        // function keys
        ("\x1bOP", Key::F(1)),
        ("\x1bOQ", Key::F(2)),
        ("\x1bOR", Key::F(3)),
        ("\x1bOS", Key::F(4)),
        ("\x1b[15~", Key::F(5)),
        ("\x1b[17~", Key::F(6)),
        ("\x1b[18~", Key::F(7)),
        ("\x1b[19~", Key::F(8)),
        ("\x1b[20~", Key::F(9)),
        ("\x1b[21~", Key::F(10)),
        ("\x1b[23~", Key::F(11)),
        ("\x1b[24~", Key::F(12)),
    ])
});

/// One decoded input event
///
/// Equality only looks at `key`; `raw` is kept for literal fallback and for
/// reporting unknown keys.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub raw: String,
    pub key: Key,
}

impl KeyEvent {
    pub fn new(raw: impl Into<String>, key: Key) -> Self {
        Self {
            raw: raw.into(),
            key,
        }
    }

    /// The character to insert when no table claims this event
    pub fn printable(&self) -> Option<char> {
        match self.key {
            Key::Char(c) if !c.is_control() => Some(c),
            _ => None,
        }
    }
}

impl PartialEq for KeyEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for KeyEvent {}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.key, self.raw)
    }
}

/// Resolve an accumulated escape buffer (always starts with ESC)
pub fn resolve_escape(seq: &str) -> Key {
    let mut chars = seq.chars().skip(1);
    match (chars.next(), chars.next()) {
        (None, _) => Key::Escape,
        (Some(c), None) => Key::Alt(c),
        _ => SEQUENCE_TABLE.get(seq).copied().unwrap_or(Key::Unknown),
    }
}

/// Stateful decoder; only holds a unit pushed back between calls
#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Option<Unit>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until one complete key event is available
    pub fn next_key<I: InputSource + ?Sized>(&mut self, input: &mut I) -> io::Result<KeyEvent> {
        let first = match self.pending.take() {
            Some(unit) => unit,
            None => loop {
                if let Some(unit) = input.read_unit()? {
                    break unit;
                }
            },
        };

        let c = match first {
            Unit::Resize => return Ok(KeyEvent::new("", Key::Resize)),
            Unit::Char(c) => c,
        };
        if c != ESC {
            return Ok(KeyEvent::new(c, Key::from_char(c)));
        }

        let mut seq = String::from(ESC);
        input.set_blocking(false)?;
        let drained = self.drain_into(input, &mut seq);
        input.set_blocking(true)?;
        drained?;

        let key = resolve_escape(&seq);
        if key == Key::Unknown {
            log::debug!("unknown escape sequence {:?}", seq);
        }
        Ok(KeyEvent::new(seq, key))
    }

    fn drain_into<I: InputSource + ?Sized>(&mut self, input: &mut I, seq: &mut String) -> io::Result<()> {
        while let Some(unit) = input.read_unit()? {
            match unit {
                Unit::Char(c) => seq.push(c),
                other => {
                    self.pending = Some(other);
                    break;
                }
            }
        }
        Ok(())
    }
}
