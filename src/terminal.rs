//! Terminal access - raw input units, screen size, output and suspend
//!
//! Input is read byte-wise from `/dev/tty` behind a mio poll, so the key
//! decoder can switch between blocking and non-blocking reads. SIGWINCH
//! raises a flag that is surfaced as [`Unit::Resize`] through the same read
//! path.

use crate::config;
use crate::error::Error;
use crossterm::{
    cursor::Show,
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use signal_hook::consts::{SIGSTOP, SIGWINCH};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One unit of terminal input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Char(char),
    Resize,
}

/// Source of raw input units
pub trait InputSource {
    /// Switch between blocking and non-blocking reads
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()>;

    /// Read one unit. Returns `None` only in non-blocking mode when nothing is
    /// already buffered.
    fn read_unit(&mut self) -> io::Result<Option<Unit>>;
}

/// Everything the editor needs from the terminal; drawing goes through
/// its `Write` impl
pub trait Terminal: InputSource + Write {
    /// (columns, lines)
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Hand the terminal back to the shell, stop the process, and reacquire
    /// the terminal once resumed
    fn suspend(&mut self) -> io::Result<()>;
}

const INPUT: Token = Token(0);

// The tty line discipline holds at most this much unread input, so one read
// drains it and the edge-triggered poll cannot miss buffered bytes.
const READ_BUF: usize = 4096;

/// Wait up to `timeout` for input on [`INPUT`]; a signal counts as a timeout
fn wait_readable(poll: &mut Poll, events: &mut Events, timeout: Duration) -> io::Result<bool> {
    match poll.poll(events, Some(timeout)) {
        Ok(()) => Ok(events.iter().any(|event| event.token() == INPUT)),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(e),
    }
}

/// The controlling terminal
pub struct Tty {
    stdout: io::Stdout,
    input: fs::File,
    poll: Poll,
    events: Events,
    pending: VecDeque<u8>,
    resized: Arc<AtomicBool>,
    blocking: bool,
    active: bool,
}

impl Tty {
    /// Put the terminal into raw mode on the alternate screen
    pub fn open() -> Result<Self, Error> {
        let input = fs::OpenOptions::new().read(true).open("/dev/tty")?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut SourceFd(&input.as_raw_fd()), INPUT, Interest::READABLE)?;
        let resized = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGWINCH, Arc::clone(&resized))?;

        let mut tty = Self {
            stdout: io::stdout(),
            input,
            poll,
            events: Events::with_capacity(4),
            pending: VecDeque::new(),
            resized,
            blocking: true,
            active: false,
        };
        tty.acquire()?;
        Ok(tty)
    }

    fn acquire(&mut self) -> io::Result<()> {
        // raw mode passes ^C, ^S, ^Q, ^Z and ^\ through and leaves Enter as \r
        terminal::enable_raw_mode()?;
        execute!(self.stdout, EnterAlternateScreen, Show)?;
        self.active = true;
        Ok(())
    }

    /// Give the terminal back in the state we found it
    pub fn release(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.stdout, LeaveAlternateScreen, Show)?;
        terminal::disable_raw_mode()
    }

    /// Read whatever the terminal has, blocking until there is something
    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_BUF];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "tty closed")),
                Ok(n) => {
                    self.pending.extend(&buf[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            self.fill()?;
        }
    }

    /// Read one UTF-8 encoded character, one byte at a time
    fn read_char(&mut self) -> io::Result<char> {
        let lead = self.read_byte()?;
        let extra = match lead {
            0x00..=0x7F => return Ok(lead as char),
            0xC0..=0xDF => 1,
            0xE0..=0xEF => 2,
            0xF0..=0xF7 => 3,
            _ => return Ok(char::REPLACEMENT_CHARACTER),
        };

        let mut buf = vec![lead];
        for _ in 0..extra {
            let byte = self.read_byte()?;
            if byte & 0xC0 != 0x80 {
                return Ok(char::REPLACEMENT_CHARACTER);
            }
            buf.push(byte);
        }
        Ok(std::str::from_utf8(&buf)
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl InputSource for Tty {
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()> {
        self.blocking = blocking;
        Ok(())
    }

    fn read_unit(&mut self) -> io::Result<Option<Unit>> {
        loop {
            if self.resized.swap(false, Ordering::SeqCst) {
                return Ok(Some(Unit::Resize));
            }
            if !self.pending.is_empty() {
                break;
            }
            let timeout = if self.blocking {
                Duration::from_millis(config::POLL_INTERVAL_MS)
            } else {
                Duration::ZERO
            };
            if wait_readable(&mut self.poll, &mut self.events, timeout)? {
                self.fill()?;
            } else if !self.blocking {
                return Ok(None);
            }
        }
        self.read_char().map(|c| Some(Unit::Char(c)))
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

impl Terminal for Tty {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn suspend(&mut self) -> io::Result<()> {
        self.release()?;
        log::info!("suspending");
        signal_hook::low_level::raise(SIGSTOP)?;
        log::info!("resumed");
        self.acquire()
    }
}
