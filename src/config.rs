//! User configuration
//!
//! Compile-time defaults live here as constants. A handful of settings can be
//! overridden at runtime from `<config dir>/tedi/config.toml`.

use crate::error::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// GENERAL SETTINGS
// ============================================================================

/// Shown at the left of the header line
pub const VERSION_STR: &str = concat!("tedi v", env!("CARGO_PKG_VERSION"));

/// Number of redraw ticks a status message stays visible
pub const STATUS_TICKS: u32 = 25;

/// Below this many columns the prompt label is not drawn at all
pub const PROMPT_MIN_COLS: u16 = 7;

/// How long a blocking read waits before re-checking for a resize (ms)
pub const POLL_INTERVAL_MS: u64 = 250;

/// Spaces inserted by Tab
pub const TAB_SIZE: usize = 4;

/// Name of the directory under the platform config / data dirs
pub const APP_DIR: &str = "tedi";

// ============================================================================
// MARKERS
// ============================================================================

/// Marks a label cut short to fit the screen
pub const ELLIPSIS: char = '…';

/// Marks a line scrolled to the right
pub const SCROLL_LEFT_MARKER: char = '«';

/// Marks a line continuing past the right edge
pub const SCROLL_RIGHT_MARKER: char = '»';

// ============================================================================
// RUNTIME SETTINGS
// ============================================================================

/// Settings read from `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Persist prompt history between runs
    pub save_history: bool,
    /// Where history files are kept (defaults to `<data dir>/tedi/history`)
    pub history_dir: Option<PathBuf>,
    /// Status message lifetime in redraw ticks
    pub status_ticks: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_history: true,
            history_dir: None,
            status_ticks: STATUS_TICKS,
        }
    }
}

impl Settings {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file; a missing file is not an error
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolved history directory, if history should be persisted
    pub fn history_dir(&self) -> Option<PathBuf> {
        if !self.save_history {
            return None;
        }
        self.history_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR).join("history")))
    }
}
