//! tedi - a small multi-file terminal text editor

mod config;
mod dispatch;
mod error;
mod file;
mod history;
mod keys;
mod margin;
mod perf;
mod prompt;
mod scroll;
mod session;
mod status;
mod terminal;
mod text;

use anyhow::{Context, Result};
use clap::Parser;
use config::Settings;
use file::File;
use history::HistoryStore;
use perf::Perf;
use session::Session;
use std::path::PathBuf;
use terminal::Tty;

#[derive(Parser, Debug)]
#[command(name = "tedi", version, about = "A small multi-file terminal text editor")]
struct Cli {
    /// Files to open; none opens an unnamed buffer
    filenames: Vec<PathBuf>,

    /// Append per-key timings to this file
    #[arg(long, value_name = "PATH")]
    perf_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    run(cli)
}

fn load_history(settings: &Settings) -> HistoryStore {
    let Some(dir) = settings.history_dir() else {
        return HistoryStore::in_memory();
    };
    match HistoryStore::load(dir) {
        Ok(history) => history,
        Err(e) => {
            log::warn!("History disabled: {}", e);
            HistoryStore::in_memory()
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load();
    let history = load_history(&settings);
    let perf = match &cli.perf_log {
        Some(path) => Perf::open(path).context("Failed to open perf log")?,
        None => Perf::disabled(),
    };
    let files = cli.filenames.into_iter().map(|f| File::new(Some(f))).collect();

    let tty = Tty::open().context("Failed to set up terminal")?;
    let mut session = Session::new(Box::new(tty), files, history, perf, &settings)?;
    let result = session.run();

    if let Err(e) = session.history.save() {
        log::warn!("Failed to save history: {}", e);
    }

    // dropping the session gives the terminal back
    drop(session);
    result
}
