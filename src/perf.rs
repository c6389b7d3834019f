//! Per-key timing, optionally written to the `--perf-log` file

use crate::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Default)]
pub struct Perf {
    log: Option<(PathBuf, BufWriter<File>)>,
    current: Option<(String, Instant)>,
}

impl Perf {
    /// Timing that only goes to the trace log
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::create(path).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            log: Some((path.to_path_buf(), BufWriter::new(file))),
            current: None,
        })
    }

    /// Start timing the handling of one key
    pub fn start(&mut self, name: String) {
        self.current = Some((name, Instant::now()));
    }

    /// Finish the running measurement, if any
    pub fn end(&mut self) {
        let Some((name, started)) = self.current.take() else {
            return;
        };
        let micros = started.elapsed().as_micros();
        log::trace!("{} took {}us", name, micros);

        if let Some((path, writer)) = &mut self.log {
            if let Err(e) = writeln!(writer, "{}\t{}", micros, name) {
                log::warn!("Disabling perf log {}: {}", path.display(), e);
                self.log = None;
            }
        }
    }
}

impl Drop for Perf {
    fn drop(&mut self) {
        if let Some((_, writer)) = &mut self.log {
            let _ = writer.flush();
        }
    }
}
