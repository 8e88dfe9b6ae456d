use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Per-run problem log kept next to the import, one line per entry.
///
/// Every entry is also emitted as a `tracing` warning so it shows up on the
/// console.
pub struct RunLog<W: Write> {
    out: W,
    entries: usize,
}

impl<W: Write> RunLog<W> {
    pub fn new(out: W) -> Self {
        Self { out, entries: 0 }
    }

    pub fn record(&mut self, line: &str) {
        tracing::warn!("{line}");
        self.entries += 1;
        if let Err(err) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            tracing::error!(error = %err, "could not write to run log");
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `logs/Fall 2019.csv` -> `logs/Fall 2019.csv.log`
pub fn log_path(log_dir: &Path, input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "import".to_string());
    log_dir.join(format!("{name}.log"))
}

pub fn open_run_log(log_dir: &Path, input: &Path) -> anyhow::Result<(RunLog<File>, PathBuf)> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("could not create log directory {}", log_dir.display()))?;
    let path = log_path(log_dir, input);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("could not create log file {}", path.display()))?;
    Ok((RunLog::new(file), path))
}
