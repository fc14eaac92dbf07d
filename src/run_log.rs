use chrono::Local;

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::*;

/// Columns of the per-experiment audit CSV.
pub const CSV_HEADER: [&str; 8] = [
    "run",
    "experiment",
    "demux",
    "pe_match",
    "quality",
    "alignment",
    "length",
    "status",
];

/// Logging context for one orchestrator run.
///
/// Carries a free-text sink (timestamped lines) and a structured sink (one CSV row per
/// experiment). Every text event is also forwarded to the `log` facade. Failing to write to
/// a sink is reported but never aborts the run.
pub struct RunLog {
    text: Option<(PathBuf, BufWriter<File>)>,
    csv: Option<(PathBuf, csv::Writer<File>)>,
}

impl RunLog {
    /// Create `ngs_<stamp>.log` and `ngs_filter_<stamp>.csv` in `dir`.
    pub fn create(dir: impl AsRef<Path>, stamp: &str) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::file_io(dir, e))?;

        let text_path = dir.join(format!("ngs_{stamp}.log"));
        let text = File::create(&text_path).map_err(|e| Error::file_io(&text_path, e))?;

        let csv_path = dir.join(format!("ngs_filter_{stamp}.csv"));
        let mut csv = csv::Writer::from_path(&csv_path).map_err(|e| Error::Csv {
            file: csv_path.display().to_string(),
            source: e,
        })?;
        csv.write_record(CSV_HEADER).map_err(|e| Error::Csv {
            file: csv_path.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            text: Some((text_path, BufWriter::new(text))),
            csv: Some((csv_path, csv)),
        })
    }

    /// A log without file sinks. Events still reach the `log` facade.
    pub fn discard() -> Self {
        Self {
            text: None,
            csv: None,
        }
    }

    /// Timestamp used in log file names.
    pub fn stamp() -> String {
        Local::now().format("%Y%m%d-%H%M%S").to_string()
    }

    pub fn text_path(&self) -> Option<&Path> {
        self.text.as_ref().map(|(p, _)| p.as_path())
    }

    pub fn csv_path(&self) -> Option<&Path> {
        self.csv.as_ref().map(|(p, _)| p.as_path())
    }

    pub fn info(&mut self, msg: impl fmt::Display) {
        log::info!("{msg}");
        self.write_text(&msg);
    }

    pub fn warn(&mut self, msg: impl fmt::Display) {
        log::warn!("{msg}");
        self.write_text(&msg);
    }

    fn write_text(&mut self, msg: &dyn fmt::Display) {
        if let Some((path, w)) = &mut self.text {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
            if let Err(e) = writeln!(w, "{now} {msg}").and_then(|_| w.flush()) {
                log::warn!("Could not write to \"{}\": {e}", path.display());
            }
        }
    }

    /// Append one row to the audit CSV.
    pub fn record<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        if let Some((path, w)) = &mut self.csv {
            if let Err(e) = w.write_record(row).and_then(|_| w.flush().map_err(Into::into)) {
                log::warn!("Could not write to \"{}\": {e}", path.display());
            }
        }
    }
}
