use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::align::*;
use crate::fastq::write_fasta;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// EMBOSS `needle` run as a subprocess.
///
/// Each call works in its own temporary directory (query FASTA, report, stderr capture),
/// which is removed when the call returns, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct NeedleAligner {
    program: PathBuf,
    timeout: Option<Duration>,
    work_dir: Option<PathBuf>,
}

impl NeedleAligner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            work_dir: None,
        }
    }

    /// Kill the aligner if it runs longer than `timeout`. A timed out call is retried once.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create per-call temporary directories under `dir` instead of the system default.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn command(&self, template: &[u8], query: &Path, out: &Path, params: &AlignParams) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-asequence")
            .arg(format!("asis::{}", String::from_utf8_lossy(template)))
            .arg("-bsequence")
            .arg(query)
            .arg("-gapopen")
            .arg(params.gap_open.to_string())
            .arg("-gapextend")
            .arg(params.gap_extend.to_string())
            .arg("-outfile")
            .arg(out)
            .arg("-auto");
        cmd
    }

    fn run_once(&self, mut cmd: Command, stderr_path: &Path) -> Result<()> {
        let stderr = File::create(stderr_path)
            .map_err(|e| Error::file_io(stderr_path, e))?;
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|e| {
                Error::AlignmentToolFailure(format!(
                    "could not start \"{}\": {e}",
                    self.program.display()
                ))
            })?;

        let status = match self.timeout {
            None => child.wait(),
            Some(timeout) => wait_timeout(&mut child, timeout)?,
        }
        .map_err(|e| Error::AlignmentToolFailure(format!("error waiting for aligner: {e}")))?;

        if !status.success() {
            let stderr = std::fs::read_to_string(stderr_path).unwrap_or_default();
            return Err(Error::AlignmentToolFailure(format!(
                "\"{}\" exited with {status}: {}",
                self.program.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Default for NeedleAligner {
    fn default() -> Self {
        Self::new("needle")
    }
}

/// Wait for the child, killing it once `timeout` has passed.
fn wait_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> Result<std::io::Result<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Ok(status)),
            Ok(None) if start.elapsed() < timeout => thread::sleep(POLL_INTERVAL),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::AlignmentTimeout(timeout));
            }
            Err(e) => return Ok(Err(e)),
        }
    }
}

impl Aligner for NeedleAligner {
    fn align(&self, template: &[u8], reads: &[Read], params: &AlignParams) -> Result<Vec<Alignment>> {
        if reads.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("needle-");
        let dir = match &self.work_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::file_io(self.work_dir.as_deref().unwrap_or(Path::new(".")), e))?;

        let query = dir.path().join("query.fa");
        let out = dir.path().join("aln.needle");
        let stderr = dir.path().join("needle.err");
        write_fasta(&query, reads)?;

        let mut attempt = 0;
        loop {
            let cmd = self.command(template, &query, &out, params);
            match self.run_once(cmd, &stderr) {
                Ok(()) => break,
                Err(Error::AlignmentTimeout(t)) if attempt == 0 => {
                    log::warn!(
                        "\"{}\" timed out after {t:?}, retrying once",
                        self.program.display()
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let report = std::fs::read_to_string(&out).map_err(|e| {
            Error::AlignmentToolFailure(format!("could not read report \"{}\": {e}", out.display()))
        })?;
        let alignments = parse_report(&report)?;

        if alignments.len() != reads.len() {
            return Err(Error::AlignmentToolFailure(format!(
                "expected {} alignments, report has {}",
                reads.len(),
                alignments.len()
            )));
        }
        Ok(alignments)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    use crate::align::emboss::tests::REPORT;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn reads(n: usize) -> Vec<Read> {
        (0..n)
            .map(|i| Read::from_fasta(format!("read{}", i + 1).as_bytes(), b"AAACCCGGGTTTACGTACGT"))
            .collect()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_parses_report_and_cleans_up() {
        let bin = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let report = bin.path().join("report.txt");
        std::fs::write(&report, REPORT).unwrap();
        let body = format!(
            "while [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-outfile\" ]; then out=\"$2\"; fi\n  shift\ndone\ncp \"{}\" \"$out\"",
            report.display()
        );
        let needle = NeedleAligner::new(script(bin.path(), "needle", &body))
            .with_work_dir(work.path());

        let alignments = needle
            .align(b"AAACCCGGGTTTACGTACGTAC", &reads(2), &AlignParams::default())
            .unwrap();
        assert_eq!(alignments.len(), 2);
        assert_eq!(alignments[1].score, 84.5);
        assert!(is_empty_dir(work.path()));
    }

    #[test]
    fn test_count_mismatch() {
        let bin = TempDir::new().unwrap();
        let report = bin.path().join("report.txt");
        std::fs::write(&report, REPORT).unwrap();
        let body = format!(
            "while [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-outfile\" ]; then out=\"$2\"; fi\n  shift\ndone\ncp \"{}\" \"$out\"",
            report.display()
        );
        let needle = NeedleAligner::new(script(bin.path(), "needle", &body));

        let err = needle
            .align(b"ACGT", &reads(3), &AlignParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::AlignmentToolFailure(_)));
    }

    #[test]
    fn test_failure_cleans_up() {
        let bin = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let needle = NeedleAligner::new(script(bin.path(), "needle", "echo boom >&2\nexit 3"))
            .with_work_dir(work.path());

        let err = needle
            .align(b"ACGT", &reads(1), &AlignParams::default())
            .unwrap_err();
        match err {
            Error::AlignmentToolFailure(msg) => assert!(msg.contains("boom")),
            e => panic!("unexpected error: {e}"),
        }
        assert!(is_empty_dir(work.path()));
    }

    #[test]
    fn test_missing_program() {
        let bin = TempDir::new().unwrap();
        let needle = NeedleAligner::new(bin.path().join("no-such-needle"));
        let err = needle
            .align(b"ACGT", &reads(1), &AlignParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::AlignmentToolFailure(_)));
    }

    #[test]
    fn test_timeout_after_retry() {
        let bin = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let count = bin.path().join("calls");
        let body = format!("echo x >> \"{}\"\nexec sleep 5", count.display());
        let needle = NeedleAligner::new(script(bin.path(), "needle", &body))
            .with_timeout(Duration::from_millis(200))
            .with_work_dir(work.path());

        let err = needle
            .align(b"ACGT", &reads(1), &AlignParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::AlignmentTimeout(_)));
        assert_eq!(std::fs::read_to_string(count).unwrap().lines().count(), 2);
        assert!(is_empty_dir(work.path()));
    }

    #[test]
    fn test_no_reads_skips_tool() {
        let needle = NeedleAligner::new("/nonexistent/needle");
        assert!(needle
            .align(b"ACGT", &[], &AlignParams::default())
            .unwrap()
            .is_empty());
    }
}
