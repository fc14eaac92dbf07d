//! Per-run orchestration of the read filters.
//!
//! For each run in the manifest, forward and paired-end reads are loaded and regex filtered,
//! then demultiplexed. Every experiment of the run then goes through
//!
//! ```text
//! demux -> paired-end match -> (adapter trim) -> quality -> alignment -> length
//! ```
//!
//! with the read count after each stage recorded in the audit CSV.

use std::fmt;
use std::path::PathBuf;

use crate::align::Aligner;
use crate::errors::*;
use crate::fastq::{read_all, write_fasta, write_fastq};
use crate::filter::*;
use crate::manifest::{ExperimentConfig, Manifest, RunConfig};
use crate::read::Read;
use crate::run_log::RunLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Demux,
    PeMatch,
    Quality,
    Alignment,
    Length,
}

impl Stage {
    /// Counted stages, in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Demux,
        Stage::PeMatch,
        Stage::Quality,
        Stage::Alignment,
        Stage::Length,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Demux => "demux",
            Stage::PeMatch => "pe_match",
            Stage::Quality => "quality",
            Stage::Alignment => "alignment",
            Stage::Length => "length",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCount {
    pub stage: Stage,
    pub before: usize,
    pub after: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Done,
    /// Some stage removed every read.
    Empty,
    Failed(String),
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Done => "ok",
            Status::Empty => "empty",
            Status::Failed(_) => "failed",
        }
    }
}

/// Audit trail of one experiment within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentReport {
    pub run: String,
    pub experiment: String,
    pub stages: Vec<StageCount>,
    pub status: Status,
}

impl ExperimentReport {
    fn new(run: &str, experiment: &str) -> Self {
        Self {
            run: run.to_owned(),
            experiment: experiment.to_owned(),
            stages: Vec::with_capacity(Stage::ALL.len()),
            status: Status::Done,
        }
    }

    /// Reads left after `stage`, if it ran.
    pub fn count(&self, stage: Stage) -> Option<usize> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.after)
    }

    /// Row matching [`CSV_HEADER`](crate::run_log::CSV_HEADER). Stages that never ran (after
    /// a failure) are left blank.
    pub fn csv_row(&self) -> Vec<String> {
        let mut row = vec![self.run.clone(), self.experiment.clone()];
        row.extend(
            Stage::ALL
                .iter()
                .map(|&s| self.count(s).map(|n| n.to_string()).unwrap_or_default()),
        );
        row.push(self.status.as_str().to_owned());
        row
    }

    fn push(&mut self, stage: Stage, before: usize, after: usize) {
        self.stages.push(StageCount {
            stage,
            before,
            after,
        });
    }
}

/// Reads that made it through every stage of one experiment.
#[derive(Debug, Clone)]
pub struct ExperimentOutput {
    pub report: ExperimentReport,
    pub reads: Vec<Read>,
}

pub struct Pipeline<A: Aligner> {
    manifest: Manifest,
    aligner: A,
    out_dir: PathBuf,
    keep_intermediates: bool,
}

impl<A: Aligner> Pipeline<A> {
    /// Filter every run of `manifest`, aligning with `aligner`.
    ///
    /// Outputs go to the current directory and intermediates are kept unless configured
    /// otherwise.
    pub fn new(manifest: Manifest, aligner: A) -> Self {
        Self {
            manifest,
            aligner,
            out_dir: PathBuf::from("."),
            keep_intermediates: true,
        }
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Output file with the surviving reads of one experiment.
    pub fn aligned_path(&self, run: &str, experiment: &str) -> PathBuf {
        self.out_dir.join(format!("aln_seqs_{run}_{experiment}.fa"))
    }

    /// Process every run in manifest order and write one FASTA file per experiment that did
    /// not fail.
    ///
    /// Errors loading or writing files abort everything. Errors inside the stages of one
    /// experiment only fail that experiment.
    pub fn run_all(&self, log: &mut RunLog) -> Result<Vec<ExperimentReport>> {
        std::fs::create_dir_all(&self.out_dir).map_err(|e| Error::file_io(&self.out_dir, e))?;

        let run_ids = self
            .manifest
            .runs
            .iter()
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>();
        log.info(format!("Found NGS Runs: {}", run_ids.join(", ")));

        let mut reports = Vec::new();
        for (run_id, run) in &self.manifest.runs {
            log.info(format!("Performing routine for NGS Run {run_id}"));
            log.info(format!("Found experiments {}", run.experiments.join(", ")));

            log.info(format!("Starting filtering for run {run_id}"));
            for out in self.filter_sample(run_id, run, log)? {
                if !matches!(out.report.status, Status::Failed(_)) {
                    write_fasta(
                        self.aligned_path(run_id, &out.report.experiment),
                        &out.reads,
                    )?;
                }
                reports.push(out.report);
            }
            log.info(format!("Finished filtering for run {run_id}"));
        }
        Ok(reports)
    }

    /// Filter one run. Returns the surviving reads of each experiment, in the run's order.
    pub fn filter_sample(
        &self,
        run_id: &str,
        run: &RunConfig,
        log: &mut RunLog,
    ) -> Result<Vec<ExperimentOutput>> {
        log.info(format!(
            "Started filtering routine for {}",
            run.f_read_name.display()
        ));

        let f_filters = RegexFilter::chain(&run.filter_seqs.forward)?;
        let pe_filters = RegexFilter::chain(&run.filter_seqs.reverse)?;
        let adapters = Adapters::from_patterns(&run.filter_seqs.forward).ok_or_else(|| {
            Error::ManifestParse {
                file: run_id.to_owned(),
                reason: "at least two forward filter sequences are required".to_owned(),
            }
        })??;

        log.info("Loading Files");
        let f_reads = filter_all(&f_filters, read_all(&run.f_read_name, run.format)?, log)?;
        let pe_reads = filter_all(&pe_filters, read_all(&run.pe_read_name, run.format)?, log)?;

        let experiments = self.manifest.run_experiments(run).collect::<Vec<_>>();
        let barcodes = experiments
            .iter()
            .map(|(id, e)| (*id, e.barcode.as_bytes()))
            .collect::<Vec<_>>();
        let demuxed = demux(&f_reads, &barcodes, log);
        let demuxed_total = demuxed.total_input;

        let pe_filter = PeMatchFilter::new(
            pe_reads,
            adapters.clone(),
            self.manifest.params.mate_selection,
        );

        let mut outputs = Vec::with_capacity(experiments.len());
        for (&(expt_id, expt), (_, bucket)) in experiments.iter().zip(demuxed.into_groups()) {
            log.info(format!("Starting post-demux filtering for expt ID {expt_id}"));
            let mut report = ExperimentReport::new(run_id, expt_id);
            report.push(Stage::Demux, demuxed_total, bucket.len());

            let stages = Stages {
                run_id,
                expt_id,
                expt,
                pe_filter: &pe_filter,
                adapters: &adapters,
            };
            let reads = match self.filter_experiment(&stages, bucket, &mut report, log) {
                Ok(reads) => {
                    if reads.is_empty() {
                        report.status = Status::Empty;
                    }
                    reads
                }
                Err(e @ Error::FileIo { .. }) => return Err(e),
                Err(e) => {
                    log.warn(format!("Filtering failed for expt ID {expt_id}: {e}"));
                    report.status = Status::Failed(e.to_string());
                    Vec::new()
                }
            };

            log.record(report.csv_row());
            outputs.push(ExperimentOutput { report, reads });
        }
        Ok(outputs)
    }

    fn filter_experiment(
        &self,
        stages: &Stages,
        reads: Vec<Read>,
        report: &mut ExperimentReport,
        log: &mut RunLog,
    ) -> Result<Vec<Read>> {
        let params = &self.manifest.params;
        self.write_intermediate(stages, Stage::Demux, &reads)?;

        let reads = run_stage(Stage::PeMatch, stages.pe_filter, reads, report, log)?;
        self.write_intermediate(stages, Stage::PeMatch, &reads)?;

        // low quality tails sit past the ligation adapter, so trim before scoring
        let reads = trim_all(stages.adapters, reads, log);

        let reads = run_stage(
            Stage::Quality,
            QualityFilter::new(params.min_quality),
            reads,
            report,
            log,
        )?;
        self.write_intermediate(stages, Stage::Quality, &reads)?;

        let align = AlignFilter::new(
            &self.aligner,
            stages.expt.full_template(),
            params.align_params(),
        );
        let reads = run_stage(Stage::Alignment, align, reads, report, log)?;

        let length = LengthFilter::new(params.min_len, params.max_len, stages.expt.barcode.len());
        run_stage(Stage::Length, length, reads, report, log)
    }

    /// `<run>_<expt>_<stage>.fastq.gz`, or `.fa.gz` for reads without quality scores.
    fn write_intermediate(&self, stages: &Stages, stage: Stage, reads: &[Read]) -> Result<()> {
        if !self.keep_intermediates {
            return Ok(());
        }
        let stem = format!("{}_{}_{}", stages.run_id, stages.expt_id, stage);
        if reads.iter().all(|r| r.qual().is_some()) {
            write_fastq(self.out_dir.join(format!("{stem}.fastq.gz")), reads)?;
        } else {
            write_fasta(self.out_dir.join(format!("{stem}.fa.gz")), reads)?;
        }
        Ok(())
    }
}

struct Stages<'a> {
    run_id: &'a str,
    expt_id: &'a str,
    expt: &'a ExperimentConfig,
    pe_filter: &'a PeMatchFilter,
    adapters: &'a Adapters,
}

/// Run one counted stage. An empty input skips the filter and records zero counts.
fn run_stage(
    stage: Stage,
    filter: impl ReadFilter,
    reads: Vec<Read>,
    report: &mut ExperimentReport,
    log: &mut RunLog,
) -> Result<Vec<Read>> {
    let before = reads.len();
    if before == 0 {
        log.info(format!(
            "No sequences left, skipped {} for expt ID {}.",
            filter.name(),
            report.experiment
        ));
        report.push(stage, 0, 0);
        return Ok(reads);
    }

    let reads = filter.run(reads, log)?;
    report.push(stage, before, reads.len());
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_row() {
        let mut report = ExperimentReport::new("run1", "expt1");
        report.push(Stage::Demux, 10, 4);
        report.push(Stage::PeMatch, 4, 3);
        assert_eq!(report.count(Stage::PeMatch), Some(3));
        assert_eq!(report.count(Stage::Length), None);

        report.status = Status::Failed("boom".to_owned());
        assert_eq!(
            report.csv_row(),
            ["run1", "expt1", "4", "3", "", "", "", "failed"]
        );
    }

    #[test]
    fn test_empty_stage_is_skipped() {
        struct Panics;

        impl ReadFilter for Panics {
            fn run(&self, _: Vec<Read>, _: &mut RunLog) -> Result<Vec<Read>> {
                panic!("filter should not run on an empty collection");
            }

            fn name(&self) -> &'static str {
                "Panics"
            }
        }

        let dir = tempfile::TempDir::new().unwrap();
        let mut log = RunLog::create(dir.path(), "stamp").unwrap();
        let mut report = ExperimentReport::new("run1", "expt1");
        let out = run_stage(Stage::Quality, Panics, Vec::new(), &mut report, &mut log).unwrap();
        drop(log);
        assert!(out.is_empty());
        let text = std::fs::read_to_string(dir.path().join("ngs_stamp.log")).unwrap();
        assert!(text.contains("skipped Panics for expt ID expt1"));
        assert_eq!(
            report.stages,
            [StageCount {
                stage: Stage::Quality,
                before: 0,
                after: 0
            }]
        );
    }

    #[test]
    fn test_stage_names_match_header() {
        let names = Stage::ALL.iter().map(|s| s.name()).collect::<Vec<_>>();
        assert_eq!(names, crate::run_log::CSV_HEADER[2..7]);
    }
}
