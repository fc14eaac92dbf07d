//! Typed experiment manifest.
//!
//! ```yaml
//! experiments:
//!   expt1:
//!     barcode: AAA
//!     template_seq: CCCGGGTTT
//! ngsruns:
//!   run1:
//!     f_read_name: reads_R1.fastq.gz
//!     pe_read_name: reads_R2.fastq.gz
//!     experiments: [expt1]
//!     filter_seqs:
//!       forward: [ACGT, TTGG]
//!       reverse: [CCAA]
//! params:            # optional, every key has a default
//!   min_quality: 20
//! ```
//!
//! Maps are kept in declaration order; runs and experiments are processed in that order.

use serde::Deserialize;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashSet;

use crate::align::AlignParams;
use crate::errors::*;
use crate::fastq::Format;
use crate::filter::*;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentConfig {
    pub barcode: String,
    pub template_seq: String,
}

impl ExperimentConfig {
    /// Barcode followed by the template: the full reference a read is aligned against.
    pub fn full_template(&self) -> String {
        format!("{}{}", self.barcode, self.template_seq)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterSeqs {
    #[serde(default)]
    pub forward: Vec<String>,
    #[serde(default)]
    pub reverse: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    pub f_read_name: PathBuf,
    pub pe_read_name: PathBuf,
    pub experiments: Vec<String>,
    pub filter_seqs: FilterSeqs,
    #[serde(default)]
    pub format: Format,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    #[serde(default = "default_min_quality")]
    pub min_quality: u8,
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_gap_open")]
    pub gap_open: f64,
    #[serde(default = "default_gap_extend")]
    pub gap_extend: f64,
    #[serde(default = "default_lo_score")]
    pub lo_score: f64,
    #[serde(default = "default_hi_score")]
    pub hi_score: f64,
    #[serde(default = "default_aligner")]
    pub aligner: PathBuf,
    #[serde(default = "default_aligner_timeout_secs")]
    pub aligner_timeout_secs: u64,
    #[serde(default)]
    pub mate_selection: MateSelection,
}

fn default_min_quality() -> u8 {
    DEFAULT_MIN_QUALITY
}

fn default_min_len() -> usize {
    DEFAULT_MIN_LEN
}

fn default_max_len() -> usize {
    DEFAULT_MAX_LEN
}

fn default_gap_open() -> f64 {
    AlignParams::default().gap_open
}

fn default_gap_extend() -> f64 {
    AlignParams::default().gap_extend
}

fn default_lo_score() -> f64 {
    AlignParams::default().lo_score
}

fn default_hi_score() -> f64 {
    AlignParams::default().hi_score
}

fn default_aligner() -> PathBuf {
    PathBuf::from("needle")
}

fn default_aligner_timeout_secs() -> u64 {
    600
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_quality: default_min_quality(),
            min_len: default_min_len(),
            max_len: default_max_len(),
            gap_open: default_gap_open(),
            gap_extend: default_gap_extend(),
            lo_score: default_lo_score(),
            hi_score: default_hi_score(),
            aligner: default_aligner(),
            aligner_timeout_secs: default_aligner_timeout_secs(),
            mate_selection: MateSelection::default(),
        }
    }
}

impl Params {
    pub fn align_params(&self) -> AlignParams {
        AlignParams {
            gap_open: self.gap_open,
            gap_extend: self.gap_extend,
            lo_score: self.lo_score,
            hi_score: self.hi_score,
        }
    }

    pub fn aligner_timeout(&self) -> Duration {
        Duration::from_secs(self.aligner_timeout_secs)
    }
}

#[derive(Deserialize)]
struct RawManifest {
    experiments: serde_yaml::Mapping,
    ngsruns: serde_yaml::Mapping,
    #[serde(default)]
    params: Params,
}

/// A validated manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub experiments: Vec<(String, ExperimentConfig)>,
    pub runs: Vec<(String, RunConfig)>,
    pub params: Params,
}

impl Manifest {
    /// Load and validate a manifest file. Relative read paths are resolved against the
    /// manifest's directory.
    pub fn load(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let yaml = std::fs::read_to_string(file).map_err(|e| Error::file_io(file, e))?;
        let mut manifest = Self::from_yaml(&yaml).map_err(|e| match e {
            Error::ManifestParse { reason, .. } => Error::ManifestParse {
                file: file.display().to_string(),
                reason,
            },
            e => e,
        })?;

        if let Some(base) = file.parent() {
            for (_, run) in &mut manifest.runs {
                run.f_read_name = base.join(&run.f_read_name);
                run.pe_read_name = base.join(&run.pe_read_name);
            }
        }
        Ok(manifest)
    }

    /// Parse and validate a manifest from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawManifest = serde_yaml::from_str(yaml).map_err(|e| invalid(e.to_string()))?;

        let experiments = ordered::<ExperimentConfig>(raw.experiments, "experiments")?;
        let runs = ordered::<RunConfig>(raw.ngsruns, "ngsruns")?;
        let manifest = Self {
            experiments,
            runs,
            params: raw.params,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn experiment(&self, id: &str) -> Option<&ExperimentConfig> {
        self.experiments
            .iter()
            .find(|(e, _)| e == id)
            .map(|(_, config)| config)
    }

    /// Experiments of a run, in the run's listed order.
    pub fn run_experiments<'a>(&'a self, run: &'a RunConfig) -> impl Iterator<Item = (&'a str, &'a ExperimentConfig)> + 'a {
        run.experiments
            .iter()
            .filter_map(move |id| self.experiment(id).map(|e| (id.as_str(), e)))
    }

    fn validate(&self) -> Result<()> {
        for (id, expt) in &self.experiments {
            if expt.barcode.is_empty() {
                return Err(invalid(format!("experiment \"{id}\" has an empty barcode")));
            }
        }

        for (id, run) in &self.runs {
            let mut seen = FxHashSet::default();
            for expt in &run.experiments {
                if self.experiment(expt).is_none() {
                    return Err(invalid(format!(
                        "run \"{id}\" lists unknown experiment \"{expt}\""
                    )));
                }
                if !seen.insert(expt.as_str()) {
                    return Err(invalid(format!(
                        "run \"{id}\" lists experiment \"{expt}\" more than once"
                    )));
                }
            }

            if run.filter_seqs.forward.len() < 2 {
                return Err(invalid(format!(
                    "run \"{id}\" needs at least two forward filter sequences (primer and ligation adapter)"
                )));
            }
            RegexFilter::chain(&run.filter_seqs.forward)?;
            RegexFilter::chain(&run.filter_seqs.reverse)?;
        }

        let p = &self.params;
        if p.lo_score >= p.hi_score {
            return Err(invalid(format!(
                "lo_score ({}) must be below hi_score ({})",
                p.lo_score, p.hi_score
            )));
        }
        if p.min_len > p.max_len {
            return Err(invalid(format!(
                "min_len ({}) must not exceed max_len ({})",
                p.min_len, p.max_len
            )));
        }
        if p.aligner_timeout_secs == 0 {
            return Err(invalid("aligner_timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::ManifestParse {
        file: "<yaml>".to_owned(),
        reason: reason.into(),
    }
}

fn ordered<T: serde::de::DeserializeOwned>(
    map: serde_yaml::Mapping,
    section: &str,
) -> Result<Vec<(String, T)>> {
    map.into_iter()
        .map(|(k, v)| {
            let id = match k {
                serde_yaml::Value::String(s) => s,
                k => return Err(invalid(format!("invalid key {k:?} in \"{section}\""))),
            };
            let config = serde_yaml::from_value(v)
                .map_err(|e| invalid(format!("{section}.{id}: {e}")))?;
            Ok((id, config))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "
experiments:
  zeta:
    barcode: AAA
    template_seq: CCCGGG
  alpha:
    barcode: GGG
    template_seq: TTTAAA
ngsruns:
  run2:
    f_read_name: r2_R1.fastq.gz
    pe_read_name: r2_R2.fastq.gz
    experiments: [alpha, zeta]
    filter_seqs:
      forward: [ACGT, TTGG]
      reverse: [CCAA]
  run1:
    f_read_name: r1_R1.fastq
    pe_read_name: r1_R2.fastq
    experiments: [zeta]
    filter_seqs:
      forward: [ACGT, TTGG]
      reverse: []
";

    #[test]
    fn test_declaration_order() {
        let manifest = Manifest::from_yaml(YAML).unwrap();
        let expts = manifest.experiments.iter().map(|(e, _)| e.as_str()).collect::<Vec<_>>();
        assert_eq!(expts, ["zeta", "alpha"]);
        let runs = manifest.runs.iter().map(|(r, _)| r.as_str()).collect::<Vec<_>>();
        assert_eq!(runs, ["run2", "run1"]);

        let run2 = &manifest.runs[0].1;
        let listed = manifest
            .run_experiments(run2)
            .map(|(e, _)| e)
            .collect::<Vec<_>>();
        assert_eq!(listed, ["alpha", "zeta"]);
        assert_eq!(run2.format, Format::Fastq);
    }

    #[test]
    fn test_defaults() {
        let manifest = Manifest::from_yaml(YAML).unwrap();
        assert_eq!(manifest.params, Params::default());
        assert_eq!(manifest.params.align_params(), AlignParams::default());
        assert_eq!(
            manifest.experiment("zeta").unwrap().full_template(),
            "AAACCCGGG"
        );
    }

    #[test]
    fn test_params_override() {
        let yaml = format!(
            "{YAML}params:\n  min_quality: 30\n  lo_score: 10\n  hi_score: 50.5\n  mate_selection: first_record\n"
        );
        let manifest = Manifest::from_yaml(&yaml).unwrap();
        assert_eq!(manifest.params.min_quality, 30);
        assert_eq!(manifest.params.lo_score, 10.0);
        assert_eq!(manifest.params.hi_score, 50.5);
        assert_eq!(manifest.params.mate_selection, MateSelection::FirstRecord);
        assert_eq!(manifest.params.max_len, DEFAULT_MAX_LEN);
    }

    fn reason(yaml: &str) -> String {
        match Manifest::from_yaml(yaml) {
            Err(Error::ManifestParse { reason, .. }) => reason,
            other => panic!("expected a manifest error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_keys() {
        assert!(reason("experiments: {}\n").contains("ngsruns"));
        let no_template = "
experiments:
  e:
    barcode: AAA
ngsruns: {}
";
        assert!(reason(no_template).contains("template_seq"));
    }

    #[test]
    fn test_unknown_experiment() {
        let yaml = YAML.replace("[alpha, zeta]", "[alpha, beta]");
        assert!(reason(&yaml).contains("unknown experiment \"beta\""));
    }

    #[test]
    fn test_duplicate_experiment() {
        let yaml = YAML.replace("[alpha, zeta]", "[alpha, alpha]");
        assert!(reason(&yaml).contains("more than once"));
    }

    #[test]
    fn test_forward_patterns_required() {
        let yaml = YAML.replace("forward: [ACGT, TTGG]\n      reverse: [CCAA]", "forward: [ACGT]\n      reverse: [CCAA]");
        assert!(reason(&yaml).contains("at least two forward"));
    }

    #[test]
    fn test_invalid_pattern() {
        let yaml = YAML.replace("reverse: [CCAA]", "reverse: ['CC(AA']");
        assert!(matches!(
            Manifest::from_yaml(&yaml),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_score_range() {
        let yaml = format!("{YAML}params:\n  lo_score: 100\n  hi_score: 100\n");
        assert!(reason(&yaml).contains("lo_score"));
    }

    #[test]
    fn test_zero_timeout() {
        let yaml = format!("{YAML}params:\n  aligner_timeout_secs: 0\n");
        assert!(reason(&yaml).contains("aligner_timeout_secs"));
    }

    #[test]
    fn test_numeric_keys_rejected() {
        let yaml = YAML.replace("  zeta:\n", "  42:\n");
        assert!(reason(&yaml).contains("invalid key"));
    }

    #[test]
    fn test_load_resolves_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("samples.yaml");
        std::fs::write(&file, YAML).unwrap();

        let manifest = Manifest::load(&file).unwrap();
        assert_eq!(manifest.runs[1].1.f_read_name, dir.path().join("r1_R1.fastq"));

        std::fs::write(&file, "experiments: [").unwrap();
        match Manifest::load(&file) {
            Err(Error::ManifestParse { file: f, .. }) => assert!(f.ends_with("samples.yaml")),
            other => panic!("expected a manifest error, got {other:?}"),
        }
    }
}
