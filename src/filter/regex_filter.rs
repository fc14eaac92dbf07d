use regex::bytes::Regex;

use crate::filter::*;

pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    const NAME: &'static str = "RegexFilter";

    /// Retain only reads whose sequence contains a match of `pattern` anywhere.
    ///
    /// Fails with [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: compile(pattern)?,
        })
    }

    /// Compile a list of patterns, failing on the first one that does not compile.
    pub fn chain<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>> {
        patterns.iter().map(|p| Self::new(p.as_ref())).collect()
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_owned(),
        source: e,
    })
}

impl ReadFilter for RegexFilter {
    fn run(&self, mut reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        log.info(format!("Started regex filter: {}", self.pattern()));
        reads.retain(|r| self.regex.is_match(r.seq()));
        log.info(format!("Finished regex filter. Kept {} sequences.", reads.len()));
        Ok(reads)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Apply filters left to right, each as an independent pass over the previous output.
pub fn filter_all(
    filters: &[RegexFilter],
    reads: Vec<Read>,
    log: &mut RunLog,
) -> Result<Vec<Read>> {
    filters
        .iter()
        .try_fold(reads, |reads, filter| filter.run(reads, log))
}
