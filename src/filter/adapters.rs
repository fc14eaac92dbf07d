use regex::bytes::Regex;

use std::ops::Range;

use crate::filter::*;

/// The two forward-read adapters that bracket the copied sequence.
///
/// The copied region runs from the end of the first `primer` match to the start of the last
/// `ligation` match. The ligation adapter and everything after it is what gets trimmed.
#[derive(Debug, Clone)]
pub struct Adapters {
    primer: Regex,
    ligation: Regex,
}

impl Adapters {
    pub fn new(primer: &str, ligation: &str) -> Result<Self> {
        Ok(Self {
            primer: regex_filter::compile(primer)?,
            ligation: regex_filter::compile(ligation)?,
        })
    }

    /// Build from a run's forward filter patterns: the first terminates the copied region on
    /// the left, the second is the ligation adapter. Returns `None` with fewer than two.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Option<Result<Self>> {
        match patterns {
            [primer, ligation, ..] => Some(Self::new(primer.as_ref(), ligation.as_ref())),
            _ => None,
        }
    }

    fn ligation_start(&self, seq: &[u8]) -> Option<usize> {
        self.ligation.find_iter(seq).last().map(|m| m.start())
    }

    /// Range of the sequence expected to have been copied onto the paired-end read.
    ///
    /// `None` if either adapter is missing, or if the primer match does not end before the
    /// ligation adapter starts (nothing was copied).
    pub fn copied_region(&self, seq: &[u8]) -> Option<Range<usize>> {
        let start = self.primer.find(seq)?.end();
        let end = self.ligation_start(seq)?;
        (start < end).then_some(start..end)
    }

    pub fn copied_seq<'a>(&self, seq: &'a [u8]) -> Option<&'a [u8]> {
        self.copied_region(seq).map(|r| &seq[r])
    }

    /// New read with the last ligation adapter match and everything after it removed.
    pub fn trim(&self, read: &Read) -> Option<Read> {
        self.ligation_start(read.seq()).map(|end| read.slice(..end))
    }
}

/// Trim the ligation adapter off every read. Reads without the adapter are dropped.
///
/// Not a [`ReadFilter`]: trimming an already trimmed read cuts it again at the next match.
pub fn trim_all(adapters: &Adapters, reads: Vec<Read>, log: &mut RunLog) -> Vec<Read> {
    let total = reads.len();
    let trimmed = reads
        .iter()
        .filter_map(|r| adapters.trim(r))
        .collect::<Vec<_>>();

    if trimmed.len() < total {
        log.info(format!(
            "Dropped {} of {} sequences without a ligation adapter.",
            total - trimmed.len(),
            total
        ));
    }
    trimmed
}
