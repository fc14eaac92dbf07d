use std::ops::RangeInclusive;

use crate::filter::*;

pub const DEFAULT_MIN_LEN: usize = 40;
pub const DEFAULT_MAX_LEN: usize = 200;

pub struct LengthFilter {
    bounds: RangeInclusive<usize>,
}

impl LengthFilter {
    const NAME: &'static str = "LengthFilter";

    /// Retain reads with length in `[min_len + barcode_len, max_len + barcode_len]`.
    pub fn new(min_len: usize, max_len: usize, barcode_len: usize) -> Self {
        Self {
            bounds: min_len + barcode_len..=max_len + barcode_len,
        }
    }

    pub fn with_barcode_len(barcode_len: usize) -> Self {
        Self::new(DEFAULT_MIN_LEN, DEFAULT_MAX_LEN, barcode_len)
    }

    pub fn bounds(&self) -> &RangeInclusive<usize> {
        &self.bounds
    }
}

impl ReadFilter for LengthFilter {
    fn run(&self, mut reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        log.info("Started Length Filtering");
        let total = reads.len();
        reads.retain(|r| self.bounds.contains(&r.len()));
        log.info(format!(
            "Finished Length Filtering. Kept {} of {} sequences.",
            reads.len(),
            total
        ));
        Ok(reads)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
