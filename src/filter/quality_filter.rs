use crate::errors::utf8;
use crate::filter::*;

pub const DEFAULT_MIN_QUALITY: u8 = 20;

pub struct QualityFilter {
    min_quality: u8,
}

impl QualityFilter {
    const NAME: &'static str = "QualityFilter";

    /// Drop reads with any base scoring strictly below `min_quality`.
    ///
    /// Reads without quality scores are an error, not a pass.
    pub fn new(min_quality: u8) -> Self {
        Self { min_quality }
    }
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUALITY)
    }
}

impl ReadFilter for QualityFilter {
    fn run(&self, reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        log.info("Started Quality Score Filtering");
        let total = reads.len();
        let mut out = Vec::with_capacity(total);

        for read in reads {
            let Some(qual) = read.qual() else {
                return Err(Error::MissingQualityScores(utf8(read.id())));
            };
            if qual.iter().all(|&q| q >= self.min_quality) {
                out.push(read);
            }
        }

        log.info(format!(
            "Finished Quality Score Filtering. Kept {} of {} sequences.",
            out.len(),
            total
        ));
        Ok(out)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
