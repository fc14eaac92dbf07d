use crate::align::*;
use crate::filter::*;

/// A read with the result of aligning it against the template.
///
/// The read's sequence is the aligned query row (gaps included).
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRead {
    pub read: Read,
    pub score: f64,
    pub template_gap_free: bool,
}

impl AlignedRead {
    pub fn new(read: &Read, alignment: Alignment) -> Self {
        Self {
            template_gap_free: alignment.template_gap_free(),
            score: alignment.score,
            read: read.with_seq(alignment.query_row),
        }
    }

    /// Score strictly inside `(lo_score, hi_score)` and no gaps in the template row.
    pub fn passes(&self, params: &AlignParams) -> bool {
        self.score > params.lo_score && self.score < params.hi_score && self.template_gap_free
    }
}

/// Pair reads with their alignments and keep the ones that pass.
pub fn cull(reads: &[Read], alignments: Vec<Alignment>, params: &AlignParams) -> Vec<AlignedRead> {
    reads
        .iter()
        .zip(alignments)
        .map(|(r, a)| AlignedRead::new(r, a))
        .filter(|a| a.passes(params))
        .collect()
}

pub struct AlignFilter<A: Aligner> {
    aligner: A,
    template: Vec<u8>,
    params: AlignParams,
}

impl<A: Aligner> AlignFilter<A> {
    const NAME: &'static str = "AlignFilter";

    /// Globally align reads against `template` and keep those that represent the whole
    /// template with a score in range.
    ///
    /// Kept reads are replaced by their aligned query row, so they may contain gaps and
    /// carry no quality scores.
    pub fn new(aligner: A, template: impl AsRef<[u8]>, params: AlignParams) -> Self {
        Self {
            aligner,
            template: template.as_ref().to_owned(),
            params,
        }
    }

    pub fn align(&self, reads: &[Read], log: &mut RunLog) -> Result<Vec<AlignedRead>> {
        log.info("Started alignment-based filtering");
        log.info(format!(
            "Aligning with settings gapopen: {} gapextend: {} lo_cutoff: {} hi_cutoff: {}",
            self.params.gap_open, self.params.gap_extend, self.params.lo_score, self.params.hi_score
        ));

        let alignments = self.aligner.align(&self.template, reads, &self.params)?;
        if alignments.len() != reads.len() {
            return Err(Error::AlignmentToolFailure(format!(
                "expected {} alignments, got {}",
                reads.len(),
                alignments.len()
            )));
        }

        let kept = cull(reads, alignments, &self.params);
        log.info(format!(
            "Finished alignment-based filtering. Kept {} of {} sequences.",
            kept.len(),
            reads.len()
        ));
        Ok(kept)
    }
}

impl<A: Aligner> ReadFilter for AlignFilter<A> {
    fn run(&self, reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        Ok(self
            .align(&reads, log)?
            .into_iter()
            .map(|a| a.read)
            .collect())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    /// Scores each read by its length and gaps the template for reads containing `N`.
    struct FakeAligner {
        calls: Cell<usize>,
    }

    impl Aligner for FakeAligner {
        fn align(&self, template: &[u8], reads: &[Read], _: &AlignParams) -> Result<Vec<Alignment>> {
            self.calls.set(self.calls.get() + 1);
            Ok(reads
                .iter()
                .map(|r| {
                    let mut template_row = template.to_vec();
                    if r.seq().contains(&b'N') {
                        template_row.push(GAP);
                    }
                    Alignment {
                        template_row,
                        query_row: r.seq().to_vec(),
                        score: r.len() as f64,
                    }
                })
                .collect())
        }
    }

    struct BrokenAligner;

    impl Aligner for BrokenAligner {
        fn align(&self, _: &[u8], _: &[Read], _: &AlignParams) -> Result<Vec<Alignment>> {
            Ok(Vec::new())
        }
    }

    fn read(seq: &str) -> Read {
        Read::from_fastq(b"r", seq.as_bytes(), &vec![b'I'; seq.len()])
    }

    fn params() -> AlignParams {
        AlignParams {
            lo_score: 3.0,
            hi_score: 6.0,
            ..AlignParams::default()
        }
    }

    #[test]
    fn test_score_bounds_are_strict() {
        let filter = AlignFilter::new(FakeAligner { calls: Cell::new(0) }, "ACGT", params());
        let reads = ["ACG", "ACGT", "ACGTA", "ACGTAC", "ANGTA"]
            .into_iter()
            .map(read)
            .collect();

        let out = filter.run(reads, &mut RunLog::discard()).unwrap();
        let seqs = out.iter().map(|r| r.seq()).collect::<Vec<_>>();
        assert_eq!(seqs, [&b"ACGT"[..], b"ACGTA"]);
        assert!(out.iter().all(|r| r.qual().is_none()));
    }

    #[test]
    fn test_aligned_read() {
        let alignment = Alignment {
            template_row: b"ACGT".to_vec(),
            query_row: b"AC-T".to_vec(),
            score: 4.0,
        };
        let aligned = AlignedRead::new(&read("ACT"), alignment);
        assert_eq!(aligned.read.seq(), b"AC-T");
        assert!(aligned.template_gap_free);
        assert!(aligned.passes(&params()));
    }

    #[test]
    fn test_mismatched_alignment_count() {
        let filter = AlignFilter::new(BrokenAligner, "ACGT", params());
        let err = filter
            .run(vec![read("ACGT")], &mut RunLog::discard())
            .unwrap_err();
        assert!(matches!(err, Error::AlignmentToolFailure(_)));
    }

    #[test]
    fn test_idempotent() {
        let aligner = FakeAligner { calls: Cell::new(0) };
        let filter = AlignFilter::new(&aligner, "ACGT", params());
        let mut log = RunLog::discard();
        let once = filter
            .run(vec![read("ACGT"), read("AC"), read("ACGTA")], &mut log)
            .unwrap();
        let twice = filter.run(once.clone(), &mut log).unwrap();
        assert_eq!(once, twice);
        assert_eq!(aligner.calls.get(), 2);
    }
}
