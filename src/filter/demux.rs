use crate::filter::*;

/// Reads partitioned by experiment barcode.
#[derive(Debug, Clone, Default)]
pub struct Demuxed {
    /// Buckets in the same order as the barcodes they were demultiplexed with.
    pub groups: Vec<(String, Vec<Read>)>,
    pub total_input: usize,
}

impl Demuxed {
    /// Sum of bucket sizes. A read assigned to several experiments is counted once per bucket.
    pub fn total_kept(&self) -> usize {
        self.groups.iter().map(|(_, reads)| reads.len()).sum()
    }

    pub fn get(&self, experiment: &str) -> Option<&[Read]> {
        self.groups
            .iter()
            .find(|(e, _)| e == experiment)
            .map(|(_, reads)| reads.as_slice())
    }

    pub fn into_groups(self) -> Vec<(String, Vec<Read>)> {
        self.groups
    }
}

/// Demultiplex reads by exact, case-sensitive barcode prefix.
///
/// Membership is computed independently per experiment: barcodes need not be mutually
/// exclusive prefixes, so a read may land in more than one bucket. Reads matching no
/// barcode are dropped.
pub fn demux<S, B>(reads: &[Read], barcodes: &[(S, B)], log: &mut RunLog) -> Demuxed
where
    S: AsRef<str>,
    B: AsRef<[u8]>,
{
    log.info("Started barcode demuxing.");

    let groups = barcodes
        .iter()
        .map(|(experiment, barcode)| {
            let bucket = reads
                .iter()
                .filter(|r| r.seq().starts_with(barcode.as_ref()))
                .cloned()
                .collect::<Vec<_>>();
            (experiment.as_ref().to_owned(), bucket)
        })
        .collect();

    let demuxed = Demuxed {
        groups,
        total_input: reads.len(),
    };
    log.info(format!(
        "Finished barcode demuxing. Kept {} of {} sequences.",
        demuxed.total_kept(),
        demuxed.total_input
    ));
    demuxed
}
