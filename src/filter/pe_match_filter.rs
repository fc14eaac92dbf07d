use memchr::memmem;
use rustc_hash::FxHashMap;

use crate::filter::*;

const PROGRESS_INTERVAL: usize = 5000;

/// Which reverse read a forward read's copied sequence is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MateSelection {
    /// The reverse read sharing the forward read's instrument coordinates.
    #[default]
    Coordinate,
    /// Always the first reverse read, matching older analyses. The coordinate
    /// match is still required.
    FirstRecord,
}

pub struct PeMatchFilter {
    mates: Vec<Read>,
    by_coords: FxHashMap<Vec<u8>, usize>,
    adapters: Adapters,
    selection: MateSelection,
}

impl PeMatchFilter {
    const NAME: &'static str = "PeMatchFilter";

    /// Keep forward reads whose paired-end mate confirms the copied sequence.
    ///
    /// A forward read is kept if a mate with identical coordinates exists and the forward
    /// read's copied region (see [`Adapters::copied_region`]) is a substring of the reverse
    /// complement of the mate chosen by `selection`. Mates without coordinates are ignored;
    /// if several mates share coordinates, the first one wins.
    pub fn new(mates: Vec<Read>, adapters: Adapters, selection: MateSelection) -> Self {
        let mut by_coords = FxHashMap::default();
        for (i, mate) in mates.iter().enumerate() {
            if let Some(coords) = mate.coords() {
                by_coords.entry(coords.to_owned()).or_insert(i);
            }
        }

        Self {
            mates,
            by_coords,
            adapters,
            selection,
        }
    }

    /// Index of the mate sharing the read's coordinates, if any.
    pub fn find_mate(&self, read: &Read) -> Option<usize> {
        self.by_coords.get(read.coords()?).copied()
    }

    fn confirms(&self, read: &Read, mate_idx: usize) -> bool {
        let mate = match self.selection {
            MateSelection::Coordinate => &self.mates[mate_idx],
            MateSelection::FirstRecord => &self.mates[0],
        };
        let Some(copied) = self.adapters.copied_seq(read.seq()) else {
            return false;
        };
        memmem::find(&mate.revcomp(), copied).is_some()
    }
}

impl ReadFilter for PeMatchFilter {
    fn run(&self, reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        log.info("Started Paired-End Filtering");
        let total = reads.len();
        let mut coord_matched = 0;
        let mut out = Vec::new();

        for (i, read) in reads.into_iter().enumerate() {
            if let Some(mate_idx) = self.find_mate(&read) {
                coord_matched += 1;
                if self.confirms(&read, mate_idx) {
                    out.push(read);
                }
            }

            if (i + 1) % PROGRESS_INTERVAL == 0 {
                log.info(format!("Processed {} out of {}", i + 1, total));
            }
        }

        log.info("Finished Paired-End Filtering");
        log.info(format!(
            "Kept {} of {} forward sequences after coordinate filtering",
            coord_matched, total
        ));
        log.info(format!(
            "Kept {} of {} forward sequences after paired-end sequence matching",
            out.len(),
            coord_matched
        ));
        Ok(out)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
