use std::ops::RangeBounds;

/// Offset of Phred+33 encoded quality characters.
pub const PHRED_OFFSET: u8 = 33;

const COMPLEMENT: [u8; 256] = {
    let mut comp = [0u8; 256];

    let mut v = 0;
    while v < 256 {
        comp[v] = v as u8;
        v += 1;
    }

    // IUPAC DNA alphabet
    let from = b"AGCTYRWSKMDVHBN";
    let to = b"TCGARYWSMKHBDVN";
    let mut i = 0;
    while i < from.len() {
        comp[from[i] as usize] = to[i]; // upper case
        comp[from[i] as usize + 32] = to[i] + 32; // lower case
        i += 1;
    }

    comp
};

/// A single sequencing record.
///
/// The header is kept whole: its first whitespace-delimited token is the read id and the
/// full line is the description that instruments use to carry coordinates and orientation.
/// Quality scores are stored decoded (Phred values, not ASCII).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    header: Vec<u8>,
    seq: Vec<u8>,
    qual: Option<Vec<u8>>,
}

impl Read {
    /// Create a read from a FASTQ record with Phred+33 encoded quality characters.
    pub fn from_fastq(header: &[u8], seq: &[u8], encoded_qual: &[u8]) -> Self {
        Self {
            header: header.to_owned(),
            seq: seq.to_owned(),
            qual: Some(
                encoded_qual
                    .iter()
                    .map(|&q| q.saturating_sub(PHRED_OFFSET))
                    .collect(),
            ),
        }
    }

    /// Create a read without quality scores.
    pub fn from_fasta(header: &[u8], seq: &[u8]) -> Self {
        Self {
            header: header.to_owned(),
            seq: seq.to_owned(),
            qual: None,
        }
    }

    /// Create a read from already decoded Phred scores.
    ///
    /// # Panics
    ///
    /// If `seq` and `scores` differ in length.
    pub fn with_scores(header: &[u8], seq: &[u8], scores: Vec<u8>) -> Self {
        assert_eq!(
            seq.len(),
            scores.len(),
            "Sequence and quality scores must have the same length"
        );
        Self {
            header: header.to_owned(),
            seq: seq.to_owned(),
            qual: Some(scores),
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn id(&self) -> &[u8] {
        self.header
            .split(|c| c.is_ascii_whitespace())
            .next()
            .unwrap_or(&[])
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn qual(&self) -> Option<&[u8]> {
        self.qual.as_deref()
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Instrument coordinates of the read: the colon-delimited fields of the id from the
    /// fourth one onward (lane, tile, x, y for Illumina headers).
    ///
    /// Returns `None` if the id has fewer than four fields.
    pub fn coords(&self) -> Option<&[u8]> {
        let id = self.id();
        let start = id
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == b':')
            .nth(2)
            .map(|(i, _)| i + 1)?;
        Some(&id[start..])
    }

    /// New read covering the given range of this read's sequence and qualities.
    pub fn slice<B: RangeBounds<usize>>(&self, range: B) -> Self {
        use std::ops::Bound::*;
        let start = match range.start_bound() {
            Included(&s) => s,
            Excluded(&s) => s + 1,
            Unbounded => 0,
        }
        .min(self.seq.len());
        let end = match range.end_bound() {
            Included(&e) => e + 1,
            Excluded(&e) => e,
            Unbounded => self.seq.len(),
        }
        .clamp(start, self.seq.len());

        Self {
            header: self.header.clone(),
            seq: self.seq[start..end].to_owned(),
            qual: self.qual.as_ref().map(|q| q[start..end].to_owned()),
        }
    }

    /// New read with the same header and a replacement sequence. Quality scores are dropped.
    pub fn with_seq(&self, seq: Vec<u8>) -> Self {
        Self {
            header: self.header.clone(),
            seq,
            qual: None,
        }
    }

    /// Phred+33 encoded quality string, if the read has quality scores.
    pub fn encoded_qual(&self) -> Option<Vec<u8>> {
        self.qual
            .as_ref()
            .map(|q| q.iter().map(|&s| s.saturating_add(PHRED_OFFSET)).collect())
    }

    pub fn revcomp(&self) -> Vec<u8> {
        revcomp(&self.seq)
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&c| COMPLEMENT[c as usize]).collect()
}
