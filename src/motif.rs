//! Motif and base-count extraction from aligned reads.
//!
//! A motif is the sequence of bases at a fixed list of sites. For every read that is long
//! enough and whose motif is free of "bad" characters, the bases at a second list of count
//! sites are recorded alongside the motif.

use rustc_hash::FxHashMap;

use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::fastq::{read_all, write_fasta, Format};
use crate::read::Read;

/// Letters counted per site, in column order.
pub const LETTER_ORDER: [u8; 4] = [b'C', b'G', b'T', b'A'];

/// Bases of the first count site that put a motif in the first or second MEME set.
const SET1: &[u8] = b"CGT";
const SET2: &[u8] = b"A";

const MEME_PAD: &[u8] = b"AA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputMode {
    /// Per-motif totals and base counts at every count site.
    Counts,
    /// One row per read: motif and count site bases.
    Csv,
    /// Two FASTA files of motifs, split on the base at the first count site.
    Meme,
}

#[derive(Debug, Clone)]
pub struct Sites {
    pub motif: Vec<usize>,
    pub count: Vec<usize>,
    pub bad_chars: Vec<u8>,
}

impl Sites {
    pub fn new(motif: Vec<usize>, count: Vec<usize>) -> Self {
        Self {
            motif,
            count,
            bad_chars: b"A-".to_vec(),
        }
    }

    pub fn with_bad_chars(mut self, bad_chars: impl Into<Vec<u8>>) -> Self {
        self.bad_chars = bad_chars.into();
        self
    }

    /// Motif and count site bases of one read, or `None` if the read is too short or the
    /// motif has a bad character.
    pub fn extract(&self, read: &Read) -> Option<Sample> {
        let seq = read.seq();
        let max_idx = self.motif.iter().chain(&self.count).max().copied().unwrap_or(0);
        if seq.len() <= max_idx {
            return None;
        }

        let motif = self.motif.iter().map(|&i| seq[i]).collect::<Vec<_>>();
        if motif.iter().any(|c| self.bad_chars.contains(c)) {
            return None;
        }
        Some(Sample {
            motif,
            bases: self.count.iter().map(|&i| seq[i]).collect(),
        })
    }

    pub fn extract_all<'a>(&self, reads: impl IntoIterator<Item = &'a Read>) -> Vec<Sample> {
        reads.into_iter().filter_map(|r| self.extract(r)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub motif: Vec<u8>,
    /// One base per count site.
    pub bases: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotifCounts {
    pub motif: Vec<u8>,
    pub total: usize,
    /// Per count site, occurrences of each letter in [`LETTER_ORDER`].
    pub letters: Vec<[usize; 4]>,
}

/// Tally samples by motif, in order of first appearance.
pub fn count_motifs(samples: &[Sample], n_sites: usize) -> Vec<MotifCounts> {
    let mut index = FxHashMap::default();
    let mut counts: Vec<MotifCounts> = Vec::new();

    for sample in samples {
        let i = *index.entry(sample.motif.as_slice()).or_insert_with(|| {
            counts.push(MotifCounts {
                motif: sample.motif.clone(),
                total: 0,
                letters: vec![[0; 4]; n_sites],
            });
            counts.len() - 1
        });

        let c = &mut counts[i];
        c.total += 1;
        for (site, base) in c.letters.iter_mut().zip(&sample.bases) {
            if let Some(l) = LETTER_ORDER.iter().position(|l| l == base) {
                site[l] += 1;
            }
        }
    }
    counts
}

/// Split motifs on the base at the first count site.
pub fn meme_sets(samples: &[Sample]) -> (Vec<&[u8]>, Vec<&[u8]>) {
    let mut set1 = Vec::new();
    let mut set2 = Vec::new();
    for s in samples {
        match s.bases.first() {
            Some(b) if SET1.contains(b) => set1.push(s.motif.as_slice()),
            Some(b) if SET2.contains(b) => set2.push(s.motif.as_slice()),
            _ => (),
        }
    }
    (set1, set2)
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).map_err(|e| csv_error(path, e))
}

fn csv_error(path: &Path, e: csv::Error) -> Error {
    Error::Csv {
        file: path.display().to_string(),
        source: e,
    }
}

pub fn write_counts(path: &Path, sites: &Sites, samples: &[Sample]) -> Result<()> {
    let mut w = csv_writer(path)?;

    let mut header = vec!["motif".to_owned(), "total".to_owned()];
    for site in &sites.count {
        header.extend(
            LETTER_ORDER
                .iter()
                .map(|&l| format!("{}_{site}_counts", l as char)),
        );
    }
    w.write_record(&header).map_err(|e| csv_error(path, e))?;

    for c in count_motifs(samples, sites.count.len()) {
        let mut row = vec![utf8(&c.motif), c.total.to_string()];
        row.extend(c.letters.iter().flatten().map(|n| n.to_string()));
        w.write_record(&row).map_err(|e| csv_error(path, e))?;
    }
    w.flush().map_err(|e| Error::file_io(path, e))
}

pub fn write_csv(path: &Path, sites: &Sites, samples: &[Sample]) -> Result<()> {
    let mut w = csv_writer(path)?;

    let header = std::iter::once("motif".to_owned())
        .chain(sites.count.iter().map(|i| format!("site_{i}")));
    w.write_record(header).map_err(|e| csv_error(path, e))?;

    for s in samples {
        let row = std::iter::once(s.motif.as_slice())
            .chain(s.bases.chunks(1));
        w.write_record(row).map_err(|e| csv_error(path, e))?;
    }
    w.flush().map_err(|e| Error::file_io(path, e))
}

pub fn write_meme(set1_path: &Path, set2_path: &Path, samples: &[Sample]) -> Result<()> {
    let (set1, set2) = meme_sets(samples);
    for (path, motifs) in [(set1_path, set1), (set2_path, set2)] {
        let reads = motifs
            .into_iter()
            .enumerate()
            .map(|(i, m)| Read::from_fasta(i.to_string().as_bytes(), &[MEME_PAD, m].concat()))
            .collect::<Vec<_>>();
        write_fasta(path, &reads)?;
    }
    Ok(())
}

/// `dir/name.fa` -> `dir/name<suffix>`
fn sibling(file: &Path, suffix: &str) -> PathBuf {
    let stem = file.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    file.with_file_name(format!("{stem}{suffix}"))
}

/// Extract motifs from a FASTA file and write them next to it. Returns the written paths.
pub fn export(file: impl AsRef<Path>, sites: &Sites, mode: OutputMode) -> Result<Vec<PathBuf>> {
    let file = file.as_ref();
    let reads = read_all(file, Format::Fasta)?;
    let samples = sites.extract_all(&reads);
    log::info!(
        "Extracted {} motifs from {} sequences in {}",
        samples.len(),
        reads.len(),
        file.display()
    );

    let written = match mode {
        OutputMode::Counts => {
            let out = sibling(file, "_motifs.csv");
            write_counts(&out, sites, &samples)?;
            vec![out]
        }
        OutputMode::Csv => {
            let out = sibling(file, "_mot.csv");
            write_csv(&out, sites, &samples)?;
            vec![out]
        }
        OutputMode::Meme => {
            let set1 = sibling(file, "_set1.fasta");
            let set2 = sibling(file, "_set2.fasta");
            write_meme(&set1, &set2, &samples)?;
            vec![set1, set2]
        }
    };
    Ok(written)
}
