//! File-level barcode splitting of a forward/paired-end FASTQ pair.

use rustc_hash::FxHashMap;

use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::fastq::{read_all, read_records, write_fastq, Format};
use crate::manifest::Manifest;
use crate::read::Read;

/// Reads written for one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCount {
    pub experiment: String,
    pub forward: usize,
    pub reverse: usize,
}

pub fn forward_path(out_dir: &Path, experiment: &str) -> PathBuf {
    out_dir.join(format!("{experiment}_R1.fastq.gz"))
}

pub fn reverse_path(out_dir: &Path, experiment: &str) -> PathBuf {
    out_dir.join(format!("{experiment}_R2.fastq.gz"))
}

/// Split a forward FASTQ and its paired-end FASTQ into per-experiment files.
///
/// Every experiment of the manifest gets `<expt>_R1.fastq.gz` with the forward reads
/// starting with its barcode, and `<expt>_R2.fastq.gz` with the paired-end reads whose
/// coordinates match one of those forward reads. A coordinate claimed by several
/// experiments goes to the one declared last. Paired-end reads matching nothing are
/// skipped.
pub fn split_by_barcode(
    manifest: &Manifest,
    forward: impl AsRef<Path>,
    reverse: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<SplitCount>> {
    let (forward, reverse, out_dir) = (forward.as_ref(), reverse.as_ref(), out_dir.as_ref());
    log::info!("Started forward sequence demuxing of {}", forward.display());

    let expt_ids = manifest
        .experiments
        .iter()
        .map(|(id, _)| id.as_str())
        .collect::<Vec<_>>();
    log::info!("Found experiments: {}", expt_ids.join(", "));

    let f_reads = read_all(forward, Format::Fastq)?;
    let mut counts = Vec::with_capacity(expt_ids.len());
    let mut coords_to_expt = FxHashMap::default();

    for (i, (id, expt)) in manifest.experiments.iter().enumerate() {
        let bucket = f_reads
            .iter()
            .filter(|r| r.seq().starts_with(expt.barcode.as_bytes()))
            .collect::<Vec<_>>();
        let path = forward_path(out_dir, id);
        let n = write_fastq(&path, bucket.iter().copied())?;
        log::info!("Wrote {n} sequences of experiment {id} to {}", path.display());

        // later experiments overwrite earlier ones
        coords_to_expt.extend(
            bucket
                .iter()
                .filter_map(|r| r.coords())
                .map(|c| (c.to_owned(), i)),
        );
        counts.push(SplitCount {
            experiment: id.clone(),
            forward: n,
            reverse: 0,
        });
    }
    log::info!(
        "Generated forward coordinate index, found {} sequences.",
        coords_to_expt.len()
    );

    log::info!("Started paired-end sequence demuxing of {}", reverse.display());
    let mut pe_buckets: Vec<Vec<Read>> = vec![Vec::new(); expt_ids.len()];
    for read in read_records(reverse, Format::Fastq)? {
        let read = read?;
        let Some(&i) = read.coords().and_then(|c| coords_to_expt.get(c)) else {
            continue;
        };
        pe_buckets[i].push(read);
    }

    for (count, bucket) in counts.iter_mut().zip(&pe_buckets) {
        count.reverse = write_fastq(reverse_path(out_dir, &count.experiment), bucket)?;
    }
    log::info!("Finished paired-end demuxing of {}", reverse.display());

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    const YAML: &str = "
experiments:
  short:
    barcode: AAA
    template_seq: CCCC
  long:
    barcode: AAAG
    template_seq: CCCC
  other:
    barcode: TTT
    template_seq: CCCC
ngsruns: {}
";

    fn read(xy: &str, sense: u8, seq: &str) -> Read {
        let header = format!("M1:7:FC:1:1101:{xy} {}:N:0:1", sense as char);
        Read::from_fastq(header.as_bytes(), seq.as_bytes(), &vec![b'I'; seq.len()])
    }

    fn ids(path: PathBuf) -> Vec<String> {
        read_all(path, Format::Fastq)
            .unwrap()
            .iter()
            .map(|r| utf8(r.id()))
            .collect()
    }

    #[test]
    fn test_split() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::from_yaml(YAML).unwrap();

        let forward = dir.path().join("in_R1.fastq");
        write_fastq(
            &forward,
            &[
                read("1:1", b'1', "AAACGT"),
                read("2:2", b'1', "AAAGCGT"),
                read("3:3", b'1', "CCCCCC"),
            ],
        )
        .unwrap();

        let reverse = dir.path().join("in_R2.fastq.gz");
        write_fastq(
            &reverse,
            &[
                read("2:2", b'2', "ACGCTTT"),
                read("9:9", b'2', "GGGGGG"),
                read("1:1", b'2', "ACGTTT"),
            ],
        )
        .unwrap();

        let out = dir.path().join("split");
        let counts = split_by_barcode(&manifest, &forward, &reverse, &out).unwrap();
        let summary = counts
            .iter()
            .map(|c| (c.experiment.as_str(), c.forward, c.reverse))
            .collect::<Vec<_>>();
        assert_eq!(summary, [("short", 2, 1), ("long", 1, 1), ("other", 0, 0)]);

        assert_eq!(
            ids(forward_path(&out, "short")),
            ["M1:7:FC:1:1101:1:1", "M1:7:FC:1:1101:2:2"]
        );
        assert_eq!(ids(reverse_path(&out, "short")), ["M1:7:FC:1:1101:1:1"]);
        assert_eq!(ids(reverse_path(&out, "long")), ["M1:7:FC:1:1101:2:2"]);
        assert!(ids(reverse_path(&out, "other")).is_empty());
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::from_yaml(YAML).unwrap();
        let err = split_by_barcode(
            &manifest,
            dir.path().join("nope_R1.fastq"),
            dir.path().join("nope_R2.fastq"),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileIo { .. }));
    }
}
