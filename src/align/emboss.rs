use crate::align::*;

/// Parse a `needle` report in EMBOSS `srspair` or `pair` format.
///
/// Each alignment starts with a `# Aligned_sequences:` header block carrying `# Score:`.
/// Sequence lines look like `name  start  ROW  end`; they alternate between the first
/// (template) and second (query) sequence. Markup lines start with whitespace and are
/// skipped.
pub fn parse_report(report: &str) -> Result<Vec<Alignment>> {
    let mut alignments = Vec::new();
    let mut curr: Option<PartialAlignment> = None;

    for (line_no, line) in report.lines().enumerate() {
        let fail = |reason: &str| {
            Error::AlignmentToolFailure(format!(
                "could not parse report line {}: {reason}: \"{line}\"",
                line_no + 1
            ))
        };

        if let Some(header) = line.strip_prefix('#') {
            let header = header.trim();
            if header.starts_with("Aligned_sequences:") {
                if let Some(done) = curr.take() {
                    alignments.push(done.finish()?);
                }
                curr = Some(PartialAlignment::default());
            } else if let Some(score) = header.strip_prefix("Score:") {
                let a = curr.as_mut().ok_or_else(|| fail("score outside of an alignment"))?;
                a.score = Some(
                    score
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| fail("invalid score"))?,
                );
            }
            continue;
        }

        if line.trim().is_empty() || line.starts_with(char::is_whitespace) {
            continue;
        }

        let Some(a) = curr.as_mut() else {
            return Err(fail("sequence line outside of an alignment"));
        };
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        let row = match tokens.as_slice() {
            [_, _, row, _] => row,
            [_, row] => row,
            _ => return Err(fail("expected name, start, sequence, end")),
        };

        if a.next_is_query {
            a.query_row.extend_from_slice(row.as_bytes());
        } else {
            a.template_row.extend_from_slice(row.as_bytes());
        }
        a.next_is_query = !a.next_is_query;
    }

    if let Some(done) = curr.take() {
        alignments.push(done.finish()?);
    }
    Ok(alignments)
}

#[derive(Default)]
struct PartialAlignment {
    template_row: Vec<u8>,
    query_row: Vec<u8>,
    score: Option<f64>,
    next_is_query: bool,
}

impl PartialAlignment {
    fn finish(self) -> Result<Alignment> {
        let Some(score) = self.score else {
            return Err(Error::AlignmentToolFailure(
                "alignment in report has no score".to_owned(),
            ));
        };
        if self.next_is_query || self.template_row.len() != self.query_row.len() {
            return Err(Error::AlignmentToolFailure(format!(
                "alignment rows have different lengths ({} and {})",
                self.template_row.len(),
                self.query_row.len()
            )));
        }

        Ok(Alignment {
            template_row: self.template_row,
            query_row: self.query_row,
            score,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const REPORT: &str = "\
########################################
# Program: needle
# Rundate: Mon 14 Oct 2024 10:00:00
# Commandline: needle
#    -asequence asis::AAACCCGGGTTTACGTACGTAC
#    -bsequence query.fa
#    -gapopen 10.0
#    -gapextend 0.5
#    -outfile aln.needle
# Align_format: srspair
# Report_file: aln.needle
########################################

#=======================================
#
# Aligned_sequences: 2
# 1: asis
# 2: read1
# Matrix: EDNAFULL
# Gap_penalty: 10.0
# Extend_penalty: 0.5
#
# Length: 22
# Identity:      20/22 (90.9%)
# Similarity:    20/22 (90.9%)
# Gaps:           2/22 ( 9.1%)
# Score: 91.0
#
#
#=======================================

asis               1 AAACCCGGGTTTACGTACGTAC     22
                     |||||||||||||||||||
read1              1 AAACCCGGGTTTACGTACGT--     20


#---------------------------------------
#---------------------------------------

#=======================================
#
# Aligned_sequences: 2
# 1: asis
# 2: read2
# Matrix: EDNAFULL
# Gap_penalty: 10.0
# Extend_penalty: 0.5
#
# Length: 23
# Identity:      20/23 (87.0%)
# Similarity:    20/23 (87.0%)
# Gaps:           1/23 ( 4.3%)
# Score: 84.5
#
#
#=======================================

asis               1 AAACCCGGGTTTA-CGTACGTAC     22
                     ||||||||||||| |||||||||
read2              1 AAACCCGGGTTTAGCGTACGTAC     23


#---------------------------------------
#---------------------------------------
";

    #[test]
    fn test_parse_report() {
        let alignments = parse_report(REPORT).unwrap();
        assert_eq!(alignments.len(), 2);

        assert_eq!(alignments[0].score, 91.0);
        assert_eq!(alignments[0].template_row, b"AAACCCGGGTTTACGTACGTAC");
        assert_eq!(alignments[0].query_row, b"AAACCCGGGTTTACGTACGT--");
        assert!(alignments[0].template_gap_free());

        assert_eq!(alignments[1].score, 84.5);
        assert_eq!(alignments[1].template_row, b"AAACCCGGGTTTA-CGTACGTAC");
        assert!(!alignments[1].template_gap_free());
    }

    #[test]
    fn test_parse_wrapped_rows() {
        let report = "\
# Aligned_sequences: 2
# Score: 12.0

asis               1 ACGTACGTAC     10
                     ||||||||||
q                  1 ACGTACGTAC     10

asis              11 GG     12
                     ||
q                 11 GG     12
";
        let alignments = parse_report(report).unwrap();
        assert_eq!(alignments.len(), 1);
        assert_eq!(alignments[0].template_row, b"ACGTACGTACGG");
        assert_eq!(alignments[0].query_row, b"ACGTACGTACGG");
    }

    #[test]
    fn test_empty_report() {
        assert!(parse_report("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_reports() {
        let no_score = "# Aligned_sequences: 2\n\nasis 1 AC 2\nq 1 AC 2\n";
        assert!(matches!(
            parse_report(no_score),
            Err(Error::AlignmentToolFailure(_))
        ));

        let bad_score = "# Aligned_sequences: 2\n# Score: high\n";
        assert!(matches!(
            parse_report(bad_score),
            Err(Error::AlignmentToolFailure(_))
        ));

        let unpaired = "# Aligned_sequences: 2\n# Score: 1.0\nasis 1 AC 2\n";
        assert!(matches!(
            parse_report(unpaired),
            Err(Error::AlignmentToolFailure(_))
        ));

        let stray = "asis 1 AC 2\n";
        assert!(matches!(
            parse_report(stray),
            Err(Error::AlignmentToolFailure(_))
        ));
    }
}
