//! Global pairwise alignment against a reference template.
//!
//! The scoring itself is delegated to an external tool behind the [`Aligner`] trait, so the
//! alignment filter can run against EMBOSS `needle` or a test double.

use crate::errors::*;
use crate::read::*;

pub mod emboss;
pub use emboss::*;

pub mod needle;
pub use needle::*;

/// Gap character in alignment rows.
pub const GAP: u8 = b'-';

/// Alignment penalties and the open score interval that alignments must fall in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignParams {
    pub gap_open: f64,
    pub gap_extend: f64,
    pub lo_score: f64,
    pub hi_score: f64,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            gap_open: 10.0,
            gap_extend: 0.5,
            lo_score: 300.0,
            hi_score: 1000.0,
        }
    }
}

/// One pairwise alignment of a read against the template.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub template_row: Vec<u8>,
    pub query_row: Vec<u8>,
    pub score: f64,
}

impl Alignment {
    /// Whether the whole template is represented, i.e. the template row has no gaps.
    pub fn template_gap_free(&self) -> bool {
        !self.template_row.contains(&GAP)
    }
}

pub trait Aligner {
    /// Globally align every read against `template`.
    ///
    /// Must return exactly one alignment per read, in the same order as `reads`.
    fn align(&self, template: &[u8], reads: &[Read], params: &AlignParams) -> Result<Vec<Alignment>>;
}

impl<A: Aligner + ?Sized> Aligner for &A {
    fn align(&self, template: &[u8], reads: &[Read], params: &AlignParams) -> Result<Vec<Alignment>> {
        (**self).align(template, reads, params)
    }
}

impl<A: Aligner + ?Sized> Aligner for Box<A> {
    fn align(&self, template: &[u8], reads: &[Read], params: &AlignParams) -> Result<Vec<Alignment>> {
        (**self).align(template, reads, params)
    }
}
