//! Read filters.
//!
//! Every filter consumes a whole in-memory collection of reads and returns a new, possibly
//! smaller one. Filters never add reads, so counts are non-increasing along a chain, and
//! applying a filter to its own output removes nothing further.

use crate::errors::*;
use crate::read::*;
use crate::run_log::RunLog;

pub mod regex_filter;
pub use regex_filter::*;

pub mod demux;
pub use demux::*;

pub mod adapters;
pub use adapters::*;

pub mod pe_match_filter;
pub use pe_match_filter::*;

pub mod quality_filter;
pub use quality_filter::*;

pub mod length_filter;
pub use length_filter::*;

pub mod align_filter;
pub use align_filter::*;

pub trait ReadFilter {
    fn run(&self, reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>>;
    fn name(&self) -> &'static str;
}

impl<F: ReadFilter + ?Sized> ReadFilter for Box<F> {
    fn run(&self, reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        (**self).run(reads, log)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<F: ReadFilter + ?Sized> ReadFilter for &F {
    fn run(&self, reads: Vec<Read>, log: &mut RunLog) -> Result<Vec<Read>> {
        (**self).run(reads, log)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
