//! Filtering and demultiplexing of sequencing reads from copying experiments.
//!
//! # Overview
//! Each sequencing run in a YAML [manifest](manifest::Manifest) pairs a forward read file
//! with its paired-end file and lists the experiments multiplexed into it. Reads are
//! pushed through a chain of [filters](filter::ReadFilter), each consuming a whole
//! in-memory collection and returning a smaller one:
//!
//! * [`RegexFilter`](filter::RegexFilter): keep reads containing an adapter pattern
//! * [`demux`](filter::demux()): split reads by experiment barcode prefix
//! * [`PeMatchFilter`](filter::PeMatchFilter): keep reads confirmed by their paired-end mate
//! * [`QualityFilter`](filter::QualityFilter): drop reads with low quality bases
//! * [`AlignFilter`](filter::AlignFilter): keep reads that align well to the template
//! * [`LengthFilter`](filter::LengthFilter): keep reads of plausible length
//!
//! The [`Pipeline`](pipeline::Pipeline) drives the chain per run and experiment and keeps
//! per-stage counts in a [`RunLog`](run_log::RunLog).
//!
//! ## Read structure
//! An Illumina record such as
//! ```text
//! @M00123:45:000000000-ABCDE:1:1101:15589:1333 1:N:0:1
//! AAACGTACGATCGTTGGCC
//! +
//! IIIIIIIIIIIIIIIIIII
//! ```
//! is stored as a [`Read`] with the full header, the sequence, and decoded Phred scores.
//! Paired reads share the coordinate part of the id (`1:1101:15589:1333`).

pub mod align;
pub mod errors;
pub mod fastq;
pub mod filter;
pub mod manifest;
pub mod motif;
pub mod pipeline;
pub mod read;
pub mod run_log;
pub mod split;

// commonly used functions and types

pub use crate::errors::{Error, Result};
pub use crate::fastq::*;
pub use crate::manifest::Manifest;
pub use crate::pipeline::*;
pub use crate::read::*;
pub use crate::run_log::RunLog;
