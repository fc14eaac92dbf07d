use clap::{Parser, Subcommand};
use colored::*;

use std::path::PathBuf;

use ngsfilter::align::NeedleAligner;
use ngsfilter::motif::{self, OutputMode, Sites};
use ngsfilter::split::split_by_barcode;
use ngsfilter::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter every run of a manifest down to reads that align to their template
    Filter {
        /// YAML manifest of experiments and runs
        manifest: PathBuf,

        /// Directory for outputs and logs
        #[arg(short = 'o', long, default_value = ".")]
        out_dir: PathBuf,

        /// Do not write per-stage intermediate FASTQ files
        #[arg(long, default_value_t = false)]
        discard_intermediates: bool,

        /// Path to the EMBOSS needle binary (overrides the manifest)
        #[arg(long)]
        aligner: Option<PathBuf>,
    },
    /// Split a forward/paired-end FASTQ pair into per-experiment files by barcode
    Split {
        /// YAML manifest of experiments
        manifest: PathBuf,

        /// Forward read FASTQ
        forward: PathBuf,

        /// Paired-end read FASTQ
        reverse: PathBuf,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Extract motifs and count site bases from aligned FASTA files
    Motifs {
        /// FASTA files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Sites that make up the motif (0-based)
        #[arg(short = 'M', long, num_args = 1.., required = true)]
        motif_sites: Vec<usize>,

        /// Sites to count bases at (0-based)
        #[arg(short = 'C', long, num_args = 1.., required = true)]
        count_sites: Vec<usize>,

        /// Drop motifs containing any of these characters
        #[arg(short = 'B', long, default_value = "A-")]
        bad_chars: String,

        /// Output format
        #[arg(short = 'O', long, value_enum, default_value_t = OutputMode::Counts)]
        out_mode: OutputMode,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Filter {
            manifest,
            out_dir,
            discard_intermediates,
            aligner,
        } => {
            let loaded = Manifest::load(&manifest)?;
            let mut log = RunLog::create(&out_dir, &RunLog::stamp())?;
            log.info(format!("Loaded YAML experiment file {}", manifest.display()));

            let program = aligner.unwrap_or_else(|| loaded.params.aligner.clone());
            let needle = NeedleAligner::new(program).with_timeout(loaded.params.aligner_timeout());
            let pipeline = Pipeline::new(loaded, needle)
                .with_out_dir(&out_dir)
                .keep_intermediates(!discard_intermediates);

            let reports = pipeline.run_all(&mut log)?;
            let failed = reports
                .iter()
                .filter(|r| matches!(r.status, Status::Failed(_)))
                .count();
            if failed > 0 {
                log.warn(format!("{failed} of {} experiments failed", reports.len()));
            }
            if let Some(csv) = log.csv_path() {
                log::info!("Wrote stage counts to {}", csv.display());
            }
        }
        Commands::Split {
            manifest,
            forward,
            reverse,
            out_dir,
        } => {
            let loaded = Manifest::load(&manifest)?;
            for c in split_by_barcode(&loaded, &forward, &reverse, &out_dir)? {
                log::info!(
                    "{}: {} forward, {} paired-end sequences",
                    c.experiment,
                    c.forward,
                    c.reverse
                );
            }
        }
        Commands::Motifs {
            files,
            motif_sites,
            count_sites,
            bad_chars,
            out_mode,
        } => {
            let sites = Sites::new(motif_sites, count_sites).with_bad_chars(bad_chars);
            for file in &files {
                for out in motif::export(file, &sites, out_mode)? {
                    log::info!("Wrote {}", out.display());
                }
            }
        }
    }
    Ok(())
}
