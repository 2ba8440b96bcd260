//! CLI surface for the `map` subcommand, grounded on the teacher's
//! `AlignerArgs`/`parse_aligner_args` (`processes/standalone/aligner/arg_parsing.rs`):
//! a plain `clap::Args` struct plus a `parse_pipeline_args` validation
//! function that calls `abort_clap` on invalid combinations, rather than
//! returning a `Result` for user-facing argument errors.

use std::path::PathBuf;

use clap::{Args, builder::RangedI64ValueParser, error::ErrorKind};

use crate::align::insert_size::InsertSizeParameters;
use crate::align::pair::PairOrientation;
use crate::align::wavefront::ScoringScheme;
use crate::args::abort_clap;
use crate::pipeline::config::PipelineConfig;

#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Directory containing the reference FASTA and its hash-table index
    reference_dir: PathBuf,

    /// FASTQ file for read 1 (or single-end reads)
    fastq1: PathBuf,

    /// FASTQ file for read 2, for paired-end input
    fastq2: Option<PathBuf>,

    #[arg(long)]
    /// Output SAM filepath; written to stdout if not provided
    output: Option<PathBuf>,

    #[arg(long)]
    /// Number of mapper threads; defaults to the available core count
    threads: Option<usize>,

    #[arg(short = 'm', long, default_value_t = 1, value_parser = RangedI64ValueParser::<i32>::new().range(0..=127))]
    matching: i32,

    #[arg(short = 'x', long, default_value_t = 4, value_parser = RangedI64ValueParser::<i32>::new().range(0..=127))]
    mismatch: i32,

    #[arg(short = 'o', long, default_value_t = 6, value_parser = RangedI64ValueParser::<i32>::new().range(0..=127))]
    gap_open: i32,

    #[arg(short = 'e', long, default_value_t = 1, value_parser = RangedI64ValueParser::<i32>::new().range(0..=127))]
    gap_extend: i32,

    #[arg(long, default_value_t = 5, value_parser = RangedI64ValueParser::<i32>::new().range(0..=127))]
    /// Bonus credited to an alignment that reaches a query terminal unclipped
    unclip_score: i32,

    #[arg(long, default_value_t = 20)]
    min_alignment_score: i32,

    #[arg(long, default_value_t = 20)]
    unpaired_pair_penalty: i32,

    #[arg(long, default_value_t = 0)]
    secondary_alignments: usize,

    #[arg(long)]
    /// Read-group id, e.g. "RG1"; written as the `RG:Z:` tag
    read_group_id: Option<String>,

    #[arg(long)]
    read_group_sample: Option<String>,

    #[arg(long)]
    /// Disable insert-size sampling, always using the fallback distribution
    no_insert_size_sampling: bool,

    #[arg(long)]
    /// Disallow reordering blocks for throughput; output matches input order
    preserve_map_align_order: bool,
}

/// Validates a [`PipelineArgs`] into a [`PipelineConfig`], calling
/// [`abort_clap`] on combinations that are structurally invalid rather than
/// simply unusual (mirrors `parse_aligner_args`'s gap-penalty check).
///
/// ## Errors
///
/// Propagates any I/O error encountered resolving `reference_dir` into an
/// absolute path.
pub fn parse_pipeline_args(args: PipelineArgs) -> std::io::Result<PipelineConfig> {
    if args.gap_extend < args.gap_open {
        abort_clap(
            ErrorKind::InvalidValue,
            format!(
                "the gap extend penalty ({}) must not exceed the gap open penalty ({})",
                args.gap_extend, args.gap_open
            ),
            Some("map"),
        )
    }

    if args.fastq2.is_none() && args.read_group_sample.is_some() && args.read_group_id.is_none() {
        abort_clap(
            ErrorKind::MissingRequiredArgument,
            "--read-group-sample requires --read-group-id",
            Some("map"),
        )
    }

    let reference_dir = args.reference_dir.canonicalize().unwrap_or(args.reference_dir);
    let mut input_files = vec![args.fastq1];
    if let Some(fastq2) = args.fastq2 {
        input_files.push(fastq2);
    }

    let defaults = PipelineConfig::default();

    Ok(PipelineConfig {
        reference_directory: reference_dir,
        input_files,
        thread_count: args.threads.unwrap_or_else(num_cpus::get),
        scoring: ScoringScheme {
            match_score: args.matching,
            mismatch_penalty: args.mismatch,
            gap_open: args.gap_open,
            gap_extend: args.gap_extend,
            unclip_score: args.unclip_score,
            ..ScoringScheme::default()
        },
        min_alignment_score: args.min_alignment_score,
        unpaired_pair_penalty: args.unpaired_pair_penalty,
        secondary_alignments: args.secondary_alignments,
        expected_orientation: PairOrientation::ForwardReverse,
        insert_size_sampling_enabled: !args.no_insert_size_sampling,
        preserve_map_align_order: args.preserve_map_align_order || defaults.preserve_map_align_order,
        read_group_id: args.read_group_id,
        read_group_sample: args.read_group_sample,
        output: args.output,
        ..defaults
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: PipelineArgs,
    }

    fn parse(argv: &[&str]) -> PipelineArgs {
        Harness::parse_from(std::iter::once("map").chain(argv.iter().copied())).args
    }

    #[test]
    fn minimal_single_end_invocation_parses() {
        let config = parse_pipeline_args(parse(&["refs/", "r1.fastq"])).unwrap();
        assert_eq!(config.input_files.len(), 1);
        assert!(config.insert_size_sampling_enabled);
    }

    #[test]
    fn paired_invocation_collects_both_inputs() {
        let config = parse_pipeline_args(parse(&["refs/", "r1.fastq", "r2.fastq"])).unwrap();
        assert_eq!(config.input_files.len(), 2);
    }

    #[test]
    fn insert_size_flag_disables_sampling() {
        let config = parse_pipeline_args(parse(&["refs/", "r1.fastq", "--no-insert-size-sampling"])).unwrap();
        assert!(!config.insert_size_sampling_enabled);
    }
}
