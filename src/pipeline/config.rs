//! Plain configuration struct carrying every tunable in spec §6's CLI/config
//! field list, grounded on the teacher's `AlignerConfig`
//! (`processes/standalone/aligner/arg_parsing.rs`): clap does flag parsing,
//! this struct is the validated, process-wide result handed to the pipeline.

use crate::align::insert_size::InsertSizeParameters;
use crate::align::pair::PairOrientation;
use crate::align::wavefront::ScoringScheme;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub reference_directory: std::path::PathBuf,
    pub input_files: Vec<std::path::PathBuf>,
    /// Output SAM filepath; `None` means stdout.
    pub output: Option<std::path::PathBuf>,

    pub thread_count: usize,

    pub scoring: ScoringScheme,
    pub min_alignment_score: i32,

    pub mapq_min_read_length: usize,

    pub unpaired_pair_penalty: i32,
    pub expected_orientation: PairOrientation,
    pub proper_pair_threshold: i32,
    pub secondary_alignments: usize,
    pub secondary_score_delta: i32,

    pub insert_size_fallback: InsertSizeParameters,
    pub insert_size_sampling_enabled: bool,

    /// When set, output blocks are emitted strictly in ticket order even if
    /// that means the writer stage must buffer out-of-order results (spec §6
    /// `preserveMapAlignOrder`).
    pub preserve_map_align_order: bool,

    pub read_group_id: Option<String>,
    pub read_group_sample: Option<String>,

    /// Quality-string ASCII offset (33 for Sanger/Illumina 1.8+, 64 for
    /// older Illumina encodings).
    pub fastq_quality_offset: u8,

    /// Delimiter separating a `/1`/`/2` mate suffix from the shared query
    /// name, if the input uses that convention instead of whitespace.
    pub input_qname_suffix_delimiter: Option<u8>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_directory: std::path::PathBuf::new(),
            input_files: Vec::new(),
            output: None,
            thread_count: num_cpus::get(),
            scoring: ScoringScheme::default(),
            min_alignment_score: 20,
            mapq_min_read_length: 20,
            unpaired_pair_penalty: 20,
            expected_orientation: PairOrientation::ForwardReverse,
            proper_pair_threshold: 30,
            secondary_alignments: 0,
            secondary_score_delta: 5,
            insert_size_fallback: InsertSizeParameters {
                mean: 300.0,
                stddev: 100.0,
                min: 50,
                max: 550,
                rescue_min: 0,
                rescue_max: 800,
                sigma_factor: 0,
                orientation: PairOrientation::ForwardReverse,
                is_init_done: false,
            },
            insert_size_sampling_enabled: true,
            preserve_map_align_order: true,
            read_group_id: None,
            read_group_sample: None,
            fastq_quality_offset: 33,
            input_qname_suffix_delimiter: Some(b'/'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_a_proper_pair_threshold_above_the_unpaired_penalty() {
        let config = PipelineConfig::default();
        assert!(config.proper_pair_threshold > config.unpaired_pair_penalty);
    }

    #[test]
    fn default_fastq_offset_is_sanger() {
        assert_eq!(PipelineConfig::default().fastq_quality_offset, 33);
    }
}
