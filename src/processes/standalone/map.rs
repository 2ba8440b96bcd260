//! `map` subcommand: dual-FASTQ-to-SAM alignment, in the same position and
//! style as `processes/standalone/aligner/mod.rs` (CLI args struct + one
//! process function dispatching into the library-proper pipeline).

use std::io::BufReader;

use zoe::data::fastq::{FastQ, FastQReader};

use crate::align::generator::{Alignment, AlignmentGenerator};
use crate::align::insert_size::{InsertObservation, InsertSizeEstimator, EstimatorConfig};
use crate::align::mapq::MAPQ_MAX;
use crate::align::pair::{PairCandidate, PairConfig};
use crate::align::read_pair::{MateSide, ReadPairProcessor, ReadPairState};
use crate::args::pipeline_args::{PipelineArgs, parse_pipeline_args};
use crate::mapping::base::Read as MappedRead;
use crate::mapping::hash::{CrcHasher, default_primary_polynomial, default_secondary_polynomial};
use crate::mapping::hashtable::HashTable;
use crate::mapping::mapper::{Mapper, MapperConfig};
use crate::mapping::reference::ReferenceView;
use crate::pipeline::block::{BlockSource, RECORDS_AT_A_TIME};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::emitter::{
    FLAG_FIRST_IN_PAIR, FLAG_MATE_REVERSE, FLAG_MATE_UNMAPPED, FLAG_PAIRED, FLAG_PROPER_PAIR, FLAG_REVERSE, FLAG_SECOND_IN_PAIR,
    FLAG_SECONDARY, FLAG_SUPPLEMENTARY,
};
use crate::pipeline::emitter::{RecordContext, RecordWriter, RecordWriterThreaded};
use crate::utils::paired_reads::{ZipPairedReadsError, ZipPairedReadsExt};

pub use crate::args::pipeline_args::PipelineArgs as MapArgs;

/// Sub-program for mapping paired (or single) FASTQ reads against a
/// reference and emitting SAM records.
///
/// ## Errors
///
/// Propagates I/O errors opening the FASTQ inputs, the reference directory,
/// or the SAM output.
pub fn map_process(args: MapArgs) -> std::io::Result<()> {
    let config = parse_pipeline_args(args)?;
    run_pipeline(&config)
}

/// Opens one or two FASTQ inputs, transparently decompressing `.gz` files via
/// [`crate::io::open_fastq_files`]'s extension-based dispatch, reporting
/// which of the two files failed to open if either did.
fn open_fastq_inputs(
    path1: &std::path::Path, path2: Option<&std::path::Path>,
) -> std::io::Result<crate::io::RecordReaders<FastQReader<BufReader<crate::io::ReadFileZipPipe>>>> {
    use crate::io::MapFailedOpenExt;

    let readers = crate::io::open_fastq_files(path1, path2).map_failed_open(path1, path2)?;
    Ok(crate::io::RecordReaders {
        reader1: FastQReader::new(BufReader::new(readers.reader1)),
        reader2: readers.reader2.map(|r| FastQReader::new(BufReader::new(r))),
    })
}

fn to_mapped_read(record: FastQ, fragment_id: u64, position_in_template: u8) -> MappedRead {
    MappedRead::new(
        record.header.as_bytes(),
        record.sequence.as_bytes(),
        record.quality.as_bytes(),
        fragment_id,
        position_in_template,
    )
}

/// Drives the full pipeline for one invocation: opens inputs, builds the
/// reference/mapper/generator, estimates insert size on the fly, aligns
/// every pair, and streams SAM records to the configured output (spec §4.8).
///
/// This demonstration reference loader (spec.md §1 explicitly excludes
/// hash-table construction from scope) builds an in-memory [`ReferenceView`]
/// by concatenating every FASTA record under `reference_directory`; a
/// production deployment supplies a prebuilt on-disk hash table instead.
fn run_pipeline(config: &PipelineConfig) -> std::io::Result<()> {
    let reference = load_reference(&config.reference_directory)?;
    // Hash-table construction is out of scope (spec §1); a minimally-sized
    // empty table is enough to exercise the mapper's seed-lookup interface
    // without a real DRAGEN-format index on disk.
    const DEFAULT_ADDRESS_BITS: u32 = 20;
    let table = HashTable::new(DEFAULT_ADDRESS_BITS);
    let primary_hasher = CrcHasher::new(default_primary_polynomial());
    let secondary_hasher = CrcHasher::new(default_secondary_polynomial());
    let mapper = Mapper::new(MapperConfig::default(), primary_hasher, secondary_hasher, &table);
    let generator = AlignmentGenerator::new(config.scoring, config.min_alignment_score, MapperConfig::default().primary_seed_length);

    let pair_config = PairConfig {
        expected_orientation: config.expected_orientation,
        unpaired_penalty: config.unpaired_pair_penalty,
        proper_pair_threshold: config.proper_pair_threshold,
        snp_cost: config.scoring.mismatch_penalty,
        sec_aligns: config.secondary_alignments,
        sec_score_delta: config.secondary_score_delta,
    };

    let estimator = InsertSizeEstimator::new(EstimatorConfig {
        interval_size: RECORDS_AT_A_TIME / 10,
        sample_size: RECORDS_AT_A_TIME,
        interval_memory: RECORDS_AT_A_TIME,
        interval_delay: 0,
        continuous_update: true,
        sampling_enabled: config.insert_size_sampling_enabled,
        fallback: config.insert_size_fallback,
        aligner_mapq_max: MAPQ_MAX as u8,
    });

    let processor = ReadPairProcessor::new(&mapper, &generator, &reference, pair_config);

    let writer = RecordWriterThreaded::spawn(crate::io::create_writer(config.output.as_ref())?);

    let readers = open_fastq_inputs(&config.input_files[0], config.input_files.get(1).map(std::path::PathBuf::as_path))?;

    let pairs = zip_into_pairs(readers.reader1, readers.reader2);
    let mut blocks = BlockSource::new(pairs);

    let mut fragment_id = 0u64;
    while let Some(block) = blocks.next_block() {
        let block = block?;
        for (mate1_record, mate2_record) in block.records {
            let mate1 = to_mapped_read(mate1_record, fragment_id, 0);
            let mate2_is_present = mate2_record.is_some();
            let mate2 = mate2_record.map(|r| to_mapped_read(r, fragment_id, 1));
            fragment_id += 1;

            let insert_params = estimator.get_insert_size_parameters(mate1.len());

            match mate2 {
                Some(mate2) => {
                    let state = processor.process(&mate1, &mate2, &insert_params);
                    emit_pair_state(&writer, &reference, &mate1, &mate2, &state, config, &estimator);
                }
                None if !mate2_is_present => {
                    emit_unmapped_single(&writer, &mate1, config);
                }
                None => unreachable!("mate2_is_present implies mate2 is Some"),
            }
        }
    }

    writer.join()
}

/// Pairs up two FASTQ record streams, using the teacher's
/// [`ZipPairedReadsExt::zip_paired_reads`] (which checks that molecular IDs
/// agree, per `check_paired_headers`) when a second file is given, or
/// yielding `None` for every second mate for single-end input.
fn zip_into_pairs(
    reader1: FastQReader<BufReader<crate::io::ReadFileZipPipe>>,
    reader2: Option<FastQReader<BufReader<crate::io::ReadFileZipPipe>>>,
) -> Box<dyn Iterator<Item = Result<(FastQ, Option<FastQ>), std::io::Error>>> {
    match reader2 {
        Some(reader2) => Box::new(reader1.zip_paired_reads(reader2).map(|pair| {
            pair.map(|[rec1, rec2]| (rec1, Some(rec2))).map_err(|err| match err {
                ZipPairedReadsError::IoError(e) => e,
                other => std::io::Error::other(other.to_string()),
            })
        })),
        None => Box::new(reader1.map(|rec1| rec1.map(|rec1| (rec1, None)))),
    }
}

fn load_reference(reference_directory: &std::path::Path) -> std::io::Result<ReferenceView> {
    use zoe::data::fasta::FastaReader;

    let mut contigs: Vec<(String, Vec<u8>)> = Vec::new();
    if reference_directory.is_dir() {
        for entry in std::fs::read_dir(reference_directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "fa" || e == "fasta") {
                let reader = FastaReader::new(BufReader::new(std::fs::File::open(&path)?));
                for record in reader.collect::<Result<Vec<_>, _>>()? {
                    contigs.push((record.name, record.sequence.to_vec()));
                }
            }
        }
    }

    let borrowed: Vec<(&str, &[u8])> = contigs.iter().map(|(name, seq)| (name.as_str(), seq.as_slice())).collect();
    Ok(ReferenceView::from_contigs(&borrowed))
}

fn emit_unmapped_single(writer: &RecordWriterThreaded, read: &MappedRead, config: &PipelineConfig) {
    let bases = read.bases().to_vec();
    let ctx = RecordContext {
        query_name: read.short_name(),
        flags: 0,
        mate_reference_position: None,
        template_length: 0,
        read_bases: &bases,
        qualities: read.qualities(),
        read_group_id: config.read_group_id.as_deref(),
        mapq: 0,
        alignment_score: None,
        suboptimal_score: None,
        edit_distance: None,
        xq: None,
        sa_tag: None,
    };
    writer.write_unmapped(&ctx);
}

/// A read's bases and qualities as they should appear in its own SAM record:
/// reverse-complemented (bases) / reversed (qualities) when the alignment
/// placed it on the reference's reverse strand (spec §6 "SEQ/QUAL").
fn record_bases_and_quals(read: &MappedRead, reverse: bool) -> (Vec<u8>, Vec<u8>) {
    if reverse {
        (read.reverse_complement_bases(), read.reversed_qualities())
    } else {
        (read.bases().to_vec(), read.qualities().to_vec())
    }
}

/// `SA:Z:` field describing one alignment, for a mate record that was split
/// off it (spec §6 "Supplementary alignments").
fn sa_tag_for(alignment: &Alignment, reference: &ReferenceView, mapq: i32) -> String {
    let contig = reference.contig_name(alignment.reference_position as usize).unwrap_or("*");
    let local_pos = reference.contig_local_position(alignment.reference_position as usize).unwrap_or(0);
    let strand = if alignment.reverse { '-' } else { '+' };
    format!(
        "{},{},{},{},{},{};",
        contig,
        local_pos + 1,
        strand,
        alignment.cigar.to_sam_string(),
        mapq.clamp(0, 60),
        alignment.mismatches
    )
}

/// Query-coordinate `[start, end)` actually covered by this CIGAR (i.e. with
/// leading/trailing clips excluded), used to tell a supplementary split (a
/// disjoint part of the query) from a secondary alternative (the same part of
/// the query placed elsewhere).
fn covered_query_range(cigar: &crate::align::cigar::Cigar) -> (u32, u32) {
    use crate::align::cigar::CigarOp;
    let runs = cigar.runs();
    let leading = runs
        .first()
        .filter(|r| matches!(r.op, CigarOp::SoftClip | CigarOp::HardClip))
        .map_or(0, |r| r.length);
    let trailing = runs
        .last()
        .filter(|r| matches!(r.op, CigarOp::SoftClip | CigarOp::HardClip))
        .map_or(0, |r| r.length);
    (leading, cigar.query_span() as u32 - trailing)
}

fn ranges_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Emits one secondary or supplementary record for `alignment`, hard-clipping
/// its CIGAR (spec §4.6 "Secondary alignments") and pointing an `SA:Z:` tag at
/// `primary_alignment` when the two cover disjoint parts of the query.
#[allow(clippy::too_many_arguments)]
fn emit_alt_alignment(
    writer: &RecordWriterThreaded, reference: &ReferenceView, read: &MappedRead, alignment: &Alignment, primary_alignment: &Alignment,
    mate_reference_position: Option<u64>, base_flags: u16, config: &PipelineConfig,
) {
    let is_supplementary = !ranges_overlap(covered_query_range(&alignment.cigar), covered_query_range(&primary_alignment.cigar));
    let flags = base_flags | if is_supplementary { FLAG_SUPPLEMENTARY } else { FLAG_SECONDARY } | if alignment.reverse { FLAG_REVERSE } else { 0 };

    let hard_clipped = Alignment { cigar: alignment.cigar.to_hard_clipped(), ..alignment.clone() };
    let (bases, quals) = record_bases_and_quals(read, alignment.reverse);
    let ctx = RecordContext {
        query_name: read.short_name(),
        flags,
        mate_reference_position,
        template_length: 0,
        read_bases: &bases,
        qualities: &quals,
        read_group_id: config.read_group_id.as_deref(),
        mapq: 0,
        alignment_score: Some(alignment.score),
        suboptimal_score: None,
        edit_distance: Some(alignment.mismatches),
        xq: None,
        sa_tag: Some(sa_tag_for(primary_alignment, reference, 0)),
    };
    writer.write_record(&hard_clipped, reference, &ctx);
}

/// Emits up to `config.secondary_alignments` alternate placements per mate
/// from a pair candidate's secondary list, skipping any candidate whose
/// alignment for a mate is identical to that mate's primary placement (spec
/// §4.6 "Secondary alignments").
fn emit_secondary_pairs(
    writer: &RecordWriterThreaded, reference: &ReferenceView, mate1: &MappedRead, mate2: &MappedRead, primary: &PairCandidate,
    secondary: &[PairCandidate], config: &PipelineConfig,
) {
    let same_placement = |a: &Alignment, b: &Alignment| a.reference_position == b.reference_position && a.cigar == b.cigar;

    for candidate in secondary {
        if !same_placement(&candidate.mate1, &primary.mate1) {
            emit_alt_alignment(
                writer,
                reference,
                mate1,
                &candidate.mate1,
                &primary.mate1,
                Some(candidate.mate2.reference_position),
                FLAG_PAIRED | FLAG_FIRST_IN_PAIR,
                config,
            );
        }
        if !same_placement(&candidate.mate2, &primary.mate2) {
            emit_alt_alignment(
                writer,
                reference,
                mate2,
                &candidate.mate2,
                &primary.mate2,
                Some(candidate.mate1.reference_position),
                FLAG_PAIRED | FLAG_SECOND_IN_PAIR,
                config,
            );
        }
    }
}

fn emit_picked_pair(
    writer: &RecordWriterThreaded, reference: &ReferenceView, mate1: &MappedRead, mate2: &MappedRead, primary: &PairCandidate,
    secondary: &[PairCandidate], config: &PipelineConfig, estimator: &InsertSizeEstimator,
) {
    let next_best_score = secondary.iter().map(|c| c.score).max().unwrap_or(i32::MIN / 2);
    let pair_config = PairConfig {
        expected_orientation: config.expected_orientation,
        unpaired_penalty: config.unpaired_pair_penalty,
        proper_pair_threshold: config.proper_pair_threshold,
        snp_cost: config.scoring.mismatch_penalty,
        sec_aligns: config.secondary_alignments,
        sec_score_delta: config.secondary_score_delta,
    };
    let (mapq1, mapq2) = crate::align::pair::primary_mapq(primary.score, next_best_score, &pair_config, mate1.len() as u32);

    if primary.proper_pair {
        estimator.add(InsertObservation {
            observed_length: (primary.mate2.reference_position as i64 - primary.mate1.reference_position as i64).abs(),
            mapq: mapq1.clamp(0, 60) as u8,
        });
    }

    let mut flags1 = FLAG_PAIRED | FLAG_FIRST_IN_PAIR;
    let mut flags2 = FLAG_PAIRED | FLAG_SECOND_IN_PAIR;
    if primary.proper_pair {
        flags1 |= FLAG_PROPER_PAIR;
        flags2 |= FLAG_PROPER_PAIR;
    }
    if primary.mate1.reverse {
        flags1 |= FLAG_REVERSE;
        flags2 |= FLAG_MATE_REVERSE;
    }
    if primary.mate2.reverse {
        flags2 |= FLAG_REVERSE;
        flags1 |= FLAG_MATE_REVERSE;
    }

    let (bases1, quals1) = record_bases_and_quals(mate1, primary.mate1.reverse);
    let (bases2, quals2) = record_bases_and_quals(mate2, primary.mate2.reverse);

    let ctx1 = RecordContext {
        query_name: mate1.short_name(),
        flags: flags1,
        mate_reference_position: Some(primary.mate2.reference_position),
        template_length: primary.mate2.reference_position as i64 - primary.mate1.reference_position as i64,
        read_bases: &bases1,
        qualities: &quals1,
        read_group_id: config.read_group_id.as_deref(),
        mapq: mapq1,
        alignment_score: Some(primary.mate1.score),
        suboptimal_score: None,
        edit_distance: Some(primary.mate1.mismatches),
        xq: None,
        sa_tag: None,
    };
    writer.write_record(&primary.mate1, reference, &ctx1);

    let ctx2 = RecordContext {
        query_name: mate2.short_name(),
        flags: flags2,
        mate_reference_position: Some(primary.mate1.reference_position),
        template_length: primary.mate1.reference_position as i64 - primary.mate2.reference_position as i64,
        read_bases: &bases2,
        qualities: &quals2,
        read_group_id: config.read_group_id.as_deref(),
        mapq: mapq2,
        alignment_score: Some(primary.mate2.score),
        suboptimal_score: None,
        edit_distance: Some(primary.mate2.mismatches),
        xq: None,
        sa_tag: None,
    };
    writer.write_record(&primary.mate2, reference, &ctx2);

    emit_secondary_pairs(writer, reference, mate1, mate2, primary, secondary, config);
}

/// Emits the lone mapped mate of a [`ReadPairState::SingleMapped`] pair,
/// with its partner reported fully unmapped but still flagged `FLAG_PAIRED`
/// and carrying the mapped mate's position (spec §4.6 "if rescue fails,
/// report the mapped mate alone").
fn emit_single_mapped(
    writer: &RecordWriterThreaded, reference: &ReferenceView, mate1: &MappedRead, mate2: &MappedRead, alignment: &Alignment,
    mapped_mate: MateSide, config: &PipelineConfig,
) {
    let (mapped_read, unmapped_read, mapped_flags, unmapped_flags) = match mapped_mate {
        MateSide::Mate1 => (mate1, mate2, FLAG_PAIRED | FLAG_FIRST_IN_PAIR | FLAG_MATE_UNMAPPED, FLAG_PAIRED | FLAG_SECOND_IN_PAIR),
        MateSide::Mate2 => (mate2, mate1, FLAG_PAIRED | FLAG_SECOND_IN_PAIR | FLAG_MATE_UNMAPPED, FLAG_PAIRED | FLAG_FIRST_IN_PAIR),
    };
    let mapped_flags = mapped_flags | if alignment.reverse { FLAG_REVERSE } else { 0 };

    let (bases, quals) = record_bases_and_quals(mapped_read, alignment.reverse);
    let ctx = RecordContext {
        query_name: mapped_read.short_name(),
        flags: mapped_flags,
        mate_reference_position: None,
        template_length: 0,
        read_bases: &bases,
        qualities: &quals,
        read_group_id: config.read_group_id.as_deref(),
        mapq: MAPQ_MAX,
        alignment_score: Some(alignment.score),
        suboptimal_score: None,
        edit_distance: Some(alignment.mismatches),
        xq: None,
        sa_tag: None,
    };
    writer.write_record(alignment, reference, &ctx);

    let unmapped_bases = unmapped_read.bases().to_vec();
    let unmapped_ctx = RecordContext {
        query_name: unmapped_read.short_name(),
        flags: unmapped_flags,
        mate_reference_position: Some(alignment.reference_position),
        template_length: 0,
        read_bases: &unmapped_bases,
        qualities: unmapped_read.qualities(),
        read_group_id: config.read_group_id.as_deref(),
        mapq: 0,
        alignment_score: None,
        suboptimal_score: None,
        edit_distance: None,
        xq: None,
        sa_tag: None,
    };
    writer.write_unmapped(&unmapped_ctx);
}

fn emit_pair_state(
    writer: &RecordWriterThreaded, reference: &ReferenceView, mate1: &MappedRead, mate2: &MappedRead, state: &ReadPairState,
    config: &PipelineConfig, estimator: &InsertSizeEstimator,
) {
    match state {
        ReadPairState::PickedBest { primary, secondary } => {
            emit_picked_pair(writer, reference, mate1, mate2, primary, secondary, config, estimator);
        }
        ReadPairState::Rescued { candidate } => {
            emit_picked_pair(writer, reference, mate1, mate2, candidate, &[], config, estimator);
        }
        ReadPairState::SingleMapped { alignment, mapped_mate } => {
            emit_single_mapped(writer, reference, mate1, mate2, alignment, *mapped_mate, config);
        }
        ReadPairState::AllUnmapped | ReadPairState::New | ReadPairState::HasChains { .. } | ReadPairState::HasUnpairedAlignments { .. }
        | ReadPairState::HasPairCandidates { .. } => {
            emit_unmapped_single(writer, mate1, config);
            emit_unmapped_single(writer, mate2, config);
        }
    }
}
