//! SAM record emission (spec §6 "Record emission"), reusing the teacher's
//! writer-thread shape (`AlignmentWriterThreaded`: work handed to a
//! dedicated thread over an mpsc channel so formatting never blocks a
//! mapper thread) but emitting SAM text fields instead of the teacher's
//! alignment report.

use std::io::{self, Write};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};

use crate::align::cigar::Cigar;
use crate::align::generator::Alignment;
use crate::mapping::base::decode_base;
use crate::mapping::reference::ReferenceView;

pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_PROPER_PAIR: u16 = 0x2;
pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_MATE_REVERSE: u16 = 0x20;
pub const FLAG_FIRST_IN_PAIR: u16 = 0x40;
pub const FLAG_SECOND_IN_PAIR: u16 = 0x80;
pub const FLAG_SECONDARY: u16 = 0x100;
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// Everything needed to render one SAM line that is not already carried on
/// [`Alignment`] (spec §6's record-emission field list).
pub struct RecordContext<'a> {
    pub query_name: &'a [u8],
    pub flags: u16,
    pub mate_reference_position: Option<u64>,
    pub template_length: i64,
    pub read_bases: &'a [u8],
    pub qualities: &'a [u8],
    pub read_group_id: Option<&'a str>,
    pub mapq: i32,
    pub alignment_score: Option<i32>,
    pub suboptimal_score: Option<i32>,
    pub edit_distance: Option<u32>,
    pub xq: Option<i32>,
    /// `SA:Z:` tag for a supplementary/secondary record, listing the
    /// primary alignment it was split from (spec §6 "Supplementary
    /// alignments").
    pub sa_tag: Option<String>,
}

/// Formats a mapped record as one SAM line (no trailing newline).
#[must_use]
pub fn format_mapped_record(alignment: &Alignment, reference: &ReferenceView, ctx: &RecordContext<'_>) -> String {
    let contig = reference.contig_name(alignment.reference_position as usize).unwrap_or("*");
    let local_pos = reference.contig_local_position(alignment.reference_position as usize).unwrap_or(0);

    let mate_field = match ctx.mate_reference_position {
        Some(pos) => {
            let mate_contig = reference.contig_name(pos as usize).unwrap_or("*");
            let mate_local = reference.contig_local_position(pos as usize).unwrap_or(0);
            if mate_contig == contig { ("=".to_string(), mate_local + 1) } else { (mate_contig.to_string(), mate_local + 1) }
        }
        None => ("*".to_string(), 0),
    };

    let mut line = format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        truncated_utf8(ctx.query_name),
        ctx.flags,
        contig,
        local_pos + 1,
        ctx.mapq.clamp(0, 60),
        cigar_or_star(&alignment.cigar),
        mate_field.0,
        mate_field.1,
        ctx.template_length,
        decode_bases(ctx.read_bases),
        decode_qualities(ctx.qualities),
    );

    if let Some(rgid) = ctx.read_group_id {
        line.push_str(&format!("\tRG:Z:{rgid}"));
    }
    if let Some(score) = ctx.alignment_score {
        line.push_str(&format!("\tAS:i:{score}"));
    }
    if let Some(xs) = ctx.suboptimal_score {
        line.push_str(&format!("\tXS:i:{xs}"));
    }
    if let Some(nm) = ctx.edit_distance {
        line.push_str(&format!("\tNM:i:{nm}"));
    }
    if let Some(xq) = ctx.xq {
        line.push_str(&format!("\tXQ:i:{xq}"));
    }
    if let Some(sa) = &ctx.sa_tag {
        line.push_str(&format!("\tSA:Z:{sa}"));
    }

    line
}

/// Formats a fully-unmapped record: `RNAME`/`CIGAR`/`POS` are `*`/`*`/`0`
/// per spec §6.
#[must_use]
pub fn format_unmapped_record(ctx: &RecordContext<'_>) -> String {
    format!(
        "{}\t{}\t*\t0\t0\t*\t*\t0\t0\t{}\t{}",
        truncated_utf8(ctx.query_name),
        ctx.flags | FLAG_UNMAPPED,
        decode_bases(ctx.read_bases),
        decode_qualities(ctx.qualities),
    )
}

fn cigar_or_star(cigar: &Cigar) -> String {
    let s = cigar.to_sam_string();
    if s.is_empty() { "*".to_string() } else { s }
}

fn decode_bases(codes: &[u8]) -> String {
    codes.iter().map(|&c| decode_base(c) as char).collect()
}

fn decode_qualities(qualities: &[u8]) -> String {
    qualities.iter().map(|&q| (q + 33) as char).collect()
}

fn truncated_utf8(name: &[u8]) -> String {
    match name.iter().position(u8::is_ascii_whitespace) {
        Some(i) => String::from_utf8_lossy(&name[..i]).into_owned(),
        None => String::from_utf8_lossy(name).into_owned(),
    }
}

/// Hands formatted lines off to a single dedicated writer thread, mirroring
/// the teacher's `AlignmentWriterThreaded` (mpsc channel + one thread owning
/// the sink) so formatting/IO never blocks a mapper thread, and so output
/// order is whatever order lines are sent in (callers are responsible for
/// sending in ticket order if `preserveMapAlignOrder` is set, per spec §6).
pub struct RecordWriterThreaded {
    sender: Option<Sender<String>>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

impl RecordWriterThreaded {
    pub fn spawn<W: Write + Send + 'static>(mut sink: W) -> Self {
        let (sender, receiver): (Sender<String>, Receiver<String>) = channel();
        let handle = thread::spawn(move || -> io::Result<()> {
            for line in receiver {
                sink.write_all(line.as_bytes())?;
                sink.write_all(b"\n")?;
            }
            sink.flush()
        });

        Self { sender: Some(sender), handle: Some(handle) }
    }

    /// Queues one formatted SAM line. Panics if called after [`Self::join`]
    /// (a caller bug, not a runtime condition).
    pub fn send(&self, line: String) {
        self.sender.as_ref().expect("writer already joined").send(line).expect("writer thread panicked");
    }

    /// Drops the sender (closing the channel) and waits for the writer
    /// thread to flush and exit.
    pub fn join(mut self) -> io::Result<()> {
        drop(self.sender.take());
        self.handle.take().expect("join called twice").join().expect("writer thread panicked")
    }
}

/// Named the way the teacher's `AlignmentWriter` trait is, so a reader
/// familiar with `processes/standalone/aligner/writers.rs` recognizes the
/// shape: `write_unmapped`/`write_record` for the two record kinds §6
/// distinguishes.
pub trait RecordWriter {
    fn write_unmapped(&self, ctx: &RecordContext<'_>);
    fn write_record(&self, alignment: &Alignment, reference: &ReferenceView, ctx: &RecordContext<'_>);
}

impl RecordWriter for RecordWriterThreaded {
    fn write_unmapped(&self, ctx: &RecordContext<'_>) {
        self.send(format_unmapped_record(ctx));
    }

    fn write_record(&self, alignment: &Alignment, reference: &ReferenceView, ctx: &RecordContext<'_>) {
        self.send(format_mapped_record(alignment, reference, ctx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(name: &'a [u8], bases: &'a [u8], quals: &'a [u8]) -> RecordContext<'a> {
        RecordContext {
            query_name: name,
            flags: 0,
            mate_reference_position: None,
            template_length: 0,
            read_bases: bases,
            qualities: quals,
            read_group_id: None,
            mapq: 40,
            alignment_score: Some(30),
            suboptimal_score: None,
            edit_distance: Some(1),
            xq: None,
            sa_tag: None,
        }
    }

    #[test]
    fn unmapped_record_uses_star_fields() {
        let ctx = context(b"r1", &[1, 2, 4, 8], &[30, 30, 30, 30]);
        let line = format_unmapped_record(&ctx);
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields[2], "*");
        assert_eq!(fields[3], "0");
        assert_eq!(fields[5], "*");
        assert_eq!(fields[1], "4");
    }

    #[test]
    fn mapped_record_clamps_mapq_and_includes_tags() {
        let reference = ReferenceView::from_contigs(&[("chr1", b"ACGTACGTACGTACGTACGTACGT")]);
        let alignment = Alignment {
            reference_position: 3,
            score: 30,
            cigar: Cigar::from_runs(vec![crate::align::cigar::CigarRun { op: crate::align::cigar::CigarOp::Match, length: 4 }]).unwrap(),
            mismatches: 1,
            ineligible: false,
            smith_waterman_done: false,
            perfect: false,
            reverse: false,
        };
        let mut ctx = context(b"r1 extra", &[1, 2, 4, 8], &[30, 30, 30, 30]);
        ctx.mapq = 99;
        let line = format_mapped_record(&alignment, &reference, &ctx);
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields[0], "r1");
        assert_eq!(fields[2], "chr1");
        assert_eq!(fields[3], "4");
        assert_eq!(fields[4], "60");
        assert!(line.contains("NM:i:1"));
        assert!(line.contains("AS:i:30"));
    }

    #[test]
    fn sa_tag_is_included_when_present() {
        let reference = ReferenceView::from_contigs(&[("chr1", b"ACGTACGTACGTACGTACGTACGT")]);
        let alignment = Alignment {
            reference_position: 3,
            score: 30,
            cigar: Cigar::from_runs(vec![crate::align::cigar::CigarRun { op: crate::align::cigar::CigarOp::Match, length: 4 }]).unwrap(),
            mismatches: 1,
            ineligible: false,
            smith_waterman_done: false,
            perfect: false,
            reverse: false,
        };
        let mut ctx = context(b"r1", &[1, 2, 4, 8], &[30, 30, 30, 30]);
        ctx.sa_tag = Some("chr1,1,+,4M,60,0;".to_string());
        let line = format_mapped_record(&alignment, &reference, &ctx);
        assert!(line.contains("SA:Z:chr1,1,+,4M,60,0;"));
    }

    #[test]
    fn threaded_writer_flushes_all_lines_in_send_order() {
        let buffer: Vec<u8> = Vec::new();
        let shared = std::sync::Arc::new(std::sync::Mutex::new(buffer));
        struct SharedWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let writer = RecordWriterThreaded::spawn(SharedWriter(shared.clone()));
        writer.send("line1".to_string());
        writer.send("line2".to_string());
        writer.join().unwrap();

        let contents = shared.lock().unwrap();
        assert_eq!(String::from_utf8_lossy(&contents), "line1\nline2\n");
    }
}
