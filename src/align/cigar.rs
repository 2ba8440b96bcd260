//! CIGAR op/run model and its structural invariants (spec §3 "CIGAR", §8).

/// One CIGAR operation, using the standard SAM alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Padding,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarOp {
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
            CigarOp::Skip => 'N',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
            CigarOp::Padding => 'P',
            CigarOp::SequenceMatch => '=',
            CigarOp::SequenceMismatch => 'X',
        }
    }

    /// True if this op advances the query (read) coordinate.
    #[must_use]
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Insertion | CigarOp::SoftClip | CigarOp::SequenceMatch | CigarOp::SequenceMismatch
        )
    }

    /// True if this op advances the reference coordinate.
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Deletion | CigarOp::Skip | CigarOp::SequenceMatch | CigarOp::SequenceMismatch
        )
    }
}

/// One run of a CIGAR op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarRun {
    pub op: CigarOp,
    pub length: u32,
}

/// A validated sequence of CIGAR runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar(Vec<CigarRun>);

/// A violation of one of the CIGAR invariants from spec §3/§8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarError {
    ZeroLengthRun,
    AdjacentSameOp,
    HardClipNotAtEnd,
}

impl std::fmt::Display for CigarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            CigarError::ZeroLengthRun => "CIGAR contains a zero-length run",
            CigarError::AdjacentSameOp => "CIGAR contains two adjacent runs with the same op",
            CigarError::HardClipNotAtEnd => "hard clip appears outside the first/last run",
        };
        write!(f, "{msg}")
    }
}
impl std::error::Error for CigarError {}

impl Cigar {
    /// Builds a [`Cigar`] from runs, pushing each through [`Cigar::push`] so
    /// the invariants are checked incrementally (mirrors how a backtrace
    /// builds the CIGAR one step at a time).
    pub fn from_runs(runs: impl IntoIterator<Item = CigarRun>) -> Result<Self, CigarError> {
        let mut cigar = Cigar::default();
        for run in runs {
            cigar.push(run.op, run.length)?;
        }
        cigar.validate_hard_clip_positions()?;
        Ok(cigar)
    }

    /// Appends a run, merging it into the previous run if the op matches (so
    /// a backtrace never needs to track "is this still the same op" itself),
    /// and rejecting zero-length runs outright.
    pub fn push(&mut self, op: CigarOp, length: u32) -> Result<(), CigarError> {
        if length == 0 {
            return Err(CigarError::ZeroLengthRun);
        }
        match self.0.last_mut() {
            Some(last) if last.op == op => last.length += length,
            _ => self.0.push(CigarRun { op, length }),
        }
        Ok(())
    }

    fn validate_hard_clip_positions(&self) -> Result<(), CigarError> {
        for (i, run) in self.0.iter().enumerate() {
            if run.op == CigarOp::HardClip && i != 0 && i != self.0.len() - 1 {
                return Err(CigarError::HardClipNotAtEnd);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn runs(&self) -> &[CigarRun] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total query bases consumed.
    #[must_use]
    pub fn query_span(&self) -> u64 {
        self.0
            .iter()
            .filter(|r| r.op.consumes_query())
            .map(|r| r.length as u64)
            .sum()
    }

    /// Total reference bases consumed.
    #[must_use]
    pub fn reference_span(&self) -> u64 {
        self.0
            .iter()
            .filter(|r| r.op.consumes_reference())
            .map(|r| r.length as u64)
            .sum()
    }

    /// Converts leading/trailing soft clips to hard clips, used when emitting
    /// secondary/supplementary alignments (spec §4.6 "Secondary alignments").
    #[must_use]
    pub fn to_hard_clipped(&self) -> Self {
        let mut runs = self.0.clone();
        if let Some(first) = runs.first_mut()
            && first.op == CigarOp::SoftClip
        {
            first.op = CigarOp::HardClip;
        }
        if let Some(last) = runs.last_mut()
            && last.op == CigarOp::SoftClip
        {
            last.op = CigarOp::HardClip;
        }
        Self(runs)
    }

    /// Renders the CIGAR in SAM text form, e.g. `6M1D4M`, or `*` when empty.
    #[must_use]
    pub fn to_sam_string(&self) -> String {
        if self.0.is_empty() {
            return "*".to_string();
        }
        self.0.iter().fold(String::new(), |mut acc, run| {
            use std::fmt::Write;
            write!(acc, "{}{}", run.length, run.op.as_char()).unwrap();
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_same_op_runs_merge() {
        let mut cigar = Cigar::default();
        cigar.push(CigarOp::Match, 3).unwrap();
        cigar.push(CigarOp::Match, 4).unwrap();
        assert_eq!(cigar.runs(), &[CigarRun { op: CigarOp::Match, length: 7 }]);
    }

    #[test]
    fn zero_length_run_is_rejected() {
        let mut cigar = Cigar::default();
        assert_eq!(cigar.push(CigarOp::Match, 0), Err(CigarError::ZeroLengthRun));
    }

    #[test]
    fn hard_clip_must_be_at_ends() {
        let runs = [
            CigarRun { op: CigarOp::Match, length: 5 },
            CigarRun { op: CigarOp::HardClip, length: 2 },
            CigarRun { op: CigarOp::Match, length: 3 },
        ];
        assert_eq!(Cigar::from_runs(runs), Err(CigarError::HardClipNotAtEnd));
    }

    #[test]
    fn query_and_reference_spans_match_spec_example() {
        // 6M1D4M over a 10-base read.
        let cigar = Cigar::from_runs([
            CigarRun { op: CigarOp::Match, length: 6 },
            CigarRun { op: CigarOp::Deletion, length: 1 },
            CigarRun { op: CigarOp::Match, length: 4 },
        ])
        .unwrap();
        assert_eq!(cigar.query_span(), 10);
        assert_eq!(cigar.reference_span(), 11);
        assert_eq!(cigar.to_sam_string(), "6M1D4M");
    }

    #[test]
    fn to_hard_clipped_only_touches_soft_clip_ends() {
        let cigar = Cigar::from_runs([
            CigarRun { op: CigarOp::SoftClip, length: 6 },
            CigarRun { op: CigarOp::Match, length: 4 },
            CigarRun { op: CigarOp::SoftClip, length: 6 },
        ])
        .unwrap();
        let hard = cigar.to_hard_clipped();
        assert_eq!(hard.to_sam_string(), "6H4M6H");
    }

    #[test]
    fn empty_cigar_renders_as_star() {
        assert_eq!(Cigar::default().to_sam_string(), "*");
    }
}
