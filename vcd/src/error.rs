use std::fmt;

use thiserror::Error;

/// Which of the two grammars was being parsed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParsePhase {
    /// Everything up to and including `$enddefinitions $end`.
    Declarations,
    /// The stream of ticks and value changes after it.
    SimCmds,
}

impl fmt::Display for ParsePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParsePhase::Declarations => "declarations",
            ParsePhase::SimCmds => "simulation commands",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found `{found}`")]
    Expected { expected: String, found: String },
    #[error("unexpected end of input; expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("{open} $scope(s) not closed by $upscope")]
    UnbalancedScope { open: usize },
    #[error("$upscope without a matching $scope")]
    UnmatchedUpscope,
    #[error("invalid timescale magnitude `{0}`; expected 1, 10 or 100")]
    InvalidTimescaleMagnitude(String),
    #[error("invalid timescale unit `{0}`; expected s, ms, us, ns, ps or fs")]
    InvalidTimescaleUnit(String),
    #[error("unknown scope type `{0}`")]
    UnknownScopeType(String),
    #[error("unknown var type `{0}`")]
    UnknownVarType(String),
    #[error("invalid var size `{0}`")]
    InvalidVarSize(String),
    #[error("invalid tick `{0}`")]
    InvalidTick(String),
    #[error("invalid value `{0}`")]
    InvalidValue(String),
    #[error("value change has no identifier")]
    MissingIdentifier,
    #[error("real value `{0}` is out of range")]
    RealOutOfRange(String),
}

/// A parse failure, with the position it happened at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error parsing {phase} at line {line}, column {column} (offset {offset}): {kind}")]
pub struct ParseError {
    pub phase: ParsePhase,
    pub kind: ParseErrorKind,
    /// Byte offset from the start of the file.
    pub offset: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based, in bytes.
    pub column: usize,
}

/// A known line position in the input. Locating a later offset from a mark
/// only scans the bytes in between.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LineMark {
    pub offset: usize,
    /// 1-based.
    pub line: usize,
    pub line_start: usize,
}

impl Default for LineMark {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            line_start: 0,
        }
    }
}

impl LineMark {
    /// Move forward to `offset`. Offsets before the mark start again from
    /// the beginning of the input.
    pub fn advance(self, input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let mut mark = if offset < self.offset {
            Self::default()
        } else {
            self
        };
        for (i, &b) in input[mark.offset..offset].iter().enumerate() {
            if b == b'\n' {
                mark.line += 1;
                mark.line_start = mark.offset + i + 1;
            }
        }
        mark.offset = offset;
        mark
    }
}

impl ParseError {
    /// Build an error at `offset` in `input`, working out the line and column.
    pub fn at(input: &[u8], offset: usize, phase: ParsePhase, kind: ParseErrorKind) -> Self {
        Self::at_mark(LineMark::default().advance(input, offset), phase, kind)
    }

    pub(crate) fn at_mark(mark: LineMark, phase: ParsePhase, kind: ParseErrorKind) -> Self {
        Self {
            phase,
            kind,
            offset: mark.offset,
            line: mark.line,
            column: mark.offset - mark.line_start + 1,
        }
    }

    /// True for errors that are about a single record rather than the
    /// structure of the file.
    pub fn is_range_error(&self) -> bool {
        matches!(self.kind, ParseErrorKind::RealOutOfRange(_))
    }
}
