//! Value Change Dump (VCD) reader
//!
//! VCD is the text trace format from IEEE 1364. A file is a header of
//! declarations (timescale, scope tree, vars) followed by a body of ticks
//! and value changes. [`VcdFile`] parses the header when opened and the body
//! on first use; [`parse_document`] does both at once on a byte slice.
//!
//! Signal values are stored as [`VarBit`]s, which avoid allocating for
//! anything up to 56 bits wide.

pub mod bitview;
pub mod error;
mod lexer;
pub mod mapped;
pub mod parser;
pub mod types;
pub mod value;
pub mod varbit;
pub mod vcd;

pub use bitview::BitView;
pub use error::{ParseError, ParseErrorKind, ParsePhase};
pub use parser::{parse_declarations, parse_document, parse_sim_cmds, ParseOptions};
pub use types::{Change, Declarations, Document, Scope, ScopeId, SimCmd, Var};
pub use value::{BinaryNum, RealNum, ScalarValue, Value};
pub use varbit::VarBit;
pub use vcd::VcdFile;
