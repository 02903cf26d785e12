//! Diagnostics for program text parsing and loading.
//!
//! Errors render in the usual compiler style, with an optional caret line
//! pointing at the offending column:
//! ```text
//! blink.pio:3: error: invalid program name: unexpected character ' '
//! #.program my blink
//!              ^
//! ```

use std::fmt;
use std::path::PathBuf;

use pio_core::ProgramError;

/// A parse failure at a specific line of a program text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Name of the parsed resource, usually a file path.
    pub resource: String,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column of the offending character, when known.
    pub column: Option<usize>,
    /// Text of the offending line, kept for caret diagnostics.
    pub source_line: Option<String>,
    /// Kind of parse error.
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Creates an error without column information.
    #[must_use]
    pub fn new(resource: impl Into<String>, line: usize, kind: ParseErrorKind) -> Self {
        Self {
            resource: resource.into(),
            line,
            column: None,
            source_line: None,
            kind,
        }
    }

    /// Attaches the offending line and column for a caret diagnostic.
    #[must_use]
    pub fn with_caret(mut self, source_line: &str, column: usize) -> Self {
        self.source_line = Some(source_line.to_string());
        self.column = Some(column);
        self
    }

    /// Formats `resource:line`.
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}:{}", self.resource, self.line)
    }

    /// Renders the caret line, copying tabs from the source so the marker
    /// lines up in a terminal.
    fn caret(&self) -> Option<String> {
        let (source, column) = (self.source_line.as_ref()?, self.column?);
        let mut marker: String = source
            .chars()
            .take(column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        marker.push('^');
        Some(marker)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: error: {}", self.location(), self.kind)?;
        if let (Some(source), Some(marker)) = (&self.source_line, self.caret()) {
            write!(f, "\n{source}\n{marker}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrorKind::Program(e) => Some(e),
            _ => None,
        }
    }
}

/// Classification of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A once-only directive appeared again.
    DuplicateDirective(&'static str),
    /// `.side_set` after the first instruction.
    SideSetAfterCode,
    /// Program name is not a plain identifier.
    InvalidIdentifier(String),
    /// Directive is missing its argument.
    MissingArgument(&'static str),
    /// Directive got more arguments than it takes.
    UnexpectedArgument(String),
    /// Directive argument is not a decimal integer.
    InvalidNumber(String),
    /// Numeric directive argument outside its range.
    OutOfRange {
        /// Directive or field name.
        what: &'static str,
        /// Parsed value.
        value: i64,
        /// Accepted range.
        range: &'static str,
    },
    /// Unrecognised `.side_set` flag.
    UnknownSideSetFlag(String),
    /// More than two `.side_set` flags.
    TooManySideSetFlags,
    /// Instruction line is not a hexadecimal word.
    InvalidInstruction(String),
    /// Instruction word does not fit in 16 bits.
    InstructionOutOfRange(String),
    /// A 33rd instruction was read.
    TooManyInstructions,
    /// The input held no instructions.
    EmptyProgram,
    /// The accumulated program failed validation.
    Program(ProgramError),
    /// Reading the input failed.
    Io(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDirective(d) => write!(f, "duplicate {d} directive"),
            Self::SideSetAfterCode => {
                write!(f, ".side_set must appear before the first instruction")
            }
            Self::InvalidIdentifier(msg) => write!(f, "invalid program name: {msg}"),
            Self::MissingArgument(d) => write!(f, "missing argument for {d}"),
            Self::UnexpectedArgument(a) => write!(f, "unexpected argument: {a}"),
            Self::InvalidNumber(v) => write!(f, "invalid decimal number: {v}"),
            Self::OutOfRange { what, value, range } => {
                write!(f, "{what} value {value} out of range {range}")
            }
            Self::UnknownSideSetFlag(flag) => {
                write!(f, "unknown .side_set flag: {flag} (expected opt or pindirs)")
            }
            Self::TooManySideSetFlags => write!(f, "too many .side_set flags"),
            Self::InvalidInstruction(v) => write!(f, "invalid instruction word: {v}"),
            Self::InstructionOutOfRange(v) => {
                write!(f, "instruction word {v} exceeds 0xffff")
            }
            Self::TooManyInstructions => {
                write!(f, "program too large: more than 32 instructions")
            }
            Self::EmptyProgram => write!(f, "empty program"),
            Self::Program(e) => write!(f, "{e}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

/// Failure to load a program from disk.
#[derive(Debug)]
pub enum LoadError {
    /// The file could not be read.
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file contents did not parse.
    Parse(ParseError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "{}: error: I/O error: {source}", path.display())
            }
            Self::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<ParseError> for LoadError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_without_caret() {
        let error = ParseError::new("blink.pio", 7, ParseErrorKind::EmptyProgram);
        assert_eq!(error.to_string(), "blink.pio:7: error: empty program");
    }

    #[test]
    fn format_with_caret() {
        let error = ParseError::new(
            "blink.pio",
            1,
            ParseErrorKind::InvalidIdentifier("unexpected character ' '".into()),
        )
        .with_caret("#.program my blink", 13);
        assert_eq!(
            error.to_string(),
            "blink.pio:1: error: invalid program name: unexpected character ' '\n\
             #.program my blink\n            ^"
        );
    }

    #[test]
    fn caret_follows_tabs() {
        let error = ParseError::new("t", 2, ParseErrorKind::InvalidIdentifier("x".into()))
            .with_caret("#\t.program 9", 12);
        assert!(error.to_string().ends_with("\n \t         ^"));
    }

    #[test]
    fn program_errors_are_chained() {
        use std::error::Error as _;

        let error = ParseError::new("t", 1, ParseErrorKind::Program(ProgramError::Empty));
        assert!(error.source().is_some());
        assert_eq!(error.to_string(), "t:1: error: empty program");
    }

    #[test]
    fn load_error_wraps_parse_error() {
        let parse = ParseError::new("a.pio", 3, ParseErrorKind::TooManyInstructions);
        let load = LoadError::from(parse.clone());
        assert_eq!(load.to_string(), parse.to_string());
    }
}
