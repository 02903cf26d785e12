//! Hex-format PIO program texts: parsing, loading and diagnostics.

use tracing_subscriber as _;

/// Parse and load error types with caret diagnostics.
pub mod errors;
pub use errors::{LoadError, ParseError, ParseErrorKind};

/// Line parser for program texts.
pub mod parser;
pub use parser::{parse_program, parse_reader};

/// Program file loading and image rendering.
pub mod source;
pub use source::{load_program, program_image};
