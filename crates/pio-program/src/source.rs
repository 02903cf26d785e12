//! Loading program files and rendering instruction images.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use pio_core::Program;
use tracing::debug;

use crate::errors::LoadError;
use crate::parser::parse_reader;

/// Reads and parses the program file at `path`.
///
/// Diagnostics name the file by its path as given.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when the file cannot be opened and
/// [`LoadError::Parse`] when its contents are malformed.
pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let resource = path.to_string_lossy();
    let program = parse_reader(&resource, BufReader::new(file))?;
    debug!(
        path = %path.display(),
        instructions = program.len(),
        origin = ?program.origin(),
        "loaded program"
    );
    Ok(program)
}

/// Instruction words as little-endian bytes, in slot order.
#[must_use]
pub fn program_image(program: &Program) -> Vec<u8> {
    program
        .instructions()
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blink.pio");
        fs::write(&path, "#.program blink\n#.wrap_target 0\ne081\n#.wrap 1\na042\n").unwrap();

        let program = load_program(&path).unwrap();
        assert_eq!(program.id(), Some("blink"));
        assert_eq!(program.instructions(), &[0xe081, 0xa042]);
        assert_eq!(program_image(&program), vec![0x81, 0xe0, 0x42, 0xa0]);
    }

    #[test]
    fn parse_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pio");
        fs::write(&path, "e081\nxyz\n").unwrap();

        let error = load_program(&path).unwrap_err();
        let LoadError::Parse(parse) = &error else {
            panic!("expected a parse error, got {error:?}");
        };
        assert_eq!(parse.line, 2);
        assert!(error.to_string().starts_with(&format!("{}:2: error:", path.display())));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_program(&dir.path().join("absent.pio")).unwrap_err();
        assert!(matches!(error, LoadError::Io { .. }));
        assert!(error.to_string().contains("absent.pio: error: I/O error"));
    }
}
