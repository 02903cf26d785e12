//! Line-oriented parser for hex-format PIO programs.
//!
//! The format is what `pioasm -o hex` emits plus a small set of `#`
//! directive lines:
//! ```text
//! #.program blink
//! #.origin -1        ; relocatable
//! #.wrap_target 0
//! #.wrap 1
//! #.side_set 1 opt
//! e081
//! #.word 40961
//! ```
//! Bare lines are hexadecimal instruction words; `.word` takes a decimal
//! value. Unknown directives and `#` lines that are not directives are
//! ignored.

use std::io::BufRead;

use pio_core::layout::MEMORY_SIZE;
use pio_core::Program;
use tracing::debug;

use crate::errors::{ParseError, ParseErrorKind};

/// Largest side-set pin count; one less when the side-set is optional.
const MAX_SIDE_SET: i64 = 5;

/// Parses a complete program text.
///
/// `resource` names the input in diagnostics.
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered; no partial program is
/// produced.
pub fn parse_program(resource: &str, text: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(resource);
    for line in text.lines() {
        parser.line(line)?;
    }
    parser.finish()
}

/// Parses a program from a buffered reader.
///
/// # Errors
///
/// Returns a [`ParseError`] for malformed input or a failed read.
pub fn parse_reader(resource: &str, reader: impl BufRead) -> Result<Program, ParseError> {
    let mut parser = Parser::new(resource);
    for line in reader.lines() {
        let line = line.map_err(|e| {
            ParseError::new(resource, parser.line + 1, ParseErrorKind::Io(e.to_string()))
        })?;
        parser.line(&line)?;
    }
    parser.finish()
}

/// Accumulated parse state.
struct Parser<'a> {
    resource: &'a str,
    line: usize,
    id: Option<String>,
    origin: Option<Option<u8>>,
    wrap: Option<u8>,
    wrap_target: Option<u8>,
    side_set: Option<(u8, bool, bool)>,
    instructions: Vec<u16>,
}

impl<'a> Parser<'a> {
    const fn new(resource: &'a str) -> Self {
        Self {
            resource,
            line: 0,
            id: None,
            origin: None,
            wrap: None,
            wrap_target: None,
            side_set: None,
            instructions: Vec::new(),
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.resource, self.line, kind)
    }

    fn line(&mut self, text: &str) -> Result<(), ParseError> {
        self.line += 1;
        let start = skip_space(text, 0);
        let rest = &text[start..];
        if rest.is_empty() {
            return Ok(());
        }
        if rest.starts_with('#') {
            return self.directive_line(text, skip_space(text, start + 1));
        }
        self.instruction(rest.trim_end())
    }

    /// Handles a `#` line whose content starts at byte `body`.
    fn directive_line(&mut self, text: &str, body: usize) -> Result<(), ParseError> {
        if !text[body..].starts_with('.') {
            return Ok(());
        }
        let end = text[body..].find(';').map_or(text.len(), |at| body + at);
        let directive = text[body..end].trim_end();
        let name_len = directive
            .find(char::is_whitespace)
            .unwrap_or(directive.len());
        let name = &directive[..name_len];
        let args_at = skip_space(text, body + name_len).min(body + directive.len());
        let args = &text[args_at..body + directive.len()];

        match name {
            ".program" => self.program(text, args, args_at),
            ".origin" => {
                if self.origin.is_some() {
                    return Err(self.error(ParseErrorKind::DuplicateDirective(".origin")));
                }
                let origin = self.number(".origin", args, -1..=31)?;
                self.origin = Some(u8::try_from(origin).ok());
                Ok(())
            }
            ".wrap" => {
                if self.wrap.is_some() {
                    return Err(self.error(ParseErrorKind::DuplicateDirective(".wrap")));
                }
                self.wrap = Some(self.address(".wrap", args)?);
                Ok(())
            }
            ".wrap_target" => {
                if self.wrap_target.is_some() {
                    return Err(self.error(ParseErrorKind::DuplicateDirective(".wrap_target")));
                }
                self.wrap_target = Some(self.address(".wrap_target", args)?);
                Ok(())
            }
            ".side_set" => self.side_set(args),
            ".word" => {
                let word = self.number(".word", args, 0..=i64::from(u16::MAX))?;
                let word = u16::try_from(word).map_err(|_| {
                    self.error(ParseErrorKind::InstructionOutOfRange(args.to_string()))
                })?;
                self.push(word)
            }
            other => {
                debug!(
                    resource = self.resource,
                    line = self.line,
                    directive = other,
                    "ignoring unknown directive"
                );
                Ok(())
            }
        }
    }

    fn program(&mut self, text: &str, name: &str, at: usize) -> Result<(), ParseError> {
        if self.id.is_some() {
            return Err(self.error(ParseErrorKind::DuplicateDirective(".program")));
        }
        if let Err((offset, message)) = check_identifier(name) {
            let column = text[..at + offset].chars().count() + 1;
            return Err(self
                .error(ParseErrorKind::InvalidIdentifier(message))
                .with_caret(text, column));
        }
        self.id = Some(name.to_string());
        Ok(())
    }

    fn side_set(&mut self, args: &str) -> Result<(), ParseError> {
        if self.side_set.is_some() {
            return Err(self.error(ParseErrorKind::DuplicateDirective(".side_set")));
        }
        if !self.instructions.is_empty() {
            return Err(self.error(ParseErrorKind::SideSetAfterCode));
        }
        let mut words = args.split_whitespace();
        let count = words
            .next()
            .ok_or_else(|| self.error(ParseErrorKind::MissingArgument(".side_set")))?;
        let count = self.decimal(count)?;
        let (mut optional, mut pindirs) = (false, false);
        for (index, flag) in words.enumerate() {
            if index == 2 {
                return Err(self.error(ParseErrorKind::TooManySideSetFlags));
            }
            match flag {
                "opt" => optional = true,
                "pindirs" => pindirs = true,
                other => {
                    return Err(self.error(ParseErrorKind::UnknownSideSetFlag(other.to_string())))
                }
            }
        }
        let max = if optional { MAX_SIDE_SET - 1 } else { MAX_SIDE_SET };
        let count = self.in_range(".side_set", count, 0..=max)?;
        self.side_set = Some((count, optional, pindirs));
        Ok(())
    }

    fn instruction(&mut self, word: &str) -> Result<(), ParseError> {
        let digits = word
            .strip_prefix("0x")
            .or_else(|| word.strip_prefix("0X"))
            .unwrap_or(word);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.error(ParseErrorKind::InvalidInstruction(word.to_string())));
        }
        let value = u16::from_str_radix(digits, 16)
            .map_err(|_| self.error(ParseErrorKind::InstructionOutOfRange(word.to_string())))?;
        self.push(value)
    }

    fn push(&mut self, word: u16) -> Result<(), ParseError> {
        if self.instructions.len() == usize::from(MEMORY_SIZE) {
            return Err(self.error(ParseErrorKind::TooManyInstructions));
        }
        self.instructions.push(word);
        Ok(())
    }

    fn decimal(&self, text: &str) -> Result<i64, ParseError> {
        text.parse()
            .map_err(|_| self.error(ParseErrorKind::InvalidNumber(text.to_string())))
    }

    /// Parses the single decimal argument of `directive`.
    fn number(
        &self,
        directive: &'static str,
        args: &str,
        range: std::ops::RangeInclusive<i64>,
    ) -> Result<i64, ParseError> {
        let mut words = args.split_whitespace();
        let value = words
            .next()
            .ok_or_else(|| self.error(ParseErrorKind::MissingArgument(directive)))?;
        if let Some(extra) = words.next() {
            return Err(self.error(ParseErrorKind::UnexpectedArgument(extra.to_string())));
        }
        let value = self.decimal(value)?;
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(self.error(ParseErrorKind::OutOfRange {
                what: directive,
                value,
                range: range_label(&range),
            }))
        }
    }

    fn address(&self, directive: &'static str, args: &str) -> Result<u8, ParseError> {
        let value = self.number(directive, args, 0..=31)?;
        self.in_range(directive, value, 0..=31)
    }

    fn in_range(
        &self,
        what: &'static str,
        value: i64,
        range: std::ops::RangeInclusive<i64>,
    ) -> Result<u8, ParseError> {
        u8::try_from(value)
            .ok()
            .filter(|_| range.contains(&value))
            .ok_or_else(|| {
                self.error(ParseErrorKind::OutOfRange {
                    what,
                    value,
                    range: range_label(&range),
                })
            })
    }

    fn finish(self) -> Result<Program, ParseError> {
        if self.instructions.is_empty() {
            return Err(self.error(ParseErrorKind::EmptyProgram));
        }
        let mut builder = Program::builder()
            .origin(self.origin.flatten())
            .instructions(self.instructions.iter().copied());
        if let Some(id) = &self.id {
            builder = builder.id(id.as_str());
        }
        if let Some(wrap) = self.wrap {
            builder = builder.wrap(wrap);
        }
        if let Some(target) = self.wrap_target {
            builder = builder.wrap_target(target);
        }
        if let Some((count, optional, pindirs)) = self.side_set {
            builder = builder.side_set(count, optional, pindirs);
        }
        builder
            .build()
            .map_err(|e| self.error(ParseErrorKind::Program(e)))
    }
}

/// Byte position of the first non-whitespace character at or after `at`.
fn skip_space(text: &str, at: usize) -> usize {
    let rest = &text[at..];
    at + rest.len() - rest.trim_start().len()
}

/// Checks `[A-Za-z_][A-Za-z0-9_]*`, returning the byte offset and a
/// description of the first offending character.
fn check_identifier(name: &str) -> Result<(), (usize, String)> {
    let mut chars = name.char_indices();
    match chars.next() {
        None => return Err((0, "missing name".to_string())),
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        Some((at, c)) => {
            return Err((at, format!("name must start with a letter or '_', found {c:?}")))
        }
    }
    match chars.find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_')) {
        Some((at, c)) => Err((at, format!("unexpected character {c:?}"))),
        None => Ok(()),
    }
}

const fn range_label(range: &std::ops::RangeInclusive<i64>) -> &'static str {
    match (*range.start(), *range.end()) {
        (-1, 31) => "-1..=31",
        (0, 31) => "0..=31",
        (0, 4) => "0..=4",
        (0, 5) => "0..=5",
        _ => "0..=65535",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kind_of(text: &str) -> ParseErrorKind {
        parse_program("test.pio", text).unwrap_err().kind
    }

    #[test]
    fn parses_directives_and_words() {
        let program = parse_program(
            "test.pio",
            "#.program p\n#.origin 5\n#.wrap 10\n#.wrap_target 6\n#.side_set 2 opt\n\
             e081\na042\n0000\n",
        )
        .unwrap();
        assert_eq!(program.id(), Some("p"));
        assert_eq!(program.origin(), Some(5));
        assert_eq!(program.wrap(), 10);
        assert_eq!(program.wrap_target(), 6);
        assert_eq!(program.side_set().count, 2);
        assert!(program.side_set().optional);
        assert!(!program.side_set().pindirs);
        assert_eq!(program.instructions(), &[0xe081, 0xa042, 0x0000]);
        assert_eq!(program.allocation_mask(), 0b111_u32.rotate_left(5));
    }

    #[test]
    fn defaults_follow_the_program_shape() {
        let relocatable = parse_program("t", "1\n2\n3\n").unwrap();
        assert_eq!(relocatable.id(), None);
        assert!(relocatable.is_relocatable());
        assert_eq!((relocatable.wrap_target(), relocatable.wrap()), (0, 2));

        let fixed = parse_program("t", "#.origin 30\n1\n2\n3\n").unwrap();
        assert_eq!((fixed.wrap_target(), fixed.wrap()), (30, 0));

        let minus_one = parse_program("t", "#.origin -1\n1\n").unwrap();
        assert!(minus_one.is_relocatable());
    }

    #[test]
    fn comments_and_unknown_directives_are_ignored() {
        let program = parse_program(
            "t",
            "\n# plain comment\n#; also a comment\n#.lang_opt python foo = 1\n\
             #.wrap 0 ; trailing note\n  e001  \n",
        )
        .unwrap();
        assert_eq!(program.instructions(), &[0xe001]);
        assert_eq!(program.wrap(), 0);
    }

    #[test]
    fn word_directive_is_decimal_code() {
        let program = parse_program("t", "#.word 40961\n#.word 0\nffff\n").unwrap();
        assert_eq!(program.instructions(), &[0xa001, 0x0000, 0xffff]);
        assert_eq!(
            kind_of("#.word 1\n#.side_set 1\n"),
            ParseErrorKind::SideSetAfterCode
        );
    }

    #[rstest]
    #[case::side_set_after_code("a042\n#.side_set 1\n", ParseErrorKind::SideSetAfterCode)]
    #[case::program_twice(
        "#.program a\n#.program b\n1\n",
        ParseErrorKind::DuplicateDirective(".program")
    )]
    #[case::origin_twice("#.origin 1\n#.origin 1\n1\n", ParseErrorKind::DuplicateDirective(".origin"))]
    #[case::wrap_twice("#.wrap 1\n#.wrap 1\n1\n", ParseErrorKind::DuplicateDirective(".wrap"))]
    #[case::word_too_large("10000\n", ParseErrorKind::InstructionOutOfRange("10000".into()))]
    #[case::not_hex("mov x, y\n", ParseErrorKind::InvalidInstruction("mov x, y".into()))]
    #[case::empty("#.program nothing\n", ParseErrorKind::EmptyProgram)]
    #[case::origin_range(
        "#.origin 32\n1\n",
        ParseErrorKind::OutOfRange { what: ".origin", value: 32, range: "-1..=31" }
    )]
    #[case::wrap_target_range(
        "#.wrap_target -1\n1\n",
        ParseErrorKind::OutOfRange { what: ".wrap_target", value: -1, range: "0..=31" }
    )]
    #[case::side_set_range(
        "#.side_set 6\n1\n",
        ParseErrorKind::OutOfRange { what: ".side_set", value: 6, range: "0..=5" }
    )]
    #[case::side_set_opt_range(
        "#.side_set 5 opt\n1\n",
        ParseErrorKind::OutOfRange { what: ".side_set", value: 5, range: "0..=4" }
    )]
    #[case::side_set_flags("#.side_set 1 opt pindirs opt\n1\n", ParseErrorKind::TooManySideSetFlags)]
    #[case::side_set_flag("#.side_set 1 pins\n1\n", ParseErrorKind::UnknownSideSetFlag("pins".into()))]
    #[case::missing_arg("#.wrap\n1\n", ParseErrorKind::MissingArgument(".wrap"))]
    #[case::extra_arg("#.wrap 1 2\n1\n", ParseErrorKind::UnexpectedArgument("2".into()))]
    #[case::bad_number("#.origin five\n1\n", ParseErrorKind::InvalidNumber("five".into()))]
    #[case::word_range(
        "#.word 65536\n",
        ParseErrorKind::OutOfRange { what: ".word", value: 65536, range: "0..=65535" }
    )]
    fn rejects(#[case] text: &str, #[case] expected: ParseErrorKind) {
        assert_eq!(kind_of(text), expected);
    }

    #[test]
    fn rejects_a_33rd_instruction() {
        let text = "a042\n".repeat(33);
        let error = parse_program("big.pio", &text).unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::TooManyInstructions);
        assert_eq!(error.line, 33);
        assert!(parse_program("ok.pio", &"a042\n".repeat(32)).is_ok());
    }

    #[rstest]
    #[case("#.program my prog", 13, "unexpected character ' '")]
    #[case("#.program 9lives", 11, "name must start with a letter or '_', found '9'")]
    #[case("  #  .program\tok-ish", 17, "unexpected character '-'")]
    fn identifier_errors_point_at_the_column(
        #[case] line: &str,
        #[case] column: usize,
        #[case] message: &str,
    ) {
        let error = parse_program("t.pio", &format!("{line}\n1\n")).unwrap_err();
        assert_eq!(error.line, 1);
        assert_eq!(error.column, Some(column));
        assert_eq!(error.source_line.as_deref(), Some(line));
        assert_eq!(error.kind, ParseErrorKind::InvalidIdentifier(message.into()));
    }

    #[test]
    fn missing_program_name_is_reported() {
        let error = parse_program("t", "#.program\n1\n").unwrap_err();
        assert_eq!(
            error.kind,
            ParseErrorKind::InvalidIdentifier("missing name".into())
        );
        assert_eq!(error.column, Some(10));
    }

    #[test]
    fn errors_carry_resource_and_line() {
        let error = parse_program("blink.pio", "#.program blink\ne081\n\nzz\n").unwrap_err();
        assert_eq!(error.resource, "blink.pio");
        assert_eq!(error.line, 4);
        assert_eq!(
            error.to_string(),
            "blink.pio:4: error: invalid instruction word: zz"
        );
    }

    #[test]
    fn reader_matches_string_parsing() {
        let text = "#.program r\n#.origin 3\ne081\n0x6060\n";
        let from_reader = parse_reader("r.pio", text.as_bytes()).unwrap();
        assert_eq!(from_reader, parse_program("r.pio", text).unwrap());
        assert_eq!(from_reader.instructions(), &[0xe081, 0x6060]);
    }
}
