//! Syntax error messages for configuration files.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use itertools::Itertools;
use lalrpop_util::{ErrorRecovery, ParseError};

use crate::source::{BytePos, ByteRange, FileId};
use crate::surface::lexer::{self, Token};

/// Syntax error messages.
#[derive(Debug, Clone)]
pub enum Message {
    Lexer(lexer::Error),
    UnexpectedToken {
        range: ByteRange,
        found: &'static str,
        expected: Vec<String>,
    },
    UnexpectedEndOfFile {
        range: ByteRange,
        expected: Vec<String>,
    },
    ExtraToken {
        range: ByteRange,
        found: &'static str,
    },
    UnexpectedModifier {
        range: ByteRange,
        modifier: &'static str,
        item: &'static str,
    },
    InvalidLiteral {
        range: ByteRange,
        message: String,
    },
    DuplicateField {
        range: ByteRange,
        previous_range: ByteRange,
        field: &'static str,
    },
    MissingField {
        range: ByteRange,
        item: &'static str,
        field: &'static str,
    },
    ConflictingPhaseBody {
        range: ByteRange,
        name: String,
    },
}

impl Message {
    pub fn from_lalrpop(
        file_id: FileId,
        error: ParseError<BytePos, Token<'_>, lexer::Error>,
    ) -> Message {
        match error {
            ParseError::InvalidToken { location } => {
                Message::Lexer(lexer::Error::UnexpectedCharacter {
                    range: ByteRange::new(file_id, location, location),
                })
            }
            ParseError::UnrecognizedEOF { location, expected } => Message::UnexpectedEndOfFile {
                range: ByteRange::new(file_id, location, location),
                expected,
            },
            ParseError::UnrecognizedToken {
                token: (start, token, end),
                expected,
            } => Message::UnexpectedToken {
                range: ByteRange::new(file_id, start, end),
                found: token.description(),
                expected,
            },
            ParseError::ExtraToken {
                token: (start, token, end),
            } => Message::ExtraToken {
                range: ByteRange::new(file_id, start, end),
                found: token.description(),
            },
            ParseError::User { error } => Message::Lexer(error),
        }
    }

    pub(crate) fn from_recovery(
        file_id: FileId,
        recovery: ErrorRecovery<BytePos, Token<'_>, lexer::Error>,
    ) -> Message {
        Message::from_lalrpop(file_id, recovery.error)
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let primary_label = |range: &ByteRange| Label::primary(range.file_id(), *range);
        let secondary_label = |range: &ByteRange| Label::secondary(range.file_id(), *range);

        match self {
            Message::Lexer(error) => error.to_diagnostic(),
            Message::UnexpectedToken {
                range,
                found,
                expected,
            } => Diagnostic::error()
                .with_message(format!("unexpected token `{found}`"))
                .with_labels(vec![primary_label(range).with_message("unexpected token")])
                .with_notes(format_expected(expected).into_iter().collect()),
            Message::UnexpectedEndOfFile { range, expected } => Diagnostic::error()
                .with_message("unexpected end of file")
                .with_labels(vec![primary_label(range).with_message("unexpected end of file")])
                .with_notes(format_expected(expected).into_iter().collect()),
            Message::ExtraToken { range, found } => Diagnostic::error()
                .with_message(format!("extra token `{found}`"))
                .with_labels(vec![primary_label(range).with_message("extra token")]),
            Message::UnexpectedModifier {
                range,
                modifier,
                item,
            } => Diagnostic::error()
                .with_message(format!("`{modifier}` is not allowed on {item} declarations"))
                .with_labels(vec![primary_label(range).with_message("unexpected modifier")]),
            Message::InvalidLiteral { range, message } => Diagnostic::error()
                .with_message("invalid literal")
                .with_labels(vec![primary_label(range).with_message(message)]),
            Message::DuplicateField {
                range,
                previous_range,
                field,
            } => Diagnostic::error()
                .with_message(format!("duplicate `{field}` field"))
                .with_labels(vec![
                    primary_label(range).with_message("duplicate field"),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::MissingField { range, item, field } => Diagnostic::error()
                .with_message(format!("{item} is missing a `{field}` field"))
                .with_labels(vec![primary_label(range).with_message(format!("in this {item}"))]),
            Message::ConflictingPhaseBody { range, name } => Diagnostic::error()
                .with_message(format!(
                    "phase `{name}` declares both `subphases` and `passes`"
                ))
                .with_labels(vec![primary_label(range)]),
        }
    }
}

/// Format the terminals an LR parser expected, as `expected one of ...`.
///
/// Terminals are declared with quoted names in the grammars, which are
/// stripped here.
pub(crate) fn format_expected(expected: &[String]) -> Option<String> {
    let terminal = |name: &String| name.trim_matches('"').to_owned();

    match expected {
        [] => None,
        [single] => Some(format!("expected `{}`", terminal(single))),
        [init @ .., last] => Some(format!(
            "expected one of {} or `{}`",
            init.iter().format_with(", ", |e, f| f(&format_args!("`{}`", terminal(e)))),
            terminal(last),
        )),
    }
}
