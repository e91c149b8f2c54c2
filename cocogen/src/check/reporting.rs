use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::source::{ByteRange, FileId};

/// Validation diagnostic messages.
#[derive(Debug, Clone)]
pub enum Message {
    /// A name was declared more than once, in any category.
    Redefinition {
        range: ByteRange,
        previous_range: ByteRange,
        name: String,
    },
    RedefinedPrefix {
        range: ByteRange,
        previous_range: ByteRange,
        prefix: String,
    },
    ReservedPrefix {
        range: ByteRange,
        prefix: String,
    },
    DuplicateRoot {
        range: ByteRange,
        previous_range: ByteRange,
        what: &'static str,
    },
    MissingRoot {
        what: &'static str,
    },
    DuplicateMember {
        range: ByteRange,
        previous_range: ByteRange,
        what: &'static str,
        name: String,
    },
    UnknownName {
        range: ByteRange,
        name: String,
        expected: String,
        suggestion: Option<String>,
    },
    /// The name refers to an entity of the wrong category.
    MismatchedKind {
        range: ByteRange,
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    RootChild {
        range: ByteRange,
        child: String,
        r#type: String,
    },
    NestedNodeset {
        range: ByteRange,
        name: String,
    },
    RootInNodeset {
        range: ByteRange,
        name: String,
    },
    EmptyNodeset {
        range: ByteRange,
        name: String,
    },
    EmptyEnum {
        range: ByteRange,
        name: String,
    },
    UsedBeforeDeclaration {
        range: ByteRange,
        declaration_range: ByteRange,
        name: String,
    },
    UnreachablePhase {
        range: ByteRange,
        root_range: ByteRange,
        name: String,
    },
    InvertedPhaseRange {
        range: ByteRange,
        first: String,
        last: String,
    },
    MismatchedDefault {
        range: ByteRange,
        expected: String,
    },
    DefaultOutOfRange {
        range: ByteRange,
        r#type: &'static str,
    },
    LinkDefault {
        range: ByteRange,
        name: String,
    },
}

impl Message {
    pub fn is_error(&self) -> bool {
        !matches!(self, Message::UnreachablePhase { .. })
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let primary_label = |range: &ByteRange| Label::primary(range.file_id(), *range);
        let secondary_label = |range: &ByteRange| Label::secondary(range.file_id(), *range);

        match self {
            Message::Redefinition {
                range,
                previous_range,
                name,
            } => Diagnostic::error()
                .with_message(format!("redefinition of name `{name}`"))
                .with_labels(vec![
                    primary_label(range).with_message("redefined here"),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::RedefinedPrefix {
                range,
                previous_range,
                prefix,
            } => Diagnostic::error()
                .with_message(format!("redefinition of enum prefix `{prefix}`"))
                .with_labels(vec![
                    primary_label(range).with_message("redefined here"),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::ReservedPrefix { range, prefix } => Diagnostic::error()
                .with_message(format!("enum prefix `{prefix}` is reserved"))
                .with_labels(vec![primary_label(range).with_message("reserved prefix")])
                .with_notes(vec![
                    "the prefixes `NS`, `NT` and `TRAV` are used by generated code".to_owned(),
                ]),
            Message::DuplicateRoot {
                range,
                previous_range,
                what,
            } => Diagnostic::error()
                .with_message(format!("multiple root {what}s declared"))
                .with_labels(vec![
                    primary_label(range).with_message(format!("second root {what}")),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::MissingRoot { what } => {
                Diagnostic::error().with_message(format!("no root {what} specified"))
            }
            Message::DuplicateMember {
                range,
                previous_range,
                what,
                name,
            } => Diagnostic::error()
                .with_message(format!("duplicate {what} `{name}`"))
                .with_labels(vec![
                    primary_label(range).with_message("duplicate"),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::UnknownName {
                range,
                name,
                expected,
                suggestion,
            } => Diagnostic::error()
                .with_message(format!("cannot find {expected} `{name}`"))
                .with_labels(vec![primary_label(range).with_message(format!("unknown {expected}"))])
                .with_notes(
                    suggestion
                        .iter()
                        .map(|suggestion| format!("help: did you mean `{suggestion}`?"))
                        .collect(),
                ),
            Message::MismatchedKind {
                range,
                name,
                expected,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected {expected}, found {found} `{name}`"))
                .with_labels(vec![
                    primary_label(range).with_message(format!("expected {expected}"))
                ]),
            Message::RootChild {
                range,
                child,
                r#type,
            } => Diagnostic::error()
                .with_message(format!("child `{child}` cannot have the root type `{}`", r#type))
                .with_labels(vec![primary_label(range).with_message("root type")]),
            Message::NestedNodeset { range, name } => Diagnostic::error()
                .with_message(format!("nodeset `{name}` cannot be a member of another nodeset"))
                .with_labels(vec![primary_label(range).with_message("nested nodeset")]),
            Message::RootInNodeset { range, name } => Diagnostic::error()
                .with_message(format!("root node `{name}` cannot be a member of a nodeset"))
                .with_labels(vec![primary_label(range).with_message("root node")]),
            Message::EmptyNodeset { range, name } => Diagnostic::error()
                .with_message(format!("nodeset `{name}` has no members"))
                .with_labels(vec![primary_label(range)]),
            Message::EmptyEnum { range, name } => Diagnostic::error()
                .with_message(format!("enum `{name}` has no values"))
                .with_labels(vec![primary_label(range)]),
            Message::UsedBeforeDeclaration {
                range,
                declaration_range,
                name,
            } => Diagnostic::error()
                .with_message(format!("phase `{name}` is used before its declaration"))
                .with_labels(vec![
                    primary_label(range).with_message("used here"),
                    secondary_label(declaration_range).with_message("declared here"),
                ])
                .with_notes(vec![
                    "subphases must be declared before the phases that use them".to_owned(),
                ]),
            Message::UnreachablePhase {
                range,
                root_range,
                name,
            } => Diagnostic::warning()
                .with_message(format!("phase `{name}` is unreachable"))
                .with_labels(vec![
                    primary_label(range).with_message("declared after the root phase"),
                    secondary_label(root_range).with_message("root phase declared here"),
                ]),
            Message::InvertedPhaseRange { range, first, last } => Diagnostic::error()
                .with_message(format!("inverted phase range `{first} to {last}`"))
                .with_labels(vec![primary_label(range)])
                .with_notes(vec![format!("phase `{last}` is declared before `{first}`")]),
            Message::MismatchedDefault { range, expected } => Diagnostic::error()
                .with_message("mismatched default value")
                .with_labels(vec![
                    primary_label(range).with_message(format!("expected {expected}"))
                ]),
            Message::DefaultOutOfRange { range, r#type } => Diagnostic::error()
                .with_message(format!("default value out of range for `{}`", r#type))
                .with_labels(vec![primary_label(range)]),
            Message::LinkDefault { range, name } => Diagnostic::error()
                .with_message(format!("link attribute `{name}` cannot have a default value"))
                .with_labels(vec![primary_label(range)]),
        }
    }
}
