use codespan_reporting::diagnostic::{Diagnostic, Label};
use logos::{Filter, Logos};

use crate::source::{BytePos, ByteRange, FileId};

#[derive(Clone, Debug, PartialEq, Logos)]
#[logos(extras = FileId)]
pub enum Token<'source> {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name(&'source str),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| &lex.slice()[1..(lex.slice().len() - 1)])]
    StringLiteral(&'source str),
    #[regex(r"-?[0-9]+")]
    IntLiteral(&'source str),
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+")]
    FloatLiteral(&'source str),

    #[token("attributes")]
    KeywordAttributes,
    #[token("child")]
    KeywordChild,
    #[token("children")]
    KeywordChildren,
    #[token("construct")]
    KeywordConstruct,
    #[token("cycle")]
    KeywordCycle,
    #[token("enum")]
    KeywordEnum,
    #[token("false")]
    KeywordFalse,
    #[token("func")]
    KeywordFunc,
    #[token("info")]
    KeywordInfo,
    #[token("mandatory")]
    KeywordMandatory,
    #[token("node")]
    KeywordNode,
    #[token("nodes")]
    KeywordNodes,
    #[token("nodeset")]
    KeywordNodeset,
    #[token("pass")]
    KeywordPass,
    #[token("passes")]
    KeywordPasses,
    #[token("phase")]
    KeywordPhase,
    #[token("prefix")]
    KeywordPrefix,
    #[token("root")]
    KeywordRoot,
    #[token("subphases")]
    KeywordSubphases,
    #[token("to")]
    KeywordTo,
    #[token("traversal")]
    KeywordTraversal,
    #[token("true")]
    KeywordTrue,
    #[token("values")]
    KeywordValues,

    #[token("!")]
    Bang,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(";")]
    Semicolon,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,

    #[token(r"/*", block_comment)]
    BlockComment(BlockCommentError),

    #[error]
    #[regex(r"\p{Whitespace}", logos::skip)]
    #[regex(r"//[^\n]*", logos::skip)]
    Error,
}

const OPEN: &str = "/*";
const CLOSE: &str = "*/";
const LEN: BytePos = OPEN.len() as BytePos;

fn block_comment<'source>(
    lexer: &mut logos::Lexer<'source, Token<'source>>,
) -> Filter<BlockCommentError> {
    let start = lexer.span().start as BytePos;
    let mut last_close_pos = start;
    let mut pos = start + LEN;

    let mut depth: u32 = 1;
    while let Some(c) = lexer.remainder().chars().next() {
        if lexer.remainder().starts_with(OPEN) {
            pos += LEN;
            lexer.bump(OPEN.len());
            depth += 1;
        } else if lexer.remainder().starts_with(CLOSE) {
            last_close_pos = pos;
            pos += LEN;
            lexer.bump(CLOSE.len());
            depth -= 1;
            if depth == 0 {
                break;
            }
        } else {
            pos += c.len_utf8() as BytePos;
            lexer.bump(c.len_utf8());
        }
    }

    let file_id = lexer.extras;
    match depth {
        0 => Filter::Skip,
        _ => Filter::Emit(BlockCommentError {
            depth,
            first_open: ByteRange::new(file_id, start, start + LEN),
            last_close: (last_close_pos != start)
                .then(|| ByteRange::new(file_id, last_close_pos, last_close_pos + LEN)),
        }),
    }
}

pub type Spanned<Tok, Loc> = (Loc, Tok, Loc);

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    UnclosedBlockComment(BlockCommentError),
    UnexpectedCharacter { range: ByteRange },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockCommentError {
    depth: u32,
    first_open: ByteRange,
    last_close: Option<ByteRange>,
}

impl Error {
    pub fn range(&self) -> ByteRange {
        match self {
            Error::UnexpectedCharacter { range } => *range,
            Error::UnclosedBlockComment(BlockCommentError { first_open, .. }) => *first_open,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        match self {
            Error::UnexpectedCharacter { range } => Diagnostic::error()
                .with_message("unexpected character")
                .with_labels(vec![Label::primary(range.file_id(), *range)]),
            Error::UnclosedBlockComment(BlockCommentError {
                depth,
                first_open,
                last_close,
            }) => {
                let mut labels = vec![Label::primary(first_open.file_id(), *first_open)
                    .with_message(format!("first `{OPEN}`"))];
                if let Some(last_close) = last_close {
                    labels.push(
                        Label::secondary(last_close.file_id(), *last_close)
                            .with_message(format!("last `{CLOSE}`")),
                    );
                }

                Diagnostic::error()
                    .with_message("unclosed block comment")
                    .with_labels(labels)
                    .with_notes(vec![format!("help: {depth} more `{CLOSE}` needed")])
            }
        }
    }
}

pub fn tokens(
    file_id: FileId,
    source: &str,
) -> impl Iterator<Item = Result<Spanned<Token<'_>, BytePos>, Error>> {
    assert!(
        source.len() <= BytePos::MAX as usize,
        "`source` must be less than 4GiB in length"
    );

    Token::lexer_with_extras(source, file_id)
        .spanned()
        .map(move |(token, range)| {
            let start = range.start as BytePos;
            let end = range.end as BytePos;
            match token {
                Token::BlockComment(err) => Err(Error::UnclosedBlockComment(err)),
                Token::Error => Err(Error::UnexpectedCharacter {
                    range: ByteRange::new(file_id, start, end),
                }),
                token => Ok((start, token, end)),
            }
        })
}

impl<'source> Token<'source> {
    pub fn description(&self) -> &'static str {
        match self {
            Token::Name(_) => "name",
            Token::StringLiteral(_) => "string literal",
            Token::IntLiteral(_) => "integer literal",
            Token::FloatLiteral(_) => "float literal",
            Token::KeywordAttributes => "attributes",
            Token::KeywordChild => "child",
            Token::KeywordChildren => "children",
            Token::KeywordConstruct => "construct",
            Token::KeywordCycle => "cycle",
            Token::KeywordEnum => "enum",
            Token::KeywordFalse => "false",
            Token::KeywordFunc => "func",
            Token::KeywordInfo => "info",
            Token::KeywordMandatory => "mandatory",
            Token::KeywordNode => "node",
            Token::KeywordNodes => "nodes",
            Token::KeywordNodeset => "nodeset",
            Token::KeywordPass => "pass",
            Token::KeywordPasses => "passes",
            Token::KeywordPhase => "phase",
            Token::KeywordPrefix => "prefix",
            Token::KeywordRoot => "root",
            Token::KeywordSubphases => "subphases",
            Token::KeywordTo => "to",
            Token::KeywordTraversal => "traversal",
            Token::KeywordTrue => "true",
            Token::KeywordValues => "values",
            Token::Bang => "!",
            Token::Comma => ",",
            Token::Equals => "=",
            Token::Semicolon => ";",
            Token::OpenBrace => "{",
            Token::CloseBrace => "}",
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::BlockComment(_) => "block comment",
            Token::Error => "error",
        }
    }
}

/// Resolve the escape sequences in the contents of a string literal.
pub(crate) fn unescape(contents: &str) -> String {
    let mut output = String::with_capacity(contents.len());
    let mut chars = contents.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some(other) => output.push(other),
            None => output.push('\\'),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Files;

    fn lex(source: &str) -> Vec<Result<Token<'_>, Error>> {
        let mut files = Files::new();
        let file_id = files.add("test", source.to_owned());
        tokens(file_id, source)
            .map(|result| result.map(|(_, token, _)| token))
            .collect()
    }

    #[test]
    fn keywords_and_names() {
        assert_eq!(
            lex("root node Expr;"),
            vec![
                Ok(Token::KeywordRoot),
                Ok(Token::KeywordNode),
                Ok(Token::Name("Expr")),
                Ok(Token::Semicolon),
            ],
        );
    }

    #[test]
    fn keyword_prefixes_are_names() {
        assert_eq!(
            lex("nodesets roots information"),
            vec![
                Ok(Token::Name("nodesets")),
                Ok(Token::Name("roots")),
                Ok(Token::Name("information")),
            ],
        );
    }

    #[test]
    fn field_keywords() {
        assert_eq!(
            lex("nodes nodeset passes"),
            vec![
                Ok(Token::KeywordNodes),
                Ok(Token::KeywordNodeset),
                Ok(Token::KeywordPasses),
            ],
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(unescape(r#"a\"b\\c\nd"#), "a\"b\\c\nd");
    }

    #[test]
    fn literals() {
        assert_eq!(
            lex(r#"-3 42 1.5 "a \" b""#),
            vec![
                Ok(Token::IntLiteral("-3")),
                Ok(Token::IntLiteral("42")),
                Ok(Token::FloatLiteral("1.5")),
                Ok(Token::StringLiteral(r#"a \" b"#)),
            ],
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex("node // trailing\n/* outer /* inner */ */ A"),
            vec![Ok(Token::KeywordNode), Ok(Token::Name("A"))],
        );
    }

    #[test]
    fn unclosed_block_comment() {
        let tokens = lex("node /* /* */");
        assert_eq!(tokens.len(), 2);
        assert!(matches!(tokens[1], Err(Error::UnclosedBlockComment(_))));
    }

    #[test]
    fn unexpected_character() {
        let tokens = lex("node $");
        assert!(matches!(tokens[1], Err(Error::UnexpectedCharacter { .. })));
    }
}
