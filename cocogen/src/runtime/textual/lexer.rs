use logos::Logos;

use crate::runtime::textual::Message;
use crate::source::{BytePos, ByteRange, FileId};
use crate::surface::lexer::Spanned;

#[derive(Clone, Debug, PartialEq, Logos)]
pub enum Token<'source> {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name(&'source str),
    #[regex(r"%[0-9]+", |lex| &lex.slice()[1..])]
    Id(&'source str),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| &lex.slice()[1..(lex.slice().len() - 1)])]
    StringLiteral(&'source str),
    #[regex(r"-?[0-9]+")]
    IntLiteral(&'source str),
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+")]
    FloatLiteral(&'source str),
    #[token("-inf")]
    NegativeInfinity,

    #[token("root")]
    KeywordRoot,
    #[token("children")]
    KeywordChildren,
    #[token("attributes")]
    KeywordAttributes,
    #[token("true")]
    KeywordTrue,
    #[token("false")]
    KeywordFalse,

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

    #[error]
    #[regex(r"\p{Whitespace}", logos::skip)]
    #[regex(r"//[^\n]*", logos::skip)]
    Error,
}

impl<'source> Token<'source> {
    pub fn description(&self) -> &'static str {
        match self {
            Token::Name(_) => "name",
            Token::Id(_) => "node id",
            Token::StringLiteral(_) => "string literal",
            Token::IntLiteral(_) => "integer literal",
            Token::FloatLiteral(_) | Token::NegativeInfinity => "float literal",
            Token::KeywordRoot => "root",
            Token::KeywordChildren => "children",
            Token::KeywordAttributes => "attributes",
            Token::KeywordTrue => "true",
            Token::KeywordFalse => "false",
            Token::Comma => ",",
            Token::Equals => "=",
            Token::Semicolon => ";",
            Token::OpenBrace => "{",
            Token::CloseBrace => "}",
            Token::Error => "error",
        }
    }
}

pub fn tokens(
    file_id: FileId,
    source: &str,
) -> impl Iterator<Item = Result<Spanned<Token<'_>, BytePos>, Message>> {
    Token::lexer(source).spanned().map(move |(token, range)| {
        let start = range.start as BytePos;
        let end = range.end as BytePos;
        match token {
            Token::Error => Err(Message::UnexpectedCharacter {
                range: ByteRange::new(file_id, start, end),
            }),
            token => Ok((start, token, end)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Files;

    fn lex(source: &str) -> Vec<Token<'_>> {
        let mut files = Files::new();
        let file_id = files.add("test.txt", source.to_owned());
        tokens(file_id, source).filter_map(Result::ok).map(|(_, token, _)| token).collect()
    }

    #[test]
    fn ids_and_infinities() {
        assert_eq!(
            lex("Leaf %12 -inf -3"),
            vec![
                Token::Name("Leaf"),
                Token::Id("12"),
                Token::NegativeInfinity,
                Token::IntLiteral("-3"),
            ],
        );
    }
}
