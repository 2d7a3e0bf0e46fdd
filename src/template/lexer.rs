//! Lexer for expressions and tag bodies using logos

use logos::Logos;

use crate::error::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Tag keywords
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("for")]
    For,
    #[token("endfor")]
    EndFor,
    #[token("set")]
    Set,

    // Word operators
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("is")]
    Is,

    // Constants
    #[token("true")]
    #[token("True")]
    True,
    #[token("false")]
    #[token("False")]
    False,
    #[token("none")]
    #[token("None")]
    Null,

    // Comparison operators (longer first)
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessOrEqual,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    SlashSlash,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("~")]
    Tilde,

    // Delimiters
    #[token("|")]
    Pipe,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),
}

/// Strip the quotes and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Lex `input`, dropping characters that do not form a token. Spans are
/// shifted by `offset` so they point into the enclosing template.
pub fn lex(input: &str, offset: usize) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .filter_map(move |(tok, span)| tok.ok().map(|t| (t, span.start + offset..span.end + offset)))
}

/// Lex `input`, failing on the first character that does not form a token
pub fn lex_strict(input: &str, offset: usize) -> Result<Vec<(Token, Span)>, Span> {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| {
            let span = span.start + offset..span.end + offset;
            match tok {
                Ok(t) => Ok((t, span)),
                Err(()) => Err(span),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input, 0).map(|(t, _)| t).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("for tool in tools"),
            vec![
                Token::For,
                Token::Ident("tool".to_string()),
                Token::In,
                Token::Ident("tools".to_string()),
            ]
        );
        // Longest match: keywords embedded in names stay identifiers
        assert_eq!(tokens("index"), vec![Token::Ident("index".to_string())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 3.14 -10"),
            vec![Token::Int(42), Token::Float(3.14), Token::Minus, Token::Int(10)]
        );
    }

    #[test]
    fn test_string_quotes_and_escapes() {
        assert_eq!(
            tokens(r#""G0 \"X\"" 'it\'s'"#),
            vec![
                Token::String("G0 \"X\"".to_string()),
                Token::String("it's".to_string()),
            ]
        );
    }

    #[test]
    fn test_operators_prefer_longest() {
        assert_eq!(
            tokens("a // b / c == d = e"),
            vec![
                Token::Ident("a".to_string()),
                Token::SlashSlash,
                Token::Ident("b".to_string()),
                Token::Slash,
                Token::Ident("c".to_string()),
                Token::EqEq,
                Token::Ident("d".to_string()),
                Token::Assign,
                Token::Ident("e".to_string()),
            ]
        );
    }

    #[test]
    fn test_spans_are_offset() {
        let spanned: Vec<_> = lex("x", 10).collect();
        assert_eq!(spanned[0].1, 10..11);
    }

    #[test]
    fn test_strict_lexing_reports_bad_character() {
        assert_eq!(lex_strict("a $ b", 5).unwrap_err(), 7..8);
        assert_eq!(tokens("a $ b").len(), 2);
    }
}
