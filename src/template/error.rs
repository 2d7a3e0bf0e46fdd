//! Errors raised while parsing or evaluating a template

use std::path::Path;

use chumsky::error::{Rich, RichPattern, RichReason};
use thiserror::Error;

use crate::error::{CoreError, Span};

use super::lexer::Token;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("syntax error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    #[error("undefined variable '{name}'")]
    Undefined {
        name: String,
        span: Span,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Evaluation { message: String, span: Span },
}

impl TemplateError {
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn evaluation(span: Span, message: impl Into<String>) -> Self {
        TemplateError::Evaluation {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            TemplateError::Syntax { span, .. }
            | TemplateError::Undefined { span, .. }
            | TemplateError::Evaluation { span, .. } => span,
        }
    }

    /// Attach the template identity. Syntax errors keep their span so the
    /// caller can print an annotated report.
    pub fn into_core(self, template: &str, path: &Path) -> CoreError {
        match self {
            TemplateError::Syntax {
                span,
                message,
                expected,
            } => {
                let reason = if expected.is_empty() {
                    message
                } else {
                    format!("{} (expected {})", message, expected.join(", "))
                };
                CoreError::MalformedDocument {
                    path: path.to_path_buf(),
                    reason,
                    span: Some(span),
                }
            }
            TemplateError::Undefined {
                name, suggestions, ..
            } => CoreError::UndefinedReference {
                template: template.to_string(),
                name,
                suggestions,
            },
            TemplateError::Evaluation { message, .. } => CoreError::Evaluation {
                template: template.to_string(),
                message,
            },
        }
    }
}

impl<'a> From<Rich<'a, Token>> for TemplateError {
    fn from(err: Rich<'a, Token>) -> Self {
        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of expression".to_string(),
                };
                format!("unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let mut expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of expression".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();
        expected.sort();
        expected.dedup();

        TemplateError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Human-readable token description for error messages
pub(crate) fn format_token(tok: &Token) -> String {
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::If => "keyword 'if'".to_string(),
        Token::Elif => "keyword 'elif'".to_string(),
        Token::Else => "keyword 'else'".to_string(),
        Token::EndIf => "keyword 'endif'".to_string(),
        Token::For => "keyword 'for'".to_string(),
        Token::EndFor => "keyword 'endfor'".to_string(),
        Token::Set => "keyword 'set'".to_string(),
        Token::And => "'and'".to_string(),
        Token::Or => "'or'".to_string(),
        Token::Not => "'not'".to_string(),
        Token::In => "'in'".to_string(),
        Token::Is => "'is'".to_string(),
        Token::True => "'true'".to_string(),
        Token::False => "'false'".to_string(),
        Token::Null => "'none'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::NotEq => "'!='".to_string(),
        Token::LessOrEqual => "'<='".to_string(),
        Token::GreaterOrEqual => "'>='".to_string(),
        Token::Less => "'<'".to_string(),
        Token::Greater => "'>'".to_string(),
        Token::Assign => "'='".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::SlashSlash => "'//'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::Tilde => "'~'".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Comma => "','".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_becomes_malformed_with_span() {
        let err = TemplateError::Syntax {
            span: 4..6,
            message: "unexpected ')'".to_string(),
            expected: vec!["identifier".to_string()],
        };
        match err.into_core("main", Path::new("main.nc.j2")) {
            CoreError::MalformedDocument { reason, span, .. } => {
                assert_eq!(reason, "unexpected ')' (expected identifier)");
                assert_eq!(span, Some(4..6));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_undefined_keeps_suggestions() {
        let err = TemplateError::Undefined {
            name: "fed".to_string(),
            span: 0..3,
            suggestions: vec!["feed".to_string()],
        };
        assert!(matches!(
            err.into_core("main", Path::new("main.nc.j2")),
            CoreError::UndefinedReference { ref suggestions, .. } if suggestions == &["feed".to_string()]
        ));
    }
}
