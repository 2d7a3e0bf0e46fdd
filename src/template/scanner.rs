//! Static scan for the variables a template body appears to use
//!
//! The scan never fails and never evaluates anything. It tokenizes the inside
//! of every `{{ }}` and `{% %}` tag and keeps identifiers in value position,
//! so a broken template still yields whatever names could be recognized.

use std::collections::{BTreeSet, HashSet};

use super::grammar::{find_close, next_open, Delimiter};
use super::lexer::{lex, Token};

/// Top-level variable names referenced by `source`
///
/// Attribute names, filter and test names, function names, keyword argument
/// names, and names bound by `for`/`set` are not reported.
///
/// ```
/// use nc_forge::template::scan_variables;
///
/// let names = scan_variables("G0 X{{ x | format_number(3) }} F{{ feed }}{% if coolant %}M8{% endif %}");
/// let names: Vec<_> = names.into_iter().collect();
/// assert_eq!(names, vec!["coolant", "feed", "x"]);
/// ```
pub fn scan_variables(source: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut bound: HashSet<String> = HashSet::from(["loop".to_string()]);
    let mut pos = 0;

    while let Some((start, delimiter)) = next_open(source, pos) {
        let body_start = start + 2;
        let body_end = find_close(source, body_start, delimiter).unwrap_or(source.len());
        pos = (body_end + 2).min(source.len());

        if delimiter == Delimiter::Comment {
            continue;
        }
        let body = source[body_start..body_end].trim_matches(|c| c == '-' || c == '+');
        let tokens: Vec<Token> = lex(body, 0).map(|(tok, _)| tok).collect();
        collect(&tokens, &mut bound, &mut found);
    }

    found
}

fn collect(tokens: &[Token], bound: &mut HashSet<String>, found: &mut BTreeSet<String>) {
    let mut skip_until = 0;

    // Loop and set targets are declarations, not references. They are bound
    // after the rest of the tag is scanned, so `set feed = feed | default(1)`
    // still reports `feed`.
    let declared = match tokens {
        [Token::For, rest @ ..] => {
            skip_until = tokens.iter().position(|t| *t == Token::In).unwrap_or(tokens.len());
            match rest.first() {
                Some(Token::Ident(name)) => Some(name.clone()),
                _ => None,
            }
        }
        [Token::Set, Token::Ident(name), ..] => {
            skip_until = 2;
            Some(name.clone())
        }
        _ => None,
    };

    for (i, token) in tokens.iter().enumerate().skip(skip_until) {
        let Token::Ident(name) = token else {
            continue;
        };
        let prev = i.checked_sub(1).and_then(|j| tokens.get(j));
        let before_prev = i.checked_sub(2).and_then(|j| tokens.get(j));
        let next = tokens.get(i + 1);

        let is_member = matches!(prev, Some(Token::Dot) | Some(Token::Pipe) | Some(Token::Is));
        let is_negated_test = prev == Some(&Token::Not) && before_prev == Some(&Token::Is);
        let is_callee_or_keyword = matches!(next, Some(Token::ParenOpen) | Some(Token::Assign));

        if !(is_member || is_negated_test || is_callee_or_keyword || bound.contains(name)) {
            found.insert(name.clone());
        }
    }

    if let Some(name) = declared {
        bound.insert(name);
    }
}
