//! Template parser: delimiter segmentation plus a chumsky expression grammar

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::Span;
use crate::value::Value;

use super::ast::*;
use super::error::TemplateError;
use super::lexer::{lex_strict, Token};

/// Whitespace handling around block tags and at the end of the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitespaceControl {
    /// Drop the first newline after a block tag
    pub trim_blocks: bool,
    /// Strip spaces and tabs before a block tag that starts its line
    pub lstrip_blocks: bool,
    /// Keep a single trailing newline at the end of the template
    pub keep_trailing_newline: bool,
}

impl Default for WhitespaceControl {
    fn default() -> Self {
        Self {
            trim_blocks: true,
            lstrip_blocks: true,
            keep_trailing_newline: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delimiter {
    Output,
    Block,
    Comment,
}

impl Delimiter {
    pub(crate) fn open(&self) -> &'static str {
        match self {
            Delimiter::Output => "{{",
            Delimiter::Block => "{%",
            Delimiter::Comment => "{#",
        }
    }

    pub(crate) fn close(&self) -> &'static str {
        match self {
            Delimiter::Output => "}}",
            Delimiter::Block => "%}",
            Delimiter::Comment => "#}",
        }
    }
}

/// Position and kind of the next opening delimiter at or after `from`
pub(crate) fn next_open(source: &str, from: usize) -> Option<(usize, Delimiter)> {
    let bytes = source.as_bytes();
    let mut i = from;
    while let Some(offset) = source.get(i..)?.find('{') {
        let at = i + offset;
        match bytes.get(at + 1) {
            Some(b'{') => return Some((at, Delimiter::Output)),
            Some(b'%') => return Some((at, Delimiter::Block)),
            Some(b'#') => return Some((at, Delimiter::Comment)),
            _ => i = at + 1,
        }
    }
    None
}

/// Position of the closing delimiter, ignoring any inside string literals
pub(crate) fn find_close(source: &str, from: usize, delimiter: Delimiter) -> Option<usize> {
    let close = delimiter.close().as_bytes();
    if delimiter == Delimiter::Comment {
        return source.get(from..)?.find(delimiter.close()).map(|i| from + i);
    }

    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if bytes[i..].starts_with(close) => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Output(Span),
    Block(Span),
}

/// Split the source into text, output and block segments, applying
/// whitespace control. Comments are dropped here.
fn segment(source: &str, ws: &WhitespaceControl) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some((start, delimiter)) = next_open(source, pos) {
        let is_block = delimiter != Delimiter::Output;
        let after_open = start + 2;
        let marker = source[after_open..].chars().next();
        let body_start = match marker {
            Some('-') | Some('+') => after_open + 1,
            _ => after_open,
        };

        let mut text = &source[pos..start];
        if marker == Some('-') {
            text = text.trim_end();
        } else if is_block && ws.lstrip_blocks && marker != Some('+') {
            let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
            if line_start >= pos && source[line_start..start].chars().all(|c| c == ' ' || c == '\t') {
                text = &source[pos..line_start];
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let close = find_close(source, body_start, delimiter).ok_or_else(|| TemplateError::Syntax {
            span: start..after_open,
            message: format!("unclosed '{}'", delimiter.open()),
            expected: vec![format!("'{}'", delimiter.close())],
        })?;
        let trim_after = close > body_start && source[..close].ends_with('-');
        let body_end = if trim_after { close - 1 } else { close };

        pos = close + 2;
        if trim_after {
            let rest = &source[pos..];
            pos += rest.len() - rest.trim_start().len();
        } else if is_block && ws.trim_blocks {
            if source[pos..].starts_with("\r\n") {
                pos += 2;
            } else if source[pos..].starts_with('\n') {
                pos += 1;
            }
        }

        match delimiter {
            Delimiter::Output => segments.push(Segment::Output(body_start..body_end)),
            Delimiter::Block => segments.push(Segment::Block(body_start..body_end)),
            Delimiter::Comment => {}
        }
    }

    if pos < source.len() {
        segments.push(Segment::Text(source[pos..].to_string()));
    }
    Ok(segments)
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> Span {
    e.start()..e.end()
}

/// Postfix operation applied to an already parsed operand
#[derive(Debug, Clone)]
enum Suffix {
    Attr(Spanned<String>),
    Index(SpannedExpr),
    Filter(Spanned<String>, Vec<Arg>),
    Test(Spanned<String>, bool),
}

fn apply_suffix(object: SpannedExpr, (suffix, end): (Suffix, usize)) -> SpannedExpr {
    let span = object.span.start..end;
    let object = Box::new(object);
    let node = match suffix {
        Suffix::Attr(name) => Expr::Attr { object, name },
        Suffix::Index(index) => Expr::Index {
            object,
            index: Box::new(index),
        },
        Suffix::Filter(name, args) => Expr::Filter {
            subject: object,
            name,
            args,
        },
        Suffix::Test(name, negated) => Expr::Test {
            subject: object,
            name,
            negated,
        },
    };
    Spanned::new(node, span)
}

fn binary(left: SpannedExpr, (op, right): (BinaryOp, SpannedExpr)) -> SpannedExpr {
    let span = left.span.start..right.span.end;
    Spanned::new(
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

fn unary(op: UnaryOp) -> impl Fn(usize, SpannedExpr) -> SpannedExpr + Clone {
    move |start, operand| {
        let span = start..operand.span.end;
        Spanned::new(
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, SpannedExpr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let ident = select! {
            Token::Ident(s) => s,
        }
        .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

        let literal = select! {
            Token::Int(i) => Value::Int(i),
            Token::Float(f) => Value::Float(f),
            Token::String(s) => Value::Str(s),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
        }
        .map(Expr::Literal);

        // Keyword arguments are tried first so `name=value` is not read as a
        // bare variable followed by a stray '='
        let arg = ident
            .clone()
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map(|(name, value)| Arg::Keyword(name, value))
            .or(expr.clone().map(Arg::Positional));

        let args = arg
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expr::List);

        let call = ident
            .clone()
            .then(args.clone())
            .map(|(name, args)| Expr::Call { name, args });

        let var = ident.clone().map(|id| Expr::Var(id.node));

        let atom = choice((literal, list, call, var))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())))
            .or(expr
                .clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
            .boxed();

        let access = choice((
            just(Token::Dot).ignore_then(ident.clone()).map(Suffix::Attr),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Suffix::Index),
        ))
        .map_with(|suffix, e| (suffix, span_range(&e.span()).end));

        let postfix = atom.foldl(access.repeated(), apply_suffix);

        let negated = just(Token::Minus)
            .map_with(|_, e| span_range(&e.span()).start)
            .repeated()
            .foldr(postfix, unary(UnaryOp::Neg))
            .boxed();

        // `none` lexes as a literal keyword but is also a test name
        let test_name = ident.clone().or(just(Token::Null)
            .map_with(|_, e| Spanned::new("none".to_string(), span_range(&e.span()))));

        let filter = just(Token::Pipe)
            .ignore_then(ident.clone())
            .then(args.or_not())
            .map(|(name, args)| Suffix::Filter(name, args.unwrap_or_default()));

        let test = just(Token::Is)
            .ignore_then(just(Token::Not).or_not())
            .then(test_name)
            .map(|(not, name)| Suffix::Test(name, not.is_some()));

        let filtered = negated.foldl(
            choice((filter, test))
                .map_with(|suffix, e| (suffix, span_range(&e.span()).end))
                .repeated(),
            apply_suffix,
        );

        let product_op = choice((
            just(Token::Star).to(BinaryOp::Mul),
            just(Token::SlashSlash).to(BinaryOp::FloorDiv),
            just(Token::Slash).to(BinaryOp::Div),
            just(Token::Percent).to(BinaryOp::Rem),
        ));
        let product = filtered
            .clone()
            .foldl(product_op.then(filtered).repeated(), binary)
            .boxed();

        let concat = product
            .clone()
            .foldl(just(Token::Tilde).to(BinaryOp::Concat).then(product).repeated(), binary);

        let sum_op = choice((
            just(Token::Plus).to(BinaryOp::Add),
            just(Token::Minus).to(BinaryOp::Sub),
        ));
        let sum = concat
            .clone()
            .foldl(sum_op.then(concat).repeated(), binary)
            .boxed();

        let compare_op = choice((
            just(Token::EqEq).to(BinaryOp::Eq),
            just(Token::NotEq).to(BinaryOp::Ne),
            just(Token::LessOrEqual).to(BinaryOp::Le),
            just(Token::GreaterOrEqual).to(BinaryOp::Ge),
            just(Token::Less).to(BinaryOp::Lt),
            just(Token::Greater).to(BinaryOp::Gt),
            just(Token::Not).then(just(Token::In)).to(BinaryOp::NotIn),
            just(Token::In).to(BinaryOp::In),
        ));
        let comparison = sum.clone().foldl(compare_op.then(sum).repeated(), binary);

        let inverted = just(Token::Not)
            .map_with(|_, e| span_range(&e.span()).start)
            .repeated()
            .foldr(comparison, unary(UnaryOp::Not))
            .boxed();

        let conjunction = inverted
            .clone()
            .foldl(just(Token::And).to(BinaryOp::And).then(inverted).repeated(), binary);

        conjunction
            .clone()
            .foldl(just(Token::Or).to(BinaryOp::Or).then(conjunction).repeated(), binary)
            .boxed()
    })
}

/// Parsed body of a `{% ... %}` block
#[derive(Debug, Clone, PartialEq)]
enum Tag {
    If(SpannedExpr),
    Elif(SpannedExpr),
    Else,
    EndIf,
    For {
        target: Spanned<String>,
        iterable: SpannedExpr,
    },
    EndFor,
    Set {
        target: Spanned<String>,
        value: SpannedExpr,
    },
}

impl Tag {
    fn keyword(&self) -> &'static str {
        match self {
            Tag::If(_) => "if",
            Tag::Elif(_) => "elif",
            Tag::Else => "else",
            Tag::EndIf => "endif",
            Tag::For { .. } => "for",
            Tag::EndFor => "endfor",
            Tag::Set { .. } => "set",
        }
    }
}

fn tag_parser<'a, I>() -> impl Parser<'a, I, Tag, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let expr = expr_parser();
    let name = select! {
        Token::Ident(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    choice((
        just(Token::If).ignore_then(expr.clone()).map(Tag::If),
        just(Token::Elif).ignore_then(expr.clone()).map(Tag::Elif),
        just(Token::Else).to(Tag::Else),
        just(Token::EndIf).to(Tag::EndIf),
        just(Token::For)
            .ignore_then(name.clone())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .map(|(target, iterable)| Tag::For { target, iterable }),
        just(Token::EndFor).to(Tag::EndFor),
        just(Token::Set)
            .ignore_then(name)
            .then_ignore(just(Token::Assign))
            .then(expr)
            .map(|(target, value)| Tag::Set { target, value }),
    ))
    .then_ignore(end())
}

fn tokens(source: &str, body: &Span) -> Result<Vec<(Token, Span)>, TemplateError> {
    lex_strict(&source[body.clone()], body.start).map_err(|span| {
        let found = &source[span.clone()];
        TemplateError::syntax(span, format!("unexpected character '{}'", found))
    })
}

fn parse_output(source: &str, body: Span) -> Result<SpannedExpr, TemplateError> {
    let tokens = tokens(source, &body)?;
    let eoi = body.end;

    let token_stream = Stream::from_iter(tokens.into_iter().map(|(tok, span)| (tok, span.into())))
        .map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    expr_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| first_error(errs, body))
}

fn parse_block(source: &str, body: Span) -> Result<Spanned<Tag>, TemplateError> {
    let tokens = tokens(source, &body)?;
    match tokens.first() {
        None => return Err(TemplateError::syntax(body, "empty block tag")),
        Some((Token::Ident(name), span)) => {
            return Err(TemplateError::syntax(span.clone(), format!("unknown tag '{}'", name)));
        }
        Some(_) => {}
    }
    let eoi = body.end;

    let token_stream = Stream::from_iter(tokens.into_iter().map(|(tok, span)| (tok, span.into())))
        .map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    tag_parser()
        .parse(token_stream)
        .into_result()
        .map(|tag| Spanned::new(tag, body.clone()))
        .map_err(|errs| first_error(errs, body))
}

fn first_error(errs: Vec<Rich<'_, Token>>, body: Span) -> TemplateError {
    errs.into_iter()
        .next()
        .map(TemplateError::from)
        .unwrap_or_else(|| TemplateError::syntax(body, "invalid expression"))
}

enum Item {
    Node(Node),
    Tag(Spanned<Tag>),
}

/// Nests the flat item sequence into block structure
struct TreeBuilder {
    items: std::vec::IntoIter<Item>,
}

impl TreeBuilder {
    /// Collect nodes up to the tag that continues or closes the enclosing
    /// block, which is handed back to the caller
    fn block(&mut self) -> Result<(Vec<Node>, Option<Spanned<Tag>>), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            let tag = match item {
                Item::Node(node) => {
                    nodes.push(node);
                    continue;
                }
                Item::Tag(tag) => tag,
            };
            match tag.node {
                Tag::If(condition) => nodes.push(self.if_block(condition, tag.span)?),
                Tag::For { target, iterable } => nodes.push(self.for_block(target, iterable, tag.span)?),
                Tag::Set { target, value } => nodes.push(Node::Set { target, value }),
                _ => return Ok((nodes, Some(tag))),
            }
        }
        Ok((nodes, None))
    }

    fn if_block(&mut self, first: SpannedExpr, span: Span) -> Result<Node, TemplateError> {
        let mut branches = Vec::new();
        let mut condition = first;
        loop {
            let (body, end) = self.block()?;
            branches.push(Branch { condition, body });
            let end = end.ok_or_else(|| unclosed("if", &span))?;
            match end.node {
                Tag::Elif(next) => condition = next,
                Tag::Else => {
                    let (otherwise, end) = self.block()?;
                    expect_close(end, "if", "endif", &span)?;
                    return Ok(Node::If { branches, otherwise });
                }
                Tag::EndIf => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
                other => return Err(mismatched(&other, "endif", end.span)),
            }
        }
    }

    fn for_block(&mut self, target: Spanned<String>, iterable: SpannedExpr, span: Span) -> Result<Node, TemplateError> {
        let (body, end) = self.block()?;
        let end = end.ok_or_else(|| unclosed("for", &span))?;
        let otherwise = match end.node {
            Tag::EndFor => Vec::new(),
            Tag::Else => {
                let (otherwise, end) = self.block()?;
                expect_close(end, "for", "endfor", &span)?;
                otherwise
            }
            other => return Err(mismatched(&other, "endfor", end.span)),
        };
        Ok(Node::For {
            target,
            iterable,
            body,
            otherwise,
        })
    }
}

fn unclosed(block: &str, span: &Span) -> TemplateError {
    TemplateError::syntax(span.clone(), format!("unclosed '{}' block", block))
}

fn mismatched(found: &Tag, expected: &str, span: Span) -> TemplateError {
    TemplateError::Syntax {
        span,
        message: format!("unexpected '{}'", found.keyword()),
        expected: vec![format!("'{}'", expected)],
    }
}

fn expect_close(end: Option<Spanned<Tag>>, block: &str, closer: &str, open: &Span) -> Result<(), TemplateError> {
    match end {
        Some(tag) if tag.node.keyword() == closer => Ok(()),
        Some(tag) => Err(mismatched(&tag.node, closer, tag.span)),
        None => Err(unclosed(block, open)),
    }
}

/// Parse template source into a program
pub fn parse(source: &str, ws: &WhitespaceControl) -> Result<Program, TemplateError> {
    let source = if ws.keep_trailing_newline {
        source
    } else {
        source
            .strip_suffix("\r\n")
            .or_else(|| source.strip_suffix('\n'))
            .unwrap_or(source)
    };

    let mut items = Vec::new();
    for segment in segment(source, ws)? {
        items.push(match segment {
            Segment::Text(text) => Item::Node(Node::Text(text)),
            Segment::Output(body) => Item::Node(Node::Output(parse_output(source, body)?)),
            Segment::Block(body) => Item::Tag(parse_block(source, body)?),
        });
    }

    let mut builder = TreeBuilder {
        items: items.into_iter(),
    };
    let (nodes, stray) = builder.block()?;
    if let Some(tag) = stray {
        return Err(TemplateError::syntax(
            tag.span,
            format!("unexpected '{}' outside of a block", tag.node.keyword()),
        ));
    }
    Ok(Program { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_default(source: &str) -> Program {
        parse(source, &WhitespaceControl::default()).expect("template should parse")
    }

    fn parse_err(source: &str) -> TemplateError {
        parse(source, &WhitespaceControl::default()).expect_err("template should not parse")
    }

    fn output_expr(source: &str) -> Expr {
        match parse_default(source).nodes.into_iter().next() {
            Some(Node::Output(expr)) => expr.node,
            other => panic!("expected output node, got {other:?}"),
        }
    }

    #[test]
    fn test_text_and_output() {
        let program = parse_default("G0 X{{ x }} Y0\n");
        assert_eq!(program.nodes.len(), 3);
        assert_eq!(program.nodes[0], Node::Text("G0 X".to_string()));
        assert!(matches!(&program.nodes[1], Node::Output(e) if e.node == Expr::Var("x".to_string())));
        assert_eq!(program.nodes[2], Node::Text(" Y0\n".to_string()));
    }

    #[test]
    fn test_precedence_mul_over_add() {
        match output_expr("{{ a + b * 2 }}") {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.node, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        match output_expr("{{ not a == b }}") {
            Expr::Unary { op: UnaryOp::Not, operand } => {
                assert!(matches!(operand.node, Expr::Binary { op: BinaryOp::Eq, .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_filter_with_positional_and_keyword_args() {
        match output_expr("{{ depth | format_number(2) | default(value=0) }}") {
            Expr::Filter { subject, name, args } => {
                assert_eq!(name.node, "default");
                assert!(matches!(&args[0], Arg::Keyword(k, _) if k.node == "value"));
                assert!(matches!(subject.node, Expr::Filter { ref name, .. } if name.node == "format_number"));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_tests_and_not_in() {
        assert!(matches!(
            output_expr("{{ x is not none }}"),
            Expr::Test { negated: true, ref name, .. } if name.node == "none"
        ));
        assert!(matches!(
            output_expr("{{ t not in tools }}"),
            Expr::Binary { op: BinaryOp::NotIn, .. }
        ));
    }

    #[test]
    fn test_attribute_and_index_access() {
        match output_expr("{{ tools[0].diameter }}") {
            Expr::Attr { object, name } => {
                assert_eq!(name.node, "diameter");
                assert!(matches!(object.node, Expr::Index { .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_if_elif_else_structure() {
        let program = parse_default("{% if a %}A{% elif b %}B{% else %}C{% endif %}");
        match &program.nodes[0] {
            Node::If { branches, otherwise } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(otherwise, &vec![Node::Text("C".to_string())]);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_for_with_else() {
        let program = parse_default("{% for t in tools %}T{{ t }}{% else %}none{% endfor %}");
        assert!(matches!(&program.nodes[0], Node::For { otherwise, .. } if otherwise.len() == 1));
    }

    #[test]
    fn test_trim_and_lstrip_blocks() {
        let program = parse_default("N10\n    {% if a %}\nG1\n    {% endif %}\nM30\n");
        let texts: Vec<_> = match &program.nodes[..] {
            [Node::Text(before), Node::If { branches, .. }, Node::Text(after)] => {
                vec![before.clone(), format!("{:?}", branches[0].body), after.clone()]
            }
            other => panic!("unexpected nodes {other:?}"),
        };
        assert_eq!(texts[0], "N10\n");
        assert_eq!(texts[1], format!("{:?}", vec![Node::Text("G1\n".to_string())]));
        assert_eq!(texts[2], "M30\n");
    }

    #[test]
    fn test_minus_markers_trim_whitespace() {
        let program = parse_default("A  \n  {{- x -}}  \n B");
        assert_eq!(program.nodes[0], Node::Text("A".to_string()));
        assert_eq!(program.nodes[2], Node::Text("B".to_string()));
    }

    #[test]
    fn test_comments_are_dropped() {
        let program = parse_default("G90{# absolute #}G21");
        assert_eq!(
            program.nodes,
            vec![Node::Text("G90".to_string()), Node::Text("G21".to_string())]
        );
    }

    #[test]
    fn test_trailing_newline_control() {
        let ws = WhitespaceControl {
            keep_trailing_newline: false,
            ..WhitespaceControl::default()
        };
        let program = parse("M30\n", &ws).unwrap();
        assert_eq!(program.nodes, vec![Node::Text("M30".to_string())]);
    }

    #[test]
    fn test_delimiters_inside_strings() {
        assert_eq!(output_expr("{{ '}}' }}"), Expr::Literal(Value::from("}}")));
    }

    #[test]
    fn test_unclosed_output_has_span() {
        let err = parse_err("G0 {{ x");
        assert_eq!(err.span(), &(3..5));
    }

    #[test]
    fn test_unclosed_if_block() {
        let err = parse_err("{% if a %}G1");
        assert!(err.to_string().contains("unclosed 'if' block"));
    }

    #[test]
    fn test_stray_end_tag() {
        let err = parse_err("G1{% endfor %}");
        assert!(err.to_string().contains("unexpected 'endfor'"));
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = parse_err("{% for t in tools %}{% endif %}");
        assert!(err.to_string().contains("unexpected 'endif'"));
    }

    #[test]
    fn test_unknown_tag() {
        let err = parse_err("{% include 'x' %}");
        assert!(err.to_string().contains("unknown tag 'include'"));
    }

    #[test]
    fn test_bad_expression_points_into_source() {
        let err = parse_err("G1 X{{ a + }}");
        let span = err.span().clone();
        assert!(span.start >= 7 && span.end <= 11, "span {span:?}");
    }

    #[test]
    fn test_unlexable_character() {
        let err = parse_err("{{ a $ b }}");
        assert_eq!(err.span(), &(5..6));
    }
}
