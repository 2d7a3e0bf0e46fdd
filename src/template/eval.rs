//! Tree-walking evaluator with strict undefined handling
//!
//! Every name must resolve. The only ways to look at a missing name without
//! failing are the `defined`/`undefined` tests and the `default` filter.

use std::collections::HashSet;

use crate::error::Span;
use crate::value::{Value, ValueMap};

use super::ast::*;
use super::error::TemplateError;
use super::filters::{self, FilterArgs, FILTER_NAMES};

/// Upper bound on the length of a `range(...)` result
pub const MAX_RANGE: usize = 100_000;

/// Upper bound, in bytes, on the result of repeating a string with `*`
pub const MAX_REPEAT_LEN: usize = 1_000_000;

const TEST_NAMES: &[&str] = &[
    "defined", "undefined", "none", "number", "string", "boolean", "even", "odd",
];

/// Evaluate `program` against `context`
pub fn render(program: &Program, context: &ValueMap) -> Result<String, TemplateError> {
    let mut evaluator = Evaluator {
        context,
        scopes: vec![ValueMap::new()],
        out: String::new(),
    };
    evaluator.run(&program.nodes)?;
    Ok(evaluator.out)
}

struct Evaluator<'a> {
    context: &'a ValueMap,
    /// Innermost scope last; `set` writes to it and loops push one per iteration
    scopes: Vec<ValueMap>,
    out: String,
}

impl<'a> Evaluator<'a> {
    fn run(&mut self, nodes: &[Node]) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Output(expr) => {
                    let value = self.eval(expr)?;
                    self.out.push_str(&value.to_string());
                }
                Node::If { branches, otherwise } => {
                    let mut taken = None;
                    for branch in branches {
                        if self.eval(&branch.condition)?.is_truthy() {
                            taken = Some(&branch.body);
                            break;
                        }
                    }
                    self.run(taken.unwrap_or(otherwise))?;
                }
                Node::For {
                    target,
                    iterable,
                    body,
                    otherwise,
                } => {
                    let items = self.iterate(iterable)?;
                    if items.is_empty() {
                        self.run(otherwise)?;
                        continue;
                    }
                    let length = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        let mut scope = ValueMap::new();
                        scope.insert("loop".to_string(), loop_info(i, length));
                        scope.insert(target.node.clone(), item);
                        self.scopes.push(scope);
                        let result = self.run(body);
                        self.scopes.pop();
                        result?;
                    }
                }
                Node::Set { target, value } => {
                    let value = self.eval(value)?;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(target.node.clone(), value);
                    }
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.context.get(name))
    }

    fn undefined(&self, name: &str, span: &Span) -> TemplateError {
        let known: HashSet<String> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.keys())
            .chain(self.context.keys())
            .cloned()
            .collect();
        TemplateError::Undefined {
            name: name.to_string(),
            span: span.clone(),
            suggestions: find_similar(&known, name, 2),
        }
    }

    /// Evaluate, mapping an undefined result to `None`
    fn probe(&mut self, expr: &SpannedExpr) -> Result<Option<Value>, TemplateError> {
        match self.eval(expr) {
            Ok(value) => Ok(Some(value)),
            Err(TemplateError::Undefined { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn eval(&mut self, expr: &SpannedExpr) -> Result<Value, TemplateError> {
        let span = &expr.span;
        match &expr.node {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Var(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| self.undefined(name, span)),
            Expr::Attr { object, name } => {
                let target = self.eval(object)?;
                match target {
                    Value::Map(map) => map.get(&name.node).cloned().ok_or_else(|| {
                        let known: HashSet<String> = map.keys().cloned().collect();
                        TemplateError::Undefined {
                            name: format!("{}.{}", path_of(object), name.node),
                            span: span.clone(),
                            suggestions: find_similar(&known, &name.node, 2),
                        }
                    }),
                    other => Err(TemplateError::evaluation(
                        span.clone(),
                        format!("{} value has no attribute '{}'", other.type_name(), name.node),
                    )),
                }
            }
            Expr::Index { object, index } => {
                let target = self.eval(object)?;
                let key = self.eval(index)?;
                self.index(target, key, object, span)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(i) => i
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(|| TemplateError::evaluation(span.clone(), "integer overflow")),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(TemplateError::evaluation(
                            span.clone(),
                            format!("cannot negate a {}", other.type_name()),
                        )),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let lhs = self.eval(left)?;
                match op {
                    BinaryOp::And if !lhs.is_truthy() => return Ok(lhs),
                    BinaryOp::Or if lhs.is_truthy() => return Ok(lhs),
                    BinaryOp::And | BinaryOp::Or => return self.eval(right),
                    _ => {}
                }
                let rhs = self.eval(right)?;
                binary(*op, &lhs, &rhs).map_err(|message| TemplateError::evaluation(span.clone(), message))
            }
            Expr::Test {
                subject,
                name,
                negated,
            } => {
                let result = self.test(subject, name)?;
                Ok(Value::Bool(result != *negated))
            }
            Expr::Filter {
                subject,
                name,
                args,
            } => self.filter(subject, name, args, span),
            Expr::Call { name, args } => self.call(name, args, span),
        }
    }

    fn index(&self, target: Value, key: Value, object: &SpannedExpr, span: &Span) -> Result<Value, TemplateError> {
        match (&target, &key) {
            (Value::List(items), Value::Int(i)) => {
                let len = items.len() as i64;
                let at = if *i < 0 { len + i } else { *i };
                usize::try_from(at)
                    .ok()
                    .and_then(|at| items.get(at))
                    .cloned()
                    .ok_or_else(|| {
                        TemplateError::evaluation(
                            span.clone(),
                            format!("index {} out of range for list of length {}", i, len),
                        )
                    })
            }
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let at = if *i < 0 { len + i } else { *i };
                usize::try_from(at)
                    .ok()
                    .and_then(|at| chars.get(at))
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or_else(|| {
                        TemplateError::evaluation(
                            span.clone(),
                            format!("index {} out of range for string of length {}", i, len),
                        )
                    })
            }
            (Value::Map(map), key) => {
                let key = key.to_string();
                map.get(&key).cloned().ok_or_else(|| TemplateError::Undefined {
                    name: format!("{}[{:?}]", path_of(object), key),
                    span: span.clone(),
                    suggestions: Vec::new(),
                })
            }
            (target, key) => Err(TemplateError::evaluation(
                span.clone(),
                format!("cannot index a {} with a {}", target.type_name(), key.type_name()),
            )),
        }
    }

    fn iterate(&mut self, iterable: &SpannedExpr) -> Result<Vec<Value>, TemplateError> {
        match self.eval(iterable)? {
            Value::List(items) => Ok(items),
            Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(TemplateError::evaluation(
                iterable.span.clone(),
                format!("cannot iterate over a {}", other.type_name()),
            )),
        }
    }

    fn test(&mut self, subject: &SpannedExpr, name: &Spanned<String>) -> Result<bool, TemplateError> {
        match name.node.as_str() {
            "defined" => return Ok(self.probe(subject)?.is_some()),
            "undefined" => return Ok(self.probe(subject)?.is_none()),
            _ => {}
        }

        let value = self.eval(subject)?;
        match name.node.as_str() {
            "none" => Ok(value.is_null()),
            "number" => Ok(value.is_number()),
            "string" => Ok(matches!(value, Value::Str(_))),
            "boolean" => Ok(matches!(value, Value::Bool(_))),
            "even" | "odd" => {
                let n = match value {
                    Value::Int(i) => Some(i),
                    Value::Float(_) => value.as_i64(),
                    _ => None,
                }
                .ok_or_else(|| {
                    TemplateError::evaluation(
                        subject.span.clone(),
                        format!("test '{}' expects an integer, got {}", name.node, value.type_name()),
                    )
                })?;
                Ok((n % 2 == 0) == (name.node == "even"))
            }
            other => Err(unknown(&name.span, "test", other, TEST_NAMES)),
        }
    }

    fn filter(
        &mut self,
        subject: &SpannedExpr,
        name: &Spanned<String>,
        args: &[Arg],
        span: &Span,
    ) -> Result<Value, TemplateError> {
        let args = self.eval_args(args)?;

        if name.node == "default" {
            args.check("default", &["default_value", "boolean"])
                .map_err(|message| TemplateError::evaluation(name.span.clone(), message))?;
            let fallback = args
                .get(0, "default_value")
                .cloned()
                .unwrap_or_else(|| Value::Str(String::new()));
            let boolean = args.get(1, "boolean").is_some_and(Value::is_truthy);
            return Ok(match self.probe(subject)? {
                Some(value) if !(boolean && !value.is_truthy()) => value,
                _ => fallback,
            });
        }

        if !FILTER_NAMES.contains(&name.node.as_str()) {
            return Err(unknown(&name.span, "filter", &name.node, FILTER_NAMES));
        }
        let value = self.eval(subject)?;
        filters::apply(&name.node, value, &args).map_err(|message| TemplateError::evaluation(span.clone(), message))
    }

    fn call(&mut self, name: &Spanned<String>, args: &[Arg], span: &Span) -> Result<Value, TemplateError> {
        if name.node != "range" {
            return Err(unknown(&name.span, "function", &name.node, &["range"]));
        }
        let args = self.eval_args(args)?;
        if !args.keyword.is_empty() {
            return Err(TemplateError::evaluation(span.clone(), "range() takes no keyword arguments"));
        }

        let mut bounds = Vec::with_capacity(args.positional.len());
        for arg in &args.positional {
            match arg {
                Value::Int(i) => bounds.push(*i),
                other => {
                    return Err(TemplateError::evaluation(
                        span.clone(),
                        format!("range() expects integers, got {}", other.type_name()),
                    ))
                }
            }
        }
        let (start, stop, step) = match bounds[..] {
            [stop] => (0, stop, 1),
            [start, stop] => (start, stop, 1),
            [start, stop, step] => (start, stop, step),
            _ => {
                return Err(TemplateError::evaluation(
                    span.clone(),
                    format!("range() takes 1 to 3 arguments, got {}", bounds.len()),
                ))
            }
        };
        if step == 0 {
            return Err(TemplateError::evaluation(span.clone(), "range() step must not be zero"));
        }

        let mut items = Vec::new();
        let mut current = start;
        while (step > 0 && current < stop) || (step < 0 && current > stop) {
            if items.len() == MAX_RANGE {
                return Err(TemplateError::evaluation(
                    span.clone(),
                    format!("range() result exceeds {} items", MAX_RANGE),
                ));
            }
            items.push(Value::Int(current));
            current = match current.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(Value::List(items))
    }

    fn eval_args(&mut self, args: &[Arg]) -> Result<FilterArgs, TemplateError> {
        let mut evaluated = FilterArgs::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => evaluated.positional.push(self.eval(expr)?),
                Arg::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    evaluated.keyword.push((name.node.clone(), value));
                }
            }
        }
        Ok(evaluated)
    }
}

fn loop_info(index: usize, length: usize) -> Value {
    let mut info = ValueMap::new();
    info.insert("index".to_string(), Value::Int(index as i64 + 1));
    info.insert("index0".to_string(), Value::Int(index as i64));
    info.insert("revindex".to_string(), Value::Int((length - index) as i64));
    info.insert("revindex0".to_string(), Value::Int((length - index - 1) as i64));
    info.insert("first".to_string(), Value::Bool(index == 0));
    info.insert("last".to_string(), Value::Bool(index + 1 == length));
    info.insert("length".to_string(), Value::Int(length as i64));
    Value::Map(info)
}

/// Dotted name of a variable/attribute chain, for error messages
fn path_of(expr: &SpannedExpr) -> String {
    match &expr.node {
        Expr::Var(name) => name.clone(),
        Expr::Attr { object, name } => format!("{}.{}", path_of(object), name.node),
        Expr::Index { object, index } => match &index.node {
            Expr::Literal(Value::Int(i)) => format!("{}[{}]", path_of(object), i),
            _ => format!("{}[...]", path_of(object)),
        },
        _ => "<expression>".to_string(),
    }
}

fn unknown(span: &Span, what: &str, name: &str, known: &[&str]) -> TemplateError {
    let known: HashSet<String> = known.iter().map(|s| s.to_string()).collect();
    let similar = find_similar(&known, name, 2);
    let hint = if similar.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", similar.join(", "))
    };
    TemplateError::evaluation(span.clone(), format!("unknown {} '{}'{}", what, name, hint))
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
            _ => arithmetic(op, lhs, rhs),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => repeat(s, *n),
            _ => arithmetic(op, lhs, rhs),
        },
        BinaryOp::Sub | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem => arithmetic(op, lhs, rhs),
        BinaryOp::Concat => Ok(Value::Str(format!("{}{}", lhs, rhs))),
        BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!lhs.loose_eq(rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = lhs.compare(rhs).ok_or_else(|| {
                format!(
                    "cannot compare {} with {} using '{}'",
                    lhs.type_name(),
                    rhs.type_name(),
                    op.symbol()
                )
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => contains(rhs, lhs).map(Value::Bool),
        BinaryOp::NotIn => contains(rhs, lhs).map(|found| Value::Bool(!found)),
        BinaryOp::And => Ok(if lhs.is_truthy() { rhs.clone() } else { lhs.clone() }),
        BinaryOp::Or => Ok(if lhs.is_truthy() { lhs.clone() } else { rhs.clone() }),
    }
}

/// `s * n`; a negative count gives the empty string
fn repeat(s: &str, n: i64) -> Result<Value, String> {
    let count = usize::try_from(n).unwrap_or(0);
    match s.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::Str(s.repeat(count))),
        _ => Err(format!(
            "string repetition too large: {} x {} exceeds {} bytes",
            s.len(),
            n,
            MAX_REPEAT_LEN
        )),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, String> {
    match container {
        Value::List(items) => Ok(items.iter().any(|candidate| candidate.loose_eq(item))),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(format!("'in <string>' requires a string, got {}", other.type_name())),
        },
        Value::Map(map) => Ok(map.contains_key(&item.to_string())),
        other => Err(format!("cannot test membership in a {}", other.type_name())),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return integer_op(op, *a, *b);
    }
    match (number(lhs), number(rhs)) {
        (Some(a), Some(b)) => float_op(op, a, b),
        _ => Err(format!(
            "unsupported operand types for '{}': {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        )),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn integer_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, String> {
    let overflow = || "integer overflow".to_string();
    match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        _ if b == 0 => Err("division by zero".to_string()),
        BinaryOp::Div => Ok(Value::Float(a as f64 / b as f64)),
        // Floor semantics: the result rounds toward negative infinity
        BinaryOp::FloorDiv => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            Ok(Value::Int(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }))
        }
        // The remainder takes the sign of the divisor
        BinaryOp::Rem => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Ok(Value::Int(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }))
        }
        _ => float_op(op, a as f64, b as f64),
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, String> {
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        _ if b == 0.0 => Err("division by zero".to_string()),
        BinaryOp::Div => Ok(Value::Float(a / b)),
        BinaryOp::FloorDiv => Ok(Value::Float((a / b).floor())),
        BinaryOp::Rem => Ok(Value::Float(a - b * (a / b).floor())),
        other => Err(format!("'{}' is not an arithmetic operator", other.symbol())),
    }
}

/// Compute Levenshtein edit distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (m, n) = (a_chars.len(), b_chars.len());
    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut previous: Vec<usize> = (0..=n).collect();
    let mut current = vec![0usize; n + 1];
    for i in 1..=m {
        current[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[n]
}

/// Up to three known names within `max_distance` edits, closest first
pub(crate) fn find_similar(known: &HashSet<String>, target: &str, max_distance: usize) -> Vec<String> {
    let mut candidates: Vec<(String, usize)> = known
        .iter()
        .filter_map(|name| {
            let dist = levenshtein_distance(name, target);
            (dist <= max_distance && dist > 0).then(|| (name.clone(), dist))
        })
        .collect();

    candidates.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));
    candidates.into_iter().map(|(name, _)| name).take(3).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::grammar::{parse, WhitespaceControl};

    fn render_str(source: &str, context: &ValueMap) -> Result<String, TemplateError> {
        let program = parse(source, &WhitespaceControl::default())?;
        render(&program, context)
    }

    fn ctx(pairs: &[(&str, Value)]) -> ValueMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_undefined_variable_fails_with_suggestion() {
        let context = ctx(&[("depth", Value::Int(5))]);
        let err = render_str("Z-{{ dept }}", &context).unwrap_err();
        match err {
            TemplateError::Undefined { name, suggestions, span } => {
                assert_eq!(name, "dept");
                assert_eq!(suggestions, vec!["depth".to_string()]);
                assert_eq!(span, 5..9);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_defined_test_and_default_filter_tolerate_missing_names() {
        let context = ctx(&[("feed", Value::Int(100))]);
        let out = render_str(
            "{% if coolant is defined %}M8{% else %}M9{% endif %} F{{ rate | default(feed) }}",
            &context,
        )
        .unwrap();
        assert_eq!(out, "M9 F100");
    }

    #[test]
    fn test_default_boolean_mode_replaces_falsy_values() {
        let context = ctx(&[("name", Value::from(""))]);
        assert_eq!(render_str("{{ name | default('O1000') }}", &context).unwrap(), "");
        assert_eq!(
            render_str("{{ name | default('O1000', true) }}", &context).unwrap(),
            "O1000"
        );
    }

    #[test]
    fn test_for_loop_variables() {
        let context = ctx(&[(
            "holes",
            Value::List(vec![Value::Int(10), Value::Int(20), Value::Int(30)]),
        )]);
        let out = render_str(
            "{% for x in holes %}{{ loop.index }}:{{ x }}{% if not loop.last %},{% endif %}{% endfor %}",
            &context,
        )
        .unwrap();
        assert_eq!(out, "1:10,2:20,3:30");
    }

    #[test]
    fn test_for_else_on_empty_sequence() {
        let context = ctx(&[("holes", Value::List(Vec::new()))]);
        let out = render_str("{% for x in holes %}X{% else %}(NO HOLES){% endfor %}", &context).unwrap();
        assert_eq!(out, "(NO HOLES)");
    }

    #[test]
    fn test_loop_variable_does_not_leak() {
        let err = render_str("{% for x in [1] %}{% endfor %}{{ x }}", &ValueMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Undefined { .. }));
    }

    #[test]
    fn test_set_and_arithmetic() {
        let context = ctx(&[("depth", Value::Int(12)), ("step", Value::Int(5))]);
        let out = render_str(
            "{% set passes = depth // step + 1 %}{{ passes }} {{ depth / step }} {{ -7 // 2 }} {{ -7 % 3 }}",
            &context,
        )
        .unwrap();
        assert_eq!(out, "3 2.4 -4 2");
    }

    #[test]
    fn test_range_and_concat() {
        let out = render_str("{% for i in range(1, 4) %}{{ 'T' ~ i }} {% endfor %}", &ValueMap::new()).unwrap();
        assert_eq!(out, "T1 T2 T3 ");
    }

    #[test]
    fn test_attribute_and_index_lookup() {
        let mut tool = ValueMap::new();
        tool.insert("diameter".to_string(), Value::Float(6.0));
        let context = ctx(&[("tools", Value::List(vec![Value::Map(tool)]))]);
        assert_eq!(render_str("{{ tools[0].diameter }}", &context).unwrap(), "6.0");
        assert_eq!(render_str("{{ tools[-1]['diameter'] }}", &context).unwrap(), "6.0");

        let err = render_str("{{ tools[0].diametr }}", &context).unwrap_err();
        match err {
            TemplateError::Undefined { name, suggestions, .. } => {
                assert_eq!(name, "tools[0].diametr");
                assert_eq!(suggestions, vec!["diameter".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_tests() {
        let context = ctx(&[("n", Value::Int(4)), ("s", Value::from("x")), ("z", Value::Null)]);
        let out = render_str(
            "{{ n is even }} {{ n is odd }} {{ s is string }} {{ z is none }} {{ n is not number }}",
            &context,
        )
        .unwrap();
        assert_eq!(out, "true false true true false");
    }

    #[test]
    fn test_membership_and_logic() {
        let context = ctx(&[("plane", Value::from("G17"))]);
        let out = render_str(
            "{{ plane in ['G17', 'G18'] }} {{ 'G1' in plane }} {{ plane not in ['G19'] }} {{ none or 'fallback' }}",
            &context,
        )
        .unwrap();
        assert_eq!(out, "true true true fallback");
    }

    #[test]
    fn test_type_errors_are_evaluation_errors() {
        let context = ctx(&[("name", Value::from("O1000"))]);
        let err = render_str("{{ name + 1 }}", &context).unwrap_err();
        assert!(matches!(err, TemplateError::Evaluation { .. }));
        assert!(err.to_string().contains("unsupported operand types for '+'"));

        let err = render_str("{{ 1 / 0 }}", &context).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_string_repetition_is_bounded() {
        assert_eq!(render_str("{{ 'ab' * 3 }}|{{ 2 * 'G0' }}|{{ 'x' * -1 }}", &ValueMap::new()).unwrap(), "ababab|G0G0|");

        let err = render_str("{{ 'ab' * 9223372036854775807 }}", &ValueMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Evaluation { .. }));
        assert!(err.to_string().contains("string repetition too large"));

        let context = ctx(&[("n", Value::Int(MAX_REPEAT_LEN as i64 + 1))]);
        assert!(render_str("{{ 'x' * n }}", &context).is_err());
    }

    #[test]
    fn test_unknown_filter_suggests_builtin() {
        let err = render_str("{{ 3 | format_numbr }}", &ValueMap::new()).unwrap_err();
        assert!(err.to_string().contains("did you mean: format_number?"));
    }

    #[test]
    fn test_undefined_inside_short_circuit_is_not_evaluated() {
        let out = render_str("{{ false and missing }}", &ValueMap::new()).unwrap();
        assert_eq!(out, "false");
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("feed", "feed"), 0);
    }
}
