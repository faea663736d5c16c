//! Filter and BIND expressions
//!
//! Expressions evaluate against one [`Solution`]. Evaluation failures
//! (unbound variables, type errors, bad regexes) are reported as
//! [`ExprError`]; callers decide what an error means. FILTER treats an error
//! as "exclude the row", BIND as "leave the variable unbound". An `ExprError`
//! never surfaces as a query failure.
//!
//! Comparisons follow SPARQL operator semantics:
//! - XSD numeric literals compare by value across numeric types
//! - string literals compare lexically when their annotations agree
//! - booleans compare as booleans
//! - `=`/`!=` on anything else fall back to term equality, except that two
//!   literals of different, non-comparable datatypes are a type error

use crate::binding::{Solution, Var};
use quadstore_core::{Literal, Value};
use quadstore_vocab::xsd;
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use thiserror::Error;

/// Expression evaluation failure, local to the evaluating operator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("variable {0} is unbound")]
    Unbound(Var),

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),
}

type ExprResult<T> = std::result::Result<T, ExprError>;

/// Comparison operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn test(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }
}

/// Expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Var(Var),
    Const(Value),
    Compare(CompareOp, Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Bound(Var),
    IsIri(Box<Expression>),
    IsBlank(Box<Expression>),
    IsLiteral(Box<Expression>),
    Str(Box<Expression>),
    Lang(Box<Expression>),
    Datatype(Box<Expression>),
    SameTerm(Box<Expression>, Box<Expression>),
    Regex {
        text: Box<Expression>,
        pattern: Box<Expression>,
        flags: Option<Box<Expression>>,
    },
}

impl Expression {
    pub fn var(name: impl AsRef<str>) -> Self {
        Expression::Var(Var::new(name))
    }

    pub fn constant(value: Value) -> Self {
        Expression::Const(value)
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare(op, Box::new(left), Box::new(right))
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn regex(text: Expression, pattern: &str, flags: Option<&str>) -> Self {
        Expression::Regex {
            text: Box::new(text),
            pattern: Box::new(Expression::Const(Value::string(pattern))),
            flags: flags.map(|f| Box::new(Expression::Const(Value::string(f)))),
        }
    }

    /// Variables referenced anywhere in the expression
    pub fn variables(&self) -> Vec<Var> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<Var>) {
        match self {
            Expression::Var(v) | Expression::Bound(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Expression::Const(_) => {}
            Expression::Compare(_, a, b)
            | Expression::And(a, b)
            | Expression::Or(a, b)
            | Expression::SameTerm(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expression::Not(e)
            | Expression::IsIri(e)
            | Expression::IsBlank(e)
            | Expression::IsLiteral(e)
            | Expression::Str(e)
            | Expression::Lang(e)
            | Expression::Datatype(e) => e.collect_vars(out),
            Expression::Regex {
                text,
                pattern,
                flags,
            } => {
                text.collect_vars(out);
                pattern.collect_vars(out);
                if let Some(f) = flags {
                    f.collect_vars(out);
                }
            }
        }
    }

    /// Evaluate to a value
    pub fn evaluate(&self, solution: &Solution) -> ExprResult<Value> {
        match self {
            Expression::Var(v) => solution
                .get(v)
                .cloned()
                .ok_or_else(|| ExprError::Unbound(v.clone())),
            Expression::Const(value) => Ok(value.clone()),
            Expression::Str(e) => Ok(Value::string(e.evaluate(solution)?.as_str())),
            Expression::Lang(e) => match e.evaluate(solution)? {
                Value::Literal(lit) => Ok(Value::string(lit.language().unwrap_or(""))),
                other => Err(ExprError::Type(format!("LANG of non-literal {}", other))),
            },
            Expression::Datatype(e) => match e.evaluate(solution)? {
                Value::Literal(lit) => Ok(Value::iri(lit.datatype())),
                other => Err(ExprError::Type(format!("DATATYPE of non-literal {}", other))),
            },
            _ => self.evaluate_bool(solution).map(Value::boolean),
        }
    }

    /// Effective boolean value
    pub fn effective_boolean(&self, solution: &Solution) -> ExprResult<bool> {
        match self {
            Expression::Var(_)
            | Expression::Const(_)
            | Expression::Str(_)
            | Expression::Lang(_)
            | Expression::Datatype(_) => effective_boolean_value(&self.evaluate(solution)?),
            _ => self.evaluate_bool(solution),
        }
    }

    fn evaluate_bool(&self, solution: &Solution) -> ExprResult<bool> {
        match self {
            Expression::Compare(op, a, b) => {
                compare(*op, &a.evaluate(solution)?, &b.evaluate(solution)?)
            }
            // SPARQL three-valued logic: an error on one side is absorbed
            // when the other side decides the result.
            Expression::And(a, b) => {
                match (a.effective_boolean(solution), b.effective_boolean(solution)) {
                    (Ok(false), _) | (_, Ok(false)) => Ok(false),
                    (Ok(true), Ok(true)) => Ok(true),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Expression::Or(a, b) => {
                match (a.effective_boolean(solution), b.effective_boolean(solution)) {
                    (Ok(true), _) | (_, Ok(true)) => Ok(true),
                    (Ok(false), Ok(false)) => Ok(false),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Expression::Not(e) => Ok(!e.effective_boolean(solution)?),
            Expression::Bound(v) => Ok(solution.is_bound(v)),
            Expression::IsIri(e) => Ok(e.evaluate(solution)?.is_iri()),
            Expression::IsBlank(e) => Ok(e.evaluate(solution)?.is_blank()),
            Expression::IsLiteral(e) => Ok(e.evaluate(solution)?.is_literal()),
            Expression::SameTerm(a, b) => Ok(a.evaluate(solution)? == b.evaluate(solution)?),
            Expression::Regex {
                text,
                pattern,
                flags,
            } => {
                let text = string_arg(&text.evaluate(solution)?, "REGEX text")?;
                let pattern = string_arg(&pattern.evaluate(solution)?, "REGEX pattern")?;
                let flags = match flags {
                    Some(f) => string_arg(&f.evaluate(solution)?, "REGEX flags")?,
                    None => String::new(),
                };
                Ok(build_regex_with_flags(&pattern, &flags)?.is_match(&text))
            }
            Expression::Var(_)
            | Expression::Const(_)
            | Expression::Str(_)
            | Expression::Lang(_)
            | Expression::Datatype(_) => self.effective_boolean(solution),
        }
    }
}

fn string_arg(value: &Value, what: &str) -> ExprResult<String> {
    match value.as_literal() {
        Some(lit) if lit.is_string_like() => Ok(lit.lexical().to_string()),
        _ => Err(ExprError::Type(format!("{} must be a string, got {}", what, value))),
    }
}

/// SPARQL effective boolean value of a single term
pub fn effective_boolean_value(value: &Value) -> ExprResult<bool> {
    let Some(lit) = value.as_literal() else {
        return Err(ExprError::Type(format!("no boolean value for {}", value)));
    };
    if lit.datatype() == xsd::BOOLEAN {
        return match lit.lexical() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ExprError::Type(format!("invalid xsd:boolean '{}'", other))),
        };
    }
    if lit.is_string_like() {
        return Ok(!lit.lexical().is_empty());
    }
    if let Some(n) = numeric(lit) {
        return Ok(match n {
            Numeric::Int(i) => i != 0,
            Numeric::Float(f) => f != 0.0 && !f.is_nan(),
        });
    }
    Err(ExprError::Type(format!("no boolean value for {}", value)))
}

#[derive(Clone, Copy, Debug)]
enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }
}

const INTEGER_TYPES: &[&str] = &[
    xsd::INTEGER,
    xsd::LONG,
    xsd::INT,
    xsd::SHORT,
    xsd::BYTE,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

fn numeric(lit: &Literal) -> Option<Numeric> {
    if !lit.is_numeric() {
        return None;
    }
    let lexical = lit.lexical().trim();
    if INTEGER_TYPES.contains(&lit.datatype()) {
        return lexical.parse::<i128>().ok().map(Numeric::Int);
    }
    match lexical {
        "INF" | "+INF" => Some(Numeric::Float(f64::INFINITY)),
        "-INF" => Some(Numeric::Float(f64::NEG_INFINITY)),
        "NaN" => Some(Numeric::Float(f64::NAN)),
        _ => lexical.parse::<f64>().ok().map(Numeric::Float),
    }
}

fn compare_numeric(a: Numeric, b: Numeric) -> Option<Ordering> {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

/// Apply a comparison operator to two terms
pub fn compare(op: CompareOp, a: &Value, b: &Value) -> ExprResult<bool> {
    if let (Some(la), Some(lb)) = (a.as_literal(), b.as_literal()) {
        if let (Some(na), Some(nb)) = (numeric(la), numeric(lb)) {
            // NaN compares false under every operator except !=
            return Ok(match compare_numeric(na, nb) {
                Some(ord) => op.test(ord),
                None => op == CompareOp::Ne,
            });
        }
        if la.is_string_like() && lb.is_string_like() && la.annotation() == lb.annotation() {
            return Ok(op.test(la.lexical().cmp(lb.lexical())));
        }
        if la.datatype() == xsd::BOOLEAN && lb.datatype() == xsd::BOOLEAN {
            let x = effective_boolean_value(a)?;
            let y = effective_boolean_value(b)?;
            return Ok(op.test(x.cmp(&y)));
        }
        if la.datatype() == lb.datatype() && la.datatype() == xsd::DATE_TIME {
            return Ok(op.test(la.lexical().cmp(lb.lexical())));
        }
        return match op {
            CompareOp::Eq if a == b => Ok(true),
            CompareOp::Ne if a == b => Ok(false),
            _ => Err(ExprError::Type(format!(
                "cannot compare {} {} {}",
                a,
                op.symbol(),
                b
            ))),
        };
    }
    match op {
        CompareOp::Eq => Ok(a == b),
        CompareOp::Ne => Ok(a != b),
        _ => Err(ExprError::Type(format!(
            "cannot order non-literals {} {} {}",
            a,
            op.symbol(),
            b
        ))),
    }
}

// Compiled regexes are cached per thread; REGEX patterns are usually
// constant across the rows of one query.
thread_local! {
    static REGEX_CACHE: RefCell<lru::LruCache<(String, String), Regex>> =
        RefCell::new(lru::LruCache::new(NonZeroUsize::new(32).unwrap_or(NonZeroUsize::MIN)));
}

/// Build a regex with SPARQL flags (cached).
///
/// Supported flags: i, m, s, x. Unknown flags are an error.
pub fn build_regex_with_flags(pattern: &str, flags: &str) -> ExprResult<Regex> {
    let cache_key = (pattern.to_string(), flags.to_string());
    if let Some(re) = REGEX_CACHE.with(|cache| cache.borrow_mut().get(&cache_key).cloned()) {
        return Ok(re);
    }

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            other => {
                return Err(ExprError::InvalidRegex(format!("unknown flag '{}'", other)));
            }
        }
    }
    let re = builder
        .build()
        .map_err(|e| ExprError::InvalidRegex(e.to_string()))?;
    REGEX_CACHE.with(|cache| cache.borrow_mut().put(cache_key, re.clone()));
    Ok(re)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sol() -> Solution {
        Solution::new()
            .with("n", Value::integer(5))
            .with("d", Value::typed("5.0", xsd::DOUBLE))
            .with("s", Value::string("hello"))
            .with("en", Value::lang("hello", "en"))
            .with("i", Value::iri("http://example.org/a"))
    }

    fn var(n: &str) -> Expression {
        Expression::var(n)
    }

    #[test]
    fn test_numeric_promotion() {
        let s = sol();
        assert!(Expression::eq(var("n"), var("d")).effective_boolean(&s).unwrap());
        let lt = Expression::compare(CompareOp::Lt, var("n"), Expression::constant(Value::integer(6)));
        assert!(lt.effective_boolean(&s).unwrap());
    }

    #[test]
    fn test_string_comparison_respects_language() {
        let s = sol();
        assert!(!Expression::eq(var("s"), var("en")).effective_boolean(&s).is_ok_and(|b| b));
        let ge = Expression::compare(
            CompareOp::Ge,
            var("s"),
            Expression::constant(Value::string("abc")),
        );
        assert!(ge.effective_boolean(&s).unwrap());
    }

    #[test]
    fn test_iri_equality_and_ordering_error() {
        let s = sol();
        let eq = Expression::eq(var("i"), Expression::constant(Value::iri("http://example.org/a")));
        assert!(eq.effective_boolean(&s).unwrap());
        let lt = Expression::compare(CompareOp::Lt, var("i"), var("i"));
        assert!(matches!(lt.effective_boolean(&s), Err(ExprError::Type(_))));
    }

    #[test]
    fn test_unbound_variable_is_error() {
        let e = Expression::eq(var("missing"), var("n"));
        assert!(matches!(e.effective_boolean(&sol()), Err(ExprError::Unbound(_))));
        assert!(!Expression::Bound(Var::new("missing"))
            .effective_boolean(&sol())
            .unwrap());
    }

    #[test]
    fn test_three_valued_logic() {
        let s = sol();
        let err = Expression::eq(var("missing"), var("n"));
        let t = Expression::Bound(Var::new("n"));
        let f = Expression::not(t.clone());
        assert!(Expression::or(err.clone(), t.clone()).effective_boolean(&s).unwrap());
        assert!(!Expression::and(err.clone(), f).effective_boolean(&s).unwrap());
        assert!(Expression::and(err, t).effective_boolean(&s).is_err());
    }

    #[test]
    fn test_effective_boolean_value() {
        assert!(effective_boolean_value(&Value::boolean(true)).unwrap());
        assert!(!effective_boolean_value(&Value::integer(0)).unwrap());
        assert!(!effective_boolean_value(&Value::string("")).unwrap());
        assert!(effective_boolean_value(&Value::iri("x")).is_err());
    }

    #[test]
    fn test_accessors() {
        let s = sol();
        assert_eq!(
            Expression::Lang(Box::new(var("en"))).evaluate(&s).unwrap(),
            Value::string("en")
        );
        assert_eq!(
            Expression::Datatype(Box::new(var("n"))).evaluate(&s).unwrap(),
            Value::iri(xsd::INTEGER)
        );
        assert_eq!(
            Expression::Str(Box::new(var("i"))).evaluate(&s).unwrap(),
            Value::string("http://example.org/a")
        );
        assert!(Expression::IsIri(Box::new(var("i"))).effective_boolean(&s).unwrap());
        assert!(Expression::IsLiteral(Box::new(var("s"))).effective_boolean(&s).unwrap());
    }

    #[test]
    fn test_regex() {
        let s = sol();
        assert!(Expression::regex(var("s"), "^HEL", Some("i"))
            .effective_boolean(&s)
            .unwrap());
        assert!(!Expression::regex(var("s"), "^HEL", None)
            .effective_boolean(&s)
            .unwrap());
        assert!(matches!(
            Expression::regex(var("s"), "(", None).effective_boolean(&s),
            Err(ExprError::InvalidRegex(_))
        ));
        assert!(matches!(
            Expression::regex(var("s"), "a", Some("q")).effective_boolean(&s),
            Err(ExprError::InvalidRegex(_))
        ));
    }
}
