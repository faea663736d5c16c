//! Algebra tree consumed by the evaluator
//!
//! The operator set is closed: a query-language front end translates its
//! syntax tree into [`Algebra`], and [`build_operator`](crate::execute::build_operator)
//! maps each variant to exactly one operator. Adding an operator means
//! adding a variant here.

use crate::binding::{Solution, Var};
use crate::expression::Expression;
use quadstore_core::Value;
use std::collections::BTreeSet;

/// A pattern position: variable or constant
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Var(Var),
    Value(Value),
}

impl Term {
    pub fn var(name: impl AsRef<str>) -> Self {
        Term::Var(Var::new(name))
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Var(v) => Some(v),
            Term::Value(_) => None,
        }
    }

    /// Constant value, or the seed's binding for a variable
    pub fn resolve<'t>(&'t self, seed: &'t Solution) -> Option<&'t Value> {
        match self {
            Term::Value(v) => Some(v),
            Term::Var(var) => seed.get(var),
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::Value(value)
    }
}

impl From<Var> for Term {
    fn from(var: Var) -> Self {
        Term::Var(var)
    }
}

/// Which graphs a statement pattern matches
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ContextScope {
    /// Default graph and every named graph; the context is not bound
    #[default]
    All,
    /// Only the default graph
    Default,
    /// Named graphs only; a variable here binds the graph name
    Named(Term),
}

/// `(subject, predicate, object)` with a graph scope
#[derive(Clone, Debug, PartialEq)]
pub struct StatementPattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub context: ContextScope,
}

impl StatementPattern {
    /// Pattern over every graph
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            context: ContextScope::All,
        }
    }

    pub fn in_scope(mut self, context: ContextScope) -> Self {
        self.context = context;
        self
    }

    fn terms(&self) -> impl Iterator<Item = &Term> {
        let ctx = match &self.context {
            ContextScope::Named(t) => Some(t),
            _ => None,
        };
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .chain(ctx)
    }

    /// Variables bound by this pattern, in position order without duplicates
    pub fn variables(&self) -> Vec<Var> {
        let mut out: Vec<Var> = Vec::new();
        for var in self.terms().filter_map(Term::as_var) {
            if !out.contains(var) {
                out.push(var.clone());
            }
        }
        out
    }

    /// Number of components fixed by constants or by `seed`
    pub fn bound_count(&self, seed: &Solution) -> usize {
        let spo = [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter(|t| t.resolve(seed).is_some())
            .count();
        let ctx = match &self.context {
            ContextScope::All => 0,
            ContextScope::Default => 1,
            ContextScope::Named(t) => usize::from(t.resolve(seed).is_some()),
        };
        spo + ctx
    }
}

/// Algebra operator tree
#[derive(Clone, Debug, PartialEq)]
pub enum Algebra {
    Pattern(StatementPattern),
    Join(Box<Algebra>, Box<Algebra>),
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        condition: Option<Expression>,
    },
    /// Concatenation in declared order, duplicates kept
    Union(Vec<Algebra>),
    Filter {
        expr: Expression,
        child: Box<Algebra>,
    },
    Distinct(Box<Algebra>),
    Projection {
        vars: Vec<Var>,
        child: Box<Algebra>,
    },
    /// Delegate `child` to the federation member registered for `endpoint`
    Service {
        endpoint: String,
        child: Box<Algebra>,
        silent: bool,
    },
    Slice {
        offset: usize,
        limit: Option<usize>,
        child: Box<Algebra>,
    },
    /// BIND: an evaluation error leaves `var` unbound
    Extend {
        var: Var,
        expr: Expression,
        child: Box<Algebra>,
    },
    /// Inline data; `None` cells are unbound
    Values {
        vars: Vec<Var>,
        rows: Vec<Vec<Option<Value>>>,
    },
    Minus(Box<Algebra>, Box<Algebra>),
    /// One empty solution
    Singleton,
    /// No solutions
    Empty,
}

impl Algebra {
    pub fn pattern(s: impl Into<Term>, p: impl Into<Term>, o: impl Into<Term>) -> Self {
        Algebra::Pattern(StatementPattern::new(s, p, o))
    }

    pub fn join(left: Algebra, right: Algebra) -> Self {
        Algebra::Join(Box::new(left), Box::new(right))
    }

    pub fn left_join(left: Algebra, right: Algebra, condition: Option<Expression>) -> Self {
        Algebra::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            condition,
        }
    }

    pub fn filter(expr: Expression, child: Algebra) -> Self {
        Algebra::Filter {
            expr,
            child: Box::new(child),
        }
    }

    pub fn distinct(child: Algebra) -> Self {
        Algebra::Distinct(Box::new(child))
    }

    pub fn project(vars: impl IntoIterator<Item = Var>, child: Algebra) -> Self {
        Algebra::Projection {
            vars: vars.into_iter().collect(),
            child: Box::new(child),
        }
    }

    pub fn service(endpoint: impl Into<String>, child: Algebra, silent: bool) -> Self {
        Algebra::Service {
            endpoint: endpoint.into(),
            child: Box::new(child),
            silent,
        }
    }

    pub fn slice(offset: usize, limit: Option<usize>, child: Algebra) -> Self {
        Algebra::Slice {
            offset,
            limit,
            child: Box::new(child),
        }
    }

    pub fn extend(var: Var, expr: Expression, child: Algebra) -> Self {
        Algebra::Extend {
            var,
            expr,
            child: Box::new(child),
        }
    }

    pub fn minus(left: Algebra, right: Algebra) -> Self {
        Algebra::Minus(Box::new(left), Box::new(right))
    }

    /// True if evaluating this tree seeded with an outer solution yields
    /// exactly its unseeded solutions that are compatible with that outer
    /// solution, merged into it.
    ///
    /// Only such trees may be re-evaluated per outer row by a nested-loop
    /// join or OPTIONAL. Filter, BIND, slicing, DISTINCT, projection and
    /// SERVICE scope their variables to their own subtree. An OPTIONAL
    /// seeded on its right-side variables would emit unmatched rows that the
    /// unseeded evaluation never produces.
    pub fn is_correlatable(&self) -> bool {
        match self {
            Algebra::Pattern(_) | Algebra::Values { .. } | Algebra::Singleton | Algebra::Empty => {
                true
            }
            Algebra::Join(a, b) => a.is_correlatable() && b.is_correlatable(),
            Algebra::Union(branches) => branches.iter().all(Algebra::is_correlatable),
            // seeded left rows carry outer variables into the shared-variable test
            Algebra::Minus(..)
            | Algebra::LeftJoin { .. }
            | Algebra::Filter { .. }
            | Algebra::Distinct(_)
            | Algebra::Projection { .. }
            | Algebra::Service { .. }
            | Algebra::Slice { .. }
            | Algebra::Extend { .. } => false,
        }
    }

    /// Every variable this tree may bind
    pub fn variables(&self) -> BTreeSet<Var> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<Var>) {
        match self {
            Algebra::Pattern(p) => out.extend(p.variables()),
            Algebra::Join(a, b) | Algebra::LeftJoin { left: a, right: b, .. } => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Algebra::Union(branches) => branches.iter().for_each(|b| b.collect_vars(out)),
            Algebra::Filter { child, .. }
            | Algebra::Distinct(child)
            | Algebra::Service { child, .. }
            | Algebra::Slice { child, .. } => child.collect_vars(out),
            // MINUS never binds variables of its right side
            Algebra::Minus(left, _) => left.collect_vars(out),
            Algebra::Projection { vars, .. } => out.extend(vars.iter().cloned()),
            Algebra::Extend { var, child, .. } => {
                child.collect_vars(out);
                out.insert(var.clone());
            }
            Algebra::Values { vars, .. } => out.extend(vars.iter().cloned()),
            Algebra::Singleton | Algebra::Empty => {}
        }
    }
}
