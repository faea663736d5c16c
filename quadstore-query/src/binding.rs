//! Binding types for query results
//!
//! This module contains:
//! - `Var`: A query variable name (cheap to clone)
//! - `Binding`: A variable's state in a solution
//! - `Solution`: One binding set, the unit flowing through evaluation

use quadstore_core::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Query variable, named without the leading `?`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(Arc<str>);

impl Var {
    pub fn new(name: impl AsRef<str>) -> Self {
        Var(Arc::from(name.as_ref().trim_start_matches('?')))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Var::new(name)
    }
}

/// A variable's state in a solution
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Explicitly unbound (e.g. the right side of an unmatched OPTIONAL)
    Unbound,
    Bound(Value),
}

impl Binding {
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Binding::Bound(v) => Some(v),
            Binding::Unbound => None,
        }
    }
}

/// Mapping from variable to binding.
///
/// Solutions are values: operators derive new solutions instead of mutating
/// ones they have emitted. Two solutions are compatible when they agree on
/// every variable bound in both; an `Unbound` marker is compatible with
/// anything.
///
/// Equality and hashing look at bound variables only: `{?o=c}` and
/// `{?o=c, ?x=UNDEF}` are the same solution.
#[derive(Clone, Debug, Default)]
pub struct Solution {
    bindings: BTreeMap<Var, Binding>,
}

impl Solution {
    /// The empty solution
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(var, value)` pairs
    pub fn from_pairs<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (V, Value)>,
        V: Into<Var>,
    {
        Self {
            bindings: pairs
                .into_iter()
                .map(|(var, value)| (var.into(), Binding::Bound(value)))
                .collect(),
        }
    }

    /// Bound value of `var`, if any
    pub fn get(&self, var: &Var) -> Option<&Value> {
        self.bindings.get(var).and_then(Binding::as_value)
    }

    pub fn binding(&self, var: &Var) -> Option<&Binding> {
        self.bindings.get(var)
    }

    pub fn is_bound(&self, var: &Var) -> bool {
        self.get(var).is_some()
    }

    /// Bind `var`, replacing any previous binding.
    pub fn insert(&mut self, var: Var, value: Value) {
        self.bindings.insert(var, Binding::Bound(value));
    }

    /// Mark `var` unbound unless it already has a binding.
    pub fn insert_unbound(&mut self, var: Var) {
        self.bindings.entry(var).or_insert(Binding::Unbound);
    }

    /// Bind `var` if compatible; returns false on a conflicting binding.
    pub fn bind(&mut self, var: &Var, value: &Value) -> bool {
        match self.get(var) {
            Some(existing) => existing == value,
            None => {
                self.insert(var.clone(), value.clone());
                true
            }
        }
    }

    pub fn with(mut self, var: impl Into<Var>, value: Value) -> Self {
        self.insert(var.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Binding)> {
        self.bindings.iter()
    }

    /// Variables with a bound value
    pub fn bound_vars(&self) -> impl Iterator<Item = &Var> {
        self.bindings
            .iter()
            .filter(|(_, b)| b.is_bound())
            .map(|(v, _)| v)
    }

    fn bound_entries(&self) -> impl Iterator<Item = (&Var, &Value)> {
        self.bindings
            .iter()
            .filter_map(|(var, b)| b.as_value().map(|value| (var, value)))
    }

    /// True if every variable bound in both has the same value
    pub fn is_compatible(&self, other: &Solution) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .bindings
            .iter()
            .all(|(var, binding)| match (binding, large.get(var)) {
                (Binding::Bound(a), Some(b)) => a == b,
                _ => true,
            })
    }

    /// True if some variable is bound in both
    pub fn shares_bound_var(&self, other: &Solution) -> bool {
        self.bound_vars().any(|v| other.is_bound(v))
    }

    /// Union of two compatible solutions; `None` if they conflict.
    pub fn merge(&self, other: &Solution) -> Option<Solution> {
        let mut out = self.clone();
        for (var, binding) in &other.bindings {
            match binding {
                Binding::Bound(value) => {
                    if !out.bind(var, value) {
                        return None;
                    }
                }
                Binding::Unbound => out.insert_unbound(var.clone()),
            }
        }
        Some(out)
    }

    /// Restrict to `vars`; projected variables missing here stay absent.
    pub fn project(&self, vars: &[Var]) -> Solution {
        Solution {
            bindings: vars
                .iter()
                .filter_map(|v| self.bindings.get(v).map(|b| (v.clone(), b.clone())))
                .collect(),
        }
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.bound_entries().eq(other.bound_entries())
    }
}

impl Eq for Solution {}

impl Hash for Solution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (var, value) in self.bound_entries() {
            var.hash(state);
            value.hash(state);
        }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (var, binding)) in self.bindings.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match binding {
                Binding::Bound(value) => write!(f, "{}={}", var, value)?,
                Binding::Unbound => write!(f, "{}=UNDEF", var)?,
            }
        }
        f.write_str("}")
    }
}
