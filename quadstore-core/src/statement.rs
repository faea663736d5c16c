//! Statements and their surrogate-id form
//!
//! A `Statement` is the value-level tuple `(subject, predicate, object, context)`;
//! a `Quad` is the same tuple after interning, with the default graph encoded
//! as [`ValueId::DEFAULT_GRAPH`].

use crate::error::{Error, Result};
use crate::ids::ValueId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subject-predicate-object tuple plus an optional context (named graph).
///
/// `context: None` denotes the default graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
    pub context: Option<Value>,
}

impl Statement {
    /// Statement in the default graph
    pub fn new(subject: Value, predicate: Value, object: Value) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: None,
        }
    }

    /// Statement in a named graph
    pub fn in_context(subject: Value, predicate: Value, object: Value, context: Value) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: Some(context),
        }
    }

    /// Check the positional constraints of the value model:
    /// subject IRI|blank, predicate IRI, context IRI|blank.
    pub fn validate(&self) -> Result<()> {
        if !self.subject.is_resource() {
            return Err(Error::invalid_statement(format!(
                "subject must be an IRI or blank node, got {}",
                self.subject
            )));
        }
        if !self.predicate.is_iri() {
            return Err(Error::invalid_statement(format!(
                "predicate must be an IRI, got {}",
                self.predicate
            )));
        }
        if let Some(ctx) = &self.context {
            if !ctx.is_resource() {
                return Err(Error::invalid_statement(format!(
                    "context must be an IRI or blank node, got {}",
                    ctx
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(ctx) = &self.context {
            write!(f, " {}", ctx)?;
        }
        write!(f, " .")
    }
}

/// Statement components, used to describe index orderings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Subject,
    Predicate,
    Object,
    Context,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Subject,
        Component::Predicate,
        Component::Object,
        Component::Context,
    ];

    pub fn letter(self) -> char {
        match self {
            Component::Subject => 's',
            Component::Predicate => 'p',
            Component::Object => 'o',
            Component::Context => 'c',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            's' => Some(Component::Subject),
            'p' => Some(Component::Predicate),
            'o' => Some(Component::Object),
            'c' => Some(Component::Context),
            _ => None,
        }
    }

    /// Position in `(s, p, o, c)` order
    pub fn position(self) -> usize {
        match self {
            Component::Subject => 0,
            Component::Predicate => 1,
            Component::Object => 2,
            Component::Context => 3,
        }
    }
}

/// A statement as surrogate ids
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quad {
    pub s: ValueId,
    pub p: ValueId,
    pub o: ValueId,
    pub c: ValueId,
}

impl Quad {
    pub fn new(s: ValueId, p: ValueId, o: ValueId, c: ValueId) -> Self {
        Self { s, p, o, c }
    }

    pub fn get(&self, component: Component) -> ValueId {
        match component {
            Component::Subject => self.s,
            Component::Predicate => self.p,
            Component::Object => self.o,
            Component::Context => self.c,
        }
    }

    pub fn set(&mut self, component: Component, id: ValueId) {
        match component {
            Component::Subject => self.s = id,
            Component::Predicate => self.p = id,
            Component::Object => self.o = id,
            Component::Context => self.c = id,
        }
    }
}

/// Id-level pattern: `None` components are wildcards
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QuadPattern {
    pub s: Option<ValueId>,
    pub p: Option<ValueId>,
    pub o: Option<ValueId>,
    pub c: Option<ValueId>,
}

impl QuadPattern {
    /// Pattern matching every quad
    pub fn any() -> Self {
        Self::default()
    }

    pub fn get(&self, component: Component) -> Option<ValueId> {
        match component {
            Component::Subject => self.s,
            Component::Predicate => self.p,
            Component::Object => self.o,
            Component::Context => self.c,
        }
    }

    pub fn is_bound(&self, component: Component) -> bool {
        self.get(component).is_some()
    }

    pub fn bound_count(&self) -> usize {
        Component::ALL.iter().filter(|c| self.is_bound(**c)).count()
    }

    pub fn matches(&self, quad: &Quad) -> bool {
        Component::ALL
            .iter()
            .all(|c| self.get(*c).map_or(true, |id| quad.get(*c) == id))
    }
}

/// Context restriction for value-level statement filters
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContextFilter {
    /// Any graph, including the default graph
    #[default]
    Any,
    /// Only the default graph
    Default,
    /// One named graph
    Named(Value),
}

/// Value-level statement filter used by remove/size/statements.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StatementFilter {
    pub subject: Option<Value>,
    pub predicate: Option<Value>,
    pub object: Option<Value>,
    pub context: ContextFilter,
}

impl StatementFilter {
    /// Filter matching every statement
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(subject: Option<Value>, predicate: Option<Value>, object: Option<Value>) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: ContextFilter::Any,
        }
    }

    pub fn in_context(mut self, context: ContextFilter) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ValueId {
        ValueId::new(n)
    }

    #[test]
    fn test_validate_positions() {
        let ok = Statement::new(Value::iri("s"), Value::iri("p"), Value::string("o"));
        assert!(ok.validate().is_ok());

        let literal_subject = Statement::new(Value::string("s"), Value::iri("p"), Value::iri("o"));
        assert!(literal_subject.validate().is_err());

        let blank_predicate = Statement::new(Value::iri("s"), Value::blank("p"), Value::iri("o"));
        assert!(blank_predicate.validate().is_err());

        let literal_context = Statement::in_context(
            Value::iri("s"),
            Value::iri("p"),
            Value::iri("o"),
            Value::string("g"),
        );
        assert!(literal_context.validate().is_err());
    }

    #[test]
    fn test_quad_pattern_matches() {
        let quad = Quad::new(id(1), id(2), id(3), ValueId::DEFAULT_GRAPH);
        assert!(QuadPattern::any().matches(&quad));

        let pattern = QuadPattern {
            s: Some(id(1)),
            o: Some(id(3)),
            ..Default::default()
        };
        assert!(pattern.matches(&quad));
        assert_eq!(pattern.bound_count(), 2);

        let default_only = QuadPattern {
            c: Some(ValueId::DEFAULT_GRAPH),
            ..Default::default()
        };
        assert!(default_only.matches(&quad));

        let other = QuadPattern {
            p: Some(id(9)),
            ..Default::default()
        };
        assert!(!other.matches(&quad));
    }

    #[test]
    fn test_component_letters() {
        for c in Component::ALL {
            assert_eq!(Component::from_letter(c.letter()), Some(c));
        }
        assert_eq!(Component::from_letter('x'), None);
    }
}
