use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::PredicateError;
use crate::syntax::{ChildRef, NodeKind, Value};

type PredicateFn = dyn Fn(ChildRef<'_>, &[Value]) -> Result<bool, PredicateError> + Send + Sync;

/// An external predicate callable from a pattern as `#name` or `#name(args)`.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ChildRef<'_>, &[Value]) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, child: ChildRef<'_>, args: &[Value]) -> Result<bool, PredicateError> {
        (self.0)(child, args)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Names a pattern may refer to: external predicates and symbol sets.
#[derive(Debug, Clone, Default)]
pub struct PatternEnv {
    predicates: HashMap<String, Predicate>,
    sets: HashMap<String, Arc<[String]>>,
}

impl PatternEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ChildRef<'_>, &[Value]) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Predicate::new(f));
        self
    }

    pub fn with_set<I, S>(mut self, name: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        self.sets.insert(name.into(), symbols.into());
        self
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.predicates.get(name)
    }

    pub fn set(&self, name: &str) -> Option<&Arc<[String]>> {
        self.sets.get(name)
    }
}

/// Value bound to a `%n` placeholder at match time.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Matches a child equal to this value.
    Value(Value),
    /// Matches a symbol or string child contained in the list.
    Symbols(Vec<String>),
    /// Matches a node of this kind.
    Kind(NodeKind),
}

impl Param {
    pub fn sym(name: impl Into<String>) -> Self {
        Param::Value(Value::sym(name))
    }

    pub(crate) fn matches(&self, child: ChildRef<'_>) -> bool {
        match (self, child) {
            (Param::Value(expected), ChildRef::Value(actual)) => expected == actual,
            (Param::Symbols(names), ChildRef::Value(Value::Sym(s) | Value::Str(s))) => {
                names.iter().any(|n| n == s)
            }
            (Param::Kind(kind), ChildRef::Node(node)) => node.kind() == *kind,
            _ => false,
        }
    }
}
