//! Structural matching of compiled patterns against syntax nodes.

use super::env::Param;
use super::error::PredicateError;
use super::parser::{Arity, Element, PatternNode, PredicateArg};
use super::Capture;
use crate::syntax::{ChildRef, Node, Value};

pub(crate) struct Matcher<'p, 't> {
    params: &'p [Param],
    /// Bindings in the order they were made. Backtracking truncates back
    /// to a mark, so a failed branch costs no copy.
    bindings: Vec<(usize, Capture<'t>)>,
}

impl<'p, 't> Matcher<'p, 't> {
    pub(crate) fn new(params: &'p [Param]) -> Self {
        Self {
            params,
            bindings: Vec::new(),
        }
    }

    /// Capture slots after a successful match; later bindings win.
    pub(crate) fn into_captures(self, capture_count: usize) -> Vec<Option<Capture<'t>>> {
        let mut values = Vec::with_capacity(capture_count);
        values.resize_with(capture_count, || None);
        for (slot, capture) in self.bindings {
            if let Some(value) = values.get_mut(slot) {
                *value = Some(capture);
            }
        }
        values
    }

    fn bind(&mut self, slot: usize, capture: Capture<'t>) {
        self.bindings.push((slot, capture));
    }

    pub(crate) fn matches(
        &mut self,
        pattern: &PatternNode,
        child: ChildRef<'t>,
    ) -> Result<bool, PredicateError> {
        let matched = match pattern {
            PatternNode::Wildcard => true,
            PatternNode::Kind(kind) => child.as_node().is_some_and(|n| n.kind() == *kind),
            PatternNode::KindGroup(kinds) => {
                child.as_node().is_some_and(|n| kinds.contains(&n.kind()))
            }
            PatternNode::Literal(expected) => child.as_value().is_some_and(|v| v == expected),
            PatternNode::Capture { index, inner } => {
                if !self.matches(inner, child)? {
                    return Ok(false);
                }
                self.bind(*index, Capture::Single(child));
                true
            }
            PatternNode::Sequence { head, elements } => {
                let Some(node) = child.as_node() else {
                    return Ok(false);
                };
                self.matches(head, child)? && self.match_children(node, elements)?
            }
            PatternNode::Union(branches) => {
                let mark = self.bindings.len();
                for branch in branches {
                    if self.matches(branch, child)? {
                        return Ok(true);
                    }
                    self.bindings.truncate(mark);
                }
                false
            }
            PatternNode::Intersection(terms) => {
                for term in terms {
                    if !self.matches(term, child)? {
                        return Ok(false);
                    }
                }
                true
            }
            PatternNode::Negation(inner) => !self.matches(inner, child)?,
            PatternNode::Parent(inner) => match child.as_node().and_then(Node::parent) {
                Some(parent) => self.matches(inner, ChildRef::Node(parent))?,
                None => false,
            },
            PatternNode::Descendant(inner) => match child {
                ChildRef::Node(node) => {
                    let mark = self.bindings.len();
                    for candidate in node.descendants() {
                        if self.matches(inner, ChildRef::Node(candidate))? {
                            return Ok(true);
                        }
                        self.bindings.truncate(mark);
                    }
                    false
                }
                ChildRef::Value(_) => self.matches(inner, child)?,
            },
            PatternNode::Builtin(builtin) => builtin.test(child),
            PatternNode::External {
                name,
                predicate,
                args,
            } => {
                let values = self.resolve_args(args)?;
                predicate.call(child, &values).map_err(|e| match e {
                    PredicateError::Failed { message, .. } => PredicateError::Failed {
                        name: name.clone(),
                        message,
                    },
                    other => other,
                })?
            }
            PatternNode::Set(symbols) => match child.as_value() {
                Some(Value::Sym(s) | Value::Str(s)) => symbols.iter().any(|candidate| candidate == s),
                _ => false,
            },
            PatternNode::Param(index) => self.param(*index)?.matches(child),
        };
        Ok(matched)
    }

    fn param(&self, index: usize) -> Result<&'p Param, PredicateError> {
        self.params
            .get(index - 1)
            .ok_or(PredicateError::MissingParam(index))
    }

    fn resolve_args(&self, args: &[PredicateArg]) -> Result<Vec<Value>, PredicateError> {
        args.iter()
            .map(|arg| match arg {
                PredicateArg::Value(value) => Ok(value.clone()),
                PredicateArg::Param(index) => match self.param(*index)? {
                    Param::Value(value) => Ok(value.clone()),
                    _ => Err(PredicateError::UnsupportedParam(*index)),
                },
            })
            .collect()
    }

    /// Fixed elements before the variadic one match from the front, those
    /// after it from the back; the variadic element takes what is left.
    fn match_children(
        &mut self,
        node: Node<'t>,
        elements: &[Element],
    ) -> Result<bool, PredicateError> {
        let count = node.child_count();
        let variadic = elements.iter().position(|e| e.arity.is_variadic());

        let Some(at) = variadic else {
            if count != elements.len() {
                return Ok(false);
            }
            for (index, element) in elements.iter().enumerate() {
                if !self.match_one(element, node, index)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        };

        let (before, rest) = elements.split_at(at);
        let (element, after) = (&rest[0], &rest[1..]);
        let fixed = before.len() + after.len();
        if count < fixed {
            return Ok(false);
        }
        let taken = count - fixed;
        let (min, max) = element.arity.bounds();
        if taken < min || taken > max {
            return Ok(false);
        }

        for (index, fixed) in before.iter().enumerate() {
            if !self.match_one(fixed, node, index)? {
                return Ok(false);
            }
        }
        let tail_start = before.len() + taken;
        for (offset, fixed) in after.iter().enumerate() {
            if !self.match_one(fixed, node, tail_start + offset)? {
                return Ok(false);
            }
        }

        let mut bound = element.capture.map(|_| Vec::with_capacity(taken));
        for index in before.len()..tail_start {
            let Some(child) = node.child(index) else {
                return Ok(false);
            };
            if element.arity != Arity::Rest && !self.matches(&element.node, child)? {
                return Ok(false);
            }
            if let Some(list) = bound.as_mut() {
                list.push(child);
            }
        }
        if let (Some(slot), Some(list)) = (element.capture, bound) {
            self.bind(slot, Capture::Multiple(list));
        }
        Ok(true)
    }

    fn match_one(
        &mut self,
        element: &Element,
        node: Node<'t>,
        index: usize,
    ) -> Result<bool, PredicateError> {
        let Some(child) = node.child(index) else {
            return Ok(false);
        };
        if !self.matches(&element.node, child)? {
            return Ok(false);
        }
        if let Some(slot) = element.capture {
            self.bind(slot, Capture::Single(child));
        }
        Ok(true)
    }
}
