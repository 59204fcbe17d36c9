//! Node patterns: a small S-expression language for matching syntax trees.
//!
//! ```text
//! (send $_ :push $!(splat _))      a push call with one non-splat argument
//! {(send _ :match? $_) match_with_lvasgn}
//! (block (call _ {:select :filter}) ...)
//! ```
//!
//! Patterns are compiled once, typically in a rule's constructor, and are
//! immutable afterwards. See [`Pattern::compile`] for the grammar.

mod env;
mod error;
mod lexer;
mod matcher;
mod parser;

pub use env::{Param, PatternEnv, Predicate};
pub use error::{PatternErrorKind, PatternSyntaxError, PredicateError};

use std::sync::Arc;

use crate::syntax::{ChildRef, Node, Value};
use matcher::Matcher;
use parser::PatternNode;

/// A compiled node pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    root: PatternNode,
    capture_count: usize,
    names: Arc<[(String, usize)]>,
}

impl Pattern {
    /// Compile a pattern that uses no external predicates or sets.
    ///
    /// | syntax | meaning |
    /// |---|---|
    /// | `_`, `_name` | any child |
    /// | `send`, `str`, `call` | node kind (`call` is `send` or `csend`) |
    /// | `(head child...)` | node whose children match in order |
    /// | `{a b}` / `[a b]` | union (first match wins) / intersection |
    /// | `!p`, `$p`, `^p`, `` `p `` | negation, capture, parent, descendant |
    /// | `...`, `p?`, `p*`, `p+` | variadic sequence elements |
    /// | `:sym`, `"str"`, `1`, `nil` | literal child values |
    /// | `nil?`, `send_type?`, `literal?` | built-in predicates |
    /// | `#name`, `%SET`, `CONST`, `%1` | environment predicates, sets, params |
    pub fn compile(source: &str) -> Result<Self, PatternSyntaxError> {
        Self::compile_with(source, &PatternEnv::default())
    }

    pub fn compile_with(source: &str, env: &PatternEnv) -> Result<Self, PatternSyntaxError> {
        let compiled = parser::compile(source, env)?;
        Ok(Self {
            source: source.to_string(),
            root: compiled.root,
            capture_count: compiled.capture_count,
            names: compiled.names.into(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn capture_count(&self) -> usize {
        self.capture_count
    }

    pub fn matches<'t>(&self, node: Node<'t>) -> MatchResult<'t> {
        self.match_with(node, &[])
    }

    pub fn is_match(&self, node: Node<'_>) -> bool {
        self.matches(node).is_match()
    }

    /// Match with values for the `%1`, `%2`, ... placeholders.
    ///
    /// Predicate failures and missing parameters are logged and reported as
    /// [`MatchResult::NoMatch`].
    pub fn match_with<'t>(&self, node: Node<'t>, params: &[Param]) -> MatchResult<'t> {
        self.match_child(ChildRef::Node(node), params)
    }

    pub fn match_child<'t>(&self, child: ChildRef<'t>, params: &[Param]) -> MatchResult<'t> {
        let mut matcher = Matcher::new(params);
        match matcher.matches(&self.root, child) {
            Ok(true) => MatchResult::Matched(Captures {
                values: matcher.into_captures(self.capture_count),
                names: Arc::clone(&self.names),
            }),
            Ok(false) => MatchResult::NoMatch,
            Err(error) => {
                tracing::warn!(pattern = %self.source, %error, "pattern evaluation failed");
                MatchResult::NoMatch
            }
        }
    }
}

#[derive(Debug)]
pub enum MatchResult<'t> {
    NoMatch,
    Matched(Captures<'t>),
}

impl<'t> MatchResult<'t> {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    pub fn captures(&self) -> Option<&Captures<'t>> {
        match self {
            MatchResult::Matched(captures) => Some(captures),
            MatchResult::NoMatch => None,
        }
    }

    pub fn into_captures(self) -> Option<Captures<'t>> {
        match self {
            MatchResult::Matched(captures) => Some(captures),
            MatchResult::NoMatch => None,
        }
    }
}

/// What a `$` capture bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture<'t> {
    Single(ChildRef<'t>),
    /// Variadic elements (`$...`, `$_*`, `$_?`) bind every child they took.
    Multiple(Vec<ChildRef<'t>>),
}

impl<'t> Capture<'t> {
    pub fn as_child(&self) -> Option<ChildRef<'t>> {
        match self {
            Capture::Single(child) => Some(*child),
            Capture::Multiple(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<Node<'t>> {
        self.as_child().and_then(ChildRef::as_node)
    }

    pub fn as_value(&self) -> Option<&'t Value> {
        self.as_child().and_then(ChildRef::as_value)
    }

    pub fn as_sym(&self) -> Option<&'t str> {
        self.as_child().and_then(ChildRef::as_sym)
    }

    /// Node children of a variadic capture.
    pub fn nodes(&self) -> Vec<Node<'t>> {
        match self {
            Capture::Single(child) => child.as_node().into_iter().collect(),
            Capture::Multiple(children) => children.iter().filter_map(|c| c.as_node()).collect(),
        }
    }
}

/// Captures of a successful match, in `$` order.
#[derive(Debug, Clone)]
pub struct Captures<'t> {
    values: Vec<Option<Capture<'t>>>,
    names: Arc<[(String, usize)]>,
}

impl<'t> Captures<'t> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Capture `index`; `None` when the capture sat in a union branch or
    /// optional element that did not bind.
    pub fn get(&self, index: usize) -> Option<&Capture<'t>> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn node(&self, index: usize) -> Option<Node<'t>> {
        self.get(index).and_then(Capture::as_node)
    }

    pub fn sym(&self, index: usize) -> Option<&'t str> {
        self.get(index).and_then(Capture::as_sym)
    }

    pub fn nodes(&self, index: usize) -> Vec<Node<'t>> {
        self.get(index).map(Capture::nodes).unwrap_or_default()
    }

    /// Capture written as `$_name`.
    pub fn named(&self, name: &str) -> Option<&Capture<'t>> {
        let (_, index) = self.names.iter().find(|(n, _)| n == name)?;
        self.get(*index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Loc, NodeKind, Span, SyntaxTree, TreeBuilder};

    fn sym(name: &str) -> crate::syntax::Child {
        Value::sym(name).into()
    }

    /// `str.match?(/re/)` style call: `(send (lvar :str) :<method> args...)`.
    fn call(method: &str, arg: Option<i64>) -> SyntaxTree {
        let mut b = TreeBuilder::new();
        let recv = b.push(NodeKind::Lvar, Span::new(0, 3), vec![sym("str")]);
        let mut children = vec![recv.into(), sym(method)];
        if let Some(n) = arg {
            children.push(b.push(NodeKind::Int, Span::new(11, 12), vec![Value::Int(n).into()]).into());
        }
        let send = b.push_with_loc(
            NodeKind::Send,
            Span::new(0, 13),
            children,
            Loc {
                selector: Some(Span::new(4, 4 + method.len())),
                ..Loc::default()
            },
        );
        b.finish(send, "str.xxxxxxx(1)")
    }

    /// `[1, 2, 3].count`
    fn array_count() -> SyntaxTree {
        let mut b = TreeBuilder::new();
        let ints: Vec<_> = (1..=3)
            .map(|n| {
                let at = 1 + 3 * (n as usize - 1);
                b.push(NodeKind::Int, Span::new(at, at + 1), vec![Value::Int(n).into()]).into()
            })
            .collect();
        let array = b.push(NodeKind::Array, Span::new(0, 9), ints);
        let send = b.push(NodeKind::Send, Span::new(0, 15), vec![array.into(), sym("count")]);
        b.finish(send, "[1, 2, 3].count")
    }

    #[test]
    fn test_alternation_first_matching_branch_wins() {
        let tree = call("match?", None);
        let pattern = Pattern::compile("{(send $_ :match :=~) (send $_ :match?)}").unwrap();
        let captures = pattern.matches(tree.root()).into_captures().unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures.node(0).map(|n| n.source()), Some("str"));
    }

    #[test]
    fn test_matching_is_idempotent() {
        let tree = array_count();
        let pattern = Pattern::compile("(send $(array $...) :count)").unwrap();
        let first = pattern.matches(tree.root()).into_captures().unwrap();
        let second = pattern.matches(tree.root()).into_captures().unwrap();
        assert_eq!(first.node(0), second.node(0));
        assert_eq!(first.nodes(1), second.nodes(1));
        assert_eq!(first.nodes(1).len(), 3);
    }

    #[test]
    fn test_sequence_arity() {
        let tree = call("push", Some(1));
        assert!(Pattern::compile("(send _ :push _)").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("(send _ :push)").unwrap().is_match(tree.root()));
        assert!(Pattern::compile("(send _ :push ...)").unwrap().is_match(tree.root()));
        assert!(Pattern::compile("(send _ :push _?)").unwrap().is_match(tree.root()));
        assert!(Pattern::compile("(send _ :push int+)").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("(send _ :push str*)").unwrap().is_match(tree.root()));
        assert!(Pattern::compile("(send _ _ ... (int 1))").unwrap().is_match(tree.root()));
    }

    #[test]
    fn test_literal_values() {
        let tree = call("push", Some(1));
        assert!(Pattern::compile("(send _ :push (int 1))").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("(send _ :push (int 2))").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("(send nil :push _)").unwrap().is_match(tree.root()));
        assert!(Pattern::compile("(send !nil? :push _)").unwrap().is_match(tree.root()));
    }

    #[test]
    fn test_intersection_and_negation() {
        let tree = array_count();
        assert!(Pattern::compile("(send [!nil? array_type?] :count)").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("(send !array :count)").unwrap().is_match(tree.root()));
        assert!(Pattern::compile("(send recursive_basic_literal? :count)").unwrap().is_match(tree.root()));
    }

    #[test]
    fn test_parent_and_descendant() {
        let tree = array_count();
        let array = tree.root().receiver().unwrap();
        assert!(Pattern::compile("^(send _ :count)").unwrap().is_match(array));
        assert!(Pattern::compile("`(int 3)").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("`(int 4)").unwrap().is_match(tree.root()));
    }

    #[test]
    fn test_sets_and_params() {
        let env = PatternEnv::new().with_set("COUNTERS", ["count", "length", "size"]);
        let tree = array_count();
        let pattern = Pattern::compile_with("(send _ COUNTERS)", &env).unwrap();
        assert!(pattern.is_match(tree.root()));

        let pattern = Pattern::compile("(send _ %1)").unwrap();
        assert!(pattern.match_with(tree.root(), &[Param::sym("count")]).is_match());
        assert!(!pattern.match_with(tree.root(), &[Param::sym("size")]).is_match());
        let names = Param::Symbols(vec!["size".into(), "count".into()]);
        assert!(pattern.match_with(tree.root(), &[names]).is_match());
    }

    #[test]
    fn test_missing_param_fails_closed() {
        let tree = array_count();
        let pattern = Pattern::compile("(send _ %2)").unwrap();
        assert!(!pattern.match_with(tree.root(), &[Param::sym("count")]).is_match());
    }

    #[test]
    fn test_external_predicate_with_arguments() {
        let env = PatternEnv::new()
            .with_predicate("min_size?", |child, args| {
                let min = match args.first() {
                    Some(Value::Int(n)) => *n as usize,
                    _ => return Err(PredicateError::failed("min_size?", "expected an integer")),
                };
                Ok(child.as_node().is_some_and(|n| n.child_count() >= min))
            })
            .with_predicate("explode", |_, _| Err(PredicateError::failed("explode", "boom")));
        let tree = array_count();
        let array = tree.root().receiver().unwrap();

        assert!(Pattern::compile_with("#min_size?(3)", &env).unwrap().is_match(array));
        assert!(!Pattern::compile_with("#min_size?(4)", &env).unwrap().is_match(array));
        assert!(!Pattern::compile_with("#min_size?", &env).unwrap().is_match(array));
        assert!(!Pattern::compile_with("#explode", &env).unwrap().is_match(array));
    }

    #[test]
    fn test_named_capture() {
        let tree = call("match?", None);
        let pattern = Pattern::compile("(send $_recv $_method)").unwrap();
        let captures = pattern.matches(tree.root()).into_captures().unwrap();
        assert_eq!(captures.named("recv").and_then(Capture::as_node).map(|n| n.source()), Some("str"));
        assert_eq!(captures.named("method").and_then(Capture::as_sym), Some("match?"));
        assert!(captures.named("other").is_none());
    }

    #[test]
    fn test_call_kind_group() {
        let tree = call("push", Some(1));
        assert!(Pattern::compile("(call _ :push _)").unwrap().is_match(tree.root()));
        assert!(!Pattern::compile("(csend _ :push _)").unwrap().is_match(tree.root()));
    }

    #[test]
    fn test_failed_union_branch_releases_captures() {
        let tree = call("push", Some(1));
        let pattern = Pattern::compile("{(send $_ :pop _) (send _ :push $_)}").unwrap();
        let captures = pattern.matches(tree.root()).into_captures().unwrap();
        assert_eq!(captures.node(0).and_then(|n| n.int_value()), Some(1));
    }

    #[test]
    fn test_failed_descendant_candidates_release_captures() {
        let tree = array_count();
        let pattern = Pattern::compile("`[$int (int 3)]").unwrap();
        let captures = pattern.matches(tree.root()).into_captures().unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures.node(0).and_then(|n| n.int_value()), Some(3));
    }
}
