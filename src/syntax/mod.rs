//! Read-only syntax tree consumed by the pattern matcher and the rules.
//!
//! Trees are stored in an arena ([`SyntaxTree`]) and handed out as cheap,
//! copyable [`Node`] views. Children are either nodes or terminal [`Value`]s,
//! following the layout of the Ruby `parser` gem:
//!
//! ```text
//! foo.bar(1)      =>  (send (lvar :foo) :bar (int 1))
//! puts            =>  (send nil :puts)
//! [1].map { |x| } =>  (block (send (array (int 1)) :map) (args (arg :x)) nil)
//! ```

mod kind;
pub mod ruby;

pub use kind::NodeKind;
pub use ruby::RubyParser;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Half-open byte range `[start, end)` into a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    /// Zero-width span at `offset`.
    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether two spans conflict when both are edited.
    ///
    /// Non-empty spans overlap when they share at least one byte. An empty
    /// span overlaps a span strictly containing its offset, and two empty
    /// spans overlap when they sit at the same offset.
    pub fn overlaps(self, other: Span) -> bool {
        if self.is_empty() && other.is_empty() {
            return self.start == other.start;
        }
        self.start < other.end && other.start < self.end
    }

    /// Smallest span covering both.
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn as_range(self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Terminal child value (method names, literal payloads, absent receivers).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Sym(String),
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn sym(name: impl Into<String>) -> Self {
        Value::Sym(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Value::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Sym(s) => write!(f, ":{s}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// Index of a node inside its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stored child slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(NodeId),
    Value(Value),
}

impl From<NodeId> for Child {
    fn from(id: NodeId) -> Self {
        Child::Node(id)
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        Child::Value(value)
    }
}

/// Named sub-ranges of a node, mirroring the parser gem's source maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loc {
    /// Method name of a call, or the `[...]` of an index call.
    pub selector: Option<Span>,
    /// `.`, `&.` or `::` of a call.
    pub dot: Option<Span>,
    /// Opening token: `(`, `[`, `{`, `do`, opening quote.
    pub begin: Option<Span>,
    /// Closing token: `)`, `]`, `}`, `end`, closing quote.
    pub end: Option<Span>,
    /// Operator token of binary expressions and assignments.
    pub operator: Option<Span>,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    span: Span,
    children: Vec<Child>,
    loc: Loc,
    parent: Option<NodeId>,
}

/// Immutable arena holding one parsed source buffer.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order, starting at the root.
    pub fn preorder(&self) -> Preorder<'_> {
        self.root().descendants()
    }

    /// Verify that child spans are contained in their parent and pairwise
    /// disjoint, and that parent links agree with child lists.
    ///
    /// Modifier forms (`body if cond`) keep the parser gem's child order, so
    /// disjointness is checked on spans sorted by offset.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (index, data) in self.nodes.iter().enumerate() {
            let mut spans = Vec::with_capacity(data.children.len());
            for child in &data.children {
                let Child::Node(id) = child else { continue };
                let child_data = &self.nodes[id.index()];
                if !data.span.contains(child_data.span) {
                    return Err(format!(
                        "{} at {} is not inside parent {} at {}",
                        child_data.kind, child_data.span, data.kind, data.span
                    ));
                }
                if child_data.parent.map(NodeId::index) != Some(index) {
                    return Err(format!(
                        "{} at {} has a stale parent link",
                        child_data.kind, child_data.span
                    ));
                }
                spans.push((child_data.span, child_data.kind));
            }
            spans.sort_by_key(|(span, _)| (span.start, span.end));
            for pair in spans.windows(2) {
                let ((left, _), (right, kind)) = (pair[0], pair[1]);
                if right.start < left.end {
                    return Err(format!("{kind} at {right} overlaps its previous sibling"));
                }
            }
        }
        Ok(())
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sexp())
    }
}

/// A child as seen through a [`Node`] view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildRef<'t> {
    Node(Node<'t>),
    Value(&'t Value),
}

impl<'t> ChildRef<'t> {
    pub fn as_node(self) -> Option<Node<'t>> {
        match self {
            ChildRef::Node(node) => Some(node),
            ChildRef::Value(_) => None,
        }
    }

    pub fn as_value(self) -> Option<&'t Value> {
        match self {
            ChildRef::Value(value) => Some(value),
            ChildRef::Node(_) => None,
        }
    }

    pub fn is_nil(self) -> bool {
        matches!(self, ChildRef::Value(Value::Nil))
    }

    pub fn as_sym(self) -> Option<&'t str> {
        self.as_value().and_then(Value::as_sym)
    }

    pub fn as_str(self) -> Option<&'t str> {
        self.as_value().and_then(Value::as_str)
    }
}

impl<'t> Node<'t> {
    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn tree(self) -> &'t SyntaxTree {
        self.tree
    }

    fn data(self) -> &'t NodeData {
        &self.tree.nodes[self.id.index()]
    }

    pub fn kind(self) -> NodeKind {
        self.data().kind
    }

    pub fn span(self) -> Span {
        self.data().span
    }

    pub fn loc(self) -> &'t Loc {
        &self.data().loc
    }

    /// Source text covered by this node.
    pub fn source(self) -> &'t str {
        &self.tree.source[self.span().as_range()]
    }

    pub fn parent(self) -> Option<Node<'t>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    pub fn children(self) -> impl ExactSizeIterator<Item = ChildRef<'t>> + 't {
        let tree = self.tree;
        self.data().children.iter().map(move |child| match child {
            Child::Node(id) => ChildRef::Node(tree.node(*id)),
            Child::Value(value) => ChildRef::Value(value),
        })
    }

    pub fn child_count(self) -> usize {
        self.data().children.len()
    }

    pub fn child(self, index: usize) -> Option<ChildRef<'t>> {
        let tree = self.tree;
        self.data().children.get(index).map(|child| match child {
            Child::Node(id) => ChildRef::Node(tree.node(*id)),
            Child::Value(value) => ChildRef::Value(value),
        })
    }

    /// Child at `index` if it is a node.
    pub fn child_node(self, index: usize) -> Option<Node<'t>> {
        self.child(index).and_then(ChildRef::as_node)
    }

    /// Only the node children, skipping terminal values.
    pub fn child_nodes(self) -> impl Iterator<Item = Node<'t>> + 't {
        self.children().filter_map(ChildRef::as_node)
    }

    pub fn ancestors(self) -> Ancestors<'t> {
        Ancestors { next: self.parent() }
    }

    /// This node and everything below it, in pre-order.
    pub fn descendants(self) -> Preorder<'t> {
        Preorder { stack: vec![self] }
    }

    pub fn is_call(self) -> bool {
        self.kind().is_call()
    }

    pub fn is_safe_navigation(self) -> bool {
        self.kind() == NodeKind::Csend
    }

    /// Receiver of a call, `None` for implicit self.
    pub fn receiver(self) -> Option<Node<'t>> {
        match self.kind() {
            NodeKind::Send | NodeKind::Csend => self.child_node(0),
            _ => None,
        }
    }

    pub fn method_name(self) -> Option<&'t str> {
        match self.kind() {
            NodeKind::Send | NodeKind::Csend => self.child(1).and_then(ChildRef::as_sym),
            NodeKind::Block => self.child_node(0).and_then(Node::method_name),
            _ => None,
        }
    }

    pub fn is_method(self, name: &str) -> bool {
        self.method_name() == Some(name)
    }

    /// Argument nodes of a call.
    pub fn arguments(self) -> Vec<Node<'t>> {
        if !self.is_call() {
            return Vec::new();
        }
        self.children().skip(2).filter_map(ChildRef::as_node).collect()
    }

    pub fn first_argument(self) -> Option<Node<'t>> {
        if !self.is_call() {
            return None;
        }
        self.child_node(2)
    }

    pub fn has_arguments(self) -> bool {
        self.is_call() && self.child_count() > 2
    }

    /// The `block` node this call is the send part of, if any.
    pub fn block_node(self) -> Option<Node<'t>> {
        let parent = self.parent()?;
        (parent.kind() == NodeKind::Block && parent.child_node(0) == Some(self)).then_some(parent)
    }

    /// The send part of a block node.
    pub fn send_node(self) -> Option<Node<'t>> {
        (self.kind() == NodeKind::Block).then(|| self.child_node(0)).flatten()
    }

    /// First terminal value, e.g. the payload of `str`, `sym`, `int`, `lvar`.
    pub fn value(self) -> Option<&'t Value> {
        self.child(0).and_then(ChildRef::as_value)
    }

    pub fn str_value(self) -> Option<&'t str> {
        match self.kind() {
            NodeKind::Str => self.value().and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn sym_value(self) -> Option<&'t str> {
        match self.kind() {
            NodeKind::Sym => self.value().and_then(Value::as_sym),
            _ => None,
        }
    }

    pub fn int_value(self) -> Option<i64> {
        match (self.kind(), self.value()) {
            (NodeKind::Int, Some(Value::Int(n))) => Some(*n),
            _ => None,
        }
    }

    pub fn is_basic_literal(self) -> bool {
        self.kind().is_basic_literal()
    }

    pub fn is_literal(self) -> bool {
        self.kind().is_literal()
    }

    pub fn is_variable(self) -> bool {
        self.kind().is_variable()
    }

    /// A literal whose every element is itself a literal: no variables,
    /// splats, calls or interpolation anywhere inside.
    pub fn is_recursive_basic_literal(self) -> bool {
        match self.kind() {
            kind if kind.is_basic_literal() && kind != NodeKind::Regexp => {
                if matches!(kind, NodeKind::Irange | NodeKind::Erange) {
                    self.child_nodes().all(Node::is_recursive_basic_literal)
                } else {
                    true
                }
            }
            NodeKind::Regexp => self
                .child_nodes()
                .all(|part| matches!(part.kind(), NodeKind::Str | NodeKind::Regopt)),
            NodeKind::Array | NodeKind::Hash | NodeKind::Pair | NodeKind::Begin => {
                self.child_nodes().all(Node::is_recursive_basic_literal)
            }
            NodeKind::Dstr | NodeKind::Dsym => {
                self.child_nodes().all(|part| part.kind() == NodeKind::Str)
            }
            _ => false,
        }
    }

    /// Whether this node is the receiver of a call (possibly further along
    /// the chain) whose name ends in `!` or is a known in-place mutator.
    pub fn is_mutated_by_chain(self) -> bool {
        let mut current = self;
        while let Some(parent) = current.parent() {
            if !parent.is_call() || parent.receiver() != Some(current) {
                return false;
            }
            if parent.method_name().is_some_and(is_destructive_method) {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Parser-gem style s-expression, handy in tests and debug logs.
    pub fn sexp(self) -> String {
        let mut out = String::new();
        write_sexp(self, &mut out);
        out
    }
}

fn write_sexp(node: Node<'_>, out: &mut String) {
    out.push('(');
    out.push_str(node.kind().name());
    for child in node.children() {
        out.push(' ');
        match child {
            ChildRef::Node(inner) => write_sexp(inner, out),
            ChildRef::Value(value) => out.push_str(&value.to_string()),
        }
    }
    out.push(')');
}

const DESTRUCTIVE_METHODS: &[&str] = &[
    "<<", "[]=", "clear", "concat", "delete", "delete_if", "fill", "insert", "keep_if",
    "merge!", "pop", "prepend", "push", "replace", "shift", "store", "unshift", "update",
];

fn is_destructive_method(name: &str) -> bool {
    name.ends_with('!') || DESTRUCTIVE_METHODS.contains(&name)
}

pub struct Ancestors<'t> {
    next: Option<Node<'t>>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Pre-order walk with an explicit stack, so deep trees cannot overflow.
pub struct Preorder<'t> {
    stack: Vec<Node<'t>>,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        let node = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(node.child_nodes());
        self.stack[start..].reverse();
        Some(node)
    }
}

/// Bottom-up constructor for [`SyntaxTree`]s.
///
/// Children must be pushed before their parent; parent links are filled in
/// by [`TreeBuilder::finish`].
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, span: Span, children: Vec<Child>) -> NodeId {
        self.push_with_loc(kind, span, children, Loc::default())
    }

    pub fn push_with_loc(
        &mut self,
        kind: NodeKind,
        span: Span,
        children: Vec<Child>,
        loc: Loc,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            span,
            children,
            loc,
            parent: None,
        });
        id
    }

    pub fn span_of(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn kind_of(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub fn finish(mut self, root: NodeId, source: impl Into<String>) -> SyntaxTree {
        for index in 0..self.nodes.len() {
            let children: Vec<NodeId> = self.nodes[index]
                .children
                .iter()
                .filter_map(|child| match child {
                    Child::Node(id) => Some(*id),
                    Child::Value(_) => None,
                })
                .collect();
            for child in children {
                self.nodes[child.index()].parent = Some(NodeId(index as u32));
            }
        }
        SyntaxTree {
            source: source.into(),
            nodes: self.nodes,
            root,
        }
    }
}

/// The source text could not be turned into a syntax tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Parser collaborator: turns source text into a [`SyntaxTree`].
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseError>;
}
