//! Ruby front end: parses with tree-sitter and lowers the concrete syntax
//! tree into parser-gem shaped [`SyntaxTree`]s.
//!
//! tree-sitter-ruby does not track local variables, so the lowering keeps its
//! own scope stack to decide whether a bare identifier is an `lvar` or a
//! receiver-less `send`, the way the parser gem does.

use std::collections::HashSet;

use tree_sitter::{Node as TsNode, Parser};

use super::{Child, Loc, NodeId, NodeKind, ParseError, SourceParser, Span, SyntaxTree, TreeBuilder, Value};
use crate::rules::literal::interpret_string_escapes;

/// Maximum nesting depth during lowering; deeper sources are rejected.
pub const MAX_NESTING_DEPTH: usize = 256;

/// [`SourceParser`] for Ruby source code backed by `tree-sitter-ruby`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubyParser;

impl RubyParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for RubyParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_ruby::LANGUAGE.into())
            .map_err(|e| ParseError {
                line: 0,
                column: 0,
                message: format!("failed to load Ruby grammar: {e}"),
            })?;
        let tree = parser.parse(source, None).ok_or_else(|| ParseError {
            line: 0,
            column: 0,
            message: "parser returned no tree".to_string(),
        })?;

        let root = tree.root_node();
        if let Some(error) = first_error(root) {
            let position = error.start_position();
            let message = if error.is_missing() {
                format!("missing `{}`", error.kind())
            } else {
                "unexpected input".to_string()
            };
            return Err(ParseError {
                line: position.row + 1,
                column: position.column + 1,
                message,
            });
        }

        let mut lowerer = Lowerer::new(source);
        let statements = lowerer.named(root);
        let root_id = match lowerer.lower_body(&statements)? {
            Some(id) => id,
            None => lowerer
                .builder
                .push(NodeKind::Begin, Span::new(0, source.len()), Vec::new()),
        };
        Ok(lowerer.builder.finish(root_id, source))
    }
}

fn first_error(node: TsNode<'_>) -> Option<TsNode<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn span_of(node: TsNode<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn is_skipped(kind: &str) -> bool {
    matches!(
        kind,
        "comment" | "heredoc_body" | "empty_statement" | "uninterpreted" | "__END__"
    )
}

fn opt(id: Option<NodeId>) -> Child {
    id.map_or(Child::Value(Value::Nil), Child::Node)
}

struct Scope {
    names: HashSet<String>,
    hard: bool,
}

struct Lowerer<'s> {
    source: &'s str,
    builder: TreeBuilder,
    scopes: Vec<Scope>,
    depth: usize,
}

impl<'s> Lowerer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            builder: TreeBuilder::new(),
            scopes: vec![Scope {
                names: HashSet::new(),
                hard: true,
            }],
            depth: 0,
        }
    }

    fn text(&self, node: TsNode<'_>) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn named<'a>(&self, node: TsNode<'a>) -> Vec<TsNode<'a>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|child| !is_skipped(child.kind()))
            .collect()
    }

    fn error_at(&self, node: TsNode<'_>, message: impl Into<String>) -> ParseError {
        let position = node.start_position();
        ParseError {
            line: position.row + 1,
            column: position.column + 1,
            message: message.into(),
        }
    }

    fn push_scope(&mut self, hard: bool) {
        self.scopes.push(Scope {
            names: HashSet::new(),
            hard,
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains(name) {
                return true;
            }
            if scope.hard {
                break;
            }
        }
        false
    }

    fn push(&mut self, kind: NodeKind, span: Span, children: Vec<Child>) -> NodeId {
        self.builder.push(kind, span, children)
    }

    fn push_loc(&mut self, kind: NodeKind, span: Span, children: Vec<Child>, loc: Loc) -> NodeId {
        self.builder.push_with_loc(kind, span, children, loc)
    }

    /// Lower a statement list: nothing, a single statement, or a `begin`.
    fn lower_body(&mut self, nodes: &[TsNode<'_>]) -> Result<Option<NodeId>, ParseError> {
        let mut ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Some(id) = self.lower(*node)? {
                ids.push(id);
            }
        }
        Ok(match ids.len() {
            0 => None,
            1 => Some(ids[0]),
            _ => {
                let span = self.builder.span_of(ids[0]).join(self.builder.span_of(ids[ids.len() - 1]));
                Some(self.push(NodeKind::Begin, span, ids.into_iter().map(Child::Node).collect()))
            }
        })
    }

    /// Lower the statements held by a container node (`then`, `else`, `do`,
    /// `body_statement`, ...).
    fn lower_container(&mut self, node: Option<TsNode<'_>>) -> Result<Option<NodeId>, ParseError> {
        match node {
            Some(node) => {
                let statements = self.named(node);
                self.lower_body(&statements)
            }
            None => Ok(None),
        }
    }

    fn lower_required(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        match self.lower(node)? {
            Some(id) => Ok(id),
            None => Ok(self.push(NodeKind::Other("empty"), span_of(node), Vec::new())),
        }
    }

    fn lower_field(&mut self, node: TsNode<'_>, field: &str) -> Result<Option<NodeId>, ParseError> {
        match node.child_by_field_name(field) {
            Some(child) => self.lower(child),
            None => Ok(None),
        }
    }

    fn lower(&mut self, node: TsNode<'_>) -> Result<Option<NodeId>, ParseError> {
        if is_skipped(node.kind()) {
            return Ok(None);
        }
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_at(node, "nesting too deep"));
        }
        self.depth += 1;
        let result = self.lower_inner(node);
        self.depth -= 1;
        result.map(Some)
    }

    fn lower_inner(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let text = self.text(node);
        let id = match node.kind() {
            "identifier" => {
                if self.is_local(text) {
                    self.push(NodeKind::Lvar, span, vec![Value::sym(text).into()])
                } else {
                    let loc = Loc {
                        selector: Some(span),
                        ..Loc::default()
                    };
                    self.push_loc(
                        NodeKind::Send,
                        span,
                        vec![Value::Nil.into(), Value::sym(text).into()],
                        loc,
                    )
                }
            }
            "constant" => self.push(
                NodeKind::Const,
                span,
                vec![Value::Nil.into(), Value::sym(text).into()],
            ),
            "scope_resolution" => self.lower_scope_resolution(node)?,
            "self" => self.push(NodeKind::SelfRef, span, Vec::new()),
            "nil" => self.push(NodeKind::Nil, span, Vec::new()),
            "true" => self.push(NodeKind::True, span, Vec::new()),
            "false" => self.push(NodeKind::False, span, Vec::new()),
            "instance_variable" => self.push(NodeKind::Ivar, span, vec![Value::sym(text).into()]),
            "class_variable" => self.push(NodeKind::Cvar, span, vec![Value::sym(text).into()]),
            "global_variable" => self.push(NodeKind::Gvar, span, vec![Value::sym(text).into()]),
            "integer" => {
                let value = parse_integer(text).map_or_else(|| Value::str(text), Value::Int);
                self.push(NodeKind::Int, span, vec![value.into()])
            }
            "float" => {
                let value = text
                    .replace('_', "")
                    .parse::<f64>()
                    .map_or_else(|_| Value::str(text), Value::Float);
                self.push(NodeKind::Float, span, vec![value.into()])
            }
            "string" => self.lower_string(node)?,
            "character" => {
                let raw = text.strip_prefix('?').unwrap_or(text);
                let value = interpret_string_escapes(raw);
                self.push(NodeKind::Str, span, vec![Value::Str(value).into()])
            }
            "chained_string" => {
                let mut parts = Vec::new();
                for part in self.named(node) {
                    parts.push(Child::Node(self.lower_required(part)?));
                }
                self.push(NodeKind::Dstr, span, parts)
            }
            "bare_string" => self.push(NodeKind::Str, span, vec![Value::str(text).into()]),
            "simple_symbol" => {
                let name = text.strip_prefix(':').unwrap_or(text);
                self.push(NodeKind::Sym, span, vec![Value::sym(name).into()])
            }
            "hash_key_symbol" | "bare_symbol" => {
                self.push(NodeKind::Sym, span, vec![Value::sym(text).into()])
            }
            "delimited_symbol" => self.lower_delimited_symbol(node)?,
            "regex" => self.lower_regex(node)?,
            "array" | "string_array" | "symbol_array" => self.lower_array(node)?,
            "hash" => {
                let mut children = Vec::new();
                for child in self.named(node) {
                    children.push(Child::Node(self.lower_required(child)?));
                }
                let loc = Loc {
                    begin: Some(Span::new(span.start, span.start + 1)),
                    end: Some(Span::new(span.end.saturating_sub(1), span.end)),
                    ..Loc::default()
                };
                self.push_loc(NodeKind::Hash, span, children, loc)
            }
            "pair" => self.lower_pair(node)?,
            "splat_argument" => self.lower_wrapper(node, NodeKind::Splat)?,
            "hash_splat_argument" => self.lower_wrapper(node, NodeKind::Kwsplat)?,
            "block_argument" => self.lower_wrapper(node, NodeKind::BlockPass)?,
            "call" => self.lower_call(node)?,
            "element_reference" => self.lower_element_reference(node)?,
            "binary" => self.lower_binary(node)?,
            "unary" => self.lower_unary(node)?,
            "parenthesized_statements" => {
                let body: Vec<_> = self.named(node);
                let mut children = Vec::new();
                for statement in body {
                    if let Some(id) = self.lower(statement)? {
                        children.push(Child::Node(id));
                    }
                }
                let loc = Loc {
                    begin: Some(Span::new(span.start, span.start + 1)),
                    end: Some(Span::new(span.end.saturating_sub(1), span.end)),
                    ..Loc::default()
                };
                self.push_loc(NodeKind::Begin, span, children, loc)
            }
            "begin" => {
                let mut children = Vec::new();
                for statement in self.named(node) {
                    if let Some(id) = self.lower(statement)? {
                        children.push(Child::Node(id));
                    }
                }
                self.push(NodeKind::Kwbegin, span, children)
            }
            "pattern" | "superclass" | "in" => {
                let inner = self.named(node);
                match inner.first() {
                    Some(first) => self.lower_required(*first)?,
                    None => self.push(NodeKind::Other("empty"), span, Vec::new()),
                }
            }
            "assignment" => self.lower_assignment(node)?,
            "operator_assignment" => self.lower_operator_assignment(node)?,
            "if" | "elsif" | "conditional" => {
                let cond = self.lower_field(node, "condition")?;
                let then = self.lower_branch(node.child_by_field_name("consequence"))?;
                let otherwise = self.lower_branch(node.child_by_field_name("alternative"))?;
                self.push(NodeKind::If, span, vec![opt(cond), opt(then), opt(otherwise)])
            }
            "unless" => {
                let cond = self.lower_field(node, "condition")?;
                let then = self.lower_branch(node.child_by_field_name("consequence"))?;
                let otherwise = self.lower_branch(node.child_by_field_name("alternative"))?;
                self.push(NodeKind::If, span, vec![opt(cond), opt(otherwise), opt(then)])
            }
            "if_modifier" | "unless_modifier" => {
                let body = self.lower_field(node, "body")?;
                let cond = self.lower_field(node, "condition")?;
                let children = if node.kind() == "if_modifier" {
                    vec![opt(cond), opt(body), Value::Nil.into()]
                } else {
                    vec![opt(cond), Value::Nil.into(), opt(body)]
                };
                self.push(NodeKind::If, span, children)
            }
            "while" | "until" => {
                let kind = if node.kind() == "while" { NodeKind::While } else { NodeKind::Until };
                let cond = self.lower_field(node, "condition")?;
                let body = self.lower_container(node.child_by_field_name("body"))?;
                self.push(kind, span, vec![opt(cond), opt(body)])
            }
            "while_modifier" | "until_modifier" => {
                let kind = if node.kind() == "while_modifier" { NodeKind::While } else { NodeKind::Until };
                let body = self.lower_field(node, "body")?;
                let cond = self.lower_field(node, "condition")?;
                self.push(kind, span, vec![opt(cond), opt(body)])
            }
            "for" => self.lower_for(node)?,
            "case" => self.lower_case(node)?,
            "when" => {
                let mut children = Vec::new();
                let mut cursor = node.walk();
                let patterns: Vec<_> = node.children_by_field_name("pattern", &mut cursor).collect();
                for pattern in patterns {
                    children.push(Child::Node(self.lower_required(pattern)?));
                }
                let body = self.lower_container(node.child_by_field_name("body"))?;
                children.push(opt(body));
                self.push(NodeKind::When, span, children)
            }
            "method" => self.lower_method(node, false)?,
            "singleton_method" => self.lower_method(node, true)?,
            "class" => {
                let name = self.lower_field(node, "name")?;
                let superclass = self.lower_field(node, "superclass")?;
                self.push_scope(true);
                let body = self.lower_container(node.child_by_field_name("body"));
                self.pop_scope();
                self.push(NodeKind::Class, span, vec![opt(name), opt(superclass), opt(body?)])
            }
            "module" => {
                let name = self.lower_field(node, "name")?;
                self.push_scope(true);
                let body = self.lower_container(node.child_by_field_name("body"));
                self.pop_scope();
                self.push(NodeKind::Module, span, vec![opt(name), opt(body?)])
            }
            "singleton_class" => {
                let value = self.lower_field(node, "value")?;
                self.push_scope(true);
                let body = self.lower_container(node.child_by_field_name("body"));
                self.pop_scope();
                self.push(NodeKind::Sclass, span, vec![opt(value), opt(body?)])
            }
            "return" | "break" | "next" | "yield" => {
                let kind = match node.kind() {
                    "return" => NodeKind::Return,
                    "break" => NodeKind::Break,
                    "next" => NodeKind::Next,
                    _ => NodeKind::Yield,
                };
                let mut children = Vec::new();
                for child in self.named(node) {
                    if child.kind() == "argument_list" {
                        children.extend(self.lower_arguments(child)?);
                    } else {
                        children.push(Child::Node(self.lower_required(child)?));
                    }
                }
                self.push(kind, span, children)
            }
            "super" => self.push(NodeKind::Zsuper, span, Vec::new()),
            "range" => {
                let begin = self.lower_field(node, "begin")?;
                let end = self.lower_field(node, "end")?;
                let operator = node.child_by_field_name("operator");
                let exclusive = operator.is_some_and(|op| self.text(op) == "...");
                let kind = if exclusive { NodeKind::Erange } else { NodeKind::Irange };
                let loc = Loc {
                    operator: operator.map(span_of),
                    ..Loc::default()
                };
                self.push_loc(kind, span, vec![opt(begin), opt(end)], loc)
            }
            "interpolation" => {
                let mut children = Vec::new();
                for statement in self.named(node) {
                    if let Some(id) = self.lower(statement)? {
                        children.push(Child::Node(id));
                    }
                }
                self.push(NodeKind::Begin, span, children)
            }
            "block_parameters" | "method_parameters" | "lambda_parameters" => {
                self.lower_parameters(node)?
            }
            other => {
                let mut children = Vec::new();
                for child in self.named(node) {
                    if let Some(id) = self.lower(child)? {
                        children.push(Child::Node(id));
                    }
                }
                self.push(NodeKind::Other(other), span, children)
            }
        };
        Ok(id)
    }

    /// `then`/`else` hold statements; `elsif` is a nested `if`.
    fn lower_branch(&mut self, node: Option<TsNode<'_>>) -> Result<Option<NodeId>, ParseError> {
        match node {
            Some(branch) if branch.kind() == "elsif" => self.lower(branch),
            other => self.lower_container(other),
        }
    }

    fn lower_wrapper(&mut self, node: TsNode<'_>, kind: NodeKind) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        for child in self.named(node) {
            children.push(Child::Node(self.lower_required(child)?));
        }
        Ok(self.push(kind, span_of(node), children))
    }

    fn lower_scope_resolution(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let name = node
            .child_by_field_name("name")
            .map_or("", |n| self.text(n));
        let scope = match node.child_by_field_name("scope") {
            Some(scope) => Child::Node(self.lower_required(scope)?),
            None => {
                let cbase = self.push(NodeKind::Cbase, Span::new(span.start, span.start + 2), Vec::new());
                Child::Node(cbase)
            }
        };
        Ok(self.push(NodeKind::Const, span, vec![scope, Value::sym(name).into()]))
    }

    fn lower_string(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let text = self.text(node);
        let delimiters = string_delimiters(text);
        let loc = delimiters.map(|(open, close, _)| Loc {
            begin: Some(Span::new(span.start, span.start + open)),
            end: Some(Span::new(span.end - close, span.end)),
            ..Loc::default()
        });
        let double = delimiters.is_none_or(|(_, _, double)| double);
        let parts = self.named(node);

        if !parts.iter().any(|part| part.kind() == "interpolation") {
            let inner = match delimiters {
                Some((open, close, _)) => &text[open..text.len() - close],
                None => text,
            };
            let value = if double {
                interpret_string_escapes(inner)
            } else {
                unescape_single_quoted(inner)
            };
            return Ok(self.push_loc(
                NodeKind::Str,
                span,
                vec![Value::Str(value).into()],
                loc.unwrap_or_default(),
            ));
        }

        let children = self.lower_interpolated_parts(&parts, double)?;
        Ok(self.push_loc(NodeKind::Dstr, span, children, loc.unwrap_or_default()))
    }

    /// Merge runs of literal content into `str` parts; interpolations become
    /// `begin` parts.
    fn lower_interpolated_parts(
        &mut self,
        parts: &[TsNode<'_>],
        unescape: bool,
    ) -> Result<Vec<Child>, ParseError> {
        let mut children = Vec::new();
        let mut run: Option<Span> = None;
        for part in parts {
            if part.kind() == "interpolation" {
                if let Some(literal) = run.take() {
                    children.push(Child::Node(self.literal_part(literal, unescape)));
                }
                children.push(Child::Node(self.lower_required(*part)?));
            } else {
                let part_span = span_of(*part);
                run = Some(run.map_or(part_span, |s| s.join(part_span)));
            }
        }
        if let Some(literal) = run {
            children.push(Child::Node(self.literal_part(literal, unescape)));
        }
        Ok(children)
    }

    fn literal_part(&mut self, span: Span, unescape: bool) -> NodeId {
        let raw = &self.source[span.as_range()];
        let value = if unescape {
            interpret_string_escapes(raw)
        } else {
            raw.to_string()
        };
        self.push(NodeKind::Str, span, vec![Value::Str(value).into()])
    }

    fn lower_delimited_symbol(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let text = self.text(node);
        let parts = self.named(node);
        if parts.iter().any(|part| part.kind() == "interpolation") {
            let children = self.lower_interpolated_parts(&parts, true)?;
            return Ok(self.push(NodeKind::Dsym, span, children));
        }
        let (open, double) = if text.starts_with("%s") {
            (3, false)
        } else {
            (2, !text.starts_with(":'"))
        };
        let inner = text.get(open..text.len().saturating_sub(1)).unwrap_or("");
        let name = if double {
            interpret_string_escapes(inner)
        } else {
            unescape_single_quoted(inner)
        };
        Ok(self.push(NodeKind::Sym, span, vec![Value::Sym(name).into()]))
    }

    /// `(regexp (str "raw") (regopt :i))`, keeping the raw regexp source in
    /// the `str` parts.
    fn lower_regex(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let text = self.text(node);
        let (open, close) = regex_delimiters(text).unwrap_or((0, text.len()));
        let content = Span::new(span.start + open, span.start + close);
        let flags_start = (span.start + close + 1).min(span.end);
        let flags = &self.source[flags_start..span.end];

        let parts = self.named(node);
        let mut children = if parts.iter().any(|part| part.kind() == "interpolation") {
            self.lower_interpolated_parts(&parts, false)?
        } else if content.is_empty() {
            Vec::new()
        } else {
            vec![Child::Node(self.literal_part(content, false))]
        };

        let options = flags.chars().map(|flag| Value::sym(flag.to_string()).into()).collect();
        let regopt = self.push(NodeKind::Regopt, Span::new(flags_start, span.end), options);
        children.push(Child::Node(regopt));

        let loc = Loc {
            begin: Some(Span::new(span.start, span.start + open)),
            end: Some(Span::new(span.start + close, flags_start)),
            ..Loc::default()
        };
        Ok(self.push_loc(NodeKind::Regexp, span, children, loc))
    }

    fn lower_array(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let text = self.text(node);
        let mut children = Vec::new();
        for element in self.named(node) {
            children.push(Child::Node(self.lower_required(element)?));
        }
        let open = if text.starts_with('%') { 3 } else { 1 };
        let loc = Loc {
            begin: Some(Span::new(span.start, (span.start + open).min(span.end))),
            end: Some(Span::new(span.end.saturating_sub(1), span.end)),
            ..Loc::default()
        };
        Ok(self.push_loc(NodeKind::Array, span, children, loc))
    }

    fn lower_pair(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let key_node = node.child_by_field_name("key");
        let key = match key_node {
            Some(key) => Child::Node(self.lower_required(key)?),
            None => Value::Nil.into(),
        };
        let value_node = node.child_by_field_name("value");
        let value = match value_node {
            Some(value) => Child::Node(self.lower_required(value)?),
            None => Value::Nil.into(),
        };
        let operator = match (key_node, value_node) {
            (Some(key), Some(value)) => {
                let between = &self.source[key.end_byte()..value.start_byte()];
                between
                    .find("=>")
                    .map(|at| Span::new(key.end_byte() + at, key.end_byte() + at + 2))
                    .or_else(|| between.find(':').map(|at| Span::new(key.end_byte() + at, key.end_byte() + at + 1)))
            }
            _ => None,
        };
        let loc = Loc {
            operator,
            ..Loc::default()
        };
        Ok(self.push_loc(NodeKind::Pair, span, vec![key, value], loc))
    }

    /// Lower call arguments, wrapping trailing keyword pairs in a brace-less
    /// `hash` the way the parser gem does.
    fn lower_arguments(&mut self, list: TsNode<'_>) -> Result<Vec<Child>, ParseError> {
        let nodes = self.named(list);
        let block_pass_at = nodes
            .iter()
            .position(|n| n.kind() == "block_argument")
            .unwrap_or(nodes.len());
        let mut pairs_from = block_pass_at;
        while pairs_from > 0 && matches!(nodes[pairs_from - 1].kind(), "pair" | "hash_splat_argument") {
            pairs_from -= 1;
        }

        let mut children = Vec::with_capacity(nodes.len());
        for node in &nodes[..pairs_from] {
            children.push(Child::Node(self.lower_required(*node)?));
        }
        if pairs_from < block_pass_at {
            let mut pairs = Vec::new();
            for node in &nodes[pairs_from..block_pass_at] {
                pairs.push(Child::Node(self.lower_required(*node)?));
            }
            let span = span_of(nodes[pairs_from]).join(span_of(nodes[block_pass_at - 1]));
            children.push(Child::Node(self.push(NodeKind::Hash, span, pairs)));
        }
        for node in &nodes[block_pass_at..] {
            children.push(Child::Node(self.lower_required(*node)?));
        }
        Ok(children)
    }

    fn lower_call(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let receiver = node.child_by_field_name("receiver");
        let operator = node.child_by_field_name("operator");
        let method = node.child_by_field_name("method");
        let arguments = node.child_by_field_name("arguments");
        let block = node.child_by_field_name("block");

        let send_end = arguments
            .map(|a| a.end_byte())
            .or_else(|| method.map(|m| m.end_byte()))
            .or_else(|| operator.map(|o| o.end_byte()))
            .unwrap_or(span.end);
        let send_span = Span::new(span.start, send_end.min(span.end));

        let is_super = method.is_some_and(|m| m.kind() == "super") && receiver.is_none();
        let send = if is_super {
            let args = match arguments {
                Some(list) => self.lower_arguments(list)?,
                None => Vec::new(),
            };
            self.push(NodeKind::Super, send_span, args)
        } else {
            let recv = match receiver {
                Some(r) => Child::Node(self.lower_required(r)?),
                None => Value::Nil.into(),
            };
            let name = method.map_or("call", |m| self.text(m));
            let kind = if operator.is_some_and(|op| self.text(op) == "&.") {
                NodeKind::Csend
            } else {
                NodeKind::Send
            };
            let mut children = vec![recv, Value::sym(name).into()];
            let mut loc = Loc {
                selector: method.map(span_of),
                dot: operator.map(span_of),
                ..Loc::default()
            };
            if let Some(list) = arguments {
                if self.text(list).starts_with('(') {
                    let list_span = span_of(list);
                    loc.begin = Some(Span::new(list_span.start, list_span.start + 1));
                    loc.end = Some(Span::new(list_span.end - 1, list_span.end));
                }
                children.extend(self.lower_arguments(list)?);
            }
            self.push_loc(kind, send_span, children, loc)
        };

        match block {
            Some(block) => self.lower_block(span, send, block),
            None => Ok(send),
        }
    }

    fn lower_block(&mut self, span: Span, send: NodeId, block: TsNode<'_>) -> Result<NodeId, ParseError> {
        let block_span = span_of(block);
        let text = self.text(block);
        let (open, close) = if text.starts_with('{') { (1, 1) } else { (2, 3) };
        let loc = Loc {
            begin: Some(Span::new(block_span.start, block_span.start + open)),
            end: Some(Span::new(block_span.end.saturating_sub(close), block_span.end)),
            ..Loc::default()
        };

        self.push_scope(false);
        let result = self.lower_block_parts(block, block_span.start + open);
        self.pop_scope();
        let (args, body) = result?;

        Ok(self.push_loc(
            NodeKind::Block,
            span,
            vec![Child::Node(send), Child::Node(args), opt(body)],
            loc,
        ))
    }

    fn lower_block_parts(
        &mut self,
        block: TsNode<'_>,
        args_at: usize,
    ) -> Result<(NodeId, Option<NodeId>), ParseError> {
        let children = self.named(block);
        let parameters = block
            .child_by_field_name("parameters")
            .or_else(|| children.iter().copied().find(|n| n.kind() == "block_parameters"));
        let args = match parameters {
            Some(params) => self.lower_parameters(params)?,
            None => self.push(NodeKind::Args, Span::empty(args_at), Vec::new()),
        };
        let body_node = block.child_by_field_name("body").or_else(|| {
            children
                .iter()
                .copied()
                .find(|n| matches!(n.kind(), "block_body" | "body_statement"))
        });
        let body = self.lower_container(body_node)?;
        Ok((args, body))
    }

    fn lower_element_reference(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let object = node.child_by_field_name("object");
        let mut children = vec![match object {
            Some(object) => Child::Node(self.lower_required(object)?),
            None => Value::Nil.into(),
        }];
        children.push(Value::sym("[]").into());
        let object_id = object.map(|o| o.id());
        for index in self.named(node) {
            if Some(index.id()) == object_id {
                continue;
            }
            children.push(Child::Node(self.lower_required(index)?));
        }
        let selector_start = object.map_or(span.start, |o| o.end_byte());
        let loc = Loc {
            selector: Some(Span::new(selector_start, span.end)),
            begin: Some(Span::new(selector_start, (selector_start + 1).min(span.end))),
            end: Some(Span::new(span.end.saturating_sub(1), span.end)),
            ..Loc::default()
        };
        Ok(self.push_loc(NodeKind::Send, span, children, loc))
    }

    fn lower_binary(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");
        let operator = node.child_by_field_name("operator");
        let op = operator.map_or("", |o| self.text(o));

        let lhs = match left {
            Some(l) => Child::Node(self.lower_required(l)?),
            None => Value::Nil.into(),
        };
        let rhs = match right {
            Some(r) => Child::Node(self.lower_required(r)?),
            None => Value::Nil.into(),
        };
        let loc = Loc {
            operator: operator.map(span_of),
            selector: operator.map(span_of),
            ..Loc::default()
        };
        let id = match op {
            "&&" | "and" => self.push_loc(NodeKind::And, span, vec![lhs, rhs], loc),
            "||" | "or" => self.push_loc(NodeKind::Or, span, vec![lhs, rhs], loc),
            "=~" if left.is_some_and(|l| l.kind() == "regex") => {
                self.push_loc(NodeKind::MatchWithLvasgn, span, vec![lhs, rhs], loc)
            }
            _ => self.push_loc(NodeKind::Send, span, vec![lhs, Value::sym(op).into(), rhs], loc),
        };
        Ok(id)
    }

    fn lower_unary(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let operator = node.child_by_field_name("operator");
        let op = operator.map_or("", |o| self.text(o));
        let operand = node.child_by_field_name("operand");

        if op == "-" {
            if let Some(number) = operand.filter(|o| matches!(o.kind(), "integer" | "float")) {
                let digits = self.text(number);
                if number.kind() == "integer" {
                    if let Some(n) = parse_integer(digits) {
                        return Ok(self.push(NodeKind::Int, span, vec![Value::Int(-n).into()]));
                    }
                } else if let Ok(x) = digits.replace('_', "").parse::<f64>() {
                    return Ok(self.push(NodeKind::Float, span, vec![Value::Float(-x).into()]));
                }
            }
        }

        let inner = match operand {
            Some(o) => Child::Node(self.lower_required(o)?),
            None => Value::Nil.into(),
        };
        let loc = Loc {
            selector: operator.map(span_of),
            operator: operator.map(span_of),
            ..Loc::default()
        };
        let id = match op {
            "defined?" => self.push_loc(NodeKind::Defined, span, vec![inner], loc),
            "!" | "not" => self.push_loc(NodeKind::Send, span, vec![inner, Value::sym("!").into()], loc),
            "-" => self.push_loc(NodeKind::Send, span, vec![inner, Value::sym("-@").into()], loc),
            "+" => self.push_loc(NodeKind::Send, span, vec![inner, Value::sym("+@").into()], loc),
            other => self.push_loc(NodeKind::Send, span, vec![inner, Value::sym(other).into()], loc),
        };
        Ok(id)
    }

    /// Lower an assignment target. `value` is `None` for the targets of
    /// operator assignments, which the parser gem leaves without a value.
    fn lower_target(
        &mut self,
        target: TsNode<'_>,
        value: Option<Child>,
        span: Span,
    ) -> Result<NodeId, ParseError> {
        let name = self.text(target);
        let id = match target.kind() {
            "identifier" => {
                self.declare(name);
                self.push_target(NodeKind::Lvasgn, span, vec![Value::sym(name).into()], &value)
            }
            "instance_variable" => {
                self.push_target(NodeKind::Ivasgn, span, vec![Value::sym(name).into()], &value)
            }
            "global_variable" => {
                self.push_target(NodeKind::Gvasgn, span, vec![Value::sym(name).into()], &value)
            }
            "class_variable" => {
                self.push_target(NodeKind::Cvasgn, span, vec![Value::sym(name).into()], &value)
            }
            "constant" => self.push_target(
                NodeKind::Casgn,
                span,
                vec![Value::Nil.into(), Value::sym(name).into()],
                &value,
            ),
            "scope_resolution" => {
                let scope = match target.child_by_field_name("scope") {
                    Some(scope) => Child::Node(self.lower_required(scope)?),
                    None => Value::Nil.into(),
                };
                let const_name = target
                    .child_by_field_name("name")
                    .map_or(name, |n| self.text(n));
                self.push_target(NodeKind::Casgn, span, vec![scope, Value::sym(const_name).into()], &value)
            }
            "call" => {
                let recv = match target.child_by_field_name("receiver") {
                    Some(r) => Child::Node(self.lower_required(r)?),
                    None => Value::Nil.into(),
                };
                let method = target.child_by_field_name("method");
                let method_name = method.map_or("", |m| self.text(m));
                let safe = target
                    .child_by_field_name("operator")
                    .is_some_and(|op| self.text(op) == "&.");
                let kind = if safe { NodeKind::Csend } else { NodeKind::Send };
                let selector = if value.is_some() {
                    format!("{method_name}=")
                } else {
                    method_name.to_string()
                };
                let loc = Loc {
                    selector: method.map(span_of),
                    dot: target.child_by_field_name("operator").map(span_of),
                    ..Loc::default()
                };
                let mut children = vec![recv, Value::Sym(selector).into()];
                children.extend(value.clone());
                self.push_loc(kind, span, children, loc)
            }
            "element_reference" => {
                let object = target.child_by_field_name("object");
                let mut children = vec![match object {
                    Some(o) => Child::Node(self.lower_required(o)?),
                    None => Value::Nil.into(),
                }];
                let selector = if value.is_some() { "[]=" } else { "[]" };
                children.push(Value::sym(selector).into());
                let object_id = object.map(|o| o.id());
                for index in self.named(target) {
                    if Some(index.id()) != object_id {
                        children.push(Child::Node(self.lower_required(index)?));
                    }
                }
                children.extend(value.clone());
                self.push(NodeKind::Send, span, children)
            }
            "left_assignment_list" => {
                for identifier in collect_identifiers(target) {
                    let identifier = self.text(identifier).to_string();
                    self.declare(&identifier);
                }
                let mut children = Vec::new();
                for element in self.named(target) {
                    children.push(Child::Node(self.lower_required(element)?));
                }
                children.extend(value.clone());
                self.push(NodeKind::Other("mlhs"), span, children)
            }
            other => {
                let mut children = Vec::new();
                children.extend(value.clone());
                self.push(NodeKind::Other(other), span, children)
            }
        };
        Ok(id)
    }

    fn push_target(
        &mut self,
        kind: NodeKind,
        span: Span,
        mut children: Vec<Child>,
        value: &Option<Child>,
    ) -> NodeId {
        children.extend(value.clone());
        self.push(kind, span, children)
    }

    fn lower_assignment(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let Some(left) = node.child_by_field_name("left") else {
            return Err(self.error_at(node, "assignment without target"));
        };
        if left.kind() == "identifier" {
            let name = self.text(left).to_string();
            self.declare(&name);
        } else if left.kind() == "left_assignment_list" {
            for identifier in collect_identifiers(left) {
                let name = self.text(identifier).to_string();
                self.declare(&name);
            }
        }
        let value = match node.child_by_field_name("right") {
            Some(right) if right.kind() == "right_assignment_list" => {
                let mut elements = Vec::new();
                for element in self.named(right) {
                    elements.push(Child::Node(self.lower_required(element)?));
                }
                Child::Node(self.push(NodeKind::Array, span_of(right), elements))
            }
            Some(right) => Child::Node(self.lower_required(right)?),
            None => Value::Nil.into(),
        };
        if left.kind() == "left_assignment_list" {
            let targets = self.lower_target(left, None, span_of(left))?;
            return Ok(self.push(NodeKind::Other("masgn"), span, vec![Child::Node(targets), value]));
        }
        self.lower_target(left, Some(value), span)
    }

    fn lower_operator_assignment(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let Some(left) = node.child_by_field_name("left") else {
            return Err(self.error_at(node, "assignment without target"));
        };
        let operator = node.child_by_field_name("operator");
        let op = operator.map_or("", |o| self.text(o));
        let target = self.lower_target(left, None, span_of(left))?;
        let value = match node.child_by_field_name("right") {
            Some(right) => Child::Node(self.lower_required(right)?),
            None => Value::Nil.into(),
        };
        let loc = Loc {
            operator: operator.map(span_of),
            ..Loc::default()
        };
        let id = match op {
            "||=" => self.push_loc(NodeKind::OrAsgn, span, vec![Child::Node(target), value], loc),
            "&&=" => self.push_loc(NodeKind::AndAsgn, span, vec![Child::Node(target), value], loc),
            _ => {
                let binary = op.strip_suffix('=').unwrap_or(op);
                self.push_loc(
                    NodeKind::OpAsgn,
                    span,
                    vec![Child::Node(target), Value::sym(binary).into(), value],
                    loc,
                )
            }
        };
        Ok(id)
    }

    fn lower_for(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let var = match node.child_by_field_name("pattern") {
            Some(pattern) => Child::Node(self.lower_target(pattern, None, span_of(pattern))?),
            None => Value::Nil.into(),
        };
        let iterable = self.lower_field(node, "value")?;
        let body = self.lower_container(node.child_by_field_name("body"))?;
        Ok(self.push(NodeKind::For, span, vec![var, opt(iterable), opt(body)]))
    }

    fn lower_case(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let value_node = node.child_by_field_name("value");
        let value = match value_node {
            Some(v) => self.lower(v)?,
            None => None,
        };
        let mut children = vec![opt(value)];
        let mut otherwise = None;
        for child in self.named(node) {
            if Some(child.id()) == value_node.map(|v| v.id()) {
                continue;
            }
            match child.kind() {
                "when" => children.push(Child::Node(self.lower_required(child)?)),
                "else" => otherwise = self.lower_container(Some(child))?,
                _ => {}
            }
        }
        children.push(opt(otherwise));
        Ok(self.push(NodeKind::Case, span, children))
    }

    fn lower_method(&mut self, node: TsNode<'_>, singleton: bool) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let object = if singleton {
            Some(match node.child_by_field_name("object") {
                Some(object) => Child::Node(self.lower_required(object)?),
                None => Value::Nil.into(),
            })
        } else {
            None
        };
        let name_node = node.child_by_field_name("name");
        let name = name_node.map_or("", |n| self.text(n));

        self.push_scope(true);
        let result = self.lower_method_parts(node, name_node.map_or(span.start, |n| n.end_byte()));
        self.pop_scope();
        let (args, body) = result?;

        let mut children = Vec::with_capacity(4);
        let kind = match object {
            Some(object) => {
                children.push(object);
                NodeKind::Defs
            }
            None => NodeKind::Def,
        };
        children.push(Value::sym(name).into());
        children.push(Child::Node(args));
        children.push(opt(body));
        let loc = Loc {
            selector: name_node.map(span_of),
            ..Loc::default()
        };
        Ok(self.push_loc(kind, span, children, loc))
    }

    fn lower_method_parts(
        &mut self,
        node: TsNode<'_>,
        args_at: usize,
    ) -> Result<(NodeId, Option<NodeId>), ParseError> {
        let parameters = node.child_by_field_name("parameters");
        let args = match parameters {
            Some(params) => self.lower_parameters(params)?,
            None => self.push(NodeKind::Args, Span::empty(args_at), Vec::new()),
        };
        let body = match node.child_by_field_name("body") {
            Some(body) if body.kind() == "body_statement" => self.lower_container(Some(body))?,
            Some(body) => self.lower(body)?,
            None => {
                // Older grammars hang the statements directly off the method.
                let skip: Vec<usize> = [
                    node.child_by_field_name("name"),
                    parameters,
                    node.child_by_field_name("object"),
                ]
                .into_iter()
                .flatten()
                .map(|n| n.id())
                .collect();
                let statements: Vec<_> = self
                    .named(node)
                    .into_iter()
                    .filter(|n| !skip.contains(&n.id()))
                    .collect();
                self.lower_body(&statements)?
            }
        };
        Ok((args, body))
    }

    fn lower_parameters(&mut self, node: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(node);
        let mut children = Vec::new();
        for param in self.named(node) {
            children.push(Child::Node(self.lower_parameter(param)?));
        }
        Ok(self.push(NodeKind::Args, span, children))
    }

    fn lower_parameter(&mut self, param: TsNode<'_>) -> Result<NodeId, ParseError> {
        let span = span_of(param);
        let name = param
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        if let Some(name) = &name {
            self.declare(name);
        }
        let named = |name: Option<String>| -> Vec<Child> {
            name.map(|n| vec![Value::Sym(n).into()]).unwrap_or_default()
        };
        let id = match param.kind() {
            "identifier" => {
                let text = self.text(param).to_string();
                self.declare(&text);
                self.push(NodeKind::Arg, span, vec![Value::Sym(text).into()])
            }
            "optional_parameter" => {
                let mut children = named(name);
                children.push(opt(self.lower_field(param, "value")?));
                self.push(NodeKind::Optarg, span, children)
            }
            "keyword_parameter" => match param.child_by_field_name("value") {
                Some(value) => {
                    let mut children = named(name);
                    children.push(Child::Node(self.lower_required(value)?));
                    self.push(NodeKind::Kwoptarg, span, children)
                }
                None => self.push(NodeKind::Kwarg, span, named(name)),
            },
            "splat_parameter" => self.push(NodeKind::Restarg, span, named(name)),
            "hash_splat_parameter" => self.push(NodeKind::Kwrestarg, span, named(name)),
            "block_parameter" => self.push(NodeKind::Blockarg, span, named(name)),
            "destructured_parameter" => {
                let mut children = Vec::new();
                for inner in self.named(param) {
                    children.push(Child::Node(self.lower_parameter(inner)?));
                }
                self.push(NodeKind::Other("mlhs"), span, children)
            }
            other => self.push(NodeKind::Other(other), span, named(name)),
        };
        Ok(id)
    }
}

fn collect_identifiers(node: TsNode<'_>) -> Vec<TsNode<'_>> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "identifier" {
            found.push(current);
            continue;
        }
        if matches!(current.kind(), "call" | "element_reference") {
            continue;
        }
        let mut cursor = current.walk();
        stack.extend(current.named_children(&mut cursor));
    }
    found
}

/// Opening length, closing length and whether escapes are interpreted.
fn string_delimiters(text: &str) -> Option<(usize, usize, bool)> {
    let mut chars = text.chars();
    match chars.next()? {
        '"' => Some((1, 1, true)),
        '\'' => Some((1, 1, false)),
        '%' => match chars.next()? {
            'q' => Some((3, 1, false)),
            'Q' => Some((3, 1, true)),
            c if !c.is_alphanumeric() => Some((2, 1, true)),
            _ => None,
        },
        _ => None,
    }
    .filter(|(open, close, _)| open + close <= text.len())
}

/// Content bounds of a regexp literal: `(content_start, closing_index)`.
fn regex_delimiters(text: &str) -> Option<(usize, usize)> {
    let (open, closing) = if text.starts_with('/') {
        (1, '/')
    } else if let Some(rest) = text.strip_prefix("%r") {
        let opening = rest.chars().next()?;
        let closing = match opening {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            '<' => '>',
            other => other,
        };
        (2 + opening.len_utf8(), closing)
    } else {
        return None;
    };
    let close = text.rfind(closing)?;
    (close >= open).then_some((open, close))
}

fn unescape_single_quoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || next == '\'' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let cleaned = digits.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(dec) = lower.strip_prefix("0d") {
        dec.parse().ok()?
    } else if lower.len() > 1 && lower.starts_with('0') {
        i64::from_str_radix(&lower[1..], 8).ok()?
    } else {
        lower.parse().ok()?
    };
    Some(if negative { -value } else { value })
}
