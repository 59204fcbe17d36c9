//! Recursive-descent compiler from pattern tokens to [`PatternNode`]s.

use std::sync::Arc;

use super::env::{PatternEnv, Predicate};
use super::error::{PatternErrorKind, PatternSyntaxError};
use super::lexer::{tokenize, Spanned, Token};
use crate::syntax::{ChildRef, Node, NodeKind, Value};

const CALL_KINDS: &[NodeKind] = &[NodeKind::Send, NodeKind::Csend];
const RANGE_KINDS: &[NodeKind] = &[NodeKind::Irange, NodeKind::Erange];

#[derive(Debug, Clone)]
pub(crate) enum PatternNode {
    Wildcard,
    Kind(NodeKind),
    KindGroup(&'static [NodeKind]),
    Literal(Value),
    Capture {
        index: usize,
        inner: Box<PatternNode>,
    },
    Sequence {
        head: Box<PatternNode>,
        elements: Vec<Element>,
    },
    Union(Vec<PatternNode>),
    Intersection(Vec<PatternNode>),
    Negation(Box<PatternNode>),
    Parent(Box<PatternNode>),
    Descendant(Box<PatternNode>),
    Builtin(Builtin),
    External {
        name: String,
        predicate: Predicate,
        args: Vec<PredicateArg>,
    },
    Set(Arc<[String]>),
    Param(usize),
}

#[derive(Debug, Clone)]
pub(crate) enum PredicateArg {
    Value(Value),
    Param(usize),
}

/// One child slot of a sequence.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub node: PatternNode,
    pub arity: Arity,
    /// Capture slot bound to the matched child, or to the list of children
    /// for variadic elements.
    pub capture: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
    Rest,
}

impl Arity {
    pub(crate) fn is_variadic(self) -> bool {
        self != Arity::One
    }

    pub(crate) fn bounds(self) -> (usize, usize) {
        match self {
            Arity::One => (1, 1),
            Arity::Optional => (0, 1),
            Arity::ZeroOrMore | Arity::Rest => (0, usize::MAX),
            Arity::OneOrMore => (1, usize::MAX),
        }
    }
}

/// Node predicates available as `name?` without any environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Nil,
    KindIs(NodeKind),
    Call,
    Numeric,
    Range,
    Literal,
    BasicLiteral,
    RecursiveBasicLiteral,
    Variable,
    LoopKeyword,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "nil?" => Builtin::Nil,
            "call_type?" => Builtin::Call,
            "numeric_type?" => Builtin::Numeric,
            "range_type?" => Builtin::Range,
            "literal?" => Builtin::Literal,
            "basic_literal?" => Builtin::BasicLiteral,
            "recursive_basic_literal?" => Builtin::RecursiveBasicLiteral,
            "variable?" => Builtin::Variable,
            "loop_keyword?" => Builtin::LoopKeyword,
            other => {
                let kind = other.strip_suffix("_type?").and_then(NodeKind::from_name)?;
                Builtin::KindIs(kind)
            }
        };
        Some(builtin)
    }

    pub(crate) fn test(self, child: ChildRef<'_>) -> bool {
        let node = match child {
            ChildRef::Value(value) => return self == Builtin::Nil && value.is_nil(),
            ChildRef::Node(node) => node,
        };
        match self {
            Builtin::Nil => false,
            Builtin::KindIs(kind) => node.kind() == kind,
            Builtin::Call => node.is_call(),
            Builtin::Numeric => node.kind().is_numeric(),
            Builtin::Range => RANGE_KINDS.contains(&node.kind()),
            Builtin::Literal => node.is_literal(),
            Builtin::BasicLiteral => node.is_basic_literal(),
            Builtin::RecursiveBasicLiteral => Node::is_recursive_basic_literal(node),
            Builtin::Variable => node.is_variable(),
            Builtin::LoopKeyword => node.kind().is_loop(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Compiled {
    pub root: PatternNode,
    pub capture_count: usize,
    pub names: Vec<(String, usize)>,
}

pub(crate) fn compile(src: &str, env: &PatternEnv) -> Result<Compiled, PatternSyntaxError> {
    let error = |kind: PatternErrorKind, offset: usize| PatternSyntaxError {
        kind,
        offset,
        pattern: src.to_string(),
    };
    let tokens = tokenize(src).map_err(|(kind, offset)| error(kind, offset))?;
    let mut compiler = Compiler {
        tokens,
        pos: 0,
        env,
        captures: 0,
        names: Vec::new(),
        end: src.len(),
    };
    let result = compiler.compile_root();
    result
        .map(|root| Compiled {
            root,
            capture_count: compiler.captures,
            names: compiler.names,
        })
        .map_err(|(kind, offset)| error(kind, offset))
}

type CompileResult<T> = Result<T, (PatternErrorKind, usize)>;

struct Compiler<'e> {
    tokens: Vec<Spanned>,
    pos: usize,
    env: &'e PatternEnv,
    captures: usize,
    names: Vec<(String, usize)>,
    end: usize,
}

impl Compiler<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn compile_root(&mut self) -> CompileResult<PatternNode> {
        if self.tokens.is_empty() {
            return Err((PatternErrorKind::Empty, 0));
        }
        let root = self.term(false)?;
        if let Some(extra) = self.peek() {
            let kind = match extra.token {
                Token::RParen => PatternErrorKind::Unbalanced(')'),
                Token::RBrace => PatternErrorKind::Unbalanced('}'),
                Token::RBracket => PatternErrorKind::Unbalanced(']'),
                Token::Question | Token::Star | Token::Plus => {
                    PatternErrorKind::QuantifierOutsideSequence
                }
                ref other => PatternErrorKind::TrailingInput(other.describe()),
            };
            return Err((kind, extra.start));
        }
        Ok(root)
    }

    fn new_capture(&mut self) -> CompileResult<(usize, Option<String>)> {
        let index = self.captures;
        self.captures += 1;
        let name = match self.peek() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) if name.starts_with('_') && name.len() > 1 => Some(name[1..].to_string()),
            _ => None,
        };
        if let Some(name) = &name {
            if !self.names.iter().any(|(n, _)| n == name) {
                self.names.push((name.clone(), index));
            }
        }
        Ok((index, name))
    }

    /// One pattern term. `head` is set for the first term of a sequence,
    /// where `nil`, `true` and `false` name node kinds.
    fn term(&mut self, head: bool) -> CompileResult<PatternNode> {
        let Some(Spanned { token, start, end }) = self.next() else {
            return Err((PatternErrorKind::UnexpectedToken("end of pattern".into()), self.end));
        };
        let node = match token {
            Token::LParen => self.sequence(start)?,
            Token::LBrace => self.union(start, head)?,
            Token::LBracket => {
                let mut terms = Vec::new();
                loop {
                    match self.peek().map(|s| &s.token) {
                        Some(Token::RBracket) => {
                            self.pos += 1;
                            break;
                        }
                        None => return Err((PatternErrorKind::Unbalanced('['), start)),
                        _ => terms.push(self.term(head)?),
                    }
                }
                if terms.is_empty() {
                    return Err((PatternErrorKind::UnexpectedToken("]".into()), end));
                }
                PatternNode::Intersection(terms)
            }
            Token::Bang => {
                let before = self.captures;
                let inner = self.term(head)?;
                if self.captures != before {
                    return Err((PatternErrorKind::CaptureInNegation, start));
                }
                PatternNode::Negation(Box::new(inner))
            }
            Token::Dollar => {
                let (index, _) = self.new_capture()?;
                if matches!(self.peek().map(|s| &s.token), Some(Token::Rest)) {
                    return Err((PatternErrorKind::RestOutsideSequence, end));
                }
                let inner = self.term(head)?;
                PatternNode::Capture {
                    index,
                    inner: Box::new(inner),
                }
            }
            Token::Caret => PatternNode::Parent(Box::new(self.term(false)?)),
            Token::Backtick => PatternNode::Descendant(Box::new(self.term(false)?)),
            Token::Rest => return Err((PatternErrorKind::RestOutsideSequence, start)),
            Token::Question | Token::Star | Token::Plus => {
                return Err((PatternErrorKind::QuantifierOutsideSequence, start));
            }
            Token::RParen => return Err((PatternErrorKind::Unbalanced(')'), start)),
            Token::RBrace => return Err((PatternErrorKind::Unbalanced('}'), start)),
            Token::RBracket => return Err((PatternErrorKind::Unbalanced(']'), start)),
            Token::Sym(s) => PatternNode::Literal(Value::Sym(s)),
            Token::Str(s) => PatternNode::Literal(Value::Str(s)),
            Token::Int(n) => PatternNode::Literal(Value::Int(n)),
            Token::Float(x) => PatternNode::Literal(Value::Float(x)),
            Token::Nil if head => PatternNode::Kind(NodeKind::Nil),
            Token::Nil => PatternNode::Literal(Value::Nil),
            Token::True => PatternNode::Kind(NodeKind::True),
            Token::False => PatternNode::Kind(NodeKind::False),
            Token::Ident(name) => self.ident(&name, start)?,
            Token::Const(name) | Token::SetRef(name) => match self.env.set(&name) {
                Some(symbols) => PatternNode::Set(Arc::clone(symbols)),
                None => return Err((PatternErrorKind::UnknownSet(name), start)),
            },
            Token::Param(index) => PatternNode::Param(index),
            Token::External(name) => self.external(name, start, end)?,
        };
        Ok(node)
    }

    fn ident(&self, name: &str, start: usize) -> CompileResult<PatternNode> {
        if name.starts_with('_') {
            return Ok(PatternNode::Wildcard);
        }
        if name == "call" {
            return Ok(PatternNode::KindGroup(CALL_KINDS));
        }
        if let Some(kind) = NodeKind::from_name(name) {
            return Ok(PatternNode::Kind(kind));
        }
        if name.ends_with('?') {
            return Builtin::lookup(name)
                .map(PatternNode::Builtin)
                .ok_or_else(|| (PatternErrorKind::UnknownPredicate(name.to_string()), start));
        }
        Err((PatternErrorKind::UnknownKind(name.to_string()), start))
    }

    fn external(&mut self, name: String, start: usize, end: usize) -> CompileResult<PatternNode> {
        let Some(predicate) = self.env.predicate(&name).cloned() else {
            return Err((PatternErrorKind::UnknownExternal(name), start));
        };
        let mut args = Vec::new();
        let has_args = matches!(
            self.peek(),
            Some(Spanned { token: Token::LParen, start: paren, .. }) if *paren == end
        );
        if has_args {
            self.pos += 1;
            loop {
                let Some(Spanned { token, start: at, .. }) = self.next() else {
                    return Err((PatternErrorKind::Unbalanced('('), end));
                };
                let arg = match token {
                    Token::RParen => break,
                    Token::Sym(s) => PredicateArg::Value(Value::Sym(s)),
                    Token::Str(s) => PredicateArg::Value(Value::Str(s)),
                    Token::Int(n) => PredicateArg::Value(Value::Int(n)),
                    Token::Float(x) => PredicateArg::Value(Value::Float(x)),
                    Token::Nil => PredicateArg::Value(Value::Nil),
                    Token::Param(index) => PredicateArg::Param(index),
                    other => return Err((PatternErrorKind::UnexpectedToken(other.describe()), at)),
                };
                args.push(arg);
            }
        }
        Ok(PatternNode::External {
            name,
            predicate,
            args,
        })
    }

    fn sequence(&mut self, open: usize) -> CompileResult<PatternNode> {
        match self.peek() {
            None => return Err((PatternErrorKind::Unbalanced('('), open)),
            Some(Spanned {
                token: Token::RParen,
                start,
                ..
            }) => return Err((PatternErrorKind::UnexpectedToken(")".into()), *start)),
            Some(_) => {}
        }
        let head = self.term(true)?;
        let mut elements: Vec<Element> = Vec::new();
        let mut variadic_at = None;
        loop {
            let Some(next) = self.peek() else {
                return Err((PatternErrorKind::Unbalanced('('), open));
            };
            if next.token == Token::RParen {
                self.pos += 1;
                break;
            }
            let element_start = next.start;
            let element = self.element()?;
            if element.arity.is_variadic() {
                if variadic_at.is_some() {
                    return Err((PatternErrorKind::MultipleVariadic, element_start));
                }
                variadic_at = Some(elements.len());
            }
            elements.push(element);
        }
        Ok(PatternNode::Sequence {
            head: Box::new(head),
            elements,
        })
    }

    fn element(&mut self) -> CompileResult<Element> {
        let mut capture = None;
        if matches!(self.peek().map(|s| &s.token), Some(Token::Dollar)) {
            self.pos += 1;
            capture = Some(self.new_capture()?.0);
        }
        if matches!(self.peek().map(|s| &s.token), Some(Token::Rest)) {
            self.pos += 1;
            return Ok(Element {
                node: PatternNode::Wildcard,
                arity: Arity::Rest,
                capture,
            });
        }
        let node = self.term(false)?;
        let arity = match self.peek().map(|s| &s.token) {
            Some(Token::Question) => Arity::Optional,
            Some(Token::Star) => Arity::ZeroOrMore,
            Some(Token::Plus) => Arity::OneOrMore,
            _ => Arity::One,
        };
        if arity != Arity::One {
            self.pos += 1;
        }
        Ok(Element {
            node,
            arity,
            capture,
        })
    }

    fn union(&mut self, open: usize, head: bool) -> CompileResult<PatternNode> {
        let base = self.captures;
        let mut branch_captures = None;
        let mut branches = Vec::new();
        loop {
            let Some(next) = self.peek() else {
                return Err((PatternErrorKind::Unbalanced('{'), open));
            };
            if next.token == Token::RBrace {
                self.pos += 1;
                break;
            }
            let branch_start = next.start;
            self.captures = base;
            branches.push(self.term(head)?);
            let count = self.captures - base;
            match branch_captures {
                None => branch_captures = Some(count),
                Some(expected) if expected != count => {
                    return Err((PatternErrorKind::CaptureCountMismatch(expected, count), branch_start));
                }
                Some(_) => {}
            }
        }
        if branches.is_empty() {
            return Err((PatternErrorKind::UnexpectedToken("}".into()), open));
        }
        self.captures = base + branch_captures.unwrap_or(0);
        Ok(PatternNode::Union(branches))
    }
}
