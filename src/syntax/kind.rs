//! Node kinds understood by the pattern matcher and the rules.
//!
//! The vocabulary follows the Ruby `parser` gem, which is what node patterns
//! are written against. Front ends map anything they cannot classify onto
//! [`NodeKind::Other`], keeping the front end's own kind name.

use std::fmt;

macro_rules! node_kinds {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Kind tag of a syntax node.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($variant,)*
            /// A front-end node with no parser-gem counterpart.
            Other(&'static str),
        }

        impl NodeKind {
            /// Every named kind, in declaration order.
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$variant,)*];

            /// Canonical lowercase name, as written in node patterns.
            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$variant => $name,)*
                    NodeKind::Other(name) => name,
                }
            }

            /// Look up a kind by its pattern name. Hyphens are accepted in
            /// place of underscores (`match-with-lvasgn`).
            pub fn from_name(name: &str) -> Option<NodeKind> {
                let normalized = name.replace('-', "_");
                match normalized.as_str() {
                    $($name => Some(NodeKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

node_kinds! {
    Send => "send",
    Csend => "csend",
    Block => "block",
    Args => "args",
    Arg => "arg",
    Optarg => "optarg",
    Restarg => "restarg",
    Kwarg => "kwarg",
    Kwoptarg => "kwoptarg",
    Kwrestarg => "kwrestarg",
    Blockarg => "blockarg",
    Array => "array",
    Hash => "hash",
    Pair => "pair",
    Kwsplat => "kwsplat",
    Splat => "splat",
    BlockPass => "block_pass",
    Regexp => "regexp",
    Regopt => "regopt",
    Str => "str",
    Dstr => "dstr",
    Xstr => "xstr",
    Sym => "sym",
    Dsym => "dsym",
    Int => "int",
    Float => "float",
    Nil => "nil",
    True => "true",
    False => "false",
    SelfRef => "self",
    Lvar => "lvar",
    Ivar => "ivar",
    Gvar => "gvar",
    Cvar => "cvar",
    Const => "const",
    Cbase => "cbase",
    Lvasgn => "lvasgn",
    Ivasgn => "ivasgn",
    Gvasgn => "gvasgn",
    Cvasgn => "cvasgn",
    Casgn => "casgn",
    OpAsgn => "op_asgn",
    OrAsgn => "or_asgn",
    AndAsgn => "and_asgn",
    Begin => "begin",
    Kwbegin => "kwbegin",
    And => "and",
    Or => "or",
    If => "if",
    Case => "case",
    When => "when",
    While => "while",
    Until => "until",
    For => "for",
    Irange => "irange",
    Erange => "erange",
    Def => "def",
    Defs => "defs",
    Class => "class",
    Module => "module",
    Sclass => "sclass",
    Return => "return",
    Yield => "yield",
    Super => "super",
    Zsuper => "zsuper",
    Break => "break",
    Next => "next",
    Defined => "defined?",
    MatchWithLvasgn => "match_with_lvasgn",
}

impl NodeKind {
    pub fn is_call(self) -> bool {
        matches!(self, NodeKind::Send | NodeKind::Csend)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, NodeKind::Int | NodeKind::Float)
    }

    /// Literals whose value is fully known from the source text.
    pub fn is_basic_literal(self) -> bool {
        matches!(
            self,
            NodeKind::Str
                | NodeKind::Sym
                | NodeKind::Int
                | NodeKind::Float
                | NodeKind::Nil
                | NodeKind::True
                | NodeKind::False
                | NodeKind::Regexp
                | NodeKind::Irange
                | NodeKind::Erange
        )
    }

    pub fn is_literal(self) -> bool {
        self.is_basic_literal()
            || matches!(
                self,
                NodeKind::Array
                    | NodeKind::Hash
                    | NodeKind::Pair
                    | NodeKind::Dstr
                    | NodeKind::Dsym
                    | NodeKind::Xstr
            )
    }

    pub fn is_variable(self) -> bool {
        matches!(
            self,
            NodeKind::Lvar | NodeKind::Ivar | NodeKind::Gvar | NodeKind::Cvar
        )
    }

    pub fn is_loop(self) -> bool {
        matches!(self, NodeKind::While | NodeKind::Until | NodeKind::For)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
