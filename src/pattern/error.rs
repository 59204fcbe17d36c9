use thiserror::Error;

/// A node pattern failed to compile.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} at offset {offset} in pattern `{pattern}`")]
pub struct PatternSyntaxError {
    pub kind: PatternErrorKind,
    /// Byte offset into the pattern text.
    pub offset: usize,
    pub pattern: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternErrorKind {
    #[error("unbalanced `{0}`")]
    Unbalanced(char),

    #[error("unexpected `{0}`")]
    UnexpectedToken(String),

    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),

    #[error("empty pattern")]
    Empty,

    #[error("trailing input `{0}`")]
    TrailingInput(String),

    #[error("unknown node kind `{0}`")]
    UnknownKind(String),

    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    #[error("unknown external predicate `#{0}`")]
    UnknownExternal(String),

    #[error("unknown set `{0}`")]
    UnknownSet(String),

    #[error("more than one variadic element in one sequence")]
    MultipleVariadic,

    #[error("union branches capture different numbers of values ({0} and {1})")]
    CaptureCountMismatch(usize, usize),

    #[error("captures are not allowed inside a negation")]
    CaptureInNegation,

    #[error("`...` is only allowed inside a sequence")]
    RestOutsideSequence,

    #[error("quantifier is only allowed on sequence elements")]
    QuantifierOutsideSequence,

    #[error("invalid literal `{0}`")]
    InvalidLiteral(String),
}

/// Failure raised while evaluating a match. The matcher turns these into
/// a non-match.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredicateError {
    #[error("predicate `#{name}` failed: {message}")]
    Failed { name: String, message: String },

    #[error("parameter %{0} was not supplied")]
    MissingParam(usize),

    #[error("parameter %{0} cannot be used as a predicate argument")]
    UnsupportedParam(usize),
}

impl PredicateError {
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}
