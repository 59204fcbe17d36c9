pub mod call_rules;
pub mod collection_rules;
pub mod literal;
pub mod logic_rules;
pub mod registry;
pub mod string_rules;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use crate::engine::RuleContext;

use crate::config::RubyVersion;
use crate::corrector::{Corrector, Edit};
use crate::syntax::{Node, NodeKind, Span};

/// Severity levels for offenses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "deny" => Ok(Severity::Error),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// A problem reported by a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offense {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// 1-based line of `span.start`.
    pub line: usize,
    /// 1-based column of `span.start`, in characters.
    pub column: usize,
    pub correction: Option<Correction>,
}

impl Offense {
    /// Attach the edits produced by `f`. An empty edit list leaves the
    /// offense uncorrectable.
    pub fn with_correction(mut self, f: impl FnOnce(&mut Corrector)) -> Self {
        let mut corrector = Corrector::new();
        f(&mut corrector);
        if !corrector.is_empty() {
            self.correction = Some(Correction {
                edits: corrector.into_edits(),
            });
        }
        self
    }

    pub fn is_correctable(&self) -> bool {
        self.correction.is_some()
    }
}

/// Edits that fix one offense, applied all together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub edits: Vec<Edit>,
}

/// The Rule trait - implement this to add new checks
///
/// Rules are stateless: patterns are compiled once in the constructor and
/// every evaluation only reads the node and the context.
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule (e.g., "Performance/Size")
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Description of what this rule checks
    fn description(&self) -> &'static str;

    /// Default severity level
    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    /// Node kinds this rule is evaluated on.
    fn trigger_kinds(&self) -> &'static [NodeKind];

    /// Restricts `send`/`csend` triggers to these method names.
    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// Oldest target Ruby version the suggested replacement exists in.
    fn minimum_target_ruby_version(&self) -> Option<RubyVersion> {
        None
    }

    /// Whether the correction preserves behavior in every case.
    fn safe_correction(&self) -> bool {
        true
    }

    fn trigger(&self, kind: NodeKind) -> bool {
        self.trigger_kinds().contains(&kind)
    }

    /// Check one node and return offenses located within it.
    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense>;
}

/// Span from the start of `from` to the end of `to`.
pub(crate) fn range_between(from: Span, to: Span) -> Span {
    Span::new(from.start, to.end.max(from.start))
}

/// The selector of a call, falling back to the whole node.
pub(crate) fn selector_span(node: Node<'_>) -> Span {
    node.loc().selector.unwrap_or_else(|| node.span())
}
