use crate::config::{RubyVersion, RuleSettings};
use crate::rules::{Offense, Rule};
use crate::syntax::{Span, SyntaxTree};

/// Read-only per-file state handed to every rule evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub tree: &'a SyntaxTree,
    pub settings: &'a RuleSettings,
    pub target_ruby_version: RubyVersion,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        tree: &'a SyntaxTree,
        settings: &'a RuleSettings,
        target_ruby_version: RubyVersion,
    ) -> Self {
        Self {
            tree,
            settings,
            target_ruby_version,
        }
    }

    pub fn source(&self) -> &'a str {
        self.tree.source()
    }

    /// Get line and column from a byte offset
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        line_col(self.source(), offset)
    }

    /// Build an offense for `rule` with its default severity.
    pub fn offense(&self, rule: &dyn Rule, span: Span, message: impl Into<String>) -> Offense {
        let (line, column) = self.line_col(span.start);
        Offense {
            rule_id: rule.id(),
            severity: rule.default_severity(),
            message: message.into(),
            span,
            line,
            column,
            correction: None,
        }
    }
}

/// 1-based line and character column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
