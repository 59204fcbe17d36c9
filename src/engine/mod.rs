//! Analysis engine - dispatches rules over syntax trees and drives
//! correction passes until the source stops changing.

mod context;
mod file_analyzer;

pub use context::{line_col, RuleContext};

use rayon::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::corrector::{EditError, EditSet};
use crate::rules::registry::Registry;
use crate::rules::{Offense, Rule, Severity};
use crate::suppression::Suppressions;
use crate::syntax::{NodeKind, ParseError, SourceParser, SyntaxTree};
use crate::Config;

/// Errors that end a run over one source buffer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("failed to parse source: {0}")]
    Parse(#[from] ParseError),

    #[error("corrected source no longer parses after edits by {}: {message}", .rules.join(", "))]
    Reparse {
        /// Rules whose edits were applied in the failing pass.
        rules: Vec<&'static str>,
        message: String,
    },

    #[error("invalid edit: {0}")]
    Edit(#[from] EditError),

    #[error("run cancelled")]
    Cancelled,
}

/// Non-fatal conditions noted while correcting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// Corrections were still pending after this many passes.
    MaxIterationsExceeded { max: usize },
    /// Pass `pass` reproduced a source seen in an earlier pass.
    CorrectionCycle { pass: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Report offenses only.
    #[default]
    Inspect,
    /// Report offenses and apply their corrections.
    Correct,
}

/// Result of running the rules over one source buffer.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Offenses of the original source.
    pub offenses: Vec<Offense>,
    /// Final source, present when at least one correction was applied.
    pub corrected_source: Option<String>,
    /// Number of correction passes applied.
    pub passes: usize,
    /// Number of offenses whose corrections were applied, over all passes.
    pub corrections_applied: usize,
    pub warnings: Vec<RunWarning>,
}

/// Shared flag for abandoning a run between nodes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One buffer of a batch.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<RunOutcome, RunError>,
}

struct ActiveRule<'a> {
    rule: &'a dyn Rule,
    severity: Severity,
}

/// Runs the enabled rules of a [`Registry`] with one [`Config`].
pub struct Runner<'a> {
    config: &'a Config,
    rules: Vec<ActiveRule<'a>>,
    dispatch: HashMap<NodeKind, Vec<usize>>,
    cancellation: CancellationToken,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config) -> Self {
        let mut rules = Vec::new();
        let mut dispatch: HashMap<NodeKind, Vec<usize>> = HashMap::new();

        for rule in registry.rules() {
            let Some(severity) = config.rule_severity(rule.id(), rule.default_severity()) else {
                tracing::debug!(rule = rule.id(), "rule disabled by configuration");
                continue;
            };
            if let Some(minimum) = rule.minimum_target_ruby_version() {
                if config.target_ruby_version < minimum {
                    tracing::debug!(
                        rule = rule.id(),
                        %minimum,
                        target = %config.target_ruby_version,
                        "rule skipped for target Ruby version"
                    );
                    continue;
                }
            }
            let index = rules.len();
            for kind in rule.trigger_kinds() {
                dispatch.entry(*kind).or_default().push(index);
            }
            rules.push(ActiveRule { rule, severity });
        }

        tracing::debug!(active = rules.len(), kinds = dispatch.len(), "built dispatch table");
        Self {
            config,
            rules,
            dispatch,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Ids of the rules this runner evaluates, in registry order.
    pub fn active_rules(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|active| active.rule.id())
    }

    /// Collect offenses for `tree` in pre-order, then registry order.
    pub fn inspect(&self, tree: &SyntaxTree) -> Result<Vec<Offense>, RunError> {
        let ctx = RuleContext::new(tree, &self.config.settings, self.config.target_ruby_version);
        let suppressions = Suppressions::parse(tree.source());
        let mut offenses = Vec::new();

        for node in tree.preorder() {
            if self.cancellation.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            let Some(indices) = self.dispatch.get(&node.kind()) else {
                continue;
            };
            for &index in indices {
                let active = &self.rules[index];
                if let Some(methods) = active.rule.trigger_methods() {
                    if node.is_call() && !node.method_name().is_some_and(|m| methods.contains(&m)) {
                        continue;
                    }
                }
                for mut offense in file_analyzer::evaluate_rule(active.rule, node, &ctx) {
                    if suppressions.is_suppressed(offense.rule_id, offense.line) {
                        continue;
                    }
                    offense.severity = active.severity;
                    offenses.push(offense);
                }
            }
        }
        Ok(offenses)
    }

    /// Parse `source`, inspect it, and in [`Mode::Correct`] apply corrections
    /// pass by pass until nothing changes.
    pub fn run(
        &self,
        source: &str,
        parser: &dyn SourceParser,
        mode: Mode,
    ) -> Result<RunOutcome, RunError> {
        let tree = parser.parse(source)?;
        let offenses = self.inspect(&tree)?;
        let mut outcome = RunOutcome {
            offenses,
            ..RunOutcome::default()
        };
        if mode == Mode::Inspect {
            return Ok(outcome);
        }

        let max_iterations = self.config.correction.max_iterations;
        let mut current = source.to_string();
        let mut pending = outcome.offenses.clone();
        let mut seen = HashSet::from([fingerprint(&current)]);

        loop {
            let (edits, applied_rules, applied) = collect_edits(&pending)?;
            if edits.is_empty() {
                break;
            }
            if outcome.passes >= max_iterations {
                tracing::warn!(max_iterations, "corrections still pending after the last pass");
                outcome.warnings.push(RunWarning::MaxIterationsExceeded { max: max_iterations });
                break;
            }

            let next = edits.apply(&current)?;
            let tree = parser.parse(&next).map_err(|e| RunError::Reparse {
                rules: applied_rules,
                message: e.to_string(),
            })?;

            outcome.passes += 1;
            outcome.corrections_applied += applied;
            tracing::debug!(pass = outcome.passes, edits = edits.len(), applied, "applied correction pass");
            current = next;

            if !seen.insert(fingerprint(&current)) {
                tracing::warn!(pass = outcome.passes, "correction cycle detected");
                outcome.warnings.push(RunWarning::CorrectionCycle { pass: outcome.passes });
                break;
            }
            pending = self.inspect(&tree)?;
        }

        if outcome.passes > 0 {
            outcome.corrected_source = Some(current);
        }
        Ok(outcome)
    }

    /// Run every file in parallel; each report carries its own result.
    pub fn run_batch<P, F>(&self, files: &[SourceFile], make_parser: F, mode: Mode) -> Vec<FileReport>
    where
        P: SourceParser,
        F: Fn() -> P + Send + Sync,
    {
        files
            .par_iter()
            .map_init(&make_parser, |parser, file| FileReport {
                path: file.path.clone(),
                result: self.run(&file.source, &*parser, mode),
            })
            .collect()
    }
}

/// Merge the corrections of one pass in offense order. An offense whose
/// edits overlap an earlier one is deferred to the next pass.
fn collect_edits(
    offenses: &[Offense],
) -> Result<(EditSet, Vec<&'static str>, usize), RunError> {
    let mut edits = EditSet::new();
    let mut rules: Vec<&'static str> = Vec::new();
    let mut applied = 0;

    for offense in offenses {
        let Some(correction) = &offense.correction else {
            continue;
        };
        match edits.add_all(correction.edits.clone()) {
            Ok(()) => {
                applied += 1;
                if !rules.contains(&offense.rule_id) {
                    rules.push(offense.rule_id);
                }
            }
            Err(EditError::Overlap { existing, new }) => {
                tracing::debug!(
                    rule = offense.rule_id,
                    %existing,
                    %new,
                    "deferring overlapping correction"
                );
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok((edits, rules, applied))
}

fn fingerprint(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSeverity;
    use crate::corrector::Edit;
    use crate::syntax::{Node, RubyParser};
    use pretty_assertions::assert_eq;

    /// Rewrites every `foo` call to `bar`, and `bar` back to `foo`.
    struct Flip;

    impl Rule for Flip {
        fn id(&self) -> &'static str {
            "Test/Flip"
        }
        fn name(&self) -> &'static str {
            "Flip"
        }
        fn description(&self) -> &'static str {
            "flips foo and bar"
        }
        fn trigger_kinds(&self) -> &'static [NodeKind] {
            &[NodeKind::Send]
        }
        fn trigger_methods(&self) -> Option<&'static [&'static str]> {
            Some(&["foo", "bar"])
        }
        fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
            let replacement = if node.is_method("foo") { "bar" } else { "foo" };
            vec![ctx
                .offense(self, node.span(), "flip")
                .with_correction(|c| c.replace(node.span(), replacement))]
        }
    }

    /// Appends `+ 1` after every integer, forever.
    struct Grow;

    impl Rule for Grow {
        fn id(&self) -> &'static str {
            "Test/Grow"
        }
        fn name(&self) -> &'static str {
            "Grow"
        }
        fn description(&self) -> &'static str {
            "never converges"
        }
        fn trigger_kinds(&self) -> &'static [NodeKind] {
            &[NodeKind::Int]
        }
        fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
            vec![ctx
                .offense(self, node.span(), "grow")
                .with_correction(|c| c.insert_after(node.span(), " + 1"))]
        }
    }

    /// Produces an unbalanced paren.
    struct Breaker;

    impl Rule for Breaker {
        fn id(&self) -> &'static str {
            "Test/Breaker"
        }
        fn name(&self) -> &'static str {
            "Breaker"
        }
        fn description(&self) -> &'static str {
            "breaks the source"
        }
        fn trigger_kinds(&self) -> &'static [NodeKind] {
            &[NodeKind::Int]
        }
        fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
            vec![ctx
                .offense(self, node.span(), "break")
                .with_correction(|c| c.replace(node.span(), "(1"))]
        }
    }

    fn registry(rules: Vec<Box<dyn Rule>>) -> Registry {
        Registry::from_rules(rules)
    }

    #[test]
    fn test_inspect_only_does_not_correct() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let outcome = runner.run("foo\n", &RubyParser::new(), Mode::Inspect).unwrap();
        assert_eq!(outcome.offenses.len(), 1);
        assert_eq!(outcome.corrected_source, None);
        assert_eq!(outcome.passes, 0);
    }

    #[test]
    fn test_correction_cycle_is_reported() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let outcome = runner.run("foo\n", &RubyParser::new(), Mode::Correct).unwrap();
        assert_eq!(outcome.warnings, vec![RunWarning::CorrectionCycle { pass: 2 }]);
        assert_eq!(outcome.corrected_source.as_deref(), Some("foo\n"));
    }

    #[test]
    fn test_max_iterations_keeps_last_good_source() {
        let registry = registry(vec![Box::new(Grow)]);
        let mut config = Config::default();
        config.correction.max_iterations = 2;
        let runner = Runner::new(&registry, &config);
        let outcome = runner.run("x = 1\n", &RubyParser::new(), Mode::Correct).unwrap();
        assert_eq!(outcome.passes, 2);
        assert_eq!(outcome.corrections_applied, 3);
        assert_eq!(outcome.warnings, vec![RunWarning::MaxIterationsExceeded { max: 2 }]);
        assert_eq!(outcome.corrected_source.as_deref(), Some("x = 1 + 1 + 1 + 1\n"));
    }

    #[test]
    fn test_reparse_failure_names_rules() {
        let registry = registry(vec![Box::new(Breaker)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let err = runner.run("x = 1\n", &RubyParser::new(), Mode::Correct).unwrap_err();
        match err {
            RunError::Reparse { rules, .. } => assert_eq!(rules, vec!["Test/Breaker"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_is_returned() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let err = runner.run("def (\n", &RubyParser::new(), Mode::Inspect).unwrap_err();
        assert!(matches!(err, RunError::Parse(_)));
    }

    #[test]
    fn test_disabled_rule_is_not_dispatched() {
        let registry = registry(vec![Box::new(Flip)]);
        let mut config = Config::default();
        config.rules.insert("Test/Flip".to_string(), RuleSeverity::Allow);
        let runner = Runner::new(&registry, &config);
        assert_eq!(runner.active_rules().count(), 0);
        let outcome = runner.run("foo\n", &RubyParser::new(), Mode::Inspect).unwrap();
        assert!(outcome.offenses.is_empty());
    }

    #[test]
    fn test_severity_is_remapped() {
        let registry = registry(vec![Box::new(Flip)]);
        let mut config = Config::default();
        config.rules.insert("Test/Flip".to_string(), RuleSeverity::Deny);
        let runner = Runner::new(&registry, &config);
        let outcome = runner.run("foo\n", &RubyParser::new(), Mode::Inspect).unwrap();
        assert_eq!(outcome.offenses[0].severity, Severity::Error);
    }

    #[test]
    fn test_trigger_methods_filter_calls() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let outcome = runner.run("baz\nfoo\n", &RubyParser::new(), Mode::Inspect).unwrap();
        assert_eq!(outcome.offenses.len(), 1);
        assert_eq!(outcome.offenses[0].line, 2);
    }

    #[test]
    fn test_suppressed_offense_is_dropped() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let outcome = runner
            .run("foo # rubocop:disable Test/Flip\nfoo\n", &RubyParser::new(), Mode::Inspect)
            .unwrap();
        assert_eq!(outcome.offenses.len(), 1);
        assert_eq!(outcome.offenses[0].line, 2);
    }

    #[test]
    fn test_cancelled_run() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let token = CancellationToken::new();
        token.cancel();
        let runner = Runner::new(&registry, &config).with_cancellation(token);
        let err = runner.run("foo\n", &RubyParser::new(), Mode::Inspect).unwrap_err();
        assert_eq!(err, RunError::Cancelled);
    }

    #[test]
    fn test_overlapping_corrections_are_deferred() {
        let offense = |span: (usize, usize), text: &str| Offense {
            rule_id: "Test/Edit",
            severity: Severity::Warning,
            message: String::new(),
            span: crate::syntax::Span::new(span.0, span.1),
            line: 1,
            column: 1,
            correction: Some(crate::rules::Correction {
                edits: vec![Edit::replace(crate::syntax::Span::new(span.0, span.1), text)],
            }),
        };
        let (edits, rules, applied) =
            collect_edits(&[offense((0, 4), "a"), offense((2, 6), "b"), offense((6, 7), "c")])
                .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(rules, vec!["Test/Edit"]);
        assert_eq!(edits.apply("0123456789").unwrap(), "a45c789");
    }

    #[test]
    fn test_run_batch_reports_each_file() {
        let registry = registry(vec![Box::new(Flip)]);
        let config = Config::default();
        let runner = Runner::new(&registry, &config);
        let files = vec![
            SourceFile::new("a.rb", "foo\n"),
            SourceFile::new("b.rb", "def (\n"),
            SourceFile::new("c.rb", "baz\n"),
        ];
        let reports = runner.run_batch(&files, RubyParser::new, Mode::Inspect);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].path, PathBuf::from("a.rb"));
        assert_eq!(reports[0].result.as_ref().unwrap().offenses.len(), 1);
        assert!(reports[1].result.is_err());
        assert!(reports[2].result.as_ref().unwrap().offenses.is_empty());
    }
}
