//! Annotated-source assertions for rule tests.
//!
//! Expected offenses are written under the offending line, with carets
//! spanning the reported range on that line:
//!
//! ```text
//! [1, 2, 3].count
//!           ^^^^^ Use `size` instead of `count`.
//! ```

use pretty_assertions::assert_eq;
use std::fmt::Write;

use super::registry::Registry;
use super::{Offense, Rule};
use crate::config::RubyVersion;
use crate::engine::{Mode, Runner};
use crate::syntax::RubyParser;
use crate::Config;

pub(crate) fn config_for(version: &str) -> Config {
    Config {
        target_ruby_version: version.parse::<RubyVersion>().unwrap(),
        ..Config::default()
    }
}

fn is_annotation(line: &str) -> bool {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('^') {
        return false;
    }
    let rest = trimmed.trim_start_matches('^');
    trimmed.starts_with("^{}") || rest.is_empty() || rest.starts_with(' ') || rest == "\n"
}

pub(crate) fn strip_annotations(annotated: &str) -> String {
    annotated
        .split_inclusive('\n')
        .filter(|line| !is_annotation(line))
        .collect()
}

fn render(source: &str, offenses: &[Offense]) -> String {
    let mut sorted: Vec<&Offense> = offenses.iter().collect();
    sorted.sort_by(|a, b| (a.line, a.column, &a.message).cmp(&(b.line, b.column, &b.message)));

    let mut out = String::new();
    let mut offset = 0;
    for (index, line) in source.split_inclusive('\n').enumerate() {
        out.push_str(line);
        let content_end = offset + line.trim_end_matches('\n').len();
        let on_line: Vec<_> = sorted.iter().filter(|o| o.line == index + 1).collect();
        if !on_line.is_empty() && !line.ends_with('\n') {
            out.push('\n');
        }
        for offense in on_line {
            let end = offense.span.end.min(content_end).max(offense.span.start);
            let width = source[offense.span.start..end].chars().count();
            let marker = if width == 0 { "^{}".to_string() } else { "^".repeat(width) };
            let indent = " ".repeat(offense.column - 1);
            writeln!(out, "{indent}{marker} {}", offense.message).unwrap();
        }
        offset += line.len();
    }
    out
}

pub(crate) fn inspect_with<R: Rule + 'static>(rule: R, config: &Config, source: &str) -> Vec<Offense> {
    let registry = Registry::from_rules(vec![Box::new(rule)]);
    let runner = Runner::new(&registry, config);
    runner
        .run(source, &RubyParser::new(), Mode::Inspect)
        .unwrap()
        .offenses
}

pub(crate) fn expect_offense_with<R: Rule + 'static>(rule: R, config: &Config, annotated: &str) {
    let source = strip_annotations(annotated);
    let offenses = inspect_with(rule, config, &source);
    assert_eq!(render(&source, &offenses), annotated);
}

pub(crate) fn expect_offense<R: Rule + 'static>(rule: R, annotated: &str) {
    expect_offense_with(rule, &Config::default(), annotated);
}

pub(crate) fn expect_no_offenses_with<R: Rule + 'static>(rule: R, config: &Config, source: &str) {
    let offenses = inspect_with(rule, config, source);
    assert_eq!(render(source, &offenses), source);
}

pub(crate) fn expect_no_offenses<R: Rule + 'static>(rule: R, source: &str) {
    expect_no_offenses_with(rule, &Config::default(), source);
}

pub(crate) fn expect_correction_with<R: Rule + 'static>(
    rule: R,
    config: &Config,
    source: &str,
    expected: &str,
) {
    let source = strip_annotations(source);
    let registry = Registry::from_rules(vec![Box::new(rule)]);
    let runner = Runner::new(&registry, config);
    let outcome = runner
        .run(&source, &RubyParser::new(), Mode::Correct)
        .unwrap();
    assert!(outcome.warnings.is_empty(), "warnings: {:?}", outcome.warnings);
    let corrected = outcome.corrected_source.unwrap_or(source);
    assert_eq!(corrected, expected);
}

pub(crate) fn expect_correction<R: Rule + 'static>(rule: R, source: &str, expected: &str) {
    expect_correction_with(rule, &Config::default(), source, expected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;
    use pretty_assertions::assert_eq;
    use crate::syntax::Span;

    fn offense(start: usize, end: usize, line: usize, column: usize) -> Offense {
        Offense {
            rule_id: "Test/Rule",
            severity: Severity::Warning,
            message: "msg".to_string(),
            span: Span::new(start, end),
            line,
            column,
            correction: None,
        }
    }

    #[test]
    fn test_render_round_trips_annotation() {
        let annotated = "a = 1\nfoo.bar\n    ^^^ msg\n";
        let source = strip_annotations(annotated);
        assert_eq!(source, "a = 1\nfoo.bar\n");
        assert_eq!(render(&source, &[offense(10, 13, 2, 5)]), annotated);
    }

    #[test]
    fn test_multiline_offense_marks_first_line() {
        let source = "foo do\nend\n";
        assert_eq!(render(source, &[offense(0, 10, 1, 1)]), "foo do\n^^^^^^ msg\nend\n");
    }
}
