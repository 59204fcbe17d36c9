//! Integration tests for perfcop
//!
//! Drives the built-in rules through the public API.

use perfcop::{
    check, Config, Mode, Registry, RubyParser, RunOutcome, Runner, Severity, SourceFile,
    SourceParser,
};
use pretty_assertions::assert_eq;

fn correct(source: &str, config: &Config) -> RunOutcome {
    check(source, config, Mode::Correct).expect("run should succeed")
}

fn rule_ids(outcome: &RunOutcome) -> Vec<&'static str> {
    outcome.offenses.iter().map(|o| o.rule_id).collect()
}

#[test]
fn test_fixture_is_corrected_to_fixed_point() {
    let source = include_str!("fixtures/bad_code.rb");
    let expected = include_str!("fixtures/bad_code_corrected.rb");

    let outcome = correct(source, &Config::default());

    let mut ids = rule_ids(&outcome);
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec![
            "Performance/ArrayPushSingle",
            "Performance/Count",
            "Performance/DeletePrefix",
            "Performance/MapCompact",
            "Performance/RedundantSortBlock",
            "Performance/ReverseEach",
            "Performance/StartWith",
        ]
    );
    assert!(outcome.warnings.is_empty(), "warnings: {:?}", outcome.warnings);
    assert_eq!(outcome.corrected_source.as_deref(), Some(expected));
    assert_eq!(outcome.corrections_applied, 7);
}

#[test]
fn test_corrected_fixture_reparses_cleanly() {
    let source = include_str!("fixtures/bad_code.rb");
    let corrected = correct(source, &Config::default())
        .corrected_source
        .expect("fixture has corrections");

    RubyParser::new().parse(&corrected).expect("corrected source parses");
    let again = check(&corrected, &Config::default(), Mode::Inspect).unwrap();
    assert!(again.offenses.is_empty(), "{:?}", again.offenses);
}

#[test]
fn test_clean_source_is_left_alone() {
    let source = "def total(values)\n  values.sum\nend\n";
    let outcome = correct(source, &Config::default());
    assert!(outcome.offenses.is_empty());
    assert_eq!(outcome.corrected_source, None);
    assert_eq!(outcome.passes, 0);
}

#[test]
fn test_safe_navigation_is_kept() {
    let outcome = correct("array&.push(x)\n", &Config::default());
    assert_eq!(outcome.corrected_source.as_deref(), Some("array&.<< x\n"));
}

#[test]
fn test_anchored_gsub_becomes_delete_prefix() {
    let outcome = correct("str.gsub(/\\Aprefix/, '')\n", &Config::default());
    assert_eq!(rule_ids(&outcome), vec!["Performance/DeletePrefix"]);
    assert_eq!(
        outcome.corrected_source.as_deref(),
        Some("str.delete_prefix('prefix')\n")
    );
}

#[test]
fn test_overlapping_corrections_take_two_passes() {
    // StartWith rewrites the whole call; DeletePrefix edits its receiver.
    let outcome = correct("str.gsub(/\\Aa/, '').match?(/\\Ab/)\n", &Config::default());

    assert_eq!(
        rule_ids(&outcome),
        vec!["Performance/StartWith", "Performance/DeletePrefix"]
    );
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.corrections_applied, 2);
    assert_eq!(
        outcome.corrected_source.as_deref(),
        Some("str.delete_prefix('a').start_with?('b')\n")
    );
}

#[test]
fn test_collection_literal_min_size() {
    let source = "items.each do |item|\n  [1].include?(item)\n  [1, 2].include?(item)\nend\n";

    let default = check(source, &Config::default(), Mode::Inspect).unwrap();
    assert_eq!(default.offenses.len(), 2);

    let mut config = Config::default();
    config.settings.collection_literal_in_loop.min_size = 2;
    let outcome = check(source, &config, Mode::Inspect).unwrap();
    assert_eq!(rule_ids(&outcome), vec!["Performance/CollectionLiteralInLoop"]);
    assert_eq!(outcome.offenses[0].line, 3);
    assert_eq!(outcome.offenses[0].column, 3);
}

#[test]
fn test_version_gated_rules() {
    let source = "a = [1]\nb = [2]\n(a & b).any?\n";
    let old = check(source, &Config::default(), Mode::Inspect).unwrap();
    assert!(old.offenses.is_empty());

    let config = Config::from_toml("target_ruby_version = \"3.1\"\n").unwrap();
    let outcome = correct(source, &config);
    assert_eq!(rule_ids(&outcome), vec!["Performance/IntersectionCheck"]);
    assert_eq!(outcome.corrected_source.as_deref(), Some("a = [1]\nb = [2]\na.intersect?(b)\n"));
}

#[test]
fn test_config_severity_and_allow() {
    let config = Config::from_toml(
        r#"
[rules]
"Performance/Size" = "deny"
"Performance/ReverseEach" = "allow"
"#,
    )
    .unwrap();
    let source = "[1, 2, 3].count\nitems.reverse.each { |i| i }\n";
    let outcome = check(source, &config, Mode::Inspect).unwrap();

    assert_eq!(rule_ids(&outcome), vec!["Performance/Size"]);
    assert_eq!(outcome.offenses[0].severity, Severity::Error);
}

#[test]
fn test_inline_suppression() {
    let source = "[1, 2, 3].count # rubocop:disable Performance/Size\n[1, 2].count\n";
    let outcome = check(source, &Config::default(), Mode::Inspect).unwrap();
    assert_eq!(outcome.offenses.len(), 1);
    assert_eq!(outcome.offenses[0].line, 2);
}

#[test]
fn test_inline_suppression_after_interpolation() {
    let source = "puts \"#{x}\", [1, 2].count # rubocop:disable Performance/Size\n";
    let outcome = check(source, &Config::default(), Mode::Inspect).unwrap();
    assert!(outcome.offenses.is_empty(), "{:?}", outcome.offenses);
}

#[test]
fn test_offenses_serialize_to_json() {
    let outcome = check("[1, 2, 3].count\n", &Config::default(), Mode::Inspect).unwrap();
    let json = serde_json::to_value(&outcome.offenses).unwrap();

    assert_eq!(json[0]["rule_id"], "Performance/Size");
    assert_eq!(json[0]["severity"], "warning");
    assert_eq!(json[0]["line"], 1);
    assert_eq!(json[0]["column"], 11);
    assert_eq!(json[0]["span"]["start"], 10);
    assert_eq!(json[0]["correction"]["edits"][0]["replacement"], "size");
}

#[test]
fn test_parse_error_is_reported() {
    let err = check("def broken(\n", &Config::default(), Mode::Inspect).unwrap_err();
    assert!(matches!(err, perfcop::Error::Run(_)), "{err:?}");
}

#[test]
fn test_batch_runs_each_file() {
    let registry = Registry::builtin().unwrap();
    let config = Config::default();
    let runner = Runner::new(&registry, &config);
    let files = vec![
        SourceFile::new("a.rb", "[1, 2].count\n"),
        SourceFile::new("b.rb", "values.sum\n"),
        SourceFile::new("c.rb", "items.reverse.each { |i| i }\n"),
    ];

    let reports = runner.run_batch(&files, RubyParser::new, Mode::Correct);

    let corrected: Vec<_> = reports
        .iter()
        .map(|r| r.result.as_ref().unwrap().corrected_source.clone())
        .collect();
    assert_eq!(
        corrected,
        vec![
            Some("[1, 2].size\n".to_string()),
            None,
            Some("items.reverse_each { |i| i }\n".to_string()),
        ]
    );
    assert_eq!(reports[1].path, std::path::PathBuf::from("b.rb"));
}
