//! Inline suppression support for perfcop offenses.
//!
//! Supports suppressing offenses with RuboCop-compatible comments:
//! - `foo.count # rubocop:disable Performance/Size` - that line only
//! - `# rubocop:disable Performance/Size` on its own line - until a matching
//!   `# rubocop:enable Performance/Size` or the end of the file
//! - `# rubocop:todo ...` - same as `disable`
//!
//! A name may be a rule id, a department (`Performance`) or `all`.

use std::collections::HashMap;

const DIRECTIVE_PREFIX: &str = "rubocop:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Disable,
    Enable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SuppressedRange {
    name: String,
    first_line: usize,
    last_line: usize,
}

/// Suppressed line ranges of one source buffer.
#[derive(Debug, Clone, Default)]
pub struct Suppressions {
    ranges: Vec<SuppressedRange>,
}

impl Suppressions {
    /// Extract all rubocop directives from source text.
    pub fn parse(source: &str) -> Self {
        let mut ranges = Vec::new();
        let mut open: HashMap<String, usize> = HashMap::new();

        for (index, line) in source.lines().enumerate() {
            let line_num = index + 1;
            let Some((action, names, trailing)) = parse_directive(line) else {
                continue;
            };

            match (action, trailing) {
                (Action::Disable, true) => {
                    ranges.extend(names.into_iter().map(|name| SuppressedRange {
                        name,
                        first_line: line_num,
                        last_line: line_num,
                    }));
                }
                (Action::Disable, false) => {
                    for name in names {
                        open.entry(name).or_insert(line_num);
                    }
                }
                (Action::Enable, _) => {
                    let closing: Vec<String> = if names.iter().any(|n| n == "all") {
                        open.keys().cloned().collect()
                    } else {
                        names
                    };
                    for name in closing {
                        if let Some(first_line) = open.remove(&name) {
                            ranges.push(SuppressedRange {
                                name,
                                first_line,
                                last_line: line_num,
                            });
                        }
                    }
                }
            }
        }

        ranges.extend(open.into_iter().map(|(name, first_line)| SuppressedRange {
            name,
            first_line,
            last_line: usize::MAX,
        }));

        if !ranges.is_empty() {
            tracing::debug!(count = ranges.len(), "parsed suppression directives");
        }
        Self { ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Check if an offense of `rule_id` at the given line should be suppressed.
    pub fn is_suppressed(&self, rule_id: &str, line: usize) -> bool {
        self.ranges.iter().any(|range| {
            range.first_line <= line && line <= range.last_line && name_covers(&range.name, rule_id)
        })
    }
}

fn name_covers(name: &str, rule_id: &str) -> bool {
    if name == "all" || name == rule_id {
        return true;
    }
    rule_id
        .split_once('/')
        .is_some_and(|(department, _)| department == name)
}

/// Returns the action, the names it applies to, and whether code precedes
/// the comment on the same line.
fn parse_directive(line: &str) -> Option<(Action, Vec<String>, bool)> {
    // Earlier `#` characters may sit in strings or interpolations.
    let (hash, rest) = line.match_indices('#').find_map(|(hash, _)| {
        let comment = line[hash + 1..].trim_start();
        comment.strip_prefix(DIRECTIVE_PREFIX).map(|rest| (hash, rest))
    })?;

    let (keyword, names) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let action = match keyword {
        "disable" | "todo" => Action::Disable,
        "enable" => Action::Enable,
        _ => return None,
    };

    // A second `#` starts a free-form explanation.
    let names = names.split('#').next().unwrap_or_default();
    let names: Vec<String> = names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return None;
    }

    let trailing = !line[..hash].trim().is_empty();
    Some((action, names, trailing))
}
