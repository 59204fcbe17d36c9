//! Rules that replace regexp and string conversions with plain string calls.

use super::literal::{
    drop_end_anchor, drop_start_anchor, interpret_string_escapes, is_literal, literal_at_end,
    literal_at_start, to_double_quoted_literal, to_string_literal,
};
use super::{selector_span, Offense, Rule, RuleContext};
use crate::config::RubyVersion;
use crate::pattern::{Capture, Pattern, PatternEnv, PatternSyntaxError};
use crate::syntax::{ChildRef, Node, NodeKind, Value};

const REGEX_MATCH_KINDS: &[NodeKind] = &[NodeKind::Send, NodeKind::MatchWithLvasgn];
const REGEX_MATCH_METHODS: &[&str] = &["match", "=~", "match?"];

/// External predicates over the raw body of a regexp literal.
fn literal_env() -> PatternEnv {
    fn on_str(child: ChildRef<'_>, test: fn(&str) -> bool) -> bool {
        child.as_str().is_some_and(test)
    }
    PatternEnv::new()
        .with_predicate("literal_at_start?", |child, _| Ok(on_str(child, literal_at_start)))
        .with_predicate("literal_at_end?", |child, _| Ok(on_str(child, literal_at_end)))
        .with_predicate("literal_only?", |child, _| {
            Ok(on_str(child, |s| !s.is_empty() && is_literal(s)))
        })
}

fn value_str<'t>(capture: &Capture<'t>) -> Option<&'t str> {
    capture.as_value().and_then(Value::as_str)
}

fn unanchored(body: &str) -> &str {
    body
}

/// Matches `str.match?(/re/)`, `/re/.match?(str)` and `/re/ =~ str` where
/// the regexp body satisfies a literal predicate.
struct RegexLiteralMatch {
    pattern: Pattern,
    method: &'static str,
    strip_anchor: fn(&str) -> &str,
}

impl RegexLiteralMatch {
    fn new(
        predicate: &str,
        method: &'static str,
        strip_anchor: fn(&str) -> &str,
    ) -> Result<Self, PatternSyntaxError> {
        let regexp = format!("(regexp (str $#{predicate}) (regopt))");
        let source = format!(
            "{{(send $!nil? {{:match :=~ :match?}} {regexp}) \
              (send {regexp} {{:match :match?}} $_) \
              (match_with_lvasgn {regexp} $_)}}"
        );
        Ok(Self {
            pattern: Pattern::compile_with(&source, &literal_env())?,
            method,
            strip_anchor,
        })
    }

    /// The string operand and the raw regexp body, in either operand order.
    fn find<'t>(&self, node: Node<'t>) -> Option<(Node<'t>, &'t str)> {
        let captures = self.pattern.matches(node).into_captures()?;
        let (first, second) = (captures.get(0)?, captures.get(1)?);
        match (first.as_node(), second.as_node()) {
            (Some(receiver), None) => Some((receiver, value_str(second)?)),
            (None, Some(receiver)) => Some((receiver, value_str(first)?)),
            _ => None,
        }
    }

    fn check(
        &self,
        rule: &dyn Rule,
        node: Node<'_>,
        ctx: &RuleContext<'_>,
        message: &str,
    ) -> Vec<Offense> {
        let Some((receiver, body)) = self.find(node) else {
            return Vec::new();
        };
        let argument = to_string_literal(&interpret_string_escapes((self.strip_anchor)(body)));
        let new_source = format!("{}.{}({argument})", receiver.source(), self.method);
        vec![ctx
            .offense(rule, node.span(), message)
            .with_correction(|corrector| corrector.replace(node.span(), new_source))]
    }
}

pub struct StartWithRule {
    matcher: RegexLiteralMatch,
}

impl StartWithRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            matcher: RegexLiteralMatch::new("literal_at_start?", "start_with?", drop_start_anchor)?,
        })
    }
}

impl Rule for StartWithRule {
    fn id(&self) -> &'static str {
        "Performance/StartWith"
    }

    fn name(&self) -> &'static str {
        "StartWith"
    }

    fn description(&self) -> &'static str {
        "Use String#start_with? instead of a regexp anchored to the beginning of the string"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        REGEX_MATCH_KINDS
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(REGEX_MATCH_METHODS)
    }

    // `=~` and `match` return positions and MatchData, not booleans.
    fn safe_correction(&self) -> bool {
        false
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        self.matcher.check(
            self,
            node,
            ctx,
            "Use `String#start_with?` instead of a regex match anchored to the beginning of the string.",
        )
    }
}

pub struct EndWithRule {
    matcher: RegexLiteralMatch,
}

impl EndWithRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            matcher: RegexLiteralMatch::new("literal_at_end?", "end_with?", drop_end_anchor)?,
        })
    }
}

impl Rule for EndWithRule {
    fn id(&self) -> &'static str {
        "Performance/EndWith"
    }

    fn name(&self) -> &'static str {
        "EndWith"
    }

    fn description(&self) -> &'static str {
        "Use String#end_with? instead of a regexp anchored to the end of the string"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        REGEX_MATCH_KINDS
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(REGEX_MATCH_METHODS)
    }

    fn safe_correction(&self) -> bool {
        false
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        self.matcher.check(
            self,
            node,
            ctx,
            "Use `String#end_with?` instead of a regex match anchored to the end of the string.",
        )
    }
}

pub struct StringIncludeRule {
    matcher: RegexLiteralMatch,
}

impl StringIncludeRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            matcher: RegexLiteralMatch::new("literal_only?", "include?", unanchored)?,
        })
    }
}

impl Rule for StringIncludeRule {
    fn id(&self) -> &'static str {
        "Performance/StringInclude"
    }

    fn name(&self) -> &'static str {
        "StringInclude"
    }

    fn description(&self) -> &'static str {
        "Use String#include? instead of a regexp match with a literal-only pattern"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        REGEX_MATCH_KINDS
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(REGEX_MATCH_METHODS)
    }

    fn safe_correction(&self) -> bool {
        false
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        self.matcher.check(
            self,
            node,
            ctx,
            "Use `String#include?` instead of a regex match with literal-only pattern.",
        )
    }
}

const SUBSTITUTION_METHODS: &[&str] = &["gsub", "gsub!", "sub", "sub!"];

/// `gsub`/`sub` of an anchored literal with an empty replacement.
struct AnchoredDeletion {
    pattern: Pattern,
    replacement_method: &'static str,
    strip_anchor: fn(&str) -> &str,
}

impl AnchoredDeletion {
    fn new(
        predicate: &str,
        replacement_method: &'static str,
        strip_anchor: fn(&str) -> &str,
    ) -> Result<Self, PatternSyntaxError> {
        let source = format!(
            "(send $!nil? ${{:gsub :gsub! :sub :sub!}} (regexp (str $#{predicate}) (regopt)) $str)"
        );
        Ok(Self {
            pattern: Pattern::compile_with(&source, &literal_env())?,
            replacement_method,
            strip_anchor,
        })
    }

    fn check(&self, rule: &dyn Rule, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.pattern.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(receiver), Some(method), Some(body), Some(replacement)) = (
            captures.node(0),
            captures.sym(1),
            captures.get(2).and_then(value_str),
            captures.node(3),
        ) else {
            return Vec::new();
        };
        if !replacement.str_value().is_some_and(str::is_empty) {
            return Vec::new();
        }

        let bang = if method.ends_with('!') { "!" } else { "" };
        let preferred = format!("{}{bang}", self.replacement_method);
        let argument = to_string_literal(&interpret_string_escapes((self.strip_anchor)(body)));
        let new_source = format!("{}.{preferred}({argument})", receiver.source());
        let message = format!("Use `{preferred}` instead of `{method}`.");
        vec![ctx
            .offense(rule, selector_span(node), message)
            .with_correction(|corrector| corrector.replace(node.span(), new_source))]
    }
}

pub struct DeletePrefixRule {
    matcher: AnchoredDeletion,
}

impl DeletePrefixRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            matcher: AnchoredDeletion::new("literal_at_start?", "delete_prefix", drop_start_anchor)?,
        })
    }
}

impl Rule for DeletePrefixRule {
    fn id(&self) -> &'static str {
        "Performance/DeletePrefix"
    }

    fn name(&self) -> &'static str {
        "DeletePrefix"
    }

    fn description(&self) -> &'static str {
        "Use delete_prefix instead of substituting an anchored literal with an empty string"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(SUBSTITUTION_METHODS)
    }

    fn minimum_target_ruby_version(&self) -> Option<RubyVersion> {
        Some(RubyVersion::new(2, 5))
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        self.matcher.check(self, node, ctx)
    }
}

pub struct DeleteSuffixRule {
    matcher: AnchoredDeletion,
}

impl DeleteSuffixRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            matcher: AnchoredDeletion::new("literal_at_end?", "delete_suffix", drop_end_anchor)?,
        })
    }
}

impl Rule for DeleteSuffixRule {
    fn id(&self) -> &'static str {
        "Performance/DeleteSuffix"
    }

    fn name(&self) -> &'static str {
        "DeleteSuffix"
    }

    fn description(&self) -> &'static str {
        "Use delete_suffix instead of substituting an anchored literal with an empty string"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(SUBSTITUTION_METHODS)
    }

    fn minimum_target_ruby_version(&self) -> Option<RubyVersion> {
        Some(RubyVersion::new(2, 5))
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        self.matcher.check(self, node, ctx)
    }
}

/// Flags `split` with a regexp that only matches itself.
pub struct RedundantSplitRegexpArgumentRule {
    split_with_regexp: Pattern,
}

impl RedundantSplitRegexpArgumentRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            split_with_regexp: Pattern::compile("(send !nil? :split $(regexp (str _) (regopt)))")?,
        })
    }
}

impl Rule for RedundantSplitRegexpArgumentRule {
    fn id(&self) -> &'static str {
        "Performance/RedundantSplitRegexpArgument"
    }

    fn name(&self) -> &'static str {
        "RedundantSplitRegexpArgument"
    }

    fn description(&self) -> &'static str {
        "Use a string instead of a literal-only regexp as the argument of split"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["split"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(regexp) = self
            .split_with_regexp
            .matches(node)
            .into_captures()
            .and_then(|captures| captures.node(0))
        else {
            return Vec::new();
        };
        let source = regexp.source();
        if !is_literal(source) {
            return Vec::new();
        }
        let Some(body) = source.strip_prefix('/').and_then(|s| s.strip_suffix('/')) else {
            return Vec::new();
        };
        // `split(" ")` splits on runs of whitespace, unlike `split(/ /)`.
        if body == " " {
            return Vec::new();
        }

        let argument = to_double_quoted_literal(&interpret_string_escapes(body));
        vec![ctx
            .offense(self, regexp.span(), "Use string as argument instead of regexp.")
            .with_correction(|corrector| corrector.replace(regexp.span(), argument))]
    }
}

/// Flags `BigDecimal('1')` and `'1'.to_d` where the string is a plain number.
pub struct BigDecimalWithNumericArgumentRule {
    big_decimal_call: Pattern,
    string_to_d: Pattern,
}

impl BigDecimalWithNumericArgumentRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            big_decimal_call: Pattern::compile("(send nil? :BigDecimal $str ...)")?,
            string_to_d: Pattern::compile("(send $str :to_d ...)")?,
        })
    }
}

/// `-12`, `3.25`: digits with an optional sign and fraction.
fn is_plain_number(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}

const MESSAGE_BIG_DECIMAL: &str = "Convert string literal to numeric and pass it to `BigDecimal`.";

impl Rule for BigDecimalWithNumericArgumentRule {
    fn id(&self) -> &'static str {
        "Performance/BigDecimalWithNumericArgument"
    }

    fn name(&self) -> &'static str {
        "BigDecimalWithNumericArgument"
    }

    fn description(&self) -> &'static str {
        "Pass numeric literals to BigDecimal instead of converting strings"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["BigDecimal", "to_d"])
    }

    fn minimum_target_ruby_version(&self) -> Option<RubyVersion> {
        Some(RubyVersion::new(3, 1))
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        if let Some(string) = self.big_decimal_call.matches(node).into_captures().and_then(|c| c.node(0)) {
            let Some(number) = string.str_value().filter(|v| is_plain_number(v)) else {
                return Vec::new();
            };
            return vec![ctx
                .offense(self, string.span(), MESSAGE_BIG_DECIMAL)
                .with_correction(|corrector| corrector.replace(string.span(), number))];
        }

        let Some(string) = self.string_to_d.matches(node).into_captures().and_then(|c| c.node(0)) else {
            return Vec::new();
        };
        let Some(number) = string.str_value().filter(|v| is_plain_number(v)) else {
            return Vec::new();
        };
        let arguments: Vec<&str> = std::iter::once(number)
            .chain(node.arguments().into_iter().map(|arg| arg.source()))
            .collect();
        let new_source = format!("BigDecimal({})", arguments.join(", "));
        vec![ctx
            .offense(self, string.span(), MESSAGE_BIG_DECIMAL)
            .with_correction(|corrector| corrector.replace(node.span(), new_source))]
    }
}
