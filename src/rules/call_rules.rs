//! Rules about method-call chains that have a cheaper single-call spelling.

use super::{range_between, Offense, Rule, RuleContext};
use crate::config::RubyVersion;
use crate::pattern::{Param, Pattern, PatternSyntaxError};
use crate::syntax::{Node, NodeKind, Span, Value};

pub struct AncestorsIncludeRule {
    ancestors_include: Pattern,
}

impl AncestorsIncludeRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            ancestors_include: Pattern::compile(
                "(send (send $_subclass :ancestors) :include? $_superclass)",
            )?,
        })
    }
}

impl Rule for AncestorsIncludeRule {
    fn id(&self) -> &'static str {
        "Performance/AncestorsInclude"
    }

    fn name(&self) -> &'static str {
        "AncestorsInclude"
    }

    fn description(&self) -> &'static str {
        "Use Module#<= instead of ancestors.include?"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["include?"])
    }

    // `<=` raises for non-module arguments where `include?` returns false.
    fn safe_correction(&self) -> bool {
        false
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.ancestors_include.matches(node).into_captures() else {
            return Vec::new();
        };
        let Some(superclass) = captures.named("superclass").and_then(|c| c.as_node()) else {
            return Vec::new();
        };
        let subclass = captures
            .named("subclass")
            .and_then(|c| c.as_node())
            .map_or("self", Node::source);
        let (Some(ancestors), Some(include)) = (
            node.receiver().and_then(|r| r.loc().selector),
            node.loc().selector,
        ) else {
            return Vec::new();
        };

        let new_source = format!("{subclass} <= {}", superclass.source());
        vec![ctx
            .offense(
                self,
                range_between(ancestors, include),
                "Use `<=` instead of `ancestors.include?`.",
            )
            .with_correction(|corrector| corrector.replace(node.span(), new_source))]
    }
}

const COUNT_SELECTORS: &[&str] = &["select", "filter", "find_all", "reject"];
const COUNTERS: &[&str] = &["count", "length", "size"];

/// Flags `select { ... }.size` and friends.
pub struct CountRule;

impl CountRule {
    /// The filtering call under `counter`: either the send part of a block
    /// or a call taking a `&block` argument.
    fn selector_call<'t>(counter: Node<'t>) -> Option<Node<'t>> {
        let receiver = counter.receiver()?;
        let call = match receiver.kind() {
            NodeKind::Block => receiver.send_node()?,
            NodeKind::Send => {
                let [argument] = receiver.arguments()[..] else {
                    return None;
                };
                (argument.kind() == NodeKind::BlockPass).then_some(receiver)?
            }
            _ => return None,
        };
        let method = call.method_name()?;
        (call.kind() == NodeKind::Send && COUNT_SELECTORS.contains(&method)).then_some(call)
    }
}

impl Rule for CountRule {
    fn id(&self) -> &'static str {
        "Performance/Count"
    }

    fn name(&self) -> &'static str {
        "Count"
    }

    fn description(&self) -> &'static str {
        "Use count instead of filtering and then taking the size"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(COUNTERS)
    }

    // `count` on an ActiveRecord relation issues a different query.
    fn safe_correction(&self) -> bool {
        false
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        // `count { ... }` with its own block counts something else.
        if node.has_arguments() || node.block_node().is_some() {
            return Vec::new();
        }
        let Some(call) = Self::selector_call(node) else {
            return Vec::new();
        };
        let (Some(selector), Some(dot), Some(selector_name), Some(counter)) = (
            call.loc().selector,
            node.loc().dot,
            call.method_name(),
            node.method_name(),
        ) else {
            return Vec::new();
        };

        let range = Span::new(selector.start, node.span().end);
        let offense = ctx.offense(
            self,
            range,
            format!("Use `count` instead of `{selector_name}...{counter}`."),
        );
        // `reject` counts the complement.
        if selector_name == "reject" {
            return vec![offense];
        }
        vec![offense.with_correction(|corrector| {
            corrector.replace(selector, "count");
            corrector.remove(Span::new(dot.start, node.span().end));
        })]
    }
}

pub struct MapCompactRule {
    map_compact: Pattern,
}

impl MapCompactRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            map_compact: Pattern::compile(
                "{(send $(send _ {:map :collect} (block_pass (sym _))) :compact) \
                  (send (block $(send _ {:map :collect}) (args ...) _) :compact)}",
            )?,
        })
    }
}

impl Rule for MapCompactRule {
    fn id(&self) -> &'static str {
        "Performance/MapCompact"
    }

    fn name(&self) -> &'static str {
        "MapCompact"
    }

    fn description(&self) -> &'static str {
        "Use filter_map instead of map followed by compact"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["compact"])
    }

    fn minimum_target_ruby_version(&self) -> Option<RubyVersion> {
        Some(RubyVersion::new(2, 7))
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(map) = self.map_compact.matches(node).into_captures().and_then(|c| c.node(0)) else {
            return Vec::new();
        };
        let (Some(map_selector), Some(dot), Some(compact_selector)) =
            (map.loc().selector, node.loc().dot, node.loc().selector)
        else {
            return Vec::new();
        };
        vec![ctx
            .offense(
                self,
                range_between(map_selector, compact_selector),
                "Use `filter_map` instead.",
            )
            .with_correction(|corrector| {
                corrector.replace(map_selector, "filter_map");
                corrector.remove(dot);
                corrector.remove(compact_selector);
            })]
    }
}

/// Flags `select { ... }.any?` and similar predicate chains.
pub struct PredicateOnSelectResultRule {
    select_predicate: Pattern,
}

impl PredicateOnSelectResultRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            select_predicate: Pattern::compile(
                "(send \
                   {(block $(send _ {:select :filter}) ...) \
                    $(send _ {:select :filter} block_pass_type?)} \
                   {:any? :empty? :none?})",
            )?,
        })
    }

    fn replacement(predicate: &str) -> &'static str {
        match predicate {
            "any?" => "any?",
            _ => "none?",
        }
    }
}

impl Rule for PredicateOnSelectResultRule {
    fn id(&self) -> &'static str {
        "Performance/PredicateOnSelectResult"
    }

    fn name(&self) -> &'static str {
        "PredicateOnSelectResult"
    }

    fn description(&self) -> &'static str {
        "Pass the block to the predicate instead of filtering first"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["any?", "empty?", "none?"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        if node.has_arguments() || node.block_node().is_some() {
            return Vec::new();
        }
        let Some(select) = self
            .select_predicate
            .matches(node)
            .into_captures()
            .and_then(|c| c.node(0))
        else {
            return Vec::new();
        };
        let (Some(select_selector), Some(predicate_selector), Some(receiver)) =
            (select.loc().selector, node.loc().selector, node.receiver())
        else {
            return Vec::new();
        };
        let (Some(select_name), Some(predicate)) = (select.method_name(), node.method_name()) else {
            return Vec::new();
        };

        let prefer = Self::replacement(predicate);
        let message = format!("Use `{prefer}` instead of `{select_name}.{predicate}`.");
        let predicate_range = Span::new(receiver.span().end, predicate_selector.end);
        vec![ctx
            .offense(self, select_selector.join(predicate_selector), message)
            .with_correction(|corrector| {
                corrector.remove(predicate_range);
                corrector.replace(select_selector, prefer);
            })]
    }
}

/// `sort { |a, b| ... }` with a body that only compares the two parameters.
struct SortBlock {
    sort_with_block: Pattern,
    comparison: Pattern,
}

impl SortBlock {
    fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            sort_with_block: Pattern::compile(
                "(block $(send _ :sort) (args (arg $_a) (arg $_b)) $send)",
            )?,
            comparison: Pattern::compile("(send (lvar %1) :<=> (lvar %2))")?,
        })
    }

    /// The range from `sort` to the end of the block and the two parameter
    /// names, when the body is `left <=> right`.
    fn find<'t>(&self, node: Node<'t>, reversed: bool) -> Option<(Span, &'t str, &'t str)> {
        let captures = self.sort_with_block.matches(node).into_captures()?;
        let (send, a, b, body) = (
            captures.node(0)?,
            captures.sym(1)?,
            captures.sym(2)?,
            captures.node(3)?,
        );
        let (left, right) = if reversed { (b, a) } else { (a, b) };
        let params = [Param::Value(Value::sym(left)), Param::Value(Value::sym(right))];
        if !self.comparison.match_with(body, &params).is_match() {
            return None;
        }
        let selector = send.loc().selector?;
        let end = node.loc().end?;
        Some((range_between(selector, end), a, b))
    }
}

pub struct RedundantSortBlockRule {
    sort_block: SortBlock,
}

impl RedundantSortBlockRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            sort_block: SortBlock::new()?,
        })
    }
}

impl Rule for RedundantSortBlockRule {
    fn id(&self) -> &'static str {
        "Performance/RedundantSortBlock"
    }

    fn name(&self) -> &'static str {
        "RedundantSortBlock"
    }

    fn description(&self) -> &'static str {
        "Use sort instead of sort with a block that does the default comparison"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Block]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some((range, a, b)) = self.sort_block.find(node, false) else {
            return Vec::new();
        };
        let message = format!("Use `sort` instead of `sort {{ |{a}, {b}| {a} <=> {b} }}`.");
        vec![ctx
            .offense(self, range, message)
            .with_correction(|corrector| corrector.replace(range, "sort"))]
    }
}

pub struct SortReverseRule {
    sort_block: SortBlock,
}

impl SortReverseRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            sort_block: SortBlock::new()?,
        })
    }
}

impl Rule for SortReverseRule {
    fn id(&self) -> &'static str {
        "Performance/SortReverse"
    }

    fn name(&self) -> &'static str {
        "SortReverse"
    }

    fn description(&self) -> &'static str {
        "Use sort.reverse instead of sort with a block that reverses the comparison"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Block]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some((range, a, b)) = self.sort_block.find(node, true) else {
            return Vec::new();
        };
        let message = format!("Use `sort.reverse` instead of `sort {{ |{a}, {b}| {b} <=> {a} }}`.");
        vec![ctx
            .offense(self, range, message)
            .with_correction(|corrector| corrector.replace(range, "sort.reverse"))]
    }
}

pub struct ReverseEachRule {
    reverse_each: Pattern,
}

impl ReverseEachRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            reverse_each: Pattern::compile("(send $(send _ :reverse) ${:each :each_with_index})")?,
        })
    }
}

impl Rule for ReverseEachRule {
    fn id(&self) -> &'static str {
        "Performance/ReverseEach"
    }

    fn name(&self) -> &'static str {
        "ReverseEach"
    }

    fn description(&self) -> &'static str {
        "Use reverse_each instead of reverse.each"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["each", "each_with_index"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.reverse_each.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(reverse), Some(current)) = (captures.node(0), captures.sym(1)) else {
            return Vec::new();
        };
        let (Some(reverse_selector), Some(dot), Some(selector)) =
            (reverse.loc().selector, node.loc().dot, node.loc().selector)
        else {
            return Vec::new();
        };
        let prefer = if current == "each" { "_each" } else { "_each.with_index" };
        let message = format!("Use `reverse{prefer}` instead of `reverse.{current}`.");
        vec![ctx
            .offense(self, range_between(reverse_selector, selector), message)
            .with_correction(|corrector| corrector.replace(range_between(dot, selector), prefer))]
    }
}

/// Flags blocks whose only job is to `yield` to the enclosing method's block.
pub struct UnnecessaryStackframeRule {
    yield_in_block: Pattern,
}

impl UnnecessaryStackframeRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            yield_in_block: Pattern::compile("(block (send ...) (args) (yield))")?,
        })
    }
}

impl Rule for UnnecessaryStackframeRule {
    fn id(&self) -> &'static str {
        "Performance/UnnecessaryStackframe"
    }

    fn name(&self) -> &'static str {
        "UnnecessaryStackframe"
    }

    fn description(&self) -> &'static str {
        "Forward the received block instead of wrapping yield in a new block"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Block]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        if !self.yield_in_block.is_match(node) {
            return Vec::new();
        }
        vec![ctx.offense(
            self,
            node.span(),
            "Forward the received block directly instead of using `yield`.",
        )]
    }
}
