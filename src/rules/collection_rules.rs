//! Rules about array and hash literals and the calls made on them.

use super::{range_between, selector_span, Offense, Rule, RuleContext};
use crate::config::RubyVersion;
use crate::pattern::{Pattern, PatternSyntaxError};
use crate::syntax::{Node, NodeKind, Span};

/// `Enumerable` instance methods plus `each`.
const ENUMERABLE_METHODS: &[&str] = &[
    "all?", "any?", "chain", "chunk", "chunk_while", "collect", "collect_concat", "compact",
    "count", "cycle", "detect", "drop", "drop_while", "each", "each_cons", "each_entry",
    "each_slice", "each_with_index", "each_with_object", "entries", "filter", "filter_map",
    "find", "find_all", "find_index", "first", "flat_map", "grep", "grep_v", "group_by",
    "include?", "inject", "lazy", "map", "max", "max_by", "member?", "min", "min_by", "minmax",
    "minmax_by", "none?", "one?", "partition", "reduce", "reject", "reverse_each", "select",
    "slice_after", "slice_before", "slice_when", "sort", "sort_by", "sum", "take", "take_while",
    "tally", "to_a", "to_h", "to_set", "uniq", "zip",
];

const NONMUTATING_ARRAY_METHODS: &[&str] = &[
    "&", "*", "+", "-", "<=>", "==", "[]", "all?", "any?", "assoc", "at", "bsearch",
    "bsearch_index", "collect", "combination", "compact", "count", "cycle", "deconstruct",
    "difference", "dig", "drop", "drop_while", "each", "each_index", "empty?", "eql?", "fetch",
    "filter", "find_index", "first", "flatten", "hash", "include?", "index", "inspect",
    "intersection", "join", "last", "length", "map", "max", "min", "minmax", "none?", "one?",
    "pack", "permutation", "product", "rassoc", "reject", "repeated_combination",
    "repeated_permutation", "reverse", "reverse_each", "rindex", "rotate", "sample", "select",
    "shuffle", "size", "slice", "sort", "sum", "take", "take_while", "to_a", "to_ary", "to_h",
    "to_s", "transpose", "union", "uniq", "values_at", "zip", "|",
];

const NONMUTATING_HASH_METHODS: &[&str] = &[
    "<", "<=", "==", ">", ">=", "[]", "any?", "assoc", "compact", "dig", "each", "each_key",
    "each_pair", "each_value", "empty?", "eql?", "fetch", "fetch_values", "filter", "flatten",
    "has_key?", "has_value?", "hash", "include?", "inspect", "invert", "key", "key?", "keys?",
    "length", "member?", "merge", "rassoc", "rehash", "reject", "select", "size", "slice",
    "to_a", "to_h", "to_hash", "to_proc", "to_s", "transform_keys", "transform_values",
    "value?", "values", "values_at",
];

fn is_enumerable_method(name: &str) -> bool {
    ENUMERABLE_METHODS.contains(&name)
}

/// The literal receiver of `node` and its class name, when the call cannot
/// mutate it and the literal is big and constant enough to hoist.
fn hoistable_literal<'t>(node: Node<'t>, min_size: usize) -> Option<(Node<'t>, &'static str)> {
    let receiver = node.receiver()?;
    let method = node.method_name()?;
    let class = match receiver.kind() {
        NodeKind::Array
            if is_enumerable_method(method) || NONMUTATING_ARRAY_METHODS.contains(&method) =>
        {
            "Array"
        }
        NodeKind::Hash
            if is_enumerable_method(method) || NONMUTATING_HASH_METHODS.contains(&method) =>
        {
            "Hash"
        }
        _ => return None,
    };
    let keep = receiver.child_count() >= min_size
        && receiver.is_recursive_basic_literal()
        && !receiver.is_mutated_by_chain();
    keep.then_some((receiver, class))
}

pub struct CollectionLiteralInMethodRule;

impl Rule for CollectionLiteralInMethodRule {
    fn id(&self) -> &'static str {
        "Performance/CollectionLiteralInMethod"
    }

    fn name(&self) -> &'static str {
        "CollectionLiteralInMethod"
    }

    fn description(&self) -> &'static str {
        "Extract immutable array and hash literals in method bodies into constants"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let min_size = ctx.settings.collection_literal_in_method.min_size;
        let Some((literal, class)) = hoistable_literal(node, min_size) else {
            return Vec::new();
        };
        let in_method = literal
            .ancestors()
            .any(|ancestor| matches!(ancestor.kind(), NodeKind::Def | NodeKind::Defs));
        if !in_method {
            return Vec::new();
        }
        let message = format!(
            "Avoid immutable {class} literals in method definition. \
             It is better to extract it into a constant."
        );
        vec![ctx.offense(self, literal.span(), message)]
    }
}

pub struct CollectionLiteralInLoopRule;

impl CollectionLiteralInLoopRule {
    fn is_loop(ancestor: Node<'_>, literal: Node<'_>) -> bool {
        match ancestor.kind() {
            NodeKind::While | NodeKind::Until | NodeKind::For => true,
            NodeKind::Block => {
                let Some(send) = ancestor.send_node() else {
                    return false;
                };
                let Some(method) = send.method_name() else {
                    return false;
                };
                if method == "loop" {
                    return send.receiver().map_or(true, |r| r.source() == "Kernel");
                }
                // The receiver is evaluated once, before iterating.
                is_enumerable_method(method)
                    && send
                        .receiver()
                        .map_or(true, |r| !r.span().contains(literal.span()))
            }
            _ => false,
        }
    }

    /// Ruby 3.4 avoids allocating `[...]` in `[...].include?(x)` when `x`
    /// is a simple value or an argument-free call chain.
    fn allocation_elided(node: Node<'_>, ctx: &RuleContext<'_>) -> bool {
        if ctx.target_ruby_version < RubyVersion::new(3, 4)
            || !node.is_method("include?")
            || node.receiver().map(Node::kind) != Some(NodeKind::Array)
        {
            return false;
        }
        let [argument] = node.arguments()[..] else {
            return false;
        };
        let mut current = argument;
        loop {
            match current.kind() {
                NodeKind::Send | NodeKind::Csend => {
                    if current.has_arguments() || current.block_node().is_some() {
                        return false;
                    }
                    match current.receiver() {
                        Some(receiver) => current = receiver,
                        None => return true,
                    }
                }
                NodeKind::Str | NodeKind::SelfRef | NodeKind::Lvar | NodeKind::Ivar => return true,
                _ => return false,
            }
        }
    }
}

impl Rule for CollectionLiteralInLoopRule {
    fn id(&self) -> &'static str {
        "Performance/CollectionLiteralInLoop"
    }

    fn name(&self) -> &'static str {
        "CollectionLiteralInLoop"
    }

    fn description(&self) -> &'static str {
        "Extract immutable array and hash literals in loops into local variables or constants"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let min_size = ctx.settings.collection_literal_in_loop.min_size;
        let Some((literal, class)) = hoistable_literal(node, min_size) else {
            return Vec::new();
        };
        if Self::allocation_elided(node, ctx)
            || !literal.ancestors().any(|ancestor| Self::is_loop(ancestor, literal))
        {
            return Vec::new();
        }
        let message = format!(
            "Avoid immutable {class} literals in loops. \
             It is better to extract it into a local variable or a constant."
        );
        vec![ctx.offense(self, literal.span(), message)]
    }
}

/// Flags `count` on values known to be arrays or hashes.
pub struct SizeRule {
    count_on_collection: Pattern,
}

impl SizeRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            count_on_collection: Pattern::compile(
                "(send {array hash (send _ {:to_a :to_h}) (send (const nil? {:Array :Hash}) :[] _)} :count)",
            )?,
        })
    }
}

impl Rule for SizeRule {
    fn id(&self) -> &'static str {
        "Performance/Size"
    }

    fn name(&self) -> &'static str {
        "Size"
    }

    fn description(&self) -> &'static str {
        "Use size instead of count on arrays and hashes"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["count"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        // `count { ... }` counts matching elements.
        if node.block_node().is_some() || !self.count_on_collection.is_match(node) {
            return Vec::new();
        }
        let selector = selector_span(node);
        vec![ctx
            .offense(self, selector, "Use `size` instead of `count`.")
            .with_correction(|corrector| corrector.replace(selector, "size"))]
    }
}

pub struct ArrayConcatLiteralRule {
    concat_call: Pattern,
}

impl ArrayConcatLiteralRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            concat_call: Pattern::compile("(call $!nil? :concat $(array ...))")?,
        })
    }

    /// Elements of `array` as `push` arguments, expanding `%w`/`%i` forms.
    fn push_arguments(array: Node<'_>, source: &str) -> String {
        let opening = array.loc().begin.map_or("", |span| &source[span.as_range()]);
        let elements: Vec<&str> = array.child_nodes().map(Node::source).collect();
        if opening.starts_with("%w") {
            format!("'{}'", elements.join("', '"))
        } else if opening.starts_with("%W") {
            format!("\"{}\"", elements.join("\", \""))
        } else if opening.starts_with("%i") {
            format!(":{}", elements.join(", :"))
        } else if opening.starts_with("%I") {
            format!(":\"{}\"", elements.join("\", :\""))
        } else {
            elements.join(", ")
        }
    }
}

impl Rule for ArrayConcatLiteralRule {
    fn id(&self) -> &'static str {
        "Performance/ArrayConcatLiteral"
    }

    fn name(&self) -> &'static str {
        "ArrayConcatLiteral"
    }

    fn description(&self) -> &'static str {
        "Use push instead of concatenating an array literal"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send, NodeKind::Csend]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["concat"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.concat_call.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(receiver), Some(array)) = (captures.node(0), captures.node(1)) else {
            return Vec::new();
        };
        let dot = if node.is_safe_navigation() { "&." } else { "." };
        let new_source = format!(
            "{}{dot}push({})",
            receiver.source(),
            Self::push_arguments(array, ctx.source())
        );
        vec![ctx
            .offense(self, node.span(), "Use `push` instead of concatenating a literal.")
            .with_correction(|corrector| corrector.replace(node.span(), new_source))]
    }
}

pub struct ArrayInsertRule {
    insert_at_zero: Pattern,
}

impl ArrayInsertRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            insert_at_zero: Pattern::compile("(send _ :insert (int 0) ...)")?,
        })
    }
}

impl Rule for ArrayInsertRule {
    fn id(&self) -> &'static str {
        "Performance/ArrayInsert"
    }

    fn name(&self) -> &'static str {
        "ArrayInsert"
    }

    fn description(&self) -> &'static str {
        "Use unshift instead of insert at index zero"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["insert"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        if !self.insert_at_zero.is_match(node) {
            return Vec::new();
        }
        let Some(selector) = node.loc().selector else {
            return Vec::new();
        };
        let arguments = node.arguments();
        let Some(index) = arguments.first().copied() else {
            return Vec::new();
        };
        let loc = node.loc();
        let removal = match (arguments.get(1), loc.begin, loc.end) {
            (Some(second), _, _) => Span::new(index.span().start, second.span().start),
            (None, Some(open), Some(close)) => range_between(open, close),
            (None, _, _) => Span::new(selector.end, index.span().end),
        };

        vec![ctx
            .offense(
                self,
                Span::new(selector.start, node.span().end),
                "Use `unshift` instead of `insert(0, ...)` for better performance.",
            )
            .with_correction(|corrector| {
                corrector.replace(selector, "unshift");
                corrector.remove(removal);
            })]
    }
}

/// Flags `push`/`append` with exactly one plain argument.
pub struct ArrayPushSingleRule {
    push_call: Pattern,
}

impl ArrayPushSingleRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            push_call: Pattern::compile("(call $!nil? ${:push :append} $!{splat block_pass})")?,
        })
    }

    /// `<<` binds tighter than these, so they need parentheses.
    fn operand_source(element: Node<'_>) -> String {
        let loose = match element.kind() {
            NodeKind::And
            | NodeKind::Or
            | NodeKind::If
            | NodeKind::While
            | NodeKind::Until
            | NodeKind::Irange
            | NodeKind::Erange
            | NodeKind::MatchWithLvasgn
            | NodeKind::Lvasgn
            | NodeKind::Ivasgn
            | NodeKind::Gvasgn
            | NodeKind::Cvasgn
            | NodeKind::Casgn
            | NodeKind::OpAsgn
            | NodeKind::OrAsgn
            | NodeKind::AndAsgn
            | NodeKind::Other("rescue_modifier" | "masgn") => true,
            NodeKind::Defined => element.loc().begin.is_none() && !element.source().ends_with(')'),
            NodeKind::Send | NodeKind::Csend => {
                Self::is_keyword_not(element)
                    || Self::binary_operator(element).is_some_and(|op| LOOSE_OPERATORS.contains(&op))
                    || Self::is_command_call(element)
            }
            NodeKind::Super | NodeKind::Yield => {
                element.child_count() > 0 && !element.source().ends_with(')')
            }
            _ => false,
        };
        if loose {
            format!("({})", element.source())
        } else {
            element.source().to_string()
        }
    }

    fn is_keyword_not(node: Node<'_>) -> bool {
        node.is_method("!") && node.source().starts_with("not")
    }

    /// Method name of an infix operator call such as `a == b`.
    fn binary_operator(node: Node<'_>) -> Option<&str> {
        if node.loc().dot.is_some() || node.receiver().is_none() || !node.has_arguments() {
            return None;
        }
        node.method_name().filter(|name| {
            name.chars().next().is_some_and(|c| !c.is_alphanumeric() && c != '_') && *name != "[]"
        })
    }

    /// `foo x` or `foo.bar x`: arguments without parentheses.
    fn is_command_call(node: Node<'_>) -> bool {
        node.has_arguments()
            && node.loc().begin.is_none()
            && (node.loc().dot.is_some() || node.receiver().is_none())
    }

    /// Whether `receiver << element` standing in for `node` would be
    /// regrouped by the expression around it.
    fn needs_wrapping(node: Node<'_>) -> bool {
        let Some(parent) = node.parent().filter(|p| p.is_call()) else {
            return false;
        };
        if parent.receiver() == Some(node) {
            return true;
        }
        Self::binary_operator(parent).is_some_and(|op| TIGHT_OPERATORS.contains(&op))
    }
}

/// Infix operators binding looser than or as loose as `<<`.
const LOOSE_OPERATORS: &[&str] = &[
    "<<", ">>", "&", "|", "^", "<", "<=", ">", ">=", "==", "!=", "===", "=~", "!~", "<=>",
];

/// Infix operators binding at least as tight as `<<`.
const TIGHT_OPERATORS: &[&str] = &["+", "-", "*", "/", "%", "**", "<<", ">>"];

impl Rule for ArrayPushSingleRule {
    fn id(&self) -> &'static str {
        "Performance/ArrayPushSingle"
    }

    fn name(&self) -> &'static str {
        "ArrayPushSingle"
    }

    fn description(&self) -> &'static str {
        "Use << instead of push or append with a single element"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send, NodeKind::Csend]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["push", "append"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.push_call.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(receiver), Some(method), Some(element)) =
            (captures.node(0), captures.sym(1), captures.node(2))
        else {
            return Vec::new();
        };
        // `push(key: value)` has no `<<` spelling.
        if element.kind() == NodeKind::Hash && element.loc().begin.is_none() {
            return Vec::new();
        }
        if node.block_node().is_some() {
            return Vec::new();
        }

        let operand = Self::operand_source(element);
        let mut new_source = if node.is_safe_navigation() {
            format!("{}&.<< {operand}", receiver.source())
        } else {
            format!("{} << {operand}", receiver.source())
        };
        if Self::needs_wrapping(node) {
            new_source = format!("({new_source})");
        }
        vec![ctx
            .offense(self, node.span(), format!("Use `<<` instead of `{method}`."))
            .with_correction(|corrector| corrector.replace(node.span(), new_source))]
    }
}

const STRAIGHT_INTERSECTION_METHODS: &[&str] = &["present?", "any?"];

/// Flags `(a & b).any?` and friends.
pub struct IntersectionCheckRule {
    intersection_check: Pattern,
}

impl IntersectionCheckRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            intersection_check: Pattern::compile(
                "(send (begin (send $_ :& $_)) ${:present? :any? :blank? :empty?})",
            )?,
        })
    }
}

impl Rule for IntersectionCheckRule {
    fn id(&self) -> &'static str {
        "Performance/IntersectionCheck"
    }

    fn name(&self) -> &'static str {
        "IntersectionCheck"
    }

    fn description(&self) -> &'static str {
        "Use Array#intersect? instead of checking the emptiness of an intersection"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["present?", "any?", "blank?", "empty?"])
    }

    fn minimum_target_ruby_version(&self) -> Option<RubyVersion> {
        Some(RubyVersion::new(3, 1))
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        // `any? { ... }` tests elements, not emptiness.
        if node.block_node().is_some() {
            return Vec::new();
        }
        let Some(captures) = self.intersection_check.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(receiver), Some(argument), Some(method)) =
            (captures.node(0), captures.node(1), captures.sym(2))
        else {
            return Vec::new();
        };
        let negated = if STRAIGHT_INTERSECTION_METHODS.contains(&method) { "" } else { "!" };
        let (receiver, argument) = (receiver.source(), argument.source());
        let preferred = format!("{negated}{receiver}.intersect?({argument})");
        let message =
            format!("Use `{preferred}` instead of `({receiver} & {argument}).{method}`.");
        vec![ctx
            .offense(self, node.span(), message)
            .with_correction(|corrector| corrector.replace(node.span(), preferred))]
    }
}

/// Flags `reduce({}) { |acc, x| acc.merge(...) }`, which copies the hash on
/// every iteration.
pub struct ReduceMergeRule {
    reduce_with_merge: Pattern,
}

impl ReduceMergeRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            reduce_with_merge: Pattern::compile(
                "(block \
                   $(send _ :reduce {hash (send (const nil? :Hash) :new)}) \
                   $(args (arg $_) ...) \
                   {(begin ... $(send (lvar $_) :merge ...)) \
                    $(send (lvar $_) :merge ...)})",
            )?,
        })
    }

    fn merge_replacement(merge: Node<'_>, receiver: &str, indentation: &str) -> String {
        let mut statements = Vec::new();
        let mut others: Vec<&str> = Vec::new();
        let flush = |others: &mut Vec<&str>, statements: &mut Vec<String>| {
            if !others.is_empty() {
                statements.push(format!("{receiver}.merge!({})", others.join(", ")));
                others.clear();
            }
        };
        for argument in merge.arguments() {
            let is_pairs = argument.kind() == NodeKind::Hash
                && argument.child_nodes().all(|child| child.kind() == NodeKind::Pair);
            if !is_pairs {
                others.push(argument.source());
                continue;
            }
            flush(&mut others, &mut statements);
            for pair in argument.child_nodes() {
                if let (Some(key), Some(value)) = (pair.child_node(0), pair.child_node(1)) {
                    statements.push(format!("{receiver}[{}] = {}", key.source(), value.source()));
                }
            }
        }
        flush(&mut others, &mut statements);
        statements.join(&format!("\n{indentation}"))
    }
}

/// Leading whitespace of the line `offset` is on.
fn line_indentation(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

const MESSAGE_REDUCE_MERGE: &str = "Do not use `Hash#merge` to build new hashes within `Enumerable#reduce`. \
     Use `Enumerable#each_with_object({})` and mutate a single `Hash` instead.";

impl Rule for ReduceMergeRule {
    fn id(&self) -> &'static str {
        "Performance/ReduceMerge"
    }

    fn name(&self) -> &'static str {
        "ReduceMerge"
    }

    fn description(&self) -> &'static str {
        "Use each_with_object instead of merging hashes inside reduce"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Block]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.reduce_with_merge.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(reduce), Some(args), Some(accumulator), Some(merge), Some(merge_receiver)) = (
            captures.node(0),
            captures.node(1),
            captures.sym(2),
            captures.node(3),
            captures.sym(4),
        ) else {
            return Vec::new();
        };
        if accumulator != merge_receiver {
            return Vec::new();
        }
        let Some(reduce_selector) = reduce.loc().selector else {
            return Vec::new();
        };

        // `reduce` yields the accumulator first, `each_with_object` last.
        let mut params: Vec<&str> = args.child_nodes().map(Node::source).collect();
        params.rotate_left(1);
        let params = format!("|{}|", params.join(", "));
        let indentation = line_indentation(ctx.source(), merge.span().start);
        let merge_source = Self::merge_replacement(merge, merge_receiver, indentation);

        vec![ctx
            .offense(self, node.span(), MESSAGE_REDUCE_MERGE)
            .with_correction(|corrector| {
                corrector.replace(reduce_selector, "each_with_object");
                corrector.replace(args.span(), params);
                corrector.replace(merge.span(), merge_source);
            })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionLiteralSettings;
    use crate::rules::testing::{
        config_for, expect_correction, expect_correction_with, expect_no_offenses,
        expect_no_offenses_with, expect_offense, expect_offense_with,
    };
    use crate::Config;

    fn loop_config(min_size: usize) -> Config {
        let mut config = Config::default();
        config.settings.collection_literal_in_loop = CollectionLiteralSettings { min_size };
        config
    }

    #[test]
    fn test_collection_literal_in_loop_keyword_loops() {
        expect_offense(
            CollectionLiteralInLoopRule,
            r"
while true
  [1, 2, 3].include?(e)
  ^^^^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
end
until i < 100
  { foo: :bar }.key?(:foo)
  ^^^^^^^^^^^^^ Avoid immutable Hash literals in loops. It is better to extract it into a local variable or a constant.
end
for i in 1..100
  [1, 2, 3].include?(e)
  ^^^^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
end
",
        );
    }

    #[test]
    fn test_collection_literal_in_loop_block_loops() {
        expect_offense(
            CollectionLiteralInLoopRule,
            r"
loop do
  [1, 2, 3].include?(e)
  ^^^^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
end
array.all? do |e|
  { foo: :bar }.key?(:foo)
  ^^^^^^^^^^^^^ Avoid immutable Hash literals in loops. It is better to extract it into a local variable or a constant.
end
all? do |e|
  [1, 2, 3].include?(e)
  ^^^^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
end
",
        );
    }

    #[test]
    fn test_collection_literal_in_loop_accepts() {
        expect_no_offenses(
            CollectionLiteralInLoopRule,
            r"
[1, 2, 3].include?(e)
loop do
  [1, 2, variable].include?(e)
  [1, nil, 3].compact!
  array = [1, nil, 3]
  array.all? { |x| x > 100 }
end
[[1, 2, 3] | [2, 3, 4]].each { |e| puts e }
",
        );
    }

    #[test]
    fn test_collection_literal_in_loop_min_size() {
        let source = "while true\n  [1].include?(e)\nend\n";
        expect_no_offenses_with(CollectionLiteralInLoopRule, &loop_config(2), source);
        expect_offense_with(
            CollectionLiteralInLoopRule,
            &loop_config(2),
            r"
while true
  [1, 2].include?(e)
  ^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
end
",
        );
    }

    #[test]
    fn test_collection_literal_in_loop_ruby_34_include() {
        let config = config_for("3.4");
        expect_no_offenses_with(
            CollectionLiteralInLoopRule,
            &config,
            r#"
@ivar = 1
array.all? do |e|
  [1, 2, 3].include?(e)
  [1, 2, 3].include?("string")
  [1, 2, 3].include?(self)
  [1, 2, 3].include?(method_call.call.call)
  [1, 2, 3].include?(@ivar)
end
"#,
        );
        expect_offense_with(
            CollectionLiteralInLoopRule,
            &config,
            r"
each do
  [1, 2, 3].include?(method_call.call(true))
  ^^^^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
  { foo: :bar }.include?(:foo)
  ^^^^^^^^^^^^^ Avoid immutable Hash literals in loops. It is better to extract it into a local variable or a constant.
  [1, 2, 3].index(foo)
  ^^^^^^^^^ Avoid immutable Array literals in loops. It is better to extract it into a local variable or a constant.
end
",
        );
    }

    #[test]
    fn test_collection_literal_in_method() {
        expect_offense(
            CollectionLiteralInMethodRule,
            r"
def foo(e)
  [1, 2, 3].include?(e)
  ^^^^^^^^^ Avoid immutable Array literals in method definition. It is better to extract it into a constant.
end
def self.bar
  { foo: :bar }.key?(:foo)
  ^^^^^^^^^^^^^ Avoid immutable Hash literals in method definition. It is better to extract it into a constant.
end
",
        );
        expect_no_offenses(
            CollectionLiteralInMethodRule,
            r"
[1, 2, 3].include?(e)
def foo
  [1, variable].include?(e)
  [1, nil, 3].compact!
end
",
        );
    }

    #[test]
    fn test_size() {
        expect_offense(
            SizeRule::new().unwrap(),
            r"
[1, 2, 3].count
          ^^^^^ Use `size` instead of `count`.
{a: 1}.count
       ^^^^^ Use `size` instead of `count`.
foo.to_a.count
         ^^^^^ Use `size` instead of `count`.
",
        );
        expect_correction(SizeRule::new().unwrap(), "[1, 2, 3].count\n", "[1, 2, 3].size\n");
        expect_no_offenses(SizeRule::new().unwrap(), "[1, 2, 3].count { |e| e > 1 }\nfoo.count\n[1].count(1)\n");
    }

    #[test]
    fn test_array_concat_literal() {
        let rule = || ArrayConcatLiteralRule::new().unwrap();
        expect_offense(
            rule(),
            r"
array.concat([1, 2])
^^^^^^^^^^^^^^^^^^^^ Use `push` instead of concatenating a literal.
",
        );
        expect_correction(rule(), "array.concat([1, 2])\n", "array.push(1, 2)\n");
        expect_correction(rule(), "array&.concat([x])\n", "array&.push(x)\n");
        expect_correction(rule(), "array.concat(%w[a b])\n", "array.push('a', 'b')\n");
        expect_correction(rule(), "array.concat(%i[a b])\n", "array.push(:a, :b)\n");
        expect_no_offenses(rule(), "array.concat(other)\nconcat([1])\n");
    }

    #[test]
    fn test_array_insert() {
        let rule = || ArrayInsertRule::new().unwrap();
        expect_offense(
            rule(),
            r"
array.insert(0, item)
      ^^^^^^^^^^^^^^^ Use `unshift` instead of `insert(0, ...)` for better performance.
",
        );
        expect_correction(rule(), "array.insert(0, 1, 2, 3)\n", "array.unshift(1, 2, 3)\n");
        expect_correction(rule(), "array.insert(0, *items)\n", "array.unshift(*items)\n");
        expect_correction(rule(), "array.insert 0, item\n", "array.unshift item\n");
        expect_correction(rule(), "array.insert(0)\n", "array.unshift\n");
        expect_correction(rule(), "array.insert 0\n", "array.unshift\n");
        expect_correction(rule(), "[1, 2, 3].insert(0, 0).reverse\n", "[1, 2, 3].unshift(0).reverse\n");
        expect_no_offenses(rule(), "array.insert(1, item)\narray.insert(index, item)\narray.unshift(item)\n");
    }

    #[test]
    fn test_array_push_single() {
        let rule = || ArrayPushSingleRule::new().unwrap();
        expect_offense(
            rule(),
            r"
array.push(element)
^^^^^^^^^^^^^^^^^^^ Use `<<` instead of `push`.
array.append(element)
^^^^^^^^^^^^^^^^^^^^^ Use `<<` instead of `append`.
",
        );
        expect_correction(rule(), "array.push(element)\n", "array << element\n");
        expect_correction(rule(), "array&.push(x)\n", "array&.<< x\n");
        expect_correction(rule(), "array.push(a || b)\n", "array << (a || b)\n");
        expect_correction(rule(), "foo&.push(x) if y\n", "foo&.<< x if y\n");
    }

    #[test]
    fn test_array_push_single_keeps_grouping() {
        let rule = || ArrayPushSingleRule::new().unwrap();
        expect_correction(rule(), "a.push(b.push(c))\n", "a << (b << c)\n");
        expect_correction(rule(), "a.push(b rescue c)\n", "a << (b rescue c)\n");
        expect_correction(rule(), "a.push(not b)\n", "a << (not b)\n");
        expect_correction(rule(), "a.push(b == c)\n", "a << (b == c)\n");
        expect_correction(rule(), "a.push(b + c)\n", "a << b + c\n");
        expect_correction(rule(), "a.push(b).size\n", "(a << b).size\n");
        expect_correction(rule(), "x + a.push(b)\n", "x + (a << b)\n");
        expect_correction(rule(), "x == a.push(b)\n", "x == a << b\n");
        expect_correction(rule(), "foo(a.push(b))\n", "foo(a << b)\n");
    }

    #[test]
    fn test_array_push_single_skips_unsupported_shapes() {
        let rule = || ArrayPushSingleRule::new().unwrap();
        expect_no_offenses(
            rule(),
            "array.push(1, 2)\narray.push(*elements)\narray.push\npush(1)\narray.push(key: 1)\n",
        );
    }

    #[test]
    fn test_intersection_check() {
        let rule = || IntersectionCheckRule::new().unwrap();
        let config = config_for("3.1");
        expect_offense_with(
            rule(),
            &config,
            r"
(a & b).any?
^^^^^^^^^^^^ Use `a.intersect?(b)` instead of `(a & b).any?`.
(a & b).empty?
^^^^^^^^^^^^^^ Use `!a.intersect?(b)` instead of `(a & b).empty?`.
",
        );
        expect_correction_with(rule(), &config, "(a & b).blank?\n", "!a.intersect?(b)\n");
        expect_no_offenses_with(rule(), &config, "(a & b).any? { |x| x > 1 }\n(a | b).any?\n");
        expect_no_offenses(rule(), "(a & b).any?\n");
    }

    #[test]
    fn test_reduce_merge_multiline() {
        let rule = || ReduceMergeRule::new().unwrap();
        let source = "\
enumerable.reduce({}) do |hash, (key, value)|
  other(stuff)
  hash.merge(key => value, another => pair)
end
";
        expect_offense(
            rule(),
            r"
enumerable.reduce({}) do |hash, (key, value)|
^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ Do not use `Hash#merge` to build new hashes within `Enumerable#reduce`. Use `Enumerable#each_with_object({})` and mutate a single `Hash` instead.
  other(stuff)
  hash.merge(key => value, another => pair)
end
",
        );
        expect_correction(
            rule(),
            source,
            "\
enumerable.each_with_object({}) do |(key, value), hash|
  other(stuff)
  hash[key] = value
  hash[another] = pair
end
",
        );
    }

    #[test]
    fn test_reduce_merge_mixed_arguments() {
        expect_correction(
            ReduceMergeRule::new().unwrap(),
            "\
enumerable.reduce(Hash.new) do |hash, element|
  hash.merge({ k1 => v1 }, element, other, {k2 => v2})
end
",
            "\
enumerable.each_with_object(Hash.new) do |element, hash|
  hash[k1] = v1
  hash.merge!(element, other)
  hash[k2] = v2
end
",
        );
        expect_correction(
            ReduceMergeRule::new().unwrap(),
            "enumerable.reduce({}) { |hash, (k, v)| hash.merge(k => v) }\n",
            "enumerable.each_with_object({}) { |(k, v), hash| hash[k] = v }\n",
        );
    }

    #[test]
    fn test_reduce_merge_accepts() {
        expect_no_offenses(
            ReduceMergeRule::new().unwrap(),
            r"
enumerable.reduce(Set.new) do |set, values|
  set.merge(values)
end
enumerable.reduce({}) do |hash, element|
  other.merge(element)
end
",
        );
    }

    #[test]
    fn test_line_indentation() {
        assert_eq!(line_indentation("a\n    b", 6), "    ");
        assert_eq!(line_indentation("b", 0), "");
    }
}
