//! Rules about conditions and predicates that do more work than needed.

use super::{Offense, Rule, RuleContext};
use crate::pattern::{Pattern, PatternEnv, PatternSyntaxError};
use crate::syntax::{Node, NodeKind};

const RUBY_CONSTANTS: &[&str] = &[
    "RUBY_VERSION",
    "RUBY_RELEASE_DATE",
    "RUBY_PLATFORM",
    "RUBY_PATCHLEVEL",
    "RUBY_REVISION",
    "RUBY_COPYRIGHT",
    "RUBY_ENGINE",
    "RUBY_ENGINE_VERSION",
    "RUBY_DESCRIPTION",
];
const COMPARISONS: &[&str] = &["<", "<=", "==", ">=", ">", "=~", "==="];

/// Flags methods whose whole body branches on a `RUBY_*` constant, which
/// cannot change after load.
pub struct ConditionalDefinitionRule {
    branch_on_constant: Pattern,
}

impl ConditionalDefinitionRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        let env = PatternEnv::new()
            .with_set("CONSTANTS", RUBY_CONSTANTS.iter().copied())
            .with_set("OPERATORS", COMPARISONS.iter().copied());
        Ok(Self {
            branch_on_constant: Pattern::compile_with(
                "(def _ _ \
                   (if {(send (const nil? CONSTANTS) OPERATORS _) \
                        (send _ OPERATORS (const nil? CONSTANTS))} \
                     _ _))",
                &env,
            )?,
        })
    }
}

impl Rule for ConditionalDefinitionRule {
    fn id(&self) -> &'static str {
        "Performance/ConditionalDefinition"
    }

    fn name(&self) -> &'static str {
        "ConditionalDefinition"
    }

    fn description(&self) -> &'static str {
        "Move conditions on interpreter constants outside of method bodies"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Def]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        if !self.branch_on_constant.is_match(node) {
            return Vec::new();
        }
        vec![ctx.offense(
            self,
            node.span(),
            "Move conditional logic outside of the method body definition to improve \
             performance by avoiding repeated evaluation of constant condition.",
        )]
    }
}

/// Replaces reflection predicates called with a literal name by `defined?`.
pub struct DefinedRule {
    reflection_check: Pattern,
}

impl DefinedRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            reflection_check: Pattern::compile(
                "(send nil? \
                   ${:class_variable_defined? :const_defined? :instance_variable_defined?} \
                   $basic_literal? (true)?)",
            )?,
        })
    }

    /// Whether the value of `node` is only used as a condition, so `defined?`
    /// returning `nil` instead of `false` is harmless.
    fn used_as_condition(node: Node<'_>) -> bool {
        let mut child = node;
        let mut parent = node.parent();
        while let Some(p) = parent.filter(|p| p.kind() == NodeKind::Begin) {
            child = p;
            parent = p.parent();
        }
        let Some(parent) = parent else {
            return false;
        };
        match parent.kind() {
            NodeKind::If | NodeKind::While | NodeKind::Until => parent.child_node(0) == Some(child),
            NodeKind::And | NodeKind::Or => true,
            _ => false,
        }
    }
}

impl Rule for DefinedRule {
    fn id(&self) -> &'static str {
        "Performance/Defined"
    }

    fn name(&self) -> &'static str {
        "Defined"
    }

    fn description(&self) -> &'static str {
        "Use defined? instead of reflection predicates"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["class_variable_defined?", "const_defined?", "instance_variable_defined?"])
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some(captures) = self.reflection_check.matches(node).into_captures() else {
            return Vec::new();
        };
        let (Some(method), Some(expression), Some(selector)) =
            (captures.sym(0), captures.node(1), node.loc().selector)
        else {
            return Vec::new();
        };

        let name = expression
            .sym_value()
            .or_else(|| expression.str_value())
            .unwrap_or_else(|| expression.source());
        let mut replacement = format!("defined?({name})");
        if !Self::used_as_condition(node) {
            replacement = format!("!{replacement}.nil?");
        }
        vec![ctx
            .offense(self, selector, format!("Use `defined?` instead of `{method}`."))
            .with_correction(|corrector| corrector.replace(node.span(), replacement))]
    }
}

pub struct NumericPredicateRule {
    literal_predicate: Pattern,
    sign_predicate: Pattern,
}

impl NumericPredicateRule {
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            literal_predicate: Pattern::compile(
                "(send $numeric_type? ${:negative? :positive? :zero?})",
            )?,
            sign_predicate: Pattern::compile("(send $!nil? ${:negative? :positive?})")?,
        })
    }

    fn operator(predicate: &str) -> &'static str {
        match predicate {
            "negative?" => "<",
            "positive?" => ">",
            _ => "==",
        }
    }
}

impl Rule for NumericPredicateRule {
    fn id(&self) -> &'static str {
        "Performance/NumericPredicate"
    }

    fn name(&self) -> &'static str {
        "NumericPredicate"
    }

    fn description(&self) -> &'static str {
        "Use comparison operators instead of numeric sign predicates"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Send]
    }

    fn trigger_methods(&self) -> Option<&'static [&'static str]> {
        Some(&["negative?", "positive?", "zero?"])
    }

    // The receiver may not be numeric.
    fn safe_correction(&self) -> bool {
        false
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let captures = self
            .literal_predicate
            .matches(node)
            .into_captures()
            .or_else(|| self.sign_predicate.matches(node).into_captures());
        let Some((receiver, predicate)) = captures.and_then(|c| Some((c.node(0)?, c.sym(1)?)))
        else {
            return Vec::new();
        };

        let zero = if receiver.kind() == NodeKind::Float { "0.0" } else { "0" };
        let good = format!("{} {} {zero}", receiver.source(), Self::operator(predicate));
        let message = format!("Use compare operator `{good}` instead of `{}`.", node.source());
        vec![ctx
            .offense(self, node.span(), message)
            .with_correction(|corrector| corrector.replace(node.span(), good))]
    }
}

/// Flags `expensive && variable`, where testing the variable first could
/// skip the call.
pub struct ShortCircuitAndRule;

impl ShortCircuitAndRule {
    const MESSAGE: &'static str =
        "Use short-circuit logic with cheaper expressions first to avoid unnecessary method calls.";

    fn operands(node: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
        Some((node.child_node(0)?, node.child_node(1)?))
    }
}

impl Rule for ShortCircuitAndRule {
    fn id(&self) -> &'static str {
        "Performance/ShortCircuitAnd"
    }

    fn name(&self) -> &'static str {
        "ShortCircuitAnd"
    }

    fn description(&self) -> &'static str {
        "Evaluate cheap variables before method calls in && chains"
    }

    fn trigger_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::And]
    }

    fn evaluate(&self, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
        let Some((left, right)) = Self::operands(node) else {
            return Vec::new();
        };
        if !right.is_variable() {
            return Vec::new();
        }

        if left.kind() != NodeKind::And {
            if left.is_variable() {
                return Vec::new();
            }
            return vec![ctx
                .offense(self, node.span(), Self::MESSAGE)
                .with_correction(|corrector| corrector.swap(left, right))];
        }

        // Walk down the left spine of a chain `((x && y) && z) && var`.
        // One offense per `and` node; later passes handle the rest.
        let mut current = left;
        while let Some((inner_left, inner_right)) = Self::operands(current) {
            if !inner_right.is_variable() {
                return vec![ctx
                    .offense(self, node.span(), Self::MESSAGE)
                    .with_correction(|corrector| corrector.swap(right, inner_right))];
            }
            if inner_left.kind() != NodeKind::And {
                break;
            }
            current = inner_left;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{expect_correction, expect_no_offenses, expect_offense};

    #[test]
    fn test_conditional_definition() {
        let rule = || ConditionalDefinitionRule::new().unwrap();
        expect_offense(
            rule(),
            r"
def foo
^^^^^^^ Move conditional logic outside of the method body definition to improve performance by avoiding repeated evaluation of constant condition.
  if RUBY_VERSION < '3.0'
    1
  else
    2
  end
end
",
        );
        expect_offense(
            rule(),
            r"
def foo
^^^^^^^ Move conditional logic outside of the method body definition to improve performance by avoiding repeated evaluation of constant condition.
  if '3.0' =~ RUBY_ENGINE
    1
  else
    2
  end
end
",
        );
    }

    #[test]
    fn test_conditional_definition_accepts() {
        let rule = || ConditionalDefinitionRule::new().unwrap();
        expect_no_offenses(
            rule(),
            r"
if RUBY_VERSION < '4.0.'
  def answer
    42
  end
else
  def answer
    239
  end
end

def foo
  if VERSION < '3.0'
    1
  else
    2
  end
end

def bar
  setup
  if RUBY_VERSION < '3.0'
    1
  end
end
",
        );
    }

    #[test]
    fn test_defined_offenses() {
        let rule = || DefinedRule::new().unwrap();
        expect_offense(
            rule(),
            r"
return if class_variable_defined?(:@@foo)
          ^^^^^^^^^^^^^^^^^^^^^^^ Use `defined?` instead of `class_variable_defined?`.
return if const_defined?(:FOO, true)
          ^^^^^^^^^^^^^^ Use `defined?` instead of `const_defined?`.
",
        );
    }

    #[test]
    fn test_defined_corrections() {
        let rule = || DefinedRule::new().unwrap();
        expect_correction(
            rule(),
            "return if instance_variable_defined?(:@foo)\n",
            "return if defined?(@foo)\n",
        );
        expect_correction(rule(), "return if const_defined?(:FOO, true)\n", "return if defined?(FOO)\n");
        expect_correction(rule(), "const_defined?(:FOO)\n", "!defined?(FOO).nil?\n");
        expect_correction(rule(), "ready && const_defined?('FOO')\n", "ready && defined?(FOO)\n");
    }

    #[test]
    fn test_defined_accepts() {
        expect_no_offenses(
            DefinedRule::new().unwrap(),
            r"
defined?(@foo)
x.instance_variable_defined?(:@foo)
instance_variable_defined?(foo_ivar)
const_defined?(:FOO, false)
",
        );
    }

    #[test]
    fn test_numeric_predicate_offenses() {
        let rule = || NumericPredicateRule::new().unwrap();
        expect_offense(
            rule(),
            r"
1.positive?
^^^^^^^^^^^ Use compare operator `1 > 0` instead of `1.positive?`.
1.2.negative?
^^^^^^^^^^^^^ Use compare operator `1.2 < 0.0` instead of `1.2.negative?`.
foo = 1
if foo.positive?
   ^^^^^^^^^^^^^ Use compare operator `foo > 0` instead of `foo.positive?`.
end
",
        );
    }

    #[test]
    fn test_numeric_predicate_corrections() {
        let rule = || NumericPredicateRule::new().unwrap();
        expect_correction(rule(), "1.zero?\n", "1 == 0\n");
        expect_correction(
            rule(),
            "BigDecimal('1', 2).negative?\n",
            "BigDecimal('1', 2) < 0\n",
        );
        expect_correction(rule(), "foo = 1\nfoo.positive?\n", "foo = 1\nfoo > 0\n");
    }

    #[test]
    fn test_numeric_predicate_accepts() {
        expect_no_offenses(
            NumericPredicateRule::new().unwrap(),
            "foo = [1, 2, 3]\nif foo.all?(&:positive?)\nend\nfoo.zero?\n",
        );
    }

    const DEFS: &str = "a = 42\ndef foo?\n  42\nend\n";

    #[test]
    fn test_short_circuit_and_single() {
        expect_offense(
            ShortCircuitAndRule,
            &format!(
                "\n{DEFS}foo? && a\n^^^^^^^^^ Use short-circuit logic with cheaper expressions first to avoid unnecessary method calls.\n"
            ),
        );
        expect_correction(
            ShortCircuitAndRule,
            &format!("{DEFS}foo? and a\n"),
            &format!("{DEFS}a and foo?\n"),
        );
        expect_no_offenses(ShortCircuitAndRule, &format!("{DEFS}a && foo?\na && a\n"));
    }

    #[test]
    fn test_short_circuit_and_chain() {
        expect_correction(
            ShortCircuitAndRule,
            &format!("{DEFS}foo? && a && foo? && a\n"),
            &format!("{DEFS}a && a && foo? && foo?\n"),
        );
        expect_no_offenses(ShortCircuitAndRule, &format!("{DEFS}a && a && foo? && foo?\n"));
    }

    #[test]
    fn test_short_circuit_and_reports_chain_once() {
        expect_offense(
            ShortCircuitAndRule,
            "
a = 1
foo? && bar? && baz? && a
^^^^^^^^^^^^^^^^^^^^^^^^^ Use short-circuit logic with cheaper expressions first to avoid unnecessary method calls.
",
        );
        expect_correction(
            ShortCircuitAndRule,
            "a = 1\nfoo? && bar? && baz? && a\n",
            "a = 1\na && foo? && bar? && baz?\n",
        );
    }
}
