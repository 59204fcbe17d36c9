use super::call_rules::{
    AncestorsIncludeRule, CountRule, MapCompactRule, PredicateOnSelectResultRule,
    RedundantSortBlockRule, ReverseEachRule, SortReverseRule, UnnecessaryStackframeRule,
};
use super::collection_rules::{
    ArrayConcatLiteralRule, ArrayInsertRule, ArrayPushSingleRule, CollectionLiteralInLoopRule,
    CollectionLiteralInMethodRule, IntersectionCheckRule, ReduceMergeRule, SizeRule,
};
use super::logic_rules::{
    ConditionalDefinitionRule, DefinedRule, NumericPredicateRule, ShortCircuitAndRule,
};
use super::string_rules::{
    BigDecimalWithNumericArgumentRule, DeletePrefixRule, DeleteSuffixRule, EndWithRule,
    RedundantSplitRegexpArgumentRule, StartWithRule, StringIncludeRule,
};
use super::Rule;
use crate::pattern::PatternSyntaxError;

/// Ids of the built-in rules, in registration order.
pub const BUILTIN_RULE_IDS: &[&str] = &[
    "Performance/AncestorsInclude",
    "Performance/ArrayConcatLiteral",
    "Performance/ArrayInsert",
    "Performance/ArrayPushSingle",
    "Performance/BigDecimalWithNumericArgument",
    "Performance/CollectionLiteralInLoop",
    "Performance/CollectionLiteralInMethod",
    "Performance/ConditionalDefinition",
    "Performance/Count",
    "Performance/Defined",
    "Performance/DeletePrefix",
    "Performance/DeleteSuffix",
    "Performance/EndWith",
    "Performance/IntersectionCheck",
    "Performance/MapCompact",
    "Performance/NumericPredicate",
    "Performance/PredicateOnSelectResult",
    "Performance/RedundantSortBlock",
    "Performance/RedundantSplitRegexpArgument",
    "Performance/ReduceMerge",
    "Performance/ReverseEach",
    "Performance/ShortCircuitAnd",
    "Performance/Size",
    "Performance/SortReverse",
    "Performance/StartWith",
    "Performance/StringInclude",
    "Performance/UnnecessaryStackframe",
];

/// An ordered, immutable set of rules. Order decides which of two
/// offenses on the same node is corrected first.
pub struct Registry {
    rules: Vec<Box<dyn Rule>>,
}

impl Registry {
    /// All built-in rules. Fails only if a rule's pattern does not compile.
    pub fn builtin() -> Result<Self, PatternSyntaxError> {
        let rules: Vec<Box<dyn Rule>> = vec![
            Box::new(AncestorsIncludeRule::new()?),
            Box::new(ArrayConcatLiteralRule::new()?),
            Box::new(ArrayInsertRule::new()?),
            Box::new(ArrayPushSingleRule::new()?),
            Box::new(BigDecimalWithNumericArgumentRule::new()?),
            Box::new(CollectionLiteralInLoopRule),
            Box::new(CollectionLiteralInMethodRule),
            Box::new(ConditionalDefinitionRule::new()?),
            Box::new(CountRule),
            Box::new(DefinedRule::new()?),
            Box::new(DeletePrefixRule::new()?),
            Box::new(DeleteSuffixRule::new()?),
            Box::new(EndWithRule::new()?),
            Box::new(IntersectionCheckRule::new()?),
            Box::new(MapCompactRule::new()?),
            Box::new(NumericPredicateRule::new()?),
            Box::new(PredicateOnSelectResultRule::new()?),
            Box::new(RedundantSortBlockRule::new()?),
            Box::new(RedundantSplitRegexpArgumentRule::new()?),
            Box::new(ReduceMergeRule::new()?),
            Box::new(ReverseEachRule::new()?),
            Box::new(ShortCircuitAndRule),
            Box::new(SizeRule::new()?),
            Box::new(SortReverseRule::new()?),
            Box::new(StartWithRule::new()?),
            Box::new(StringIncludeRule::new()?),
            Box::new(UnnecessaryStackframeRule::new()?),
        ];
        Ok(Self::from_rules(rules))
    }

    pub fn from_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    /// Get a rule by its ID
    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules().find(|rule| rule.id() == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Check if a rule ID names a built-in rule
pub fn has_rule(id: &str) -> bool {
    BUILTIN_RULE_IDS.contains(&id)
}
