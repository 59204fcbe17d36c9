//! Guarded rule evaluation for a single node.

use std::any::Any;

use crate::engine::context::RuleContext;
use crate::rules::{Offense, Rule};
use crate::syntax::Node;

/// Extract a human-readable message from a panic payload.
///
/// Panic payloads can be String, &str, or other types. This function
/// attempts to extract a useful message from common panic payload types.
fn extract_panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }

    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }

    "(unknown panic payload)".to_string()
}

/// Run `rule` on `node`, dropping anything it reports outside the node.
///
/// A panicking rule is logged and treated as having reported nothing for
/// this node; the traversal continues.
pub(crate) fn evaluate_rule(rule: &dyn Rule, node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
    let offenses =
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| rule.evaluate(node, ctx))) {
            Ok(offenses) => offenses,
            Err(panic_payload) => {
                let panic_msg = extract_panic_message(panic_payload.as_ref());
                tracing::warn!(
                    rule = rule.id(),
                    node = %node.span(),
                    "rule panicked: {}",
                    panic_msg
                );
                return Vec::new();
            }
        };

    let bounds = node.span();
    offenses
        .into_iter()
        .filter(|offense| {
            let edits_inside = offense.correction.as_ref().map_or(true, |c| {
                c.edits.iter().all(|edit| bounds.contains(edit.span))
            });
            let keep = bounds.contains(offense.span) && edits_inside;
            if !keep {
                tracing::warn!(
                    rule = rule.id(),
                    node = %bounds,
                    offense = %offense.span,
                    "dropping offense reported outside the evaluated node"
                );
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSettings;
    use crate::syntax::{NodeKind, SourceParser, Span};
    use crate::RubyParser;

    struct Panicky;

    impl Rule for Panicky {
        fn id(&self) -> &'static str {
            "Test/Panicky"
        }
        fn name(&self) -> &'static str {
            "Panicky"
        }
        fn description(&self) -> &'static str {
            "always panics"
        }
        fn trigger_kinds(&self) -> &'static [NodeKind] {
            &[NodeKind::Send]
        }
        fn evaluate(&self, _node: Node<'_>, _ctx: &RuleContext<'_>) -> Vec<Offense> {
            panic!("boom");
        }
    }

    struct Outside;

    impl Rule for Outside {
        fn id(&self) -> &'static str {
            "Test/Outside"
        }
        fn name(&self) -> &'static str {
            "Outside"
        }
        fn description(&self) -> &'static str {
            "reports the whole file"
        }
        fn trigger_kinds(&self) -> &'static [NodeKind] {
            &[NodeKind::Int]
        }
        fn evaluate(&self, _node: Node<'_>, ctx: &RuleContext<'_>) -> Vec<Offense> {
            vec![ctx.offense(self, Span::new(0, ctx.source().len()), "everything")]
        }
    }

    #[test]
    fn test_extract_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(extract_panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(extract_panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(extract_panic_message(payload.as_ref()), "(unknown panic payload)");
    }

    #[test]
    fn test_panicking_rule_reports_nothing() {
        let tree = RubyParser::new().parse("foo.bar").unwrap();
        let settings = RuleSettings::default();
        let ctx = RuleContext::new(&tree, &settings, Default::default());
        let send = tree.preorder().find(|n| n.kind() == NodeKind::Send).unwrap();
        assert!(evaluate_rule(&Panicky, send, &ctx).is_empty());
    }

    #[test]
    fn test_offense_outside_node_is_dropped() {
        let tree = RubyParser::new().parse("foo(1)").unwrap();
        let settings = RuleSettings::default();
        let ctx = RuleContext::new(&tree, &settings, Default::default());
        let int = tree.preorder().find(|n| n.kind() == NodeKind::Int).unwrap();
        assert!(evaluate_rule(&Outside, int, &ctx).is_empty());
    }
}
