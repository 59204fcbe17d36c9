//! perfcop: performance lint rules for Ruby source.
//!
//! Rules match syntax-tree shapes with node patterns, report offenses and
//! offer byte-range corrections that the engine applies pass by pass until
//! the source is stable.

pub mod config;
pub mod corrector;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod rules;
pub mod suppression;
pub mod syntax;

pub use config::{Config, RubyVersion};
pub use corrector::{Corrector, Edit, EditError, EditSet};
pub use engine::{CancellationToken, Mode, RunError, RunOutcome, RunWarning, Runner, SourceFile};
pub use error::{Error, Result};
pub use pattern::{Pattern, PatternSyntaxError};
pub use rules::registry::Registry;
pub use rules::{Offense, Rule, Severity};
pub use syntax::{Node, NodeKind, ParseError, RubyParser, SourceParser, Span, SyntaxTree};

/// Run every built-in rule over `source`, correcting it in [`Mode::Correct`].
pub fn check(source: &str, config: &Config, mode: Mode) -> Result<RunOutcome> {
    config.validate()?;
    let registry = Registry::builtin()?;
    let runner = Runner::new(&registry, config);
    Ok(runner.run(source, &RubyParser::new(), mode)?)
}
