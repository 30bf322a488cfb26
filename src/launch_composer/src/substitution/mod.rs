//! Substitution module

pub mod context;
pub mod parser;
pub mod types;

pub use context::{Argument, LaunchContext, ScopeState};
pub use parser::parse_substitutions;
pub use types::{resolve_substitutions, Expr, Substitution};
