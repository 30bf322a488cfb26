//! Condition evaluation for if/unless predicates

use crate::{
    error::ComposeError,
    substitution::{Expr, LaunchContext},
};
use std::fmt;

/// Predicate guarding an action or a process argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Holds when the expression resolves to true.
    If(Expr),
    /// Holds when the expression resolves to false.
    Unless(Expr),
}

impl Condition {
    pub fn evaluate(&self, context: &LaunchContext) -> Result<bool, ComposeError> {
        let (expr, expected) = match self {
            Condition::If(expr) => (expr, true),
            Condition::Unless(expr) => (expr, false),
        };

        let value = expr.resolve_scoped(context)?;

        match parse_bool(&value) {
            Some(b) => Ok(b == expected),
            None => Err(ComposeError::InvalidCondition {
                value,
                scope: context.scope().to_string(),
            }),
        }
    }

    pub fn expr(&self) -> &Expr {
        match self {
            Condition::If(expr) | Condition::Unless(expr) => expr,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::If(expr) => write!(f, "if={}", expr),
            Condition::Unless(expr) => write!(f, "unless={}", expr),
        }
    }
}

/// Interpret a boolean-like string.
///
/// `true|1|yes|on` and `false|0|no|off|""` are accepted case-insensitively.
/// Anything else yields `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::PackageMap;
    use std::sync::Arc;

    fn context() -> LaunchContext {
        LaunchContext::with_locator(Arc::new(PackageMap::new()))
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("  true  "), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool(""), Some(false));

        assert_eq!(parse_bool("random"), None);
        assert_eq!(parse_bool("0.5"), None);
    }

    #[test]
    fn test_evaluate_condition() {
        let mut ctx = context();
        ctx.set_configuration("use_sim".to_string(), "true".to_string());
        ctx.set_configuration("debug".to_string(), "false".to_string());

        assert!(Condition::If(Expr::var("use_sim")).evaluate(&ctx).unwrap());
        assert!(!Condition::If(Expr::var("debug")).evaluate(&ctx).unwrap());
        assert!(Condition::Unless(Expr::var("debug")).evaluate(&ctx).unwrap());
        assert!(!Condition::Unless(Expr::var("use_sim")).evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_non_boolean_is_error() {
        let mut ctx = context();
        ctx.set_configuration("threshold".to_string(), "0.5".to_string());
        let err = Condition::If(Expr::var("threshold"))
            .evaluate(&ctx)
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidCondition { value, .. } if value == "0.5"));
    }

    #[test]
    fn test_unbound_predicate_is_error() {
        let err = Condition::If(Expr::var("missing"))
            .evaluate(&context())
            .unwrap_err();
        assert_eq!(err.unbound_argument(), Some("missing"));
    }
}
