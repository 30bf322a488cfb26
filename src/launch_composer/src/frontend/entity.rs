//! Entity abstraction over launch file formats

use crate::{
    error::{ParseError, Result},
    substitution::Expr,
};
use std::str::FromStr;

/// Entity trait for abstracting XML/YAML differences
pub trait Entity: Sized {
    /// Get entity type name (e.g., "node", "arg")
    fn type_name(&self) -> &str;

    /// Get attribute as string
    fn get_attr_str(&self, name: &str, optional: bool) -> Result<Option<String>>;

    /// Child entities in document order
    fn children(&self) -> Result<Vec<Self>>;
}

/// Extension trait for type-aware attribute access
pub trait EntityExt: Entity {
    /// Get attribute value with type coercion
    fn get_attr<T: FromStr>(&self, name: &str, optional: bool) -> Result<Option<T>> {
        match self.get_attr_str(name, optional)? {
            Some(value) => {
                let parsed = value.parse::<T>().map_err(|_| ParseError::TypeCoercion {
                    attribute: name.to_string(),
                    value: value.to_string(),
                    expected_type: std::any::type_name::<T>(),
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Get attribute parsed as a substitution expression
    fn get_expr(&self, name: &str, optional: bool) -> Result<Option<Expr>> {
        self.get_attr_str(name, optional)?
            .map(|value| Expr::parse(&value))
            .transpose()
    }

    /// Get a required attribute parsed as a substitution expression
    fn require_expr(&self, name: &str) -> Result<Expr> {
        self.get_expr(name, false)?
            .ok_or_else(|| self.missing(name))
    }

    /// Get a required plain string attribute
    fn require_str(&self, name: &str) -> Result<String> {
        self.get_attr_str(name, false)?
            .ok_or_else(|| self.missing(name))
    }

    /// First attribute present among `names`, parsed as an expression
    fn get_expr_any(&self, names: &[&str]) -> Result<Option<Expr>> {
        for name in names {
            if let Some(expr) = self.get_expr(name, true)? {
                return Ok(Some(expr));
            }
        }
        Ok(None)
    }

    fn missing(&self, name: &str) -> ParseError {
        ParseError::MissingAttribute {
            element: self.type_name().to_string(),
            attribute: name.to_string(),
        }
    }
}

// Blanket implementation for all Entity types
impl<T: Entity> EntityExt for T {}
