//! Substitution types

use crate::{
    condition::parse_bool,
    error::{ComposeError, SubstitutionError},
    substitution::context::LaunchContext,
};
use std::{fmt, path::Path};

/// A lazy string expression: an ordered concatenation of substitution parts.
/// Resolve it against a [`LaunchContext`] to get the concrete string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expr(pub Vec<Substitution>);

impl Expr {
    /// Create an `Expr` from a literal string (no substitutions).
    pub fn literal(s: impl Into<String>) -> Self {
        Expr(vec![Substitution::Text(s.into())])
    }

    /// `$(var name)`
    pub fn var(name: impl Into<String>) -> Self {
        Expr(vec![Substitution::LaunchConfiguration(Expr::literal(name))])
    }

    /// `$(find-pkg-share package)`
    pub fn package_share(package: impl Into<String>) -> Self {
        Expr(vec![Substitution::FindPackageShare(Expr::literal(package))])
    }

    /// `$(path-join a b ...)`
    pub fn path_join(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr(vec![Substitution::PathJoin(parts.into_iter().collect())])
    }

    /// `$(path-exists path)`
    pub fn path_exists(path: Expr) -> Self {
        Expr(vec![Substitution::PathExists(Box::new(path))])
    }

    /// Parse substitution syntax, e.g. `"$(var model)"`.
    pub fn parse(input: &str) -> crate::error::Result<Self> {
        crate::substitution::parse_substitutions(input).map(Expr)
    }

    /// Returns `true` if this expression is a single literal text with no substitutions.
    pub fn is_literal(&self) -> bool {
        self.as_literal().is_some()
    }

    /// If this expression is a literal, return its value.
    pub fn as_literal(&self) -> Option<&str> {
        match self.0.as_slice() {
            [Substitution::Text(s)] => Some(s.as_str()),
            [] => Some(""),
            _ => None,
        }
    }

    /// Append another expression, concatenating the two.
    pub fn concat(mut self, other: Expr) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn resolve(&self, context: &LaunchContext) -> Result<String, SubstitutionError> {
        resolve_substitutions(&self.0, context)
    }

    /// Resolve, tagging a failure with the context's current scope.
    pub(crate) fn resolve_scoped(&self, context: &LaunchContext) -> Result<String, ComposeError> {
        self.resolve(context)
            .map_err(|e| ComposeError::from_substitution(e, context.scope()))
    }
}

impl From<Vec<Substitution>> for Expr {
    fn from(subs: Vec<Substitution>) -> Self {
        Expr(subs)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::literal(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::literal(s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sub in &self.0 {
            write!(f, "{}", sub)?;
        }
        Ok(())
    }
}

/// One part of an [`Expr`].
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    /// Plain text (no substitution)
    Text(String),
    /// $(var name) - Launch configuration variable
    LaunchConfiguration(Expr),
    /// $(env VAR [default]) - Environment variable with optional default
    EnvironmentVariable { name: Expr, default: Option<Expr> },
    /// $(find-pkg-share package_name)
    FindPackageShare(Expr),
    /// $(find-pkg-prefix package_name)
    FindPackagePrefix(Expr),
    /// $(path-join a b ...) - operands joined with '/'
    PathJoin(Vec<Expr>),
    /// $(path-exists path) - "true" or "false"
    PathExists(Box<Expr>),
    /// $(dirname) - directory of the description being resolved
    Dirname,
    /// $(filename) - file name of the description being resolved
    Filename,
    /// $(not value)
    Not(Box<Expr>),
    /// $(equals left right)
    Equals(Box<Expr>, Box<Expr>),
}

impl Substitution {
    /// Resolve substitution to string value
    pub fn resolve(&self, context: &LaunchContext) -> Result<String, SubstitutionError> {
        match self {
            Substitution::Text(s) => Ok(s.clone()),
            Substitution::LaunchConfiguration(name) => {
                let name = name.resolve(context)?;
                context
                    .get_configuration(&name)
                    .ok_or(SubstitutionError::UnboundArgument(name))
            }
            Substitution::EnvironmentVariable { name, default } => {
                let name = name.resolve(context)?;
                match context.get_env(&name) {
                    Some(value) => Ok(value),
                    None => match default {
                        Some(default) => default.resolve(context),
                        None => Err(SubstitutionError::UndefinedEnvVar(name)),
                    },
                }
            }
            Substitution::FindPackageShare(package) => {
                let package = package.resolve(context)?;
                context
                    .locator()
                    .find_package_share(&package)
                    .map(|p| p.to_string_lossy().into_owned())
                    .ok_or(SubstitutionError::PackageNotFound(package))
            }
            Substitution::FindPackagePrefix(package) => {
                let package = package.resolve(context)?;
                context
                    .locator()
                    .find_package_prefix(&package)
                    .map(|p| p.to_string_lossy().into_owned())
                    .ok_or(SubstitutionError::PackageNotFound(package))
            }
            Substitution::PathJoin(parts) => {
                let mut joined = String::new();
                for part in parts {
                    let part = part.resolve(context)?;
                    join_path(&mut joined, &part);
                }
                Ok(joined)
            }
            Substitution::PathExists(path) => match path.resolve(context) {
                Ok(path) => Ok(bool_str(!path.is_empty() && Path::new(&path).exists())),
                // An uninstalled package cannot contain the probed file.
                Err(SubstitutionError::PackageNotFound(package)) => {
                    log::debug!("path-exists: package '{}' not found", package);
                    Ok(bool_str(false))
                }
                Err(e) => Err(e),
            },
            Substitution::Dirname => context
                .current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    SubstitutionError::InvalidSubstitution(
                        "$(dirname) used outside of a launch file".to_string(),
                    )
                }),
            Substitution::Filename => context.current_filename().ok_or_else(|| {
                SubstitutionError::InvalidSubstitution(
                    "$(filename) used outside of a launch file".to_string(),
                )
            }),
            Substitution::Not(value) => {
                let value = value.resolve(context)?;
                parse_bool(&value).map(|b| bool_str(!b)).ok_or_else(|| {
                    SubstitutionError::InvalidSubstitution(format!(
                        "$(not) expects a boolean, got '{}'",
                        value
                    ))
                })
            }
            Substitution::Equals(left, right) => {
                let left = left.resolve(context)?;
                let right = right.resolve(context)?;
                let equal = match (parse_bool(&left), parse_bool(&right)) {
                    (Some(l), Some(r)) => l == r,
                    _ => left == right,
                };
                Ok(bool_str(equal))
            }
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substitution::Text(s) => write!(f, "{}", s),
            Substitution::LaunchConfiguration(name) => write!(f, "$(var {})", name),
            Substitution::EnvironmentVariable { name, default } => match default {
                Some(default) => write!(f, "$(env {} {})", name, quote_operand(default)),
                None => write!(f, "$(env {})", name),
            },
            Substitution::FindPackageShare(package) => write!(f, "$(find-pkg-share {})", package),
            Substitution::FindPackagePrefix(package) => {
                write!(f, "$(find-pkg-prefix {})", package)
            }
            Substitution::PathJoin(parts) => {
                write!(f, "$(path-join")?;
                for part in parts {
                    write!(f, " {}", quote_operand(part))?;
                }
                write!(f, ")")
            }
            Substitution::PathExists(path) => write!(f, "$(path-exists {})", quote_operand(path)),
            Substitution::Dirname => write!(f, "$(dirname)"),
            Substitution::Filename => write!(f, "$(filename)"),
            Substitution::Not(value) => write!(f, "$(not {})", quote_operand(value)),
            Substitution::Equals(left, right) => write!(
                f,
                "$(equals {} {})",
                quote_operand(left),
                quote_operand(right)
            ),
        }
    }
}

/// Quote an operand whose literal text contains whitespace or parentheses so
/// it re-parses as one token.
fn quote_operand(expr: &Expr) -> String {
    let rendered = expr.to_string();
    let needs_quotes = expr.0.iter().any(|s| {
        matches!(s, Substitution::Text(t) if t.contains(|c: char| c.is_whitespace() || c == '(' || c == ')'))
    });
    if needs_quotes || rendered.is_empty() {
        format!("'{}'", rendered)
    } else {
        rendered
    }
}

fn join_path(joined: &mut String, part: &str) {
    if part.is_empty() {
        return;
    }
    // An absolute operand restarts the path.
    if part.starts_with('/') {
        joined.clear();
    } else if !joined.is_empty() && !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(part);
}

fn bool_str(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Resolve list of substitutions to single string
pub fn resolve_substitutions(
    subs: &[Substitution],
    context: &LaunchContext,
) -> Result<String, SubstitutionError> {
    let mut result = String::new();
    for sub in subs {
        result.push_str(&sub.resolve(context)?);
    }
    Ok(result)
}
