//! Substitution parser

use crate::{
    error::{ParseError, Result},
    substitution::types::{Expr, Substitution},
};
use lru::LruCache;
use std::{cell::RefCell, num::NonZeroUsize};

// Parsing is context-independent, so the parsed form of a string can be cached
// and reused across contexts. Only resolution sees the context.
const SUBSTITUTION_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(size) => size,
    None => panic!("cache size must be non-zero"),
};

thread_local! {
    static PARSE_CACHE: RefCell<LruCache<String, Vec<Substitution>>> =
        RefCell::new(LruCache::new(SUBSTITUTION_CACHE_SIZE));
}

/// Parse substitution string like "$(var x)" or "text $(env Y) more"
/// Supports nested substitutions like "$(var $(env NAME)_config)"
pub fn parse_substitutions(input: &str) -> Result<Vec<Substitution>> {
    let cached = PARSE_CACHE.with(|cache| cache.borrow_mut().get(input).cloned());
    if let Some(cached) = cached {
        log::trace!("Substitution parse cache hit: {}", input);
        return Ok(cached);
    }

    log::trace!("Substitution parse cache miss: {}", input);
    let result = parse_substitutions_recursive(input)?;
    PARSE_CACHE.with(|cache| {
        cache.borrow_mut().put(input.to_string(), result.clone());
    });
    Ok(result)
}

/// Internal recursive parser that handles nested substitutions
fn parse_substitutions_recursive(input: &str) -> Result<Vec<Substitution>> {
    let mut result = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut last_pos = 0;

    while let Some((i, ch)) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some((_, '('))) {
            continue;
        }

        if i > last_pos {
            result.push(Substitution::Text(input[last_pos..i].to_string()));
        }

        // Skip the '('
        chars.next();

        // Find matching ')' by counting parentheses outside quoted operands
        let sub_start = i + 2;
        let mut depth = 1;
        let mut quote: Option<char> = None;
        let mut prev = '(';
        let mut sub_end = None;
        for (pos, c) in chars.by_ref() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') if opens_quote(Some(prev)) => quote = Some(c),
                (None, '(') => depth += 1,
                (None, ')') => {
                    depth -= 1;
                    if depth == 0 {
                        sub_end = Some(pos);
                        break;
                    }
                }
                _ => {}
            }
            prev = c;
        }

        let Some(sub_end) = sub_end else {
            return Err(ParseError::InvalidSubstitution(format!(
                "Unmatched parentheses in substitution: {}",
                input
            )));
        };

        result.push(parse_substitution_content(&input[sub_start..sub_end])?);
        last_pos = sub_end + 1;
    }

    if last_pos < input.len() {
        result.push(Substitution::Text(input[last_pos..].to_string()));
    }

    if result.is_empty() {
        result.push(Substitution::Text(input.to_string()));
    }

    Ok(result)
}

/// Parse the content inside a substitution $(...)
fn parse_substitution_content(content: &str) -> Result<Substitution> {
    let trimmed = content.trim();
    let (sub_type, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((sub_type, rest)) => (sub_type, rest),
        None => (trimmed, ""),
    };

    if sub_type.is_empty() {
        return Err(ParseError::InvalidSubstitution(
            "Empty substitution".to_string(),
        ));
    }

    let operands = split_operands(rest)?
        .into_iter()
        .map(|token| parse_substitutions_recursive(token).map(Expr))
        .collect::<Result<Vec<_>>>()?;

    parse_single_substitution(sub_type, operands)
}

fn parse_single_substitution(sub_type: &str, operands: Vec<Expr>) -> Result<Substitution> {
    let arity = operands.len();
    let mut operands = operands.into_iter();
    let mut next = || operands.next().unwrap_or_default();

    let expect = |min: usize, max: usize| -> Result<()> {
        if arity < min || arity > max {
            let expected = if min == max {
                format!("{}", min)
            } else if max == usize::MAX {
                format!("at least {}", min)
            } else {
                format!("{} to {}", min, max)
            };
            return Err(ParseError::InvalidSubstitution(format!(
                "{} expects {} argument(s), got {}",
                sub_type, expected, arity
            )));
        }
        Ok(())
    };

    let substitution = match sub_type {
        "var" => {
            expect(1, 1)?;
            Substitution::LaunchConfiguration(next())
        }
        "env" => {
            expect(1, 2)?;
            let name = next();
            let default = (arity == 2).then(&mut next);
            Substitution::EnvironmentVariable { name, default }
        }
        "find-pkg-share" => {
            expect(1, 1)?;
            Substitution::FindPackageShare(next())
        }
        "find-pkg-prefix" => {
            expect(1, 1)?;
            Substitution::FindPackagePrefix(next())
        }
        "path-join" => {
            expect(1, usize::MAX)?;
            Substitution::PathJoin((0..arity).map(|_| next()).collect())
        }
        "path-exists" => {
            expect(1, 1)?;
            Substitution::PathExists(Box::new(next()))
        }
        "dirname" => {
            expect(0, 0)?;
            Substitution::Dirname
        }
        "filename" => {
            expect(0, 0)?;
            Substitution::Filename
        }
        "not" => {
            expect(1, 1)?;
            Substitution::Not(Box::new(next()))
        }
        "equals" => {
            expect(2, 2)?;
            let left = next();
            let right = next();
            Substitution::Equals(Box::new(left), Box::new(right))
        }
        _ => {
            return Err(ParseError::InvalidSubstitution(format!(
                "Unknown substitution type: {}",
                sub_type
            )))
        }
    };
    Ok(substitution)
}

/// A quote only opens at the start of an operand, so `it's` stays literal.
fn opens_quote(prev: Option<char>) -> bool {
    prev.map_or(true, |c| c.is_whitespace())
}

/// Split substitution operands on whitespace outside of nested `$(...)` and
/// quotes. Surrounding single or double quotes are removed from a top-level
/// token; quotes inside a nested substitution are kept for its own parse.
pub(crate) fn split_operands(args: &str) -> Result<Vec<&str>> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    let mut prev: Option<char> = None;

    for (i, ch) in args.char_indices() {
        match ch {
            _ if quote == Some(ch) => {
                quote = None;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        tokens.push(&args[s..i]);
                    }
                }
            }
            _ if quote.is_some() => {}
            '\'' | '"' if depth == 0 && start.is_none() => {
                quote = Some(ch);
                start = Some(i + ch.len_utf8());
            }
            '\'' | '"' if depth > 0 && opens_quote(prev) => {
                quote = Some(ch);
            }
            '(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' => {
                depth = depth.saturating_sub(1);
            }
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&args[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
        prev = Some(ch);
    }

    if quote.is_some() {
        return Err(ParseError::InvalidSubstitution(format!(
            "Unterminated quote in substitution arguments: {}",
            args
        )));
    }
    if let Some(s) = start {
        tokens.push(&args[s..]);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Expr {
        Expr::literal(s)
    }

    #[test]
    fn test_parse_plain_text() {
        let subs = parse_substitutions("hello world").unwrap();
        assert_eq!(subs, vec![Substitution::Text("hello world".to_string())]);
    }

    #[test]
    fn test_parse_var_substitution() {
        let subs = parse_substitutions("$(var my_var)").unwrap();
        assert_eq!(subs, vec![Substitution::LaunchConfiguration(text("my_var"))]);
    }

    #[test]
    fn test_parse_env_with_default() {
        let subs = parse_substitutions("$(env MY_VAR default_value)").unwrap();
        assert_eq!(
            subs,
            vec![Substitution::EnvironmentVariable {
                name: text("MY_VAR"),
                default: Some(text("default_value")),
            }]
        );
    }

    #[test]
    fn test_parse_mixed() {
        let subs = parse_substitutions("prefix $(var x) middle $(env Y) suffix").unwrap();
        assert_eq!(subs.len(), 5);
        assert_eq!(subs[0], Substitution::Text("prefix ".to_string()));
        assert_eq!(subs[1], Substitution::LaunchConfiguration(text("x")));
        assert_eq!(subs[2], Substitution::Text(" middle ".to_string()));
        assert_eq!(subs[4], Substitution::Text(" suffix".to_string()));
    }

    #[test]
    fn test_parse_nested_var_name() {
        let subs = parse_substitutions("$(var $(var prefix)_config)").unwrap();
        assert_eq!(
            subs,
            vec![Substitution::LaunchConfiguration(Expr(vec![
                Substitution::LaunchConfiguration(text("prefix")),
                Substitution::Text("_config".to_string()),
            ]))]
        );
    }

    #[test]
    fn test_parse_path_join_with_nested_operand() {
        let subs = parse_substitutions("$(path-join $(find-pkg-share yolo_ros) rviz default.rviz)")
            .unwrap();
        assert_eq!(
            subs,
            vec![Substitution::PathJoin(vec![
                Expr(vec![Substitution::FindPackageShare(text("yolo_ros"))]),
                text("rviz"),
                text("default.rviz"),
            ])]
        );
    }

    #[test]
    fn test_parse_quoted_operand() {
        let subs = parse_substitutions("$(equals $(var device) 'cuda:0')").unwrap();
        assert_eq!(
            subs,
            vec![Substitution::Equals(
                Box::new(Expr::var("device")),
                Box::new(text("cuda:0")),
            )]
        );
    }

    #[test]
    fn test_parse_dirname_in_path() {
        let subs = parse_substitutions("$(dirname)/config.yaml").unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0], Substitution::Dirname);
        assert_eq!(subs[1], Substitution::Text("/config.yaml".to_string()));
    }

    #[test]
    fn test_unmatched_parentheses() {
        assert!(parse_substitutions("$(var x").is_err());
    }

    #[test]
    fn test_unknown_substitution() {
        let err = parse_substitutions("$(command ls)").unwrap_err();
        assert!(err.to_string().contains("Unknown substitution type"));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(parse_substitutions("$(var)").is_err());
        assert!(parse_substitutions("$(equals a)").is_err());
        assert!(parse_substitutions("$(dirname extra)").is_err());
    }

    #[test]
    fn test_split_operands() {
        assert_eq!(split_operands("a  b").unwrap(), vec!["a", "b"]);
        assert_eq!(
            split_operands("$(var a b) 'x y' c").unwrap(),
            vec!["$(var a b)", "x y", "c"]
        );
        assert!(split_operands("'open").is_err());
        assert_eq!(
            split_operands("$(equals a 'x) y') it's").unwrap(),
            vec!["$(equals a 'x) y')", "it's"]
        );
    }

    #[test]
    fn test_parse_quoted_operand_with_parenthesis() {
        let subs = parse_substitutions("$(equals $(var a) 'x)y')").unwrap();
        assert_eq!(
            subs,
            vec![Substitution::Equals(
                Box::new(Expr::var("a")),
                Box::new(text("x)y")),
            )]
        );

        let subs = parse_substitutions("$(not $(equals $(var a) 'x) y')) tail").unwrap();
        assert_eq!(
            subs,
            vec![
                Substitution::Not(Box::new(Expr(vec![Substitution::Equals(
                    Box::new(Expr::var("a")),
                    Box::new(text("x) y")),
                )]))),
                Substitution::Text(" tail".to_string()),
            ]
        );
    }
}
