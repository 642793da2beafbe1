//! Size formulas and field conditions
//!
//! A formula is either a decimal literal or `=` followed by an arithmetic
//! expression over numbers and `?name?` placeholders, e.g. `=?count?*4+2`.
//! Placeholders name fields parsed earlier. Inside a repetition the lookup
//! starts in the innermost repetition and walks outwards to the top level,
//! so `?id?` in `list[3].label` finds `list[3].id` before a top-level `id`.
//!
//! A condition is a single comparison (`=`, `<` or `>`) between two such
//! expressions. Anything richer is rejected.

mod parser;

pub use parser::Parser;

use crate::error::{FormatError, Result};
use crate::store::{DataStore, FieldPath};
use std::cmp::Ordering;
use tracing::trace;

const COMPARISONS: [char; 3] = ['=', '<', '>'];

/// Resolve a formula to an integer
///
/// Arithmetic is done in floating point and the result truncated toward
/// zero. An empty formula resolves to 0.
pub fn resolve_to_integer(formula: &str, scope: Option<&FieldPath>, store: &DataStore) -> Result<i64> {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    let Some(expression) = trimmed.strip_prefix('=') else {
        return trimmed.parse::<i64>().map_err(|_| {
            FormatError::UnsupportedExpression(format!(
                "'{formula}' is neither a literal nor a '=' formula"
            ))
        });
    };

    let value = evaluate(expression, formula, scope, store)?;
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(FormatError::UnsupportedExpression(format!(
            "'{formula}' does not evaluate to an integer ({value})"
        )));
    }

    let resolved = value.trunc() as i64;
    trace!("Resolved '{}' to {}", formula, resolved);
    Ok(resolved)
}

/// Evaluate a single comparison
///
/// A leading `=` is accepted and ignored. Exactly one of `=`, `<` and `>`
/// must appear outside placeholders.
pub fn resolve_condition(condition: &str, scope: Option<&FieldPath>, store: &DataStore) -> Result<bool> {
    let trimmed = condition.trim();
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed);

    let operators = operator_positions(body);
    let (position, operator) = match operators.as_slice() {
        [single] => *single,
        [] => {
            return Err(FormatError::UnsupportedExpression(format!(
                "condition '{condition}' has no comparison"
            )));
        }
        _ => {
            return Err(FormatError::UnsupportedExpression(format!(
                "condition '{condition}' has more than one comparison"
            )));
        }
    };

    let left = evaluate(&body[..position], condition, scope, store)?;
    let right = evaluate(&body[position + 1..], condition, scope, store)?;
    let ordering = left.partial_cmp(&right);

    let result = match operator {
        '<' => ordering == Some(Ordering::Less),
        '>' => ordering == Some(Ordering::Greater),
        _ => ordering == Some(Ordering::Equal),
    };
    trace!("Condition '{}' is {}", condition, result);
    Ok(result)
}

/// Comparison operators outside `?..?` placeholders
fn operator_positions(body: &str) -> Vec<(usize, char)> {
    let mut inside_placeholder = false;
    body.char_indices()
        .filter(|&(_, ch)| {
            if ch == '?' {
                inside_placeholder = !inside_placeholder;
            }
            !inside_placeholder && COMPARISONS.contains(&ch)
        })
        .collect()
}

fn evaluate(expression: &str, formula: &str, scope: Option<&FieldPath>, store: &DataStore) -> Result<f64> {
    Parser::new(expression, |name: &str| lookup(name, formula, scope, store)).evaluate()
}

fn lookup(name: &str, formula: &str, scope: Option<&FieldPath>, store: &DataStore) -> Result<f64> {
    let unresolved = || FormatError::UnresolvedReference {
        reference: name.to_string(),
        formula: formula.to_string(),
    };
    let relative = FieldPath::parse(name).map_err(|_| unresolved())?;

    let root = FieldPath::root();
    let scopes: Vec<FieldPath> = match scope {
        Some(scope) => scope.scopes().collect(),
        None => vec![root],
    };

    for candidate in scopes.iter().map(|scope| scope.join(&relative)) {
        if let Some(entry) = store.get(&candidate) {
            return entry.value().as_number().ok_or_else(|| FormatError::TypeMismatch {
                path: candidate.to_string(),
                expected: "number",
                actual: entry.value().type_name(),
            });
        }
    }

    Err(unresolved())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::store::{FieldValue, StoreEntry};

    fn integer(value: i64) -> StoreEntry {
        StoreEntry::new(
            FieldType::Integer,
            false,
            value.to_be_bytes().to_vec(),
            FieldValue::Integer(value),
        )
    }

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).expect("Test operation should succeed")
    }

    fn store_with(values: &[(&str, i64)]) -> DataStore {
        let mut store = DataStore::new();
        for (name, value) in values {
            store.insert(path(name), integer(*value));
        }
        store
    }

    #[test]
    fn test_literals() {
        let store = DataStore::new();
        assert_eq!(resolve_to_integer("12", None, &store).unwrap(), 12);
        assert_eq!(resolve_to_integer(" 7 ", None, &store).unwrap(), 7);
        assert_eq!(resolve_to_integer("", None, &store).unwrap(), 0);
        assert!(matches!(
            resolve_to_integer("1+1", None, &store),
            Err(FormatError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_arithmetic() {
        let store = store_with(&[("x", 500)]);
        assert_eq!(resolve_to_integer("=1+1", None, &store).unwrap(), 2);
        assert_eq!(resolve_to_integer("=?x?*4", None, &store).unwrap(), 2000);
        assert_eq!(resolve_to_integer("=7/2", None, &store).unwrap(), 3);
        assert_eq!(resolve_to_integer("=-7/2", None, &store).unwrap(), -3);
    }

    #[test]
    fn test_unresolved_reference() {
        let store = store_with(&[("x", 500)]);
        let err = resolve_to_integer("=?missing?+1", None, &store).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnresolvedReference { ref reference, .. } if reference == "missing"
        ));
    }

    #[test]
    fn test_scoped_lookup() {
        let store = store_with(&[
            ("id", 1),
            ("size", 9),
            ("list[0].id", 5),
            ("list[1].id", 6),
            ("list[1].inner[0].id", 7),
        ]);

        let scope = path("list[1]");
        assert_eq!(resolve_to_integer("=?id?", Some(&scope), &store).unwrap(), 6);
        assert_eq!(resolve_to_integer("=?size?", Some(&scope), &store).unwrap(), 9);

        let nested = path("list[1].inner[0]");
        assert_eq!(resolve_to_integer("=?id?", Some(&nested), &store).unwrap(), 7);
        assert_eq!(resolve_to_integer("=?id?", None, &store).unwrap(), 1);

        assert_eq!(
            resolve_to_integer("=?list[0].id?*10", None, &store).unwrap(),
            50
        );
    }

    #[test]
    fn test_non_numeric_reference() {
        let mut store = DataStore::new();
        store.insert(
            path("name"),
            StoreEntry::new(
                FieldType::Text,
                false,
                b"AB".to_vec(),
                FieldValue::Text("AB".to_string()),
            ),
        );
        assert!(matches!(
            resolve_to_integer("=?name?", None, &store),
            Err(FormatError::TypeMismatch { expected: "number", .. })
        ));
    }

    #[test]
    fn test_conditions() {
        let store = store_with(&[("count", 3), ("flag", 0)]);
        assert!(resolve_condition("?count?>1", None, &store).unwrap());
        assert!(!resolve_condition("?count?<1", None, &store).unwrap());
        assert!(resolve_condition("?flag?=0", None, &store).unwrap());
        assert!(resolve_condition("=?count?*2=6", None, &store).unwrap());
        assert!(!resolve_condition("?count? = ?flag?", None, &store).unwrap());
    }

    #[test]
    fn test_conditions_reject_compound_expressions() {
        let store = store_with(&[("a", 1), ("b", 2)]);
        for condition in [
            "?a?",
            "?a?<?b?<3",
            "?a?=1&?b?=2",
            "?a?=1|?b?=2",
            "!?a?=1",
            "?a?<=?b?",
        ] {
            assert!(
                matches!(
                    resolve_condition(condition, None, &store),
                    Err(FormatError::UnsupportedExpression(_))
                ),
                "'{condition}' should be rejected"
            );
        }
    }
}
